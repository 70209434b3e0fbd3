mod common;

use common::Recorder;
use pulse_stream::from_iter;
use quickcheck::quickcheck;

quickcheck! {
    fn prop_map_matches_iterator_map(xs: Vec<i32>) -> bool {
        let rec = Recorder::new();
        from_iter(xs.clone())
            .map(|x| x.wrapping_mul(3))
            .attach(rec.listener());
        let expected: Vec<i32> = xs.iter().map(|x| x.wrapping_mul(3)).collect();
        rec.values() == expected && rec.completed()
    }

    fn prop_filter_matches_iterator_filter(xs: Vec<i32>) -> bool {
        let rec = Recorder::new();
        from_iter(xs.clone())
            .filter(|x| x % 2 == 0)
            .attach(rec.listener());
        let expected: Vec<i32> = xs.into_iter().filter(|x| x % 2 == 0).collect();
        rec.values() == expected
    }

    fn prop_take_is_a_prefix(xs: Vec<i32>, n: u8) -> bool {
        let n = n as usize;
        let rec = Recorder::new();
        from_iter(xs.clone()).take(n).attach(rec.listener());
        let expected: Vec<i32> = xs.into_iter().take(n).collect();
        rec.values() == expected && rec.completed()
    }

    fn prop_drop_is_a_suffix(xs: Vec<i32>, n: u8) -> bool {
        let n = n as usize;
        let rec = Recorder::new();
        from_iter(xs.clone()).drop(n).attach(rec.listener());
        let expected: Vec<i32> = xs.into_iter().skip(n).collect();
        rec.values() == expected && rec.completed()
    }

    fn prop_fold_emits_every_partial_sum(xs: Vec<i32>) -> bool {
        let rec = Recorder::new();
        from_iter(xs.clone())
            .fold(0i64, |acc, x| acc + x as i64)
            .attach(rec.listener());
        let mut expected = vec![0i64];
        let mut acc = 0i64;
        for x in xs {
            acc += x as i64;
            expected.push(acc);
        }
        rec.values() == expected
    }

    fn prop_drop_last_and_suffix_partition_the_input(xs: Vec<i32>, n: u8) -> bool {
        let n = n as usize;
        let head = Recorder::new();
        from_iter(xs.clone()).drop_last(n).attach(head.listener());
        let tail = Recorder::new();
        from_iter(xs.clone()).suffix(n).attach(tail.listener());
        let mut joined = head.values();
        joined.extend(tail.values());
        joined == xs
    }
}
