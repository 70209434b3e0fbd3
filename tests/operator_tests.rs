mod common;

use std::sync::{Arc, Mutex};

use common::{Event, ManualSource, Recorder};
use pulse_stream::{empty, fail, from_iter, pending, StreamError};

#[test]
fn test_map() {
    let rec = Recorder::new();
    from_iter(vec![1, 2, 3]).map(|x| x * 2).attach(rec.listener());
    assert_eq!(rec.values(), vec![2, 4, 6]);
    assert!(rec.completed());
}

#[test]
fn test_map_changes_type() {
    let rec = Recorder::new();
    from_iter(vec![1, 2, 3])
        .map(|x| format!("#{x}"))
        .attach(rec.listener());
    assert_eq!(rec.values(), vec!["#1", "#2", "#3"]);
}

#[test]
fn test_map_to() {
    let rec = Recorder::new();
    from_iter(vec![1, 2, 3]).map_to("tick").attach(rec.listener());
    assert_eq!(rec.values(), vec!["tick", "tick", "tick"]);
    assert!(rec.completed());
}

#[test]
fn test_filter() {
    let rec = Recorder::new();
    from_iter(0..10).filter(|x| x % 3 == 0).attach(rec.listener());
    assert_eq!(rec.values(), vec![0, 3, 6, 9]);
    assert!(rec.completed());
}

#[test]
fn test_try_map_failure_becomes_stream_error() {
    let rec = Recorder::new();
    from_iter(vec![1, 2, 3])
        .try_map(|x| {
            if x == 2 {
                Err(StreamError::Custom("bad value".into()))
            } else {
                Ok(x * 10)
            }
        })
        .attach(rec.listener());
    assert_eq!(
        rec.events(),
        vec![
            Event::Next(10),
            Event::Error(StreamError::Custom("bad value".into())),
        ]
    );
}

#[test]
fn test_try_filter_failure_becomes_stream_error() {
    let rec = Recorder::new();
    from_iter(vec![1, 2, 3])
        .try_filter(|x| {
            if *x == 3 {
                Err(StreamError::Custom("cannot judge 3".into()))
            } else {
                Ok(*x % 2 == 1)
            }
        })
        .attach(rec.listener());
    assert_eq!(
        rec.events(),
        vec![
            Event::Next(1),
            Event::Error(StreamError::Custom("cannot judge 3".into())),
        ]
    );
}

#[test]
fn test_inspect_observes_without_altering() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let spy = Arc::clone(&seen);
    let rec = Recorder::new();
    from_iter(vec![1, 2, 3])
        .inspect(move |x| spy.lock().unwrap().push(*x))
        .attach(rec.listener());
    assert_eq!(rec.values(), vec![1, 2, 3]);
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
}

#[test]
fn test_take_completes_early_and_detaches() {
    let (src, stream) = ManualSource::<i32>::new();
    let rec = Recorder::new();
    stream.take(2).attach(rec.listener());

    src.push(1);
    src.push(2);
    src.push(3);

    assert_eq!(rec.events(), vec![Event::Next(1), Event::Next(2), Event::Complete]);
}

#[test]
fn test_take_more_than_available() {
    let rec = Recorder::new();
    from_iter(vec![1, 2]).take(10).attach(rec.listener());
    assert_eq!(rec.events(), vec![Event::Next(1), Event::Next(2), Event::Complete]);
}

#[test]
fn test_take_zero_completes_on_first_value() {
    let (src, stream) = ManualSource::<i32>::new();
    let rec = Recorder::new();
    stream.take(0).attach(rec.listener());

    assert!(rec.events().is_empty());
    src.push(1);
    assert_eq!(rec.events(), vec![Event::Complete]);
}

#[test]
fn test_take_while() {
    let rec = Recorder::new();
    from_iter(vec![1, 2, 3, 2, 1])
        .take_while(|x| *x < 3)
        .attach(rec.listener());
    assert_eq!(rec.events(), vec![Event::Next(1), Event::Next(2), Event::Complete]);
}

#[test]
fn test_drop() {
    let rec = Recorder::new();
    from_iter(vec![1, 2, 3, 4, 5]).drop(3).attach(rec.listener());
    assert_eq!(rec.events(), vec![Event::Next(4), Event::Next(5), Event::Complete]);
}

#[test]
fn test_drop_more_than_available() {
    let rec = Recorder::new();
    from_iter(vec![1, 2]).drop(5).attach(rec.listener());
    assert_eq!(rec.events(), vec![Event::Complete]);
}

#[test]
fn test_drop_while() {
    let rec = Recorder::new();
    from_iter(vec![1, 2, 3, 2, 1])
        .drop_while(|x| *x < 3)
        .attach(rec.listener());
    // once the gate opens it stays open
    assert_eq!(rec.values(), vec![3, 2, 1]);
    assert!(rec.completed());
}

#[test]
fn test_drop_last_discards_tail() {
    let rec = Recorder::new();
    from_iter(vec![1, 2, 3, 4, 5]).drop_last(2).attach(rec.listener());
    assert_eq!(rec.values(), vec![1, 2, 3]);
    assert!(rec.completed());
}

#[test]
fn test_drop_last_shorter_than_count() {
    let rec = Recorder::new();
    from_iter(vec![1, 2]).drop_last(5).attach(rec.listener());
    assert_eq!(rec.events(), vec![Event::Complete]);
}

#[test]
fn test_suffix_emits_tail_on_completion() {
    let (src, stream) = ManualSource::<i32>::new();
    let rec = Recorder::new();
    stream.suffix(2).attach(rec.listener());

    src.push(1);
    src.push(2);
    src.push(3);
    // nothing until the input completes
    assert!(rec.events().is_empty());

    src.complete();
    assert_eq!(rec.events(), vec![Event::Next(2), Event::Next(3), Event::Complete]);
}

#[test]
fn test_last() {
    let rec = Recorder::new();
    from_iter(vec![1, 2, 3]).last().attach(rec.listener());
    assert_eq!(rec.events(), vec![Event::Next(3), Event::Complete]);
}

#[test]
fn test_last_of_empty_just_completes() {
    let rec = Recorder::new();
    empty::<i32>().last().attach(rec.listener());
    assert_eq!(rec.events(), vec![Event::Complete]);
}

#[test]
fn test_fold_emits_seed_then_running_accumulator() {
    let rec = Recorder::new();
    from_iter(vec![1, 2, 3])
        .fold(0, |acc, x| acc + x)
        .attach(rec.listener());
    // n inputs produce n + 1 outputs
    assert_eq!(rec.values(), vec![0, 1, 3, 6]);
    assert!(rec.completed());
}

#[test]
fn test_try_fold_failure_becomes_stream_error() {
    let rec = Recorder::new();
    from_iter(vec![1, 2, 3])
        .try_fold(0, |acc, x| {
            if x == 3 {
                Err(StreamError::Custom("overflow".into()))
            } else {
                Ok(acc + x)
            }
        })
        .attach(rec.listener());
    assert_eq!(
        rec.events(),
        vec![
            Event::Next(0),
            Event::Next(1),
            Event::Next(3),
            Event::Error(StreamError::Custom("overflow".into())),
        ]
    );
}

#[test]
fn test_start_with() {
    let rec = Recorder::new();
    from_iter(vec![2, 3]).start_with(1).attach(rec.listener());
    assert_eq!(rec.values(), vec![1, 2, 3]);
    assert!(rec.completed());
}

#[test]
fn test_compose_reads_like_a_chain() {
    let rec = Recorder::new();
    from_iter(0..10)
        .compose(|s| s.filter(|x| x % 2 == 0).map(|x| x + 100))
        .attach(rec.listener());
    assert_eq!(rec.values(), vec![100, 102, 104, 106, 108]);
}

#[test]
fn test_operator_pipeline() {
    let rec = Recorder::new();
    from_iter(vec![1, 2, 3, 4, 5]).drop(3).attach(rec.listener());
    assert_eq!(rec.events(), vec![Event::Next(4), Event::Next(5), Event::Complete]);
}

#[test]
fn test_error_passes_through_operators() {
    let rec = Recorder::new();
    fail::<i32>(StreamError::Timeout)
        .map(|x| x * 2)
        .drop(1)
        .attach(rec.listener());
    assert_eq!(rec.events(), vec![Event::Error(StreamError::Timeout)]);
}

#[test]
fn test_pending_emits_nothing() {
    let rec = Recorder::new();
    let token = pending::<i32>().attach(rec.listener());
    assert!(token.is_valid());
    assert!(rec.events().is_empty());
}

#[test]
fn test_empty_completes_immediately() {
    let rec = Recorder::new();
    empty::<i32>().attach(rec.listener());
    assert_eq!(rec.events(), vec![Event::Complete]);
}
