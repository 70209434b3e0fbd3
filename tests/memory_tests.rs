mod common;

use common::{Event, ManualSource, Recorder};
use pulse_stream::{from_iter, AnyListener};

#[test]
fn test_memory_records_value_emitted_while_unobserved() {
    let (src, stream) = ManualSource::<i32>::new_memory();
    let token = stream.attach(AnyListener::no_op());
    stream.detach(token);

    // the producer is still running inside the grace window, so this value
    // reaches nobody but is remembered
    src.push(5);
    let rec = Recorder::new();
    stream.attach(rec.listener());
    assert_eq!(rec.values(), vec![5]);
}

#[test]
fn test_remember_replays_latest_value_to_late_listener() {
    let (src, stream) = ManualSource::<i32>::new();
    let remembered = stream.remember();

    let first = Recorder::new();
    remembered.attach(first.listener());
    src.push(5);

    let late = Recorder::new();
    remembered.attach(late.listener());
    // the late listener catches up before any new event
    assert_eq!(late.values(), vec![5]);

    src.push(7);
    assert_eq!(first.values(), vec![5, 7]);
    assert_eq!(late.values(), vec![5, 7]);
}

#[test]
fn test_remember_with_no_value_yet_replays_nothing() {
    let (_src, stream) = ManualSource::<i32>::new();
    let remembered = stream.remember();

    remembered.attach(Recorder::new().listener());
    let rec = Recorder::new();
    remembered.attach(rec.listener());
    assert!(rec.events().is_empty());
}

#[test]
fn test_fold_replays_latest_accumulator() {
    let (src, stream) = ManualSource::<i32>::new();
    let sums = stream.fold(0, |acc, x| acc + x);

    let first = Recorder::new();
    sums.attach(first.listener());
    assert_eq!(first.values(), vec![0]);

    src.push(1);
    src.push(2);

    let late = Recorder::new();
    sums.attach(late.listener());
    assert_eq!(late.values(), vec![3]);

    src.push(4);
    assert_eq!(first.values(), vec![0, 1, 3, 7]);
    assert_eq!(late.values(), vec![3, 7]);
}

#[test]
fn test_start_with_replays_through_memory() {
    let (src, stream) = ManualSource::<i32>::new();
    let prefixed = stream.start_with(0);

    let first = Recorder::new();
    prefixed.attach(first.listener());
    src.push(1);

    let late = Recorder::new();
    prefixed.attach(late.listener());
    assert_eq!(late.values(), vec![1]);
}

#[test]
fn test_memory_stream_still_terminates() {
    let stream = from_iter(vec![1, 2]).remember();
    let rec = Recorder::new();
    stream.attach(rec.listener());
    assert_eq!(
        rec.events(),
        vec![Event::Next(1), Event::Next(2), Event::Complete]
    );
    assert!(!stream.attach(Recorder::new().listener()).is_valid());
}

#[test]
fn test_as_stream_shares_the_same_memory() {
    let (src, stream) = ManualSource::<i32>::new();
    let remembered = stream.remember();
    let plain = remembered.as_stream();

    plain.attach(Recorder::new().listener());
    src.push(9);

    let rec = Recorder::new();
    plain.attach(rec.listener());
    assert_eq!(rec.values(), vec![9]);
}
