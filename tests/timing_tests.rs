mod common;

use std::time::Duration;

use common::{Event, ManualScheduler, ManualSource, Recorder};
use pulse_stream::periodic;

#[test]
fn test_debounce_with_externally_implemented_scheduler() {
    let scheduler = ManualScheduler::new();
    let (src, stream) = ManualSource::<i32>::new();
    let rec = Recorder::new();
    stream
        .debounce_with_scheduler(Duration::from_millis(100), scheduler.clone())
        .attach(rec.listener());

    src.push(1);
    assert_eq!(scheduler.pending(), 1);
    // the second value cancels the first value's timer
    src.push(2);
    assert_eq!(scheduler.pending(), 1);

    scheduler.fire_all();
    assert_eq!(rec.values(), vec![2]);
}

#[tokio::test(start_paused = true)]
async fn test_debounce_emits_after_silence() {
    let (src, stream) = ManualSource::<i32>::new();
    let rec = Recorder::new();
    stream.debounce(Duration::from_millis(100)).attach(rec.listener());

    src.push(1);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(rec.values(), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn test_debounce_keeps_only_the_latest_of_a_burst() {
    let (src, stream) = ManualSource::<i32>::new();
    let rec = Recorder::new();
    stream.debounce(Duration::from_millis(100)).attach(rec.listener());

    src.push(1);
    tokio::time::sleep(Duration::from_millis(50)).await;
    src.push(2);
    tokio::time::sleep(Duration::from_millis(50)).await;
    src.push(3);
    // no value yet: the silence window keeps restarting
    assert!(rec.values().is_empty());

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(rec.values(), vec![3]);
}

#[tokio::test(start_paused = true)]
async fn test_debounce_completion_drops_pending_value() {
    let (src, stream) = ManualSource::<i32>::new();
    let rec = Recorder::new();
    stream.debounce(Duration::from_millis(100)).attach(rec.listener());

    src.push(1);
    src.complete();
    assert_eq!(rec.events(), vec![Event::Complete]);

    // the canceled emission never fires
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(rec.events(), vec![Event::Complete]);
}

#[tokio::test(start_paused = true)]
async fn test_debounce_forwards_error_immediately() {
    let (src, stream) = ManualSource::<i32>::new();
    let rec = Recorder::new();
    stream.debounce(Duration::from_millis(100)).attach(rec.listener());

    src.push(1);
    src.error(pulse_stream::StreamError::Timeout);
    assert_eq!(
        rec.events(),
        vec![Event::Error(pulse_stream::StreamError::Timeout)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_periodic_counts_up_from_zero() {
    let rec = Recorder::new();
    periodic(Duration::from_millis(10)).take(3).attach(rec.listener());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        rec.events(),
        vec![
            Event::Next(0),
            Event::Next(1),
            Event::Next(2),
            Event::Complete,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_periodic_stops_ticking_once_abandoned() {
    let stream = periodic(Duration::from_millis(10));
    let rec = Recorder::new();
    let token = stream.attach(rec.listener());

    tokio::time::sleep(Duration::from_millis(35)).await;
    stream.detach(token);
    let seen = rec.values().len();
    assert!(seen >= 2);

    // past the grace window the interval task is gone
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(rec.values().len(), seen);
}
