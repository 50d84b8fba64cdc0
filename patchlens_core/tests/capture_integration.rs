use std::sync::Arc;
use std::thread;

use patchlens_core::{CaptureStore, ExecutionFrame, PushOutcome};

const METHOD: &str = "Verse.Pawn::Tick";

#[test]
fn capacity_three_keeps_the_newest_frames() {
    let store = CaptureStore::new(3);
    assert_eq!(store.attach(METHOD), None);

    for ts in 1..=5 {
        let frame = ExecutionFrame::new(ts, 0).with_parameter("tick", ts.to_string());
        assert_eq!(store.push(METHOD, frame), PushOutcome::Accepted);
    }

    let recent: Vec<i64> = store
        .recent_frames()
        .iter()
        .map(|frame| frame.timestamp_ms)
        .collect();
    assert_eq!(recent, vec![3, 4, 5]);
    assert_eq!(store.evicted(), 2);
    assert_eq!(
        store
            .latest_frame()
            .and_then(|frame| frame.parameters.get("tick").cloned())
            .as_deref(),
        Some("5")
    );

    assert!(store.detach());
    assert!(store.recent_frames().is_empty());
    assert!(store.latest_frame().is_none());
}

#[test]
fn frames_for_other_methods_are_dropped() {
    let store = CaptureStore::new(4);
    assert_eq!(
        store.push(METHOD, ExecutionFrame::new(1, 0)),
        PushOutcome::NotAttached
    );

    store.attach(METHOD);
    assert_eq!(
        store.push("Verse.Pawn::Other", ExecutionFrame::new(2, 0)),
        PushOutcome::WrongTarget
    );
    assert!(store.recent_frames().is_empty());

    assert_eq!(store.attach("Verse.Pawn::Other").as_deref(), Some(METHOD));
    assert_eq!(
        store.push("Verse.Pawn::Other", ExecutionFrame::new(3, 0x10)),
        PushOutcome::Accepted
    );
    assert_eq!(
        store.latest_frame().map(|frame| frame.instruction_offset),
        Some(0x10)
    );
}

#[test]
fn concurrent_producers_never_exceed_capacity() {
    let store = Arc::new(CaptureStore::new(8));
    store.attach(METHOD);

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for n in 0..50 {
                    store.push(METHOD, ExecutionFrame::new(worker * 1_000 + n, 0));
                    assert!(store.recent_frames().len() <= 8);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("producer thread");
    }

    assert_eq!(store.recent_frames().len(), 8);
    assert_eq!(store.evicted(), 200 - 8);
}
