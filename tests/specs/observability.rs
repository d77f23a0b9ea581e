//! Snapshots and subscriptions: what consumers can observe, and what they
//! cannot touch

use crate::prelude::*;
use std::time::Duration;
use tokio::time::timeout;
use turnwheel_core::{Event, RunState, StageStatus};

#[tokio::test]
async fn snapshots_are_isolated_deep_copies() {
    let engine = fixed_engine(50.0);

    let mut tampered = engine.snapshot();
    tampered.queue_length = 4096;
    tampered.stages.clear();

    let fresh = engine.snapshot();
    assert_eq!(fresh.queue_length, 3);
    assert_eq!(fresh.stages.len(), 3);

    engine.shutdown().await;
}

#[tokio::test]
async fn snapshots_serialize_for_downstream_consumers() {
    let engine = fixed_engine(50.0);
    let snapshot = engine.snapshot();

    let json = serde_json::to_string(&snapshot).unwrap();
    assert!(json.contains("\"spec-pipeline\""));
    assert!(json.contains("\"layout\""));

    engine.shutdown().await;
}

#[tokio::test]
async fn active_stage_subscriber_sees_each_pointer_move_once() {
    let engine = fixed_engine(50.0);
    let mut rx = engine.subscribe_active_stage("ui");
    engine.start().unwrap();

    // First turn: pointer moves 0 -> 1 -> 2, then rollover back to 0
    let mut indices = Vec::new();
    for _ in 0..3 {
        let event = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no activation within deadline")
            .expect("bus closed");
        if let Event::StageActivated { index, .. } = event {
            indices.push(index);
        }
    }
    assert_eq!(indices, vec![1, 2, 0]);

    engine.shutdown().await;
}

#[tokio::test]
async fn turn_subscriber_only_sees_turn_events() {
    let engine = fixed_engine(50.0);
    let mut rx = engine.subscribe("counter", vec!["turn:completed"], "turn counter");
    engine.start().unwrap();

    let event = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("no turn event within deadline")
        .expect("bus closed");
    match event {
        Event::TurnCompleted { turn, .. } => assert_eq!(turn, 1),
        other => panic!("unexpected event: {other:?}"),
    }

    engine.shutdown().await;
}

#[tokio::test]
async fn stage_error_is_visible_until_cleared() {
    let engine = fixed_engine(0.0);
    let mut rx = engine.subscribe("faults", vec!["stage:failed", "stage:retried"], "faults");
    engine.start().unwrap();
    wait_for(&engine, "running", |s| s.run_state == RunState::Running).await;

    engine.fail_active_stage("renderer died").unwrap();
    let snapshot = wait_for(&engine, "error visible", |s| s.stages[0].is_error()).await;
    assert!(matches!(
        snapshot.stages[0].status,
        StageStatus::Error { ref reason } if reason == "renderer died"
    ));

    let event = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("no failure event")
        .expect("bus closed");
    assert_eq!(event.name(), "stage:failed");

    engine.retry_stage().unwrap();
    wait_for(&engine, "processing again", |s| {
        s.stages[0].status == StageStatus::Processing
    })
    .await;

    let event = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("no retry event")
        .expect("bus closed");
    assert_eq!(event.name(), "stage:retried");

    engine.shutdown().await;
}

#[tokio::test]
async fn unsubscribe_stops_the_feed() {
    let engine = fixed_engine(50.0);
    let mut rx = engine.subscribe("short-lived", vec!["*"], "everything");
    engine.unsubscribe("short-lived");

    engine.start().unwrap();
    wait_for(&engine, "a turn", |s| s.total_turns >= 1).await;

    // Channel closed rather than accumulating events
    assert!(rx.recv().await.is_none());

    engine.shutdown().await;
}
