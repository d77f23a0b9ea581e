//! Engine lifecycle: construction, control, turn progression, disposal

use crate::prelude::*;
use std::time::Duration;
use turnwheel_core::{
    FakeClock, FixedBacklog, FixedProgress, PipelineConfig, RunState, StageRegistry, StageSpec,
};
use turnwheel_engine::{Engine, RuntimeError};

#[test]
fn empty_registry_cannot_be_configured() {
    assert!(StageRegistry::new(vec![]).is_err());
}

#[test]
fn zero_interval_refuses_to_start() {
    let config = PipelineConfig::new(
        "bad",
        StageRegistry::new(vec![StageSpec::new("only", "Only")]).unwrap(),
    )
    .with_tick_interval(Duration::ZERO);

    let result = Engine::new(
        config,
        FakeClock::new(),
        FixedProgress::new(10.0),
        FixedBacklog::new(0),
    );
    assert!(matches!(result, Err(RuntimeError::Config(_))));
}

#[tokio::test]
async fn engine_runs_turns_until_paused() {
    let engine = fixed_engine(50.0);
    engine.start().unwrap();

    let snapshot = wait_for(&engine, "two completed turns", |s| s.total_turns >= 2).await;
    assert!(snapshot.current_turn >= 3);

    engine.pause().unwrap();
    let frozen = wait_for(&engine, "paused", |s| s.run_state == RunState::Paused).await;
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(engine.snapshot(), frozen);

    engine.shutdown().await;
}

#[tokio::test]
async fn backlog_drains_but_never_goes_negative() {
    // Initial backlog of 3, one drained per turn
    let engine = fixed_engine(100.0);
    engine.start().unwrap();

    let snapshot = wait_for(&engine, "six turns", |s| s.total_turns >= 6).await;
    assert_eq!(snapshot.queue_length, 0);

    engine.shutdown().await;
}

#[tokio::test]
async fn actor_labels_follow_the_rotation() {
    let engine = fixed_engine(100.0);
    let first = engine.snapshot();
    assert_eq!(first.stages[1].assigned_actor.as_deref(), Some("kestrel"));

    engine.start().unwrap();
    let second = wait_for(&engine, "turn two", |s| s.current_turn == 2).await;
    assert_eq!(second.stages[1].assigned_actor.as_deref(), Some("amber"));

    engine.shutdown().await;
}

#[tokio::test]
async fn stopped_engine_preserves_state_for_restart() {
    let engine = fixed_engine(10.0);
    engine.start().unwrap();
    wait_for(&engine, "progress", |s| {
        s.stages[0].progress > 0.0 || s.active_stage != Some(0)
    })
    .await;

    engine.stop().unwrap();
    let stopped = wait_for(&engine, "stopped", |s| s.run_state == RunState::Stopped).await;

    engine.start().unwrap();
    wait_for(&engine, "running past stop point", |s| {
        s.run_state == RunState::Running && s.total_turns >= stopped.total_turns
    })
    .await;

    engine.shutdown().await;
}

#[tokio::test]
async fn disposal_is_final() {
    let engine = fixed_engine(10.0);
    engine.start().unwrap();
    engine.shutdown().await;

    assert!(matches!(engine.start(), Err(RuntimeError::ShutDown)));
    assert!(matches!(engine.resume(), Err(RuntimeError::ShutDown)));
}
