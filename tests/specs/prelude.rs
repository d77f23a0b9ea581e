//! Shared helpers for the behavioral specs

use std::time::Duration;
use tokio::time::{sleep, timeout};
use turnwheel_core::{
    Clock, FakeClock, FixedBacklog, FixedProgress, PipelineConfig, PipelineSnapshot,
    ProgressPolicy, QueuePolicy, StageRegistry, StageSpec,
};
use turnwheel_engine::Engine;

pub fn registry() -> StageRegistry {
    StageRegistry::new(vec![
        StageSpec::new("layout", "Layout"),
        StageSpec::new("dialog", "Dialog").with_actor(),
        StageSpec::new("render", "Render"),
    ])
    .unwrap()
}

pub fn config() -> PipelineConfig {
    PipelineConfig::new("spec-pipeline", registry())
        .with_tick_interval(Duration::from_millis(5))
        .with_initial_queue_length(3)
        .with_actors(vec!["amber".to_string(), "kestrel".to_string()])
}

pub fn fixed_engine(step: f64) -> Engine<FakeClock, FixedProgress, FixedBacklog> {
    Engine::new(
        config(),
        FakeClock::new(),
        FixedProgress::new(step),
        FixedBacklog::new(-1),
    )
    .unwrap()
}

/// Poll snapshots until the predicate holds or a two-second deadline passes
pub async fn wait_for<C, P, Q>(
    engine: &Engine<C, P, Q>,
    what: &str,
    predicate: impl Fn(&PipelineSnapshot) -> bool,
) -> PipelineSnapshot
where
    C: Clock + 'static,
    P: ProgressPolicy + 'static,
    Q: QueuePolicy + 'static,
{
    let poll = async {
        loop {
            let snapshot = engine.snapshot();
            if predicate(&snapshot) {
                return snapshot;
            }
            sleep(Duration::from_millis(2)).await;
        }
    };
    match timeout(Duration::from_secs(2), poll).await {
        Ok(snapshot) => snapshot,
        Err(_) => panic!("timed out waiting for {what}: {:?}", engine.snapshot()),
    }
}
