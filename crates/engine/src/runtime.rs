// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine runtime: lifecycle, control surface, and query surface
//!
//! The engine validates its configuration up front, owns the shared
//! pipeline state, and exposes the only supported ways to interact with
//! it: control calls, fault signals, snapshots, and event subscriptions.
//! All mutation is forwarded to the scheduler task.

use crate::error::RuntimeError;
use crate::scheduler::{Command, TickScheduler};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use turnwheel_core::{
    Clock, ControlOp, EventBus, EventPattern, EventReceiver, JitterBacklog, JitterProgress,
    Pipeline, PipelineConfig, PipelineSnapshot, ProgressPolicy, QueuePolicy, SubscriberId,
    Subscription, SystemClock,
};

/// The progression engine: one pipeline, one scheduler task
pub struct Engine<C: Clock, P, Q> {
    pipeline: Arc<Mutex<Pipeline>>,
    bus: EventBus,
    clock: C,
    progress: Arc<P>,
    queue: Arc<Q>,
    tick_interval: Duration,
    commands: mpsc::UnboundedSender<Command>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Engine<SystemClock, JitterProgress, JitterBacklog> {
    /// Engine with the system clock and the stochastic default policies
    pub fn with_defaults(config: PipelineConfig) -> Result<Self, RuntimeError> {
        Self::new(
            config,
            SystemClock,
            JitterProgress::default(),
            JitterBacklog::default(),
        )
    }
}

impl<C, P, Q> Engine<C, P, Q>
where
    C: Clock + 'static,
    P: ProgressPolicy + 'static,
    Q: QueuePolicy + 'static,
{
    /// Validate the configuration and build an idle engine.
    ///
    /// Nothing runs until `start`; construction is the only fallible step.
    pub fn new(
        config: PipelineConfig,
        clock: C,
        progress: P,
        queue: Q,
    ) -> Result<Self, RuntimeError> {
        config.validate()?;

        let pipeline = Pipeline::new(&config, &clock);
        let (tx, rx) = mpsc::unbounded_channel();

        Ok(Self {
            pipeline: Arc::new(Mutex::new(pipeline)),
            bus: EventBus::new(),
            clock,
            progress: Arc::new(progress),
            queue: Arc::new(queue),
            tick_interval: config.tick_interval,
            commands: tx,
            receiver: Mutex::new(Some(rx)),
            handle: Mutex::new(None),
        })
    }

    /// Start (or restart after pause/stop) the pipeline.
    ///
    /// The scheduler task is spawned on first use; calling start again is
    /// idempotent and never creates a second timer.
    pub fn start(&self) -> Result<(), RuntimeError> {
        self.spawn_scheduler()?;
        self.send(Command::Control(ControlOp::Start))
    }

    pub fn pause(&self) -> Result<(), RuntimeError> {
        self.send(Command::Control(ControlOp::Pause))
    }

    pub fn resume(&self) -> Result<(), RuntimeError> {
        self.send(Command::Control(ControlOp::Resume))
    }

    pub fn stop(&self) -> Result<(), RuntimeError> {
        self.send(Command::Control(ControlOp::Stop))
    }

    /// Externally mark the active stage as errored
    pub fn fail_active_stage(&self, reason: impl Into<String>) -> Result<(), RuntimeError> {
        self.send(Command::FailActive {
            reason: reason.into(),
        })
    }

    /// Retry the errored active stage, keeping its accumulated progress
    pub fn retry_stage(&self) -> Result<(), RuntimeError> {
        self.send(Command::RetryStage)
    }

    /// Skip the errored active stage and advance the pointer
    pub fn skip_stage(&self) -> Result<(), RuntimeError> {
        self.send(Command::SkipStage)
    }

    /// Take a deep, read-only copy of the current pipeline state
    pub fn snapshot(&self) -> PipelineSnapshot {
        self.pipeline
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .snapshot()
    }

    /// Subscribe to events matching patterns (e.g. "stage:*", "turn:completed")
    pub fn subscribe(&self, id: &str, patterns: Vec<&str>, description: &str) -> EventReceiver {
        let subscription = Subscription::new(
            id,
            patterns.into_iter().map(EventPattern::new).collect(),
            description,
        );
        self.bus.subscribe(subscription)
    }

    /// Subscribe to active-stage changes only: one event per pointer move
    /// (including rollovers), never one per tick.
    pub fn subscribe_active_stage(&self, id: &str) -> EventReceiver {
        self.subscribe(id, vec!["stage:activated"], "active stage watcher")
    }

    pub fn unsubscribe(&self, id: &str) {
        self.bus.unsubscribe(&SubscriberId(id.to_string()));
    }

    /// Stop the scheduler task and dispose of the engine.
    ///
    /// Further control calls return `ShutDown`; snapshots remain readable.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
        // Drop an unspawned receiver too, so later control calls fail fast
        self.receiver
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let handle = {
            let mut handle = self.handle.lock().unwrap_or_else(|e| e.into_inner());
            handle.take()
        };
        if let Some(handle) = handle {
            if let Err(error) = handle.await {
                tracing::warn!(%error, "scheduler task did not shut down cleanly");
            }
        }
    }

    fn spawn_scheduler(&self) -> Result<(), RuntimeError> {
        let mut handle = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        if handle.is_some() {
            return Ok(());
        }

        let receiver = {
            let mut receiver = self.receiver.lock().unwrap_or_else(|e| e.into_inner());
            receiver.take().ok_or(RuntimeError::ShutDown)?
        };

        let scheduler = TickScheduler {
            pipeline: Arc::clone(&self.pipeline),
            bus: self.bus.clone(),
            clock: self.clock.clone(),
            progress: Arc::clone(&self.progress),
            queue: Arc::clone(&self.queue),
            tick_interval: self.tick_interval,
            commands: receiver,
        };
        *handle = Some(tokio::spawn(scheduler.run()));
        tracing::debug!(interval = ?self.tick_interval, "scheduler task spawned");
        Ok(())
    }

    fn send(&self, command: Command) -> Result<(), RuntimeError> {
        self.commands
            .send(command)
            .map_err(|_| RuntimeError::ShutDown)
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
