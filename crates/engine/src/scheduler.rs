// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tick scheduler: the single writer of pipeline state
//!
//! The scheduler task drives `Tick` transitions at a fixed cadence while
//! the pipeline is running, and otherwise parks on the command channel.
//! Commands (control intents, fault signals) are applied in arrival order
//! and take effect before the next tick; nothing else ever mutates the
//! shared pipeline.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use turnwheel_core::{
    Clock, ControlOp, Effect, EventBus, Pipeline, PipelineEvent, ProgressPolicy, QueuePolicy,
};

/// Mutating requests routed through the scheduler task
#[derive(Debug)]
pub(crate) enum Command {
    Control(ControlOp),
    FailActive { reason: String },
    RetryStage,
    SkipStage,
    Shutdown,
}

impl Command {
    fn into_event(self) -> Option<PipelineEvent> {
        match self {
            Command::Control(op) => Some(PipelineEvent::Control { op }),
            Command::FailActive { reason } => Some(PipelineEvent::StageError { reason }),
            Command::RetryStage => Some(PipelineEvent::StageRetry),
            Command::SkipStage => Some(PipelineEvent::StageSkip),
            Command::Shutdown => None,
        }
    }
}

/// What woke the running loop
enum Wake {
    Command(Option<Command>),
    Tick,
}

pub(crate) struct TickScheduler<C, P, Q> {
    pub(crate) pipeline: Arc<Mutex<Pipeline>>,
    pub(crate) bus: EventBus,
    pub(crate) clock: C,
    pub(crate) progress: Arc<P>,
    pub(crate) queue: Arc<Q>,
    pub(crate) tick_interval: Duration,
    pub(crate) commands: mpsc::UnboundedReceiver<Command>,
}

impl<C, P, Q> TickScheduler<C, P, Q>
where
    C: Clock,
    P: ProgressPolicy,
    Q: QueuePolicy,
{
    pub(crate) async fn run(mut self) {
        loop {
            if self.is_running() {
                // Fresh cadence on every entry into running; the resume
                // reset already happened inside the control transition.
                let mut interval = time::interval_at(
                    time::Instant::now() + self.tick_interval,
                    self.tick_interval,
                );
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

                loop {
                    let wake = tokio::select! {
                        biased;
                        command = self.commands.recv() => Wake::Command(command),
                        _ = interval.tick() => Wake::Tick,
                    };

                    match wake {
                        Wake::Command(command) => {
                            let Some(command) = command else { return };
                            let Some(event) = command.into_event() else { return };
                            self.apply(event);
                            if !self.is_running() {
                                break;
                            }
                        }
                        Wake::Tick => self.apply(PipelineEvent::Tick),
                    }
                }
            } else {
                // Suspended: no timer exists until the next start/resume
                let Some(command) = self.commands.recv().await else {
                    return;
                };
                let Some(event) = command.into_event() else { return };
                self.apply(event);
            }
        }
    }

    fn is_running(&self) -> bool {
        self.pipeline
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .run_state
            .is_running()
    }

    fn apply(&self, event: PipelineEvent) {
        let effects = {
            let mut pipeline = self.pipeline.lock().unwrap_or_else(|e| e.into_inner());
            let (next, effects) =
                pipeline.transition(event, &self.clock, &*self.progress, &*self.queue);
            *pipeline = next;
            effects
        };

        for effect in effects {
            match effect {
                Effect::Emit(event) => {
                    tracing::info!(event = event.name(), "event emitted");
                    self.bus.publish(&event);
                }
            }
        }
    }
}
