// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline controller state machine
//!
//! Owns the ordered stage states for the current turn, the active-stage
//! pointer, and the turn-level counters. All mutation goes through
//! `transition`, which is pure: it returns the next state plus the effects
//! to execute. At most one stage is processing at any observable instant;
//! stages before the pointer are completed, stages after it are queued.

use crate::clock::Clock;
use crate::config::PipelineConfig;
use crate::control::{ControlOp, RunState};
use crate::effect::{Effect, Event};
use crate::policy::{ProgressPolicy, QueuePolicy};
use crate::registry::StageRegistry;
use crate::snapshot::PipelineSnapshot;
use crate::stage::StageState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

/// Completed-stage durations kept for the rolling average
const AVERAGE_WINDOW: usize = 16;

/// Events that can change pipeline state
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// One scheduler tick; a no-op unless the run state is running
    Tick,
    /// Control operation from the external run-state owner
    Control { op: ControlOp },
    /// External error signal for the active stage
    StageError { reason: String },
    /// External retry of the errored active stage
    StageRetry,
    /// External skip of the errored active stage
    StageSkip,
}

/// The whole progression engine instance for one session
#[derive(Debug, Clone, Serialize)]
pub struct Pipeline {
    pub id: String,
    /// 1-based; increments once per completed turn
    pub current_turn: u64,
    /// Turns completed this session
    pub total_turns: u64,
    /// Abstract backlog counter, adjusted only at rollover
    pub queue_length: u32,
    /// Rolling mean over recently completed stage durations
    #[serde(with = "crate::stage::duration_ms")]
    pub average_processing_time: Option<Duration>,
    /// One entry per registry stage, rebuilt at each rollover
    pub stages: Vec<StageState>,
    /// Index of the processing stage; None transiently when a turn is done
    pub active_stage: Option<usize>,
    pub run_state: RunState,
    pub created_at: DateTime<Utc>,
    registry: StageRegistry,
    /// Opaque actor labels rotated across actor-bearing stages
    actors: Vec<String>,
    #[serde(skip)]
    recent_durations: VecDeque<Duration>,
}

impl Pipeline {
    /// Create a pipeline for its first turn: stage 0 processing at zero
    /// progress, everything else queued, idle until started.
    pub fn new(config: &PipelineConfig, clock: &impl Clock) -> Self {
        let mut pipeline = Self {
            id: config.id.clone(),
            current_turn: 1,
            total_turns: 0,
            queue_length: config.initial_queue_length,
            average_processing_time: None,
            stages: build_stages(&config.registry, &config.actors, 1),
            active_stage: None,
            run_state: RunState::Idle,
            created_at: Utc::now(),
            registry: config.registry.clone(),
            actors: config.actors.clone(),
            recent_durations: VecDeque::new(),
        };
        if let Some(first) = pipeline.stages.first_mut() {
            first.activate(0.0, clock);
            pipeline.active_stage = Some(0);
        }
        pipeline
    }

    /// Pure transition function - returns new state and effects
    pub fn transition(
        &self,
        event: PipelineEvent,
        clock: &impl Clock,
        progress: &impl ProgressPolicy,
        queue: &impl QueuePolicy,
    ) -> (Pipeline, Vec<Effect>) {
        match event {
            PipelineEvent::Tick => self.tick(clock, progress, queue),
            PipelineEvent::Control { op } => self.control(op, clock, progress, queue),
            PipelineEvent::StageError { reason } => self.stage_error(reason),
            PipelineEvent::StageRetry => self.stage_retry(),
            PipelineEvent::StageSkip => self.stage_skip(clock, progress, queue),
        }
    }

    /// Take a deep, read-only copy for consumers
    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot::capture(self)
    }

    /// One progression step: accumulate progress on the active stage,
    /// finalize it at 100, and roll the turn over when the last stage
    /// completes. Stage completion and rollover are atomic within the call.
    fn tick(
        &self,
        clock: &impl Clock,
        progress: &impl ProgressPolicy,
        queue: &impl QueuePolicy,
    ) -> (Pipeline, Vec<Effect>) {
        if !self.run_state.is_running() {
            return (self.clone(), vec![]);
        }

        let mut next = self.clone();
        let mut effects = Vec::new();

        let Some(index) = next.active_stage else {
            // Scheduling latency: bring up the next runnable stage this
            // tick, start accumulating progress on the following one.
            next.schedule_next(clock, progress, queue, &mut effects);
            return (next, effects);
        };

        let reached_end = match next.stages.get_mut(index) {
            Some(stage) if stage.is_processing() => {
                stage.apply_increment(progress.next_increment())
            }
            // An errored stage blocks here until an external retry/skip
            _ => false,
        };

        if reached_end {
            next.finalize_stage(index, clock, &mut effects);
            if index + 1 < next.stages.len() {
                next.activate_stage(index + 1, progress.initial_progress(), clock, &mut effects);
            } else {
                next.rollover(clock, progress, queue, &mut effects);
            }
        }

        (next, effects)
    }

    fn control(
        &self,
        op: ControlOp,
        clock: &impl Clock,
        progress: &impl ProgressPolicy,
        queue: &impl QueuePolicy,
    ) -> (Pipeline, Vec<Effect>) {
        let new_state = self.run_state.apply(op);
        if new_state == self.run_state {
            // Duplicate and invalid control ops are no-ops
            return (self.clone(), vec![]);
        }

        let mut next = self.clone();
        let mut effects = Vec::new();
        next.run_state = new_state;
        effects.push(Effect::Emit(Event::RunStateChanged {
            pipeline: self.id.clone(),
            from: self.run_state,
            to: new_state,
        }));

        // Resume reset: entering running must leave a stage processing
        // right away rather than waiting a full tick interval.
        if new_state.is_running() && !next.stages.iter().any(StageState::is_processing) {
            next.schedule_next(clock, progress, queue, &mut effects);
        }

        (next, effects)
    }

    fn stage_error(&self, reason: String) -> (Pipeline, Vec<Effect>) {
        let Some(index) = self.active_stage else {
            return (self.clone(), vec![]);
        };

        let mut next = self.clone();
        let Some(stage) = next.stages.get_mut(index) else {
            return (self.clone(), vec![]);
        };
        if !stage.is_processing() {
            return (self.clone(), vec![]);
        }

        stage.fail(reason.clone());
        let stage_id = stage.spec.id.clone();
        let effects = vec![Effect::Emit(Event::StageFailed {
            pipeline: next.id.clone(),
            index,
            stage: stage_id,
            reason,
        })];
        (next, effects)
    }

    fn stage_retry(&self) -> (Pipeline, Vec<Effect>) {
        let Some(index) = self.active_stage else {
            return (self.clone(), vec![]);
        };

        let mut next = self.clone();
        let Some(stage) = next.stages.get_mut(index) else {
            return (self.clone(), vec![]);
        };
        if !stage.is_error() {
            return (self.clone(), vec![]);
        }

        stage.retry();
        let stage_id = stage.spec.id.clone();
        let effects = vec![Effect::Emit(Event::StageRetried {
            pipeline: next.id.clone(),
            index,
            stage: stage_id,
        })];
        (next, effects)
    }

    fn stage_skip(
        &self,
        clock: &impl Clock,
        progress: &impl ProgressPolicy,
        queue: &impl QueuePolicy,
    ) -> (Pipeline, Vec<Effect>) {
        let Some(index) = self.active_stage else {
            return (self.clone(), vec![]);
        };

        let mut next = self.clone();
        let mut effects = Vec::new();
        {
            let Some(stage) = next.stages.get_mut(index) else {
                return (self.clone(), vec![]);
            };
            if !stage.is_error() {
                return (self.clone(), vec![]);
            }
            stage.skip();
            effects.push(Effect::Emit(Event::StageSkipped {
                pipeline: next.id.clone(),
                index,
                stage: stage.spec.id.clone(),
            }));
        }

        if index + 1 < next.stages.len() {
            next.activate_stage(index + 1, progress.initial_progress(), clock, &mut effects);
        } else {
            next.rollover(clock, progress, queue, &mut effects);
        }

        (next, effects)
    }

    /// Activate the first queued stage, or roll over if the turn is done.
    /// An errored stage blocks both paths until externally cleared.
    fn schedule_next(
        &mut self,
        clock: &impl Clock,
        progress: &impl ProgressPolicy,
        queue: &impl QueuePolicy,
        effects: &mut Vec<Effect>,
    ) {
        if self.stages.iter().any(StageState::is_error) {
            return;
        }
        if let Some(index) = self.stages.iter().position(StageState::is_queued) {
            self.activate_stage(index, progress.initial_progress(), clock, effects);
        } else if self.stages.iter().all(StageState::is_completed) {
            self.rollover(clock, progress, queue, effects);
        }
    }

    fn activate_stage(
        &mut self,
        index: usize,
        initial_progress: f64,
        clock: &impl Clock,
        effects: &mut Vec<Effect>,
    ) {
        let Some(stage) = self.stages.get_mut(index) else {
            return;
        };
        stage.activate(initial_progress, clock);
        let stage_id = stage.spec.id.clone();
        self.active_stage = Some(index);
        effects.push(Effect::Emit(Event::StageActivated {
            pipeline: self.id.clone(),
            turn: self.current_turn,
            index,
            stage: stage_id,
        }));
    }

    fn finalize_stage(&mut self, index: usize, clock: &impl Clock, effects: &mut Vec<Effect>) {
        let Some(stage) = self.stages.get_mut(index) else {
            return;
        };
        stage.complete(clock);
        let duration = stage.duration;
        let stage_id = stage.spec.id.clone();
        self.record_duration(duration);
        effects.push(Effect::Emit(Event::StageCompleted {
            pipeline: self.id.clone(),
            turn: self.current_turn,
            index,
            stage: stage_id,
            duration_ms: duration.map(|d| d.as_millis() as u64),
        }));
    }

    /// Turn rollover: bump counters, adjust the backlog, rebuild stages
    /// from the registry, and activate stage 0 for the next turn.
    fn rollover(
        &mut self,
        clock: &impl Clock,
        progress: &impl ProgressPolicy,
        queue: &impl QueuePolicy,
        effects: &mut Vec<Effect>,
    ) {
        let finished_turn = self.current_turn;
        self.total_turns += 1;
        self.queue_length = apply_queue_delta(self.queue_length, queue.rollover_delta(finished_turn));
        self.current_turn += 1;
        self.stages = build_stages(&self.registry, &self.actors, self.current_turn);
        self.active_stage = None;

        effects.push(Effect::Emit(Event::TurnCompleted {
            pipeline: self.id.clone(),
            turn: finished_turn,
            queue_length: self.queue_length,
        }));

        self.activate_stage(0, progress.initial_progress(), clock, effects);
    }

    fn record_duration(&mut self, duration: Option<Duration>) {
        let Some(duration) = duration else {
            return;
        };
        self.recent_durations.push_back(duration);
        while self.recent_durations.len() > AVERAGE_WINDOW {
            self.recent_durations.pop_front();
        }
        let total: Duration = self.recent_durations.iter().sum();
        self.average_processing_time = Some(total / self.recent_durations.len() as u32);
    }
}

/// Fresh queued stages from the registry, with actor labels rotated by turn
fn build_stages(registry: &StageRegistry, actors: &[String], turn: u64) -> Vec<StageState> {
    registry
        .iter()
        .enumerate()
        .map(|(position, spec)| {
            let mut stage = StageState::queued(spec.clone());
            if spec.actor_bearing && !actors.is_empty() {
                let offset = (turn - 1) as usize + position;
                stage.assigned_actor = Some(actors[offset % actors.len()].clone());
            }
            stage
        })
        .collect()
}

/// Saturating backlog arithmetic; the counter never goes negative
fn apply_queue_delta(length: u32, delta: i32) -> u32 {
    if delta >= 0 {
        length.saturating_add(delta as u32)
    } else {
        length.saturating_sub(delta.unsigned_abs())
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
