// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effects and events for state machine orchestration
//!
//! Transitions never perform side effects; they return effects for the
//! runtime to execute. The only side effect this engine needs is event
//! emission.

use crate::control::RunState;
use serde::{Deserialize, Serialize};

/// Effects are side effects that state machines request
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Emit an event for other components to observe
    Emit(Event),
}

/// Events emitted by the pipeline state machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// The active pointer moved onto a stage. Emitted once per pointer
    /// move (including rollover), never per tick.
    StageActivated {
        pipeline: String,
        turn: u64,
        index: usize,
        stage: String,
    },
    StageCompleted {
        pipeline: String,
        turn: u64,
        index: usize,
        stage: String,
        duration_ms: Option<u64>,
    },
    StageFailed {
        pipeline: String,
        index: usize,
        stage: String,
        reason: String,
    },
    StageRetried {
        pipeline: String,
        index: usize,
        stage: String,
    },
    StageSkipped {
        pipeline: String,
        index: usize,
        stage: String,
    },
    TurnCompleted {
        pipeline: String,
        /// The turn that just finished
        turn: u64,
        queue_length: u32,
    },
    RunStateChanged {
        pipeline: String,
        from: RunState,
        to: RunState,
    },
}

impl Event {
    /// Stable `category:action` name used for pattern subscriptions
    pub fn name(&self) -> &'static str {
        match self {
            Event::StageActivated { .. } => "stage:activated",
            Event::StageCompleted { .. } => "stage:completed",
            Event::StageFailed { .. } => "stage:failed",
            Event::StageRetried { .. } => "stage:retried",
            Event::StageSkipped { .. } => "stage:skipped",
            Event::TurnCompleted { .. } => "turn:completed",
            Event::RunStateChanged { .. } => "control:changed",
        }
    }
}
