// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run-state control
//!
//! The run state is owned by an external control collaborator; this module
//! only defines the states, the operations, and the transition table. All
//! invalid or duplicate operations are no-ops, never errors.

use serde::{Deserialize, Serialize};

/// Externally controlled mode gating tick effects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// Constructed but never started
    Idle,
    /// Ticks advance the pipeline
    Running,
    /// Ticks are suspended; state is frozen
    Paused,
    /// Ticks are suspended; a later start may revive the pipeline
    Stopped,
}

/// Control operations issued by the external run-state owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlOp {
    Start,
    Pause,
    Resume,
    Stop,
}

impl RunState {
    /// Apply a control operation; duplicates and invalid ops are no-ops.
    ///
    /// `Resume` only leaves `Paused`; `Start` leaves any non-running state.
    pub fn apply(self, op: ControlOp) -> RunState {
        match (self, op) {
            (_, ControlOp::Stop) => RunState::Stopped,
            (_, ControlOp::Start) => RunState::Running,
            (RunState::Running, ControlOp::Pause) => RunState::Paused,
            (RunState::Paused, ControlOp::Resume) => RunState::Running,
            (state, _) => state,
        }
    }

    pub fn is_running(self) -> bool {
        self == RunState::Running
    }

    pub fn name(self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Paused => "paused",
            RunState::Stopped => "stopped",
        }
    }
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
