// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only pipeline snapshots
//!
//! Snapshots are deep copies taken by value: nothing a consumer does with
//! one can reach back into controller state. Durations are flattened to
//! millisecond integers so the whole snapshot serializes plainly.

use crate::control::RunState;
use crate::pipeline::Pipeline;
use crate::stage::{StageState, StageStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read-only view of one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSnapshot {
    pub id: String,
    pub name: String,
    pub status: StageStatus,
    pub progress: f64,
    pub duration_ms: Option<u64>,
    pub assigned_actor: Option<String>,
}

impl StageSnapshot {
    pub fn is_error(&self) -> bool {
        matches!(self.status, StageStatus::Error { .. })
    }

    fn capture(stage: &StageState) -> Self {
        Self {
            id: stage.spec.id.clone(),
            name: stage.spec.name.clone(),
            status: stage.status.clone(),
            progress: stage.progress,
            duration_ms: stage.duration.map(|d| d.as_millis() as u64),
            assigned_actor: stage.assigned_actor.clone(),
        }
    }
}

/// Read-only view of the whole pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub id: String,
    pub current_turn: u64,
    pub total_turns: u64,
    pub queue_length: u32,
    pub average_processing_ms: Option<u64>,
    pub stages: Vec<StageSnapshot>,
    pub active_stage: Option<usize>,
    pub run_state: RunState,
    pub created_at: DateTime<Utc>,
}

impl PipelineSnapshot {
    pub fn capture(pipeline: &Pipeline) -> Self {
        Self {
            id: pipeline.id.clone(),
            current_turn: pipeline.current_turn,
            total_turns: pipeline.total_turns,
            queue_length: pipeline.queue_length,
            average_processing_ms: pipeline
                .average_processing_time
                .map(|d| d.as_millis() as u64),
            stages: pipeline.stages.iter().map(StageSnapshot::capture).collect(),
            active_stage: pipeline.active_stage,
            run_state: pipeline.run_state,
            created_at: pipeline.created_at,
        }
    }

    /// The snapshot of the processing stage, if any
    pub fn active(&self) -> Option<&StageSnapshot> {
        self.active_stage.and_then(|index| self.stages.get(index))
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
