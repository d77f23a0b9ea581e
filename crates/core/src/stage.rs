// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-stage progress state machine
//!
//! A stage moves `queued -> processing -> completed`, with `error` as a
//! terminal side exit that only an external retry or skip can leave.
//! Progress is a percentage: monotone while processing, clamped to 100,
//! frozen at exactly 100 on completion.

use crate::clock::Clock;
use crate::registry::StageSpec;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Status of one stage within a turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageStatus {
    /// Waiting for the active pointer to reach this stage
    Queued,
    /// Actively accumulating progress
    Processing,
    /// Finished; progress frozen at 100
    Completed,
    /// Externally failed; blocks automatic advancement at this index
    Error { reason: String },
}

impl StageStatus {
    pub fn name(&self) -> &'static str {
        match self {
            StageStatus::Queued => "queued",
            StageStatus::Processing => "processing",
            StageStatus::Completed => "completed",
            StageStatus::Error { .. } => "error",
        }
    }
}

/// Mutable per-turn state for one stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageState {
    pub spec: StageSpec,
    pub status: StageStatus,
    /// Percentage in [0, 100]; meaningful while processing
    pub progress: f64,
    /// Elapsed processing time, set only on completion
    #[serde(with = "duration_ms", default)]
    pub duration: Option<Duration>,
    /// Actor label, set only for actor-bearing stages
    pub assigned_actor: Option<String>,
    #[serde(skip)]
    started_at: Option<Instant>,
}

impl StageState {
    /// Create a queued stage from its definition
    pub fn queued(spec: StageSpec) -> Self {
        Self {
            spec,
            status: StageStatus::Queued,
            progress: 0.0,
            duration: None,
            assigned_actor: None,
            started_at: None,
        }
    }

    /// Transition `queued -> processing` at the given starting progress
    pub fn activate(&mut self, initial_progress: f64, clock: &impl Clock) {
        self.status = StageStatus::Processing;
        self.progress = initial_progress.clamp(0.0, 100.0);
        self.started_at = Some(clock.now());
    }

    /// Apply a progress increment, clamped to 100; never decreases.
    ///
    /// Returns true when the stage has reached 100 and is ready to complete.
    pub fn apply_increment(&mut self, increment: f64) -> bool {
        let increment = increment.max(0.0);
        self.progress = (self.progress + increment).min(100.0);
        self.progress >= 100.0
    }

    /// Transition `processing -> completed`, snapping progress to exactly
    /// 100 and recording the elapsed duration.
    pub fn complete(&mut self, clock: &impl Clock) {
        self.progress = 100.0;
        self.status = StageStatus::Completed;
        self.duration = self.started_at.map(|started| clock.now() - started);
    }

    /// Transition `processing -> error` on an external error signal
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = StageStatus::Error {
            reason: reason.into(),
        };
    }

    /// Transition `error -> processing`, retaining accumulated progress
    pub fn retry(&mut self) {
        self.status = StageStatus::Processing;
    }

    /// Force-complete an errored stage without a recorded duration
    pub fn skip(&mut self) {
        self.progress = 100.0;
        self.status = StageStatus::Completed;
        self.duration = None;
    }

    pub fn is_processing(&self) -> bool {
        self.status == StageStatus::Processing
    }

    pub fn is_completed(&self) -> bool {
        self.status == StageStatus::Completed
    }

    pub fn is_queued(&self) -> bool {
        self.status == StageStatus::Queued
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, StageStatus::Error { .. })
    }
}

pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}

#[cfg(test)]
#[path = "stage_tests.rs"]
mod tests;
