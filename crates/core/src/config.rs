// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline configuration and construction-time validation
//!
//! Configuration problems are the only hard failures in this crate; the
//! engine refuses to start rather than run with undefined stage semantics.

use crate::registry::StageRegistry;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("stage registry is empty")]
    EmptyRegistry,
    #[error("duplicate stage id: {0}")]
    DuplicateStageId(String),
    #[error("tick interval must be positive")]
    ZeroTickInterval,
}

/// Configuration for one pipeline instance
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Host-chosen identifier, carried on every event
    pub id: String,
    pub registry: StageRegistry,
    /// Cadence of the tick scheduler
    pub tick_interval: Duration,
    /// Starting backlog counter
    pub initial_queue_length: u32,
    /// Opaque actor labels rotated across actor-bearing stages; may be empty
    pub actors: Vec<String>,
}

impl PipelineConfig {
    pub fn new(id: impl Into<String>, registry: StageRegistry) -> Self {
        Self {
            id: id.into(),
            registry,
            tick_interval: Duration::from_millis(500),
            initial_queue_length: 0,
            actors: Vec::new(),
        }
    }

    pub fn with_tick_interval(self, tick_interval: Duration) -> Self {
        Self {
            tick_interval,
            ..self
        }
    }

    pub fn with_initial_queue_length(self, initial_queue_length: u32) -> Self {
        Self {
            initial_queue_length,
            ..self
        }
    }

    pub fn with_actors(self, actors: Vec<String>) -> Self {
        Self { actors, ..self }
    }

    /// Validate fatal construction-time conditions
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.registry.is_empty() {
            return Err(ConfigError::EmptyRegistry);
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::ZeroTickInterval);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
