// SPDX-License-Identifier: MIT

//! Conductor configuration
//!
//! Loaded from YAML; every field is optional. `MODEL_NAME` in the
//! environment overrides all model choices at once.

use crate::adk::error::{ConductorError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConductorConfig {
    /// Model behind the fixed planner worker
    pub planner_model: String,
    /// Model behind the fixed worker-generating orchestrator
    pub orchestrator_model: String,
    /// Model behind the validator's judge
    pub validator_model: String,
    /// Model for generated workers that do not name one
    pub default_worker_model: String,
    /// Executions per task before accepting the last output as-is
    pub max_attempts: u32,
    /// Deadline for a single executor call
    pub task_timeout_secs: u64,
    /// Cap on concurrently running tasks; unbounded when absent
    pub max_concurrency: Option<usize>,
    pub layout: LayoutConfig,
    /// Buffer size of the progress event channel
    pub event_capacity: usize,
    /// Address `serve` binds to, e.g. `127.0.0.1:8080`
    pub bind_address: String,
}

/// Spacing of the workflow visualization grid
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    pub horizontal_spacing: f64,
    pub vertical_spacing: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            horizontal_spacing: 300.0,
            vertical_spacing: 150.0,
        }
    }
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            planner_model: DEFAULT_MODEL.to_string(),
            orchestrator_model: DEFAULT_MODEL.to_string(),
            validator_model: DEFAULT_MODEL.to_string(),
            default_worker_model: DEFAULT_MODEL.to_string(),
            max_attempts: 3,
            task_timeout_secs: 300,
            max_concurrency: None,
            layout: LayoutConfig::default(),
            event_capacity: 1024,
            bind_address: "127.0.0.1:8080".to_string(),
        }
    }
}

impl ConductorConfig {
    /// Load from a YAML file, apply environment overrides and validate
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut config = Self::parse_yaml(&content)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn parse_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    fn apply_env(&mut self) {
        if let Ok(model) = env::var("MODEL_NAME") {
            self.override_models(&model);
        }
    }

    /// Use `model` for every role; blank values are ignored
    pub fn override_models(&mut self, model: &str) {
        let model = model.trim();
        if model.is_empty() {
            return;
        }
        log::info!("MODEL_NAME set, using '{}' for every role", model);
        self.planner_model = model.to_string();
        self.orchestrator_model = model.to_string();
        self.validator_model = model.to_string();
        self.default_worker_model = model.to_string();
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(ConductorError::config("max_attempts must be at least 1"));
        }
        if self.task_timeout_secs == 0 {
            return Err(ConductorError::config(
                "task_timeout_secs must be at least 1",
            ));
        }
        if self.max_concurrency == Some(0) {
            return Err(ConductorError::config(
                "max_concurrency must be at least 1 when set",
            ));
        }
        if self.layout.horizontal_spacing <= 0.0 || self.layout.vertical_spacing <= 0.0 {
            return Err(ConductorError::config("layout spacing must be positive"));
        }
        for (role, model) in [
            ("planner_model", &self.planner_model),
            ("orchestrator_model", &self.orchestrator_model),
            ("validator_model", &self.validator_model),
            ("default_worker_model", &self.default_worker_model),
        ] {
            if model.trim().is_empty() {
                return Err(ConductorError::config(format!("{} must not be empty", role)));
            }
        }
        self.socket_addr()?;
        Ok(())
    }

    /// `bind_address` as the socket `serve` listens on
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_address.parse().map_err(|e| {
            ConductorError::config(format!(
                "invalid bind_address '{}': {}",
                self.bind_address, e
            ))
        })
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }
}
