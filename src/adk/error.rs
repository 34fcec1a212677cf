// SPDX-License-Identifier: MIT

//! Typed error handling for kinetic-conductor
//!
//! Agents and models keep the `Box<dyn Error + Send + Sync>` boundary so that
//! adapters stay easy to write; everything above them (planning, scheduling,
//! persistence) speaks `ConductorError`.

use thiserror::Error;

/// Result alias used throughout the orchestration engine
pub type Result<T> = std::result::Result<T, ConductorError>;

/// Top-level error type for kinetic-conductor
#[derive(Debug, Error)]
pub enum ConductorError {
    /// API errors from external services (model providers)
    #[error("API error from {provider}: {message}")]
    Api { provider: String, message: String },

    /// Configuration errors (missing env vars, invalid config)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Planning-phase errors: malformed plans, cycles, roster mismatches
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    /// Wave scheduler errors
    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    /// Model/LLM errors
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// A record was not found in the store
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// An execution was asked to do something its status forbids
    #[error("Execution '{id}' is {status}, expected {expected}")]
    InvalidState {
        id: String,
        status: String,
        expected: String,
    },

    /// Another run/resume is already driving this execution
    #[error("Execution '{0}' is already being driven")]
    ExecutionBusy(String),

    /// An executor call exceeded its deadline
    #[error("Worker '{worker}' timed out after {secs}s")]
    Timeout { worker: String, secs: u64 },

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Generic error wrapper for compatibility
    #[error("{0}")]
    Other(String),
}

/// Errors raised while turning a request into an executable plan
#[derive(Debug, Error)]
pub enum PlanError {
    /// Planner/orchestrator output could not be deserialized
    #[error("Failed to parse {what}: {message}")]
    Parse { what: &'static str, message: String },

    /// The planner produced no tasks
    #[error("Plan contains no tasks")]
    Empty,

    /// A dependency cycle runs through the given task index
    #[error("Circular dependency detected at task {index}")]
    Cycle { index: usize },

    /// A dependency index points outside the task list
    #[error("Task {task} depends on unknown task index {dependency}")]
    InvalidDependency { task: usize, dependency: usize },

    /// Plan and generated worker roster are not the same length
    #[error("Plan has {tasks} tasks but {workers} workers were generated")]
    WorkerCountMismatch { tasks: usize, workers: usize },

    /// A paused execution is missing part of the state needed to resume
    #[error("Paused execution is missing {0}")]
    MissingResumeState(&'static str),
}

/// Errors raised by the wave scheduler
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Nothing is ready and nothing is running, yet tasks remain
    #[error("Deadlock detected: {completed}/{total} tasks completed and none can start")]
    Deadlock { completed: usize, total: usize },

    /// A task's execution failed and the run was aborted
    #[error("Task {index} failed: {message}")]
    TaskFailed { index: usize, message: String },
}

/// Model/LLM-specific errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// API key not configured
    #[error("API key not configured for provider: {0}")]
    ApiKeyMissing(String),

    /// Provider not supported
    #[error("Model provider not supported: {0}")]
    UnsupportedProvider(String),

    /// Invalid response from model
    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),
}

impl ConductorError {
    /// Create an API error
    pub fn api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a not-found error for a record kind
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl PlanError {
    pub fn parse(what: &'static str, message: impl Into<String>) -> Self {
        Self::Parse {
            what,
            message: message.into(),
        }
    }
}

impl From<&str> for ConductorError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for ConductorError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

// Agents and models surface boxed errors; recover the typed ones
impl From<Box<dyn std::error::Error + Send + Sync>> for ConductorError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        let err = match err.downcast::<ConductorError>() {
            Ok(err) => return *err,
            Err(err) => err,
        };
        match err.downcast::<ModelError>() {
            Ok(err) => Self::Model(*err),
            Err(err) => Self::Other(err.to_string()),
        }
    }
}
