// SPDX-License-Identifier: MIT

//! Record and plan types shared by the orchestration engine
//!
//! Plan-side types (`TaskSpec`, `Plan`, `WorkerSpec`, `ValidationResult`)
//! derive `JsonSchema` so the exact shape the parser accepts can be shown to
//! the models that produce them.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::adk::model::GenerationConfig;

/// Anything that names its prerequisites by position in a shared list
pub trait Dependent {
    /// Zero-based indices of the entries this one waits for
    fn dependencies(&self) -> &[usize];
}

/// A pre-execution plan item
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct TaskSpec {
    /// Short name of the sub-task
    pub title: String,
    /// What the sub-task must produce
    pub description: String,
    /// Zero-based indices of tasks in the same plan that must finish first
    #[serde(default)]
    pub dependencies: Vec<usize>,
}

impl Dependent for TaskSpec {
    fn dependencies(&self) -> &[usize] {
        &self.dependencies
    }
}

/// Structured breakdown of a request into dependent sub-tasks
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Plan {
    /// How the sub-tasks add up to the whole request
    pub overall_strategy: String,
    /// Sub-tasks, in the order their dependency indices refer to
    pub tasks: Vec<TaskSpec>,
}

/// Sampling knobs a generated worker may ask for
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
pub struct WorkerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl From<&WorkerConfig> for GenerationConfig {
    fn from(config: &WorkerConfig) -> Self {
        GenerationConfig {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            ..Default::default()
        }
    }
}

/// A worker as described by the orchestrator model, before it gets an id
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct WorkerSpec {
    /// Human-readable name of the specialised worker
    pub name: String,
    /// Model to run the worker on; the configured default when omitted
    #[serde(default)]
    pub model: Option<String>,
    /// Instructions that specialise the worker for its task
    pub system_prompt: String,
    /// Optional prompt wrapper; `{{input}}` is replaced with the task input
    #[serde(default)]
    pub user_prompt_template: Option<String>,
    #[serde(default)]
    pub config: WorkerConfig,
}

/// A generated, specialised executor bound to one execution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Worker {
    pub id: String,
    pub execution_id: String,
    pub name: String,
    pub model: String,
    pub system_prompt: String,
    pub user_prompt_template: Option<String>,
    pub config: WorkerConfig,
    pub created_at: DateTime<Utc>,
}

impl Worker {
    pub fn from_spec(execution_id: &str, spec: WorkerSpec, default_model: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            execution_id: execution_id.to_string(),
            name: spec.name,
            model: spec.model.unwrap_or_else(|| default_model.to_string()),
            system_prompt: spec.system_prompt,
            user_prompt_template: spec.user_prompt_template,
            config: spec.config,
            created_at: Utc::now(),
        }
    }

    /// Render the prompt sent to the worker for a given task input
    pub fn render_prompt(&self, input: &str) -> String {
        match &self.user_prompt_template {
            Some(template) if template.contains("{{input}}") => {
                template.replace("{{input}}", input)
            }
            Some(template) => format!("{}\n\n{}", template, input),
            None => input.to_string(),
        }
    }
}

/// Lifecycle of a runtime task
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// A runtime task, one per plan entry once an execution resumes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,
    pub execution_id: String,
    pub worker_id: Option<String>,
    pub title: String,
    pub description: String,
    pub input: String,
    pub output: Option<String>,
    pub status: TaskStatus,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(
        execution_id: &str,
        worker_id: Option<&str>,
        title: impl Into<String>,
        description: impl Into<String>,
        input: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            execution_id: execution_id.to_string(),
            worker_id: worker_id.map(str::to_string),
            title: title.into(),
            description: description.into(),
            input: input.into(),
            output: None,
            status: TaskStatus::Pending,
            attempts: 0,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn complete(&mut self, output: String) {
        self.output = Some(output);
        self.status = TaskStatus::Completed;
        self.completed_at = Some(Utc::now());
    }
}

/// Lifecycle of an execution
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Draft,
    Running,
    Paused,
    Completed,
    Failed,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStatus::Draft => "draft",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Paused => "paused",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One end-to-end run of the orchestrator for a single request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Execution {
    pub id: String,
    pub status: ExecutionStatus,
    /// The original request text
    pub input: String,
    /// Final results, the paused plan + roster, or the failure message
    pub output: Option<serde_json::Value>,
    pub workflow_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Execution {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: ExecutionStatus::Draft,
            input: input.into(),
            output: None,
            workflow_id: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// What a validator is judging
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ValidationKind {
    Plan,
    Task,
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationKind::Plan => f.write_str("plan"),
            ValidationKind::Task => f.write_str("task"),
        }
    }
}

/// A validator's verdict on a produced output
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ValidationResult {
    /// Whether the output fully satisfies the request
    pub is_complete: bool,
    /// What is missing or wrong; may be empty when complete
    #[serde(default)]
    pub feedback: String,
}

impl ValidationResult {
    pub fn accept() -> Self {
        Self {
            is_complete: true,
            feedback: String::new(),
        }
    }

    pub fn reject(feedback: impl Into<String>) -> Self {
        Self {
            is_complete: false,
            feedback: feedback.into(),
        }
    }
}

/// State a paused execution keeps in its output so it can be resumed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PausedState {
    pub plan: Plan,
    pub workers: Vec<Worker>,
}

/// A plan entry bound to the worker that will carry it out
#[derive(Debug, Clone)]
pub struct SchedulingUnit {
    pub spec: TaskSpec,
    pub worker: Worker,
    pub task_id: String,
}

impl Dependent for SchedulingUnit {
    fn dependencies(&self) -> &[usize] {
        &self.spec.dependencies
    }
}

/// Position of a node in the workflow visualization
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowNode {
    pub id: String,
    pub position: Position,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
}

/// Position-annotated graph of a plan, for display only
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Workflow {
    pub id: String,
    pub execution_id: String,
    pub nodes: Vec<WorkflowNode>,
    pub edges: Vec<WorkflowEdge>,
}
