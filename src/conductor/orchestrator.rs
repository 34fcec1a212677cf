// SPDX-License-Identifier: MIT

//! Orchestrator - the two-phase run/resume state machine
//!
//! `run` plans the request, generates one worker per planned task, lays out
//! the workflow and pauses. `resume` executes the approved plan through the
//! wave scheduler. Any failure in either phase leaves the execution `failed`
//! with the error text as its output and is returned to the caller.

use crate::adk::error::{ConductorError, PlanError, Result};
use crate::conductor::config::ConductorConfig;
use crate::conductor::events::{EventBus, EventKind};
use crate::conductor::executor::{AgentExecutor, TaskExecutor};
use crate::conductor::graph::{compute_levels, WaveScheduler};
use crate::conductor::parse::{parse_plan, parse_worker_specs};
use crate::conductor::prompts;
use crate::conductor::retry::RetryValidateLoop;
use crate::conductor::store::{InMemoryStore, RecordStore};
use crate::conductor::types::{
    Execution, ExecutionStatus, PausedState, Plan, SchedulingUnit, Task, TaskStatus,
    ValidationKind, Worker,
};
use crate::conductor::validator::{AgentValidator, Validator};
use crate::conductor::workflow::build_workflow;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct Orchestrator {
    config: ConductorConfig,
    store: Arc<dyn RecordStore>,
    events: EventBus,
    retry: Arc<RetryValidateLoop>,
    scheduler: WaveScheduler,
    active: Arc<Mutex<HashSet<String>>>,
}

/// Exclusive right to drive one execution; released when dropped
pub struct DriveGuard {
    active: Arc<Mutex<HashSet<String>>>,
    execution_id: String,
}

impl Drop for DriveGuard {
    fn drop(&mut self) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active.remove(&self.execution_id);
    }
}

impl Orchestrator {
    pub fn new(
        config: ConductorConfig,
        executor: Arc<dyn TaskExecutor>,
        validator: Arc<dyn Validator>,
        store: Arc<dyn RecordStore>,
        events: EventBus,
    ) -> Self {
        let retry = RetryValidateLoop::new(executor, validator, store.clone(), events.clone())
            .with_max_attempts(config.max_attempts);
        Self {
            scheduler: WaveScheduler::new(config.max_concurrency),
            config,
            store,
            events,
            retry: Arc::new(retry),
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Orchestrator on real model providers with an in-memory store
    pub fn from_config(config: ConductorConfig) -> Result<Self> {
        let executor = AgentExecutor::with_models(config.task_timeout());
        let validator = AgentValidator::from_model(&config.validator_model)?;
        let events = EventBus::new(config.event_capacity);
        Ok(Self::new(
            config,
            Arc::new(executor),
            Arc::new(validator),
            Arc::new(InMemoryStore::new()),
            events,
        ))
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn config(&self) -> &ConductorConfig {
        &self.config
    }

    /// Record a new draft execution for a request
    pub async fn submit(&self, input: impl Into<String>) -> Result<Execution> {
        let execution = Execution::new(input);
        self.store.create_execution(&execution).await?;
        log::info!("Created execution {}", execution.id);
        Ok(execution)
    }

    /// Planning phase: ends with the execution `paused` awaiting approval
    pub async fn run(&self, execution_id: &str) -> Result<PausedState> {
        let _guard = self.acquire(execution_id)?;
        let mut execution = self.store.get_execution(execution_id).await?;

        if !matches!(
            execution.status,
            ExecutionStatus::Draft | ExecutionStatus::Running
        ) {
            return Err(invalid_state(&execution, "draft"));
        }

        match self.plan_phase(&mut execution).await {
            Ok(state) => Ok(state),
            Err(e) => {
                self.fail(&mut execution, &e).await;
                Err(e)
            }
        }
    }

    /// Execution phase: runs the approved plan to completion
    pub async fn resume(&self, execution_id: &str) -> Result<Value> {
        let guard = self.acquire(execution_id)?;
        self.resume_acquired(guard).await
    }

    /// `resume` for a caller that already holds the execution's guard
    pub async fn resume_acquired(&self, guard: DriveGuard) -> Result<Value> {
        let mut execution = self.store.get_execution(&guard.execution_id).await?;

        if execution.status != ExecutionStatus::Paused {
            return Err(invalid_state(&execution, "paused"));
        }

        match self.execute_phase(&mut execution).await {
            Ok(output) => Ok(output),
            Err(e) => {
                self.fail(&mut execution, &e).await;
                Err(e)
            }
        }
    }

    async fn plan_phase(&self, execution: &mut Execution) -> Result<PausedState> {
        self.set_status(execution, ExecutionStatus::Running, "planning")
            .await?;

        // 1. Plan
        let planner = prompts::planner_worker(&execution.id, &self.config.planner_model);
        let raw_plan = self
            .run_fixed_task(
                execution,
                &planner,
                "Create plan",
                "Break the request into dependent sub-tasks",
                execution.input.clone(),
                ValidationKind::Plan,
            )
            .await?;

        // 2. Parse, and reject broken graphs before anything else runs
        let plan = parse_plan(&raw_plan)?;
        compute_levels(&plan.tasks)?;
        log::info!(
            "Plan for {} has {} tasks: {}",
            execution.id,
            plan.tasks.len(),
            plan.overall_strategy
        );

        // 3. Validate the structured plan against the request
        let verdict = self
            .retry
            .validate_output(
                ValidationKind::Plan,
                &execution.input,
                &serde_json::to_string_pretty(&plan)?,
            )
            .await?;
        if !verdict.is_complete {
            log::warn!(
                "Plan for {} not fully accepted, continuing: {}",
                execution.id,
                verdict.feedback
            );
        }

        // 4. Generate one worker per task
        let orchestrator =
            prompts::orchestrator_worker(&execution.id, &self.config.orchestrator_model);
        let raw_workers = self
            .run_fixed_task(
                execution,
                &orchestrator,
                "Generate workers",
                "Create one specialised worker per planned task",
                prompts::worker_request(&execution.input, &plan),
                ValidationKind::Task,
            )
            .await?;
        let specs = parse_worker_specs(&raw_workers)?;
        if specs.len() != plan.tasks.len() {
            log::warn!(
                "Execution {}: {} workers generated for {} tasks",
                execution.id,
                specs.len(),
                plan.tasks.len()
            );
        }

        // 5. Persist the roster
        let workers: Vec<Worker> = specs
            .into_iter()
            .map(|spec| Worker::from_spec(&execution.id, spec, &self.config.default_worker_model))
            .collect();
        self.store.create_workers(&workers).await?;

        // 6. Workflow for display
        let workflow = build_workflow(&execution.id, &plan, &workers, &self.config.layout)?;
        self.store.create_workflow(&workflow).await?;
        execution.workflow_id = Some(workflow.id);

        // 7. Pause for approval
        let state = PausedState { plan, workers };
        execution.output = Some(serde_json::to_value(&state)?);
        self.set_status(execution, ExecutionStatus::Paused, "awaiting approval")
            .await?;
        log::info!("Execution {} paused for approval", execution.id);

        Ok(state)
    }

    async fn execute_phase(&self, execution: &mut Execution) -> Result<Value> {
        let PausedState { plan, workers } = paused_state(execution)?;
        if plan.tasks.len() != workers.len() {
            return Err(PlanError::WorkerCountMismatch {
                tasks: plan.tasks.len(),
                workers: workers.len(),
            }
            .into());
        }

        self.set_status(execution, ExecutionStatus::Running, "executing")
            .await?;

        let mut units = Vec::with_capacity(plan.tasks.len());
        for (spec, worker) in plan.tasks.into_iter().zip(workers) {
            let task = Task::new(
                &execution.id,
                Some(worker.id.as_str()),
                spec.title.clone(),
                spec.description.clone(),
                spec.description.clone(),
            );
            self.store.create_task(&task).await?;
            units.push(SchedulingUnit {
                spec,
                worker,
                task_id: task.id,
            });
        }
        log::info!(
            "Execution {}: scheduling {} tasks",
            execution.id,
            units.len()
        );

        self.scheduler
            .run_all(&units, |index| self.run_unit(&units, index))
            .await?;

        let mut results = Vec::with_capacity(units.len());
        for unit in &units {
            let task = self.store.get_task(&unit.task_id).await?;
            results.push(json!({
                "task_id": task.id,
                "title": task.title,
                "output": task.output,
            }));
        }
        let output = json!({
            "strategy": plan.overall_strategy,
            "results": results,
        });

        execution.output = Some(output.clone());
        execution.completed_at = Some(Utc::now());
        self.set_status(execution, ExecutionStatus::Completed, "done")
            .await?;
        log::info!("Execution {} completed", execution.id);

        Ok(output)
    }

    /// Scheduler callback: one task through the retry-validate loop
    async fn run_unit(&self, units: &[SchedulingUnit], index: usize) -> Result<()> {
        let unit = &units[index];
        let mut task = self.store.get_task(&unit.task_id).await?;

        // Direct dependencies' outputs become part of the input
        for &dep in &unit.spec.dependencies {
            let Some(dep_unit) = units.get(dep) else {
                continue;
            };
            let dep_task = self.store.get_task(&dep_unit.task_id).await?;
            if let Some(output) = dep_task.output {
                task.input
                    .push_str(&format!("\n\n## Result of '{}'\n{}", dep_task.title, output));
            }
        }

        let output = self
            .retry
            .execute_with_validation(&unit.worker, &mut task, ValidationKind::Task)
            .await?;

        task.complete(output);
        self.store.update_task(&task).await?;
        self.events.emit(
            &task.execution_id,
            EventKind::TaskUpdate,
            json!({ "task_id": task.id, "title": task.title, "status": task.status }),
        );
        Ok(())
    }

    /// Planner and orchestrator steps: a recorded task on a fixed worker
    async fn run_fixed_task(
        &self,
        execution: &Execution,
        worker: &Worker,
        title: &str,
        description: &str,
        input: String,
        kind: ValidationKind,
    ) -> Result<String> {
        let mut task = Task::new(
            &execution.id,
            Some(worker.id.as_str()),
            title,
            description,
            input,
        );
        self.store.create_task(&task).await?;

        let output = self
            .retry
            .execute_with_validation(worker, &mut task, kind)
            .await?;

        task.complete(output.clone());
        self.store.update_task(&task).await?;
        Ok(output)
    }

    async fn set_status(
        &self,
        execution: &mut Execution,
        status: ExecutionStatus,
        phase: &str,
    ) -> Result<()> {
        execution.status = status;
        self.store.update_execution(execution).await?;
        self.events.emit(
            &execution.id,
            EventKind::ExecutionUpdate,
            json!({ "status": status, "phase": phase }),
        );
        Ok(())
    }

    /// Record a fatal error. Errors while recording are only logged.
    async fn fail(&self, execution: &mut Execution, error: &ConductorError) {
        log::error!("Execution {} failed: {}", execution.id, error);

        execution.output = Some(Value::String(error.to_string()));
        execution.completed_at = Some(Utc::now());
        if let Err(e) = self
            .set_status(execution, ExecutionStatus::Failed, "failed")
            .await
        {
            log::error!("Could not record failure of {}: {}", execution.id, e);
        }

        // Siblings cancelled mid-attempt never reach a terminal status
        match self.store.list_tasks(&execution.id).await {
            Ok(tasks) => {
                for mut task in tasks
                    .into_iter()
                    .filter(|t| t.status == TaskStatus::Running)
                {
                    task.status = TaskStatus::Failed;
                    task.completed_at = Some(Utc::now());
                    if let Err(e) = self.store.update_task(&task).await {
                        log::error!("Could not mark task {} failed: {}", task.id, e);
                    }
                }
            }
            Err(e) => log::error!("Could not list tasks of {}: {}", execution.id, e),
        }
    }

    /// Claim an execution, or `ExecutionBusy` if it is already being driven
    pub fn acquire(&self, execution_id: &str) -> Result<DriveGuard> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if !active.insert(execution_id.to_string()) {
            return Err(ConductorError::ExecutionBusy(execution_id.to_string()));
        }
        Ok(DriveGuard {
            active: self.active.clone(),
            execution_id: execution_id.to_string(),
        })
    }
}

/// Read back the plan and roster a paused execution was left with
fn paused_state(execution: &Execution) -> Result<PausedState> {
    let output = execution
        .output
        .as_ref()
        .ok_or(PlanError::MissingResumeState("output"))?;
    let plan: Plan = serde_json::from_value(
        output
            .get("plan")
            .cloned()
            .ok_or(PlanError::MissingResumeState("plan"))?,
    )?;
    let workers: Vec<Worker> = serde_json::from_value(
        output
            .get("workers")
            .cloned()
            .ok_or(PlanError::MissingResumeState("workers"))?,
    )?;
    Ok(PausedState { plan, workers })
}

fn invalid_state(execution: &Execution, expected: &str) -> ConductorError {
    ConductorError::InvalidState {
        id: execution.id.clone(),
        status: execution.status.to_string(),
        expected: expected.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conductor::types::{TaskSpec, ValidationResult, WorkerConfig};
    use async_trait::async_trait;

    struct Accepting;

    #[async_trait]
    impl Validator for Accepting {
        async fn validate(
            &self,
            _kind: ValidationKind,
            _original_input: &str,
            _output: &str,
        ) -> Result<ValidationResult> {
            Ok(ValidationResult::accept())
        }
    }

    struct Echo;

    #[async_trait]
    impl TaskExecutor for Echo {
        async fn execute(&self, _worker: &Worker, task: &Task) -> Result<String> {
            Ok(format!("done: {}", task.title))
        }
    }

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(
            ConductorConfig::default(),
            Arc::new(Echo),
            Arc::new(Accepting),
            Arc::new(InMemoryStore::new()),
            EventBus::default(),
        )
    }

    fn paused_execution(tasks: usize, workers: usize) -> Execution {
        let plan = Plan {
            overall_strategy: "s".to_string(),
            tasks: (0..tasks)
                .map(|i| TaskSpec {
                    title: format!("T{}", i),
                    description: "d".to_string(),
                    dependencies: vec![],
                })
                .collect(),
        };
        let workers: Vec<Worker> = (0..workers)
            .map(|i| Worker {
                id: format!("w{}", i),
                execution_id: "x".to_string(),
                name: format!("W{}", i),
                model: "m".to_string(),
                system_prompt: "p".to_string(),
                user_prompt_template: None,
                config: WorkerConfig::default(),
                created_at: Utc::now(),
            })
            .collect();
        let mut execution = Execution::new("req");
        execution.status = ExecutionStatus::Paused;
        execution.output = Some(serde_json::to_value(PausedState { plan, workers }).unwrap());
        execution
    }

    #[tokio::test]
    async fn test_busy_guard_rejects_second_driver() {
        let orch = orchestrator();
        let guard = orch.acquire("e1").unwrap();
        assert!(matches!(
            orch.acquire("e1"),
            Err(ConductorError::ExecutionBusy(_))
        ));
        assert!(orch.acquire("e2").is_ok());
        drop(guard);
        assert!(orch.acquire("e1").is_ok());
    }

    #[tokio::test]
    async fn test_resume_requires_paused() {
        let orch = orchestrator();
        let execution = orch.submit("req").await.unwrap();
        let err = orch.resume(&execution.id).await.unwrap_err();
        assert!(matches!(err, ConductorError::InvalidState { .. }));

        // Status checks do not fail the execution
        let stored = orch.store().get_execution(&execution.id).await.unwrap();
        assert_eq!(stored.status, ExecutionStatus::Draft);
    }

    #[tokio::test]
    async fn test_resume_executes_paused_plan() {
        let orch = orchestrator();
        let execution = paused_execution(2, 2);
        orch.store().create_execution(&execution).await.unwrap();

        let output = orch.resume(&execution.id).await.unwrap();
        assert_eq!(output["strategy"], "s");
        assert_eq!(output["results"][1]["output"], "done: T1");

        let stored = orch.store().get_execution(&execution.id).await.unwrap();
        assert_eq!(stored.status, ExecutionStatus::Completed);
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_missing_resume_state_fails_execution() {
        let orch = orchestrator();
        let mut execution = Execution::new("req");
        execution.status = ExecutionStatus::Paused;
        execution.output = Some(json!({ "plan": { "overall_strategy": "s", "tasks": [] } }));
        orch.store().create_execution(&execution).await.unwrap();

        let err = orch.resume(&execution.id).await.unwrap_err();
        assert!(matches!(
            err,
            ConductorError::Plan(PlanError::MissingResumeState("workers"))
        ));
        let stored = orch.store().get_execution(&execution.id).await.unwrap();
        assert_eq!(stored.status, ExecutionStatus::Failed);
    }

    #[tokio::test]
    async fn test_count_mismatch_message_is_recorded() {
        let orch = orchestrator();
        let execution = paused_execution(3, 2);
        orch.store().create_execution(&execution).await.unwrap();

        orch.resume(&execution.id).await.unwrap_err();
        let stored = orch.store().get_execution(&execution.id).await.unwrap();
        assert_eq!(
            stored.output,
            Some(Value::String(
                "Plan error: Plan has 3 tasks but 2 workers were generated".to_string()
            ))
        );
    }
}
