// SPDX-License-Identifier: MIT

//! Retry-validate loop
//!
//! Executes a task, asks the validator about the result and retries on
//! rejection. After the last attempt the latest output is returned even if
//! it was rejected. Only executor or validator errors on the final attempt
//! fail the task.

use crate::adk::error::{ConductorError, Result};
use crate::conductor::events::{EventBus, EventKind};
use crate::conductor::executor::TaskExecutor;
use crate::conductor::store::RecordStore;
use crate::conductor::types::{Task, TaskStatus, ValidationKind, ValidationResult, Worker};
use crate::conductor::validator::Validator;
use serde_json::json;
use std::sync::Arc;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

pub struct RetryValidateLoop {
    executor: Arc<dyn TaskExecutor>,
    validator: Arc<dyn Validator>,
    store: Arc<dyn RecordStore>,
    events: EventBus,
    max_attempts: u32,
}

impl RetryValidateLoop {
    pub fn new(
        executor: Arc<dyn TaskExecutor>,
        validator: Arc<dyn Validator>,
        store: Arc<dyn RecordStore>,
        events: EventBus,
    ) -> Self {
        Self {
            executor,
            validator,
            store,
            events,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Run `task` on `worker` until the validator accepts or attempts run out.
    ///
    /// The task is persisted as `running` for every attempt and `pending`
    /// between attempts. Marking it `completed` is left to the caller.
    pub async fn execute_with_validation(
        &self,
        worker: &Worker,
        task: &mut Task,
        kind: ValidationKind,
    ) -> Result<String> {
        let mut feedback: Option<String> = None;

        for attempt in 1..=self.max_attempts {
            let last = attempt == self.max_attempts;

            task.status = TaskStatus::Running;
            task.attempts += 1;
            self.store.update_task(task).await?;
            self.emit(task, worker, EventKind::AgentStart, json!({ "attempt": attempt }));

            log::info!(
                "Task '{}' attempt {}/{} on worker '{}'",
                task.title,
                attempt,
                self.max_attempts,
                worker.name
            );

            let outcome = self.attempt(worker, task, kind, feedback.as_deref()).await;
            let (output, verdict) = match outcome {
                Ok(pair) => pair,
                Err(e) => {
                    log::warn!(
                        "Task '{}' attempt {} errored: {}",
                        task.title,
                        attempt,
                        e
                    );
                    self.emit(
                        task,
                        worker,
                        EventKind::AgentError,
                        json!({ "attempt": attempt, "error": e.to_string() }),
                    );
                    if last {
                        return Err(e);
                    }
                    self.set_pending(task).await?;
                    continue;
                }
            };

            self.emit(
                task,
                worker,
                EventKind::AgentComplete,
                json!({ "attempt": attempt, "accepted": verdict.is_complete }),
            );

            if verdict.is_complete {
                return Ok(output);
            }

            log::warn!(
                "Task '{}' attempt {} rejected: {}",
                task.title,
                attempt,
                verdict.feedback
            );

            if last {
                log::warn!(
                    "Task '{}' exhausted {} attempts, keeping last output",
                    task.title,
                    self.max_attempts
                );
                return Ok(output);
            }

            feedback = Some(verdict.feedback);
            self.set_pending(task).await?;
        }

        Err(ConductorError::other(format!(
            "task '{}' made no attempts",
            task.title
        )))
    }

    /// Judge an already produced output, retrying only validator errors
    pub async fn validate_output(
        &self,
        kind: ValidationKind,
        original_input: &str,
        output: &str,
    ) -> Result<ValidationResult> {
        let mut attempt = 1;
        loop {
            match self.validator.validate(kind, original_input, output).await {
                Ok(verdict) => return Ok(verdict),
                Err(e) if attempt < self.max_attempts => {
                    log::warn!("{} validation attempt {} errored: {}", kind, attempt, e);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt(
        &self,
        worker: &Worker,
        task: &Task,
        kind: ValidationKind,
        feedback: Option<&str>,
    ) -> Result<(String, ValidationResult)> {
        let output = match feedback {
            Some(feedback) => {
                let mut retry = task.clone();
                retry.input = format!(
                    "{}\n\nA previous attempt was rejected by the reviewer:\n{}",
                    task.input, feedback
                );
                self.executor.execute(worker, &retry).await?
            }
            None => self.executor.execute(worker, task).await?,
        };
        let verdict = self.validator.validate(kind, &task.input, &output).await?;
        Ok((output, verdict))
    }

    async fn set_pending(&self, task: &mut Task) -> Result<()> {
        task.status = TaskStatus::Pending;
        self.store.update_task(task).await?;
        self.events.emit(
            &task.execution_id,
            EventKind::TaskUpdate,
            json!({ "task_id": task.id, "status": task.status, "attempts": task.attempts }),
        );
        Ok(())
    }

    fn emit(&self, task: &Task, worker: &Worker, kind: EventKind, extra: serde_json::Value) {
        let mut payload = json!({
            "task_id": task.id,
            "title": task.title,
            "worker": worker.name,
        });
        if let (Some(map), Some(extra)) = (payload.as_object_mut(), extra.as_object()) {
            map.extend(extra.clone());
        }
        self.events.emit(&task.execution_id, kind, payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conductor::store::InMemoryStore;
    use crate::conductor::types::{WorkerConfig, WorkerSpec};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct CountingExecutor {
        calls: AtomicUsize,
        inputs: Mutex<Vec<String>>,
        fail_on: Option<usize>,
    }

    impl CountingExecutor {
        fn new(fail_on: Option<usize>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                inputs: Mutex::new(Vec::new()),
                fail_on,
            }
        }
    }

    #[async_trait]
    impl TaskExecutor for CountingExecutor {
        async fn execute(&self, _worker: &Worker, task: &Task) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.inputs.lock().unwrap().push(task.input.clone());
            if self.fail_on.map_or(false, |f| f <= n) {
                return Err(ConductorError::other("executor down"));
            }
            Ok(format!("output {}", n))
        }
    }

    /// Accepts from the given 1-based call on; `None` always rejects
    struct ScriptedValidator {
        accept_from: Option<usize>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Validator for ScriptedValidator {
        async fn validate(
            &self,
            _kind: ValidationKind,
            _original_input: &str,
            _output: &str,
        ) -> Result<ValidationResult> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            match self.accept_from {
                Some(from) if n >= from => Ok(ValidationResult::accept()),
                _ => Ok(ValidationResult::reject(format!("not yet ({})", n))),
            }
        }
    }

    fn worker() -> Worker {
        Worker::from_spec(
            "exec",
            WorkerSpec {
                name: "Writer".to_string(),
                model: None,
                system_prompt: "write".to_string(),
                user_prompt_template: None,
                config: WorkerConfig::default(),
            },
            "gpt-4o-mini",
        )
    }

    async fn setup(
        executor: Arc<CountingExecutor>,
        accept_from: Option<usize>,
    ) -> (RetryValidateLoop, Arc<InMemoryStore>, Task) {
        let store = Arc::new(InMemoryStore::new());
        let task = Task::new("exec", None, "Essay", "write it", "an essay on rust");
        store.create_task(&task).await.unwrap();
        let validator = Arc::new(ScriptedValidator {
            accept_from,
            calls: AtomicUsize::new(0),
        });
        let retry = RetryValidateLoop::new(executor, validator, store.clone(), EventBus::new(64));
        (retry, store, task)
    }

    #[tokio::test]
    async fn test_always_reject_returns_last_output_after_three_calls() {
        let executor = Arc::new(CountingExecutor::new(None));
        let (retry, store, mut task) = setup(executor.clone(), None).await;

        let output = retry
            .execute_with_validation(&worker(), &mut task, ValidationKind::Task)
            .await
            .unwrap();

        assert_eq!(executor.calls.load(Ordering::SeqCst), 3);
        assert_eq!(output, "output 3");
        assert_eq!(task.attempts, 3);
        let stored = store.get_task(&task.id).await.unwrap();
        assert_eq!(stored.attempts, 3);
        assert_eq!(stored.status, TaskStatus::Running);
    }

    #[tokio::test]
    async fn test_immediate_acceptance_calls_executor_once() {
        let executor = Arc::new(CountingExecutor::new(None));
        let (retry, _store, mut task) = setup(executor.clone(), Some(1)).await;

        let output = retry
            .execute_with_validation(&worker(), &mut task, ValidationKind::Task)
            .await
            .unwrap();

        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(output, "output 1");
        assert_eq!(task.attempts, 1);
    }

    #[tokio::test]
    async fn test_rejection_feedback_reaches_next_attempt() {
        let executor = Arc::new(CountingExecutor::new(None));
        let (retry, _store, mut task) = setup(executor.clone(), Some(2)).await;

        retry
            .execute_with_validation(&worker(), &mut task, ValidationKind::Task)
            .await
            .unwrap();

        let inputs = executor.inputs.lock().unwrap().clone();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0], "an essay on rust");
        assert!(inputs[1].contains("not yet (1)"));
        // The stored task keeps its original input
        assert_eq!(task.input, "an essay on rust");
    }

    #[tokio::test]
    async fn test_executor_error_on_last_attempt_propagates() {
        let executor = Arc::new(CountingExecutor::new(Some(1)));
        let (retry, _store, mut task) = setup(executor.clone(), Some(1)).await;

        let err = retry
            .execute_with_validation(&worker(), &mut task, ValidationKind::Task)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("executor down"));
        assert_eq!(executor.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_transient_executor_error_is_retried() {
        // Fails from call 3 on; the first call succeeds but is rejected,
        // the second succeeds and is accepted
        let executor = Arc::new(CountingExecutor::new(Some(3)));
        let (retry, _store, mut task) = setup(executor.clone(), Some(2)).await;

        let output = retry
            .execute_with_validation(&worker(), &mut task, ValidationKind::Task)
            .await
            .unwrap();
        assert_eq!(output, "output 2");
    }

    #[tokio::test]
    async fn test_events_are_emitted_per_attempt() {
        let executor = Arc::new(CountingExecutor::new(None));
        let (retry, _store, mut task) = setup(executor, Some(2)).await;
        let mut rx = retry.events.subscribe();

        retry
            .execute_with_validation(&worker(), &mut task, ValidationKind::Task)
            .await
            .unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.kind);
        }
        assert_eq!(
            kinds,
            vec![
                EventKind::AgentStart,
                EventKind::AgentComplete,
                EventKind::TaskUpdate,
                EventKind::AgentStart,
                EventKind::AgentComplete,
            ]
        );
    }

    #[tokio::test]
    async fn test_validate_output_returns_rejection_without_error() {
        let executor = Arc::new(CountingExecutor::new(None));
        let (retry, _store, _task) = setup(executor.clone(), None).await;

        let verdict = retry
            .validate_output(ValidationKind::Plan, "req", "plan text")
            .await
            .unwrap();
        assert!(!verdict.is_complete);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }
}
