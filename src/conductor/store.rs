// SPDX-License-Identifier: MIT

//! Record store for executions, tasks, workers and workflows
//!
//! The engine only needs keyed create/read/update. `InMemoryStore` is the
//! bundled implementation; anything durable plugs in behind `RecordStore`.

use crate::adk::error::{ConductorError, Result};
use crate::conductor::types::{Execution, Task, Worker, Workflow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create_execution(&self, execution: &Execution) -> Result<()>;
    async fn get_execution(&self, id: &str) -> Result<Execution>;
    async fn update_execution(&self, execution: &Execution) -> Result<()>;

    async fn create_task(&self, task: &Task) -> Result<()>;
    async fn get_task(&self, id: &str) -> Result<Task>;
    async fn update_task(&self, task: &Task) -> Result<()>;
    /// Tasks of one execution, in creation order
    async fn list_tasks(&self, execution_id: &str) -> Result<Vec<Task>>;

    async fn create_workers(&self, workers: &[Worker]) -> Result<()>;
    async fn get_worker(&self, id: &str) -> Result<Worker>;

    async fn create_workflow(&self, workflow: &Workflow) -> Result<()>;
    async fn get_workflow(&self, id: &str) -> Result<Workflow>;
}

#[derive(Default)]
struct Tables {
    executions: HashMap<String, Execution>,
    tasks: HashMap<String, Task>,
    task_order: Vec<String>,
    workers: HashMap<String, Worker>,
    workflows: HashMap<String, Workflow>,
}

/// Process-local store; clones share the same tables
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn create_execution(&self, execution: &Execution) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .executions
            .insert(execution.id.clone(), execution.clone());
        Ok(())
    }

    async fn get_execution(&self, id: &str) -> Result<Execution> {
        let tables = self.tables.read().await;
        tables
            .executions
            .get(id)
            .cloned()
            .ok_or_else(|| ConductorError::not_found("Execution", id))
    }

    async fn update_execution(&self, execution: &Execution) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.executions.get_mut(&execution.id) {
            Some(existing) => {
                *existing = execution.clone();
                Ok(())
            }
            None => Err(ConductorError::not_found("Execution", &execution.id)),
        }
    }

    async fn create_task(&self, task: &Task) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.tasks.insert(task.id.clone(), task.clone()).is_none() {
            tables.task_order.push(task.id.clone());
        }
        Ok(())
    }

    async fn get_task(&self, id: &str) -> Result<Task> {
        let tables = self.tables.read().await;
        tables
            .tasks
            .get(id)
            .cloned()
            .ok_or_else(|| ConductorError::not_found("Task", id))
    }

    async fn update_task(&self, task: &Task) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.tasks.get_mut(&task.id) {
            Some(existing) => {
                *existing = task.clone();
                Ok(())
            }
            None => Err(ConductorError::not_found("Task", &task.id)),
        }
    }

    async fn list_tasks(&self, execution_id: &str) -> Result<Vec<Task>> {
        let tables = self.tables.read().await;
        Ok(tables
            .task_order
            .iter()
            .filter_map(|id| tables.tasks.get(id))
            .filter(|t| t.execution_id == execution_id)
            .cloned()
            .collect())
    }

    async fn create_workers(&self, workers: &[Worker]) -> Result<()> {
        let mut tables = self.tables.write().await;
        for worker in workers {
            tables.workers.insert(worker.id.clone(), worker.clone());
        }
        Ok(())
    }

    async fn get_worker(&self, id: &str) -> Result<Worker> {
        let tables = self.tables.read().await;
        tables
            .workers
            .get(id)
            .cloned()
            .ok_or_else(|| ConductorError::not_found("Worker", id))
    }

    async fn create_workflow(&self, workflow: &Workflow) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .workflows
            .insert(workflow.id.clone(), workflow.clone());
        Ok(())
    }

    async fn get_workflow(&self, id: &str) -> Result<Workflow> {
        let tables = self.tables.read().await;
        tables
            .workflows
            .get(id)
            .cloned()
            .ok_or_else(|| ConductorError::not_found("Workflow", id))
    }
}
