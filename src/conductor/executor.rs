// SPDX-License-Identifier: MIT

//! Task executor adapter
//!
//! Runs a worker against a task's input and returns the raw text it produced.

use crate::adk::agent::{Agent, LLMAgent};
use crate::adk::error::{ConductorError, Result};
use crate::adk::model::{create_model, GenerationConfig};
use crate::conductor::types::{Task, Worker};
use async_trait::async_trait;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, worker: &Worker, task: &Task) -> Result<String>;
}

/// Builds the agent that embodies a worker
pub trait AgentFactory: Send + Sync {
    fn build(
        &self,
        worker: &Worker,
    ) -> std::result::Result<Arc<dyn Agent>, Box<dyn Error + Send + Sync>>;
}

/// Creates an `LLMAgent` on the provider inferred from the worker's model
#[derive(Debug, Default, Clone)]
pub struct ModelAgentFactory;

impl AgentFactory for ModelAgentFactory {
    fn build(
        &self,
        worker: &Worker,
    ) -> std::result::Result<Arc<dyn Agent>, Box<dyn Error + Send + Sync>> {
        let model = create_model(&worker.model)?;
        log::info!("Building agent '{}' on model '{}'", worker.name, worker.model);
        let agent = LLMAgent::new(worker.name.clone(), worker.system_prompt.clone(), model)
            .with_config(GenerationConfig::from(&worker.config));
        Ok(Arc::new(agent))
    }
}

/// Executes tasks by running the worker's agent under a deadline
pub struct AgentExecutor {
    factory: Arc<dyn AgentFactory>,
    timeout: Duration,
}

impl AgentExecutor {
    pub fn new(factory: Arc<dyn AgentFactory>, timeout: Duration) -> Self {
        Self { factory, timeout }
    }

    /// Executor backed by real model providers
    pub fn with_models(timeout: Duration) -> Self {
        Self::new(Arc::new(ModelAgentFactory), timeout)
    }
}

#[async_trait]
impl TaskExecutor for AgentExecutor {
    async fn execute(&self, worker: &Worker, task: &Task) -> Result<String> {
        let agent = self.factory.build(worker)?;
        let prompt = worker.render_prompt(&task.input);

        log::debug!("Worker '{}' prompt for '{}': {}", worker.name, task.title, prompt);

        match tokio::time::timeout(self.timeout, agent.run(prompt)).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                log::error!(
                    "Worker '{}' timed out on task '{}' after {:?}",
                    worker.name,
                    task.title,
                    self.timeout
                );
                Err(ConductorError::Timeout {
                    worker: worker.name.clone(),
                    secs: self.timeout.as_secs(),
                })
            }
        }
    }
}
