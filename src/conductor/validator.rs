// SPDX-License-Identifier: MIT

//! Validator adapter: an external judge of produced output

use crate::adk::agent::{Agent, LLMAgent};
use crate::adk::error::Result;
use crate::adk::model::{create_model, GenerationConfig};
use crate::conductor::parse::parse_validation;
use crate::conductor::prompts::{validation_prompt, VALIDATOR_INSTRUCTION, VALIDATOR_NAME};
use crate::conductor::types::{ValidationKind, ValidationResult};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(
        &self,
        kind: ValidationKind,
        original_input: &str,
        output: &str,
    ) -> Result<ValidationResult>;
}

/// Asks a judge agent for a JSON verdict
pub struct AgentValidator {
    judge: Arc<dyn Agent>,
}

impl AgentValidator {
    pub fn new(judge: Arc<dyn Agent>) -> Self {
        Self { judge }
    }

    /// Judge backed by the named model
    pub fn from_model(model_name: &str) -> Result<Self> {
        let model = create_model(model_name)?;
        let judge = LLMAgent::new(
            VALIDATOR_NAME.to_string(),
            VALIDATOR_INSTRUCTION.clone(),
            model,
        )
        .with_config(GenerationConfig {
            temperature: Some(0.0),
            ..Default::default()
        });
        Ok(Self::new(Arc::new(judge)))
    }
}

#[async_trait]
impl Validator for AgentValidator {
    async fn validate(
        &self,
        kind: ValidationKind,
        original_input: &str,
        output: &str,
    ) -> Result<ValidationResult> {
        let reply = self
            .judge
            .run(validation_prompt(kind, original_input, output))
            .await?;
        let verdict = parse_validation(&reply)?;
        log::debug!(
            "{} validation: complete={} feedback='{}'",
            kind,
            verdict.is_complete,
            verdict.feedback
        );
        Ok(verdict)
    }
}
