// SPDX-License-Identifier: MIT

//! LLM Agent - single-shot LLM agent
//!
//! Sends the system instruction and the input to the model and returns the
//! text of the reply.

use super::Agent;
use crate::adk::error::ModelError;
use crate::adk::model::{Content, GenerationConfig, Model};
use async_trait::async_trait;
use std::error::Error;
use std::sync::Arc;

/// Standard LLM agent
pub struct LLMAgent {
    pub name: String,
    pub instruction: String,
    pub model: Arc<dyn Model>,
    pub config: Option<GenerationConfig>,
}

impl LLMAgent {
    pub fn new(name: String, instruction: String, model: Arc<dyn Model>) -> Self {
        Self {
            name,
            instruction,
            model,
            config: None,
        }
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = Some(config);
        self
    }
}

#[async_trait]
impl Agent for LLMAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, input: String) -> Result<String, Box<dyn Error + Send + Sync>> {
        let history = vec![
            Content::text("system", self.instruction.clone()),
            Content::text("user", input),
        ];

        let response = self
            .model
            .generate_content(&history, self.config.as_ref())
            .await?;

        let text = response.joined_text();
        if text.trim().is_empty() {
            log::warn!("Agent {} received an empty response", self.name);
            return Err(Box::new(ModelError::InvalidResponse(format!(
                "agent '{}' returned no text",
                self.name
            ))));
        }

        log::info!(
            "Agent {} returning text response (length: {}, preview: '{}')",
            self.name,
            text.len(),
            text.chars().take(100).collect::<String>()
        );
        Ok(text)
    }
}
