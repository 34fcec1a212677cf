// SPDX-License-Identifier: MIT

//! Model module - defines LLM model trait and implementations
//!
//! This module provides the core Model trait and shared types.
//! Model implementations are in their own submodules:
//! - [anthropic] - Anthropic's Claude API
//! - [openai] - OpenAI-compatible chat completions

pub mod anthropic;
pub mod openai;

use crate::adk::error::ModelError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

/// Configuration for model generation
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![Part::Text(text.into())],
        }
    }

    /// Concatenate all text parts, ignoring thinking blocks
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                Part::Thinking(_) => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Parts of a message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Part {
    /// Regular text output from the model
    Text(String),
    /// Thinking/reasoning content from thinking models
    Thinking(String),
}

/// Core trait for LLM model implementations
#[async_trait]
pub trait Model: Send + Sync {
    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
    ) -> Result<Content, Box<dyn Error + Send + Sync>>;
}

/// Infer the provider from the model name prefix
pub fn infer_provider_from_model(model_name: &str) -> String {
    let name_lower = model_name.to_lowercase();
    if name_lower.starts_with("claude") {
        "Anthropic".to_string()
    } else {
        // gpt*, o1*, and anything served behind an OpenAI-compatible endpoint
        "OpenAI".to_string()
    }
}

/// Instantiate a model by name, honouring `MODEL_PROVIDER` when set
pub fn create_model(model_name: &str) -> Result<Arc<dyn Model>, Box<dyn Error + Send + Sync>> {
    let provider = std::env::var("MODEL_PROVIDER")
        .unwrap_or_else(|_| infer_provider_from_model(model_name));

    log::debug!("Using provider '{}' with model '{}'", provider, model_name);

    match provider.as_str() {
        "OpenAI" | "openai" => Ok(Arc::new(openai::OpenAIModel::new(model_name.to_string())?)),
        "Anthropic" | "anthropic" => Ok(Arc::new(anthropic::AnthropicModel::new(
            model_name.to_string(),
        )?)),
        other => Err(Box::new(ModelError::UnsupportedProvider(other.to_string()))),
    }
}
