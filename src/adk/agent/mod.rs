// SPDX-License-Identifier: MIT

//! Agent module - defines agent types for AI workflows
//!
//! Workers, the planner, the orchestrator and the validator's judge are all
//! `Agent`s: something with a name that turns an input prompt into text.

mod llm;

pub use llm::LLMAgent;

use async_trait::async_trait;
use std::error::Error;

/// Core agent trait for all agent types
#[async_trait]
pub trait Agent: Send + Sync {
    /// Returns the agent name
    fn name(&self) -> &str;

    /// Run the agent with the given input
    async fn run(&self, input: String) -> Result<String, Box<dyn Error + Send + Sync>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple mock agent that transforms input (used in tests)
    pub struct MockAgent {
        name: String,
        transform: fn(String) -> String,
    }

    impl MockAgent {
        pub fn new(name: &str, transform: fn(String) -> String) -> Self {
            Self {
                name: name.to_string(),
                transform,
            }
        }
    }

    #[async_trait]
    impl Agent for MockAgent {
        fn name(&self) -> &str {
            &self.name
        }

        async fn run(&self, input: String) -> Result<String, Box<dyn Error + Send + Sync>> {
            Ok((self.transform)(input))
        }
    }

    #[tokio::test]
    async fn test_mock_agent() {
        let agent = MockAgent::new("test", |s| format!("{}-transformed", s));
        assert_eq!(agent.name(), "test");

        let result = agent.run("input".to_string()).await.unwrap();
        assert_eq!(result, "input-transformed");
    }
}
