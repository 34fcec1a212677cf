// SPDX-License-Identifier: MIT

//! Orchestration engine
//!
//! Plans a request into dependent tasks, generates a worker per task, pauses
//! for approval and then runs the tasks through the wave scheduler, each one
//! inside the retry-validate loop.

pub mod config;
pub mod events;
pub mod executor;
pub mod graph;
pub mod orchestrator;
pub mod parse;
pub mod prompts;
pub mod retry;
pub mod server;
pub mod store;
pub mod types;
pub mod validator;
pub mod workflow;

pub use config::ConductorConfig;
pub use events::{EventBus, EventKind, ProgressEvent};
pub use orchestrator::Orchestrator;
pub use store::{InMemoryStore, RecordStore};
