// SPDX-License-Identifier: MIT

//! Progress events
//!
//! An explicit publish/subscribe bus handed to the orchestrator. Publishing
//! is fire-and-forget: it never blocks and succeeds with no subscribers.

use chrono::{DateTime, Utc};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Kind of progress notification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ExecutionUpdate,
    TaskUpdate,
    AgentStart,
    AgentComplete,
    AgentError,
}

/// A progress notification keyed by execution id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressEvent {
    pub execution_id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(execution_id: &str, kind: EventKind, payload: serde_json::Value) -> Self {
        Self {
            execution_id: execution_id.to_string(),
            kind,
            payload,
            timestamp: Utc::now(),
        }
    }
}

/// In-process event bus based on a tokio broadcast channel
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ProgressEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event; a bus with no subscribers drops it silently
    pub fn publish(&self, event: ProgressEvent) {
        log::debug!("{:?} for execution {}", event.kind, event.execution_id);
        let _ = self.tx.send(event);
    }

    pub fn emit(&self, execution_id: &str, kind: EventKind, payload: serde_json::Value) {
        self.publish(ProgressEvent::new(execution_id, kind, payload));
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    /// Stream only the events of one execution. Lagged receivers skip ahead.
    pub fn subscribe_execution(
        &self,
        execution_id: &str,
    ) -> impl Stream<Item = ProgressEvent> + Send + 'static {
        let execution_id = execution_id.to_string();
        BroadcastStream::new(self.tx.subscribe()).filter_map(move |event| match event {
            Ok(event) if event.execution_id == execution_id => Some(event),
            Ok(_) => None,
            Err(e) => {
                log::warn!("Event subscriber for {} lagged: {}", execution_id, e);
                None
            }
        })
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
