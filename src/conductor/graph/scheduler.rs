// SPDX-License-Identifier: MIT

//! Wave scheduler
//!
//! Runs every task whose dependencies have completed, waits for the first of
//! them to finish, then looks for newly unblocked tasks. A fast task unlocks
//! its dependents without waiting for slower siblings.
//!
//! When a task fails the scheduler returns at once. In-flight siblings are
//! cancelled: their futures are dropped at their next await point.

use crate::adk::error::{ConductorError, ScheduleError};
use crate::conductor::types::Dependent;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashSet;
use std::future::Future;

/// Dependency-aware executor for a positional task list
#[derive(Debug, Clone, Default)]
pub struct WaveScheduler {
    /// Upper bound on concurrently running tasks; `None` runs the whole ready set
    max_concurrency: Option<usize>,
}

impl WaveScheduler {
    pub fn new(max_concurrency: Option<usize>) -> Self {
        Self {
            max_concurrency: max_concurrency.map(|m| m.max(1)),
        }
    }

    /// Run `execute(i)` for every task index, honouring dependencies.
    ///
    /// Fails fast: the first task error aborts the run.
    pub async fn run_all<T, F, Fut>(&self, tasks: &[T], execute: F) -> Result<(), ConductorError>
    where
        T: Dependent,
        F: Fn(usize) -> Fut,
        Fut: Future<Output = Result<(), ConductorError>>,
    {
        let total = tasks.len();
        let mut completed: HashSet<usize> = HashSet::with_capacity(total);
        let mut running: HashSet<usize> = HashSet::new();
        let mut in_flight = FuturesUnordered::new();
        let mut wave = 0;

        while completed.len() < total {
            let ready = ready_tasks(tasks, &completed, &running);

            if ready.is_empty() && running.is_empty() {
                log::error!(
                    "Deadlock: {}/{} tasks completed, none ready, none running",
                    completed.len(),
                    total
                );
                return Err(ScheduleError::Deadlock {
                    completed: completed.len(),
                    total,
                }
                .into());
            }

            let capacity = match self.max_concurrency {
                Some(max) => max.saturating_sub(running.len()),
                None => ready.len(),
            };

            if !ready.is_empty() && capacity > 0 {
                wave += 1;
                let launching: Vec<usize> = ready.into_iter().take(capacity).collect();
                log::info!(
                    "Wave {}: launching {} task(s): {:?}",
                    wave,
                    launching.len(),
                    launching
                );

                for index in launching {
                    running.insert(index);
                    let fut = execute(index);
                    in_flight.push(async move { (index, fut.await) });
                }
            }

            match in_flight.next().await {
                Some((index, Ok(()))) => {
                    running.remove(&index);
                    completed.insert(index);
                    log::info!("Task {} completed ({}/{})", index, completed.len(), total);
                }
                Some((index, Err(e))) => {
                    log::error!(
                        "Task {} failed, aborting {} running sibling(s): {}",
                        index,
                        running.len() - 1,
                        e
                    );
                    return Err(ScheduleError::TaskFailed {
                        index,
                        message: e.to_string(),
                    }
                    .into());
                }
                None => {
                    // Nothing in flight although `running` said otherwise
                    return Err(ScheduleError::Deadlock {
                        completed: completed.len(),
                        total,
                    }
                    .into());
                }
            }
        }

        Ok(())
    }
}

/// Indices that are neither done nor running and whose dependencies are all done
fn ready_tasks<T: Dependent>(
    tasks: &[T],
    completed: &HashSet<usize>,
    running: &HashSet<usize>,
) -> Vec<usize> {
    tasks
        .iter()
        .enumerate()
        .filter(|(i, _)| !completed.contains(i) && !running.contains(i))
        .filter(|(_, t)| t.dependencies().iter().all(|d| completed.contains(d)))
        .map(|(i, _)| i)
        .collect()
}
