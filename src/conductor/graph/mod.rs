// SPDX-License-Identifier: MIT

//! Dependency graph handling
//!
//! `compute_levels` validates a plan's graph and lays it out;
//! `WaveScheduler` runs tasks as their dependencies complete.

mod levels;
pub mod scheduler;

pub use levels::compute_levels;
pub use scheduler::WaveScheduler;
