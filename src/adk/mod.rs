// SPDX-License-Identifier: MIT

//! Agent development kit: models, agents and the shared error types

pub mod agent;
pub mod error;
pub mod model;
