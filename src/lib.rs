// SPDX-License-Identifier: MIT

//! kinetic-conductor turns a natural-language request into a validated,
//! dependency-ordered set of sub-tasks, generates a specialised worker for
//! each one, pauses for approval, and then executes the tasks in waves.

pub mod adk;
pub mod conductor;
