// SPDX-License-Identifier: MIT

//! Instructions for the fixed planner, orchestrator and validator roles

use crate::conductor::types::{
    Plan, ValidationKind, ValidationResult, Worker, WorkerConfig, WorkerSpec,
};
use chrono::Utc;
use once_cell::sync::Lazy;

pub const PLANNER_NAME: &str = "Planner";
pub const ORCHESTRATOR_NAME: &str = "Orchestrator";
pub const VALIDATOR_NAME: &str = "Validator";

// --- Schemas shown to the models ---

fn schema_text(schema: schemars::schema::RootSchema) -> String {
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

static PLAN_SCHEMA: Lazy<String> = Lazy::new(|| schema_text(schemars::schema_for!(Plan)));

static WORKERS_SCHEMA: Lazy<String> =
    Lazy::new(|| schema_text(schemars::schema_for!(Vec<WorkerSpec>)));

static VALIDATION_SCHEMA: Lazy<String> =
    Lazy::new(|| schema_text(schemars::schema_for!(ValidationResult)));

static PLANNER_INSTRUCTION: Lazy<String> = Lazy::new(|| {
    format!(
        "You are a planning agent. Break the user's request into a small number of \
concrete sub-tasks that together fully satisfy it.\n\
Each task lists the zero-based indices of the tasks it needs as `dependencies`. \
Only depend on tasks whose output is actually required, and never create cycles.\n\n\
Reply with a single JSON object matching this schema and nothing else:\n{}",
        *PLAN_SCHEMA
    )
});

static ORCHESTRATOR_INSTRUCTION: Lazy<String> = Lazy::new(|| {
    format!(
        "You design specialised workers. For every task in the plan you are given, \
create exactly one worker, in the same order as the tasks. \
Give each worker a descriptive name and a system_prompt that makes it an expert at its task. \
Leave `model` unset unless the task clearly needs a particular model.\n\n\
Reply with a JSON array matching this schema and nothing else:\n{}",
        *WORKERS_SCHEMA
    )
});

pub static VALIDATOR_INSTRUCTION: Lazy<String> = Lazy::new(|| {
    format!(
        "You are a strict reviewer. Decide whether the produced output fully and \
correctly satisfies the original request. When it does not, say precisely what is \
missing in `feedback`.\n\n\
Reply with a single JSON object matching this schema and nothing else:\n{}",
        *VALIDATION_SCHEMA
    )
});

fn fixed_worker(execution_id: &str, name: &str, model: &str, instruction: &str) -> Worker {
    Worker {
        id: format!("{}-{}", name.to_lowercase(), execution_id),
        execution_id: execution_id.to_string(),
        name: name.to_string(),
        model: model.to_string(),
        system_prompt: instruction.to_string(),
        user_prompt_template: None,
        config: WorkerConfig {
            temperature: Some(0.2),
            max_output_tokens: None,
        },
        created_at: Utc::now(),
    }
}

/// The worker that turns a request into a `Plan`
pub fn planner_worker(execution_id: &str, model: &str) -> Worker {
    fixed_worker(execution_id, PLANNER_NAME, model, &PLANNER_INSTRUCTION)
}

/// The worker that turns a `Plan` into one `WorkerSpec` per task
pub fn orchestrator_worker(execution_id: &str, model: &str) -> Worker {
    fixed_worker(execution_id, ORCHESTRATOR_NAME, model, &ORCHESTRATOR_INSTRUCTION)
}

/// Input for the orchestrator task
pub fn worker_request(request: &str, plan: &Plan) -> String {
    let plan_json = serde_json::to_string_pretty(plan).unwrap_or_default();
    format!(
        "Original request:\n{}\n\nPlan ({} tasks):\n{}",
        request,
        plan.tasks.len(),
        plan_json
    )
}

/// Prompt asking the judge for a verdict
pub fn validation_prompt(kind: ValidationKind, original_input: &str, output: &str) -> String {
    let subject = match kind {
        ValidationKind::Plan => "a plan for the request",
        ValidationKind::Task => "the result of the task",
    };
    format!(
        "Original request:\n{}\n\nProduced output ({}):\n{}",
        original_input, subject, output
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conductor::types::TaskSpec;

    #[test]
    fn test_instructions_embed_schemas() {
        assert!(PLANNER_INSTRUCTION.contains("overall_strategy"));
        assert!(ORCHESTRATOR_INSTRUCTION.contains("system_prompt"));
        assert!(VALIDATOR_INSTRUCTION.contains("is_complete"));
    }

    #[test]
    fn test_fixed_workers() {
        let planner = planner_worker("exec-9", "gpt-4o");
        assert_eq!(planner.name, PLANNER_NAME);
        assert_eq!(planner.model, "gpt-4o");
        assert_eq!(planner.execution_id, "exec-9");
        assert_eq!(planner.render_prompt("req"), "req");

        let orchestrator = orchestrator_worker("exec-9", "gpt-4o");
        assert_ne!(planner.id, orchestrator.id);
    }

    #[test]
    fn test_worker_request_includes_plan() {
        let plan = Plan {
            overall_strategy: "one step".to_string(),
            tasks: vec![TaskSpec {
                title: "Only".to_string(),
                description: "do it".to_string(),
                dependencies: vec![],
            }],
        };
        let text = worker_request("make tea", &plan);
        assert!(text.contains("make tea"));
        assert!(text.contains("1 tasks"));
        assert!(text.contains("\"Only\""));
    }
}
