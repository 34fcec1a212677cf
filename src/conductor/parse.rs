// SPDX-License-Identifier: MIT

//! Strict parsing of model output
//!
//! Models wrap their JSON in prose and code fences. `extract_json` digs the
//! payload out by trying each plausible span until one deserializes into the
//! expected type; the `parse_*` functions then reject anything that is
//! structurally valid but unusable.

use crate::adk::error::PlanError;
use crate::conductor::types::{Plan, ValidationResult, WorkerSpec};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Spans of `text` that may hold the payload, most specific first
fn json_candidates(text: &str) -> Vec<&str> {
    let mut candidates = Vec::new();

    if let Some(start) = text.find("```json") {
        let after = &text[start + 7..];
        if let Some(end) = after.find("```") {
            candidates.push(after[..end].trim());
        }
    }

    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        if let Some(end) = after.find("```") {
            let body = after[..end].trim();
            if body.starts_with('{') || body.starts_with('[') {
                candidates.push(body);
            }
        }
    }

    // Every opening bracket, outermost first; trailing prose is ignored
    candidates.extend(text.match_indices(['{', '[']).map(|(i, _)| &text[i..]));
    candidates
}

/// Deserialize the first span of a model reply that parses as `T`
pub fn extract_json<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    let mut first_error = None;

    for candidate in json_candidates(text) {
        let mut values = serde_json::Deserializer::from_str(candidate).into_iter::<T>();
        match values.next() {
            Some(Ok(value)) => return Ok(value),
            Some(Err(e)) => {
                first_error.get_or_insert(e);
            }
            None => {}
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => serde_json::from_str(text.trim()),
    }
}

pub fn parse_plan(text: &str) -> Result<Plan, PlanError> {
    let plan: Plan = extract_json(text).map_err(|e| PlanError::parse("plan", e.to_string()))?;

    if plan.tasks.is_empty() {
        return Err(PlanError::Empty);
    }
    if let Some(index) = plan.tasks.iter().position(|t| t.title.trim().is_empty()) {
        return Err(PlanError::parse(
            "plan",
            format!("task {} has an empty title", index),
        ));
    }

    Ok(plan)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WorkerList {
    Bare(Vec<WorkerSpec>),
    Wrapped { workers: Vec<WorkerSpec> },
}

/// Parse the orchestrator's roster. Accepts `[...]` or `{"workers": [...]}`.
pub fn parse_worker_specs(text: &str) -> Result<Vec<WorkerSpec>, PlanError> {
    let list: WorkerList = extract_json(text)
        .map_err(|e| PlanError::parse("worker specs", e.to_string()))?;

    let specs = match list {
        WorkerList::Bare(specs) => specs,
        WorkerList::Wrapped { workers } => workers,
    };

    for (index, spec) in specs.iter().enumerate() {
        if spec.name.trim().is_empty() {
            return Err(PlanError::parse(
                "worker specs",
                format!("worker {} has an empty name", index),
            ));
        }
        if spec.system_prompt.trim().is_empty() {
            return Err(PlanError::parse(
                "worker specs",
                format!("worker '{}' has an empty system_prompt", spec.name),
            ));
        }
    }

    Ok(specs)
}

pub fn parse_validation(text: &str) -> Result<ValidationResult, PlanError> {
    extract_json(text).map_err(|e| PlanError::parse("validation result", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{json, Value};

    #[test]
    fn test_extract_json_from_fenced_block() {
        let text = "Here you go:\n```json\n{\"a\": 1}\n```\nThanks";
        let value: Value = extract_json(text).unwrap();
        assert_eq!(value, json!({ "a": 1 }));
    }

    #[test]
    fn test_extract_json_from_bare_fence() {
        let value: Vec<u32> = extract_json("```\n[1, 2]\n```").unwrap();
        assert_eq!(value, vec![1, 2]);
    }

    #[test]
    fn test_extract_json_outermost_object() {
        let text = "Sure! {\"x\": {\"y\": 2}} hope that helps";
        let value: Value = extract_json(text).unwrap();
        assert_eq!(value, json!({ "x": { "y": 2 } }));
    }

    #[test]
    fn test_extract_json_array_opening_first() {
        let text = "list: [{\"n\": 1}, {\"n\": 2}] and that is all";
        let value: Value = extract_json(text).unwrap();
        assert_eq!(value, json!([{ "n": 1 }, { "n": 2 }]));
    }

    #[test]
    fn test_extract_json_reports_first_error() {
        let err = extract_json::<Value>("almost {\"a\": }").unwrap_err();
        assert!(err.is_syntax());
    }

    #[test]
    fn test_parse_plan() {
        let text = r#"```json
{"overall_strategy": "split", "tasks": [
  {"title": "Research", "description": "find facts"},
  {"title": "Write", "description": "draft", "dependencies": [0]}
]}
```"#;
        let plan = parse_plan(text).unwrap();
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.tasks[1].dependencies, vec![0]);
    }

    #[test]
    fn test_parse_plan_after_bracketed_prose() {
        let text = r#"I split this into [research, write] steps:
{"overall_strategy": "split", "tasks": [
  {"title": "Research", "description": "find facts"},
  {"title": "Write", "description": "draft", "dependencies": [0]}
]}
Let me know."#;
        let plan = parse_plan(text).unwrap();
        assert_eq!(plan.overall_strategy, "split");
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.tasks[1].dependencies, vec![0]);
    }

    #[test]
    fn test_parse_worker_specs_after_unrelated_array() {
        let text = r#"Covering tasks [0, 1]: {"workers": [
  {"name": "A", "system_prompt": "do a"},
  {"name": "B", "system_prompt": "do b"}
]}"#;
        let specs = parse_worker_specs(text).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[1].name, "B");
    }

    #[test]
    fn test_parse_plan_rejects_empty_task_list() {
        let err = parse_plan(r#"{"overall_strategy": "none", "tasks": []}"#).unwrap_err();
        assert!(matches!(err, PlanError::Empty));
    }

    #[test]
    fn test_parse_plan_rejects_blank_title() {
        let err = parse_plan(
            r#"{"overall_strategy": "s", "tasks": [{"title": " ", "description": "d"}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("empty title"));
    }

    #[test]
    fn test_parse_plan_rejects_prose() {
        let err = parse_plan("I could not come up with a plan.").unwrap_err();
        assert!(matches!(err, PlanError::Parse { what: "plan", .. }));
    }

    #[test]
    fn test_parse_worker_specs_bare_and_wrapped() {
        let bare = r#"[{"name": "A", "system_prompt": "do a"}]"#;
        let wrapped =
            r#"{"workers": [{"name": "A", "system_prompt": "do a", "model": "claude-3-haiku"}]}"#;

        assert_eq!(parse_worker_specs(bare).unwrap().len(), 1);
        let specs = parse_worker_specs(wrapped).unwrap();
        assert_eq!(specs[0].model.as_deref(), Some("claude-3-haiku"));
    }

    #[test]
    fn test_parse_worker_specs_rejects_missing_prompt() {
        let err = parse_worker_specs(r#"[{"name": "A", "system_prompt": ""}]"#).unwrap_err();
        assert!(err.to_string().contains("system_prompt"));
    }

    #[test]
    fn test_parse_validation() {
        let verdict = parse_validation(
            "Verdict:\n```json\n{\"is_complete\": false, \"feedback\": \"missing intro\"}\n```",
        )
        .unwrap();
        assert!(!verdict.is_complete);
        assert_eq!(verdict.feedback, "missing intro");

        let ok = parse_validation(r#"{"is_complete": true}"#).unwrap();
        assert!(ok.is_complete);
        assert!(ok.feedback.is_empty());
    }
}
