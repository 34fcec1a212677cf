// SPDX-License-Identifier: MIT

//! Plan to workflow projection for visualization
//!
//! Columns are dependency levels, rows are the order of tasks within a level.
//! The layout depends only on the plan, never on execution order.

use crate::adk::error::Result;
use crate::conductor::config::LayoutConfig;
use crate::conductor::graph::compute_levels;
use crate::conductor::types::{Plan, Position, Worker, Workflow, WorkflowEdge, WorkflowNode};
use serde_json::json;
use std::collections::HashMap;

pub fn node_id(index: usize) -> String {
    format!("task-{}", index)
}

/// Build the workflow graph of a plan. Fails on cycles or dangling dependencies.
pub fn build_workflow(
    execution_id: &str,
    plan: &Plan,
    workers: &[Worker],
    layout: &LayoutConfig,
) -> Result<Workflow> {
    let levels = compute_levels(&plan.tasks)?;

    let mut rows: HashMap<usize, usize> = HashMap::new();
    let mut nodes = Vec::with_capacity(plan.tasks.len());
    let mut edges = Vec::new();

    for (index, (spec, level)) in plan.tasks.iter().zip(&levels).enumerate() {
        let row = rows.entry(*level).or_insert(0);
        let position = Position {
            x: *level as f64 * layout.horizontal_spacing,
            y: *row as f64 * layout.vertical_spacing,
        };
        *row += 1;

        let worker = workers.get(index);
        nodes.push(WorkflowNode {
            id: node_id(index),
            position,
            data: json!({
                "label": spec.title,
                "description": spec.description,
                "level": level,
                "worker": worker.map(|w| w.name.as_str()),
                "worker_id": worker.map(|w| w.id.as_str()),
            }),
        });

        for dep in &spec.dependencies {
            edges.push(WorkflowEdge {
                id: format!("e{}-{}", dep, index),
                source: node_id(*dep),
                target: node_id(index),
            });
        }
    }

    log::info!(
        "Built workflow for {}: {} nodes, {} edges, {} levels",
        execution_id,
        nodes.len(),
        edges.len(),
        rows.len()
    );

    Ok(Workflow {
        id: uuid::Uuid::new_v4().to_string(),
        execution_id: execution_id.to_string(),
        nodes,
        edges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::{ConductorError, PlanError};
    use crate::conductor::types::TaskSpec;

    fn plan(deps: &[&[usize]]) -> Plan {
        Plan {
            overall_strategy: "s".to_string(),
            tasks: deps
                .iter()
                .enumerate()
                .map(|(i, d)| TaskSpec {
                    title: format!("T{}", i),
                    description: String::new(),
                    dependencies: d.to_vec(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_diamond_layout() {
        let plan = plan(&[&[], &[0], &[0], &[1, 2]]);
        let workflow = build_workflow("e", &plan, &[], &LayoutConfig::default()).unwrap();

        let positions: Vec<(f64, f64)> = workflow
            .nodes
            .iter()
            .map(|n| (n.position.x, n.position.y))
            .collect();
        assert_eq!(
            positions,
            vec![(0.0, 0.0), (300.0, 0.0), (300.0, 150.0), (600.0, 0.0)]
        );

        let edge_ids: Vec<&str> = workflow.edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(edge_ids, vec!["e0-1", "e0-2", "e1-3", "e2-3"]);
        assert_eq!(workflow.edges[3].source, "task-2");
        assert_eq!(workflow.edges[3].target, "task-3");
        assert_eq!(workflow.nodes[3].data["level"], 2);
    }

    #[test]
    fn test_custom_spacing() {
        let layout = LayoutConfig {
            horizontal_spacing: 10.0,
            vertical_spacing: 5.0,
        };
        let workflow = build_workflow("e", &plan(&[&[], &[], &[1]]), &[], &layout).unwrap();
        assert_eq!(workflow.nodes[1].position, Position { x: 0.0, y: 5.0 });
        assert_eq!(workflow.nodes[2].position, Position { x: 10.0, y: 0.0 });
    }

    #[test]
    fn test_cycle_is_rejected() {
        let err = build_workflow("e", &plan(&[&[1], &[0]]), &[], &LayoutConfig::default())
            .unwrap_err();
        assert!(matches!(err, ConductorError::Plan(PlanError::Cycle { .. })));
    }
}
