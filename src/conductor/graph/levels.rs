// SPDX-License-Identifier: MIT

//! Topological depth of each task in a plan

use crate::adk::error::PlanError;
use crate::conductor::types::Dependent;
use std::collections::HashSet;

/// Compute the level of every task and reject cyclic or dangling graphs.
///
/// A task with no dependencies sits at level 0; any other task sits one level
/// below its deepest dependency. Levels only drive the workflow layout; the
/// scheduler derives readiness from completion instead.
pub fn compute_levels<T: Dependent>(tasks: &[T]) -> Result<Vec<usize>, PlanError> {
    let mut levels: Vec<Option<usize>> = vec![None; tasks.len()];

    for index in 0..tasks.len() {
        let mut visiting = HashSet::new();
        level_of(index, tasks, &mut levels, &mut visiting)?;
    }

    Ok(levels.into_iter().map(Option::unwrap_or_default).collect())
}

fn level_of<T: Dependent>(
    index: usize,
    tasks: &[T],
    levels: &mut [Option<usize>],
    visiting: &mut HashSet<usize>,
) -> Result<usize, PlanError> {
    if let Some(level) = levels[index] {
        return Ok(level);
    }

    // Revisiting a node on the current path means we walked a cycle
    if !visiting.insert(index) {
        return Err(PlanError::Cycle { index });
    }

    let mut level = 0;
    for &dependency in tasks[index].dependencies() {
        if dependency >= tasks.len() {
            return Err(PlanError::InvalidDependency {
                task: index,
                dependency,
            });
        }
        level = level.max(level_of(dependency, tasks, levels, visiting)? + 1);
    }

    visiting.remove(&index);
    levels[index] = Some(level);
    Ok(level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conductor::types::TaskSpec;

    fn spec(deps: &[usize]) -> TaskSpec {
        TaskSpec {
            title: "t".to_string(),
            description: "d".to_string(),
            dependencies: deps.to_vec(),
        }
    }

    #[test]
    fn test_diamond_levels() {
        let tasks = vec![spec(&[]), spec(&[0]), spec(&[0]), spec(&[1, 2])];
        assert_eq!(compute_levels(&tasks).unwrap(), vec![0, 1, 1, 2]);
    }

    #[test]
    fn test_forward_references_are_allowed() {
        // Task 0 waits on task 2; indices need not be in topological order
        let tasks = vec![spec(&[2]), spec(&[]), spec(&[1])];
        assert_eq!(compute_levels(&tasks).unwrap(), vec![2, 0, 1]);
    }

    #[test]
    fn test_two_node_cycle_is_rejected() {
        let tasks = vec![spec(&[1]), spec(&[0])];
        let err = compute_levels(&tasks).unwrap_err();
        assert!(matches!(err, PlanError::Cycle { .. }));
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let tasks = vec![spec(&[]), spec(&[1])];
        assert!(matches!(
            compute_levels(&tasks).unwrap_err(),
            PlanError::Cycle { index: 1 }
        ));
    }

    #[test]
    fn test_longer_cycle_behind_valid_prefix() {
        let tasks = vec![spec(&[]), spec(&[0, 3]), spec(&[1]), spec(&[2])];
        assert!(matches!(
            compute_levels(&tasks).unwrap_err(),
            PlanError::Cycle { .. }
        ));
    }

    #[test]
    fn test_out_of_range_dependency() {
        let tasks = vec![spec(&[99])];
        assert!(matches!(
            compute_levels(&tasks).unwrap_err(),
            PlanError::InvalidDependency {
                task: 0,
                dependency: 99
            }
        ));
    }

    #[test]
    fn test_shared_dependency_is_not_mistaken_for_cycle() {
        // Both 1 and 2 reach 0; visiting 0 twice across branches is fine
        let tasks = vec![spec(&[]), spec(&[0]), spec(&[0, 1])];
        assert_eq!(compute_levels(&tasks).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_plan() {
        let tasks: Vec<TaskSpec> = vec![];
        assert!(compute_levels(&tasks).unwrap().is_empty());
    }
}
