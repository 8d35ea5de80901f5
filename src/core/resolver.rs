//! FX-009: Dependency graph and scheduling.
//!
//! Edges point from a target to each of its dependencies. The topological
//! order therefore lists a target before everything it depends on, and
//! targets are invoked by walking that order in reverse. Kahn's algorithm
//! breaks ties by declaration position so the order is deterministic.

use super::error::{FxError, Result};
use super::types::Target;
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use std::collections::BinaryHeap;

/// Topological order over all targets: dependents before dependencies.
pub fn build_execution_order(targets: &IndexMap<String, Target>) -> Result<Vec<String>> {
    let mut in_degree = vec![0usize; targets.len()];
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); targets.len()];

    for (index, target) in targets.values().enumerate() {
        for dep in &target.depends_on {
            let dep_index = targets
                .get_index_of(dep)
                .ok_or_else(|| FxError::UnknownDependency {
                    target: target.name.clone(),
                    dependency: dep.clone(),
                })?;
            adjacency[index].push(dep_index);
            in_degree[dep_index] += 1;
        }
    }

    // Max-heap on declaration index: later declarations come first here and
    // so run later once the order is reversed.
    let mut ready: BinaryHeap<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, &d)| d == 0)
        .map(|(i, _)| i)
        .collect();

    let mut order = Vec::with_capacity(targets.len());
    while let Some(current) = ready.pop() {
        order.push(current);
        for &dep in &adjacency[current] {
            in_degree[dep] -= 1;
            if in_degree[dep] == 0 {
                ready.push(dep);
            }
        }
    }

    if order.len() != targets.len() {
        let ordered: FxHashSet<usize> = order.iter().copied().collect();
        let members = targets
            .keys()
            .enumerate()
            .filter(|(i, _)| !ordered.contains(i))
            .map(|(_, name)| name.clone())
            .collect();
        return Err(FxError::Cycle { members });
    }

    Ok(order
        .into_iter()
        .filter_map(|i| targets.get_index(i).map(|(name, _)| name.clone()))
        .collect())
}

/// The targets to invoke for `requested`, in invocation order.
///
/// Includes the transitive dependency closure; each target appears once.
pub fn schedule(targets: &IndexMap<String, Target>, requested: &[String]) -> Result<Vec<String>> {
    for name in requested {
        if !targets.contains_key(name) {
            return Err(FxError::UnknownTarget {
                target: name.clone(),
            });
        }
    }
    let order = build_execution_order(targets)?;

    let mut needed: FxHashSet<&str> = requested.iter().map(String::as_str).collect();
    for name in &order {
        if !needed.contains(name.as_str()) {
            continue;
        }
        if let Some(target) = targets.get(name) {
            needed.extend(target.depends_on.iter().map(String::as_str));
        }
    }

    let plan: Vec<String> = order
        .iter()
        .rev()
        .filter(|name| needed.contains(name.as_str()))
        .cloned()
        .collect();
    tracing::debug!(requested = ?requested, plan = ?plan, "schedule computed");
    Ok(plan)
}
