//! Merge-order scheduling over the relation graph.
//!
//! A relation column on model A whose type names model B means A's rows
//! reference B's rows, so B must be fully merged first. The scheduler
//! emits referenced models before referencing ones; unrelated models keep
//! their schema declaration order, which makes the result deterministic
//! for a given input.

use std::collections::VecDeque;

use indexmap::IndexMap;
use tracing::warn;

use crate::core::schema::{Model, Schema};

/// Models in merge order: for every relation A → B, B precedes A.
///
/// Cycles in the relation graph are out of contract; any models left
/// unschedulable by one are appended in declaration order.
pub fn sorted(schema: &Schema) -> Vec<&Model> {
    // Edges point from the referenced model to its dependents. A relation
    // to a name missing from the schema is not an edge.
    let mut pending: IndexMap<&str, usize> = IndexMap::new();
    let mut dependents: IndexMap<&str, Vec<&str>> = IndexMap::new();

    for model in schema.models.values() {
        pending.entry(model.name.as_str()).or_insert(0);

        for column in &model.columns {
            if column.relation.is_some() && schema.models.contains_key(&column.ty.name) {
                *pending.entry(model.name.as_str()).or_insert(0) += 1;
                dependents
                    .entry(column.ty.name.as_str())
                    .or_default()
                    .push(model.name.as_str());
            }
        }
    }

    let mut ready: VecDeque<&str> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(name, _)| *name)
        .collect();

    let mut order: Vec<&Model> = Vec::with_capacity(schema.models.len());

    while let Some(name) = ready.pop_front() {
        order.push(&schema.models[name]);

        for &dependent in dependents.get(name).map(Vec::as_slice).unwrap_or(&[]) {
            if let Some(count) = pending.get_mut(dependent) {
                *count -= 1;

                if *count == 0 {
                    ready.push_back(dependent);
                }
            }
        }
    }

    if order.len() < schema.models.len() {
        warn!(
            "Relation graph contains a cycle; {} model(s) scheduled in declaration order",
            schema.models.len() - order.len()
        );

        for model in schema.models.values() {
            if !order.iter().any(|m| m.name == model.name) {
                order.push(model);
            }
        }
    }

    order
}
