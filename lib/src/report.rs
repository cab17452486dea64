//! Aggregation of raw constraint violations into the completeness matrix.

use crate::tabular;
use crate::types::{ConstraintViolation, EntityRef, PropertyRef};
use log::warn;
use std::collections::{HashMap, HashSet};

/// Per-entity, per-property completeness scores.
///
/// One row per entity of the original retrieval order; each score is 0 or 1;
/// `complete_all` is the mean over the checked properties.
#[derive(Debug, Clone)]
pub struct CompletenessMatrix {
    pub properties: Vec<PropertyRef>,
    pub rows: Vec<CompletenessRow>,
}

#[derive(Debug, Clone)]
pub struct CompletenessRow {
    pub entity: EntityRef,
    pub scores: Vec<u8>,
    pub complete_all: f64,
}

impl CompletenessMatrix {
    /// Mean of `complete_all` over all rows, or 1.0 for an empty matrix.
    pub fn overall(&self) -> f64 {
        if self.rows.is_empty() {
            return 1.0;
        }
        self.rows.iter().map(|r| r.complete_all).sum::<f64>() / self.rows.len() as f64
    }

    /// Renders the matrix as CSV: `entity,<property...>,complete_all`.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        let mut header: Vec<&str> = vec!["entity"];
        header.extend(self.properties.iter().map(|p| p.as_str()));
        header.push("complete_all");
        tabular::write_row(&mut out, &header);

        for row in &self.rows {
            let mut fields: Vec<String> = vec![row.entity.as_str().to_string()];
            fields.extend(row.scores.iter().map(|s| s.to_string()));
            fields.push(row.complete_all.to_string());
            let refs: Vec<&str> = fields.iter().map(String::as_str).collect();
            tabular::write_row(&mut out, &refs);
        }
        out
    }
}

/// Reconstructs the dense completeness matrix from the violation report.
///
/// Left-join semantics keyed on entity, in original `entity_list` order, with
/// fill value 1: an entity not mentioned in any violation for a property is
/// scored complete for it. This open-world default also applies to entities
/// the engine never saw at all. Violations referencing entities outside
/// `entity_list` are dropped with a warning and never change the row count.
pub fn aggregate(
    entity_list: &[EntityRef],
    property_list: &[PropertyRef],
    violations: &[ConstraintViolation],
) -> CompletenessMatrix {
    let known: HashSet<&EntityRef> = entity_list.iter().collect();

    // Per property, the set of focus nodes that failed its minCount check.
    let mut incomplete: HashMap<&PropertyRef, HashSet<&EntityRef>> = HashMap::new();
    for violation in violations {
        if !known.contains(&violation.focus_node) {
            warn!(
                "dropping violation for unknown entity {} (path {})",
                violation.focus_node, violation.path
            );
            continue;
        }
        incomplete
            .entry(&violation.path)
            .or_default()
            .insert(&violation.focus_node);
    }

    let rows = entity_list
        .iter()
        .map(|entity| {
            let scores: Vec<u8> = property_list
                .iter()
                .map(|property| {
                    let failed = incomplete
                        .get(property)
                        .is_some_and(|set| set.contains(entity));
                    if failed {
                        0
                    } else {
                        1
                    }
                })
                .collect();
            let complete_all = if scores.is_empty() {
                // Zero checked properties: vacuously complete.
                1.0
            } else {
                scores.iter().map(|&s| s as f64).sum::<f64>() / scores.len() as f64
            };
            CompletenessRow {
                entity: entity.clone(),
                scores,
                complete_all,
            }
        })
        .collect();

    CompletenessMatrix {
        properties: property_list.to_vec(),
        rows,
    }
}
