//! Hierarchy Builder: folds decoded rows into the Axis → Domain → Objective
//! tree.
//!
//! Axes are deduplicated by id and domains by `"{axis_id}-{domain_id}"`.
//! Objectives are not deduplicated: each row is one objective occurrence.

use crate::config::ToolkitConfig;
use crate::model::{Axis, Dataset, Domain, Level, Objective};
use crate::parser::RawRow;
use std::collections::HashSet;

/// Build a fresh dataset from decoded rows. Scores are left at 0; run
/// [`crate::aggregate::recompute`] afterwards.
pub fn build(rows: &[RawRow], config: &ToolkitConfig) -> Dataset {
    let mut dataset = Dataset::default();
    let mut seen_axes: HashSet<i64> = HashSet::new();
    let mut seen_domains: HashSet<String> = HashSet::new();

    for row in rows {
        let axis_id = match row.axis_id {
            Some(id) => id,
            None => {
                log::debug!("Row {}: no axis id, skipped", row.row);
                continue;
            }
        };

        if seen_axes.insert(axis_id) {
            dataset.axes.push(Axis {
                id: axis_id,
                name: row.axis_name.clone(),
                description: None,
                color: config.axis_color(axis_id),
                score: 0.0,
            });
        }

        if let (Some(domain_id), Some(domain_name)) = (&row.domain_id, &row.domain_name) {
            let key = Domain::make_key(axis_id, domain_id);
            if seen_domains.insert(key.clone()) {
                dataset.domains.push(Domain {
                    key,
                    id: domain_id.clone(),
                    name: domain_name.clone(),
                    description: row.domain_description.clone(),
                    axis_id,
                    score: 0.0,
                });
            }
        }

        if let (Some(objective_id), Some(objective_name)) = (&row.objective_id, &row.objective_name)
        {
            dataset.objectives.push(Objective {
                id: objective_id.clone(),
                name: objective_name.clone(),
                description: row.description.clone(),
                domain_id: row.domain_id.clone(),
                axis_id,
                levels: row
                    .levels
                    .iter()
                    .enumerate()
                    .map(|(i, l)| Level {
                        level: (i + 1) as u8,
                        description: l.description.clone(),
                        actionable: l.actionable.clone(),
                        strategic: l.strategic.clone(),
                    })
                    .collect(),
                assessment: row.assessment,
                comment: row.comment.clone(),
            });
        }
    }

    log::debug!(
        "Built hierarchy: {} axes, {} domains, {} objectives",
        dataset.axes.len(),
        dataset.domains.len(),
        dataset.objectives.len()
    );
    dataset
}
