//! Flattener: walks the tree back into one [`Record`] per objective.
//!
//! Records follow the tree order (axis, then its domains, then each
//! domain's objectives); objectives whose domain is not part of the dataset
//! have no place in that walk and are not exported.
//!
//! For profile assessments only the levels between the current and the
//! target profile carry recommendation text, see [`recommendation_levels`].

use crate::error::{GcmmError, Result};
use crate::model::{Assessment, Axis, Dataset, Domain, Objective};
use crate::schema::{ColumnRole, Schema, LEVEL_COUNT};
use crate::sheet::Cell;

/// Level text carried by a record; recommendations may be blanked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordLevel {
    pub description: String,
    pub actionable: String,
    pub strategic: String,
}

/// Flat export row for one objective.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub axis_id: i64,
    pub axis_name: String,
    pub domain_id: String,
    pub domain_name: String,
    pub domain_description: Option<String>,
    pub objective_id: String,
    pub objective_name: String,
    pub description: String,
    pub levels: [RecordLevel; LEVEL_COUNT],
    pub assessment: Assessment,
    pub comment: String,
}

/// 0-based level indices whose recommendations are exported for a
/// profile → target pair.
///
/// The range is `profile - 1 .. target_profile`, minus the last level
/// (index 4), which never gets a recommendation. Negative indices (profile 0)
/// are dropped. Nothing is selected unless `target_profile > profile`.
pub fn recommendation_levels(profile: u8, target_profile: u8) -> Vec<usize> {
    if target_profile <= profile {
        return Vec::new();
    }
    let start = i64::from(profile) - 1;
    let end = i64::from(target_profile);
    (start..end)
        .filter(|i| *i >= 0)
        .map(|i| i as usize)
        .filter(|i| *i < LEVEL_COUNT && *i != LEVEL_COUNT - 1)
        .collect()
}

fn to_record(axis: &Axis, domain: &Domain, objective: &Objective) -> Record {
    let selected: Option<Vec<usize>> = match objective.assessment {
        Assessment::Profile {
            profile,
            target_profile,
        } => Some(recommendation_levels(profile, target_profile)),
        Assessment::Score { .. } => None,
    };

    let levels: [RecordLevel; LEVEL_COUNT] = std::array::from_fn(|i| {
        let level = objective.levels.get(i).cloned().unwrap_or_default();
        let keep = selected.as_ref().map_or(true, |s| s.contains(&i));
        RecordLevel {
            description: level.description,
            actionable: if keep { level.actionable } else { String::new() },
            strategic: if keep { level.strategic } else { String::new() },
        }
    });

    Record {
        axis_id: axis.id,
        axis_name: axis.name.clone(),
        domain_id: domain.id.clone(),
        domain_name: domain.name.clone(),
        domain_description: domain.description.clone(),
        objective_id: objective.id.clone(),
        objective_name: objective.name.clone(),
        description: objective.description.clone(),
        levels,
        assessment: objective.assessment,
        comment: objective.comment.clone(),
    }
}

fn flatten_axes<'a>(dataset: &Dataset, axes: impl Iterator<Item = &'a Axis>) -> Vec<Record> {
    let mut records = Vec::new();
    for axis in axes {
        for domain in dataset.domains_of(axis.id) {
            for objective in dataset.objectives_of(domain) {
                records.push(to_record(axis, domain, objective));
            }
        }
    }
    records
}

/// Every objective reachable from the tree, in tree order.
pub fn flatten(dataset: &Dataset) -> Vec<Record> {
    flatten_axes(dataset, dataset.axes.iter())
}

/// Records of a single axis.
pub fn flatten_axis(dataset: &Dataset, axis_id: i64) -> Result<Vec<Record>> {
    let axis = dataset
        .axis(axis_id)
        .ok_or_else(|| GcmmError::not_found("Axis", axis_id.to_string()))?;
    Ok(flatten_axes(dataset, std::iter::once(axis)))
}

fn text(s: &str) -> Cell {
    if s.is_empty() {
        Cell::Empty
    } else {
        Cell::Text(s.to_string())
    }
}

fn number(n: f64) -> Cell {
    if n.is_finite() {
        Cell::Number(n)
    } else {
        Cell::Empty
    }
}

impl Record {
    /// Cells laid out in the schema's column order.
    pub fn cells(&self, schema: &Schema) -> Vec<Cell> {
        schema.columns.iter().map(|c| self.cell(c.role)).collect()
    }

    fn cell(&self, role: ColumnRole) -> Cell {
        match role {
            ColumnRole::AxisId => Cell::Number(self.axis_id as f64),
            ColumnRole::AxisName => text(&self.axis_name),
            ColumnRole::DomainId => text(&self.domain_id),
            ColumnRole::DomainName => text(&self.domain_name),
            ColumnRole::DomainDescription => {
                text(self.domain_description.as_deref().unwrap_or_default())
            }
            ColumnRole::ObjectiveId => text(&self.objective_id),
            ColumnRole::ObjectiveName => text(&self.objective_name),
            ColumnRole::Description => text(&self.description),
            ColumnRole::Level(i) => text(&self.levels[i].description),
            ColumnRole::Actionable(i) => text(&self.levels[i].actionable),
            ColumnRole::Strategic(i) => text(&self.levels[i].strategic),
            ColumnRole::Evaluation => number(self.assessment.metric_value()),
            ColumnRole::Profile => match self.assessment {
                Assessment::Profile { profile, .. } => Cell::Number(f64::from(profile)),
                Assessment::Score { evaluation } => number(evaluation),
            },
            ColumnRole::TargetProfile => match self.assessment {
                Assessment::Profile { target_profile, .. } => {
                    Cell::Number(f64::from(target_profile))
                }
                Assessment::Score { .. } => Cell::Empty,
            },
            ColumnRole::Comment => text(&self.comment),
        }
    }
}
