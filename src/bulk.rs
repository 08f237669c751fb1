//! Bulk save: a client-authored hierarchy replacing the whole dataset.
//!
//! The payload is nested (axes → domains → objectives) rather than flat, so
//! it skips the row parser and builds the [`Dataset`] directly. Every check
//! runs before anything is built; scores are left for
//! [`crate::aggregate::recompute`].

use crate::config::ToolkitConfig;
use crate::error::{GcmmError, Result};
use crate::model::{Assessment, Axis, Dataset, Domain, Level, Objective, MAX_LEVEL};
use crate::schema::{Metric, LEVEL_COUNT};
use crate::sheet::format_number;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};

/// Identifier as a client may send it: number or string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum IdValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl IdValue {
    pub fn as_text(&self) -> String {
        match self {
            IdValue::Int(i) => i.to_string(),
            IdValue::Float(f) => format_number(*f),
            IdValue::Text(s) => s.trim().to_string(),
        }
    }

    /// Integer axis id; numeric strings are accepted.
    pub fn as_axis_id(&self) -> Option<i64> {
        match self {
            IdValue::Int(i) => Some(*i),
            IdValue::Float(f) if f.fract() == 0.0 && f.abs() <= 9_007_199_254_740_991.0 => {
                Some(*f as i64)
            }
            IdValue::Float(_) => None,
            IdValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LevelPayload {
    pub description: String,
    pub actionable: String,
    pub strategic: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectivePayload {
    pub id: IdValue,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Keyed `"1"` to `"5"`
    #[serde(default)]
    pub levels: BTreeMap<String, LevelPayload>,
    pub profile: Option<i64>,
    pub target_profile: Option<i64>,
    pub evaluation: Option<f64>,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DomainPayload {
    pub id: IdValue,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub objectives: Vec<ObjectivePayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AxisPayload {
    pub id: IdValue,
    pub name: String,
    pub color: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub domains: Vec<DomainPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkPayload {
    #[serde(default)]
    pub axes: Vec<AxisPayload>,
}

impl BulkPayload {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| GcmmError::data("payload", "", format!("malformed JSON: {e}")))
    }
}

fn levels_of(objective: &ObjectivePayload, location: &str) -> Result<Vec<Level>> {
    (1..=LEVEL_COUNT)
        .map(|n| {
            let level = objective
                .levels
                .get(&n.to_string())
                .filter(|l| !l.description.trim().is_empty())
                .ok_or_else(|| {
                    GcmmError::data(
                        format!("{location}, level {n}"),
                        "",
                        "every objective needs a description for all 5 levels",
                    )
                })?;
            Ok(Level {
                level: n as u8,
                description: level.description.clone(),
                actionable: level.actionable.clone(),
                strategic: level.strategic.clone(),
            })
        })
        .collect()
}

fn assessment_of(objective: &ObjectivePayload, metric: Metric, location: &str) -> Result<Assessment> {
    match metric {
        Metric::Evaluation => {
            let evaluation = objective.evaluation.unwrap_or(0.0);
            if !evaluation.is_finite() || !(0.0..=f64::from(MAX_LEVEL)).contains(&evaluation) {
                return Err(GcmmError::data(
                    location,
                    evaluation.to_string(),
                    "evaluation must be between 0 and 5",
                ));
            }
            Ok(Assessment::Score { evaluation })
        }
        Metric::Profile => {
            let max = i64::from(MAX_LEVEL);
            let profile = objective.profile.ok_or_else(|| {
                GcmmError::data(location, "", "profile is required (1 to 5)")
            })?;
            if !(1..=max).contains(&profile) {
                return Err(GcmmError::data(
                    location,
                    profile.to_string(),
                    "profile must be between 1 and 5",
                ));
            }
            let target = objective.target_profile.unwrap_or(profile);
            if target < profile || target > max {
                return Err(GcmmError::data(
                    location,
                    target.to_string(),
                    format!("target profile must be between {profile} and 5"),
                ));
            }
            Ok(Assessment::Profile {
                profile: profile as u8,
                target_profile: target as u8,
            })
        }
    }
}

/// Validate a payload and build the dataset it describes.
pub fn build_dataset(payload: &BulkPayload, config: &ToolkitConfig) -> Result<Dataset> {
    if payload.axes.is_empty() {
        return Err(GcmmError::data("payload", "", "at least one axis is required"));
    }

    let metric = config.variant.metric();
    let mut dataset = Dataset::default();
    let mut seen_axes = HashSet::new();
    let mut seen_domains = HashSet::new();

    for axis in &payload.axes {
        let axis_id = axis.id.as_axis_id().ok_or_else(|| {
            GcmmError::data("axis", axis.id.as_text(), "axis id must be an integer")
        })?;
        let axis_loc = format!("axis {axis_id}");
        if !seen_axes.insert(axis_id) {
            return Err(GcmmError::data(axis_loc, axis_id.to_string(), "duplicate axis id"));
        }
        if axis.domains.is_empty() {
            return Err(GcmmError::data(axis_loc, &axis.name, "axis has no domains"));
        }

        let color = match axis.color.as_deref().map(str::trim) {
            Some(c) if !c.is_empty() => c.to_string(),
            _ => config.axis_color(axis_id),
        };
        dataset.axes.push(Axis {
            id: axis_id,
            name: axis.name.clone(),
            description: axis.description.clone(),
            color,
            score: 0.0,
        });

        for domain in &axis.domains {
            let domain_id = domain.id.as_text();
            let domain_loc = format!("{axis_loc}, domain {domain_id}");
            let key = Domain::make_key(axis_id, &domain_id);
            if !seen_domains.insert(key.clone()) {
                return Err(GcmmError::data(domain_loc, domain_id, "duplicate domain id"));
            }
            if domain.objectives.is_empty() {
                return Err(GcmmError::data(domain_loc, &domain.name, "domain has no objectives"));
            }
            dataset.domains.push(Domain {
                key,
                id: domain_id.clone(),
                name: domain.name.clone(),
                description: domain.description.clone(),
                axis_id,
                score: 0.0,
            });

            for objective in &domain.objectives {
                let objective_id = objective.id.as_text();
                let objective_loc = format!("{domain_loc}, objective {objective_id}");
                dataset.objectives.push(Objective {
                    levels: levels_of(objective, &objective_loc)?,
                    assessment: assessment_of(objective, metric, &objective_loc)?,
                    id: objective_id,
                    name: objective.name.clone(),
                    description: objective.description.clone(),
                    domain_id: Some(domain_id.clone()),
                    axis_id,
                    comment: objective.comment.clone(),
                });
            }
        }
    }

    log::debug!(
        "Bulk payload: {} axes, {} domains, {} objectives",
        dataset.axes.len(),
        dataset.domains.len(),
        dataset.objectives.len()
    );
    Ok(dataset)
}
