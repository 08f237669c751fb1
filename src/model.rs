//! The three-level GCMM model: Axis → Domain → Objective.
//!
//! Scores on [`Axis`], [`Domain`] and [`Dataset`] are derived; they are only
//! ever written by [`crate::aggregate::recompute`]. Non-finite scores are
//! serialized as `null`.

use serde::{Serialize, Serializer};

/// Upper bound of the maturity scale, used as the radar chart ceiling.
pub const MAX_LEVEL: u8 = 5;

pub(crate) fn serialize_finite<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        s.serialize_f64(*value)
    } else {
        s.serialize_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Axis {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub color: String,
    #[serde(serialize_with = "serialize_finite")]
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    /// `"{axis_id}-{id}"`, unique per dataset
    pub key: String,
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub axis_id: i64,
    #[serde(serialize_with = "serialize_finite")]
    pub score: f64,
}

impl Domain {
    pub fn make_key(axis_id: i64, domain_id: &str) -> String {
        format!("{}-{}", axis_id, domain_id)
    }
}

/// One maturity level of an objective (1-based `level`).
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Level {
    pub level: u8,
    pub description: String,
    pub actionable: String,
    pub strategic: String,
}

/// How an objective is assessed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Assessment {
    /// Single 0-5 score
    Score {
        #[serde(serialize_with = "serialize_finite")]
        evaluation: f64,
    },
    /// Current and desired maturity level
    Profile {
        profile: u8,
        #[serde(rename = "targetProfile")]
        target_profile: u8,
    },
}

impl Assessment {
    /// Value averaged into domain and axis scores.
    pub fn metric_value(&self) -> f64 {
        match self {
            Assessment::Score { evaluation } => *evaluation,
            Assessment::Profile { profile, .. } => f64::from(*profile),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Objective {
    pub id: String,
    pub name: String,
    pub description: String,
    pub domain_id: Option<String>,
    pub axis_id: i64,
    pub levels: Vec<Level>,
    #[serde(flatten)]
    pub assessment: Assessment,
    pub comment: String,
}

/// Chart-ready projection of one axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RadarEntry {
    pub axis: String,
    #[serde(serialize_with = "serialize_finite")]
    pub score: f64,
    pub full_mark: u8,
    pub color: String,
}

/// Root of the model. Collections keep first-seen order.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub axes: Vec<Axis>,
    pub domains: Vec<Domain>,
    pub objectives: Vec<Objective>,
    #[serde(serialize_with = "serialize_finite")]
    pub global_score: f64,
    pub radar_data: Vec<RadarEntry>,
}

impl Dataset {
    pub fn is_empty(&self) -> bool {
        self.axes.is_empty() && self.domains.is_empty() && self.objectives.is_empty()
    }

    pub fn axis(&self, id: i64) -> Option<&Axis> {
        self.axes.iter().find(|a| a.id == id)
    }

    /// Domains belonging to an axis, in dataset order.
    pub fn domains_of(&self, axis_id: i64) -> impl Iterator<Item = &Domain> {
        self.domains.iter().filter(move |d| d.axis_id == axis_id)
    }

    /// Objectives under the domain `(axis_id, domain_id)`.
    pub fn objectives_of<'a>(&'a self, domain: &'a Domain) -> impl Iterator<Item = &'a Objective> {
        self.objectives.iter().filter(move |o| {
            o.axis_id == domain.axis_id && o.domain_id.as_deref() == Some(domain.id.as_str())
        })
    }

    /// First objective with the given id. Ids are not unique.
    pub fn objective_mut(&mut self, id: &str) -> Option<&mut Objective> {
        self.objectives.iter_mut().find(|o| o.id == id)
    }
}
