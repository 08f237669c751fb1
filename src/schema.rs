//! Column layouts for the supported GCMM spreadsheet variants.
//!
//! The three layouts found in the wild share one decoder: each variant is a
//! list of [`ColumnSpec`]s mapping a header name and a fixed position to the
//! semantic [`ColumnRole`] the decoder reads from it, plus the [`Metric`] that
//! drives aggregation.

use std::fmt;
use std::str::FromStr;

/// Number of maturity levels per objective.
pub const LEVEL_COUNT: usize = 5;

/// Maturity level labels, index 0 = level 1.
pub const LEVEL_LABELS: [&str; LEVEL_COUNT] =
    ["Ad hoc", "Initiated", "Defined", "Managed", "Optimized"];

/// Spreadsheet layout variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaVariant {
    /// Single 0-5 evaluation score per objective
    Evaluation,
    /// Current profile / target profile pair per objective
    #[default]
    Profile,
    /// French-labelled layout produced by the spreadsheet export
    French,
}

impl SchemaVariant {
    pub const ALL: [SchemaVariant; 3] = [
        SchemaVariant::Evaluation,
        SchemaVariant::Profile,
        SchemaVariant::French,
    ];

    pub fn metric(self) -> Metric {
        match self {
            SchemaVariant::Profile => Metric::Profile,
            SchemaVariant::Evaluation | SchemaVariant::French => Metric::Evaluation,
        }
    }
}

impl fmt::Display for SchemaVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SchemaVariant::Evaluation => "evaluation",
            SchemaVariant::Profile => "profile",
            SchemaVariant::French => "french",
        };
        f.write_str(s)
    }
}

impl FromStr for SchemaVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "evaluation" | "simple" => Ok(SchemaVariant::Evaluation),
            "profile" => Ok(SchemaVariant::Profile),
            "french" | "fr" => Ok(SchemaVariant::French),
            other => Err(format!(
                "unknown schema variant '{other}' (expected evaluation, profile or french)"
            )),
        }
    }
}

/// Which objective field feeds the domain/axis averages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Evaluation,
    Profile,
}

/// What a column holds. Level indices are 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    AxisId,
    AxisName,
    DomainId,
    DomainName,
    DomainDescription,
    ObjectiveId,
    ObjectiveName,
    Description,
    Level(usize),
    Actionable(usize),
    Strategic(usize),
    Evaluation,
    Profile,
    TargetProfile,
    Comment,
}

/// One canonical column: header name, 0-based position, required flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub position: usize,
    pub required: bool,
    pub role: ColumnRole,
}

/// Ordered column layout of one variant.
#[derive(Debug, Clone)]
pub struct Schema {
    pub variant: SchemaVariant,
    pub columns: Vec<ColumnSpec>,
}

/// Header for the actionable recommendation of level `n` (1-based).
pub fn actionable_header(n: usize) -> String {
    format!("Actionable Recommendation for Level {n}")
}

/// Header for the strategic recommendation of level `n` (1-based).
pub fn strategic_header(n: usize) -> String {
    format!("Strategic Recommendation for Level {n}")
}

struct Builder {
    columns: Vec<ColumnSpec>,
}

impl Builder {
    fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    fn col(mut self, name: impl Into<String>, role: ColumnRole, required: bool) -> Self {
        let position = self.columns.len();
        self.columns.push(ColumnSpec {
            name: name.into(),
            position,
            required,
            role,
        });
        self
    }

    fn req(self, name: impl Into<String>, role: ColumnRole) -> Self {
        self.col(name, role, true)
    }

    fn levels(mut self, prefix: &str) -> Self {
        for (i, label) in LEVEL_LABELS.iter().enumerate() {
            self = self.req(format!("{prefix} {} ({label})", i + 1), ColumnRole::Level(i));
        }
        self
    }

    fn recommendation_blocks(mut self) -> Self {
        for i in 0..LEVEL_COUNT {
            self = self.col(actionable_header(i + 1), ColumnRole::Actionable(i), false);
        }
        for i in 0..LEVEL_COUNT {
            self = self.col(strategic_header(i + 1), ColumnRole::Strategic(i), false);
        }
        self
    }
}

impl Schema {
    pub fn for_variant(variant: SchemaVariant) -> Self {
        let columns = match variant {
            SchemaVariant::Evaluation => Builder::new()
                .req("#Axis", ColumnRole::AxisId)
                .req("Axis", ColumnRole::AxisName)
                .req("#Domain", ColumnRole::DomainId)
                .req("Domain", ColumnRole::DomainName)
                .req("Domain Description", ColumnRole::DomainDescription)
                .req("Obj. ID", ColumnRole::ObjectiveId)
                .req("Objective", ColumnRole::ObjectiveName)
                .req("Description", ColumnRole::Description)
                .levels("Level")
                .req("Evaluation", ColumnRole::Evaluation)
                .req("Comment", ColumnRole::Comment)
                .recommendation_blocks(),
            SchemaVariant::Profile => Builder::new()
                .req("#Axis", ColumnRole::AxisId)
                .req("Axis", ColumnRole::AxisName)
                .req("#Domain", ColumnRole::DomainId)
                .req("Domain", ColumnRole::DomainName)
                .req("Domain Description", ColumnRole::DomainDescription)
                .req("Obj. ID", ColumnRole::ObjectiveId)
                .req("Objective", ColumnRole::ObjectiveName)
                .req("Description", ColumnRole::Description)
                .levels("Level")
                .req("Profil", ColumnRole::Profile)
                .req("Target Profil", ColumnRole::TargetProfile)
                .req("Comment", ColumnRole::Comment)
                .recommendation_blocks(),
            SchemaVariant::French => {
                let mut b = Builder::new()
                    .req("Axe", ColumnRole::AxisId)
                    .req("Nom Axe", ColumnRole::AxisName)
                    .req("Domaine", ColumnRole::DomainId)
                    .req("Nom Domaine", ColumnRole::DomainName)
                    .req("Objectif", ColumnRole::ObjectiveId)
                    .req("Nom Objectif", ColumnRole::ObjectiveName)
                    .req("Description", ColumnRole::Description);
                // Interleaved: level text, then its two recommendations.
                for (i, label) in LEVEL_LABELS.iter().enumerate() {
                    b = b
                        .req(format!("Niveau {} ({label})", i + 1), ColumnRole::Level(i))
                        .req(format!("AR N{}", i + 1), ColumnRole::Actionable(i))
                        .req(format!("SR N{}", i + 1), ColumnRole::Strategic(i));
                }
                b.req("Evaluation", ColumnRole::Evaluation)
                    .req("Commentaire", ColumnRole::Comment)
            }
        };
        Schema {
            variant,
            columns: columns.columns,
        }
    }

    pub fn metric(&self) -> Metric {
        self.variant.metric()
    }

    pub fn required(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter().filter(|c| c.required)
    }

    pub fn required_len(&self) -> usize {
        self.required().count()
    }

    /// Position of the column carrying `role`, if the layout has one.
    pub fn position(&self, role: ColumnRole) -> Option<usize> {
        self.columns
            .iter()
            .find(|c| c.role == role)
            .map(|c| c.position)
    }

    pub fn header_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}
