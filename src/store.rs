//! In-memory store: the single live dataset behind one coarse lock.
//!
//! Uploads and bulk saves compute a complete [`Dataset`] outside the lock
//! and swap it in only on success, so a failing request leaves the previous
//! state untouched. Evaluate mutates in place and recomputes every
//! aggregate before the lock is released.

use crate::aggregate::recompute;
use crate::bulk::{build_dataset, BulkPayload};
use crate::config::ToolkitConfig;
use crate::error::{GcmmError, Result};
use crate::flatten::{flatten, flatten_axis, Record};
use crate::hierarchy::build;
use crate::model::{Assessment, Dataset, Objective, RadarEntry, MAX_LEVEL};
use crate::parser::{decode, validate};
use crate::report::write_docx;
use crate::schema::Metric;
use crate::sheet::read_table;
use crate::xlsx_export::{template_xlsx, write_csv, write_xlsx};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};

/// Counts reported after a successful upload or bulk save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummary {
    /// Data rows after the header, skipped rows included
    pub processed_rows: usize,
    pub axes: usize,
    pub domains: usize,
    pub objectives: usize,
}

impl UploadSummary {
    fn of(dataset: &Dataset, processed_rows: usize) -> Self {
        Self {
            processed_rows,
            axes: dataset.axes.len(),
            domains: dataset.domains.len(),
            objectives: dataset.objectives.len(),
        }
    }
}

/// New assessment for one objective. The shape must match the dataset's
/// metric.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EvaluationUpdate {
    Profile {
        profile: i64,
        #[serde(rename = "targetProfile")]
        target_profile: i64,
        #[serde(default)]
        comment: Option<String>,
    },
    Score {
        evaluation: f64,
        #[serde(default)]
        comment: Option<String>,
    },
}

impl EvaluationUpdate {
    fn comment(&self) -> Option<&str> {
        match self {
            EvaluationUpdate::Profile { comment, .. } | EvaluationUpdate::Score { comment, .. } => {
                comment.as_deref()
            }
        }
    }

    /// Check ranges and shape, returning the assessment to store.
    pub fn to_assessment(&self, metric: Metric, objective_id: &str) -> Result<Assessment> {
        let location = format!("objective {objective_id}");
        let max = i64::from(MAX_LEVEL);
        match (self, metric) {
            (EvaluationUpdate::Score { evaluation, .. }, Metric::Evaluation) => {
                if !evaluation.is_finite() || !(0.0..=f64::from(MAX_LEVEL)).contains(evaluation) {
                    return Err(GcmmError::data(
                        location,
                        evaluation.to_string(),
                        "evaluation must be between 0 and 5",
                    ));
                }
                Ok(Assessment::Score {
                    evaluation: *evaluation,
                })
            }
            (
                EvaluationUpdate::Profile {
                    profile,
                    target_profile,
                    ..
                },
                Metric::Profile,
            ) => {
                if !(1..=max).contains(profile) {
                    return Err(GcmmError::data(
                        location,
                        profile.to_string(),
                        "profile must be between 1 and 5",
                    ));
                }
                if target_profile < profile || *target_profile > max {
                    return Err(GcmmError::data(
                        location,
                        target_profile.to_string(),
                        "target profile must be at least the profile and at most 5",
                    ));
                }
                Ok(Assessment::Profile {
                    profile: *profile as u8,
                    target_profile: *target_profile as u8,
                })
            }
            (EvaluationUpdate::Score { .. }, Metric::Profile) => Err(GcmmError::data(
                location,
                "evaluation",
                "this dataset is assessed by profile and targetProfile",
            )),
            (EvaluationUpdate::Profile { .. }, Metric::Evaluation) => Err(GcmmError::data(
                location,
                "profile",
                "this dataset is assessed by evaluation score",
            )),
        }
    }
}

/// Result of a single-objective evaluate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateOutcome {
    pub objective: Objective,
    pub global_score: f64,
    pub radar_data: Vec<RadarEntry>,
}

/// Serialize to JSON with every non-finite number as `null`.
///
/// Model scores already go through `serialize_finite`; any other float
/// is mapped to `null` by `serde_json::to_value` itself.
pub fn handle_nulls<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Owns the live dataset and the configuration used to build and export it.
#[derive(Debug, Default)]
pub struct Store {
    config: ToolkitConfig,
    inner: Mutex<Dataset>,
}

impl Store {
    pub fn new(config: ToolkitConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Dataset::default()),
        }
    }

    pub fn config(&self) -> &ToolkitConfig {
        &self.config
    }

    fn lock(&self) -> Result<MutexGuard<'_, Dataset>> {
        self.inner
            .lock()
            .map_err(|_| GcmmError::Internal("dataset lock poisoned".to_string()))
    }

    fn load(&self, filename: &str, bytes: &[u8]) -> Result<(Dataset, usize)> {
        let schema = self.config.schema();
        let table = read_table(filename, bytes)?;
        if table.is_empty() {
            return Err(GcmmError::Format(format!("{filename} contains no rows")));
        }
        validate(&schema, &table)?;
        if table.data_rows().is_empty() {
            return Err(GcmmError::Format(format!(
                "{filename}: no data found after the header row"
            )));
        }
        let rows = decode(&schema, &table)?;
        let mut dataset = build(&rows, &self.config);
        recompute(&mut dataset);
        Ok((dataset, table.data_rows().len()))
    }

    /// Parse, build and aggregate a spreadsheet, then replace the dataset.
    pub fn upload(&self, filename: &str, bytes: &[u8]) -> Result<UploadSummary> {
        match self.load(filename, bytes) {
            Ok((dataset, rows)) => {
                let summary = UploadSummary::of(&dataset, rows);
                *self.lock()? = dataset;
                log::info!(
                    "Loaded {}: {} rows, {} axes, {} domains, {} objectives",
                    filename,
                    summary.processed_rows,
                    summary.axes,
                    summary.domains,
                    summary.objectives
                );
                Ok(summary)
            }
            Err(e) => {
                log::warn!("Upload of {} rejected: {}", filename, e);
                Err(e)
            }
        }
    }

    /// Replace the dataset with a client-authored hierarchy.
    pub fn bulk_save(&self, payload: &BulkPayload) -> Result<UploadSummary> {
        let mut dataset = build_dataset(payload, &self.config).map_err(|e| {
            log::warn!("Bulk save rejected: {}", e);
            e
        })?;
        recompute(&mut dataset);
        let summary = UploadSummary::of(&dataset, dataset.objectives.len());
        *self.lock()? = dataset;
        log::info!(
            "Bulk save: {} axes, {} domains, {} objectives",
            summary.axes,
            summary.domains,
            summary.objectives
        );
        Ok(summary)
    }

    /// Update one objective and recompute all aggregates.
    ///
    /// Objective ids are not unique; the first match is updated.
    pub fn evaluate(&self, objective_id: &str, update: &EvaluationUpdate) -> Result<EvaluateOutcome> {
        let mut dataset = self.lock()?;
        if !dataset.objectives.iter().any(|o| o.id == objective_id) {
            return Err(GcmmError::not_found("Objective", objective_id));
        }
        let assessment = update.to_assessment(self.config.variant.metric(), objective_id)?;

        let objective = dataset
            .objective_mut(objective_id)
            .ok_or_else(|| GcmmError::not_found("Objective", objective_id))?;
        objective.assessment = assessment;
        if let Some(comment) = update.comment() {
            objective.comment = comment.to_string();
        }
        let objective = objective.clone();

        recompute(&mut dataset);
        log::debug!(
            "Evaluated {}: global score now {}",
            objective_id,
            dataset.global_score
        );
        Ok(EvaluateOutcome {
            objective,
            global_score: dataset.global_score,
            radar_data: dataset.radar_data.clone(),
        })
    }

    // ─── Read projections ───────────────────────────────────────────────

    pub fn snapshot(&self) -> Result<Dataset> {
        Ok(self.lock()?.clone())
    }

    /// Whole dataset as JSON.
    pub fn read(&self) -> Result<Value> {
        handle_nulls(&*self.lock()?)
    }

    pub fn axes(&self) -> Result<Value> {
        handle_nulls(&self.lock()?.axes)
    }

    pub fn domains(&self, axis_id: i64) -> Result<Value> {
        let dataset = self.lock()?;
        let domains: Vec<_> = dataset.domains_of(axis_id).collect();
        handle_nulls(&domains)
    }

    /// Objectives whose domain id matches, across all axes.
    pub fn objectives(&self, domain_id: &str) -> Result<Value> {
        let dataset = self.lock()?;
        let objectives: Vec<_> = dataset
            .objectives
            .iter()
            .filter(|o| o.domain_id.as_deref() == Some(domain_id))
            .collect();
        handle_nulls(&objectives)
    }

    // ─── Exports ────────────────────────────────────────────────────────

    fn records(&self, axis_id: Option<i64>) -> Result<Vec<Record>> {
        let dataset = self.lock()?;
        match axis_id {
            Some(id) => flatten_axis(&dataset, id),
            None => Ok(flatten(&dataset)),
        }
    }

    /// Spreadsheet export of every objective, or of one axis.
    pub fn export_xlsx(&self, axis_id: Option<i64>) -> Result<Vec<u8>> {
        let records = self.records(axis_id)?;
        log::debug!("Exporting {} records to xlsx", records.len());
        write_xlsx(&self.config.schema(), &records)
    }

    pub fn export_csv(&self, axis_id: Option<i64>) -> Result<Vec<u8>> {
        let records = self.records(axis_id)?;
        write_csv(&self.config.schema(), &records)
    }

    pub fn export_report(&self) -> Result<Vec<u8>> {
        let dataset = self.snapshot()?;
        write_docx(&dataset, &self.config)
    }

    /// Blank upload template; does not touch the dataset.
    pub fn template(&self) -> Result<Vec<u8>> {
        template_xlsx(&self.config.schema())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::schema::SchemaVariant;

    const HEADER: &str = "#Axis,Axis,#Domain,Domain,Domain Description,Obj. ID,Objective,Description,\
Level 1 (Ad hoc),Level 2 (Initiated),Level 3 (Defined),Level 4 (Managed),Level 5 (Optimized),Evaluation,Comment";

    fn csv(rows: &[&str]) -> Vec<u8> {
        let mut text = String::from(HEADER);
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text.into_bytes()
    }

    fn evaluation_store() -> Store {
        Store::new(ToolkitConfig::default().with_variant(SchemaVariant::Evaluation))
    }

    #[test]
    fn test_upload_and_read_projections() {
        let store = evaluation_store();
        let summary = store
            .upload(
                "gcmm.csv",
                &csv(&[
                    "1,Legal,A,Laws,,1.A.1,Access,,l1,l2,l3,l4,l5,3,",
                    "1,Legal,A,Laws,,1.A.2,Audit,,l1,l2,l3,l4,l5,5,ok",
                    "2,Tech,A,Infra,,2.A.1,Backup,,l1,l2,l3,l4,l5,1,",
                ]),
            )
            .unwrap();
        assert_eq!(
            summary,
            UploadSummary {
                processed_rows: 3,
                axes: 2,
                domains: 2,
                objectives: 3
            }
        );

        let data = store.read().unwrap();
        assert_eq!(data["globalScore"], 2.5);
        assert_eq!(data["radarData"][0]["axis"], "Axe 1: Legal");
        assert_eq!(store.domains(1).unwrap().as_array().unwrap().len(), 1);
        assert_eq!(store.objectives("A").unwrap().as_array().unwrap().len(), 3);
        assert_eq!(store.axes().unwrap()[1]["color"], "#DC3912");
    }

    #[test]
    fn test_processed_rows_counts_skipped_rows() {
        let store = evaluation_store();
        let summary = store
            .upload(
                "gcmm.csv",
                &csv(&[
                    "1,Legal,A,Laws,,o1,Access,,l1,l2,l3,l4,l5,3,",
                    "0,Ghost,A,Laws,,o2,Access,,l1,l2,l3,l4,l5,3,",
                    ",,,,,,,,,,,,,,",
                ]),
            )
            .unwrap();
        assert_eq!(summary.processed_rows, 3);
        assert_eq!(summary.objectives, 1);
    }

    #[test]
    fn test_handle_nulls_maps_non_finite_values() {
        assert_eq!(handle_nulls(&f64::NAN).unwrap(), Value::Null);
        assert_eq!(
            handle_nulls(&vec![1.5, f64::INFINITY]).unwrap(),
            serde_json::json!([1.5, null])
        );
        let dataset = Dataset {
            global_score: f64::NAN,
            ..Dataset::default()
        };
        assert!(handle_nulls(&dataset).unwrap()["globalScore"].is_null());
    }

    #[test]
    fn test_failed_upload_keeps_previous_dataset() {
        let store = evaluation_store();
        store
            .upload("gcmm.csv", &csv(&["1,Legal,A,Laws,,o1,Access,,l1,l2,l3,l4,l5,3,"]))
            .unwrap();
        let before = store.snapshot().unwrap();

        let bad = csv(&["x,Legal,A,Laws,,o1,Access,,l1,l2,l3,l4,l5,3,"]);
        assert_eq!(store.upload("gcmm.csv", &bad).unwrap_err().kind(), ErrorKind::Data);
        assert_eq!(
            store.upload("gcmm.xls", b"").unwrap_err().kind(),
            ErrorKind::Format
        );
        assert_eq!(
            store.upload("gcmm.csv", HEADER.as_bytes()).unwrap_err().kind(),
            ErrorKind::Format
        );
        assert_eq!(store.snapshot().unwrap(), before);
    }

    #[test]
    fn test_evaluate_recomputes() {
        let store = evaluation_store();
        store
            .upload(
                "gcmm.csv",
                &csv(&[
                    "1,Legal,A,Laws,,o1,Access,,l1,l2,l3,l4,l5,3,",
                    "1,Legal,A,Laws,,o2,Audit,,l1,l2,l3,l4,l5,5,",
                ]),
            )
            .unwrap();
        let outcome = store
            .evaluate(
                "o1",
                &EvaluationUpdate::Score {
                    evaluation: 1.0,
                    comment: Some("revisited".into()),
                },
            )
            .unwrap();
        assert_eq!(outcome.global_score, 3.0);
        assert_eq!(outcome.radar_data[0].score, 3.0);
        assert_eq!(outcome.objective.comment, "revisited");
        assert_eq!(store.snapshot().unwrap().domains[0].score, 3.0);
    }

    #[test]
    fn test_evaluate_errors() {
        let store = evaluation_store();
        store
            .upload("gcmm.csv", &csv(&["1,Legal,A,Laws,,o1,Access,,l1,l2,l3,l4,l5,3,"]))
            .unwrap();
        let score = EvaluationUpdate::Score {
            evaluation: 2.0,
            comment: None,
        };
        assert_eq!(
            store.evaluate("nope", &score).unwrap_err().kind(),
            ErrorKind::NotFound
        );

        let wrong_shape = EvaluationUpdate::Profile {
            profile: 2,
            target_profile: 3,
            comment: None,
        };
        assert_eq!(
            store.evaluate("o1", &wrong_shape).unwrap_err().kind(),
            ErrorKind::Data
        );

        let out_of_range = EvaluationUpdate::Score {
            evaluation: 5.5,
            comment: None,
        };
        assert_eq!(
            store.evaluate("o1", &out_of_range).unwrap_err().kind(),
            ErrorKind::Data
        );
        assert_eq!(store.snapshot().unwrap().global_score, 3.0);
    }

    #[test]
    fn test_profile_update_rules() {
        let metric = Metric::Profile;
        let update = |p, t| EvaluationUpdate::Profile {
            profile: p,
            target_profile: t,
            comment: None,
        };
        assert!(update(2, 4).to_assessment(metric, "o").is_ok());
        assert!(update(3, 3).to_assessment(metric, "o").is_ok());
        assert!(update(0, 3).to_assessment(metric, "o").is_err());
        assert!(update(4, 3).to_assessment(metric, "o").is_err());
        assert!(update(4, 6).to_assessment(metric, "o").is_err());
    }

    #[test]
    fn test_evaluation_update_json_shapes() {
        let update: EvaluationUpdate =
            serde_json::from_str(r#"{"profile": 2, "targetProfile": 4}"#).unwrap();
        assert!(matches!(update, EvaluationUpdate::Profile { profile: 2, .. }));
        let update: EvaluationUpdate =
            serde_json::from_str(r#"{"evaluation": 3.5, "comment": "x"}"#).unwrap();
        assert_eq!(update.comment(), Some("x"));
    }

    #[test]
    fn test_export_unknown_axis() {
        let store = evaluation_store();
        store
            .upload("gcmm.csv", &csv(&["1,Legal,A,Laws,,o1,Access,,l1,l2,l3,l4,l5,3,"]))
            .unwrap();
        assert!(store.export_xlsx(Some(1)).is_ok());
        assert_eq!(
            store.export_xlsx(Some(7)).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}
