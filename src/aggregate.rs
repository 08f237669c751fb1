//! Score Aggregator.
//!
//! Domain and axis scores are plain means of each objective's metric value;
//! the global score is the mean of the axis scores rounded to one decimal.
//! Every derived field is rewritten on each call, so `recompute` is
//! idempotent and there is never a stale aggregate left behind.

use crate::model::{Dataset, RadarEntry, MAX_LEVEL};

/// Round to one decimal place on the exact binary value, ties to even
/// (`round(x, 1)` semantics: 2.25 → 2.2, 0.15 → 0.1).
pub fn round1(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    format!("{:.1}", value).parse().unwrap_or(value)
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Recompute domain, axis, global scores and the radar projection in place.
pub fn recompute(dataset: &mut Dataset) {
    let objectives = &dataset.objectives;

    for domain in dataset.domains.iter_mut() {
        domain.score = mean(
            objectives
                .iter()
                .filter(|o| {
                    o.axis_id == domain.axis_id
                        && o.domain_id.as_deref() == Some(domain.id.as_str())
                })
                .map(|o| o.assessment.metric_value()),
        )
        .unwrap_or(0.0);
    }

    for axis in dataset.axes.iter_mut() {
        axis.score = mean(
            objectives
                .iter()
                .filter(|o| o.axis_id == axis.id)
                .map(|o| o.assessment.metric_value()),
        )
        .unwrap_or(0.0);
    }

    dataset.global_score = mean(dataset.axes.iter().map(|a| a.score))
        .map(round1)
        .unwrap_or(0.0);

    dataset.radar_data = radar_data(dataset);
}

/// One radar entry per axis, in axis order.
pub fn radar_data(dataset: &Dataset) -> Vec<RadarEntry> {
    dataset
        .axes
        .iter()
        .map(|axis| RadarEntry {
            axis: format!("Axe {}: {}", axis.id, axis.name),
            score: axis.score,
            full_mark: MAX_LEVEL,
            color: axis.color.clone(),
        })
        .collect()
}
