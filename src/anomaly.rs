//! Z-score spike detection over the daily report-count series.

use crate::models::{Anomaly, DailyCount};

pub const DEFAULT_Z_THRESHOLD: f64 = 3.0;

/// Sample mean and sample standard deviation (n - 1 denominator).
///
/// Returns `None` when fewer than two points exist.
pub fn sample_stats(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some((mean, variance.sqrt()))
}

/// Standardised deviation of every point, or `None` for a degenerate series
/// (fewer than two points or zero spread).
pub fn z_scores(values: &[f64]) -> Option<Vec<f64>> {
    let (mean, stddev) = sample_stats(values)?;
    if !stddev.is_finite() || stddev <= f64::EPSILON * mean.abs().max(1.0) {
        return None;
    }
    Some(values.iter().map(|v| (v - mean) / stddev).collect())
}

/// Days whose report count sits more than `threshold` standard deviations
/// from the series mean.
pub fn detect_spikes(series: &[DailyCount], threshold: f64) -> Vec<Anomaly> {
    let counts: Vec<f64> = series.iter().map(|d| d.report_count as f64).collect();
    let Some(scores) = z_scores(&counts) else {
        tracing::debug!(points = series.len(), "series too flat or short for z-scores");
        return Vec::new();
    };

    series
        .iter()
        .zip(scores)
        .filter(|(_, z)| z.abs() > threshold)
        .map(|(day, z_score)| Anomaly {
            date: day.date,
            report_count: day.report_count,
            z_score,
        })
        .collect()
}
