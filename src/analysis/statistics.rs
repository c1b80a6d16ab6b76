//! Descriptive statistics over per-trap sample series
//!
//! Raw time samples include sporadic transport hiccups that would dominate a
//! plain mean, so statistics are computed after a z-score outlier filter.
//! Missing samples (`None`) are legitimate "not reached this round" outcomes
//! and are never counted as outliers.

use crate::protocol::MeasurementSample;
use serde::Serialize;

/// Tunables of the statistics pass.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisConfig {
    /// Samples farther than this many sample standard deviations from the
    /// mean are discarded.
    pub outlier_z_score: f64,
    /// Trailing window length of the smoothed series.
    pub moving_average_window: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { outlier_z_score: 3.0, moving_average_window: 10 }
    }
}

/// Summary of one trap's retained samples.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrapStatistics {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    /// Rounds that reached the trap, counted before outlier removal.
    pub reachable_count: usize,
    pub outlier_count: usize,
}

/// A series with its outliers blanked to `None` plus the recomputed summary.
#[derive(Debug, Clone)]
pub struct FilteredSeries {
    pub samples: Vec<MeasurementSample>,
    pub stats: TrapStatistics,
}

/// Removes z-score outliers and summarises what remains.
///
/// With one or zero reachable samples there is nothing to compare against,
/// so no filtering happens; an all-missing series yields NaN statistics.
pub fn filter_outliers(samples: &[MeasurementSample], z_threshold: f64) -> FilteredSeries {
    let reachable: Vec<f64> = samples.iter().flatten().map(|&v| v as f64).collect();
    let reachable_count = reachable.len();

    if reachable_count <= 1 {
        let stats = summarise(&reachable, reachable_count, 0);
        return FilteredSeries { samples: samples.to_vec(), stats };
    }

    let mean = reachable.iter().sum::<f64>() / reachable_count as f64;
    let std_dev = sample_std_dev(&reachable, mean);

    let is_outlier = |v: i64| {
        std_dev > 0.0 && ((v as f64 - mean) / std_dev).abs() > z_threshold
    };
    let filtered: Vec<MeasurementSample> = samples
        .iter()
        .map(|s| s.filter(|&v| !is_outlier(v)))
        .collect();

    let retained: Vec<f64> = filtered.iter().flatten().map(|&v| v as f64).collect();
    let outlier_count = reachable_count - retained.len();
    let stats = summarise(&retained, reachable_count, outlier_count);
    FilteredSeries { samples: filtered, stats }
}

fn summarise(values: &[f64], reachable_count: usize, outlier_count: usize) -> TrapStatistics {
    if values.is_empty() {
        return TrapStatistics {
            mean: f64::NAN,
            std_dev: f64::NAN,
            min: f64::NAN,
            max: f64::NAN,
            reachable_count,
            outlier_count,
        };
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    TrapStatistics {
        mean,
        std_dev: sample_std_dev(values, mean),
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        reachable_count,
        outlier_count,
    }
}

/// Sample standard deviation (n − 1 denominator); zero for a single value.
fn sample_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
        / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Trailing moving average of up to `window` recent samples.
///
/// A missing sample clears the window: averaging across an unreached round
/// would blend unrelated execution paths.
pub fn moving_average(samples: &[MeasurementSample], window: usize) -> Vec<Option<f64>> {
    let mut recent: Vec<f64> = Vec::with_capacity(window);
    samples
        .iter()
        .map(|sample| match sample {
            None => {
                recent.clear();
                None
            }
            Some(v) => {
                if recent.len() == window {
                    recent.remove(0);
                }
                recent.push(*v as f64);
                Some(recent.iter().sum::<f64>() / recent.len() as f64)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_series_needs_a_lower_threshold() {
        // at six samples one huge value cannot exceed z = 3 by construction,
        // the filter only catches it with a tighter threshold
        let samples = vec![Some(10), Some(11), Some(9), Some(10), Some(1000), Some(10)];

        let default = filter_outliers(&samples, 3.0);
        assert_eq!(default.stats.outlier_count, 0);

        let tight = filter_outliers(&samples, 2.0);
        assert_eq!(tight.stats.outlier_count, 1);
        assert_eq!(tight.stats.reachable_count, 6);
        assert_eq!(tight.samples[4], None);
        assert_eq!(tight.stats.mean, 10.0);
    }

    #[test]
    fn default_threshold_catches_outliers_in_longer_series() {
        let mut samples: Vec<Option<i64>> = vec![Some(10); 11];
        samples.push(Some(1000));
        let filtered = filter_outliers(&samples, 3.0);
        assert_eq!(filtered.stats.outlier_count, 1);
        assert_eq!(filtered.stats.mean, 10.0);
        assert_eq!(filtered.stats.std_dev, 0.0);
    }

    #[test]
    fn reachable_count_ignores_missing_but_not_outliers() {
        let samples = vec![Some(10), None, Some(10), None, Some(10)];
        let filtered = filter_outliers(&samples, 3.0);
        assert_eq!(filtered.stats.reachable_count, 3);
        assert_eq!(filtered.stats.outlier_count, 0);
        assert_eq!(filtered.stats.min, 10.0);
        assert_eq!(filtered.stats.max, 10.0);
    }

    #[test]
    fn single_sample_is_never_filtered() {
        let filtered = filter_outliers(&[Some(999)], 3.0);
        assert_eq!(filtered.stats.outlier_count, 0);
        assert_eq!(filtered.stats.mean, 999.0);
        assert_eq!(filtered.stats.std_dev, 0.0);
    }

    #[test]
    fn empty_series_yields_nan_stats() {
        let filtered = filter_outliers(&[None, None], 3.0);
        assert!(filtered.stats.mean.is_nan());
        assert_eq!(filtered.stats.reachable_count, 0);
    }

    #[test]
    fn moving_average_clears_on_missing_sample() {
        let samples = vec![Some(10), Some(20), None, Some(30)];
        let avg = moving_average(&samples, 10);
        assert_eq!(avg, vec![Some(10.0), Some(15.0), None, Some(30.0)]);
    }

    #[test]
    fn moving_average_window_slides() {
        let samples = vec![Some(1), Some(2), Some(3), Some(4)];
        let avg = moving_average(&samples, 2);
        assert_eq!(avg, vec![Some(1.0), Some(1.5), Some(2.5), Some(3.5)]);
    }
}
