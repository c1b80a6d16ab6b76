//! Measurement analysis
//!
//! Turns the raw per-trap series of a finished run into report-ready rows:
//! outlier-filtered statistics, a smoothed series and a heatmap intensity
//! per trap.

pub mod heatmap;
pub mod statistics;

pub use heatmap::{memory_heatmap, time_heatmap_value, MemoryHeat};
pub use statistics::{
    filter_outliers, moving_average, AnalysisConfig, FilteredSeries, TrapStatistics,
};

use crate::domain::TrapId;
use crate::protocol::{MeasurementSample, Measurements, ProfilingResult};

/// One trap's analysed time series. Samples are converted to the run's
/// report unit before statistics, with outliers blanked to `None`.
#[derive(Debug, Clone)]
pub struct TrapAnalysis {
    pub trap: TrapId,
    pub name: String,
    pub samples: Vec<MeasurementSample>,
    pub statistics: TrapStatistics,
    pub moving_average: Vec<Option<f64>>,
    pub heat: f64,
}

/// Analyses a time-mode result in trap table order. Empty for memory runs.
pub fn analyze_time(result: &ProfilingResult, config: &AnalysisConfig) -> Vec<TrapAnalysis> {
    let Measurements::Time(series) = &result.measurements else {
        return Vec::new();
    };

    result
        .trap_names
        .iter()
        .map(|(trap, name)| {
            let raw = series.get(*trap).unwrap_or(&[]);
            let converted: Vec<MeasurementSample> = raw
                .iter()
                .map(|s| s.map(|v| result.time_unit.convert(v)))
                .collect();
            let filtered = filter_outliers(&converted, config.outlier_z_score);
            let heat = time_heatmap_value(&filtered.samples, result.input_division);
            TrapAnalysis {
                trap: *trap,
                name: name.clone(),
                moving_average: moving_average(&filtered.samples, config.moving_average_window),
                samples: filtered.samples,
                statistics: filtered.stats,
                heat,
            }
        })
        .collect()
}

/// One trap's memory measurements with the derived consumption heat.
#[derive(Debug, Clone)]
pub struct MemoryAnalysis {
    pub trap: TrapId,
    pub name: String,
    pub free_transient_deselect: Option<i64>,
    pub free_transient_reset: Option<i64>,
    pub free_persistent: Option<i64>,
    pub heat: MemoryHeat,
}

/// Analyses a memory-mode result in trap table order. Empty for time runs.
pub fn analyze_memory(result: &ProfilingResult) -> Vec<MemoryAnalysis> {
    let Measurements::Memory(set) = &result.measurements else {
        return Vec::new();
    };

    let heat = memory_heatmap(set);
    result
        .trap_names
        .iter()
        .zip(heat)
        .map(|((trap, name), (_, heat))| MemoryAnalysis {
            trap: *trap,
            name: name.clone(),
            free_transient_deselect: single(set.transient_deselect.get(*trap)),
            free_transient_reset: single(set.transient_reset.get(*trap)),
            free_persistent: single(set.persistent.get(*trap)),
            heat,
        })
        .collect()
}

fn single(samples: Option<&[MeasurementSample]>) -> Option<i64> {
    samples.and_then(|s| s.first().copied().flatten())
}
