//! Per-trap heatmap values
//!
//! The heatmap condenses each trap's series into a single intensity so that
//! a rendering of the instrumented source can colour every checkpoint.

use crate::domain::{InputDivision, TrapId};
use crate::protocol::{MeasurementSample, MemorySeriesSet};
use serde::Serialize;

/// Heat of one trap in time mode.
///
/// Without an input division this is the mean of the retained samples.
/// With a division it is the absolute difference between the average cost of
/// the two input classes (the first and second half of the rounds), which
/// highlights input-dependent code. A trap no round ever reached has no
/// meaningful value and yields NaN so renderers can style it distinctly from
/// a cheap trap.
pub fn time_heatmap_value(samples: &[MeasurementSample], division: InputDivision) -> f64 {
    if samples.iter().all(Option::is_none) {
        return f64::NAN;
    }
    let value = match division {
        InputDivision::None => mean(samples),
        _ => {
            let mid = samples.len() / 2;
            (mean(&samples[..mid]) - mean(&samples[mid..])).abs()
        }
    };
    round2(value)
}

fn mean(samples: &[MeasurementSample]) -> f64 {
    let values: Vec<f64> = samples.iter().flatten().map(|&v| v as f64).collect();
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Heat of one trap in memory mode: how much memory the segment ending at
/// the trap consumed, derived by differencing free-memory counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryHeat {
    /// Worst-case transient consumption, the larger of the two transient
    /// kinds' drops.
    pub transient: i64,
    pub persistent: i64,
}

/// Computes per-trap memory heat in table order.
///
/// Each trap is compared against the previous trap whose counters were all
/// recorded; unreached traps and the first reachable trap report zero
/// consumption. The baseline only advances past fully-recorded traps, a
/// partially-recorded trap cannot serve as a difference baseline.
pub fn memory_heatmap(set: &MemorySeriesSet) -> Vec<(TrapId, MemoryHeat)> {
    let mut previous: Option<(i64, i64, i64)> = None;
    let mut heat = Vec::new();

    for (trap, td) in set.transient_deselect.iter() {
        let current = (
            first(td),
            first(set.transient_reset.get(trap).unwrap_or(&[])),
            first(set.persistent.get(trap).unwrap_or(&[])),
        );
        let (value, next_baseline) = match (current, previous) {
            ((Some(td), Some(tr), Some(p)), Some((prev_td, prev_tr, prev_p))) => (
                MemoryHeat {
                    transient: (prev_td - td).max(prev_tr - tr),
                    persistent: prev_p - p,
                },
                Some((td, tr, p)),
            ),
            ((Some(td), Some(tr), Some(p)), None) => {
                (MemoryHeat { transient: 0, persistent: 0 }, Some((td, tr, p)))
            }
            _ => (MemoryHeat { transient: 0, persistent: 0 }, previous),
        };
        heat.push((trap, value));
        previous = next_baseline;
    }
    heat
}

fn first(samples: &[MeasurementSample]) -> Option<i64> {
    samples.first().copied().flatten()
}
