//! Per-trap sample series
//!
//! `None` means "trap not reached this round", a legitimate outcome of
//! branch-dependent control flow, not an error.

use crate::domain::TrapId;
use std::collections::HashMap;

/// One measured value for a trap in one round.
pub type MeasurementSample = Option<i64>;

/// Ordered map `TrapId → samples`, one sample per round. Iteration follows
/// insertion order, which the protocol drives in ascending trap ID order.
#[derive(Debug, Clone, Default)]
pub struct MeasurementSeries {
    order: Vec<TrapId>,
    samples: HashMap<TrapId, Vec<MeasurementSample>>,
}

impl MeasurementSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sample to a trap's series, creating it on first use.
    pub fn push(&mut self, trap: TrapId, sample: MeasurementSample) {
        self.samples
            .entry(trap)
            .or_insert_with(|| {
                self.order.push(trap);
                Vec::new()
            })
            .push(sample);
    }

    pub fn get(&self, trap: TrapId) -> Option<&[MeasurementSample]> {
        self.samples.get(&trap).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TrapId, &[MeasurementSample])> {
        self.order.iter().map(move |id| (*id, self.samples[id].as_slice()))
    }

    /// Number of traps with at least one sample.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// The three per-kind series collected by one memory-mode run.
#[derive(Debug, Clone, Default)]
pub struct MemorySeriesSet {
    pub transient_deselect: MeasurementSeries,
    pub transient_reset: MeasurementSeries,
    pub persistent: MeasurementSeries,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_push_order_per_trap() {
        let mut s = MeasurementSeries::new();
        s.push(TrapId(3), Some(10));
        s.push(TrapId(2), None);
        s.push(TrapId(3), Some(20));

        let order: Vec<TrapId> = s.iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec![TrapId(3), TrapId(2)]);
        assert_eq!(s.get(TrapId(3)), Some(&[Some(10), Some(20)][..]));
        assert_eq!(s.get(TrapId(2)), Some(&[None][..]));
    }
}
