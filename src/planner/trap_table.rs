//! Ordered trap table shared by the packager and the measurement protocol.

use crate::domain::{ConfigError, TrapId, PERF_START};
use serde::Serialize;
use std::collections::HashMap;

/// One checkpoint planned into the profiled code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trap {
    pub id: TrapId,
    /// Stable field-like name, e.g. `TRAP_Example_process_3`.
    pub name: String,
    pub owner_signature: String,
    pub is_first_of_function: bool,
}

/// Ordered map `TrapId → Trap`, built once at plan time and immutable
/// afterwards. Iteration order is insertion order, which by planner
/// construction is ascending ID order within a function.
#[derive(Debug, Clone, Serialize)]
pub struct TrapTable {
    traps: Vec<Trap>,
    #[serde(skip)]
    index: HashMap<TrapId, usize>,
}

impl TrapTable {
    pub fn from_traps(traps: Vec<Trap>) -> Result<Self, ConfigError> {
        let mut index = HashMap::with_capacity(traps.len());
        for (pos, trap) in traps.iter().enumerate() {
            if index.insert(trap.id, pos).is_some() {
                return Err(ConfigError::DuplicateTrap(trap.id));
            }
        }
        Ok(Self { traps, index })
    }

    pub fn get(&self, id: TrapId) -> Option<&Trap> {
        self.index.get(&id).map(|&pos| &self.traps[pos])
    }

    /// Position of a trap in table order; the memory recorder buffer is
    /// indexed by this slot.
    pub fn slot(&self, id: TrapId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Human-readable name, covering the reserved sentinel.
    pub fn trap_name(&self, id: TrapId) -> String {
        if id == PERF_START {
            return "PERF_START".to_string();
        }
        self.get(id).map_or_else(|| id.to_string(), |t| t.name.clone())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trap> {
        self.traps.iter()
    }

    pub fn len(&self) -> usize {
        self.traps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traps.is_empty()
    }
}

/// First trap ID usable by the function occupying `slot`.
///
/// The global 16-bit ID space is partitioned per function by a fixed stride;
/// slot 0 starts immediately after the reserved sentinel.
pub fn base_for_slot(slot: u16, max_traps_per_function: u16) -> Result<TrapId, ConfigError> {
    let base = u32::from(PERF_START.0) + u32::from(slot) * u32::from(max_traps_per_function);
    // the last trap of this slot must still fit
    let last = base + u32::from(max_traps_per_function);
    if last > u32::from(u16::MAX) {
        return Err(ConfigError::TrapIdOverflow { slot });
    }
    Ok(TrapId(base as u16))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trap(id: u16, name: &str) -> Trap {
        Trap {
            id: TrapId(id),
            name: name.to_string(),
            owner_signature: "Example.process(APDU)".to_string(),
            is_first_of_function: id == 2,
        }
    }

    #[test]
    fn preserves_insertion_order() {
        let table = TrapTable::from_traps(vec![trap(2, "a"), trap(3, "b"), trap(4, "c")]).unwrap();
        let names: Vec<&str> = table.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(table.slot(TrapId(3)), Some(1));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = TrapTable::from_traps(vec![trap(2, "a"), trap(2, "b")]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTrap(TrapId(2))));
    }

    #[test]
    fn sentinel_has_a_name() {
        let table = TrapTable::from_traps(vec![trap(2, "a")]).unwrap();
        assert_eq!(table.trap_name(PERF_START), "PERF_START");
        assert_eq!(table.trap_name(TrapId(2)), "a");
    }

    #[test]
    fn base_partitions_by_stride() {
        assert_eq!(base_for_slot(0, 100).unwrap(), TrapId(1));
        assert_eq!(base_for_slot(3, 100).unwrap(), TrapId(301));
    }

    #[test]
    fn base_overflow_is_config_error() {
        let err = base_for_slot(656, 100).unwrap_err();
        assert!(matches!(err, ConfigError::TrapIdOverflow { slot: 656 }));
    }
}
