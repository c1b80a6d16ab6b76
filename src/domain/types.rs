//! Domain types providing compile-time safety and self-documentation
//!
//! Newtype wrappers prevent common bugs like passing a raw status word where
//! a trap ID is expected, and make function signatures more expressive.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Performance trap ID
///
/// Identifies one checkpoint injected into the profiled code. The ID doubles
/// as the abort status word in time mode, so it lives in the 16-bit status
/// word space of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrapId(pub u16);

impl TrapId {
    /// Next ID in the dense per-function sequence.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for TrapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trap#{}", self.0)
    }
}

/// Reserved sentinel armed before the first real trap.
///
/// No trap insertion ever produces this ID; arming it guarantees the next
/// execution runs to completion.
pub const PERF_START: TrapId = TrapId(0x0001);

/// What a trap does on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Traps conditionally abort the execution; segment cost is derived by
    /// differencing cumulative wall times of consecutive aborts.
    Time,
    /// Traps unconditionally record memory-availability counters; a single
    /// pass fires all of them.
    Memory,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Time => write!(f, "time"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Memory-availability counter kinds reported by the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryKind {
    Persistent,
    TransientReset,
    TransientDeselect,
}

impl MemoryKind {
    /// Wire code used as `p1` of a `GET_MEASUREMENTS` command.
    pub fn wire_code(self) -> u8 {
        match self {
            Self::Persistent => 0,
            Self::TransientReset => 1,
            Self::TransientDeselect => 2,
        }
    }

    /// All kinds in drain order.
    pub const ALL: [Self; 3] = [Self::TransientDeselect, Self::TransientReset, Self::Persistent];
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Persistent => write!(f, "persistent"),
            Self::TransientReset => write!(f, "transientReset"),
            Self::TransientDeselect => write!(f, "transientDeselect"),
        }
    }
}

/// Unit used when reporting time measurements (raw samples are nanoseconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    #[default]
    Nano,
    Micro,
    Milli,
    Sec,
}

impl TimeUnit {
    /// Convert a nanosecond sample into this unit (integer division).
    pub fn convert(self, nanos: i64) -> i64 {
        match self {
            Self::Nano => nanos,
            Self::Micro => nanos / 1_000,
            Self::Milli => nanos / 1_000_000,
            Self::Sec => nanos / 1_000_000_000,
        }
    }

    /// Unit symbol for report labels.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Nano => "ns",
            Self::Micro => "μs",
            Self::Milli => "ms",
            Self::Sec => "s",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nano => write!(f, "nano"),
            Self::Micro => write!(f, "micro"),
            Self::Milli => write!(f, "milli"),
            Self::Sec => write!(f, "sec"),
        }
    }
}

/// How the round inputs are partitioned into two classes.
///
/// A division other than `None` makes the heatmap compare the average cost
/// of the two halves instead of reporting a plain mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputDivision {
    #[default]
    None,
    /// Sort candidates lexicographically (more leading zero bits first) and
    /// keep the extremes.
    EffectiveBitLength,
    /// Sort candidates by number of set bits and keep the extremes.
    HammingWeight,
}

impl fmt::Display for InputDivision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::EffectiveBitLength => write!(f, "effective bit length"),
            Self::HammingWeight => write!(f, "Hamming weight"),
        }
    }
}

/// Kind of the profiled executable.
///
/// Constructors run once during installation, which changes how the memory
/// protocol obtains its single measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Method,
    Constructor,
}
