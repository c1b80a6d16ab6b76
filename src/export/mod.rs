//! Result persistence
//!
//! Two sinks: a raw-sample CSV for external tooling and an analysed JSON
//! report for renderers. Both write to any [`std::io::Write`] sink.

pub mod csv;
pub mod report;

pub use csv::write_csv;
pub use report::{write_report, ProfilingReport};
