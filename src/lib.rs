//! # Trapscope - Trap-Based Execution Profiler
//!
//! Trapscope profiles code running on resource-constrained targets that have
//! no on-device clock, debugger or tracing facility. It plans checkpoint
//! markers ("traps") into the target's control flow ahead of time, then
//! drives the instrumented target over a half-duplex command channel and
//! recovers per-segment cost on the host.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Source Program                         │
//! │                   (statement tree form)                     │
//! └──────────────────────────┬──────────────────────────────────┘
//!                            │ trap planning + dispatcher patch
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Instrumented Target                       │
//! │  • time traps: abort when armed, ID becomes status word     │
//! │  • memory traps: record free-memory counters unconditionally│
//! └──────────────────────────┬──────────────────────────────────┘
//!                            │ command/response channel
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Trapscope (This Crate)                     │
//! │                                                             │
//! │  ┌──────────┐   ┌──────────────┐   ┌──────────────┐       │
//! │  │ Planner  │──▶│   Protocol   │──▶│   Analysis   │       │
//! │  │ (traps)  │   │ (per round)  │   │ (statistics) │       │
//! │  └──────────┘   └──────────────┘   └──────┬───────┘       │
//! │                                            ▼               │
//! │                                    ┌──────────────┐       │
//! │                                    │    Export    │       │
//! │                                    │ (CSV / JSON) │       │
//! │                                    └──────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`tree`]: Generic statement tree the planner operates on
//! - [`planner`]: Trap placement, the ordered trap table and the
//!   dispatcher patch installing the reserved instruction handler
//! - [`protocol`]: The sequential measurement protocol, with a time mode
//!   (conditional abort + wall-time differencing) and a memory mode
//!   (single pass + paged buffer drain), plus an in-memory simulator
//! - [`analysis`]: Outlier filtering, descriptive statistics, smoothed
//!   series and per-trap heatmap values
//! - [`export`]: Raw-sample CSV and analysed JSON report
//! - [`cli`]: Command-line argument parsing and configuration
//! - [`domain`]: Core domain types and the error taxonomy
//!
//! ## Key Concepts
//!
//! - **Trap**: A checkpoint planted at a statement boundary. Trap IDs are
//!   dense per function and double as abort status words in time mode.
//! - **Round**: One pass over all traps with a fixed input. Time mode
//!   replays the same input once per trap.
//! - **Unreached trap**: A trap no round ever fired; a legitimate outcome
//!   of branch-dependent control flow, reported but never an error.

pub mod analysis;
pub mod cli;
pub mod domain;
pub mod export;
pub mod planner;
pub mod protocol;
pub mod tree;
