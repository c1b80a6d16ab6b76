//! Trap planning
//!
//! This module decides, statically, where in the source control flow the
//! checkpoints go:
//! - `insert_traps`: recursive placement over the statement tree
//! - `trap_table`: the ordered trap table handed to the packager and the
//!   measurement protocol
//! - `entry_patch`: reserved-instruction handler installation in the
//!   application's command dispatcher

pub mod entry_patch;
pub mod insert_traps;
pub mod trap_table;

pub use entry_patch::{patch_dispatcher, DispatcherPatch, PatchOutcome};
pub use insert_traps::{guarding_traps, AlwaysThrowsPredicate, PlannerConfig, TrapPlanner};
pub use trap_table::{base_for_slot, Trap, TrapTable};
