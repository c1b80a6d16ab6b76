//! Trap placement over the statement tree
//!
//! The planner guarantees two things the measurement protocol depends on:
//! every reachable statement boundary lies between two traps (or between a
//! function boundary and its nearest trap), and no trap is ever placed where
//! control flow can provably never observe it. A trap after a `return`-like
//! statement would never fire and would silently corrupt the end-of-run
//! "all traps reached" check, so terminator analysis here is exact, not
//! heuristic.

use crate::domain::{ConfigError, TrapId};
use crate::planner::trap_table::{base_for_slot, Trap};
use crate::tree::{NodeId, StatementKind, StatementTree};
use log::{debug, info};

/// Injected capability deciding whether an expression statement is an
/// unconditional abort call. The generic tree alone cannot know this.
pub type AlwaysThrowsPredicate<'a> = &'a dyn Fn(&StatementTree, NodeId) -> bool;

/// Planner tunables.
#[derive(Debug, Clone, Copy)]
pub struct PlannerConfig {
    /// Fixed stride partitioning the global trap ID space per function.
    pub max_traps_per_function: u16,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self { max_traps_per_function: 100 }
    }
}

/// Walks one function body and inserts checkpoint markers.
pub struct TrapPlanner<'a> {
    config: PlannerConfig,
    always_throws: AlwaysThrowsPredicate<'a>,
}

/// Counter state threaded through the recursive walk.
struct PlannerState {
    owner_signature: String,
    name_prefix: String,
    base: TrapId,
    next_ordinal: u16,
    traps: Vec<Trap>,
}

impl PlannerState {
    fn next_trap(&mut self, limit: u16) -> Result<Trap, ConfigError> {
        if self.next_ordinal > limit {
            return Err(ConfigError::TrapSpaceExhausted {
                signature: self.owner_signature.clone(),
                limit,
            });
        }
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        Ok(Trap {
            id: TrapId(self.base.0 + ordinal),
            name: format!("{}_{}", self.name_prefix, ordinal),
            owner_signature: self.owner_signature.clone(),
            is_first_of_function: ordinal == 1,
        })
    }
}

/// Where a trap goes relative to its anchor.
enum Insert {
    Before,
    After,
    Into,
}

impl<'a> TrapPlanner<'a> {
    pub fn new(config: PlannerConfig, always_throws: AlwaysThrowsPredicate<'a>) -> Self {
        Self { config, always_throws }
    }

    /// Inserts traps into `body`, the block of the function occupying ID
    /// slot `function_slot`. Returns the traps in ascending ID order, which
    /// follows program order of insertion.
    pub fn plan(
        &self,
        tree: &mut StatementTree,
        body: NodeId,
        owner_signature: &str,
        function_slot: u16,
    ) -> Result<Vec<Trap>, ConfigError> {
        info!("Instrumenting {owner_signature}.");

        let mut state = PlannerState {
            owner_signature: owner_signature.to_string(),
            name_prefix: trap_name_prefix(owner_signature),
            base: base_for_slot(function_slot, self.config.max_traps_per_function)?,
            next_ordinal: 1,
            traps: Vec::new(),
        };

        if self.is_empty_block(tree, body) {
            // a function that does nothing still gets one observable point
            self.insert_trap(tree, body, Insert::Into, &mut state)?;
            return Ok(state.traps);
        }

        self.process_block(tree, body, &mut state)?;
        Ok(state.traps)
    }

    fn process_block(
        &self,
        tree: &mut StatementTree,
        block: NodeId,
        state: &mut PlannerState,
    ) -> Result<(), ConfigError> {
        // copy is needed as insertion mutates the statement list
        let statements: Vec<NodeId> = tree
            .statements(block)
            .iter()
            .copied()
            .filter(|&s| !self.is_empty_block(tree, s))
            .collect();

        if !statements.is_empty() {
            // always insert the first trap at the beginning of the ORIGINAL
            // block, unless a constructor-delegation call must run first
            let first = tree.statements(block)[0];
            if !is_constructor_delegation(tree, first) {
                self.insert_trap(tree, first, Insert::Before, state)?;
            }
        }

        for statement in statements {
            // an unconditional abort call makes the rest of the list
            // unreachable; it gets no trailing trap either
            if self.is_always_throws(tree, statement) {
                return Ok(());
            }

            match tree.kind(statement).clone() {
                StatementKind::Try { body, catches, finalizer } => {
                    self.process_block(tree, body, state)?;
                    for catch in catches {
                        self.process_block(tree, catch, state)?;
                    }
                    if let Some(finalizer) = finalizer {
                        self.process_block(tree, finalizer, state)?;
                    }
                }
                StatementKind::Loop { body } => {
                    self.process_block(tree, body, state)?;
                }
                StatementKind::If { then_block, else_block } => {
                    self.process_block(tree, then_block, state)?;
                    if let Some(else_block) = else_block {
                        self.process_block(tree, else_block, state)?;
                    }
                }
                StatementKind::Block => {
                    self.process_block(tree, statement, state)?;
                }
                StatementKind::Switch { cases } => {
                    for case in cases {
                        self.process_block(tree, case.body, state)?;
                    }
                }
                _ => {}
            }

            // statements after a terminator are unreachable and must receive
            // no traps, the terminator itself included
            if self.is_terminator(tree, statement) {
                return Ok(());
            }

            self.insert_trap(tree, statement, Insert::After, state)?;
        }

        Ok(())
    }

    /// A block without any actual statements, recursively.
    fn is_empty_block(&self, tree: &StatementTree, statement: NodeId) -> bool {
        if !matches!(tree.kind(statement), StatementKind::Block) {
            return false;
        }
        tree.statements(statement).iter().all(|&s| self.is_empty_block(tree, s))
    }

    fn is_always_throws(&self, tree: &StatementTree, statement: NodeId) -> bool {
        matches!(tree.kind(statement), StatementKind::Expression { .. })
            && (self.always_throws)(tree, statement)
    }

    /// A statement after which anything inserted in the same block would be
    /// unreachable: a flow-break, a block ending in a terminator, or a
    /// complete terminator.
    fn is_terminator(&self, tree: &StatementTree, statement: NodeId) -> bool {
        if matches!(tree.kind(statement), StatementKind::Block) {
            return tree
                .statements(statement)
                .last()
                .is_some_and(|&last| self.is_terminator(tree, last));
        }

        matches!(tree.kind(statement), StatementKind::Break | StatementKind::Continue)
            || self.is_complete_terminator(tree, statement)
    }

    /// A statement after which anything inserted anywhere in the function
    /// would be unreachable. A local flow-break never qualifies: code after
    /// the enclosing loop or switch is still reachable.
    fn is_complete_terminator(&self, tree: &StatementTree, statement: NodeId) -> bool {
        match tree.kind(statement) {
            StatementKind::Return | StatementKind::Throw => true,
            StatementKind::Expression { .. } => self.is_always_throws(tree, statement),
            StatementKind::Try { body, catches, finalizer } => {
                self.is_complete_terminator(tree, *body)
                    && catches.iter().all(|&c| self.is_complete_terminator(tree, c))
                    && finalizer.map_or(true, |f| self.is_complete_terminator(tree, f))
            }
            StatementKind::Block => tree
                .statements(statement)
                .last()
                .is_some_and(|&last| self.is_complete_terminator(tree, last)),
            StatementKind::If { then_block, else_block } => {
                else_block.is_some_and(|else_block| {
                    self.is_complete_terminator(tree, *then_block)
                        && self.is_complete_terminator(tree, else_block)
                })
            }
            StatementKind::Switch { cases } => {
                cases.iter().all(|case| self.is_complete_terminator(tree, case.body))
            }
            _ => false,
        }
    }

    fn insert_trap(
        &self,
        tree: &mut StatementTree,
        anchor: NodeId,
        where_: Insert,
        state: &mut PlannerState,
    ) -> Result<(), ConfigError> {
        let trap = state.next_trap(self.config.max_traps_per_function)?;
        debug!("Adding {} ({}).", trap.name, trap.id);

        let kind = StatementKind::Trap(trap.id);
        match where_ {
            Insert::Before => tree.insert_before(anchor, kind),
            Insert::After => tree.insert_after(anchor, kind),
            Insert::Into => tree.push_front_child(anchor, kind),
        };
        state.traps.push(trap);
        Ok(())
    }
}

/// Maps each original statement of an instrumented body, in pretty-print
/// order, to the checkpoint guarding it (the nearest trap preceding it).
/// Renderers use this to colour source lines by trap heat. Statements ahead
/// of the first trap (a constructor-delegation call) map to `None`.
pub fn guarding_traps(
    tree: &StatementTree,
    body: NodeId,
) -> Vec<(NodeId, Option<TrapId>)> {
    let mut current = None;
    tree.flatten(body)
        .into_iter()
        .filter_map(|node| match tree.kind(node) {
            StatementKind::Trap(id) => {
                current = Some(*id);
                None
            }
            _ => Some((node, current)),
        })
        .collect()
}

fn is_constructor_delegation(tree: &StatementTree, statement: NodeId) -> bool {
    matches!(
        tree.kind(statement),
        StatementKind::Expression { constructor_delegation: true, .. }
    )
}

/// Trap field name prefix derived from the owner signature:
/// `Example.process(APDU)` becomes `TRAP_Example_process`.
fn trap_name_prefix(signature: &str) -> String {
    let stem = signature.split('(').next().unwrap_or(signature);
    let mangled: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("TRAP_{mangled}")
}
