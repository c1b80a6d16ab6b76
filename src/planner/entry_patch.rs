//! Entry dispatcher patching
//!
//! The instrumented application must recognise the reserved instrumentation
//! instructions before any of its own dispatch logic runs (e.g. applet
//! selection gating), otherwise the profiler could not arm traps or drain
//! measurements while the target is in an arbitrary state.
//!
//! Patching is idempotent: re-instrumenting an already patched dispatcher is
//! accepted as long as the existing handler has exactly the expected shape.
//! Anything else handling the reserved code is a configuration error, never
//! a silent double-insert.

use crate::domain::ConfigError;
use crate::tree::{CaseLabel, NodeId, StatementKind, StatementTree, SwitchCase};
use log::{debug, info};

/// Description of the reserved instruction arm to install.
#[derive(Debug, Clone)]
pub struct DispatcherPatch {
    /// Reserved instruction code, e.g. `0xF5`.
    pub reserved_code: u8,
    /// Name of the internal state mutator the handler calls after reading
    /// the operation payload.
    pub handler_call: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    Inserted,
    /// A structurally identical handler already existed; nothing changed.
    AlreadyPatched,
}

/// Ensures the dispatch function recognises the reserved instruction.
///
/// `dispatch_body` is the body block of the application's command dispatch
/// function. It must contain exactly one instruction switch; zero or several
/// switches make routing ambiguous and abort instrumentation.
pub fn patch_dispatcher(
    tree: &mut StatementTree,
    dispatch_body: NodeId,
    patch: &DispatcherPatch,
) -> Result<PatchOutcome, ConfigError> {
    let switches: Vec<NodeId> = tree
        .flatten(dispatch_body)
        .into_iter()
        .filter(|&n| matches!(tree.kind(n), StatementKind::Switch { .. }))
        .collect();

    if switches.len() != 1 {
        return Err(ConfigError::AmbiguousDispatcher { found: switches.len() });
    }
    let switch = switches[0];

    let existing = match tree.kind(switch) {
        StatementKind::Switch { cases } => cases
            .iter()
            .find(|c| c.label == CaseLabel::Code(patch.reserved_code))
            .copied(),
        _ => unreachable!("filtered to switches above"),
    };

    if let Some(case) = existing {
        return match verify_handler_shape(tree, case.body, patch) {
            Ok(()) => {
                info!(
                    "Dispatcher already handles 0x{:02x} with the expected shape.",
                    patch.reserved_code
                );
                Ok(PatchOutcome::AlreadyPatched)
            }
            Err(detail) => Err(ConfigError::IncompatibleDispatcherPatch {
                code: patch.reserved_code,
                detail,
            }),
        };
    }

    // build `case RESERVED: <handler_call>(payload); break;`
    let handler_body = tree.new_block();
    tree.push(handler_body, StatementKind::call(patch.handler_call.clone()));
    tree.push(handler_body, StatementKind::Break);
    tree.insert_switch_case_front(
        switch,
        SwitchCase { label: CaseLabel::Code(patch.reserved_code), body: handler_body },
    );

    debug!("Added 0x{:02x} handler ahead of existing dispatch cases.", patch.reserved_code);
    Ok(PatchOutcome::Inserted)
}

/// The accepted handler shape: one call to the expected state mutator
/// followed by a flow-break back to the caller.
fn verify_handler_shape(
    tree: &StatementTree,
    body: NodeId,
    patch: &DispatcherPatch,
) -> Result<(), String> {
    let stmts = tree.statements(body);
    if stmts.len() != 2 {
        return Err(format!("expected 2 statements in handler, found {}", stmts.len()));
    }

    match tree.kind(stmts[0]) {
        StatementKind::Expression { call: Some(call), .. } if *call == patch.handler_call => {}
        other => {
            return Err(format!(
                "expected a call to {}, found {other:?}",
                patch.handler_call
            ))
        }
    }

    match tree.kind(stmts[1]) {
        StatementKind::Break | StatementKind::Return => Ok(()),
        other => Err(format!("expected the handler to return control, found {other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_stop_patch() -> DispatcherPatch {
        DispatcherPatch { reserved_code: 0xf5, handler_call: "set_stop_from_payload".to_string() }
    }

    /// Dispatcher with a single instruction switch and one application case.
    fn dispatcher(tree: &mut StatementTree) -> (NodeId, NodeId) {
        let body = tree.new_block();
        let app_case = tree.new_block();
        tree.push(app_case, StatementKind::call("handle_app"));
        tree.push(app_case, StatementKind::Break);
        let switch = tree.push(
            body,
            StatementKind::Switch {
                cases: vec![SwitchCase { label: CaseLabel::Code(0x20), body: app_case }],
            },
        );
        (body, switch)
    }

    fn case_labels(tree: &StatementTree, switch: NodeId) -> Vec<CaseLabel> {
        match tree.kind(switch) {
            StatementKind::Switch { cases } => cases.iter().map(|c| c.label).collect(),
            _ => panic!("not a switch"),
        }
    }

    #[test]
    fn inserts_reserved_case_ahead_of_existing_dispatch() {
        let mut t = StatementTree::new();
        let (body, switch) = dispatcher(&mut t);

        let outcome = patch_dispatcher(&mut t, body, &set_stop_patch()).unwrap();
        assert_eq!(outcome, PatchOutcome::Inserted);
        assert_eq!(
            case_labels(&t, switch),
            vec![CaseLabel::Code(0xf5), CaseLabel::Code(0x20)]
        );
    }

    #[test]
    fn patch_is_idempotent() {
        let mut t = StatementTree::new();
        let (body, switch) = dispatcher(&mut t);

        patch_dispatcher(&mut t, body, &set_stop_patch()).unwrap();
        let outcome = patch_dispatcher(&mut t, body, &set_stop_patch()).unwrap();
        assert_eq!(outcome, PatchOutcome::AlreadyPatched);
        assert_eq!(case_labels(&t, switch).len(), 2, "never double-inserts");
    }

    #[test]
    fn colliding_application_case_is_rejected() {
        let mut t = StatementTree::new();
        let body = t.new_block();
        let app_case = t.new_block();
        t.push(app_case, StatementKind::call("encrypt"));
        t.push(app_case, StatementKind::Break);
        t.push(
            body,
            StatementKind::Switch {
                cases: vec![SwitchCase { label: CaseLabel::Code(0xf5), body: app_case }],
            },
        );

        let err = patch_dispatcher(&mut t, body, &set_stop_patch()).unwrap_err();
        assert!(matches!(err, ConfigError::IncompatibleDispatcherPatch { code: 0xf5, .. }));
    }

    #[test]
    fn handler_with_wrong_tail_is_rejected() {
        let mut t = StatementTree::new();
        let body = t.new_block();
        let case = t.new_block();
        t.push(case, StatementKind::call("set_stop_from_payload"));
        t.push(case, StatementKind::call("extra_work"));
        t.push(
            body,
            StatementKind::Switch {
                cases: vec![SwitchCase { label: CaseLabel::Code(0xf5), body: case }],
            },
        );

        let err = patch_dispatcher(&mut t, body, &set_stop_patch()).unwrap_err();
        assert!(matches!(err, ConfigError::IncompatibleDispatcherPatch { .. }));
    }

    #[test]
    fn no_switch_is_a_config_error() {
        let mut t = StatementTree::new();
        let body = t.new_block();
        t.push(body, StatementKind::expr());
        let err = patch_dispatcher(&mut t, body, &set_stop_patch()).unwrap_err();
        assert!(matches!(err, ConfigError::AmbiguousDispatcher { found: 0 }));
    }

    #[test]
    fn several_switches_are_a_config_error() {
        let mut t = StatementTree::new();
        let body = t.new_block();
        for _ in 0..2 {
            let case = t.new_block();
            t.push(case, StatementKind::Break);
            t.push(
                body,
                StatementKind::Switch {
                    cases: vec![SwitchCase { label: CaseLabel::Default, body: case }],
                },
            );
        }
        let err = patch_dispatcher(&mut t, body, &set_stop_patch()).unwrap_err();
        assert!(matches!(err, ConfigError::AmbiguousDispatcher { found: 2 }));
    }
}
