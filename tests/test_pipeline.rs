//! Full pipeline: plan traps, patch the dispatcher, profile the simulated
//! target and export the results.

use trapscope::analysis::{analyze_time, AnalysisConfig};
use trapscope::domain::{InputDivision, Mode, TargetKind, TimeUnit, TrapId};
use trapscope::export::{write_csv, write_report};
use trapscope::planner::{
    patch_dispatcher, DispatcherPatch, PatchOutcome, PlannerConfig, TrapPlanner, TrapTable,
};
use trapscope::protocol::{
    CommandHeader, Profiler, ProfilerConfig, RandomInputs, SimulatedApplet, SimulatedTarget,
};
use trapscope::tree::{CaseLabel, NodeId, StatementKind, StatementTree, SwitchCase};

const SIGNATURE: &str = "Example.process(APDU)";

/// init(); if (cond) { shortPath(); return; } longPath();
fn branching_function(tree: &mut StatementTree) -> NodeId {
    let body = tree.new_block();
    tree.push(body, StatementKind::call("init"));
    let then_block = tree.new_block();
    tree.push(then_block, StatementKind::call("shortPath"));
    tree.push(then_block, StatementKind::Return);
    tree.push(body, StatementKind::If { then_block, else_block: None });
    tree.push(body, StatementKind::call("longPath"));
    body
}

fn dispatcher(tree: &mut StatementTree) -> NodeId {
    let body = tree.new_block();
    let trigger_case = tree.new_block();
    tree.push(trigger_case, StatementKind::call("process"));
    tree.push(trigger_case, StatementKind::Break);
    tree.push(
        body,
        StatementKind::Switch {
            cases: vec![SwitchCase { label: CaseLabel::Code(0x20), body: trigger_case }],
        },
    );
    body
}

fn applet(trap_ids: Vec<TrapId>) -> SimulatedApplet {
    SimulatedApplet {
        device_id: "sim".to_string(),
        trigger_code: 0x20,
        reserved_code: 0xf5,
        reset_code: Some(0x22),
        base_latency_nanos: 0,
        schedule: Box::new(move |input| {
            // even first byte takes the short path
            let path: Vec<TrapId> = if input.first().is_some_and(|b| b % 2 == 0) {
                vec![trap_ids[0], trap_ids[1], trap_ids[2], trap_ids[3]]
            } else {
                vec![trap_ids[0], trap_ids[1], trap_ids[4], trap_ids[5]]
            };
            path.into_iter()
                .enumerate()
                .map(|(i, t)| (t, (i as i64 + 1) * 1_000))
                .collect()
        }),
        memory_slots: Vec::new(),
        recorded_at_install: false,
    }
}

#[test]
fn test_plan_patch_profile_and_export() {
    let mut tree = StatementTree::new();
    let body = branching_function(&mut tree);
    let planner = TrapPlanner::new(PlannerConfig::default(), &|_, _| false);
    let traps = planner.plan(&mut tree, body, SIGNATURE, 0).unwrap();
    // leading trap, one after init, two in the then-branch, one after the
    // if, one after longPath
    assert_eq!(traps.len(), 6);
    let trap_ids: Vec<TrapId> = traps.iter().map(|t| t.id).collect();
    let table = TrapTable::from_traps(traps).unwrap();

    let dispatch_body = dispatcher(&mut tree);
    let patch = DispatcherPatch {
        reserved_code: 0xf5,
        handler_call: "handleInstrumentation".to_string(),
    };
    assert_eq!(
        patch_dispatcher(&mut tree, dispatch_body, &patch).unwrap(),
        PatchOutcome::Inserted
    );
    // patching twice is a no-op
    assert_eq!(
        patch_dispatcher(&mut tree, dispatch_body, &patch).unwrap(),
        PatchOutcome::AlreadyPatched
    );

    let mut target = SimulatedTarget::new(applet(trap_ids.clone()));
    let config = ProfilerConfig {
        mode: Mode::Time,
        target_kind: TargetKind::Method,
        signature: SIGNATURE.to_string(),
        round_count: 20,
        trigger: CommandHeader { class: 0x00, instruction: 0x20, p1: 0, p2: 0 },
        reserved_code: 0xf5,
        reset_code: Some(0x22),
        time_unit: TimeUnit::Nano,
        input_division: InputDivision::None,
    };
    let mut generator = RandomInputs::with_seed(8, 99);
    let result = Profiler::new(config)
        .profile(&table, &mut target, &mut generator)
        .unwrap();
    assert_eq!(result.inputs.len(), 20);

    // every round takes exactly one branch, so the shared prefix is always
    // reached and each branch trap is missing in the opposite rounds
    let rows = analyze_time(&result, &AnalysisConfig::default());
    assert_eq!(rows.len(), 6);
    assert_eq!(rows[0].statistics.reachable_count, 20);
    assert_eq!(rows[1].statistics.reachable_count, 20);
    let branch_total = rows[2].statistics.reachable_count + rows[4].statistics.reachable_count;
    assert_eq!(branch_total, 20);

    let mut csv = Vec::new();
    write_csv(&result, &mut csv).unwrap();
    let csv = String::from_utf8(csv).unwrap();
    assert!(csv.contains("TRAP_Example_process_1"));
    assert!(csv.lines().count() >= 6 + 5);

    let mut json = Vec::new();
    write_report(&result, &AnalysisConfig::default(), &mut json).unwrap();
    let report: serde_json::Value = serde_json::from_slice(&json).unwrap();
    assert_eq!(report["signature"], SIGNATURE);
    assert_eq!(report["timeTraps"].as_array().unwrap().len(), 6);
}
