//! # trapscope - Main Entry Point
//!
//! Runs the full pipeline end to end against the built-in simulated target:
//! plans traps into a demo function, patches the demo dispatcher, drives the
//! measurement protocol and exports the results. Profiling real hardware
//! only needs a `trapscope::protocol::DeviceChannel` implementation for its
//! transport.

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use std::fs::File;
use std::io::BufWriter;

use trapscope::analysis::{analyze_memory, analyze_time, AnalysisConfig};
use trapscope::cli::Args;
use trapscope::domain::{Mode, TargetKind, TrapId};
use trapscope::export::{write_csv, write_report};
use trapscope::planner::{
    guarding_traps, patch_dispatcher, DispatcherPatch, PlannerConfig, TrapPlanner, TrapTable,
};
use trapscope::protocol::{Profiler, ProfilingResult, SimulatedApplet, SimulatedTarget};
use trapscope::tree::{CaseLabel, StatementKind, StatementTree, SwitchCase};

const DEMO_SIGNATURE: &str = "Example.process(APDU)";

fn main() {
    let args = Args::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(args.log_level()),
    )
    .init();

    if let Err(e) = run(&args) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    // plan traps into the demo function
    let mut tree = StatementTree::new();
    let body = demo_function(&mut tree);
    let planner = TrapPlanner::new(PlannerConfig::default(), &|_, _| false);
    let traps = planner.plan(&mut tree, body, DEMO_SIGNATURE, 0)?;
    let trap_ids: Vec<TrapId> = traps.iter().map(|t| t.id).collect();
    let table = TrapTable::from_traps(traps)?;
    info!("Planned {} traps for {DEMO_SIGNATURE}.", table.len());
    for (node, guard) in guarding_traps(&tree, body) {
        match guard {
            Some(trap) => debug!("{node:?} guarded by {}.", table.trap_name(trap)),
            None => debug!("{node:?} runs before the first checkpoint."),
        }
    }

    // install the reserved-instruction handler in the demo dispatcher
    let dispatch_body = demo_dispatcher(&mut tree, args.ins);
    let patch = DispatcherPatch {
        reserved_code: args.trap_ins,
        handler_call: "handleInstrumentation".to_string(),
    };
    let outcome = patch_dispatcher(&mut tree, dispatch_body, &patch)?;
    info!("Dispatcher patch: {outcome:?}.");

    // profile the simulated target
    let mut target = SimulatedTarget::new(simulated_applet(args, &trap_ids));
    let config = args.profiler_config(DEMO_SIGNATURE, TargetKind::Method);
    let mut generator = args.input_generator()?;
    let result = Profiler::new(config).profile(&table, &mut target, generator.as_mut())?;

    export(args, &result)?;
    summarize(&result);
    Ok(())
}

/// A function body with a data-dependent branch, so the run exercises both
/// reached and unreached traps.
fn demo_function(tree: &mut StatementTree) -> trapscope::tree::NodeId {
    let body = tree.new_block();
    tree.push(body, StatementKind::call("init"));

    let then_block = tree.new_block();
    tree.push(then_block, StatementKind::call("shortPath"));
    tree.push(then_block, StatementKind::Return);
    tree.push(body, StatementKind::If { then_block, else_block: None });

    tree.push(body, StatementKind::call("longPath"));
    body
}

/// The demo application's instruction dispatcher: one switch routing the
/// trigger instruction.
fn demo_dispatcher(tree: &mut StatementTree, trigger: u8) -> trapscope::tree::NodeId {
    let body = tree.new_block();
    let trigger_case = tree.new_block();
    tree.push(trigger_case, StatementKind::call("process"));
    tree.push(trigger_case, StatementKind::Break);
    let default_case = tree.new_block();
    tree.push(default_case, StatementKind::Throw);
    tree.push(
        body,
        StatementKind::Switch {
            cases: vec![
                SwitchCase { label: CaseLabel::Code(trigger), body: trigger_case },
                SwitchCase { label: CaseLabel::Default, body: default_case },
            ],
        },
    );
    body
}

/// Simulated behaviour matching [`demo_function`]: inputs with an even first
/// byte take the short path, the rest the long one, and segment cost grows
/// with the input's bit weight.
fn simulated_applet(args: &Args, trap_ids: &[TrapId]) -> SimulatedApplet {
    let (short, long) = (
        vec![trap_ids[0], trap_ids[1], trap_ids[2], trap_ids[3]],
        vec![trap_ids[0], trap_ids[1], trap_ids[4], trap_ids[5]],
    );
    let schedule = Box::new(move |input: &[u8]| {
        let weight: i64 = input.iter().map(|b| i64::from(b.count_ones())).sum();
        let step = 40_000 + weight * 250;
        let path = if input.first().is_some_and(|b| b % 2 == 0) { &short } else { &long };
        path.iter()
            .enumerate()
            .map(|(i, &trap)| (trap, (i as i64 + 1) * step))
            .collect()
    });

    // memory counters as recorded by a short-path execution
    let memory_slots = vec![
        [960, 940, 7800],
        [940, 925, 7650],
        [905, 890, 7400],
        [890, 880, 7350],
        [0, 0, 0],
        [0, 0, 0],
    ];

    SimulatedApplet {
        device_id: "simulator".to_string(),
        trigger_code: args.ins,
        reserved_code: args.trap_ins,
        reset_code: args.reset_ins,
        base_latency_nanos: 1_500_000,
        schedule,
        memory_slots,
        recorded_at_install: false,
    }
}

fn export(args: &Args, result: &ProfilingResult) -> Result<()> {
    if let Some(path) = &args.csv {
        let file = File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        write_csv(result, &mut BufWriter::new(file))?;
        info!("Wrote raw measurements to {}.", path.display());
    }
    if let Some(path) = &args.report {
        let file = File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        write_report(result, &AnalysisConfig::default(), &mut BufWriter::new(file))?;
        info!("Wrote analysed report to {}.", path.display());
    }
    Ok(())
}

fn summarize(result: &ProfilingResult) {
    match result.mode {
        Mode::Time => {
            let unit = result.time_unit.symbol();
            for row in analyze_time(result, &AnalysisConfig::default()) {
                if row.heat.is_nan() {
                    println!("{:<28} never reached", row.name);
                } else {
                    println!(
                        "{:<28} mean {:>10.1} {unit}  reached {}/{} rounds",
                        row.name,
                        row.statistics.mean,
                        row.statistics.reachable_count,
                        row.samples.len(),
                    );
                }
            }
        }
        Mode::Memory => {
            for row in analyze_memory(result) {
                println!(
                    "{:<28} transient {:>6}  persistent {:>6}",
                    row.name, row.heat.transient, row.heat.persistent,
                );
            }
        }
    }
}
