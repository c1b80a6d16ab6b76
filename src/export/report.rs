//! Analysed JSON report
//!
//! Serialises the analysed run for downstream renderers. Non-finite floats
//! (the NaN heat of an unreached trap) serialise as `null`.

use crate::analysis::{analyze_memory, analyze_time, AnalysisConfig, MemoryHeat, TrapStatistics};
use crate::domain::{ExportError, InputDivision, Mode};
use crate::protocol::ProfilingResult;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilingReport {
    mode: Mode,
    signature: String,
    device: String,
    elapsed_time: String,
    command_header: String,
    input_source: String,
    input_division: InputDivision,
    time_unit: String,
    inputs: Vec<String>,
    /// Names of traps no round reached.
    unreached: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    time_traps: Vec<TimeTrapReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    memory_traps: Vec<MemoryTrapReport>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TimeTrapReport {
    name: String,
    samples: Vec<Option<i64>>,
    statistics: TrapStatistics,
    moving_average: Vec<Option<f64>>,
    heat: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MemoryTrapReport {
    name: String,
    free_transient_deselect: Option<i64>,
    free_transient_reset: Option<i64>,
    free_persistent: Option<i64>,
    heat: MemoryHeat,
}

impl ProfilingReport {
    pub fn build(result: &ProfilingResult, config: &AnalysisConfig) -> Self {
        let unreached_names: Vec<String> = result
            .unreached
            .iter()
            .map(|trap| {
                result
                    .trap_names
                    .iter()
                    .find(|(id, _)| id == trap)
                    .map_or_else(|| trap.to_string(), |(_, name)| name.clone())
            })
            .collect();

        let time_traps = analyze_time(result, config)
            .into_iter()
            .map(|row| TimeTrapReport {
                name: row.name,
                samples: row.samples,
                statistics: row.statistics,
                moving_average: row.moving_average,
                heat: row.heat,
            })
            .collect();
        let memory_traps = analyze_memory(result)
            .into_iter()
            .map(|row| MemoryTrapReport {
                name: row.name,
                free_transient_deselect: row.free_transient_deselect,
                free_transient_reset: row.free_transient_reset,
                free_persistent: row.free_persistent,
                heat: row.heat,
            })
            .collect();

        Self {
            mode: result.mode,
            signature: result.signature.clone(),
            device: result.device_id.clone(),
            elapsed_time: result.elapsed.clone(),
            command_header: result.command_header.clone(),
            input_source: result.input_descriptor.clone(),
            input_division: result.input_division,
            time_unit: result.time_unit.symbol().to_string(),
            inputs: result.inputs.clone(),
            unreached: unreached_names,
            time_traps,
            memory_traps,
        }
    }
}

pub fn write_report<W: Write>(
    result: &ProfilingResult,
    config: &AnalysisConfig,
    out: &mut W,
) -> Result<(), ExportError> {
    let report = ProfilingReport::build(result, config);
    serde_json::to_writer_pretty(out, &report)?;
    Ok(())
}
