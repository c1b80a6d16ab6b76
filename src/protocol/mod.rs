//! Measurement protocol
//!
//! Drives one instrumented target over an exclusive device channel and
//! collects per-trap samples. The mode strategies ([`TimeProtocol`],
//! [`MemoryProtocol`]) share a [`Session`] that owns the channel, the
//! generated inputs and the set of traps the run never reached.
//!
//! The protocol is strictly sequential: the cumulative-time differencing
//! model assumes no other traffic touches the device mid-run, so nothing
//! here is concurrent.

pub mod channel;
pub mod inputs;
pub mod memory;
pub mod series;
pub mod simulator;
pub mod time;
pub mod wire;

pub use channel::DeviceChannel;
pub use inputs::{FileInputs, Input, InputGenerator, RandomInputs};
pub use memory::MemoryProtocol;
pub use series::{MeasurementSample, MeasurementSeries, MemorySeriesSet};
pub use simulator::{SimulatedApplet, SimulatedTarget};
pub use time::TimeProtocol;

use crate::domain::{
    ConfigError, InputDivision, MemoryKind, Mode, ProfilerError, ProtocolError, TargetKind,
    TimeUnit, TrapId, PERF_START,
};
use crate::planner::TrapTable;
use crate::protocol::wire::{Command, Response};
use log::{debug, info, warn};
use std::time::{Duration, Instant};

/// 4-byte header of the command that triggers the profiled function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandHeader {
    pub class: u8,
    pub instruction: u8,
    pub p1: u8,
    pub p2: u8,
}

impl CommandHeader {
    pub fn to_command(self, payload: Vec<u8>) -> Command {
        Command::new(self.class, self.instruction, self.p1, self.p2, payload)
    }

    pub fn hex(self) -> String {
        wire::bytes_to_hex(&[self.class, self.instruction, self.p1, self.p2])
    }
}

/// Static description of one profiling run.
#[derive(Debug, Clone)]
pub struct ProfilerConfig {
    pub mode: Mode,
    pub target_kind: TargetKind,
    /// Signature of the profiled function, e.g. `Example.process(APDU)`.
    pub signature: String,
    /// Requested number of rounds; memory mode always runs exactly one.
    pub round_count: u32,
    pub trigger: CommandHeader,
    /// Reserved instrumentation instruction code.
    pub reserved_code: u8,
    /// Optional instruction restoring the target to a known state before
    /// each round.
    pub reset_code: Option<u8>,
    pub time_unit: TimeUnit,
    pub input_division: InputDivision,
}

impl ProfilerConfig {
    /// Rounds the protocol actually executes. Memory traps record in a
    /// single pass, so repeated rounds would only measure the first.
    pub fn effective_round_count(&self) -> u32 {
        match self.mode {
            Mode::Time => self.round_count,
            Mode::Memory => 1,
        }
    }
}

/// Mutable state of one run, shared between the driver and the strategy.
pub struct Session<'a> {
    config: &'a ProfilerConfig,
    table: &'a TrapTable,
    channel: &'a mut dyn DeviceChannel,
    inputs: Vec<Input>,
    unreached: Vec<TrapId>,
}

impl<'a> Session<'a> {
    pub fn config(&self) -> &ProfilerConfig {
        self.config
    }

    pub fn table(&self) -> &TrapTable {
        self.table
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn last_transmit_nanos(&self) -> i64 {
        self.channel.last_transmit_nanos()
    }

    /// Arms `trap` as the next abort point.
    pub fn set_stop(&mut self, trap: TrapId) -> Result<(), ProtocolError> {
        let command = Command::new(
            self.config.trigger.class,
            self.config.reserved_code,
            0,
            0,
            trap.0.to_be_bytes().to_vec(),
        );
        let response = self.channel.transmit(&command)?;
        if !response.is_success() {
            return Err(ProtocolError::CommandFailed {
                command: format!("arm {trap}"),
                sw: response.sw,
            });
        }
        Ok(())
    }

    /// Issues the reset command, if one is configured.
    pub fn reset_if_configured(&mut self) -> Result<(), ProtocolError> {
        let Some(code) = self.config.reset_code else {
            return Ok(());
        };
        let command = Command::new(self.config.trigger.class, code, 0, 0, Vec::new());
        let response = self.channel.transmit(&command)?;
        if !response.is_success() {
            return Err(ProtocolError::CommandFailed {
                command: "reset".to_string(),
                sw: response.sw,
            });
        }
        Ok(())
    }

    /// Triggers the profiled function with `input`. The raw response is
    /// returned untouched; the mode strategy owns status word classification.
    pub fn execute(&mut self, input: &Input) -> Result<Response, ProtocolError> {
        let command = self.config.trigger.to_command(input.bytes());
        debug!("Executing with input {}.", input.hex());
        Ok(self.channel.transmit(&command)?)
    }

    /// Requests one page of a kind's recorded measurement buffer.
    pub fn drain_page(&mut self, kind: MemoryKind, page: u8) -> Result<Response, ProtocolError> {
        let command = Command::new(
            self.config.trigger.class,
            self.config.reserved_code,
            kind.wire_code(),
            page,
            Vec::new(),
        );
        Ok(self.channel.transmit(&command)?)
    }

    /// Records a trap no round ever reached. Order-preserving, duplicates
    /// ignored.
    pub fn mark_unreached(&mut self, trap: TrapId) {
        if !self.unreached.contains(&trap) {
            self.unreached.push(trap);
        }
    }
}

/// Collected samples of one run.
#[derive(Debug, Clone)]
pub enum Measurements {
    Time(MeasurementSeries),
    Memory(MemorySeriesSet),
}

/// One mode's interaction loop with the target.
pub trait MeasurementProtocol {
    fn run(&self, session: &mut Session<'_>) -> Result<Measurements, ProtocolError>;
}

/// Everything the analysis and export layers need about one finished run.
#[derive(Debug, Clone)]
pub struct ProfilingResult {
    pub mode: Mode,
    pub signature: String,
    pub device_id: String,
    /// Wall time of the run, formatted as `0d 00:00:01.234`.
    pub elapsed: String,
    pub command_header: String,
    pub input_descriptor: String,
    pub input_division: InputDivision,
    pub time_unit: TimeUnit,
    /// Per-round input record, hex-encoded.
    pub inputs: Vec<String>,
    pub measurements: Measurements,
    pub unreached: Vec<TrapId>,
    /// Trap names in table order, for report rows.
    pub trap_names: Vec<(TrapId, String)>,
}

/// Drives one complete profiling run.
pub struct Profiler {
    config: ProfilerConfig,
}

impl Profiler {
    pub fn new(config: ProfilerConfig) -> Self {
        Self { config }
    }

    pub fn profile(
        &self,
        table: &TrapTable,
        channel: &mut dyn DeviceChannel,
        generator: &mut dyn InputGenerator,
    ) -> Result<ProfilingResult, ProfilerError> {
        self.validate(table)?;

        if self.config.reset_code.is_none() {
            warn!(
                "No reset command configured; target state may leak between rounds \
                 and skew measurements."
            );
        }

        let rounds = self.config.effective_round_count();
        let (inputs, input_record, input_descriptor) = match self.config.target_kind {
            TargetKind::Method => {
                let inputs = generator.generate(rounds, self.config.input_division)?;
                let record = inputs.iter().map(|i| i.hex().to_string()).collect();
                (inputs, record, generator.descriptor())
            }
            TargetKind::Constructor => {
                // nothing to trigger: installation already executed the code
                let record = vec!["measured during installation".to_string()];
                (Vec::new(), record, "install".to_string())
            }
        };

        info!(
            "Profiling {} in {} mode over {rounds} round(s).",
            self.config.signature, self.config.mode
        );
        let device_id = channel.identifier();
        let started = Instant::now();

        let mut session = Session {
            config: &self.config,
            table,
            channel,
            inputs,
            unreached: Vec::new(),
        };
        let strategy: &dyn MeasurementProtocol = match self.config.mode {
            Mode::Time => &TimeProtocol,
            Mode::Memory => &MemoryProtocol,
        };
        let measurements = strategy.run(&mut session)?;
        let unreached = session.unreached;

        let elapsed = format_elapsed(started.elapsed());
        info!("Run finished in {elapsed}.");

        sanity_check(&measurements, table, rounds)?;
        if !unreached.is_empty() {
            let names: Vec<String> = unreached.iter().map(|&t| table.trap_name(t)).collect();
            warn!("Unreached traps: {}.", names.join(", "));
        }

        Ok(ProfilingResult {
            mode: self.config.mode,
            signature: self.config.signature.clone(),
            device_id,
            elapsed,
            command_header: self.config.trigger.hex(),
            input_descriptor,
            input_division: self.config.input_division,
            time_unit: self.config.time_unit,
            inputs: input_record,
            measurements,
            unreached,
            trap_names: table
                .iter()
                .map(|t| (t.id, t.name.clone()))
                .collect(),
        })
    }

    fn validate(&self, table: &TrapTable) -> Result<(), ConfigError> {
        if table.is_empty() {
            return Err(ConfigError::EmptyTrapTable(self.config.signature.clone()));
        }
        if table.get(PERF_START).is_some() {
            return Err(ConfigError::DuplicateTrap(PERF_START));
        }
        if self.config.mode == Mode::Time && self.config.target_kind == TargetKind::Constructor {
            return Err(ConfigError::InvalidTarget {
                signature: self.config.signature.clone(),
                mode: self.config.mode.to_string(),
                reason: "constructors run once at installation and cannot be re-executed"
                    .to_string(),
            });
        }
        Ok(())
    }
}

/// Structural checks on the collected data before it is handed to analysis.
fn sanity_check(
    measurements: &Measurements,
    table: &TrapTable,
    rounds: u32,
) -> Result<(), ProtocolError> {
    let check_series = |series: &MeasurementSeries, expected: usize| {
        if series.len() != table.len() {
            return Err(ProtocolError::DataIntegrity(format!(
                "collected series for {} traps, table has {}",
                series.len(),
                table.len()
            )));
        }
        for (trap, samples) in series.iter() {
            if samples.len() != expected {
                return Err(ProtocolError::DataIntegrity(format!(
                    "{trap} has {} samples, expected {expected}",
                    samples.len()
                )));
            }
        }
        Ok(())
    };

    match measurements {
        Measurements::Time(series) => check_series(series, rounds as usize),
        Measurements::Memory(set) => {
            check_series(&set.transient_deselect, 1)?;
            check_series(&set.transient_reset, 1)?;
            check_series(&set.persistent, 1)
        }
    }
}

fn format_elapsed(duration: Duration) -> String {
    let millis = duration.as_millis();
    let (secs, millis) = (millis / 1000, millis % 1000);
    let (mins, secs) = (secs / 60, secs % 60);
    let (hours, mins) = (mins / 60, mins % 60);
    let (days, hours) = (hours / 24, hours % 24);
    format!("{days}d {hours:02}:{mins:02}:{secs:02}.{millis:03}")
}
