//! Command-line interface

pub mod args;

pub use args::Args;

use crate::domain::{ConfigError, TargetKind};
use crate::protocol::{
    CommandHeader, FileInputs, InputGenerator, ProfilerConfig, RandomInputs,
};

impl Args {
    /// Builds the run configuration for one profiled function.
    pub fn profiler_config(&self, signature: &str, target_kind: TargetKind) -> ProfilerConfig {
        ProfilerConfig {
            mode: self.mode,
            target_kind,
            signature: signature.to_string(),
            round_count: self.repeat_count,
            trigger: CommandHeader {
                class: self.cla,
                instruction: self.ins,
                p1: self.p1,
                p2: self.p2,
            },
            reserved_code: self.trap_ins,
            reset_code: self.reset_ins,
            time_unit: self.time_unit,
            input_division: self.input_division,
        }
    }

    /// Picks the input source: a data file when given, random bytes
    /// otherwise.
    pub fn input_generator(&self) -> Result<Box<dyn InputGenerator>, ConfigError> {
        match &self.data_file {
            Some(path) => Ok(Box::new(FileInputs::open(path)?)),
            None => Ok(Box::new(RandomInputs::new(self.input_length))),
        }
    }

    /// Log filter level implied by the verbosity flags.
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}
