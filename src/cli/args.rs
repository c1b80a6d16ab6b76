//! CLI argument definitions

use crate::domain::{InputDivision, Mode, TimeUnit};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "trapscope",
    about = "Profile instrumented on-device code via measurement traps",
    after_help = "\
EXAMPLES:
    trapscope --mode time --input-length 16              1000 timed rounds, random inputs
    trapscope --mode time --data-file inputs.txt         Inputs sampled from a file
    trapscope --mode memory --input-length 16 --csv m.csv  Single memory pass"
)]
pub struct Args {
    /// What the traps measure
    #[arg(long, value_enum, default_value_t = Mode::Time)]
    pub mode: Mode,

    /// Number of profiling rounds (memory mode always runs one)
    #[arg(long, default_value = "1000")]
    pub repeat_count: u32,

    /// Text file with one hex-encoded input per line
    #[arg(long, value_name = "FILE", conflicts_with = "input_length")]
    pub data_file: Option<PathBuf>,

    /// Length in bytes of randomly generated inputs
    #[arg(long, value_name = "BYTES", default_value = "16")]
    pub input_length: usize,

    /// Partition inputs into two classes and compare their cost
    #[arg(long, value_enum, default_value_t = InputDivision::None)]
    pub input_division: InputDivision,

    /// Unit of reported time measurements
    #[arg(long, value_enum, default_value_t = TimeUnit::Nano)]
    pub time_unit: TimeUnit,

    /// Class byte of the trigger command header
    #[arg(long, value_parser = parse_hex_byte, default_value = "00")]
    pub cla: u8,

    /// Instruction byte of the trigger command header
    #[arg(long, value_parser = parse_hex_byte, default_value = "20")]
    pub ins: u8,

    /// P1 byte of the trigger command header
    #[arg(long, value_parser = parse_hex_byte, default_value = "00")]
    pub p1: u8,

    /// P2 byte of the trigger command header
    #[arg(long, value_parser = parse_hex_byte, default_value = "00")]
    pub p2: u8,

    /// Reserved instrumentation instruction byte
    #[arg(long, value_parser = parse_hex_byte, default_value = "f5")]
    pub trap_ins: u8,

    /// Instruction byte resetting the target before each round
    #[arg(long, value_parser = parse_hex_byte)]
    pub reset_ins: Option<u8>,

    /// Write the raw measurement CSV to this file
    #[arg(long, value_name = "FILE")]
    pub csv: Option<PathBuf>,

    /// Write the analysed JSON report to this file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Suppress non-essential output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Enable debug output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Parses a byte given as two hex digits, with or without a `0x` prefix.
fn parse_hex_byte(s: &str) -> Result<u8, String> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u8::from_str_radix(digits, 16).map_err(|e| format!("invalid hex byte {s:?}: {e}"))
}
