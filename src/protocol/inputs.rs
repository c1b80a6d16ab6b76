//! Profiling input generation
//!
//! Each round executes the profiled function with one input, encoded as an
//! even-length hex string. Inputs come from a text file or are generated
//! randomly, and can be divided into two classes (by effective bit length or
//! Hamming weight) so the heatmap can compare input-dependent cost.

use crate::domain::{ConfigError, InputDivision};
use crate::protocol::wire::{hex_to_bytes, is_hex_string};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::path::{Path, PathBuf};

/// Candidates generated per requested input when a division is in effect;
/// the division keeps only the extremes of the sorted candidate pool.
const DIVISION_OVERSAMPLE: usize = 100;

/// One validated profiling input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    hex: String,
}

impl Input {
    pub fn from_hex(hex: impl Into<String>) -> Result<Self, ConfigError> {
        let hex = hex.into();
        if !is_hex_string(&hex) {
            return Err(ConfigError::InvalidInput { input: hex });
        }
        Ok(Self { hex })
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }

    pub fn bytes(&self) -> Vec<u8> {
        hex_to_bytes(&self.hex).expect("validated at construction")
    }

    /// Number of set bits in the encoded bytes.
    fn hamming_weight(&self) -> u32 {
        self.bytes().iter().map(|b| b.count_ones()).sum()
    }
}

/// Source of per-round inputs.
///
/// The measurement protocol records every generated input; the end-of-run
/// integrity check compares that record against the round count.
pub trait InputGenerator {
    fn generate(&mut self, count: u32, division: InputDivision) -> Result<Vec<Input>, ConfigError>;

    /// Short description for the export header, e.g. `random:16` or
    /// `file:inputs.txt`.
    fn descriptor(&self) -> String;
}

/// Uniformly random byte strings of a fixed length.
pub struct RandomInputs {
    length: usize,
    rng: StdRng,
}

impl RandomInputs {
    pub fn new(length: usize) -> Self {
        Self { length, rng: StdRng::from_entropy() }
    }

    /// Deterministic variant for tests.
    pub fn with_seed(length: usize, seed: u64) -> Self {
        Self { length, rng: StdRng::seed_from_u64(seed) }
    }
}

impl InputGenerator for RandomInputs {
    fn generate(&mut self, count: u32, division: InputDivision) -> Result<Vec<Input>, ConfigError> {
        info!("Generating {count} random inputs of {} bytes.", self.length);
        let pool = pool_size(count, division);
        let mut candidates = Vec::with_capacity(pool);
        for _ in 0..pool {
            let mut bytes = vec![0u8; self.length];
            self.rng.fill_bytes(&mut bytes);
            candidates.push(Input { hex: crate::protocol::wire::bytes_to_hex(&bytes) });
        }
        Ok(divide(candidates, count as usize, division))
    }

    fn descriptor(&self) -> String {
        format!("random:{}", self.length)
    }
}

/// Inputs sampled from the lines of a text file; every line must be a valid
/// hex string.
pub struct FileInputs {
    path: PathBuf,
    lines: Vec<Input>,
    rng: StdRng,
}

impl FileInputs {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        info!("Choosing inputs from text file {}.", path.display());

        let content = std::fs::read_to_string(&path)?;
        let mut lines = Vec::new();
        for line in content.lines() {
            lines.push(Input::from_hex(line)?);
        }
        if lines.is_empty() {
            return Err(ConfigError::EmptyInputSource { path: path.display().to_string() });
        }
        Ok(Self { path, lines, rng: StdRng::from_entropy() })
    }

    #[cfg(test)]
    fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }
}

impl InputGenerator for FileInputs {
    fn generate(&mut self, count: u32, division: InputDivision) -> Result<Vec<Input>, ConfigError> {
        let pool = pool_size(count, division);
        let candidates = (0..pool)
            .map(|_| self.lines[self.rng.gen_range(0..self.lines.len())].clone())
            .collect();
        Ok(divide(candidates, count as usize, division))
    }

    fn descriptor(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

fn pool_size(count: u32, division: InputDivision) -> usize {
    let count = count as usize;
    match division {
        InputDivision::None => count,
        _ => count * DIVISION_OVERSAMPLE,
    }
}

/// Keeps `count` inputs out of the candidate pool.
///
/// With a division in effect the candidates are sorted by the dividing
/// property and the two extreme quarters are kept: the first half of the
/// result is the low class, the second half the high class.
fn divide(mut candidates: Vec<Input>, count: usize, division: InputDivision) -> Vec<Input> {
    match division {
        InputDivision::None => {
            candidates.truncate(count);
            candidates
        }
        InputDivision::EffectiveBitLength => {
            // strings with more leading zero bits sort first
            candidates.sort_by(|a, b| a.hex.cmp(&b.hex));
            keep_extremes(candidates, count)
        }
        InputDivision::HammingWeight => {
            candidates.sort_by_key(Input::hamming_weight);
            keep_extremes(candidates, count)
        }
    }
}

fn keep_extremes(candidates: Vec<Input>, count: usize) -> Vec<Input> {
    let mid = count / 2;
    let odd = count & 1;
    let mut out = Vec::with_capacity(count);
    out.extend_from_slice(&candidates[..mid]);
    out.extend_from_slice(&candidates[candidates.len() - (mid + odd)..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn rejects_odd_length_hex() {
        assert!(Input::from_hex("0ab").is_err());
        assert!(Input::from_hex("00ab").is_ok());
    }

    #[test]
    fn random_inputs_have_requested_shape() {
        let mut gen = RandomInputs::with_seed(4, 7);
        let inputs = gen.generate(5, InputDivision::None).unwrap();
        assert_eq!(inputs.len(), 5);
        assert!(inputs.iter().all(|i| i.hex().len() == 8));
        assert_eq!(gen.descriptor(), "random:4");
    }

    #[test]
    fn hamming_division_splits_extremes() {
        let mut gen = RandomInputs::with_seed(2, 42);
        let inputs = gen.generate(10, InputDivision::HammingWeight).unwrap();
        assert_eq!(inputs.len(), 10);

        let weight = |i: &Input| i.hamming_weight();
        let low_max = inputs[..5].iter().map(weight).max().unwrap();
        let high_min = inputs[5..].iter().map(weight).min().unwrap();
        assert!(low_max <= high_min, "low class must not outweigh high class");
    }

    #[test]
    fn odd_count_division_still_returns_count_inputs() {
        let mut gen = RandomInputs::with_seed(2, 1);
        let inputs = gen.generate(7, InputDivision::EffectiveBitLength).unwrap();
        assert_eq!(inputs.len(), 7);
    }

    #[test]
    fn file_inputs_validate_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "00aa").unwrap();
        writeln!(file, "not-hex").unwrap();
        assert!(FileInputs::open(file.path()).is_err());
    }

    #[test]
    fn file_inputs_sample_from_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "00aa").unwrap();
        writeln!(file, "ffff").unwrap();
        let mut gen = FileInputs::open(file.path()).unwrap().with_seed(3);
        let inputs = gen.generate(6, InputDivision::None).unwrap();
        assert_eq!(inputs.len(), 6);
        assert!(inputs.iter().all(|i| i.hex() == "00aa" || i.hex() == "ffff"));
    }
}
