//! Device wire protocol primitives
//!
//! The device channel is a half-duplex request/response transport. One
//! request carries a 4-byte command header plus an optional payload; the
//! response carries a 16-bit status word plus an optional payload capped at
//! [`TRANSPORT_CHUNK`] bytes.

use std::fmt;

/// Success status word.
pub const SW_SUCCESS: u16 = 0x9000;

/// "Instruction not supported" status word reported by targets for unknown
/// instruction codes.
pub const SW_INS_NOT_SUPPORTED: u16 = 0x6d00;

/// Single-response payload capacity of the transport. Larger recorded
/// buffers are drained in pages of this size.
pub const TRANSPORT_CHUNK: usize = 256;

/// One request to the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub class: u8,
    pub code: u8,
    pub p1: u8,
    pub p2: u8,
    pub payload: Vec<u8>,
}

impl Command {
    pub fn new(class: u8, code: u8, p1: u8, p2: u8, payload: Vec<u8>) -> Self {
        Self { class, code, p1, p2, payload }
    }

    /// Header bytes as lowercase hex, for logs and the export header.
    pub fn header_hex(&self) -> String {
        bytes_to_hex(&[self.class, self.code, self.p1, self.p2])
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.header_hex(), bytes_to_hex(&self.payload))
    }
}

/// One response from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub sw: u16,
    pub payload: Vec<u8>,
}

impl Response {
    pub fn success(payload: Vec<u8>) -> Self {
        Self { sw: SW_SUCCESS, payload }
    }

    pub fn status(sw: u16) -> Self {
        Self { sw, payload: Vec::new() }
    }

    pub fn is_success(&self) -> bool {
        self.sw == SW_SUCCESS
    }
}

/// Reads the big-endian u16 at byte offset `idx`, if in bounds.
pub fn read_u16_be(buf: &[u8], idx: usize) -> Option<u16> {
    let hi = *buf.get(idx)?;
    let lo = *buf.get(idx + 1)?;
    Some(u16::from(hi) << 8 | u16::from(lo))
}

pub fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Decodes an even-length hex string; `None` on any malformed input.
pub fn hex_to_bytes(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

/// Valid profiling input: even-length string of hex digits (possibly empty).
pub fn is_hex_string(s: &str) -> bool {
    s.len() % 2 == 0 && s.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_hex_format() {
        let cmd = Command::new(0x00, 0xf5, 0x01, 0x02, vec![]);
        assert_eq!(cmd.header_hex(), "00f50102");
    }

    #[test]
    fn u16_round_trip() {
        let buf = [0x12, 0x34, 0x00, 0x07];
        assert_eq!(read_u16_be(&buf, 0), Some(0x1234));
        assert_eq!(read_u16_be(&buf, 2), Some(0x0007));
        assert_eq!(read_u16_be(&buf, 3), None);
    }

    #[test]
    fn hex_validation() {
        assert!(is_hex_string("00ab"));
        assert!(is_hex_string(""));
        assert!(!is_hex_string("0ab"));
        assert!(!is_hex_string("zz"));
    }

    #[test]
    fn hex_decode() {
        assert_eq!(hex_to_bytes("00ff"), Some(vec![0x00, 0xff]));
        assert_eq!(hex_to_bytes("0f0"), None);
        assert_eq!(bytes_to_hex(&[0x00, 0xff]), "00ff");
    }
}
