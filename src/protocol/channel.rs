//! Device channel seam
//!
//! Transport and connection management are external collaborators; the
//! measurement protocol only needs a blocking request/response primitive
//! plus the wall time of the last transmission. The channel is exclusively
//! owned by one profiling run at a time and is never retried: a call after a
//! suspected partial failure cannot be trusted to observe the same device
//! state the differencing model assumes.

use crate::domain::TransportError;
use crate::protocol::wire::{Command, Response};

pub trait DeviceChannel {
    /// Transmits one command and blocks for its response.
    fn transmit(&mut self, command: &Command) -> Result<Response, TransportError>;

    /// Wall time in nanoseconds spent on the most recent transmission,
    /// measured by the transport. Time mode differences consecutive values
    /// of this counter; the absolute value is dominated by transport latency
    /// and has no meaning on its own.
    fn last_transmit_nanos(&self) -> i64;

    /// Identifier of the connected device for the export header.
    fn identifier(&self) -> String;
}
