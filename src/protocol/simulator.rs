//! In-memory device simulator
//!
//! Stands in for a real target when developing or testing the measurement
//! protocol: it honours the reserved instrumentation instructions, aborts at
//! the armed trap in time mode, serves recorded memory counters in pages,
//! and can inject transport faults.
//!
//! The simulated applet is deterministic per input, the same precondition
//! the protocol assumes of real targets.

use crate::domain::{TransportError, TrapId, PERF_START};
use crate::protocol::channel::DeviceChannel;
use crate::protocol::wire::{
    read_u16_be, Command, Response, SW_INS_NOT_SUPPORTED, TRANSPORT_CHUNK,
};

/// What the profiled function does for a given input: the traps it reaches,
/// in execution order, with the cumulative wall time at each.
pub type ExecutionSchedule = Box<dyn Fn(&[u8]) -> Vec<(TrapId, i64)> + Send>;

/// Behaviour description of one simulated instrumented applet.
pub struct SimulatedApplet {
    pub device_id: String,
    /// Instruction code triggering the profiled function.
    pub trigger_code: u8,
    /// Reserved instrumentation instruction code.
    pub reserved_code: u8,
    /// Optional reset instruction the applet honours.
    pub reset_code: Option<u8>,
    /// Fixed transport cost added to every reported wall time.
    pub base_latency_nanos: i64,
    pub schedule: ExecutionSchedule,
    /// Memory counters recorded per trap table slot:
    /// `[transient_deselect, transient_reset, persistent]`; an all-zero slot
    /// models a trap the execution never reached.
    pub memory_slots: Vec<[u16; 3]>,
    /// Constructor case: the installation already executed the code once,
    /// so the recorder buffers are populated before any explicit run.
    pub recorded_at_install: bool,
}

pub struct SimulatedTarget {
    applet: SimulatedApplet,
    armed: TrapId,
    last_nanos: i64,
    memory_recorded: bool,
    transmissions: usize,
    fail_at: Option<usize>,
}

impl SimulatedTarget {
    pub fn new(applet: SimulatedApplet) -> Self {
        let memory_recorded = applet.recorded_at_install;
        Self {
            applet,
            armed: PERF_START,
            last_nanos: 0,
            memory_recorded,
            transmissions: 0,
            fail_at: None,
        }
    }

    /// Makes the n-th transmission (1-indexed) fail with a transport error.
    pub fn fail_at_transmission(&mut self, n: usize) {
        self.fail_at = Some(n);
    }

    pub fn transmissions(&self) -> usize {
        self.transmissions
    }

    fn execute(&mut self, payload: &[u8]) -> Response {
        let reached = (self.applet.schedule)(payload);

        if let Some(&(_, cumulative)) =
            reached.iter().find(|(trap, _)| *trap == self.armed)
        {
            // armed trap hit: abort with the trap ID as status word
            self.last_nanos = self.applet.base_latency_nanos + cumulative;
            return Response::status(self.armed.0);
        }

        // run to completion; memory traps record unconditionally
        let total = reached.last().map_or(0, |&(_, c)| c);
        self.last_nanos = self.applet.base_latency_nanos + total;
        self.memory_recorded = true;
        Response::success(Vec::new())
    }

    fn drain_page(&self, kind: u8, page: u8) -> Response {
        let buffer = self.memory_buffer(kind);
        let start = usize::from(page) * TRANSPORT_CHUNK;
        let end = (start + TRANSPORT_CHUNK).min(buffer.len());
        if start >= buffer.len() {
            return Response::success(Vec::new());
        }
        Response::success(buffer[start..end].to_vec())
    }

    fn memory_buffer(&self, kind: u8) -> Vec<u8> {
        let slot_index = match kind {
            2 => 0, // transient deselect
            1 => 1, // transient reset
            _ => 2, // persistent
        };
        let mut buffer = Vec::with_capacity(self.applet.memory_slots.len() * 2);
        for slot in &self.applet.memory_slots {
            let value = if self.memory_recorded { slot[slot_index] } else { 0 };
            buffer.extend_from_slice(&value.to_be_bytes());
        }
        buffer
    }
}

impl DeviceChannel for SimulatedTarget {
    fn transmit(&mut self, command: &Command) -> Result<Response, TransportError> {
        self.transmissions += 1;
        if self.fail_at == Some(self.transmissions) {
            return Err(TransportError::ChannelClosed(
                "injected transport fault".to_string(),
            ));
        }

        if Some(command.code) == self.applet.reset_code {
            self.last_nanos = self.applet.base_latency_nanos;
            return Ok(Response::success(Vec::new()));
        }

        if command.code == self.applet.reserved_code {
            // a 2-byte payload arms a stop trap; otherwise drain a page of
            // recorded measurements selected by p1/p2
            if command.payload.len() == 2 {
                if let Some(id) = read_u16_be(&command.payload, 0) {
                    self.armed = TrapId(id);
                    self.last_nanos = self.applet.base_latency_nanos;
                    return Ok(Response::success(Vec::new()));
                }
            }
            return Ok(self.drain_page(command.p1, command.p2));
        }

        if command.code == self.applet.trigger_code {
            let payload = command.payload.clone();
            return Ok(self.execute(&payload));
        }

        Ok(Response::status(SW_INS_NOT_SUPPORTED))
    }

    fn last_transmit_nanos(&self) -> i64 {
        self.last_nanos
    }

    fn identifier(&self) -> String {
        self.applet.device_id.clone()
    }
}
