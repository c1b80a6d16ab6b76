//! Memory-mode measurement strategy
//!
//! Memory traps record unconditionally, so a single execution fires every
//! reachable trap. The recorded per-kind counter buffers are then drained
//! from the target in transport-sized pages. A recorded value of zero is the
//! unreached sentinel: no real measurement can be zero because the recorder
//! itself occupies memory.

use crate::domain::{MemoryKind, ProtocolError, TargetKind, TrapId};
use crate::protocol::series::{MeasurementSeries, MemorySeriesSet};
use crate::protocol::wire::{read_u16_be, TRANSPORT_CHUNK};
use crate::protocol::{MeasurementProtocol, Measurements, Session};
use log::{debug, info};

pub struct MemoryProtocol;

impl MeasurementProtocol for MemoryProtocol {
    fn run(&self, session: &mut Session<'_>) -> Result<Measurements, ProtocolError> {
        match session.config().target_kind {
            TargetKind::Method => {
                session.reset_if_configured()?;
                let input = session.inputs().first().cloned().ok_or_else(|| {
                    ProtocolError::DataIntegrity(
                        "memory mode requires exactly one input".to_string(),
                    )
                })?;
                let response = session.execute(&input)?;
                if !response.is_success() {
                    return Err(ProtocolError::CommandFailed {
                        command: "trigger execution".to_string(),
                        sw: response.sw,
                    });
                }
            }
            TargetKind::Constructor => {
                // constructors already ran during installation, the recorder
                // buffers are populated
                info!("Constructor target: using measurements recorded at installation.");
            }
        }

        let trap_ids: Vec<TrapId> = session.table().iter().map(|t| t.id).collect();
        let mut set = MemorySeriesSet::default();
        for kind in MemoryKind::ALL {
            let buffer = drain(session, kind)?;
            let series = match kind {
                MemoryKind::TransientDeselect => &mut set.transient_deselect,
                MemoryKind::TransientReset => &mut set.transient_reset,
                MemoryKind::Persistent => &mut set.persistent,
            };
            decode(session, &trap_ids, kind, &buffer, series)?;
        }
        Ok(Measurements::Memory(set))
    }
}

/// Drains one kind's recorder buffer in pages of [`TRANSPORT_CHUNK`] bytes.
fn drain(session: &mut Session<'_>, kind: MemoryKind) -> Result<Vec<u8>, ProtocolError> {
    let total = session.table().len() * 2;
    info!("Draining {total} bytes of {kind} measurements.");

    let mut buffer = Vec::with_capacity(total);
    let mut page: u8 = 0;
    while buffer.len() < total {
        let expected = (total - buffer.len()).min(TRANSPORT_CHUNK);
        let response = session.drain_page(kind, page)?;
        if !response.is_success() {
            return Err(ProtocolError::CommandFailed {
                command: format!("drain {kind} page {page}"),
                sw: response.sw,
            });
        }
        if response.payload.len() != expected {
            return Err(ProtocolError::DataIntegrity(format!(
                "{kind} page {page}: expected {expected} bytes, got {}",
                response.payload.len()
            )));
        }
        buffer.extend_from_slice(&response.payload);
        page = page.checked_add(1).ok_or_else(|| {
            ProtocolError::DataIntegrity(format!("{kind} buffer exceeds the page address space"))
        })?;
    }
    Ok(buffer)
}

/// Decodes per-trap big-endian counters out of a drained buffer. Trap table
/// position doubles as the buffer slot.
fn decode(
    session: &mut Session<'_>,
    trap_ids: &[TrapId],
    kind: MemoryKind,
    buffer: &[u8],
    series: &mut MeasurementSeries,
) -> Result<(), ProtocolError> {
    for (slot, &trap) in trap_ids.iter().enumerate() {
        let value = read_u16_be(buffer, slot * 2).ok_or_else(|| {
            ProtocolError::DataIntegrity(format!("{kind} buffer too short for slot {slot}"))
        })?;
        if value == 0 {
            debug!("{trap} not reached ({kind}).");
            series.push(trap, None);
            session.mark_unreached(trap);
        } else {
            series.push(trap, Some(i64::from(value)));
        }
    }
    Ok(())
}
