//! Time-mode measurement strategy
//!
//! Time mode never reads a clock on the target. Each trap, when armed,
//! aborts the execution with its own ID as the status word; the host
//! measures the wall time of the whole transmission and recovers per-segment
//! cost by differencing the cumulative times of consecutive traps. One round
//! replays the same input once per trap, so the target must behave
//! deterministically for a fixed input.

use crate::domain::{ProtocolError, TrapId, PERF_START};
use crate::protocol::series::MeasurementSeries;
use crate::protocol::wire::SW_SUCCESS;
use crate::protocol::{MeasurementProtocol, Measurements, Session};
use log::{debug, info};

pub struct TimeProtocol;

impl MeasurementProtocol for TimeProtocol {
    fn run(&self, session: &mut Session<'_>) -> Result<Measurements, ProtocolError> {
        let inputs = session.inputs().to_vec();
        let trap_ids: Vec<TrapId> = session.table().iter().map(|t| t.id).collect();
        let rounds = inputs.len();

        let mut series = MeasurementSeries::new();
        for (round, input) in inputs.iter().enumerate() {
            info!("Round {}/{rounds}.", round + 1);
            session.reset_if_configured()?;
            // arming the sentinel guarantees the warm-up pass below starts
            // from a well-defined "no trap armed" state
            session.set_stop(PERF_START)?;

            let mut prev_cumulative: i64 = 0;
            for &trap in &trap_ids {
                session.set_stop(trap)?;
                let response = session.execute(input)?;

                if response.sw == trap.0 {
                    let cumulative = session.last_transmit_nanos();
                    debug!("{trap} hit at {cumulative} ns cumulative.");
                    series.push(trap, Some(cumulative - prev_cumulative));
                    prev_cumulative = cumulative;
                    // free whatever the aborted execution left allocated
                    session.reset_if_configured()?;
                } else if response.sw == SW_SUCCESS {
                    // execution completed without hitting the armed trap:
                    // this input never reaches it
                    debug!("{trap} not reached in round {}.", round + 1);
                    series.push(trap, None);
                    session.mark_unreached(trap);
                } else {
                    return Err(ProtocolError::Desync { trap, sw: response.sw });
                }
            }
        }
        Ok(Measurements::Time(series))
    }
}
