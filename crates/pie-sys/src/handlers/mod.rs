//! Per-category interrupt handlers.
//!
//! Each handler returns the status for `r0` or a [`Fault`].
//! [`Trap::Synchronize`] is only raised before the host or the guest has
//! been mutated.

pub(crate) mod components;
pub(crate) mod computer;
pub(crate) mod control;
pub(crate) mod value;

use std::ops::ControlFlow;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use metrics::counter;
use pie_value::Value;
use tracing::{debug, warn};

use crate::consts::{INFO_VERSION, SIGNAL_PENDING};
use crate::{
    CallDescriptor, CallKind, CallResult, Fault, HandlerResult, HostError, InfoOp, Interrupt,
    Machine, SignalOp, SignalQueue, TimerOp, Trap,
};

/// Run a call against the host.
///
/// A refused call becomes [`Trap::Synchronize`]; any other failure is
/// logged and handed back for the guest.
pub(crate) fn execute(machine: &mut dyn Machine, call: CallDescriptor) -> Result<CallResult, Fault> {
    let target = call.to_string();
    match call.execute(machine) {
        Err(HostError::LimitReached) => {
            debug!(%target, "host call limit reached");
            Err(Trap::Synchronize.into())
        }
        Err(e) => {
            warn!(%target, error = %e, "host call failed");
            counter!("pie_host_errors_total").increment(1);
            Ok(Err(e))
        }
        ok => Ok(ok),
    }
}

/// Decode the request object as a call of `kind`.
///
/// A malformed request is answered with an error response, returned as
/// `Break(status)`.
pub(crate) fn read_call(
    intr: &mut Interrupt<'_>,
    kind: CallKind,
) -> Result<ControlFlow<i32, CallDescriptor>, Fault> {
    let message = match intr.read_object()? {
        Ok(object) => match CallDescriptor::from_value(kind, object) {
            Ok(call) => return Ok(ControlFlow::Continue(call)),
            Err(e) => e.to_string(),
        },
        Err(e) => format!("Invalid {kind}: {e}"),
    };
    warn!(%kind, %message, "malformed call request");
    Ok(ControlFlow::Break(intr.response_error(&message)?))
}

pub(crate) fn debug_write(intr: &Interrupt<'_>, machine: &mut dyn Machine) -> HandlerResult {
    let buf = intr.read_buffer()?;
    machine.debug_output(&String::from_utf8_lossy(&buf));
    Ok(0)
}

pub(crate) fn signal(op: SignalOp, intr: &mut Interrupt<'_>, machine: &mut dyn Machine) -> HandlerResult {
    let mut queue = SignalQueue::new(machine);
    let signal = match op {
        SignalOp::Request => match queue.request(intr.r0()) {
            Ok(signal) => signal,
            Err(trap) => {
                intr.set_result(SIGNAL_PENDING);
                return Err(trap.into());
            }
        },
        SignalOp::Pending => match queue.pending() {
            Some(signal) => signal,
            None => return Ok(0),
        },
    };
    Ok(intr.response_value(&signal)?)
}

pub(crate) fn info(op: InfoOp, ram_size: u32) -> HandlerResult {
    Ok(match op {
        InfoOp::Version => INFO_VERSION,
        InfoOp::RamSize => ram_size as i32,
    })
}

pub(crate) fn timer(
    op: TimerOp,
    intr: &mut Interrupt<'_>,
    machine: &dyn Machine,
    started: Instant,
) -> HandlerResult {
    let seconds = match op {
        // Both tick counters wrap at 32 bits.
        TimerOp::TicksMs => {
            let millis = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_millis());
            return Ok(millis as i32);
        }
        TimerOp::TicksUs => return Ok(started.elapsed().as_micros() as i32),
        TimerOp::WorldTime => machine.world_time(),
        TimerOp::UpTime => machine.up_time(),
        TimerOp::CpuTime => machine.cpu_time(),
    };
    Ok(intr.response_value(&Value::Float(seconds))?)
}
