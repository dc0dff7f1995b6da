use std::ops::ControlFlow;

use tracing::debug;

use super::{execute, read_call};
use crate::{CallKind, HandlerResult, Interrupt, Machine, ValueOp};

pub(crate) fn handle(op: ValueOp, intr: &mut Interrupt<'_>, machine: &mut dyn Machine) -> HandlerResult {
    let kind = match op {
        ValueOp::Call => CallKind::Call,
        ValueOp::Apply => CallKind::Apply,
        ValueOp::Unapply => CallKind::Unapply,
        ValueOp::Dispose => return dispose(intr, machine),
    };

    let call = match read_call(intr, kind)? {
        ControlFlow::Continue(call) => call,
        ControlFlow::Break(status) => return Ok(status),
    };
    let result = execute(machine, call)?;
    Ok(intr.response_result(result)?)
}

/// Always succeeds, whether or not the handle was registered.
fn dispose(intr: &Interrupt<'_>, machine: &dyn Machine) -> HandlerResult {
    if let Ok(value) = intr.read_object()? {
        if let Some(handle) = value.as_handle() {
            let removed = machine.values().dispose(handle);
            debug!(handle, removed, "disposed value");
        }
    }
    Ok(intr.response_none())
}
