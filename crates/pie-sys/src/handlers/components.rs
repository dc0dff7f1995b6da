use std::ops::ControlFlow;

use pie_value::Value;

use super::{execute, read_call};
use crate::{
    CallDescriptor, CallKind, ComponentsOp, HandlerResult, HostError, Interrupt, Machine, Trap,
};

pub(crate) fn handle(
    op: ComponentsOp,
    intr: &mut Interrupt<'_>,
    machine: &mut dyn Machine,
    synchronized: bool,
) -> HandlerResult {
    let response = match op {
        ComponentsOp::Invoke => return invoke(intr, machine, synchronized),
        ComponentsOp::List => list(intr, machine)?,
        ComponentsOp::Count => Value::from(machine.component_count()),
        ComponentsOp::Max => Value::from(machine.max_components()),
        ComponentsOp::Methods => match methods(intr, machine)? {
            Some(methods) => methods,
            None => return Ok(0),
        },
        ComponentsOp::Annotations => match annotation(intr, machine)? {
            Some(doc) => doc,
            None => return Ok(0),
        },
    };
    Ok(intr.response_value(&response)?)
}

fn invoke(intr: &mut Interrupt<'_>, machine: &mut dyn Machine, synchronized: bool) -> HandlerResult {
    let call = match read_call(intr, CallKind::Invoke)? {
        ControlFlow::Continue(call) => call,
        ControlFlow::Break(status) => return Ok(status),
    };

    if !synchronized {
        if let CallDescriptor::ComponentInvoke {
            address, operation, ..
        } = &call
        {
            let Some(component) = machine.component(address) else {
                let error = HostError::NoSuchComponent(address.clone());
                return Ok(intr.response_error(&error.to_string())?);
            };
            let Some(info) = component.operation(operation) else {
                let error = HostError::NoSuchOperation(operation.clone());
                return Ok(intr.response_error(&error.to_string())?);
            };
            if !info.direct {
                return Err(Trap::Synchronize.into());
            }
        }
    }

    let result = execute(machine, call)?;
    Ok(intr.response_result(result)?)
}

fn list(intr: &Interrupt<'_>, machine: &dyn Machine) -> Result<Value, crate::Fault> {
    let components = machine.components();
    if intr.r0() == 0 {
        let map = components
            .into_iter()
            .map(|(address, kind)| (address, Value::Str(kind)))
            .collect();
        return Ok(Value::Map(map));
    }

    let wanted = intr.read_string()?;
    Ok(Value::List(
        components
            .into_iter()
            .filter(|(_, kind)| *kind == wanted)
            .map(|(address, _)| Value::Str(address))
            .collect(),
    ))
}

/// Request `[address]`.
fn methods(intr: &Interrupt<'_>, machine: &dyn Machine) -> Result<Option<Value>, crate::Fault> {
    let Ok(Value::List(request)) = intr.read_object()? else {
        return Ok(None);
    };
    let Some(address) = request.first().and_then(Value::as_str) else {
        return Ok(None);
    };
    Ok(machine.component(address).map(|component| {
        Value::List(component.operations().into_iter().map(Value::Str).collect())
    }))
}

/// Request `[address, operation]`.
fn annotation(intr: &Interrupt<'_>, machine: &dyn Machine) -> Result<Option<Value>, crate::Fault> {
    let Ok(Value::List(request)) = intr.read_object()? else {
        return Ok(None);
    };
    let [Value::Str(address), Value::Str(operation)] = request.as_slice() else {
        return Ok(None);
    };
    Ok(machine
        .component(address)
        .and_then(|component| component.operation(operation))
        .and_then(|info| info.doc)
        .map(Value::Str))
}
