use pie_value::Value;
use tracing::warn;

use crate::{ComputerOp, HandlerResult, Interrupt, Machine};

pub(crate) fn handle(op: ComputerOp, intr: &mut Interrupt<'_>, machine: &mut dyn Machine) -> HandlerResult {
    let response = match op {
        ComputerOp::CostPerTick => Value::Float(machine.cost_per_tick()),
        ComputerOp::LastError => Value::from(machine.last_error()),
        ComputerOp::BeepPattern => {
            let pattern = intr.read_string()?;
            machine.beep_pattern(&pattern);
            return Ok(intr.response_none());
        }
        ComputerOp::Beep => {
            machine.beep(intr.r0() as i16, intr.r1() as i16);
            return Ok(intr.response_none());
        }
        ComputerOp::Users => Value::List(machine.users().into_iter().map(Value::Str).collect()),
        ComputerOp::AddUser => {
            let user = intr.read_string()?;
            return match machine.add_user(&user) {
                Ok(()) => Ok(intr.response_none()),
                Err(e) => {
                    warn!(%user, error = %e, "failed to add user");
                    Ok(intr.response_error(&e.to_string())?)
                }
            };
        }
        ComputerOp::RemoveUser => {
            let user = intr.read_string()?;
            Value::Bool(machine.remove_user(&user))
        }
        ComputerOp::Address => Value::Str(machine.address()),
        ComputerOp::TmpAddress => Value::from(machine.tmp_address()),
    };
    Ok(intr.response_value(&response)?)
}
