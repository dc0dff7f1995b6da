use crate::{ControlOp, ExitReason, HandlerResult, Interrupt, Trap};

pub(crate) fn handle(op: ControlOp, intr: &mut Interrupt<'_>) -> HandlerResult {
    match op {
        ControlOp::Shutdown => Err(Trap::Stop(ExitReason::Shutdown { reboot: false }).into()),
        ControlOp::Reboot => Err(Trap::Stop(ExitReason::Shutdown { reboot: true }).into()),
        ControlOp::Crash => {
            let message = intr.read_string()?;
            Err(Trap::fatal(message).into())
        }
        ControlOp::Return => Err(Trap::Stop(ExitReason::Return).into()),
        ControlOp::InitCopy => {
            let (src, dest, dest_end) = (intr.r0(), intr.r1(), intr.r2());
            let size = i64::from(dest_end) - i64::from(dest);
            intr.memory_mut().copy(src, dest, size)?;
            Ok(1)
        }
        ControlOp::InitZero => {
            let (start, end) = (intr.r0(), intr.r1());
            let size = i64::from(end) - i64::from(start);
            intr.memory_mut().fill(start, size, 0)?;
            Ok(1)
        }
    }
}
