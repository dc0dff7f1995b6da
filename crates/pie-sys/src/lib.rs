//! Syscall dispatch for the emulated firmware CPU.
//!
//! The guest raises a software interrupt with a 32-bit immediate; the
//! [`Dispatcher`] decodes it into a [`Syscall`], marshals arguments out of
//! guest registers and memory, runs the handler against the host
//! [`Machine`], and writes a status code back into `r0`.
//!
//! Handlers never report control flow through the status channel. Stopping
//! the guest, replaying the interrupt on the designated host context, and
//! waiting for a signal are all carried by [`Trap`].
//!
//! # Usage
//!
//! ```ignore
//! use pie_sys::{Dispatcher, Trap};
//!
//! let mut dispatcher = Dispatcher::new(ram_size);
//! match dispatcher.dispatch(&mut cpu, &mut machine, imm, false) {
//!     Ok(()) => {}                       // r0 holds the status
//!     Err(Trap::Synchronize) => {}       // replay on the host context
//!     Err(trap) => return trap,
//! }
//! ```

mod call;
pub mod consts;
mod dispatch;
mod handlers;
mod host;
mod interrupt;
mod registry;
mod signal;
mod syscall;
mod vfs;

pub use call::{CallDescriptor, CallKind, CallResult, DescriptorError};
pub use dispatch::Dispatcher;
pub use host::{Component, HostError, Machine, OperationInfo, Signal};
pub use interrupt::Interrupt;
pub use registry::{HostObject, ValueRegistry};
pub use signal::SignalQueue;
pub use syscall::{
    Category, ComponentsOp, ComputerOp, ControlOp, InfoOp, SignalOp, Syscall, TimerOp, ValueOp,
    VfsOp,
};
pub use vfs::{FileHandle, FileTable};

use std::fmt;

use pie_state::MemoryError;
use thiserror::Error;

/// Why the guest stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExitReason {
    Shutdown { reboot: bool },
    Error(String),
    /// Normal return from the firmware's entry routine.
    Return,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shutdown { reboot: false } => f.write_str("shutdown"),
            Self::Shutdown { reboot: true } => f.write_str("reboot"),
            Self::Error(msg) => write!(f, "error: {msg}"),
            Self::Return => f.write_str("returned"),
        }
    }
}

/// Control conditions raised out-of-band from the status code.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Trap {
    /// Terminate the guest; nothing further is dispatched.
    #[error("guest stopped: {0}")]
    Stop(ExitReason),
    /// Replay the same interrupt on the designated host context.
    ///
    /// Raised before any side effect took place.
    #[error("synchronized call required")]
    Synchronize,
    /// No signal pending; resume after the timeout or on signal arrival.
    #[error("waiting for a signal (timeout {0})")]
    Sleep(u32),
}

impl Trap {
    pub(crate) fn fatal(msg: impl Into<String>) -> Self {
        Self::Stop(ExitReason::Error(msg.into()))
    }
}

/// Handler failure, resolved into a [`Trap`] by the dispatcher.
#[derive(Debug)]
pub(crate) enum Fault {
    Trap(Trap),
    Memory(MemoryError),
}

impl From<Trap> for Fault {
    fn from(trap: Trap) -> Self {
        Self::Trap(trap)
    }
}

impl From<MemoryError> for Fault {
    fn from(e: MemoryError) -> Self {
        Self::Memory(e)
    }
}

/// Status written to `r0`, or a fault.
pub(crate) type HandlerResult = std::result::Result<i32, Fault>;
