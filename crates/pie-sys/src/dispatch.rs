//! Interrupt dispatch core.

use std::time::Instant;

use metrics::{counter, gauge};
use pie_state::GuestCpu;
use tracing::{debug, error};

use crate::handlers::{self, components, computer, control, value};
use crate::{Category, ExitReason, Fault, FileTable, Interrupt, Machine, Syscall, Trap, vfs};

/// Routes guest interrupts to handlers and owns per-VM syscall state.
#[derive(Debug)]
pub struct Dispatcher {
    files: FileTable,
    started: Instant,
    ram_size: u32,
}

impl Dispatcher {
    #[must_use]
    pub fn new(ram_size: u32) -> Self {
        Self {
            files: FileTable::new(),
            started: Instant::now(),
            ram_size,
        }
    }

    #[must_use]
    pub const fn files(&self) -> &FileTable {
        &self.files
    }

    #[must_use]
    pub const fn ram_size(&self) -> u32 {
        self.ram_size
    }

    /// Handle one interrupt.
    ///
    /// On `Ok`, `r0` holds the status. `synchronized` says whether this call
    /// runs on the designated host context.
    ///
    /// # Errors
    ///
    /// Returns the [`Trap`] that interrupts normal execution: a stop, a
    /// request to replay on the host context, or a signal wait.
    pub fn dispatch(
        &mut self,
        cpu: &mut dyn GuestCpu,
        machine: &mut dyn Machine,
        imm: u32,
        synchronized: bool,
    ) -> Result<(), Trap> {
        let Some(syscall) = Syscall::decode(imm) else {
            match Category::from_imm(imm) {
                Some(category) => error!(%category, "unknown interrupt operation {imm:#010x}"),
                None => error!("unknown interrupt category {imm:#010x}"),
            }
            counter!("pie_fatal_stops_total").increment(1);
            return Err(Trap::fatal("Unknown Interrupt"));
        };

        let category = syscall.category();
        counter!("pie_interrupts_total", "category" => category.name()).increment(1);

        let mut intr = Interrupt::new(cpu, imm);
        debug!(?syscall, ?intr, synchronized, "dispatch");

        let result = self.run(syscall, &mut intr, machine, synchronized);
        if category == Category::Vfs {
            gauge!("pie_open_files").set(self.files.len() as f64);
        }

        match result {
            Ok(status) => {
                intr.set_result(status);
                Ok(())
            }
            Err(Fault::Trap(Trap::Synchronize)) => {
                debug!(?syscall, "synchronized call required");
                counter!("pie_synchronized_calls_total").increment(1);
                Err(Trap::Synchronize)
            }
            Err(Fault::Trap(Trap::Stop(ExitReason::Error(message)))) => {
                error!(?syscall, %message, "guest crashed");
                counter!("pie_fatal_stops_total").increment(1);
                Err(Trap::fatal(message))
            }
            Err(Fault::Trap(trap)) => Err(trap),
            Err(Fault::Memory(e)) => {
                error!(?syscall, error = %e, "memory fault during interrupt");
                counter!("pie_fatal_stops_total").increment(1);
                Err(Trap::fatal(format!("Memory fault: {e}")))
            }
        }
    }

    fn run(
        &mut self,
        syscall: Syscall,
        intr: &mut Interrupt<'_>,
        machine: &mut dyn Machine,
        synchronized: bool,
    ) -> crate::HandlerResult {
        match syscall {
            Syscall::Control(op) => control::handle(op, intr),
            Syscall::DebugWrite => handlers::debug_write(intr, machine),
            Syscall::Signal(op) => handlers::signal(op, intr, machine),
            Syscall::Components(op) => components::handle(op, intr, machine, synchronized),
            Syscall::Value(op) => value::handle(op, intr, machine),
            Syscall::Computer(op) => computer::handle(op, intr, machine),
            Syscall::Info(op) => handlers::info(op, self.ram_size),
            Syscall::Timer(op) => handlers::timer(op, intr, machine, self.started),
            Syscall::Vfs(op) => vfs::handle(op, intr, machine, &mut self.files, synchronized),
        }
    }

    /// Forget every open descriptor.
    pub fn teardown(&mut self) {
        self.files.clear();
        gauge!("pie_open_files").set(0.0);
    }
}
