//! One guest session: firmware, guest state, dispatcher and host machine.

use pie_firmware::{Firmware, SymbolTable, Traceback};
use pie_state::{FLASH_ADDRESS, FLASH_SIZE, GuestCpu, GuestMemory, GuestState, PC, RAM_ADDRESS, SP};
use pie_sys::{Dispatcher, ExitReason, Machine, Trap};
use tracing::{debug, error, info};

use crate::{Result, VmConfig, VmError};

/// Outcome of handing one interrupt to the virtual machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecutionResult {
    /// `r0` holds the status; resume the guest.
    Continue,
    /// Call [`VirtualMachine::synchronized_call`] from the designated host
    /// context before resuming.
    SynchronizedCall,
    /// Wait for a signal or the timeout, then resume.
    Sleep(u32),
    Shutdown {
        reboot: bool,
    },
    Error(String),
    /// The firmware's entry routine returned.
    Returned,
}

impl ExecutionResult {
    /// Whether the guest has stopped for good.
    #[must_use]
    pub const fn is_stop(&self) -> bool {
        matches!(self, Self::Shutdown { .. } | Self::Error(_) | Self::Returned)
    }
}

/// A booted guest bound to a host machine.
pub struct VirtualMachine<M: Machine> {
    machine: M,
    state: GuestState,
    dispatcher: Dispatcher,
    firmware: Firmware,
    symbols: SymbolTable,
    image_size: usize,
    /// Interrupt waiting to be replayed on the host context.
    pending: Option<u32>,
    stopped: Option<ExecutionResult>,
}

impl<M: Machine> VirtualMachine<M> {
    /// Load the configured firmware into flash and boot the register file
    /// from its vector table.
    ///
    /// # Errors
    ///
    /// Fails on an invalid configuration, a missing or malformed firmware
    /// bundle, or an image that does not fit in flash.
    pub fn new(config: &VmConfig, machine: M) -> Result<Self> {
        config.validate()?;

        let firmware = Firmware::new(&config.firmware_root, &config.firmware)?;
        let image = firmware.load()?;
        if image.len() > FLASH_SIZE {
            return Err(VmError::FirmwareTooLarge {
                size: image.len(),
                max: FLASH_SIZE,
            });
        }
        if image.len() < 8 {
            return Err(VmError::NoVectorTable(image.len()));
        }
        let symbols = firmware.load_mapping()?;
        crate::metrics::record_firmware(firmware.name(), image.len(), symbols.len());

        let mut state = GuestState::with_ram(config.ram_size)?;
        state.memory_mut().write(FLASH_ADDRESS, &image)?;

        let ram_size = u32::try_from(config.ram_size).map_err(|_| VmError::InvalidRamSize {
            size: config.ram_size,
            max: pie_state::MAX_RAM_SIZE,
        })?;
        let reset = state.memory().read_u32(FLASH_ADDRESS + 4)?;
        state.set_reg(SP, RAM_ADDRESS + ram_size);
        // Clear the Thumb bit of the reset vector.
        state.set_reg(PC, reset & !1);

        info!(
            firmware = firmware.name(),
            size = image.len(),
            symbols = symbols.len(),
            ram_size,
            "virtual machine booted at {:#010x}",
            reset & !1
        );

        Ok(Self {
            machine,
            state,
            dispatcher: Dispatcher::new(ram_size),
            firmware,
            symbols,
            image_size: image.len(),
            pending: None,
            stopped: None,
        })
    }

    #[must_use]
    pub const fn machine(&self) -> &M {
        &self.machine
    }

    pub const fn machine_mut(&mut self) -> &mut M {
        &mut self.machine
    }

    /// Guest registers and memory, for the CPU core.
    #[must_use]
    pub const fn state(&self) -> &GuestState {
        &self.state
    }

    pub const fn state_mut(&mut self) -> &mut GuestState {
        &mut self.state
    }

    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    #[must_use]
    pub const fn firmware(&self) -> &Firmware {
        &self.firmware
    }

    #[must_use]
    pub const fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Size of the image copied into flash.
    #[must_use]
    pub const fn firmware_size(&self) -> usize {
        self.image_size
    }

    /// Interrupt waiting for [`Self::synchronized_call`].
    #[must_use]
    pub const fn pending_interrupt(&self) -> Option<u32> {
        self.pending
    }

    /// The stop result, once the guest has stopped.
    #[must_use]
    pub const fn stopped(&self) -> Option<&ExecutionResult> {
        self.stopped.as_ref()
    }

    /// Handle a software interrupt raised on the emulation context.
    pub fn interrupt(&mut self, imm: u32) -> ExecutionResult {
        if let Some(result) = &self.stopped {
            return result.clone();
        }
        match self
            .dispatcher
            .dispatch(&mut self.state, &mut self.machine, imm, false)
        {
            Ok(()) => ExecutionResult::Continue,
            Err(Trap::Synchronize) => {
                self.pending = Some(imm);
                ExecutionResult::SynchronizedCall
            }
            Err(trap) => self.finish(trap),
        }
    }

    /// Replay the pending interrupt on the designated host context.
    ///
    /// Each pending interrupt is replayed exactly once; without one this is
    /// a no-op.
    pub fn synchronized_call(&mut self) -> ExecutionResult {
        if let Some(result) = &self.stopped {
            return result.clone();
        }
        let Some(imm) = self.pending.take() else {
            debug!("no pending interrupt to synchronize");
            return ExecutionResult::Continue;
        };
        match self
            .dispatcher
            .dispatch(&mut self.state, &mut self.machine, imm, true)
        {
            Ok(()) => ExecutionResult::Continue,
            // The host refused again; keep it pending for the next turn.
            Err(Trap::Synchronize) => {
                self.pending = Some(imm);
                ExecutionResult::SynchronizedCall
            }
            Err(trap) => self.finish(trap),
        }
    }

    fn finish(&mut self, trap: Trap) -> ExecutionResult {
        let result = match trap {
            Trap::Sleep(timeout) => return ExecutionResult::Sleep(timeout),
            Trap::Synchronize => return ExecutionResult::SynchronizedCall,
            Trap::Stop(ExitReason::Shutdown { reboot }) => ExecutionResult::Shutdown { reboot },
            Trap::Stop(ExitReason::Return) => ExecutionResult::Returned,
            Trap::Stop(ExitReason::Error(message)) => {
                error!(%message, "guest stopped with an error");
                self.traceback();
                ExecutionResult::Error(message)
            }
        };
        info!(result = ?result, "guest stopped");
        self.stopped = Some(result.clone());
        result
    }

    /// Log and return where the guest currently is.
    pub fn traceback(&self) -> Traceback {
        self.symbols.print_traceback(self.state.pc(), self.state.lr())
    }

    /// Release every host value and descriptor held for the guest.
    pub fn teardown(&mut self) {
        self.machine.values().clear();
        self.dispatcher.teardown();
        self.pending = None;
        debug!(firmware = self.firmware.name(), "virtual machine torn down");
    }
}

impl<M: Machine> std::fmt::Debug for VirtualMachine<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualMachine")
            .field("firmware", &self.firmware.name())
            .field("pending", &self.pending)
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}
