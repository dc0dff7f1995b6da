//! Register file and the CPU surface syscall handlers rely on.

use crate::{GuestMemory, MemoryError, MemoryMap};

/// Number of general-purpose registers (r0..r15).
pub const NUM_REGS: usize = 16;

pub const R0: usize = 0;
pub const R1: usize = 1;
pub const R2: usize = 2;
pub const R3: usize = 3;
pub const SP: usize = 13;
pub const LR: usize = 14;
pub const PC: usize = 15;

/// Guest register file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegisterFile {
    pub regs: [u32; NUM_REGS],
}

impl RegisterFile {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// What the dispatcher needs from the CPU core: registers and memory.
///
/// The instruction-executing core lives outside this workspace and only has
/// to expose this narrow surface.
pub trait GuestCpu {
    fn reg(&self, index: usize) -> u32;

    fn set_reg(&mut self, index: usize, value: u32);

    fn memory(&self) -> &dyn GuestMemory;

    fn memory_mut(&mut self) -> &mut dyn GuestMemory;

    fn pc(&self) -> u32 {
        self.reg(PC)
    }

    fn lr(&self) -> u32 {
        self.reg(LR)
    }
}

/// Registers plus address space, owned together.
#[derive(Debug)]
pub struct GuestState {
    pub regs: RegisterFile,
    pub memory: MemoryMap,
}

impl GuestState {
    #[must_use]
    pub fn new(memory: MemoryMap) -> Self {
        Self {
            regs: RegisterFile::new(),
            memory,
        }
    }

    /// Guest state with the standard flash/RAM layout.
    ///
    /// # Errors
    ///
    /// Fails if the RAM size is invalid or allocation fails.
    pub fn with_ram(ram_size: usize) -> Result<Self, MemoryError> {
        Ok(Self::new(MemoryMap::standard(ram_size)?))
    }

    /// Zero registers and memory.
    pub fn reset(&mut self) {
        self.regs = RegisterFile::new();
        self.memory.clear();
    }
}

impl GuestCpu for GuestState {
    fn reg(&self, index: usize) -> u32 {
        self.regs.regs[index % NUM_REGS]
    }

    fn set_reg(&mut self, index: usize, value: u32) {
        self.regs.regs[index % NUM_REGS] = value;
    }

    fn memory(&self) -> &dyn GuestMemory {
        &self.memory
    }

    fn memory_mut(&mut self) -> &mut dyn GuestMemory {
        &mut self.memory
    }
}
