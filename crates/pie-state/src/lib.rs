//! Guest machine state for the emulated firmware CPU.
//!
//! Provides the flat guest address space (guarded, bounds-checked regions),
//! the register file, and the [`GuestCpu`] trait through which syscall
//! handlers see a CPU core they do not own.
//!
//! ```ignore
//! use pie_state::{GuestCpu, GuestMemory, GuestState, R0, RAM_ADDRESS};
//!
//! let mut state = GuestState::with_ram(128 * 1024)?;
//! state.memory_mut().write(RAM_ADDRESS, b"hello")?;
//! state.set_reg(R0, RAM_ADDRESS);
//! ```

mod cpu;
mod guest;
mod memory;

pub use cpu::{GuestCpu, GuestState, LR, NUM_REGS, PC, R0, R1, R2, R3, RegisterFile, SP};
pub use guest::{
    FLASH_ADDRESS, FLASH_SIZE, GuestMemory, MAX_RAM_SIZE, MemoryMap, RAM_ADDRESS,
};
pub use memory::{GUARD_SIZE, Region};

use thiserror::Error;

/// Guest memory errors.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("mmap failed: {0}")]
    MmapFailed(#[from] nix::Error),

    #[error("invalid memory size: {0}")]
    InvalidSize(usize),

    #[error("region at {base:#x} (size {size:#x}) overlaps an existing region")]
    Overlap { base: u32, size: usize },

    #[error("access of {len} bytes at {address:#x} is out of bounds")]
    OutOfBounds { address: u32, len: usize },

    #[error("invalid length {len} for access at {address:#x}")]
    InvalidLength { address: u32, len: i64 },
}
