//! PIE - firmware virtual machine for an emulated CPU
//!
//! Ties the pieces together: a firmware bundle is loaded into guest flash,
//! the register file is booted from its vector table, and guest software
//! interrupts are routed through [`pie_sys::Dispatcher`] to a host
//! [`Machine`].
//!
//! # Example
//!
//! ```ignore
//! use pie::{ExecutionResult, VirtualMachine, VmConfig};
//!
//! let config = VmConfig::new("firmwares", "v1.0.0").with_ram_size(192 * 1024);
//! let mut vm = VirtualMachine::new(&config, machine)?;
//!
//! // Called by the CPU core on every SVC.
//! match vm.interrupt(imm) {
//!     ExecutionResult::Continue => {}
//!     ExecutionResult::SynchronizedCall => { /* later, on the host thread */ vm.synchronized_call(); }
//!     other => return other,
//! }
//! ```

pub mod metrics;

mod config;
mod vm;

pub use config::{DEFAULT_FIRMWARE, DEFAULT_RAM_SIZE, VmConfig};
pub use vm::{ExecutionResult, VirtualMachine};

pub use pie_firmware::{Firmware, FirmwareError, Resolution, Symbol, SymbolTable, Traceback};
pub use pie_state::{GuestCpu, GuestMemory, GuestState, MemoryError};
pub use pie_sys::{
    CallResult, Component, Dispatcher, HostError, HostObject, Machine, Signal, ValueRegistry,
};
pub use pie_value::Value;

use thiserror::Error;

/// Virtual machine errors.
#[derive(Error, Debug)]
pub enum VmError {
    #[error("Firmware error: {0}")]
    Firmware(#[from] FirmwareError),
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),
    #[error("Invalid RAM size {size:#x}: must be a non-zero multiple of 4 up to {max:#x}")]
    InvalidRamSize { size: usize, max: usize },
    #[error("Firmware image is {size} bytes but flash holds {max}")]
    FirmwareTooLarge { size: usize, max: usize },
    #[error("Firmware image too small for a vector table ({0} bytes)")]
    NoVectorTable(usize),
}

pub type Result<T> = std::result::Result<T, VmError>;
