//! Virtual machine configuration.

use std::path::{Path, PathBuf};

use pie_state::MAX_RAM_SIZE;

use crate::{Result, VmError};

/// Default guest RAM: 256 KiB.
pub const DEFAULT_RAM_SIZE: usize = 256 * 1024;
/// Bundle name used when none is configured.
pub const DEFAULT_FIRMWARE: &str = "default";

/// Where to find the firmware and how much RAM the guest gets.
///
/// Which calls run on the designated host context is decided per call by
/// the embedder, not here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VmConfig {
    pub firmware_root: PathBuf,
    pub firmware: String,
    pub ram_size: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            firmware_root: PathBuf::from("."),
            firmware: DEFAULT_FIRMWARE.to_string(),
            ram_size: DEFAULT_RAM_SIZE,
        }
    }
}

impl VmConfig {
    #[must_use]
    pub fn new(firmware_root: impl AsRef<Path>, firmware: impl Into<String>) -> Self {
        Self {
            firmware_root: firmware_root.as_ref().to_path_buf(),
            firmware: firmware.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_firmware_root(mut self, root: impl AsRef<Path>) -> Self {
        self.firmware_root = root.as_ref().to_path_buf();
        self
    }

    #[must_use]
    pub fn with_firmware(mut self, name: impl Into<String>) -> Self {
        self.firmware = name.into();
        self
    }

    #[must_use]
    pub const fn with_ram_size(mut self, size: usize) -> Self {
        self.ram_size = size;
        self
    }

    /// # Errors
    ///
    /// Fails if the RAM size is zero, unaligned or above the guest limit.
    pub fn validate(&self) -> Result<()> {
        if self.ram_size == 0 || self.ram_size % 4 != 0 || self.ram_size > MAX_RAM_SIZE {
            return Err(VmError::InvalidRamSize {
                size: self.ram_size,
                max: MAX_RAM_SIZE,
            });
        }
        Ok(())
    }
}
