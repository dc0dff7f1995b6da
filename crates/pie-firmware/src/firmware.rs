//! Named firmware bundles on disk.

use std::path::{Path, PathBuf};

use crate::{FirmwareError, Result, SymbolTable};

/// Firmware binary file name inside a bundle directory.
pub const FIRMWARE_FILE: &str = "firmware.bin";
/// Symbol map file name inside a bundle directory.
pub const MAP_FILE: &str = "firmware.map";

/// A firmware bundle: `<root>/<name>/firmware.bin` plus `firmware.map`.
#[derive(Clone, Debug)]
pub struct Firmware {
    name: String,
    dir: PathBuf,
}

impl Firmware {
    /// Locate a firmware bundle.
    ///
    /// # Errors
    ///
    /// Fails if `name` is not a single directory name below `root` or the
    /// bundle has no firmware binary.
    pub fn new(root: impl AsRef<Path>, name: &str) -> Result<Self> {
        if matches!(name, "" | "." | "..") || name.contains(['/', '\\']) {
            return Err(FirmwareError::InvalidName(name.to_string()));
        }

        let dir = root.as_ref().join(name);
        let binary = dir.join(FIRMWARE_FILE);
        if !binary.is_file() {
            return Err(FirmwareError::NotFound(binary));
        }

        Ok(Self {
            name: name.to_string(),
            dir,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read the firmware binary.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be read.
    pub fn load(&self) -> Result<Vec<u8>> {
        let path = self.dir.join(FIRMWARE_FILE);
        let data = std::fs::read(&path).map_err(|source| FirmwareError::Io { path, source })?;
        tracing::debug!(firmware = %self.name, size = data.len(), "loaded firmware");
        Ok(data)
    }

    /// Read and parse the symbol map.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the map is missing, or
    /// [`FirmwareError::InvalidMap`] for a malformed line.
    pub fn load_mapping(&self) -> Result<SymbolTable> {
        let path = self.dir.join(MAP_FILE);
        let text =
            std::fs::read_to_string(&path).map_err(|source| FirmwareError::Io { path, source })?;
        let table = SymbolTable::parse(&text)?;
        tracing::debug!(firmware = %self.name, symbols = table.len(), "loaded symbol map");
        Ok(table)
    }
}
