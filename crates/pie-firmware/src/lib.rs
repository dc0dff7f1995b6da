//! Firmware images and their symbol maps.

mod firmware;
mod symbols;

pub use firmware::{FIRMWARE_FILE, Firmware, MAP_FILE};
pub use symbols::{Resolution, Symbol, SymbolTable, Traceback};

use std::path::PathBuf;

use thiserror::Error;

/// Firmware loading errors.
#[derive(Error, Debug)]
pub enum FirmwareError {
    #[error("Invalid firmware name: {0:?}")]
    InvalidName(String),
    #[error("Firmware binary not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid map file (line {line}): {reason}")]
    InvalidMap { line: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, FirmwareError>;
