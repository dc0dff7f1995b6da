//! CLI definitions and argument types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use pie::DEFAULT_RAM_SIZE;

/// Exit code for success.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for failure.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(name = "pie")]
#[command(about = "PIE - inspect and boot firmware bundles for the guest VM")]
#[command(version)]
pub struct Cli {
    /// Show metrics summary after execution
    #[arg(long, global = true)]
    pub metrics: bool,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output (only show errors)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub silent: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default log level for the selected verbosity.
    pub const fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.silent {
            "error"
        } else {
            "info"
        }
    }
}

/// Which bundle to operate on.
#[derive(Args, Clone, Debug)]
pub struct FirmwareArgs {
    /// Directory holding firmware bundles
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    /// Bundle name (a directory under the root)
    #[arg(value_name = "NAME")]
    pub name: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the symbols of a firmware map
    Symbols {
        #[command(flatten)]
        firmware: FirmwareArgs,

        /// Only show symbols whose name contains this text
        #[arg(long)]
        filter: Option<String>,
    },
    /// Resolve guest addresses to symbol + offset
    Resolve {
        #[command(flatten)]
        firmware: FirmwareArgs,

        /// Addresses (hex, with or without 0x)
        #[arg(value_name = "ADDR", required = true, value_parser = parse_address)]
        addresses: Vec<u32>,
    },
    /// Print the traceback of a stopped guest
    Traceback {
        #[command(flatten)]
        firmware: FirmwareArgs,

        /// Program counter
        #[arg(long, value_parser = parse_address)]
        pc: u32,

        /// Link register
        #[arg(long, value_parser = parse_address)]
        lr: u32,
    },
    /// Boot a firmware bundle and report its initial state
    Info {
        #[command(flatten)]
        firmware: FirmwareArgs,

        /// Guest RAM size in bytes
        #[arg(long, default_value_t = DEFAULT_RAM_SIZE)]
        ram_size: usize,
    },
}

/// Parse a guest address: hex digits with an optional `0x` prefix.
pub fn parse_address(arg: &str) -> Result<u32, String> {
    let digits = arg
        .strip_prefix("0x")
        .or_else(|| arg.strip_prefix("0X"))
        .unwrap_or(arg);
    u32::from_str_radix(digits, 16).map_err(|e| format!("invalid address '{arg}': {e}"))
}
