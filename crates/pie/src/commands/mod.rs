//! Command implementations.

mod info;
mod symbols;

use pie::{Firmware, SymbolTable};
use tracing::error;

use crate::cli::{Cli, Commands, FirmwareArgs};

/// Dispatch a CLI command to its handler.
pub fn run_command(cli: &Cli) -> i32 {
    match &cli.command {
        Commands::Symbols { firmware, filter } => {
            symbols::cmd_symbols(firmware, filter.as_deref())
        }
        Commands::Resolve {
            firmware,
            addresses,
        } => symbols::cmd_resolve(firmware, addresses),
        Commands::Traceback { firmware, pc, lr } => symbols::cmd_traceback(firmware, *pc, *lr),
        Commands::Info { firmware, ram_size } => info::cmd_info(firmware, *ram_size),
    }
}

/// Locate a bundle and load its symbol map, logging any failure.
fn load_symbols(args: &FirmwareArgs) -> Option<(Firmware, SymbolTable)> {
    let firmware = match Firmware::new(&args.root, &args.name) {
        Ok(firmware) => firmware,
        Err(e) => {
            error!(error = %e, root = %args.root.display(), "failed to locate firmware");
            return None;
        }
    };
    match firmware.load_mapping() {
        Ok(symbols) => Some((firmware, symbols)),
        Err(e) => {
            error!(error = %e, firmware = %args.name, "failed to load symbol map");
            None
        }
    }
}
