//! Symbol map commands: list, resolve and traceback.

use tracing::info;

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS, FirmwareArgs};
use crate::commands::load_symbols;

/// Handle the `symbols` command.
pub fn cmd_symbols(args: &FirmwareArgs, filter: Option<&str>) -> i32 {
    let Some((firmware, symbols)) = load_symbols(args) else {
        return EXIT_FAILURE;
    };

    let mut shown = 0usize;
    for symbol in symbols
        .iter()
        .filter(|s| filter.is_none_or(|f| s.name.contains(f)))
    {
        println!(
            "{:#010x} {:#8x} {:<8} {}",
            symbol.address, symbol.size, symbol.kind, symbol.name
        );
        shown += 1;
    }
    info!(firmware = firmware.name(), shown, total = symbols.len(), "listed symbols");
    EXIT_SUCCESS
}

/// Handle the `resolve` command.
pub fn cmd_resolve(args: &FirmwareArgs, addresses: &[u32]) -> i32 {
    let Some((_, symbols)) = load_symbols(args) else {
        return EXIT_FAILURE;
    };

    for &address in addresses {
        println!("{address:#010x}: {}", symbols.resolve(address));
    }
    EXIT_SUCCESS
}

/// Handle the `traceback` command.
pub fn cmd_traceback(args: &FirmwareArgs, pc: u32, lr: u32) -> i32 {
    let Some((_, symbols)) = load_symbols(args) else {
        return EXIT_FAILURE;
    };

    println!("{}", symbols.traceback(pc, lr));
    EXIT_SUCCESS
}
