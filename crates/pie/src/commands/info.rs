//! Info command: boot a bundle without a component network.

use pie::{
    CallResult, Component, GuestCpu, HostError, Machine, Signal, Value, ValueRegistry, VmConfig,
    VirtualMachine,
};
use pie_state::{PC, SP};
use tracing::error;

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS, FirmwareArgs};

/// Host machine with no components and an empty signal queue.
#[derive(Default)]
struct Headless {
    values: ValueRegistry,
}

impl Machine for Headless {
    fn component(&self, _address: &str) -> Option<&dyn Component> {
        None
    }

    fn components(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn max_components(&self) -> usize {
        0
    }

    fn invoke(&mut self, address: &str, _operation: &str, _args: Vec<Value>) -> CallResult {
        Err(HostError::NoSuchComponent(address.to_string()))
    }

    fn pop_signal(&mut self) -> Option<Signal> {
        None
    }

    fn values(&self) -> &ValueRegistry {
        &self.values
    }

    fn address(&self) -> String {
        "headless".to_string()
    }
}

/// Handle the `info` command.
pub fn cmd_info(args: &FirmwareArgs, ram_size: usize) -> i32 {
    let config = VmConfig::new(&args.root, &args.name).with_ram_size(ram_size);
    let vm = match VirtualMachine::new(&config, Headless::default()) {
        Ok(vm) => vm,
        Err(e) => {
            error!(error = %e, firmware = %args.name, "failed to boot firmware");
            return EXIT_FAILURE;
        }
    };

    let state = vm.state();
    let entry = state.reg(PC);
    println!("firmware    : {}", vm.firmware().name());
    println!("directory   : {}", vm.firmware().dir().display());
    println!("size        : {} bytes", vm.firmware_size());
    println!("ram size    : {ram_size:#x}");
    println!("symbols     : {}", vm.symbols().len());
    println!("initial sp  : {:#010x}", state.reg(SP));
    println!("entry point : {entry:#010x} {}", vm.symbols().resolve(entry));
    EXIT_SUCCESS
}
