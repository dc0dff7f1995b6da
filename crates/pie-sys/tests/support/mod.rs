//! Scripted host and guest doubles shared by the dispatch tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};

use pie_state::{GuestCpu, GuestMemory, GuestState, R0, R1, R2, R3, RAM_ADDRESS};
use pie_sys::{
    CallResult, Component, Dispatcher, HostError, Machine, OperationInfo, Signal, Trap,
    ValueRegistry,
};
use pie_value::Value;

pub const RAM_SIZE: usize = 0x1_0000;

/// Request objects and guest input buffers.
pub const REQ: u32 = RAM_ADDRESS;
/// Response buffer.
pub const RESP: u32 = RAM_ADDRESS + 0x1000;
pub const RESP_CAPACITY: u32 = 0x400;
/// Scratch area for strings and output pointers.
pub const SCRATCH: u32 = RAM_ADDRESS + 0x2000;

pub struct ScriptedComponent {
    address: String,
    kind: String,
    operations: Vec<(String, OperationInfo)>,
}

impl ScriptedComponent {
    pub fn new(address: &str, kind: &str) -> Self {
        Self {
            address: address.to_string(),
            kind: kind.to_string(),
            operations: Vec::new(),
        }
    }

    pub fn with_operation(mut self, name: &str, info: OperationInfo) -> Self {
        self.operations.push((name.to_string(), info));
        self
    }
}

impl Component for ScriptedComponent {
    fn address(&self) -> &str {
        &self.address
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn operations(&self) -> Vec<String> {
        self.operations.iter().map(|(name, _)| name.clone()).collect()
    }

    fn operation(&self, name: &str) -> Option<OperationInfo> {
        self.operations
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, info)| info.clone())
    }
}

/// A host whose components answer from a script and record every call.
#[derive(Default)]
pub struct TestMachine {
    pub components: Vec<ScriptedComponent>,
    pub responses: HashMap<(String, String), VecDeque<CallResult>>,
    pub invocations: Vec<(String, String, Vec<Value>)>,
    pub signals: VecDeque<Signal>,
    pub values: ValueRegistry,
    pub debug: String,
    pub users: Vec<String>,
    pub beeps: Vec<(i16, i16)>,
}

impl TestMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_component(mut self, component: ScriptedComponent) -> Self {
        self.components.push(component);
        self
    }

    /// Queue the next result of `address.operation`.
    pub fn script(&mut self, address: &str, operation: &str, result: CallResult) {
        self.responses
            .entry((address.to_string(), operation.to_string()))
            .or_default()
            .push_back(result);
    }

    pub fn calls_to(&self, operation: &str) -> usize {
        self.invocations
            .iter()
            .filter(|(_, op, _)| op == operation)
            .count()
    }
}

impl Machine for TestMachine {
    fn component(&self, address: &str) -> Option<&dyn Component> {
        self.components
            .iter()
            .find(|c| c.address == address)
            .map(|c| c as &dyn Component)
    }

    fn components(&self) -> Vec<(String, String)> {
        self.components
            .iter()
            .map(|c| (c.address.clone(), c.kind.clone()))
            .collect()
    }

    fn max_components(&self) -> usize {
        16
    }

    fn invoke(&mut self, address: &str, operation: &str, args: Vec<Value>) -> CallResult {
        self.invocations
            .push((address.to_string(), operation.to_string(), args));
        let key = (address.to_string(), operation.to_string());
        if let Some(result) = self.responses.get_mut(&key).and_then(VecDeque::pop_front) {
            return result;
        }
        if self.component(address).is_none() {
            return Err(HostError::NoSuchComponent(address.to_string()));
        }
        Ok(Vec::new())
    }

    fn pop_signal(&mut self) -> Option<Signal> {
        self.signals.pop_front()
    }

    fn values(&self) -> &ValueRegistry {
        &self.values
    }

    fn address(&self) -> String {
        "computer-0".to_string()
    }

    fn tmp_address(&self) -> Option<String> {
        Some("tmpfs-0".to_string())
    }

    fn beep(&mut self, frequency: i16, duration: i16) {
        self.beeps.push((frequency, duration));
    }

    fn users(&self) -> Vec<String> {
        self.users.clone()
    }

    fn add_user(&mut self, name: &str) -> Result<(), HostError> {
        if self.users.iter().any(|u| u == name) {
            return Err(HostError::Failed(format!("user exists: {name}")));
        }
        self.users.push(name.to_string());
        Ok(())
    }

    fn remove_user(&mut self, name: &str) -> bool {
        let before = self.users.len();
        self.users.retain(|u| u != name);
        self.users.len() != before
    }

    fn world_time(&self) -> f64 {
        1234.5
    }

    fn debug_output(&mut self, text: &str) {
        self.debug.push_str(text);
    }
}

/// Guest CPU, dispatcher and host wired together.
pub struct Harness {
    pub cpu: GuestState,
    pub machine: TestMachine,
    pub dispatcher: Dispatcher,
}

impl Harness {
    pub fn new(machine: TestMachine) -> Self {
        Self {
            cpu: GuestState::with_ram(RAM_SIZE).expect("guest state"),
            machine,
            dispatcher: Dispatcher::new(RAM_SIZE as u32),
        }
    }

    pub fn regs(&mut self, r0: u32, r1: u32, r2: u32, r3: u32) {
        self.cpu.set_reg(R0, r0);
        self.cpu.set_reg(R1, r1);
        self.cpu.set_reg(R2, r2);
        self.cpu.set_reg(R3, r3);
    }

    /// Place an encoded request at `REQ` and point `(r0, r1)` at it and
    /// `(r2, r3)` at the response buffer.
    pub fn request(&mut self, value: &Value) {
        let encoded = pie_value::encode(value);
        self.write(REQ, &encoded);
        self.regs(REQ, encoded.len() as u32, RESP, RESP_CAPACITY);
    }

    /// Point `(r0, r1)` at raw bytes.
    pub fn buffer(&mut self, data: &[u8]) {
        self.write(REQ, data);
        self.regs(REQ, data.len() as u32, RESP, RESP_CAPACITY);
    }

    pub fn write(&mut self, address: u32, data: &[u8]) {
        if !data.is_empty() {
            self.cpu.memory_mut().write(address, data).expect("guest write");
        }
    }

    /// Write a NUL-terminated string and return its address.
    pub fn cstr(&mut self, address: u32, text: &str) -> u32 {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        self.write(address, &bytes);
        address
    }

    pub fn read(&self, address: u32, len: usize) -> Vec<u8> {
        self.cpu
            .memory()
            .read_vec(address, len as i64)
            .expect("guest read")
    }

    pub fn read_i32(&self, address: u32) -> i32 {
        self.cpu.memory().read_u32(address).expect("guest read") as i32
    }

    pub fn dispatch(&mut self, imm: u32) -> Result<(), Trap> {
        self.dispatcher
            .dispatch(&mut self.cpu, &mut self.machine, imm, false)
    }

    pub fn dispatch_synchronized(&mut self, imm: u32) -> Result<(), Trap> {
        self.dispatcher
            .dispatch(&mut self.cpu, &mut self.machine, imm, true)
    }

    /// Status code in `r0`.
    pub fn status(&self) -> i32 {
        self.cpu.reg(R0) as i32
    }

    /// Decode the response written for a non-negative status.
    pub fn response(&self) -> Value {
        let len = self.status();
        assert!(len > 0, "expected a value response, status {len}");
        pie_value::decode(&self.read(RESP, len as usize)).expect("decode response")
    }

    /// Decode the error message written for a negative status.
    pub fn error_response(&self) -> String {
        let len = self.status();
        assert!(len < 0, "expected an error response, status {len}");
        let value =
            pie_value::decode(&self.read(RESP, (-len) as usize)).expect("decode response");
        value.as_str().expect("error message").to_string()
    }
}
