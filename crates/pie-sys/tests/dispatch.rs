mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pie_state::{GuestCpu, R0, RAM_ADDRESS};
use pie_sys::consts::*;
use pie_sys::{
    CallResult, ExitReason, HostError, HostObject, OperationInfo, Signal, Syscall, Trap,
};
use pie_value::Value;
use support::{Harness, RESP, ScriptedComponent, TestMachine};

fn fatal(message: &str) -> Result<(), Trap> {
    Err(Trap::Stop(ExitReason::Error(message.to_string())))
}

fn gpu_machine() -> TestMachine {
    TestMachine::new()
        .with_component(
            ScriptedComponent::new("gpu-0", "gpu")
                .with_operation(
                    "set",
                    OperationInfo::synchronized().with_doc("function(x, y, text)"),
                )
                .with_operation("getResolution", OperationInfo::direct()),
        )
        .with_component(ScriptedComponent::new("screen-0", "screen"))
        .with_component(ScriptedComponent::new("screen-1", "screen"))
}

#[test]
fn test_unknown_operations_are_fatal() {
    let mut h = Harness::new(TestMachine::new());
    h.regs(7, 0, 0, 0);

    for category in [
        SYS_CONTROL,
        SYS_DEBUG,
        SYS_SIGNAL,
        SYS_COMPONENTS,
        SYS_VALUE,
        SYS_COMPUTER,
        SYS_INFO,
        SYS_TIMER,
        SYS_VFS,
    ] {
        let imm = category | 0xFF;
        assert_eq!(h.dispatch(imm), fatal("Unknown Interrupt"), "{imm:#x}");
        assert_eq!(h.dispatch(category), fatal("Unknown Interrupt"), "{imm:#x}");
    }
    assert_eq!(h.dispatch(0x000A_0001), fatal("Unknown Interrupt"));
    assert_eq!(h.cpu.reg(R0), 7);
}

#[test]
fn test_signal_push_is_unknown() {
    let mut h = Harness::new(TestMachine::new());
    h.machine.signals.push_back(Signal::new("key_down", vec![]));
    assert_eq!(h.dispatch(SYS_SIGNAL_PUSH), fatal("Unknown Interrupt"));
    assert_eq!(h.machine.signals.len(), 1);
    assert!(Syscall::decode(SYS_SIGNAL_PUSH).is_none());
}

#[test]
fn test_control_stops() {
    let mut h = Harness::new(TestMachine::new());
    assert_eq!(
        h.dispatch(SYS_CONTROL_SHUTDOWN),
        Err(Trap::Stop(ExitReason::Shutdown { reboot: false }))
    );
    assert_eq!(
        h.dispatch(SYS_CONTROL_REBOOT),
        Err(Trap::Stop(ExitReason::Shutdown { reboot: true }))
    );
    assert_eq!(
        h.dispatch(SYS_CONTROL_RETURN),
        Err(Trap::Stop(ExitReason::Return))
    );

    h.buffer(b"assertion failed: \xffok");
    assert_eq!(
        h.dispatch(SYS_CONTROL_CRASH),
        fatal("assertion failed: \u{fffd}ok")
    );
}

#[test]
fn test_control_init_copy_and_zero() {
    let mut h = Harness::new(TestMachine::new());
    let src = RAM_ADDRESS + 0x100;
    let dest = RAM_ADDRESS + 0x200;
    h.write(src, b"initialized data");
    h.regs(src, dest, dest + 16, 0);
    assert_eq!(h.dispatch(SYS_CONTROL_INIT_COPY), Ok(()));
    assert_eq!(h.status(), 1);
    assert_eq!(h.read(dest, 16), b"initialized data");

    h.regs(dest, dest + 8, 0, 0);
    assert_eq!(h.dispatch(SYS_CONTROL_INIT_ZERO), Ok(()));
    assert_eq!(h.read(dest, 16), b"\0\0\0\0\0\0\0\0zed data");
}

#[test]
fn test_control_bad_ranges_fault() {
    let mut h = Harness::new(TestMachine::new());
    let start = RAM_ADDRESS + 0x100;

    h.regs(start + 8, start, 0, 0);
    let Err(Trap::Stop(ExitReason::Error(message))) = h.dispatch(SYS_CONTROL_INIT_ZERO) else {
        panic!("negative size must fault");
    };
    assert!(message.starts_with("Memory fault"), "{message}");

    h.regs(start, start, start, 0);
    assert!(h.dispatch(SYS_CONTROL_INIT_COPY).is_err());

    h.regs(start, start + 0x10_0000, 0, 0);
    assert!(h.dispatch(SYS_CONTROL_INIT_ZERO).is_err());
}

#[test]
fn test_debug_write() {
    let mut h = Harness::new(TestMachine::new());
    h.buffer("hello, π\n".as_bytes());
    assert_eq!(h.dispatch(SYS_DEBUG_WRITE), Ok(()));
    assert_eq!(h.status(), 0);
    assert_eq!(h.machine.debug, "hello, π\n");
}

#[test]
fn test_signal_request_sleeps_when_empty() {
    let mut h = Harness::new(TestMachine::new());
    h.regs(250, 0, RESP, 64);
    assert_eq!(h.dispatch(SYS_SIGNAL_REQUEST), Err(Trap::Sleep(250)));
    assert_eq!(h.status(), SIGNAL_PENDING);

    h.machine
        .signals
        .push_back(Signal::new("key_down", vec!["kbd-0".into(), Value::Int(65)]));
    h.regs(250, 0, RESP, 64);
    assert_eq!(h.dispatch(SYS_SIGNAL_REQUEST), Ok(()));
    assert_eq!(
        h.response(),
        Value::List(vec!["key_down".into(), "kbd-0".into(), Value::Int(65)])
    );
}

#[test]
fn test_signal_pending() {
    let mut h = Harness::new(TestMachine::new());
    h.regs(0, 0, RESP, 64);
    assert_eq!(h.dispatch(SYS_SIGNAL_PENDING), Ok(()));
    assert_eq!(h.status(), 0);

    h.machine.signals.push_back(Signal::new("touch", vec![]));
    assert_eq!(h.dispatch(SYS_SIGNAL_PENDING), Ok(()));
    assert_eq!(h.response(), Value::List(vec!["touch".into()]));
    assert!(h.machine.signals.is_empty());
}

#[test]
fn test_invoke_requires_synchronization() {
    let mut h = Harness::new(gpu_machine());
    h.machine.script("gpu-0", "set", Ok(vec![Value::Bool(true)]));
    let call = Value::List(vec![
        "gpu-0".into(),
        "set".into(),
        Value::Int(1),
        Value::Int(1),
        "hi".into(),
    ]);

    h.request(&call);
    assert_eq!(h.dispatch(SYS_COMPONENTS_INVOKE), Err(Trap::Synchronize));
    assert!(h.machine.invocations.is_empty());

    assert_eq!(h.dispatch_synchronized(SYS_COMPONENTS_INVOKE), Ok(()));
    assert_eq!(h.machine.invocations.len(), 1);
    assert_eq!(
        h.machine.invocations[0].2,
        vec![Value::Int(1), Value::Int(1), "hi".into()]
    );
    assert_eq!(h.response(), Value::List(vec![Value::Bool(true)]));
}

#[test]
fn test_invoke_direct_runs_immediately() {
    let mut h = Harness::new(gpu_machine());
    h.machine.script(
        "gpu-0",
        "getResolution",
        Ok(vec![Value::Int(160), Value::Int(50)]),
    );
    h.request(&Value::List(vec!["gpu-0".into(), "getResolution".into()]));
    assert_eq!(h.dispatch(SYS_COMPONENTS_INVOKE), Ok(()));
    assert_eq!(h.machine.invocations.len(), 1);
    assert_eq!(
        h.response(),
        Value::List(vec![Value::Int(160), Value::Int(50)])
    );
}

#[test]
fn test_invoke_unknown_targets_are_reported() {
    let mut h = Harness::new(gpu_machine());
    h.request(&Value::List(vec!["nope".into(), "set".into()]));
    assert_eq!(h.dispatch(SYS_COMPONENTS_INVOKE), Ok(()));
    assert_eq!(h.error_response(), "Invalid Component: nope");

    h.request(&Value::List(vec!["gpu-0".into(), "fill".into()]));
    assert_eq!(h.dispatch(SYS_COMPONENTS_INVOKE), Ok(()));
    assert_eq!(h.error_response(), "Invalid Function: fill");
    assert!(h.machine.invocations.is_empty());
}

#[test]
fn test_invoke_host_errors_are_responses() {
    let mut h = Harness::new(gpu_machine());
    h.machine.script(
        "gpu-0",
        "set",
        Err(HostError::BadArguments("bad argument #1".into())),
    );
    h.request(&Value::List(vec!["gpu-0".into(), "set".into()]));
    assert_eq!(h.dispatch_synchronized(SYS_COMPONENTS_INVOKE), Ok(()));
    assert_eq!(h.error_response(), "bad arguments: bad argument #1");
}

#[test]
fn test_invoke_limit_reached_synchronizes() {
    let mut h = Harness::new(gpu_machine());
    h.machine
        .script("gpu-0", "getResolution", Err(HostError::LimitReached));
    h.request(&Value::List(vec!["gpu-0".into(), "getResolution".into()]));
    assert_eq!(h.dispatch(SYS_COMPONENTS_INVOKE), Err(Trap::Synchronize));
}

#[test]
fn test_invoke_malformed_request() {
    let mut h = Harness::new(gpu_machine());
    h.request(&Value::List(vec![Value::Int(3)]));
    assert_eq!(h.dispatch(SYS_COMPONENTS_INVOKE), Ok(()));
    assert!(h.error_response().starts_with("Invalid invoke"));

    h.buffer(&[0xc1]);
    assert_eq!(h.dispatch(SYS_COMPONENTS_INVOKE), Ok(()));
    assert!(h.error_response().starts_with("Invalid invoke"));
    assert!(h.machine.invocations.is_empty());
}

#[test]
fn test_components_list_and_counts() {
    let mut h = Harness::new(gpu_machine());
    h.regs(0, 0, RESP, 256);
    assert_eq!(h.dispatch(SYS_COMPONENTS_LIST), Ok(()));
    assert_eq!(
        h.response(),
        Value::Map(vec![
            ("gpu-0".into(), "gpu".into()),
            ("screen-0".into(), "screen".into()),
            ("screen-1".into(), "screen".into()),
        ])
    );

    h.buffer(b"screen");
    assert_eq!(h.dispatch(SYS_COMPONENTS_LIST), Ok(()));
    assert_eq!(
        h.response(),
        Value::List(vec!["screen-0".into(), "screen-1".into()])
    );

    assert_eq!(h.dispatch(SYS_COMPONENTS_COUNT), Ok(()));
    assert_eq!(h.response(), Value::Int(3));
    assert_eq!(h.dispatch(SYS_COMPONENTS_MAX), Ok(()));
    assert_eq!(h.response(), Value::Int(16));
}

#[test]
fn test_components_methods_and_annotations() {
    let mut h = Harness::new(gpu_machine());
    h.request(&Value::List(vec!["gpu-0".into()]));
    assert_eq!(h.dispatch(SYS_COMPONENTS_METHODS), Ok(()));
    assert_eq!(
        h.response(),
        Value::List(vec!["set".into(), "getResolution".into()])
    );

    h.request(&Value::List(vec!["gpu-0".into(), "set".into()]));
    assert_eq!(h.dispatch(SYS_COMPONENTS_ANNOTATIONS), Ok(()));
    assert_eq!(h.response(), Value::from("function(x, y, text)"));

    // No doc, unknown operation, unknown component, wrong shape.
    for request in [
        Value::List(vec!["gpu-0".into(), "getResolution".into()]),
        Value::List(vec!["gpu-0".into(), "fill".into()]),
        Value::List(vec!["nope".into(), "set".into()]),
        Value::List(vec!["gpu-0".into()]),
    ] {
        h.request(&request);
        assert_eq!(h.dispatch(SYS_COMPONENTS_ANNOTATIONS), Ok(()));
        assert_eq!(h.status(), 0, "{request:?}");
    }

    h.request(&Value::Int(1));
    assert_eq!(h.dispatch(SYS_COMPONENTS_METHODS), Ok(()));
    assert_eq!(h.status(), 0);
}

struct Table {
    disposed: AtomicUsize,
}

impl HostObject for Table {
    fn call(&self, args: &[Value]) -> CallResult {
        Ok(vec![Value::Int(args.len().try_into().unwrap_or(0))])
    }

    fn apply(&self, args: &[Value]) -> CallResult {
        match args.first().and_then(Value::as_str) {
            Some("answer") => Ok(vec![Value::Int(42)]),
            _ => Ok(vec![Value::Null]),
        }
    }

    fn dispose(&self) {
        self.disposed.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_value_calls() {
    let mut h = Harness::new(TestMachine::new());
    let table = Arc::new(Table {
        disposed: AtomicUsize::new(0),
    });
    let handle = h.machine.values.register(table.clone());

    h.request(&Value::List(vec![Value::Handle(handle), "answer".into()]));
    assert_eq!(h.dispatch(SYS_VALUE_APPLY), Ok(()));
    assert_eq!(h.response(), Value::List(vec![Value::Int(42)]));

    h.request(&Value::List(vec![Value::Handle(handle), 1.into(), 2.into()]));
    assert_eq!(h.dispatch(SYS_VALUE_CALL), Ok(()));
    assert_eq!(h.response(), Value::List(vec![Value::Int(2)]));

    h.request(&Value::List(vec![Value::Handle(handle), "k".into(), 1.into()]));
    assert_eq!(h.dispatch(SYS_VALUE_UNAPPLY), Ok(()));
    assert_eq!(h.error_response(), "value is not assignable");

    h.request(&Value::List(vec![Value::Handle(99)]));
    assert_eq!(h.dispatch(SYS_VALUE_CALL), Ok(()));
    assert_eq!(h.error_response(), "Invalid Value: 99");

    h.request(&Value::Handle(handle));
    assert_eq!(h.dispatch(SYS_VALUE_DISPOSE), Ok(()));
    assert_eq!(h.status(), 0);
    assert_eq!(h.dispatch(SYS_VALUE_DISPOSE), Ok(()));
    assert_eq!(h.status(), 0);
    assert_eq!(table.disposed.load(Ordering::SeqCst), 1);
    assert!(h.machine.values.is_empty());
}

#[test]
fn test_value_dispose_unknown_handle() {
    let mut h = Harness::new(TestMachine::new());
    for _ in 0..2 {
        h.request(&Value::Handle(1234));
        assert_eq!(h.dispatch(SYS_VALUE_DISPOSE), Ok(()));
        assert_eq!(h.status(), 0);
    }

    h.buffer(b"");
    assert_eq!(h.dispatch(SYS_VALUE_DISPOSE), Ok(()));
    assert_eq!(h.status(), 0);
}

#[test]
fn test_computer_metadata() {
    let mut h = Harness::new(TestMachine::new());
    h.regs(0, 0, RESP, 64);
    assert_eq!(h.dispatch(SYS_COMPUTER_COMPUTER_ADDRESS), Ok(()));
    assert_eq!(h.response(), Value::from("computer-0"));
    assert_eq!(h.dispatch(SYS_COMPUTER_TMP_ADDRESS), Ok(()));
    assert_eq!(h.response(), Value::from("tmpfs-0"));
    assert_eq!(h.dispatch(SYS_COMPUTER_GET_COST_PER_TICK), Ok(()));
    assert_eq!(h.response(), Value::Float(0.0));

    // `None` encodes as a one-byte null.
    assert_eq!(h.dispatch(SYS_COMPUTER_LAST_ERROR), Ok(()));
    assert_eq!(h.response(), Value::Null);

    h.regs(440, (-1i16) as u16 as u32, RESP, 64);
    assert_eq!(h.dispatch(SYS_COMPUTER_BEEP_2), Ok(()));
    assert_eq!(h.status(), 0);
    assert_eq!(h.machine.beeps, vec![(440, -1)]);
}

#[test]
fn test_computer_users() {
    let mut h = Harness::new(TestMachine::new());
    h.buffer(b"alice");
    assert_eq!(h.dispatch(SYS_COMPUTER_ADD_USER), Ok(()));
    assert_eq!(h.status(), 0);
    assert_eq!(h.dispatch(SYS_COMPUTER_ADD_USER), Ok(()));
    assert_eq!(h.error_response(), "user exists: alice");

    assert_eq!(h.dispatch(SYS_COMPUTER_USERS), Ok(()));
    assert_eq!(h.response(), Value::List(vec!["alice".into()]));

    assert_eq!(h.dispatch(SYS_COMPUTER_REMOVE_USER), Ok(()));
    assert_eq!(h.response(), Value::Bool(true));
    assert_eq!(h.dispatch(SYS_COMPUTER_REMOVE_USER), Ok(()));
    assert_eq!(h.response(), Value::Bool(false));
}

#[test]
fn test_info_and_timer() {
    let mut h = Harness::new(TestMachine::new());
    h.regs(0, 0, RESP, 64);
    assert_eq!(h.dispatch(SYS_INFO_VERSION), Ok(()));
    assert_eq!(h.status(), 0x0100_0000);
    assert_eq!(h.dispatch(SYS_INFO_RAM_SIZE), Ok(()));
    assert_eq!(h.status(), support::RAM_SIZE as i32);

    assert_eq!(h.dispatch(SYS_TIMER_WORLD_TIME), Ok(()));
    assert_eq!(h.response(), Value::Float(1234.5));

    assert_eq!(h.dispatch(SYS_TIMER_TICKS_US), Ok(()));
    assert_eq!(h.dispatch(SYS_TIMER_TICKS_MS), Ok(()));
}

#[test]
fn test_small_response_buffer_faults() {
    let mut h = Harness::new(TestMachine::new());
    h.regs(0, 0, RESP, 2);
    let Err(Trap::Stop(ExitReason::Error(message))) =
        h.dispatch(SYS_COMPUTER_COMPUTER_ADDRESS)
    else {
        panic!("overflowing response must stop the guest");
    };
    assert!(message.starts_with("Memory fault"), "{message}");
}

#[test]
fn test_unmapped_request_faults() {
    let mut h = Harness::new(TestMachine::new());
    h.regs(0x4000_0000, 16, RESP, 64);
    assert!(matches!(
        h.dispatch(SYS_DEBUG_WRITE),
        Err(Trap::Stop(ExitReason::Error(_)))
    ));
}
