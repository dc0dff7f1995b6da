//! Interrupt numbers and status codes shared with the firmware.
//!
//! The high half of an immediate selects the category; the full immediate
//! selects the operation.

pub const CATEGORY_MASK: u32 = 0xFFFF_0000;

pub const SYS_CONTROL: u32 = 0x0001_0000;
pub const SYS_CONTROL_SHUTDOWN: u32 = SYS_CONTROL | 1;
pub const SYS_CONTROL_REBOOT: u32 = SYS_CONTROL | 2;
pub const SYS_CONTROL_CRASH: u32 = SYS_CONTROL | 3;
pub const SYS_CONTROL_RETURN: u32 = SYS_CONTROL | 4;
pub const SYS_CONTROL_INIT_COPY: u32 = SYS_CONTROL | 5;
pub const SYS_CONTROL_INIT_ZERO: u32 = SYS_CONTROL | 6;

pub const SYS_DEBUG: u32 = 0x0002_0000;
pub const SYS_DEBUG_WRITE: u32 = SYS_DEBUG | 1;

pub const SYS_SIGNAL: u32 = 0x0003_0000;
pub const SYS_SIGNAL_REQUEST: u32 = SYS_SIGNAL | 1;
pub const SYS_SIGNAL_PENDING: u32 = SYS_SIGNAL | 2;
/// Status left in `r0` while the guest sleeps waiting for a signal.
pub const SIGNAL_PENDING: i32 = SYS_SIGNAL_PENDING as i32;
/// Reserved; dispatching it is an unknown interrupt.
pub const SYS_SIGNAL_PUSH: u32 = SYS_SIGNAL | 3;

pub const SYS_COMPONENTS: u32 = 0x0004_0000;
pub const SYS_COMPONENTS_INVOKE: u32 = SYS_COMPONENTS | 1;
pub const SYS_COMPONENTS_LIST: u32 = SYS_COMPONENTS | 2;
pub const SYS_COMPONENTS_COUNT: u32 = SYS_COMPONENTS | 3;
pub const SYS_COMPONENTS_MAX: u32 = SYS_COMPONENTS | 4;
pub const SYS_COMPONENTS_METHODS: u32 = SYS_COMPONENTS | 5;
pub const SYS_COMPONENTS_ANNOTATIONS: u32 = SYS_COMPONENTS | 6;

pub const SYS_VALUE: u32 = 0x0005_0000;
pub const SYS_VALUE_CALL: u32 = SYS_VALUE | 1;
pub const SYS_VALUE_APPLY: u32 = SYS_VALUE | 2;
pub const SYS_VALUE_UNAPPLY: u32 = SYS_VALUE | 3;
pub const SYS_VALUE_DISPOSE: u32 = SYS_VALUE | 4;

pub const SYS_COMPUTER: u32 = 0x0006_0000;
pub const SYS_COMPUTER_GET_COST_PER_TICK: u32 = SYS_COMPUTER | 1;
pub const SYS_COMPUTER_LAST_ERROR: u32 = SYS_COMPUTER | 2;
pub const SYS_COMPUTER_BEEP_1: u32 = SYS_COMPUTER | 3;
pub const SYS_COMPUTER_BEEP_2: u32 = SYS_COMPUTER | 4;
pub const SYS_COMPUTER_USERS: u32 = SYS_COMPUTER | 5;
pub const SYS_COMPUTER_ADD_USER: u32 = SYS_COMPUTER | 6;
pub const SYS_COMPUTER_REMOVE_USER: u32 = SYS_COMPUTER | 7;
pub const SYS_COMPUTER_COMPUTER_ADDRESS: u32 = SYS_COMPUTER | 8;
pub const SYS_COMPUTER_TMP_ADDRESS: u32 = SYS_COMPUTER | 9;

pub const SYS_INFO: u32 = 0x0007_0000;
pub const SYS_INFO_VERSION: u32 = SYS_INFO | 1;
pub const SYS_INFO_RAM_SIZE: u32 = SYS_INFO | 2;

pub const SYS_TIMER: u32 = 0x0008_0000;
pub const SYS_TIMER_TICKS_MS: u32 = SYS_TIMER | 1;
pub const SYS_TIMER_TICKS_US: u32 = SYS_TIMER | 2;
pub const SYS_TIMER_WORLD_TIME: u32 = SYS_TIMER | 3;
pub const SYS_TIMER_UP_TIME: u32 = SYS_TIMER | 4;
pub const SYS_TIMER_CPU_TIME: u32 = SYS_TIMER | 5;

pub const SYS_VFS: u32 = 0x0009_0000;
pub const SYS_VFS_OPEN: u32 = SYS_VFS | 1;
pub const SYS_VFS_CLOSE: u32 = SYS_VFS | 2;
pub const SYS_VFS_READ: u32 = SYS_VFS | 3;
pub const SYS_VFS_WRITE: u32 = SYS_VFS | 4;
pub const SYS_VFS_SEEK: u32 = SYS_VFS | 5;
pub const SYS_VFS_VALID: u32 = SYS_VFS | 6;
pub const SYS_VFS_REPR: u32 = SYS_VFS | 7;
pub const SYS_VFS_FLUSH: u32 = SYS_VFS | 8;

/// Firmware ABI version reported by `SYS_INFO_VERSION` (1.0.0.0).
pub const INFO_VERSION: i32 = 0x0100_0000;

// MicroPython errno values returned by the VFS category.
pub const MP_OK: i32 = 0;
pub const MP_EPERM: i32 = 1;
pub const MP_ENOENT: i32 = 2;
pub const MP_EIO: i32 = 5;
pub const MP_EBADF: i32 = 9;

/// Status for a host error surfaced by read/write/seek/close.
pub const VFS_HOST_ERROR: i32 = 1;

/// Maximum lengths of the NUL-terminated strings passed to `open`.
pub const VFS_ADDRESS_MAX: usize = 64;
pub const VFS_PATH_MAX: usize = 256;
pub const VFS_MODE_MAX: usize = 16;
