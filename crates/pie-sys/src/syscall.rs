//! Table-driven interrupt decoding.

use std::fmt;

use crate::consts::*;

/// Interrupt category, selected by the high half of the immediate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Control,
    Debug,
    Signal,
    Components,
    Value,
    Computer,
    Info,
    Timer,
    Vfs,
}

impl Category {
    pub const ALL: [Self; 9] = [
        Self::Control,
        Self::Debug,
        Self::Signal,
        Self::Components,
        Self::Value,
        Self::Computer,
        Self::Info,
        Self::Timer,
        Self::Vfs,
    ];

    #[must_use]
    pub const fn base(self) -> u32 {
        match self {
            Self::Control => SYS_CONTROL,
            Self::Debug => SYS_DEBUG,
            Self::Signal => SYS_SIGNAL,
            Self::Components => SYS_COMPONENTS,
            Self::Value => SYS_VALUE,
            Self::Computer => SYS_COMPUTER,
            Self::Info => SYS_INFO,
            Self::Timer => SYS_TIMER,
            Self::Vfs => SYS_VFS,
        }
    }

    /// Category of an immediate, if the high half names one.
    #[must_use]
    pub fn from_imm(imm: u32) -> Option<Self> {
        let base = imm & CATEGORY_MASK;
        Self::ALL.into_iter().find(|c| c.base() == base)
    }

    /// Label used in logs and metrics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Control => "control",
            Self::Debug => "debug",
            Self::Signal => "signal",
            Self::Components => "components",
            Self::Value => "value",
            Self::Computer => "computer",
            Self::Info => "info",
            Self::Timer => "timer",
            Self::Vfs => "vfs",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlOp {
    Shutdown,
    Reboot,
    Crash,
    Return,
    InitCopy,
    InitZero,
}

/// Signal queue operations. `push` is reserved and deliberately absent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalOp {
    Request,
    Pending,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentsOp {
    Invoke,
    List,
    Count,
    Max,
    Methods,
    Annotations,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueOp {
    Call,
    Apply,
    Unapply,
    Dispose,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComputerOp {
    CostPerTick,
    LastError,
    BeepPattern,
    Beep,
    Users,
    AddUser,
    RemoveUser,
    Address,
    TmpAddress,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InfoOp {
    Version,
    RamSize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerOp {
    TicksMs,
    TicksUs,
    WorldTime,
    UpTime,
    CpuTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VfsOp {
    Open,
    Close,
    Read,
    Write,
    Seek,
    Valid,
    Repr,
    Flush,
}

/// A decoded interrupt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Syscall {
    Control(ControlOp),
    DebugWrite,
    Signal(SignalOp),
    Components(ComponentsOp),
    Value(ValueOp),
    Computer(ComputerOp),
    Info(InfoOp),
    Timer(TimerOp),
    Vfs(VfsOp),
}

const SYSCALLS: &[(u32, Syscall)] = &[
    (SYS_CONTROL_SHUTDOWN, Syscall::Control(ControlOp::Shutdown)),
    (SYS_CONTROL_REBOOT, Syscall::Control(ControlOp::Reboot)),
    (SYS_CONTROL_CRASH, Syscall::Control(ControlOp::Crash)),
    (SYS_CONTROL_RETURN, Syscall::Control(ControlOp::Return)),
    (SYS_CONTROL_INIT_COPY, Syscall::Control(ControlOp::InitCopy)),
    (SYS_CONTROL_INIT_ZERO, Syscall::Control(ControlOp::InitZero)),
    (SYS_DEBUG_WRITE, Syscall::DebugWrite),
    (SYS_SIGNAL_REQUEST, Syscall::Signal(SignalOp::Request)),
    (SYS_SIGNAL_PENDING, Syscall::Signal(SignalOp::Pending)),
    (SYS_COMPONENTS_INVOKE, Syscall::Components(ComponentsOp::Invoke)),
    (SYS_COMPONENTS_LIST, Syscall::Components(ComponentsOp::List)),
    (SYS_COMPONENTS_COUNT, Syscall::Components(ComponentsOp::Count)),
    (SYS_COMPONENTS_MAX, Syscall::Components(ComponentsOp::Max)),
    (SYS_COMPONENTS_METHODS, Syscall::Components(ComponentsOp::Methods)),
    (
        SYS_COMPONENTS_ANNOTATIONS,
        Syscall::Components(ComponentsOp::Annotations),
    ),
    (SYS_VALUE_CALL, Syscall::Value(ValueOp::Call)),
    (SYS_VALUE_APPLY, Syscall::Value(ValueOp::Apply)),
    (SYS_VALUE_UNAPPLY, Syscall::Value(ValueOp::Unapply)),
    (SYS_VALUE_DISPOSE, Syscall::Value(ValueOp::Dispose)),
    (
        SYS_COMPUTER_GET_COST_PER_TICK,
        Syscall::Computer(ComputerOp::CostPerTick),
    ),
    (SYS_COMPUTER_LAST_ERROR, Syscall::Computer(ComputerOp::LastError)),
    (SYS_COMPUTER_BEEP_1, Syscall::Computer(ComputerOp::BeepPattern)),
    (SYS_COMPUTER_BEEP_2, Syscall::Computer(ComputerOp::Beep)),
    (SYS_COMPUTER_USERS, Syscall::Computer(ComputerOp::Users)),
    (SYS_COMPUTER_ADD_USER, Syscall::Computer(ComputerOp::AddUser)),
    (SYS_COMPUTER_REMOVE_USER, Syscall::Computer(ComputerOp::RemoveUser)),
    (SYS_COMPUTER_COMPUTER_ADDRESS, Syscall::Computer(ComputerOp::Address)),
    (SYS_COMPUTER_TMP_ADDRESS, Syscall::Computer(ComputerOp::TmpAddress)),
    (SYS_INFO_VERSION, Syscall::Info(InfoOp::Version)),
    (SYS_INFO_RAM_SIZE, Syscall::Info(InfoOp::RamSize)),
    (SYS_TIMER_TICKS_MS, Syscall::Timer(TimerOp::TicksMs)),
    (SYS_TIMER_TICKS_US, Syscall::Timer(TimerOp::TicksUs)),
    (SYS_TIMER_WORLD_TIME, Syscall::Timer(TimerOp::WorldTime)),
    (SYS_TIMER_UP_TIME, Syscall::Timer(TimerOp::UpTime)),
    (SYS_TIMER_CPU_TIME, Syscall::Timer(TimerOp::CpuTime)),
    (SYS_VFS_OPEN, Syscall::Vfs(VfsOp::Open)),
    (SYS_VFS_CLOSE, Syscall::Vfs(VfsOp::Close)),
    (SYS_VFS_READ, Syscall::Vfs(VfsOp::Read)),
    (SYS_VFS_WRITE, Syscall::Vfs(VfsOp::Write)),
    (SYS_VFS_SEEK, Syscall::Vfs(VfsOp::Seek)),
    (SYS_VFS_VALID, Syscall::Vfs(VfsOp::Valid)),
    (SYS_VFS_REPR, Syscall::Vfs(VfsOp::Repr)),
    (SYS_VFS_FLUSH, Syscall::Vfs(VfsOp::Flush)),
];

impl Syscall {
    /// Look up an immediate in the syscall table.
    #[must_use]
    pub fn decode(imm: u32) -> Option<Self> {
        SYSCALLS
            .iter()
            .find(|(num, _)| *num == imm)
            .map(|&(_, syscall)| syscall)
    }

    /// The immediate that raises this syscall.
    #[must_use]
    pub fn number(self) -> u32 {
        SYSCALLS
            .iter()
            .find(|(_, s)| *s == self)
            .map_or(0, |&(num, _)| num)
    }

    #[must_use]
    pub const fn category(self) -> Category {
        match self {
            Self::Control(_) => Category::Control,
            Self::DebugWrite => Category::Debug,
            Self::Signal(_) => Category::Signal,
            Self::Components(_) => Category::Components,
            Self::Value(_) => Category::Value,
            Self::Computer(_) => Category::Computer,
            Self::Info(_) => Category::Info,
            Self::Timer(_) => Category::Timer,
            Self::Vfs(_) => Category::Vfs,
        }
    }

    /// Iterate over every known syscall.
    pub fn all() -> impl Iterator<Item = Self> {
        SYSCALLS.iter().map(|&(_, syscall)| syscall)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_known() {
        assert_eq!(
            Syscall::decode(SYS_VFS_SEEK),
            Some(Syscall::Vfs(VfsOp::Seek))
        );
        assert_eq!(Syscall::decode(SYS_DEBUG_WRITE), Some(Syscall::DebugWrite));
        assert_eq!(
            Syscall::decode(SYS_COMPUTER_BEEP_2),
            Some(Syscall::Computer(ComputerOp::Beep))
        );
    }

    #[test]
    fn test_decode_unknown() {
        assert_eq!(Syscall::decode(SYS_SIGNAL_PUSH), None);
        assert_eq!(Syscall::decode(SYS_VFS | 0x99), None);
        assert_eq!(Syscall::decode(0x00FF_0001), None);
        assert_eq!(Syscall::decode(0), None);
    }

    #[test]
    fn test_table_is_consistent() {
        let mut numbers: Vec<u32> = SYSCALLS.iter().map(|(n, _)| *n).collect();
        numbers.sort_unstable();
        numbers.dedup();
        assert_eq!(numbers.len(), SYSCALLS.len());

        for syscall in Syscall::all() {
            let number = syscall.number();
            assert_eq!(Syscall::decode(number), Some(syscall));
            assert_eq!(Category::from_imm(number), Some(syscall.category()));
        }
    }

    #[test]
    fn test_category_from_imm() {
        assert_eq!(Category::from_imm(SYS_SIGNAL_PUSH), Some(Category::Signal));
        assert_eq!(Category::from_imm(0x000A_0001), None);
        assert_eq!(Category::Timer.to_string(), "timer");
    }
}
