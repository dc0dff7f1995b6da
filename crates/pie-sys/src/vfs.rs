//! POSIX-like file descriptors layered over component `open/read/write/seek/close`.
//!
//! Every operation runs on the designated host context. Status codes are
//! MicroPython errno values; a host error on read/write/seek/close is
//! reported as [`VFS_HOST_ERROR`].

use pie_state::MemoryError;
use pie_value::Value;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::consts::{
    MP_EBADF, MP_EIO, MP_ENOENT, MP_EPERM, MP_OK, VFS_ADDRESS_MAX, VFS_HOST_ERROR, VFS_MODE_MAX,
    VFS_PATH_MAX,
};
use crate::handlers::execute;
use crate::{CallDescriptor, HandlerResult, HostError, Interrupt, Machine, Trap, VfsOp};

/// An open file: owning component, host handle and byte offset.
#[derive(Clone, Debug, PartialEq)]
pub struct FileHandle {
    pub address: String,
    pub handle: Value,
    pub position: i64,
}

impl FileHandle {
    #[must_use]
    pub const fn new(address: String, handle: Value) -> Self {
        Self {
            address,
            handle,
            position: 0,
        }
    }

    /// `operation(handle, args...)` on the owning component.
    fn call(&self, operation: &str, args: impl IntoIterator<Item = Value>) -> CallDescriptor {
        let mut all = vec![self.handle.clone()];
        all.extend(args);
        CallDescriptor::ComponentInvoke {
            address: self.address.clone(),
            operation: operation.to_string(),
            args: all,
        }
    }
}

/// Descriptor table. Descriptors are assigned from 0 and never reused.
#[derive(Debug, Default)]
pub struct FileTable {
    next: i32,
    files: FxHashMap<i32, FileHandle>,
}

impl FileTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an open file and return its descriptor.
    pub fn open(&mut self, file: FileHandle) -> i32 {
        let fd = self.next;
        self.next += 1;
        self.files.insert(fd, file);
        fd
    }

    #[must_use]
    pub fn get(&self, fd: i32) -> Option<&FileHandle> {
        self.files.get(&fd)
    }

    pub fn get_mut(&mut self, fd: i32) -> Option<&mut FileHandle> {
        self.files.get_mut(&fd)
    }

    pub fn remove(&mut self, fd: i32) -> Option<FileHandle> {
        self.files.remove(&fd)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }
}

/// Check that `len` bytes at `address` are mapped before the host is
/// touched, so a bad pointer faults without side effects.
fn ensure_mapped(intr: &Interrupt<'_>, address: u32, len: usize) -> Result<(), MemoryError> {
    intr.memory().check(address, len)
}

fn single(values: Vec<Value>) -> Option<Value> {
    let mut values = values.into_iter();
    match (values.next(), values.next()) {
        (Some(value), None) => Some(value),
        _ => None,
    }
}

pub(crate) fn handle(
    op: VfsOp,
    intr: &mut Interrupt<'_>,
    machine: &mut dyn Machine,
    files: &mut FileTable,
    synchronized: bool,
) -> HandlerResult {
    if !synchronized {
        return Err(Trap::Synchronize.into());
    }

    let fd = intr.r0() as i32;
    match op {
        VfsOp::Open => open(intr, machine, files),
        VfsOp::Close => close(fd, machine, files),
        VfsOp::Valid => with_file(files, fd, op, |file| {
            let result = execute(machine, file.call("seek", ["cur".into(), Value::Int(0)]))?;
            Ok(if result.is_ok() { MP_OK } else { MP_EIO })
        }),
        VfsOp::Repr => with_file(files, fd, op, |_| Ok(MP_EPERM)),
        VfsOp::Flush => with_file(files, fd, op, |_| Ok(MP_OK)),
        VfsOp::Read => with_file(files, fd, op, |file| read(intr, machine, file)),
        VfsOp::Write => with_file(files, fd, op, |file| write(intr, machine, file)),
        VfsOp::Seek => with_file(files, fd, op, |file| seek(intr, machine, file)),
    }
}

fn with_file(
    files: &mut FileTable,
    fd: i32,
    op: VfsOp,
    f: impl FnOnce(&mut FileHandle) -> HandlerResult,
) -> HandlerResult {
    files.get_mut(fd).map_or_else(|| bad_descriptor(fd, op), f)
}

fn bad_descriptor(fd: i32, op: VfsOp) -> HandlerResult {
    debug!(fd, ?op, "bad file descriptor");
    Ok(MP_EBADF)
}

fn close(fd: i32, machine: &mut dyn Machine, files: &mut FileTable) -> HandlerResult {
    let Some(file) = files.get(fd) else {
        return bad_descriptor(fd, VfsOp::Close);
    };
    match execute(machine, file.call("close", []))? {
        Ok(_) => {
            files.remove(fd);
            Ok(MP_OK)
        }
        // The descriptor stays open so the guest may retry.
        Err(_) => Ok(VFS_HOST_ERROR),
    }
}

fn open(intr: &mut Interrupt<'_>, machine: &mut dyn Machine, files: &mut FileTable) -> HandlerResult {
    let address = intr.memory().read_cstr(intr.r0(), VFS_ADDRESS_MAX)?;
    let path = intr.memory().read_cstr(intr.r1(), VFS_PATH_MAX)?;
    let mode = intr.memory().read_cstr(intr.r2(), VFS_MODE_MAX)?;
    let fd_ptr = intr.r3();
    ensure_mapped(intr, fd_ptr, 4)?;

    let call = CallDescriptor::ComponentInvoke {
        address: address.clone(),
        operation: "open".to_string(),
        args: vec![path.as_str().into(), mode.as_str().into()],
    };
    let handle = match execute(machine, call)? {
        Err(HostError::FileNotFound(_)) => return Ok(MP_ENOENT),
        Err(_) => return Ok(MP_EPERM),
        Ok(values) => match single(values) {
            Some(handle @ (Value::Int(_) | Value::Handle(_))) => handle,
            _ => return Ok(MP_EPERM),
        },
    };

    let fd = files.open(FileHandle::new(address, handle));
    intr.memory_mut().write_i32(fd_ptr, fd)?;
    debug!(fd, %path, %mode, "opened file");
    Ok(MP_OK)
}

fn read(intr: &mut Interrupt<'_>, machine: &mut dyn Machine, file: &mut FileHandle) -> HandlerResult {
    let requested = intr.r1() as i32;
    let dest = intr.r2();
    let len_ptr = intr.r3();
    if requested < 0 {
        return Ok(MP_EPERM);
    }
    if requested > 0 {
        ensure_mapped(intr, dest, requested.unsigned_abs() as usize)?;
    }
    ensure_mapped(intr, len_ptr, 4)?;

    let values = match execute(machine, file.call("read", [Value::Int(requested.into())]))? {
        Ok(values) => values,
        Err(_) => return Ok(VFS_HOST_ERROR),
    };

    match single(values) {
        Some(Value::Bytes(data)) => {
            let Ok(len) = i32::try_from(data.len()) else {
                return Ok(MP_EPERM);
            };
            if len > requested {
                return Ok(MP_EPERM);
            }
            if !data.is_empty() {
                intr.memory_mut().write(dest, &data)?;
            }
            intr.memory_mut().write_i32(len_ptr, len)?;
            file.position += i64::from(len);
            Ok(MP_OK)
        }
        // End of stream.
        Some(Value::Null) => Ok(MP_OK),
        _ => Ok(MP_EPERM),
    }
}

fn write(intr: &mut Interrupt<'_>, machine: &mut dyn Machine, file: &mut FileHandle) -> HandlerResult {
    let n = intr.r2() as i32;
    if n < 0 {
        return Ok(MP_EPERM);
    }
    let buf = intr.read_buffer_at(intr.r1(), n)?;
    let written_ptr = intr.r3();
    ensure_mapped(intr, written_ptr, 4)?;
    let Ok(len) = i32::try_from(buf.len()) else {
        return Ok(MP_EPERM);
    };

    let values = match execute(machine, file.call("write", [Value::Bytes(buf)]))? {
        Ok(values) => values,
        Err(_) => return Ok(VFS_HOST_ERROR),
    };

    match single(values) {
        Some(Value::Bool(true)) => {
            intr.memory_mut().write_i32(written_ptr, len)?;
            file.position += i64::from(len);
            Ok(MP_OK)
        }
        Some(Value::Bool(false) | Value::Null) => Ok(MP_OK),
        _ => Ok(MP_EPERM),
    }
}

fn seek(intr: &mut Interrupt<'_>, machine: &mut dyn Machine, file: &mut FileHandle) -> HandlerResult {
    let offset = intr.r1() as i32;
    let whence = match intr.r2() {
        0 => "set",
        1 => "cur",
        2 => "end",
        _ => return Ok(MP_EPERM),
    };
    let offset_ptr = intr.r3();
    if offset_ptr != 0 {
        ensure_mapped(intr, offset_ptr, 4)?;
    }

    let call = file.call("seek", [whence.into(), Value::Int(offset.into())]);
    let values = match execute(machine, call)? {
        Ok(values) => values,
        Err(_) => return Ok(VFS_HOST_ERROR),
    };

    let Some(Value::Int(position)) = single(values) else {
        return Ok(MP_EPERM);
    };
    file.position = position;
    if offset_ptr != 0 {
        intr.memory_mut().write_i32(offset_ptr, position as i32)?;
    }
    Ok(MP_OK)
}
