//! Argument and response marshalling for one software interrupt.

use pie_state::{GuestCpu, GuestMemory, MemoryError, R0, R1, R2, R3};
use pie_value::{DecodeError, Value};

use crate::CallResult;

/// A software interrupt raised by the guest.
///
/// `r0..r3` are captured when the request is built; handlers read arguments
/// from the snapshot even after `r0` has been overwritten.
pub struct Interrupt<'a> {
    imm: u32,
    r0: u32,
    r1: u32,
    r2: u32,
    r3: u32,
    cpu: &'a mut dyn GuestCpu,
}

impl<'a> Interrupt<'a> {
    pub fn new(cpu: &'a mut dyn GuestCpu, imm: u32) -> Self {
        Self {
            imm,
            r0: cpu.reg(R0),
            r1: cpu.reg(R1),
            r2: cpu.reg(R2),
            r3: cpu.reg(R3),
            cpu,
        }
    }

    #[must_use]
    pub const fn imm(&self) -> u32 {
        self.imm
    }

    #[must_use]
    pub const fn r0(&self) -> u32 {
        self.r0
    }

    #[must_use]
    pub const fn r1(&self) -> u32 {
        self.r1
    }

    #[must_use]
    pub const fn r2(&self) -> u32 {
        self.r2
    }

    #[must_use]
    pub const fn r3(&self) -> u32 {
        self.r3
    }

    #[must_use]
    pub fn memory(&self) -> &dyn GuestMemory {
        self.cpu.memory()
    }

    pub fn memory_mut(&mut self) -> &mut dyn GuestMemory {
        self.cpu.memory_mut()
    }

    /// Write the status code to `r0`.
    pub fn set_result(&mut self, status: i32) {
        self.cpu.set_reg(R0, status as u32);
    }

    /// Read the buffer described by `(r0, r1)`.
    ///
    /// # Errors
    ///
    /// Fails if the range is not mapped or the length is negative.
    pub fn read_buffer(&self) -> Result<Vec<u8>, MemoryError> {
        self.read_buffer_at(self.r0, self.r1 as i32)
    }

    /// Read `len` bytes at `address`. A zero length reads nothing.
    ///
    /// # Errors
    ///
    /// Fails if the range is not mapped or the length is negative.
    pub fn read_buffer_at(&self, address: u32, len: i32) -> Result<Vec<u8>, MemoryError> {
        if len == 0 {
            return Ok(Vec::new());
        }
        self.memory().read_vec(address, i64::from(len))
    }

    /// Read `(r0, r1)` as UTF-8, replacing invalid sequences.
    ///
    /// # Errors
    ///
    /// Fails if the range is not mapped or the length is negative.
    pub fn read_string(&self) -> Result<String, MemoryError> {
        let buf = self.read_buffer()?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Decode the request object at `(r0, r1)`.
    ///
    /// The outer error is a memory fault; the inner one a malformed object,
    /// which handlers report back to the guest.
    ///
    /// # Errors
    ///
    /// Fails if the range is not mapped or the length is negative.
    pub fn read_object(&self) -> Result<Result<Value, DecodeError>, MemoryError> {
        let buf = self.read_buffer()?;
        Ok(pie_value::decode(&buf))
    }

    /// Encode `value` into the response buffer `(r2, r3)` and return the
    /// encoded length.
    ///
    /// # Errors
    ///
    /// Fails if the encoding does not fit the buffer or the buffer is not
    /// mapped.
    pub fn response_value(&mut self, value: &Value) -> Result<i32, MemoryError> {
        let len = self.write_response(value)?;
        Ok(len)
    }

    /// Response with no payload.
    #[must_use]
    pub const fn response_none(&self) -> i32 {
        0
    }

    /// Encode `message` as a string into the response buffer and return the
    /// negated length.
    ///
    /// # Errors
    ///
    /// Fails if the encoding does not fit the buffer or the buffer is not
    /// mapped.
    pub fn response_error(&mut self, message: &str) -> Result<i32, MemoryError> {
        let len = self.write_response(&Value::from(message))?;
        Ok(-len)
    }

    /// Response for a call result: the returned values as a list, or the
    /// error message.
    ///
    /// # Errors
    ///
    /// Fails if the encoding does not fit the buffer or the buffer is not
    /// mapped.
    pub fn response_result(&mut self, result: CallResult) -> Result<i32, MemoryError> {
        match result {
            Ok(values) => self.response_value(&Value::List(values)),
            Err(e) => self.response_error(&e.to_string()),
        }
    }

    fn write_response(&mut self, value: &Value) -> Result<i32, MemoryError> {
        let encoded = pie_value::encode(value);
        if encoded.len() > self.r3 as usize {
            return Err(MemoryError::OutOfBounds {
                address: self.r2,
                len: encoded.len(),
            });
        }
        let len = i32::try_from(encoded.len()).map_err(|_| MemoryError::OutOfBounds {
            address: self.r2,
            len: encoded.len(),
        })?;
        let address = self.r2;
        self.memory_mut().write(address, &encoded)?;
        Ok(len)
    }
}

impl std::fmt::Debug for Interrupt<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interrupt")
            .field("imm", &format_args!("{:#010x}", self.imm))
            .field("r0", &format_args!("{:#x}", self.r0))
            .field("r1", &format_args!("{:#x}", self.r1))
            .field("r2", &format_args!("{:#x}", self.r2))
            .field("r3", &format_args!("{:#x}", self.r3))
            .finish_non_exhaustive()
    }
}
