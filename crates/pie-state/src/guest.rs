//! Bounds-checked access to the guest's flat address space.

use crate::{MemoryError, Region};

/// Base address of the firmware flash region.
pub const FLASH_ADDRESS: u32 = 0x0800_0000;
/// Size of the firmware flash region.
pub const FLASH_SIZE: usize = 0x10_0000;
/// Base address of guest RAM.
pub const RAM_ADDRESS: u32 = 0x2000_0000;
/// Largest RAM size a guest may be configured with.
pub const MAX_RAM_SIZE: usize = 0x40_0000;

/// Flat guest memory as seen by syscall handlers.
///
/// Implementors only provide raw `read`/`write`; every helper is built on
/// them so the bounds check lives in one place. Lengths coming from guest
/// registers are signed: a non-positive length is rejected, never clamped.
pub trait GuestMemory {
    /// Copy `buf.len()` bytes starting at `address` into `buf`.
    ///
    /// # Errors
    ///
    /// Fails if the range is not entirely mapped.
    fn read(&self, address: u32, buf: &mut [u8]) -> Result<(), MemoryError>;

    /// Copy `data` to guest memory starting at `address`.
    ///
    /// # Errors
    ///
    /// Fails if the range is not entirely mapped.
    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), MemoryError>;

    /// Check that `[address, address + len)` is mapped without touching it.
    ///
    /// Helpers call this before allocating anything sized by the guest.
    ///
    /// # Errors
    ///
    /// Fails if the range is not entirely mapped.
    fn check(&self, address: u32, len: usize) -> Result<(), MemoryError>;

    /// Read `len` bytes into a fresh buffer. `len` must be positive.
    ///
    /// # Errors
    ///
    /// Fails on a non-positive length or an unmapped range.
    fn read_vec(&self, address: u32, len: i64) -> Result<Vec<u8>, MemoryError> {
        let len = checked_len(address, len)?;
        self.check(address, len)?;
        let mut buf = vec![0u8; len];
        self.read(address, &mut buf)?;
        Ok(buf)
    }

    /// Read a little-endian word.
    ///
    /// # Errors
    ///
    /// Fails if the word is not mapped.
    fn read_u32(&self, address: u32) -> Result<u32, MemoryError> {
        let mut buf = [0u8; 4];
        self.read(address, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Write a little-endian word.
    ///
    /// # Errors
    ///
    /// Fails if the word is not mapped.
    fn write_u32(&mut self, address: u32, value: u32) -> Result<(), MemoryError> {
        self.write(address, &value.to_le_bytes())
    }

    /// Write a little-endian signed word.
    ///
    /// # Errors
    ///
    /// Fails if the word is not mapped.
    fn write_i32(&mut self, address: u32, value: i32) -> Result<(), MemoryError> {
        self.write(address, &value.to_le_bytes())
    }

    /// Read a NUL-terminated string of at most `max` bytes.
    ///
    /// # Errors
    ///
    /// Fails if a byte before the terminator is not mapped.
    fn read_cstr(&self, address: u32, max: usize) -> Result<String, MemoryError> {
        let mut out = Vec::new();
        let mut byte = [0u8; 1];
        for i in 0..max {
            let at = address
                .checked_add(i as u32)
                .ok_or(MemoryError::OutOfBounds { address, len: max })?;
            self.read(at, &mut byte)?;
            if byte[0] == 0 {
                break;
            }
            out.push(byte[0]);
        }
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Fill `len` bytes with `value`. `len` must be positive.
    ///
    /// # Errors
    ///
    /// Fails on a non-positive length or an unmapped range.
    fn fill(&mut self, address: u32, len: i64, value: u8) -> Result<(), MemoryError> {
        let len = checked_len(address, len)?;
        self.check(address, len)?;
        self.write(address, &vec![value; len])
    }

    /// Copy `len` bytes from `src` to `dest`. `len` must be positive.
    ///
    /// # Errors
    ///
    /// Fails on a non-positive length or if either range is unmapped.
    fn copy(&mut self, src: u32, dest: u32, len: i64) -> Result<(), MemoryError> {
        self.check(dest, checked_len(dest, len)?)?;
        let buf = self.read_vec(src, len)?;
        self.write(dest, &buf)
    }
}

fn checked_len(address: u32, len: i64) -> Result<usize, MemoryError> {
    if len <= 0 {
        return Err(MemoryError::InvalidLength { address, len });
    }
    usize::try_from(len).map_err(|_| MemoryError::InvalidLength { address, len })
}

/// The guest address space: a set of non-overlapping regions.
///
/// An access must fall entirely inside a single region.
#[derive(Debug, Default)]
pub struct MemoryMap {
    regions: Vec<Region>,
}

impl MemoryMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a new zeroed region of `size` bytes at `base`.
    ///
    /// # Errors
    ///
    /// Fails if the region overlaps an existing one, wraps the address
    /// space, or the host allocation fails.
    pub fn map(&mut self, name: &'static str, base: u32, size: usize) -> Result<(), MemoryError> {
        let end = u64::from(base) + size as u64;
        if end > 1 << 32 {
            return Err(MemoryError::InvalidSize(size));
        }
        if self
            .regions
            .iter()
            .any(|r| u64::from(base) < r.end() && u64::from(r.base) < end)
        {
            return Err(MemoryError::Overlap { base, size });
        }

        self.regions.push(Region::new(name, base, size)?);
        Ok(())
    }

    /// Map the standard flash and RAM layout.
    ///
    /// # Errors
    ///
    /// Fails if `ram_size` exceeds [`MAX_RAM_SIZE`] or allocation fails.
    pub fn standard(ram_size: usize) -> Result<Self, MemoryError> {
        if ram_size == 0 || ram_size > MAX_RAM_SIZE {
            return Err(MemoryError::InvalidSize(ram_size));
        }
        let mut map = Self::new();
        map.map("flash", FLASH_ADDRESS, FLASH_SIZE)?;
        map.map("ram", RAM_ADDRESS, ram_size)?;
        Ok(map)
    }

    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Look up a region by name.
    #[must_use]
    pub fn region(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// Zero every region.
    pub fn clear(&mut self) {
        for region in &mut self.regions {
            region.clear();
        }
    }

    fn locate(&self, address: u32, len: usize) -> Result<usize, MemoryError> {
        self.regions
            .iter()
            .position(|r| r.contains(address, len))
            .ok_or(MemoryError::OutOfBounds { address, len })
    }
}

impl GuestMemory for MemoryMap {
    fn read(&self, address: u32, buf: &mut [u8]) -> Result<(), MemoryError> {
        let index = self.locate(address, buf.len())?;
        self.regions[index].read(address, buf)
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), MemoryError> {
        let index = self.locate(address, data.len())?;
        self.regions[index].write(address, data)
    }

    fn check(&self, address: u32, len: usize) -> Result<(), MemoryError> {
        self.locate(address, len).map(|_| ())
    }

    fn fill(&mut self, address: u32, len: i64, value: u8) -> Result<(), MemoryError> {
        let len = checked_len(address, len)?;
        let index = self.locate(address, len)?;
        self.regions[index].fill(address, len, value)
    }
}
