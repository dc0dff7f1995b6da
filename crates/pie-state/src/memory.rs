//! Guest regions backed by guarded host mappings.
//!
//! A region's bytes sit between two `PROT_NONE` areas. Every access checks
//! the guest range first and then copies through raw pointers, so an offset
//! bug on the host side faults on a guard instead of reaching the
//! neighbouring mapping.

use std::ffi::c_void;
use std::num::NonZeroUsize;
use std::ptr::NonNull;

use nix::sys::mman::{MapFlags, ProtFlags, mmap_anonymous, mprotect, munmap};

use crate::MemoryError;

/// Guard area on each side of a region (16 KiB, a multiple of the page size).
pub const GUARD_SIZE: usize = 1 << 14;

/// A named span of guest addresses `[base, base + size)`.
pub struct Region {
    pub name: &'static str,
    pub base: u32,
    /// Start of the whole host mapping, leading guard included.
    mapping: NonNull<c_void>,
    size: usize,
}

impl Region {
    /// Map `size` zeroed bytes for guest address `base`.
    ///
    /// # Errors
    ///
    /// Fails on a zero size or if the host refuses the mapping.
    pub fn new(name: &'static str, base: u32, size: usize) -> Result<Self, MemoryError> {
        let mapped = size
            .checked_add(2 * GUARD_SIZE)
            .filter(|_| size > 0)
            .and_then(NonZeroUsize::new)
            .ok_or(MemoryError::InvalidSize(size))?;

        // SAFETY: a fresh private anonymous mapping aliases nothing.
        let mapping = unsafe {
            mmap_anonymous(
                None,
                mapped,
                ProtFlags::PROT_NONE,
                MapFlags::MAP_PRIVATE | MapFlags::MAP_NORESERVE,
            )?
        };
        // Dropping on a failed mprotect unmaps the whole span.
        let region = Self {
            name,
            base,
            mapping,
            size,
        };
        // SAFETY: `bytes()` .. `bytes() + size` lies inside the mapping.
        unsafe {
            mprotect(
                region.bytes(),
                size,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
            )?;
        }
        Ok(region)
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// One past the last guest address, widened so it cannot wrap.
    #[must_use]
    pub fn end(&self) -> u64 {
        u64::from(self.base) + self.size as u64
    }

    /// Offset of `[address, address + len)` inside this region, if contained.
    #[must_use]
    pub fn offset_of(&self, address: u32, len: usize) -> Option<usize> {
        let offset = usize::try_from(address.checked_sub(self.base)?).ok()?;
        (offset.checked_add(len)? <= self.size).then_some(offset)
    }

    #[must_use]
    pub fn contains(&self, address: u32, len: usize) -> bool {
        self.offset_of(address, len).is_some()
    }

    /// Copy guest bytes at `address` into `buf`.
    ///
    /// # Errors
    ///
    /// Fails if the range leaves the region.
    pub fn read(&self, address: u32, buf: &mut [u8]) -> Result<(), MemoryError> {
        let src = self.host_ptr(address, buf.len())?;
        // SAFETY: `host_ptr` checked that `buf.len()` bytes are mapped
        // read/write; `buf` is a distinct host allocation.
        unsafe { std::ptr::copy_nonoverlapping(src, buf.as_mut_ptr(), buf.len()) };
        Ok(())
    }

    /// Copy `data` to guest bytes at `address`.
    ///
    /// # Errors
    ///
    /// Fails if the range leaves the region.
    pub fn write(&mut self, address: u32, data: &[u8]) -> Result<(), MemoryError> {
        let dest = self.host_ptr(address, data.len())?;
        // SAFETY: as in `read`, with `&mut self` excluding other views.
        unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), dest, data.len()) };
        Ok(())
    }

    /// Set `len` guest bytes at `address` to `value`.
    ///
    /// # Errors
    ///
    /// Fails if the range leaves the region.
    pub fn fill(&mut self, address: u32, len: usize, value: u8) -> Result<(), MemoryError> {
        let dest = self.host_ptr(address, len)?;
        // SAFETY: `host_ptr` checked the span.
        unsafe { std::ptr::write_bytes(dest, value, len) };
        Ok(())
    }

    /// Zero the whole region.
    pub fn clear(&mut self) {
        // SAFETY: the usable span is exactly `size` bytes.
        unsafe { std::ptr::write_bytes(self.bytes().cast::<u8>().as_ptr(), 0, self.size) };
    }

    /// First usable byte, just past the leading guard.
    fn bytes(&self) -> NonNull<c_void> {
        // SAFETY: the mapping is `GUARD_SIZE + size + GUARD_SIZE` bytes long.
        unsafe { self.mapping.byte_add(GUARD_SIZE) }
    }

    fn host_ptr(&self, address: u32, len: usize) -> Result<*mut u8, MemoryError> {
        let offset = self
            .offset_of(address, len)
            .ok_or(MemoryError::OutOfBounds { address, len })?;
        // SAFETY: `offset + len <= size`.
        Ok(unsafe { self.bytes().cast::<u8>().as_ptr().add(offset) })
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        // SAFETY: unmaps exactly what `new` mapped; nothing borrows it now.
        unsafe {
            let _ = munmap(self.mapping, self.size + 2 * GUARD_SIZE);
        }
    }
}

// SAFETY: the mapping is owned exclusively; shared access is read-only.
unsafe impl Send for Region {}
unsafe impl Sync for Region {}

impl std::fmt::Debug for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Region")
            .field("name", &self.name)
            .field("base", &format_args!("{:#010x}", self.base))
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}
