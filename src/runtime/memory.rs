//! Linear memory
//!
//! Page-granular growable byte array with bounds-checked little-endian
//! access. Addresses are taken as `u64` because an effective address is a
//! 32-bit base plus a static offset and the sum must not wrap before the
//! bounds check.
//!
//! Out-of-bounds access traps. Growing past the limit does NOT trap: per
//! the `memory.grow` contract it returns `-1` and leaves memory untouched.

use super::RuntimeError;
use byteorder::{ByteOrder, LittleEndian};

/// WebAssembly page size in bytes (64KB).
pub const PAGE_SIZE: usize = 65536;

/// Maximum number of pages (64K pages = 4GB total).
pub const MAX_PAGES: u32 = 65536;

#[derive(Debug)]
pub struct Memory {
    data: Vec<u8>,
    current_pages: u32,
    max_pages: Option<u32>,
}

impl Memory {
    /// Create a memory with `initial_pages` pages, zero-filled, optionally
    /// capped at `max_pages`.
    pub fn new(initial_pages: u32, max_pages: Option<u32>) -> Result<Memory, RuntimeError> {
        if initial_pages > MAX_PAGES {
            return Err(RuntimeError::MemoryError(format!(
                "initial size {} pages exceeds maximum {} pages",
                initial_pages, MAX_PAGES
            )));
        }
        if let Some(max) = max_pages {
            if initial_pages > max {
                return Err(RuntimeError::MemoryError(format!(
                    "initial size {} pages exceeds declared maximum {} pages",
                    initial_pages, max
                )));
            }
            if max > MAX_PAGES {
                return Err(RuntimeError::MemoryError(format!(
                    "declared maximum {} pages exceeds {} pages",
                    max, MAX_PAGES
                )));
            }
        }
        Ok(Memory {
            data: vec![0u8; initial_pages as usize * PAGE_SIZE],
            current_pages: initial_pages,
            max_pages,
        })
    }

    /// Current size in pages.
    pub fn size(&self) -> u32 {
        self.current_pages
    }

    pub fn max_pages(&self) -> Option<u32> {
        self.max_pages
    }

    /// Grow by `delta_pages` pages, zero-filling the new range.
    ///
    /// Returns the previous size in pages, or `-1` if the request exceeds
    /// the limit. Failure leaves the memory untouched.
    pub fn grow(&mut self, delta_pages: u32) -> i32 {
        let current = self.current_pages;
        let new_pages = match current.checked_add(delta_pages) {
            Some(p) => p,
            None => return -1,
        };
        let effective_max = self.max_pages.unwrap_or(MAX_PAGES);
        if new_pages > effective_max {
            return -1;
        }
        let new_bytes = new_pages as usize * PAGE_SIZE;
        match self.data.try_reserve(new_bytes - self.data.len()) {
            Ok(()) => {
                self.data.resize(new_bytes, 0);
                self.current_pages = new_pages;
                current as i32
            }
            Err(_) => -1,
        }
    }

    /// Bounds-check an access of `size` bytes at `addr` and return the
    /// checked range as a slice index.
    #[inline]
    fn check_bounds(&self, addr: u64, size: usize) -> Result<usize, RuntimeError> {
        let end = addr.checked_add(size as u64);
        match end {
            Some(end) if end <= self.data.len() as u64 => Ok(addr as usize),
            _ => Err(RuntimeError::MemoryOutOfBounds(addr)),
        }
    }

    pub fn read_u8(&self, addr: u64) -> Result<u8, RuntimeError> {
        let at = self.check_bounds(addr, 1)?;
        Ok(self.data[at])
    }

    pub fn read_u16(&self, addr: u64) -> Result<u16, RuntimeError> {
        let at = self.check_bounds(addr, 2)?;
        Ok(LittleEndian::read_u16(&self.data[at..]))
    }

    pub fn read_u32(&self, addr: u64) -> Result<u32, RuntimeError> {
        let at = self.check_bounds(addr, 4)?;
        Ok(LittleEndian::read_u32(&self.data[at..]))
    }

    pub fn read_u64(&self, addr: u64) -> Result<u64, RuntimeError> {
        let at = self.check_bounds(addr, 8)?;
        Ok(LittleEndian::read_u64(&self.data[at..]))
    }

    pub fn read_i8(&self, addr: u64) -> Result<i8, RuntimeError> {
        Ok(self.read_u8(addr)? as i8)
    }

    pub fn read_i16(&self, addr: u64) -> Result<i16, RuntimeError> {
        Ok(self.read_u16(addr)? as i16)
    }

    pub fn read_i32(&self, addr: u64) -> Result<i32, RuntimeError> {
        Ok(self.read_u32(addr)? as i32)
    }

    pub fn read_i64(&self, addr: u64) -> Result<i64, RuntimeError> {
        Ok(self.read_u64(addr)? as i64)
    }

    pub fn read_f32(&self, addr: u64) -> Result<f32, RuntimeError> {
        Ok(f32::from_bits(self.read_u32(addr)?))
    }

    pub fn read_f64(&self, addr: u64) -> Result<f64, RuntimeError> {
        Ok(f64::from_bits(self.read_u64(addr)?))
    }

    pub fn write_u8(&mut self, addr: u64, value: u8) -> Result<(), RuntimeError> {
        let at = self.check_bounds(addr, 1)?;
        self.data[at] = value;
        Ok(())
    }

    pub fn write_u16(&mut self, addr: u64, value: u16) -> Result<(), RuntimeError> {
        let at = self.check_bounds(addr, 2)?;
        LittleEndian::write_u16(&mut self.data[at..], value);
        Ok(())
    }

    pub fn write_u32(&mut self, addr: u64, value: u32) -> Result<(), RuntimeError> {
        let at = self.check_bounds(addr, 4)?;
        LittleEndian::write_u32(&mut self.data[at..], value);
        Ok(())
    }

    pub fn write_u64(&mut self, addr: u64, value: u64) -> Result<(), RuntimeError> {
        let at = self.check_bounds(addr, 8)?;
        LittleEndian::write_u64(&mut self.data[at..], value);
        Ok(())
    }

    pub fn write_i8(&mut self, addr: u64, value: i8) -> Result<(), RuntimeError> {
        self.write_u8(addr, value as u8)
    }

    pub fn write_i16(&mut self, addr: u64, value: i16) -> Result<(), RuntimeError> {
        self.write_u16(addr, value as u16)
    }

    pub fn write_i32(&mut self, addr: u64, value: i32) -> Result<(), RuntimeError> {
        self.write_u32(addr, value as u32)
    }

    pub fn write_i64(&mut self, addr: u64, value: i64) -> Result<(), RuntimeError> {
        self.write_u64(addr, value as u64)
    }

    pub fn write_f32(&mut self, addr: u64, value: f32) -> Result<(), RuntimeError> {
        self.write_u32(addr, value.to_bits())
    }

    pub fn write_f64(&mut self, addr: u64, value: f64) -> Result<(), RuntimeError> {
        self.write_u64(addr, value.to_bits())
    }

    /// Copy `len` bytes out of memory.
    pub fn read_bytes(&self, addr: u64, len: usize) -> Result<Vec<u8>, RuntimeError> {
        let at = self.check_bounds(addr, len)?;
        Ok(self.data[at..at + len].to_vec())
    }

    /// Copy `bytes` into memory.
    pub fn write_bytes(&mut self, addr: u64, bytes: &[u8]) -> Result<(), RuntimeError> {
        let at = self.check_bounds(addr, bytes.len())?;
        self.data[at..at + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creation() {
        let mem = Memory::new(1, None).unwrap();
        assert_eq!(mem.size(), 1);
        assert!(Memory::new(10, Some(5)).is_err());
        assert!(Memory::new(MAX_PAGES + 1, None).is_err());
        assert!(Memory::new(1, Some(MAX_PAGES + 1)).is_err());
    }

    #[test]
    fn test_grow_returns_previous_size() {
        let mut mem = Memory::new(1, Some(10)).unwrap();
        assert_eq!(mem.grow(2), 1);
        assert_eq!(mem.size(), 3);
        assert_eq!(mem.grow(7), 3);
        assert_eq!(mem.size(), 10);
    }

    #[test]
    fn test_grow_past_limit_is_sentinel_not_error() {
        let mut mem = Memory::new(1, Some(2)).unwrap();
        mem.write_u32(0, 0xDEADBEEF).unwrap();
        assert_eq!(mem.grow(5), -1);
        // untouched on failure
        assert_eq!(mem.size(), 1);
        assert_eq!(mem.read_u32(0).unwrap(), 0xDEADBEEF);
        assert_eq!(mem.grow(u32::MAX), -1);
    }

    #[test]
    fn test_grow_preserves_and_zero_fills() {
        let mut mem = Memory::new(1, None).unwrap();
        mem.write_u32(0, 0x12345678).unwrap();
        assert_eq!(mem.grow(1), 1);
        assert_eq!(mem.read_u32(0).unwrap(), 0x12345678);
        assert_eq!(mem.read_u32(PAGE_SIZE as u64).unwrap(), 0);
    }

    #[test]
    fn test_little_endian_layout() {
        let mut mem = Memory::new(1, None).unwrap();
        mem.write_u32(100, 0x12345678).unwrap();
        assert_eq!(mem.read_u8(100).unwrap(), 0x78);
        assert_eq!(mem.read_u8(103).unwrap(), 0x12);
    }

    #[test]
    fn test_bounds() {
        let mut mem = Memory::new(1, None).unwrap();
        let end = PAGE_SIZE as u64;
        mem.write_u8(end - 1, 0xFF).unwrap();
        assert_eq!(
            mem.write_u8(end, 1),
            Err(RuntimeError::MemoryOutOfBounds(end))
        );
        assert!(mem.read_u32(end - 3).is_err());
        // effective addresses past u32 range must not wrap
        assert!(mem.read_u8(u64::from(u32::MAX) + 100).is_err());
        assert!(mem.read_bytes(u64::MAX, 2).is_err());
    }

    #[test]
    fn test_unaligned_access_allowed() {
        let mut mem = Memory::new(1, None).unwrap();
        mem.write_u64(3, 0x123456789ABCDEF0).unwrap();
        assert_eq!(mem.read_u64(3).unwrap(), 0x123456789ABCDEF0);
    }

    #[test]
    fn test_float_bits() {
        let mut mem = Memory::new(1, None).unwrap();
        mem.write_f32(0, -0.0).unwrap();
        assert_eq!(mem.read_f32(0).unwrap().to_bits(), (-0.0f32).to_bits());
        mem.write_f64(8, f64::NAN).unwrap();
        assert!(mem.read_f64(8).unwrap().is_nan());
    }

    #[test]
    fn test_bytes_round_trip() {
        let mut mem = Memory::new(1, None).unwrap();
        mem.write_bytes(10, &[1, 2, 3]).unwrap();
        assert_eq!(mem.read_bytes(10, 3).unwrap(), vec![1, 2, 3]);
        assert!(mem.write_bytes(PAGE_SIZE as u64 - 1, &[0; 2]).is_err());
    }
}
