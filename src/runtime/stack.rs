//! Operand stack
//!
//! A byte-addressed stack rather than a stack of tagged values: i32/f32
//! operands occupy four bytes, i64/f64 eight, always little-endian. Locals
//! live in the same buffer at the base of the current frame and are read
//! and written at absolute byte offsets. References cannot be usefully
//! flattened to bytes, so they ride on a separate list.
//!
//! Pushing past the configured byte limit is [`RuntimeError::StackOverflow`]
//! (how deep recursion surfaces). Popping from an empty stack is
//! [`RuntimeError::StackUnderflow`] and indicates a compiler defect, since
//! lowered code is stack-balance checked.

use super::RuntimeError;
use byteorder::{ByteOrder, LittleEndian};

/// Default byte capacity, enough for several thousand nested frames.
pub const DEFAULT_STACK_BYTES: usize = 512 * 1024;

#[derive(Debug)]
pub struct OperandStack {
    bytes: Vec<u8>,
    refs: Vec<Option<u32>>,
    limit: usize,
}

impl OperandStack {
    pub fn new(limit: usize) -> OperandStack {
        OperandStack {
            bytes: Vec::new(),
            refs: Vec::new(),
            limit,
        }
    }

    /// Current size in bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn ref_count(&self) -> usize {
        self.refs.len()
    }

    /// Drop everything above `size`, including any references pushed since.
    pub fn truncate(&mut self, size: usize, ref_count: usize) {
        self.bytes.truncate(size);
        self.refs.truncate(ref_count);
    }

    /// Extend with zero bytes up to `size`. Used to clear declared locals
    /// when a frame is set up.
    pub fn zero_to(&mut self, size: usize) -> Result<(), RuntimeError> {
        if size > self.limit {
            return Err(RuntimeError::StackOverflow);
        }
        if size > self.bytes.len() {
            self.bytes.resize(size, 0);
        }
        Ok(())
    }

    fn grow(&mut self, n: usize) -> Result<usize, RuntimeError> {
        let len = self.bytes.len();
        if len + n > self.limit {
            return Err(RuntimeError::StackOverflow);
        }
        self.bytes.resize(len + n, 0);
        Ok(len)
    }

    /// Byte offset of the topmost `n`-byte slot. The caller reads it and
    /// then truncates to this offset.
    fn top(&self, n: usize) -> Result<usize, RuntimeError> {
        self.bytes
            .len()
            .checked_sub(n)
            .ok_or(RuntimeError::StackUnderflow)
    }

    // ---- push/pop at the top ----

    pub fn push_i32(&mut self, v: i32) -> Result<(), RuntimeError> {
        let at = self.grow(4)?;
        LittleEndian::write_i32(&mut self.bytes[at..], v);
        Ok(())
    }

    pub fn push_i64(&mut self, v: i64) -> Result<(), RuntimeError> {
        let at = self.grow(8)?;
        LittleEndian::write_i64(&mut self.bytes[at..], v);
        Ok(())
    }

    pub fn push_f32(&mut self, v: f32) -> Result<(), RuntimeError> {
        let at = self.grow(4)?;
        LittleEndian::write_f32(&mut self.bytes[at..], v);
        Ok(())
    }

    pub fn push_f64(&mut self, v: f64) -> Result<(), RuntimeError> {
        let at = self.grow(8)?;
        LittleEndian::write_f64(&mut self.bytes[at..], v);
        Ok(())
    }

    pub fn pop_i32(&mut self) -> Result<i32, RuntimeError> {
        let at = self.top(4)?;
        let v = LittleEndian::read_i32(&self.bytes[at..]);
        self.bytes.truncate(at);
        Ok(v)
    }

    pub fn pop_i64(&mut self) -> Result<i64, RuntimeError> {
        let at = self.top(8)?;
        let v = LittleEndian::read_i64(&self.bytes[at..]);
        self.bytes.truncate(at);
        Ok(v)
    }

    pub fn pop_f32(&mut self) -> Result<f32, RuntimeError> {
        let at = self.top(4)?;
        let v = LittleEndian::read_f32(&self.bytes[at..]);
        self.bytes.truncate(at);
        Ok(v)
    }

    pub fn pop_f64(&mut self) -> Result<f64, RuntimeError> {
        let at = self.top(8)?;
        let v = LittleEndian::read_f64(&self.bytes[at..]);
        self.bytes.truncate(at);
        Ok(v)
    }

    pub fn push_ref(&mut self, v: Option<u32>) {
        self.refs.push(v);
    }

    pub fn pop_ref(&mut self) -> Result<Option<u32>, RuntimeError> {
        self.refs.pop().ok_or(RuntimeError::StackUnderflow)
    }

    // ---- absolute access, used for locals ----

    fn slice(&self, at: usize, n: usize) -> Result<&[u8], RuntimeError> {
        self.bytes
            .get(at..at + n)
            .ok_or(RuntimeError::StackUnderflow)
    }

    fn slice_mut(&mut self, at: usize, n: usize) -> Result<&mut [u8], RuntimeError> {
        self.bytes
            .get_mut(at..at + n)
            .ok_or(RuntimeError::StackUnderflow)
    }

    pub fn get_i32(&self, at: usize) -> Result<i32, RuntimeError> {
        Ok(LittleEndian::read_i32(self.slice(at, 4)?))
    }

    pub fn get_i64(&self, at: usize) -> Result<i64, RuntimeError> {
        Ok(LittleEndian::read_i64(self.slice(at, 8)?))
    }

    pub fn get_f32(&self, at: usize) -> Result<f32, RuntimeError> {
        Ok(LittleEndian::read_f32(self.slice(at, 4)?))
    }

    pub fn get_f64(&self, at: usize) -> Result<f64, RuntimeError> {
        Ok(LittleEndian::read_f64(self.slice(at, 8)?))
    }

    pub fn set_i32(&mut self, at: usize, v: i32) -> Result<(), RuntimeError> {
        LittleEndian::write_i32(self.slice_mut(at, 4)?, v);
        Ok(())
    }

    pub fn set_i64(&mut self, at: usize, v: i64) -> Result<(), RuntimeError> {
        LittleEndian::write_i64(self.slice_mut(at, 8)?, v);
        Ok(())
    }

    pub fn set_f32(&mut self, at: usize, v: f32) -> Result<(), RuntimeError> {
        LittleEndian::write_f32(self.slice_mut(at, 4)?, v);
        Ok(())
    }

    pub fn set_f64(&mut self, at: usize, v: f64) -> Result<(), RuntimeError> {
        LittleEndian::write_f64(self.slice_mut(at, 8)?, v);
        Ok(())
    }
}

impl Default for OperandStack {
    fn default() -> OperandStack {
        OperandStack::new(DEFAULT_STACK_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_round_trip() {
        let mut stack = OperandStack::default();
        stack.push_i32(-7).unwrap();
        stack.push_i64(1 << 40).unwrap();
        stack.push_f64(2.5).unwrap();
        assert_eq!(stack.size(), 20);
        assert_eq!(stack.pop_f64().unwrap(), 2.5);
        assert_eq!(stack.pop_i64().unwrap(), 1 << 40);
        assert_eq!(stack.pop_i32().unwrap(), -7);
        assert_eq!(stack.size(), 0);
    }

    #[test]
    fn test_pop_leaves_deeper_values_intact() {
        // pop must read the top slot before discarding it, with live
        // operands still below
        let mut stack = OperandStack::default();
        stack.push_i64(7).unwrap();
        stack.push_i32(-3).unwrap();
        stack.push_i32(42).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 42);
        assert_eq!(stack.pop_i32().unwrap(), -3);
        assert_eq!(stack.pop_i64().unwrap(), 7);
    }

    #[test]
    fn test_underflow() {
        let mut stack = OperandStack::default();
        assert_eq!(stack.pop_i32(), Err(RuntimeError::StackUnderflow));
        stack.push_i32(1).unwrap();
        assert_eq!(stack.pop_i64(), Err(RuntimeError::StackUnderflow));
    }

    #[test]
    fn test_overflow() {
        let mut stack = OperandStack::new(8);
        stack.push_i64(0).unwrap();
        assert_eq!(stack.push_i32(0), Err(RuntimeError::StackOverflow));
    }

    #[test]
    fn test_absolute_access() {
        let mut stack = OperandStack::default();
        stack.zero_to(12).unwrap();
        stack.set_i32(0, 10).unwrap();
        stack.set_i64(4, -1).unwrap();
        assert_eq!(stack.get_i32(0).unwrap(), 10);
        assert_eq!(stack.get_i64(4).unwrap(), -1);
        assert_eq!(stack.get_i32(12), Err(RuntimeError::StackUnderflow));
    }

    #[test]
    fn test_truncate_drops_refs() {
        let mut stack = OperandStack::default();
        stack.push_i32(1).unwrap();
        stack.push_ref(Some(3));
        stack.truncate(0, 0);
        assert_eq!(stack.size(), 0);
        assert_eq!(stack.pop_ref(), Err(RuntimeError::StackUnderflow));
    }

    #[test]
    fn test_float_bits_survive() {
        let mut stack = OperandStack::default();
        stack.push_f32(-0.0).unwrap();
        assert_eq!(stack.pop_f32().unwrap().to_bits(), (-0.0f32).to_bits());
        stack.push_f64(f64::NAN).unwrap();
        assert!(stack.pop_f64().unwrap().is_nan());
    }
}
