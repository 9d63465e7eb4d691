//! Byte-addressable, expandable frame memory.
//!
//! The buffer length is kept word-aligned so `MSIZE` and the quadratic
//! expansion cost read straight off it. A zero-length access never grows
//! memory, whatever its offset.

use crate::{
    constants::{MEMORY_EXPANSION_QUOTIENT, WORD_SIZE_IN_BYTES_USIZE},
    errors::{ExceptionalHalt, InternalError, VMError},
};
use bytes::Bytes;
use spectre_common::U256;
use ExceptionalHalt::{OutOfBounds, OutOfGas};

#[derive(Debug, Clone, Default)]
pub struct Memory {
    buffer: Vec<u8>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current size in bytes; always a multiple of 32.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Grow (never shrink) to cover `new_size` bytes, zero-filling and
    /// rounding up to the next word boundary.
    pub fn resize(&mut self, new_size: usize) -> Result<(), VMError> {
        if new_size == 0 || new_size <= self.buffer.len() {
            return Ok(());
        }
        let aligned = new_size
            .checked_next_multiple_of(WORD_SIZE_IN_BYTES_USIZE)
            .ok_or(OutOfBounds)?;
        self.buffer.resize(aligned, 0);
        Ok(())
    }

    pub fn load_word(&mut self, offset: usize) -> Result<U256, VMError> {
        let end = offset
            .checked_add(WORD_SIZE_IN_BYTES_USIZE)
            .ok_or(OutOfBounds)?;
        self.resize(end)?;
        let bytes = self.buffer.get(offset..end).ok_or(OutOfBounds)?;
        Ok(U256::from_big_endian(bytes))
    }

    pub fn load_range(&mut self, offset: usize, size: usize) -> Result<Bytes, VMError> {
        if size == 0 {
            return Ok(Bytes::new());
        }
        let end = offset.checked_add(size).ok_or(OutOfBounds)?;
        self.resize(end)?;
        let bytes = self.buffer.get(offset..end).ok_or(OutOfBounds)?;
        Ok(Bytes::copy_from_slice(bytes))
    }

    pub fn store_word(&mut self, offset: usize, word: U256) -> Result<(), VMError> {
        self.store_data(offset, &word.to_big_endian())
    }

    pub fn store_byte(&mut self, offset: usize, byte: u8) -> Result<(), VMError> {
        self.store_data(offset, &[byte])
    }

    pub fn store_data(&mut self, offset: usize, data: &[u8]) -> Result<(), VMError> {
        if data.is_empty() {
            return Ok(());
        }
        let end = offset.checked_add(data.len()).ok_or(OutOfBounds)?;
        self.resize(end)?;
        self.buffer
            .get_mut(offset..end)
            .ok_or(OutOfBounds)?
            .copy_from_slice(data);
        Ok(())
    }

    /// Memory-to-memory copy with overlap handled via a scratch buffer.
    pub fn copy_within(
        &mut self,
        src_offset: usize,
        dst_offset: usize,
        size: usize,
    ) -> Result<(), VMError> {
        if size == 0 {
            return Ok(());
        }
        let span_end = src_offset
            .max(dst_offset)
            .checked_add(size)
            .ok_or(OutOfBounds)?;
        self.resize(span_end)?;

        let src_end = src_offset.checked_add(size).ok_or(OutOfBounds)?;
        let chunk = self
            .buffer
            .get(src_offset..src_end)
            .ok_or(OutOfBounds)?
            .to_vec();
        self.store_data(dst_offset, &chunk)
    }
}

/// Word-aligned size a frame's memory must reach to cover the access, or
/// zero for a zero-length access at any offset.
pub fn calculate_memory_size(offset: U256, size: usize) -> Result<usize, VMError> {
    if size == 0 {
        return Ok(0);
    }
    let offset: usize = offset.try_into().map_err(|_| OutOfGas)?;
    offset
        .checked_add(size)
        .and_then(|end| end.checked_next_multiple_of(WORD_SIZE_IN_BYTES_USIZE))
        .ok_or(OutOfBounds.into())
}

/// Charge for growing memory: only the newly covered bytes are paid for.
pub fn expansion_cost(new_memory_size: usize, current_memory_size: usize) -> Result<u64, VMError> {
    if new_memory_size <= current_memory_size {
        return Ok(0);
    }
    cost(new_memory_size)?
        .checked_sub(cost(current_memory_size)?)
        .ok_or(InternalError::Underflow.into())
}

/// Total cost for a memory of `memory_size` bytes:
/// `3 * words + words^2 / 512`.
fn cost(memory_size: usize) -> Result<u64, VMError> {
    let words = memory_size
        .checked_add(WORD_SIZE_IN_BYTES_USIZE - 1)
        .ok_or(OutOfGas)?
        / WORD_SIZE_IN_BYTES_USIZE;

    let linear = words.checked_mul(3).ok_or(OutOfGas)?;
    let quadratic = words.checked_pow(2).ok_or(OutOfGas)? / MEMORY_EXPANSION_QUOTIENT;

    linear
        .checked_add(quadratic)
        .ok_or(OutOfGas)?
        .try_into()
        .map_err(|_| ExceptionalHalt::VeryLargeNumber.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_length_access_never_expands() {
        let mut memory = Memory::new();
        memory.load_range(1 << 40, 0).unwrap();
        assert_eq!(memory.len(), 0);
        assert_eq!(calculate_memory_size(U256::MAX, 0).unwrap(), 0);
    }

    #[test]
    fn reads_past_the_end_zero_fill() {
        let mut memory = Memory::new();
        let word = memory.load_word(64).unwrap();
        assert!(word.is_zero());
        assert_eq!(memory.len(), 96);
    }

    #[test]
    fn store_then_load_round_trips() {
        let mut memory = Memory::new();
        let value = U256::from(0xdeadbeefu64);
        memory.store_word(32, value).unwrap();
        assert_eq!(memory.load_word(32).unwrap(), value);
        // Unwritten neighbors stay zero.
        assert!(memory.load_word(0).unwrap().is_zero());
    }

    #[test]
    fn overlapping_copy_is_correct() {
        let mut memory = Memory::new();
        memory.store_data(0, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        memory.copy_within(0, 4, 8).unwrap();
        assert_eq!(
            memory.load_range(4, 8).unwrap().as_ref(),
            &[1, 2, 3, 4, 5, 6, 7, 8]
        );
    }

    #[test]
    fn expansion_cost_is_quadratic_delta() {
        // cost(1024) - cost(32) = (96 + 2) - (3 + 0) = 95
        assert_eq!(expansion_cost(1024, 32).unwrap(), 95);
        // Growing within the already paid-for region is free.
        assert_eq!(expansion_cost(32, 1024).unwrap(), 0);
    }

    #[test]
    fn size_is_word_aligned() {
        assert_eq!(calculate_memory_size(U256::from(0), 1).unwrap(), 32);
        assert_eq!(calculate_memory_size(U256::from(31), 2).unwrap(), 64);
        assert_eq!(calculate_memory_size(U256::from(32), 32).unwrap(), 64);
    }
}
