use crate::errors::{ExceptionalHalt, VMError};
use spectre_common::U256;

pub use spectre_common::utils::{
    address_to_word, calculate_create2_address, calculate_create_address, keccak256,
    word_to_address,
};

pub fn u256_to_usize(value: U256) -> Result<usize, VMError> {
    value
        .try_into()
        .map_err(|_| ExceptionalHalt::VeryLargeNumber.into())
}

/// Convert a `(size, offset)` operand pair popped from the stack.
///
/// A zero size short-circuits to `(0, 0)`: zero-length accesses are legal
/// at any offset and must not expand memory or fault on a huge offset.
pub fn size_offset_to_usize(size: U256, offset: U256) -> Result<(usize, usize), VMError> {
    if size.is_zero() {
        return Ok((0, 0));
    }
    Ok((u256_to_usize(size)?, u256_to_usize(offset)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_size_ignores_offset() {
        assert_eq!(size_offset_to_usize(U256::zero(), U256::MAX).unwrap(), (0, 0));
    }

    #[test]
    fn oversized_values_fault() {
        assert!(size_offset_to_usize(U256::MAX, U256::zero()).is_err());
    }
}
