//! Hex-string rendering helpers for the JSON fixture formats.
//!
//! The ecosystem fixture format renders every numeric field as a
//! `0x`-prefixed lowercase hex string; the native format renders bytecode
//! as bare lowercase hex. These helpers keep that knowledge in one place.

use crate::{Address, U256};
use serde::Serializer;

/// `0x`-prefixed lowercase hex, no leading zeros (`0` renders as `0x0`).
pub fn u64_to_hex(value: u64) -> String {
    format!("0x{value:x}")
}

/// `0x`-prefixed lowercase hex, no leading zeros.
pub fn u256_to_hex(value: U256) -> String {
    format!("0x{value:x}")
}

/// `0x`-prefixed lowercase hex of the full 20 bytes.
pub fn address_to_hex(address: Address) -> String {
    format!("0x{}", hex::encode(address.as_bytes()))
}

/// `0x`-prefixed lowercase hex of a byte string (`0x` for empty).
pub fn bytes_to_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

/// Bare lowercase hex of a byte string, as the native fixture format uses.
pub fn bytes_to_bare_hex(data: &[u8]) -> String {
    hex::encode(data)
}

pub fn serialize_u64_as_hex<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&u64_to_hex(*value))
}

pub fn serialize_u256_as_hex<S: Serializer>(
    value: &U256,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&u256_to_hex(*value))
}

pub fn serialize_bytes_as_hex<S: Serializer>(
    value: &bytes::Bytes,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&bytes_to_hex(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_rendering() {
        assert_eq!(u64_to_hex(0), "0x0");
        assert_eq!(u64_to_hex(1_000_000), "0xf4240");
        assert_eq!(u256_to_hex(U256::from(255)), "0xff");
        assert_eq!(bytes_to_hex(&[]), "0x");
        assert_eq!(bytes_to_hex(&[0x5f, 0x00]), "0x5f00");
        assert_eq!(bytes_to_bare_hex(&[0x5f, 0x00]), "5f00");
    }
}
