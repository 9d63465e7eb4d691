use crate::{Address, H256, U256};
use keccak_hash::keccak;

/// Keccak-256 of an arbitrary byte slice.
pub fn keccak256(data: &[u8]) -> H256 {
    keccak(data)
}

/// Interpret a 32-byte big-endian hash as a word.
pub fn h256_to_u256(hash: H256) -> U256 {
    U256::from_big_endian(hash.as_bytes())
}

/// Narrow a word to an address by taking its low 20 bytes.
pub fn word_to_address(word: U256) -> Address {
    let bytes = word.to_big_endian();
    Address::from_slice(&bytes[12..])
}

/// Widen an address to a word, zero-extending the high 12 bytes.
pub fn address_to_word(address: Address) -> U256 {
    U256::from_big_endian(address.as_bytes())
}

/// Contract address for CREATE: `keccak256(rlp([sender, nonce]))[12..]`.
pub fn calculate_create_address(sender: Address, nonce: u64) -> Address {
    let payload = rlp_address_nonce(sender, nonce);
    let hash = keccak(payload);
    Address::from_slice(&hash.as_bytes()[12..])
}

/// Contract address for CREATE2:
/// `keccak256(0xff ++ sender ++ salt ++ keccak256(initcode))[12..]`.
pub fn calculate_create2_address(sender: Address, salt: U256, initcode: &[u8]) -> Address {
    let initcode_hash = keccak(initcode);
    let mut preimage = Vec::with_capacity(1 + 20 + 32 + 32);
    preimage.push(0xff);
    preimage.extend_from_slice(sender.as_bytes());
    preimage.extend_from_slice(&salt.to_big_endian());
    preimage.extend_from_slice(initcode_hash.as_bytes());
    let hash = keccak(preimage);
    Address::from_slice(&hash.as_bytes()[12..])
}

/// RLP encoding of the two-item list `[sender, nonce]`.
///
/// The payload is always short (22 bytes of content at most), so the
/// long-form length prefixes never come into play.
fn rlp_address_nonce(sender: Address, nonce: u64) -> Vec<u8> {
    let mut content = Vec::with_capacity(30);
    content.push(0x80 + 20);
    content.extend_from_slice(sender.as_bytes());
    if nonce == 0 {
        content.push(0x80);
    } else if nonce < 0x80 {
        content.push(nonce as u8);
    } else {
        let bytes = nonce.to_be_bytes();
        let first = bytes.iter().position(|&b| b != 0).unwrap_or(7);
        content.push(0x80 + (8 - first) as u8);
        content.extend_from_slice(&bytes[first..]);
    }

    let mut encoded = Vec::with_capacity(content.len() + 1);
    encoded.push(0xc0 + content.len() as u8);
    encoded.extend(content);
    encoded
}
