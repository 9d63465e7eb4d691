use spectre_common::U256;

pub const WORD_SIZE_IN_BYTES_USIZE: usize = 32;
pub const WORD_SIZE_IN_BYTES_U64: u64 = 32;

/// Value pushed for a successful sub-call.
pub const SUCCESS: U256 = U256([1, 0, 0, 0]);
/// Value pushed for a failed sub-call.
pub const FAIL: U256 = U256::zero();

pub const STACK_LIMIT: usize = 1024;
pub const CALL_DEPTH_LIMIT: usize = 1024;

pub const MEMORY_EXPANSION_QUOTIENT: usize = 512;

/// EIP-3860 initcode ceiling, enforced from Shanghai on.
pub const INIT_CODE_MAX_SIZE: usize = 49152;

/// BLOCKHASH only serves the most recent 256 blocks.
pub const BLOCKHASH_WINDOW: u64 = 256;

/// secp256k1 curve order, big-endian limbs reversed into U256 layout.
/// Used for the low-s signature bound (Homestead and later).
pub const SECP256K1_ORDER: U256 = U256([
    0xBFD25E8CD0364141,
    0xBAAEDCE6AF48A03B,
    0xFFFFFFFFFFFFFFFE,
    0xFFFFFFFFFFFFFFFF,
]);
