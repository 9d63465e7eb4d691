use rustc_hash::FxHashMap;
use spectre_common::{Address, Fork, H256, U256};

/// Block-level context, immutable for the duration of a transaction.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Sender of the outer transaction; what ORIGIN pushes.
    pub origin: Address,
    pub gas_price: u64,
    pub block_number: U256,
    pub timestamp: U256,
    pub coinbase: Address,
    pub difficulty: U256,
    pub block_gas_limit: u64,
    pub base_fee: U256,
    pub chain_id: U256,
    /// Hashes served by BLOCKHASH, keyed by block number.
    pub block_hashes: FxHashMap<u64, H256>,
    pub fork: Fork,
}

impl Default for Environment {
    fn default() -> Self {
        Environment {
            origin: Address::zero(),
            gas_price: 0,
            block_number: U256::one(),
            timestamp: U256::one(),
            coinbase: Address::zero(),
            difficulty: U256::one(),
            block_gas_limit: 30_000_000,
            base_fee: U256::zero(),
            chain_id: U256::one(),
            block_hashes: FxHashMap::default(),
            fork: Fork::default(),
        }
    }
}

impl Environment {
    pub fn for_fork(fork: Fork) -> Self {
        Environment {
            fork,
            ..Default::default()
        }
    }
}
