use bytes::Bytes;
use rustc_hash::FxHashMap;
use spectre_common::U256;

/// An account in the world state.
///
/// Code is held inline; there is no code-hash indirection and no storage
/// trie. A storage value of zero is indistinguishable from an absent key,
/// so zero writes remove the entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    pub nonce: u64,
    pub balance: U256,
    pub code: Bytes,
    pub storage: FxHashMap<U256, U256>,
}

impl Account {
    pub fn with_balance(balance: U256) -> Self {
        Account {
            balance,
            ..Default::default()
        }
    }

    pub fn with_code(code: Bytes) -> Self {
        Account {
            code,
            ..Default::default()
        }
    }

    pub fn has_code(&self) -> bool {
        !self.code.is_empty()
    }

    pub fn has_nonce(&self) -> bool {
        self.nonce != 0
    }

    /// An empty account is equivalent to a non-existent one for reads.
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance.is_zero() && self.code.is_empty()
    }

    /// CREATE lands on this address only if nothing meaningful lives here.
    pub fn create_would_collide(&self) -> bool {
        self.has_code() || self.has_nonce()
    }

    pub fn storage_value(&self, key: U256) -> U256 {
        self.storage.get(&key).copied().unwrap_or_default()
    }
}
