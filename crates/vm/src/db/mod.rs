//! World state: the account map plus a journal of reversible mutations.
//!
//! Every sub-call and create takes a [`Snapshot`] (a journal position) on
//! entry. Reverting replays journal entries in reverse back to that
//! position, restoring byte-exact prior state; committing is free because
//! entries stay in place for any enclosing snapshot to unwind later. The
//! journal is cleared once per top-level transaction.

use crate::account::Account;
use bytes::Bytes;
use rustc_hash::FxHashMap;
use spectre_common::{Address, U256};

/// Failures of primitive state mutations. Callers are expected to
/// pre-check balances, so surfacing one of these halts the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("balance overflow")]
    BalanceOverflow,
    #[error("nonce overflow")]
    NonceOverflow,
}

/// A position in the journal; snapshots compose to any depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Snapshot(usize);

#[derive(Debug, Clone)]
enum JournalEntry {
    AccountCreated {
        address: Address,
    },
    BalanceChange {
        address: Address,
        prev: U256,
    },
    NonceChange {
        address: Address,
        prev: u64,
    },
    CodeChange {
        address: Address,
        prev: Bytes,
    },
    StorageChange {
        address: Address,
        key: U256,
        /// `None` means the key was absent (i.e. zero).
        prev: Option<U256>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct WorldState {
    accounts: FxHashMap<Address, Account>,
    journal: Vec<JournalEntry>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install an account without journaling; used to build pre-state.
    pub fn insert_account(&mut self, address: Address, account: Account) {
        self.accounts.insert(address, account);
    }

    pub fn has_account(&self, address: Address) -> bool {
        self.accounts.contains_key(&address)
    }

    /// True when the account is absent or empty; both read identically.
    pub fn is_empty(&self, address: Address) -> bool {
        self.accounts
            .get(&address)
            .map(Account::is_empty)
            .unwrap_or(true)
    }

    pub fn get_account(&self, address: Address) -> Option<&Account> {
        self.accounts.get(&address)
    }

    pub fn balance_of(&self, address: Address) -> U256 {
        self.accounts
            .get(&address)
            .map(|account| account.balance)
            .unwrap_or_default()
    }

    pub fn nonce_of(&self, address: Address) -> u64 {
        self.accounts
            .get(&address)
            .map(|account| account.nonce)
            .unwrap_or_default()
    }

    pub fn code_of(&self, address: Address) -> Bytes {
        self.accounts
            .get(&address)
            .map(|account| account.code.clone())
            .unwrap_or_default()
    }

    pub fn sload(&self, address: Address, key: U256) -> U256 {
        self.accounts
            .get(&address)
            .map(|account| account.storage_value(key))
            .unwrap_or_default()
    }

    /// Iterate accounts for post-state comparison.
    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &Account)> {
        self.accounts.iter()
    }

    // -- journaled mutations --------------------------------------------

    fn touch(&mut self, address: Address) -> &mut Account {
        if !self.accounts.contains_key(&address) {
            self.accounts.insert(address, Account::default());
            self.journal.push(JournalEntry::AccountCreated { address });
        }
        // Entry guaranteed present by the branch above.
        self.accounts.entry(address).or_default()
    }

    pub fn add_balance(&mut self, address: Address, amount: U256) -> Result<(), StateError> {
        let account = self.touch(address);
        let prev = account.balance;
        account.balance = prev
            .checked_add(amount)
            .ok_or(StateError::BalanceOverflow)?;
        self.journal.push(JournalEntry::BalanceChange { address, prev });
        Ok(())
    }

    pub fn sub_balance(&mut self, address: Address, amount: U256) -> Result<(), StateError> {
        let account = self.touch(address);
        let prev = account.balance;
        account.balance = prev
            .checked_sub(amount)
            .ok_or(StateError::InsufficientBalance)?;
        self.journal.push(JournalEntry::BalanceChange { address, prev });
        Ok(())
    }

    /// Move `amount` from one account to another. The caller checks the
    /// sender balance first; failure here still leaves the journal
    /// consistent.
    pub fn transfer(
        &mut self,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), StateError> {
        if amount.is_zero() {
            return Ok(());
        }
        self.sub_balance(from, amount)?;
        self.add_balance(to, amount)
    }

    pub fn set_nonce(&mut self, address: Address, nonce: u64) {
        let account = self.touch(address);
        let prev = account.nonce;
        account.nonce = nonce;
        self.journal.push(JournalEntry::NonceChange { address, prev });
    }

    pub fn increment_nonce(&mut self, address: Address) -> Result<(), StateError> {
        let next = self
            .nonce_of(address)
            .checked_add(1)
            .ok_or(StateError::NonceOverflow)?;
        self.set_nonce(address, next);
        Ok(())
    }

    pub fn set_code(&mut self, address: Address, code: Bytes) {
        let account = self.touch(address);
        let prev = std::mem::replace(&mut account.code, code);
        self.journal.push(JournalEntry::CodeChange { address, prev });
    }

    pub fn sstore(&mut self, address: Address, key: U256, value: U256) {
        let account = self.touch(address);
        let prev = if value.is_zero() {
            account.storage.remove(&key)
        } else {
            account.storage.insert(key, value)
        };
        self.journal
            .push(JournalEntry::StorageChange { address, key, prev });
    }

    /// Drop an account entirely (self-destruct sweep at transaction end).
    /// Not journaled: the sweep runs after every snapshot has resolved.
    pub fn remove_account(&mut self, address: Address) {
        self.accounts.remove(&address);
    }

    // -- snapshots ------------------------------------------------------

    pub fn snapshot(&self) -> Snapshot {
        Snapshot(self.journal.len())
    }

    /// Undo every mutation recorded since `snapshot`.
    pub fn revert_to(&mut self, snapshot: Snapshot) {
        while self.journal.len() > snapshot.0 {
            let Some(entry) = self.journal.pop() else {
                break;
            };
            match entry {
                JournalEntry::AccountCreated { address } => {
                    self.accounts.remove(&address);
                }
                JournalEntry::BalanceChange { address, prev } => {
                    if let Some(account) = self.accounts.get_mut(&address) {
                        account.balance = prev;
                    }
                }
                JournalEntry::NonceChange { address, prev } => {
                    if let Some(account) = self.accounts.get_mut(&address) {
                        account.nonce = prev;
                    }
                }
                JournalEntry::CodeChange { address, prev } => {
                    if let Some(account) = self.accounts.get_mut(&address) {
                        account.code = prev;
                    }
                }
                JournalEntry::StorageChange { address, key, prev } => {
                    if let Some(account) = self.accounts.get_mut(&address) {
                        match prev {
                            Some(value) => {
                                account.storage.insert(key, value);
                            }
                            None => {
                                account.storage.remove(&key);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Make the mutations since `snapshot` visible to the parent scope.
    /// Entries stay journaled so an enclosing revert can still undo them.
    pub fn commit(&mut self, _snapshot: Snapshot) {}

    /// Forget all journal entries; called once per finished transaction.
    pub fn clear_journal(&mut self) {
        self.journal.clear();
    }
}
