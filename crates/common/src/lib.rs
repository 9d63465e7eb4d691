//! Shared primitive types for the spectre toolkit.
//!
//! Everything that more than one crate needs lives here: the 256-bit word
//! and address types, the fork enumeration, transaction and log types, and
//! the keccak/address-derivation helpers.

pub mod fork;
pub mod serde_utils;
pub mod types;
pub mod utils;

pub use ethereum_types::{H160, H256, U256, U512};

/// A 20-byte account address.
pub type Address = H160;

pub use fork::Fork;
pub use types::{Log, Transaction, TxKind};
