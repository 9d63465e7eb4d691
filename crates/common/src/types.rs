use crate::{Address, U256};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Destination of a transaction: a message call to an existing account or
/// the creation of a new contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxKind {
    Call(Address),
    Create,
}

impl TxKind {
    pub fn is_create(&self) -> bool {
        matches!(self, TxKind::Create)
    }
}

/// Optional secp256k1 signature components carried by a transaction.
///
/// Recovery itself is performed by an external collaborator; the VM only
/// enforces structural rules (the Homestead low-s bound) on these values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub v: u64,
    pub r: U256,
    pub s: U256,
}

/// An external transaction presented to the state transition function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: Address,
    pub to: TxKind,
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: u64,
    pub gas_price: u64,
    pub nonce: u64,
    pub signature: Option<Signature>,
}

impl Transaction {
    /// A message call with the most common defaults filled in.
    pub fn call(sender: Address, to: Address, data: Bytes, gas_limit: u64) -> Self {
        Transaction {
            sender,
            to: TxKind::Call(to),
            value: U256::zero(),
            data,
            gas_limit,
            gas_price: 1,
            nonce: 0,
            signature: None,
        }
    }

    /// A contract creation; `data` is the initcode.
    pub fn create(sender: Address, initcode: Bytes, gas_limit: u64) -> Self {
        Transaction {
            sender,
            to: TxKind::Create,
            value: U256::zero(),
            data: initcode,
            gas_limit,
            gas_price: 1,
            nonce: 0,
            signature: None,
        }
    }

    pub fn is_create(&self) -> bool {
        self.to.is_create()
    }
}

/// A log record emitted by LOG0..LOG4.
///
/// Logs are buffered in the emitting frame and discarded if that frame or
/// any ancestor reverts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<U256>,
    pub data: Bytes,
}
