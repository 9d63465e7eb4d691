use crate::db::StateError;
use bytes::Bytes;
use spectre_common::{Address, Log};

/// Faults that terminate a frame exceptionally, consuming all of its
/// remaining gas. They bubble to the frame boundary and no further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ExceptionalHalt {
    #[error("out of gas")]
    OutOfGas,
    #[error("stack underflow")]
    StackUnderflow,
    #[error("stack overflow")]
    StackOverflow,
    #[error("invalid opcode")]
    InvalidOpcode,
    #[error("invalid jump destination")]
    InvalidJump,
    #[error("opcode not allowed in static context")]
    OpcodeNotAllowedInStaticContext,
    #[error("call depth limit reached")]
    CallDepthOverflow,
    #[error("memory access out of bounds")]
    OutOfBounds,
    #[error("contract address collision")]
    CreateCollision,
    #[error("value does not fit in a machine word")]
    VeryLargeNumber,
}

/// Transaction preamble rejections. A rejected transaction has no effect
/// on the world state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TxValidationError {
    #[error("nonce mismatch: account has {expected}, transaction has {actual}")]
    NonceMismatch { expected: u64, actual: u64 },
    #[error("insufficient funds for gas * price + value")]
    InsufficientFunds,
    #[error("intrinsic gas {required} exceeds gas limit {limit}")]
    IntrinsicGasTooLow { required: u64, limit: u64 },
    #[error("initcode size {size} exceeds maximum {max}")]
    InitcodeSizeExceeded { size: usize, max: usize },
    #[error("invalid signature")]
    InvalidSignature,
}

/// Invariant breaches. These indicate a bug in the interpreter itself and
/// are never mapped to a transaction outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InternalError {
    #[error("arithmetic overflow")]
    Overflow,
    #[error("arithmetic underflow")]
    Underflow,
    #[error("call frame stack exhausted")]
    MissingCallFrame,
    #[error("slice index out of range")]
    Slicing,
    #[error("numeric conversion failed")]
    TypeConversion,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VMError {
    #[error(transparent)]
    ExceptionalHalt(#[from] ExceptionalHalt),
    /// The REVERT opcode: state is rolled back but remaining gas is
    /// returned to the caller, unlike an exceptional halt.
    #[error("revert")]
    RevertOpcode,
    #[error(transparent)]
    TxValidation(#[from] TxValidationError),
    #[error(transparent)]
    Internal(#[from] InternalError),
    #[error(transparent)]
    State(#[from] StateError),
}

impl VMError {
    /// Internal errors abort execution entirely instead of being folded
    /// into a frame result.
    pub fn is_internal(&self) -> bool {
        matches!(self, VMError::Internal(_))
    }

    pub fn is_revert_opcode(&self) -> bool {
        matches!(self, VMError::RevertOpcode)
    }
}

/// Outcome of a single opcode step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeResult {
    Continue,
    Halt,
}

/// Outcome of a finished execution context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxResult {
    Success,
    Revert(VMError),
}

/// What a finished frame hands back to its parent.
#[derive(Debug, Clone)]
pub struct ContextResult {
    pub result: TxResult,
    pub gas_used: u64,
    pub output: Bytes,
}

impl ContextResult {
    pub fn is_success(&self) -> bool {
        matches!(self.result, TxResult::Success)
    }
}

/// Result of a whole transaction (or of a bare message execution).
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub result: TxResult,
    /// Gas the sender ultimately paid for (refund already deducted).
    pub gas_used: u64,
    /// Gas left unspent at the end of execution, before refund credit.
    pub gas_remaining: u64,
    pub gas_refunded: u64,
    pub output: Bytes,
    pub logs: Vec<Log>,
    pub created_address: Option<Address>,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        matches!(self.result, TxResult::Success)
    }

    /// The fault that ended execution, if any.
    pub fn error(&self) -> Option<&VMError> {
        match &self.result {
            TxResult::Success => None,
            TxResult::Revert(err) => Some(err),
        }
    }
}
