//! # spectre-vm
//!
//! A reference EVM for security tooling: byte-exact execution of EVM
//! bytecode under the Frontier, Homestead and Shanghai rule sets.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           VM                                │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │  CallFrame  │  │   Memory    │  │       Stack         │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! │                                                             │
//! │  ┌─────────────┐  ┌──────────────┐  ┌────────────────────┐  │
//! │  │  Substate   │  │ GasSchedule  │  │   Environment      │  │
//! │  └─────────────┘  └──────────────┘  └────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        WorldState                           │
//! │          (account map + journal of reversible writes)       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A single interpreter serves all three forks: the constructor picks a
//! 256-entry dispatch table (the opcode set) and a [`gas_schedule::GasSchedule`]
//! (costs plus rule flags) for the requested fork, and every fork-sensitive
//! decision flows through those two values.
//!
//! There is deliberately no trie, no networking and no precompile
//! emulation; state is a plain in-memory account map so that executions
//! are cheap to set up, compare and throw away.

pub mod account;
pub mod call_frame;
pub mod constants;
pub mod db;
pub mod environment;
pub mod errors;
pub mod execution_handlers;
pub mod gas_cost;
pub mod gas_schedule;
pub mod memory;
pub mod opcode_handlers;
pub mod opcodes;
pub mod signature;
pub mod utils;
pub mod vm;

pub use account::Account;
pub use db::WorldState;
pub use environment::Environment;
pub use errors::{ExceptionalHalt, ExecutionReport, TxResult, VMError};
pub use opcodes::Opcode;
pub use vm::{apply_block, apply_transaction, Substate, VM};
