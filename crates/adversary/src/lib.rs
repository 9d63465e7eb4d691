//! # spectre-adversary
//!
//! EIP-targeted test-vector generation. A small catalog captures what
//! each supported EIP changed; six strategies turn an entry into
//! adversarial test cases (boundary substitution, opcode interaction,
//! call-context wrapping, gas bracketing, fork-boundary pairs and
//! stack-depth probes); suites serialize to the toolkit's native JSON
//! and to an Ethereum-ecosystem-compatible state-test layout.

pub mod catalog;
pub mod generator;
pub mod strategies;
pub mod suite;

pub use catalog::{boundary_values, get_eip, known_eips, EipSpec, OpcodeChange, OpcodeSpec};
pub use generator::TestGenerator;
pub use strategies::{all_strategies, StrategyKind, TestCase, TestStrategy};
pub use suite::TestSuite;
