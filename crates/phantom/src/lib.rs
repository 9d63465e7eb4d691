//! # spectre-phantom
//!
//! Differential testing of the EVM across fork pairs: a strategy-driven
//! bytecode generator, a cross-fork comparison engine with an
//! expected-divergence filter, and a delta-debugging minimizer for the
//! findings.
//!
//! Candidates are independent (each runs against its own throwaway world
//! state), so a campaign can be sharded across threads freely; generator
//! output depends only on `(seed, index)` and never on who consumes it.

pub mod executor;
pub mod generator;
pub mod minimizer;

pub use executor::{
    compare_forks, CandidateOutcome, DifferentialExecutor, DifferentialResult, Divergence,
    DivergenceKind, ExpectedDivergenceRule, EXPECTED_DIVERGENCE_RULES,
};
pub use generator::{BytecodeGenerator, GeneratedBytecode, GeneratorStrategy};
pub use minimizer::{CustomMinimizer, DeltaDebugger, MinimizationResult};
