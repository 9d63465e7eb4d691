//! # spectre-mutant
//!
//! Mutation operators for gauging test-suite strength: each operator
//! scans source text and yields candidate defects (flipped operators,
//! off-by-one literals, perturbed gas and boundary constants). Driving a
//! test command against applied mutants is a separate concern and lives
//! outside this crate.

pub mod operators;

pub use operators::{
    all_operators, get_operator, Mutation, MutationKind, MutationOperator,
};
