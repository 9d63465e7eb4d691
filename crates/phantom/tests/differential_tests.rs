//! End-to-end differential harness behavior.

use bytes::Bytes;
use spectre_common::Fork;
use spectre_phantom::{
    compare_forks, BytecodeGenerator, DeltaDebugger, DifferentialExecutor, DivergenceKind,
    GeneratedBytecode, GeneratorStrategy,
};

#[test]
fn push0_diverges_across_the_shanghai_boundary() {
    let divergence = compare_forks(Fork::Frontier, Fork::Shanghai, vec![0x5F, 0x00])
        .expect("execution")
        .expect("divergence");

    assert_eq!(divergence.kind, DivergenceKind::SuccessMismatch);
    assert!(!divergence.trace_a.success);
    assert!(divergence.trace_b.success);
    // The PUSH0 activation rule explains it.
    assert!(divergence.is_expected());
    assert_eq!(divergence.expected_by().map(|rule| rule.name), Some("push0-activation"));
}

#[test]
fn push0_agrees_between_frontier_and_homestead() {
    let divergence = compare_forks(Fork::Frontier, Fork::Homestead, vec![0x5F, 0x00])
        .expect("execution");
    // Both fault identically: no divergence at all.
    assert!(divergence.is_none());
}

#[test]
fn plain_arithmetic_never_diverges() {
    // PUSH1 1; PUSH32 max; ADD; STOP
    let mut code = vec![0x60, 0x01, 0x7F];
    code.extend_from_slice(&[0xFF; 32]);
    code.extend_from_slice(&[0x01, 0x00]);

    for (fork_a, fork_b) in [
        (Fork::Frontier, Fork::Homestead),
        (Fork::Homestead, Fork::Shanghai),
        (Fork::Frontier, Fork::Shanghai),
    ] {
        let divergence = compare_forks(fork_a, fork_b, code.clone()).expect("execution");
        assert!(divergence.is_none(), "{fork_a:?} vs {fork_b:?} diverged");
    }
}

#[test]
fn exp_gas_divergence_is_expected_at_homestead() {
    // PUSH2 0x0100; PUSH1 2; EXP; STOP — exponent byte pricing differs.
    let code = vec![0x61, 0x01, 0x00, 0x60, 0x02, 0x0A, 0x00];
    let divergence = compare_forks(Fork::Frontier, Fork::Homestead, code)
        .expect("execution")
        .expect("divergence");

    assert_eq!(divergence.kind, DivergenceKind::GasMismatch);
    assert!(divergence.is_expected());
    assert_eq!(divergence.expected_by().map(|rule| rule.name), Some("exp-repricing"));
}

#[test]
fn campaign_counts_expected_separately() {
    let executor = DifferentialExecutor::new(Fork::Frontier, Fork::Shanghai);
    let candidates = vec![
        GeneratedBytecode::raw(Bytes::from_static(&[0x5F, 0x00])), // expected divergence
        GeneratedBytecode::raw(Bytes::from_static(&[0x60, 0x01, 0x00])), // agreement
    ];

    let result = executor
        .run(candidates.into_iter(), None)
        .expect("campaign");
    assert_eq!(result.total_executions, 2);
    assert_eq!(result.expected_divergences, 1);
    assert_eq!(result.unexpected_divergences, 0);
    assert!(result.divergences.is_empty());
}

#[test]
fn grammar_campaign_between_identical_forks_is_silent() {
    // A fork compared with itself can never diverge; this exercises the
    // whole pipeline end to end.
    let executor = DifferentialExecutor::new(Fork::Shanghai, Fork::Shanghai);
    let generator = BytecodeGenerator::new(0xC0FFEE);

    let result = executor
        .run(generator.generate(GeneratorStrategy::Grammar, 64), None)
        .expect("campaign");
    assert_eq!(result.total_executions, 64);
    assert_eq!(result.expected_divergences, 0);
    assert_eq!(result.unexpected_divergences, 0);
}

#[test]
fn campaigns_are_reproducible() {
    let executor = DifferentialExecutor::new(Fork::Frontier, Fork::Shanghai);
    let run_once = || {
        let generator = BytecodeGenerator::new(1234);
        let result = executor
            .run(generator.generate(GeneratorStrategy::Random, 128), None)
            .expect("campaign");
        (
            result.total_executions,
            result.expected_divergences,
            result.unexpected_divergences,
        )
    };
    assert_eq!(run_once(), run_once());
}

#[test]
fn minimizer_preserves_the_divergence_category() {
    // Bury a PUSH0 in a longer program; minimization must keep the
    // success-mismatch alive and never grow the input.
    let mut code = vec![0x60, 0x01, 0x60, 0x02, 0x01, 0x50]; // harmless prefix
    code.push(0x5F); // PUSH0
    code.extend_from_slice(&[0x60, 0x03, 0x60, 0x04, 0x01, 0x50, 0x00]); // harmless tail

    let executor = DifferentialExecutor::new(Fork::Frontier, Fork::Shanghai);
    let divergence = executor
        .execute_differential(&GeneratedBytecode::raw(code.clone()))
        .expect("execution")
        .expect("divergence");
    assert_eq!(divergence.kind, DivergenceKind::SuccessMismatch);

    let debugger = DeltaDebugger::new(&executor);
    let result = debugger.minimize(&code, divergence.kind);

    assert!(result.minimized.len() <= code.len());
    // The minimized program still diverges the same way.
    let still = executor
        .execute_differential(&GeneratedBytecode::raw(result.minimized.clone()))
        .expect("execution")
        .expect("still diverges");
    assert_eq!(still.kind, DivergenceKind::SuccessMismatch);
    // And it still contains the culprit byte.
    assert!(result.minimized.contains(&0x5F));
}

#[test]
fn minimizer_reduces_padded_divergence_to_the_core() {
    // A long run of JUMPDESTs around a PUSH0: almost everything should
    // be stripped away.
    let mut code = vec![0x5B; 40];
    code.push(0x5F);
    code.extend_from_slice(&[0x5B; 40]);

    let executor = DifferentialExecutor::new(Fork::Frontier, Fork::Shanghai);
    let debugger = DeltaDebugger::new(&executor);
    let result = debugger.minimize(&code, DivergenceKind::SuccessMismatch);

    assert!(result.minimized.len() < code.len() / 4);
    assert!(result.minimized.contains(&0x5F));
}

#[test]
fn post_state_divergence_is_detected() {
    // Storage writes that differ only in surviving gas would agree; use
    // CREATE's fork-dependent deposit semantics to leave different
    // post-states (Frontier deploys an account, Homestead does not).
    // Deployer: initcode returns 1000 zero bytes the child cannot pay
    // to deposit.
    let code = vec![
        0x65, 0x61, 0x03, 0xE8, 0x60, 0x00, 0xF3, // PUSH6 initcode
        0x60, 0x00, 0x52, // MSTORE
        0x60, 0x06, 0x60, 0x1A, 0x60, 0x00, 0xF0, // CREATE
        0x00,
    ];
    let executor =
        DifferentialExecutor::new(Fork::Frontier, Fork::Homestead).with_gas_limit(150_000);
    let divergence = executor
        .execute_differential(&GeneratedBytecode::raw(code))
        .expect("execution")
        .expect("divergence");

    // Gas diverges first (classification order), and the create rule
    // marks it expected.
    assert!(matches!(
        divergence.kind,
        DivergenceKind::GasMismatch | DivergenceKind::StateMismatch
    ));
    assert!(divergence.is_expected());
}

#[test]
fn timeouts_are_not_findings() {
    use std::time::Duration;

    let executor = DifferentialExecutor::new(Fork::Frontier, Fork::Shanghai)
        .with_time_budget(Duration::from_nanos(1));
    let candidates = vec![GeneratedBytecode::raw(Bytes::from_static(&[0x5F, 0x00]))];

    let result = executor
        .run(candidates.into_iter(), None)
        .expect("campaign");
    assert_eq!(result.timeouts, 1);
    assert_eq!(result.expected_divergences, 0);
    assert!(result.divergences.is_empty());
}
