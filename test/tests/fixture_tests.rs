//! The adversary's generated fixtures, replayed against the interpreter.
//!
//! Where a strategy commits to a hard expectation (fork boundaries, gas
//! brackets, stack-depth limits, call contexts), the interpreter must
//! agree with it; the open-ended strategies are run as smoke tests.

use bytes::Bytes;
use spectre_adversary::{StrategyKind, TestCase, TestGenerator};
use spectre_common::{Address, Fork, Transaction, U256};
use spectre_vm::{apply_transaction, Account, Environment, ExecutionReport, WorldState};

fn sender() -> Address {
    Address::from_low_u64_be(1)
}

fn contract() -> Address {
    Address::from_low_u64_be(2)
}

/// Install the fixture pre-state and run the case as a transaction.
fn run_case(case: &TestCase, fork: Fork) -> ExecutionReport {
    let mut state = WorldState::new();
    state.insert_account(sender(), Account::with_balance(U256::exp10(18)));
    state.insert_account(contract(), Account::with_code(case.bytecode.clone()));
    for (address, code) in &case.extra_accounts {
        state.insert_account(*address, Account::with_code(code.clone()));
    }

    let env = Environment::for_fork(fork);
    let mut tx = Transaction::call(sender(), contract(), case.calldata.clone(), case.gas_limit);
    tx.gas_price = 0;

    apply_transaction(&mut state, &env, &tx).expect("fixture transactions are always valid")
}

/// Which fork a case runs under: fork-boundary cases pair with the
/// boundary itself; everything else runs at the introducing fork.
fn fork_for_case(case: &TestCase, introduced_in: Fork) -> Fork {
    if case.name.starts_with("fork_pre_") {
        introduced_in.predecessor().unwrap_or(introduced_in)
    } else {
        introduced_in
    }
}

#[test]
fn fork_boundary_cases_match_the_interpreter() {
    let generator = TestGenerator::new();
    for eip in spectre_adversary::known_eips() {
        let suite = generator.generate_for_eip(eip.number, Some(&[StrategyKind::ForkBoundary]));
        for case in &suite.test_cases {
            let fork = fork_for_case(case, eip.introduced_in);
            let report = run_case(case, fork);
            assert_eq!(
                report.is_success(),
                case.expected_success,
                "{} under {fork:?}",
                case.name
            );
        }
    }
}

#[test]
fn gas_brackets_are_exact() {
    let generator = TestGenerator::new();
    for eip in spectre_adversary::known_eips() {
        let suite = generator.generate_for_eip(eip.number, Some(&[StrategyKind::GasExhaustion]));
        for case in &suite.test_cases {
            let report = run_case(case, eip.introduced_in);
            assert_eq!(
                report.is_success(),
                case.expected_success,
                "{}",
                case.name
            );
            if let Some(expected) = case.expected_gas_used {
                assert_eq!(report.gas_used, expected, "{}", case.name);
            }
        }
    }
}

#[test]
fn stack_depth_cases_match_the_interpreter() {
    let generator = TestGenerator::new();
    for eip in spectre_adversary::known_eips() {
        let suite = generator.generate_for_eip(eip.number, Some(&[StrategyKind::StackDepth]));
        for case in &suite.test_cases {
            let report = run_case(case, eip.introduced_in);
            assert_eq!(
                report.is_success(),
                case.expected_success,
                "{}",
                case.name
            );
        }
    }
}

#[test]
fn call_context_cases_match_the_interpreter() {
    let generator = TestGenerator::new();
    for eip in spectre_adversary::known_eips() {
        let suite = generator.generate_for_eip(eip.number, Some(&[StrategyKind::CallContext]));
        for case in &suite.test_cases {
            let report = run_case(case, eip.introduced_in);
            assert_eq!(
                report.is_success(),
                case.expected_success,
                "{} ({})",
                case.name,
                case.description
            );
        }
    }
}

#[test]
fn open_ended_strategies_execute_without_breaking_the_vm() {
    let generator = TestGenerator::new();
    for eip in spectre_adversary::known_eips() {
        let suite = generator.generate_for_eip(
            eip.number,
            Some(&[StrategyKind::Boundary, StrategyKind::OpcodeInteraction]),
        );
        for case in &suite.test_cases {
            // Success depends on operand magnitudes; what matters is a
            // well-formed report either way.
            let report = run_case(case, eip.introduced_in);
            assert_eq!(
                report.gas_used + report.gas_remaining,
                case.gas_limit - report.gas_refunded,
                "{}",
                case.name
            );
        }
    }
}

#[test]
fn native_fixture_round_trips_through_json() {
    let generator = TestGenerator::new();
    let suite = generator.generate_for_eip(3855, None);
    let rendered = suite.to_native_string();

    let parsed: serde_json::Value = serde_json::from_str(&rendered).expect("valid JSON");
    assert_eq!(parsed["eip_number"], 3855);
    let cases = parsed["test_cases"].as_array().expect("array");
    assert_eq!(cases.len(), suite.test_cases.len());

    // Bytecode decodes back to the generated program.
    let first_hex = cases[0]["bytecode"].as_str().expect("hex string");
    let decoded = hex::decode(first_hex).expect("decodable");
    assert_eq!(Bytes::from(decoded), suite.test_cases[0].bytecode);
}

#[test]
fn ecosystem_fixture_is_replayable() {
    // Pull one generated state test back out of the JSON and run the
    // program it describes.
    let generator = TestGenerator::new();
    let suite = generator.generate_for_eip(3855, Some(&[StrategyKind::GasExhaustion]));
    let fixture = suite.to_ecosystem_json();

    let (name, test) = fixture
        .as_object()
        .expect("object")
        .iter()
        .find(|(key, _)| key.starts_with("EIP3855_gas_exact"))
        .expect("exact-gas case present");

    let code_hex = test["pre"]["0x0000000000000000000000000000000000000002"]["code"]
        .as_str()
        .expect("code");
    let code = hex::decode(code_hex.trim_start_matches("0x")).expect("decodable");
    let gas_limit = u64::from_str_radix(
        test["transaction"]["gasLimit"]
            .as_str()
            .expect("gas limit")
            .trim_start_matches("0x"),
        16,
    )
    .expect("hex number");

    let mut state = WorldState::new();
    state.insert_account(sender(), Account::with_balance(U256::exp10(18)));
    state.insert_account(contract(), Account::with_code(code.into()));
    let mut tx = Transaction::call(sender(), contract(), Bytes::new(), gas_limit);
    tx.gas_price = 0;
    let report = apply_transaction(&mut state, &Environment::for_fork(Fork::Shanghai), &tx)
        .expect("valid tx");

    assert!(report.is_success(), "{name} failed");
    assert_eq!(report.gas_remaining, 0, "{name} left gas over");
}
