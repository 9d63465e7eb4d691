//! Control flow, memory and fork-dispatch behavior.

use bytes::Bytes;
use spectre_common::{Address, Fork, Transaction, U256};
use spectre_vm::{
    Account, Environment, ExceptionalHalt, ExecutionReport, VMError, WorldState, VM,
};

fn sender() -> Address {
    Address::from_low_u64_be(1)
}

fn contract() -> Address {
    Address::from_low_u64_be(2)
}

fn run_code(fork: Fork, code: &[u8], gas_limit: u64) -> ExecutionReport {
    let mut state = WorldState::new();
    state.insert_account(sender(), Account::with_balance(U256::exp10(18)));
    state.insert_account(contract(), Account::with_code(Bytes::copy_from_slice(code)));

    let env = Environment::for_fork(fork);
    let mut tx = Transaction::call(sender(), contract(), Bytes::new(), gas_limit);
    tx.gas_price = 0;

    let mut vm = VM::new(env, &mut state, tx);
    vm.execute_message().expect("message execution")
}

#[test]
fn push0_faults_before_shanghai_and_costs_two_after() {
    let code = [0x5F, 0x00];

    let frontier = run_code(Fork::Frontier, &code, 1_000_000);
    assert!(!frontier.is_success());
    assert_eq!(
        frontier.error(),
        Some(&VMError::ExceptionalHalt(ExceptionalHalt::InvalidOpcode))
    );
    // All gas consumed.
    assert_eq!(frontier.gas_used, 1_000_000);
    assert_eq!(frontier.gas_remaining, 0);

    let homestead = run_code(Fork::Homestead, &code, 1_000_000);
    assert!(!homestead.is_success());

    let shanghai = run_code(Fork::Shanghai, &code, 1_000_000);
    assert!(shanghai.is_success());
    assert_eq!(shanghai.gas_used, 2);
    assert!(shanghai.output.is_empty());
}

#[test]
fn implicit_stop_past_end_of_code() {
    // A single PUSH1 with its immediate; execution falls off the end.
    let report = run_code(Fork::Shanghai, &[0x60, 0x01], 100_000);
    assert!(report.is_success());
    assert_eq!(report.gas_used, 3);
}

#[test]
fn empty_code_succeeds_for_free() {
    let report = run_code(Fork::Shanghai, &[], 100_000);
    assert!(report.is_success());
    assert_eq!(report.gas_used, 0);
}

#[test]
fn undefined_opcode_consumes_all_gas() {
    let report = run_code(Fork::Shanghai, &[0x0C], 50_000);
    assert!(!report.is_success());
    assert_eq!(report.gas_used, 50_000);
}

#[test]
fn invalid_opcode_0xfe_consumes_all_gas() {
    let report = run_code(Fork::Shanghai, &[0xFE], 50_000);
    assert!(!report.is_success());
    assert_eq!(report.gas_used, 50_000);
}

#[test]
fn stack_underflow_is_a_distinct_fault() {
    // Bare ADD with an empty stack.
    let report = run_code(Fork::Shanghai, &[0x01], 10_000);
    assert_eq!(
        report.error(),
        Some(&VMError::ExceptionalHalt(ExceptionalHalt::StackUnderflow))
    );
    assert_eq!(report.gas_used, 10_000);
}

#[test]
fn jump_to_jumpdest_succeeds() {
    // PUSH1 4; JUMP; INVALID; JUMPDEST; STOP
    let code = [0x60, 0x04, 0x56, 0xFE, 0x5B, 0x00];
    let report = run_code(Fork::Shanghai, &code, 100_000);
    assert!(report.is_success());
    // PUSH + JUMP + JUMPDEST = 3 + 8 + 1
    assert_eq!(report.gas_used, 12);
}

#[test]
fn jump_into_push_immediate_faults() {
    // PUSH1 4; JUMP; PUSH1 0x5B; STOP — the 0x5B at offset 4 is data.
    let code = [0x60, 0x04, 0x56, 0x60, 0x5B, 0x00];
    let report = run_code(Fork::Shanghai, &code, 100_000);
    assert_eq!(
        report.error(),
        Some(&VMError::ExceptionalHalt(ExceptionalHalt::InvalidJump))
    );
}

#[test]
fn jump_out_of_bounds_faults() {
    let code = [0x60, 0x7F, 0x56];
    let report = run_code(Fork::Shanghai, &code, 100_000);
    assert_eq!(
        report.error(),
        Some(&VMError::ExceptionalHalt(ExceptionalHalt::InvalidJump))
    );
}

#[test]
fn jumpi_with_zero_condition_falls_through() {
    // PUSH1 0 (condition); PUSH1 6 (target); JUMPI; STOP; ...; JUMPDEST; INVALID
    let code = [0x60, 0x00, 0x60, 0x06, 0x57, 0x00, 0x5B, 0xFE];
    let report = run_code(Fork::Shanghai, &code, 100_000);
    assert!(report.is_success());
    assert_eq!(report.gas_used, 3 + 3 + 10);
}

#[test]
fn jumpi_with_nonzero_condition_jumps() {
    // PUSH1 1; PUSH1 6; JUMPI; INVALID; ...; JUMPDEST; STOP
    let code = [0x60, 0x01, 0x60, 0x06, 0x57, 0xFE, 0x5B, 0x00];
    let report = run_code(Fork::Shanghai, &code, 100_000);
    assert!(report.is_success());
    assert_eq!(report.gas_used, 3 + 3 + 10 + 1);
}

#[test]
fn memory_expansion_cost_is_quadratic() {
    // MSTORE at offset 0 (32 bytes), then at offset 992 (1024 bytes).
    // The second expansion costs cost(1024) - cost(32) = 95.
    let code = [
        0x60, 0x00, 0x60, 0x00, 0x52, // PUSH1 0; PUSH1 0; MSTORE
        0x60, 0x00, 0x61, 0x03, 0xE0, 0x52, // PUSH1 0; PUSH2 992; MSTORE
        0x00,
    ];
    let report = run_code(Fork::Shanghai, &code, 100_000);
    assert!(report.is_success());
    // 3+3 + (3+3) + 3+3 + (3+95)
    assert_eq!(report.gas_used, 116);
}

#[test]
fn mstore_mload_round_trip_with_zero_fill() {
    // Store a marker at 0, read 32 bytes at 16: the tail must be zeros.
    let code = [
        0x7F, // PUSH32 0xAA..AA
        0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA,
        0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA,
        0xAA, 0xAA, //
        0x60, 0x00, 0x52, // MSTORE at 0
        0x60, 0x20, 0x60, 0x10, 0xF3, // RETURN mem[16..48]
    ];
    let report = run_code(Fork::Shanghai, &code, 100_000);
    assert!(report.is_success());
    assert_eq!(&report.output[..16], &[0xAA; 16]);
    assert_eq!(&report.output[16..], &[0x00; 16]);
}

#[test]
fn msize_tracks_word_aligned_growth() {
    // MSTORE8 at offset 0 grows memory to one word.
    let code = [
        0x60, 0x01, 0x60, 0x00, 0x53, // MSTORE8
        0x59, // MSIZE
        0x60, 0x00, 0x52, // MSTORE result
        0x60, 0x20, 0x60, 0x00, 0xF3,
    ];
    let report = run_code(Fork::Shanghai, &code, 100_000);
    assert_eq!(U256::from_big_endian(&report.output), U256::from(32));
}

#[test]
fn calldata_reads_zero_pad() {
    // CALLDATALOAD at offset 0 with 4-byte calldata.
    let code = [0x60, 0x00, 0x35, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3];

    let mut state = WorldState::new();
    state.insert_account(sender(), Account::with_balance(U256::exp10(18)));
    state.insert_account(contract(), Account::with_code(Bytes::copy_from_slice(&code)));

    let env = Environment::for_fork(Fork::Shanghai);
    let mut tx = Transaction::call(
        sender(),
        contract(),
        Bytes::from_static(&[0xDE, 0xAD, 0xBE, 0xEF]),
        100_000,
    );
    tx.gas_price = 0;

    let report = VM::new(env, &mut state, tx)
        .execute_message()
        .expect("message execution");

    let mut expected = [0u8; 32];
    expected[..4].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
    assert_eq!(report.output.as_ref(), &expected);
}

#[test]
fn revert_keeps_unused_gas_and_returns_payload() {
    // MSTORE a marker, REVERT with 4 bytes of it.
    let code = [
        0x7F, 0x08, 0xC3, 0x79, 0xA0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, //
        0x60, 0x00, 0x52, // MSTORE
        0x60, 0x04, 0x60, 0x00, 0xFD, // REVERT mem[0..4]
    ];
    let report = run_code(Fork::Shanghai, &code, 100_000);
    assert!(!report.is_success());
    assert!(report.error().map(VMError::is_revert_opcode).unwrap_or(false));
    assert_eq!(report.output.as_ref(), &[0x08, 0xC3, 0x79, 0xA0]);
    // Unlike an exceptional halt, gas is only charged for work done.
    assert!(report.gas_remaining > 0);
    assert!(report.gas_used < 100_000);
}

#[test]
fn gas_invariant_holds_across_outcomes() {
    let programs: [&[u8]; 4] = [
        &[0x00],                         // immediate stop
        &[0x5F, 0x00],                   // fork-dependent
        &[0x01],                         // underflow
        &[0x60, 0x00, 0x60, 0x00, 0xFD], // revert
    ];
    for fork in Fork::ALL {
        for code in programs {
            let report = run_code(fork, code, 77_777);
            assert_eq!(
                report.gas_used + report.gas_remaining,
                77_777 - report.gas_refunded,
                "invariant violated for {code:?} under {fork:?}"
            );
        }
    }
}
