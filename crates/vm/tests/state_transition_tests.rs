//! The full transaction path: validation, intrinsic gas, fees, refunds.

use bytes::Bytes;
use spectre_common::{utils::calculate_create_address, Address, Fork, Transaction, U256};
use spectre_vm::{
    apply_block, apply_transaction, errors::TxValidationError, Account, Environment, VMError,
    WorldState,
};

fn sender() -> Address {
    Address::from_low_u64_be(1)
}

fn receiver() -> Address {
    Address::from_low_u64_be(2)
}

fn coinbase() -> Address {
    Address::from_low_u64_be(0xFF)
}

fn funded_state() -> WorldState {
    let mut state = WorldState::new();
    state.insert_account(sender(), Account::with_balance(U256::exp10(18)));
    state
}

fn env(fork: Fork) -> Environment {
    let mut env = Environment::for_fork(fork);
    env.coinbase = coinbase();
    env
}

#[test]
fn plain_transfer_moves_value_and_pays_fees() {
    let mut state = funded_state();
    let mut tx = Transaction::call(sender(), receiver(), Bytes::new(), 21_000);
    tx.value = U256::from(1234);
    tx.gas_price = 2;

    let report = apply_transaction(&mut state, &env(Fork::Shanghai), &tx).expect("valid tx");
    assert!(report.is_success());
    assert_eq!(report.gas_used, 21_000);
    assert_eq!(report.gas_remaining, 0);

    assert_eq!(state.balance_of(receiver()), U256::from(1234));
    assert_eq!(state.balance_of(coinbase()), U256::from(21_000u64 * 2));
    assert_eq!(
        state.balance_of(sender()),
        U256::exp10(18) - U256::from(1234) - U256::from(21_000u64 * 2)
    );
    assert_eq!(state.nonce_of(sender()), 1);
}

#[test]
fn nonce_mismatch_rejects_without_effect() {
    let mut state = funded_state();
    let mut tx = Transaction::call(sender(), receiver(), Bytes::new(), 21_000);
    tx.nonce = 5;

    let before = state.balance_of(sender());
    let result = apply_transaction(&mut state, &env(Fork::Shanghai), &tx);
    assert!(matches!(
        result,
        Err(VMError::TxValidation(TxValidationError::NonceMismatch { .. }))
    ));
    assert_eq!(state.balance_of(sender()), before);
    assert_eq!(state.nonce_of(sender()), 0);
}

#[test]
fn insufficient_funds_rejects() {
    let mut state = WorldState::new();
    state.insert_account(sender(), Account::with_balance(U256::from(100)));

    let mut tx = Transaction::call(sender(), receiver(), Bytes::new(), 21_000);
    tx.gas_price = 1;

    let result = apply_transaction(&mut state, &env(Fork::Shanghai), &tx);
    assert!(matches!(
        result,
        Err(VMError::TxValidation(TxValidationError::InsufficientFunds))
    ));
}

#[test]
fn intrinsic_gas_covers_calldata_byte_classes() {
    let mut state = funded_state();
    // Two zero bytes (4 gas each) and one non-zero byte (16 gas).
    let tx = Transaction::call(
        sender(),
        receiver(),
        Bytes::from_static(&[0x00, 0x00, 0x01]),
        21_000 + 4 + 4 + 16,
    );
    let report = apply_transaction(&mut state, &env(Fork::Shanghai), &tx).expect("valid tx");
    assert!(report.is_success());
    assert_eq!(report.gas_used, 21_024);

    // One unit less is below the intrinsic requirement.
    let mut state = funded_state();
    let tx = Transaction::call(
        sender(),
        receiver(),
        Bytes::from_static(&[0x00, 0x00, 0x01]),
        21_023,
    );
    let result = apply_transaction(&mut state, &env(Fork::Shanghai), &tx);
    assert!(matches!(
        result,
        Err(VMError::TxValidation(TxValidationError::IntrinsicGasTooLow { .. }))
    ));
}

#[test]
fn creation_transaction_deploys_at_the_derived_address() {
    let mut state = funded_state();
    // Initcode: PUSH1 1; PUSH1 0; RETURN -> deploys a single zero byte.
    let tx = Transaction::create(
        sender(),
        Bytes::from_static(&[0x60, 0x01, 0x60, 0x00, 0xF3]),
        200_000,
    );

    let report = apply_transaction(&mut state, &env(Fork::Shanghai), &tx).expect("valid tx");
    assert!(report.is_success());

    let created = calculate_create_address(sender(), 0);
    assert_eq!(report.created_address, Some(created));
    assert_eq!(state.code_of(created).as_ref(), &[0x00]);
    // Intrinsic 21000 + 32000 creation + initcode words + execution.
    assert!(report.gas_used > 53_000);
}

#[test]
fn creation_intrinsic_gas_includes_shanghai_initcode_words() {
    // 33 bytes of initcode: 2 words.
    let initcode = Bytes::from(vec![0u8; 33]);
    let shanghai_floor = 21_000 + 33 * 4 + 32_000 + 2 * 2;

    let mut state = funded_state();
    let tx = Transaction::create(sender(), initcode.clone(), shanghai_floor - 1);
    assert!(apply_transaction(&mut state, &env(Fork::Shanghai), &tx).is_err());

    // Homestead has no initcode word cost, so the same limit clears.
    let mut state = funded_state();
    let tx = Transaction::create(sender(), initcode, shanghai_floor - 1);
    let report = apply_transaction(&mut state, &env(Fork::Homestead), &tx).expect("valid tx");
    // All-zero initcode halts immediately.
    assert!(report.is_success());
}

#[test]
fn oversized_initcode_is_rejected_only_in_shanghai() {
    let initcode = Bytes::from(vec![0u8; 49_153]);

    let mut state = funded_state();
    let tx = Transaction::create(sender(), initcode.clone(), 5_000_000);
    let result = apply_transaction(&mut state, &env(Fork::Shanghai), &tx);
    assert!(matches!(
        result,
        Err(VMError::TxValidation(
            TxValidationError::InitcodeSizeExceeded { .. }
        ))
    ));

    let mut state = funded_state();
    let tx = Transaction::create(sender(), initcode, 5_000_000);
    assert!(apply_transaction(&mut state, &env(Fork::Homestead), &tx).is_ok());
}

#[test]
fn reverted_execution_still_charges_gas_and_bumps_nonce() {
    let mut state = funded_state();
    let target = receiver();
    // Deployed code: immediate REVERT.
    state.insert_account(
        target,
        Account::with_code(Bytes::from_static(&[0x60, 0x00, 0x60, 0x00, 0xFD])),
    );

    let mut tx = Transaction::call(sender(), target, Bytes::new(), 50_000);
    tx.gas_price = 1;

    let report = apply_transaction(&mut state, &env(Fork::Shanghai), &tx).expect("valid tx");
    assert!(!report.is_success());
    // Revert keeps unused gas: only intrinsic + the few executed ops.
    assert_eq!(report.gas_used, 21_000 + 3 + 3);
    assert_eq!(state.nonce_of(sender()), 1);
    assert_eq!(state.balance_of(coinbase()), U256::from(report.gas_used));
}

#[test]
fn gas_invariant_for_transactions() {
    let mut state = funded_state();
    state.insert_account(
        receiver(),
        Account::with_code(Bytes::from_static(&[0x60, 0x01, 0x60, 0x00, 0x55, 0x00])),
    );
    let tx = Transaction::call(sender(), receiver(), Bytes::new(), 90_000);

    let report = apply_transaction(&mut state, &env(Fork::Shanghai), &tx).expect("valid tx");
    assert!(report.is_success());
    assert_eq!(
        report.gas_used + report.gas_remaining,
        90_000 - report.gas_refunded
    );
}

#[test]
fn idempotent_over_identical_pre_states() {
    let state = {
        let mut state = funded_state();
        state.insert_account(
            receiver(),
            Account::with_code(Bytes::from_static(&[
                0x60, 0x2A, 0x60, 0x00, 0x55, // storage[0] = 42
                0x60, 0x00, 0x60, 0x00, 0xF3, // RETURN empty
            ])),
        );
        state
    };
    let tx = Transaction::call(sender(), receiver(), Bytes::new(), 90_000);

    let mut first_state = state.clone();
    let first = apply_transaction(&mut first_state, &env(Fork::Shanghai), &tx).expect("valid tx");
    let mut second_state = state.clone();
    let second = apply_transaction(&mut second_state, &env(Fork::Shanghai), &tx).expect("valid tx");

    assert_eq!(first.gas_used, second.gas_used);
    assert_eq!(first.output, second.output);
    assert_eq!(
        first_state.sload(receiver(), U256::zero()),
        second_state.sload(receiver(), U256::zero())
    );
    assert_eq!(
        first_state.balance_of(sender()),
        second_state.balance_of(sender())
    );
}

#[test]
fn apply_block_threads_nonces_through() {
    let mut state = funded_state();

    let mut first = Transaction::call(sender(), receiver(), Bytes::new(), 21_000);
    first.value = U256::from(10);
    let mut second = first.clone();
    second.nonce = 1;

    let results = apply_block(&mut state, &env(Fork::Shanghai), &[first, second]);
    assert!(results.iter().all(|result| result.is_ok()));
    assert_eq!(state.balance_of(receiver()), U256::from(20));
    assert_eq!(state.nonce_of(sender()), 2);
}

#[test]
fn transaction_to_empty_account_runs_no_code() {
    let mut state = funded_state();
    let tx = Transaction::call(sender(), Address::from_low_u64_be(0xAB), Bytes::new(), 30_000);
    let report = apply_transaction(&mut state, &env(Fork::Frontier), &tx).expect("valid tx");
    assert!(report.is_success());
    assert_eq!(report.gas_used, 21_000);
}

#[test]
fn create_collision_consumes_all_gas() {
    let mut state = funded_state();
    let created = calculate_create_address(sender(), 0);
    state.insert_account(created, Account::with_code(Bytes::from_static(&[0x00])));

    let tx = Transaction::create(sender(), Bytes::new(), 100_000);
    let report = apply_transaction(&mut state, &env(Fork::Shanghai), &tx).expect("applied");
    assert!(!report.is_success());
    assert_eq!(report.gas_used, 100_000);
    assert_eq!(report.created_address, None);
}

#[test]
fn signed_transaction_low_s_rule_applies_from_homestead() {
    use spectre_common::types::Signature;
    use spectre_vm::constants::SECP256K1_ORDER;

    let high_s = SECP256K1_ORDER / U256::from(2) + U256::one();
    let mut tx = Transaction::call(sender(), receiver(), Bytes::new(), 21_000);
    tx.signature = Some(Signature {
        v: 27,
        r: U256::one(),
        s: high_s,
    });

    let mut state = funded_state();
    assert!(apply_transaction(&mut state, &env(Fork::Frontier), &tx).is_ok());

    let mut state = funded_state();
    let result = apply_transaction(&mut state, &env(Fork::Homestead), &tx);
    assert!(matches!(
        result,
        Err(VMError::TxValidation(TxValidationError::InvalidSignature))
    ));
}
