//! Gas costs of the EVM instructions.
//!
//! Fork-invariant base costs are constants; anything that varies by fork
//! takes the active [`GasSchedule`]. Dynamic-cost functions return the
//! full charge for the operation (base + dynamic + memory expansion).

use crate::{
    errors::{ExceptionalHalt, VMError},
    gas_schedule::GasSchedule,
    memory,
};
use bytes::Bytes;
use spectre_common::U256;
use ExceptionalHalt::OutOfGas;

// Base opcode costs
pub const STOP: u64 = 0;
pub const ADD: u64 = 3;
pub const MUL: u64 = 5;
pub const SUB: u64 = 3;
pub const DIV: u64 = 5;
pub const SDIV: u64 = 5;
pub const MOD: u64 = 5;
pub const SMOD: u64 = 5;
pub const ADDMOD: u64 = 8;
pub const MULMOD: u64 = 8;
pub const EXP_STATIC: u64 = 10;
pub const SIGNEXTEND: u64 = 5;
pub const LT: u64 = 3;
pub const GT: u64 = 3;
pub const SLT: u64 = 3;
pub const SGT: u64 = 3;
pub const EQ: u64 = 3;
pub const ISZERO: u64 = 3;
pub const AND: u64 = 3;
pub const OR: u64 = 3;
pub const XOR: u64 = 3;
pub const NOT: u64 = 3;
pub const BYTE: u64 = 3;
pub const SHL: u64 = 3;
pub const SHR: u64 = 3;
pub const SAR: u64 = 3;
pub const KECCAK256_STATIC: u64 = 30;
pub const KECCAK256_DYNAMIC_BASE: u64 = 6;
pub const ADDRESS: u64 = 2;
pub const ORIGIN: u64 = 2;
pub const CALLER: u64 = 2;
pub const CALLVALUE: u64 = 2;
pub const CALLDATALOAD: u64 = 3;
pub const CALLDATASIZE: u64 = 2;
pub const CALLDATACOPY_STATIC: u64 = 3;
pub const CALLDATACOPY_DYNAMIC_BASE: u64 = 3;
pub const CODESIZE: u64 = 2;
pub const CODECOPY_STATIC: u64 = 3;
pub const CODECOPY_DYNAMIC_BASE: u64 = 3;
pub const GASPRICE: u64 = 2;
pub const EXTCODECOPY_DYNAMIC_BASE: u64 = 3;
pub const RETURNDATASIZE: u64 = 2;
pub const RETURNDATACOPY_STATIC: u64 = 3;
pub const RETURNDATACOPY_DYNAMIC_BASE: u64 = 3;
pub const BLOCKHASH: u64 = 20;
pub const COINBASE: u64 = 2;
pub const TIMESTAMP: u64 = 2;
pub const NUMBER: u64 = 2;
pub const DIFFICULTY: u64 = 2;
pub const GASLIMIT: u64 = 2;
pub const CHAINID: u64 = 2;
pub const SELFBALANCE: u64 = 5;
pub const BASEFEE: u64 = 2;
pub const POP: u64 = 2;
pub const MLOAD_STATIC: u64 = 3;
pub const MSTORE_STATIC: u64 = 3;
pub const MSTORE8_STATIC: u64 = 3;
pub const JUMP: u64 = 8;
pub const JUMPI: u64 = 10;
pub const PC: u64 = 2;
pub const MSIZE: u64 = 2;
pub const GAS: u64 = 2;
pub const JUMPDEST: u64 = 1;
pub const PUSH0: u64 = 2;
pub const PUSHN: u64 = 3;
pub const DUPN: u64 = 3;
pub const SWAPN: u64 = 3;
pub const LOGN_STATIC: u64 = 375;
pub const LOGN_DYNAMIC_BASE: u64 = 375;
pub const LOGN_DYNAMIC_BYTE_BASE: u64 = 8;

// Call surcharges (fork-invariant; the base cost is on the schedule)
pub const CALL_POSITIVE_VALUE: u64 = 9000;
pub const CALL_POSITIVE_VALUE_STIPEND: u64 = 2300;
pub const CALL_TO_EMPTY_ACCOUNT: u64 = 25000;

// Contract creation
pub const CREATE_BASE_COST: u64 = 32000;
pub const CODE_DEPOSIT_COST: u64 = 200;

// Transaction base cost
pub const TX_BASE_COST: u64 = 21000;

/// EXP: static part plus per-byte-of-exponent dynamic part.
pub fn exp(schedule: &GasSchedule, exponent: U256) -> Result<u64, VMError> {
    let exponent_byte_size = (exponent.bits() as u64).div_ceil(8);
    let dynamic_cost = schedule
        .exp_byte
        .checked_mul(exponent_byte_size)
        .ok_or(OutOfGas)?;
    EXP_STATIC.checked_add(dynamic_cost).ok_or(OutOfGas.into())
}

fn copy_behavior(
    new_memory_size: usize,
    current_memory_size: usize,
    size: usize,
    dynamic_base: u64,
    static_cost: u64,
) -> Result<u64, VMError> {
    let minimum_word_size: u64 = size
        .div_ceil(32)
        .try_into()
        .map_err(|_| ExceptionalHalt::VeryLargeNumber)?;

    let memory_expansion_cost = memory::expansion_cost(new_memory_size, current_memory_size)?;
    let minimum_word_size_cost = dynamic_base
        .checked_mul(minimum_word_size)
        .ok_or(OutOfGas)?;

    static_cost
        .checked_add(minimum_word_size_cost)
        .ok_or(OutOfGas)?
        .checked_add(memory_expansion_cost)
        .ok_or(OutOfGas.into())
}

pub fn keccak256(
    new_memory_size: usize,
    current_memory_size: usize,
    size: usize,
) -> Result<u64, VMError> {
    copy_behavior(
        new_memory_size,
        current_memory_size,
        size,
        KECCAK256_DYNAMIC_BASE,
        KECCAK256_STATIC,
    )
}

pub fn calldatacopy(
    new_memory_size: usize,
    current_memory_size: usize,
    size: usize,
) -> Result<u64, VMError> {
    copy_behavior(
        new_memory_size,
        current_memory_size,
        size,
        CALLDATACOPY_DYNAMIC_BASE,
        CALLDATACOPY_STATIC,
    )
}

pub fn codecopy(
    new_memory_size: usize,
    current_memory_size: usize,
    size: usize,
) -> Result<u64, VMError> {
    copy_behavior(
        new_memory_size,
        current_memory_size,
        size,
        CODECOPY_DYNAMIC_BASE,
        CODECOPY_STATIC,
    )
}

pub fn returndatacopy(
    new_memory_size: usize,
    current_memory_size: usize,
    size: usize,
) -> Result<u64, VMError> {
    copy_behavior(
        new_memory_size,
        current_memory_size,
        size,
        RETURNDATACOPY_DYNAMIC_BASE,
        RETURNDATACOPY_STATIC,
    )
}

pub fn extcodecopy(
    schedule: &GasSchedule,
    new_memory_size: usize,
    current_memory_size: usize,
    size: usize,
) -> Result<u64, VMError> {
    copy_behavior(
        new_memory_size,
        current_memory_size,
        size,
        EXTCODECOPY_DYNAMIC_BASE,
        schedule.extcodecopy_base,
    )
}

pub fn log(
    new_memory_size: usize,
    current_memory_size: usize,
    size: usize,
    number_of_topics: usize,
) -> Result<u64, VMError> {
    let memory_expansion_cost = memory::expansion_cost(new_memory_size, current_memory_size)?;

    let topics_cost = LOGN_DYNAMIC_BASE
        .checked_mul(number_of_topics as u64)
        .ok_or(OutOfGas)?;
    let size: u64 = size
        .try_into()
        .map_err(|_| ExceptionalHalt::VeryLargeNumber)?;
    let bytes_cost = LOGN_DYNAMIC_BYTE_BASE.checked_mul(size).ok_or(OutOfGas)?;

    LOGN_STATIC
        .checked_add(topics_cost)
        .ok_or(OutOfGas)?
        .checked_add(bytes_cost)
        .ok_or(OutOfGas)?
        .checked_add(memory_expansion_cost)
        .ok_or(OutOfGas.into())
}

fn mem_expansion_behavior(
    new_memory_size: usize,
    current_memory_size: usize,
    static_cost: u64,
) -> Result<u64, VMError> {
    let memory_expansion_cost = memory::expansion_cost(new_memory_size, current_memory_size)?;
    static_cost
        .checked_add(memory_expansion_cost)
        .ok_or(OutOfGas.into())
}

pub fn mload(new_memory_size: usize, current_memory_size: usize) -> Result<u64, VMError> {
    mem_expansion_behavior(new_memory_size, current_memory_size, MLOAD_STATIC)
}

pub fn mstore(new_memory_size: usize, current_memory_size: usize) -> Result<u64, VMError> {
    mem_expansion_behavior(new_memory_size, current_memory_size, MSTORE_STATIC)
}

pub fn mstore8(new_memory_size: usize, current_memory_size: usize) -> Result<u64, VMError> {
    mem_expansion_behavior(new_memory_size, current_memory_size, MSTORE8_STATIC)
}

/// RETURN and REVERT only pay for memory expansion.
pub fn exit_opcode(new_memory_size: usize, current_memory_size: usize) -> Result<u64, VMError> {
    memory::expansion_cost(new_memory_size, current_memory_size)
}

/// SSTORE cost and the refund it schedules.
///
/// 20000 to fill an empty slot, 5000 otherwise; clearing a non-empty slot
/// schedules the storage-clear refund.
pub fn sstore(schedule: &GasSchedule, current_value: U256, new_value: U256) -> (u64, u64) {
    let cost = if current_value.is_zero() && !new_value.is_zero() {
        schedule.sstore_set
    } else {
        schedule.sstore_reset
    };
    let refund = if !current_value.is_zero() && new_value.is_zero() {
        schedule.sstore_clears_refund
    } else {
        0
    };
    (cost, refund)
}

/// CALL: returns `(cost charged to the caller, gas limit of the child)`.
///
/// The caller pays base + surcharges + memory expansion + the forwarded
/// gas; the child additionally receives the stipend on value transfers.
#[allow(clippy::too_many_arguments)]
pub fn call(
    schedule: &GasSchedule,
    new_memory_size: usize,
    current_memory_size: usize,
    value: U256,
    target_is_empty: bool,
    gas_from_stack: U256,
    gas_left: u64,
) -> Result<(u64, u64), VMError> {
    let memory_expansion_cost = memory::expansion_cost(new_memory_size, current_memory_size)?;

    let positive_value_cost = if value.is_zero() { 0 } else { CALL_POSITIVE_VALUE };
    let new_account_cost = if target_is_empty && !value.is_zero() {
        CALL_TO_EMPTY_ACCOUNT
    } else {
        0
    };

    let fixed_costs = memory_expansion_cost
        .checked_add(schedule.call_base)
        .ok_or(OutOfGas)?
        .checked_add(positive_value_cost)
        .ok_or(OutOfGas)?
        .checked_add(new_account_cost)
        .ok_or(OutOfGas)?;

    forwarded_gas(schedule, value.is_zero(), gas_from_stack, gas_left, fixed_costs)
}

/// CALLCODE: like CALL minus the new-account surcharge.
pub fn callcode(
    schedule: &GasSchedule,
    new_memory_size: usize,
    current_memory_size: usize,
    value: U256,
    gas_from_stack: U256,
    gas_left: u64,
) -> Result<(u64, u64), VMError> {
    let memory_expansion_cost = memory::expansion_cost(new_memory_size, current_memory_size)?;

    let positive_value_cost = if value.is_zero() { 0 } else { CALL_POSITIVE_VALUE };
    let fixed_costs = memory_expansion_cost
        .checked_add(schedule.call_base)
        .ok_or(OutOfGas)?
        .checked_add(positive_value_cost)
        .ok_or(OutOfGas)?;

    forwarded_gas(schedule, value.is_zero(), gas_from_stack, gas_left, fixed_costs)
}

/// DELEGATECALL and STATICCALL: no value, no surcharges.
pub fn plain_call(
    schedule: &GasSchedule,
    new_memory_size: usize,
    current_memory_size: usize,
    gas_from_stack: U256,
    gas_left: u64,
) -> Result<(u64, u64), VMError> {
    let memory_expansion_cost = memory::expansion_cost(new_memory_size, current_memory_size)?;
    let fixed_costs = memory_expansion_cost
        .checked_add(schedule.call_base)
        .ok_or(OutOfGas)?;

    forwarded_gas(schedule, true, gas_from_stack, gas_left, fixed_costs)
}

/// Resolve the requested forwarded gas against what the frame can spare.
///
/// With the all-but-one-64th rule the cap is `left - left/64`; without it
/// the full remainder may be forwarded.
fn forwarded_gas(
    schedule: &GasSchedule,
    value_is_zero: bool,
    gas_from_stack: U256,
    gas_left: u64,
    fixed_costs: u64,
) -> Result<(u64, u64), VMError> {
    let stipend = if value_is_zero { 0 } else { CALL_POSITIVE_VALUE_STIPEND };
    let gas_left = gas_left.checked_sub(fixed_costs).ok_or(OutOfGas)?;

    let max_gas_for_call = if schedule.has_all_but_one_64th {
        gas_left - gas_left / 64
    } else {
        gas_left
    };

    let gas: u64 = gas_from_stack
        .min(max_gas_for_call.into())
        .try_into()
        .map_err(|_| OutOfGas)?;

    Ok((
        gas.checked_add(fixed_costs).ok_or(OutOfGas)?,
        gas.checked_add(stipend).ok_or(OutOfGas)?,
    ))
}

/// CREATE/CREATE2: base cost + memory expansion + the Shanghai per-word
/// initcode charge.
pub fn create(
    schedule: &GasSchedule,
    new_memory_size: usize,
    current_memory_size: usize,
    initcode_size: usize,
) -> Result<u64, VMError> {
    let memory_expansion_cost = memory::expansion_cost(new_memory_size, current_memory_size)?;
    let initcode_words: u64 = initcode_size
        .div_ceil(32)
        .try_into()
        .map_err(|_| ExceptionalHalt::VeryLargeNumber)?;
    let initcode_cost = schedule
        .initcode_word_cost
        .checked_mul(initcode_words)
        .ok_or(OutOfGas)?;

    CREATE_BASE_COST
        .checked_add(memory_expansion_cost)
        .ok_or(OutOfGas)?
        .checked_add(initcode_cost)
        .ok_or(OutOfGas.into())
}

/// Gas an initcode frame receives from its parent.
pub fn max_message_call_gas(schedule: &GasSchedule, gas_remaining: u64) -> u64 {
    if schedule.has_all_but_one_64th {
        gas_remaining - gas_remaining / 64
    } else {
        gas_remaining
    }
}

/// Intrinsic gas charged before any bytecode runs.
pub fn intrinsic_gas(
    schedule: &GasSchedule,
    calldata: &Bytes,
    is_create: bool,
) -> Result<u64, VMError> {
    let mut gas = TX_BASE_COST;
    for byte in calldata.iter() {
        let byte_cost = if *byte == 0 {
            schedule.calldata_zero
        } else {
            schedule.calldata_nonzero
        };
        gas = gas.checked_add(byte_cost).ok_or(OutOfGas)?;
    }

    if is_create {
        gas = gas.checked_add(CREATE_BASE_COST).ok_or(OutOfGas)?;
        let initcode_words: u64 = calldata
            .len()
            .div_ceil(32)
            .try_into()
            .map_err(|_| ExceptionalHalt::VeryLargeNumber)?;
        gas = gas
            .checked_add(
                schedule
                    .initcode_word_cost
                    .checked_mul(initcode_words)
                    .ok_or(OutOfGas)?,
            )
            .ok_or(OutOfGas)?;
    }

    Ok(gas)
}

/// The refund applied at transaction end is capped at half the gas used.
pub fn capped_refund(accumulated_refund: u64, gas_used: u64) -> u64 {
    accumulated_refund.min(gas_used / 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gas_schedule::{FRONTIER_SCHEDULE, HOMESTEAD_SCHEDULE, SHANGHAI_SCHEDULE};

    #[test]
    fn exp_cost_per_fork() {
        // Exponent 0x1000 occupies two bytes.
        let exponent = U256::from(0x1000);
        assert_eq!(exp(&FRONTIER_SCHEDULE, exponent).unwrap(), 10 + 2 * 10);
        assert_eq!(exp(&HOMESTEAD_SCHEDULE, exponent).unwrap(), 10 + 2 * 50);
        assert_eq!(exp(&FRONTIER_SCHEDULE, U256::zero()).unwrap(), 10);
    }

    #[test]
    fn sstore_cost_and_refund() {
        let schedule = &FRONTIER_SCHEDULE;
        assert_eq!(sstore(schedule, U256::zero(), U256::one()), (20000, 0));
        assert_eq!(sstore(schedule, U256::one(), U256::from(2)), (5000, 0));
        assert_eq!(sstore(schedule, U256::one(), U256::zero()), (5000, 15000));
        assert_eq!(sstore(schedule, U256::zero(), U256::zero()), (5000, 0));
    }

    #[test]
    fn frontier_forwards_everything_homestead_holds_back_a_64th() {
        // Plenty of requested gas; no value transfer.
        let (cost_frontier, limit_frontier) = call(
            &FRONTIER_SCHEDULE,
            0,
            0,
            U256::zero(),
            false,
            U256::MAX,
            6400 + 40,
        )
        .unwrap();
        assert_eq!(limit_frontier, 6400);
        assert_eq!(cost_frontier, 6400 + 40);

        let (cost_homestead, limit_homestead) = call(
            &HOMESTEAD_SCHEDULE,
            0,
            0,
            U256::zero(),
            false,
            U256::MAX,
            6400 + 700,
        )
        .unwrap();
        assert_eq!(limit_homestead, 6400 - 100);
        assert_eq!(cost_homestead, 6400 - 100 + 700);
    }

    #[test]
    fn value_transfer_adds_surcharge_and_stipend() {
        let (cost, limit) = call(
            &HOMESTEAD_SCHEDULE,
            0,
            0,
            U256::one(),
            false,
            U256::zero(),
            20000,
        )
        .unwrap();
        // No gas requested: the caller pays only fixed costs and the
        // child still receives the stipend.
        assert_eq!(cost, 700 + 9000);
        assert_eq!(limit, 2300);
    }

    #[test]
    fn empty_target_with_value_pays_new_account_surcharge() {
        let (cost, _) = call(
            &HOMESTEAD_SCHEDULE,
            0,
            0,
            U256::one(),
            true,
            U256::zero(),
            50000,
        )
        .unwrap();
        assert_eq!(cost, 700 + 9000 + 25000);
    }

    #[test]
    fn intrinsic_gas_counts_byte_classes() {
        let schedule = &FRONTIER_SCHEDULE;
        let data = Bytes::from_static(&[0, 0, 1, 0xff]);
        assert_eq!(
            intrinsic_gas(schedule, &data, false).unwrap(),
            21000 + 2 * 4 + 2 * 16
        );
        assert_eq!(
            intrinsic_gas(schedule, &Bytes::new(), true).unwrap(),
            21000 + 32000
        );
    }

    #[test]
    fn shanghai_creation_meters_initcode() {
        let data = Bytes::from(vec![1u8; 33]);
        let base = 21000 + 33 * 16 + 32000;
        assert_eq!(
            intrinsic_gas(&SHANGHAI_SCHEDULE, &data, true).unwrap(),
            base + 2 * 2
        );
        assert_eq!(
            intrinsic_gas(&HOMESTEAD_SCHEDULE, &data, true).unwrap(),
            base
        );
    }

    #[test]
    fn refund_cap_is_half_of_gas_used() {
        assert_eq!(capped_refund(15000, 10000), 5000);
        assert_eq!(capped_refund(100, 10000), 100);
    }
}
