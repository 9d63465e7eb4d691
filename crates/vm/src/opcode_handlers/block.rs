//! # Block information
//!
//! Includes the following opcodes:
//!   - `BLOCKHASH`, `COINBASE`, `TIMESTAMP`, `NUMBER`, `DIFFICULTY`
//!   - `GASLIMIT`, `CHAINID`, `SELFBALANCE`, `BASEFEE`

use crate::{
    constants::BLOCKHASH_WINDOW,
    errors::{OpcodeResult, VMError},
    gas_cost,
    opcode_handlers::OpcodeHandler,
    utils::address_to_word,
    vm::VM,
};
use spectre_common::U256;

/// Implementation for the `BLOCKHASH` opcode.
///
/// Only the 256 most recent blocks are served; anything else (including
/// the current block and future numbers) yields zero.
pub struct OpBlockHashHandler;
impl OpcodeHandler for OpBlockHashHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::BLOCKHASH)?;

        let number = vm.current_call_frame.stack.pop1()?;
        let current = vm.env.block_number;

        let hash = match u64::try_from(number) {
            Ok(number)
                if U256::from(number) < current
                    && current - U256::from(number) <= U256::from(BLOCKHASH_WINDOW) =>
            {
                vm.env
                    .block_hashes
                    .get(&number)
                    .map(|hash| U256::from_big_endian(hash.as_bytes()))
                    .unwrap_or_default()
            }
            _ => U256::zero(),
        };
        vm.current_call_frame.stack.push(hash)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `COINBASE` opcode.
pub struct OpCoinbaseHandler;
impl OpcodeHandler for OpCoinbaseHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::COINBASE)?;

        let coinbase = vm.env.coinbase;
        vm.current_call_frame.stack.push(address_to_word(coinbase))?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `TIMESTAMP` opcode.
pub struct OpTimestampHandler;
impl OpcodeHandler for OpTimestampHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::TIMESTAMP)?;

        let timestamp = vm.env.timestamp;
        vm.current_call_frame.stack.push(timestamp)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `NUMBER` opcode.
pub struct OpNumberHandler;
impl OpcodeHandler for OpNumberHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::NUMBER)?;

        let number = vm.env.block_number;
        vm.current_call_frame.stack.push(number)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `DIFFICULTY` opcode.
pub struct OpDifficultyHandler;
impl OpcodeHandler for OpDifficultyHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::DIFFICULTY)?;

        let difficulty = vm.env.difficulty;
        vm.current_call_frame.stack.push(difficulty)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `GASLIMIT` opcode.
pub struct OpGasLimitHandler;
impl OpcodeHandler for OpGasLimitHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::GASLIMIT)?;

        let gas_limit = vm.env.block_gas_limit;
        vm.current_call_frame.stack.push(gas_limit.into())?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `CHAINID` opcode.
pub struct OpChainIdHandler;
impl OpcodeHandler for OpChainIdHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::CHAINID)?;

        let chain_id = vm.env.chain_id;
        vm.current_call_frame.stack.push(chain_id)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `SELFBALANCE` opcode.
pub struct OpSelfBalanceHandler;
impl OpcodeHandler for OpSelfBalanceHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::SELFBALANCE)?;

        let balance = vm.db.balance_of(vm.current_call_frame.to);
        vm.current_call_frame.stack.push(balance)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `BASEFEE` opcode.
pub struct OpBaseFeeHandler;
impl OpcodeHandler for OpBaseFeeHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::BASEFEE)?;

        let base_fee = vm.env.base_fee;
        vm.current_call_frame.stack.push(base_fee)?;

        Ok(OpcodeResult::Continue)
    }
}
