//! # Environmental information
//!
//! Includes the following opcodes:
//!   - `ADDRESS`, `BALANCE`, `ORIGIN`, `CALLER`, `CALLVALUE`
//!   - `CALLDATALOAD`, `CALLDATASIZE`, `CALLDATACOPY`
//!   - `CODESIZE`, `CODECOPY`, `GASPRICE`
//!   - `EXTCODESIZE`, `EXTCODECOPY`, `EXTCODEHASH`
//!   - `RETURNDATASIZE`, `RETURNDATACOPY`

use crate::{
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    gas_cost,
    memory::calculate_memory_size,
    opcode_handlers::OpcodeHandler,
    utils::{address_to_word, keccak256, size_offset_to_usize, u256_to_usize, word_to_address},
    vm::VM,
};
use spectre_common::U256;

/// Implementation for the `ADDRESS` opcode.
pub struct OpAddressHandler;
impl OpcodeHandler for OpAddressHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::ADDRESS)?;

        let address = vm.current_call_frame.to;
        vm.current_call_frame.stack.push(address_to_word(address))?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `BALANCE` opcode.
pub struct OpBalanceHandler;
impl OpcodeHandler for OpBalanceHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(vm.schedule.balance)?;

        let address = word_to_address(vm.current_call_frame.stack.pop1()?);
        let balance = vm.db.balance_of(address);
        vm.current_call_frame.stack.push(balance)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `ORIGIN` opcode.
pub struct OpOriginHandler;
impl OpcodeHandler for OpOriginHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::ORIGIN)?;

        let origin = vm.env.origin;
        vm.current_call_frame.stack.push(address_to_word(origin))?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `CALLER` opcode.
pub struct OpCallerHandler;
impl OpcodeHandler for OpCallerHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::CALLER)?;

        let caller = vm.current_call_frame.msg_sender;
        vm.current_call_frame.stack.push(address_to_word(caller))?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `CALLVALUE` opcode.
pub struct OpCallValueHandler;
impl OpcodeHandler for OpCallValueHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::CALLVALUE)?;

        let value = vm.current_call_frame.msg_value;
        vm.current_call_frame.stack.push(value)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `CALLDATALOAD` opcode.
///
/// Reads 32 bytes from calldata at the given offset, zero-padded past the
/// end.
pub struct OpCallDataLoadHandler;
impl OpcodeHandler for OpCallDataLoadHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::CALLDATALOAD)?;

        let offset = vm.current_call_frame.stack.pop1()?;
        let calldata = &vm.current_call_frame.calldata;

        let mut word = [0u8; 32];
        if let Ok(offset) = usize::try_from(offset) {
            if offset < calldata.len() {
                let available = calldata.len() - offset;
                let count = available.min(32);
                word[..count].copy_from_slice(&calldata[offset..offset + count]);
            }
        }
        vm.current_call_frame
            .stack
            .push(U256::from_big_endian(&word))?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `CALLDATASIZE` opcode.
pub struct OpCallDataSizeHandler;
impl OpcodeHandler for OpCallDataSizeHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::CALLDATASIZE)?;

        let size = vm.current_call_frame.calldata.len();
        vm.current_call_frame.stack.push(size.into())?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `CALLDATACOPY` opcode.
pub struct OpCallDataCopyHandler;
impl OpcodeHandler for OpCallDataCopyHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [dst_offset, src_offset, size] = vm.current_call_frame.stack.pop()?;
        let (size, dst_offset) = size_offset_to_usize(size, dst_offset)?;

        let new_memory_size = calculate_memory_size(dst_offset.into(), size)?;
        let cost =
            gas_cost::calldatacopy(new_memory_size, vm.current_call_frame.memory.len(), size)?;
        vm.current_call_frame.increase_consumed_gas(cost)?;

        if size == 0 {
            return Ok(OpcodeResult::Continue);
        }

        let data = copy_with_zero_fill(&vm.current_call_frame.calldata, src_offset, size);
        vm.current_call_frame.memory.store_data(dst_offset, &data)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `CODESIZE` opcode.
pub struct OpCodeSizeHandler;
impl OpcodeHandler for OpCodeSizeHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::CODESIZE)?;

        let size = vm.current_call_frame.bytecode.len();
        vm.current_call_frame.stack.push(size.into())?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `CODECOPY` opcode.
pub struct OpCodeCopyHandler;
impl OpcodeHandler for OpCodeCopyHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [dst_offset, src_offset, size] = vm.current_call_frame.stack.pop()?;
        let (size, dst_offset) = size_offset_to_usize(size, dst_offset)?;

        let new_memory_size = calculate_memory_size(dst_offset.into(), size)?;
        let cost = gas_cost::codecopy(new_memory_size, vm.current_call_frame.memory.len(), size)?;
        vm.current_call_frame.increase_consumed_gas(cost)?;

        if size == 0 {
            return Ok(OpcodeResult::Continue);
        }

        let data = copy_with_zero_fill(&vm.current_call_frame.bytecode, src_offset, size);
        vm.current_call_frame.memory.store_data(dst_offset, &data)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `GASPRICE` opcode.
pub struct OpGasPriceHandler;
impl OpcodeHandler for OpGasPriceHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::GASPRICE)?;

        let gas_price = vm.env.gas_price;
        vm.current_call_frame.stack.push(gas_price.into())?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `EXTCODESIZE` opcode.
pub struct OpExtCodeSizeHandler;
impl OpcodeHandler for OpExtCodeSizeHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(vm.schedule.extcodesize)?;

        let address = word_to_address(vm.current_call_frame.stack.pop1()?);
        let size = vm.db.code_of(address).len();
        vm.current_call_frame.stack.push(size.into())?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `EXTCODECOPY` opcode.
pub struct OpExtCodeCopyHandler;
impl OpcodeHandler for OpExtCodeCopyHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [address, dst_offset, src_offset, size] = vm.current_call_frame.stack.pop()?;
        let address = word_to_address(address);
        let (size, dst_offset) = size_offset_to_usize(size, dst_offset)?;

        let new_memory_size = calculate_memory_size(dst_offset.into(), size)?;
        let cost = gas_cost::extcodecopy(
            vm.schedule,
            new_memory_size,
            vm.current_call_frame.memory.len(),
            size,
        )?;
        vm.current_call_frame.increase_consumed_gas(cost)?;

        if size == 0 {
            return Ok(OpcodeResult::Continue);
        }

        let code = vm.db.code_of(address);
        let data = copy_with_zero_fill(&code, src_offset, size);
        vm.current_call_frame.memory.store_data(dst_offset, &data)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `RETURNDATASIZE` opcode.
pub struct OpReturnDataSizeHandler;
impl OpcodeHandler for OpReturnDataSizeHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::RETURNDATASIZE)?;

        let size = vm.current_call_frame.sub_return_data.len();
        vm.current_call_frame.stack.push(size.into())?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `RETURNDATACOPY` opcode.
///
/// Unlike the other copies, reading past the end of the return-data
/// buffer is a fault, not a zero fill.
pub struct OpReturnDataCopyHandler;
impl OpcodeHandler for OpReturnDataCopyHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [dst_offset, src_offset, size] = vm.current_call_frame.stack.pop()?;
        let (size, dst_offset) = size_offset_to_usize(size, dst_offset)?;

        let new_memory_size = calculate_memory_size(dst_offset.into(), size)?;
        let cost =
            gas_cost::returndatacopy(new_memory_size, vm.current_call_frame.memory.len(), size)?;
        vm.current_call_frame.increase_consumed_gas(cost)?;

        if size == 0 {
            return Ok(OpcodeResult::Continue);
        }

        let src_offset = u256_to_usize(src_offset)?;
        let end = src_offset
            .checked_add(size)
            .ok_or(ExceptionalHalt::OutOfBounds)?;
        let data = vm
            .current_call_frame
            .sub_return_data
            .get(src_offset..end)
            .ok_or(ExceptionalHalt::OutOfBounds)?
            .to_vec();
        vm.current_call_frame.memory.store_data(dst_offset, &data)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `EXTCODEHASH` opcode.
///
/// Zero for absent or empty accounts, otherwise the keccak of the code
/// (which is the empty-string hash for code-less accounts).
pub struct OpExtCodeHashHandler;
impl OpcodeHandler for OpExtCodeHashHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(vm.schedule.extcodehash)?;

        let address = word_to_address(vm.current_call_frame.stack.pop1()?);
        let hash = if vm.db.is_empty(address) {
            U256::zero()
        } else {
            let code = vm.db.code_of(address);
            U256::from_big_endian(keccak256(&code).as_bytes())
        };
        vm.current_call_frame.stack.push(hash)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Copy `size` bytes from `source` starting at `offset` (a word that may
/// exceed the source length), zero-filling whatever the source cannot
/// provide.
fn copy_with_zero_fill(source: &[u8], offset: U256, size: usize) -> Vec<u8> {
    let mut out = vec![0u8; size];
    if let Ok(offset) = usize::try_from(offset) {
        if offset < source.len() {
            let available = source.len() - offset;
            let count = available.min(size);
            out[..count].copy_from_slice(&source[offset..offset + count]);
        }
    }
    out
}
