//! # Stack, memory, storage and control flow operations
//!
//! Includes the following opcodes:
//!   - `POP`, `PC`, `MSIZE`, `GAS`
//!   - `MLOAD`, `MSTORE`, `MSTORE8`
//!   - `SLOAD`, `SSTORE`
//!   - `JUMP`, `JUMPI`, `JUMPDEST`

use crate::{
    constants::WORD_SIZE_IN_BYTES_USIZE,
    errors::{ExceptionalHalt, InternalError, OpcodeResult, VMError},
    gas_cost,
    memory::calculate_memory_size,
    opcode_handlers::OpcodeHandler,
    utils::u256_to_usize,
    vm::VM,
};

/// Implementation for the `POP` opcode.
pub struct OpPopHandler;
impl OpcodeHandler for OpPopHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::POP)?;

        vm.current_call_frame.stack.pop1()?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `PC` opcode.
pub struct OpPcHandler;
impl OpcodeHandler for OpPcHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::PC)?;

        // The run loop pre-increments the counter, so the opcode's own
        // offset is one behind.
        let pc = vm.current_call_frame.pc.wrapping_sub(1);
        vm.current_call_frame.stack.push(pc.into())?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `MSIZE` opcode.
pub struct OpMSizeHandler;
impl OpcodeHandler for OpMSizeHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::MSIZE)?;

        let size = vm.current_call_frame.memory.len();
        vm.current_call_frame.stack.push(size.into())?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `GAS` opcode.
///
/// Pushes the gas remaining after paying for this instruction.
pub struct OpGasHandler;
impl OpcodeHandler for OpGasHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::GAS)?;

        let gas_remaining = vm.current_call_frame.gas_remaining;
        vm.current_call_frame.stack.push(gas_remaining.into())?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `MLOAD` opcode.
pub struct OpMLoadHandler;
impl OpcodeHandler for OpMLoadHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let offset = u256_to_usize(vm.current_call_frame.stack.pop1()?)?;

        let new_memory_size = calculate_memory_size(offset.into(), WORD_SIZE_IN_BYTES_USIZE)?;
        let cost = gas_cost::mload(new_memory_size, vm.current_call_frame.memory.len())?;
        vm.current_call_frame.increase_consumed_gas(cost)?;

        let word = vm.current_call_frame.memory.load_word(offset)?;
        vm.current_call_frame.stack.push(word)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `MSTORE` opcode.
pub struct OpMStoreHandler;
impl OpcodeHandler for OpMStoreHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [offset, value] = vm.current_call_frame.stack.pop()?;
        let offset = u256_to_usize(offset)?;

        let new_memory_size = calculate_memory_size(offset.into(), WORD_SIZE_IN_BYTES_USIZE)?;
        let cost = gas_cost::mstore(new_memory_size, vm.current_call_frame.memory.len())?;
        vm.current_call_frame.increase_consumed_gas(cost)?;

        vm.current_call_frame.memory.store_word(offset, value)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `MSTORE8` opcode.
pub struct OpMStore8Handler;
impl OpcodeHandler for OpMStore8Handler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [offset, value] = vm.current_call_frame.stack.pop()?;
        let offset = u256_to_usize(offset)?;

        let new_memory_size = calculate_memory_size(offset.into(), 1)?;
        let cost = gas_cost::mstore8(new_memory_size, vm.current_call_frame.memory.len())?;
        vm.current_call_frame.increase_consumed_gas(cost)?;

        vm.current_call_frame
            .memory
            .store_byte(offset, value.byte(0))?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `SLOAD` opcode.
pub struct OpSLoadHandler;
impl OpcodeHandler for OpSLoadHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(vm.schedule.sload)?;

        let key = vm.current_call_frame.stack.pop1()?;
        let value = vm.db.sload(vm.current_call_frame.to, key);
        vm.current_call_frame.stack.push(value)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `SSTORE` opcode.
///
/// Clearing a non-empty slot schedules the storage-clear refund, applied
/// (capped) at transaction end.
pub struct OpSStoreHandler;
impl OpcodeHandler for OpSStoreHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        if vm.current_call_frame.is_static {
            return Err(ExceptionalHalt::OpcodeNotAllowedInStaticContext.into());
        }

        let [key, new_value] = vm.current_call_frame.stack.pop()?;
        let to = vm.current_call_frame.to;

        let current_value = vm.db.sload(to, key);
        let (cost, refund) = gas_cost::sstore(vm.schedule, current_value, new_value);
        vm.current_call_frame.increase_consumed_gas(cost)?;

        vm.substate.refunded_gas = vm
            .substate
            .refunded_gas
            .checked_add(refund)
            .ok_or(InternalError::Overflow)?;

        if new_value != current_value {
            vm.db.sstore(to, key, new_value);
        }

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `JUMPDEST` opcode.
pub struct OpJumpDestHandler;
impl OpcodeHandler for OpJumpDestHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::JUMPDEST)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `JUMP` opcode.
pub struct OpJumpHandler;
impl OpcodeHandler for OpJumpHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::JUMP)?;

        let target = vm.current_call_frame.stack.pop1()?;
        jump(vm, target.try_into().unwrap_or(usize::MAX))?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `JUMPI` opcode.
///
/// A zero condition makes this a no-op; the counter simply moves to the
/// next instruction.
pub struct OpJumpIHandler;
impl OpcodeHandler for OpJumpIHandler {
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::JUMPI)?;

        let [target, condition] = vm.current_call_frame.stack.pop()?;
        if !condition.is_zero() {
            jump(vm, target.try_into().unwrap_or(usize::MAX))?;
        }

        Ok(OpcodeResult::Continue)
    }
}

/// Redirect the program counter, landing just past the JUMPDEST whose
/// cost is charged here since the loop will not visit it.
fn jump(vm: &mut VM<'_>, target: usize) -> Result<(), VMError> {
    if !vm.current_call_frame.valid_jump_target(target) {
        return Err(ExceptionalHalt::InvalidJump.into());
    }
    vm.current_call_frame
        .increase_consumed_gas(gas_cost::JUMPDEST)?;
    vm.current_call_frame.pc = target.wrapping_add(1);
    Ok(())
}
