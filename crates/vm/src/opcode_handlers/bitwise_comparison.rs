//! # Comparison and bitwise operations
//!
//! Includes the following opcodes:
//!   - `LT`, `GT`, `SLT`, `SGT`, `EQ`, `ISZERO`
//!   - `AND`, `OR`, `XOR`, `NOT`
//!   - `BYTE`, `SHL`, `SHR`, `SAR`

use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    opcode_handlers::OpcodeHandler,
    vm::VM,
};
use spectre_common::U256;

fn bool_to_word(condition: bool) -> U256 {
    if condition {
        U256::one()
    } else {
        U256::zero()
    }
}

/// Signed comparison key: flipping the sign bit orders two's-complement
/// values correctly under unsigned comparison.
fn signed_key(value: U256) -> U256 {
    value ^ (U256::one() << 255)
}

/// Implementation for the `LT` opcode.
pub struct OpLtHandler;
impl OpcodeHandler for OpLtHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::LT)?;

        let [lhs, rhs] = vm.current_call_frame.stack.pop()?;
        vm.current_call_frame.stack.push(bool_to_word(lhs < rhs))?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `GT` opcode.
pub struct OpGtHandler;
impl OpcodeHandler for OpGtHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::GT)?;

        let [lhs, rhs] = vm.current_call_frame.stack.pop()?;
        vm.current_call_frame.stack.push(bool_to_word(lhs > rhs))?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `SLT` opcode.
pub struct OpSLtHandler;
impl OpcodeHandler for OpSLtHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::SLT)?;

        let [lhs, rhs] = vm.current_call_frame.stack.pop()?;
        vm.current_call_frame
            .stack
            .push(bool_to_word(signed_key(lhs) < signed_key(rhs)))?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `SGT` opcode.
pub struct OpSGtHandler;
impl OpcodeHandler for OpSGtHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::SGT)?;

        let [lhs, rhs] = vm.current_call_frame.stack.pop()?;
        vm.current_call_frame
            .stack
            .push(bool_to_word(signed_key(lhs) > signed_key(rhs)))?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `EQ` opcode.
pub struct OpEqHandler;
impl OpcodeHandler for OpEqHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::EQ)?;

        let [lhs, rhs] = vm.current_call_frame.stack.pop()?;
        vm.current_call_frame.stack.push(bool_to_word(lhs == rhs))?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `ISZERO` opcode.
pub struct OpIsZeroHandler;
impl OpcodeHandler for OpIsZeroHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::ISZERO)?;

        let value = vm.current_call_frame.stack.pop1()?;
        vm.current_call_frame
            .stack
            .push(bool_to_word(value.is_zero()))?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `AND` opcode.
pub struct OpAndHandler;
impl OpcodeHandler for OpAndHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::AND)?;

        let [lhs, rhs] = vm.current_call_frame.stack.pop()?;
        vm.current_call_frame.stack.push(lhs & rhs)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `OR` opcode.
pub struct OpOrHandler;
impl OpcodeHandler for OpOrHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::OR)?;

        let [lhs, rhs] = vm.current_call_frame.stack.pop()?;
        vm.current_call_frame.stack.push(lhs | rhs)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `XOR` opcode.
pub struct OpXorHandler;
impl OpcodeHandler for OpXorHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::XOR)?;

        let [lhs, rhs] = vm.current_call_frame.stack.pop()?;
        vm.current_call_frame.stack.push(lhs ^ rhs)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `NOT` opcode.
pub struct OpNotHandler;
impl OpcodeHandler for OpNotHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::NOT)?;

        let value = vm.current_call_frame.stack.pop1()?;
        vm.current_call_frame.stack.push(!value)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `BYTE` opcode.
///
/// Pushes the `index`-th byte of `value`, counting from the big-endian
/// end; indices of 32 and above yield zero.
pub struct OpByteHandler;
impl OpcodeHandler for OpByteHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::BYTE)?;

        let [index, value] = vm.current_call_frame.stack.pop()?;
        let res = match usize::try_from(index) {
            Ok(index) if index < 32 => U256::from(value.byte(31 - index)),
            _ => U256::zero(),
        };
        vm.current_call_frame.stack.push(res)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `SHL` opcode. Shifts of 256 or more yield zero.
pub struct OpShlHandler;
impl OpcodeHandler for OpShlHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::SHL)?;

        let [shift, value] = vm.current_call_frame.stack.pop()?;
        let res = match usize::try_from(shift) {
            Ok(shift) if shift < 256 => value << shift,
            _ => U256::zero(),
        };
        vm.current_call_frame.stack.push(res)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `SHR` opcode. Shifts of 256 or more yield zero.
pub struct OpShrHandler;
impl OpcodeHandler for OpShrHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::SHR)?;

        let [shift, value] = vm.current_call_frame.stack.pop()?;
        let res = match usize::try_from(shift) {
            Ok(shift) if shift < 256 => value >> shift,
            _ => U256::zero(),
        };
        vm.current_call_frame.stack.push(res)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `SAR` opcode.
///
/// Arithmetic right shift: vacated bits are filled with the sign bit, and
/// shifts of 256 or more saturate to all-zeros or all-ones.
pub struct OpSarHandler;
impl OpcodeHandler for OpSarHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::SAR)?;

        let [shift, value] = vm.current_call_frame.stack.pop()?;
        let negative = value.bit(255);

        let res = match usize::try_from(shift) {
            Ok(shift) if shift < 256 => {
                let shifted = value >> shift;
                if negative && shift > 0 {
                    // Fill the vacated high bits with ones.
                    shifted | (U256::MAX << (256 - shift))
                } else {
                    shifted
                }
            }
            _ if negative => U256::MAX,
            _ => U256::zero(),
        };
        vm.current_call_frame.stack.push(res)?;

        Ok(OpcodeResult::Continue)
    }
}
