//! # Arithmetic operations
//!
//! Includes the following opcodes:
//!   - `ADD`
//!   - `SUB`
//!   - `MUL`
//!   - `DIV`
//!   - `SDIV`
//!   - `MOD`
//!   - `SMOD`
//!   - `ADDMOD`
//!   - `MULMOD`
//!   - `EXP`
//!   - `SIGNEXTEND`

use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    opcode_handlers::OpcodeHandler,
    vm::VM,
};
use spectre_common::{U256, U512};
use std::cmp::Ordering;

/// Implementation for the `ADD` opcode.
pub struct OpAddHandler;
impl OpcodeHandler for OpAddHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::ADD)?;

        let [lhs, rhs] = vm.current_call_frame.stack.pop()?;
        let (res, _) = lhs.overflowing_add(rhs);
        vm.current_call_frame.stack.push(res)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `SUB` opcode.
pub struct OpSubHandler;
impl OpcodeHandler for OpSubHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::SUB)?;

        let [lhs, rhs] = vm.current_call_frame.stack.pop()?;
        let (res, _) = lhs.overflowing_sub(rhs);
        vm.current_call_frame.stack.push(res)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `MUL` opcode.
pub struct OpMulHandler;
impl OpcodeHandler for OpMulHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::MUL)?;

        let [lhs, rhs] = vm.current_call_frame.stack.pop()?;
        let (res, _) = lhs.overflowing_mul(rhs);
        vm.current_call_frame.stack.push(res)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `DIV` opcode. Division by zero yields zero.
pub struct OpDivHandler;
impl OpcodeHandler for OpDivHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::DIV)?;

        let [lhs, rhs] = vm.current_call_frame.stack.pop()?;
        let res = lhs.checked_div(rhs).unwrap_or_default();
        vm.current_call_frame.stack.push(res)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `SDIV` opcode.
///
/// Two's-complement signed division via unsigned division plus sign
/// bookkeeping. `sdiv(MIN, -1)` wraps back to `MIN`.
pub struct OpSDivHandler;
impl OpcodeHandler for OpSDivHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::SDIV)?;

        let [mut lhs, mut rhs] = vm.current_call_frame.stack.pop()?;

        let mut negative = false;
        if lhs.bit(255) {
            lhs = twos_complement(lhs);
            negative = !negative;
        }
        if rhs.bit(255) {
            rhs = twos_complement(rhs);
            negative = !negative;
        }

        let res = match lhs.checked_div(rhs) {
            Some(res) if negative => twos_complement(res),
            Some(res) => res,
            None => U256::zero(),
        };
        vm.current_call_frame.stack.push(res)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `MOD` opcode. Modulo zero yields zero.
pub struct OpModHandler;
impl OpcodeHandler for OpModHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::MOD)?;

        let [lhs, rhs] = vm.current_call_frame.stack.pop()?;
        let res = lhs.checked_rem(rhs).unwrap_or_default();
        vm.current_call_frame.stack.push(res)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `SMOD` opcode.
///
/// The sign of the result follows the dividend.
pub struct OpSModHandler;
impl OpcodeHandler for OpSModHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::SMOD)?;

        let [mut lhs, mut rhs] = vm.current_call_frame.stack.pop()?;

        let dividend_negative = lhs.bit(255);
        if dividend_negative {
            lhs = twos_complement(lhs);
        }
        if rhs.bit(255) {
            rhs = twos_complement(rhs);
        }

        let res = match lhs.checked_rem(rhs) {
            Some(res) if dividend_negative => twos_complement(res),
            Some(res) => res,
            None => U256::zero(),
        };
        vm.current_call_frame.stack.push(res)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `ADDMOD` opcode.
///
/// The intermediate sum is taken at 512 bits so it cannot wrap before the
/// reduction.
pub struct OpAddModHandler;
impl OpcodeHandler for OpAddModHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::ADDMOD)?;

        let [lhs, rhs, modulus] = vm.current_call_frame.stack.pop()?;
        if modulus.is_zero() {
            vm.current_call_frame.stack.push(U256::zero())?;
        } else {
            let sum = U512::from(lhs) + U512::from(rhs);
            let res = sum % U512::from(modulus);
            vm.current_call_frame
                .stack
                .push(U256([res.0[0], res.0[1], res.0[2], res.0[3]]))?;
        }

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `MULMOD` opcode.
pub struct OpMulModHandler;
impl OpcodeHandler for OpMulModHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::MULMOD)?;

        let [lhs, rhs, modulus] = vm.current_call_frame.stack.pop()?;
        if lhs.is_zero() || rhs.is_zero() || modulus.is_zero() {
            vm.current_call_frame.stack.push(U256::zero())?;
        } else {
            let product = lhs.full_mul(rhs);
            let modulus = U512::from(modulus);
            let res = match product.cmp(&modulus) {
                Ordering::Less => product,
                Ordering::Equal => U512::zero(),
                Ordering::Greater => product % modulus,
            };
            vm.current_call_frame
                .stack
                .push(U256([res.0[0], res.0[1], res.0[2], res.0[3]]))?;
        }

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `EXP` opcode.
///
/// The dynamic cost depends on the byte length of the exponent, so the
/// operands are popped before charging.
pub struct OpExpHandler;
impl OpcodeHandler for OpExpHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [base, exponent] = vm.current_call_frame.stack.pop()?;
        let cost = gas_cost::exp(vm.schedule, exponent)?;
        vm.current_call_frame.increase_consumed_gas(cost)?;

        let (res, _) = base.overflowing_pow(exponent);
        vm.current_call_frame.stack.push(res)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `SIGNEXTEND` opcode.
///
/// Sign-extend `value` from byte `index` (big-endian, 0 = least
/// significant). Indices of 31 and above leave the value unchanged.
pub struct OpSignExtendHandler;
impl OpcodeHandler for OpSignExtendHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::SIGNEXTEND)?;

        let [index, mut value] = vm.current_call_frame.stack.pop()?;
        if let Ok(index) = usize::try_from(index) {
            if index < 31 {
                let sign_bit = 8 * index + 7;
                if value.bit(sign_bit) {
                    value |= U256::MAX << (sign_bit + 1);
                } else {
                    value &= (U256::one() << (sign_bit + 1)) - 1;
                }
            }
        }
        vm.current_call_frame.stack.push(value)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Two's-complement negation: `!x + 1` modulo 2^256.
pub(crate) fn twos_complement(value: U256) -> U256 {
    (!value).overflowing_add(U256::one()).0
}
