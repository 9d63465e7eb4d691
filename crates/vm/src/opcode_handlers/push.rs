//! # Push operations
//!
//! Includes the following opcodes:
//!   - `PUSH0` (Shanghai and later)
//!   - `PUSH1` to `PUSH32`

use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    opcode_handlers::OpcodeHandler,
    vm::VM,
};
use spectre_common::U256;

/// Generic PUSH operation, monomorphized per immediate width.
///
/// The program counter already points at the first immediate byte when
/// the handler runs; immediates that run past the end of the code read as
/// zero on the missing side.
pub struct OpPushHandler<const N: usize>;
impl<const N: usize> OpcodeHandler for OpPushHandler<N> {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let frame = &mut vm.current_call_frame;
        frame.increase_consumed_gas(gas_cost::PUSHN)?;

        let start = frame.pc;
        let end = start.saturating_add(N).min(frame.bytecode.len());
        let immediate = frame.bytecode.get(start..end).unwrap_or_default();

        // Bytes missing at the end of the code count as trailing zeros,
        // so the immediate is left-aligned within its N-byte field.
        let mut padded = [0u8; 32];
        padded[32 - N..32 - N + immediate.len()].copy_from_slice(immediate);
        let value = U256::from_big_endian(&padded[32 - N..]);

        frame.stack.push(value)?;
        frame.pc = frame.pc.saturating_add(N);

        Ok(OpcodeResult::Continue)
    }
}

/// Implementation for the `PUSH0` opcode.
pub struct OpPush0Handler;
impl OpcodeHandler for OpPush0Handler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame
            .increase_consumed_gas(gas_cost::PUSH0)?;

        vm.current_call_frame.stack.push(U256::zero())?;

        Ok(OpcodeResult::Continue)
    }
}
