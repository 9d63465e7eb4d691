//! # Duplication operations
//!
//! Includes the following opcodes:
//!   - `DUP1` to `DUP16`

use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    opcode_handlers::OpcodeHandler,
    vm::VM,
};

/// Implementation for the `DUPn` opcodes; `DEPTH` is 0-indexed from the
/// top, so DUP1 duplicates depth 0.
pub struct OpDupHandler<const DEPTH: usize>;
impl<const DEPTH: usize> OpcodeHandler for OpDupHandler<DEPTH> {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        vm.current_call_frame.increase_consumed_gas(gas_cost::DUPN)?;

        vm.current_call_frame.stack.dup::<DEPTH>()?;

        Ok(OpcodeResult::Continue)
    }
}
