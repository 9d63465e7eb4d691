//! # Logging operations
//!
//! Includes the following opcodes:
//!   - `LOG0` to `LOG4`

use crate::{
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    gas_cost,
    memory::calculate_memory_size,
    opcode_handlers::OpcodeHandler,
    utils::size_offset_to_usize,
    vm::VM,
};
use spectre_common::Log;

/// Implementation for the `LOGn` opcodes, monomorphized per topic count.
pub struct OpLogHandler<const N: usize>;
impl<const N: usize> OpcodeHandler for OpLogHandler<N> {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        if vm.current_call_frame.is_static {
            return Err(ExceptionalHalt::OpcodeNotAllowedInStaticContext.into());
        }

        let [offset, size] = vm.current_call_frame.stack.pop()?;
        let (size, offset) = size_offset_to_usize(size, offset)?;
        let topics: [_; N] = vm.current_call_frame.stack.pop()?;

        let new_memory_size = calculate_memory_size(offset.into(), size)?;
        let cost = gas_cost::log(new_memory_size, vm.current_call_frame.memory.len(), size, N)?;
        vm.current_call_frame.increase_consumed_gas(cost)?;

        let data = vm.current_call_frame.memory.load_range(offset, size)?;
        let log = Log {
            address: vm.current_call_frame.to,
            topics: topics.to_vec(),
            data,
        };
        vm.current_call_frame.logs.push(log);

        Ok(OpcodeResult::Continue)
    }
}
