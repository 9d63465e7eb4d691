//! # System operations
//!
//! Includes the following opcodes:
//!   - `CALL`, `CALLCODE`, `DELEGATECALL`, `STATICCALL`
//!   - `CREATE`, `CREATE2`
//!   - `RETURN`, `REVERT`, `SELFDESTRUCT`

use crate::{
    account::Account,
    call_frame::CallFrame,
    constants::{CALL_DEPTH_LIMIT, FAIL, SUCCESS},
    errors::{ContextResult, ExceptionalHalt, InternalError, OpcodeResult, TxResult, VMError},
    gas_cost,
    memory::calculate_memory_size,
    opcode_handlers::OpcodeHandler,
    utils::{
        address_to_word, calculate_create2_address, calculate_create_address, size_offset_to_usize,
        word_to_address,
    },
    vm::VM,
};
use bytes::Bytes;
use spectre_common::{Address, U256};

pub struct OpCallHandler;
impl OpcodeHandler for OpCallHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [gas, callee, value, args_offset, args_size, ret_offset, ret_size] =
            vm.current_call_frame.stack.pop()?;
        let callee = word_to_address(callee);
        let (args_size, args_offset) = size_offset_to_usize(args_size, args_offset)?;
        let (ret_size, ret_offset) = size_offset_to_usize(ret_size, ret_offset)?;

        // Value transfers are state modifications.
        if vm.current_call_frame.is_static && !value.is_zero() {
            return Err(ExceptionalHalt::OpcodeNotAllowedInStaticContext.into());
        }

        let new_memory_size = call_memory_size(args_offset, args_size, ret_offset, ret_size)?;
        let (cost, gas_limit) = gas_cost::call(
            vm.schedule,
            new_memory_size,
            vm.current_call_frame.memory.len(),
            value,
            vm.db.is_empty(callee),
            gas,
            vm.current_call_frame.gas_remaining,
        )?;
        vm.current_call_frame.increase_consumed_gas(cost)?;

        // The expansion is already paid for; make it observable (MSIZE)
        // and ready to receive the return data.
        vm.current_call_frame.memory.resize(new_memory_size)?;
        let calldata = vm
            .current_call_frame
            .memory
            .load_range(args_offset, args_size)?;

        vm.generic_call(
            gas_limit,
            value,
            vm.current_call_frame.to,
            callee,
            callee,
            true,
            vm.current_call_frame.is_static,
            calldata,
            ret_offset,
            ret_size,
        )
    }
}

pub struct OpCallCodeHandler;
impl OpcodeHandler for OpCallCodeHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [gas, code_source, value, args_offset, args_size, ret_offset, ret_size] =
            vm.current_call_frame.stack.pop()?;
        let code_source = word_to_address(code_source);
        let (args_size, args_offset) = size_offset_to_usize(args_size, args_offset)?;
        let (ret_size, ret_offset) = size_offset_to_usize(ret_size, ret_offset)?;

        let new_memory_size = call_memory_size(args_offset, args_size, ret_offset, ret_size)?;
        let (cost, gas_limit) = gas_cost::callcode(
            vm.schedule,
            new_memory_size,
            vm.current_call_frame.memory.len(),
            value,
            gas,
            vm.current_call_frame.gas_remaining,
        )?;
        vm.current_call_frame.increase_consumed_gas(cost)?;

        vm.current_call_frame.memory.resize(new_memory_size)?;
        let calldata = vm
            .current_call_frame
            .memory
            .load_range(args_offset, args_size)?;

        // Runs the callee's code against this frame's own account.
        vm.generic_call(
            gas_limit,
            value,
            vm.current_call_frame.to,
            vm.current_call_frame.to,
            code_source,
            true,
            vm.current_call_frame.is_static,
            calldata,
            ret_offset,
            ret_size,
        )
    }
}

pub struct OpDelegateCallHandler;
impl OpcodeHandler for OpDelegateCallHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [gas, code_source, args_offset, args_size, ret_offset, ret_size] =
            vm.current_call_frame.stack.pop()?;
        let code_source = word_to_address(code_source);
        let (args_size, args_offset) = size_offset_to_usize(args_size, args_offset)?;
        let (ret_size, ret_offset) = size_offset_to_usize(ret_size, ret_offset)?;

        let new_memory_size = call_memory_size(args_offset, args_size, ret_offset, ret_size)?;
        let (cost, gas_limit) = gas_cost::plain_call(
            vm.schedule,
            new_memory_size,
            vm.current_call_frame.memory.len(),
            gas,
            vm.current_call_frame.gas_remaining,
        )?;
        vm.current_call_frame.increase_consumed_gas(cost)?;

        vm.current_call_frame.memory.resize(new_memory_size)?;
        let calldata = vm
            .current_call_frame
            .memory
            .load_range(args_offset, args_size)?;

        // Caller and value are inherited from the current context.
        vm.generic_call(
            gas_limit,
            vm.current_call_frame.msg_value,
            vm.current_call_frame.msg_sender,
            vm.current_call_frame.to,
            code_source,
            false,
            vm.current_call_frame.is_static,
            calldata,
            ret_offset,
            ret_size,
        )
    }
}

pub struct OpStaticCallHandler;
impl OpcodeHandler for OpStaticCallHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [gas, callee, args_offset, args_size, ret_offset, ret_size] =
            vm.current_call_frame.stack.pop()?;
        let callee = word_to_address(callee);
        let (args_size, args_offset) = size_offset_to_usize(args_size, args_offset)?;
        let (ret_size, ret_offset) = size_offset_to_usize(ret_size, ret_offset)?;

        let new_memory_size = call_memory_size(args_offset, args_size, ret_offset, ret_size)?;
        let (cost, gas_limit) = gas_cost::plain_call(
            vm.schedule,
            new_memory_size,
            vm.current_call_frame.memory.len(),
            gas,
            vm.current_call_frame.gas_remaining,
        )?;
        vm.current_call_frame.increase_consumed_gas(cost)?;

        vm.current_call_frame.memory.resize(new_memory_size)?;
        let calldata = vm
            .current_call_frame
            .memory
            .load_range(args_offset, args_size)?;

        vm.generic_call(
            gas_limit,
            U256::zero(),
            vm.current_call_frame.to,
            callee,
            callee,
            false,
            true,
            calldata,
            ret_offset,
            ret_size,
        )
    }
}

pub struct OpReturnHandler;
impl OpcodeHandler for OpReturnHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [offset, size] = vm.current_call_frame.stack.pop()?;
        let (size, offset) = size_offset_to_usize(size, offset)?;

        let new_memory_size = calculate_memory_size(offset.into(), size)?;
        let cost = gas_cost::exit_opcode(new_memory_size, vm.current_call_frame.memory.len())?;
        vm.current_call_frame.increase_consumed_gas(cost)?;

        if size != 0 {
            vm.current_call_frame.output =
                vm.current_call_frame.memory.load_range(offset, size)?;
        }

        Ok(OpcodeResult::Halt)
    }
}

pub struct OpRevertHandler;
impl OpcodeHandler for OpRevertHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [offset, size] = vm.current_call_frame.stack.pop()?;
        let (size, offset) = size_offset_to_usize(size, offset)?;

        let new_memory_size = calculate_memory_size(offset.into(), size)?;
        let cost = gas_cost::exit_opcode(new_memory_size, vm.current_call_frame.memory.len())?;
        vm.current_call_frame.increase_consumed_gas(cost)?;

        if size != 0 {
            vm.current_call_frame.output =
                vm.current_call_frame.memory.load_range(offset, size)?;
        }

        Err(VMError::RevertOpcode)
    }
}

pub struct OpCreateHandler;
impl OpcodeHandler for OpCreateHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [value, code_offset, code_size] = vm.current_call_frame.stack.pop()?;
        let (code_size, code_offset) = size_offset_to_usize(code_size, code_offset)?;

        let new_memory_size = calculate_memory_size(code_offset.into(), code_size)?;
        let cost = gas_cost::create(
            vm.schedule,
            new_memory_size,
            vm.current_call_frame.memory.len(),
            code_size,
        )?;
        vm.current_call_frame.increase_consumed_gas(cost)?;

        vm.generic_create(value, code_offset, code_size, None)
    }
}

pub struct OpCreate2Handler;
impl OpcodeHandler for OpCreate2Handler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        let [value, code_offset, code_size, salt] = vm.current_call_frame.stack.pop()?;
        let (code_size, code_offset) = size_offset_to_usize(code_size, code_offset)?;

        let new_memory_size = calculate_memory_size(code_offset.into(), code_size)?;
        let cost = gas_cost::create(
            vm.schedule,
            new_memory_size,
            vm.current_call_frame.memory.len(),
            code_size,
        )?;
        vm.current_call_frame.increase_consumed_gas(cost)?;

        vm.generic_create(value, code_offset, code_size, Some(salt))
    }
}

pub struct OpSelfDestructHandler;
impl OpcodeHandler for OpSelfDestructHandler {
    #[inline(always)]
    fn eval(vm: &mut VM<'_>) -> Result<OpcodeResult, VMError> {
        if vm.current_call_frame.is_static {
            return Err(ExceptionalHalt::OpcodeNotAllowedInStaticContext.into());
        }

        let beneficiary = word_to_address(vm.current_call_frame.stack.pop1()?);
        vm.current_call_frame
            .increase_consumed_gas(vm.schedule.selfdestruct)?;

        let this = vm.current_call_frame.to;
        let balance = vm.db.balance_of(this);
        vm.db.add_balance(beneficiary, balance)?;
        vm.db.sub_balance(this, balance)?;

        // The refund is scheduled once per account per transaction.
        if vm.substate.selfdestruct_set.insert(this) {
            vm.substate.refunded_gas = vm
                .substate
                .refunded_gas
                .checked_add(vm.schedule.selfdestruct_refund)
                .ok_or(InternalError::Overflow)?;
        }

        Ok(OpcodeResult::Halt)
    }
}

/// Memory the caller must cover for a call: argument and return regions
/// share one expansion charge.
fn call_memory_size(
    args_offset: usize,
    args_size: usize,
    ret_offset: usize,
    ret_size: usize,
) -> Result<usize, VMError> {
    let args_region = calculate_memory_size(args_offset.into(), args_size)?;
    let ret_region = calculate_memory_size(ret_offset.into(), ret_size)?;
    Ok(args_region.max(ret_region))
}

impl<'a> VM<'a> {
    /// Common path for the CALL family. The caller has already charged
    /// the opcode cost; this reserves `gas_limit` for the child, spins up
    /// its frame, and transfers value if requested.
    #[allow(clippy::too_many_arguments)]
    pub fn generic_call(
        &mut self,
        gas_limit: u64,
        value: U256,
        msg_sender: Address,
        to: Address,
        code_address: Address,
        should_transfer_value: bool,
        is_static: bool,
        calldata: Bytes,
        ret_offset: usize,
        ret_size: usize,
    ) -> Result<OpcodeResult, VMError> {
        // The opcode's charge already covered the forwarded gas; only the
        // stipend rides on top of what the caller paid.
        self.current_call_frame.sub_return_data = Bytes::new();

        // A sender short on funds fails the sub-call without invoking the
        // child; the reserved gas flows back.
        if should_transfer_value
            && !value.is_zero()
            && self.db.balance_of(msg_sender) < value
        {
            return self.abort_sub_call(gas_limit);
        }

        let new_depth = self
            .current_call_frame
            .depth
            .checked_add(1)
            .ok_or(InternalError::Overflow)?;
        if new_depth > CALL_DEPTH_LIMIT {
            return self.abort_sub_call(gas_limit);
        }

        let checkpoint = self.db.snapshot();
        let bytecode = self.db.code_of(code_address);
        let jump_targets = self.jump_targets_for(&bytecode);

        let new_call_frame = CallFrame::new(
            msg_sender,
            to,
            code_address,
            bytecode,
            jump_targets,
            value,
            calldata,
            is_static,
            false,
            gas_limit,
            new_depth,
            ret_offset,
            ret_size,
            checkpoint,
        );
        self.add_call_frame(new_call_frame);

        if should_transfer_value {
            self.db.transfer(msg_sender, to, value)?;
        }
        self.backup_substate();

        Ok(OpcodeResult::Continue)
    }

    /// Common path for CREATE and CREATE2.
    pub fn generic_create(
        &mut self,
        value: U256,
        code_offset: usize,
        code_size: usize,
        salt: Option<U256>,
    ) -> Result<OpcodeResult, VMError> {
        if self.current_call_frame.is_static {
            return Err(ExceptionalHalt::OpcodeNotAllowedInStaticContext.into());
        }

        // Oversized initcode fails before any frame is set up.
        if let Some(max) = self.schedule.max_initcode_size {
            if code_size > max {
                return Err(ExceptionalHalt::OutOfGas.into());
            }
        }

        self.current_call_frame.sub_return_data = Bytes::new();

        // Reserve the gas the initcode frame will run on.
        let gas_limit =
            gas_cost::max_message_call_gas(self.schedule, self.current_call_frame.gas_remaining);
        self.current_call_frame.increase_consumed_gas(gas_limit)?;

        let initcode = self
            .current_call_frame
            .memory
            .load_range(code_offset, code_size)?;

        let deployer = self.current_call_frame.to;
        let deployer_balance = self.db.balance_of(deployer);
        let deployer_nonce = self.db.nonce_of(deployer);

        let new_address = match salt {
            Some(salt) => calculate_create2_address(deployer, salt, &initcode),
            None => calculate_create_address(deployer, deployer_nonce),
        };

        let new_depth = self
            .current_call_frame
            .depth
            .checked_add(1)
            .ok_or(InternalError::Overflow)?;

        // These fail the create but hand the reserved gas back.
        if deployer_balance < value
            || new_depth > CALL_DEPTH_LIMIT
            || deployer_nonce == u64::MAX
        {
            return self.abort_sub_call(gas_limit);
        }

        self.db.increment_nonce(deployer)?;

        // An occupied target address eats the reserved gas.
        if self
            .db
            .get_account(new_address)
            .is_some_and(Account::create_would_collide)
        {
            self.current_call_frame.stack.push(FAIL)?;
            return Ok(OpcodeResult::Continue);
        }

        let checkpoint = self.db.snapshot();
        let jump_targets = self.jump_targets_for(&initcode);

        let new_call_frame = CallFrame::new(
            deployer,
            new_address,
            new_address,
            initcode,
            jump_targets,
            value,
            Bytes::new(),
            false,
            true,
            gas_limit,
            new_depth,
            0,
            0,
            checkpoint,
        );
        self.add_call_frame(new_call_frame);

        self.db.transfer(deployer, new_address, value)?;
        self.backup_substate();

        Ok(OpcodeResult::Continue)
    }

    /// Fail a sub-call before the child runs: the reserved gas flows back
    /// and the failure flag lands on the stack.
    fn abort_sub_call(&mut self, gas_limit: u64) -> Result<OpcodeResult, VMError> {
        self.current_call_frame.return_gas(gas_limit);
        self.current_call_frame.stack.push(FAIL)?;
        Ok(OpcodeResult::Continue)
    }

    /// Resolve a finished frame against its parent.
    pub(crate) fn handle_return(&mut self, ctx_result: &ContextResult) -> Result<(), VMError> {
        self.handle_state_backup(ctx_result)?;
        let executed_call_frame = self.pop_call_frame()?;

        if executed_call_frame.is_create {
            self.handle_return_create(executed_call_frame, ctx_result)
        } else {
            self.handle_return_call(executed_call_frame, ctx_result)
        }
    }

    fn handle_return_call(
        &mut self,
        executed_call_frame: CallFrame,
        ctx_result: &ContextResult,
    ) -> Result<(), VMError> {
        let unused_gas = executed_call_frame
            .gas_limit
            .checked_sub(ctx_result.gas_used)
            .ok_or(InternalError::Underflow)?;

        let parent = &mut self.current_call_frame;
        parent.return_gas(unused_gas);

        // Return data lands in the parent's buffer, and up to ret_size
        // bytes of it are copied into the parent's memory.
        let copy_len = ctx_result.output.len().min(executed_call_frame.ret_size);
        let to_copy = ctx_result
            .output
            .get(..copy_len)
            .ok_or(InternalError::Slicing)?
            .to_vec();
        parent
            .memory
            .store_data(executed_call_frame.ret_offset, &to_copy)?;
        parent.sub_return_data = ctx_result.output.clone();

        match ctx_result.result {
            TxResult::Success => {
                parent.logs.extend(executed_call_frame.logs);
                parent.stack.push(SUCCESS)?;
            }
            TxResult::Revert(_) => {
                parent.stack.push(FAIL)?;
            }
        }
        Ok(())
    }

    fn handle_return_create(
        &mut self,
        executed_call_frame: CallFrame,
        ctx_result: &ContextResult,
    ) -> Result<(), VMError> {
        let unused_gas = executed_call_frame
            .gas_limit
            .checked_sub(ctx_result.gas_used)
            .ok_or(InternalError::Underflow)?;

        let parent = &mut self.current_call_frame;
        parent.return_gas(unused_gas);

        match &ctx_result.result {
            TxResult::Success => {
                parent.logs.extend(executed_call_frame.logs);
                parent.stack.push(address_to_word(executed_call_frame.to))?;
            }
            TxResult::Revert(err) => {
                // Only an explicit REVERT exposes its payload to the
                // creator.
                if err.is_revert_opcode() {
                    parent.sub_return_data = ctx_result.output.clone();
                }
                parent.stack.push(FAIL)?;
            }
        }
        Ok(())
    }
}
