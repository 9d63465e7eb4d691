use crate::{
    constants::STACK_LIMIT,
    db::Snapshot,
    errors::{ExceptionalHalt, VMError},
    memory::Memory,
};
use bytes::Bytes;
use spectre_common::{Address, Log, U256};
use std::rc::Rc;

/// The operand stack, bounded at 1024 entries.
#[derive(Debug, Clone, Default)]
pub struct Stack {
    values: Vec<U256>,
}

impl Stack {
    pub fn push(&mut self, value: U256) -> Result<(), VMError> {
        if self.values.len() >= STACK_LIMIT {
            return Err(ExceptionalHalt::StackOverflow.into());
        }
        self.values.push(value);
        Ok(())
    }

    pub fn pop1(&mut self) -> Result<U256, VMError> {
        self.values
            .pop()
            .ok_or(ExceptionalHalt::StackUnderflow.into())
    }

    /// Pop `N` values, topmost first.
    pub fn pop<const N: usize>(&mut self) -> Result<[U256; N], VMError> {
        if self.values.len() < N {
            return Err(ExceptionalHalt::StackUnderflow.into());
        }
        let mut out = [U256::zero(); N];
        for slot in out.iter_mut() {
            *slot = self.values.pop().unwrap_or_default();
        }
        Ok(out)
    }

    /// Read the value at `depth` below the top without popping.
    pub fn peek(&self, depth: usize) -> Result<U256, VMError> {
        let index = self
            .values
            .len()
            .checked_sub(depth + 1)
            .ok_or(ExceptionalHalt::StackUnderflow)?;
        self.values
            .get(index)
            .copied()
            .ok_or(ExceptionalHalt::StackUnderflow.into())
    }

    /// Duplicate the value at `DEPTH` (0-indexed from the top) onto the top.
    pub fn dup<const DEPTH: usize>(&mut self) -> Result<(), VMError> {
        let value = self.peek(DEPTH)?;
        self.push(value)
    }

    /// Swap the top value with the one `DEPTH` positions below it.
    pub fn swap<const DEPTH: usize>(&mut self) -> Result<(), VMError> {
        let top = self
            .values
            .len()
            .checked_sub(1)
            .ok_or(ExceptionalHalt::StackUnderflow)?;
        let other = top
            .checked_sub(DEPTH)
            .ok_or(ExceptionalHalt::StackUnderflow)?;
        self.values.swap(top, other);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Bitset of valid jump destinations for one code blob.
///
/// A position is valid iff the byte there is JUMPDEST (0x5B) and it is
/// not inside the immediate data of a PUSHn instruction. One linear scan
/// that skips n bytes after each PUSHn settles both conditions; the
/// result depends only on the code, so it is cached by code hash.
#[derive(Debug, Default)]
pub struct JumpTargets {
    bits: Vec<u64>,
}

const JUMPDEST: u8 = 0x5B;
const PUSH1: u8 = 0x60;
const PUSH32: u8 = 0x7F;

impl JumpTargets {
    pub fn analyze(code: &[u8]) -> Self {
        let mut bits = vec![0u64; code.len().div_ceil(64)];
        let mut pc = 0;
        while pc < code.len() {
            let byte = code[pc];
            if byte == JUMPDEST {
                bits[pc / 64] |= 1 << (pc % 64);
            }
            if (PUSH1..=PUSH32).contains(&byte) {
                pc += usize::from(byte - PUSH1) + 1;
            }
            pc += 1;
        }
        JumpTargets { bits }
    }

    pub fn is_valid(&self, target: usize) -> bool {
        self.bits
            .get(target / 64)
            .map(|word| word & (1 << (target % 64)) != 0)
            .unwrap_or(false)
    }
}

/// Execution context of one active call.
#[derive(Debug)]
pub struct CallFrame {
    /// Immediate caller of this frame.
    pub msg_sender: Address,
    /// Address whose storage and balance this frame operates on.
    pub to: Address,
    /// Address the running code was loaded from (differs from `to` for
    /// CALLCODE and DELEGATECALL).
    pub code_address: Address,
    pub bytecode: Bytes,
    pub jump_targets: Rc<JumpTargets>,
    pub msg_value: U256,
    pub calldata: Bytes,
    pub is_static: bool,
    pub is_create: bool,
    pub gas_limit: u64,
    pub gas_remaining: u64,
    pub depth: usize,
    pub pc: usize,
    pub stack: Stack,
    pub memory: Memory,
    /// Logs emitted by this frame; merged into the parent on success,
    /// dropped on revert.
    pub logs: Vec<Log>,
    /// Return data of the most recent sub-call.
    pub sub_return_data: Bytes,
    /// Bytes this frame returns (RETURN/REVERT payload, or the deployed
    /// code for creation frames).
    pub output: Bytes,
    /// Where the parent wants this frame's return data copied.
    pub ret_offset: usize,
    pub ret_size: usize,
    /// World-state position at frame entry, for revert.
    pub checkpoint: Snapshot,
}

impl CallFrame {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        msg_sender: Address,
        to: Address,
        code_address: Address,
        bytecode: Bytes,
        jump_targets: Rc<JumpTargets>,
        msg_value: U256,
        calldata: Bytes,
        is_static: bool,
        is_create: bool,
        gas_limit: u64,
        depth: usize,
        ret_offset: usize,
        ret_size: usize,
        checkpoint: Snapshot,
    ) -> Self {
        CallFrame {
            msg_sender,
            to,
            code_address,
            bytecode,
            jump_targets,
            msg_value,
            calldata,
            is_static,
            is_create,
            gas_limit,
            gas_remaining: gas_limit,
            depth,
            pc: 0,
            stack: Stack::default(),
            memory: Memory::new(),
            logs: Vec::new(),
            sub_return_data: Bytes::new(),
            output: Bytes::new(),
            ret_offset,
            ret_size,
            checkpoint,
        }
    }

    /// Charge gas; failing the charge is the out-of-gas fault.
    pub fn increase_consumed_gas(&mut self, cost: u64) -> Result<(), VMError> {
        self.gas_remaining = self
            .gas_remaining
            .checked_sub(cost)
            .ok_or(ExceptionalHalt::OutOfGas)?;
        Ok(())
    }

    /// Hand gas back (unused sub-call gas, refused forwards).
    pub fn return_gas(&mut self, gas: u64) {
        self.gas_remaining = self.gas_remaining.saturating_add(gas);
    }

    pub fn gas_used(&self) -> u64 {
        self.gas_limit.saturating_sub(self.gas_remaining)
    }

    /// Byte at the program counter; running past the end is an implicit
    /// STOP.
    pub fn next_opcode(&self) -> u8 {
        self.bytecode.get(self.pc).copied().unwrap_or(0x00)
    }

    pub fn valid_jump_target(&self, target: usize) -> bool {
        self.jump_targets.is_valid(target)
    }
}
