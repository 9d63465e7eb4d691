//! Classification of frame halts.
//!
//! Normal halts (STOP, RETURN, SELFDESTRUCT) commit; REVERT rolls back
//! but keeps its unused gas; every other fault rolls back and consumes
//! everything the frame had left.

use crate::{
    errors::{ContextResult, ExceptionalHalt, TxResult, VMError},
    gas_cost,
    vm::VM,
};
use bytes::Bytes;

impl<'a> VM<'a> {
    /// A frame finished without a fault. Creation frames additionally
    /// pay the code-deposit charge and install the returned code.
    pub(crate) fn handle_opcode_result(&mut self) -> Result<ContextResult, VMError> {
        if self.current_call_frame.is_create {
            return self.finish_create_frame();
        }

        Ok(ContextResult {
            result: TxResult::Success,
            gas_used: self.current_call_frame.gas_used(),
            output: std::mem::take(&mut self.current_call_frame.output),
        })
    }

    /// A frame raised an error. Internal errors abort outright; REVERT
    /// keeps its remaining gas; exceptional halts consume everything.
    pub(crate) fn handle_opcode_error(&mut self, error: VMError) -> Result<ContextResult, VMError> {
        if error.is_internal() {
            return Err(error);
        }

        if error.is_revert_opcode() {
            return Ok(ContextResult {
                result: TxResult::Revert(error),
                gas_used: self.current_call_frame.gas_used(),
                output: std::mem::take(&mut self.current_call_frame.output),
            });
        }

        Ok(ContextResult {
            result: TxResult::Revert(error),
            gas_used: self.current_call_frame.gas_limit,
            output: Bytes::new(),
        })
    }

    /// Commit or roll back what the halted frame did to the world.
    pub(crate) fn handle_state_backup(&mut self, ctx_result: &ContextResult) -> Result<(), VMError> {
        let checkpoint = self.current_call_frame.checkpoint;
        if ctx_result.is_success() {
            self.commit_substate_backup();
            self.db.commit(checkpoint);
        } else {
            self.revert_substate_backup();
            self.db.revert_to(checkpoint);
        }
        Ok(())
    }

    /// Deploy the code an initcode frame returned.
    ///
    /// The deposit costs 200 gas per byte. If the frame cannot pay it,
    /// the outcome is fork-dependent: Homestead and later fail the
    /// creation consuming all gas; Frontier keeps the remaining gas and
    /// silently deploys nothing.
    fn finish_create_frame(&mut self) -> Result<ContextResult, VMError> {
        let contract_code = std::mem::take(&mut self.current_call_frame.output);
        let code_length: u64 = contract_code
            .len()
            .try_into()
            .map_err(|_| ExceptionalHalt::VeryLargeNumber)?;
        let deposit_cost = code_length
            .checked_mul(gas_cost::CODE_DEPOSIT_COST)
            .ok_or(ExceptionalHalt::OutOfGas)?;

        if self
            .current_call_frame
            .increase_consumed_gas(deposit_cost)
            .is_err()
        {
            if self.schedule.create_oog_consumes_gas {
                return Ok(ContextResult {
                    result: TxResult::Revert(ExceptionalHalt::OutOfGas.into()),
                    gas_used: self.current_call_frame.gas_limit,
                    output: Bytes::new(),
                });
            }
            // Frontier: the account simply ends up code-less.
            return Ok(ContextResult {
                result: TxResult::Success,
                gas_used: self.current_call_frame.gas_used(),
                output: Bytes::new(),
            });
        }

        self.db
            .set_code(self.current_call_frame.to, contract_code.clone());

        Ok(ContextResult {
            result: TxResult::Success,
            gas_used: self.current_call_frame.gas_used(),
            output: contract_code,
        })
    }
}
