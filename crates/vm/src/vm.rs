use crate::{
    account::Account,
    call_frame::{CallFrame, JumpTargets},
    db::WorldState,
    errors::{
        ContextResult, ExceptionalHalt, ExecutionReport, InternalError, OpcodeResult, TxResult,
        TxValidationError, VMError,
    },
    environment::Environment,
    gas_cost,
    gas_schedule::GasSchedule,
    opcodes::OpCodeFn,
    signature::{DefaultSignatureVerifier, SignatureVerifier},
    utils::{calculate_create_address, keccak256},
};
use bytes::Bytes;
use rustc_hash::FxHashMap;
use spectre_common::{Address, Transaction, TxKind, H256, U256};
use std::collections::HashSet;
use std::rc::Rc;

/// Transaction-scoped bookkeeping that rides alongside the world state.
///
/// Backed up and restored at the same points snapshots are taken, so a
/// reverted frame also forgets its refunds and destruction marks.
#[derive(Debug, Clone, Default)]
pub struct Substate {
    pub selfdestruct_set: HashSet<Address>,
    pub refunded_gas: u64,
}

pub struct VM<'a> {
    pub call_frames: Vec<CallFrame>,
    pub current_call_frame: CallFrame,
    pub env: Environment,
    pub substate: Substate,
    pub db: &'a mut WorldState,
    pub tx: Transaction,
    pub(crate) schedule: &'static GasSchedule,
    opcode_table: [OpCodeFn; 256],
    substate_backups: Vec<Substate>,
    jumpdest_cache: FxHashMap<H256, Rc<JumpTargets>>,
    verifier: Box<dyn SignatureVerifier>,
}

impl<'a> VM<'a> {
    pub fn new(env: Environment, db: &'a mut WorldState, tx: Transaction) -> Self {
        let mut env = env;
        env.origin = tx.sender;
        env.gas_price = tx.gas_price;

        let schedule = GasSchedule::for_fork(env.fork);
        let opcode_table = Self::build_opcode_table(env.fork);

        // Placeholder frame; the real one is installed by the setup of
        // each entry point.
        let initial_frame = CallFrame::new(
            Address::zero(),
            Address::zero(),
            Address::zero(),
            Bytes::new(),
            Rc::new(JumpTargets::default()),
            U256::zero(),
            Bytes::new(),
            false,
            false,
            0,
            0,
            0,
            0,
            db.snapshot(),
        );

        VM {
            call_frames: Vec::new(),
            current_call_frame: initial_frame,
            env,
            substate: Substate::default(),
            db,
            tx,
            schedule,
            opcode_table,
            substate_backups: Vec::new(),
            jumpdest_cache: FxHashMap::default(),
            verifier: Box::new(DefaultSignatureVerifier),
        }
    }

    /// Swap in an external signature-recovery collaborator.
    pub fn with_signature_verifier(mut self, verifier: Box<dyn SignatureVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Execute the transaction through the full state transition:
    /// validation, intrinsic gas, execution, refunds and fees.
    ///
    /// An `Err` means the transaction was rejected outright and had no
    /// effect on the state.
    pub fn execute(&mut self) -> Result<ExecutionReport, VMError> {
        let validation_checkpoint = self.db.snapshot();
        let intrinsic_gas = match self.prepare_execution() {
            Ok(intrinsic_gas) => intrinsic_gas,
            Err(error) => {
                self.db.revert_to(validation_checkpoint);
                return Err(error);
            }
        };
        // The upfront debit and nonce increment above survive even a
        // reverted execution.

        let frame_gas = self
            .tx
            .gas_limit
            .checked_sub(intrinsic_gas)
            .ok_or(InternalError::Underflow)?;

        let (callee, created_address) = match self.tx.to {
            TxKind::Call(address) => (address, None),
            TxKind::Create => {
                let address = calculate_create_address(self.tx.sender, self.tx.nonce);
                (address, Some(address))
            }
        };

        // A creation landing on an occupied address consumes everything.
        if created_address.is_some()
            && self
                .db
                .get_account(callee)
                .is_some_and(Account::create_would_collide)
        {
            let result = ContextResult {
                result: TxResult::Revert(ExceptionalHalt::CreateCollision.into()),
                gas_used: frame_gas,
                output: Bytes::new(),
            };
            return self.finalize_execution(result, intrinsic_gas, None, true);
        }

        self.setup_initial_frame(callee, created_address.is_some(), frame_gas)?;
        let result = self.run_execution()?;
        self.finalize_execution(result, intrinsic_gas, created_address, true)
    }

    /// Execute the transaction as a bare message, without the
    /// transaction preamble: no signature or nonce checks, no intrinsic
    /// gas, no fee transfers. The differential harness runs on this.
    pub fn execute_message(&mut self) -> Result<ExecutionReport, VMError> {
        if self.db.balance_of(self.tx.sender) < self.tx.value {
            return Err(TxValidationError::InsufficientFunds.into());
        }

        let (callee, created_address) = match self.tx.to {
            TxKind::Call(address) => (address, None),
            TxKind::Create => {
                let nonce = self.db.nonce_of(self.tx.sender);
                let address = calculate_create_address(self.tx.sender, nonce);
                (address, Some(address))
            }
        };

        self.setup_initial_frame(callee, created_address.is_some(), self.tx.gas_limit)?;
        let result = self.run_execution()?;
        self.finalize_execution(result, 0, created_address, false)
    }

    /// Main execution loop: one opcode per step until the outermost frame
    /// halts.
    pub(crate) fn run_execution(&mut self) -> Result<ContextResult, VMError> {
        loop {
            let opcode = self.current_call_frame.next_opcode();
            self.current_call_frame.pc = self.current_call_frame.pc.wrapping_add(1);

            let handler = self.opcode_table[usize::from(opcode)];
            let result = match handler.call(self) {
                Ok(OpcodeResult::Continue) => continue,
                Ok(OpcodeResult::Halt) => self.handle_opcode_result()?,
                Err(error) => self.handle_opcode_error(error)?,
            };

            // The outermost frame's result ends the loop; anything else
            // is folded into its parent.
            if self.call_frames.is_empty() {
                self.handle_state_backup(&result)?;
                return Ok(result);
            }
            self.handle_return(&result)?;
        }
    }

    // -- transaction preamble and postamble -----------------------------

    /// Validation plus the irreversible upfront charges. Returns the
    /// intrinsic gas.
    fn prepare_execution(&mut self) -> Result<u64, VMError> {
        let sender = self.tx.sender;

        self.verifier
            .verify(&self.tx, self.schedule.requires_low_s)?;

        let account_nonce = self.db.nonce_of(sender);
        if account_nonce != self.tx.nonce {
            return Err(TxValidationError::NonceMismatch {
                expected: account_nonce,
                actual: self.tx.nonce,
            }
            .into());
        }

        if self.tx.is_create() {
            if let Some(max) = self.schedule.max_initcode_size {
                if self.tx.data.len() > max {
                    return Err(TxValidationError::InitcodeSizeExceeded {
                        size: self.tx.data.len(),
                        max,
                    }
                    .into());
                }
            }
        }

        let intrinsic_gas = gas_cost::intrinsic_gas(self.schedule, &self.tx.data, self.tx.is_create())?;
        if intrinsic_gas > self.tx.gas_limit {
            return Err(TxValidationError::IntrinsicGasTooLow {
                required: intrinsic_gas,
                limit: self.tx.gas_limit,
            }
            .into());
        }

        let upfront_gas = U256::from(self.tx.gas_limit) * U256::from(self.tx.gas_price);
        let required = upfront_gas
            .checked_add(self.tx.value)
            .ok_or(TxValidationError::InsufficientFunds)?;
        if self.db.balance_of(sender) < required {
            return Err(TxValidationError::InsufficientFunds.into());
        }

        self.db.sub_balance(sender, upfront_gas)?;
        self.db.increment_nonce(sender)?;

        Ok(intrinsic_gas)
    }

    /// Build and install the outermost frame, transferring the call value
    /// under its checkpoint.
    fn setup_initial_frame(
        &mut self,
        callee: Address,
        is_create: bool,
        frame_gas: u64,
    ) -> Result<(), VMError> {
        let checkpoint = self.db.snapshot();

        let (bytecode, calldata) = if is_create {
            (self.tx.data.clone(), Bytes::new())
        } else {
            (self.db.code_of(callee), self.tx.data.clone())
        };
        let jump_targets = self.jump_targets_for(&bytecode);

        self.current_call_frame = CallFrame::new(
            self.tx.sender,
            callee,
            callee,
            bytecode,
            jump_targets,
            self.tx.value,
            calldata,
            false,
            is_create,
            frame_gas,
            0,
            0,
            0,
            checkpoint,
        );

        self.db.transfer(self.tx.sender, callee, self.tx.value)?;
        self.backup_substate();
        Ok(())
    }

    /// Apply refunds, credit the unused gas and pay the coinbase (for the
    /// full state transition only), then sweep the accounts scheduled for
    /// destruction.
    fn finalize_execution(
        &mut self,
        ctx_result: ContextResult,
        intrinsic_gas: u64,
        created_address: Option<Address>,
        charge_fees: bool,
    ) -> Result<ExecutionReport, VMError> {
        let total_gas_used = intrinsic_gas
            .checked_add(ctx_result.gas_used)
            .ok_or(InternalError::Overflow)?;
        let refund = gas_cost::capped_refund(self.substate.refunded_gas, total_gas_used);
        let gas_used = total_gas_used.saturating_sub(refund);
        let gas_remaining = self.tx.gas_limit.saturating_sub(total_gas_used);

        if charge_fees {
            let gas_price = U256::from(self.tx.gas_price);
            let sender_credit = U256::from(self.tx.gas_limit.saturating_sub(gas_used)) * gas_price;
            self.db.add_balance(self.tx.sender, sender_credit)?;
            let coinbase_fee = U256::from(gas_used) * gas_price;
            self.db.add_balance(self.env.coinbase, coinbase_fee)?;
        }

        let (logs, created_address) = if ctx_result.is_success() {
            for address in std::mem::take(&mut self.substate.selfdestruct_set) {
                self.db.remove_account(address);
            }
            (
                std::mem::take(&mut self.current_call_frame.logs),
                created_address,
            )
        } else {
            (Vec::new(), None)
        };

        self.db.clear_journal();

        Ok(ExecutionReport {
            result: ctx_result.result,
            gas_used,
            gas_remaining,
            gas_refunded: refund,
            output: ctx_result.output,
            logs,
            created_address,
        })
    }

    // -- frame and substate plumbing ------------------------------------

    pub(crate) fn add_call_frame(&mut self, frame: CallFrame) {
        let parent = std::mem::replace(&mut self.current_call_frame, frame);
        self.call_frames.push(parent);
    }

    pub(crate) fn pop_call_frame(&mut self) -> Result<CallFrame, VMError> {
        let parent = self
            .call_frames
            .pop()
            .ok_or(InternalError::MissingCallFrame)?;
        Ok(std::mem::replace(&mut self.current_call_frame, parent))
    }

    pub(crate) fn backup_substate(&mut self) {
        self.substate_backups.push(self.substate.clone());
    }

    pub(crate) fn commit_substate_backup(&mut self) {
        self.substate_backups.pop();
    }

    pub(crate) fn revert_substate_backup(&mut self) {
        if let Some(backup) = self.substate_backups.pop() {
            self.substate = backup;
        }
    }

    /// Valid-jumpdest bitsets are cached by code hash: code is immutable
    /// once deployed, so within a transaction the cache never goes stale.
    pub(crate) fn jump_targets_for(&mut self, code: &Bytes) -> Rc<JumpTargets> {
        let hash = keccak256(code);
        self.jumpdest_cache
            .entry(hash)
            .or_insert_with(|| Rc::new(JumpTargets::analyze(code)))
            .clone()
    }
}

/// Run one transaction through the full state transition.
pub fn apply_transaction(
    db: &mut WorldState,
    env: &Environment,
    tx: &Transaction,
) -> Result<ExecutionReport, VMError> {
    let mut vm = VM::new(env.clone(), db, tx.clone());
    vm.execute()
}

/// Apply a sequence of transactions in order. A rejected transaction
/// contributes its error and leaves the state untouched.
pub fn apply_block(
    db: &mut WorldState,
    env: &Environment,
    txs: &[Transaction],
) -> Vec<Result<ExecutionReport, VMError>> {
    txs.iter()
        .map(|tx| apply_transaction(db, env, tx))
        .collect()
}
