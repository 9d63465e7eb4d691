//! Differential execution across fork pairs.
//!
//! Each candidate runs twice from an identical pre-state, once per fork,
//! and the observable outcomes are compared field by field. The first
//! disagreement is classified; a data table of fork-boundary rules then
//! decides whether the divergence is the documented consequence of a
//! rule change (expected) or a finding worth reporting.

use crate::generator::GeneratedBytecode;
use bytes::Bytes;
use spectre_common::{Address, Fork, Log, Transaction, U256};
use spectre_vm::{Account, Environment, VMError, WorldState, VM};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// How two runs of the same program first disagreed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DivergenceKind {
    SuccessMismatch,
    ReturnDataMismatch,
    GasMismatch,
    LogsMismatch,
    StateMismatch,
}

/// One execution's observable outcome.
#[derive(Debug, Clone)]
pub struct ExecutionTrace {
    pub fork: Fork,
    pub success: bool,
    pub gas_used: u64,
    pub return_data: Bytes,
    pub logs: Vec<Log>,
    pub post_state: StateProjection,
}

/// Post-state projected to what consensus cares about, with empty
/// accounts dropped (they read identically to absent ones).
pub type StateProjection = BTreeMap<Address, ProjectedAccount>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectedAccount {
    pub balance: U256,
    pub nonce: u64,
    pub code: Bytes,
    pub storage: BTreeMap<U256, U256>,
}

/// A divergence found between two forks.
#[derive(Debug, Clone)]
pub struct Divergence {
    pub kind: DivergenceKind,
    pub bytecode: GeneratedBytecode,
    pub trace_a: ExecutionTrace,
    pub trace_b: ExecutionTrace,
    pub description: String,
}

impl Divergence {
    /// True when a fork-boundary rule fully explains the difference.
    pub fn is_expected(&self) -> bool {
        matching_rule(self).is_some()
    }

    /// The rule that explains this divergence, if any.
    pub fn expected_by(&self) -> Option<&'static ExpectedDivergenceRule> {
        matching_rule(self)
    }
}

/// A documented fork-boundary rule that legitimately changes behavior.
///
/// The table below is the harness's signal-to-noise filter: a divergence
/// matched by any rule is counted but not reported.
pub struct ExpectedDivergenceRule {
    pub name: &'static str,
    pub description: &'static str,
    applies: fn(&Divergence) -> bool,
}

/// True when exactly one of the two forks has activated `boundary`.
fn straddles(a: Fork, b: Fork, boundary: Fork) -> bool {
    (a >= boundary) != (b >= boundary)
}

fn code_contains_opcode(div: &Divergence, byte: u8) -> bool {
    div.bytecode.code.contains(&byte)
}

pub static EXPECTED_DIVERGENCE_RULES: &[ExpectedDivergenceRule] = &[
    ExpectedDivergenceRule {
        name: "push0-activation",
        description: "PUSH0 (0x5f) executes under Shanghai and faults before it",
        applies: |div| {
            code_contains_opcode(div, 0x5F)
                && straddles(div.trace_a.fork, div.trace_b.fork, Fork::Shanghai)
        },
    },
    ExpectedDivergenceRule {
        name: "create-deposit-rule",
        description: "a creation that cannot pay the code deposit consumes all gas from Homestead on",
        applies: |div| {
            (code_contains_opcode(div, 0xF0) || code_contains_opcode(div, 0xF5))
                && straddles(div.trace_a.fork, div.trace_b.fork, Fork::Homestead)
        },
    },
    ExpectedDivergenceRule {
        name: "exp-repricing",
        description: "EXP's per-byte cost rose from 10 to 50 at Homestead",
        applies: |div| {
            code_contains_opcode(div, 0x0A)
                && straddles(div.trace_a.fork, div.trace_b.fork, Fork::Homestead)
        },
    },
    ExpectedDivergenceRule {
        name: "call-repricing",
        description: "CALL-family base cost rose from 40 to 700 at Homestead, with the 63/64 forwarding cap",
        applies: |div| {
            [0xF1u8, 0xF2, 0xF4, 0xFA]
                .iter()
                .any(|&byte| code_contains_opcode(div, byte))
                && straddles(div.trace_a.fork, div.trace_b.fork, Fork::Homestead)
        },
    },
    ExpectedDivergenceRule {
        name: "selfdestruct-repricing",
        description: "SELFDESTRUCT went from free to 5000 gas at Homestead",
        applies: |div| {
            code_contains_opcode(div, 0xFF)
                && straddles(div.trace_a.fork, div.trace_b.fork, Fork::Homestead)
        },
    },
    ExpectedDivergenceRule {
        name: "initcode-metering",
        description: "Shanghai meters and bounds initcode (2 gas per word, 49152-byte cap)",
        applies: |div| {
            (code_contains_opcode(div, 0xF0) || code_contains_opcode(div, 0xF5))
                && straddles(div.trace_a.fork, div.trace_b.fork, Fork::Shanghai)
        },
    },
];

fn matching_rule(div: &Divergence) -> Option<&'static ExpectedDivergenceRule> {
    EXPECTED_DIVERGENCE_RULES
        .iter()
        .find(|rule| (rule.applies)(div))
}

/// Outcome of one candidate in a campaign.
#[derive(Debug)]
pub enum CandidateOutcome {
    Agreement,
    Diverged(Divergence),
    /// The candidate blew its wall-clock budget; not a finding.
    Timeout,
}

/// Aggregated campaign results.
#[derive(Debug, Default)]
pub struct DifferentialResult {
    pub total_executions: usize,
    pub timeouts: usize,
    pub expected_divergences: usize,
    pub unexpected_divergences: usize,
    /// Only the unexpected divergences are retained.
    pub divergences: Vec<Divergence>,
}

impl DifferentialResult {
    pub fn divergence_rate(&self) -> f64 {
        if self.total_executions == 0 {
            return 0.0;
        }
        (self.expected_divergences + self.unexpected_divergences) as f64
            / self.total_executions as f64
            * 100.0
    }
}

/// Well-known addresses of the disposable test world.
fn sender_address() -> Address {
    Address::from_low_u64_be(0x01)
}

fn contract_address() -> Address {
    Address::from_low_u64_be(0x02)
}

pub struct DifferentialExecutor {
    pub fork_a: Fork,
    pub fork_b: Fork,
    pub gas_limit: u64,
    /// Per-candidate wall-clock budget.
    pub time_budget: Duration,
}

impl DifferentialExecutor {
    pub fn new(fork_a: Fork, fork_b: Fork) -> Self {
        DifferentialExecutor {
            fork_a,
            fork_b,
            gas_limit: 1_000_000,
            time_budget: Duration::from_secs(2),
        }
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    /// Fresh pre-state: a funded sender and the candidate deployed as a
    /// contract. Each candidate gets its own world.
    fn build_state(&self, code: &Bytes) -> WorldState {
        let mut state = WorldState::new();
        state.insert_account(
            sender_address(),
            Account::with_balance(U256::exp10(18)),
        );
        state.insert_account(contract_address(), Account::with_code(code.clone()));
        state
    }

    /// Execute the candidate under one fork.
    pub fn execute_single(&self, code: &Bytes, fork: Fork) -> Result<ExecutionTrace, VMError> {
        let mut state = self.build_state(code);
        let env = Environment::for_fork(fork);

        let mut tx = Transaction::call(
            sender_address(),
            contract_address(),
            Bytes::new(),
            self.gas_limit,
        );
        tx.gas_price = 0;

        let report = {
            let mut vm = VM::new(env, &mut state, tx);
            vm.execute_message()?
        };

        Ok(ExecutionTrace {
            fork,
            success: report.is_success(),
            gas_used: report.gas_used,
            return_data: report.output.clone(),
            logs: report.logs.clone(),
            post_state: project_state(&state),
        })
    }

    /// Run both forks and classify the first disagreement, if any.
    pub fn execute_differential(
        &self,
        bytecode: &GeneratedBytecode,
    ) -> Result<Option<Divergence>, VMError> {
        let trace_a = self.execute_single(&bytecode.code, self.fork_a)?;
        let trace_b = self.execute_single(&bytecode.code, self.fork_b)?;
        Ok(compare_traces(bytecode, trace_a, trace_b))
    }

    /// Like [`execute_differential`], but with the wall-clock budget
    /// applied.
    ///
    /// [`execute_differential`]: DifferentialExecutor::execute_differential
    pub fn execute_candidate(
        &self,
        bytecode: &GeneratedBytecode,
    ) -> Result<CandidateOutcome, VMError> {
        let started = Instant::now();
        let divergence = self.execute_differential(bytecode)?;
        if started.elapsed() > self.time_budget {
            return Ok(CandidateOutcome::Timeout);
        }
        Ok(match divergence {
            Some(divergence) => CandidateOutcome::Diverged(divergence),
            None => CandidateOutcome::Agreement,
        })
    }

    /// Drive a whole candidate stream, stopping early once
    /// `max_divergences` unexpected findings have accumulated.
    pub fn run(
        &self,
        candidates: impl Iterator<Item = GeneratedBytecode>,
        max_divergences: Option<usize>,
    ) -> Result<DifferentialResult, VMError> {
        let mut result = DifferentialResult::default();

        for candidate in candidates {
            result.total_executions += 1;

            match self.execute_candidate(&candidate)? {
                CandidateOutcome::Agreement => {}
                CandidateOutcome::Timeout => {
                    result.timeouts += 1;
                    debug!(description = %candidate.description, "candidate timed out");
                }
                CandidateOutcome::Diverged(divergence) => {
                    if divergence.is_expected() {
                        result.expected_divergences += 1;
                        debug!(
                            rule = divergence.expected_by().map(|r| r.name).unwrap_or(""),
                            "expected divergence"
                        );
                    } else {
                        info!(
                            kind = ?divergence.kind,
                            description = %divergence.description,
                            "unexpected divergence"
                        );
                        result.unexpected_divergences += 1;
                        result.divergences.push(divergence);

                        if let Some(max) = max_divergences {
                            if result.unexpected_divergences >= max {
                                break;
                            }
                        }
                    }
                }
            }
        }

        info!(
            total = result.total_executions,
            unexpected = result.unexpected_divergences,
            expected = result.expected_divergences,
            timeouts = result.timeouts,
            "differential campaign finished"
        );
        Ok(result)
    }

    /// First unexpected divergence in the stream, if any.
    pub fn find_divergence(
        &self,
        candidates: impl Iterator<Item = GeneratedBytecode>,
    ) -> Result<Option<Divergence>, VMError> {
        let mut result = self.run(candidates, Some(1))?;
        Ok(result.divergences.pop())
    }
}

/// One-off comparison of two forks on specific bytecode.
pub fn compare_forks(
    fork_a: Fork,
    fork_b: Fork,
    code: impl Into<Bytes>,
) -> Result<Option<Divergence>, VMError> {
    let executor = DifferentialExecutor::new(fork_a, fork_b);
    let candidate = GeneratedBytecode::raw(code.into());
    executor.execute_differential(&candidate)
}

fn project_state(state: &WorldState) -> StateProjection {
    state
        .accounts()
        .filter(|(_, account)| !account.is_empty())
        .map(|(address, account)| {
            (
                *address,
                ProjectedAccount {
                    balance: account.balance,
                    nonce: account.nonce,
                    code: account.code.clone(),
                    storage: account
                        .storage
                        .iter()
                        .map(|(key, value)| (*key, *value))
                        .collect(),
                },
            )
        })
        .collect()
}

/// Field-by-field comparison in classification order; the first mismatch
/// wins. Gas is only comparable when both runs agree on success.
fn compare_traces(
    bytecode: &GeneratedBytecode,
    trace_a: ExecutionTrace,
    trace_b: ExecutionTrace,
) -> Option<Divergence> {
    let (kind, description) = if trace_a.success != trace_b.success {
        (
            DivergenceKind::SuccessMismatch,
            format!(
                "success mismatch: {} vs {}",
                trace_a.success, trace_b.success
            ),
        )
    } else if trace_a.return_data != trace_b.return_data {
        (
            DivergenceKind::ReturnDataMismatch,
            format!(
                "return data mismatch: {} vs {} bytes",
                trace_a.return_data.len(),
                trace_b.return_data.len()
            ),
        )
    } else if trace_a.gas_used != trace_b.gas_used {
        (
            DivergenceKind::GasMismatch,
            format!(
                "gas mismatch: {} vs {} (diff {})",
                trace_a.gas_used,
                trace_b.gas_used,
                trace_a.gas_used.abs_diff(trace_b.gas_used)
            ),
        )
    } else if trace_a.logs != trace_b.logs {
        (
            DivergenceKind::LogsMismatch,
            format!(
                "log mismatch: {} vs {} entries",
                trace_a.logs.len(),
                trace_b.logs.len()
            ),
        )
    } else if trace_a.post_state != trace_b.post_state {
        (
            DivergenceKind::StateMismatch,
            "post-state mismatch".to_string(),
        )
    } else {
        return None;
    };

    Some(Divergence {
        kind,
        bytecode: bytecode.clone(),
        trace_a,
        trace_b,
        description,
    })
}
