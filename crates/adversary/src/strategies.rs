//! Test-vector generation strategies.
//!
//! Every strategy turns an [`EipSpec`] into concrete test cases: a
//! program, a gas budget, and what is expected to happen. The bytecode
//! under test is installed as deployed contract code, so intrinsic gas
//! covers only the (empty) calldata.

use crate::catalog::{boundary_values, EipSpec, OpcodeChange, OpcodeSpec};
use bytes::Bytes;
use spectre_common::{Address, U256};
use spectre_vm::{gas_cost, Opcode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Boundary,
    OpcodeInteraction,
    CallContext,
    GasExhaustion,
    ForkBoundary,
    StackDepth,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 6] = [
        StrategyKind::Boundary,
        StrategyKind::OpcodeInteraction,
        StrategyKind::CallContext,
        StrategyKind::GasExhaustion,
        StrategyKind::ForkBoundary,
        StrategyKind::StackDepth,
    ];

    /// The identifier used in fixture files.
    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::Boundary => "BOUNDARY",
            StrategyKind::OpcodeInteraction => "OPCODE_INTERACTION",
            StrategyKind::CallContext => "CALL_CONTEXT",
            StrategyKind::GasExhaustion => "GAS_EXHAUSTION",
            StrategyKind::ForkBoundary => "FORK_BOUNDARY",
            StrategyKind::StackDepth => "STACK_DEPTH",
        }
    }
}

/// One generated test vector.
#[derive(Debug, Clone)]
pub struct TestCase {
    pub name: String,
    pub strategy: StrategyKind,
    pub bytecode: Bytes,
    pub calldata: Bytes,
    pub gas_limit: u64,
    pub expected_success: bool,
    pub expected_gas_used: Option<u64>,
    pub description: String,
    /// Auxiliary contracts the fixture pre-state must contain.
    pub extra_accounts: Vec<(Address, Bytes)>,
}

impl TestCase {
    fn new(
        name: String,
        strategy: StrategyKind,
        bytecode: Vec<u8>,
        description: String,
    ) -> Self {
        TestCase {
            name,
            strategy,
            bytecode: bytecode.into(),
            calldata: Bytes::new(),
            gas_limit: 1_000_000,
            expected_success: true,
            expected_gas_used: None,
            description,
            extra_accounts: Vec::new(),
        }
    }
}

pub trait TestStrategy {
    fn kind(&self) -> StrategyKind;
    fn generate(&self, eip: &EipSpec) -> Vec<TestCase>;
}

pub fn all_strategies() -> Vec<Box<dyn TestStrategy>> {
    vec![
        Box::new(BoundaryValueStrategy),
        Box::new(OpcodeInteractionStrategy),
        Box::new(CallContextStrategy),
        Box::new(GasExhaustionStrategy),
        Box::new(ForkBoundaryStrategy),
        Box::new(StackDepthStrategy),
    ]
}

// -- shared construction helpers ----------------------------------------

/// Minimal-width PUSH of an arbitrary word.
fn push_value(code: &mut Vec<u8>, value: U256) {
    let byte_length = (value.bits().div_ceil(8)).max(1);
    let bytes = value.to_big_endian();
    code.push(0x60 + (byte_length as u8 - 1));
    code.extend_from_slice(&bytes[32 - byte_length..]);
}

/// Push enough operands to satisfy `op`'s arity, each set to `operand`.
fn push_operands(code: &mut Vec<u8>, op: &OpcodeSpec, operand: U256) {
    for _ in 0..op.stack_input {
        push_value(code, operand);
    }
}

/// Whether invoking this opcode (with zero call value) modifies state.
fn modifies_state(op: Opcode) -> bool {
    matches!(
        op,
        Opcode::SSTORE
            | Opcode::LOG0
            | Opcode::LOG1
            | Opcode::LOG2
            | Opcode::LOG3
            | Opcode::LOG4
            | Opcode::CREATE
            | Opcode::CREATE2
            | Opcode::SELFDESTRUCT
    )
}

/// Opcodes whose total cost is fully determined by their base cost.
fn has_static_cost(op: &OpcodeSpec) -> bool {
    !matches!(op.opcode, Opcode::CREATE | Opcode::CREATE2) && op.gas_cost.is_some()
}

/// Runtime gas to push the operands (PUSH0 counts 2, everything else 3).
fn operand_setup_gas(op: &OpcodeSpec) -> u64 {
    op.stack_input as u64 * gas_cost::PUSHN
}

// -- BOUNDARY ------------------------------------------------------------

/// Substitute each catalogued boundary value into every operand slot.
pub struct BoundaryValueStrategy;

impl TestStrategy for BoundaryValueStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Boundary
    }

    fn generate(&self, eip: &EipSpec) -> Vec<TestCase> {
        let mut cases = Vec::new();
        for op in &eip.opcodes {
            for boundary in boundary_values(eip) {
                let mut code = Vec::new();
                push_operands(&mut code, op, boundary);
                code.push(op.opcode.into());
                code.push(Opcode::STOP.into());

                let expected_gas_used = if has_static_cost(op) {
                    op.gas_cost
                        .map(|cost| gas_cost::TX_BASE_COST + operand_setup_gas(op) + cost)
                } else {
                    None
                };

                let mut case = TestCase::new(
                    format!("boundary_{}_{boundary:#x}", op.opcode),
                    StrategyKind::Boundary,
                    code,
                    format!("{} with every operand set to {boundary:#x}", op.opcode),
                );
                case.expected_gas_used = expected_gas_used;
                cases.push(case);
            }
        }
        cases
    }
}

// -- OPCODE_INTERACTION ---------------------------------------------------

/// Feed the opcode's result into stack, memory and control-flow sinks.
pub struct OpcodeInteractionStrategy;

impl TestStrategy for OpcodeInteractionStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::OpcodeInteraction
    }

    fn generate(&self, eip: &EipSpec) -> Vec<TestCase> {
        let mut cases = Vec::new();
        for op in &eip.opcodes {
            if op.stack_output == 0 {
                continue;
            }
            let operand = U256::from(42);

            // DUP the result.
            let mut code = Vec::new();
            push_operands(&mut code, op, operand);
            code.push(op.opcode.into());
            code.push(Opcode::DUP1.into());
            code.push(Opcode::STOP.into());
            cases.push(TestCase::new(
                format!("interaction_dup_{}", op.opcode),
                StrategyKind::OpcodeInteraction,
                code,
                format!("{} followed by DUP1", op.opcode),
            ));

            // SWAP the result under an earlier value.
            let mut code = Vec::new();
            push_value(&mut code, U256::one());
            push_operands(&mut code, op, operand);
            code.push(op.opcode.into());
            code.push(Opcode::SWAP1.into());
            code.push(Opcode::STOP.into());
            cases.push(TestCase::new(
                format!("interaction_swap_{}", op.opcode),
                StrategyKind::OpcodeInteraction,
                code,
                format!("{} followed by SWAP1", op.opcode),
            ));

            // Store the result.
            let mut code = Vec::new();
            push_operands(&mut code, op, operand);
            code.push(op.opcode.into());
            push_value(&mut code, U256::zero());
            code.push(Opcode::MSTORE.into());
            code.push(Opcode::STOP.into());
            cases.push(TestCase::new(
                format!("interaction_mstore_{}", op.opcode),
                StrategyKind::OpcodeInteraction,
                code,
                format!("{} result stored to memory", op.opcode),
            ));

            // Branch on the result.
            let mut code = Vec::new();
            push_operands(&mut code, op, U256::one());
            code.push(op.opcode.into());
            // JUMPI over a STOP to a JUMPDEST. Layout after this point:
            // PUSH1 target (2 bytes), JUMPI, STOP, JUMPDEST.
            let target = code.len() + 4;
            push_value(&mut code, U256::from(target));
            code.push(Opcode::JUMPI.into());
            code.push(Opcode::STOP.into());
            code.push(Opcode::JUMPDEST.into());
            code.push(Opcode::STOP.into());
            cases.push(TestCase::new(
                format!("interaction_jumpi_{}", op.opcode),
                StrategyKind::OpcodeInteraction,
                code,
                format!("{} result used as a JUMPI condition", op.opcode),
            ));
        }
        cases
    }
}

// -- CALL_CONTEXT ---------------------------------------------------------

/// Run the opcode directly and behind each call kind. The wrappers
/// revert when the inner call fails, so the transaction outcome mirrors
/// the inner one.
pub struct CallContextStrategy;

/// Where the inner contract lives in the fixture pre-state.
fn inner_contract_address() -> Address {
    Address::from_low_u64_be(0x03)
}

impl CallContextStrategy {
    fn inner_code(op: &OpcodeSpec) -> Vec<u8> {
        let mut code = Vec::new();
        push_operands(&mut code, op, U256::zero());
        code.push(op.opcode.into());
        code.push(Opcode::STOP.into());
        code
    }

    /// `[call-kind] inner; revert unless it succeeded`.
    fn wrapper_code(call_kind: Opcode) -> Vec<u8> {
        let mut code = Vec::new();
        // ret/args regions are empty; value (CALL/CALLCODE only) is zero.
        push_value(&mut code, U256::zero()); // retSize
        push_value(&mut code, U256::zero()); // retOffset
        push_value(&mut code, U256::zero()); // argsSize
        push_value(&mut code, U256::zero()); // argsOffset
        if matches!(call_kind, Opcode::CALL | Opcode::CALLCODE) {
            push_value(&mut code, U256::zero()); // value
        }
        push_value(&mut code, U256::from(0x03)); // inner contract
        code.extend_from_slice(&[0x61, 0xFF, 0xFF]); // PUSH2 0xffff gas
        code.push(call_kind.into());

        // Success flag on the stack: fall through to STOP on success,
        // jump to a REVERT otherwise.
        code.push(Opcode::ISZERO.into());
        // PUSH1 dest (2 bytes), JUMPI, STOP, then the revert block.
        let revert_dest = code.len() + 4;
        push_value(&mut code, U256::from(revert_dest));
        code.push(Opcode::JUMPI.into());
        code.push(Opcode::STOP.into());
        code.push(Opcode::JUMPDEST.into());
        push_value(&mut code, U256::zero());
        push_value(&mut code, U256::zero());
        code.push(Opcode::REVERT.into());
        code
    }
}

impl TestStrategy for CallContextStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::CallContext
    }

    fn generate(&self, eip: &EipSpec) -> Vec<TestCase> {
        let contexts = [
            ("direct", None),
            ("call", Some(Opcode::CALL)),
            ("callcode", Some(Opcode::CALLCODE)),
            ("delegatecall", Some(Opcode::DELEGATECALL)),
            ("staticcall", Some(Opcode::STATICCALL)),
        ];

        let mut cases = Vec::new();
        for op in &eip.opcodes {
            for (context_name, call_kind) in contexts {
                let inner = Self::inner_code(op);
                let (bytecode, extra_accounts) = match call_kind {
                    None => (inner, Vec::new()),
                    Some(kind) => (
                        Self::wrapper_code(kind),
                        vec![(inner_contract_address(), Bytes::from(inner))],
                    ),
                };

                // In a static frame, state-modifying opcodes fault.
                let expected_success = !(call_kind == Some(Opcode::STATICCALL)
                    && modifies_state(op.opcode));

                let mut case = TestCase::new(
                    format!("context_{context_name}_{}", op.opcode),
                    StrategyKind::CallContext,
                    bytecode,
                    format!("{} executed via {context_name}", op.opcode),
                );
                case.extra_accounts = extra_accounts;
                case.expected_success = expected_success;
                cases.push(case);
            }
        }
        cases
    }
}

// -- GAS_EXHAUSTION -------------------------------------------------------

/// Bracket the expected cost: exactly enough gas, one short, and a loop
/// that must run dry.
pub struct GasExhaustionStrategy;

impl TestStrategy for GasExhaustionStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::GasExhaustion
    }

    fn generate(&self, eip: &EipSpec) -> Vec<TestCase> {
        let mut cases = Vec::new();
        for op in &eip.opcodes {
            if let (true, Some(cost)) = (has_static_cost(op), op.gas_cost) {
                let exact = gas_cost::TX_BASE_COST + operand_setup_gas(op) + cost;

                let mut code = Vec::new();
                push_operands(&mut code, op, U256::one());
                code.push(op.opcode.into());
                code.push(Opcode::STOP.into());

                let mut case = TestCase::new(
                    format!("gas_exact_{}", op.opcode),
                    StrategyKind::GasExhaustion,
                    code.clone(),
                    format!("{} with exactly enough gas", op.opcode),
                );
                case.gas_limit = exact;
                case.expected_gas_used = Some(exact);
                cases.push(case);

                let mut case = TestCase::new(
                    format!("gas_short_{}", op.opcode),
                    StrategyKind::GasExhaustion,
                    code,
                    format!("{} one gas short", op.opcode),
                );
                case.gas_limit = exact - 1;
                case.expected_success = false;
                cases.push(case);
            }

            // JUMPDEST; operands; op; [POP]; PUSH1 0; JUMP — spins until
            // the gas runs out.
            let mut code = Vec::new();
            code.push(Opcode::JUMPDEST.into());
            push_operands(&mut code, op, U256::one());
            code.push(op.opcode.into());
            if op.stack_output > 0 {
                code.push(Opcode::POP.into());
            }
            push_value(&mut code, U256::zero());
            code.push(Opcode::JUMP.into());

            let mut case = TestCase::new(
                format!("gas_loop_{}", op.opcode),
                StrategyKind::GasExhaustion,
                code,
                format!("{} in a loop until out of gas", op.opcode),
            );
            case.gas_limit = 100_000;
            case.expected_success = false;
            cases.push(case);
        }
        cases
    }
}

// -- FORK_BOUNDARY --------------------------------------------------------

/// New opcodes must fault before their fork and work from it on. The
/// fork each case runs under is carried in its name; the runner pairs
/// `fork_pre_*` with `introduced_in - 1` and `fork_post_*` with
/// `introduced_in`.
pub struct ForkBoundaryStrategy;

impl TestStrategy for ForkBoundaryStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ForkBoundary
    }

    fn generate(&self, eip: &EipSpec) -> Vec<TestCase> {
        let mut cases = Vec::new();
        for op in &eip.opcodes {
            if op.change != OpcodeChange::NewOpcode || eip.introduced_in.predecessor().is_none() {
                continue;
            }

            let mut code = Vec::new();
            push_operands(&mut code, op, U256::zero());
            code.push(op.opcode.into());
            code.push(Opcode::STOP.into());

            let mut case = TestCase::new(
                format!("fork_pre_{}", op.opcode),
                StrategyKind::ForkBoundary,
                code.clone(),
                format!(
                    "{} under {:?} (before {:?}): invalid opcode expected",
                    op.opcode,
                    eip.introduced_in.predecessor().unwrap_or(eip.introduced_in),
                    eip.introduced_in
                ),
            );
            case.expected_success = false;
            cases.push(case);

            cases.push(TestCase::new(
                format!("fork_post_{}", op.opcode),
                StrategyKind::ForkBoundary,
                code,
                format!("{} under {:?}: defined and working", op.opcode, eip.introduced_in),
            ));
        }
        cases
    }
}

// -- STACK_DEPTH ----------------------------------------------------------

/// Invoke the opcode with the stack pre-filled to 1023 and 1024 entries.
pub struct StackDepthStrategy;

impl TestStrategy for StackDepthStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::StackDepth
    }

    fn generate(&self, eip: &EipSpec) -> Vec<TestCase> {
        let mut cases = Vec::new();
        for op in &eip.opcodes {
            for prefill in [1023usize, 1024] {
                if op.stack_input > prefill {
                    continue;
                }
                let mut code = Vec::new();
                for _ in 0..prefill {
                    code.extend_from_slice(&[0x60, 0x00]);
                }
                code.push(op.opcode.into());
                code.push(Opcode::STOP.into());

                // Net stack growth beyond the limit is an overflow fault.
                let after = prefill - op.stack_input + op.stack_output;
                let expected_success = after <= 1024;

                let mut case = TestCase::new(
                    format!("stack_depth_{prefill}_{}", op.opcode),
                    StrategyKind::StackDepth,
                    code,
                    format!("{} with the stack pre-filled to {prefill}", op.opcode),
                );
                case.expected_success = expected_success;
                cases.push(case);
            }
        }
        cases
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::get_eip;

    #[test]
    fn push_value_uses_minimal_width() {
        let mut code = Vec::new();
        push_value(&mut code, U256::zero());
        assert_eq!(code, vec![0x60, 0x00]);

        let mut code = Vec::new();
        push_value(&mut code, U256::from(0x1234));
        assert_eq!(code, vec![0x61, 0x12, 0x34]);

        let mut code = Vec::new();
        push_value(&mut code, U256::MAX);
        assert_eq!(code[0], 0x7F);
        assert_eq!(code.len(), 33);
    }

    #[test]
    fn boundary_strategy_covers_every_value() {
        let eip = get_eip(145).unwrap();
        let cases = BoundaryValueStrategy.generate(&eip);
        // 3 opcodes x the merged boundary set.
        assert_eq!(cases.len(), 3 * boundary_values(&eip).len());
        assert!(cases.iter().all(|case| case.bytecode.len() >= 3));
    }

    #[test]
    fn exact_gas_bracket_is_tight() {
        let eip = get_eip(145).unwrap();
        let cases = GasExhaustionStrategy.generate(&eip);
        let exact = cases.iter().find(|c| c.name == "gas_exact_SHL").unwrap();
        // 21000 intrinsic + two PUSH1 + SHL
        assert_eq!(exact.gas_limit, 21000 + 6 + 3);
        let short = cases.iter().find(|c| c.name == "gas_short_SHL").unwrap();
        assert_eq!(short.gas_limit, exact.gas_limit - 1);
        assert!(!short.expected_success);
    }

    #[test]
    fn staticcall_context_expects_create_to_fault() {
        let eip = get_eip(1014).unwrap();
        let cases = CallContextStrategy.generate(&eip);
        let static_case = cases
            .iter()
            .find(|c| c.name == "context_staticcall_CREATE2")
            .unwrap();
        assert!(!static_case.expected_success);
        assert_eq!(static_case.extra_accounts.len(), 1);

        let direct = cases.iter().find(|c| c.name == "context_direct_CREATE2").unwrap();
        assert!(direct.expected_success);
    }

    #[test]
    fn fork_boundary_generates_a_pre_and_post_pair() {
        let eip = get_eip(3855).unwrap();
        let cases = ForkBoundaryStrategy.generate(&eip);
        assert_eq!(cases.len(), 2);
        assert!(!cases[0].expected_success);
        assert!(cases[1].expected_success);
    }

    #[test]
    fn stack_depth_flags_overflow_at_the_limit() {
        let eip = get_eip(3855).unwrap();
        let cases = StackDepthStrategy.generate(&eip);
        let at_1023 = cases.iter().find(|c| c.name.contains("1023")).unwrap();
        let at_1024 = cases.iter().find(|c| c.name.contains("1024")).unwrap();
        // PUSH0 pushes one value: fine at 1023, overflow at 1024.
        assert!(at_1023.expected_success);
        assert!(!at_1024.expected_success);
    }

    #[test]
    fn jumpi_interaction_target_is_a_jumpdest() {
        let eip = get_eip(145).unwrap();
        let cases = OpcodeInteractionStrategy.generate(&eip);
        for case in cases.iter().filter(|c| c.name.starts_with("interaction_jumpi")) {
            let code = &case.bytecode;
            // The byte before the trailing STOP must be a JUMPDEST.
            assert_eq!(code[code.len() - 2], 0x5B);
        }
    }
}
