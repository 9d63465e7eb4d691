//! The EIP knowledge base driving test generation.
//!
//! Each entry records what an EIP changed — opcodes added or modified,
//! gas repricings, interesting constants — in enough structure for the
//! strategies to build targeted test vectors from it.

use spectre_common::{Fork, U256};
use spectre_vm::Opcode;

/// What an EIP did to an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeChange {
    NewOpcode,
    ModifiedBehavior,
    GasChange,
}

/// One opcode touched by an EIP.
#[derive(Debug, Clone)]
pub struct OpcodeSpec {
    pub opcode: Opcode,
    pub change: OpcodeChange,
    pub gas_cost: Option<u64>,
    pub stack_input: usize,
    pub stack_output: usize,
    pub note: &'static str,
}

impl OpcodeSpec {
    fn new(opcode: Opcode, change: OpcodeChange, gas_cost: u64, note: &'static str) -> Self {
        let (stack_input, stack_output) = opcode.stack_arity();
        OpcodeSpec {
            opcode,
            change,
            gas_cost: Some(gas_cost),
            stack_input,
            stack_output,
            note,
        }
    }
}

/// A catalogued EIP.
#[derive(Debug, Clone)]
pub struct EipSpec {
    pub number: u32,
    pub title: &'static str,
    pub introduced_in: Fork,
    pub opcodes: Vec<OpcodeSpec>,
    pub gas_changes: Vec<(&'static str, u64)>,
    pub boundary_values: Vec<U256>,
    pub semantic_notes: &'static str,
}

/// The EIPs this toolkit knows how to attack.
pub fn known_eips() -> Vec<EipSpec> {
    vec![
        EipSpec {
            number: 2,
            title: "Homestead Hard-fork Changes",
            introduced_in: Fork::Homestead,
            opcodes: vec![OpcodeSpec::new(
                Opcode::CREATE,
                OpcodeChange::ModifiedBehavior,
                32000,
                "a creation that cannot pay the code deposit now fails instead of deploying nothing",
            )],
            gas_changes: vec![("CREATE", 32000)],
            boundary_values: to_words(&[0, 1, 32000, 32001]),
            semantic_notes: "CREATE out-of-gas semantics and low-s signature bound",
        },
        EipSpec {
            number: 145,
            title: "Bitwise shifting instructions in EVM",
            introduced_in: Fork::Frontier,
            opcodes: vec![
                OpcodeSpec::new(Opcode::SHL, OpcodeChange::NewOpcode, 3, "shift left"),
                OpcodeSpec::new(Opcode::SHR, OpcodeChange::NewOpcode, 3, "logical shift right"),
                OpcodeSpec::new(
                    Opcode::SAR,
                    OpcodeChange::NewOpcode,
                    3,
                    "arithmetic shift right",
                ),
            ],
            gas_changes: vec![("SHL", 3), ("SHR", 3), ("SAR", 3)],
            boundary_values: shift_boundaries(),
            semantic_notes: "shifts of 256 or more saturate; SAR saturates by sign",
        },
        EipSpec {
            number: 1014,
            title: "Skinny CREATE2",
            introduced_in: Fork::Frontier,
            opcodes: vec![OpcodeSpec::new(
                Opcode::CREATE2,
                OpcodeChange::NewOpcode,
                32000,
                "create with a salt-derived deterministic address",
            )],
            gas_changes: vec![("CREATE2", 32000)],
            boundary_values: to_words(&[0, 1, 32]),
            semantic_notes: "address = keccak(0xff ++ sender ++ salt ++ keccak(initcode))[12..]",
        },
        EipSpec {
            number: 3855,
            title: "PUSH0 instruction",
            introduced_in: Fork::Shanghai,
            opcodes: vec![OpcodeSpec::new(
                Opcode::PUSH0,
                OpcodeChange::NewOpcode,
                2,
                "push the constant zero",
            )],
            gas_changes: vec![("PUSH0", 2)],
            boundary_values: to_words(&[0]),
            semantic_notes: "cheaper than PUSH1 0x00; undefined before Shanghai",
        },
        EipSpec {
            number: 3860,
            title: "Limit and meter initcode",
            introduced_in: Fork::Shanghai,
            opcodes: vec![OpcodeSpec::new(
                Opcode::CREATE,
                OpcodeChange::GasChange,
                32000,
                "2 gas per 32-byte word of initcode; 49152-byte ceiling",
            )],
            gas_changes: vec![("INITCODE_WORD_COST", 2)],
            boundary_values: to_words(&[0, 49152, 49153]),
            semantic_notes: "oversized initcode now fails deterministically instead of by price",
        },
    ]
}

/// Look up one catalogued EIP.
pub fn get_eip(number: u32) -> Option<EipSpec> {
    known_eips().into_iter().find(|eip| eip.number == number)
}

pub fn list_eip_numbers() -> Vec<u32> {
    known_eips().iter().map(|eip| eip.number).collect()
}

/// Boundary values for an EIP: its own constants, every gas change
/// bracketed by one, and the standard EVM boundary set.
pub fn boundary_values(eip: &EipSpec) -> Vec<U256> {
    let mut values = eip.boundary_values.clone();

    for (_, gas) in &eip.gas_changes {
        values.push(U256::from(gas.saturating_sub(1)));
        values.push(U256::from(*gas));
        values.push(U256::from(gas + 1));
    }

    values.extend(standard_boundaries());
    values.sort();
    values.dedup();
    values
}

/// The canonical EVM boundary constants.
pub fn standard_boundaries() -> Vec<U256> {
    vec![
        U256::zero(),
        U256::one(),
        U256::from(2),
        U256::from(255),
        U256::from(256),
        U256::from(u32::MAX),
        U256::from(u64::MAX),
        (U256::one() << 255) - 1,
        U256::one() << 255,
        U256::MAX,
    ]
}

fn to_words(values: &[u64]) -> Vec<U256> {
    values.iter().map(|&value| U256::from(value)).collect()
}

fn shift_boundaries() -> Vec<U256> {
    vec![
        U256::zero(),
        U256::one(),
        U256::from(255),
        U256::from(256),
        U256::one() << 255,
        U256::MAX,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_contains_the_supported_eips() {
        let numbers = list_eip_numbers();
        assert_eq!(numbers, vec![2, 145, 1014, 3855, 3860]);
    }

    #[test]
    fn push0_is_a_shanghai_opcode() {
        let eip = get_eip(3855).unwrap();
        assert_eq!(eip.introduced_in, Fork::Shanghai);
        assert_eq!(eip.opcodes[0].opcode, Opcode::PUSH0);
        assert_eq!(eip.opcodes[0].stack_output, 1);
    }

    #[test]
    fn boundary_values_include_gas_brackets() {
        let eip = get_eip(2).unwrap();
        let values = boundary_values(&eip);
        for needle in [31999u64, 32000, 32001] {
            assert!(values.contains(&U256::from(needle)));
        }
        // Standard boundaries ride along.
        assert!(values.contains(&U256::MAX));
    }

    #[test]
    fn boundary_values_are_sorted_and_unique(){
        let eip = get_eip(145).unwrap();
        let values = boundary_values(&eip);
        let mut sorted = values.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(values, sorted);
    }

    #[test]
    fn unknown_eip_is_none() {
        assert!(get_eip(9999).is_none());
    }
}
