//! Per-fork gas schedules and execution rule flags.
//!
//! Only costs and rules that actually vary across the three supported
//! revisions live here; everything fork-invariant stays as constants in
//! `gas_cost`. "Homestead" bundles the repricing historically attributed
//! to EIP-150 (CALL 40 -> 700, SELFDESTRUCT 0 -> 5000, the
//! all-but-one-64th forwarding cap), matching the behavior this toolkit
//! is specified against.

use spectre_common::Fork;

#[derive(Debug, Clone, Copy)]
pub struct GasSchedule {
    // Storage
    pub sload: u64,
    pub sstore_set: u64,
    pub sstore_reset: u64,
    pub sstore_clears_refund: u64,

    // Account access
    pub balance: u64,
    pub extcodesize: u64,
    pub extcodehash: u64,
    pub extcodecopy_base: u64,

    // Call family (base cost; value/new-account surcharges are invariant)
    pub call_base: u64,

    // Self-destruct
    pub selfdestruct: u64,
    pub selfdestruct_refund: u64,

    // EXP dynamic cost per byte of exponent
    pub exp_byte: u64,

    // Intrinsic calldata costs
    pub calldata_zero: u64,
    pub calldata_nonzero: u64,

    // Contract creation
    pub initcode_word_cost: u64,
    pub max_initcode_size: Option<usize>,

    // Rule flags
    /// Cap forwarded sub-call gas at `remaining - remaining/64`.
    pub has_all_but_one_64th: bool,
    /// Failing the code-deposit charge consumes all gas instead of
    /// silently deploying empty code.
    pub create_oog_consumes_gas: bool,
    /// PUSH0 (0x5F) is a defined opcode.
    pub has_push0: bool,
    /// Reject signatures with s above the curve-order midpoint.
    pub requires_low_s: bool,
}

impl GasSchedule {
    pub const fn for_fork(fork: Fork) -> &'static GasSchedule {
        match fork {
            Fork::Frontier => &FRONTIER_SCHEDULE,
            Fork::Homestead => &HOMESTEAD_SCHEDULE,
            Fork::Shanghai => &SHANGHAI_SCHEDULE,
        }
    }
}

pub static FRONTIER_SCHEDULE: GasSchedule = GasSchedule {
    sload: 50,
    sstore_set: 20000,
    sstore_reset: 5000,
    sstore_clears_refund: 15000,

    balance: 50,
    extcodesize: 50,
    extcodehash: 50,
    extcodecopy_base: 20,

    call_base: 40,

    selfdestruct: 0,
    selfdestruct_refund: 24000,

    exp_byte: 10,

    calldata_zero: 4,
    calldata_nonzero: 16,

    initcode_word_cost: 0,
    max_initcode_size: None,

    has_all_but_one_64th: false,
    create_oog_consumes_gas: false,
    has_push0: false,
    requires_low_s: false,
};

pub static HOMESTEAD_SCHEDULE: GasSchedule = GasSchedule {
    call_base: 700,
    selfdestruct: 5000,
    exp_byte: 50,
    has_all_but_one_64th: true,
    create_oog_consumes_gas: true,
    requires_low_s: true,
    ..FRONTIER_SCHEDULE
};

pub static SHANGHAI_SCHEDULE: GasSchedule = GasSchedule {
    has_push0: true,
    initcode_word_cost: 2,
    max_initcode_size: Some(crate::constants::INIT_CODE_MAX_SIZE),
    ..HOMESTEAD_SCHEDULE
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontier_schedule() {
        let schedule = GasSchedule::for_fork(Fork::Frontier);
        assert_eq!(schedule.call_base, 40);
        assert_eq!(schedule.selfdestruct, 0);
        assert_eq!(schedule.exp_byte, 10);
        assert!(!schedule.has_all_but_one_64th);
        assert!(!schedule.has_push0);
    }

    #[test]
    fn homestead_repricing() {
        let schedule = GasSchedule::for_fork(Fork::Homestead);
        assert_eq!(schedule.call_base, 700);
        assert_eq!(schedule.selfdestruct, 5000);
        assert_eq!(schedule.exp_byte, 50);
        assert!(schedule.has_all_but_one_64th);
        assert!(schedule.create_oog_consumes_gas);
        assert!(!schedule.has_push0);
    }

    #[test]
    fn shanghai_inherits_homestead_and_adds_initcode_rules() {
        let schedule = GasSchedule::for_fork(Fork::Shanghai);
        assert_eq!(schedule.call_base, 700);
        assert_eq!(schedule.initcode_word_cost, 2);
        assert_eq!(schedule.max_initcode_size, Some(49152));
        assert!(schedule.has_push0);
    }

    #[test]
    fn storage_costs_are_stable_across_forks() {
        for fork in Fork::ALL {
            let schedule = GasSchedule::for_fork(fork);
            assert_eq!(schedule.sload, 50);
            assert_eq!(schedule.sstore_set, 20000);
            assert_eq!(schedule.sstore_reset, 5000);
            assert_eq!(schedule.sstore_clears_refund, 15000);
        }
    }
}
