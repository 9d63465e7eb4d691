//! Strategy-driven test-suite assembly.

use crate::{
    catalog::{get_eip, list_eip_numbers},
    strategies::{all_strategies, StrategyKind, TestCase, TestStrategy},
    suite::TestSuite,
};
use tracing::info;

pub struct TestGenerator {
    strategies: Vec<Box<dyn TestStrategy>>,
}

impl Default for TestGenerator {
    fn default() -> Self {
        TestGenerator {
            strategies: all_strategies(),
        }
    }
}

impl TestGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategies(strategies: Vec<Box<dyn TestStrategy>>) -> Self {
        TestGenerator { strategies }
    }

    /// Generate a suite for one EIP, optionally restricted to a subset
    /// of strategies. Unknown EIPs yield an empty suite.
    pub fn generate_for_eip(
        &self,
        eip_number: u32,
        strategy_filter: Option<&[StrategyKind]>,
    ) -> TestSuite {
        let Some(eip) = get_eip(eip_number) else {
            return TestSuite::new(eip_number, format!("Unknown EIP {eip_number}"), Vec::new());
        };

        let mut test_cases: Vec<TestCase> = Vec::new();
        for strategy in &self.strategies {
            if let Some(filter) = strategy_filter {
                if !filter.contains(&strategy.kind()) {
                    continue;
                }
            }
            test_cases.extend(strategy.generate(&eip));
        }

        info!(
            eip = eip_number,
            cases = test_cases.len(),
            "generated test suite"
        );
        TestSuite::new(eip.number, eip.title, test_cases)
    }

    /// Suites for every catalogued EIP.
    pub fn generate_all(&self) -> Vec<TestSuite> {
        list_eip_numbers()
            .into_iter()
            .map(|number| self.generate_for_eip(number, None))
            .collect()
    }
}
