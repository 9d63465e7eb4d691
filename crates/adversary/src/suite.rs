//! Fixture serialization.
//!
//! Two layouts are emitted: the toolkit's native JSON and an
//! Ethereum-ecosystem-compatible state-test layout whose numerics are
//! `0x`-prefixed lowercase hex strings.

use crate::strategies::TestCase;
use chrono::Utc;
use serde_json::{json, Map, Value};
use spectre_common::{
    serde_utils::{address_to_hex, bytes_to_bare_hex, bytes_to_hex, u64_to_hex},
    Address,
};

/// Sender and target addresses every fixture shares.
fn sender_address() -> Address {
    Address::from_low_u64_be(0x01)
}

fn contract_address() -> Address {
    Address::from_low_u64_be(0x02)
}

/// A collection of generated test cases for one EIP.
#[derive(Debug)]
pub struct TestSuite {
    pub eip_number: u32,
    pub eip_title: String,
    pub generated_at: String,
    pub test_cases: Vec<TestCase>,
}

impl TestSuite {
    pub fn new(eip_number: u32, eip_title: impl Into<String>, test_cases: Vec<TestCase>) -> Self {
        TestSuite {
            eip_number,
            eip_title: eip_title.into(),
            generated_at: Utc::now().to_rfc3339(),
            test_cases,
        }
    }

    /// The native layout: decimal integers, bare-hex bytecode.
    pub fn to_native_json(&self) -> Value {
        json!({
            "eip_number": self.eip_number,
            "eip_title": self.eip_title,
            "generated_at": self.generated_at,
            "test_cases": self
                .test_cases
                .iter()
                .map(|case| {
                    json!({
                        "name": case.name,
                        "strategy": case.strategy.name(),
                        "bytecode": bytes_to_bare_hex(&case.bytecode),
                        "gas_limit": case.gas_limit,
                        "expected_success": case.expected_success,
                        "expected_gas_used": case.expected_gas_used,
                        "description": case.description,
                    })
                })
                .collect::<Vec<_>>(),
        })
    }

    /// The ecosystem layout: one state test per case, keyed by name.
    pub fn to_ecosystem_json(&self) -> Value {
        let mut tests = Map::new();
        tests.insert(
            "_info".to_string(),
            json!({
                "filling-tool": "spectre-adversary",
                "generatedAt": self.generated_at,
                "eip": self.eip_number,
            }),
        );

        for case in &self.test_cases {
            let name = format!("EIP{}_{}", self.eip_number, case.name);
            tests.insert(name, self.ecosystem_case(case));
        }

        Value::Object(tests)
    }

    fn ecosystem_case(&self, case: &TestCase) -> Value {
        let mut pre = Map::new();
        pre.insert(
            address_to_hex(sender_address()),
            json!({
                "balance": "0xffffffffff",
                "code": "0x",
                "nonce": "0x0",
                "storage": {},
            }),
        );
        pre.insert(
            address_to_hex(contract_address()),
            json!({
                "balance": "0x0",
                "code": bytes_to_hex(&case.bytecode),
                "nonce": "0x0",
                "storage": {},
            }),
        );
        for (address, code) in &case.extra_accounts {
            pre.insert(
                address_to_hex(*address),
                json!({
                    "balance": "0x0",
                    "code": bytes_to_hex(code),
                    "nonce": "0x0",
                    "storage": {},
                }),
            );
        }

        json!({
            "env": {
                "currentNumber": "0x1",
                "currentGasLimit": u64_to_hex(case.gas_limit),
                "currentTimestamp": "0x1",
            },
            "pre": Value::Object(pre),
            "transaction": {
                "to": address_to_hex(contract_address()),
                "gasLimit": u64_to_hex(case.gas_limit),
                "data": bytes_to_hex(&case.calldata),
            },
        })
    }

    /// Pretty-printed native fixture.
    pub fn to_native_string(&self) -> String {
        serde_json::to_string_pretty(&self.to_native_json()).unwrap_or_default()
    }

    /// Pretty-printed ecosystem fixture.
    pub fn to_ecosystem_string(&self) -> String {
        serde_json::to_string_pretty(&self.to_ecosystem_json()).unwrap_or_default()
    }
}
