//! The mutation operator catalog.
//!
//! Each operator scans source text and proposes small, plausible defects:
//! a flipped arithmetic operator, an off-by-one literal, a doubled gas
//! constant. Applying a mutant and re-running a test suite tells you
//! whether the suite would have caught that defect. Running the test
//! command and managing processes is out of scope here; this module is
//! the catalog and the site scan only.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// The kinds of defects the catalog can introduce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MutationKind {
    ArithmeticSwap,
    ComparisonSwap,
    OffByOne,
    GasCost,
    LogicNegate,
    ReturnValue,
    BoundaryChange,
}

/// A single proposed mutation: one line of one file, before and after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mutation {
    pub kind: MutationKind,
    pub file_path: String,
    pub line_number: usize,
    pub original: String,
    pub mutated: String,
    pub description: String,
}

pub trait MutationOperator {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn generate(&self, source: &str, file_path: &str) -> Vec<Mutation>;
}

pub fn all_operators() -> Vec<Box<dyn MutationOperator>> {
    vec![
        Box::new(ArithmeticSwapOperator),
        Box::new(ComparisonSwapOperator),
        Box::new(OffByOneOperator),
        Box::new(GasCostOperator),
        Box::new(LogicNegateOperator),
        Box::new(ReturnValueOperator),
        Box::new(BoundaryChangeOperator),
    ]
}

pub fn get_operator(name: &str) -> Option<Box<dyn MutationOperator>> {
    all_operators()
        .into_iter()
        .find(|operator| operator.name() == name)
}

fn is_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("//") || trimmed.starts_with("/*") || trimmed.starts_with('*')
}

fn mutation(
    kind: MutationKind,
    file_path: &str,
    line_number: usize,
    original: &str,
    mutated: String,
    description: String,
) -> Mutation {
    Mutation {
        kind,
        file_path: file_path.to_string(),
        line_number,
        original: original.trim().to_string(),
        mutated: mutated.trim().to_string(),
        description,
    }
}

/// Swap binary arithmetic operators between identifiers.
pub struct ArithmeticSwapOperator;

static ARITHMETIC_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)\s*([+\-*/%])\s*(\w+)").expect("static pattern"));

const ARITHMETIC_SWAPS: [(&str, &str); 5] = [
    ("+", "-"),
    ("-", "+"),
    ("*", "/"),
    ("/", "*"),
    ("%", "/"),
];

impl MutationOperator for ArithmeticSwapOperator {
    fn name(&self) -> &'static str {
        "arithmetic_swap"
    }

    fn description(&self) -> &'static str {
        "swaps arithmetic operators"
    }

    fn generate(&self, source: &str, file_path: &str) -> Vec<Mutation> {
        let mut mutations = Vec::new();
        for (index, line) in source.lines().enumerate() {
            if is_comment(line) {
                continue;
            }
            for captures in ARITHMETIC_PATTERN.captures_iter(line) {
                let operator = &captures[2];
                let Some((_, replacement)) = ARITHMETIC_SWAPS
                    .iter()
                    .find(|(original, _)| *original == operator)
                else {
                    continue;
                };
                let whole = captures.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
                let mutated = format!(
                    "{}{} {replacement} {}{}",
                    &line[..whole.0],
                    &captures[1],
                    &captures[3],
                    &line[whole.1..],
                );
                mutations.push(mutation(
                    MutationKind::ArithmeticSwap,
                    file_path,
                    index + 1,
                    line,
                    mutated,
                    format!("swap '{operator}' with '{replacement}'"),
                ));
            }
        }
        mutations
    }
}

/// Swap comparison operators.
pub struct ComparisonSwapOperator;

static COMPARISON_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)\s*(<=|>=|==|!=|<|>)\s*(\w+)").expect("static pattern"));

const COMPARISON_SWAPS: [(&str, &str); 6] = [
    ("<=", ">"),
    (">=", "<"),
    ("<", ">="),
    (">", "<="),
    ("==", "!="),
    ("!=", "=="),
];

impl MutationOperator for ComparisonSwapOperator {
    fn name(&self) -> &'static str {
        "comparison_swap"
    }

    fn description(&self) -> &'static str {
        "swaps comparison operators"
    }

    fn generate(&self, source: &str, file_path: &str) -> Vec<Mutation> {
        let mut mutations = Vec::new();
        for (index, line) in source.lines().enumerate() {
            if is_comment(line) {
                continue;
            }
            for captures in COMPARISON_PATTERN.captures_iter(line) {
                let operator = &captures[2];
                let Some((_, replacement)) = COMPARISON_SWAPS
                    .iter()
                    .find(|(original, _)| *original == operator)
                else {
                    continue;
                };
                let whole = captures.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
                let mutated = format!(
                    "{}{} {replacement} {}{}",
                    &line[..whole.0],
                    &captures[1],
                    &captures[3],
                    &line[whole.1..],
                );
                mutations.push(mutation(
                    MutationKind::ComparisonSwap,
                    file_path,
                    index + 1,
                    line,
                    mutated,
                    format!("swap '{operator}' with '{replacement}'"),
                ));
            }
        }
        mutations
    }
}

/// Nudge integer literals by one in both directions.
pub struct OffByOneOperator;

static LITERAL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+)\b").expect("static pattern"));

impl MutationOperator for OffByOneOperator {
    fn name(&self) -> &'static str {
        "off_by_one"
    }

    fn description(&self) -> &'static str {
        "introduces off-by-one errors in numeric literals"
    }

    fn generate(&self, source: &str, file_path: &str) -> Vec<Mutation> {
        let mut mutations = Vec::new();
        for (index, line) in source.lines().enumerate() {
            if is_comment(line) {
                continue;
            }
            for captures in LITERAL_PATTERN.captures_iter(line) {
                let Ok(value) = captures[1].parse::<u64>() else {
                    continue;
                };
                let span = captures.get(1).map(|m| (m.start(), m.end())).unwrap_or((0, 0));

                if let Some(plus) = value.checked_add(1) {
                    let mutated =
                        format!("{}{plus}{}", &line[..span.0], &line[span.1..]);
                    mutations.push(mutation(
                        MutationKind::OffByOne,
                        file_path,
                        index + 1,
                        line,
                        mutated,
                        format!("change {value} to {plus}"),
                    ));
                }
                if value > 0 {
                    let minus = value - 1;
                    let mutated =
                        format!("{}{minus}{}", &line[..span.0], &line[span.1..]);
                    mutations.push(mutation(
                        MutationKind::OffByOne,
                        file_path,
                        index + 1,
                        line,
                        mutated,
                        format!("change {value} to {minus}"),
                    ));
                }
            }
        }
        mutations
    }
}

/// Double or halve gas-cost constants (`pub const NAME: u64 = N`).
pub struct GasCostOperator;

static GAS_CONST_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"pub const [A-Z][A-Z0-9_]*: u64 = (\d+)").expect("static pattern")
});

impl MutationOperator for GasCostOperator {
    fn name(&self) -> &'static str {
        "gas_cost"
    }

    fn description(&self) -> &'static str {
        "doubles or halves gas cost constants"
    }

    fn generate(&self, source: &str, file_path: &str) -> Vec<Mutation> {
        let mut mutations = Vec::new();
        for (index, line) in source.lines().enumerate() {
            if is_comment(line) {
                continue;
            }
            for captures in GAS_CONST_PATTERN.captures_iter(line) {
                let Ok(value) = captures[1].parse::<u64>() else {
                    continue;
                };
                let span = captures.get(1).map(|m| (m.start(), m.end())).unwrap_or((0, 0));

                if let Some(doubled) = value.checked_mul(2) {
                    let mutated =
                        format!("{}{doubled}{}", &line[..span.0], &line[span.1..]);
                    mutations.push(mutation(
                        MutationKind::GasCost,
                        file_path,
                        index + 1,
                        line,
                        mutated,
                        format!("double gas cost from {value} to {doubled}"),
                    ));
                }
                if value > 1 {
                    let halved = value / 2;
                    let mutated =
                        format!("{}{halved}{}", &line[..span.0], &line[span.1..]);
                    mutations.push(mutation(
                        MutationKind::GasCost,
                        file_path,
                        index + 1,
                        line,
                        mutated,
                        format!("halve gas cost from {value} to {halved}"),
                    ));
                }
            }
        }
        mutations
    }
}

/// Negate `if` conditions.
pub struct LogicNegateOperator;

static IF_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)if\s+([^{]+?)\s*\{").expect("static pattern"));

impl MutationOperator for LogicNegateOperator {
    fn name(&self) -> &'static str {
        "logic_negate"
    }

    fn description(&self) -> &'static str {
        "negates boolean conditions"
    }

    fn generate(&self, source: &str, file_path: &str) -> Vec<Mutation> {
        let mut mutations = Vec::new();
        for (index, line) in source.lines().enumerate() {
            if is_comment(line) {
                continue;
            }
            if let Some(captures) = IF_PATTERN.captures(line) {
                let condition = captures[2].trim();
                // `if let` patterns cannot be negated by wrapping.
                if condition.starts_with("let ") {
                    continue;
                }
                let mutated = format!("{}if !({condition}) {{", &captures[1]);
                mutations.push(mutation(
                    MutationKind::LogicNegate,
                    file_path,
                    index + 1,
                    line,
                    mutated,
                    "negate condition".to_string(),
                ));
            }
        }
        mutations
    }
}

/// Flip trivially simple returned values.
pub struct ReturnValueOperator;

const RETURN_SWAPS: [(&str, &str); 4] = [
    ("return true;", "return false;"),
    ("return false;", "return true;"),
    ("return 0;", "return 1;"),
    ("return 1;", "return 0;"),
];

impl MutationOperator for ReturnValueOperator {
    fn name(&self) -> &'static str {
        "return_value"
    }

    fn description(&self) -> &'static str {
        "flips simple returned values"
    }

    fn generate(&self, source: &str, file_path: &str) -> Vec<Mutation> {
        let mut mutations = Vec::new();
        for (index, line) in source.lines().enumerate() {
            if is_comment(line) {
                continue;
            }
            for (original, replacement) in RETURN_SWAPS {
                if line.contains(original) {
                    mutations.push(mutation(
                        MutationKind::ReturnValue,
                        file_path,
                        index + 1,
                        line,
                        line.replacen(original, replacement, 1),
                        format!("change '{original}' to '{replacement}'"),
                    ));
                }
            }
        }
        mutations
    }
}

/// Perturb well-known EVM boundary constants.
pub struct BoundaryChangeOperator;

const BOUNDARY_SWAPS: [(&str, &[&str]); 3] = [
    ("1024", &["1023", "1025"]),
    ("256", &["255", "257"]),
    ("49152", &["49151", "49153"]),
];

impl MutationOperator for BoundaryChangeOperator {
    fn name(&self) -> &'static str {
        "boundary_change"
    }

    fn description(&self) -> &'static str {
        "perturbs boundary constants"
    }

    fn generate(&self, source: &str, file_path: &str) -> Vec<Mutation> {
        let mut mutations = Vec::new();
        for (index, line) in source.lines().enumerate() {
            if is_comment(line) {
                continue;
            }
            for (boundary, replacements) in BOUNDARY_SWAPS {
                if !line.contains(boundary) {
                    continue;
                }
                for replacement in replacements {
                    mutations.push(mutation(
                        MutationKind::BoundaryChange,
                        file_path,
                        index + 1,
                        line,
                        line.replacen(boundary, replacement, 1),
                        format!("change boundary {boundary} to {replacement}"),
                    ));
                }
            }
        }
        mutations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_swap_finds_binary_expressions() {
        let source = "let total = base + extra;\n// a + b in a comment\n";
        let mutations = ArithmeticSwapOperator.generate(source, "lib.rs");
        assert_eq!(mutations.len(), 1);
        assert_eq!(mutations[0].line_number, 1);
        assert!(mutations[0].mutated.contains("base - extra"));
    }

    #[test]
    fn comparison_swap_prefers_two_char_operators() {
        let source = "if depth <= limit {\n";
        let mutations = ComparisonSwapOperator.generate(source, "lib.rs");
        assert!(mutations
            .iter()
            .any(|m| m.description.contains("'<=' with '>'")));
    }

    #[test]
    fn off_by_one_goes_both_ways() {
        let source = "let cap = 64;\n";
        let mutations = OffByOneOperator.generate(source, "lib.rs");
        assert_eq!(mutations.len(), 2);
        assert!(mutations.iter().any(|m| m.mutated.contains("65")));
        assert!(mutations.iter().any(|m| m.mutated.contains("63")));
    }

    #[test]
    fn gas_cost_targets_const_declarations_only() {
        let source = "pub const JUMPDEST: u64 = 1;\nlet x = 5;\n";
        let mutations = GasCostOperator.generate(source, "gas_cost.rs");
        // Doubling only: 1 cannot be halved.
        assert_eq!(mutations.len(), 1);
        assert!(mutations[0].mutated.contains("= 2"));
    }

    #[test]
    fn logic_negate_skips_if_let() {
        let source = "if value.is_zero() {\nif let Some(x) = opt {\n";
        let mutations = LogicNegateOperator.generate(source, "lib.rs");
        assert_eq!(mutations.len(), 1);
        assert!(mutations[0].mutated.contains("!(value.is_zero())"));
    }

    #[test]
    fn boundary_change_perturbs_stack_limit() {
        let source = "pub const STACK_LIMIT: usize = 1024;\n";
        let mutations = BoundaryChangeOperator.generate(source, "constants.rs");
        assert_eq!(mutations.len(), 2);
    }

    #[test]
    fn operators_are_discoverable_by_name() {
        assert!(get_operator("arithmetic_swap").is_some());
        assert!(get_operator("gas_cost").is_some());
        assert!(get_operator("nonsense").is_none());
    }
}
