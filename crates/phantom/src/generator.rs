//! Candidate bytecode generation.
//!
//! Five strategies produce programs for the differential executor. The
//! generator is deterministic: candidate `i` under seed `s` is always the
//! same program, whichever thread asks for it, because every candidate
//! derives its own RNG stream from `(s, i)`.

use bytes::Bytes;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use spectre_vm::Opcode;

/// How a candidate program is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorStrategy {
    /// Uniformly random bytes.
    Random,
    /// Structured instruction stream with a terminator.
    Grammar,
    /// Fixed catalog of boundary-value programs.
    Boundary,
    /// Establish the preconditions of one opcode, run it, return the
    /// result.
    OpcodeFocused(Opcode),
    /// Pre-canned arithmetic-identity stressors.
    Sequence,
}

/// A candidate program plus its provenance.
#[derive(Debug, Clone)]
pub struct GeneratedBytecode {
    pub code: Bytes,
    pub strategy: GeneratorStrategy,
    pub description: String,
}

impl GeneratedBytecode {
    /// Wrap raw bytes (manual tests, minimizer candidates).
    pub fn raw(code: impl Into<Bytes>) -> Self {
        GeneratedBytecode {
            code: code.into(),
            strategy: GeneratorStrategy::Random,
            description: "raw bytecode".to_string(),
        }
    }
}

/// The standard EVM boundary constants.
const BOUNDARY_VALUES: [&str; 8] = [
    "00",
    "01",
    "ff",
    "0100",
    "ffffffffffffffff",
    "010000000000000000",
    "8000000000000000000000000000000000000000000000000000000000000000",
    "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
];

pub struct BytecodeGenerator {
    seed: u64,
}

impl BytecodeGenerator {
    pub fn new(seed: u64) -> Self {
        BytecodeGenerator { seed }
    }

    /// Lazily produce `count` candidates for one strategy.
    pub fn generate(
        &self,
        strategy: GeneratorStrategy,
        count: usize,
    ) -> impl Iterator<Item = GeneratedBytecode> + '_ {
        (0..count).map(move |index| self.generate_one(strategy, index))
    }

    /// The `index`-th candidate of a strategy; pure in `(seed, index)`.
    pub fn generate_one(&self, strategy: GeneratorStrategy, index: usize) -> GeneratedBytecode {
        let mut rng = self.rng_for(index);
        match strategy {
            GeneratorStrategy::Random => self.random_program(&mut rng, index),
            GeneratorStrategy::Grammar => self.grammar_program(&mut rng, index),
            GeneratorStrategy::Boundary => self.boundary_program(index),
            GeneratorStrategy::OpcodeFocused(op) => self.opcode_focused_program(op, &mut rng, index),
            GeneratorStrategy::Sequence => self.sequence_program(&mut rng, index),
        }
    }

    fn rng_for(&self, index: usize) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_stream(index as u64);
        rng
    }

    fn random_program(&self, rng: &mut ChaCha8Rng, index: usize) -> GeneratedBytecode {
        let length = rng.gen_range(1..=256);
        let mut code = vec![0u8; length];
        rng.fill(code.as_mut_slice());
        GeneratedBytecode {
            code: code.into(),
            strategy: GeneratorStrategy::Random,
            description: format!("random #{index} ({length} bytes)"),
        }
    }

    /// `Program := Instruction* Terminator`, with a push-heavy weighting
    /// and a running stack-depth estimate that keeps the program from
    /// underflowing (and from ballooning past ~32 entries).
    fn grammar_program(&self, rng: &mut ChaCha8Rng, index: usize) -> GeneratedBytecode {
        const ARITHMETIC: [Opcode; 8] = [
            Opcode::ADD,
            Opcode::SUB,
            Opcode::MUL,
            Opcode::DIV,
            Opcode::SDIV,
            Opcode::MOD,
            Opcode::SMOD,
            Opcode::EXP,
        ];
        const COMPARISON: [Opcode; 8] = [
            Opcode::LT,
            Opcode::GT,
            Opcode::SLT,
            Opcode::SGT,
            Opcode::EQ,
            Opcode::AND,
            Opcode::OR,
            Opcode::XOR,
        ];
        const UNARY: [Opcode; 2] = [Opcode::ISZERO, Opcode::NOT];
        const NULLARY: [Opcode; 8] = [
            Opcode::ADDRESS,
            Opcode::CALLER,
            Opcode::CALLVALUE,
            Opcode::CALLDATASIZE,
            Opcode::NUMBER,
            Opcode::TIMESTAMP,
            Opcode::GAS,
            Opcode::MSIZE,
        ];

        let mut code: Vec<u8> = Vec::new();
        let mut depth: usize = 0;
        let instructions = rng.gen_range(4..=48);

        for _ in 0..instructions {
            let roll = rng.gen_range(0..100u32);
            if roll < 40 || depth == 0 {
                // Push-heavy by design; also the only legal move on an
                // empty stack estimate.
                if depth < 32 {
                    let width = rng.gen_range(1..=4usize);
                    code.push(0x60 + (width as u8 - 1));
                    for _ in 0..width {
                        code.push(rng.gen());
                    }
                    depth += 1;
                }
            } else if roll < 55 && depth >= 2 {
                code.push(pick(rng, &ARITHMETIC).into());
                depth -= 1;
            } else if roll < 65 && depth >= 2 {
                code.push(pick(rng, &COMPARISON).into());
                depth -= 1;
            } else if roll < 72 && depth >= 1 {
                code.push(pick(rng, &UNARY).into());
            } else if roll < 80 && depth >= 2 {
                code.push(Opcode::SWAP1.into());
                code.push(Opcode::MSTORE.into());
                depth -= 2;
            } else if roll < 88 && depth >= 1 && depth < 32 {
                code.push(Opcode::DUP1.into());
                depth += 1;
            } else if roll < 94 && depth >= 1 {
                code.push(Opcode::POP.into());
                depth -= 1;
            } else if depth < 32 {
                code.push(pick(rng, &NULLARY).into());
                depth += 1;
            }
        }

        match rng.gen_range(0..4u32) {
            0 => code.push(Opcode::STOP.into()),
            1 => {
                code.extend_from_slice(&[0x60, 0x20, 0x60, 0x00]);
                code.push(Opcode::RETURN.into());
            }
            2 => {
                code.extend_from_slice(&[0x60, 0x00, 0x60, 0x00]);
                code.push(Opcode::REVERT.into());
            }
            _ => code.push(Opcode::INVALID.into()),
        }

        GeneratedBytecode {
            code: code.into(),
            strategy: GeneratorStrategy::Grammar,
            description: format!("grammar #{index}"),
        }
    }

    /// Push a boundary constant, nudge it across the boundary with ADD,
    /// and return the result. The catalog cycles with the index.
    fn boundary_program(&self, index: usize) -> GeneratedBytecode {
        let value = BOUNDARY_VALUES[index % BOUNDARY_VALUES.len()];
        let value_bytes = hex_to_bytes(value);

        let mut code = Vec::new();
        code.push(0x60 + (value_bytes.len() as u8 - 1));
        code.extend_from_slice(&value_bytes);
        code.extend_from_slice(&[0x60, 0x01]); // PUSH1 1
        code.push(Opcode::ADD.into());
        code.extend_from_slice(&[0x60, 0x00]); // PUSH1 0
        code.push(Opcode::MSTORE.into());
        code.extend_from_slice(&[0x60, 0x20, 0x60, 0x00]);
        code.push(Opcode::RETURN.into());

        GeneratedBytecode {
            code: code.into(),
            strategy: GeneratorStrategy::Boundary,
            description: format!("boundary 0x{value} + 1"),
        }
    }

    /// Satisfy the opcode's arity with pushed operands, run it, and
    /// expose the result (if any) through memory and RETURN.
    fn opcode_focused_program(
        &self,
        op: Opcode,
        rng: &mut ChaCha8Rng,
        index: usize,
    ) -> GeneratedBytecode {
        let (inputs, outputs) = op.stack_arity();

        let mut code = Vec::new();
        for _ in 0..inputs {
            code.push(0x60); // PUSH1
            code.push(rng.gen_range(0..=8u8));
        }
        code.push(op.into());
        for _ in 0..op.immediate_size() {
            code.push(rng.gen());
        }

        if outputs > 0 {
            code.extend_from_slice(&[0x60, 0x00]);
            code.push(Opcode::MSTORE.into());
            code.extend_from_slice(&[0x60, 0x20, 0x60, 0x00]);
            code.push(Opcode::RETURN.into());
        } else {
            code.push(Opcode::STOP.into());
        }

        GeneratedBytecode {
            code: code.into(),
            strategy: GeneratorStrategy::OpcodeFocused(op),
            description: format!("focused {op} #{index}"),
        }
    }

    /// Canned operation chains whose results obey arithmetic identities
    /// ((a + b) * c, a - a, x / x, two's-complement round trips).
    fn sequence_program(&self, rng: &mut ChaCha8Rng, index: usize) -> GeneratedBytecode {
        let a: u8 = rng.gen();
        let b: u8 = rng.gen();
        let c: u8 = rng.gen_range(1..=255);

        let sequences: [&[u8]; 4] = [
            // (a + b) * c
            &[0x60, a, 0x60, b, 0x01, 0x60, c, 0x02],
            // a - a == 0
            &[0x60, a, 0x80, 0x03],
            // a / c, then * c back
            &[0x60, a, 0x60, c, 0x90, 0x04, 0x60, c, 0x02],
            // (a ^ b) ^ b == a
            &[0x60, a, 0x60, b, 0x18, 0x60, b, 0x18],
        ];
        let body = sequences[index % sequences.len()];

        let mut code = body.to_vec();
        code.extend_from_slice(&[0x60, 0x00, 0x52]); // MSTORE result
        code.extend_from_slice(&[0x60, 0x20, 0x60, 0x00, 0xF3]); // RETURN

        GeneratedBytecode {
            code: code.into(),
            strategy: GeneratorStrategy::Sequence,
            description: format!("sequence #{index} (a={a}, b={b}, c={c})"),
        }
    }
}

fn pick<T: Copy>(rng: &mut ChaCha8Rng, options: &[T]) -> T {
    options[rng.gen_range(0..options.len())]
}

fn hex_to_bytes(hex: &str) -> Vec<u8> {
    hex.as_bytes()
        .chunks(2)
        .map(|pair| {
            let high = (pair[0] as char).to_digit(16).unwrap_or(0) as u8;
            let low = (pair[1] as char).to_digit(16).unwrap_or(0) as u8;
            (high << 4) | low
        })
        .collect()
}
