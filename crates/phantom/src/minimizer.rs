//! Delta debugging for diverging programs.
//!
//! Given a program whose two-fork runs disagree, find a (locally) minimal
//! program that still disagrees *in the same way*: the reduction
//! predicate is divergence-category equality, not byte equality of the
//! traces.

use crate::{
    executor::{DifferentialExecutor, Divergence, DivergenceKind},
    generator::GeneratedBytecode,
};
use bytes::Bytes;
use tracing::debug;

/// Outcome of a minimization run.
#[derive(Debug, Clone)]
pub struct MinimizationResult {
    pub original: Bytes,
    pub minimized: Bytes,
    pub iterations: usize,
}

impl MinimizationResult {
    fn new(original: Bytes, minimized: Bytes, iterations: usize) -> Self {
        MinimizationResult {
            original,
            minimized,
            iterations,
        }
    }

    pub fn reduction_percent(&self) -> f64 {
        if self.original.is_empty() {
            return 0.0;
        }
        (1.0 - self.minimized.len() as f64 / self.original.len() as f64) * 100.0
    }
}

/// ddmin over an arbitrary failure predicate.
///
/// Splits the input into `n` chunks and tries dropping each one; a
/// successful drop restarts at coarser granularity, a fruitless pass
/// doubles `n` until chunks are single bytes.
pub struct CustomMinimizer<F>
where
    F: Fn(&[u8]) -> bool,
{
    test_fn: F,
    max_iterations: usize,
}

impl<F> CustomMinimizer<F>
where
    F: Fn(&[u8]) -> bool,
{
    pub fn new(test_fn: F) -> Self {
        CustomMinimizer {
            test_fn,
            max_iterations: 1000,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn minimize(&self, bytecode: &[u8]) -> MinimizationResult {
        let original = Bytes::copy_from_slice(bytecode);
        if !(self.test_fn)(bytecode) {
            // The input does not exhibit the behavior; nothing to do.
            return MinimizationResult::new(original.clone(), original, 0);
        }

        let mut current = bytecode.to_vec();
        let mut chunks = 2usize;
        let mut iterations = 0usize;

        while current.len() > 1 && iterations < self.max_iterations {
            iterations += 1;
            let chunk_size = (current.len() / chunks).max(1);
            let mut reduced = false;

            for i in 0..chunks {
                let start = i * chunk_size;
                if start >= current.len() {
                    break;
                }
                let end = if i == chunks - 1 {
                    current.len()
                } else {
                    (start + chunk_size).min(current.len())
                };

                let mut candidate = current[..start].to_vec();
                candidate.extend_from_slice(&current[end..]);

                if !candidate.is_empty() && (self.test_fn)(&candidate) {
                    current = candidate;
                    chunks = chunks.saturating_sub(1).max(2);
                    reduced = true;
                    break;
                }
            }

            if !reduced {
                if chunks >= current.len() {
                    break;
                }
                chunks = (chunks * 2).min(current.len());
            }
        }

        debug!(
            original = original.len(),
            minimized = current.len(),
            iterations,
            "ddmin finished"
        );
        MinimizationResult::new(original, current.into(), iterations)
    }

    /// Slower fallback: try deleting every byte, one at a time, until a
    /// full pass removes nothing.
    pub fn minimize_linear(&self, bytecode: &[u8]) -> MinimizationResult {
        let original = Bytes::copy_from_slice(bytecode);
        if !(self.test_fn)(bytecode) {
            return MinimizationResult::new(original.clone(), original, 0);
        }

        let mut current = bytecode.to_vec();
        let mut iterations = 0usize;
        let mut changed = true;

        while changed && iterations < self.max_iterations {
            changed = false;
            let mut i = 0;
            while i < current.len() && iterations < self.max_iterations {
                iterations += 1;
                let mut candidate = current.clone();
                candidate.remove(i);

                if !candidate.is_empty() && (self.test_fn)(&candidate) {
                    current = candidate;
                    changed = true;
                    // The next byte slid into position i.
                } else {
                    i += 1;
                }
            }
        }

        MinimizationResult::new(original, current.into(), iterations)
    }
}

/// Minimizer wired to a differential executor: the predicate is "still
/// diverges between the same fork pair with the same classification".
pub struct DeltaDebugger<'a> {
    executor: &'a DifferentialExecutor,
    max_iterations: usize,
}

impl<'a> DeltaDebugger<'a> {
    pub fn new(executor: &'a DifferentialExecutor) -> Self {
        DeltaDebugger {
            executor,
            max_iterations: 1000,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    fn diverges_as(&self, code: &[u8], kind: DivergenceKind) -> bool {
        let candidate = GeneratedBytecode::raw(Bytes::copy_from_slice(code));
        matches!(
            self.executor.execute_differential(&candidate),
            Ok(Some(divergence)) if divergence.kind == kind
        )
    }

    /// Minimize `code`, preserving its divergence classification.
    pub fn minimize(&self, code: &[u8], kind: DivergenceKind) -> MinimizationResult {
        let minimizer =
            CustomMinimizer::new(|candidate: &[u8]| self.diverges_as(candidate, kind))
                .with_max_iterations(self.max_iterations);
        minimizer.minimize(code)
    }

    /// Byte-at-a-time variant; slower but sometimes smaller.
    pub fn minimize_linear(&self, code: &[u8], kind: DivergenceKind) -> MinimizationResult {
        let minimizer =
            CustomMinimizer::new(|candidate: &[u8]| self.diverges_as(candidate, kind))
                .with_max_iterations(self.max_iterations);
        minimizer.minimize_linear(code)
    }

    /// Minimize straight from a reported divergence.
    pub fn minimize_divergence(&self, divergence: &Divergence) -> MinimizationResult {
        self.minimize(&divergence.bytecode.code, divergence.kind)
    }
}
