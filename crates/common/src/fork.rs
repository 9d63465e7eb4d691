use serde::{Deserialize, Serialize};

/// A named revision of the execution rules, totally ordered by activation.
///
/// Only the three revisions the toolkit targets are represented. Fork
/// comparisons (`fork >= Fork::Homestead`) select rule variants; everything
/// gas-related is resolved through the per-fork schedule instead.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum Fork {
    Frontier,
    Homestead,
    Shanghai,
}

impl Fork {
    /// All supported forks, oldest first.
    pub const ALL: [Fork; 3] = [Fork::Frontier, Fork::Homestead, Fork::Shanghai];

    /// The fork immediately preceding this one, if any.
    pub fn predecessor(self) -> Option<Fork> {
        match self {
            Fork::Frontier => None,
            Fork::Homestead => Some(Fork::Frontier),
            Fork::Shanghai => Some(Fork::Homestead),
        }
    }
}

impl Default for Fork {
    fn default() -> Self {
        Fork::Shanghai
    }
}
