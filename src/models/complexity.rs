use serde::{ Deserialize, Serialize };
use std::collections::BTreeSet;
use std::fmt;

use crate::models::common::ComplexityClass;

/// Complexity block of a validation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityReport {
    /// Steps in the sketch or lines in the longest generated proof
    pub proof_length: usize,
    /// Longest chain through the step and statement dependency graphs
    pub dependency_depth: usize,
    pub axioms: BTreeSet<String>,
    pub computational_class: ComplexityClass,
    /// Overall difficulty in [0, 1]
    pub difficulty: f64,
    pub difficulty_level: ProofDifficulty,
}

/// Difficulty buckets for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofDifficulty {
    Trivial,
    Easy,
    Moderate,
    Hard,
    VeryHard,
    Intractable,
}

impl ProofDifficulty {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s < 0.1 => ProofDifficulty::Trivial,
            s if s < 0.3 => ProofDifficulty::Easy,
            s if s < 0.5 => ProofDifficulty::Moderate,
            s if s < 0.7 => ProofDifficulty::Hard,
            s if s < 0.9 => ProofDifficulty::VeryHard,
            _ => ProofDifficulty::Intractable,
        }
    }
}

impl fmt::Display for ProofDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProofDifficulty::Trivial => write!(f, "trivial"),
            ProofDifficulty::Easy => write!(f, "easy"),
            ProofDifficulty::Moderate => write!(f, "moderate"),
            ProofDifficulty::Hard => write!(f, "hard"),
            ProofDifficulty::VeryHard => write!(f, "very hard"),
            ProofDifficulty::Intractable => write!(f, "intractable"),
        }
    }
}
