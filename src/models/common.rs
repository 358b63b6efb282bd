use serde::{ Deserialize, Serialize };
use std::fmt;

/// Supported proof-assistant backends
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum BackendKind {
    Lean,
    Coq,
    Isabelle,
    Agda,
    Z3,
    Vampire,
    Custom(String),
}

impl BackendKind {
    /// Parse a backend name as written in configuration files or on the command line
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "lean" | "lean4" => BackendKind::Lean,
            "coq" | "rocq" => BackendKind::Coq,
            "isabelle" | "isabelle/hol" => BackendKind::Isabelle,
            "agda" => BackendKind::Agda,
            "z3" | "smt" => BackendKind::Z3,
            "vampire" => BackendKind::Vampire,
            other => BackendKind::Custom(other.to_string()),
        }
    }

    /// Canonical lower-case name used in configuration files
    pub fn name(&self) -> String {
        match self {
            BackendKind::Custom(name) => name.clone(),
            other => other.to_string().to_lowercase(),
        }
    }

    /// Environment-variable friendly name, e.g. `LEAN`
    pub fn env_name(&self) -> String {
        match self {
            BackendKind::Custom(name) =>
                name
                    .chars()
                    .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
                    .collect(),
            other => other.to_string().to_uppercase(),
        }
    }
}

impl From<String> for BackendKind {
    fn from(value: String) -> Self {
        BackendKind::parse(&value)
    }
}

impl From<BackendKind> for String {
    fn from(value: BackendKind) -> Self {
        value.name()
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Lean => write!(f, "Lean"),
            BackendKind::Coq => write!(f, "Coq"),
            BackendKind::Isabelle => write!(f, "Isabelle"),
            BackendKind::Agda => write!(f, "Agda"),
            BackendKind::Z3 => write!(f, "Z3"),
            BackendKind::Vampire => write!(f, "Vampire"),
            BackendKind::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// Mathematical domain a statement belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum MathDomain {
    NumberTheory,
    Algebra,
    Analysis,
    Topology,
    Combinatorics,
    Logic,
    Geometry,
    Probability,
    General,
    Custom(String),
}

impl MathDomain {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "number_theory" | "numbertheory" => MathDomain::NumberTheory,
            "algebra" => MathDomain::Algebra,
            "analysis" => MathDomain::Analysis,
            "topology" => MathDomain::Topology,
            "combinatorics" => MathDomain::Combinatorics,
            "logic" => MathDomain::Logic,
            "geometry" => MathDomain::Geometry,
            "probability" => MathDomain::Probability,
            "general" | "" => MathDomain::General,
            other => MathDomain::Custom(other.to_string()),
        }
    }
}

impl From<String> for MathDomain {
    fn from(value: String) -> Self {
        MathDomain::parse(&value)
    }
}

impl From<MathDomain> for String {
    fn from(value: MathDomain) -> Self {
        match value {
            MathDomain::Custom(name) => name,
            other => other.to_string().to_lowercase().replace(' ', "_"),
        }
    }
}

impl Default for MathDomain {
    fn default() -> Self {
        MathDomain::General
    }
}

impl fmt::Display for MathDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MathDomain::NumberTheory => write!(f, "Number Theory"),
            MathDomain::Algebra => write!(f, "Algebra"),
            MathDomain::Analysis => write!(f, "Analysis"),
            MathDomain::Topology => write!(f, "Topology"),
            MathDomain::Combinatorics => write!(f, "Combinatorics"),
            MathDomain::Logic => write!(f, "Logic"),
            MathDomain::Geometry => write!(f, "Geometry"),
            MathDomain::Probability => write!(f, "Probability"),
            MathDomain::General => write!(f, "General"),
            MathDomain::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// Kind of formal statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Theorem,
    Lemma,
    Definition,
    Axiom,
    Corollary,
    Proposition,
    Conjecture,
}

impl StatementKind {
    /// Theorems and lemmas are the kinds an independent proof sketch can back up
    pub fn is_theorem_like(&self) -> bool {
        matches!(self, StatementKind::Theorem | StatementKind::Lemma)
    }
}

/// Proof strategy declared by a sketch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofStrategy {
    Direct,
    Contradiction,
    Induction,
    Construction,
    CaseAnalysis,
    Reduction,
    Equivalence,
}

/// Computational complexity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityClass {
    Trivial,
    Polynomial,
    Exponential,
    Undecidable,
    Unknown,
}

impl ComplexityClass {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "trivial" | "constant" => Some(ComplexityClass::Trivial),
            "polynomial" | "p" | "ptime" => Some(ComplexityClass::Polynomial),
            "exponential" | "exp" | "exptime" => Some(ComplexityClass::Exponential),
            "undecidable" => Some(ComplexityClass::Undecidable),
            "unknown" => Some(ComplexityClass::Unknown),
            _ => None,
        }
    }

    /// Position on the nested chain trivial ⊂ polynomial ⊂ exponential
    pub(crate) fn chain_rank(&self) -> Option<u8> {
        match self {
            ComplexityClass::Trivial => Some(0),
            ComplexityClass::Polynomial => Some(1),
            ComplexityClass::Exponential => Some(2),
            ComplexityClass::Undecidable | ComplexityClass::Unknown => None,
        }
    }
}

impl fmt::Display for ComplexityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComplexityClass::Trivial => write!(f, "trivial"),
            ComplexityClass::Polynomial => write!(f, "polynomial"),
            ComplexityClass::Exponential => write!(f, "exponential"),
            ComplexityClass::Undecidable => write!(f, "undecidable"),
            ComplexityClass::Unknown => write!(f, "unknown"),
        }
    }
}

/// Resource usage of one backend run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub peak_memory_kb: u64,
    pub cpu_seconds: f64,
    pub timeout: bool,
}

impl ResourceUsage {
    pub fn timed_out() -> Self {
        Self {
            timeout: true,
            ..Self::default()
        }
    }
}

/// Serialize a `Duration` as whole milliseconds
pub mod duration_ms {
    use serde::{ Deserialize, Deserializer, Serializer };
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
