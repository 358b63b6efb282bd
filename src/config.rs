use serde::{ Deserialize, Serialize };
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::models::common::{ duration_ms, BackendKind, MathDomain };

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Per-request configuration of the validation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProofAssistantConfig {
    /// Backend whose verdict decides validity
    pub primary: BackendKind,
    /// Ordered fallbacks, also used for cross-validation
    pub fallbacks: Vec<BackendKind>,
    /// Primary backend to use instead for statements of a given domain
    pub domain_overrides: BTreeMap<MathDomain, BackendKind>,
    pub timeouts: TimeoutBudget,
    pub performance: PerformanceOptions,
    pub thresholds: AcceptanceThresholds,
}

/// Four-level timeout budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutBudget {
    /// First-pass parse check against the primary; zero disables it
    #[serde(with = "duration_ms")]
    pub quick_check: Duration,
    #[serde(with = "duration_ms")]
    pub full_verification: Duration,
    /// Budget of each fallback backend
    #[serde(with = "duration_ms")]
    pub cross_validation: Duration,
    /// Hard ceiling on the whole request
    #[serde(with = "duration_ms")]
    pub max_total_time: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceOptions {
    pub enable_cache: bool,
    pub enable_parallel: bool,
    pub max_concurrent: usize,
    pub memory_limit_mb: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceptanceThresholds {
    pub minimum_confidence: f64,
    pub require_cross_validation: bool,
    pub max_errors_allowed: usize,
    pub consistency_threshold: f64,
}

impl Default for ProofAssistantConfig {
    fn default() -> Self {
        Self {
            primary: BackendKind::Lean,
            fallbacks: vec![BackendKind::Coq, BackendKind::Isabelle],
            domain_overrides: BTreeMap::new(),
            timeouts: TimeoutBudget::default(),
            performance: PerformanceOptions::default(),
            thresholds: AcceptanceThresholds::default(),
        }
    }
}

impl Default for TimeoutBudget {
    fn default() -> Self {
        Self {
            quick_check: Duration::from_secs(5),
            full_verification: Duration::from_secs(60),
            cross_validation: Duration::from_secs(90),
            max_total_time: Duration::from_secs(180),
        }
    }
}

impl Default for PerformanceOptions {
    fn default() -> Self {
        Self {
            enable_cache: true,
            enable_parallel: true,
            max_concurrent: 4,
            memory_limit_mb: 4096,
        }
    }
}

impl Default for AcceptanceThresholds {
    fn default() -> Self {
        Self {
            minimum_confidence: 0.8,
            require_cross_validation: false,
            max_errors_allowed: 0,
            consistency_threshold: 0.7,
        }
    }
}

impl ProofAssistantConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: ProofAssistantConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check value ranges and the ordering of the timeout hierarchy
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.timeouts;
        if t.max_total_time.is_zero() {
            return Err(ConfigError::InvalidValue("max_total_time must be positive".to_string()));
        }
        if t.full_verification.is_zero() || t.cross_validation.is_zero() {
            return Err(
                ConfigError::InvalidValue(
                    "full_verification and cross_validation must be positive".to_string()
                )
            );
        }
        if t.quick_check > t.full_verification {
            return Err(
                ConfigError::InvalidValue("quick_check must not exceed full_verification".to_string())
            );
        }
        if t.full_verification > t.max_total_time || t.cross_validation > t.max_total_time {
            return Err(
                ConfigError::InvalidValue(
                    "per-backend budgets must not exceed max_total_time".to_string()
                )
            );
        }
        if self.performance.max_concurrent == 0 {
            return Err(ConfigError::InvalidValue("max_concurrent must be at least 1".to_string()));
        }
        for (name, value) in [
            ("minimum_confidence", self.thresholds.minimum_confidence),
            ("consistency_threshold", self.thresholds.consistency_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue(format!("{} must lie in [0, 1], got {}", name, value)));
            }
        }
        Ok(())
    }

    /// Primary backend for a domain, honoring per-domain overrides
    pub fn primary_for(&self, domain: &MathDomain) -> &BackendKind {
        self.domain_overrides.get(domain).unwrap_or(&self.primary)
    }
}
