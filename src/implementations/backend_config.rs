use log::{ debug, info };
use serde::{ Deserialize, Serialize };
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ConfigError;
use crate::implementations::consistency::{ ConfidenceHistory, ConsistencyAnalyzer, WeightingPolicy };
use crate::implementations::dispatcher::SessionDispatcher;
use crate::implementations::orchestrator::ValidationOrchestrator;
use crate::implementations::process_backend::{ ProcessBackend, ProcessBackendConfig };
use crate::implementations::result_cache::{ DisabledCache, MemoryResultCache };
use crate::models::common::{ BackendKind, MathDomain };
use crate::traits::backend_adapter::{ BackendAdapter, DialectConfig };
use crate::traits::result_cache::ResultCache;

/// Result cache settings of the engine process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    /// Entry lifetime in seconds, 0 for no expiry
    pub ttl_seconds: u64,
    pub capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 3600,
            capacity: 10_000,
        }
    }
}

/// How backends are weighted in the consistency score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "policy", content = "weights")]
pub enum WeightingSettings {
    Uniform,
    Static(BTreeMap<MathDomain, BTreeMap<BackendKind, f64>>),
    Historical,
}

impl Default for WeightingSettings {
    fn default() -> Self {
        WeightingSettings::Uniform
    }
}

/// Engine-level configuration: which proof assistants exist on this machine
/// and how to run them. Per-request behavior lives in `ProofAssistantConfig`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendRegistryConfig {
    pub backends: Vec<ProcessBackendConfig>,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub weighting: WeightingSettings,
}

impl BackendRegistryConfig {
    /// Load configuration from a YAML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let mut config: BackendRegistryConfig = serde_yaml::from_str(&contents)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// `PROOFMESH_<KIND>_PATH` replaces the program of the matching backend
    pub fn apply_env_overrides(&mut self) {
        for backend in &mut self.backends {
            let var = env_override_var(&backend.kind);
            match std::env::var(&var) {
                Ok(program) if !program.trim().is_empty() => {
                    info!("Using {} for {} (from {})", program, backend.kind, var);
                    backend.program = program;
                }
                _ => {
                    debug!("{} not set, keeping {}", var, backend.program);
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = Vec::new();
        for backend in &self.backends {
            if backend.program.trim().is_empty() {
                return Err(ConfigError::InvalidValue(format!("backend {} has no program", backend.kind)));
            }
            if seen.contains(&backend.kind) {
                return Err(ConfigError::InvalidValue(format!("backend {} is configured twice", backend.kind)));
            }
            seen.push(backend.kind.clone());
        }
        if let WeightingSettings::Static(tables) = &self.weighting {
            for (domain, table) in tables {
                if let Some((backend, weight)) = table.iter().find(|(_, w)| !w.is_finite() || **w <= 0.0) {
                    return Err(
                        ConfigError::InvalidValue(
                            format!("weight of {} in {} must be positive, got {}", backend, domain, weight)
                        )
                    );
                }
            }
        }
        Ok(())
    }

    pub fn build_adapters(&self) -> Vec<Arc<dyn BackendAdapter>> {
        self.backends
            .iter()
            .map(|config| Arc::new(ProcessBackend::new(config.clone())) as Arc<dyn BackendAdapter>)
            .collect()
    }

    pub fn build_cache(&self) -> Arc<dyn ResultCache> {
        if !self.cache.enabled {
            return Arc::new(DisabledCache);
        }
        let ttl = if self.cache.ttl_seconds == 0 { None } else { Some(Duration::from_secs(self.cache.ttl_seconds)) };
        Arc::new(MemoryResultCache::new(ttl, self.cache.capacity))
    }

    pub fn build_analyzer(&self) -> ConsistencyAnalyzer {
        let policy = match &self.weighting {
            WeightingSettings::Uniform => WeightingPolicy::Uniform,
            WeightingSettings::Static(tables) => WeightingPolicy::Static(tables.clone()),
            WeightingSettings::Historical => WeightingPolicy::Historical(Arc::new(ConfidenceHistory::new())),
        };
        ConsistencyAnalyzer::new(policy)
    }

    /// Wire adapters, cache and analyzer into a ready orchestrator
    pub fn build_orchestrator(&self) -> ValidationOrchestrator {
        let dispatcher = SessionDispatcher::new(self.build_adapters(), self.build_cache());
        ValidationOrchestrator::new(dispatcher, self.build_analyzer())
    }
}

pub fn env_override_var(kind: &BackendKind) -> String {
    format!("PROOFMESH_{}_PATH", kind.env_name())
}

/// Default configuration
impl Default for BackendRegistryConfig {
    fn default() -> Self {
        let dialect = |version: &str| DialectConfig {
            version: version.to_string(),
            options: BTreeMap::new(),
        };

        let mut lean = ProcessBackendConfig::new(BackendKind::Lean, "lean");
        lean.dialect = dialect("lean4");

        let mut coq = ProcessBackendConfig::new(BackendKind::Coq, "coqc");
        coq.version_args = vec!["-v".to_string()];
        coq.dialect = dialect("coq-8");

        let mut isabelle = ProcessBackendConfig::new(BackendKind::Isabelle, "isabelle");
        isabelle.args = vec!["process".to_string(), "-T".to_string(), "{file}".to_string()];
        isabelle.version_args = vec!["version".to_string()];
        isabelle.dialect = dialect("isabelle-2024");

        let mut z3 = ProcessBackendConfig::new(BackendKind::Z3, "z3");
        z3.dialect = dialect("smtlib2");

        BackendRegistryConfig {
            backends: vec![lean, coq, isabelle, z3],
            cache: CacheSettings::default(),
            weighting: WeightingSettings::default(),
        }
    }
}
