use async_trait::async_trait;
use log::info;
use std::collections::{ BTreeMap, HashMap };
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::sync::Arc;
use std::time::Duration;

use crate::config::ProofAssistantConfig;
use crate::errors::EngineResult;
use crate::implementations::consistency::{ ConsistencyAnalyzer, WeightingPolicy };
use crate::implementations::dispatcher::{ BackendRun, SessionDispatcher };
use crate::implementations::orchestrator::ValidationOrchestrator;
use crate::implementations::result_cache::MemoryResultCache;
use crate::models::claim::{ ClaimKind, MathClaim, SourceLocation, ValidationContext, ValidationRequest };
use crate::models::common::{ BackendKind, ComplexityClass, MathDomain, ProofStrategy, StatementKind };
use crate::models::result::{ ProofError, ProofErrorKind, SingleProofResult };
use crate::models::statement::{ FormalStatement, ProofSketch, ProofStep };
use crate::traits::backend_adapter::{
    BackendAdapter,
    BackendAvailability,
    DialectConfig,
    QuickCheckOutcome,
    Submission,
};

// Initialize logging once per test binary
pub fn setup() {
    match env_logger::builder().is_test(true).try_init() {
        Ok(_) => {
            info!("Logger initialized");
        }
        Err(_) => {
            // Logger already initialized, which is fine
        }
    }
}

/// What a scripted backend answers for a statement
#[derive(Debug, Clone)]
pub struct Script {
    pub valid: bool,
    pub confidence: f64,
    pub delay: Duration,
    pub errors: Vec<ProofError>,
    pub complexity: Option<ComplexityClass>,
    pub axioms: Vec<String>,
    pub proof_text: Option<String>,
    /// Keep running past the budget handed to `submit`
    pub ignores_timeout: bool,
    pub panics: bool,
}

impl Script {
    pub fn verified(confidence: f64) -> Self {
        Self {
            valid: true,
            confidence,
            delay: Duration::from_millis(5),
            errors: Vec::new(),
            complexity: None,
            axioms: Vec::new(),
            proof_text: None,
            ignores_timeout: false,
            panics: false,
        }
    }

    pub fn refuted(kind: ProofErrorKind) -> Self {
        Self {
            valid: false,
            confidence: 0.0,
            errors: vec![ProofError::new(kind, "scripted failure")],
            ..Self::verified(0.0)
        }
    }

    pub fn panicking() -> Self {
        Self {
            panics: true,
            ..Self::verified(0.0)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn ignoring_timeout(mut self) -> Self {
        self.ignores_timeout = true;
        self
    }

    pub fn with_complexity(mut self, class: ComplexityClass) -> Self {
        self.complexity = Some(class);
        self
    }

    pub fn with_axioms(mut self, axioms: &[&str]) -> Self {
        self.axioms = axioms.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_proof_text(mut self, text: &str) -> Self {
        self.proof_text = Some(text.to_string());
        self
    }
}

/// Tracks how many submissions are running at once, possibly across backends
#[derive(Debug, Default)]
pub struct ConcurrencyGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyGauge {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(self: &Arc<Self>) -> GaugeGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GaugeGuard(self.clone())
    }
}

struct GaugeGuard(Arc<ConcurrencyGauge>);

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-process backend answering from a script
pub struct ScriptedBackend {
    kind: BackendKind,
    version: String,
    default: Script,
    per_statement: HashMap<String, Script>,
    quick: Option<QuickCheckOutcome>,
    quick_panics: bool,
    calls: AtomicUsize,
    quick_calls: AtomicUsize,
    gauge: Arc<ConcurrencyGauge>,
}

impl ScriptedBackend {
    pub fn new(kind: BackendKind, default: Script) -> Self {
        Self {
            kind,
            version: "1".to_string(),
            default,
            per_statement: HashMap::new(),
            quick: None,
            quick_panics: false,
            calls: AtomicUsize::new(0),
            quick_calls: AtomicUsize::new(0),
            gauge: Arc::new(ConcurrencyGauge::default()),
        }
    }

    pub fn with_script(mut self, statement_id: &str, script: Script) -> Self {
        self.per_statement.insert(statement_id.to_string(), script);
        self
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn with_quick_check(mut self, outcome: QuickCheckOutcome) -> Self {
        self.quick = Some(outcome);
        self
    }

    pub fn rejecting_syntax(self) -> Self {
        let rejection = SingleProofResult::failed(
            ProofError::new(ProofErrorKind::Syntax, "unexpected token"),
            Duration::from_millis(1),
            Default::default()
        );
        self.with_quick_check(QuickCheckOutcome::Rejected(rejection))
    }

    pub fn panicking_on_quick_check(mut self) -> Self {
        self.quick_panics = true;
        self
    }

    pub fn sharing_gauge(mut self, gauge: Arc<ConcurrencyGauge>) -> Self {
        self.gauge = gauge;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn quick_calls(&self) -> usize {
        self.quick_calls.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.gauge.peak()
    }

    fn script_for(&self, statement_id: &str) -> &Script {
        self.per_statement.get(statement_id).unwrap_or(&self.default)
    }
}

#[async_trait]
impl BackendAdapter for ScriptedBackend {
    fn kind(&self) -> BackendKind {
        self.kind.clone()
    }

    fn dialect(&self) -> DialectConfig {
        DialectConfig {
            version: self.version.clone(),
            options: BTreeMap::new(),
        }
    }

    async fn submit(&self, submission: &Submission, timeout: Duration) -> SingleProofResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _guard = self.gauge.enter();
        let script = self.script_for(&submission.statement_id).clone();

        if script.panics {
            panic!("scripted backend {} panicked", self.kind);
        }
        if script.delay > timeout && !script.ignores_timeout {
            tokio::time::sleep(timeout).await;
            return SingleProofResult::timed_out(timeout, "scripted timeout");
        }
        tokio::time::sleep(script.delay).await;

        SingleProofResult {
            valid: script.valid,
            confidence: script.confidence,
            proof_text: script.proof_text.clone(),
            errors: script.errors.clone(),
            warnings: Vec::new(),
            verification_time: script.delay,
            resource_usage: Default::default(),
            reported_complexity: script.complexity,
            axioms_used: script.axioms.clone(),
        }
    }

    async fn quick_check(&self, _submission: &Submission, _timeout: Duration) -> QuickCheckOutcome {
        self.quick_calls.fetch_add(1, Ordering::SeqCst);
        if self.quick_panics {
            panic!("scripted backend {} panicked during quick check", self.kind);
        }
        self.quick.clone().unwrap_or(QuickCheckOutcome::Skipped)
    }

    async fn check_availability(&self) -> EngineResult<BackendAvailability> {
        Ok(BackendAvailability {
            available: true,
            version: Some(format!("{} scripted {}", self.kind, self.version)),
            detail: None,
        })
    }
}

/// Theorem with the same text in the Lean, Coq and Isabelle dialects
pub fn statement(id: &str, conclusion: &str) -> FormalStatement {
    let dialects = [BackendKind::Lean, BackendKind::Coq, BackendKind::Isabelle]
        .into_iter()
        .map(|backend| (backend, format!("theorem {} : {}", id, conclusion)))
        .collect();
    FormalStatement {
        id: id.to_string(),
        source_text: conclusion.to_string(),
        dialects,
        kind: StatementKind::Theorem,
        domain: MathDomain::NumberTheory,
        variables: Vec::new(),
        hypotheses: Vec::new(),
        conclusion: conclusion.to_string(),
        extraction_confidence: 0.9,
        dependencies: Vec::new(),
        proof_sketch: None,
    }
}

pub fn depending_on(mut statement: FormalStatement, deps: &[&str]) -> FormalStatement {
    statement.dependencies = deps.iter().map(|d| d.to_string()).collect();
    statement
}

pub fn of_kind(mut statement: FormalStatement, kind: StatementKind) -> FormalStatement {
    statement.kind = kind;
    statement
}

/// Attach a sketch of `steps` steps, each citing the previous one
pub fn with_sketch(mut statement: FormalStatement, steps: usize, lemmas: &[&str]) -> FormalStatement {
    let steps = (0..steps)
        .map(|i| ProofStep {
            description: format!("step {}", i),
            formal_step: None,
            justification: String::new(),
            depends_on: if i == 0 { Vec::new() } else { vec![i - 1] },
        })
        .collect();
    statement.proof_sketch = Some(ProofSketch {
        steps,
        strategy: ProofStrategy::Direct,
        estimated_complexity: ComplexityClass::Unknown,
        required_lemmas: lemmas.iter().map(|l| l.to_string()).collect(),
    });
    statement
}

pub fn claim(id: &str, statement_ids: &[&str], dependencies: &[&str]) -> MathClaim {
    MathClaim {
        id: id.to_string(),
        text: format!("claim {}", id),
        statement_ids: statement_ids.iter().map(|s| s.to_string()).collect(),
        location: SourceLocation::default(),
        kind: ClaimKind::Theorem,
        evidence_strength: 0.8,
        dependencies: dependencies.iter().map(|s| s.to_string()).collect(),
    }
}

/// Short budgets, no quick check, Lean primary with Coq and Isabelle fallbacks
pub fn fast_config() -> ProofAssistantConfig {
    let mut config = ProofAssistantConfig::default();
    config.timeouts.quick_check = Duration::ZERO;
    config.timeouts.full_verification = Duration::from_secs(2);
    config.timeouts.cross_validation = Duration::from_secs(2);
    config.timeouts.max_total_time = Duration::from_secs(5);
    config
}

pub fn request(statements: Vec<FormalStatement>, claims: Vec<MathClaim>, config: ProofAssistantConfig) -> ValidationRequest {
    ValidationRequest {
        statements,
        claims,
        context: ValidationContext::default(),
        config,
    }
}

pub fn dispatcher(backends: &[Arc<ScriptedBackend>]) -> SessionDispatcher {
    let adapters = backends
        .iter()
        .map(|b| b.clone() as Arc<dyn BackendAdapter>)
        .collect();
    SessionDispatcher::new(adapters, Arc::new(MemoryResultCache::with_defaults()))
}

pub fn orchestrator(backends: &[Arc<ScriptedBackend>]) -> ValidationOrchestrator {
    ValidationOrchestrator::new(dispatcher(backends), ConsistencyAnalyzer::new(WeightingPolicy::Uniform))
}

/// A finished run for feeding the analyzers directly
pub fn run(backend: BackendKind, valid: bool, confidence: f64) -> BackendRun {
    let result = if valid {
        SingleProofResult {
            valid: true,
            confidence,
            proof_text: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            verification_time: Duration::from_millis(10),
            resource_usage: Default::default(),
            reported_complexity: None,
            axioms_used: Vec::new(),
        }
    } else {
        SingleProofResult::failed(
            ProofError::new(ProofErrorKind::Logic, "refuted"),
            Duration::from_millis(10),
            Default::default()
        )
    };
    BackendRun {
        backend,
        result,
        from_cache: false,
    }
}

pub fn timed_out_run(backend: BackendKind) -> BackendRun {
    BackendRun {
        backend,
        result: SingleProofResult::timed_out(Duration::from_secs(1), "timeout"),
        from_cache: false,
    }
}
