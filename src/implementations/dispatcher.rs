use log::{ debug, info, warn };
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::ProofAssistantConfig;
use crate::errors::{ EngineError, EngineResult };
use crate::models::common::{ BackendKind, ResourceUsage };
use crate::models::result::{ ProofError, ProofErrorKind, SingleProofResult };
use crate::models::statement::FormalStatement;
use crate::traits::backend_adapter::{ BackendAdapter, QuickCheckOutcome, Submission };
use crate::traits::result_cache::{ Fingerprint, ResultCache };

/// How long a cancelled backend task gets to wind down after the request deadline
const CANCELLATION_GRACE: Duration = Duration::from_millis(250);

/// Shared limits of one validation request: the global deadline and the pool
/// of backend session slots. Cloning shares the pool.
#[derive(Debug, Clone)]
pub struct RequestBudget {
    deadline: Instant,
    sessions: Arc<Semaphore>,
}

impl RequestBudget {
    pub fn new(config: &ProofAssistantConfig) -> Self {
        Self {
            deadline: Instant::now() + config.timeouts.max_total_time,
            sessions: Arc::new(Semaphore::new(config.performance.max_concurrent.max(1))),
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn expired(&self) -> bool {
        self.remaining().is_zero()
    }
}

/// Backend ordering for one statement
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchPlan {
    pub primary: BackendKind,
    pub fallbacks: Vec<BackendKind>,
    /// Configured backends without an adapter or without dialect text
    pub skipped: Vec<BackendKind>,
}

/// One terminal backend result
#[derive(Debug, Clone, PartialEq)]
pub struct BackendRun {
    pub backend: BackendKind,
    pub result: SingleProofResult,
    pub from_cache: bool,
}

/// Everything the dispatcher learned about one statement
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub statement_id: String,
    pub primary: BackendKind,
    /// In launch order, primary first
    pub runs: Vec<BackendRun>,
    pub skipped: Vec<BackendKind>,
    pub rejected_by_quick_check: bool,
    pub elapsed: Duration,
}

impl DispatchOutcome {
    pub fn primary_run(&self) -> Option<&BackendRun> {
        self.runs.iter().find(|run| run.backend == self.primary)
    }

    pub fn secondary_runs(&self) -> impl Iterator<Item = &BackendRun> {
        self.runs.iter().filter(move |run| run.backend != self.primary)
    }

    pub fn backends_used(&self) -> Vec<BackendKind> {
        self.runs.iter().map(|run| run.backend.clone()).collect()
    }

    pub fn cached_backends(&self) -> Vec<BackendKind> {
        self.runs
            .iter()
            .filter(|run| run.from_cache)
            .map(|run| run.backend.clone())
            .collect()
    }
}

enum Slot {
    Ready(BackendRun),
    Pending(BackendKind, Fingerprint, Instant, JoinHandle<SingleProofResult>),
}

/// Fans a statement out to its backends.
///
/// Consults the result cache first, runs the optional parse-only pass against
/// the primary, then launches the remaining backends in parallel or in
/// fallback order. Each backend call runs in its own task, so a panicking or
/// hanging adapter only ever affects its own result.
#[derive(Clone)]
pub struct SessionDispatcher {
    adapters: Arc<HashMap<BackendKind, Arc<dyn BackendAdapter>>>,
    cache: Arc<dyn ResultCache>,
}

impl SessionDispatcher {
    pub fn new(adapters: Vec<Arc<dyn BackendAdapter>>, cache: Arc<dyn ResultCache>) -> Self {
        let adapters = adapters
            .into_iter()
            .map(|adapter| (adapter.kind(), adapter))
            .collect();
        Self {
            adapters: Arc::new(adapters),
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<dyn ResultCache> {
        &self.cache
    }

    pub fn registered_backends(&self) -> Vec<BackendKind> {
        let mut kinds: Vec<BackendKind> = self.adapters.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn adapter(&self, backend: &BackendKind) -> Option<Arc<dyn BackendAdapter>> {
        self.adapters.get(backend).cloned()
    }

    /// Work out the effective primary and fallbacks for a statement
    pub fn plan(&self, statement: &FormalStatement, config: &ProofAssistantConfig) -> EngineResult<DispatchPlan> {
        let mut order: Vec<BackendKind> = Vec::new();
        let candidates = std::iter
            ::once(config.primary_for(&statement.domain))
            .chain(std::iter::once(&config.primary))
            .chain(config.fallbacks.iter());
        for backend in candidates {
            if !order.contains(backend) {
                order.push(backend.clone());
            }
        }

        let (usable, skipped): (Vec<BackendKind>, Vec<BackendKind>) = order
            .into_iter()
            .partition(|backend| {
                self.adapters.contains_key(backend) && statement.dialect_text(backend).is_some()
            });

        for backend in &skipped {
            debug!("Skipping {} for {}: no adapter or no dialect text", backend, statement.id);
        }

        let mut usable = usable.into_iter();
        let primary = usable.next().ok_or_else(|| EngineError::NoUsableBackend(statement.id.clone()))?;
        Ok(DispatchPlan {
            primary,
            fallbacks: usable.collect(),
            skipped,
        })
    }

    /// Dispatch a statement under its own fresh request budget
    pub async fn dispatch_single(
        &self,
        statement: &FormalStatement,
        config: &ProofAssistantConfig
    ) -> EngineResult<DispatchOutcome> {
        let budget = RequestBudget::new(config);
        self.dispatch(statement, config, &budget).await
    }

    pub async fn dispatch(
        &self,
        statement: &FormalStatement,
        config: &ProofAssistantConfig,
        budget: &RequestBudget
    ) -> EngineResult<DispatchOutcome> {
        let started = Instant::now();
        let plan = self.plan(statement, config)?;
        info!(
            "Dispatching {} to {} (fallbacks: {:?}, parallel: {})",
            statement.id,
            plan.primary,
            plan.fallbacks,
            config.performance.enable_parallel
        );

        let mut outcome = DispatchOutcome {
            statement_id: statement.id.clone(),
            primary: plan.primary.clone(),
            runs: Vec::new(),
            skipped: plan.skipped.clone(),
            rejected_by_quick_check: false,
            elapsed: Duration::ZERO,
        };

        // Primary first, then fallbacks, each with its own budget
        let lineup: Vec<(BackendKind, Duration)> = std::iter
            ::once((plan.primary.clone(), config.timeouts.full_verification))
            .chain(plan.fallbacks.iter().map(|b| (b.clone(), config.timeouts.cross_validation)))
            .collect();

        let mut cached: HashMap<BackendKind, SingleProofResult> = HashMap::new();
        if config.performance.enable_cache {
            for (backend, _) in &lineup {
                let key = self.fingerprint(statement, backend)?;
                if let Some(result) = self.cache.get(&key)? {
                    debug!("Cache hit for {} on {} ({})", statement.id, backend, key);
                    cached.insert(backend.clone(), result);
                }
            }
        }

        if budget.expired() && !cached.contains_key(&plan.primary) {
            // Nothing was started; the primary still needs a terminal result
            warn!("Request budget exhausted before {} could be dispatched", statement.id);
            outcome.runs.push(BackendRun {
                backend: plan.primary.clone(),
                result: SingleProofResult::timed_out(
                    Duration::ZERO,
                    "request budget exhausted before launch"
                ),
                from_cache: false,
            });
            outcome.elapsed = started.elapsed();
            return Ok(outcome);
        }

        if !cached.contains_key(&plan.primary) && !config.timeouts.quick_check.is_zero() {
            if let Some(run) = self.quick_check(statement, &plan.primary, config, budget).await {
                outcome.rejected_by_quick_check = !run.result.is_timeout();
                outcome.runs.push(run);
                outcome.elapsed = started.elapsed();
                return Ok(outcome);
            }
        }

        let runs = if config.performance.enable_parallel {
            self.run_parallel(statement, &lineup, &mut cached, config, budget).await?
        } else {
            self.run_sequential(statement, &lineup, &mut cached, config, budget).await?
        };

        outcome.runs = runs;
        outcome.elapsed = started.elapsed();
        info!(
            "Dispatch of {} finished in {:?} with {} result(s)",
            statement.id,
            outcome.elapsed,
            outcome.runs.len()
        );
        Ok(outcome)
    }

    /// Parse-only pass against the primary. Returns the terminal primary run
    /// when dispatch has to stop here.
    async fn quick_check(
        &self,
        statement: &FormalStatement,
        primary: &BackendKind,
        config: &ProofAssistantConfig,
        budget: &RequestBudget
    ) -> Option<BackendRun> {
        let adapter = self.adapters.get(primary)?.clone();
        let submission = self.submission(statement, primary, &adapter, config)?;
        let limit = config.timeouts.quick_check;
        let sessions = budget.sessions.clone();
        let deadline = budget.deadline();
        let started = Instant::now();

        let mut handle = tokio::spawn(async move {
            let _permit = sessions.acquire_owned().await.ok()?;
            let window = limit.min(deadline.saturating_duration_since(Instant::now()));
            Some(adapter.quick_check(&submission, window).await)
        });

        match tokio::time::timeout_at(deadline, &mut handle).await {
            Ok(Ok(Some(QuickCheckOutcome::Rejected(result)))) => {
                info!("Quick check rejected {} on {}", statement.id, primary);
                Some(BackendRun {
                    backend: primary.clone(),
                    result,
                    from_cache: false,
                })
            }
            Ok(Ok(Some(QuickCheckOutcome::Parsed))) => {
                debug!("Quick check of {} passed", statement.id);
                None
            }
            Ok(Ok(Some(QuickCheckOutcome::Skipped))) | Ok(Ok(None)) => None,
            Ok(Err(join_error)) => {
                warn!("Quick check of {} on {} failed, going straight to verification: {}", statement.id, primary, join_error);
                None
            }
            Err(_) => {
                handle.abort();
                warn!("Request deadline hit during quick check of {}", statement.id);
                Some(BackendRun {
                    backend: primary.clone(),
                    result: SingleProofResult::timed_out(
                        started.elapsed(),
                        "cancelled: request exceeded max_total_time"
                    ),
                    from_cache: false,
                })
            }
        }
    }

    async fn run_parallel(
        &self,
        statement: &FormalStatement,
        lineup: &[(BackendKind, Duration)],
        cached: &mut HashMap<BackendKind, SingleProofResult>,
        config: &ProofAssistantConfig,
        budget: &RequestBudget
    ) -> EngineResult<Vec<BackendRun>> {
        let mut slots = Vec::with_capacity(lineup.len());
        for (backend, limit) in lineup {
            if let Some(result) = cached.remove(backend) {
                slots.push(
                    Slot::Ready(BackendRun {
                        backend: backend.clone(),
                        result,
                        from_cache: true,
                    })
                );
                continue;
            }
            if let Some(slot) = self.launch(statement, backend, *limit, config, budget)? {
                slots.push(slot);
            }
        }

        let mut runs = Vec::with_capacity(slots.len());
        for slot in slots {
            runs.push(self.settle(slot, config, budget).await?);
        }
        Ok(runs)
    }

    async fn run_sequential(
        &self,
        statement: &FormalStatement,
        lineup: &[(BackendKind, Duration)],
        cached: &mut HashMap<BackendKind, SingleProofResult>,
        config: &ProofAssistantConfig,
        budget: &RequestBudget
    ) -> EngineResult<Vec<BackendRun>> {
        let thresholds = &config.thresholds;
        let mut runs = Vec::new();

        for (backend, limit) in lineup {
            let run = match cached.remove(backend) {
                Some(result) =>
                    BackendRun {
                        backend: backend.clone(),
                        result,
                        from_cache: true,
                    },
                None => {
                    if budget.expired() {
                        debug!("Deadline reached, {} not started for {}", backend, statement.id);
                        break;
                    }
                    match self.launch(statement, backend, *limit, config, budget)? {
                        Some(slot) => self.settle(slot, config, budget).await?,
                        None => {
                            continue;
                        }
                    }
                }
            };

            let decisive =
                run.result.valid &&
                run.result.confidence >= thresholds.minimum_confidence &&
                !thresholds.require_cross_validation;
            runs.push(run);
            if decisive {
                debug!("{} settled by {}, remaining fallbacks skipped", statement.id, backend);
                break;
            }
        }
        Ok(runs)
    }

    /// Spawn one backend call as its own task
    fn launch(
        &self,
        statement: &FormalStatement,
        backend: &BackendKind,
        limit: Duration,
        config: &ProofAssistantConfig,
        budget: &RequestBudget
    ) -> EngineResult<Option<Slot>> {
        let adapter = match self.adapters.get(backend) {
            Some(adapter) => adapter.clone(),
            None => {
                return Ok(None);
            }
        };
        let submission = match self.submission(statement, backend, &adapter, config) {
            Some(submission) => submission,
            None => {
                return Ok(None);
            }
        };
        let key = self.fingerprint(statement, backend)?;
        let sessions = budget.sessions.clone();
        let deadline = budget.deadline();
        let started = Instant::now();

        let handle = tokio::spawn(async move {
            let call = async {
                let _permit = match sessions.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return SingleProofResult::failed(
                            ProofError::new(ProofErrorKind::Incomplete, "backend session pool closed"),
                            started.elapsed(),
                            ResourceUsage::default()
                        );
                    }
                };
                let window = limit.min(deadline.saturating_duration_since(Instant::now()));
                adapter.submit(&submission, window).await
            };
            match tokio::time::timeout_at(deadline, call).await {
                Ok(result) => result,
                Err(_) => SingleProofResult::timed_out(started.elapsed(), "cancelled: request exceeded max_total_time"),
            }
        });

        Ok(Some(Slot::Pending(backend.clone(), key, started, handle)))
    }

    /// Wait for a slot to become terminal and record live results in the cache
    async fn settle(&self, slot: Slot, config: &ProofAssistantConfig, budget: &RequestBudget) -> EngineResult<BackendRun> {
        let (backend, key, started, mut handle) = match slot {
            Slot::Ready(run) => {
                return Ok(run);
            }
            Slot::Pending(backend, key, started, handle) => (backend, key, started, handle),
        };

        let result = match tokio::time::timeout_at(budget.deadline() + CANCELLATION_GRACE, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => {
                warn!("{} task failed: {}", backend, join_error);
                SingleProofResult::failed(
                    ProofError::new(ProofErrorKind::Incomplete, format!("backend task failed: {}", join_error)),
                    started.elapsed(),
                    ResourceUsage::default()
                )
            }
            Err(_) => {
                handle.abort();
                warn!("{} did not wind down after the request deadline, aborted", backend);
                SingleProofResult::timed_out(started.elapsed(), "cancelled: request exceeded max_total_time")
            }
        };

        if config.performance.enable_cache && !result.is_timeout() {
            self.cache.put(key, result.clone())?;
        }

        Ok(BackendRun {
            backend,
            result,
            from_cache: false,
        })
    }

    fn submission(
        &self,
        statement: &FormalStatement,
        backend: &BackendKind,
        adapter: &Arc<dyn BackendAdapter>,
        config: &ProofAssistantConfig
    ) -> Option<Submission> {
        Submission::for_statement(statement, backend, adapter.dialect(), config.performance.memory_limit_mb)
    }

    fn fingerprint(&self, statement: &FormalStatement, backend: &BackendKind) -> EngineResult<Fingerprint> {
        let adapter = self.adapters
            .get(backend)
            .ok_or_else(|| EngineError::NoUsableBackend(statement.id.clone()))?;
        let text = statement.dialect_text(backend).unwrap_or_default();
        Ok(Fingerprint::compute(text, backend, &adapter.dialect().version))
    }
}
