use chrono::Utc;
use log::{ debug, info, warn };
use std::collections::{ BTreeMap, BTreeSet };
use std::sync::Arc;
use std::time::{ Duration, Instant };
use tokio::task::JoinSet;

use crate::config::ProofAssistantConfig;
use crate::errors::{ EngineError, EngineResult };
use crate::implementations::complexity::ComplexityEstimator;
use crate::implementations::consistency::{ ConsistencyAnalysis, ConsistencyAnalyzer };
use crate::implementations::dependency_graph::DependencyGraph;
use crate::implementations::dispatcher::{ BackendRun, DispatchOutcome, RequestBudget, SessionDispatcher };
use crate::implementations::ingest;
use crate::models::claim::{ MathClaim, RequiredCheck, ValidationContext, ValidationRequest };
use crate::models::common::BackendKind;
use crate::models::complexity::ComplexityReport;
use crate::models::result::SingleProofResult;
use crate::models::statement::FormalStatement;
use crate::models::validation::{
    ClaimVerdict,
    ProofValidationResult,
    ValidationMetadata,
    ValidationReport,
};

/// Entry point of the engine.
///
/// Validates the request, dispatches every statement, analyzes consistency
/// and complexity across the results and decides acceptance.
#[derive(Clone)]
pub struct ValidationOrchestrator {
    dispatcher: SessionDispatcher,
    analyzer: Arc<ConsistencyAnalyzer>,
    estimator: ComplexityEstimator,
}

impl ValidationOrchestrator {
    pub fn new(dispatcher: SessionDispatcher, analyzer: ConsistencyAnalyzer) -> Self {
        Self {
            dispatcher,
            analyzer: Arc::new(analyzer),
            estimator: ComplexityEstimator::new(),
        }
    }

    pub fn dispatcher(&self) -> &SessionDispatcher {
        &self.dispatcher
    }

    /// Validate a single statement with no claims and default context
    pub async fn validate_statement(
        &self,
        statement: &FormalStatement,
        config: &ProofAssistantConfig
    ) -> EngineResult<ProofValidationResult> {
        let request = ValidationRequest {
            statements: vec![statement.clone()],
            claims: Vec::new(),
            context: ValidationContext::default(),
            config: config.clone(),
        };
        let mut report = self.validate(&request).await?;
        report.results
            .remove(&statement.id)
            .ok_or_else(|| EngineError::TaskFailure(format!("no result produced for {}", statement.id)))
    }

    pub async fn validate(&self, request: &ValidationRequest) -> EngineResult<ValidationReport> {
        let started = Instant::now();
        let timestamp = Utc::now();

        request.config.validate()?;
        ingest::validate_request(&request.statements, &request.claims)?;
        let config = effective_config(&request.config, &request.context);

        // Every statement needs a usable backend before anything is launched
        for statement in &request.statements {
            self.dispatcher.plan(statement, &config)?;
        }

        info!(
            "Validating {} statement(s) and {} claim(s)",
            request.statements.len(),
            request.claims.len()
        );

        let budget = RequestBudget::new(&config);
        let outcomes = if config.performance.enable_parallel {
            self.dispatch_concurrently(&request.statements, &config, &budget).await?
        } else {
            let mut outcomes = BTreeMap::new();
            let mut ordered: Vec<&FormalStatement> = request.statements.iter().collect();
            ordered.sort_by(|a, b| a.id.cmp(&b.id));
            for statement in ordered {
                let outcome = self.dispatcher.dispatch(statement, &config, &budget).await?;
                outcomes.insert(statement.id.clone(), outcome);
            }
            outcomes
        };

        let runs: BTreeMap<String, Vec<BackendRun>> = outcomes
            .iter()
            .map(|(id, outcome)| (id.clone(), outcome.runs.clone()))
            .collect();
        let analysis = self.analyzer.analyze(
            &request.statements,
            &request.claims,
            &runs,
            config.thresholds.consistency_threshold
        );

        let graph = DependencyGraph::build(&request.statements, &request.claims);
        let by_id: BTreeMap<&str, &FormalStatement> = request.statements
            .iter()
            .map(|s| (s.id.as_str(), s))
            .collect();

        let mut results = BTreeMap::new();
        for (id, statement) in &by_id {
            let outcome = match outcomes.get(*id) {
                Some(outcome) => outcome,
                None => {
                    return Err(EngineError::TaskFailure(format!("no dispatch outcome for {}", id)));
                }
            };
            self.analyzer.record_history(statement, &outcome.runs);
            let complexity = self.estimator.estimate(statement, &by_id, &graph, &outcome.runs);
            let result = self.assemble(outcome, &analysis, complexity, &config, timestamp);
            results.insert(id.to_string(), result);
        }

        let claims = claim_verdicts(&request.claims, &results);
        let metadata = request_metadata(&outcomes, &config, timestamp, started.elapsed());
        let accepted =
            results.values().all(|r| r.accepted) &&
            analysis.report.external_consistent &&
            analysis.report.score >= config.thresholds.consistency_threshold;

        info!(
            "Validation finished in {:?}: {}/{} statement(s) accepted, request {}",
            metadata.total_time,
            results.values().filter(|r| r.accepted).count(),
            results.len(),
            if accepted { "accepted" } else { "rejected" }
        );

        Ok(ValidationReport {
            results,
            claims,
            consistency: analysis.report,
            accepted,
            metadata,
        })
    }

    /// One task per statement; backend calls still share the request's session pool
    async fn dispatch_concurrently(
        &self,
        statements: &[FormalStatement],
        config: &ProofAssistantConfig,
        budget: &RequestBudget
    ) -> EngineResult<BTreeMap<String, DispatchOutcome>> {
        let mut tasks = JoinSet::new();
        for statement in statements {
            let dispatcher = self.dispatcher.clone();
            let statement = statement.clone();
            let config = config.clone();
            let budget = budget.clone();
            tasks.spawn(async move { dispatcher.dispatch(&statement, &config, &budget).await });
        }

        let mut outcomes = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.map_err(|e| EngineError::TaskFailure(e.to_string()))??;
            outcomes.insert(outcome.statement_id.clone(), outcome);
        }
        Ok(outcomes)
    }

    fn assemble(
        &self,
        outcome: &DispatchOutcome,
        analysis: &ConsistencyAnalysis,
        complexity: ComplexityReport,
        config: &ProofAssistantConfig,
        timestamp: chrono::DateTime<Utc>
    ) -> ProofValidationResult {
        let thresholds = &config.thresholds;
        let primary_result = outcome
            .primary_run()
            .map(|run| run.result.clone())
            .unwrap_or_else(|| {
                warn!("{} has no primary result, recording a timeout", outcome.statement_id);
                SingleProofResult::timed_out(Duration::ZERO, "primary backend never produced a result")
            });
        let secondary_results: BTreeMap<BackendKind, SingleProofResult> = outcome
            .secondary_runs()
            .map(|run| (run.backend.clone(), run.result.clone()))
            .collect();

        let mut reasons = Vec::new();
        if outcome.rejected_by_quick_check {
            reasons.push(format!("{} rejected the statement in its parse-only pass", outcome.primary));
        }
        if primary_result.is_timeout() {
            reasons.push(format!("{} timed out", outcome.primary));
        } else if !primary_result.valid {
            reasons.push(format!("{} did not verify the statement", outcome.primary));
        }
        if primary_result.valid && primary_result.confidence < thresholds.minimum_confidence {
            reasons.push(
                format!(
                    "confidence {:.2} is below the minimum of {:.2}",
                    primary_result.confidence,
                    thresholds.minimum_confidence
                )
            );
        }
        if primary_result.errors.len() > thresholds.max_errors_allowed {
            reasons.push(
                format!(
                    "{} error(s) reported, at most {} allowed",
                    primary_result.errors.len(),
                    thresholds.max_errors_allowed
                )
            );
        }

        let valid =
            primary_result.valid &&
            primary_result.confidence >= thresholds.minimum_confidence &&
            primary_result.errors.len() <= thresholds.max_errors_allowed;

        let consistency = analysis.for_statement(&outcome.statement_id);
        if consistency.score < thresholds.consistency_threshold {
            reasons.push(
                format!(
                    "consistency score {:.2} is below the threshold of {:.2}",
                    consistency.score,
                    thresholds.consistency_threshold
                )
            );
        }
        if !consistency.internal_consistent {
            reasons.push("backends disagree on validity".to_string());
        }
        for contradiction in &consistency.contradictions {
            reasons.push(
                format!("{} contradiction: {}", contradiction.severity, contradiction.description)
            );
        }

        let cross_validated = secondary_results.values().any(|r| r.valid && !r.is_timeout());
        if thresholds.require_cross_validation && !cross_validated {
            reasons.push("cross-validation required but no secondary backend confirmed".to_string());
        }

        let accepted = valid && reasons.is_empty();
        debug!("{}: valid {}, accepted {}, reasons {:?}", outcome.statement_id, valid, accepted, reasons);

        ProofValidationResult {
            statement_id: outcome.statement_id.clone(),
            primary_backend: outcome.primary.clone(),
            primary_result,
            secondary_results,
            consistency,
            complexity,
            valid,
            accepted,
            rejection_reasons: reasons,
            metadata: ValidationMetadata {
                timestamp,
                total_time: outcome.elapsed,
                assistants_used: outcome.backends_used(),
                cached_backends: outcome.cached_backends(),
                skipped_backends: outcome.skipped.clone(),
                config: config.clone(),
            },
        }
    }
}

/// Required checks only ever tighten the configuration
pub fn effective_config(config: &ProofAssistantConfig, context: &ValidationContext) -> ProofAssistantConfig {
    let mut effective = config.clone();
    if context.requires(RequiredCheck::CrossValidation) {
        effective.thresholds.require_cross_validation = true;
    }
    if context.requires(RequiredCheck::SyntaxPrecheck) && effective.timeouts.quick_check.is_zero() {
        effective.timeouts.quick_check = effective.timeouts.full_verification;
    }
    effective
}

fn claim_verdicts(claims: &[MathClaim], results: &BTreeMap<String, ProofValidationResult>) -> Vec<ClaimVerdict> {
    let mut verdicts: Vec<ClaimVerdict> = claims
        .iter()
        .map(|claim| ClaimVerdict {
            claim_id: claim.id.clone(),
            statement_ids: claim.statement_ids.clone(),
            supported: claim.statement_ids
                .iter()
                .all(|id| results.get(id).map(|r| r.accepted).unwrap_or(false)),
        })
        .collect();
    verdicts.sort_by(|a, b| a.claim_id.cmp(&b.claim_id));
    verdicts
}

fn request_metadata(
    outcomes: &BTreeMap<String, DispatchOutcome>,
    config: &ProofAssistantConfig,
    timestamp: chrono::DateTime<Utc>,
    total_time: Duration
) -> ValidationMetadata {
    let mut used = BTreeSet::new();
    let mut cached = BTreeSet::new();
    let mut skipped = BTreeSet::new();
    for outcome in outcomes.values() {
        used.extend(outcome.backends_used());
        cached.extend(outcome.cached_backends());
        skipped.extend(outcome.skipped.iter().cloned());
    }
    ValidationMetadata {
        timestamp,
        total_time,
        assistants_used: used.into_iter().collect(),
        cached_backends: cached.into_iter().collect(),
        skipped_backends: skipped.into_iter().collect(),
        config: config.clone(),
    }
}
