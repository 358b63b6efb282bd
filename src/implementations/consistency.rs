use dashmap::DashMap;
use log::{ debug, info };
use std::collections::{ BTreeMap, BTreeSet };
use std::sync::Arc;

use crate::implementations::dependency_graph::DependencyGraph;
use crate::implementations::dispatcher::BackendRun;
use crate::implementations::negation::NegationRecognizer;
use crate::models::claim::MathClaim;
use crate::models::common::{ BackendKind, MathDomain, StatementKind };
use crate::models::statement::FormalStatement;
use crate::models::validation::{
    ConsistencyReport,
    ContradictionKind,
    ContradictionSeverity,
    LogicalContradiction,
};

/// Share of its weight a timed-out backend keeps in the denominator
pub const TIMEOUT_WEIGHT: f64 = 0.25;

/// Weight of a backend missing from a configured table
const DEFAULT_WEIGHT: f64 = 0.5;

/// Floor applied to every weight so no backend silently drops out
const MIN_WEIGHT: f64 = 0.01;

/// Running mean of the confidence each backend achieved per domain
#[derive(Debug, Default)]
pub struct ConfidenceHistory {
    samples: DashMap<(MathDomain, BackendKind), (f64, u64)>,
}

impl ConfidenceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, domain: &MathDomain, backend: &BackendKind, confidence: f64) {
        if !confidence.is_finite() {
            return;
        }
        let mut entry = self.samples.entry((domain.clone(), backend.clone())).or_insert((0.0, 0));
        entry.0 += confidence.clamp(0.0, 1.0);
        entry.1 += 1;
    }

    pub fn mean(&self, domain: &MathDomain, backend: &BackendKind) -> Option<f64> {
        self.samples
            .get(&(domain.clone(), backend.clone()))
            .filter(|entry| entry.1 > 0)
            .map(|entry| entry.0 / (entry.1 as f64))
    }

    pub fn has_domain(&self, domain: &MathDomain) -> bool {
        self.samples.iter().any(|entry| &entry.key().0 == domain)
    }
}

/// How backends are weighted against each other within a domain
#[derive(Debug, Clone)]
pub enum WeightingPolicy {
    /// Every backend counts the same
    Uniform,
    /// Fixed per-domain tables; domains without a table fall back to uniform
    Static(BTreeMap<MathDomain, BTreeMap<BackendKind, f64>>),
    /// Mean historical confidence per domain; uniform until a domain has history
    Historical(Arc<ConfidenceHistory>),
}

impl Default for WeightingPolicy {
    fn default() -> Self {
        WeightingPolicy::Uniform
    }
}

impl WeightingPolicy {
    pub fn weight(&self, domain: &MathDomain, backend: &BackendKind) -> f64 {
        let weight = match self {
            WeightingPolicy::Uniform => 1.0,
            WeightingPolicy::Static(tables) =>
                match tables.get(domain) {
                    Some(table) => table.get(backend).copied().unwrap_or(DEFAULT_WEIGHT),
                    None => 1.0,
                }
            WeightingPolicy::Historical(history) => {
                if history.has_domain(domain) {
                    history.mean(domain, backend).unwrap_or(DEFAULT_WEIGHT)
                } else {
                    1.0
                }
            }
        };
        if weight.is_finite() { weight.max(MIN_WEIGHT) } else { 1.0 }
    }
}

/// Request-wide analysis output
#[derive(Debug, Clone)]
pub struct ConsistencyAnalysis {
    pub report: ConsistencyReport,
    /// Whether the backends agreed on each statement
    pub internal: BTreeMap<String, bool>,
}

impl ConsistencyAnalysis {
    pub fn for_statement(&self, statement_id: &str) -> ConsistencyReport {
        let internal = self.internal.get(statement_id).copied().unwrap_or(true);
        self.report.for_statement(statement_id, internal)
    }
}

/// Scores agreement between backends and finds contradictions across statements.
///
/// Every traversal runs over sorted identifiers and sorted backends, so the
/// report does not depend on the order statements were submitted in.
#[derive(Debug, Clone, Default)]
pub struct ConsistencyAnalyzer {
    policy: WeightingPolicy,
    recognizer: NegationRecognizer,
}

impl ConsistencyAnalyzer {
    pub fn new(policy: WeightingPolicy) -> Self {
        Self {
            policy,
            recognizer: NegationRecognizer::new(),
        }
    }

    pub fn policy(&self) -> &WeightingPolicy {
        &self.policy
    }

    /// Feed finished results into the history, when the policy keeps one
    pub fn record_history(&self, statement: &FormalStatement, runs: &[BackendRun]) {
        if let WeightingPolicy::Historical(history) = &self.policy {
            for run in runs.iter().filter(|run| !run.result.is_timeout() && !run.from_cache) {
                history.record(&statement.domain, &run.backend, run.result.confidence);
            }
        }
    }

    pub fn analyze(
        &self,
        statements: &[FormalStatement],
        claims: &[MathClaim],
        runs: &BTreeMap<String, Vec<BackendRun>>,
        threshold: f64
    ) -> ConsistencyAnalysis {
        let by_id: BTreeMap<&str, &FormalStatement> = statements
            .iter()
            .map(|s| (s.id.as_str(), s))
            .collect();
        let no_runs = Vec::new();

        let mut statement_scores = BTreeMap::new();
        let mut internal = BTreeMap::new();
        for (id, statement) in &by_id {
            let statement_runs = runs.get(*id).unwrap_or(&no_runs);
            statement_scores.insert(id.to_string(), self.statement_score(statement, statement_runs));
            internal.insert(id.to_string(), self.backends_agree(statement, statement_runs, threshold));
        }

        let score = if statement_scores.is_empty() {
            0.0
        } else {
            (statement_scores.values().sum::<f64>() / (statement_scores.len() as f64)).clamp(0.0, 1.0)
        };

        let graph = DependencyGraph::build(statements, claims);
        let contradictions = self.find_contradictions(&by_id, claims, runs, &graph);

        let report = ConsistencyReport {
            internal_consistent: internal.values().all(|agree| *agree),
            external_consistent: contradictions.is_empty(),
            contradictions,
            score,
            statement_scores,
        };
        info!(
            "Consistency: score {:.3}, internal {}, {} contradiction(s)",
            report.score,
            report.internal_consistent,
            report.contradictions.len()
        );

        ConsistencyAnalysis { report, internal }
    }

    /// Weighted agreement for one statement. Timed-out backends abstain: they
    /// add nothing to the numerator and a quarter of their weight to the denominator.
    pub fn statement_score(&self, statement: &FormalStatement, runs: &[BackendRun]) -> f64 {
        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for run in runs {
            let weight = self.policy.weight(&statement.domain, &run.backend);
            if run.result.is_timeout() {
                denominator += weight * TIMEOUT_WEIGHT;
            } else {
                denominator += weight;
                if run.result.valid {
                    numerator += weight * run.result.confidence.clamp(0.0, 1.0);
                }
            }
        }
        if denominator > 0.0 { (numerator / denominator).clamp(0.0, 1.0) } else { 0.0 }
    }

    /// Weighted share of non-timeout backends siding with the majority verdict meets `threshold`
    fn backends_agree(&self, statement: &FormalStatement, runs: &[BackendRun], threshold: f64) -> bool {
        let mut valid_weight = 0.0;
        let mut invalid_weight = 0.0;
        for run in runs.iter().filter(|run| !run.result.is_timeout()) {
            let weight = self.policy.weight(&statement.domain, &run.backend);
            if run.result.valid {
                valid_weight += weight;
            } else {
                invalid_weight += weight;
            }
        }
        let total = valid_weight + invalid_weight;
        if total <= 0.0 {
            return true;
        }
        f64::max(valid_weight, invalid_weight) / total >= threshold
    }

    fn find_contradictions(
        &self,
        by_id: &BTreeMap<&str, &FormalStatement>,
        claims: &[MathClaim],
        runs: &BTreeMap<String, Vec<BackendRun>>,
        graph: &DependencyGraph
    ) -> Vec<LogicalContradiction> {
        let mut found: BTreeMap<Vec<String>, LogicalContradiction> = BTreeMap::new();

        for cycle in graph.cycles() {
            let contradiction = LogicalContradiction {
                description: format!("Dependency cycle through {}", cycle.join(" → ")),
                resolution_hint: Some(
                    format!("Remove one of the dependencies among {} so the chain is well-founded", cycle.join(", "))
                ),
                statement_ids: cycle.clone(),
                kind: ContradictionKind::DependencyCycle,
                severity: ContradictionSeverity::Critical,
                backend: None,
            };
            found.entry(cycle).or_insert(contradiction);
        }

        let closures: BTreeMap<&str, BTreeSet<String>> = by_id
            .keys()
            .map(|id| (*id, graph.closure(id)))
            .collect();

        // Backends that validated each statement, sorted
        let validated: BTreeMap<&str, BTreeSet<BackendKind>> = by_id
            .keys()
            .map(|id| {
                let backends = runs
                    .get(*id)
                    .map(|rs| {
                        rs.iter()
                            .filter(|run| run.result.valid && !run.result.is_timeout())
                            .map(|run| run.backend.clone())
                            .collect()
                    })
                    .unwrap_or_default();
                (*id, backends)
            })
            .collect();

        let claim_mates = claim_mates(claims);
        let ids: Vec<&str> = by_id.keys().copied().collect();

        // Two validated conclusions negate each other
        for (i, &left) in ids.iter().enumerate() {
            for &right in &ids[i + 1..] {
                let shared: BTreeSet<String> = closures[left].intersection(&closures[right]).cloned().collect();
                let related =
                    !shared.is_empty() ||
                    closures[left].contains(right) ||
                    closures[right].contains(left) ||
                    claim_mates.contains(&(left.to_string(), right.to_string()));
                if !related {
                    continue;
                }
                let common = validated[left].intersection(&validated[right]);
                for backend in common {
                    if self.recognizer.negates(backend, &by_id[left].conclusion, &by_id[right].conclusion) {
                        let members = vec![left.to_string(), right.to_string()];
                        let severity = classify_severity(&members, &shared, by_id);
                        found.entry(members.clone()).or_insert_with(|| LogicalContradiction {
                            description: format!(
                                "{} concludes \"{}\" while {} concludes \"{}\"",
                                left,
                                by_id[left].conclusion,
                                right,
                                by_id[right].conclusion
                            ),
                            resolution_hint: Some(resolution_hint(&members, &shared, severity)),
                            statement_ids: members,
                            kind: ContradictionKind::Negation,
                            severity,
                            backend: Some(backend.clone()),
                        });
                        break;
                    }
                }
            }
        }

        // A validated statement relies on something another validated statement refutes
        for &relying in &ids {
            for backend in &validated[relying] {
                for dependency in &closures[relying] {
                    let dependency_stmt = match by_id.get(dependency.as_str()) {
                        Some(stmt) => *stmt,
                        None => {
                            continue;
                        }
                    };
                    for &refuting in &ids {
                        if refuting == dependency || !validated[refuting].contains(backend) {
                            continue;
                        }
                        if !self.recognizer.negates(backend, &dependency_stmt.conclusion, &by_id[refuting].conclusion) {
                            continue;
                        }
                        let members: Vec<String> = [relying, dependency.as_str(), refuting]
                            .into_iter()
                            .map(str::to_string)
                            .collect::<BTreeSet<_>>()
                            .into_iter()
                            .collect();
                        if found.contains_key(&members) {
                            continue;
                        }
                        let conflicted: BTreeSet<String> = std::iter::once(dependency.clone()).collect();
                        let severity = classify_severity(&members, &conflicted, by_id);
                        debug!("{} relies on {} which {} refutes", relying, dependency, refuting);
                        found.insert(members.clone(), LogicalContradiction {
                            description: format!(
                                "{} relies on {} (\"{}\"), which {} refutes with \"{}\"",
                                relying,
                                dependency,
                                dependency_stmt.conclusion,
                                refuting,
                                by_id[refuting].conclusion
                            ),
                            resolution_hint: Some(resolution_hint(&members, &conflicted, severity)),
                            statement_ids: members,
                            kind: ContradictionKind::DependencyConflict,
                            severity,
                            backend: Some(backend.clone()),
                        });
                    }
                }
            }
        }

        found.into_values().collect()
    }
}

/// Unordered pairs of statements that support a common claim, stored both ways round
fn claim_mates(claims: &[MathClaim]) -> BTreeSet<(String, String)> {
    let mut mates = BTreeSet::new();
    for claim in claims {
        for a in &claim.statement_ids {
            for b in &claim.statement_ids {
                if a != b {
                    mates.insert((a.clone(), b.clone()));
                }
            }
        }
    }
    mates
}

/// A statement can be re-established without the contradiction when it has a
/// non-empty sketch whose required lemmas avoid every statement involved in it.
fn has_independent_proof(statement: &FormalStatement, excluded: &BTreeSet<String>) -> bool {
    if statement.kind == StatementKind::Axiom {
        return false;
    }
    match &statement.proof_sketch {
        Some(sketch) =>
            !sketch.steps.is_empty() &&
                sketch.required_lemmas.iter().all(|lemma| !excluded.contains(lemma)),
        None => false,
    }
}

/// Critical when an axiom is involved, when a conflicted dependency cannot be
/// re-proved independently, or when no member can; major when a theorem or
/// lemma member has an independent proof; minor otherwise.
fn classify_severity(
    members: &[String],
    dependencies: &BTreeSet<String>,
    by_id: &BTreeMap<&str, &FormalStatement>
) -> ContradictionSeverity {
    let excluded: BTreeSet<String> = members.iter().cloned().chain(dependencies.iter().cloned()).collect();
    let involved: Vec<&FormalStatement> = excluded
        .iter()
        .filter_map(|id| by_id.get(id.as_str()).copied())
        .collect();

    if involved.iter().any(|s| s.kind == StatementKind::Axiom) {
        return ContradictionSeverity::Critical;
    }

    let dependency_stuck = dependencies
        .iter()
        .filter_map(|id| by_id.get(id.as_str()).copied())
        .any(|dep| !has_independent_proof(dep, &excluded));
    let recoverable: Vec<&FormalStatement> = members
        .iter()
        .filter_map(|id| by_id.get(id.as_str()).copied())
        .filter(|s| has_independent_proof(s, &excluded))
        .collect();

    if dependency_stuck || recoverable.is_empty() {
        ContradictionSeverity::Critical
    } else if recoverable.iter().any(|s| s.kind.is_theorem_like()) {
        ContradictionSeverity::Major
    } else {
        ContradictionSeverity::Minor
    }
}

fn resolution_hint(members: &[String], dependencies: &BTreeSet<String>, severity: ContradictionSeverity) -> String {
    match severity {
        ContradictionSeverity::Critical if !dependencies.is_empty() => {
            let deps: Vec<&str> = dependencies.iter().map(String::as_str).collect();
            format!("Re-examine {} first; everything built on it is suspect", deps.join(", "))
        }
        ContradictionSeverity::Critical =>
            format!("At most one of {} can hold; revisit their hypotheses", members.join(", ")),
        _ =>
            format!(
                "Re-verify {} through their independent proof sketches to find the faulty step",
                members.join(", ")
            ),
    }
}
