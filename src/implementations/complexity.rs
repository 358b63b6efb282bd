use log::debug;
use std::collections::{ BTreeMap, BTreeSet };

use crate::implementations::dependency_graph::DependencyGraph;
use crate::implementations::dispatcher::BackendRun;
use crate::models::common::{ ComplexityClass, StatementKind };
use crate::models::complexity::{ ComplexityReport, ProofDifficulty };
use crate::models::statement::FormalStatement;

const DEPTH_FACTOR: f64 = 0.2;
const AXIOM_FACTOR: f64 = 0.1;

/// Derives proof length, dependency depth, axiom usage, computational class
/// and a difficulty score from a statement and the results its backends returned.
#[derive(Debug, Clone, Default)]
pub struct ComplexityEstimator;

impl ComplexityEstimator {
    pub fn new() -> Self {
        Self
    }

    pub fn estimate(
        &self,
        statement: &FormalStatement,
        statements: &BTreeMap<&str, &FormalStatement>,
        graph: &DependencyGraph,
        runs: &[BackendRun]
    ) -> ComplexityReport {
        let live: Vec<&BackendRun> = runs
            .iter()
            .filter(|run| !run.result.is_timeout())
            .collect();

        let sketch_steps = statement.proof_sketch.as_ref().map(|s| s.steps.len()).unwrap_or(0);
        let longest_proof = live
            .iter()
            .filter(|run| run.result.valid)
            .filter_map(|run| run.result.proof_text.as_ref())
            .map(|text| text.lines().filter(|line| !line.trim().is_empty()).count())
            .max()
            .unwrap_or(0);
        let proof_length = sketch_steps.max(longest_proof);

        let sketch_depth = statement.proof_sketch.as_ref().map(|s| s.dependency_depth()).unwrap_or(0);
        let dependency_depth = sketch_depth.max(graph.longest_chain(&statement.id));

        let axioms = collect_axioms(statement, statements, graph, &live);

        let reported: Vec<ComplexityClass> = live
            .iter()
            .filter_map(|run| run.result.reported_complexity)
            .collect();
        let computational_class = if reported.iter().all(|c| *c == ComplexityClass::Unknown) {
            statement.proof_sketch
                .as_ref()
                .map(|s| s.estimated_complexity)
                .unwrap_or(ComplexityClass::Unknown)
        } else {
            resolve_class(&reported)
        };

        let min_confidence = live
            .iter()
            .map(|run| run.result.confidence.clamp(0.0, 1.0))
            .fold(None, |acc: Option<f64>, c| Some(acc.map_or(c, |a| a.min(c))))
            .unwrap_or(0.0);
        let difficulty = difficulty_score(dependency_depth, axioms.len(), min_confidence);

        debug!(
            "Complexity of {}: length {}, depth {}, {} axiom(s), class {}, difficulty {:.3}",
            statement.id,
            proof_length,
            dependency_depth,
            axioms.len(),
            computational_class,
            difficulty
        );

        ComplexityReport {
            proof_length,
            dependency_depth,
            axioms,
            computational_class,
            difficulty,
            difficulty_level: ProofDifficulty::from_score(difficulty),
        }
    }
}

/// Structural difficulty `1 - exp(-(0.2 depth + 0.1 axioms))`, raised further
/// the less confident the least confident backend was.
///
/// Non-decreasing in depth and axiom count, non-increasing in confidence.
pub fn difficulty_score(dependency_depth: usize, axiom_count: usize, min_confidence: f64) -> f64 {
    let exposure = DEPTH_FACTOR * (dependency_depth as f64) + AXIOM_FACTOR * (axiom_count as f64);
    let structural = 1.0 - (-exposure).exp();
    let confidence = min_confidence.clamp(0.0, 1.0);
    (1.0 - (1.0 - structural) * confidence).clamp(0.0, 1.0)
}

/// Pick the most specific class every report is compatible with.
///
/// Classes on the chain trivial ⊂ polynomial ⊂ exponential nest, so the
/// smallest one reported wins. Undecidable only stands when it is all that was
/// reported; mixed with a decidable class it resolves to unknown.
pub fn resolve_class(reported: &[ComplexityClass]) -> ComplexityClass {
    let known: Vec<ComplexityClass> = reported
        .iter()
        .copied()
        .filter(|c| *c != ComplexityClass::Unknown)
        .collect();
    if known.is_empty() {
        return ComplexityClass::Unknown;
    }

    let undecidable = known.iter().any(|c| *c == ComplexityClass::Undecidable);
    let tightest = known
        .iter()
        .filter_map(|c| c.chain_rank().map(|rank| (rank, *c)))
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, c)| c);

    match (undecidable, tightest) {
        (true, Some(_)) => ComplexityClass::Unknown,
        (true, None) => ComplexityClass::Undecidable,
        (false, Some(class)) => class,
        (false, None) => ComplexityClass::Unknown,
    }
}

/// Axioms reported by backends plus axiom statements the statement transitively relies on
fn collect_axioms(
    statement: &FormalStatement,
    statements: &BTreeMap<&str, &FormalStatement>,
    graph: &DependencyGraph,
    live: &[&BackendRun]
) -> BTreeSet<String> {
    let mut axioms: BTreeSet<String> = live
        .iter()
        .flat_map(|run| run.result.axioms_used.iter().cloned())
        .collect();

    let mut relied_on = graph.closure(&statement.id);
    if let Some(sketch) = &statement.proof_sketch {
        relied_on.extend(sketch.required_lemmas.iter().cloned());
    }
    for id in relied_on {
        if let Some(dep) = statements.get(id.as_str()) {
            if dep.kind == StatementKind::Axiom {
                axioms.insert(id);
            }
        }
    }
    axioms
}
