use log::debug;
use std::collections::{ BTreeSet, HashSet };

use crate::errors::{ EngineError, EngineResult };
use crate::models::claim::MathClaim;
use crate::models::statement::FormalStatement;

/// Tokens that bind the identifiers following them up to `,` `.` or `:`
const BINDER_WORDS: &[&str] = &["forall", "exists", "fun", "lambda", "fn", "let"];
const BINDER_SYMBOLS: &[char] = &['∀', '∃', 'λ', 'Π', 'Σ', '∑', '∏'];

/// Single letters that read as constants or articles rather than variables
const RESERVED_LETTERS: &[&str] = &["a", "e", "i"];

/// Reject malformed requests before any backend is contacted.
///
/// Checks identifiers, references between statements and claims, value
/// ranges, proof sketch step ordering and variable declarations. The first
/// problem found is returned.
pub fn validate_request(statements: &[FormalStatement], claims: &[MathClaim]) -> EngineResult<()> {
    if statements.is_empty() {
        return Err(EngineError::InvalidInput("request contains no statements".to_string()));
    }

    let mut statement_ids = HashSet::new();
    for statement in statements {
        if statement.id.trim().is_empty() {
            return Err(EngineError::InvalidInput("statement with empty identifier".to_string()));
        }
        if !statement_ids.insert(statement.id.as_str()) {
            return Err(EngineError::DuplicateIdentifier {
                entity: "statement",
                id: statement.id.clone(),
            });
        }
    }

    for statement in statements {
        validate_statement(statement, &statement_ids)?;
    }

    let mut claim_ids = HashSet::new();
    for claim in claims {
        if claim.id.trim().is_empty() {
            return Err(EngineError::InvalidInput("claim with empty identifier".to_string()));
        }
        if !claim_ids.insert(claim.id.as_str()) {
            return Err(EngineError::DuplicateIdentifier {
                entity: "claim",
                id: claim.id.clone(),
            });
        }
    }

    for claim in claims {
        check_unit_range(&claim.id, "evidence_strength", claim.evidence_strength)?;
        if claim.statement_ids.is_empty() {
            return Err(
                EngineError::InvalidInput(format!("claim {} is not supported by any statement", claim.id))
            );
        }
        for statement_id in &claim.statement_ids {
            if !statement_ids.contains(statement_id.as_str()) {
                return Err(EngineError::UnknownReference {
                    from: format!("claim {}", claim.id),
                    entity: "statement",
                    to: statement_id.clone(),
                });
            }
        }
        for dep in &claim.dependencies {
            if dep == &claim.id {
                return Err(EngineError::InvalidInput(format!("claim {} depends on itself", claim.id)));
            }
            if !claim_ids.contains(dep.as_str()) {
                return Err(EngineError::UnknownReference {
                    from: format!("claim {}", claim.id),
                    entity: "claim",
                    to: dep.clone(),
                });
            }
        }
    }

    debug!("Request with {} statements and {} claims passed ingestion", statements.len(), claims.len());
    Ok(())
}

fn validate_statement(statement: &FormalStatement, known: &HashSet<&str>) -> EngineResult<()> {
    check_unit_range(&statement.id, "extraction_confidence", statement.extraction_confidence)?;

    for dep in &statement.dependencies {
        if dep == &statement.id {
            return Err(EngineError::SelfDependency(statement.id.clone()));
        }
        if !known.contains(dep.as_str()) {
            return Err(EngineError::UnknownReference {
                from: format!("statement {}", statement.id),
                entity: "statement",
                to: dep.clone(),
            });
        }
    }

    if let Some(sketch) = &statement.proof_sketch {
        for (step, proof_step) in sketch.steps.iter().enumerate() {
            if let Some(&dependency) = proof_step.depends_on.iter().find(|&&dep| dep >= step) {
                return Err(EngineError::CyclicStepDependency {
                    statement: statement.id.clone(),
                    step,
                    dependency,
                });
            }
        }
    }

    let mut declared = HashSet::new();
    for variable in &statement.variables {
        if variable.name.trim().is_empty() {
            return Err(
                EngineError::InvalidInput(format!("statement {} declares an unnamed variable", statement.id))
            );
        }
        if !declared.insert(variable.name.as_str()) {
            return Err(EngineError::DuplicateIdentifier {
                entity: "variable",
                id: format!("{}.{}", statement.id, variable.name),
            });
        }
    }

    // Without declarations there is nothing to check usage against
    if declared.is_empty() {
        return Ok(());
    }

    let texts = statement.hypotheses
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(statement.conclusion.as_str()));
    let mut used = BTreeSet::new();
    let mut bound = HashSet::new();
    for text in texts {
        scan_identifiers(text, &mut used, &mut bound);
    }
    for name in used {
        if !declared.contains(name.as_str()) && !bound.contains(&name) {
            return Err(EngineError::UndeclaredVariable {
                statement: statement.id.clone(),
                variable: name,
            });
        }
    }

    Ok(())
}

fn check_unit_range(owner: &str, field: &'static str, value: f64) -> EngineResult<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(EngineError::OutOfRange {
            owner: owner.to_string(),
            field,
            value,
        })
    }
}

/// Collect variable-like identifiers (a single lower-case letter, optionally
/// followed by digits or primes) and the names bound by quantifiers.
fn scan_identifiers(text: &str, used: &mut BTreeSet<String>, bound: &mut HashSet<String>) {
    let mut binding = false;
    let mut word = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if BINDER_SYMBOLS.contains(&c) {
            binding = true;
        } else if c.is_alphanumeric() || c == '_' || c == '\'' {
            word.push(c);
            let continues = chars
                .peek()
                .map(|&n| !BINDER_SYMBOLS.contains(&n) && (n.is_alphanumeric() || n == '_' || n == '\''))
                .unwrap_or(false);
            if continues {
                continue;
            }
            if BINDER_WORDS.contains(&word.as_str()) {
                binding = true;
            } else if is_variable_like(&word) {
                if binding {
                    bound.insert(word.clone());
                } else {
                    used.insert(word.clone());
                }
            }
            word.clear();
        } else if matches!(c, ',' | '.' | ':') {
            binding = false;
        }
    }
}

fn is_variable_like(word: &str) -> bool {
    if RESERVED_LETTERS.contains(&word) {
        return false;
    }
    let mut chars = word.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => chars.all(|c| c.is_ascii_digit() || c == '\''),
        _ => false,
    }
}
