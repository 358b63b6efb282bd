use colored::*;
use console::Term;
use dialoguer::{ theme::ColorfulTheme, Confirm };
use indicatif::{ ProgressBar, ProgressStyle };
use std::time::Duration;
use textwrap::wrap;

use proofmesh::models::common::BackendKind;
use proofmesh::models::result::{ SingleProofResult, VerificationStatus };
use proofmesh::models::validation::{
    ContradictionSeverity,
    LogicalContradiction,
    ProofValidationResult,
    ValidationReport,
};

/// UI theme for consistent appearance
pub fn get_theme() -> ColorfulTheme {
    ColorfulTheme::default()
}

fn term_width() -> usize {
    (Term::stdout().size().1 as usize).max(40)
}

/// Print a section header
pub fn print_header(title: &str) {
    let title = format!(" {} ", title);
    println!("\n{}\n", title.bold().white().on_blue());
}

/// Print text with proper wrapping
pub fn print_text(text: &str) {
    let width = term_width();
    for line in text.lines() {
        for wrapped_line in wrap(line, width.saturating_sub(10)) {
            println!("{}", wrapped_line);
        }
    }
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "ERROR:".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "WARNING:".yellow().bold(), message);
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "SUCCESS:".green().bold(), message);
}

/// Print information
pub fn print_info(message: &str) {
    println!("{} {}", "INFO:".blue().bold(), message);
}

/// Print a formatted result
pub fn print_result(label: &str, value: &str) {
    println!("{}: {}", label.bold(), value);
}

/// Print verification status with color
pub fn print_verification_status(backend: &BackendKind, result: &SingleProofResult) {
    let status = result.status();
    let status_str = match &status {
        VerificationStatus::Verified => format!("✓ {}", status),
        VerificationStatus::Unverified => format!("? {}", status),
        VerificationStatus::Failed(_) => format!("✗ {}", status),
        VerificationStatus::Timeout => format!("⏱ {}", status),
    };
    let colored_status = match status {
        VerificationStatus::Verified => status_str.green().bold(),
        VerificationStatus::Failed(_) => status_str.red().bold(),
        VerificationStatus::Unverified | VerificationStatus::Timeout => status_str.yellow().bold(),
    };

    println!(
        "  {:<10} {}  confidence {:.2}  {} ms",
        backend.to_string(),
        colored_status,
        result.confidence,
        result.verification_time.as_millis()
    );
    for error in &result.errors {
        match error.line {
            Some(line) => println!("      {} line {}: {}", error.kind.to_string().red(), line, error.message),
            None => println!("      {}: {}", error.kind.to_string().red(), error.message),
        }
    }
}

/// Print a contradiction with its severity
pub fn print_contradiction(contradiction: &LogicalContradiction) {
    let severity = contradiction.severity.to_string().to_uppercase();
    let severity = match contradiction.severity {
        ContradictionSeverity::Critical => severity.red().bold(),
        ContradictionSeverity::Major => severity.yellow().bold(),
        ContradictionSeverity::Minor => severity.normal(),
    };
    println!("  [{}] {}", severity, contradiction.statement_ids.join(", "));
    print_text(&format!("      {}", contradiction.description));
    if let Some(hint) = &contradiction.resolution_hint {
        println!("      {} {}", "hint:".cyan(), hint);
    }
}

/// Print the verdict on one statement
pub fn print_statement_result(result: &ProofValidationResult) {
    let verdict = if result.accepted { "ACCEPTED".green().bold() } else { "REJECTED".red().bold() };
    println!("{} {}", verdict, result.statement_id.bold());

    print_verification_status(&result.primary_backend, &result.primary_result);
    for (backend, secondary) in &result.secondary_results {
        print_verification_status(backend, secondary);
    }

    println!(
        "  consistency {:.2}  difficulty {} ({:.2})  class {}",
        result.consistency.score,
        result.complexity.difficulty_level,
        result.complexity.difficulty,
        result.complexity.computational_class
    );
    for reason in &result.rejection_reasons {
        println!("  {} {}", "-".dimmed(), reason);
    }
    println!();
}

/// Print a full validation report
pub fn print_report(report: &ValidationReport) {
    print_header("Statements");
    for result in report.results.values() {
        print_statement_result(result);
    }

    if !report.claims.is_empty() {
        print_header("Claims");
        for claim in &report.claims {
            let mark = if claim.supported { "✓".green() } else { "✗".red() };
            println!("  {} {} ({})", mark, claim.claim_id, claim.statement_ids.join(", "));
        }
    }

    print_header("Consistency");
    print_result("Score", &format!("{:.3}", report.consistency.score));
    print_result("Backends agree", &report.consistency.internal_consistent.to_string());
    print_result("Free of contradictions", &report.consistency.external_consistent.to_string());
    for contradiction in &report.consistency.contradictions {
        print_contradiction(contradiction);
    }

    let used: Vec<String> = report.metadata.assistants_used.iter().map(|b| b.to_string()).collect();
    println!();
    print_result("Backends used", &used.join(", "));
    print_result("Total time", &format!("{} ms", report.metadata.total_time.as_millis()));

    if report.accepted {
        print_success("Request accepted");
    } else {
        print_warning("Request rejected");
    }
}

/// Confirm an action with the user
pub fn confirm_action(prompt: &str) -> std::io::Result<bool> {
    Confirm::with_theme(&get_theme())
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
}

/// Display a spinner while waiting for an operation to complete
pub fn spinner_with_message(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(style.tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "));
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
