use anyhow::{ anyhow, Result };
use log::info;
use std::fs;
use std::path::Path;

use crate::cli::ui;
use proofmesh::config::ProofAssistantConfig;
use proofmesh::errors::RecoverableError;
use proofmesh::implementations::orchestrator::ValidationOrchestrator;
use proofmesh::models::claim::ValidationRequest;

/// Request validation command
pub async fn execute(
    orchestrator: &ValidationOrchestrator,
    request_path: &Path,
    assistant_config: Option<&Path>,
    output: Option<&Path>,
    sequential: bool,
    output_format: &str
) -> Result<bool> {
    ui::print_header("Validating Formal Statements");

    let mut request = load_request(request_path)?;
    if let Some(path) = assistant_config {
        ui::print_info(&format!("Using engine settings from {}", path.display()));
        request.config = ProofAssistantConfig::from_file(path).map_err(|e|
            anyhow!("Failed to load engine settings: {}", e)
        )?;
    }
    if sequential {
        request.config.performance.enable_parallel = false;
    }

    ui::print_info(
        &format!(
            "{} statement(s), {} claim(s), primary backend {}",
            request.statements.len(),
            request.claims.len(),
            request.config.primary
        )
    );

    let spinner = ui::spinner_with_message("Running proof assistants...");
    let report = match orchestrator.validate(&request).await {
        Ok(report) => {
            spinner.finish_with_message("Validation completed!");
            report
        }
        Err(e) => {
            spinner.finish_with_message("Validation failed!");
            if let Some(hint) = e.recovery_strategy() {
                ui::print_info(&hint);
            }
            return Err(anyhow!("Validation error: {}", e));
        }
    };

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json).map_err(|e| anyhow!("Failed to write report: {}", e))?;
        ui::print_success(&format!("Report written to {}", path.display()));
    }

    if output_format.eq_ignore_ascii_case("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        ui::print_report(&report);
    }

    info!("Request {} with score {:.3}", if report.accepted { "accepted" } else { "rejected" }, report.consistency.score);
    Ok(report.accepted)
}

/// Requests may be written as JSON or YAML; the extension decides, YAML otherwise
fn load_request(path: &Path) -> Result<ValidationRequest> {
    let contents = fs::read_to_string(path).map_err(|e| anyhow!("Failed to read request file: {}", e))?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let request: ValidationRequest = if is_json {
        serde_json::from_str(&contents).map_err(|e| anyhow!("Failed to parse request: {}", e))?
    } else {
        serde_yaml::from_str(&contents).map_err(|e| anyhow!("Failed to parse request: {}", e))?
    };
    Ok(request)
}
