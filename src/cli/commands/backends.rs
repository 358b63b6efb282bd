use anyhow::Result;
use colored::*;

use crate::cli::ui;
use proofmesh::implementations::backend_config::{ env_override_var, BackendRegistryConfig };

/// List configured backends and check that each one runs
pub async fn execute(config: &BackendRegistryConfig, check: bool) -> Result<()> {
    ui::print_header("Configured Backends");

    if config.backends.is_empty() {
        ui::print_warning("No backends configured. Run `proofmesh init-config` to create a configuration.");
        return Ok(());
    }

    for backend in &config.backends {
        ui::print_result(&backend.kind.to_string(), &format!("{} {}", backend.program, backend.args.join(" ")));
        println!("    dialect {}  override {}", backend.dialect.version, env_override_var(&backend.kind).dimmed());
    }

    if !check {
        return Ok(());
    }

    ui::print_header("Availability");
    let mut missing = 0;
    for adapter in config.build_adapters() {
        let spinner = ui::spinner_with_message(&format!("Checking {}...", adapter.kind()));
        match adapter.check_availability().await {
            Ok(availability) if availability.available => {
                spinner.finish_and_clear();
                let version = availability.version.unwrap_or_else(|| "unknown version".to_string());
                println!("  {} {} ({})", "✓".green(), adapter.kind(), version);
            }
            Ok(availability) => {
                spinner.finish_and_clear();
                missing += 1;
                let detail = availability.detail.unwrap_or_else(|| "not available".to_string());
                println!("  {} {}: {}", "✗".red(), adapter.kind(), detail);
            }
            Err(e) => {
                spinner.finish_and_clear();
                missing += 1;
                println!("  {} {}: {}", "✗".red(), adapter.kind(), e);
            }
        }
    }

    if missing == 0 {
        ui::print_success("All configured backends are available");
    } else {
        ui::print_warning(&format!("{} backend(s) unavailable; statements will fall back to the others", missing));
    }
    Ok(())
}
