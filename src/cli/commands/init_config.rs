use anyhow::{ anyhow, Result };
use std::fs;
use std::path::Path;

use crate::cli::ui;
use proofmesh::implementations::backend_config::BackendRegistryConfig;

/// Write the default backend registry to `output`
pub fn execute(output: &Path, force: bool) -> Result<()> {
    ui::print_header("Initializing Configuration");

    if output.exists() && !force {
        let overwrite = ui::confirm_action(&format!("{} already exists. Overwrite?", output.display()))?;
        if !overwrite {
            ui::print_info("Left the existing configuration untouched");
            return Ok(());
        }
    }

    let yaml = BackendRegistryConfig::default()
        .to_yaml()
        .map_err(|e| anyhow!("Failed to render configuration: {}", e))?;
    fs::write(output, yaml).map_err(|e| anyhow!("Failed to write {}: {}", output.display(), e))?;

    ui::print_success(&format!("Configuration written to {}", output.display()));
    ui::print_info("Point each backend at its binary, or set PROOFMESH_<BACKEND>_PATH");
    Ok(())
}
