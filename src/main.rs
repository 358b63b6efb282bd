use anyhow::Result;
use clap::Parser;
use log::{ error, info };
use std::process::ExitCode;

use proofmesh::implementations::backend_config::BackendRegistryConfig;

mod cli;
use cli::{ Commands, ProofmeshCli };

#[tokio::main]
async fn main() -> ExitCode {
    // Pick up PROOFMESH_* overrides from a local .env, if there is one
    dotenv::dotenv().ok();

    // Parse the command line arguments
    let cli = ProofmeshCli::parse();

    // Setup logging
    setup_logging(&cli.log_level);

    match run(&cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("{:#}", e);
            cli::ui::print_error(&format!("{:#}", e));
            ExitCode::from(2)
        }
    }
}

/// Returns whether the command succeeded in the domain sense, e.g. the request was accepted
async fn run(cli: &ProofmeshCli) -> Result<bool> {
    match &cli.command {
        Commands::Validate { request, assistant_config, output, sequential } => {
            let registry = load_registry(cli)?;
            let orchestrator = registry.build_orchestrator();
            cli::commands::validate::execute(
                &orchestrator,
                request,
                assistant_config.as_deref(),
                output.as_deref(),
                *sequential,
                &cli.output_format
            ).await
        }

        Commands::Backends { no_check } => {
            let registry = load_registry(cli)?;
            cli::commands::backends::execute(&registry, !*no_check).await?;
            Ok(true)
        }

        Commands::InitConfig { output, force } => {
            cli::commands::init_config::execute(output, *force)?;
            Ok(true)
        }
    }
}

fn load_registry(cli: &ProofmeshCli) -> Result<BackendRegistryConfig> {
    match &cli.config {
        Some(path) => {
            info!("Loading backend configuration from {}", path.display());
            Ok(BackendRegistryConfig::from_file(path)?)
        }
        None => {
            info!("No configuration given, using default backends");
            let mut registry = BackendRegistryConfig::default();
            registry.apply_env_overrides();
            Ok(registry)
        }
    }
}

fn setup_logging(log_level: &str) {
    // Set up the logger based on the log level
    let level = match log_level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    };

    env_logger::Builder::new().filter_level(level).init();

    info!("Logger initialized with level: {}", log_level);
}
