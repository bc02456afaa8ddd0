use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};

mod cli;
mod config;
mod docai;
mod error;
mod pipeline;
mod storage;
mod telemetry;

use crate::cli::Cli;
use crate::error::format_error_chain;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.json);

    info!("Starting docai-pipeline v{}", env!("CARGO_PKG_VERSION"));

    let metrics = match telemetry::install_recorder() {
        Ok(handle) => handle,
        Err(e) => {
            error!(error = %format_error_chain(&e), "Failed to initialize metrics");
            return ExitCode::FAILURE;
        }
    };
    let metrics_file = cli.metrics_file.clone();

    let config = match crate::config::load_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %format_error_chain(&e), "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    info!(
        processor = %config.processor.resource_name(),
        storage = ?config.storage.backend,
        max_files = config.batch.max_files,
        timeout_secs = config.batch.timeout_secs,
        "Configuration loaded"
    );

    let mut exit_code = match cli::run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format_error_chain(&e), "Pipeline failed");
            ExitCode::FAILURE
        }
    };

    // Failed runs are exported too
    if let Some(path) = metrics_file
        && let Err(e) = telemetry::write_snapshot(&metrics, &path).await
    {
        error!(error = %format_error_chain(&e), "Failed to export metrics");
        exit_code = ExitCode::FAILURE;
    }

    exit_code
}

fn init_logging(json: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    // Use RUST_LOG if set, otherwise default to info level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("docai_pipeline=info"));

    // Logs go to stderr so stdout stays machine-readable
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        let format = fmt::format()
            .with_target(true)
            .with_thread_ids(true)
            .compact();
        registry
            .with(fmt::layer().event_format(format).with_writer(std::io::stderr))
            .init();
    }
}
