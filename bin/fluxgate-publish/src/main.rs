//! Publisher binary.
//!
//! Reads a batch of metrics from a file or stdin, and writes it to InfluxDB using the options in the given
//! configuration file. Options can be overridden with `FLUXGATE_`-prefixed environment variables.

#![deny(warnings)]
#![deny(missing_docs)]

use clap::Parser as _;
use fluxgate_app::prelude::*;
use fluxgate_config::{ConfigurationLoader, GenericConfiguration};
use fluxgate_error::{ErrorContext as _, GenericError};
use fluxgate_publisher::Publisher;
use tokio::io::AsyncReadExt as _;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod cli;
use self::cli::Cli;

/// Environment variable prefix for publisher options.
const ENV_VAR_PREFIX: &str = "FLUXGATE";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let configuration = load_configuration(&cli)
        .unwrap_or_else(|e| fatal_and_exit(format!("failed to load configuration: {:?}", e)));

    let logging_config = LoggingConfiguration::from_configuration(&configuration)
        .unwrap_or_else(|e| fatal_and_exit(format!("failed to parse logging configuration: {}", e)));
    if let Err(e) = initialize_logging(&logging_config) {
        fatal_and_exit(format!("failed to initialize logging: {}", e));
    }

    if let Err(e) = initialize_tls() {
        fatal_and_exit(format!("failed to initialize TLS: {}", e));
    }

    match run(&cli, &configuration).await {
        Ok(()) => info!("Publish complete."),
        Err(e) => {
            error!("{:?}", e);
            std::process::exit(1);
        }
    }
}

fn load_configuration(cli: &Cli) -> Result<GenericConfiguration, GenericError> {
    let configuration = ConfigurationLoader::default()
        .from_yaml(&cli.config)
        .with_error_context(|| format!("Failed to load configuration file '{}'.", cli.config.display()))?
        .from_environment(ENV_VAR_PREFIX)
        .error_context("Environment variable prefix should not be empty.")?
        .into_generic();

    Ok(configuration)
}

async fn read_payload(cli: &Cli) -> Result<Vec<u8>, GenericError> {
    let mut payload = Vec::new();
    if cli.payload_from_stdin() {
        tokio::io::stdin()
            .read_to_end(&mut payload)
            .await
            .error_context("Failed to read payload from stdin.")?;
    } else {
        payload = tokio::fs::read(&cli.payload)
            .await
            .with_error_context(|| format!("Failed to read payload file '{}'.", cli.payload))?;
    }

    Ok(payload)
}

async fn run(cli: &Cli, configuration: &GenericConfiguration) -> Result<(), GenericError> {
    let payload = read_payload(cli).await?;
    info!(
        content_type = cli.content_type.as_str(),
        payload_len = payload.len(),
        "Publishing metrics..."
    );

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted. Cancelling publish.");
            interrupt.cancel();
        }
    });

    Publisher::default()
        .publish_with_cancellation(&cli.content_type, &payload, configuration, cancel)
        .await
        .error_context("Failed to publish metrics.")
}
