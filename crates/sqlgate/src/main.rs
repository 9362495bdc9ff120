// SPDX-FileCopyrightText: 2026 sqlgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! sqlgate - serialized SQLite access from the command line.
//!
//! This is the binary entry point. It loads configuration, opens the single
//! database connection, and runs one subcommand.

mod query;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sqlgate_config::SqlGateConfig;
use sqlgate_core::{HealthStatus, PluginAdapter, SqlGateError};
use sqlgate_sqlite::SqliteClient;

use crate::query::OutputMode;

/// sqlgate - serialized SQLite access from the command line.
#[derive(Parser, Debug)]
#[command(name = "sqlgate", version, about, long_about = None)]
struct Cli {
    /// Load this configuration file instead of the default hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one SQL statement and print the result as JSON.
    Query {
        /// The SQL statement.
        sql: String,
        /// Positional parameter, bound in order (null, integer, real, or text).
        #[arg(short = 'p', long = "param")]
        params: Vec<String>,
        /// Result shape to print.
        #[arg(long, value_enum, default_value_t = OutputMode::Rows)]
        mode: OutputMode,
    },
    /// Open the database and report its health.
    Check,
    /// Print the resolved configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => sqlgate_config::load_and_validate_path(path),
        None => sqlgate_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            sqlgate_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.log.level);

    if let Err(e) = run(cli.command, &config).await {
        eprintln!("sqlgate: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: &SqlGateConfig) -> Result<(), SqlGateError> {
    match command {
        Commands::Query { sql, params, mode } => {
            let client = SqliteClient::connect(config).await?;
            let result = query::run_query(&client, &sql, &params, mode).await;
            client.close().await;
            let output = serde_json::to_string_pretty(&result?)
                .map_err(|e| SqlGateError::Internal(format!("failed to encode result: {e}")))?;
            println!("{output}");
        }
        Commands::Check => {
            let client = SqliteClient::connect(config).await?;
            let status = client.health_check().await?;
            client.shutdown().await?;
            match status {
                HealthStatus::Healthy => {
                    println!("sqlgate: {} is healthy", config.database.path);
                }
                HealthStatus::Degraded(reason) => {
                    println!("sqlgate: {} is degraded: {reason}", config.database.path);
                }
                HealthStatus::Unhealthy(reason) => {
                    return Err(SqlGateError::Internal(format!(
                        "{} is unhealthy: {reason}",
                        config.database.path
                    )));
                }
            }
        }
        Commands::Config => {
            let rendered = toml::to_string_pretty(config)
                .map_err(|e| SqlGateError::Config(format!("failed to render config: {e}")))?;
            print!("{rendered}");
        }
    }
    Ok(())
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins over the configured level when set.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sqlgate={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
