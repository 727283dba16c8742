// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Courier: supervises long-lived messaging sessions for many tenants.

mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use courier_config::{ConfigError, CourierConfig};

/// Courier - multi-tenant messaging session supervisor.
#[derive(Parser, Debug)]
#[command(name = "courier", version, about, long_about = None)]
struct Cli {
    /// Load this file instead of the standard config locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the supervisor and its HTTP API (the default).
    Serve,
    /// Validate the configuration and exit.
    CheckConfig,
}

fn load(path: Option<&PathBuf>) -> Result<CourierConfig, Vec<ConfigError>> {
    match path {
        Some(path) => courier_config::load_and_validate_path(path),
        None => courier_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            courier_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            if let Err(e) = serve::run(config).await {
                eprintln!("courier: {e}");
                std::process::exit(1);
            }
        }
        Commands::CheckConfig => {
            println!(
                "courier: config ok (listen {}:{}, bridge {}, database {})",
                config.server.host,
                config.server.port,
                config.transport.bridge_url,
                config.storage.database_path,
            );
            if config.server.bearer_token.is_none() {
                println!("courier: warning: no server.bearer_token set, API requests will be rejected");
            }
        }
    }
}
