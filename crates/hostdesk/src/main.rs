// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hostdesk - WhatsApp message pipeline for multi-tenant hotel CRMs.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod queues;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use hostdesk_config::{ConfigError, HostdeskConfig};

/// Hostdesk - WhatsApp message pipeline for hotel CRMs.
#[derive(Parser, Debug)]
#[command(name = "hostdesk", version, about, long_about = None)]
struct Cli {
    /// Configuration file. Defaults to the XDG lookup hierarchy.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the webhook gateway and worker pools.
    Serve,
    /// Validate the configuration and exit.
    CheckConfig {
        /// Print the effective configuration as TOML.
        #[arg(long)]
        print: bool,
    },
    /// Inspect and maintain the job queues.
    Queues {
        #[command(subcommand)]
        action: QueueAction,
    },
}

#[derive(Subcommand, Debug)]
enum QueueAction {
    /// Job counts per queue and state.
    Stats {
        /// Output JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Delete finished jobs past their retention window.
    Clean {
        /// Queue to clean (e.g. `media`). All queues when omitted.
        queue: Option<String>,
    },
}

fn load(path: Option<&PathBuf>) -> Result<HostdeskConfig, Vec<ConfigError>> {
    match path {
        Some(path) => hostdesk_config::load_and_validate_path(path),
        None => hostdesk_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            hostdesk_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::CheckConfig { print }) => check_config(&config, print),
        Some(Commands::Queues { action }) => match action {
            QueueAction::Stats { json } => queues::run_stats(&config, json).await,
            QueueAction::Clean { queue } => queues::run_clean(&config, queue.as_deref()).await,
        },
        None => {
            println!("hostdesk: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn check_config(config: &HostdeskConfig, print: bool) -> Result<(), hostdesk_core::HostdeskError> {
    println!(
        "hostdesk: configuration OK ({} channel(s), database {})",
        config.channels.len(),
        config.storage.database_path
    );
    if config.channels.is_empty() {
        println!("warning: no [[channels]] configured; every webhook will be dropped");
    }
    if print {
        let rendered = config
            .to_toml()
            .map_err(|e| hostdesk_core::HostdeskError::Config(format!("failed to render config: {e}")))?;
        println!("{rendered}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn queue_subcommands_parse() {
        let cli = Cli::try_parse_from(["hostdesk", "queues", "clean", "media"]).unwrap();
        match cli.command {
            Some(Commands::Queues {
                action: QueueAction::Clean { queue },
            }) => assert_eq!(queue.as_deref(), Some("media")),
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::try_parse_from(["hostdesk", "--config", "/tmp/h.toml", "queues", "stats", "--json"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/h.toml")));
        assert!(matches!(
            cli.command,
            Some(Commands::Queues {
                action: QueueAction::Stats { json: true }
            })
        ));
    }

    #[test]
    fn check_config_accepts_defaults() {
        check_config(&HostdeskConfig::default(), true).unwrap();
    }
}
