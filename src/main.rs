//! Mount a directory, or any read-only file tree, as a FUSE filesystem.
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{debug, error, info};

mod app_config;
mod daemon;
mod fuse_check;
mod term;
mod trc;

use crate::app_config::Config;
use crate::trc::Trc;

#[derive(Parser)]
#[command(version, about = "Expose a read-only file tree as a FUSE filesystem.")]
struct Args {
    #[arg(
        short,
        long,
        value_parser,
        help = "Optional path to a tree-fs config TOML."
    )]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Mount the source directory and serve it until interrupted.
    Run {
        /// The directory to expose. Overrides `source` from the config file.
        source: Option<PathBuf>,

        /// Where to mount it. Overrides `mount-point` from the config file.
        mount_point: Option<PathBuf>,
    },

    /// Load and validate the configuration, then exit.
    CheckConfig,
}

fn load_config(args: &Args) -> Config {
    // Errors use eprintln since tracing isn't initialized yet.
    Config::load(args.config_path.as_deref()).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        std::process::exit(1);
    })
}

fn report_invalid(errors: &[String]) -> ! {
    error!("Configuration is invalid.");
    for msg in errors {
        error!(" - {msg}");
    }
    std::process::exit(1);
}

/// Main entry point for the application.
fn main() {
    let args = Args::parse();
    let mut config = load_config(&args);

    let command = args.command.unwrap_or(Command::Run {
        source: None,
        mount_point: None,
    });
    if let Command::Run {
        source,
        mount_point,
    } = &command
    {
        config = config.with_overrides(source.clone(), mount_point.clone());
    }

    Trc::default()
        .with_color(config.log.should_use_color())
        .init()
        .unwrap_or_else(|e| {
            eprintln!(
                "Failed to initialize logging. Without logging, we can't provide any useful error \
                 messages, so we have to exit: {e}"
            );
            std::process::exit(1);
        });

    if let Err(errors) = config.validate() {
        report_invalid(&errors);
    }

    match command {
        Command::CheckConfig => {
            info!("Configuration is valid.");
            debug!(config = ?config, "Resolved configuration.");
        }
        Command::Run { .. } => {
            if let Err(e) = fuse_check::ensure_fuse() {
                error!("{e}");
                std::process::exit(1);
            }

            debug!(config = ?config, "Starting with configuration...");
            if let Err(e) = daemon::spawn(config) {
                error!("tree-fs failed: {e}");
                std::process::exit(1);
            }
        }
    }
}
