//! roomdrop-cli library
//!
//! Command-line front end for the room transfer crates.
//!
//! This library provides:
//! - `run_transfer`: runs an initiator and a responder session in one
//!   process, meeting in an in-memory relay room and connected through the
//!   loopback transport, then streams files from one to the other.
//! - `AppConfig`: the persisted CLI configuration (default output
//!   directory).
//! - `TransferProgress`: per-file progress bars fed by the sender and
//!   receiver subscribers.
//!
//! Configuration
//! - Stores a default output directory in:
//!   $XDG_CONFIG_HOME/roomdrop/config.toml or
//!   $HOME/.config/roomdrop/config.toml if XDG_CONFIG_HOME is not set.
//!
//! Logging goes to stderr through `tracing-subscriber`. The default level is
//! `warn`, `--verbose` raises it to `debug`, and `RUST_LOG` overrides both.
//!
//! Example
//! ```no_run
//! use roomdrop_cli::{TransferOptions, run_transfer};
//! use roomdropx_sender::SenderConfig;
//! # async fn demo() -> anyhow::Result<()> {
//! let report = run_transfer(TransferOptions {
//!     files: vec!["/path/file1.bin".into()],
//!     output: "/tmp/received".into(),
//!     code: None,
//!     pin: Some("1234".into()),
//!     config: SenderConfig::default(),
//! })
//! .await?;
//! println!("saved {} files", report.saved.len());
//! # Ok(())
//! # }
//! ```
mod config;
mod progress;
mod transfer;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use roomdropx_sender::SenderConfig;
use tracing_subscriber::EnvFilter;

pub use config::{AppConfig, fallback_out_dir};
pub use progress::TransferProgress;
pub use transfer::{TransferOptions, TransferReport, run_transfer};

#[derive(Debug, Parser)]
#[command(name = "roomdrop-cli")]
#[command(about = "Roomdrop tool for sending files through a relay room")]
#[command(version)]
pub struct Cli {
    /// Print debug logs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Send files through a room and save them on the receiving side
    Transfer {
        /// Files to send
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Parent directory for received files
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Room code to create instead of a random one
        #[arg(short, long)]
        code: Option<String>,

        /// PIN protecting the room
        #[arg(short, long)]
        pin: Option<String>,

        /// Chunk size and buffering preset
        #[arg(long, value_enum, default_value_t = TransferProfile::Balanced)]
        profile: TransferProfile,

        /// Remember --output as the default output directory
        #[arg(long, requires = "output")]
        save_output: bool,
    },
    /// Manage the saved configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the current configuration
    Show,
    /// Set the default output directory
    SetOutput { dir: PathBuf },
    /// Forget the default output directory
    ClearOutput,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TransferProfile {
    Balanced,
    HighPerformance,
    LowBandwidth,
}

impl From<TransferProfile> for SenderConfig {
    fn from(profile: TransferProfile) -> Self {
        match profile {
            TransferProfile::Balanced => SenderConfig::balanced(),
            TransferProfile::HighPerformance => {
                SenderConfig::high_performance()
            }
            TransferProfile::LowBandwidth => SenderConfig::low_bandwidth(),
        }
    }
}

pub fn build_cli() -> clap::Command {
    Cli::command()
}

pub async fn run_cli() -> Result<()> {
    run(Cli::parse()).await
}

pub async fn run(cli: Cli) -> Result<()> {
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Transfer {
            files,
            output,
            code,
            pin,
            profile,
            save_output,
        } => {
            let mut config = AppConfig::load()?;
            if save_output {
                if let Some(dir) = &output {
                    config
                        .set_default_out_dir(dir.clone())
                        .context("Failed to save default output directory")?;
                    println!(
                        "Saved '{}' as default output directory",
                        dir.display()
                    );
                }
            }
            let options = TransferOptions {
                files,
                output: config.resolve_out_dir(output),
                code,
                pin,
                config: profile.into(),
            };

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    println!("Transfer cancelled");
                    Ok(())
                }
                report = run_transfer(options) => {
                    print_report(&report?);
                    Ok(())
                }
            }
        }
        Commands::Config { action } => run_config(action),
    }
}

fn run_config(action: ConfigCommand) -> Result<()> {
    let mut config = AppConfig::load()?;
    match action {
        ConfigCommand::Show => {
            println!("Config file: {}", AppConfig::config_file()?.display());
            match &config.default_out_dir {
                Some(dir) => {
                    println!("Default output directory: {}", dir.display())
                }
                None => println!(
                    "No default output directory set (using {})",
                    fallback_out_dir().display()
                ),
            }
        }
        ConfigCommand::SetOutput { dir } => {
            config.set_default_out_dir(dir.clone())?;
            println!("Default output directory set to: {}", dir.display());
        }
        ConfigCommand::ClearOutput => {
            config.clear_default_out_dir()?;
            println!("Default output directory cleared");
        }
    }
    Ok(())
}

fn print_report(report: &TransferReport) {
    for path in &report.saved {
        println!("Saved {}", path.display());
    }
    for name in &report.abandoned {
        println!("Failed to receive {}", name);
    }
    println!(
        "Transfer complete: {} file(s) in {}",
        report.saved.len(),
        report.directory.display()
    );
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
