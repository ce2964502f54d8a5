use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

mod catch;
mod config;
mod controller;
mod elevation;
mod error;
mod hotkey;
mod platform;
mod process;

use config::JamstarConfig;
use controller::{BlockOutcome, NetworkController, RestoreOutcome};
use platform::{Firewall, Hotkeys, Notifier, Privileges};
use process::SysinfoLocator;

#[derive(Parser, Debug)]
#[command(name = "jamstar")]
#[command(version, about = "GTA5 Network Control Utility", long_about = None)]
#[command(group(ArgGroup::new("mode").args(["block", "unblock", "interactive"])))]
struct Cli {
    /// Block GTA5 network access
    #[arg(short, long)]
    block: bool,

    /// Restore GTA5 network access
    #[arg(short, long)]
    unblock: bool,

    /// Run in interactive mode with hotkeys (default)
    #[arg(short, long)]
    interactive: bool,

    /// Read settings from this file instead of the default location
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Block,
    Unblock,
    Interactive,
}

impl Cli {
    fn mode(&self) -> Mode {
        if self.block {
            Mode::Block
        } else if self.unblock {
            Mode::Unblock
        } else {
            Mode::Interactive
        }
    }
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        error!(error = %format!("{:#}", e), "Unhandled error");
        eprintln!("{} {:#}", "[✗] Error:".bright_red(), e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    config.validate()?;

    elevation::ensure_elevated(&Privileges::new(), &config.elevation)?;

    let mut controller = NetworkController::new(
        &config,
        Box::new(Firewall::new()),
        Box::new(SysinfoLocator::new()),
        Box::new(Notifier::new(config.notification.clone())),
        Box::new(Hotkeys::new()),
    )?;

    let target = &config.target.display_name;
    match cli.mode() {
        Mode::Block => match controller.block()? {
            BlockOutcome::Blocked(process) => println!(
                "{} {} (pid {})",
                "[✓] Network blocked for".green(),
                process.name,
                process.pid
            ),
            BlockOutcome::AlreadyBlocked => {
                println!("{}", "[!] Network already blocked".yellow())
            }
            BlockOutcome::ProcessNotRunning => {
                println!("{}", format!("[!] {} is not running", target).yellow())
            }
        },
        Mode::Unblock => match controller.restore()? {
            RestoreOutcome::Restored => {
                println!("{}", "[✓] Network restored".green())
            }
            RestoreOutcome::NoRule => {
                println!("{}", "[!] No matching firewall rule found".yellow())
            }
        },
        Mode::Interactive => {
            println!("{}", "━".repeat(50).bright_blue());
            println!("{}", "  Interactive mode".bright_blue().bold());
            println!("{}", "━".repeat(50).bright_blue());
            controller.run_interactive()?;
        }
    }

    info!("Exiting");
    Ok(())
}

/// An explicit path must load. A broken default file falls back to defaults.
fn load_config(path: Option<&Path>) -> Result<JamstarConfig> {
    match path {
        Some(path) => JamstarConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(JamstarConfig::load().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load config, using defaults");
            JamstarConfig::default()
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn interactive_is_default() {
        let cli = Cli::try_parse_from(["jamstar"]).unwrap();
        assert_eq!(cli.mode(), Mode::Interactive);
        assert!(cli.config.is_none());
    }

    #[test]
    fn short_and_long_flags() {
        assert_eq!(Cli::try_parse_from(["jamstar", "-b"]).unwrap().mode(), Mode::Block);
        assert_eq!(
            Cli::try_parse_from(["jamstar", "--unblock"]).unwrap().mode(),
            Mode::Unblock
        );
        assert_eq!(
            Cli::try_parse_from(["jamstar", "-i"]).unwrap().mode(),
            Mode::Interactive
        );
    }

    #[test]
    fn mode_flags_are_mutually_exclusive() {
        let err = Cli::try_parse_from(["jamstar", "-b", "-u"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);

        let err = Cli::try_parse_from(["jamstar", "--block", "--interactive"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn config_path_override() {
        let cli = Cli::try_parse_from(["jamstar", "-u", "--config", "custom.toml"]).unwrap();
        assert_eq!(cli.mode(), Mode::Unblock);
        assert_eq!(cli.config.as_deref(), Some(Path::new("custom.toml")));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn explicit_config_path_must_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[notification]\ntimeout_ms = \"soon\"\n").unwrap();

        assert!(load_config(Some(&path)).is_err());
    }

    #[test]
    fn explicit_config_path_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = load_config(Some(&path)).unwrap();

        assert!(path.exists());
        assert_eq!(config.rule.name, "Block_GTA5_Network");
    }
}
