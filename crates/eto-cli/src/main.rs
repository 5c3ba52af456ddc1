//! # eto CLI entry point
//!
//! Offline operator tooling over the eto crates. Nothing here touches a
//! network or keeps state between runs.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use eto_cli::config::{run_config, ConfigArgs};
use eto_cli::penalty::{run_penalty, PenaltyArgs};
use eto_cli::schedule::{run_schedule, ScheduleArgs};

/// ETO stack CLI
///
/// Validates deployment files, previews offering schedules and computes
/// early-unlock penalties.
#[derive(Parser, Debug)]
#[command(name = "eto", version, about, long_about = None)]
struct Cli {
    /// Log more (-v info, -vv debug, -vvv trace). Warnings only by default.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Deployment configuration checks.
    Config(ConfigArgs),

    /// Print the start of every offering phase.
    Schedule(ScheduleArgs),

    /// Compute the early-unlock penalty split.
    Penalty(PenaltyArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "eto CLI starting");

    let result = match cli.command {
        Commands::Config(args) => run_config(&args),
        Commands::Schedule(args) => run_schedule(&args),
        Commands::Penalty(args) => run_penalty(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use eto_cli::config::ConfigCommand;
    use eto_core::Amount;

    #[test]
    fn cli_parse_config_validate() {
        let cli = Cli::try_parse_from(["eto", "config", "validate", "deployment.yaml"]).unwrap();
        match cli.command {
            Commands::Config(ConfigArgs {
                command: ConfigCommand::Validate { file },
            }) => assert_eq!(file, PathBuf::from("deployment.yaml")),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_parse_schedule_with_now() {
        let cli = Cli::try_parse_from([
            "eto",
            "schedule",
            "deployment.yaml",
            "--now",
            "2026-01-01T00:00:00Z",
            "--json",
        ])
        .unwrap();
        if let Commands::Schedule(args) = cli.command {
            assert_eq!(args.file, PathBuf::from("deployment.yaml"));
            assert_eq!(args.now.as_deref(), Some("2026-01-01T00:00:00Z"));
            assert!(args.json);
        } else {
            panic!("expected schedule");
        }
    }

    #[test]
    fn cli_parse_penalty() {
        let cli = Cli::try_parse_from([
            "eto",
            "penalty",
            "--amount",
            "1000000000000000000",
            "--fraction",
            "100000000000000000",
        ])
        .unwrap();
        if let Commands::Penalty(args) = cli.command {
            assert_eq!(args.amount, Amount::new(1_000_000_000_000_000_000));
            assert_eq!(args.fraction, 100_000_000_000_000_000);
            assert!(!args.json);
        } else {
            panic!("expected penalty");
        }
    }

    #[test]
    fn cli_parse_penalty_rejects_non_numeric_amount() {
        assert!(Cli::try_parse_from(["eto", "penalty", "--amount", "ten", "--fraction", "1"]).is_err());
    }

    #[test]
    fn verbosity_flag_counts_repeats() {
        let cli0 = Cli::try_parse_from(["eto", "config", "validate", "d.yaml"]).unwrap();
        assert_eq!(cli0.verbose, 0);

        let cli2 = Cli::try_parse_from(["eto", "-vv", "config", "validate", "d.yaml"]).unwrap();
        assert_eq!(cli2.verbose, 2);

        let cli3 = Cli::try_parse_from(["eto", "schedule", "d.yaml", "-vvv"]).unwrap();
        assert_eq!(cli3.verbose, 3);
    }

    #[test]
    fn cli_parse_log_json_is_global() {
        let cli = Cli::try_parse_from(["eto", "penalty", "--amount", "1", "--fraction", "0", "--log-json"]).unwrap();
        assert!(cli.log_json);
    }

    #[test]
    fn bare_invocation_is_rejected() {
        assert!(Cli::try_parse_from(["eto"]).is_err());
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(Cli::try_parse_from(["eto", "deploy"]).is_err());
    }
}
