//! # eto-cli — Command-Line Tooling for the ETO Stack
//!
//! Offline helpers for the people who prepare an offering:
//!
//! - **config** (`config.rs`): load and validate a deployment YAML.
//! - **schedule** (`schedule.rs`): preview when each offering phase starts.
//! - **penalty** (`penalty.rs`): compute the early-unlock split.
//!
//! The binary entry point lives in `main.rs`; every subcommand returns an
//! exit code through `anyhow::Result<u8>`.

pub mod config;
pub mod penalty;
pub mod schedule;
