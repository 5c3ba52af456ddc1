//! # Deployment Configuration
//!
//! One YAML file describes a company's deployment: the locked account that
//! collects tickets, the offering schedule and the governance terms.
//!
//! ```yaml
//! locked_account:
//!   lock_period_secs: 46656000
//!   penalty_fraction: "0.1"
//!   penalty_disbursal_address: "0x…"
//! offering:
//!   durations:
//!     whitelist_secs: 604800
//!     public_secs: 1209600
//!     signing_secs: 1209600
//!     claim_secs: 864000
//!   start_date: "2026-11-01T12:00:00Z"
//!   min_cap: "1000"
//!   max_cap: "1000000"
//! governance:
//!   company_name: Acme GmbH
//!   legal_representative: "0x…"
//!   voting_rule: no_voting_rights
//!   transfers_on_success: true
//! ```
//!
//! Validation reports every violation, not just the first.
//!
//! ## Commands
//!
//! - `eto config validate <file>`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::{Deserialize, Serialize};

use eto_core::{Address, Amount, DecimalFraction, Timestamp};
use eto_governance::GovernanceConfig;
use eto_ledger::LockedAccountConfig;
use eto_state::{DurationLimits, DurationTerms};

/// Locked account parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LockedAccountSection {
    /// Seconds from first lock to penalty-free unlock.
    pub lock_period_secs: u64,
    /// Early-unlock penalty as a decimal fraction, e.g. `"0.1"`.
    pub penalty_fraction: DecimalFraction,
    /// Receiver of penalties.
    pub penalty_disbursal_address: Address,
}

/// Offering parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OfferingSection {
    /// Phase lengths.
    pub durations: DurationTerms,
    /// Planned start, RFC 3339 in UTC (`Z`).
    #[serde(default)]
    pub start_date: Option<String>,
    /// Minimum investment for success.
    #[serde(default)]
    pub min_cap: Amount,
    /// Investment that closes the public phase early.
    pub max_cap: Amount,
}

/// A complete deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeploymentConfig {
    /// Locked account section.
    pub locked_account: LockedAccountSection,
    /// Offering section.
    pub offering: OfferingSection,
    /// Governance section.
    pub governance: GovernanceConfig,
}

impl DeploymentConfig {
    /// Read and parse a YAML deployment file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Every problem with this deployment. With `now`, a start date in the
    /// past is also reported.
    pub fn violations(&self, now: Option<Timestamp>) -> Vec<String> {
        let mut out = Vec::new();

        let la = &self.locked_account;
        if la.lock_period_secs == 0 {
            out.push("locked_account.lock_period_secs must be positive".to_string());
        }
        if la.penalty_disbursal_address.is_zero() {
            out.push("locked_account.penalty_disbursal_address must not be the zero address".to_string());
        }

        let offering = &self.offering;
        out.extend(
            offering
                .durations
                .violations(&DurationLimits::default())
                .into_iter()
                .map(|v| format!("offering.durations: {v}")),
        );
        if offering.max_cap.is_zero() {
            out.push("offering.max_cap must be positive".to_string());
        }
        if offering.min_cap > offering.max_cap {
            out.push(format!(
                "offering.min_cap {} exceeds max_cap {}",
                offering.min_cap, offering.max_cap
            ));
        }
        match self.start_date() {
            Ok(Some(start)) => {
                if let Some(now) = now {
                    if start < now {
                        out.push(format!("offering.start_date {start} is before {now}"));
                    }
                }
            }
            Ok(None) => {}
            Err(e) => out.push(format!("offering.start_date: {e}")),
        }

        let gov = &self.governance;
        if gov.company_name.trim().is_empty() {
            out.push("governance.company_name must not be empty".to_string());
        }
        if gov.legal_representative.is_zero() {
            out.push("governance.legal_representative must not be the zero address".to_string());
        }
        out
    }

    /// The parsed start date, if configured.
    pub fn start_date(&self) -> Result<Option<Timestamp>, eto_core::CoreError> {
        self.offering.start_date.as_deref().map(Timestamp::parse).transpose()
    }

    /// Locked account parameters for a deployment at `address` over the
    /// given tokens.
    pub fn locked_account_config(&self, address: Address, asset_token: Address, neumark_token: Address) -> LockedAccountConfig {
        LockedAccountConfig {
            address,
            asset_token,
            neumark_token,
            lock_period_secs: self.locked_account.lock_period_secs,
            penalty_fraction: self.locked_account.penalty_fraction,
            penalty_disbursal_address: self.locked_account.penalty_disbursal_address,
        }
    }
}

// ─── CLI ────────────────────────────────────────────────────────────

/// Arguments for the `eto config` subcommand.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Check a deployment file and list every violation.
    Validate {
        /// Path to the deployment YAML.
        file: PathBuf,
    },
}

/// Execute the config subcommand.
pub fn run_config(args: &ConfigArgs) -> Result<u8> {
    match &args.command {
        ConfigCommand::Validate { file } => cmd_validate(file),
    }
}

fn cmd_validate(file: &Path) -> Result<u8> {
    let config = DeploymentConfig::load(file)?;
    let violations = config.violations(Some(Timestamp::now()));
    if violations.is_empty() {
        tracing::info!(file = %file.display(), "deployment config valid");
        println!("OK: {}", file.display());
        return Ok(0);
    }
    for v in &violations {
        println!("ERROR: {v}");
    }
    println!("{} violation(s) in {}", violations.len(), file.display());
    Ok(1)
}
