//! # Penalty Subcommand
//!
//! Compute the early-unlock split for a locked ticket.
//!
//! ```bash
//! eto penalty --amount 1000000000000000000 --fraction 100000000000000000
//! ```
//!
//! Both values are integers in wei. The fraction is scaled by `1e18`, so
//! `100000000000000000` is 10%. The penalty is rounded down, which leaves
//! any rounding dust with the investor.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use eto_core::{Amount, CoreError, DecimalFraction};

/// Arguments for the penalty subcommand.
#[derive(Args, Debug)]
pub struct PenaltyArgs {
    /// Locked amount in wei.
    #[arg(long)]
    pub amount: Amount,

    /// Penalty fraction scaled by 1e18.
    #[arg(long)]
    pub fraction: u128,

    /// Print JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

/// How an early unlock divides a locked amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PenaltySplit {
    /// The locked amount.
    pub amount: Amount,
    /// The fraction applied.
    pub fraction: DecimalFraction,
    /// Sent to the penalty disbursal address.
    pub penalty: Amount,
    /// Returned to the investor.
    pub returned: Amount,
}

impl PenaltySplit {
    /// Split `amount` under `fraction`.
    pub fn compute(amount: Amount, fraction: DecimalFraction) -> Result<Self, CoreError> {
        let penalty = fraction.apply_floor(amount);
        Ok(Self {
            amount,
            fraction,
            penalty,
            returned: amount.checked_sub(penalty)?,
        })
    }
}

/// Execute the penalty subcommand.
pub fn run_penalty(args: &PenaltyArgs) -> Result<u8> {
    let fraction = DecimalFraction::new(args.fraction)
        .with_context(|| format!("invalid --fraction {}", args.fraction))?;
    let split = PenaltySplit::compute(args.amount, fraction)?;
    tracing::debug!(amount = %split.amount, penalty = %split.penalty, "penalty computed");
    if args.json {
        println!("{}", serde_json::to_string_pretty(&split)?);
    } else {
        println!("fraction: {}", split.fraction);
        println!("penalty:  {}", split.penalty);
        println!("returned: {}", split.returned);
    }
    Ok(0)
}
