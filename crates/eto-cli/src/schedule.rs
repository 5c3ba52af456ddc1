//! # Schedule Subcommand
//!
//! Preview when each offering phase starts, given a deployment file.
//!
//! ```bash
//! eto schedule deployment.yaml --now 2026-10-01T00:00:00Z
//! eto schedule deployment.yaml --json
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Args;

use eto_core::{Address, ManualClock, Timestamp};
use eto_state::{EtoState, EtoTimedStateMachine, NullObserver, StateDurationTable, ThresholdOfferingLogic};

use crate::config::DeploymentConfig;

/// Arguments for the schedule subcommand.
#[derive(Args, Debug)]
pub struct ScheduleArgs {
    /// Path to the deployment YAML.
    pub file: PathBuf,

    /// Evaluate as of this instant (RFC 3339, `Z`). Defaults to the system clock.
    #[arg(long)]
    pub now: Option<String>,

    /// Print a JSON object instead of a table.
    #[arg(long)]
    pub json: bool,
}

/// Execute the schedule subcommand.
pub fn run_schedule(args: &ScheduleArgs) -> Result<u8> {
    let config = DeploymentConfig::load(&args.file)?;
    let now = match &args.now {
        Some(s) => Timestamp::parse(s).with_context(|| format!("invalid --now {s:?}"))?,
        None => Timestamp::now(),
    };
    let rows = compute_schedule(&config, now)?;
    if args.json {
        let map: serde_json::Map<String, serde_json::Value> = rows
            .iter()
            .map(|(state, start)| {
                let value = start.map_or(serde_json::Value::Null, |t| t.to_iso8601().into());
                (state.as_str().to_string(), value)
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
    } else {
        for (state, start) in &rows {
            let shown = start.map_or_else(|| "-".to_string(), |t| t.to_iso8601());
            println!("{:<10} {shown}", state.as_str());
        }
    }
    Ok(0)
}

/// Start of every phase for an offering scheduled per `config`, as seen
/// at `now`.
pub fn compute_schedule(config: &DeploymentConfig, now: Timestamp) -> Result<Vec<(EtoState, Option<Timestamp>)>> {
    let start = config
        .start_date()?
        .ok_or_else(|| anyhow!("offering.start_date is not set"))?;
    let clock = Arc::new(ManualClock::new(now));
    let mut machine = EtoTimedStateMachine::new(
        Address::derive("schedule-preview"),
        StateDurationTable::from_terms(&config.offering.durations),
        clock,
    );
    let logic = ThresholdOfferingLogic::new(config.offering.min_cap, config.offering.max_cap);
    machine
        .set_start_date(start, &logic, &mut NullObserver)
        .with_context(|| format!("cannot schedule offering at {start}"))?;
    tracing::debug!(%start, %now, "schedule computed");
    Ok(EtoState::ALL
        .iter()
        .copied()
        .zip(machine.start_of_states())
        .collect())
}

/// Look up one phase in a computed schedule.
pub fn start_of(rows: &[(EtoState, Option<Timestamp>)], state: EtoState) -> Option<Timestamp> {
    rows.iter().find(|(s, _)| *s == state).and_then(|(_, t)| *t)
}
