//! Journal entries emitted by the locked account.

use eto_core::{Address, Amount, Timestamp};
use serde::{Deserialize, Serialize};

use crate::locked_account::LockState;

/// One entry of a locked account's append-only journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// Capital locked for an investor (also emitted on migration inflow).
    FundsLocked {
        investor: Address,
        amount: Amount,
        neumarks: Amount,
    },
    /// Capital returned. `amount` is net of any penalty.
    FundsUnlocked {
        investor: Address,
        amount: Amount,
        neumarks_burned: Amount,
    },
    /// Early-unlock penalty paid to the disbursal address.
    PenaltyDisbursed {
        disbursal: Address,
        amount: Amount,
        asset: Address,
        investor: Address,
    },
    /// Neumarks pulled from the investor and destroyed.
    NeumarksBurned {
        owner: Address,
        asset_amount: Amount,
        neumark_amount: Amount,
    },
    /// Outbound migration enabled.
    MigrationEnabled { target: Address },
    /// Inbound migration source registered.
    MigrationSourceSet { source: Address },
    /// Investor record moved to the migration target.
    InvestorMigrated {
        investor: Address,
        amount: Amount,
        neumarks: Amount,
        unlock_date: Timestamp,
    },
    /// Lock state changed.
    LockStateTransition { old: LockState, new: LockState },
    /// Stray tokens recovered.
    Reclaimed {
        token: Address,
        to: Address,
        amount: Amount,
    },
}
