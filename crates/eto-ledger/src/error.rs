//! Errors raised by the locked account and the token collaborators.

use eto_core::{Address, Amount, CoreError, Role};
use thiserror::Error;

use crate::locked_account::LockState;

/// Errors from the token collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Sender balance too low.
    #[error("insufficient balance of {owner}: need {needed}, have {available}")]
    InsufficientBalance {
        /// Debited account.
        owner: Address,
        /// Requested amount.
        needed: Amount,
        /// Current balance.
        available: Amount,
    },

    /// Spender allowance too low.
    #[error("insufficient allowance from {owner} to {spender}: need {needed}, have {available}")]
    InsufficientAllowance {
        /// Token owner.
        owner: Address,
        /// Approved spender.
        spender: Address,
        /// Requested amount.
        needed: Amount,
        /// Current allowance.
        available: Amount,
    },

    /// Recipient is a contract that does not accept token callbacks.
    #[error("recipient {recipient} does not accept token callbacks")]
    CallbackRejected {
        /// The recipient.
        recipient: Address,
    },

    /// Balance arithmetic failure.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Errors from locked account operations. Every variant leaves the
/// account unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Caller lacks a role.
    #[error("{caller} lacks role {role}")]
    AccessDenied {
        /// The caller.
        caller: Address,
        /// The missing role.
        role: Role,
    },

    /// Caller is not the controller.
    #[error("{caller} is not the controller")]
    NotController {
        /// The caller.
        caller: Address,
    },

    /// Only the investor may act on their own position.
    #[error("{caller} may not act on the position of {investor}")]
    NotInvestor {
        /// The caller.
        caller: Address,
        /// Owner of the position.
        investor: Address,
    },

    /// Operation not permitted in the current lock state.
    #[error("{op} not permitted in lock state {state}")]
    WrongState {
        /// Operation name.
        op: &'static str,
        /// Current state.
        state: LockState,
    },

    /// A required non-zero quantity was zero.
    #[error("{what} must be non-zero")]
    ZeroAmount {
        /// Which quantity.
        what: &'static str,
    },

    /// The disbursal address must not be null.
    #[error("penalty disbursal address must be set")]
    MissingDisbursalAddress,

    /// A token collaborator other than the configured one was supplied.
    #[error("expected token {expected}, got {actual}")]
    WrongToken {
        /// Configured token.
        expected: Address,
        /// Supplied token.
        actual: Address,
    },

    /// Neumark allowance differs from the amount due.
    #[error("neumark allowance of {investor} is {actual}, exactly {expected} required")]
    NeumarkAllowanceMismatch {
        /// Investor unlocking.
        investor: Address,
        /// Neumarks due.
        expected: Amount,
        /// Allowance found.
        actual: Amount,
    },

    /// Neumark balance differs from the amount due.
    #[error("{investor} holds {actual} neumarks, exactly {expected} required")]
    NeumarkBalanceMismatch {
        /// Investor unlocking.
        investor: Address,
        /// Neumarks due.
        expected: Amount,
        /// Balance found.
        actual: Amount,
    },

    /// Custody balance is below what the ledger owes.
    #[error("custody holds {available}, ledger owes {needed}")]
    CustodyShortfall {
        /// Amount owed.
        needed: Amount,
        /// Amount held.
        available: Amount,
    },

    /// A payout recipient does not accept token callbacks.
    #[error("recipient {recipient} does not accept token callbacks")]
    RecipientRejectsCallback {
        /// The recipient.
        recipient: Address,
    },

    /// `enable_migration` was already called.
    #[error("migration already enabled to {target}")]
    MigrationAlreadyEnabled {
        /// Existing target.
        target: Address,
    },

    /// `set_migration_source` was already called.
    #[error("migration source already set to {source_address}")]
    MigrationSourceAlreadySet {
        /// Existing source.
        source_address: Address,
    },

    /// `migrate` before `enable_migration`.
    #[error("migration not enabled")]
    MigrationNotEnabled,

    /// Target does not name this account as its source.
    #[error("migration target names {actual:?} as source, expected {expected}")]
    MigrationHandshake {
        /// This account.
        expected: Address,
        /// Source recorded on the target.
        actual: Option<Address>,
    },

    /// A target other than the enabled one was supplied.
    #[error("migration target is {expected}, got {actual}")]
    WrongMigrationTarget {
        /// Enabled target.
        expected: Address,
        /// Supplied target.
        actual: Address,
    },

    /// `migrate_investor` from anyone but the registered source.
    #[error("{caller} is not the migration source (registered: {expected:?})")]
    NotMigrationSource {
        /// The caller.
        caller: Address,
        /// Registered source.
        expected: Option<Address>,
    },

    /// Reclaiming the locked asset is never allowed.
    #[error("the locked asset token cannot be reclaimed")]
    ReclaimAssetToken,

    /// An aggregate disagrees with the per-account table.
    #[error("ledger invariant violated: {0}")]
    InvariantViolated(String),

    /// A token collaborator refused an effect.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Arithmetic or timestamp failure.
    #[error(transparent)]
    Core(#[from] CoreError),
}
