//! Errors raised by the offering state machine.

use eto_core::{Amount, CoreError, Timestamp};
use thiserror::Error;

use crate::offering::EtoState;

/// Errors from offering transitions and duration validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OfferingError {
    /// A transition that does not move the offering forward.
    #[error("invalid ETO transition: {from} -> {to}: {reason}")]
    InvalidTransition {
        /// Current state.
        from: EtoState,
        /// Attempted target state.
        to: EtoState,
        /// Why it was refused.
        reason: String,
    },

    /// The operation requires a different state.
    #[error("operation requires ETO state {expected}, current state is {actual}")]
    WrongState {
        /// Required state.
        expected: EtoState,
        /// Actual state.
        actual: EtoState,
    },

    /// A start date earlier than the current time.
    #[error("start date {start} is before current time {now}")]
    StartDateInPast {
        /// Requested start.
        start: Timestamp,
        /// Clock reading.
        now: Timestamp,
    },

    /// A phase duration outside the configured bounds.
    #[error("{phase} duration {secs}s outside [{min}s, {max}s]")]
    DurationOutOfRange {
        /// Phase name.
        phase: &'static str,
        /// Offending duration.
        secs: u64,
        /// Lower bound.
        min: u64,
        /// Upper bound.
        max: u64,
    },

    /// An investment the offering logic refused.
    #[error("investment of {amount} rejected in state {state}: {reason}")]
    InvestmentRejected {
        /// Offering state at the time.
        state: EtoState,
        /// Ticket size.
        amount: Amount,
        /// Why.
        reason: String,
    },

    /// The observer refused a transition notification.
    #[error(transparent)]
    Observer(#[from] ObserverError),

    /// Arithmetic or timestamp failure.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Raised by a [`crate::StateObserver`] to refuse a notification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("observer rejected {old} -> {new}: {reason}")]
pub struct ObserverError {
    /// State being left.
    pub old: EtoState,
    /// State being entered.
    pub new: EtoState,
    /// Why.
    pub reason: String,
}
