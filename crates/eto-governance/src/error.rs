//! Errors raised by the resolution engine and the company controller.

use eto_core::{Address, CanonicalizationError, CoreError, ResolutionId};
use thiserror::Error;

use crate::controller::GovState;
use crate::resolution::{GovAction, ResolutionState};

/// Errors from governance operations. A call returning `Err` stores nothing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GovernanceError {
    /// The escalation policy rejected a new resolution.
    #[error("{caller} may not execute {action}")]
    AccessDenied {
        /// The caller.
        caller: Address,
        /// Requested action.
        action: GovAction,
    },

    /// A continuation whose payload differs from the original call.
    #[error("unkept promise for resolution {resolution_id}")]
    UnkeptPromise {
        /// The resolution.
        resolution_id: ResolutionId,
    },

    /// The resolution already reached a terminal state.
    #[error("resolution {resolution_id} is {state}")]
    ResolutionTerminated {
        /// The resolution.
        resolution_id: ResolutionId,
        /// Its terminal state.
        state: ResolutionState,
    },

    /// No record for the id.
    #[error("resolution {resolution_id} not found")]
    ResolutionNotFound {
        /// The resolution.
        resolution_id: ResolutionId,
    },

    /// The operation requires a different resolution state.
    #[error("resolution {resolution_id} is {actual}, expected {expected}")]
    WrongResolutionState {
        /// The resolution.
        resolution_id: ResolutionId,
        /// Required state.
        expected: ResolutionState,
        /// Current state.
        actual: ResolutionState,
    },

    /// The id is bound to a different action.
    #[error("resolution {resolution_id} performs {bound}, not {requested}")]
    ActionMismatch {
        /// The resolution.
        resolution_id: ResolutionId,
        /// Action stored with the record.
        bound: GovAction,
        /// Action requested.
        requested: GovAction,
    },

    /// Validation failed for a resolution not yet stored.
    #[error("resolution {resolution_id} failed validation: {reason}")]
    ValidationFailed {
        /// The resolution.
        resolution_id: ResolutionId,
        /// Validator message.
        reason: String,
    },

    /// The company is in the wrong lifecycle phase.
    #[error("{op} not permitted while company is {state}")]
    WrongGovState {
        /// Operation name.
        op: &'static str,
        /// Current phase.
        state: GovState,
    },

    /// Notification from an offering the company never registered.
    #[error("offering {offering} is not registered")]
    UnknownOffering {
        /// The offering.
        offering: Address,
    },

    /// The offering is already registered.
    #[error("offering {offering} is already registered")]
    OfferingAlreadyRegistered {
        /// The offering.
        offering: Address,
    },

    /// Caller is not the legal representative.
    #[error("{caller} is not the legal representative")]
    NotLegalRepresentative {
        /// The caller.
        caller: Address,
    },

    /// Payload could not be canonicalized.
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),

    /// Arithmetic failure.
    #[error(transparent)]
    Core(#[from] CoreError),
}
