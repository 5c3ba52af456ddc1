//! # eto-state — ETO Timed State Machine
//!
//! A single equity token offering moves through seven phases:
//!
//! ```text
//! Setup ──▶ Whitelist ──▶ Public ──▶ Signing ──▶ Claim ──▶ Payout
//!   │           │            │          │
//!   └───────────┴────────────┴──────────┴──▶ Refund
//! ```
//!
//! Phase lengths come from a [`StateDurationTable`] fixed at construction.
//! Transitions are either *time-induced* (a phase deadline passed) or
//! *logic-induced* (the [`OfferingLogic`] says so: cap reached, agreement
//! signed). Every transition is reported to a [`StateObserver`].
//!
//! ## Modules
//!
//! - **duration** (`duration.rs`): `DurationTerms`, `DurationLimits`,
//!   `StateDurationTable`.
//! - **offering** (`offering.rs`): `EtoState`, `EtoTimedStateMachine`,
//!   the `OfferingLogic` and `StateObserver` seams and their reference
//!   implementations.

pub mod duration;
pub mod error;
pub mod offering;

pub use duration::{DurationLimits, DurationTerms, StateDurationTable};
pub use error::{ObserverError, OfferingError};
pub use offering::{
    EtoState, EtoTimedStateMachine, NullObserver, OfferingLogic, RecordingObserver,
    StateObserver, StateTransitionEvent, ThresholdOfferingLogic,
};
