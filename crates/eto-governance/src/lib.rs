//! # eto-governance — Resolutions and Company Control
//!
//! Every structural change of a tokenized company runs as a resolution:
//! a record keyed by a caller-chosen id that moves through
//!
//! ```text
//! NEW ──▶ ESCALATING ──▶ EXECUTING ──▶ COMPLETED | FAILED | REJECTED | CANCELLED
//! ```
//!
//! ## Modules
//!
//! - **resolution** (`resolution.rs`): states, actions, stored records and
//!   the request promise.
//! - **escalation** (`escalation.rs`): `PermissionEscalator` and
//!   `ResolutionValidator` strategies, with the default policy.
//! - **engine** (`engine.rs`): `ResolutionEngine` with atomic and
//!   non-atomic execution.
//! - **controller** (`controller.rs`): `GovernanceController`, the
//!   company's lifecycle driven by its offerings.
//! - **capability** (`capability.rs`): `ResolutionHost` and
//!   `GeneralInformation` views.
//! - **identity** (`identity.rs`): KYC registry used for transfer checks.
//!
//! ## Replay Protection
//!
//! A terminal resolution never runs again, and a continuation must carry
//! the same action, document and payload as the call that created it.

pub mod capability;
pub mod controller;
pub mod engine;
pub mod error;
pub mod escalation;
pub mod event;
pub mod identity;
pub mod resolution;

pub use capability::{GeneralInformation, ResolutionHost};
pub use controller::{GovState, GovernanceConfig, GovernanceController, VotingRule};
pub use engine::ResolutionEngine;
pub use error::GovernanceError;
pub use escalation::{
    AcceptAll, DefaultPermissionEscalator, Escalation, EscalationContext, PermissionEscalator,
    ResolutionValidator,
};
pub use event::GovernanceEvent;
pub use identity::{IdentityRegistry, StaticIdentityRegistry};
pub use resolution::{ExecutionOutcome, GovAction, ResolutionExecution, ResolutionRequest, ResolutionState};
