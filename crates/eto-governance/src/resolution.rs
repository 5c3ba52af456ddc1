//! # Resolution Records
//!
//! A resolution is one governance decision, keyed by a caller-chosen
//! [`ResolutionId`].
//!
//! ## States
//!
//! NEW → ESCALATING → EXECUTING → COMPLETED | FAILED | REJECTED | CANCELLED
//!
//! NEW is never stored: an id without a record is new. Records in a
//! terminal state are kept for audit and can never run again.
//!
//! ## Promise
//!
//! The first accepted call stores a digest over the canonical form of
//! `(action, document_url, payload)`. Every continuation must reproduce
//! it exactly.

use eto_core::{sha256_digest, Address, CanonicalBytes, CanonicalizationError, ContentDigest, ResolutionId, Timestamp};
use serde::{Deserialize, Serialize};

/// Lifecycle of a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolutionState {
    /// Unseen id.
    New,
    /// Awaiting a vote or a higher authority.
    Escalating,
    /// Approved; its body may run, possibly across several calls.
    Executing,
    /// Finished successfully. Terminal.
    Completed,
    /// Stopped by a validation failure. Terminal.
    Failed,
    /// Denied after escalation. Terminal.
    Rejected,
    /// Withdrawn while executing. Terminal.
    Cancelled,
}

impl ResolutionState {
    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Rejected | Self::Cancelled
        )
    }

    /// The canonical string name of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Escalating => "ESCALATING",
            Self::Executing => "EXECUTING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Rejected => "REJECTED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for ResolutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Governance action a resolution performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GovAction {
    /// No-op open to anyone permitted.
    None,
    /// No-op restricted to the company.
    RestrictedNone,
    /// Register a new offering with the company.
    RegisterOffer,
    /// Change the equity token controller, including its transfer switch.
    ChangeTokenController,
    /// Amend the governance terms.
    AmendGovernance,
    /// Distribute proceeds.
    Payout,
    /// Wind the company down.
    CloseToken,
}

impl GovAction {
    /// The canonical string name of this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::RestrictedNone => "restricted_none",
            Self::RegisterOffer => "register_offer",
            Self::ChangeTokenController => "change_token_controller",
            Self::AmendGovernance => "amend_governance",
            Self::Payout => "payout",
            Self::CloseToken => "close_token",
        }
    }
}

impl std::fmt::Display for GovAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The stored record of a resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionExecution {
    /// Action bound to the id.
    pub action: GovAction,
    /// Current state. Never `New`.
    pub state: ResolutionState,
    /// When the record was created.
    pub started_at: Timestamp,
    /// When it reached a terminal state.
    pub finished_at: Option<Timestamp>,
    /// Digest of the failure reason, for Failed records.
    pub failed_code: Option<ContentDigest>,
    /// Digest binding every continuation to the original call.
    pub promise: ContentDigest,
}

/// A call into the resolution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionRequest {
    /// Caller-chosen unique id.
    pub resolution_id: ResolutionId,
    /// Action to perform.
    pub action: GovAction,
    /// Resolution document.
    pub document_url: String,
    /// Action arguments.
    pub payload: serde_json::Value,
    /// Who is calling.
    pub caller: Address,
}

#[derive(Serialize)]
struct PromisedCall<'a> {
    action: GovAction,
    document_url: &'a str,
    payload: &'a serde_json::Value,
}

impl ResolutionRequest {
    /// A request with an empty payload.
    pub fn new(
        resolution_id: ResolutionId,
        action: GovAction,
        document_url: impl Into<String>,
        caller: Address,
    ) -> Self {
        Self {
            resolution_id,
            action,
            document_url: document_url.into(),
            payload: serde_json::Value::Null,
            caller,
        }
    }

    /// Attach action arguments.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Digest of everything a continuation must repeat. The caller is
    /// excluded, so anyone permitted may continue a resolution.
    pub fn promise(&self) -> Result<ContentDigest, CanonicalizationError> {
        let bytes = CanonicalBytes::new(&PromisedCall {
            action: self.action,
            document_url: &self.document_url,
            payload: &self.payload,
        })?;
        Ok(sha256_digest(&bytes))
    }
}

/// What an execution call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome<T> {
    /// Resolution state after the call.
    pub state: ResolutionState,
    /// Body result, if the body ran.
    pub value: Option<T>,
}

impl<T> ExecutionOutcome<T> {
    /// An outcome where the body did not run.
    pub fn skipped(state: ResolutionState) -> Self {
        Self { state, value: None }
    }

    /// Whether the body ran.
    pub fn executed(&self) -> bool {
        self.value.is_some()
    }
}
