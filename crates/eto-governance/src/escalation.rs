//! # Permission Escalation and Validation
//!
//! Strategy objects consulted by the resolution engine.
//!
//! - [`PermissionEscalator`] decides whether a new resolution may execute
//!   now, must wait for a vote, or is denied, and later whether a pending
//!   vote has concluded.
//! - [`ResolutionValidator`] checks the call against the company's current
//!   situation before and during execution.
//!
//! ## Default Policy
//!
//! [`DefaultPermissionEscalator`]:
//!
//! | Company phase | Voting rights | Legal rep / controller | Anyone else |
//! |---------------|---------------|------------------------|-------------|
//! | Setup         | any           | execute                | reject      |
//! | other         | none          | execute (rep only)     | reject      |
//! | other         | yes           | escalate               | escalate    |

use std::collections::BTreeMap;

use eto_core::{Address, ResolutionId};

use crate::controller::GovState;
use crate::resolution::{GovAction, ResolutionExecution, ResolutionRequest, ResolutionState};

/// Decision of a [`PermissionEscalator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Escalation {
    /// Proceed now.
    Execute,
    /// Defer to a vote.
    Escalate,
    /// Deny.
    Reject,
}

impl Escalation {
    /// The resolution state this decision leads to.
    pub fn state(&self) -> ResolutionState {
        match self {
            Self::Execute => ResolutionState::Executing,
            Self::Escalate => ResolutionState::Escalating,
            Self::Reject => ResolutionState::Rejected,
        }
    }
}

/// Company facts the escalation policy depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationContext {
    /// Current company phase.
    pub gov_state: GovState,
    /// Legal representative of the company.
    pub legal_representative: Address,
    /// The controller itself.
    pub controller: Address,
    /// Whether the equity token carries voting rights.
    pub voting_rights: bool,
}

/// Decides who may execute what.
pub trait PermissionEscalator: std::fmt::Debug {
    /// Decision for a resolution seen for the first time.
    fn escalate(&self, action: GovAction, caller: Address, ctx: &EscalationContext) -> Escalation;

    /// Decision for a resolution currently Escalating. The default keeps
    /// it pending.
    fn resolve_escalation(
        &self,
        resolution_id: ResolutionId,
        execution: &ResolutionExecution,
        ctx: &EscalationContext,
    ) -> Escalation {
        let _ = (resolution_id, execution, ctx);
        Escalation::Escalate
    }
}

/// Checks a call before and during execution. `Err` carries the reason.
pub trait ResolutionValidator {
    /// Validate `request` against a resolution currently in `state`.
    fn validate(&self, request: &ResolutionRequest, state: ResolutionState) -> Result<(), String>;
}

impl<F> ResolutionValidator for F
where
    F: Fn(&ResolutionRequest, ResolutionState) -> Result<(), String>,
{
    fn validate(&self, request: &ResolutionRequest, state: ResolutionState) -> Result<(), String> {
        self(request, state)
    }
}

/// Validator that accepts everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl ResolutionValidator for AcceptAll {
    fn validate(&self, _request: &ResolutionRequest, _state: ResolutionState) -> Result<(), String> {
        Ok(())
    }
}

/// The default escalation policy, with shareholder vote outcomes recorded
/// per resolution.
#[derive(Debug, Default, Clone)]
pub struct DefaultPermissionEscalator {
    votes: BTreeMap<ResolutionId, bool>,
}

impl DefaultPermissionEscalator {
    /// A policy with no concluded votes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of the vote on `resolution_id`.
    pub fn record_vote(&mut self, resolution_id: ResolutionId, passed: bool) {
        tracing::info!(resolution = %resolution_id, passed, "vote concluded");
        self.votes.insert(resolution_id, passed);
    }

    /// Outcome of a concluded vote.
    pub fn vote(&self, resolution_id: ResolutionId) -> Option<bool> {
        self.votes.get(&resolution_id).copied()
    }
}

impl PermissionEscalator for DefaultPermissionEscalator {
    fn escalate(&self, action: GovAction, caller: Address, ctx: &EscalationContext) -> Escalation {
        let is_rep = caller == ctx.legal_representative;
        let decision = if ctx.gov_state == GovState::Setup {
            if is_rep || caller == ctx.controller {
                Escalation::Execute
            } else {
                Escalation::Reject
            }
        } else if !ctx.voting_rights {
            if is_rep {
                Escalation::Execute
            } else {
                Escalation::Reject
            }
        } else {
            Escalation::Escalate
        };
        tracing::debug!(%action, %caller, gov_state = %ctx.gov_state, ?decision, "permission escalation");
        decision
    }

    fn resolve_escalation(
        &self,
        resolution_id: ResolutionId,
        _execution: &ResolutionExecution,
        _ctx: &EscalationContext,
    ) -> Escalation {
        match self.vote(resolution_id) {
            Some(true) => Escalation::Execute,
            Some(false) => Escalation::Reject,
            None => Escalation::Escalate,
        }
    }
}
