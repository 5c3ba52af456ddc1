//! # Resolution Engine
//!
//! Owns the resolution table and runs governance actions through it.
//!
//! ## Call Sequence
//!
//! Every execution call goes through the same steps:
//!
//! 1. A terminal record is refused outright.
//! 2. The validator runs. Failure on an unseen id reverts the call. Failure
//!    on a stored record terminates it as Failed with `failed_code` set to
//!    the digest of the reason, and the call succeeds without running the
//!    body.
//! 3. Governance: an unseen id asks the escalator, a stored one must
//!    present the same promise, and an Escalating one asks whether its vote
//!    concluded.
//! 4. The body runs only when the record is Executing. A body error
//!    restores the table and journal to their state before the call.
//! 5. Atomic execution terminates a record the body left Executing as
//!    Completed. Non-atomic execution leaves it for
//!    [`ResolutionEngine::complete_resolution`],
//!    [`ResolutionEngine::fail_resolution`] or
//!    [`ResolutionEngine::cancel_resolution`].

use std::collections::BTreeMap;
use std::sync::Arc;

use eto_core::{sha256_str, Clock, ContentDigest, ResolutionId};

use crate::error::GovernanceError;
use crate::escalation::{Escalation, EscalationContext, PermissionEscalator, ResolutionValidator};
use crate::event::GovernanceEvent;
use crate::resolution::{ExecutionOutcome, ResolutionExecution, ResolutionRequest, ResolutionState};

/// Whether a successful body completes the resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Atomic,
    NonAtomic,
}

/// Table state captured before a body runs.
struct Snapshot {
    resolution_id: ResolutionId,
    record: Option<ResolutionExecution>,
    ids: usize,
    events: usize,
}

/// Resolution table plus journal.
#[derive(Debug)]
pub struct ResolutionEngine {
    clock: Arc<dyn Clock>,
    resolutions: BTreeMap<ResolutionId, ResolutionExecution>,
    resolution_ids: Vec<ResolutionId>,
    events: Vec<GovernanceEvent>,
}

impl ResolutionEngine {
    /// An empty engine.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            resolutions: BTreeMap::new(),
            resolution_ids: Vec::new(),
            events: Vec::new(),
        }
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// The record for `resolution_id`.
    pub fn resolution(&self, resolution_id: ResolutionId) -> Option<&ResolutionExecution> {
        self.resolutions.get(&resolution_id)
    }

    /// State of `resolution_id`; New if unseen.
    pub fn resolution_state(&self, resolution_id: ResolutionId) -> ResolutionState {
        self.resolutions
            .get(&resolution_id)
            .map_or(ResolutionState::New, |r| r.state)
    }

    /// Every stored id, in order of creation.
    pub fn resolution_ids(&self) -> &[ResolutionId] {
        &self.resolution_ids
    }

    /// Ids of resolutions currently in `state`, in order of creation.
    pub fn resolutions_in_state(&self, state: ResolutionState) -> Vec<ResolutionId> {
        self.resolution_ids
            .iter()
            .copied()
            .filter(|id| self.resolution_state(*id) == state)
            .collect()
    }

    /// Journal.
    pub fn events(&self) -> &[GovernanceEvent] {
        &self.events
    }

    /// Take the journal.
    pub fn drain_events(&mut self) -> Vec<GovernanceEvent> {
        std::mem::take(&mut self.events)
    }

    /// Append to the journal. Bodies use this so their entries are undone
    /// with the rest of a failed call.
    pub fn record(&mut self, event: GovernanceEvent) {
        self.events.push(event);
    }

    /// The engine's clock reading.
    pub fn now(&self) -> eto_core::Timestamp {
        self.clock.now()
    }

    // ── Governance ──────────────────────────────────────────────────

    /// Store or continue the resolution named by `request`, without running
    /// anything. Returns the state it is left in.
    pub fn with_governance(
        &mut self,
        request: &ResolutionRequest,
        escalator: &dyn PermissionEscalator,
        ctx: &EscalationContext,
    ) -> Result<ResolutionState, GovernanceError> {
        let id = request.resolution_id;
        let promise = request.promise()?;

        let Some(existing) = self.resolutions.get(&id) else {
            return self.start(request, promise, escalator.escalate(request.action, request.caller, ctx));
        };
        self.check_continuation(request, existing, promise)?;
        if existing.state != ResolutionState::Escalating {
            return Ok(existing.state);
        }
        match escalator.resolve_escalation(id, existing, ctx) {
            Escalation::Execute => {
                self.set_state(id, ResolutionState::Executing)?;
                Ok(ResolutionState::Executing)
            }
            Escalation::Escalate => Ok(ResolutionState::Escalating),
            Escalation::Reject => {
                self.terminate(id, ResolutionState::Rejected, None)?;
                Ok(ResolutionState::Rejected)
            }
        }
    }

    /// Run `body` and complete the resolution within this call.
    pub fn with_atomic_execution<T, E, F>(
        &mut self,
        request: &ResolutionRequest,
        validator: &dyn ResolutionValidator,
        escalator: &dyn PermissionEscalator,
        ctx: &EscalationContext,
        body: F,
    ) -> Result<ExecutionOutcome<T>, E>
    where
        E: From<GovernanceError>,
        F: FnOnce(&mut ResolutionEngine, ResolutionId) -> Result<T, E>,
    {
        self.execute(Mode::Atomic, request, validator, escalator, ctx, body)
    }

    /// Run `body` and leave the resolution Executing for later calls.
    pub fn with_non_atomic_execution<T, E, F>(
        &mut self,
        request: &ResolutionRequest,
        validator: &dyn ResolutionValidator,
        escalator: &dyn PermissionEscalator,
        ctx: &EscalationContext,
        body: F,
    ) -> Result<ExecutionOutcome<T>, E>
    where
        E: From<GovernanceError>,
        F: FnOnce(&mut ResolutionEngine, ResolutionId) -> Result<T, E>,
    {
        self.execute(Mode::NonAtomic, request, validator, escalator, ctx, body)
    }

    fn execute<T, E, F>(
        &mut self,
        mode: Mode,
        request: &ResolutionRequest,
        validator: &dyn ResolutionValidator,
        escalator: &dyn PermissionEscalator,
        ctx: &EscalationContext,
        body: F,
    ) -> Result<ExecutionOutcome<T>, E>
    where
        E: From<GovernanceError>,
        F: FnOnce(&mut ResolutionEngine, ResolutionId) -> Result<T, E>,
    {
        let id = request.resolution_id;
        let current = self.resolution_state(id);
        if current.is_terminal() {
            return Err(GovernanceError::ResolutionTerminated {
                resolution_id: id,
                state: current,
            }
            .into());
        }

        if let Err(reason) = validator.validate(request, current) {
            if current == ResolutionState::New {
                return Err(GovernanceError::ValidationFailed {
                    resolution_id: id,
                    reason,
                }
                .into());
            }
            let promise = request.promise().map_err(GovernanceError::from)?;
            if let Some(existing) = self.resolutions.get(&id) {
                self.check_continuation(request, existing, promise)?;
            }
            tracing::warn!(resolution = %id, %reason, "validation failed, resolution terminated");
            self.terminate(id, ResolutionState::Failed, Some(sha256_str(&reason)))?;
            return Ok(ExecutionOutcome::skipped(ResolutionState::Failed));
        }

        let snapshot = self.snapshot(id);
        let state = self.with_governance(request, escalator, ctx)?;
        if state != ResolutionState::Executing {
            return Ok(ExecutionOutcome::skipped(state));
        }

        let value = match body(self, id) {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(resolution = %id, "resolution body failed, call reverted");
                self.restore(snapshot);
                return Err(err);
            }
        };

        if mode == Mode::Atomic && self.resolution_state(id) == ResolutionState::Executing {
            self.terminate(id, ResolutionState::Completed, None)?;
        }
        Ok(ExecutionOutcome {
            state: self.resolution_state(id),
            value: Some(value),
        })
    }

    // ── Termination ─────────────────────────────────────────────────

    /// Executing → Completed.
    pub fn complete_resolution(&mut self, resolution_id: ResolutionId) -> Result<(), GovernanceError> {
        self.require_state(resolution_id, ResolutionState::Executing)?;
        self.terminate(resolution_id, ResolutionState::Completed, None)
    }

    /// Executing → Failed, recording the digest of `reason`.
    pub fn fail_resolution(&mut self, resolution_id: ResolutionId, reason: &str) -> Result<(), GovernanceError> {
        self.require_state(resolution_id, ResolutionState::Executing)?;
        self.terminate(resolution_id, ResolutionState::Failed, Some(sha256_str(reason)))
    }

    /// Executing → Cancelled.
    pub fn cancel_resolution(&mut self, resolution_id: ResolutionId) -> Result<(), GovernanceError> {
        self.require_state(resolution_id, ResolutionState::Executing)?;
        self.terminate(resolution_id, ResolutionState::Cancelled, None)
    }

    // ── Internals ───────────────────────────────────────────────────

    fn start(
        &mut self,
        request: &ResolutionRequest,
        promise: ContentDigest,
        decision: Escalation,
    ) -> Result<ResolutionState, GovernanceError> {
        let id = request.resolution_id;
        if decision == Escalation::Reject {
            return Err(GovernanceError::AccessDenied {
                caller: request.caller,
                action: request.action,
            });
        }
        let state = decision.state();
        self.resolutions.insert(
            id,
            ResolutionExecution {
                action: request.action,
                state,
                started_at: self.clock.now(),
                finished_at: None,
                failed_code: None,
                promise,
            },
        );
        self.resolution_ids.push(id);
        tracing::info!(resolution = %id, action = %request.action, %state, "resolution started");
        self.events.push(GovernanceEvent::LogResolutionStarted {
            resolution_id: id,
            action: request.action,
            state,
            document_url: request.document_url.clone(),
        });
        Ok(state)
    }

    fn check_continuation(
        &self,
        request: &ResolutionRequest,
        existing: &ResolutionExecution,
        promise: ContentDigest,
    ) -> Result<(), GovernanceError> {
        let id = request.resolution_id;
        if existing.action != request.action {
            return Err(GovernanceError::ActionMismatch {
                resolution_id: id,
                bound: existing.action,
                requested: request.action,
            });
        }
        if existing.promise != promise {
            tracing::warn!(resolution = %id, "continuation with a different payload");
            return Err(GovernanceError::UnkeptPromise { resolution_id: id });
        }
        if existing.state.is_terminal() {
            return Err(GovernanceError::ResolutionTerminated {
                resolution_id: id,
                state: existing.state,
            });
        }
        Ok(())
    }

    fn require_state(&self, resolution_id: ResolutionId, expected: ResolutionState) -> Result<(), GovernanceError> {
        let record = self
            .resolutions
            .get(&resolution_id)
            .ok_or(GovernanceError::ResolutionNotFound { resolution_id })?;
        if record.state.is_terminal() {
            return Err(GovernanceError::ResolutionTerminated {
                resolution_id,
                state: record.state,
            });
        }
        if record.state != expected {
            return Err(GovernanceError::WrongResolutionState {
                resolution_id,
                expected,
                actual: record.state,
            });
        }
        Ok(())
    }

    fn set_state(&mut self, resolution_id: ResolutionId, state: ResolutionState) -> Result<(), GovernanceError> {
        let now = self.clock.now();
        let record = self
            .resolutions
            .get_mut(&resolution_id)
            .ok_or(GovernanceError::ResolutionNotFound { resolution_id })?;
        record.state = state;
        if state.is_terminal() {
            record.finished_at = Some(now);
        }
        let action = record.action;
        tracing::info!(resolution = %resolution_id, %action, %state, "resolution state changed");
        self.events.push(GovernanceEvent::LogResolutionExecuted {
            resolution_id,
            action,
            state,
        });
        Ok(())
    }

    fn terminate(
        &mut self,
        resolution_id: ResolutionId,
        state: ResolutionState,
        failed_code: Option<ContentDigest>,
    ) -> Result<(), GovernanceError> {
        if let Some(record) = self.resolutions.get_mut(&resolution_id) {
            record.failed_code = failed_code;
        }
        self.set_state(resolution_id, state)
    }

    fn snapshot(&self, resolution_id: ResolutionId) -> Snapshot {
        Snapshot {
            resolution_id,
            record: self.resolutions.get(&resolution_id).cloned(),
            ids: self.resolution_ids.len(),
            events: self.events.len(),
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        match snapshot.record {
            Some(record) => {
                self.resolutions.insert(snapshot.resolution_id, record);
            }
            None => {
                self.resolutions.remove(&snapshot.resolution_id);
            }
        }
        self.resolution_ids.truncate(snapshot.ids);
        self.events.truncate(snapshot.events);
    }
}
