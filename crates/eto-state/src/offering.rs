//! # ETO Timed State Machine
//!
//! ## Deadlines
//!
//! `past_times[s]` holds the deadline of state `s`: the scheduled end while
//! `s` is current, the actual end once it is past. On every transition the
//! deadline of the state being left becomes `min(now, recorded deadline)`
//! and the new state's deadline is that value plus the new state's
//! duration. A transition processed late therefore still anchors the next
//! phase to the schedule, not to the time somebody got around to calling.
//!
//! ## Transition Sources
//!
//! - *Time*: [`EtoTimedStateMachine::handle_state_transitions`] and the
//!   "before" half of [`EtoTimedStateMachine::with_state_transition`]. The
//!   checks run in ascending order and each is independent, so a single
//!   call after a long gap cascades through several phases.
//! - *Logic*: the "after" half of `with_state_transition` asks
//!   [`OfferingLogic::advance_logic_state`] for the next state until it
//!   stops answering, bounded by the number of states.
//!
//! Every transition passes through [`OfferingLogic::before_state_transition`]
//! (which may redirect it, typically to Refund) and is then reported to the
//! [`StateObserver`]. If the observer refuses, that transition is undone and
//! the error is returned; transitions already reported stay in place.

use std::sync::Arc;

use eto_core::{Address, Amount, Clock, Timestamp};
use serde::{Deserialize, Serialize};

use crate::duration::StateDurationTable;
use crate::error::{ObserverError, OfferingError};

// ─── ETO State ──────────────────────────────────────────────────────

/// Phase of an equity token offering. Declaration order is index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EtoState {
    /// Terms are being configured; no start date or start date not reached.
    Setup,
    /// Whitelisted investors may invest.
    Whitelist,
    /// Anyone may invest.
    Public,
    /// Company and nominee sign the investment agreement.
    Signing,
    /// Offering succeeded; investors claim tokens.
    Claim,
    /// Funds paid out to the company (terminal).
    Payout,
    /// Offering failed; investors are refunded (terminal).
    Refund,
}

impl EtoState {
    /// Number of states.
    pub const COUNT: usize = 7;

    /// All states in index order.
    pub const ALL: [EtoState; Self::COUNT] = [
        Self::Setup,
        Self::Whitelist,
        Self::Public,
        Self::Signing,
        Self::Claim,
        Self::Payout,
        Self::Refund,
    ];

    /// Position in [`Self::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Payout | Self::Refund)
    }

    /// Uppercase name used in logs and events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Setup => "SETUP",
            Self::Whitelist => "WHITELIST",
            Self::Public => "PUBLIC",
            Self::Signing => "SIGNING",
            Self::Claim => "CLAIM",
            Self::Payout => "PAYOUT",
            Self::Refund => "REFUND",
        }
    }
}

impl std::fmt::Display for EtoState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Events ─────────────────────────────────────────────────────────

/// `LogStateTransition`: one per settled transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransitionEvent {
    /// The offering that moved.
    pub offering: Address,
    /// State left.
    pub old: EtoState,
    /// State entered.
    pub new: EtoState,
    /// Deadline of the new state.
    pub deadline: Timestamp,
    /// Clock reading when the transition was processed.
    pub at: Timestamp,
}

// ─── Collaborator Seams ─────────────────────────────────────────────

/// Receives every settled transition.
pub trait StateObserver {
    /// Called after the machine's own state has been updated.
    fn on_state_transition(
        &mut self,
        offering: Address,
        old: EtoState,
        new: EtoState,
    ) -> Result<(), ObserverError>;
}

/// Business policy layered over the timed automaton.
pub trait OfferingLogic {
    /// The state actually entered when a transition to `new` is requested.
    fn before_state_transition(&self, _old: EtoState, new: EtoState) -> EtoState {
        new
    }

    /// A logic-induced next state, or `None` to stay.
    fn advance_logic_state(&self, state: EtoState) -> Option<EtoState>;
}

/// Observer that accepts everything and records nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl StateObserver for NullObserver {
    fn on_state_transition(&mut self, _: Address, _: EtoState, _: EtoState) -> Result<(), ObserverError> {
        Ok(())
    }
}

/// Observer that records every notification and can be told to refuse one.
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    /// Notifications received, in order.
    pub transitions: Vec<(Address, EtoState, EtoState)>,
    /// Refuse any transition into this state.
    pub reject_entering: Option<EtoState>,
}

impl StateObserver for RecordingObserver {
    fn on_state_transition(
        &mut self,
        offering: Address,
        old: EtoState,
        new: EtoState,
    ) -> Result<(), ObserverError> {
        if self.reject_entering == Some(new) {
            return Err(ObserverError {
                old,
                new,
                reason: "observer configured to refuse".to_string(),
            });
        }
        self.transitions.push((offering, old, new));
        Ok(())
    }
}

/// Cap-driven offering policy.
///
/// - Reaching `max_cap` in Whitelist or Public moves to Signing at once.
/// - Entering Signing below `min_cap` is redirected to Refund.
/// - A signed agreement moves Signing to Claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdOfferingLogic {
    min_cap: Amount,
    max_cap: Amount,
    total_investment: Amount,
    agreement_signed: bool,
}

impl ThresholdOfferingLogic {
    /// A fresh policy with no investments.
    pub fn new(min_cap: Amount, max_cap: Amount) -> Self {
        Self {
            min_cap,
            max_cap,
            total_investment: Amount::ZERO,
            agreement_signed: false,
        }
    }

    /// Sum of accepted tickets.
    pub fn total_investment(&self) -> Amount {
        self.total_investment
    }

    /// Whether the maximum cap has been reached.
    pub fn is_cap_reached(&self) -> bool {
        self.total_investment >= self.max_cap
    }

    /// Whether the agreement has been signed.
    pub fn agreement_signed(&self) -> bool {
        self.agreement_signed
    }

    /// Accept a ticket. Only while Whitelist or Public, never beyond the cap.
    pub fn invest(&mut self, state: EtoState, amount: Amount) -> Result<(), OfferingError> {
        let reject = |reason: &str| OfferingError::InvestmentRejected {
            state,
            amount,
            reason: reason.to_string(),
        };
        if !matches!(state, EtoState::Whitelist | EtoState::Public) {
            return Err(reject("offering is not accepting investments"));
        }
        if amount.is_zero() {
            return Err(reject("zero ticket"));
        }
        let total = self.total_investment.checked_add(amount)?;
        if total > self.max_cap {
            return Err(reject("ticket exceeds maximum cap"));
        }
        self.total_investment = total;
        Ok(())
    }

    /// Record the signed investment agreement. Only while Signing.
    pub fn sign_agreement(&mut self, state: EtoState) -> Result<(), OfferingError> {
        if state != EtoState::Signing {
            return Err(OfferingError::WrongState {
                expected: EtoState::Signing,
                actual: state,
            });
        }
        self.agreement_signed = true;
        Ok(())
    }
}

impl OfferingLogic for ThresholdOfferingLogic {
    fn before_state_transition(&self, _old: EtoState, new: EtoState) -> EtoState {
        if new == EtoState::Signing && self.total_investment < self.min_cap {
            EtoState::Refund
        } else {
            new
        }
    }

    fn advance_logic_state(&self, state: EtoState) -> Option<EtoState> {
        match state {
            EtoState::Whitelist | EtoState::Public if self.is_cap_reached() => {
                Some(EtoState::Signing)
            }
            EtoState::Signing if self.agreement_signed => Some(EtoState::Claim),
            _ => None,
        }
    }
}

// ─── State Machine ──────────────────────────────────────────────────

/// The timed automaton of one offering.
#[derive(Debug, Clone)]
pub struct EtoTimedStateMachine {
    address: Address,
    clock: Arc<dyn Clock>,
    durations: StateDurationTable,
    state: EtoState,
    past_times: [Option<Timestamp>; EtoState::COUNT],
    events: Vec<StateTransitionEvent>,
}

impl EtoTimedStateMachine {
    /// A machine in Setup with no start date.
    pub fn new(address: Address, durations: StateDurationTable, clock: Arc<dyn Clock>) -> Self {
        Self {
            address,
            clock,
            durations,
            state: EtoState::Setup,
            past_times: [None; EtoState::COUNT],
            events: Vec::new(),
        }
    }

    /// Address reported to observers.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Current state as last settled. See [`Self::timed_state`].
    pub fn state(&self) -> EtoState {
        self.state
    }

    /// The duration table.
    pub fn durations(&self) -> &StateDurationTable {
        &self.durations
    }

    /// Per-state deadlines.
    pub fn past_transition_times(&self) -> &[Option<Timestamp>; EtoState::COUNT] {
        &self.past_times
    }

    /// Transition journal.
    pub fn events(&self) -> &[StateTransitionEvent] {
        &self.events
    }

    /// Take the transition journal.
    pub fn drain_events(&mut self) -> Vec<StateTransitionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Claim, Payout or Refund.
    pub fn finalized(&self) -> bool {
        matches!(self.state, EtoState::Claim | EtoState::Payout | EtoState::Refund)
    }

    /// Claim or Payout.
    pub fn success(&self) -> bool {
        matches!(self.state, EtoState::Claim | EtoState::Payout)
    }

    /// Refund.
    pub fn failed(&self) -> bool {
        self.state == EtoState::Refund
    }

    /// Schedule the offering. Only in Setup; `start` must not be in the past.
    /// May be called again to move the date while still in Setup.
    pub fn set_start_date(
        &mut self,
        start: Timestamp,
        logic: &dyn OfferingLogic,
        observer: &mut dyn StateObserver,
    ) -> Result<(), OfferingError> {
        self.advance_timed_state(logic, observer)?;
        if self.state != EtoState::Setup {
            return Err(OfferingError::WrongState {
                expected: EtoState::Setup,
                actual: self.state,
            });
        }
        let now = self.clock.now();
        if start < now {
            return Err(OfferingError::StartDateInPast { start, now });
        }
        self.past_times[EtoState::Setup.index()] = Some(start);
        tracing::info!(offering = %self.address, start = %start, "ETO start date set");
        self.advance_logic_state(logic, observer)
    }

    /// Apply time-induced transitions only. Callable by anyone; a second
    /// call with no elapsed time does nothing.
    pub fn handle_state_transitions(
        &mut self,
        logic: &dyn OfferingLogic,
        observer: &mut dyn StateObserver,
    ) -> Result<(), OfferingError> {
        self.advance_timed_state(logic, observer)
    }

    /// Run `body` between the time-induced and logic-induced halves.
    ///
    /// The body sees the state after time transitions and may mutate the
    /// offering logic (record an investment, sign the agreement). An error
    /// from the body is returned unchanged and the logic phase is skipped.
    pub fn with_state_transition<L, T, E>(
        &mut self,
        logic: &mut L,
        observer: &mut dyn StateObserver,
        body: impl FnOnce(EtoState, &mut L) -> Result<T, E>,
    ) -> Result<T, E>
    where
        L: OfferingLogic,
        E: From<OfferingError>,
    {
        self.advance_timed_state(&*logic, observer)?;
        let out = body(self.state, logic)?;
        self.advance_logic_state(&*logic, observer)?;
        Ok(out)
    }

    /// The state time alone would produce now, without mutating anything.
    pub fn timed_state(&self, logic: &dyn OfferingLogic) -> Result<EtoState, OfferingError> {
        let mut preview = self.clone();
        preview.advance_timed_state(logic, &mut NullObserver)?;
        Ok(preview.state)
    }

    /// Start of `state`, if meaningful.
    ///
    /// - Setup has no start.
    /// - Refund has a start only once entered, since two different
    ///   predecessors reach it.
    /// - Past and current states start at the recorded deadline of the
    ///   preceding state.
    /// - Future states start at the current deadline plus the durations of
    ///   every state in between.
    /// - Once in Refund, states skipped on the way there have no start.
    pub fn start_of(&self, state: EtoState) -> Option<Timestamp> {
        match state {
            EtoState::Setup => None,
            EtoState::Refund => {
                if self.state == EtoState::Refund {
                    self.past_times[EtoState::Refund.index()]
                } else {
                    None
                }
            }
            // Entering a state always records its deadline.
            _ if self.state == EtoState::Refund && self.past_times[state.index()].is_none() => None,
            _ => {
                let prev = state.index() - 1;
                if prev <= self.state.index() {
                    return self.past_times[prev];
                }
                let mut start = self.past_times[self.state.index()]?;
                for idx in self.state.index() + 1..state.index() {
                    start = start.plus_secs(self.durations.as_array()[idx]).ok()?;
                }
                Some(start)
            }
        }
    }

    /// [`Self::start_of`] for every state, in index order.
    pub fn start_of_states(&self) -> [Option<Timestamp>; EtoState::COUNT] {
        EtoState::ALL.map(|s| self.start_of(s))
    }

    fn reached(&self, state: EtoState, now: Timestamp) -> bool {
        self.start_of(state).is_some_and(|start| now >= start)
    }

    fn advance_timed_state(
        &mut self,
        logic: &dyn OfferingLogic,
        observer: &mut dyn StateObserver,
    ) -> Result<(), OfferingError> {
        if self.past_times[EtoState::Setup.index()].is_none() {
            return Ok(());
        }
        let now = self.clock.now();
        if self.state == EtoState::Setup && self.reached(EtoState::Whitelist, now) {
            self.transition_to(EtoState::Whitelist, logic, observer)?;
        }
        if self.state == EtoState::Whitelist && self.reached(EtoState::Public, now) {
            self.transition_to(EtoState::Public, logic, observer)?;
        }
        if self.state == EtoState::Public && self.reached(EtoState::Signing, now) {
            self.transition_to(EtoState::Signing, logic, observer)?;
        }
        // Claim is only entered by a signed agreement; running out of
        // signing time means Refund.
        if self.state == EtoState::Signing && self.reached(EtoState::Claim, now) {
            self.transition_to(EtoState::Refund, logic, observer)?;
        }
        if self.state == EtoState::Claim && self.reached(EtoState::Payout, now) {
            self.transition_to(EtoState::Payout, logic, observer)?;
        }
        Ok(())
    }

    fn advance_logic_state(
        &mut self,
        logic: &dyn OfferingLogic,
        observer: &mut dyn StateObserver,
    ) -> Result<(), OfferingError> {
        for _ in 0..EtoState::COUNT {
            match logic.advance_logic_state(self.state) {
                Some(next) if next != self.state => self.transition_to(next, logic, observer)?,
                _ => return Ok(()),
            }
        }
        Ok(())
    }

    fn transition_to(
        &mut self,
        requested: EtoState,
        logic: &dyn OfferingLogic,
        observer: &mut dyn StateObserver,
    ) -> Result<(), OfferingError> {
        let old = self.state;
        let new = logic.before_state_transition(old, requested);
        check_transition(old, new)?;

        let now = self.clock.now();
        let old_deadline = match self.past_times[old.index()] {
            Some(recorded) if recorded < now => recorded,
            _ => now,
        };
        let new_deadline = old_deadline.plus_secs(self.durations.duration(new))?;

        let saved = self.past_times;
        self.past_times[old.index()] = Some(old_deadline);
        self.past_times[new.index()] = Some(new_deadline);
        self.state = new;

        if let Err(err) = observer.on_state_transition(self.address, old, new) {
            self.past_times = saved;
            self.state = old;
            tracing::warn!(offering = %self.address, %old, %new, error = %err, "ETO transition refused by observer");
            return Err(err.into());
        }

        tracing::info!(
            offering = %self.address,
            %old,
            %new,
            deadline = %new_deadline,
            "ETO state transition"
        );
        self.events.push(StateTransitionEvent {
            offering: self.address,
            old,
            new,
            deadline: new_deadline,
            at: now,
        });
        Ok(())
    }
}

fn check_transition(old: EtoState, new: EtoState) -> Result<(), OfferingError> {
    let reason = if old.is_terminal() {
        Some("current state is terminal")
    } else if new.index() <= old.index() {
        Some("transitions only move forward")
    } else if new == EtoState::Claim && old != EtoState::Signing {
        Some("claim is entered only from signing")
    } else if new == EtoState::Payout && old != EtoState::Claim {
        Some("payout is entered only from claim")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(OfferingError::InvalidTransition {
            from: old,
            to: new,
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}
