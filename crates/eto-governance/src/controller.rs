//! # Company Governance Controller
//!
//! Holds the company's lifecycle phase and runs its structural changes as
//! resolutions. It observes the offerings it registered and follows them.
//!
//! ## Phases
//!
//! ```text
//! SETUP ──offering starts──▶ OFFERING ──claim──▶ FUNDED ──close──▶ CLOSING ──▶ CLOSED
//!   ▲                           │                  │  ▲                │
//!   └──────────refund───────────┘                  │  └────cancel──────┘
//!                               ▲                  │
//!                               └──next offering───┘
//! ```
//!
//! A refund returns to FUNDED instead of SETUP when an earlier offering
//! already succeeded.
//!
//! ## Operations
//!
//! | Operation                 | Action                  | Execution  | From          |
//! |---------------------------|-------------------------|------------|---------------|
//! | `start_new_offering`      | RegisterOffer           | atomic     | Setup, Funded |
//! | `enable_transfers`        | ChangeTokenController   | atomic     | Funded        |
//! | `close_company`           | CloseToken              | non-atomic | Funded        |

use std::collections::BTreeMap;
use std::sync::Arc;

use eto_core::{Address, Amount, Clock, ResolutionId};
use eto_state::{EtoState, ObserverError, StateObserver};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::capability::{GeneralInformation, ResolutionHost};
use crate::engine::ResolutionEngine;
use crate::error::GovernanceError;
use crate::escalation::{DefaultPermissionEscalator, EscalationContext, PermissionEscalator};
use crate::event::GovernanceEvent;
use crate::identity::IdentityRegistry;
use crate::resolution::{GovAction, ResolutionExecution, ResolutionRequest, ResolutionState};

// ─── Gov State ──────────────────────────────────────────────────────

/// Lifecycle phase of the company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GovState {
    /// Incorporated, no offering running.
    Setup,
    /// An offering is collecting funds.
    Offering,
    /// At least one offering succeeded.
    Funded,
    /// Winding down.
    Closing,
    /// Closed. Terminal.
    Closed,
}

impl GovState {
    /// Whether this phase is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// The canonical string name of this phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Setup => "SETUP",
            Self::Offering => "OFFERING",
            Self::Funded => "FUNDED",
            Self::Closing => "CLOSING",
            Self::Closed => "CLOSED",
        }
    }
}

impl std::fmt::Display for GovState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the equity token votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingRule {
    /// No voting rights.
    NoVotingRights,
    /// Holders vote; a resolution passes with a positive majority.
    Positive,
    /// Holders vote; a resolution passes unless vetoed.
    Negative,
    /// Holders vote pro rata with other share classes.
    Prorata,
}

impl VotingRule {
    /// Whether holders vote at all.
    pub fn has_voting_rights(&self) -> bool {
        !matches!(self, Self::NoVotingRights)
    }
}

/// Static company terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GovernanceConfig {
    /// Registered name.
    pub company_name: String,
    /// Legal representative.
    pub legal_representative: Address,
    /// Voting rule of the equity token.
    pub voting_rule: VotingRule,
    /// Switch transfers on when an offering succeeds.
    #[serde(default)]
    pub transfers_on_success: bool,
}

// ─── Controller ─────────────────────────────────────────────────────

/// The company's governance controller.
#[derive(Debug)]
pub struct GovernanceController<E: PermissionEscalator = DefaultPermissionEscalator> {
    address: Address,
    config: GovernanceConfig,
    engine: ResolutionEngine,
    escalator: E,
    gov_state: GovState,
    share_capital: Amount,
    transfers_enabled: bool,
    /// Registered offerings and the shares each issues on success.
    offerings: BTreeMap<Address, Amount>,
    funded: bool,
}

impl GovernanceController<DefaultPermissionEscalator> {
    /// A controller in Setup using the default escalation policy.
    pub fn new(address: Address, config: GovernanceConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_escalator(address, config, clock, DefaultPermissionEscalator::new())
    }
}

impl<E: PermissionEscalator> GovernanceController<E> {
    /// A controller in Setup using `escalator`.
    pub fn with_escalator(address: Address, config: GovernanceConfig, clock: Arc<dyn Clock>, escalator: E) -> Self {
        Self {
            address,
            config,
            engine: ResolutionEngine::new(clock),
            escalator,
            gov_state: GovState::Setup,
            share_capital: Amount::ZERO,
            transfers_enabled: false,
            offerings: BTreeMap::new(),
            funded: false,
        }
    }

    /// Address of the controller.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Company terms.
    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    /// The escalation policy.
    pub fn escalator(&self) -> &E {
        &self.escalator
    }

    /// The escalation policy, for recording vote outcomes.
    pub fn escalator_mut(&mut self) -> &mut E {
        &mut self.escalator
    }

    /// The underlying engine.
    pub fn engine(&self) -> &ResolutionEngine {
        &self.engine
    }

    /// Journal.
    pub fn events(&self) -> &[GovernanceEvent] {
        self.engine.events()
    }

    /// Take the journal.
    pub fn drain_events(&mut self) -> Vec<GovernanceEvent> {
        self.engine.drain_events()
    }

    /// Shares the offering at `offering` issues on success.
    pub fn offering_shares(&self, offering: Address) -> Option<Amount> {
        self.offerings.get(&offering).copied()
    }

    fn context(&self) -> EscalationContext {
        EscalationContext {
            gov_state: self.gov_state,
            legal_representative: self.config.legal_representative,
            controller: self.address,
            voting_rights: self.config.voting_rule.has_voting_rights(),
        }
    }

    // ── Resolutions ─────────────────────────────────────────────────

    /// Register `offering`, which issues `new_shares` if it succeeds.
    pub fn start_new_offering(
        &mut self,
        caller: Address,
        resolution_id: ResolutionId,
        document_url: &str,
        offering: Address,
        new_shares: Amount,
    ) -> Result<ResolutionState, GovernanceError> {
        let request = ResolutionRequest::new(resolution_id, GovAction::RegisterOffer, document_url, caller)
            .with_payload(json!({ "offering": offering, "new_shares": new_shares }));
        let gov_state = self.gov_state;
        let registered = self.offerings.contains_key(&offering);
        let validator = move |_: &ResolutionRequest, _: ResolutionState| -> Result<(), String> {
            if !matches!(gov_state, GovState::Setup | GovState::Funded) {
                return Err(format!("cannot register an offering while {gov_state}"));
            }
            if registered {
                return Err(format!("offering {offering} already registered"));
            }
            Ok(())
        };
        let ctx = self.context();
        let offerings = &mut self.offerings;
        let outcome = self.engine.with_atomic_execution(
            &request,
            &validator,
            &self.escalator,
            &ctx,
            |engine, id| -> Result<(), GovernanceError> {
                offerings.insert(offering, new_shares);
                tracing::info!(resolution = %id, %offering, %new_shares, "offering registered");
                engine.record(GovernanceEvent::LogOfferingRegistered {
                    resolution_id: id,
                    offering,
                    new_shares,
                });
                Ok(())
            },
        )?;
        Ok(outcome.state)
    }

    /// Switch equity token transfers on or off.
    pub fn enable_transfers(
        &mut self,
        caller: Address,
        resolution_id: ResolutionId,
        document_url: &str,
        enabled: bool,
    ) -> Result<ResolutionState, GovernanceError> {
        let request = ResolutionRequest::new(resolution_id, GovAction::ChangeTokenController, document_url, caller)
            .with_payload(json!({ "transfers_enabled": enabled }));
        let gov_state = self.gov_state;
        let validator = move |_: &ResolutionRequest, _: ResolutionState| -> Result<(), String> {
            if gov_state != GovState::Funded {
                return Err(format!("transfers cannot change while {gov_state}"));
            }
            Ok(())
        };
        let ctx = self.context();
        let transfers = &mut self.transfers_enabled;
        let outcome = self.engine.with_atomic_execution(
            &request,
            &validator,
            &self.escalator,
            &ctx,
            |engine, id| -> Result<(), GovernanceError> {
                set_transfers(engine, transfers, enabled, Some(id));
                Ok(())
            },
        )?;
        Ok(outcome.state)
    }

    /// Start winding the company down. The resolution stays Executing
    /// until [`Self::complete_company_closing`] or
    /// [`Self::cancel_company_closing`].
    pub fn close_company(
        &mut self,
        caller: Address,
        resolution_id: ResolutionId,
        document_url: &str,
    ) -> Result<ResolutionState, GovernanceError> {
        let request = ResolutionRequest::new(resolution_id, GovAction::CloseToken, document_url, caller);
        let gov_state = self.gov_state;
        let validator = move |_: &ResolutionRequest, state: ResolutionState| -> Result<(), String> {
            let allowed = match state {
                ResolutionState::Executing => matches!(gov_state, GovState::Funded | GovState::Closing),
                _ => gov_state == GovState::Funded,
            };
            if allowed {
                Ok(())
            } else {
                Err(format!("company cannot close while {gov_state}"))
            }
        };
        let ctx = self.context();
        let current = &mut self.gov_state;
        let outcome = self.engine.with_non_atomic_execution(
            &request,
            &validator,
            &self.escalator,
            &ctx,
            |engine, _| -> Result<(), GovernanceError> {
                if *current == GovState::Funded {
                    move_gov_state(engine, current, GovState::Closing);
                }
                Ok(())
            },
        )?;
        Ok(outcome.state)
    }

    /// Closing → Closed; completes the closing resolution.
    pub fn complete_company_closing(
        &mut self,
        caller: Address,
        resolution_id: ResolutionId,
    ) -> Result<(), GovernanceError> {
        self.check_closing(caller, resolution_id)?;
        self.engine.complete_resolution(resolution_id)?;
        move_gov_state(&mut self.engine, &mut self.gov_state, GovState::Closed);
        Ok(())
    }

    /// Closing → Funded; cancels the closing resolution.
    pub fn cancel_company_closing(
        &mut self,
        caller: Address,
        resolution_id: ResolutionId,
    ) -> Result<(), GovernanceError> {
        self.check_closing(caller, resolution_id)?;
        self.engine.cancel_resolution(resolution_id)?;
        move_gov_state(&mut self.engine, &mut self.gov_state, GovState::Funded);
        Ok(())
    }

    fn check_closing(&self, caller: Address, resolution_id: ResolutionId) -> Result<(), GovernanceError> {
        if caller != self.config.legal_representative {
            return Err(GovernanceError::NotLegalRepresentative { caller });
        }
        let record = self
            .engine
            .resolution(resolution_id)
            .ok_or(GovernanceError::ResolutionNotFound { resolution_id })?;
        if record.action != GovAction::CloseToken {
            return Err(GovernanceError::ActionMismatch {
                resolution_id,
                bound: record.action,
                requested: GovAction::CloseToken,
            });
        }
        if record.state != ResolutionState::Executing {
            return Err(GovernanceError::WrongResolutionState {
                resolution_id,
                expected: ResolutionState::Executing,
                actual: record.state,
            });
        }
        if self.gov_state != GovState::Closing {
            return Err(GovernanceError::WrongGovState {
                op: "finish closing",
                state: self.gov_state,
            });
        }
        Ok(())
    }

    // ── Transfers ───────────────────────────────────────────────────

    /// Whether an equity token transfer from `from` to `to` may proceed.
    /// Both parties must be KYC'd independently.
    pub fn is_transfer_allowed(&self, from: Address, to: Address, identity: &dyn IdentityRegistry) -> bool {
        self.transfers_enabled && identity.is_kyc_verified(from) && identity.is_kyc_verified(to)
    }

    // ── Offering notifications ──────────────────────────────────────

    fn handle_offering_transition(
        &mut self,
        offering: Address,
        old: EtoState,
        new: EtoState,
    ) -> Result<(), GovernanceError> {
        let new_shares = self
            .offerings
            .get(&offering)
            .copied()
            .ok_or(GovernanceError::UnknownOffering { offering })?;
        tracing::debug!(%offering, %old, %new, gov_state = %self.gov_state, "offering transition");

        match new {
            EtoState::Whitelist | EtoState::Public => match self.gov_state {
                GovState::Setup | GovState::Funded => {
                    move_gov_state(&mut self.engine, &mut self.gov_state, GovState::Offering);
                }
                GovState::Offering => {}
                other => {
                    return Err(GovernanceError::WrongGovState {
                        op: "offering start",
                        state: other,
                    })
                }
            },
            EtoState::Claim => {
                self.require_offering_phase("offering success")?;
                let capital = self.share_capital.checked_add(new_shares)?;
                self.share_capital = capital;
                self.funded = true;
                move_gov_state(&mut self.engine, &mut self.gov_state, GovState::Funded);
                if self.config.transfers_on_success && !self.transfers_enabled {
                    set_transfers(&mut self.engine, &mut self.transfers_enabled, true, None);
                }
            }
            EtoState::Refund => {
                self.require_offering_phase("offering refund")?;
                let back = if self.funded { GovState::Funded } else { GovState::Setup };
                move_gov_state(&mut self.engine, &mut self.gov_state, back);
            }
            EtoState::Setup | EtoState::Signing | EtoState::Payout => {}
        }
        Ok(())
    }

    fn require_offering_phase(&self, op: &'static str) -> Result<(), GovernanceError> {
        if self.gov_state == GovState::Offering {
            Ok(())
        } else {
            Err(GovernanceError::WrongGovState {
                op,
                state: self.gov_state,
            })
        }
    }
}

fn move_gov_state(engine: &mut ResolutionEngine, state: &mut GovState, new: GovState) {
    let old = *state;
    *state = new;
    let at = engine.now();
    tracing::info!(%old, %new, "company state transition");
    engine.record(GovernanceEvent::LogGovStateTransition { old, new, at });
}

fn set_transfers(engine: &mut ResolutionEngine, transfers: &mut bool, enabled: bool, resolution_id: Option<ResolutionId>) {
    *transfers = enabled;
    tracing::info!(enabled, "equity token transfers switched");
    engine.record(GovernanceEvent::LogTransfersStateChanged { resolution_id, enabled });
}

impl<E: PermissionEscalator> StateObserver for GovernanceController<E> {
    fn on_state_transition(&mut self, offering: Address, old: EtoState, new: EtoState) -> Result<(), ObserverError> {
        self.handle_offering_transition(offering, old, new).map_err(|err| {
            tracing::warn!(%offering, %old, %new, error = %err, "offering transition refused");
            ObserverError {
                old,
                new,
                reason: err.to_string(),
            }
        })
    }
}

impl<E: PermissionEscalator> ResolutionHost for GovernanceController<E> {
    fn resolution(&self, resolution_id: ResolutionId) -> Option<&ResolutionExecution> {
        self.engine.resolution(resolution_id)
    }

    fn resolution_ids(&self) -> &[ResolutionId] {
        self.engine.resolution_ids()
    }

    fn resolutions_in_state(&self, state: ResolutionState) -> Vec<ResolutionId> {
        self.engine.resolutions_in_state(state)
    }
}

impl<E: PermissionEscalator> GeneralInformation for GovernanceController<E> {
    fn company_name(&self) -> &str {
        &self.config.company_name
    }

    fn legal_representative(&self) -> Address {
        self.config.legal_representative
    }

    fn gov_state(&self) -> GovState {
        self.gov_state
    }

    fn share_capital(&self) -> Amount {
        self.share_capital
    }

    fn transfers_enabled(&self) -> bool {
        self.transfers_enabled
    }

    fn offerings(&self) -> Vec<Address> {
        self.offerings.keys().copied().collect()
    }
}
