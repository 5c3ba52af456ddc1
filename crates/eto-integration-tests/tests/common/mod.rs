//! Shared deployment fixture: one company, one offering, one locked
//! account, wired the way a production deployment wires them.
//!
//! The offering contract is both the state machine's address and the
//! locked account's controller. The company's governance controller
//! observes every offering transition.

#![allow(dead_code)]

use std::sync::Arc;

use eto_core::{Address, Amount, DecimalFraction, ManualClock, ResolutionId, Role, RoleBasedAccessPolicy, Timestamp};
use eto_governance::{GovernanceConfig, GovernanceController, ResolutionState, VotingRule};
use eto_ledger::{AssetToken, LedgerError, LockedAccount, LockedAccountConfig, TokenLedger};
use eto_state::{
    DurationTerms, EtoState, EtoTimedStateMachine, OfferingError, StateDurationTable, ThresholdOfferingLogic,
};

pub const T0: u64 = 1_700_000_000;
pub const DAY: u64 = 86_400;
pub const LOCK_PERIOD: u64 = 18 * 30 * DAY;
pub const NEW_SHARES: u128 = 10_000;

/// Offering starts one day after T0.
pub const START: u64 = DAY;
pub const PUBLIC_START: u64 = START + 7 * DAY;
pub const SIGNING_START: u64 = PUBLIC_START + 14 * DAY;

pub fn a(label: &str) -> Address {
    Address::derive(label)
}

pub fn amt(v: u128) -> Amount {
    Amount::new(v)
}

pub fn ts(secs_after_t0: u64) -> Timestamp {
    Timestamp::from_epoch_secs(T0 + secs_after_t0).unwrap()
}

pub fn rep() -> Address {
    a("legal-rep")
}

pub fn admin() -> Address {
    a("platform-admin")
}

pub fn pool() -> Address {
    a("platform-pool")
}

pub fn durations() -> DurationTerms {
    DurationTerms {
        whitelist_secs: 7 * DAY,
        public_secs: 14 * DAY,
        signing_secs: 14 * DAY,
        claim_secs: 10 * DAY,
    }
}

pub fn governance_config(voting_rule: VotingRule) -> GovernanceConfig {
    GovernanceConfig {
        company_name: "Acme GmbH".to_string(),
        legal_representative: rep(),
        voting_rule,
        transfers_on_success: true,
    }
}

pub fn locked_config(label: &str) -> LockedAccountConfig {
    LockedAccountConfig {
        address: a(label),
        asset_token: a("euro-token"),
        neumark_token: a("neumark"),
        lock_period_secs: LOCK_PERIOD,
        penalty_fraction: DecimalFraction::from_percent(10).unwrap(),
        penalty_disbursal_address: pool(),
    }
}

pub fn access_policy() -> Arc<RoleBasedAccessPolicy> {
    Arc::new(
        RoleBasedAccessPolicy::new()
            .with_global(admin(), Role::LockedAccountAdmin)
            .with_global(admin(), Role::Reclaimer),
    )
}

/// Either half of an investment can fail.
#[derive(Debug)]
pub enum ScenarioError {
    Offering(OfferingError),
    Ledger(LedgerError),
}

impl From<OfferingError> for ScenarioError {
    fn from(err: OfferingError) -> Self {
        Self::Offering(err)
    }
}

impl From<LedgerError> for ScenarioError {
    fn from(err: LedgerError) -> Self {
        Self::Ledger(err)
    }
}

pub struct Deployment {
    pub clock: Arc<ManualClock>,
    pub asset: TokenLedger,
    pub neumark: TokenLedger,
    pub locked: LockedAccount,
    pub offering: EtoTimedStateMachine,
    pub logic: ThresholdOfferingLogic,
    pub company: GovernanceController,
}

impl Deployment {
    /// Everything deployed and the offering registered with the company,
    /// but not yet scheduled.
    pub fn new(min_cap: u128, max_cap: u128) -> Self {
        Self::with_voting_rule(min_cap, max_cap, VotingRule::NoVotingRights)
    }

    /// [`Self::new`] for a company whose shareholders vote.
    pub fn with_voting_rule(min_cap: u128, max_cap: u128, voting_rule: VotingRule) -> Self {
        let clock = Arc::new(ManualClock::new(ts(0)));
        let offering_address = a("eto");

        let mut asset = TokenLedger::new(a("euro-token"), "EUR-T");
        asset.mint(offering_address, amt(1_000_000_000)).unwrap();
        let neumark = TokenLedger::new(a("neumark"), "NEU");

        let mut locked = LockedAccount::new(locked_config("icbm"), clock.clone(), access_policy()).unwrap();
        locked.set_controller(admin(), offering_address).unwrap();

        let offering = EtoTimedStateMachine::new(
            offering_address,
            StateDurationTable::from_terms(&durations()),
            clock.clone(),
        );

        let mut company = GovernanceController::new(a("company"), governance_config(voting_rule), clock.clone());
        let state = company
            .start_new_offering(
                rep(),
                ResolutionId::from_label("register-eto"),
                "ipfs:offering-terms",
                offering_address,
                amt(NEW_SHARES),
            )
            .unwrap();
        assert_eq!(state, ResolutionState::Completed);

        Self {
            clock,
            asset,
            neumark,
            locked,
            offering,
            logic: ThresholdOfferingLogic::new(amt(min_cap), amt(max_cap)),
            company,
        }
    }

    pub fn offering_address(&self) -> Address {
        self.offering.address()
    }

    /// Schedule the offering to start at `START`.
    pub fn schedule(&mut self) -> Result<(), OfferingError> {
        self.offering.set_start_date(ts(START), &self.logic, &mut self.company)
    }

    /// Move the clock and apply whatever time-induced transitions follow.
    pub fn at(&mut self, secs_after_t0: u64) -> Result<EtoState, OfferingError> {
        self.clock.set(ts(secs_after_t0));
        self.offering.handle_state_transitions(&self.logic, &mut self.company)?;
        Ok(self.offering.state())
    }

    /// Accept a ticket and lock it for `investor`, rewarding twice the
    /// ticket in neumarks.
    pub fn invest(&mut self, investor: &str, ticket: u128) -> Result<(), ScenarioError> {
        let investor = a(investor);
        let ticket = amt(ticket);
        let neumarks = amt(ticket.value() * 2);
        let offering_address = self.offering.address();
        let Self {
            offering,
            logic,
            company,
            locked,
            asset,
            neumark,
            ..
        } = self;
        offering.with_state_transition(logic, company, |state, logic| -> Result<(), ScenarioError> {
            logic.invest(state, ticket)?;
            asset
                .approve(offering_address, locked.address(), ticket)
                .map_err(LedgerError::from)?;
            locked.lock(offering_address, investor, ticket, neumarks, asset)?;
            neumark.mint(investor, neumarks).map_err(LedgerError::from)?;
            Ok(())
        })
    }

    /// Record the signed investment agreement.
    pub fn sign(&mut self) -> Result<(), OfferingError> {
        self.offering
            .with_state_transition(&mut self.logic, &mut self.company, |state, logic| logic.sign_agreement(state))
    }

    /// Approve exactly the neumarks `investor` owes the locked account.
    pub fn approve_burn(&mut self, investor: &str) {
        let due = self.locked.account(a(investor)).neumarks_due;
        self.neumark.approve(a(investor), self.locked.address(), due).unwrap();
    }

    pub fn unlock(&mut self, investor: &str) -> Result<(), LedgerError> {
        self.locked.unlock(a(investor), a(investor), &mut self.neumark, &mut self.asset)
    }

    /// A company funded by alice (600) and bob (500), with the locked
    /// account accepting unlocks. The clock stands at `SIGNING_START`.
    pub fn funded(voting_rule: VotingRule) -> Self {
        let mut d = Self::with_voting_rule(1_000, 100_000, voting_rule);
        d.schedule().unwrap();
        d.at(START).unwrap();
        d.invest("alice", 600).unwrap();
        d.at(PUBLIC_START).unwrap();
        d.invest("bob", 500).unwrap();
        d.at(SIGNING_START).unwrap();
        d.sign().unwrap();
        assert_eq!(d.offering.state(), EtoState::Claim);
        let controller = d.offering_address();
        d.locked.controller_succeeded(controller).unwrap();
        d
    }

    /// Ledger bookkeeping and custody both hold.
    pub fn assert_consistent(&self) {
        self.locked.check_invariants().unwrap();
        self.locked.check_custody(&self.asset).unwrap();
    }
}
