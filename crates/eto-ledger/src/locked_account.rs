//! # Locked Account
//!
//! Per-investor ledger of capital locked for a fixed period in exchange for
//! neumarks.
//!
//! ## Lock States
//!
//! - **Uncontrolled**: deployed, no controller yet.
//! - **AcceptingLocks**: the controller (an offering) locks investor
//!   tickets.
//! - **AcceptingUnlocks**: the controller succeeded. Investors unlock by
//!   returning exactly the neumarks issued; unlocking before the unlock
//!   date forfeits a penalty.
//! - **ReleaseAll**: the controller failed. Investors get their full
//!   ticket back and keep their neumarks.
//!
//! ## Atomicity
//!
//! Every operation checks all preconditions, including those of the token
//! effects it is about to cause, before touching its own tables. Where a
//! call makes several token effects, bookkeeping is updated first and
//! restored if an effect still fails.

use std::collections::BTreeMap;
use std::sync::Arc;

use eto_core::{AccessPolicy, Address, Amount, Clock, CoreError, DecimalFraction, Role, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::event::LedgerEvent;
use crate::migration::{MigrationRecord, MigrationTarget};
use crate::token::{ApprovalReceiver, AssetToken, NeumarkToken};

// ─── Lock State ─────────────────────────────────────────────────────

/// Lifecycle of a locked account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockState {
    /// No controller attached.
    Uncontrolled,
    /// Controller may lock tickets.
    AcceptingLocks,
    /// Controller succeeded; investors unlock against neumarks.
    AcceptingUnlocks,
    /// Controller failed; everything is released without burn.
    ReleaseAll,
}

impl LockState {
    /// Uppercase name used in logs and errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uncontrolled => "UNCONTROLLED",
            Self::AcceptingLocks => "ACCEPTING_LOCKS",
            Self::AcceptingUnlocks => "ACCEPTING_UNLOCKS",
            Self::ReleaseAll => "RELEASE_ALL",
        }
    }
}

impl std::fmt::Display for LockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Account ────────────────────────────────────────────────────────

/// One investor's position. The three fields are all set or all empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Capital in custody.
    pub locked_amount: Amount,
    /// Neumarks to burn on unlock.
    pub neumarks_due: Amount,
    /// Earliest penalty-free unlock.
    pub unlock_date: Option<Timestamp>,
}

impl Account {
    /// Whether the investor has no position.
    pub fn is_empty(&self) -> bool {
        self.unlock_date.is_none()
    }

    /// This position plus another, keeping the earlier unlock date.
    fn merged(
        &self,
        amount: Amount,
        neumarks: Amount,
        unlock_date: Timestamp,
    ) -> Result<Account, CoreError> {
        Ok(Account {
            locked_amount: self.locked_amount.checked_add(amount)?,
            neumarks_due: self.neumarks_due.checked_add(neumarks)?,
            unlock_date: Some(self.unlock_date.map_or(unlock_date, |d| d.min(unlock_date))),
        })
    }
}

// ─── Configuration ──────────────────────────────────────────────────

/// Deployment parameters of a locked account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LockedAccountConfig {
    /// Address of this account.
    pub address: Address,
    /// The token held in custody.
    pub asset_token: Address,
    /// The token burned on unlock.
    pub neumark_token: Address,
    /// Seconds from first lock to penalty-free unlock.
    pub lock_period_secs: u64,
    /// Share of the ticket forfeited on early unlock.
    pub penalty_fraction: DecimalFraction,
    /// Receiver of penalties.
    pub penalty_disbursal_address: Address,
}

// ─── Locked Account ─────────────────────────────────────────────────

/// The lock / unlock / migrate engine.
#[derive(Debug)]
pub struct LockedAccount {
    config: LockedAccountConfig,
    clock: Arc<dyn Clock>,
    access: Arc<dyn AccessPolicy>,
    state: LockState,
    controller: Option<Address>,
    accounts: BTreeMap<Address, Account>,
    total_locked: Amount,
    total_investors: u64,
    migration: MigrationRecord,
    events: Vec<LedgerEvent>,
}

impl LockedAccount {
    /// A new account in Uncontrolled.
    pub fn new(
        config: LockedAccountConfig,
        clock: Arc<dyn Clock>,
        access: Arc<dyn AccessPolicy>,
    ) -> Result<Self, LedgerError> {
        if config.penalty_disbursal_address.is_zero() {
            return Err(LedgerError::MissingDisbursalAddress);
        }
        Ok(Self {
            config,
            clock,
            access,
            state: LockState::Uncontrolled,
            controller: None,
            accounts: BTreeMap::new(),
            total_locked: Amount::ZERO,
            total_investors: 0,
            migration: MigrationRecord::default(),
            events: Vec::new(),
        })
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Address of this account.
    pub fn address(&self) -> Address {
        self.config.address
    }

    /// Deployment parameters.
    pub fn config(&self) -> &LockedAccountConfig {
        &self.config
    }

    /// The position of `investor`; empty if none.
    pub fn account(&self, investor: Address) -> Account {
        self.accounts.get(&investor).copied().unwrap_or_default()
    }

    /// Every non-empty position.
    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &Account)> {
        self.accounts.iter()
    }

    /// Sum of locked amounts.
    pub fn total_locked_amount(&self) -> Amount {
        self.total_locked
    }

    /// Number of non-empty positions.
    pub fn total_investors(&self) -> u64 {
        self.total_investors
    }

    /// Current lock state.
    pub fn lock_state(&self) -> LockState {
        self.state
    }

    /// The controller, once attached.
    pub fn controller(&self) -> Option<Address> {
        self.controller
    }

    /// Early-unlock penalty.
    pub fn penalty_fraction(&self) -> DecimalFraction {
        self.config.penalty_fraction
    }

    /// Penalty receiver.
    pub fn penalty_disbursal_address(&self) -> Address {
        self.config.penalty_disbursal_address
    }

    /// Lock period in seconds.
    pub fn lock_period_secs(&self) -> u64 {
        self.config.lock_period_secs
    }

    /// Migration pointers.
    pub fn migration(&self) -> MigrationRecord {
        self.migration
    }

    /// Journal.
    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Take the journal.
    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Recompute both aggregates from the account table and compare.
    pub fn check_invariants(&self) -> Result<(), LedgerError> {
        let mut sum = Amount::ZERO;
        for (investor, account) in &self.accounts {
            if account.is_empty() || account.locked_amount.is_zero() || account.neumarks_due.is_zero() {
                return Err(LedgerError::InvariantViolated(format!(
                    "partial position for {investor}: {account:?}"
                )));
            }
            sum = sum.checked_add(account.locked_amount)?;
        }
        if sum != self.total_locked {
            return Err(LedgerError::InvariantViolated(format!(
                "total locked {} != sum of accounts {sum}",
                self.total_locked
            )));
        }
        if self.accounts.len() as u64 != self.total_investors {
            return Err(LedgerError::InvariantViolated(format!(
                "total investors {} != {} positions",
                self.total_investors,
                self.accounts.len()
            )));
        }
        Ok(())
    }

    /// Whether custody covers everything owed.
    pub fn check_custody(&self, asset: &dyn AssetToken) -> Result<(), LedgerError> {
        let available = asset.balance_of(self.config.address);
        if available < self.total_locked {
            return Err(LedgerError::CustodyShortfall {
                needed: self.total_locked,
                available,
            });
        }
        Ok(())
    }

    // ── Controller lifecycle ────────────────────────────────────────

    /// Attach the controller: Uncontrolled → AcceptingLocks.
    pub fn set_controller(&mut self, caller: Address, controller: Address) -> Result<(), LedgerError> {
        self.require_role(caller, Role::LockedAccountAdmin)?;
        self.require_state("set_controller", &[LockState::Uncontrolled])?;
        self.controller = Some(controller);
        self.transition(LockState::AcceptingLocks);
        Ok(())
    }

    /// Controller reports success: AcceptingLocks → AcceptingUnlocks.
    pub fn controller_succeeded(&mut self, caller: Address) -> Result<(), LedgerError> {
        self.require_controller(caller)?;
        self.require_state("controller_succeeded", &[LockState::AcceptingLocks])?;
        self.transition(LockState::AcceptingUnlocks);
        Ok(())
    }

    /// Controller reports failure: AcceptingLocks → ReleaseAll.
    pub fn controller_failed(&mut self, caller: Address) -> Result<(), LedgerError> {
        self.require_controller(caller)?;
        self.require_state("controller_failed", &[LockState::AcceptingLocks])?;
        self.transition(LockState::ReleaseAll);
        Ok(())
    }

    // ── Lock ────────────────────────────────────────────────────────

    /// Lock `ticket` for `investor`, pulled from the controller's allowance.
    ///
    /// A repeat lock adds to the position but never moves its unlock date
    /// later.
    pub fn lock(
        &mut self,
        caller: Address,
        investor: Address,
        ticket: Amount,
        neumarks: Amount,
        asset: &mut dyn AssetToken,
    ) -> Result<(), LedgerError> {
        self.require_state("lock", &[LockState::AcceptingLocks])?;
        self.require_controller(caller)?;
        self.require_asset(asset)?;
        if ticket.is_zero() {
            return Err(LedgerError::ZeroAmount { what: "ticket" });
        }
        if neumarks.is_zero() {
            return Err(LedgerError::ZeroAmount { what: "neumarks" });
        }

        let unlock_date = self.clock.now().plus_secs(self.config.lock_period_secs)?;
        let existing = self.account(investor);
        let updated = existing.merged(ticket, neumarks, unlock_date)?;
        let total_locked = self.total_locked.checked_add(ticket)?;
        let total_investors = self.investors_after_insert(&existing)?;

        asset.transfer_from(self.config.address, caller, self.config.address, ticket)?;

        self.accounts.insert(investor, updated);
        self.total_locked = total_locked;
        self.total_investors = total_investors;
        tracing::info!(account = %self.config.address, %investor, %ticket, %neumarks, "funds locked");
        self.events.push(LedgerEvent::FundsLocked {
            investor,
            amount: ticket,
            neumarks,
        });
        Ok(())
    }

    // ── Unlock ──────────────────────────────────────────────────────

    /// Release `investor`'s position. Only the investor may call.
    ///
    /// In AcceptingUnlocks the investor's neumark allowance to this account
    /// and their neumark balance must both equal the neumarks due; those
    /// are burned and a penalty applies before the unlock date. In
    /// ReleaseAll the full ticket is returned and nothing is burned. An
    /// empty position is a no-op.
    pub fn unlock(
        &mut self,
        caller: Address,
        investor: Address,
        neumark: &mut dyn NeumarkToken,
        asset: &mut dyn AssetToken,
    ) -> Result<(), LedgerError> {
        require_investor(caller, investor)?;
        self.require_state("unlock", &[LockState::AcceptingUnlocks, LockState::ReleaseAll])?;
        self.require_asset(asset)?;
        self.require_neumark(neumark)?;

        let account = self.account(investor);
        let Some(unlock_date) = account.unlock_date else {
            tracing::debug!(account = %self.config.address, %investor, "unlock of empty position ignored");
            return Ok(());
        };
        self.require_custody(asset, account.locked_amount)?;

        if self.state == LockState::ReleaseAll {
            return self.release(investor, account, asset);
        }

        let due = account.neumarks_due;
        let allowance = neumark.allowance(investor, self.config.address);
        if allowance != due {
            return Err(LedgerError::NeumarkAllowanceMismatch {
                investor,
                expected: due,
                actual: allowance,
            });
        }
        let held = neumark.balance_of(investor);
        if held != due {
            return Err(LedgerError::NeumarkBalanceMismatch {
                investor,
                expected: due,
                actual: held,
            });
        }

        let penalty = if self.clock.now() >= unlock_date {
            Amount::ZERO
        } else {
            self.config.penalty_fraction.apply_floor(account.locked_amount)
        };
        let returned = account.locked_amount.checked_sub(penalty)?;
        let disbursal = self.config.penalty_disbursal_address;
        if !penalty.is_zero() && !asset.accepts_callbacks(disbursal) {
            return Err(LedgerError::RecipientRejectsCallback { recipient: disbursal });
        }
        if !returned.is_zero() && !asset.accepts_callbacks(investor) {
            return Err(LedgerError::RecipientRejectsCallback { recipient: investor });
        }

        let saved = (self.total_locked, self.total_investors);
        self.remove_position(investor, &account)?;
        if let Err(err) = self.pay_out(investor, &account, penalty, returned, neumark, asset) {
            self.restore_position(investor, account, saved);
            return Err(err);
        }

        tracing::info!(
            account = %self.config.address,
            %investor,
            %returned,
            %penalty,
            burned = %due,
            "funds unlocked"
        );
        self.events.push(LedgerEvent::NeumarksBurned {
            owner: investor,
            asset_amount: account.locked_amount,
            neumark_amount: due,
        });
        if !penalty.is_zero() {
            self.events.push(LedgerEvent::PenaltyDisbursed {
                disbursal,
                amount: penalty,
                asset: self.config.asset_token,
                investor,
            });
        }
        self.events.push(LedgerEvent::FundsUnlocked {
            investor,
            amount: returned,
            neumarks_burned: due,
        });
        Ok(())
    }

    fn release(
        &mut self,
        investor: Address,
        account: Account,
        asset: &mut dyn AssetToken,
    ) -> Result<(), LedgerError> {
        if !asset.accepts_callbacks(investor) {
            return Err(LedgerError::RecipientRejectsCallback { recipient: investor });
        }
        let saved = (self.total_locked, self.total_investors);
        self.remove_position(investor, &account)?;
        if let Err(err) = asset.transfer(self.config.address, investor, account.locked_amount) {
            self.restore_position(investor, account, saved);
            return Err(err.into());
        }
        tracing::info!(account = %self.config.address, %investor, amount = %account.locked_amount, "funds released");
        self.events.push(LedgerEvent::FundsUnlocked {
            investor,
            amount: account.locked_amount,
            neumarks_burned: Amount::ZERO,
        });
        Ok(())
    }

    /// Pull the neumarks, pay the asset out, then burn. A failing step
    /// undoes the ones before it.
    fn pay_out(
        &self,
        investor: Address,
        account: &Account,
        penalty: Amount,
        returned: Amount,
        neumark: &mut dyn NeumarkToken,
        asset: &mut dyn AssetToken,
    ) -> Result<(), LedgerError> {
        let me = self.config.address;
        let due = account.neumarks_due;
        neumark.transfer_from(me, investor, me, due)?;

        let paid = match self.pay_asset(investor, penalty, returned, asset) {
            Ok(paid) => paid,
            Err(err) => {
                self.return_neumarks(investor, due, neumark);
                return Err(err);
            }
        };
        if let Err(err) = neumark.burn(me, due) {
            for (to, amount) in paid.into_iter().rev() {
                if let Err(comp) = asset.transfer(to, me, amount) {
                    tracing::error!(account = %me, %to, %amount, error = %comp, "asset clawback after failed burn failed");
                }
            }
            self.return_neumarks(investor, due, neumark);
            return Err(err.into());
        }
        Ok(())
    }

    /// Penalty first, then the remainder. Returns the transfers made.
    fn pay_asset(
        &self,
        investor: Address,
        penalty: Amount,
        returned: Amount,
        asset: &mut dyn AssetToken,
    ) -> Result<Vec<(Address, Amount)>, LedgerError> {
        let me = self.config.address;
        let mut paid = Vec::with_capacity(2);
        for (to, amount) in [(self.config.penalty_disbursal_address, penalty), (investor, returned)] {
            if amount.is_zero() {
                continue;
            }
            if let Err(err) = asset.transfer(me, to, amount) {
                for (back, undo) in paid.into_iter().rev() {
                    if let Err(comp) = asset.transfer(back, me, undo) {
                        tracing::error!(account = %me, to = %back, amount = %undo, error = %comp, "penalty clawback failed");
                    }
                }
                return Err(err.into());
            }
            paid.push((to, amount));
        }
        Ok(paid)
    }

    /// Give pulled neumarks back together with the allowance they consumed.
    fn return_neumarks(&self, investor: Address, due: Amount, neumark: &mut dyn NeumarkToken) {
        let me = self.config.address;
        let restored = neumark
            .transfer(me, investor, due)
            .and_then(|()| neumark.approve(investor, me, due));
        if let Err(err) = restored {
            tracing::error!(account = %me, %investor, %due, error = %err, "neumark return after failed unlock failed");
        }
    }

    // ── Migration ───────────────────────────────────────────────────

    /// Register the ledger this account accepts migrations from. Once.
    pub fn set_migration_source(&mut self, caller: Address, source: Address) -> Result<(), LedgerError> {
        self.require_role(caller, Role::LockedAccountAdmin)?;
        self.migration.set_source(source)?;
        tracing::info!(account = %self.config.address, %source, "migration source set");
        self.events.push(LedgerEvent::MigrationSourceSet { source });
        Ok(())
    }

    /// Allow investors to migrate to `target`. Once; never in ReleaseAll;
    /// `target` must already name this account as its source.
    pub fn enable_migration(&mut self, caller: Address, target: &dyn MigrationTarget) -> Result<(), LedgerError> {
        self.require_role(caller, Role::LockedAccountAdmin)?;
        if self.state == LockState::ReleaseAll {
            return Err(LedgerError::WrongState {
                op: "enable_migration",
                state: self.state,
            });
        }
        if let Some(existing) = self.migration.target {
            return Err(LedgerError::MigrationAlreadyEnabled { target: existing });
        }
        let named = target.current_migration_source();
        if named != Some(self.config.address) {
            tracing::warn!(
                account = %self.config.address,
                target = %target.target_address(),
                "migration target does not name this account as its source"
            );
            return Err(LedgerError::MigrationHandshake {
                expected: self.config.address,
                actual: named,
            });
        }
        let target_address = target.target_address();
        self.migration.set_target(target_address)?;
        tracing::info!(account = %self.config.address, target = %target_address, "migration enabled");
        self.events.push(LedgerEvent::MigrationEnabled { target: target_address });
        Ok(())
    }

    /// Move `investor`'s position and its custody to the migration target.
    /// Only the investor may call. An empty position is a no-op.
    pub fn migrate(
        &mut self,
        caller: Address,
        investor: Address,
        target: &mut dyn MigrationTarget,
        asset: &mut dyn AssetToken,
    ) -> Result<(), LedgerError> {
        require_investor(caller, investor)?;
        let enabled = self.migration.target.ok_or(LedgerError::MigrationNotEnabled)?;
        if target.target_address() != enabled {
            return Err(LedgerError::WrongMigrationTarget {
                expected: enabled,
                actual: target.target_address(),
            });
        }
        self.require_state("migrate", &[LockState::AcceptingLocks, LockState::AcceptingUnlocks])?;
        self.require_asset(asset)?;

        let account = self.account(investor);
        let Some(unlock_date) = account.unlock_date else {
            tracing::debug!(account = %self.config.address, %investor, "migration of empty position ignored");
            return Ok(());
        };
        self.require_custody(asset, account.locked_amount)?;
        if !asset.accepts_callbacks(enabled) {
            return Err(LedgerError::RecipientRejectsCallback { recipient: enabled });
        }

        let me = self.config.address;
        let saved = (self.total_locked, self.total_investors);
        self.remove_position(investor, &account)?;
        if let Err(err) = asset.transfer(me, enabled, account.locked_amount) {
            self.restore_position(investor, account, saved);
            return Err(err.into());
        }
        if let Err(err) = target.migrate_investor(
            me,
            investor,
            account.locked_amount,
            account.neumarks_due,
            unlock_date,
        ) {
            if let Err(comp) = asset.transfer(enabled, me, account.locked_amount) {
                tracing::error!(account = %me, target = %enabled, error = %comp, "custody return after refused migration failed");
            }
            self.restore_position(investor, account, saved);
            return Err(err);
        }

        tracing::info!(
            account = %me,
            target = %enabled,
            %investor,
            amount = %account.locked_amount,
            "investor migrated"
        );
        self.events.push(LedgerEvent::InvestorMigrated {
            investor,
            amount: account.locked_amount,
            neumarks: account.neumarks_due,
            unlock_date,
        });
        Ok(())
    }

    // ── Reclaim ─────────────────────────────────────────────────────

    /// Send this account's whole balance of a stray token to `caller`.
    /// The locked asset itself can never be reclaimed.
    pub fn reclaim(&mut self, caller: Address, token: &mut dyn AssetToken) -> Result<Amount, LedgerError> {
        self.require_role(caller, Role::Reclaimer)?;
        let token_address = token.token_address();
        if token_address == self.config.asset_token {
            return Err(LedgerError::ReclaimAssetToken);
        }
        let amount = token.balance_of(self.config.address);
        if !amount.is_zero() {
            token.transfer(self.config.address, caller, amount)?;
        }
        tracing::info!(account = %self.config.address, token = %token_address, %amount, "tokens reclaimed");
        self.events.push(LedgerEvent::Reclaimed {
            token: token_address,
            to: caller,
            amount,
        });
        Ok(amount)
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn require_role(&self, caller: Address, role: Role) -> Result<(), LedgerError> {
        if self.access.allowed(caller, role, self.config.address) {
            Ok(())
        } else {
            Err(LedgerError::AccessDenied { caller, role })
        }
    }

    fn require_controller(&self, caller: Address) -> Result<(), LedgerError> {
        if self.controller == Some(caller) {
            Ok(())
        } else {
            Err(LedgerError::NotController { caller })
        }
    }

    fn require_state(&self, op: &'static str, allowed: &[LockState]) -> Result<(), LedgerError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(LedgerError::WrongState { op, state: self.state })
        }
    }

    fn require_asset(&self, asset: &dyn AssetToken) -> Result<(), LedgerError> {
        require_token(self.config.asset_token, asset.token_address())
    }

    fn require_neumark(&self, neumark: &dyn NeumarkToken) -> Result<(), LedgerError> {
        require_token(self.config.neumark_token, neumark.token_address())
    }

    fn require_custody(&self, asset: &dyn AssetToken, needed: Amount) -> Result<(), LedgerError> {
        let available = asset.balance_of(self.config.address);
        if available < needed {
            return Err(LedgerError::CustodyShortfall { needed, available });
        }
        Ok(())
    }

    fn investors_after_insert(&self, existing: &Account) -> Result<u64, LedgerError> {
        if existing.is_empty() {
            self.total_investors
                .checked_add(1)
                .ok_or(LedgerError::Core(CoreError::Overflow { op: "investor count" }))
        } else {
            Ok(self.total_investors)
        }
    }

    fn remove_position(&mut self, investor: Address, account: &Account) -> Result<(), LedgerError> {
        let total_locked = self.total_locked.checked_sub(account.locked_amount)?;
        let total_investors = self
            .total_investors
            .checked_sub(1)
            .ok_or(LedgerError::Core(CoreError::Underflow { op: "investor count" }))?;
        self.accounts.remove(&investor);
        self.total_locked = total_locked;
        self.total_investors = total_investors;
        Ok(())
    }

    fn restore_position(&mut self, investor: Address, account: Account, saved: (Amount, u64)) {
        self.accounts.insert(investor, account);
        self.total_locked = saved.0;
        self.total_investors = saved.1;
    }

    fn transition(&mut self, new: LockState) {
        let old = self.state;
        self.state = new;
        tracing::info!(account = %self.config.address, %old, %new, "lock state transition");
        self.events.push(LedgerEvent::LockStateTransition { old, new });
    }
}

fn require_investor(caller: Address, investor: Address) -> Result<(), LedgerError> {
    if caller == investor {
        Ok(())
    } else {
        Err(LedgerError::NotInvestor { caller, investor })
    }
}

fn require_token(expected: Address, actual: Address) -> Result<(), LedgerError> {
    if expected == actual {
        Ok(())
    } else {
        Err(LedgerError::WrongToken { expected, actual })
    }
}

impl MigrationTarget for LockedAccount {
    fn target_address(&self) -> Address {
        self.config.address
    }

    fn current_migration_source(&self) -> Option<Address> {
        self.migration.source
    }

    fn migrate_investor(
        &mut self,
        caller: Address,
        investor: Address,
        amount: Amount,
        neumarks: Amount,
        unlock_date: Timestamp,
    ) -> Result<(), LedgerError> {
        if !self.migration.is_source(caller) {
            return Err(LedgerError::NotMigrationSource {
                caller,
                expected: self.migration.source,
            });
        }
        self.require_state(
            "migrate_investor",
            &[LockState::AcceptingLocks, LockState::AcceptingUnlocks],
        )?;
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount { what: "migrated amount" });
        }
        if neumarks.is_zero() {
            return Err(LedgerError::ZeroAmount { what: "migrated neumarks" });
        }

        let existing = self.account(investor);
        let updated = existing.merged(amount, neumarks, unlock_date)?;
        let total_locked = self.total_locked.checked_add(amount)?;
        let total_investors = self.investors_after_insert(&existing)?;

        self.accounts.insert(investor, updated);
        self.total_locked = total_locked;
        self.total_investors = total_investors;
        tracing::info!(account = %self.config.address, source = %caller, %investor, %amount, "migrated position received");
        self.events.push(LedgerEvent::FundsLocked {
            investor,
            amount,
            neumarks,
        });
        Ok(())
    }
}

impl ApprovalReceiver for LockedAccount {
    fn receiver_address(&self) -> Address {
        self.config.address
    }

    /// Approve-and-call entry: unlock `from` right after the neumark
    /// approval. Only the configured neumark token may call.
    fn receive_approval(
        &mut self,
        token: Address,
        from: Address,
        amount: Amount,
        neumark: &mut dyn NeumarkToken,
        asset: &mut dyn AssetToken,
    ) -> Result<(), LedgerError> {
        self.require_state("receive_approval", &[LockState::AcceptingUnlocks])?;
        require_token(self.config.neumark_token, token)?;
        require_token(token, neumark.token_address())?;
        tracing::debug!(account = %self.config.address, investor = %from, %amount, "unlock via approval");
        self.unlock(from, from, neumark, asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TokenError;
    use crate::token::TokenLedger;
    use eto_core::{ManualClock, RoleBasedAccessPolicy, DECIMAL_SCALE};

    const T0: u64 = 1_600_000_000;
    const DAY: u64 = 86_400;
    const PERIOD: u64 = 18 * 30 * DAY;

    fn a(label: &str) -> Address {
        Address::derive(label)
    }

    fn amt(v: u128) -> Amount {
        Amount::new(v)
    }

    fn config(label: &str) -> LockedAccountConfig {
        LockedAccountConfig {
            address: a(label),
            asset_token: a("asset"),
            neumark_token: a("neumark"),
            lock_period_secs: PERIOD,
            penalty_fraction: DecimalFraction::from_percent(10).unwrap(),
            penalty_disbursal_address: a("pool"),
        }
    }

    fn policy() -> Arc<RoleBasedAccessPolicy> {
        Arc::new(
            RoleBasedAccessPolicy::new()
                .with_global(a("admin"), Role::LockedAccountAdmin)
                .with_global(a("admin"), Role::Reclaimer),
        )
    }

    struct Fx {
        clock: Arc<ManualClock>,
        asset: TokenLedger,
        neumark: TokenLedger,
        locked: LockedAccount,
    }

    impl Fx {
        fn new() -> Self {
            let clock = Arc::new(ManualClock::new(Timestamp::from_epoch_secs(T0).unwrap()));
            let mut asset = TokenLedger::new(a("asset"), "ETH-T");
            asset.mint(a("controller"), amt(u128::MAX / 4)).unwrap();
            let neumark = TokenLedger::new(a("neumark"), "NEU");
            let mut locked = LockedAccount::new(config("locked"), clock.clone(), policy()).unwrap();
            locked.set_controller(a("admin"), a("controller")).unwrap();
            Self {
                clock,
                asset,
                neumark,
                locked,
            }
        }

        fn lock(&mut self, investor: &str, ticket: u128, neumarks: u128) -> Result<(), LedgerError> {
            let controller = a("controller");
            self.asset
                .approve(controller, self.locked.address(), amt(ticket))
                .unwrap();
            self.locked.lock(
                controller,
                a(investor),
                amt(ticket),
                amt(neumarks),
                &mut self.asset,
            )?;
            self.neumark.mint(a(investor), amt(neumarks)).unwrap();
            Ok(())
        }

        fn approve_burn(&mut self, investor: &str, neumarks: u128) {
            self.neumark
                .approve(a(investor), self.locked.address(), amt(neumarks))
                .unwrap();
        }

        fn unlock(&mut self, investor: &str) -> Result<(), LedgerError> {
            self.locked
                .unlock(a(investor), a(investor), &mut self.neumark, &mut self.asset)
        }

        fn at(&self, secs_after_t0: u64) {
            self.clock
                .set(Timestamp::from_epoch_secs(T0 + secs_after_t0).unwrap());
        }
    }

    fn ts(secs_after_t0: u64) -> Timestamp {
        Timestamp::from_epoch_secs(T0 + secs_after_t0).unwrap()
    }

    // ── Controller lifecycle ────────────────────────────────────────

    #[test]
    fn set_controller_requires_admin_and_uncontrolled() {
        let clock = Arc::new(ManualClock::new(ts(0)));
        let mut locked = LockedAccount::new(config("l"), clock, policy()).unwrap();
        assert_eq!(locked.lock_state(), LockState::Uncontrolled);
        assert!(matches!(
            locked.set_controller(a("mallory"), a("controller")),
            Err(LedgerError::AccessDenied { .. })
        ));
        locked.set_controller(a("admin"), a("controller")).unwrap();
        assert_eq!(locked.lock_state(), LockState::AcceptingLocks);
        assert_eq!(locked.controller(), Some(a("controller")));
        assert!(matches!(
            locked.set_controller(a("admin"), a("other")),
            Err(LedgerError::WrongState { .. })
        ));
    }

    #[test]
    fn missing_disbursal_address_rejected() {
        let mut cfg = config("l");
        cfg.penalty_disbursal_address = Address::ZERO;
        let clock = Arc::new(ManualClock::new(ts(0)));
        assert!(matches!(
            LockedAccount::new(cfg, clock, policy()),
            Err(LedgerError::MissingDisbursalAddress)
        ));
    }

    #[test]
    fn controller_signals_only_from_accepting_locks() {
        let mut fx = Fx::new();
        assert!(matches!(
            fx.locked.controller_failed(a("mallory")),
            Err(LedgerError::NotController { .. })
        ));
        fx.locked.controller_succeeded(a("controller")).unwrap();
        assert_eq!(fx.locked.lock_state(), LockState::AcceptingUnlocks);
        assert!(matches!(
            fx.locked.controller_failed(a("controller")),
            Err(LedgerError::WrongState { .. })
        ));
    }

    // ── Lock ────────────────────────────────────────────────────────

    #[test]
    fn lock_takes_custody_and_updates_totals() {
        let mut fx = Fx::new();
        fx.lock("alice", 1_000, 500).unwrap();
        fx.lock("bob", 300, 100).unwrap();
        assert_eq!(fx.asset.balance_of(fx.locked.address()), amt(1_300));
        assert_eq!(fx.locked.total_locked_amount(), amt(1_300));
        assert_eq!(fx.locked.total_investors(), 2);
        let alice = fx.locked.account(a("alice"));
        assert_eq!(alice.locked_amount, amt(1_000));
        assert_eq!(alice.neumarks_due, amt(500));
        assert_eq!(alice.unlock_date, Some(ts(PERIOD)));
        assert!(fx.locked.events().contains(&LedgerEvent::FundsLocked {
            investor: a("alice"),
            amount: amt(1_000),
            neumarks: amt(500)
        }));
        fx.locked.check_invariants().unwrap();
    }

    #[test]
    fn repeat_lock_keeps_earliest_unlock_date() {
        let mut fx = Fx::new();
        fx.lock("alice", 1_000, 500).unwrap();
        fx.at(DAY);
        fx.lock("alice", 2_000, 700).unwrap();
        let alice = fx.locked.account(a("alice"));
        assert_eq!(alice.unlock_date, Some(ts(PERIOD)));
        assert_eq!(alice.locked_amount, amt(3_000));
        assert_eq!(alice.neumarks_due, amt(1_200));
        assert_eq!(fx.locked.total_investors(), 1);
    }

    #[test]
    fn lock_rejects_wrong_caller_state_and_zero() {
        let mut fx = Fx::new();
        let err = fx
            .locked
            .lock(a("mallory"), a("alice"), amt(1), amt(1), &mut fx.asset)
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotController { .. }));
        assert!(matches!(
            fx.lock("alice", 0, 1),
            Err(LedgerError::ZeroAmount { what: "ticket" })
        ));
        assert!(matches!(
            fx.lock("alice", 1, 0),
            Err(LedgerError::ZeroAmount { what: "neumarks" })
        ));
        fx.locked.controller_succeeded(a("controller")).unwrap();
        assert!(matches!(fx.lock("alice", 1, 1), Err(LedgerError::WrongState { .. })));
    }

    #[test]
    fn lock_without_allowance_changes_nothing() {
        let mut fx = Fx::new();
        let err = fx
            .locked
            .lock(a("controller"), a("alice"), amt(10), amt(1), &mut fx.asset)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Token(_)));
        assert!(fx.locked.account(a("alice")).is_empty());
        assert_eq!(fx.locked.total_locked_amount(), Amount::ZERO);
        assert!(fx.locked.events().iter().all(|e| !matches!(e, LedgerEvent::FundsLocked { .. })));
    }

    // ── Unlock ──────────────────────────────────────────────────────

    #[test]
    fn unlock_rejected_while_accepting_locks() {
        let mut fx = Fx::new();
        fx.lock("alice", 100, 10).unwrap();
        fx.approve_burn("alice", 10);
        assert!(matches!(fx.unlock("alice"), Err(LedgerError::WrongState { .. })));
    }

    #[test]
    fn unlock_after_period_burns_and_returns_everything() {
        let mut fx = Fx::new();
        fx.lock("alice", 1_000, 500).unwrap();
        fx.locked.controller_succeeded(a("controller")).unwrap();
        fx.at(PERIOD);
        fx.approve_burn("alice", 500);
        fx.unlock("alice").unwrap();

        assert_eq!(fx.asset.balance_of(a("alice")), amt(1_000));
        assert_eq!(fx.asset.balance_of(a("pool")), Amount::ZERO);
        assert_eq!(fx.neumark.balance_of(a("alice")), Amount::ZERO);
        assert_eq!(fx.neumark.total_supply(), Amount::ZERO);
        assert!(fx.locked.account(a("alice")).is_empty());
        assert_eq!(fx.locked.total_investors(), 0);
        assert_eq!(
            fx.locked.events().last(),
            Some(&LedgerEvent::FundsUnlocked {
                investor: a("alice"),
                amount: amt(1_000),
                neumarks_burned: amt(500)
            })
        );
        fx.locked.check_invariants().unwrap();
    }

    #[test]
    fn allowance_must_match_exactly() {
        let mut fx = Fx::new();
        fx.lock("alice", 1_000, 500).unwrap();
        fx.locked.controller_succeeded(a("controller")).unwrap();

        fx.approve_burn("alice", 499);
        assert!(matches!(
            fx.unlock("alice"),
            Err(LedgerError::NeumarkAllowanceMismatch { .. })
        ));
        fx.approve_burn("alice", 501);
        assert!(matches!(
            fx.unlock("alice"),
            Err(LedgerError::NeumarkAllowanceMismatch { .. })
        ));
        assert_eq!(fx.locked.total_investors(), 1);

        fx.approve_burn("alice", 500);
        fx.unlock("alice").unwrap();
        assert_eq!(fx.neumark.balance_of(a("alice")), Amount::ZERO);
    }

    #[test]
    fn neumark_balance_must_equal_due() {
        let mut fx = Fx::new();
        fx.lock("alice", 1_000, 500).unwrap();
        fx.locked.controller_succeeded(a("controller")).unwrap();
        fx.approve_burn("alice", 500);

        fx.neumark.transfer(a("alice"), a("bob"), amt(1)).unwrap();
        assert_eq!(
            fx.unlock("alice"),
            Err(LedgerError::NeumarkBalanceMismatch {
                investor: a("alice"),
                expected: amt(500),
                actual: amt(499),
            })
        );

        fx.neumark.mint(a("alice"), amt(101)).unwrap();
        assert_eq!(
            fx.unlock("alice"),
            Err(LedgerError::NeumarkBalanceMismatch {
                investor: a("alice"),
                expected: amt(500),
                actual: amt(600),
            })
        );
        assert_eq!(fx.locked.account(a("alice")).locked_amount, amt(1_000));
        assert_eq!(fx.neumark.balance_of(a("alice")), amt(600));

        fx.neumark.transfer(a("alice"), a("bob"), amt(100)).unwrap();
        fx.unlock("alice").unwrap();
        assert_eq!(fx.asset.balance_of(a("alice")), amt(900));
    }

    #[test]
    fn only_the_investor_may_unlock() {
        let mut fx = Fx::new();
        fx.lock("alice", 1_000, 500).unwrap();
        fx.locked.controller_failed(a("controller")).unwrap();
        let err = fx
            .locked
            .unlock(a("mallory"), a("alice"), &mut fx.neumark, &mut fx.asset)
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::NotInvestor {
                caller: a("mallory"),
                investor: a("alice")
            }
        );
        assert_eq!(fx.asset.balance_of(a("alice")), Amount::ZERO);
        assert_eq!(fx.locked.account(a("alice")).locked_amount, amt(1_000));
    }

    #[test]
    fn no_penalty_exactly_at_unlock_date() {
        let mut fx = Fx::new();
        fx.lock("alice", 1_000, 500).unwrap();
        fx.locked.controller_succeeded(a("controller")).unwrap();
        fx.at(PERIOD);
        fx.approve_burn("alice", 500);
        fx.unlock("alice").unwrap();
        assert_eq!(fx.asset.balance_of(a("pool")), Amount::ZERO);
        assert!(!fx
            .locked
            .events()
            .iter()
            .any(|e| matches!(e, LedgerEvent::PenaltyDisbursed { .. })));
    }

    #[test]
    fn penalty_one_second_early_rounds_down() {
        let mut fx = Fx::new();
        let ticket = DECIMAL_SCALE + 9;
        fx.lock("alice", ticket, 500).unwrap();
        fx.locked.controller_succeeded(a("controller")).unwrap();
        fx.at(PERIOD - 1);
        fx.approve_burn("alice", 500);
        fx.unlock("alice").unwrap();
        let penalty = DECIMAL_SCALE / 10;
        assert_eq!(fx.asset.balance_of(a("pool")), amt(penalty));
        assert_eq!(fx.asset.balance_of(a("alice")), amt(ticket - penalty));
        assert!(fx.locked.events().contains(&LedgerEvent::PenaltyDisbursed {
            disbursal: a("pool"),
            amount: amt(penalty),
            asset: a("asset"),
            investor: a("alice"),
        }));
    }

    #[test]
    fn half_period_unlock_splits_ninety_ten() {
        let mut fx = Fx::new();
        fx.lock("alice", DECIMAL_SCALE, 6_500 * DECIMAL_SCALE).unwrap();
        fx.locked.controller_succeeded(a("controller")).unwrap();
        fx.at(PERIOD / 2);
        fx.approve_burn("alice", 6_500 * DECIMAL_SCALE);
        fx.unlock("alice").unwrap();
        assert_eq!(fx.asset.balance_of(a("alice")), amt(DECIMAL_SCALE / 10 * 9));
        assert_eq!(fx.asset.balance_of(a("pool")), amt(DECIMAL_SCALE / 10));
        assert_eq!(fx.neumark.balance_of(a("alice")), Amount::ZERO);
        assert_eq!(fx.asset.balance_of(fx.locked.address()), Amount::ZERO);
    }

    #[test]
    fn penalty_to_contract_without_callback_fails_atomically() {
        let mut fx = Fx::new();
        fx.asset.register_contract(a("pool"), false);
        fx.lock("alice", 1_000, 500).unwrap();
        fx.locked.controller_succeeded(a("controller")).unwrap();
        fx.at(DAY);
        fx.approve_burn("alice", 500);
        assert_eq!(
            fx.unlock("alice"),
            Err(LedgerError::RecipientRejectsCallback { recipient: a("pool") })
        );
        assert_eq!(fx.locked.account(a("alice")).locked_amount, amt(1_000));
        assert_eq!(fx.neumark.allowance(a("alice"), fx.locked.address()), amt(500));
        assert_eq!(fx.neumark.balance_of(a("alice")), amt(500));
        fx.locked.check_invariants().unwrap();

        // Without a penalty the pool is never paid, so the unlock succeeds.
        fx.at(PERIOD);
        fx.unlock("alice").unwrap();
        assert_eq!(fx.asset.balance_of(a("alice")), amt(1_000));
    }

    #[test]
    fn release_all_returns_everything_without_burn() {
        let mut fx = Fx::new();
        fx.lock("alice", 1_000, 500).unwrap();
        fx.locked.controller_failed(a("controller")).unwrap();
        fx.unlock("alice").unwrap();
        assert_eq!(fx.asset.balance_of(a("alice")), amt(1_000));
        assert_eq!(fx.neumark.balance_of(a("alice")), amt(500));
        assert_eq!(
            fx.locked.events().last(),
            Some(&LedgerEvent::FundsUnlocked {
                investor: a("alice"),
                amount: amt(1_000),
                neumarks_burned: Amount::ZERO
            })
        );
    }

    #[test]
    fn unlock_of_empty_position_is_silent() {
        let mut fx = Fx::new();
        fx.lock("alice", 1_000, 500).unwrap();
        fx.locked.controller_failed(a("controller")).unwrap();
        fx.unlock("alice").unwrap();
        let before = fx.locked.events().len();
        fx.unlock("alice").unwrap();
        fx.unlock("nobody").unwrap();
        assert_eq!(fx.locked.events().len(), before);
    }

    #[test]
    fn approve_and_call_unlocks_in_one_step() {
        let mut fx = Fx::new();
        fx.lock("alice", 1_000, 500).unwrap();
        fx.locked.controller_succeeded(a("controller")).unwrap();
        fx.at(PERIOD);
        fx.neumark
            .approve_and_call(a("alice"), &mut fx.locked, amt(500), &mut fx.asset)
            .unwrap();
        assert_eq!(fx.asset.balance_of(a("alice")), amt(1_000));
        assert_eq!(fx.neumark.total_supply(), Amount::ZERO);
    }

    #[test]
    fn approve_and_call_with_wrong_amount_restores_allowance() {
        let mut fx = Fx::new();
        fx.lock("alice", 1_000, 500).unwrap();
        fx.locked.controller_succeeded(a("controller")).unwrap();
        let err = fx
            .neumark
            .approve_and_call(a("alice"), &mut fx.locked, amt(400), &mut fx.asset)
            .unwrap_err();
        assert!(matches!(err, LedgerError::NeumarkAllowanceMismatch { .. }));
        assert_eq!(fx.neumark.allowance(a("alice"), fx.locked.address()), Amount::ZERO);
        assert_eq!(fx.locked.total_investors(), 1);
    }

    #[test]
    fn receive_approval_only_from_neumark() {
        let mut fx = Fx::new();
        fx.lock("alice", 1_000, 500).unwrap();
        fx.locked.controller_succeeded(a("controller")).unwrap();
        let err = fx
            .locked
            .receive_approval(a("impostor"), a("alice"), amt(500), &mut fx.neumark, &mut fx.asset)
            .unwrap_err();
        assert!(matches!(err, LedgerError::WrongToken { .. }));
    }

    /// Asset token that refuses to pay one recipient.
    #[derive(Debug)]
    struct RefusingAsset {
        inner: TokenLedger,
        refuse: Address,
    }

    impl AssetToken for RefusingAsset {
        fn token_address(&self) -> Address {
            self.inner.token_address()
        }
        fn balance_of(&self, owner: Address) -> Amount {
            self.inner.balance_of(owner)
        }
        fn allowance(&self, owner: Address, spender: Address) -> Amount {
            self.inner.allowance(owner, spender)
        }
        fn approve(&mut self, owner: Address, spender: Address, amount: Amount) -> Result<(), TokenError> {
            self.inner.approve(owner, spender, amount)
        }
        fn transfer(&mut self, from: Address, to: Address, amount: Amount) -> Result<(), TokenError> {
            if to == self.refuse {
                return Err(TokenError::CallbackRejected { recipient: to });
            }
            self.inner.transfer(from, to, amount)
        }
        fn transfer_from(
            &mut self,
            spender: Address,
            from: Address,
            to: Address,
            amount: Amount,
        ) -> Result<(), TokenError> {
            self.inner.transfer_from(spender, from, to, amount)
        }
        fn accepts_callbacks(&self, _recipient: Address) -> bool {
            true
        }
    }

    /// Neumark whose burn always fails.
    #[derive(Debug)]
    struct Unburnable(TokenLedger);

    impl AssetToken for Unburnable {
        fn token_address(&self) -> Address {
            self.0.token_address()
        }
        fn balance_of(&self, owner: Address) -> Amount {
            self.0.balance_of(owner)
        }
        fn allowance(&self, owner: Address, spender: Address) -> Amount {
            self.0.allowance(owner, spender)
        }
        fn approve(&mut self, owner: Address, spender: Address, amount: Amount) -> Result<(), TokenError> {
            self.0.approve(owner, spender, amount)
        }
        fn transfer(&mut self, from: Address, to: Address, amount: Amount) -> Result<(), TokenError> {
            self.0.transfer(from, to, amount)
        }
        fn transfer_from(
            &mut self,
            spender: Address,
            from: Address,
            to: Address,
            amount: Amount,
        ) -> Result<(), TokenError> {
            self.0.transfer_from(spender, from, to, amount)
        }
        fn accepts_callbacks(&self, recipient: Address) -> bool {
            self.0.accepts_callbacks(recipient)
        }
    }

    impl NeumarkToken for Unburnable {
        fn burn(&mut self, owner: Address, _amount: Amount) -> Result<(), TokenError> {
            Err(TokenError::CallbackRejected { recipient: owner })
        }
    }

    #[test]
    fn failed_payout_returns_neumarks_and_penalty() {
        let mut fx = Fx::new();
        fx.lock("alice", 1_000, 500).unwrap();
        fx.locked.controller_succeeded(a("controller")).unwrap();
        fx.at(DAY);
        fx.approve_burn("alice", 500);

        let mut asset = RefusingAsset {
            inner: fx.asset.clone(),
            refuse: a("alice"),
        };
        let err = fx
            .locked
            .unlock(a("alice"), a("alice"), &mut fx.neumark, &mut asset)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Token(TokenError::CallbackRejected { .. })));

        assert_eq!(fx.locked.account(a("alice")).locked_amount, amt(1_000));
        assert_eq!(asset.balance_of(fx.locked.address()), amt(1_000));
        assert_eq!(asset.balance_of(a("pool")), Amount::ZERO);
        assert_eq!(fx.neumark.balance_of(a("alice")), amt(500));
        assert_eq!(fx.neumark.allowance(a("alice"), fx.locked.address()), amt(500));
        assert_eq!(fx.neumark.total_supply(), amt(500));
        fx.locked.check_invariants().unwrap();

        // The same position still unlocks once the asset pays out.
        fx.unlock("alice").unwrap();
        assert_eq!(fx.asset.balance_of(a("alice")), amt(900));
        assert_eq!(fx.neumark.total_supply(), Amount::ZERO);
    }

    #[test]
    fn failed_burn_claws_back_the_payout() {
        let mut fx = Fx::new();
        fx.lock("alice", 1_000, 500).unwrap();
        fx.locked.controller_succeeded(a("controller")).unwrap();
        fx.at(DAY);
        let mut neumark = Unburnable(fx.neumark.clone());
        neumark.approve(a("alice"), fx.locked.address(), amt(500)).unwrap();

        assert!(fx
            .locked
            .unlock(a("alice"), a("alice"), &mut neumark, &mut fx.asset)
            .is_err());
        assert_eq!(fx.asset.balance_of(a("alice")), Amount::ZERO);
        assert_eq!(fx.asset.balance_of(a("pool")), Amount::ZERO);
        assert_eq!(fx.asset.balance_of(fx.locked.address()), amt(1_000));
        assert_eq!(neumark.balance_of(a("alice")), amt(500));
        assert_eq!(neumark.allowance(a("alice"), fx.locked.address()), amt(500));
        assert_eq!(fx.locked.account(a("alice")).neumarks_due, amt(500));
        fx.locked.check_custody(&fx.asset).unwrap();
    }

    // ── Reclaim ─────────────────────────────────────────────────────

    #[test]
    fn reclaim_recovers_stray_tokens_but_never_the_asset() {
        let mut fx = Fx::new();
        let mut stray = TokenLedger::new(a("stray"), "STR");
        stray.mint(fx.locked.address(), amt(77)).unwrap();

        assert!(matches!(
            fx.locked.reclaim(a("mallory"), &mut stray),
            Err(LedgerError::AccessDenied { .. })
        ));
        assert_eq!(
            fx.locked.reclaim(a("admin"), &mut fx.asset),
            Err(LedgerError::ReclaimAssetToken)
        );
        assert_eq!(fx.locked.reclaim(a("admin"), &mut stray), Ok(amt(77)));
        assert_eq!(stray.balance_of(a("admin")), amt(77));
    }

    // ── Migration ───────────────────────────────────────────────────

    fn successor(fx: &Fx, label: &str) -> LockedAccount {
        let mut next = LockedAccount::new(config(label), fx.clock.clone(), policy()).unwrap();
        next.set_controller(a("admin"), a("controller-2")).unwrap();
        next
    }

    #[test]
    fn enable_migration_requires_handshake() {
        let mut fx = Fx::new();
        let mut next = successor(&fx, "next");
        assert_eq!(
            fx.locked.enable_migration(a("admin"), &next),
            Err(LedgerError::MigrationHandshake {
                expected: fx.locked.address(),
                actual: None
            })
        );
        assert!(matches!(
            next.set_migration_source(a("mallory"), fx.locked.address()),
            Err(LedgerError::AccessDenied { .. })
        ));
        next.set_migration_source(a("admin"), fx.locked.address()).unwrap();
        assert!(matches!(
            fx.locked.enable_migration(a("mallory"), &next),
            Err(LedgerError::AccessDenied { .. })
        ));
        fx.locked.enable_migration(a("admin"), &next).unwrap();
        assert_eq!(fx.locked.migration().target, Some(next.address()));
        assert!(matches!(
            fx.locked.enable_migration(a("admin"), &next),
            Err(LedgerError::MigrationAlreadyEnabled { .. })
        ));
    }

    #[test]
    fn enable_migration_rejected_in_release_all() {
        let mut fx = Fx::new();
        let mut next = successor(&fx, "next");
        next.set_migration_source(a("admin"), fx.locked.address()).unwrap();
        fx.locked.controller_failed(a("controller")).unwrap();
        assert!(matches!(
            fx.locked.enable_migration(a("admin"), &next),
            Err(LedgerError::WrongState { .. })
        ));
    }

    #[test]
    fn only_the_investor_may_migrate() {
        let mut fx = Fx::new();
        let mut next = successor(&fx, "next");
        next.set_migration_source(a("admin"), fx.locked.address()).unwrap();
        fx.locked.enable_migration(a("admin"), &next).unwrap();
        fx.lock("alice", 1_000, 500).unwrap();

        for caller in [a("mallory"), a("admin")] {
            assert_eq!(
                fx.locked.migrate(caller, a("alice"), &mut next, &mut fx.asset),
                Err(LedgerError::NotInvestor {
                    caller,
                    investor: a("alice")
                })
            );
        }
        assert!(next.account(a("alice")).is_empty());
        assert_eq!(fx.locked.account(a("alice")).locked_amount, amt(1_000));
        assert_eq!(fx.asset.balance_of(next.address()), Amount::ZERO);
    }

    #[test]
    fn migrate_before_enable_rejected() {
        let mut fx = Fx::new();
        let mut next = successor(&fx, "next");
        fx.lock("alice", 100, 10).unwrap();
        assert_eq!(
            fx.locked.migrate(a("alice"), a("alice"), &mut next, &mut fx.asset),
            Err(LedgerError::MigrationNotEnabled)
        );
    }

    #[test]
    fn migrate_conserves_totals_and_is_idempotent() {
        let mut fx = Fx::new();
        let mut next = successor(&fx, "next");
        next.set_migration_source(a("admin"), fx.locked.address()).unwrap();
        fx.locked.enable_migration(a("admin"), &next).unwrap();
        fx.lock("alice", 1_000, 500).unwrap();
        fx.lock("bob", 300, 100).unwrap();

        let sum_before = fx.locked.total_locked_amount().value() + next.total_locked_amount().value();
        let investors_before = fx.locked.total_investors() + next.total_investors();

        fx.locked.migrate(a("alice"), a("alice"), &mut next, &mut fx.asset).unwrap();
        assert_eq!(
            fx.locked.total_locked_amount().value() + next.total_locked_amount().value(),
            sum_before
        );
        assert_eq!(fx.locked.total_investors() + next.total_investors(), investors_before);
        assert_eq!(next.account(a("alice")).unlock_date, Some(ts(PERIOD)));
        assert_eq!(fx.asset.balance_of(next.address()), amt(1_000));
        assert_eq!(fx.asset.balance_of(fx.locked.address()), amt(300));

        let events = fx.locked.events().len();
        fx.locked.migrate(a("alice"), a("alice"), &mut next, &mut fx.asset).unwrap();
        assert_eq!(fx.locked.events().len(), events);
        assert_eq!(next.total_locked_amount(), amt(1_000));

        fx.locked.check_invariants().unwrap();
        next.check_invariants().unwrap();
        fx.locked.check_custody(&fx.asset).unwrap();
        next.check_custody(&fx.asset).unwrap();
    }

    #[test]
    fn migrated_position_merges_with_earliest_date() {
        let mut fx = Fx::new();
        let mut next = successor(&fx, "next");
        next.set_migration_source(a("admin"), fx.locked.address()).unwrap();
        fx.locked.enable_migration(a("admin"), &next).unwrap();
        fx.lock("alice", 1_000, 500).unwrap();

        fx.at(10 * DAY);
        fx.asset.mint(a("controller-2"), amt(50)).unwrap();
        fx.asset.approve(a("controller-2"), next.address(), amt(50)).unwrap();
        next.lock(a("controller-2"), a("alice"), amt(50), amt(5), &mut fx.asset)
            .unwrap();
        assert_eq!(next.account(a("alice")).unlock_date, Some(ts(10 * DAY + PERIOD)));

        fx.locked.migrate(a("alice"), a("alice"), &mut next, &mut fx.asset).unwrap();
        let merged = next.account(a("alice"));
        assert_eq!(merged.unlock_date, Some(ts(PERIOD)));
        assert_eq!(merged.locked_amount, amt(1_050));
        assert_eq!(merged.neumarks_due, amt(505));
        assert_eq!(next.total_investors(), 1);
    }

    #[test]
    fn target_accepts_only_registered_source() {
        let fx = Fx::new();
        let mut next = successor(&fx, "next");
        next.set_migration_source(a("admin"), fx.locked.address()).unwrap();
        let err = next
            .migrate_investor(a("mallory"), a("alice"), amt(1), amt(1), ts(0))
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotMigrationSource { .. }));
        assert!(next.account(a("alice")).is_empty());
    }

    #[test]
    fn migrate_to_unenabled_target_rejected() {
        let mut fx = Fx::new();
        let mut next = successor(&fx, "next");
        let mut other = successor(&fx, "other");
        next.set_migration_source(a("admin"), fx.locked.address()).unwrap();
        fx.locked.enable_migration(a("admin"), &next).unwrap();
        fx.lock("alice", 100, 10).unwrap();
        assert!(matches!(
            fx.locked.migrate(a("alice"), a("alice"), &mut other, &mut fx.asset),
            Err(LedgerError::WrongMigrationTarget { .. })
        ));
    }

    #[test]
    fn refused_migration_restores_source_and_custody() {
        let mut fx = Fx::new();
        // Never given a controller, so it refuses inbound records.
        let mut dormant = LockedAccount::new(config("dormant"), fx.clock.clone(), policy()).unwrap();
        dormant.set_migration_source(a("admin"), fx.locked.address()).unwrap();
        fx.locked.enable_migration(a("admin"), &dormant).unwrap();
        fx.lock("alice", 1_000, 500).unwrap();

        let err = fx
            .locked
            .migrate(a("alice"), a("alice"), &mut dormant, &mut fx.asset)
            .unwrap_err();
        assert!(matches!(err, LedgerError::WrongState { op: "migrate_investor", .. }));
        assert_eq!(fx.locked.account(a("alice")).locked_amount, amt(1_000));
        assert_eq!(fx.asset.balance_of(fx.locked.address()), amt(1_000));
        assert_eq!(fx.asset.balance_of(dormant.address()), Amount::ZERO);
        fx.locked.check_invariants().unwrap();
    }

    #[test]
    fn migration_rejected_in_release_all() {
        let mut fx = Fx::new();
        let mut next = successor(&fx, "next");
        next.set_migration_source(a("admin"), fx.locked.address()).unwrap();
        fx.locked.enable_migration(a("admin"), &next).unwrap();
        fx.lock("alice", 100, 10).unwrap();
        fx.locked.controller_failed(a("controller")).unwrap();
        assert!(matches!(
            fx.locked.migrate(a("alice"), a("alice"), &mut next, &mut fx.asset),
            Err(LedgerError::WrongState { op: "migrate", .. })
        ));
    }
}
