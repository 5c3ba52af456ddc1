//! # eto-ledger — Locked Account and Migration
//!
//! The locked account holds investor capital committed to an offering
//! together with the neumarks issued for it. Capital is released either
//! by burning exactly the neumarks issued (with a penalty if the lock
//! period has not elapsed) or wholesale when the controlling offering
//! fails.
//!
//! ```text
//! Uncontrolled ──▶ AcceptingLocks ──▶ AcceptingUnlocks
//!                        │
//!                        └──────────▶ ReleaseAll
//! ```
//!
//! ## Modules
//!
//! - **token** (`token.rs`): `AssetToken` / `NeumarkToken` collaborator
//!   traits and the in-memory `TokenLedger`.
//! - **locked_account** (`locked_account.rs`): the lock / unlock engine.
//! - **migration** (`migration.rs`): the `MigrationTarget` seam and the
//!   one-shot source/target record.
//! - **event** (`event.rs`): the append-only journal entries.
//!
//! ## Money Conservation
//!
//! `total_locked_amount` always equals the sum over accounts and
//! `total_investors` the number of non-empty accounts.
//! [`LockedAccount::check_invariants`] recomputes both. Migration moves an
//! account, its custody and its totals in one call, so the sum of the two
//! ledgers' totals is unchanged across it.

pub mod error;
pub mod event;
pub mod locked_account;
pub mod migration;
pub mod token;

pub use error::{LedgerError, TokenError};
pub use event::LedgerEvent;
pub use locked_account::{Account, LockState, LockedAccount, LockedAccountConfig};
pub use migration::{MigrationRecord, MigrationTarget};
pub use token::{ApprovalReceiver, AssetToken, NeumarkToken, TokenLedger};
