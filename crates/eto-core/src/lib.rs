//! # eto-core — Foundational Types for the ETO Stack
//!
//! This crate is the leaf of the workspace crate graph. Every engine crate
//! (`eto-state`, `eto-ledger`, `eto-governance`) builds on the primitives
//! defined here and nothing here depends on them.
//!
//! ## Key Design Principles
//!
//! 1. **Newtypes for domain primitives.** `Address`, `ResolutionId`,
//!    `Amount`, `DecimalFraction`, `Timestamp`. No bare integers for money
//!    and no bare byte arrays for identities.
//!
//! 2. **Checked arithmetic only.** `Amount` exposes `checked_add` /
//!    `checked_sub` returning [`CoreError`]. Balances never wrap.
//!
//! 3. **Exact fixed-point.** [`DecimalFraction::apply_floor`] computes
//!    `floor(amount * fraction / 1e18)` for the full `u128` range without
//!    intermediate overflow.
//!
//! 4. **Injected time.** Engines read time exclusively through the
//!    [`Clock`] trait so every transition is a pure function of stored
//!    deadlines and the clock.
//!
//! 5. **Canonical hashing.** Call payload digests (resolution promises,
//!    failure codes) flow through [`CanonicalBytes`] so the same logical
//!    payload always produces the same digest.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `eto-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod access;
pub mod amount;
pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod temporal;

pub use access::{AccessPolicy, Role, RoleBasedAccessPolicy};
pub use amount::{Amount, DecimalFraction, DECIMAL_SCALE};
pub use canonical::CanonicalBytes;
pub use digest::{sha256_digest, sha256_str, ContentDigest};
pub use error::{CanonicalizationError, CoreError};
pub use identity::{Address, ResolutionId};
pub use temporal::{Clock, ManualClock, SystemClock, Timestamp};
