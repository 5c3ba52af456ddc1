//! # Offering Durations
//!
//! [`DurationTerms`] are the four configurable phase lengths of an
//! offering. [`StateDurationTable`] expands them into one entry per
//! [`EtoState`]; Setup, Payout and Refund always have zero length.
//!
//! The state machine accepts any table. [`DurationLimits`] exists for
//! deployment tooling that wants production bounds enforced before an
//! offering is created.

use serde::{Deserialize, Serialize};

use crate::error::OfferingError;
use crate::offering::EtoState;

const DAY: u64 = 24 * 60 * 60;

/// Configurable phase lengths, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DurationTerms {
    /// Whitelist (pre-sale) phase.
    pub whitelist_secs: u64,
    /// Public phase.
    pub public_secs: u64,
    /// Signing phase: the company and nominee sign the investment agreement.
    pub signing_secs: u64,
    /// Claim phase: investors claim equity tokens before payout.
    pub claim_secs: u64,
}

impl DurationTerms {
    /// Every bound this set of terms violates. Empty when valid.
    pub fn violations(&self, limits: &DurationLimits) -> Vec<OfferingError> {
        [
            ("whitelist", self.whitelist_secs, limits.whitelist),
            ("public", self.public_secs, limits.public),
            ("signing", self.signing_secs, limits.signing),
            ("claim", self.claim_secs, limits.claim),
        ]
        .into_iter()
        .filter(|(_, secs, (min, max))| secs < min || secs > max)
        .map(|(phase, secs, (min, max))| OfferingError::DurationOutOfRange {
            phase,
            secs,
            min,
            max,
        })
        .collect()
    }

    /// First violated bound, if any.
    pub fn validate(&self, limits: &DurationLimits) -> Result<(), OfferingError> {
        match self.violations(limits).into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Inclusive `(min, max)` bounds per configurable phase, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationLimits {
    /// Whitelist bounds.
    pub whitelist: (u64, u64),
    /// Public bounds.
    pub public: (u64, u64),
    /// Signing bounds.
    pub signing: (u64, u64),
    /// Claim bounds.
    pub claim: (u64, u64),
}

impl Default for DurationLimits {
    fn default() -> Self {
        Self {
            whitelist: (0, 30 * DAY),
            public: (0, 60 * DAY),
            signing: (14 * DAY, 60 * DAY),
            claim: (7 * DAY, 30 * DAY),
        }
    }
}

/// Length of every state, indexed by [`EtoState::index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDurationTable([u64; EtoState::COUNT]);

impl StateDurationTable {
    /// Expand terms into a per-state table.
    pub fn from_terms(terms: &DurationTerms) -> Self {
        let mut table = [0u64; EtoState::COUNT];
        table[EtoState::Whitelist.index()] = terms.whitelist_secs;
        table[EtoState::Public.index()] = terms.public_secs;
        table[EtoState::Signing.index()] = terms.signing_secs;
        table[EtoState::Claim.index()] = terms.claim_secs;
        Self(table)
    }

    /// Seconds spent in `state`.
    pub fn duration(&self, state: EtoState) -> u64 {
        self.0[state.index()]
    }

    /// The raw table.
    pub fn as_array(&self) -> &[u64; EtoState::COUNT] {
        &self.0
    }
}

impl From<DurationTerms> for StateDurationTable {
    fn from(terms: DurationTerms) -> Self {
        Self::from_terms(&terms)
    }
}
