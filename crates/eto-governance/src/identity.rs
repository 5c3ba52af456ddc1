//! Identity registry consulted before equity token transfers.

use std::collections::BTreeSet;

use eto_core::Address;

/// Source of KYC status.
pub trait IdentityRegistry: Send + Sync + std::fmt::Debug {
    /// Whether `address` passed KYC.
    fn is_kyc_verified(&self, address: Address) -> bool;
}

/// Fixed set of verified addresses.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityRegistry {
    verified: BTreeSet<Address>,
}

impl StaticIdentityRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `address` as verified.
    pub fn verify(&mut self, address: Address) {
        self.verified.insert(address);
    }

    /// Withdraw verification. Returns whether it was present.
    pub fn revoke(&mut self, address: Address) -> bool {
        self.verified.remove(&address)
    }
}

impl FromIterator<Address> for StaticIdentityRegistry {
    fn from_iter<I: IntoIterator<Item = Address>>(iter: I) -> Self {
        Self {
            verified: iter.into_iter().collect(),
        }
    }
}

impl IdentityRegistry for StaticIdentityRegistry {
    fn is_kyc_verified(&self, address: Address) -> bool {
        self.verified.contains(&address)
    }
}
