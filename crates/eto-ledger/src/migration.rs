//! # Migration Handshake
//!
//! Moving investor records to a successor ledger takes consent on both
//! sides:
//!
//! 1. the successor's admin registers the old ledger as its source,
//! 2. the old ledger's admin enables migration to the successor, which is
//!    accepted only if the successor names the old ledger as its source,
//! 3. each investor migrates their own record.
//!
//! Both pointers are set at most once. The successor accepts
//! `migrate_investor` only from its registered source.

use eto_core::{Address, Amount, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Successor side of a migration.
pub trait MigrationTarget {
    /// Address of the successor.
    fn target_address(&self) -> Address;

    /// The ledger this successor accepts migrations from.
    fn current_migration_source(&self) -> Option<Address>;

    /// Credit a migrated record. `caller` must be the registered source;
    /// custody of `amount` has already been transferred.
    fn migrate_investor(
        &mut self,
        caller: Address,
        investor: Address,
        amount: Amount,
        neumarks: Amount,
        unlock_date: Timestamp,
    ) -> Result<(), LedgerError>;
}

/// One-way pointers, each written once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Ledger this one accepts records from.
    pub source: Option<Address>,
    /// Ledger this one sends records to.
    pub target: Option<Address>,
}

impl MigrationRecord {
    /// Record the inbound source. Fails if already set.
    pub fn set_source(&mut self, source: Address) -> Result<(), LedgerError> {
        if let Some(existing) = self.source {
            return Err(LedgerError::MigrationSourceAlreadySet {
                source_address: existing,
            });
        }
        self.source = Some(source);
        Ok(())
    }

    /// Record the outbound target. Fails if already set.
    pub fn set_target(&mut self, target: Address) -> Result<(), LedgerError> {
        if let Some(existing) = self.target {
            return Err(LedgerError::MigrationAlreadyEnabled { target: existing });
        }
        self.target = Some(target);
        Ok(())
    }

    /// Whether `caller` is the registered source.
    pub fn is_source(&self, caller: Address) -> bool {
        self.source == Some(caller)
    }
}
