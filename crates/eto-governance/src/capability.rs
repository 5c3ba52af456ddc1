//! Read-only capabilities a governance host exposes to other components.

use eto_core::{Address, Amount, ResolutionId};

use crate::controller::GovState;
use crate::engine::ResolutionEngine;
use crate::resolution::{ResolutionExecution, ResolutionState};

/// Access to the resolution table.
pub trait ResolutionHost {
    /// The record for `resolution_id`.
    fn resolution(&self, resolution_id: ResolutionId) -> Option<&ResolutionExecution>;

    /// Every stored id, in order of creation.
    fn resolution_ids(&self) -> &[ResolutionId];

    /// Ids currently in `state`.
    fn resolutions_in_state(&self, state: ResolutionState) -> Vec<ResolutionId>;
}

/// Public facts about the company.
pub trait GeneralInformation {
    /// Registered name.
    fn company_name(&self) -> &str;

    /// Legal representative.
    fn legal_representative(&self) -> Address;

    /// Lifecycle phase.
    fn gov_state(&self) -> GovState;

    /// Shares issued through successful offerings.
    fn share_capital(&self) -> Amount;

    /// Whether equity token transfers are switched on.
    fn transfers_enabled(&self) -> bool;

    /// Registered offerings, in address order.
    fn offerings(&self) -> Vec<Address>;
}

impl ResolutionHost for ResolutionEngine {
    fn resolution(&self, resolution_id: ResolutionId) -> Option<&ResolutionExecution> {
        ResolutionEngine::resolution(self, resolution_id)
    }

    fn resolution_ids(&self) -> &[ResolutionId] {
        ResolutionEngine::resolution_ids(self)
    }

    fn resolutions_in_state(&self, state: ResolutionState) -> Vec<ResolutionId> {
        ResolutionEngine::resolutions_in_state(self, state)
    }
}
