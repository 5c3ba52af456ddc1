//! Journal entries emitted by the governance engine and controller.

use eto_core::{Address, Amount, ResolutionId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::controller::GovState;
use crate::resolution::{GovAction, ResolutionState};

/// One entry of the governance journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum GovernanceEvent {
    /// A resolution was stored.
    LogResolutionStarted {
        resolution_id: ResolutionId,
        action: GovAction,
        state: ResolutionState,
        document_url: String,
    },
    /// A stored resolution changed state.
    LogResolutionExecuted {
        resolution_id: ResolutionId,
        action: GovAction,
        state: ResolutionState,
    },
    /// The company moved to another lifecycle phase.
    LogGovStateTransition {
        old: GovState,
        new: GovState,
        at: Timestamp,
    },
    /// An offering was registered.
    LogOfferingRegistered {
        resolution_id: ResolutionId,
        offering: Address,
        new_shares: Amount,
    },
    /// Token transfers were switched on or off.
    LogTransfersStateChanged {
        resolution_id: Option<ResolutionId>,
        enabled: bool,
    },
}
