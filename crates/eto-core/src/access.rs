//! # Access Policy
//!
//! Privileged operations ask an [`AccessPolicy`] whether a subject holds a
//! [`Role`] on an object. Grants may be global (any object) or scoped to a
//! single contract address.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::identity::Address;

/// Privileged roles recognised by the engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// May set the controller, migration target and migration source of a
    /// locked account.
    LockedAccountAdmin,
    /// May reclaim tokens accidentally sent to a contract.
    Reclaimer,
}

impl Role {
    /// Stable string form used in logs and config.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LockedAccountAdmin => "locked_account_admin",
            Self::Reclaimer => "reclaimer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answers "may `subject` act as `role` on `object`?".
pub trait AccessPolicy: Send + Sync + std::fmt::Debug {
    /// Whether the grant exists.
    fn allowed(&self, subject: Address, role: Role, object: Address) -> bool;
}

/// In-memory grant table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleBasedAccessPolicy {
    grants: HashSet<(Address, Role, Option<Address>)>,
}

impl RoleBasedAccessPolicy {
    /// An empty policy; every check fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `role` to `subject` on every object.
    pub fn grant_global(&mut self, subject: Address, role: Role) {
        self.grants.insert((subject, role, None));
    }

    /// Grant `role` to `subject` on `object` only.
    pub fn grant(&mut self, subject: Address, role: Role, object: Address) {
        self.grants.insert((subject, role, Some(object)));
    }

    /// Remove a grant. Returns whether it existed.
    pub fn revoke(&mut self, subject: Address, role: Role, object: Option<Address>) -> bool {
        self.grants.remove(&(subject, role, object))
    }

    /// Builder form of [`Self::grant_global`].
    pub fn with_global(mut self, subject: Address, role: Role) -> Self {
        self.grant_global(subject, role);
        self
    }
}

impl AccessPolicy for RoleBasedAccessPolicy {
    fn allowed(&self, subject: Address, role: Role, object: Address) -> bool {
        self.grants.contains(&(subject, role, None))
            || self.grants.contains(&(subject, role, Some(object)))
    }
}
