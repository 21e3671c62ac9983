//! Who may close or reopen a ticket.
//!
//! An actor's standing towards one ticket is an explicit set of role tags
//! built by [`Actor::roles_for`]. The policy only tests set membership
//! against the configured flags; it never looks anything up.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::models::{Ticket, User, UserId};
use super::settings::{PermissionConfig, Settings};

/// Declaration order is the evaluation order of the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Admin,
    Agent,
    Owner,
}

pub type RoleSet = BTreeSet<ActorRole>;

/// The user performing an operation, as seen by the ticket core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub is_admin: bool,
    pub is_agent: bool,
    /// Restricted agents only see tickets they own or are assigned.
    pub restricted: bool,
}

impl Actor {
    pub fn from_user(user: &User, settings: &Settings) -> Self {
        Self {
            user_id: user.id,
            is_admin: user.is_admin,
            is_agent: user.is_agent,
            restricted: user.is_agent && !user.is_admin && settings.agent_restrict,
        }
    }

    pub fn is_staff(&self) -> bool {
        self.is_admin || self.is_agent
    }

    pub fn roles_for(&self, ticket: &Ticket) -> RoleSet {
        let mut roles = RoleSet::new();
        if self.is_admin {
            roles.insert(ActorRole::Admin);
        }
        if self.is_agent {
            roles.insert(ActorRole::Agent);
        }
        if ticket.is_owned_by(self.user_id) {
            roles.insert(ActorRole::Owner);
        }
        roles
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionPolicy<'a> {
    close: &'a PermissionConfig,
    reopen: &'a PermissionConfig,
}

impl<'a> PermissionPolicy<'a> {
    pub fn new(close: &'a PermissionConfig, reopen: &'a PermissionConfig) -> Self {
        Self { close, reopen }
    }

    pub fn from_settings(settings: &'a Settings) -> Self {
        Self::new(&settings.close_ticket_perm, &settings.reopen_ticket_perm)
    }

    pub fn can_close(&self, actor: &Actor, ticket: &Ticket) -> bool {
        Self::permits(self.close, &actor.roles_for(ticket))
    }

    pub fn can_reopen(&self, actor: &Actor, ticket: &Ticket) -> bool {
        Self::permits(self.reopen, &actor.roles_for(ticket))
    }

    /// True when any held role has its flag set, checked admin, agent, owner.
    pub fn permits(config: &PermissionConfig, roles: &RoleSet) -> bool {
        roles.iter().any(|role| config.allows(*role))
    }
}
