//! Agent selection within a ticket's category.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::{HelpdeskError, HelpdeskResult};
use super::models::{CategoryId, Ticket, TicketId, UserId};
use super::store::TicketStore;

/// Requested agent for a ticket. On the wire this is either the string
/// `"auto"` or an agent id (number or numeric string).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSelection", into = "RawSelection")]
pub enum AgentSelection {
    Auto,
    Agent(UserId),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawSelection {
    Id(i64),
    Text(String),
}

impl TryFrom<RawSelection> for AgentSelection {
    type Error = String;

    fn try_from(raw: RawSelection) -> Result<Self, Self::Error> {
        match raw {
            RawSelection::Id(id) => Ok(Self::Agent(id)),
            RawSelection::Text(text) => text.parse(),
        }
    }
}

impl From<AgentSelection> for RawSelection {
    fn from(selection: AgentSelection) -> Self {
        match selection {
            AgentSelection::Auto => RawSelection::Text("auto".to_string()),
            AgentSelection::Agent(id) => RawSelection::Id(id),
        }
    }
}

impl FromStr for AgentSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        s.parse::<UserId>()
            .map(Self::Agent)
            .map_err(|_| format!("'{}' is neither \"auto\" nor an agent id", s))
    }
}

impl fmt::Display for AgentSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Agent(id) => write!(f, "{}", id),
        }
    }
}

/// Resolves `requested` against the eligible agents of `category_id`.
///
/// An explicit id must be eligible. `Auto` and `None` pick the agent with the
/// fewest open tickets, lowest id first on ties; `excluding` keeps the ticket
/// being (re)assigned out of the counts.
pub fn select_agent<S: TicketStore>(
    store: &mut S,
    category_id: CategoryId,
    requested: Option<AgentSelection>,
    excluding: Option<TicketId>,
) -> HelpdeskResult<UserId> {
    let eligible = store.category_agent_ids(category_id)?;

    if let Some(AgentSelection::Agent(agent_id)) = requested {
        if eligible.contains(&agent_id) {
            return Ok(agent_id);
        }
        return Err(HelpdeskError::InvalidAgent {
            agent_id,
            category_id,
        });
    }

    let counts = store.open_ticket_counts(&eligible, excluding)?;
    let chosen = eligible
        .iter()
        .copied()
        .min_by_key(|id| (counts.get(id).copied().unwrap_or(0), *id))
        .ok_or(HelpdeskError::NoEligibleAgent { category_id })?;

    debug!(
        "Auto-selected agent {} for category {} (open tickets: {:?})",
        chosen, category_id, counts
    );
    Ok(chosen)
}

/// Sets `ticket.agent_id` in memory; persisting it is up to the caller.
pub fn assign<S: TicketStore>(
    store: &mut S,
    ticket: &mut Ticket,
    requested: Option<AgentSelection>,
) -> HelpdeskResult<UserId> {
    let agent_id = select_agent(store, ticket.category_id, requested, Some(ticket.id))?;
    if ticket.agent_id != Some(agent_id) {
        info!(
            "Ticket {} assigned to agent {} (was {:?})",
            ticket.id, agent_id, ticket.agent_id
        );
    }
    ticket.agent_id = Some(agent_id);
    Ok(agent_id)
}
