//! Ticket lists, list counters and agent pickers.
//!
//! The caller's filter choices arrive as an explicit [`FilterContext`]; this
//! module never remembers them between calls. [`current_filters`] drops an
//! agent filter that [`ticket_counts`] would report as stale.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::assignment::AgentSelection;
use super::error::{HelpdeskError, HelpdeskResult};
use super::models::{CategoryId, Tag, Ticket, TicketId, User, UserId};
use super::permissions::Actor;
use super::store::{TicketQuery, TicketStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerFilter {
    #[default]
    All,
    Me,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterContext {
    pub category: Option<CategoryId>,
    pub agent: Option<UserId>,
    #[serde(default)]
    pub owner: OwnerFilter,
}

impl FilterContext {
    pub fn without_agent(&self) -> Self {
        Self {
            agent: None,
            ..self.clone()
        }
    }
}

/// Which tickets an actor may see at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    All,
    OwnedOrAssigned(UserId),
    Owned(UserId),
}

impl Visibility {
    pub fn apply(self, query: TicketQuery) -> TicketQuery {
        match self {
            Self::All => query,
            Self::OwnedOrAssigned(user_id) => query.assigned_to_or_owned_by(user_id),
            Self::Owned(user_id) => query.owned_by(user_id),
        }
    }

    pub fn permits(self, ticket: &Ticket) -> bool {
        match self {
            Self::All => true,
            Self::OwnedOrAssigned(user_id) => {
                ticket.is_owned_by(user_id) || ticket.agent_id == Some(user_id)
            }
            Self::Owned(user_id) => ticket.is_owned_by(user_id),
        }
    }
}

pub fn visibility(actor: &Actor) -> Visibility {
    if actor.is_admin {
        Visibility::All
    } else if actor.is_agent {
        if actor.restricted {
            Visibility::OwnedOrAssigned(actor.user_id)
        } else {
            Visibility::All
        }
    } else {
        Visibility::Owned(actor.user_id)
    }
}

/// Query selecting what a list shows for `filters`. The `Me` owner filter
/// replaces the visibility scope with the actor's own tickets.
pub fn scoped_query(actor: &Actor, filters: &FilterContext, complete: bool) -> TicketQuery {
    let mut query = TicketQuery::new(complete).in_category(filters.category);
    if let Some(agent_id) = filters.agent {
        query = query.assigned_to(agent_id);
    }
    match filters.owner {
        OwnerFilter::Me => query.owned_by(actor.user_id),
        OwnerFilter::All => visibility(actor).apply(query),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: i64,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRow {
    pub id: TicketId,
    pub subject: String,
    pub status: Option<Label>,
    pub priority: Option<Label>,
    pub category: Option<Label>,
    pub owner: Option<String>,
    pub agent_id: Option<UserId>,
    pub agent: Option<String>,
    pub tags: Vec<Tag>,
    pub updated_at: DateTime<Utc>,
}

pub fn list_tickets<S: TicketStore>(
    store: &mut S,
    actor: &Actor,
    filters: &FilterContext,
    complete: bool,
) -> HelpdeskResult<Vec<TicketRow>> {
    let tickets = store.query_tickets(&scoped_query(actor, filters, complete))?;
    debug!(
        "Listing {} {} ticket(s) for user {}",
        tickets.len(),
        if complete { "complete" } else { "open" },
        actor.user_id
    );
    rows_for(store, tickets)
}

fn rows_for<S: TicketStore>(store: &mut S, tickets: Vec<Ticket>) -> HelpdeskResult<Vec<TicketRow>> {
    let statuses: HashMap<i64, Label> = store
        .statuses()?
        .into_iter()
        .map(|s| (s.id, Label { id: s.id, name: s.name, color: s.color }))
        .collect();
    let priorities: HashMap<i64, Label> = store
        .priorities()?
        .into_iter()
        .map(|p| (p.id, Label { id: p.id, name: p.name, color: p.color }))
        .collect();
    let categories: HashMap<i64, Label> = store
        .categories()?
        .into_iter()
        .map(|c| (c.id, Label { id: c.id, name: c.name, color: c.color }))
        .collect();

    let mut user_ids: Vec<UserId> = tickets
        .iter()
        .flat_map(|t| std::iter::once(t.user_id).chain(t.agent_id))
        .collect();
    user_ids.sort_unstable();
    user_ids.dedup();
    let names: HashMap<UserId, String> = store
        .users_by_ids(&user_ids)?
        .into_iter()
        .map(|u| (u.id, u.name))
        .collect();

    let mut rows = Vec::with_capacity(tickets.len());
    for ticket in tickets {
        let tags = store.ticket_tags(ticket.id)?;
        rows.push(TicketRow {
            id: ticket.id,
            status: statuses.get(&ticket.status_id).cloned(),
            priority: priorities.get(&ticket.priority_id).cloned(),
            category: categories.get(&ticket.category_id).cloned(),
            owner: names.get(&ticket.user_id).cloned(),
            agent: ticket.agent_id.and_then(|id| names.get(&id).cloned()),
            agent_id: ticket.agent_id,
            subject: ticket.subject,
            tags,
            updated_at: ticket.updated_at,
        });
    }
    Ok(rows)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub id: CategoryId,
    pub name: String,
    pub color: String,
    pub tickets: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCount {
    pub id: UserId,
    pub name: String,
    pub tickets: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerCounts {
    pub all: i64,
    pub me: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketCounts {
    pub total_category: Option<i64>,
    pub categories: Vec<CategoryCount>,
    pub total_agent: Option<i64>,
    pub agents: Vec<AgentCount>,
    pub owner: Option<OwnerCounts>,
    /// The requested agent filter names nobody in `agents`; it was ignored.
    pub stale_agent_filter: bool,
}

fn shows_agent_counters(actor: &Actor) -> bool {
    actor.is_admin || (actor.is_agent && !actor.restricted)
}

/// Agents listed in the agent counters: the category's agents, or every
/// agent without a category. Empty for actors without agent counters.
fn visible_agents<S: TicketStore>(
    store: &mut S,
    actor: &Actor,
    category: Option<CategoryId>,
) -> HelpdeskResult<Vec<User>> {
    if !shows_agent_counters(actor) {
        return Ok(Vec::new());
    }
    match category {
        Some(id) => {
            let ids = store.category_agent_ids(id)?;
            store.users_by_ids(&ids)
        }
        None => store.agents(),
    }
}

/// `filters` with a stale agent filter removed. An agent filter is stale when
/// that agent is not among the agents the counters would list.
pub fn current_filters<S: TicketStore>(
    store: &mut S,
    actor: &Actor,
    filters: &FilterContext,
) -> HelpdeskResult<FilterContext> {
    let Some(agent_id) = filters.agent else {
        return Ok(filters.clone());
    };
    let agents = visible_agents(store, actor, filters.category)?;
    if agents.iter().any(|a| a.id == agent_id) {
        Ok(filters.clone())
    } else {
        debug!("Dropping agent filter {} outside the visible agents", agent_id);
        Ok(filters.without_agent())
    }
}

/// Counters shown next to the list filters.
///
/// Admins and unrestricted agents get per-category and per-agent totals.
/// Every staff member gets the "all" and "me" owner counters.
pub fn ticket_counts<S: TicketStore>(
    store: &mut S,
    actor: &Actor,
    filters: &FilterContext,
    complete: bool,
) -> HelpdeskResult<TicketCounts> {
    let mut counts = TicketCounts::default();
    let scope = visibility(actor);
    let category = filters.category;

    if shows_agent_counters(actor) {
        let total = store.count_tickets(&scope.apply(TicketQuery::new(complete)))?;
        counts.total_category = Some(total);

        let mut categories = store.categories()?;
        if !actor.is_admin {
            let served = store.agent_category_ids(actor.user_id)?;
            categories.retain(|c| served.contains(&c.id));
        }
        for c in categories {
            let tickets = store.count_tickets(&TicketQuery::new(complete).in_category(Some(c.id)))?;
            counts.categories.push(CategoryCount {
                id: c.id,
                name: c.name,
                color: c.color,
                tickets,
            });
        }

        counts.total_agent = Some(match category {
            Some(id) => counts
                .categories
                .iter()
                .find(|c| c.id == id)
                .map_or(0, |c| c.tickets),
            None => total,
        });

        for agent in visible_agents(store, actor, category)? {
            let query = scope.apply(
                TicketQuery::new(complete)
                    .in_category(category)
                    .assigned_to(agent.id),
            );
            counts.agents.push(AgentCount {
                id: agent.id,
                name: agent.name,
                tickets: store.count_tickets(&query)?,
            });
        }
    }

    let agent_filter = match filters.agent {
        Some(id) if counts.agents.iter().any(|a| a.id == id) => Some(id),
        Some(id) => {
            debug!("Dropping agent filter {} outside the visible agents", id);
            counts.stale_agent_filter = true;
            None
        }
        None => None,
    };

    if actor.is_staff() {
        let all = match (agent_filter, counts.total_agent) {
            (None, Some(total)) => total,
            (None, None) => store.count_tickets(
                &TicketQuery::new(complete)
                    .in_category(category)
                    .assigned_to(actor.user_id),
            )?,
            (Some(agent_id), _) => store.count_tickets(&scope.apply(
                TicketQuery::new(complete)
                    .in_category(category)
                    .assigned_to(agent_id),
            ))?,
        };
        let mut mine = TicketQuery::new(complete).owned_by(actor.user_id);
        if let Some(agent_id) = agent_filter {
            mine = mine.assigned_to(agent_id);
        }
        counts.owner = Some(OwnerCounts {
            all,
            me: store.count_tickets(&mine)?,
        });
    }

    Ok(counts)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentOption {
    pub value: AgentSelection,
    pub name: String,
    pub selected: bool,
}

/// "Auto Select" followed by the category's eligible agents. `selected`
/// flags the current agent, or "auto" when there is none.
pub fn agent_options<S: TicketStore>(
    store: &mut S,
    category_id: CategoryId,
    selected: Option<UserId>,
) -> HelpdeskResult<Vec<AgentOption>> {
    if store.find_category(category_id)?.is_none() {
        return Err(HelpdeskError::not_found("Category", category_id));
    }
    let ids = store.category_agent_ids(category_id)?;
    let agents = store.users_by_ids(&ids)?;

    let mut options = Vec::with_capacity(agents.len() + 1);
    options.push(AgentOption {
        value: AgentSelection::Auto,
        name: "Auto Select".to_string(),
        selected: selected.is_none(),
    });
    options.extend(agents.into_iter().map(|agent| AgentOption {
        value: AgentSelection::Agent(agent.id),
        selected: selected == Some(agent.id),
        name: agent.name,
    }));
    Ok(options)
}
