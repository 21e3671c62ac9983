//! Persistence seam of the ticket core.
//!
//! Every rule in this crate talks to storage through [`TicketStore`]. The
//! Postgres implementation backs the server; the in-memory one backs tests
//! and embedders that keep their own persistence.

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};

use super::error::HelpdeskResult;
use super::models::{
    Category, CategoryId, Comment, NewTicket, Priority, PriorityId, Status, StatusId, Tag, TagId,
    Ticket, TicketId, User, UserId,
};

/// Which tickets a listing or count covers. Every set field narrows the
/// result; `agent_or_owner` keeps tickets assigned to or owned by that user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketQuery {
    pub complete: bool,
    pub category_id: Option<CategoryId>,
    pub agent_id: Option<UserId>,
    pub owner_id: Option<UserId>,
    pub agent_or_owner: Option<UserId>,
}

impl TicketQuery {
    pub fn new(complete: bool) -> Self {
        Self {
            complete,
            ..Self::default()
        }
    }

    pub fn in_category(mut self, category_id: Option<CategoryId>) -> Self {
        if category_id.is_some() {
            self.category_id = category_id;
        }
        self
    }

    pub fn assigned_to(mut self, agent_id: UserId) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    pub fn owned_by(mut self, owner_id: UserId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn assigned_to_or_owned_by(mut self, user_id: UserId) -> Self {
        self.agent_or_owner = Some(user_id);
        self
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        ticket.is_complete() == self.complete
            && self.category_id.map_or(true, |c| ticket.category_id == c)
            && self.agent_id.map_or(true, |a| ticket.agent_id == Some(a))
            && self.owner_id.map_or(true, |o| ticket.user_id == o)
            && self
                .agent_or_owner
                .map_or(true, |u| ticket.agent_id == Some(u) || ticket.user_id == u)
    }
}

pub trait TicketStore {
    /// Runs `f` as one unit of work: committed when it returns `Ok`, rolled
    /// back otherwise.
    fn transaction<T, F>(&mut self, f: F) -> HelpdeskResult<T>
    where
        F: FnOnce(&mut Self) -> HelpdeskResult<T>,
        Self: Sized;

    fn setting_pairs(&mut self) -> HelpdeskResult<Vec<(String, String)>>;

    fn find_ticket(&mut self, id: TicketId) -> HelpdeskResult<Option<Ticket>>;
    fn find_user(&mut self, id: UserId) -> HelpdeskResult<Option<User>>;
    fn find_category(&mut self, id: CategoryId) -> HelpdeskResult<Option<Category>>;
    fn find_status(&mut self, id: StatusId) -> HelpdeskResult<Option<Status>>;
    fn find_priority(&mut self, id: PriorityId) -> HelpdeskResult<Option<Priority>>;

    fn statuses(&mut self) -> HelpdeskResult<Vec<Status>>;
    fn priorities(&mut self) -> HelpdeskResult<Vec<Priority>>;
    /// All categories, name ascending.
    fn categories(&mut self) -> HelpdeskResult<Vec<Category>>;
    fn users_by_ids(&mut self, ids: &[UserId]) -> HelpdeskResult<Vec<User>>;
    /// Users flagged as agents, id ascending.
    fn agents(&mut self) -> HelpdeskResult<Vec<User>>;

    /// Agents eligible for a category, id ascending.
    fn category_agent_ids(&mut self, category_id: CategoryId) -> HelpdeskResult<Vec<UserId>>;
    fn agent_category_ids(&mut self, agent_id: UserId) -> HelpdeskResult<Vec<CategoryId>>;
    /// Open tickets assigned to each of `agent_ids`; agents without any are
    /// absent from the map.
    fn open_ticket_counts(
        &mut self,
        agent_ids: &[UserId],
        excluding: Option<TicketId>,
    ) -> HelpdeskResult<HashMap<UserId, i64>>;

    fn insert_ticket(&mut self, ticket: &NewTicket) -> HelpdeskResult<Ticket>;
    fn save_ticket(&mut self, ticket: &Ticket) -> HelpdeskResult<()>;
    /// Deletes the ticket with its comments and tag links.
    fn delete_ticket(&mut self, id: TicketId) -> HelpdeskResult<bool>;
    /// Matching tickets, most recently updated first.
    fn query_tickets(&mut self, query: &TicketQuery) -> HelpdeskResult<Vec<Ticket>>;
    fn count_tickets(&mut self, query: &TicketQuery) -> HelpdeskResult<i64>;
    /// Tickets whose `completed_at` lies in `[from, to]`.
    fn tickets_completed_between(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        category_id: Option<CategoryId>,
    ) -> HelpdeskResult<Vec<Ticket>>;

    fn ticket_tags(&mut self, ticket_id: TicketId) -> HelpdeskResult<Vec<Tag>>;
    fn category_tags(&mut self, category_id: CategoryId) -> HelpdeskResult<Vec<Tag>>;
    /// Tags linked to this ticket that belong to no category.
    fn free_tag_ids(&mut self, ticket_id: TicketId) -> HelpdeskResult<Vec<TagId>>;
    fn replace_ticket_tags(
        &mut self,
        ticket_id: TicketId,
        tag_ids: &BTreeSet<TagId>,
    ) -> HelpdeskResult<()>;
    /// Deletes every tag linked to no category and no ticket at the time of
    /// the delete; returns how many went.
    fn purge_orphan_tags(&mut self) -> HelpdeskResult<usize>;

    /// One page (1-based) of a ticket's comments, oldest first, plus the total.
    fn comments_page(
        &mut self,
        ticket_id: TicketId,
        page: i64,
        per_page: i64,
    ) -> HelpdeskResult<(Vec<Comment>, i64)>;
}

/// Rows to skip before a 1-based page. Saturates instead of overflowing on
/// absurd page numbers.
pub fn page_offset(page: i64, per_page: i64) -> i64 {
    (page.max(1) - 1).saturating_mul(per_page.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket(category_id: CategoryId, user_id: UserId, agent_id: Option<UserId>) -> Ticket {
        let now = Utc::now();
        Ticket {
            id: 1,
            subject: "VPN down".into(),
            content: "Cannot connect".into(),
            html: None,
            status_id: 1,
            priority_id: 1,
            user_id,
            agent_id,
            category_id,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_query_matches() {
        let t = ticket(3, 10, Some(20));
        assert!(TicketQuery::new(false).matches(&t));
        assert!(!TicketQuery::new(true).matches(&t));
        assert!(TicketQuery::new(false).in_category(Some(3)).matches(&t));
        assert!(!TicketQuery::new(false).in_category(Some(4)).matches(&t));
        assert!(TicketQuery::new(false).in_category(None).matches(&t));
        assert!(TicketQuery::new(false).assigned_to(20).matches(&t));
        assert!(!TicketQuery::new(false).owned_by(20).matches(&t));
        assert!(TicketQuery::new(false).assigned_to_or_owned_by(10).matches(&t));
        assert!(TicketQuery::new(false).assigned_to_or_owned_by(20).matches(&t));
        assert!(!TicketQuery::new(false).assigned_to_or_owned_by(30).matches(&t));
    }

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(1, 10), 0);
        assert_eq!(page_offset(0, 10), 0);
        assert_eq!(page_offset(3, 10), 20);
        assert_eq!(page_offset(i64::MAX, 10), i64::MAX);
        assert_eq!(page_offset(i64::MIN, 10), 0);
    }
}
