use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::{page_offset, TicketQuery, TicketStore};
use crate::tickets::error::HelpdeskResult;
use crate::tickets::models::{
    Category, CategoryId, Comment, NewTicket, Priority, PriorityId, Status, StatusId, Tag, TagId,
    Ticket, TicketId, User, UserId,
};
use crate::tickets::settings::SettingKey;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    settings: BTreeMap<String, String>,
    users: BTreeMap<UserId, User>,
    statuses: BTreeMap<StatusId, Status>,
    priorities: BTreeMap<PriorityId, Priority>,
    categories: BTreeMap<CategoryId, Category>,
    category_agents: BTreeSet<(CategoryId, UserId)>,
    tickets: BTreeMap<TicketId, Ticket>,
    tags: BTreeMap<TagId, Tag>,
    category_tags: BTreeSet<(CategoryId, TagId)>,
    ticket_tags: BTreeSet<(TicketId, TagId)>,
    comments: BTreeMap<i64, Comment>,
    last_id: i64,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

/// Process-local store. A transaction snapshots the whole state and puts it
/// back when the closure fails.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: MemoryState,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding the statuses, priorities and settings rows that the
    /// initial migration seeds.
    pub fn seeded() -> Self {
        let mut store = Self::new();
        store.add_status("Pending", "#e69900");
        store.add_status("Solved", "#15a000");
        store.add_status("Bug", "#f40700");
        store.add_priority("Low", "#069900");
        store.add_priority("Normal", "#e1d200");
        store.add_priority("Critical", "#e10000");
        store.set_setting(SettingKey::DefaultStatusId, "1");
        store
    }

    pub fn set_setting(&mut self, key: SettingKey, value: &str) {
        self.state
            .settings
            .insert(key.as_str().to_string(), value.to_string());
    }

    pub fn add_user(&mut self, name: &str, is_admin: bool, is_agent: bool) -> User {
        let id = self.state.next_id();
        let user = User {
            id,
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            is_admin,
            is_agent,
        };
        self.state.users.insert(id, user.clone());
        user
    }

    pub fn add_status(&mut self, name: &str, color: &str) -> Status {
        let id = self.state.next_id();
        let status = Status {
            id,
            name: name.to_string(),
            color: color.to_string(),
        };
        self.state.statuses.insert(id, status.clone());
        status
    }

    pub fn add_priority(&mut self, name: &str, color: &str) -> Priority {
        let id = self.state.next_id();
        let priority = Priority {
            id,
            name: name.to_string(),
            color: color.to_string(),
        };
        self.state.priorities.insert(id, priority.clone());
        priority
    }

    pub fn add_category(&mut self, name: &str, color: &str) -> Category {
        let id = self.state.next_id();
        let category = Category {
            id,
            name: name.to_string(),
            color: color.to_string(),
        };
        self.state.categories.insert(id, category.clone());
        category
    }

    pub fn add_category_agent(&mut self, category_id: CategoryId, user_id: UserId) {
        self.state.category_agents.insert((category_id, user_id));
    }

    pub fn add_tag(&mut self, name: &str) -> Tag {
        let id = self.state.next_id();
        let tag = Tag {
            id,
            name: name.to_string(),
            bg_color: None,
            text_color: None,
        };
        self.state.tags.insert(id, tag.clone());
        tag
    }

    pub fn link_category_tag(&mut self, category_id: CategoryId, tag_id: TagId) {
        self.state.category_tags.insert((category_id, tag_id));
    }

    pub fn link_ticket_tag(&mut self, ticket_id: TicketId, tag_id: TagId) {
        self.state.ticket_tags.insert((ticket_id, tag_id));
    }

    pub fn add_comment(&mut self, ticket_id: TicketId, user_id: UserId, content: &str) -> Comment {
        let id = self.state.next_id();
        let now = Utc::now();
        let comment = Comment {
            id,
            ticket_id,
            user_id,
            content: content.to_string(),
            html: Some(content.to_string()),
            created_at: now,
            updated_at: now,
        };
        self.state.comments.insert(id, comment.clone());
        comment
    }

    pub fn tag_exists(&self, tag_id: TagId) -> bool {
        self.state.tags.contains_key(&tag_id)
    }

    pub fn ticket_count(&self) -> usize {
        self.state.tickets.len()
    }

    pub fn comment_count(&self) -> usize {
        self.state.comments.len()
    }

    pub fn linked_tag_ids(&self, ticket_id: TicketId) -> BTreeSet<TagId> {
        self.state
            .ticket_tags
            .iter()
            .filter(|(t, _)| *t == ticket_id)
            .map(|(_, tag)| *tag)
            .collect()
    }

    fn tagged(&self, ids: impl Iterator<Item = TagId>) -> Vec<Tag> {
        let mut tags: Vec<Tag> = ids
            .filter_map(|id| self.state.tags.get(&id).cloned())
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        tags
    }
}

impl TicketStore for MemoryStore {
    fn transaction<T, F>(&mut self, f: F) -> HelpdeskResult<T>
    where
        F: FnOnce(&mut Self) -> HelpdeskResult<T>,
    {
        let snapshot = self.state.clone();
        let result = f(self);
        if result.is_err() {
            self.state = snapshot;
        }
        result
    }

    fn setting_pairs(&mut self) -> HelpdeskResult<Vec<(String, String)>> {
        Ok(self
            .state
            .settings
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn find_ticket(&mut self, id: TicketId) -> HelpdeskResult<Option<Ticket>> {
        Ok(self.state.tickets.get(&id).cloned())
    }

    fn find_user(&mut self, id: UserId) -> HelpdeskResult<Option<User>> {
        Ok(self.state.users.get(&id).cloned())
    }

    fn find_category(&mut self, id: CategoryId) -> HelpdeskResult<Option<Category>> {
        Ok(self.state.categories.get(&id).cloned())
    }

    fn find_status(&mut self, id: StatusId) -> HelpdeskResult<Option<Status>> {
        Ok(self.state.statuses.get(&id).cloned())
    }

    fn find_priority(&mut self, id: PriorityId) -> HelpdeskResult<Option<Priority>> {
        Ok(self.state.priorities.get(&id).cloned())
    }

    fn statuses(&mut self) -> HelpdeskResult<Vec<Status>> {
        Ok(self.state.statuses.values().cloned().collect())
    }

    fn priorities(&mut self) -> HelpdeskResult<Vec<Priority>> {
        Ok(self.state.priorities.values().cloned().collect())
    }

    fn categories(&mut self) -> HelpdeskResult<Vec<Category>> {
        let mut categories: Vec<Category> = self.state.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(categories)
    }

    fn users_by_ids(&mut self, ids: &[UserId]) -> HelpdeskResult<Vec<User>> {
        Ok(ids
            .iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter_map(|id| self.state.users.get(id).cloned())
            .collect())
    }

    fn agents(&mut self) -> HelpdeskResult<Vec<User>> {
        Ok(self
            .state
            .users
            .values()
            .filter(|u| u.is_agent)
            .cloned()
            .collect())
    }

    fn category_agent_ids(&mut self, category_id: CategoryId) -> HelpdeskResult<Vec<UserId>> {
        Ok(self
            .state
            .category_agents
            .iter()
            .filter(|(c, _)| *c == category_id)
            .map(|(_, u)| *u)
            .filter(|u| self.state.users.get(u).is_some_and(|user| user.is_agent))
            .collect())
    }

    fn agent_category_ids(&mut self, agent_id: UserId) -> HelpdeskResult<Vec<CategoryId>> {
        let ids: BTreeSet<CategoryId> = self
            .state
            .category_agents
            .iter()
            .filter(|(_, u)| *u == agent_id)
            .map(|(c, _)| *c)
            .collect();
        Ok(ids.into_iter().collect())
    }

    fn open_ticket_counts(
        &mut self,
        agent_ids: &[UserId],
        excluding: Option<TicketId>,
    ) -> HelpdeskResult<HashMap<UserId, i64>> {
        let mut counts = HashMap::new();
        for ticket in self.state.tickets.values() {
            if ticket.is_complete() || Some(ticket.id) == excluding {
                continue;
            }
            if let Some(agent_id) = ticket.agent_id.filter(|a| agent_ids.contains(a)) {
                *counts.entry(agent_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    fn insert_ticket(&mut self, ticket: &NewTicket) -> HelpdeskResult<Ticket> {
        let id = self.state.next_id();
        let stored = Ticket {
            id,
            subject: ticket.subject.clone(),
            content: ticket.content.clone(),
            html: ticket.html.clone(),
            status_id: ticket.status_id,
            priority_id: ticket.priority_id,
            user_id: ticket.user_id,
            agent_id: ticket.agent_id,
            category_id: ticket.category_id,
            completed_at: None,
            created_at: ticket.created_at,
            updated_at: ticket.updated_at,
        };
        self.state.tickets.insert(id, stored.clone());
        Ok(stored)
    }

    fn save_ticket(&mut self, ticket: &Ticket) -> HelpdeskResult<()> {
        self.state.tickets.insert(ticket.id, ticket.clone());
        Ok(())
    }

    fn delete_ticket(&mut self, id: TicketId) -> HelpdeskResult<bool> {
        self.state.comments.retain(|_, c| c.ticket_id != id);
        self.state.ticket_tags.retain(|(t, _)| *t != id);
        Ok(self.state.tickets.remove(&id).is_some())
    }

    fn query_tickets(&mut self, query: &TicketQuery) -> HelpdeskResult<Vec<Ticket>> {
        let mut tickets: Vec<Ticket> = self
            .state
            .tickets
            .values()
            .filter(|t| query.matches(t))
            .cloned()
            .collect();
        tickets.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(tickets)
    }

    fn count_tickets(&mut self, query: &TicketQuery) -> HelpdeskResult<i64> {
        Ok(self
            .state
            .tickets
            .values()
            .filter(|t| query.matches(t))
            .count() as i64)
    }

    fn tickets_completed_between(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        category_id: Option<CategoryId>,
    ) -> HelpdeskResult<Vec<Ticket>> {
        Ok(self
            .state
            .tickets
            .values()
            .filter(|t| t.completed_at.is_some_and(|at| at >= from && at <= to))
            .filter(|t| category_id.map_or(true, |c| t.category_id == c))
            .cloned()
            .collect())
    }

    fn ticket_tags(&mut self, ticket_id: TicketId) -> HelpdeskResult<Vec<Tag>> {
        let ids = self.linked_tag_ids(ticket_id);
        Ok(self.tagged(ids.into_iter()))
    }

    fn category_tags(&mut self, category_id: CategoryId) -> HelpdeskResult<Vec<Tag>> {
        let ids: Vec<TagId> = self
            .state
            .category_tags
            .iter()
            .filter(|(c, _)| *c == category_id)
            .map(|(_, t)| *t)
            .collect();
        Ok(self.tagged(ids.into_iter()))
    }

    fn free_tag_ids(&mut self, ticket_id: TicketId) -> HelpdeskResult<Vec<TagId>> {
        let in_category: BTreeSet<TagId> =
            self.state.category_tags.iter().map(|(_, t)| *t).collect();
        Ok(self
            .linked_tag_ids(ticket_id)
            .into_iter()
            .filter(|t| !in_category.contains(t))
            .collect())
    }

    fn replace_ticket_tags(
        &mut self,
        ticket_id: TicketId,
        tag_ids: &BTreeSet<TagId>,
    ) -> HelpdeskResult<()> {
        self.state.ticket_tags.retain(|(t, _)| *t != ticket_id);
        self.state
            .ticket_tags
            .extend(tag_ids.iter().map(|tag| (ticket_id, *tag)));
        Ok(())
    }

    fn purge_orphan_tags(&mut self) -> HelpdeskResult<usize> {
        let linked: BTreeSet<TagId> = self
            .state
            .category_tags
            .iter()
            .map(|(_, t)| *t)
            .chain(self.state.ticket_tags.iter().map(|(_, t)| *t))
            .collect();
        let before = self.state.tags.len();
        self.state.tags.retain(|id, _| linked.contains(id));
        Ok(before - self.state.tags.len())
    }

    fn comments_page(
        &mut self,
        ticket_id: TicketId,
        page: i64,
        per_page: i64,
    ) -> HelpdeskResult<(Vec<Comment>, i64)> {
        let mut comments: Vec<&Comment> = self
            .state
            .comments
            .values()
            .filter(|c| c.ticket_id == ticket_id)
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        let total = comments.len() as i64;
        let skip = usize::try_from(page_offset(page, per_page)).unwrap_or(usize::MAX);
        let page = comments
            .into_iter()
            .skip(skip)
            .take(per_page.max(1) as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }
}
