use serde::Serialize;

use super::error::{HelpdeskError, HelpdeskResult};
use super::listing::{agent_options, visibility, AgentOption};
use super::models::{Category, Comment, Priority, Status, Tag, Ticket, TicketId};
use super::permissions::{Actor, PermissionPolicy};
use super::settings::Settings;
use super::store::TicketStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryTags {
    pub category: Category,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateForm {
    pub priorities: Vec<Priority>,
    pub categories: Vec<Category>,
    pub category_tags: Vec<CategoryTags>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentsPage {
    pub items: Vec<Comment>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub last_page: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketDetail {
    pub ticket: Ticket,
    pub tags: Vec<Tag>,
    pub statuses: Vec<Status>,
    pub priorities: Vec<Priority>,
    pub categories: Vec<Category>,
    pub category_tags: Vec<CategoryTags>,
    pub close_perm: bool,
    pub reopen_perm: bool,
    pub agent_options: Vec<AgentOption>,
    pub comments: CommentsPage,
    /// Completed while holding a status other than the closing one.
    pub status_diverges: bool,
}

/// Categories that carry at least one tag, with those tags.
fn category_tags<S: TicketStore>(store: &mut S, categories: &[Category]) -> HelpdeskResult<Vec<CategoryTags>> {
    let mut out = Vec::new();
    for category in categories {
        let tags = store.category_tags(category.id)?;
        if !tags.is_empty() {
            out.push(CategoryTags {
                category: category.clone(),
                tags,
            });
        }
    }
    Ok(out)
}

pub fn create_form<S: TicketStore>(store: &mut S) -> HelpdeskResult<CreateForm> {
    let priorities = store.priorities()?;
    let categories = store.categories()?;
    let category_tags = category_tags(store, &categories)?;
    Ok(CreateForm {
        priorities,
        categories,
        category_tags,
    })
}

pub fn status_diverges(ticket: &Ticket, settings: &Settings) -> bool {
    ticket.is_complete() && settings.default_close_status_id != Some(ticket.status_id)
}

pub fn ticket_detail<S: TicketStore>(
    store: &mut S,
    actor: &Actor,
    settings: &Settings,
    id: TicketId,
    page: i64,
) -> HelpdeskResult<TicketDetail> {
    let ticket = store
        .find_ticket(id)?
        .ok_or_else(|| HelpdeskError::not_found("Ticket", id))?;
    if !visibility(actor).permits(&ticket) {
        return Err(HelpdeskError::Forbidden(format!(
            "user {} may not view ticket {}",
            actor.user_id, id
        )));
    }

    let policy = PermissionPolicy::from_settings(settings);
    let categories = store.categories()?;
    let category_tags = category_tags(store, &categories)?;

    let page = page.max(1);
    let per_page = settings.paginate_items.max(1);
    let (items, total) = store.comments_page(id, page, per_page)?;

    Ok(TicketDetail {
        tags: store.ticket_tags(id)?,
        statuses: store.statuses()?,
        priorities: store.priorities()?,
        categories,
        category_tags,
        close_perm: policy.can_close(actor, &ticket),
        reopen_perm: policy.can_reopen(actor, &ticket),
        agent_options: agent_options(store, ticket.category_id, ticket.agent_id)?,
        comments: CommentsPage {
            items,
            page,
            per_page,
            total,
            last_page: ((total + per_page - 1) / per_page).max(1),
        },
        status_diverges: status_diverges(&ticket, settings),
        ticket,
    })
}
