use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::shared::schema::{
    ticket_categories, ticket_comments, ticket_priorities, ticket_statuses, ticket_tags, tickets,
    users,
};

pub type TicketId = i64;
pub type UserId = i64;
pub type CategoryId = i64;
pub type TagId = i64;
pub type StatusId = i64;
pub type PriorityId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Identifiable, AsChangeset)]
#[diesel(table_name = tickets)]
#[diesel(treat_none_as_null = true)]
pub struct Ticket {
    pub id: TicketId,
    pub subject: String,
    pub content: String,
    pub html: Option<String>,
    pub status_id: StatusId,
    pub priority_id: PriorityId,
    pub user_id: UserId,
    pub agent_id: Option<UserId>,
    pub category_id: CategoryId,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = tickets)]
pub struct NewTicket {
    pub subject: String,
    pub content: String,
    pub html: Option<String>,
    pub status_id: StatusId,
    pub priority_id: PriorityId,
    pub user_id: UserId,
    pub agent_id: Option<UserId>,
    pub category_id: CategoryId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub is_agent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = ticket_statuses)]
pub struct Status {
    pub id: StatusId,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = ticket_priorities)]
pub struct Priority {
    pub id: PriorityId,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = ticket_categories)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = ticket_tags)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub bg_color: Option<String>,
    pub text_color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = ticket_comments)]
pub struct Comment {
    pub id: i64,
    pub ticket_id: TicketId,
    pub user_id: UserId,
    pub content: String,
    pub html: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
