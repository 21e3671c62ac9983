use chrono::{DateTime, Utc};
use diesel::connection::{AnsiTransactionManager, TransactionManager};
use diesel::pg::Pg;
use diesel::prelude::*;
use log::{debug, warn};
use std::collections::{BTreeSet, HashMap};

use super::{page_offset, TicketQuery, TicketStore};
use crate::shared::schema::{
    ticket_categories, ticket_category_agents, ticket_category_tags, ticket_comments,
    ticket_priorities, ticket_settings, ticket_statuses, ticket_taggables, ticket_tags, tickets,
    users,
};
use crate::shared::utils::{DbConn, DbPool};
use crate::tickets::error::HelpdeskResult;
use crate::tickets::models::{
    Category, CategoryId, Comment, NewTicket, Priority, PriorityId, Status, StatusId, Tag, TagId,
    Ticket, TicketId, User, UserId,
};

/// Postgres-backed store holding one pooled connection for the duration of a
/// request.
pub struct PgStore {
    conn: DbConn,
    depth: u32,
}

impl PgStore {
    pub fn new(conn: DbConn) -> Self {
        Self { conn, depth: 0 }
    }

    pub fn from_pool(pool: &DbPool) -> HelpdeskResult<Self> {
        Ok(Self::new(pool.get()?))
    }

    fn filtered(query: &TicketQuery) -> tickets::BoxedQuery<'static, Pg> {
        let mut q = tickets::table.into_boxed();
        q = if query.complete {
            q.filter(tickets::completed_at.is_not_null())
        } else {
            q.filter(tickets::completed_at.is_null())
        };
        if let Some(category_id) = query.category_id {
            q = q.filter(tickets::category_id.eq(category_id));
        }
        if let Some(agent_id) = query.agent_id {
            q = q.filter(tickets::agent_id.eq(agent_id));
        }
        if let Some(owner_id) = query.owner_id {
            q = q.filter(tickets::user_id.eq(owner_id));
        }
        if let Some(user_id) = query.agent_or_owner {
            q = q.filter(
                tickets::agent_id
                    .eq(user_id)
                    .or(tickets::user_id.eq(user_id)),
            );
        }
        q
    }
}

impl TicketStore for PgStore {
    fn transaction<T, F>(&mut self, f: F) -> HelpdeskResult<T>
    where
        F: FnOnce(&mut Self) -> HelpdeskResult<T>,
    {
        let outermost = self.depth == 0;
        AnsiTransactionManager::begin_transaction(&mut *self.conn)?;
        if outermost {
            if let Err(e) = diesel::sql_query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
                .execute(&mut *self.conn)
            {
                if let Err(rollback) = AnsiTransactionManager::rollback_transaction(&mut *self.conn)
                {
                    warn!("Rollback after failed isolation setup failed: {}", rollback);
                }
                return Err(e.into());
            }
        }

        self.depth += 1;
        let result = f(self);
        self.depth -= 1;

        match result {
            Ok(value) => {
                AnsiTransactionManager::commit_transaction(&mut *self.conn)?;
                Ok(value)
            }
            Err(err) => {
                debug!("Rolling back ticket transaction: {}", err);
                if let Err(rollback) = AnsiTransactionManager::rollback_transaction(&mut *self.conn)
                {
                    warn!("Rollback failed: {}", rollback);
                }
                Err(err)
            }
        }
    }

    fn setting_pairs(&mut self) -> HelpdeskResult<Vec<(String, String)>> {
        Ok(ticket_settings::table
            .select((ticket_settings::slug, ticket_settings::value))
            .load::<(String, String)>(&mut *self.conn)?)
    }

    fn find_ticket(&mut self, id: TicketId) -> HelpdeskResult<Option<Ticket>> {
        Ok(tickets::table
            .find(id)
            .first::<Ticket>(&mut *self.conn)
            .optional()?)
    }

    fn find_user(&mut self, id: UserId) -> HelpdeskResult<Option<User>> {
        Ok(users::table
            .find(id)
            .first::<User>(&mut *self.conn)
            .optional()?)
    }

    fn find_category(&mut self, id: CategoryId) -> HelpdeskResult<Option<Category>> {
        Ok(ticket_categories::table
            .find(id)
            .first::<Category>(&mut *self.conn)
            .optional()?)
    }

    fn find_status(&mut self, id: StatusId) -> HelpdeskResult<Option<Status>> {
        Ok(ticket_statuses::table
            .find(id)
            .first::<Status>(&mut *self.conn)
            .optional()?)
    }

    fn find_priority(&mut self, id: PriorityId) -> HelpdeskResult<Option<Priority>> {
        Ok(ticket_priorities::table
            .find(id)
            .first::<Priority>(&mut *self.conn)
            .optional()?)
    }

    fn statuses(&mut self) -> HelpdeskResult<Vec<Status>> {
        Ok(ticket_statuses::table
            .order(ticket_statuses::id.asc())
            .load::<Status>(&mut *self.conn)?)
    }

    fn priorities(&mut self) -> HelpdeskResult<Vec<Priority>> {
        Ok(ticket_priorities::table
            .order(ticket_priorities::id.asc())
            .load::<Priority>(&mut *self.conn)?)
    }

    fn categories(&mut self) -> HelpdeskResult<Vec<Category>> {
        Ok(ticket_categories::table
            .order((ticket_categories::name.asc(), ticket_categories::id.asc()))
            .load::<Category>(&mut *self.conn)?)
    }

    fn users_by_ids(&mut self, ids: &[UserId]) -> HelpdeskResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(users::table
            .filter(users::id.eq_any(ids.to_vec()))
            .order(users::id.asc())
            .load::<User>(&mut *self.conn)?)
    }

    fn agents(&mut self) -> HelpdeskResult<Vec<User>> {
        Ok(users::table
            .filter(users::is_agent.eq(true))
            .order(users::id.asc())
            .load::<User>(&mut *self.conn)?)
    }

    fn category_agent_ids(&mut self, category_id: CategoryId) -> HelpdeskResult<Vec<UserId>> {
        Ok(ticket_category_agents::table
            .filter(ticket_category_agents::category_id.eq(category_id))
            .filter(
                ticket_category_agents::user_id
                    .eq_any(users::table.filter(users::is_agent.eq(true)).select(users::id)),
            )
            .select(ticket_category_agents::user_id)
            .order(ticket_category_agents::user_id.asc())
            .load::<UserId>(&mut *self.conn)?)
    }

    fn agent_category_ids(&mut self, agent_id: UserId) -> HelpdeskResult<Vec<CategoryId>> {
        Ok(ticket_category_agents::table
            .filter(ticket_category_agents::user_id.eq(agent_id))
            .select(ticket_category_agents::category_id)
            .order(ticket_category_agents::category_id.asc())
            .load::<CategoryId>(&mut *self.conn)?)
    }

    fn open_ticket_counts(
        &mut self,
        agent_ids: &[UserId],
        excluding: Option<TicketId>,
    ) -> HelpdeskResult<HashMap<UserId, i64>> {
        if agent_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut query = tickets::table
            .filter(tickets::completed_at.is_null())
            .filter(tickets::agent_id.eq_any(agent_ids.to_vec()))
            .select(tickets::agent_id)
            .into_boxed();
        if let Some(ticket_id) = excluding {
            query = query.filter(tickets::id.ne(ticket_id));
        }
        let assigned = query.load::<Option<UserId>>(&mut *self.conn)?;

        let mut counts = HashMap::new();
        for agent_id in assigned.into_iter().flatten() {
            *counts.entry(agent_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn insert_ticket(&mut self, ticket: &NewTicket) -> HelpdeskResult<Ticket> {
        Ok(diesel::insert_into(tickets::table)
            .values(ticket)
            .get_result::<Ticket>(&mut *self.conn)?)
    }

    fn save_ticket(&mut self, ticket: &Ticket) -> HelpdeskResult<()> {
        diesel::update(ticket)
            .set(ticket)
            .execute(&mut *self.conn)?;
        Ok(())
    }

    fn delete_ticket(&mut self, id: TicketId) -> HelpdeskResult<bool> {
        diesel::delete(ticket_comments::table.filter(ticket_comments::ticket_id.eq(id)))
            .execute(&mut *self.conn)?;
        diesel::delete(ticket_taggables::table.filter(ticket_taggables::ticket_id.eq(id)))
            .execute(&mut *self.conn)?;
        let deleted = diesel::delete(tickets::table.find(id)).execute(&mut *self.conn)?;
        Ok(deleted > 0)
    }

    fn query_tickets(&mut self, query: &TicketQuery) -> HelpdeskResult<Vec<Ticket>> {
        Ok(Self::filtered(query)
            .order((tickets::updated_at.desc(), tickets::id.desc()))
            .load::<Ticket>(&mut *self.conn)?)
    }

    fn count_tickets(&mut self, query: &TicketQuery) -> HelpdeskResult<i64> {
        Ok(Self::filtered(query)
            .count()
            .get_result::<i64>(&mut *self.conn)?)
    }

    fn tickets_completed_between(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        category_id: Option<CategoryId>,
    ) -> HelpdeskResult<Vec<Ticket>> {
        let mut query = tickets::table
            .filter(tickets::completed_at.between(from, to))
            .into_boxed();
        if let Some(category_id) = category_id {
            query = query.filter(tickets::category_id.eq(category_id));
        }
        Ok(query.load::<Ticket>(&mut *self.conn)?)
    }

    fn ticket_tags(&mut self, ticket_id: TicketId) -> HelpdeskResult<Vec<Tag>> {
        Ok(ticket_tags::table
            .filter(
                ticket_tags::id.eq_any(
                    ticket_taggables::table
                        .filter(ticket_taggables::ticket_id.eq(ticket_id))
                        .select(ticket_taggables::tag_id),
                ),
            )
            .order((ticket_tags::name.asc(), ticket_tags::id.asc()))
            .load::<Tag>(&mut *self.conn)?)
    }

    fn category_tags(&mut self, category_id: CategoryId) -> HelpdeskResult<Vec<Tag>> {
        Ok(ticket_tags::table
            .filter(
                ticket_tags::id.eq_any(
                    ticket_category_tags::table
                        .filter(ticket_category_tags::category_id.eq(category_id))
                        .select(ticket_category_tags::tag_id),
                ),
            )
            .order((ticket_tags::name.asc(), ticket_tags::id.asc()))
            .load::<Tag>(&mut *self.conn)?)
    }

    fn free_tag_ids(&mut self, ticket_id: TicketId) -> HelpdeskResult<Vec<TagId>> {
        Ok(ticket_taggables::table
            .filter(ticket_taggables::ticket_id.eq(ticket_id))
            .filter(
                ticket_taggables::tag_id
                    .ne_all(ticket_category_tags::table.select(ticket_category_tags::tag_id)),
            )
            .select(ticket_taggables::tag_id)
            .order(ticket_taggables::tag_id.asc())
            .load::<TagId>(&mut *self.conn)?)
    }

    fn replace_ticket_tags(
        &mut self,
        ticket_id: TicketId,
        tag_ids: &BTreeSet<TagId>,
    ) -> HelpdeskResult<()> {
        diesel::delete(ticket_taggables::table.filter(ticket_taggables::ticket_id.eq(ticket_id)))
            .execute(&mut *self.conn)?;
        if tag_ids.is_empty() {
            return Ok(());
        }
        let rows: Vec<_> = tag_ids
            .iter()
            .map(|tag_id| {
                (
                    ticket_taggables::ticket_id.eq(ticket_id),
                    ticket_taggables::tag_id.eq(*tag_id),
                )
            })
            .collect();
        diesel::insert_into(ticket_taggables::table)
            .values(&rows)
            .execute(&mut *self.conn)?;
        Ok(())
    }

    fn purge_orphan_tags(&mut self) -> HelpdeskResult<usize> {
        Ok(diesel::delete(
            ticket_tags::table
                .filter(
                    ticket_tags::id
                        .ne_all(ticket_category_tags::table.select(ticket_category_tags::tag_id)),
                )
                .filter(
                    ticket_tags::id.ne_all(ticket_taggables::table.select(ticket_taggables::tag_id)),
                ),
        )
        .execute(&mut *self.conn)?)
    }

    fn comments_page(
        &mut self,
        ticket_id: TicketId,
        page: i64,
        per_page: i64,
    ) -> HelpdeskResult<(Vec<Comment>, i64)> {
        let per_page = per_page.max(1);
        let offset = page_offset(page, per_page);
        let comments = ticket_comments::table
            .filter(ticket_comments::ticket_id.eq(ticket_id))
            .order((ticket_comments::created_at.asc(), ticket_comments::id.asc()))
            .limit(per_page)
            .offset(offset)
            .load::<Comment>(&mut *self.conn)?;
        let total = ticket_comments::table
            .filter(ticket_comments::ticket_id.eq(ticket_id))
            .count()
            .get_result::<i64>(&mut *self.conn)?;
        Ok((comments, total))
    }
}
