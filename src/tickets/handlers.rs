use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    routing::{get, post},
    Json, Router,
};
use log::{debug, error};
use serde::Deserialize;
use std::sync::Arc;

use super::error::{HelpdeskError, HelpdeskResult};
use super::lifecycle::{TicketChanges, TicketDraft, TicketLifecycle};
use super::listing::{self, AgentOption, FilterContext, OwnerFilter, TicketCounts, TicketRow};
use super::models::{CategoryId, Ticket, TicketId, UserId};
use super::performance::{self, PerformanceReport, DEFAULT_PERIOD_MONTHS};
use super::permissions::Actor;
use super::settings::Settings;
use super::store::{PgStore, TicketStore};
use super::views::{self, CreateForm, TicketDetail};
use crate::shared::state::AppState;

/// Header carrying the authenticated user id, set by the fronting proxy.
pub const USER_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub UserId);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = HelpdeskError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<UserId>().ok())
            .map(CurrentUser)
            .ok_or(HelpdeskError::Unauthenticated)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub category: Option<CategoryId>,
    pub agent: Option<UserId>,
    #[serde(default)]
    pub owner: OwnerFilter,
    #[serde(default)]
    pub complete: bool,
}

impl ListParams {
    fn filters(&self) -> FilterContext {
        FilterContext {
            category: self.category,
            agent: self.agent,
            owner: self.owner,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeriodParams {
    pub period: Option<u32>,
}

/// Everything a request needs once it is on the blocking pool.
struct RequestContext {
    store: PgStore,
    settings: Settings,
}

impl RequestContext {
    fn actor(&mut self, user: CurrentUser) -> HelpdeskResult<Actor> {
        let found = self.store.find_user(user.0)?;
        let user = found.ok_or(HelpdeskError::Unauthenticated)?;
        Ok(Actor::from_user(&user, &self.settings))
    }
}

/// Runs `f` with a pooled store and freshly loaded settings on the blocking
/// pool.
async fn run_blocking<T, F>(state: &Arc<AppState>, f: F) -> HelpdeskResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut RequestContext) -> HelpdeskResult<T> + Send + 'static,
{
    let pool = state.conn.clone();
    tokio::task::spawn_blocking(move || {
        let mut store = PgStore::from_pool(&pool)?;
        let settings = Settings::load(&mut store)?;
        let mut ctx = RequestContext { store, settings };
        f(&mut ctx)
    })
    .await
    .map_err(|e| {
        error!("Ticket task panicked or was cancelled: {}", e);
        HelpdeskError::Internal(e.to_string())
    })?
}

fn require_staff(actor: &Actor) -> HelpdeskResult<()> {
    if actor.is_staff() {
        Ok(())
    } else {
        Err(HelpdeskError::Forbidden(format!(
            "user {} is neither agent nor admin",
            actor.user_id
        )))
    }
}

fn require_admin(actor: &Actor) -> HelpdeskResult<()> {
    if actor.is_admin {
        Ok(())
    } else {
        Err(HelpdeskError::Forbidden(format!(
            "user {} is not an admin",
            actor.user_id
        )))
    }
}

pub async fn list_open_tickets(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(params): Query<ListParams>,
) -> HelpdeskResult<Json<Vec<TicketRow>>> {
    list(state, user, params.filters(), false).await
}

pub async fn list_complete_tickets(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(params): Query<ListParams>,
) -> HelpdeskResult<Json<Vec<TicketRow>>> {
    list(state, user, params.filters(), true).await
}

async fn list(
    state: Arc<AppState>,
    user: CurrentUser,
    filters: FilterContext,
    complete: bool,
) -> HelpdeskResult<Json<Vec<TicketRow>>> {
    let rows = run_blocking(&state, move |ctx| {
        let actor = ctx.actor(user)?;
        let filters = listing::current_filters(&mut ctx.store, &actor, &filters)?;
        listing::list_tickets(&mut ctx.store, &actor, &filters, complete)
    })
    .await?;
    Ok(Json(rows))
}

pub async fn ticket_counts(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(params): Query<ListParams>,
) -> HelpdeskResult<Json<TicketCounts>> {
    let counts = run_blocking(&state, move |ctx| {
        let actor = ctx.actor(user)?;
        listing::ticket_counts(&mut ctx.store, &actor, &params.filters(), params.complete)
    })
    .await?;
    Ok(Json(counts))
}

pub async fn create_form(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> HelpdeskResult<Json<CreateForm>> {
    let form = run_blocking(&state, move |ctx| {
        ctx.actor(user)?;
        views::create_form(&mut ctx.store)
    })
    .await?;
    Ok(Json(form))
}

pub async fn performance_report(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(params): Query<PeriodParams>,
) -> HelpdeskResult<Json<PerformanceReport>> {
    let period = params.period.unwrap_or(DEFAULT_PERIOD_MONTHS);
    performance::check_period(period)?;
    let report = run_blocking(&state, move |ctx| {
        require_admin(&ctx.actor(user)?)?;
        performance::monthly_report(&mut ctx.store, period)
    })
    .await?;
    Ok(Json(report))
}

pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(draft): Json<TicketDraft>,
) -> HelpdeskResult<(StatusCode, Json<Ticket>)> {
    let sanitizer = state.sanitizer.clone();
    let ticket = run_blocking(&state, move |ctx| {
        let actor = ctx.actor(user)?;
        TicketLifecycle::new(sanitizer.as_ref(), &ctx.settings).create(&mut ctx.store, &actor, &draft)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn show_ticket(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<TicketId>,
    Query(params): Query<PageParams>,
) -> HelpdeskResult<Json<TicketDetail>> {
    let page = params.page.unwrap_or(1);
    let detail = run_blocking(&state, move |ctx| {
        let actor = ctx.actor(user)?;
        views::ticket_detail(&mut ctx.store, &actor, &ctx.settings, id, page)
    })
    .await?;
    Ok(Json(detail))
}

pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<TicketId>,
    Json(changes): Json<TicketChanges>,
) -> HelpdeskResult<Json<Ticket>> {
    let sanitizer = state.sanitizer.clone();
    let ticket = run_blocking(&state, move |ctx| {
        require_staff(&ctx.actor(user)?)?;
        TicketLifecycle::new(sanitizer.as_ref(), &ctx.settings).update(&mut ctx.store, id, &changes)
    })
    .await?;
    Ok(Json(ticket))
}

pub async fn delete_ticket(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<TicketId>,
) -> HelpdeskResult<StatusCode> {
    let sanitizer = state.sanitizer.clone();
    run_blocking(&state, move |ctx| {
        require_admin(&ctx.actor(user)?)?;
        TicketLifecycle::new(sanitizer.as_ref(), &ctx.settings).destroy(&mut ctx.store, id)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn complete_ticket(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<TicketId>,
) -> HelpdeskResult<Json<Ticket>> {
    let sanitizer = state.sanitizer.clone();
    let ticket = run_blocking(&state, move |ctx| {
        let actor = ctx.actor(user)?;
        TicketLifecycle::new(sanitizer.as_ref(), &ctx.settings).complete(&mut ctx.store, id, &actor)
    })
    .await?;
    Ok(Json(ticket))
}

pub async fn reopen_ticket(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<TicketId>,
) -> HelpdeskResult<Json<Ticket>> {
    let sanitizer = state.sanitizer.clone();
    let ticket = run_blocking(&state, move |ctx| {
        let actor = ctx.actor(user)?;
        TicketLifecycle::new(sanitizer.as_ref(), &ctx.settings).reopen(&mut ctx.store, id, &actor)
    })
    .await?;
    Ok(Json(ticket))
}

pub async fn agent_select_list(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path((category_id, ticket_id)): Path<(CategoryId, TicketId)>,
) -> HelpdeskResult<Json<Vec<AgentOption>>> {
    let options = run_blocking(&state, move |ctx| {
        require_staff(&ctx.actor(user)?)?;
        let ticket = ctx
            .store
            .find_ticket(ticket_id)?
            .ok_or_else(|| HelpdeskError::not_found("Ticket", ticket_id))?;
        debug!(
            "Agent options for ticket {} in category {}",
            ticket_id, category_id
        );
        listing::agent_options(&mut ctx.store, category_id, ticket.agent_id)
    })
    .await?;
    Ok(Json(options))
}

pub fn configure_tickets_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tickets", get(list_open_tickets).post(create_ticket))
        .route("/api/tickets/complete", get(list_complete_tickets))
        .route("/api/tickets/counts", get(ticket_counts))
        .route("/api/tickets/create", get(create_form))
        .route("/api/tickets/performance", get(performance_report))
        .route(
            "/api/tickets/{id}",
            get(show_ticket).put(update_ticket).delete(delete_ticket),
        )
        .route("/api/tickets/{id}/complete", post(complete_ticket))
        .route("/api/tickets/{id}/reopen", post(reopen_ticket))
        .route(
            "/api/tickets/agents/{category_id}/{ticket_id}",
            get(agent_select_list),
        )
}
