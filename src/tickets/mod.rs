//! Support tickets: permissions, agent assignment, tag upkeep, lifecycle,
//! listings and performance statistics, plus the JSON routes over them.

pub mod assignment;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod listing;
pub mod models;
pub mod performance;
pub mod permissions;
pub mod settings;
pub mod store;
pub mod tags;
pub mod views;

pub use assignment::{assign, select_agent, AgentSelection};
pub use error::{HelpdeskError, HelpdeskResult, SafeErrorResponse};
pub use handlers::configure_tickets_routes;
pub use lifecycle::{TicketChanges, TicketDraft, TicketLifecycle};
pub use listing::{FilterContext, OwnerFilter, TicketCounts, TicketRow};
pub use models::{Category, Comment, NewTicket, Priority, Status, Tag, Ticket, User};
pub use performance::{interval_average, monthly_report, monthly_report_at, ticket_resolution_days};
pub use permissions::{Actor, ActorRole, PermissionPolicy, RoleSet};
pub use settings::{PermissionConfig, SettingKey, Settings};
pub use store::{MemoryStore, PgStore, TicketQuery, TicketStore};
