//! Ticket state changes.
//!
//! Each operation runs inside a single store transaction, so a failure at any
//! step (validation, assignment, tag sync) leaves nothing behind.

use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::assignment::{assign, select_agent, AgentSelection};
use super::error::{HelpdeskError, HelpdeskResult};
use super::models::{CategoryId, NewTicket, PriorityId, StatusId, TagId, Ticket, TicketId};
use super::permissions::{Actor, PermissionPolicy};
use super::settings::Settings;
use super::store::TicketStore;
use super::tags;
use crate::security::sanitizer::{ContentSanitizer, PurifiedContent};
use crate::security::validation::Validator;

pub const SUBJECT_MIN_LENGTH: usize = 3;
pub const SUBJECT_MAX_LENGTH: usize = 255;
pub const CONTENT_MIN_LENGTH: usize = 6;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketDraft {
    pub subject: String,
    pub content: String,
    pub priority_id: Option<PriorityId>,
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub tags: Vec<TagId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketChanges {
    #[serde(flatten)]
    pub fields: TicketDraft,
    pub status_id: Option<StatusId>,
    #[serde(alias = "agent_id")]
    pub agent: Option<AgentSelection>,
}

struct CheckedDraft {
    subject: String,
    purified: PurifiedContent,
    priority_id: PriorityId,
    category_id: CategoryId,
}

pub struct TicketLifecycle<'a> {
    sanitizer: &'a dyn ContentSanitizer,
    settings: &'a Settings,
}

impl<'a> TicketLifecycle<'a> {
    pub fn new(sanitizer: &'a dyn ContentSanitizer, settings: &'a Settings) -> Self {
        Self {
            sanitizer,
            settings,
        }
    }

    pub fn create<S: TicketStore>(
        &self,
        store: &mut S,
        actor: &Actor,
        draft: &TicketDraft,
    ) -> HelpdeskResult<Ticket> {
        store.transaction(|store| {
            let checked = self.check(store, draft, Validator::new())?;
            let agent_id = select_agent(store, checked.category_id, None, None)?;

            let now = Utc::now();
            let ticket = store.insert_ticket(&NewTicket {
                subject: checked.subject,
                content: checked.purified.content,
                html: Some(checked.purified.html),
                status_id: self.settings.default_status_id,
                priority_id: checked.priority_id,
                user_id: actor.user_id,
                agent_id: Some(agent_id),
                category_id: checked.category_id,
                created_at: now,
                updated_at: now,
            })?;
            tags::reconcile(store, &ticket, &draft.tags)?;

            info!(
                "Ticket {} created by user {} and assigned to agent {}",
                ticket.id, actor.user_id, agent_id
            );
            Ok(ticket)
        })
    }

    pub fn update<S: TicketStore>(
        &self,
        store: &mut S,
        id: TicketId,
        changes: &TicketChanges,
    ) -> HelpdeskResult<Ticket> {
        store.transaction(|store| {
            let mut ticket = store
                .find_ticket(id)?
                .ok_or_else(|| HelpdeskError::not_found("Ticket", id))?;

            let status_exists = match changes.status_id {
                Some(status_id) => store.find_status(status_id)?.is_some(),
                None => false,
            };
            let validator = Validator::new()
                .reference(changes.status_id, "status_id", |_| status_exists)
                .present(changes.agent.as_ref(), "agent_id");
            let checked = self.check(store, &changes.fields, validator)?;
            let (Some(status_id), Some(agent)) = (changes.status_id, changes.agent) else {
                return Err(HelpdeskError::Internal(
                    "validated changes lost status or agent".to_string(),
                ));
            };

            ticket.subject = checked.subject;
            ticket.content = checked.purified.content;
            ticket.html = Some(checked.purified.html);
            ticket.priority_id = checked.priority_id;
            ticket.category_id = checked.category_id;
            ticket.status_id = status_id;
            assign(store, &mut ticket, Some(agent))?;
            ticket.updated_at = Utc::now();

            store.save_ticket(&ticket)?;
            tags::reconcile(store, &ticket, &changes.fields.tags)?;

            info!("Ticket {} updated", ticket.id);
            Ok(ticket)
        })
    }

    /// Marks the ticket complete as of now, also when it already was.
    pub fn complete<S: TicketStore>(
        &self,
        store: &mut S,
        id: TicketId,
        actor: &Actor,
    ) -> HelpdeskResult<Ticket> {
        store.transaction(|store| {
            let mut ticket = store
                .find_ticket(id)?
                .ok_or_else(|| HelpdeskError::not_found("Ticket", id))?;
            if !PermissionPolicy::from_settings(self.settings).can_close(actor, &ticket) {
                return Err(HelpdeskError::Forbidden(format!(
                    "user {} may not close ticket {}",
                    actor.user_id, id
                )));
            }

            let now = Utc::now();
            ticket.completed_at = Some(now);
            match self.settings.default_close_status_id {
                Some(status_id) => ticket.status_id = status_id,
                None => warn!(
                    "Ticket {} completed without a closing status configured; status {} kept",
                    ticket.id, ticket.status_id
                ),
            }
            ticket.updated_at = now;
            store.save_ticket(&ticket)?;

            info!("Ticket {} completed by user {}", ticket.id, actor.user_id);
            Ok(ticket)
        })
    }

    pub fn reopen<S: TicketStore>(
        &self,
        store: &mut S,
        id: TicketId,
        actor: &Actor,
    ) -> HelpdeskResult<Ticket> {
        store.transaction(|store| {
            let mut ticket = store
                .find_ticket(id)?
                .ok_or_else(|| HelpdeskError::not_found("Ticket", id))?;
            if !PermissionPolicy::from_settings(self.settings).can_reopen(actor, &ticket) {
                return Err(HelpdeskError::Forbidden(format!(
                    "user {} may not reopen ticket {}",
                    actor.user_id, id
                )));
            }

            ticket.completed_at = None;
            if let Some(status_id) = self.settings.default_reopen_status_id {
                ticket.status_id = status_id;
            }
            ticket.updated_at = Utc::now();
            store.save_ticket(&ticket)?;

            info!("Ticket {} reopened by user {}", ticket.id, actor.user_id);
            Ok(ticket)
        })
    }

    /// Deletes the ticket with its comments and tag links, then purges the
    /// tags left without any link.
    pub fn destroy<S: TicketStore>(&self, store: &mut S, id: TicketId) -> HelpdeskResult<Ticket> {
        store.transaction(|store| {
            let ticket = store
                .find_ticket(id)?
                .ok_or_else(|| HelpdeskError::not_found("Ticket", id))?;
            store.delete_ticket(id)?;
            tags::purge(store)?;

            info!("Ticket {} \"{}\" deleted", ticket.id, ticket.subject);
            Ok(ticket)
        })
    }

    /// Shared field checks. Every violation is collected before failing.
    fn check<S: TicketStore>(
        &self,
        store: &mut S,
        draft: &TicketDraft,
        validator: Validator,
    ) -> HelpdeskResult<CheckedDraft> {
        let subject = draft.subject.trim().to_string();
        let purified = self.sanitizer.purify(&draft.content);

        let priority_exists = match draft.priority_id {
            Some(priority_id) => store.find_priority(priority_id)?.is_some(),
            None => false,
        };
        let category_exists = match draft.category_id {
            Some(category_id) => store.find_category(category_id)?.is_some(),
            None => false,
        };

        validator
            .text(
                &subject,
                "subject",
                Some(SUBJECT_MIN_LENGTH),
                Some(SUBJECT_MAX_LENGTH),
            )
            .text(&purified.content, "content", Some(CONTENT_MIN_LENGTH), None)
            .reference(draft.priority_id, "priority_id", |_| priority_exists)
            .reference(draft.category_id, "category_id", |_| category_exists)
            .validate()?;

        match (draft.priority_id, draft.category_id) {
            (Some(priority_id), Some(category_id)) => Ok(CheckedDraft {
                subject,
                purified,
                priority_id,
                category_id,
            }),
            _ => Err(HelpdeskError::Internal(
                "validated draft lost its references".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::sanitizer::HtmlPurifier;
    use crate::security::validation::ValidationError;
    use crate::tickets::store::MemoryStore;

    struct Fixture {
        store: MemoryStore,
        owner: Actor,
        category: CategoryId,
        agent: i64,
    }

    fn fixture() -> Fixture {
        let mut store = MemoryStore::seeded();
        let user = store.add_user("Owner", false, false);
        let agent = store.add_user("Agent", false, true);
        let category = store.add_category("Software", "#333");
        store.add_category_agent(category.id, agent.id);
        Fixture {
            store,
            owner: Actor {
                user_id: user.id,
                is_admin: false,
                is_agent: false,
                restricted: false,
            },
            category: category.id,
            agent: agent.id,
        }
    }

    fn draft(subject: &str, content: &str, category: CategoryId) -> TicketDraft {
        TicketDraft {
            subject: subject.into(),
            content: content.into(),
            priority_id: Some(4),
            category_id: Some(category),
            tags: Vec::new(),
        }
    }

    #[test]
    fn test_create_assigns_and_defaults_status() {
        let mut f = fixture();
        let settings = Settings::default();
        let purifier = HtmlPurifier::new();
        let lifecycle = TicketLifecycle::new(&purifier, &settings);

        let ticket = lifecycle
            .create(
                &mut f.store,
                &f.owner,
                &draft("  Crash on start  ", "<p>The app crashes</p>", f.category),
            )
            .unwrap();

        assert_eq!(ticket.subject, "Crash on start");
        assert_eq!(ticket.content, "The app crashes");
        assert_eq!(ticket.status_id, settings.default_status_id);
        assert_eq!(ticket.agent_id, Some(f.agent));
        assert_eq!(ticket.user_id, f.owner.user_id);
        assert!(!ticket.is_complete());
    }

    #[test]
    fn test_create_reports_all_violations() {
        let mut f = fixture();
        let settings = Settings::default();
        let purifier = HtmlPurifier::new();
        let lifecycle = TicketLifecycle::new(&purifier, &settings);
        let bad = TicketDraft {
            subject: "ab".into(),
            content: "<b>hi</b>".into(),
            priority_id: Some(999),
            category_id: None,
            tags: Vec::new(),
        };

        let err = lifecycle.create(&mut f.store, &f.owner, &bad).unwrap_err();

        let HelpdeskError::Validation(result) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert!(result.has_error_for("subject"));
        assert!(result.has_error_for("content"));
        assert!(result.has_error_for("priority_id"));
        assert!(result.has_error_for("category_id"));
        assert!(result
            .errors()
            .contains(&ValidationError::UnknownReference {
                field: "priority_id".into(),
                id: 999
            }));
        assert_eq!(f.store.ticket_count(), 0);
    }

    #[test]
    fn test_update_requires_status_and_agent() {
        let mut f = fixture();
        let settings = Settings::default();
        let purifier = HtmlPurifier::new();
        let lifecycle = TicketLifecycle::new(&purifier, &settings);
        let ticket = lifecycle
            .create(&mut f.store, &f.owner, &draft("Crash", "Crashes always", f.category))
            .unwrap();

        let changes = TicketChanges {
            fields: draft("Crash", "Crashes always", f.category),
            status_id: None,
            agent: None,
        };
        let err = lifecycle.update(&mut f.store, ticket.id, &changes).unwrap_err();

        let HelpdeskError::Validation(result) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert!(result.has_error_for("status_id"));
        assert!(result.has_error_for("agent_id"));
    }

    #[test]
    fn test_complete_keeps_status_and_refreshes_completion_time() {
        let mut f = fixture();
        let settings = Settings::default();
        let purifier = HtmlPurifier::new();
        let lifecycle = TicketLifecycle::new(&purifier, &settings);
        let ticket = lifecycle
            .create(&mut f.store, &f.owner, &draft("Crash", "Crashes always", f.category))
            .unwrap();

        let done = lifecycle.complete(&mut f.store, ticket.id, &f.owner).unwrap();
        assert!(done.is_complete());
        assert_eq!(done.status_id, ticket.status_id);

        let mut earlier = done.clone();
        earlier.completed_at = Some(Utc::now() - chrono::Duration::days(3));
        f.store.save_ticket(&earlier).unwrap();

        let again = lifecycle.complete(&mut f.store, ticket.id, &f.owner).unwrap();
        assert!(again.completed_at > earlier.completed_at);
    }

    #[test]
    fn test_missing_ticket_is_not_found() {
        let mut f = fixture();
        let settings = Settings::default();
        let purifier = HtmlPurifier::new();
        let lifecycle = TicketLifecycle::new(&purifier, &settings);

        let err = lifecycle.reopen(&mut f.store, 4242, &f.owner).unwrap_err();
        assert!(matches!(err, HelpdeskError::NotFound { id: 4242, .. }));
    }
}
