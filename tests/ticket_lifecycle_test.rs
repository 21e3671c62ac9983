#[cfg(test)]
mod ticket_lifecycle_integration_tests {
    use chrono::Utc;
    use helpdesk::tests::test_util::Desk;
    use helpdesk::tickets::settings::{PermissionConfig, SettingKey, Settings};
    use helpdesk::tickets::{
        AgentSelection, HelpdeskError, NewTicket, TicketChanges, TicketLifecycle, TicketStore,
    };
    use helpdesk::{assert_err, assert_ok};
    use std::collections::BTreeSet;

    fn load_agent(desk: &mut Desk, agent_id: i64, open_tickets: usize) {
        let now = Utc::now();
        for n in 0..open_tickets {
            assert_ok!(desk.store.insert_ticket(&NewTicket {
                subject: format!("Backlog {n}"),
                content: "Waiting for parts".into(),
                html: None,
                status_id: 1,
                priority_id: desk.priority_id,
                user_id: desk.customer.id,
                agent_id: Some(agent_id),
                category_id: desk.category.id,
                created_at: now,
                updated_at: now,
            }));
        }
    }

    #[test]
    fn test_create_picks_least_loaded_agent() {
        let mut desk = Desk::new();
        let (a1, a2) = (desk.agents[0].id, desk.agents[1].id);
        load_agent(&mut desk, a1, 2);
        let customer = desk.actor(&desk.customer);
        let draft = desk.draft("Printer jam", "The printer on floor 2 is jammed");

        let (lifecycle, store) = desk.lifecycle();
        let ticket = assert_ok!(lifecycle.create(store, &customer, &draft));

        assert_eq!(ticket.agent_id, Some(a2));
        assert_eq!(ticket.user_id, customer.user_id);
    }

    #[test]
    fn test_short_subject_persists_nothing() {
        let mut desk = Desk::new();
        let customer = desk.actor(&desk.customer);
        let draft = desk.draft("Hi", "The printer on floor 2 is jammed");

        let (lifecycle, store) = desk.lifecycle();
        let err = assert_err!(lifecycle.create(store, &customer, &draft));

        match err {
            HelpdeskError::Validation(result) => assert!(result.has_error_for("subject")),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(desk.store.ticket_count(), 0);
    }

    #[test]
    fn test_create_in_unstaffed_category_rolls_back() {
        let mut desk = Desk::new();
        let empty = desk.store.add_category("Facilities", "#999");
        let customer = desk.actor(&desk.customer);
        let draft = desk.draft_in(empty.id, "Broken chair", "My chair lost a wheel");

        let (lifecycle, store) = desk.lifecycle();
        let err = assert_err!(lifecycle.create(store, &customer, &draft));

        assert!(matches!(err, HelpdeskError::NoEligibleAgent { category_id } if category_id == empty.id));
        assert_eq!(desk.store.ticket_count(), 0);
    }

    #[test]
    fn test_create_keeps_only_category_tags() {
        let mut desk = Desk::new();
        let other = desk.store.add_category("Billing", "#f40");
        let valid = desk.store.add_tag("printer");
        let foreign = desk.store.add_tag("invoice");
        desk.store.link_category_tag(desk.category.id, valid.id);
        desk.store.link_category_tag(other.id, foreign.id);
        let customer = desk.actor(&desk.customer);
        let mut draft = desk.draft("Printer jam", "The printer on floor 2 is jammed");
        draft.tags = vec![valid.id, foreign.id];

        let (lifecycle, store) = desk.lifecycle();
        let ticket = assert_ok!(lifecycle.create(store, &customer, &draft));

        assert_eq!(desk.store.linked_tag_ids(ticket.id), BTreeSet::from([valid.id]));
        assert!(desk.store.tag_exists(foreign.id));
    }

    #[test]
    fn test_update_keeps_free_and_category_tags() {
        let mut desk = Desk::new();
        let customer = desk.actor(&desk.customer);
        let draft = desk.draft("Printer jam", "The printer on floor 2 is jammed");
        let ticket = {
            let (lifecycle, store) = desk.lifecycle();
            assert_ok!(lifecycle.create(store, &customer, &draft))
        };
        let five = desk.store.add_tag("toner");
        let six = desk.store.add_tag("follow-up");
        desk.store.link_category_tag(desk.category.id, five.id);
        desk.store.link_ticket_tag(ticket.id, six.id);

        let mut fields = draft.clone();
        fields.tags = vec![five.id, six.id];
        let changes = TicketChanges {
            fields,
            status_id: Some(ticket.status_id),
            agent: Some(AgentSelection::Auto),
        };
        let (lifecycle, store) = desk.lifecycle();
        assert_ok!(lifecycle.update(store, ticket.id, &changes));

        assert_eq!(
            desk.store.linked_tag_ids(ticket.id),
            BTreeSet::from([five.id, six.id])
        );
    }

    #[test]
    fn test_update_rejects_agent_of_other_category() {
        let mut desk = Desk::new();
        let billing = desk.store.add_category("Billing", "#f40");
        let billing_agent = desk.store.add_user("Bill Agent", false, true);
        desk.store.add_category_agent(billing.id, billing_agent.id);
        let customer = desk.actor(&desk.customer);
        let draft = desk.draft("Printer jam", "The printer on floor 2 is jammed");
        let ticket = {
            let (lifecycle, store) = desk.lifecycle();
            assert_ok!(lifecycle.create(store, &customer, &draft))
        };

        let changes = TicketChanges {
            fields: desk.draft("Printer jam again", "Still jammed after restart"),
            status_id: Some(ticket.status_id),
            agent: Some(AgentSelection::Agent(billing_agent.id)),
        };
        let (lifecycle, store) = desk.lifecycle();
        let err = assert_err!(lifecycle.update(store, ticket.id, &changes));
        assert!(matches!(err, HelpdeskError::InvalidAgent { .. }));

        let stored = assert_ok!(desk.store.find_ticket(ticket.id)).unwrap();
        assert_eq!(stored.subject, "Printer jam");
        assert_eq!(stored.agent_id, ticket.agent_id);
    }

    #[test]
    fn test_update_moves_ticket_to_new_category_agent() {
        let mut desk = Desk::new();
        let billing = desk.store.add_category("Billing", "#f40");
        let billing_agent = desk.store.add_user("Bill Agent", false, true);
        desk.store.add_category_agent(billing.id, billing_agent.id);
        let customer = desk.actor(&desk.customer);
        let draft = desk.draft("Refund", "Please refund my last invoice");
        let ticket = {
            let (lifecycle, store) = desk.lifecycle();
            assert_ok!(lifecycle.create(store, &customer, &draft))
        };

        let changes = TicketChanges {
            fields: desk.draft_in(billing.id, "Refund", "Please refund my last invoice"),
            status_id: Some(ticket.status_id),
            agent: Some(AgentSelection::Auto),
        };
        let (lifecycle, store) = desk.lifecycle();
        let updated = assert_ok!(lifecycle.update(store, ticket.id, &changes));

        assert_eq!(updated.category_id, billing.id);
        assert_eq!(updated.agent_id, Some(billing_agent.id));
    }

    #[test]
    fn test_complete_and_reopen_apply_configured_statuses() {
        let mut desk = Desk::new();
        let solved = desk.store.add_status("Closed", "#0a0");
        let reopened = desk.store.add_status("Reopened", "#a00");
        desk.store
            .set_setting(SettingKey::DefaultCloseStatusId, &solved.id.to_string());
        desk.store
            .set_setting(SettingKey::DefaultReopenStatusId, &reopened.id.to_string());
        desk.settings = assert_ok!(Settings::load(&mut desk.store));
        let customer = desk.actor(&desk.customer);
        let draft = desk.draft("Printer jam", "The printer on floor 2 is jammed");

        let (lifecycle, store) = desk.lifecycle();
        let ticket = assert_ok!(lifecycle.create(store, &customer, &draft));
        let done = assert_ok!(lifecycle.complete(store, ticket.id, &customer));
        assert!(done.completed_at.is_some());
        assert_eq!(done.status_id, solved.id);

        let open = assert_ok!(lifecycle.reopen(store, ticket.id, &customer));
        assert!(open.completed_at.is_none());
        assert_eq!(open.status_id, reopened.id);
    }

    #[test]
    fn test_owner_cannot_close_when_owner_flag_is_off() {
        let mut desk = Desk::new();
        desk.settings.close_ticket_perm = PermissionConfig {
            admin: true,
            agent: true,
            owner: false,
        };
        let customer = desk.actor(&desk.customer);
        let agent = desk.actor(&desk.agents[0]);
        let draft = desk.draft("Printer jam", "The printer on floor 2 is jammed");

        let (lifecycle, store) = desk.lifecycle();
        let ticket = assert_ok!(lifecycle.create(store, &customer, &draft));
        let err = assert_err!(lifecycle.complete(store, ticket.id, &customer));
        assert!(matches!(err, HelpdeskError::Forbidden(_)));
        assert_ok!(lifecycle.complete(store, ticket.id, &agent));
    }

    #[test]
    fn test_destroy_removes_comments_and_orphans() {
        let mut desk = Desk::new();
        let customer = desk.actor(&desk.customer);
        let draft = desk.draft("Printer jam", "The printer on floor 2 is jammed");
        let ticket = {
            let (lifecycle, store) = desk.lifecycle();
            assert_ok!(lifecycle.create(store, &customer, &draft))
        };
        let free = desk.store.add_tag("one-off");
        desk.store.link_ticket_tag(ticket.id, free.id);
        desk.store.add_comment(ticket.id, desk.agents[0].id, "Looking into it");

        let purifier = desk.purifier.clone();
        let settings = desk.settings.clone();
        let lifecycle = TicketLifecycle::new(&purifier, &settings);
        let deleted = assert_ok!(lifecycle.destroy(&mut desk.store, ticket.id));

        assert_eq!(deleted.id, ticket.id);
        assert_eq!(desk.store.ticket_count(), 0);
        assert_eq!(desk.store.comment_count(), 0);
        assert!(!desk.store.tag_exists(free.id));

        let again = assert_err!(lifecycle.destroy(&mut desk.store, ticket.id));
        assert!(matches!(again, HelpdeskError::NotFound { .. }));
    }
}
