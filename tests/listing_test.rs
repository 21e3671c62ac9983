#[cfg(test)]
mod listing_integration_tests {
    use helpdesk::tests::test_util::Desk;
    use helpdesk::tickets::listing::{agent_options, current_filters, list_tickets, ticket_counts};
    use helpdesk::tickets::views::{create_form, ticket_detail};
    use helpdesk::tickets::{
        AgentSelection, FilterContext, HelpdeskError, OwnerFilter, Ticket,
    };
    use helpdesk::{assert_err, assert_ok};

    fn open(desk: &mut Desk, owner_index: usize, subject: &str) -> Ticket {
        let owner = match owner_index {
            0 => desk.customer.clone(),
            n => desk.agents[n - 1].clone(),
        };
        let actor = desk.actor(&owner);
        let draft = desk.draft(subject, "Something is not working");
        let (lifecycle, store) = desk.lifecycle();
        assert_ok!(lifecycle.create(store, &actor, &draft))
    }

    #[test]
    fn test_customer_sees_only_own_tickets() {
        let mut desk = Desk::new();
        let mine = open(&mut desk, 0, "Mine");
        open(&mut desk, 1, "Staff ticket");
        let customer = desk.actor(&desk.customer);

        let rows = assert_ok!(list_tickets(
            &mut desk.store,
            &customer,
            &FilterContext::default(),
            false
        ));

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, mine.id);
        assert_eq!(rows[0].owner.as_deref(), Some("Carl Customer"));
        assert_eq!(rows[0].category.as_ref().map(|c| c.name.as_str()), Some("Technical"));
        assert!(rows[0].status.is_some());
    }

    #[test]
    fn test_restricted_agent_sees_owned_or_assigned() {
        let mut desk = Desk::new();
        desk.settings.agent_restrict = true;
        let first = open(&mut desk, 0, "First");
        let second = open(&mut desk, 0, "Second");
        let agent_user = desk
            .agents
            .iter()
            .find(|a| Some(a.id) == first.agent_id)
            .cloned()
            .unwrap();
        let agent = desk.actor(&agent_user);
        assert!(agent.restricted);

        let rows = assert_ok!(list_tickets(
            &mut desk.store,
            &agent,
            &FilterContext::default(),
            false
        ));

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        assert!(ids.contains(&first.id));
        assert!(!ids.contains(&second.id));
    }

    #[test]
    fn test_me_filter_lists_own_tickets_for_admin() {
        let mut desk = Desk::new();
        open(&mut desk, 0, "Customer");
        let admin = desk.actor(&desk.admin);
        let everything = assert_ok!(list_tickets(
            &mut desk.store,
            &admin,
            &FilterContext::default(),
            false
        ));
        let mine = assert_ok!(list_tickets(
            &mut desk.store,
            &admin,
            &FilterContext {
                owner: OwnerFilter::Me,
                ..FilterContext::default()
            },
            false
        ));
        assert_eq!(everything.len(), 1);
        assert!(mine.is_empty());
    }

    #[test]
    fn test_counts_for_admin() {
        let mut desk = Desk::new();
        open(&mut desk, 0, "One");
        open(&mut desk, 0, "Two");
        open(&mut desk, 0, "Three");
        let admin = desk.actor(&desk.admin);

        let counts = assert_ok!(ticket_counts(
            &mut desk.store,
            &admin,
            &FilterContext::default(),
            false
        ));

        assert_eq!(counts.total_category, Some(3));
        assert_eq!(counts.total_agent, Some(3));
        assert_eq!(counts.categories.len(), 1);
        assert_eq!(counts.categories[0].tickets, 3);
        let per_agent: i64 = counts.agents.iter().map(|a| a.tickets).sum();
        assert_eq!(per_agent, 3);
        let owner = counts.owner.unwrap();
        assert_eq!(owner.all, 3);
        assert_eq!(owner.me, 0);
        assert!(!counts.stale_agent_filter);
    }

    #[test]
    fn test_unknown_agent_filter_is_flagged_stale() {
        let mut desk = Desk::new();
        open(&mut desk, 0, "One");
        let outsider = desk.store.add_user("Olga Outsider", false, true);
        let billing = desk.store.add_category("Billing", "#f40");
        desk.store.add_category_agent(billing.id, outsider.id);
        let admin = desk.actor(&desk.admin);

        let counts = assert_ok!(ticket_counts(
            &mut desk.store,
            &admin,
            &FilterContext {
                category: Some(desk.category.id),
                agent: Some(outsider.id),
                owner: OwnerFilter::All,
            },
            false
        ));

        assert!(counts.stale_agent_filter);
        assert_eq!(counts.owner.unwrap().all, 1);
    }

    #[test]
    fn test_list_drops_stale_agent_filter() {
        let mut desk = Desk::new();
        let ticket = open(&mut desk, 0, "One");
        let outsider = desk.store.add_user("Olga Outsider", false, true);
        let billing = desk.store.add_category("Billing", "#f40");
        desk.store.add_category_agent(billing.id, outsider.id);
        let admin = desk.actor(&desk.admin);
        let stale = FilterContext {
            category: Some(desk.category.id),
            agent: Some(outsider.id),
            owner: OwnerFilter::All,
        };

        let filters = assert_ok!(current_filters(&mut desk.store, &admin, &stale));
        assert_eq!(filters, stale.without_agent());
        let rows = assert_ok!(list_tickets(&mut desk.store, &admin, &filters, false));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, ticket.id);

        let assigned = FilterContext {
            agent: ticket.agent_id,
            ..stale.clone()
        };
        let kept = assert_ok!(current_filters(&mut desk.store, &admin, &assigned));
        assert_eq!(kept, assigned);
    }

    #[test]
    fn test_customer_gets_no_staff_counters() {
        let mut desk = Desk::new();
        open(&mut desk, 0, "One");
        let customer = desk.actor(&desk.customer);
        let counts = assert_ok!(ticket_counts(
            &mut desk.store,
            &customer,
            &FilterContext::default(),
            false
        ));
        assert!(counts.categories.is_empty());
        assert!(counts.owner.is_none());
    }

    #[test]
    fn test_agent_options_flag_current_agent() {
        let mut desk = Desk::new();
        let ticket = open(&mut desk, 0, "One");

        let options = assert_ok!(agent_options(
            &mut desk.store,
            desk.category.id,
            ticket.agent_id
        ));

        assert_eq!(options.len(), 3);
        assert_eq!(options[0].value, AgentSelection::Auto);
        assert!(!options[0].selected);
        let selected: Vec<_> = options.iter().filter(|o| o.selected).collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(
            selected[0].value,
            AgentSelection::Agent(ticket.agent_id.unwrap())
        );
    }

    #[test]
    fn test_create_form_lists_tagged_categories() {
        let mut desk = Desk::new();
        desk.store.add_category("Billing", "#f40");
        let tag = desk.store.add_tag("printer");
        desk.store.link_category_tag(desk.category.id, tag.id);

        let form = assert_ok!(create_form(&mut desk.store));

        assert_eq!(form.categories.len(), 2);
        assert_eq!(form.priorities.len(), 3);
        assert_eq!(form.category_tags.len(), 1);
        assert_eq!(form.category_tags[0].tags[0].name, "printer");
    }

    #[test]
    fn test_ticket_detail_pages_comments() {
        let mut desk = Desk::new();
        desk.settings.paginate_items = 2;
        let ticket = open(&mut desk, 0, "Chatty");
        for n in 0..3 {
            desk.store
                .add_comment(ticket.id, desk.customer.id, &format!("Update {n}"));
        }
        let customer = desk.actor(&desk.customer);

        let detail = assert_ok!(ticket_detail(
            &mut desk.store,
            &customer,
            &desk.settings,
            ticket.id,
            2
        ));

        assert_eq!(detail.comments.total, 3);
        assert_eq!(detail.comments.last_page, 2);
        assert_eq!(detail.comments.items.len(), 1);
        assert!(detail.close_perm);
        assert!(!detail.status_diverges);
        assert_eq!(detail.agent_options.len(), 3);
    }

    #[test]
    fn test_ticket_detail_with_huge_page_number() {
        let mut desk = Desk::new();
        let ticket = open(&mut desk, 0, "Chatty");
        desk.store.add_comment(ticket.id, desk.customer.id, "First update");
        let customer = desk.actor(&desk.customer);

        let detail = assert_ok!(ticket_detail(
            &mut desk.store,
            &customer,
            &desk.settings,
            ticket.id,
            i64::MAX
        ));

        assert!(detail.comments.items.is_empty());
        assert_eq!(detail.comments.total, 1);
        assert_eq!(detail.comments.last_page, 1);
    }

    #[test]
    fn test_ticket_detail_hidden_from_other_customers() {
        let mut desk = Desk::new();
        let ticket = open(&mut desk, 0, "Private");
        let stranger = desk.store.add_user("Sam Stranger", false, false);
        let actor = desk.actor(&stranger);

        let err = assert_err!(ticket_detail(
            &mut desk.store,
            &actor,
            &desk.settings,
            ticket.id,
            1
        ));
        assert!(matches!(err, HelpdeskError::Forbidden(_)));
    }

    #[test]
    fn test_ticket_detail_for_missing_ticket() {
        let mut desk = Desk::new();
        let admin = desk.actor(&desk.admin);
        let err = assert_err!(ticket_detail(&mut desk.store, &admin, &desk.settings, 999, 1));
        assert!(matches!(err, HelpdeskError::NotFound { id: 999, .. }));
    }
}
