diesel::table! {
    users (id) {
        id -> Int8,
        name -> Varchar,
        email -> Varchar,
        is_admin -> Bool,
        is_agent -> Bool,
    }
}

diesel::table! {
    ticket_statuses (id) {
        id -> Int8,
        name -> Varchar,
        color -> Varchar,
    }
}

diesel::table! {
    ticket_priorities (id) {
        id -> Int8,
        name -> Varchar,
        color -> Varchar,
    }
}

diesel::table! {
    ticket_categories (id) {
        id -> Int8,
        name -> Varchar,
        color -> Varchar,
    }
}

diesel::table! {
    ticket_category_agents (category_id, user_id) {
        category_id -> Int8,
        user_id -> Int8,
    }
}

diesel::table! {
    tickets (id) {
        id -> Int8,
        subject -> Varchar,
        content -> Text,
        html -> Nullable<Text>,
        status_id -> Int8,
        priority_id -> Int8,
        user_id -> Int8,
        agent_id -> Nullable<Int8>,
        category_id -> Int8,
        completed_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    ticket_tags (id) {
        id -> Int8,
        name -> Varchar,
        bg_color -> Nullable<Varchar>,
        text_color -> Nullable<Varchar>,
    }
}

diesel::table! {
    ticket_category_tags (category_id, tag_id) {
        category_id -> Int8,
        tag_id -> Int8,
    }
}

diesel::table! {
    ticket_taggables (ticket_id, tag_id) {
        ticket_id -> Int8,
        tag_id -> Int8,
    }
}

diesel::table! {
    ticket_comments (id) {
        id -> Int8,
        ticket_id -> Int8,
        user_id -> Int8,
        content -> Text,
        html -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    ticket_settings (slug) {
        slug -> Varchar,
        value -> Text,
    }
}

diesel::joinable!(ticket_category_agents -> ticket_categories (category_id));
diesel::joinable!(ticket_category_agents -> users (user_id));
diesel::joinable!(ticket_category_tags -> ticket_categories (category_id));
diesel::joinable!(ticket_category_tags -> ticket_tags (tag_id));
diesel::joinable!(ticket_taggables -> tickets (ticket_id));
diesel::joinable!(ticket_taggables -> ticket_tags (tag_id));
diesel::joinable!(ticket_comments -> tickets (ticket_id));
diesel::joinable!(tickets -> ticket_categories (category_id));
diesel::joinable!(tickets -> ticket_priorities (priority_id));
diesel::joinable!(tickets -> ticket_statuses (status_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    ticket_statuses,
    ticket_priorities,
    ticket_categories,
    ticket_category_agents,
    tickets,
    ticket_tags,
    ticket_category_tags,
    ticket_taggables,
    ticket_comments,
    ticket_settings,
);
