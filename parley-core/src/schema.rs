use diesel::{allow_tables_to_appear_in_same_query, joinable, table};

table! {
    relationships (id) {
        id -> BigInt,
        actor_account_id -> Text,
        target_account_id -> Text,
        pair_key -> Text,
        status -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    conversations (id) {
        id -> BigInt,
        conversation_type -> Text,
        private_key -> Nullable<Text>,
        group_name -> Nullable<Text>,
        group_avatar -> Nullable<Text>,
        group_description -> Nullable<Text>,
        group_admin -> Nullable<Text>,
        group_deputy -> Nullable<Text>,
        last_message_id -> Nullable<BigInt>,
        is_active -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    conversation_participants (conversation_id, account_id) {
        conversation_id -> BigInt,
        account_id -> Text,
        joined_at -> Timestamptz,
    }
}

table! {
    messages (id) {
        id -> BigInt,
        conversation_id -> BigInt,
        sender_id -> Text,
        content -> Text,
        message_type -> Text,
        status -> Text,
        seen_by -> Array<Text>,
        deleted_for -> Array<Text>,
        reactions -> Jsonb,
        created_at -> Timestamptz,
    }
}

table! {
    accounts (id) {
        id -> Text,
        display_name -> Text,
    }
}

joinable!(conversation_participants -> conversations (conversation_id));
joinable!(messages -> conversations (conversation_id));

allow_tables_to_appear_in_same_query!(
    relationships,
    conversations,
    conversation_participants,
    messages,
    accounts,
);
