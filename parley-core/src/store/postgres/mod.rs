//! Postgres-backed stores on diesel-async.

mod conversations;
mod relationships;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::db::{get_connection, DbPool};
use crate::error::{ParleyError, Result};
use crate::identity::AccountDirectory;
use crate::schema::{accounts, conversations as conversations_table, messages, relationships as relationships_table};
use crate::types::{
    AccountId, AccountProfile, Conversation, GroupInfo, Message, ReactionKind, Relationship,
};

pub use conversations::PgConversationStore;
pub use relationships::PgRelationshipStore;

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = relationships_table)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct RelationshipRow {
    id: i64,
    actor_account_id: String,
    target_account_id: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RelationshipRow> for Relationship {
    type Error = ParleyError;

    fn try_from(row: RelationshipRow) -> Result<Self> {
        Ok(Relationship {
            id: row.id,
            actor_account_id: row.actor_account_id,
            target_account_id: row.target_account_id,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = conversations_table)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ConversationRow {
    id: i64,
    conversation_type: String,
    group_name: Option<String>,
    group_avatar: Option<String>,
    group_description: Option<String>,
    group_admin: Option<String>,
    group_deputy: Option<String>,
    last_message_id: Option<i64>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ConversationRow {
    fn into_conversation(self, participants: BTreeSet<AccountId>) -> Result<Conversation> {
        let group = match (self.group_name, self.group_admin) {
            (Some(name), Some(admin)) => Some(GroupInfo {
                name,
                avatar: self.group_avatar,
                description: self.group_description,
                admin,
                deputy: self.group_deputy,
            }),
            _ => None,
        };

        Ok(Conversation {
            id: self.id,
            conversation_type: self.conversation_type.parse()?,
            participants,
            group,
            last_message_id: self.last_message_id,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct MessageRow {
    id: i64,
    conversation_id: i64,
    sender_id: String,
    content: String,
    message_type: String,
    status: String,
    seen_by: Vec<String>,
    deleted_for: Vec<String>,
    reactions: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for Message {
    type Error = ParleyError;

    fn try_from(row: MessageRow) -> Result<Self> {
        let reactions: BTreeMap<AccountId, ReactionKind> = serde_json::from_value(row.reactions)
            .map_err(|e| ParleyError::Storage(format!("malformed reactions on message {}: {}", row.id, e)))?;

        Ok(Message {
            id: row.id,
            conversation_id: row.conversation_id,
            sender_id: row.sender_id,
            content: row.content,
            message_type: row.message_type.parse()?,
            status: row.status.parse()?,
            seen_by: row.seen_by.into_iter().collect(),
            deleted_for: row.deleted_for.into_iter().collect(),
            reactions,
            created_at: row.created_at,
        })
    }
}

/// Reads profiles from the `accounts` table owned by the identity subsystem.
pub struct PgAccountDirectory {
    pool: Arc<DbPool>,
}

impl PgAccountDirectory {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountDirectory for PgAccountDirectory {
    async fn find_profile(&self, account_id: &str) -> Result<Option<AccountProfile>> {
        let mut conn = get_connection(&self.pool).await?;
        let row: Option<(String, String)> = accounts::table
            .find(account_id)
            .select((accounts::id, accounts::display_name))
            .first(&mut conn)
            .await
            .optional()?;

        Ok(row.map(|(account_id, display_name)| AccountProfile {
            account_id,
            display_name,
        }))
    }
}
