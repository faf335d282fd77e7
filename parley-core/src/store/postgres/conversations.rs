use async_trait::async_trait;
use chrono::Utc;
use diesel::dsl::{exists, not};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::{ConversationRow, MessageRow};
use crate::db::{get_connection, DbPool};
use crate::error::{ParleyError, Result};
use crate::pagination::{Page, PageRequest};
use crate::schema::{conversation_participants, conversations, messages};
use crate::store::ConversationStore;
use crate::types::{
    pair_key, AccountId, Conversation, ConversationId, ConversationType, Message, MessageId,
    MessageStatus, MessageType, NewGroup, ReactionKind,
};

#[derive(Insertable, Default)]
#[diesel(table_name = conversations)]
struct NewConversationRow {
    conversation_type: String,
    private_key: Option<String>,
    group_name: Option<String>,
    group_avatar: Option<String>,
    group_description: Option<String>,
    group_admin: Option<String>,
}

#[derive(Insertable)]
#[diesel(table_name = conversation_participants)]
struct NewParticipantRow<'a> {
    conversation_id: i64,
    account_id: &'a str,
}

#[derive(Insertable)]
#[diesel(table_name = messages)]
struct NewMessageRow<'a> {
    conversation_id: i64,
    sender_id: &'a str,
    content: &'a str,
    message_type: &'a str,
    status: &'a str,
    seen_by: Vec<String>,
    created_at: chrono::DateTime<Utc>,
}

async fn load_participants(
    conn: &mut AsyncPgConnection,
    conversation_ids: &[ConversationId],
) -> Result<HashMap<ConversationId, BTreeSet<AccountId>>> {
    let rows: Vec<(i64, String)> = conversation_participants::table
        .filter(conversation_participants::conversation_id.eq_any(conversation_ids))
        .select((
            conversation_participants::conversation_id,
            conversation_participants::account_id,
        ))
        .load(conn)
        .await?;

    let mut grouped: HashMap<ConversationId, BTreeSet<AccountId>> = HashMap::new();
    for (conversation_id, account_id) in rows {
        grouped.entry(conversation_id).or_default().insert(account_id);
    }
    Ok(grouped)
}

async fn load_conversation(conn: &mut AsyncPgConnection, conversation_id: ConversationId) -> Result<Conversation> {
    let row: ConversationRow = conversations::table
        .find(conversation_id)
        .select(ConversationRow::as_select())
        .first(conn)
        .await
        .optional()?
        .ok_or(ParleyError::ConversationNotFound(conversation_id))?;

    let mut participants = load_participants(conn, &[conversation_id]).await?;
    row.into_conversation(participants.remove(&conversation_id).unwrap_or_default())
}

/// Fails with not-found for an unknown conversation and forbidden for a non-member.
async fn ensure_member(
    conn: &mut AsyncPgConnection,
    conversation_id: ConversationId,
    account_id: &str,
) -> Result<()> {
    let (known, member): (bool, bool) = diesel::select((
        exists(conversations::table.find(conversation_id)),
        exists(conversation_participants::table.find((conversation_id, account_id))),
    ))
    .get_result(conn)
    .await?;

    if !known {
        return Err(ParleyError::ConversationNotFound(conversation_id));
    }
    if !member {
        return Err(ParleyError::not_a_participant(account_id, conversation_id));
    }
    Ok(())
}

async fn insert_conversation(
    conn: &mut AsyncPgConnection,
    row: NewConversationRow,
    participants: &BTreeSet<AccountId>,
) -> Result<ConversationId> {
    let conversation_id: i64 = diesel::insert_into(conversations::table)
        .values(&row)
        .returning(conversations::id)
        .get_result(conn)
        .await?;

    let members: Vec<NewParticipantRow> = participants
        .iter()
        .map(|account_id| NewParticipantRow {
            conversation_id,
            account_id,
        })
        .collect();
    diesel::insert_into(conversation_participants::table)
        .values(&members)
        .execute(conn)
        .await?;

    Ok(conversation_id)
}

pub struct PgConversationStore {
    pool: Arc<DbPool>,
}

impl PgConversationStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    /// Applies `change` to a message under a row lock, on behalf of a participant.
    async fn update_message<F>(&self, message_id: MessageId, account_id: &str, change: F) -> Result<Message>
    where
        F: FnOnce(&mut Message) + Send,
    {
        let mut conn = get_connection(&self.pool).await?;

        conn.transaction::<_, ParleyError, _>(|conn| {
            async move {
                let row: MessageRow = messages::table
                    .find(message_id)
                    .select(MessageRow::as_select())
                    .for_update()
                    .first(conn)
                    .await
                    .optional()?
                    .ok_or(ParleyError::MessageNotFound(message_id))?;
                let mut message: Message = row.try_into()?;
                ensure_member(conn, message.conversation_id, account_id).await?;

                change(&mut message);

                let reactions = serde_json::to_value(&message.reactions)
                    .map_err(|e| ParleyError::Storage(format!("Failed to encode reactions: {}", e)))?;
                diesel::update(messages::table.find(message_id))
                    .set((
                        messages::seen_by.eq(message.seen_by.iter().cloned().collect::<Vec<_>>()),
                        messages::deleted_for.eq(message.deleted_for.iter().cloned().collect::<Vec<_>>()),
                        messages::reactions.eq(reactions),
                    ))
                    .execute(conn)
                    .await?;
                Ok(message)
            }
            .scope_boxed()
        })
        .await
    }
}

#[async_trait]
impl ConversationStore for PgConversationStore {
    async fn create_cloud(&self, account_id: &str) -> Result<Conversation> {
        let mut conn = get_connection(&self.pool).await?;
        let participants = BTreeSet::from([account_id.to_string()]);

        conn.transaction::<_, ParleyError, _>(|conn| {
            async move {
                let row = NewConversationRow {
                    conversation_type: ConversationType::Cloud.as_str().to_string(),
                    ..Default::default()
                };
                let id = insert_conversation(conn, row, &participants).await?;
                load_conversation(conn, id).await
            }
            .scope_boxed()
        })
        .await
    }

    async fn create_private(&self, a: &str, b: &str) -> Result<Conversation> {
        if a == b {
            return Err(ParleyError::InvalidSelfReference);
        }

        let key = pair_key(a, b);
        let participants = BTreeSet::from([a.to_string(), b.to_string()]);
        let mut conn = get_connection(&self.pool).await?;

        conn.transaction::<_, ParleyError, _>(|conn| {
            async move {
                let created: Option<i64> = diesel::insert_into(conversations::table)
                    .values(&NewConversationRow {
                        conversation_type: ConversationType::Private.as_str().to_string(),
                        private_key: Some(key.clone()),
                        ..Default::default()
                    })
                    .on_conflict(conversations::private_key)
                    .do_nothing()
                    .returning(conversations::id)
                    .get_result(conn)
                    .await
                    .optional()?;

                let conversation_id = match created {
                    Some(id) => {
                        let members: Vec<NewParticipantRow> = participants
                            .iter()
                            .map(|account_id| NewParticipantRow {
                                conversation_id: id,
                                account_id,
                            })
                            .collect();
                        diesel::insert_into(conversation_participants::table)
                            .values(&members)
                            .execute(conn)
                            .await?;
                        id
                    }
                    None => {
                        let id: i64 = conversations::table
                            .filter(conversations::private_key.eq(&key))
                            .select(conversations::id)
                            .first(conn)
                            .await?;
                        tracing::debug!("Reusing private conversation {} for {}", id, key);
                        id
                    }
                };
                load_conversation(conn, conversation_id).await
            }
            .scope_boxed()
        })
        .await
    }

    async fn create_group(&self, group: NewGroup) -> Result<Conversation> {
        let participants = group.validate()?;
        let row = NewConversationRow {
            conversation_type: ConversationType::Group.as_str().to_string(),
            private_key: None,
            group_name: Some(group.name.trim().to_string()),
            group_avatar: group.avatar,
            group_description: group.description,
            group_admin: Some(group.admin),
        };
        let mut conn = get_connection(&self.pool).await?;

        conn.transaction::<_, ParleyError, _>(|conn| {
            async move {
                let id = insert_conversation(conn, row, &participants).await?;
                load_conversation(conn, id).await
            }
            .scope_boxed()
        })
        .await
    }

    async fn get_conversation(&self, conversation_id: ConversationId) -> Result<Conversation> {
        let mut conn = get_connection(&self.pool).await?;
        load_conversation(&mut conn, conversation_id).await
    }

    async fn append_message(
        &self,
        conversation_id: ConversationId,
        sender_id: &str,
        content: &str,
        message_type: MessageType,
    ) -> Result<Message> {
        let mut conn = get_connection(&self.pool).await?;

        conn.transaction::<_, ParleyError, _>(|conn| {
            async move {
                // The conversation row lock serialises appends and the pointer update.
                let last_update: Option<chrono::DateTime<Utc>> = conversations::table
                    .find(conversation_id)
                    .select(conversations::updated_at)
                    .for_update()
                    .first(conn)
                    .await
                    .optional()?;
                let last_update = last_update.ok_or(ParleyError::ConversationNotFound(conversation_id))?;
                ensure_member(conn, conversation_id, sender_id).await?;

                let created_at = Utc::now().max(last_update);
                let row: MessageRow = diesel::insert_into(messages::table)
                    .values(&NewMessageRow {
                        conversation_id,
                        sender_id,
                        content,
                        message_type: message_type.as_str(),
                        status: MessageStatus::Sent.as_str(),
                        seen_by: vec![sender_id.to_string()],
                        created_at,
                    })
                    .returning(MessageRow::as_returning())
                    .get_result(conn)
                    .await?;

                diesel::update(conversations::table.find(conversation_id))
                    .set((
                        conversations::last_message_id.eq(Some(row.id)),
                        conversations::updated_at.eq(created_at),
                    ))
                    .execute(conn)
                    .await?;

                row.try_into()
            }
            .scope_boxed()
        })
        .await
    }

    async fn list_conversations(&self, account_id: &str, page: PageRequest) -> Result<Page<Conversation>> {
        let mut conn = get_connection(&self.pool).await?;

        let total: i64 = conversation_participants::table
            .filter(conversation_participants::account_id.eq(account_id))
            .count()
            .get_result(&mut conn)
            .await?;

        let rows: Vec<ConversationRow> = conversations::table
            .inner_join(conversation_participants::table)
            .filter(conversation_participants::account_id.eq(account_id))
            .order((conversations::updated_at.desc(), conversations::id.desc()))
            .limit(page.limit() as i64)
            .offset(page.offset() as i64)
            .select(ConversationRow::as_select())
            .load(&mut conn)
            .await?;

        let ids: Vec<ConversationId> = rows.iter().map(|row| row.id).collect();
        let mut participants = load_participants(&mut conn, &ids).await?;
        let items = rows
            .into_iter()
            .map(|row| {
                let members = participants.remove(&row.id).unwrap_or_default();
                row.into_conversation(members)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Page::new(items, total as u64, page))
    }

    async fn list_messages(
        &self,
        conversation_id: ConversationId,
        caller: &str,
        page: PageRequest,
    ) -> Result<Page<Message>> {
        let mut conn = get_connection(&self.pool).await?;
        ensure_member(&mut conn, conversation_id, caller).await?;

        let hidden = vec![caller.to_string()];
        let total: i64 = messages::table
            .filter(messages::conversation_id.eq(conversation_id))
            .filter(not(messages::deleted_for.contains(hidden.clone())))
            .count()
            .get_result(&mut conn)
            .await?;

        let rows: Vec<MessageRow> = messages::table
            .filter(messages::conversation_id.eq(conversation_id))
            .filter(not(messages::deleted_for.contains(hidden)))
            .order(messages::id.desc())
            .limit(page.limit() as i64)
            .offset(page.offset() as i64)
            .select(MessageRow::as_select())
            .load(&mut conn)
            .await?;

        let items = rows.into_iter().map(Message::try_from).collect::<Result<Vec<_>>>()?;
        Ok(Page::new(items, total as u64, page))
    }

    async fn mark_seen(&self, message_id: MessageId, account_id: &str) -> Result<Message> {
        self.update_message(message_id, account_id, |message| {
            message.seen_by.insert(account_id.to_string());
        })
        .await
    }

    async fn set_reaction(
        &self,
        message_id: MessageId,
        account_id: &str,
        reaction: Option<ReactionKind>,
    ) -> Result<Message> {
        self.update_message(message_id, account_id, |message| match reaction {
            Some(kind) => {
                message.reactions.insert(account_id.to_string(), kind);
            }
            None => {
                message.reactions.remove(account_id);
            }
        })
        .await
    }

    async fn delete_for(&self, message_id: MessageId, account_id: &str) -> Result<Message> {
        self.update_message(message_id, account_id, |message| {
            message.deleted_for.insert(account_id.to_string());
        })
        .await
    }
}
