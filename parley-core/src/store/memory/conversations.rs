use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{ParleyError, Result};
use crate::pagination::{Page, PageRequest};
use crate::store::ConversationStore;
use crate::types::{
    AccountId, AccountPair, Conversation, ConversationId, ConversationType, GroupInfo, Message,
    MessageId, MessageStatus, MessageType, NewGroup, ReactionKind,
};

#[derive(Default)]
struct ChatTables {
    next_conversation_id: ConversationId,
    next_message_id: MessageId,
    conversations: HashMap<ConversationId, Conversation>,
    messages: HashMap<MessageId, Message>,
    /// Message ids per conversation in creation order.
    timelines: HashMap<ConversationId, Vec<MessageId>>,
    private_index: HashMap<AccountPair, ConversationId>,
}

impl ChatTables {
    fn insert_conversation(
        &mut self,
        conversation_type: ConversationType,
        participants: BTreeSet<AccountId>,
        group: Option<GroupInfo>,
    ) -> Conversation {
        self.next_conversation_id += 1;
        let now = Utc::now();
        let conversation = Conversation {
            id: self.next_conversation_id,
            conversation_type,
            participants,
            group,
            last_message_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.conversations.insert(conversation.id, conversation.clone());
        conversation
    }

    fn member_conversation(&self, conversation_id: ConversationId, account_id: &str) -> Result<&Conversation> {
        let conversation = self
            .conversations
            .get(&conversation_id)
            .ok_or(ParleyError::ConversationNotFound(conversation_id))?;
        if !conversation.is_participant(account_id) {
            return Err(ParleyError::not_a_participant(account_id, conversation_id));
        }
        Ok(conversation)
    }

    /// Applies `change` to a message on behalf of a participant of its conversation.
    fn update_message(
        &mut self,
        message_id: MessageId,
        account_id: &str,
        change: impl FnOnce(&mut Message),
    ) -> Result<Message> {
        let conversation_id = self
            .messages
            .get(&message_id)
            .map(|m| m.conversation_id)
            .ok_or(ParleyError::MessageNotFound(message_id))?;
        self.member_conversation(conversation_id, account_id)?;

        let message = self
            .messages
            .get_mut(&message_id)
            .ok_or(ParleyError::MessageNotFound(message_id))?;
        change(message);
        Ok(message.clone())
    }
}

#[derive(Default)]
pub struct MemoryConversationStore {
    tables: RwLock<ChatTables>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn create_cloud(&self, account_id: &str) -> Result<Conversation> {
        let participants = BTreeSet::from([account_id.to_string()]);
        Ok(self
            .tables
            .write()
            .insert_conversation(ConversationType::Cloud, participants, None))
    }

    async fn create_private(&self, a: &str, b: &str) -> Result<Conversation> {
        if a == b {
            return Err(ParleyError::InvalidSelfReference);
        }

        let key = AccountPair::new(a, b);
        let mut tables = self.tables.write();
        if let Some(existing) = tables.private_index.get(&key).and_then(|id| tables.conversations.get(id)) {
            tracing::debug!("Reusing private conversation {} for {} and {}", existing.id, a, b);
            return Ok(existing.clone());
        }

        let participants = BTreeSet::from([a.to_string(), b.to_string()]);
        let conversation = tables.insert_conversation(ConversationType::Private, participants, None);
        tables.private_index.insert(key, conversation.id);
        Ok(conversation)
    }

    async fn create_group(&self, group: NewGroup) -> Result<Conversation> {
        let participants = group.validate()?;
        let info = GroupInfo {
            name: group.name.trim().to_string(),
            avatar: group.avatar,
            description: group.description,
            admin: group.admin,
            deputy: None,
        };
        Ok(self
            .tables
            .write()
            .insert_conversation(ConversationType::Group, participants, Some(info)))
    }

    async fn get_conversation(&self, conversation_id: ConversationId) -> Result<Conversation> {
        self.tables
            .read()
            .conversations
            .get(&conversation_id)
            .cloned()
            .ok_or(ParleyError::ConversationNotFound(conversation_id))
    }

    async fn append_message(
        &self,
        conversation_id: ConversationId,
        sender_id: &str,
        content: &str,
        message_type: MessageType,
    ) -> Result<Message> {
        let mut guard = self.tables.write();
        let tables = &mut *guard;
        tables.member_conversation(conversation_id, sender_id)?;

        // Creation time never runs backwards within a conversation, even if the clock does.
        let previous = tables
            .timelines
            .get(&conversation_id)
            .and_then(|ids| ids.last())
            .and_then(|id| tables.messages.get(id))
            .map(|m| m.created_at);
        let created_at = match previous {
            Some(prev) => Utc::now().max(prev),
            None => Utc::now(),
        };

        tables.next_message_id += 1;
        let message = Message {
            id: tables.next_message_id,
            conversation_id,
            sender_id: sender_id.to_string(),
            content: content.to_string(),
            message_type,
            status: MessageStatus::Sent,
            seen_by: BTreeSet::from([sender_id.to_string()]),
            deleted_for: BTreeSet::new(),
            reactions: BTreeMap::new(),
            created_at,
        };

        tables.messages.insert(message.id, message.clone());
        tables.timelines.entry(conversation_id).or_default().push(message.id);
        if let Some(conversation) = tables.conversations.get_mut(&conversation_id) {
            conversation.last_message_id = Some(message.id);
            conversation.updated_at = created_at;
        }
        Ok(message)
    }

    async fn list_conversations(&self, account_id: &str, page: PageRequest) -> Result<Page<Conversation>> {
        let mut matching: Vec<Conversation> = self
            .tables
            .read()
            .conversations
            .values()
            .filter(|c| c.is_participant(account_id))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(page.slice(matching))
    }

    async fn list_messages(
        &self,
        conversation_id: ConversationId,
        caller: &str,
        page: PageRequest,
    ) -> Result<Page<Message>> {
        let tables = self.tables.read();
        tables.member_conversation(conversation_id, caller)?;

        let visible: Vec<Message> = tables
            .timelines
            .get(&conversation_id)
            .map(|ids| {
                ids.iter()
                    .rev()
                    .filter_map(|id| tables.messages.get(id))
                    .filter(|m| !m.is_deleted_for(caller))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(page.slice(visible))
    }

    async fn mark_seen(&self, message_id: MessageId, account_id: &str) -> Result<Message> {
        self.tables.write().update_message(message_id, account_id, |message| {
            message.seen_by.insert(account_id.to_string());
        })
    }

    async fn set_reaction(
        &self,
        message_id: MessageId,
        account_id: &str,
        reaction: Option<ReactionKind>,
    ) -> Result<Message> {
        self.tables.write().update_message(message_id, account_id, |message| match reaction {
            Some(kind) => {
                message.reactions.insert(account_id.to_string(), kind);
            }
            None => {
                message.reactions.remove(account_id);
            }
        })
    }

    async fn delete_for(&self, message_id: MessageId, account_id: &str) -> Result<Message> {
        self.tables.write().update_message(message_id, account_id, |message| {
            message.deleted_for.insert(account_id.to_string());
        })
    }
}
