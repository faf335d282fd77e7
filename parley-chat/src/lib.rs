//! Messaging workflows over the conversation store, with push to the other participants.

use parley_core::error::require_account;
use parley_core::{
    Confirmation, Conversation, ConversationId, ConversationStore, Message, MessageId, MessageType,
    NewGroup, Page, PageRequest, ParleyContext, ParleyError, ReactionKind, Result,
};
use parley_notify::NotificationDispatcher;
use std::sync::Arc;

#[derive(Clone)]
pub struct ChatService {
    conversations: Arc<dyn ConversationStore>,
    dispatcher: NotificationDispatcher,
}

impl ChatService {
    pub fn new(conversations: Arc<dyn ConversationStore>, dispatcher: NotificationDispatcher) -> Self {
        Self {
            conversations,
            dispatcher,
        }
    }

    pub fn from_context(ctx: &ParleyContext, dispatcher: NotificationDispatcher) -> Self {
        Self::new(ctx.conversations.clone(), dispatcher)
    }

    /// Called once by account provisioning to create the account's CLOUD space.
    pub async fn provision_account(&self, account_id: &str) -> Result<Confirmation<Conversation>> {
        require_account("account", account_id)?;
        let cloud = self.conversations.create_cloud(account_id).await?;
        tracing::info!("Provisioned cloud conversation {} for {}", cloud.id, account_id);
        Ok(Confirmation::new("Account provisioned", cloud))
    }

    pub async fn send_message(
        &self,
        sender_id: &str,
        conversation_id: ConversationId,
        content: &str,
        message_type: Option<MessageType>,
    ) -> Result<Confirmation<Message>> {
        require_account("sender", sender_id)?;
        if content.trim().is_empty() {
            return Err(ParleyError::InvalidInput("message content is required".to_string()));
        }

        let message = self
            .conversations
            .append_message(conversation_id, sender_id, content, message_type.unwrap_or_default())
            .await?;
        tracing::debug!("Message {} stored in conversation {}", message.id, conversation_id);

        // The message is committed; fan-out problems are logged, not returned.
        match self.conversations.get_conversation(conversation_id).await {
            Ok(conversation) => {
                for recipient in conversation.others(sender_id) {
                    self.dispatcher.notify_new_message(recipient, &message);
                }
            }
            Err(e) => tracing::warn!(
                "Skipping push for message {}, conversation lookup failed: {}",
                message.id,
                e
            ),
        }

        Ok(Confirmation::new("Message sent", message))
    }

    pub async fn get_conversations(&self, account_id: &str, page: PageRequest) -> Result<Page<Conversation>> {
        require_account("account", account_id)?;
        self.conversations.list_conversations(account_id, page).await
    }

    pub async fn get_conversation(&self, caller: &str, conversation_id: ConversationId) -> Result<Conversation> {
        require_account("caller", caller)?;
        let conversation = self.conversations.get_conversation(conversation_id).await?;
        if !conversation.is_participant(caller) {
            return Err(ParleyError::not_a_participant(caller, conversation_id));
        }
        Ok(conversation)
    }

    pub async fn get_messages(
        &self,
        caller: &str,
        conversation_id: ConversationId,
        page: PageRequest,
    ) -> Result<Page<Message>> {
        require_account("caller", caller)?;
        self.conversations.list_messages(conversation_id, caller, page).await
    }

    pub async fn create_group(&self, group: NewGroup) -> Result<Confirmation<Conversation>> {
        let conversation = self.conversations.create_group(group).await?;
        tracing::info!(
            "Group conversation {} created with {} participant(s)",
            conversation.id,
            conversation.participants.len()
        );
        Ok(Confirmation::new("Group created", conversation))
    }

    pub async fn mark_seen(&self, caller: &str, message_id: MessageId) -> Result<Confirmation<Message>> {
        require_account("caller", caller)?;
        let message = self.conversations.mark_seen(message_id, caller).await?;
        Ok(Confirmation::new("Message marked as seen", message))
    }

    /// `None` removes the caller's reaction.
    pub async fn react(
        &self,
        caller: &str,
        message_id: MessageId,
        reaction: Option<ReactionKind>,
    ) -> Result<Confirmation<Message>> {
        require_account("caller", caller)?;
        let message = self.conversations.set_reaction(message_id, caller, reaction).await?;
        let text = if reaction.is_some() {
            "Reaction saved"
        } else {
            "Reaction removed"
        };
        Ok(Confirmation::new(text, message))
    }

    pub async fn delete_for_me(&self, caller: &str, message_id: MessageId) -> Result<Confirmation<Message>> {
        require_account("caller", caller)?;
        let message = self.conversations.delete_for(message_id, caller).await?;
        Ok(Confirmation::new("Message deleted", message))
    }
}
