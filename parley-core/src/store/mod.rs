//! Persistence for the friend graph and for conversations.
//!
//! Both stores come in two flavours with identical semantics: Postgres through
//! diesel-async, and a process-local in-memory variant.

use async_trait::async_trait;

use crate::error::Result;
use crate::pagination::{Page, PageRequest};
use crate::types::{
    Conversation, ConversationId, Message, MessageId, MessageType, NewGroup, ReactionKind,
    Relationship, RelationshipId,
};

pub mod memory;
pub mod postgres;

pub use memory::{MemoryAccountDirectory, MemoryConversationStore, MemoryRelationshipStore};
pub use postgres::{PgAccountDirectory, PgConversationStore, PgRelationshipStore};

#[async_trait]
pub trait RelationshipStore: Send + Sync {
    /// Creates a PENDING edge. At most one edge exists per unordered pair.
    async fn create_pending(&self, actor: &str, target: &str) -> Result<Relationship>;

    /// PENDING -> ACCEPTED, by the target only.
    async fn accept(&self, relationship_id: RelationshipId, caller: &str) -> Result<Relationship>;

    /// PENDING -> REJECTED, by the target only. The edge is removed.
    async fn decline(&self, relationship_id: RelationshipId, caller: &str) -> Result<Relationship>;

    /// PENDING -> CANCELLED, by the actor only. The edge is removed.
    async fn cancel(&self, relationship_id: RelationshipId, caller: &str) -> Result<Relationship>;

    /// PENDING edges addressed to `account_id`, newest first.
    async fn list_pending(&self, account_id: &str, page: PageRequest) -> Result<Page<Relationship>>;

    /// ACCEPTED edges on either side of `account_id`, most recently accepted first.
    async fn list_accepted(&self, account_id: &str, page: PageRequest) -> Result<Page<Relationship>>;

    async fn find_between(&self, a: &str, b: &str) -> Result<Option<Relationship>>;

    /// Removes the edge for the unordered pair and returns it.
    async fn delete(&self, a: &str, b: &str) -> Result<Relationship>;
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn create_cloud(&self, account_id: &str) -> Result<Conversation>;

    /// Returns the existing PRIVATE conversation for the pair when there is one.
    async fn create_private(&self, a: &str, b: &str) -> Result<Conversation>;

    async fn create_group(&self, group: NewGroup) -> Result<Conversation>;

    async fn get_conversation(&self, conversation_id: ConversationId) -> Result<Conversation>;

    /// Inserts a SENT message and moves the conversation's last message pointer to it
    /// in the same unit of work.
    async fn append_message(
        &self,
        conversation_id: ConversationId,
        sender_id: &str,
        content: &str,
        message_type: MessageType,
    ) -> Result<Message>;

    /// Conversations containing `account_id`, most recently updated first.
    async fn list_conversations(&self, account_id: &str, page: PageRequest) -> Result<Page<Conversation>>;

    /// Messages of a conversation, newest first, minus those the caller deleted for themselves.
    async fn list_messages(
        &self,
        conversation_id: ConversationId,
        caller: &str,
        page: PageRequest,
    ) -> Result<Page<Message>>;

    async fn mark_seen(&self, message_id: MessageId, account_id: &str) -> Result<Message>;

    /// `None` clears the account's reaction.
    async fn set_reaction(
        &self,
        message_id: MessageId,
        account_id: &str,
        reaction: Option<ReactionKind>,
    ) -> Result<Message>;

    async fn delete_for(&self, message_id: MessageId, account_id: &str) -> Result<Message>;
}

/// Guards a status transition out of PENDING: existence is checked by the caller,
/// then who may act, then the current status.
pub(crate) fn authorize_transition(
    record: &Relationship,
    caller: &str,
    next: crate::types::RelationshipStatus,
) -> Result<()> {
    use crate::error::ParleyError;
    use crate::types::RelationshipStatus;

    match next {
        RelationshipStatus::Accepted | RelationshipStatus::Rejected => {
            if record.target_account_id != caller {
                return Err(ParleyError::NotRelationshipTarget(record.id));
            }
        }
        RelationshipStatus::Cancelled => {
            if record.actor_account_id != caller {
                return Err(ParleyError::NotRelationshipActor(record.id));
            }
        }
        RelationshipStatus::Pending => {
            return Err(ParleyError::InvalidState { status: record.status });
        }
    }

    if record.status != RelationshipStatus::Pending {
        return Err(ParleyError::InvalidState { status: record.status });
    }
    Ok(())
}
