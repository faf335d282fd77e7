//! Friend-graph workflows: request, answer, list and unfriend.

use chrono::{DateTime, Utc};
use parley_core::error::require_account;
use parley_core::{
    AccountId, Confirmation, Conversation, ConversationStore, IdentityProvider, Page, PageRequest,
    ParleyContext, ParleyError, Relationship, RelationshipId, RelationshipStore, Result,
};
use parley_notify::NotificationDispatcher;
use serde::Serialize;
use std::sync::Arc;

/// An accepted relationship seen from one side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Friend {
    pub relationship_id: RelationshipId,
    pub account_id: AccountId,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FriendshipAccepted {
    pub relationship: Relationship,
    pub conversation: Conversation,
}

#[derive(Clone)]
pub struct SocialService {
    relationships: Arc<dyn RelationshipStore>,
    conversations: Arc<dyn ConversationStore>,
    identity: Arc<dyn IdentityProvider>,
    dispatcher: NotificationDispatcher,
}

impl SocialService {
    pub fn new(
        relationships: Arc<dyn RelationshipStore>,
        conversations: Arc<dyn ConversationStore>,
        identity: Arc<dyn IdentityProvider>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            relationships,
            conversations,
            identity,
            dispatcher,
        }
    }

    pub fn from_context(
        ctx: &ParleyContext,
        identity: Arc<dyn IdentityProvider>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self::new(
            ctx.relationships.clone(),
            ctx.conversations.clone(),
            identity,
            dispatcher,
        )
    }

    pub async fn request_friend(&self, actor: &str, target: &str) -> Result<Confirmation<Relationship>> {
        require_account("actor", actor)?;
        require_account("target", target)?;
        if actor == target {
            return Err(ParleyError::InvalidSelfReference);
        }

        let (actor_profile, _target_profile) = tokio::try_join!(
            self.identity.account_profile(actor),
            self.identity.account_profile(target),
        )?;

        let relationship = self.relationships.create_pending(actor, target).await?;
        tracing::info!(
            "Friend request {} from {} to {}",
            relationship.id,
            actor,
            target
        );

        self.dispatcher
            .notify_friend_request(target, &actor_profile.display_name, &relationship);
        Ok(Confirmation::new("Friend request sent", relationship))
    }

    /// Accepting materialises the PRIVATE conversation of the pair.
    pub async fn accept_friend_request(
        &self,
        caller: &str,
        relationship_id: RelationshipId,
    ) -> Result<Confirmation<FriendshipAccepted>> {
        require_account("caller", caller)?;

        let relationship = self.relationships.accept(relationship_id, caller).await?;
        let conversation = self
            .conversations
            .create_private(&relationship.actor_account_id, &relationship.target_account_id)
            .await?;
        tracing::info!(
            "Friend request {} accepted, conversation {}",
            relationship.id,
            conversation.id
        );

        let display_name = self.display_name(caller).await;
        self.dispatcher
            .notify_friend_accepted(&relationship.actor_account_id, &display_name, &relationship);

        Ok(Confirmation::new(
            "Friend request accepted",
            FriendshipAccepted {
                relationship,
                conversation,
            },
        ))
    }

    pub async fn decline_friend_request(
        &self,
        caller: &str,
        relationship_id: RelationshipId,
    ) -> Result<Confirmation<Relationship>> {
        require_account("caller", caller)?;
        let relationship = self.relationships.decline(relationship_id, caller).await?;
        tracing::info!("Friend request {} declined by {}", relationship_id, caller);
        Ok(Confirmation::new("Friend request declined", relationship))
    }

    pub async fn cancel_friend_request(
        &self,
        caller: &str,
        relationship_id: RelationshipId,
    ) -> Result<Confirmation<Relationship>> {
        require_account("caller", caller)?;
        let relationship = self.relationships.cancel(relationship_id, caller).await?;
        tracing::info!("Friend request {} cancelled by {}", relationship_id, caller);
        Ok(Confirmation::new("Friend request cancelled", relationship))
    }

    pub async fn list_pending_requests(&self, account_id: &str, page: PageRequest) -> Result<Page<Relationship>> {
        require_account("account", account_id)?;
        self.relationships.list_pending(account_id, page).await
    }

    pub async fn list_friends(&self, account_id: &str, page: PageRequest) -> Result<Page<Friend>> {
        require_account("account", account_id)?;
        let accepted = self.relationships.list_accepted(account_id, page).await?;
        Ok(accepted.map(|relationship| Friend {
            relationship_id: relationship.id,
            account_id: relationship.other_side(account_id).to_string(),
            since: relationship.updated_at,
        }))
    }

    /// Removes the edge only; the pair's PRIVATE conversation and its history stay.
    pub async fn unfriend(&self, caller: &str, other: &str) -> Result<Confirmation<Relationship>> {
        require_account("caller", caller)?;
        require_account("friend", other)?;
        let removed = self.relationships.delete(caller, other).await?;
        tracing::info!("{} unfriended {}", caller, other);
        Ok(Confirmation::new("Friend removed", removed))
    }

    async fn display_name(&self, account_id: &str) -> String {
        match self.identity.account_profile(account_id).await {
            Ok(profile) => profile.display_name,
            Err(e) => {
                tracing::warn!("Profile lookup for {} failed, using the id: {}", account_id, e);
                account_id.to_string()
            }
        }
    }
}
