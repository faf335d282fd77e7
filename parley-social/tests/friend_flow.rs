use async_trait::async_trait;
use mockall::mock;
use parley_core::store::{MemoryConversationStore, MemoryRelationshipStore};
use parley_core::{
    AccountProfile, ConversationStore, ConversationType, ErrorKind, Identity, IdentityProvider,
    PageRequest, ParleyError, RelationshipStatus, RelationshipStore, Result,
};
use parley_notify::{ConnectionHandle, ConnectionRegistry, EventType, NotificationDispatcher};
use parley_social::SocialService;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tokio::sync::mpsc;

mock! {
    pub Provider {}

    #[async_trait]
    impl IdentityProvider for Provider {
        async fn verify(&self, token: &str) -> Result<Identity>;
        async fn account_profile(&self, account_id: &str) -> Result<AccountProfile>;
    }
}

fn directory() -> Arc<dyn IdentityProvider> {
    let mut provider = MockProvider::new();
    provider
        .expect_account_profile()
        .returning(|account_id: &str| match account_id {
            "alice" | "bob" | "carol" => Ok(AccountProfile {
                account_id: account_id.to_string(),
                display_name: format!("{}{}", account_id[..1].to_uppercase(), &account_id[1..]),
            }),
            other => Err(ParleyError::AccountNotFound(other.to_string())),
        });
    Arc::new(provider)
}

struct Fixture {
    social: SocialService,
    relationships: Arc<MemoryRelationshipStore>,
    conversations: Arc<MemoryConversationStore>,
    registry: Arc<ConnectionRegistry>,
}

fn fixture() -> Fixture {
    let relationships = Arc::new(MemoryRelationshipStore::new());
    let conversations = Arc::new(MemoryConversationStore::new());
    let registry = Arc::new(ConnectionRegistry::new());
    let social = SocialService::new(
        relationships.clone(),
        conversations.clone(),
        directory(),
        NotificationDispatcher::new(registry.clone()),
    );
    Fixture {
        social,
        relationships,
        conversations,
        registry,
    }
}

fn page(n: u32, size: u32) -> PageRequest {
    PageRequest::new(n, size).unwrap()
}

#[tokio::test]
async fn request_then_accept_notifies_both_sides() {
    let fx = fixture();
    let (bob_tx, mut bob_events) = mpsc::channel(8);
    let (alice_tx, mut alice_events) = mpsc::channel(8);
    fx.registry.register("bob", ConnectionHandle::new(bob_tx));
    fx.registry.register("alice", ConnectionHandle::new(alice_tx));

    let requested = fx.social.request_friend("alice", "bob").await.unwrap();
    let r1 = requested.data;
    assert_eq!(r1.status, RelationshipStatus::Pending);

    let event = bob_events.recv().await.unwrap();
    assert_eq!(event.event_type, EventType::FriendRequest);
    assert_eq!(event.message, "Alice sent you a friend request");
    assert_eq!(event.payload["id"], r1.id);

    let before = fx.conversations.list_conversations("alice", page(1, 10)).await.unwrap();
    assert_eq!(before.total, 0);

    let accepted = fx.social.accept_friend_request("bob", r1.id).await.unwrap();
    assert_eq!(accepted.data.relationship.status, RelationshipStatus::Accepted);
    let c1 = accepted.data.conversation;
    assert_eq!(c1.conversation_type, ConversationType::Private);
    assert!(c1.is_participant("alice") && c1.is_participant("bob"));

    let event = alice_events.recv().await.unwrap();
    assert_eq!(event.event_type, EventType::FriendRequestAccepted);
    assert_eq!(event.message, "Bob accepted your friend request");

    let after = fx.conversations.list_conversations("alice", page(1, 10)).await.unwrap();
    assert_eq!(after.total, 1);
    assert_eq!(after.items[0].id, c1.id);
}

#[tokio::test]
async fn duplicate_and_self_requests_are_refused() {
    let fx = fixture();
    fx.social.request_friend("alice", "bob").await.unwrap();

    let again = fx.social.request_friend("alice", "bob").await.unwrap_err();
    let reverse = fx.social.request_friend("bob", "alice").await.unwrap_err();
    assert_eq!(again.kind(), ErrorKind::Conflict);
    assert_eq!(reverse.kind(), ErrorKind::Conflict);

    let own = fx.social.request_friend("alice", "alice").await.unwrap_err();
    assert_eq!(own.kind(), ErrorKind::InvalidInput);

    let blank = fx.social.request_friend("alice", "  ").await.unwrap_err();
    assert_eq!(blank.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn unknown_accounts_do_not_get_requests() {
    let fx = fixture();
    let err = fx.social.request_friend("alice", "nobody").await.unwrap_err();
    assert!(matches!(err, ParleyError::AccountNotFound(ref id) if id == "nobody"));
    assert!(fx.relationships.find_between("alice", "nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn only_the_target_may_accept() {
    let fx = fixture();
    let r = fx.social.request_friend("alice", "bob").await.unwrap().data;

    for outsider in ["alice", "carol"] {
        let err = fx.social.accept_friend_request(outsider, r.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }
    let missing = fx.social.accept_friend_request("bob", r.id + 50).await.unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::NotFound);

    fx.social.accept_friend_request("bob", r.id).await.unwrap();
    let twice = fx.social.accept_friend_request("bob", r.id).await.unwrap_err();
    assert_eq!(twice.kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn unfriend_allows_a_new_request_and_keeps_history() {
    let fx = fixture();
    let r = fx.social.request_friend("alice", "bob").await.unwrap().data;
    let first = fx.social.accept_friend_request("bob", r.id).await.unwrap().data.conversation;

    let removed = fx.social.unfriend("bob", "alice").await.unwrap();
    assert_eq!(removed.data.id, r.id);
    assert_eq!(fx.social.unfriend("alice", "bob").await.unwrap_err().kind(), ErrorKind::NotFound);

    let r2 = fx.social.request_friend("bob", "alice").await.unwrap().data;
    let second = fx.social.accept_friend_request("alice", r2.id).await.unwrap().data.conversation;
    assert_eq!(second.id, first.id);

    let conversations = fx.conversations.list_conversations("bob", page(1, 10)).await.unwrap();
    assert_eq!(conversations.total, 1);
}

#[tokio::test]
async fn decline_and_cancel_free_the_pair() {
    let fx = fixture();
    let r = fx.social.request_friend("alice", "bob").await.unwrap().data;
    let declined = fx.social.decline_friend_request("bob", r.id).await.unwrap();
    assert_eq!(declined.data.status, RelationshipStatus::Rejected);

    let r = fx.social.request_friend("alice", "bob").await.unwrap().data;
    let err = fx.social.cancel_friend_request("bob", r.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    let cancelled = fx.social.cancel_friend_request("alice", r.id).await.unwrap();
    assert_eq!(cancelled.data.status, RelationshipStatus::Cancelled);

    assert!(fx.social.list_pending_requests("bob", page(1, 10)).await.unwrap().items.is_empty());
}

#[tokio::test]
async fn friends_are_listed_from_the_callers_side() {
    let fx = fixture();
    let ab = fx.social.request_friend("alice", "bob").await.unwrap().data;
    let cb = fx.social.request_friend("carol", "bob").await.unwrap().data;

    let pending = fx.social.list_pending_requests("bob", page(1, 1)).await.unwrap();
    assert_eq!(pending.total, 2);
    assert_eq!(pending.page_count, 2);
    assert!(pending.has_next);

    fx.social.accept_friend_request("bob", ab.id).await.unwrap();
    fx.social.accept_friend_request("bob", cb.id).await.unwrap();

    let bobs = fx.social.list_friends("bob", page(1, 10)).await.unwrap();
    let mut names: Vec<_> = bobs.items.iter().map(|f| f.account_id.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["alice".to_string(), "carol".to_string()]);

    let alices = fx.social.list_friends("alice", page(1, 10)).await.unwrap();
    assert_eq!(alices.items.len(), 1);
    assert_eq!(alices.items[0].account_id, "bob");
    assert_eq!(alices.items[0].relationship_id, ab.id);
}

#[tokio::test]
async fn accept_survives_a_failed_profile_lookup() {
    let fx = fixture();
    let (tx, mut events) = mpsc::channel(4);
    fx.registry.register("alice", ConnectionHandle::new(tx));

    // "dave" is unknown to the directory but may still hold a pending request.
    let r = fx.relationships.create_pending("alice", "dave").await.unwrap();
    fx.social.accept_friend_request("dave", r.id).await.unwrap();

    let event = events.recv().await.unwrap();
    assert_eq!(event.message, "dave accepted your friend request");
}
