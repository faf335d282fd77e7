use async_trait::async_trait;
use mockall::mock;
use parley_chat::ChatService;
use parley_core::store::{MemoryConversationStore, MemoryRelationshipStore};
use parley_core::{
    AccountProfile, ConversationStore, ConversationType, ErrorKind, Identity, IdentityProvider,
    MessageStatus, MessageType, NewGroup, PageRequest, ReactionKind, Result,
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

struct Fixture {
    chat: ChatService,
    social: SocialService,
    conversations: Arc<MemoryConversationStore>,
    registry: Arc<ConnectionRegistry>,
}

fn fixture() -> Fixture {
    let mut provider = MockProvider::new();
    provider.expect_account_profile().returning(|account_id: &str| {
        Ok(AccountProfile {
            account_id: account_id.to_string(),
            display_name: account_id.to_uppercase(),
        })
    });

    let conversations = Arc::new(MemoryConversationStore::new());
    let registry = Arc::new(ConnectionRegistry::new());
    let dispatcher = NotificationDispatcher::new(registry.clone());

    Fixture {
        chat: ChatService::new(conversations.clone(), dispatcher.clone()),
        social: SocialService::new(
            Arc::new(MemoryRelationshipStore::new()),
            conversations.clone(),
            Arc::new(provider),
            dispatcher,
        ),
        conversations,
        registry,
    }
}

fn page(n: u32, size: u32) -> PageRequest {
    PageRequest::new(n, size).unwrap()
}

#[tokio::test]
async fn request_accept_and_first_message() {
    let fx = fixture();
    let (h1_tx, mut h1) = mpsc::channel(8);
    fx.registry.register("b", ConnectionHandle::new(h1_tx));

    let r1 = fx.social.request_friend("a", "b").await.unwrap().data;
    assert_eq!(h1.recv().await.unwrap().event_type, EventType::FriendRequest);

    let c1 = fx.social.accept_friend_request("b", r1.id).await.unwrap().data.conversation;

    let m1 = fx.chat.send_message("a", c1.id, "hello b", None).await.unwrap().data;
    assert_eq!(m1.status, MessageStatus::Sent);
    assert_eq!(m1.message_type, MessageType::Text);

    let conversation = fx.chat.get_conversation("a", c1.id).await.unwrap();
    assert_eq!(conversation.last_message_id, Some(m1.id));

    let pushed = h1.recv().await.unwrap();
    assert_eq!(pushed.event_type, EventType::NewMessage);
    assert_eq!(pushed.payload["content"], "hello b");

    let listed = fx.chat.get_messages("b", c1.id, page(1, 10)).await.unwrap();
    assert_eq!(listed.items.len(), 1);
    assert_eq!(listed.items[0].id, m1.id);
    assert_eq!(listed.total, 1);
    assert_eq!(listed.page, 1);
    assert_eq!(listed.page_count, 1);
}

#[tokio::test]
async fn sender_is_not_notified_of_their_own_message() {
    let fx = fixture();
    let (tx, mut own) = mpsc::channel(8);
    fx.registry.register("a", ConnectionHandle::new(tx));

    let c = fx.conversations.create_private("a", "b").await.unwrap();
    fx.chat.send_message("a", c.id, "ping", None).await.unwrap();
    assert!(own.try_recv().is_err());
}

#[tokio::test]
async fn a_saturated_handle_does_not_fail_the_send() {
    let fx = fixture();
    let (tx, _never_read) = mpsc::channel(1);
    fx.registry.register("b", ConnectionHandle::new(tx));

    let c = fx.conversations.create_private("a", "b").await.unwrap();
    for i in 0..5 {
        fx.chat
            .send_message("a", c.id, &format!("burst {}", i), Some(MessageType::Text))
            .await
            .unwrap();
    }
    let listed = fx.chat.get_messages("b", c.id, page(1, 10)).await.unwrap();
    assert_eq!(listed.total, 5);
}

#[tokio::test]
async fn outsiders_and_blank_messages_are_rejected() {
    let fx = fixture();
    let c = fx.conversations.create_private("a", "b").await.unwrap();

    let blank = fx.chat.send_message("a", c.id, "   ", None).await.unwrap_err();
    assert_eq!(blank.kind(), ErrorKind::InvalidInput);

    let outsider = fx.chat.send_message("mallory", c.id, "hi", None).await.unwrap_err();
    assert_eq!(outsider.kind(), ErrorKind::Forbidden);
    assert_eq!(fx.chat.get_conversation("a", c.id).await.unwrap().last_message_id, None);

    assert_eq!(
        fx.chat.get_conversation("mallory", c.id).await.unwrap_err().kind(),
        ErrorKind::Forbidden
    );
    assert_eq!(
        fx.chat.get_messages("mallory", c.id, page(1, 10)).await.unwrap_err().kind(),
        ErrorKind::Forbidden
    );
    assert_eq!(
        fx.chat.send_message("a", 4242, "hi", None).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[tokio::test]
async fn provisioning_creates_a_private_cloud() {
    let fx = fixture();
    let cloud = fx.chat.provision_account("a").await.unwrap().data;
    assert_eq!(cloud.conversation_type, ConversationType::Cloud);

    let note = fx.chat.send_message("a", cloud.id, "buy milk", None).await.unwrap();
    assert_eq!(note.message, "Message sent");

    let listed = fx.chat.get_conversations("a", page(1, 10)).await.unwrap();
    assert_eq!(listed.total, 1);
    assert!(fx.chat.get_conversations("b", page(1, 10)).await.unwrap().items.is_empty());
}

#[tokio::test]
async fn group_messages_reach_every_other_member() {
    let fx = fixture();
    let (b_tx, mut b) = mpsc::channel(8);
    let (c_tx, mut c) = mpsc::channel(8);
    fx.registry.register("b", ConnectionHandle::new(b_tx));
    fx.registry.register("c", ConnectionHandle::new(c_tx));

    let group = fx
        .chat
        .create_group(NewGroup {
            admin: "a".into(),
            members: vec!["b".into(), "c".into()],
            name: "trip".into(),
            description: None,
            avatar: None,
        })
        .await
        .unwrap()
        .data;

    fx.chat
        .send_message("a", group.id, "photo", Some(MessageType::Image))
        .await
        .unwrap();
    assert_eq!(b.recv().await.unwrap().payload["message_type"], "image");
    assert_eq!(c.recv().await.unwrap().payload["content"], "photo");
}

#[tokio::test]
async fn seen_reaction_and_delete_for_me() {
    let fx = fixture();
    let c = fx.conversations.create_private("a", "b").await.unwrap();
    let m = fx.chat.send_message("a", c.id, "lunch?", None).await.unwrap().data;

    let seen = fx.chat.mark_seen("b", m.id).await.unwrap().data;
    assert!(seen.seen_by.contains("a") && seen.seen_by.contains("b"));

    let reacted = fx.chat.react("b", m.id, Some(ReactionKind::Haha)).await.unwrap();
    assert_eq!(reacted.message, "Reaction saved");
    assert_eq!(reacted.data.reactions.get("b"), Some(&ReactionKind::Haha));
    let cleared = fx.chat.react("b", m.id, None).await.unwrap();
    assert!(cleared.data.reactions.is_empty());

    fx.chat.delete_for_me("b", m.id).await.unwrap();
    assert_eq!(fx.chat.get_messages("b", c.id, page(1, 10)).await.unwrap().total, 0);
    assert_eq!(fx.chat.get_messages("a", c.id, page(1, 10)).await.unwrap().total, 1);

    assert_eq!(
        fx.chat.react("mallory", m.id, Some(ReactionKind::Angry)).await.unwrap_err().kind(),
        ErrorKind::Forbidden
    );
}
