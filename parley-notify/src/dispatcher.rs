use parley_core::{Message, Relationship};
use std::sync::Arc;

use crate::event::{EventType, NotificationEvent};
use crate::registry::ConnectionRegistry;

/// Best-effort fan-out of events to the live handles of an account.
///
/// Nothing here returns an error: an account without handles simply misses the
/// event and catches up through the listing operations.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    registry: Arc<ConnectionRegistry>,
}

impl NotificationDispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Returns how many handles accepted the event.
    pub fn deliver(&self, account_id: &str, event: NotificationEvent) -> usize {
        let handles = self.registry.handles_for(account_id);
        if handles.is_empty() {
            tracing::debug!("{} is offline, dropping {:?} event", account_id, event.event_type);
            return 0;
        }

        let event = Arc::new(event);
        let mut delivered = 0;
        for handle in &handles {
            match handle.try_deliver(event.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!(
                    "Failed to deliver {:?} to connection {} of {}: {}",
                    event.event_type,
                    handle.id(),
                    account_id,
                    e
                ),
            }
        }

        tracing::debug!(
            "Delivered {:?} to {}/{} connection(s) of {}",
            event.event_type,
            delivered,
            handles.len(),
            account_id
        );
        delivered
    }

    pub fn notify_friend_request(
        &self,
        target_account_id: &str,
        actor_display_name: &str,
        relationship: &Relationship,
    ) -> usize {
        let event = NotificationEvent::with_payload(
            EventType::FriendRequest,
            format!("{} sent you a friend request", actor_display_name),
            relationship,
        );
        self.deliver(target_account_id, event)
    }

    pub fn notify_friend_accepted(
        &self,
        actor_account_id: &str,
        target_display_name: &str,
        relationship: &Relationship,
    ) -> usize {
        let event = NotificationEvent::with_payload(
            EventType::FriendRequestAccepted,
            format!("{} accepted your friend request", target_display_name),
            relationship,
        );
        self.deliver(actor_account_id, event)
    }

    pub fn notify_new_message(&self, recipient_account_id: &str, message: &Message) -> usize {
        let event = NotificationEvent::with_payload(
            EventType::NewMessage,
            format!("New message from {}", message.sender_id),
            message,
        );
        self.deliver(recipient_account_id, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ConnectionHandle;
    use chrono::Utc;
    use parley_core::RelationshipStatus;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    fn relationship() -> Relationship {
        Relationship {
            id: 7,
            actor_account_id: "alice".into(),
            target_account_id: "bob".into(),
            status: RelationshipStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn offline_account_gets_nothing() {
        let dispatcher = NotificationDispatcher::new(Arc::new(ConnectionRegistry::new()));
        assert_eq!(dispatcher.notify_friend_request("bob", "Alice", &relationship()), 0);
    }

    #[tokio::test]
    async fn every_handle_of_the_account_sees_the_same_event() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (phone_tx, mut phone) = mpsc::channel(4);
        let (laptop_tx, mut laptop) = mpsc::channel(4);
        let (other_tx, mut other) = mpsc::channel(4);
        registry.register("bob", ConnectionHandle::new(phone_tx));
        registry.register("bob", ConnectionHandle::new(laptop_tx));
        registry.register("carol", ConnectionHandle::new(other_tx));

        let dispatcher = NotificationDispatcher::new(registry);
        assert_eq!(dispatcher.notify_friend_request("bob", "Alice", &relationship()), 2);

        let a = phone.recv().await.unwrap();
        let b = laptop.recv().await.unwrap();
        assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
        assert_eq!(a.event_type, EventType::FriendRequest);
        assert_eq!(a.message, "Alice sent you a friend request");
        assert_eq!(a.payload["id"], 7);
        assert!(other.try_recv().is_err());
    }

    #[test]
    fn a_stuck_handle_does_not_block_the_others() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (stuck_tx, _stuck) = mpsc::channel(1);
        let (live_tx, mut live) = mpsc::channel(8);
        let (closed_tx, closed) = mpsc::channel(8);
        drop(closed);
        registry.register("alice", ConnectionHandle::new(stuck_tx));
        registry.register("alice", ConnectionHandle::new(live_tx));
        registry.register("alice", ConnectionHandle::new(closed_tx));

        let dispatcher = NotificationDispatcher::new(registry);
        assert_eq!(dispatcher.notify_friend_accepted("alice", "Bob", &relationship()), 2);
        // The single-slot handle is now full.
        assert_eq!(dispatcher.notify_friend_accepted("alice", "Bob", &relationship()), 1);

        let first = live.try_recv().unwrap();
        assert_eq!(first.message, "Bob accepted your friend request");
        assert!(live.try_recv().is_ok());
    }
}
