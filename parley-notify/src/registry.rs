use dashmap::DashMap;
use parley_core::AccountId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::event::NotificationEvent;

pub type ConnectionId = Uuid;
pub type EventSender = mpsc::Sender<Arc<NotificationEvent>>;
pub type EventReceiver = mpsc::Receiver<Arc<NotificationEvent>>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("connection buffer is full")]
    Full,
    #[error("connection is closed")]
    Closed,
}

/// One live push channel of an account.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    sender: EventSender,
}

impl ConnectionHandle {
    pub fn new(sender: EventSender) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Never waits: a slow consumer loses the event instead of stalling the sender.
    pub fn try_deliver(&self, event: Arc<NotificationEvent>) -> Result<(), DeliveryError> {
        self.sender.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Full,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

/// Live handles per account. An account entry exists only while it holds a handle.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<AccountId, HashMap<ConnectionId, ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the handle was already registered.
    pub fn register(&self, account_id: &str, handle: ConnectionHandle) -> bool {
        let mut handles = self.connections.entry(account_id.to_string()).or_default();
        if handles.contains_key(&handle.id) {
            return false;
        }
        tracing::debug!("Registered connection {} for {}", handle.id, account_id);
        handles.insert(handle.id, handle);
        true
    }

    /// Returns false when the handle was not registered.
    pub fn unregister(&self, account_id: &str, connection_id: ConnectionId) -> bool {
        let removed = match self.connections.get_mut(account_id) {
            Some(mut handles) => handles.remove(&connection_id).is_some(),
            None => false,
        };
        self.connections.remove_if(account_id, |_, handles| handles.is_empty());

        if removed {
            tracing::debug!("Unregistered connection {} for {}", connection_id, account_id);
        }
        removed
    }

    pub fn handles_for(&self, account_id: &str) -> Vec<ConnectionHandle> {
        self.connections
            .get(account_id)
            .map(|handles| handles.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_online(&self, account_id: &str) -> bool {
        self.connections.contains_key(account_id)
    }

    pub fn online_accounts(&self) -> usize {
        self.connections.len()
    }

    /// Total live handles across all accounts.
    pub fn connection_count(&self) -> usize {
        self.connections.iter().map(|entry| entry.value().len()).sum()
    }
}
