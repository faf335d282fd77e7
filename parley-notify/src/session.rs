use parley_core::{Identity, IdentityProvider, Result};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::registry::{ConnectionHandle, ConnectionId, ConnectionRegistry, EventReceiver};

/// Keeps a handle registered for as long as it lives.
///
/// Dropping the guard unregisters the handle, whichever way the connection ends.
#[derive(Debug)]
pub struct ConnectionGuard {
    registry: Arc<ConnectionRegistry>,
    identity: Identity,
    connection_id: ConnectionId,
}

impl ConnectionGuard {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn account_id(&self) -> &str {
        &self.identity.account_id
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.unregister(&self.identity.account_id, self.connection_id);
        tracing::info!(
            "Connection {} closed for {}",
            self.connection_id,
            self.identity.account_id
        );
    }
}

/// An authenticated, registered connection and the stream of events addressed to it.
#[derive(Debug)]
pub struct Connection {
    pub guard: ConnectionGuard,
    pub events: EventReceiver,
}

/// Authenticates connections and ties their registration to a guard.
#[derive(Clone)]
pub struct SessionManager {
    registry: Arc<ConnectionRegistry>,
    identity: Arc<dyn IdentityProvider>,
    channel_capacity: usize,
}

impl SessionManager {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        identity: Arc<dyn IdentityProvider>,
        channel_capacity: usize,
    ) -> Self {
        Self {
            registry,
            identity,
            channel_capacity: channel_capacity.max(1),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Verifies the bearer credential without registering anything.
    pub async fn authenticate(&self, token: &str) -> Result<Identity> {
        self.identity.verify(token).await.map_err(|e| {
            tracing::debug!("Rejected connection credential: {}", e);
            e
        })
    }

    /// Registers a fresh handle for an already verified identity.
    pub fn attach(&self, identity: Identity) -> Connection {
        let (sender, events) = mpsc::channel(self.channel_capacity);
        let handle = ConnectionHandle::new(sender);
        let connection_id = handle.id();
        self.registry.register(&identity.account_id, handle);
        tracing::info!("Connection {} opened for {}", connection_id, identity.account_id);

        Connection {
            guard: ConnectionGuard {
                registry: self.registry.clone(),
                identity,
                connection_id,
            },
            events,
        }
    }

    /// Verify, then register. Nothing is registered when verification fails.
    pub async fn open(&self, token: &str) -> Result<Connection> {
        let identity = self.authenticate(token).await?;
        Ok(self.attach(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::mock;
    use parley_core::{AccountProfile, ErrorKind, ParleyError};

    mock! {
        pub Provider {}

        #[async_trait]
        impl IdentityProvider for Provider {
            async fn verify(&self, token: &str) -> Result<Identity>;
            async fn account_profile(&self, account_id: &str) -> Result<AccountProfile>;
        }
    }

    fn provider() -> Arc<dyn IdentityProvider> {
        let mut provider = MockProvider::new();
        provider.expect_verify().returning(|token: &str| match token {
            "alice-token" => Ok(Identity {
                account_id: "alice".to_string(),
                roles: vec![],
            }),
            _ => Err(ParleyError::InvalidToken),
        });
        Arc::new(provider)
    }

    #[tokio::test]
    async fn bad_token_is_rejected_without_registration() {
        let registry = Arc::new(ConnectionRegistry::new());
        let sessions = SessionManager::new(registry.clone(), provider(), 8);

        let err = sessions.open("forged").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);
        assert_eq!(registry.connection_count(), 0);
    }

    #[tokio::test]
    async fn dropping_the_guard_unregisters_once() {
        let registry = Arc::new(ConnectionRegistry::new());
        let sessions = SessionManager::new(registry.clone(), provider(), 8);

        let first = sessions.open("alice-token").await.unwrap();
        let second = sessions.open("alice-token").await.unwrap();
        assert_eq!(first.guard.account_id(), "alice");
        assert_ne!(first.guard.connection_id(), second.guard.connection_id());
        assert_eq!(registry.handles_for("alice").len(), 2);

        drop(first);
        assert_eq!(registry.handles_for("alice").len(), 1);
        drop(second);
        assert!(!registry.is_online("alice"));
    }

    #[tokio::test]
    async fn guard_is_released_when_the_owning_task_panics() {
        let registry = Arc::new(ConnectionRegistry::new());
        let sessions = SessionManager::new(registry.clone(), provider(), 8);
        let connection = sessions.open("alice-token").await.unwrap();
        assert!(registry.is_online("alice"));

        let task = tokio::spawn(async move {
            let _connection = connection;
            panic!("transport failure");
        });
        assert!(task.await.is_err());
        assert!(!registry.is_online("alice"));
    }
}
