use std::sync::Arc;

use crate::config::{Config, StorageBackend};
use crate::db::{create_pool, run_migrations, DbPool};
use crate::identity::AccountDirectory;
use crate::store::{
    ConversationStore, MemoryAccountDirectory, MemoryConversationStore, MemoryRelationshipStore,
    PgAccountDirectory, PgConversationStore, PgRelationshipStore, RelationshipStore,
};

/// Shared handles to configuration and the persistence layer.
#[derive(Clone)]
pub struct ParleyContext {
    pub config: Arc<Config>,
    pub db_pool: Option<Arc<DbPool>>,
    pub relationships: Arc<dyn RelationshipStore>,
    pub conversations: Arc<dyn ConversationStore>,
    pub accounts: Arc<dyn AccountDirectory>,
}

impl ParleyContext {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        match config.storage.backend {
            StorageBackend::Postgres => {
                if config.database.run_migrations {
                    run_migrations(&config.database).await?;
                }
                let db_pool = create_pool(&config.database).await?;

                Ok(ParleyContext {
                    relationships: Arc::new(PgRelationshipStore::new(db_pool.clone())),
                    conversations: Arc::new(PgConversationStore::new(db_pool.clone())),
                    accounts: Arc::new(PgAccountDirectory::new(db_pool.clone())),
                    db_pool: Some(db_pool),
                    config: Arc::new(config),
                })
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage, data is lost on restart");
                Ok(Self::in_memory(config))
            }
        }
    }

    /// Process-local stores, with the account directory seeded from `dev_accounts`.
    pub fn in_memory(config: Config) -> Self {
        let accounts = MemoryAccountDirectory::with_profiles(config.storage.dev_accounts.iter().cloned());
        tracing::info!(
            "In-memory account directory seeded with {} profile(s)",
            config.storage.dev_accounts.len()
        );

        ParleyContext {
            config: Arc::new(config),
            db_pool: None,
            relationships: Arc::new(MemoryRelationshipStore::new()),
            conversations: Arc::new(MemoryConversationStore::new()),
            accounts: Arc::new(accounts),
        }
    }
}
