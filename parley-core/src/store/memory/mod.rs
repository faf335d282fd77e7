//! Process-local stores. A single lock per store makes every check-then-write atomic.

mod conversations;
mod relationships;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::Result;
use crate::identity::AccountDirectory;
use crate::types::AccountProfile;

pub use conversations::MemoryConversationStore;
pub use relationships::MemoryRelationshipStore;

#[derive(Default)]
pub struct MemoryAccountDirectory {
    profiles: RwLock<HashMap<String, AccountProfile>>,
}

impl MemoryAccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiles<I, S>(profiles: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let directory = Self::new();
        for (account_id, display_name) in profiles {
            directory.insert(AccountProfile {
                account_id: account_id.into(),
                display_name: display_name.into(),
            });
        }
        directory
    }

    pub fn insert(&self, profile: AccountProfile) {
        self.profiles.write().insert(profile.account_id.clone(), profile);
    }
}

#[async_trait]
impl AccountDirectory for MemoryAccountDirectory {
    async fn find_profile(&self, account_id: &str) -> Result<Option<AccountProfile>> {
        Ok(self.profiles.read().get(account_id).cloned())
    }
}
