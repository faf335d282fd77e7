pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod identity;
pub mod pagination;
pub mod schema;
pub mod store;
pub mod types;

pub use config::Config;
pub use context::ParleyContext;
pub use db::DbPool;
pub use error::{ErrorKind, ParleyError, Result};
pub use identity::{AccountDirectory, IdentityProvider};
pub use pagination::{Page, PageRequest};
pub use store::{ConversationStore, RelationshipStore};
pub use types::{
    AccountId, AccountPair, AccountProfile, Confirmation, Conversation, ConversationId, ConversationType,
    GroupInfo, Identity, Message, MessageId, MessageStatus, MessageType, NewGroup, ReactionKind,
    Relationship, RelationshipId, RelationshipStatus,
};
