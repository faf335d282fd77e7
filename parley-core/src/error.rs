use serde::Serialize;
use std::fmt;

use crate::types::{AccountId, ConversationId, MessageId, RelationshipId, RelationshipStatus};

pub type Result<T, E = ParleyError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum ParleyError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("an account cannot befriend itself")]
    InvalidSelfReference,

    #[error("relationship already established: {status}")]
    RelationshipExists { status: RelationshipStatus },

    #[error("relationship {0} not found")]
    RelationshipNotFound(RelationshipId),

    #[error("no relationship between {0} and {1}")]
    NoRelationship(AccountId, AccountId),

    #[error("account {0} not found")]
    AccountNotFound(AccountId),

    #[error("conversation {0} not found")]
    ConversationNotFound(ConversationId),

    #[error("message {0} not found")]
    MessageNotFound(MessageId),

    #[error("only the recipient of relationship {0} may answer it")]
    NotRelationshipTarget(RelationshipId),

    #[error("only the sender of relationship {0} may withdraw it")]
    NotRelationshipActor(RelationshipId),

    #[error("account {account_id} is not a participant of conversation {conversation_id}")]
    NotAParticipant {
        account_id: AccountId,
        conversation_id: ConversationId,
    },

    #[error("relationship is {status}, not pending")]
    InvalidState { status: RelationshipStatus },

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("the {0} role is required")]
    MissingRole(String),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Stable error classes callers branch on, independent of the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Conflict,
    Forbidden,
    Unauthenticated,
    InvalidState,
    Internal,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::Unauthenticated => "UNAUTHENTICATED",
            ErrorKind::InvalidState => "INVALID_STATE",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl ParleyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ParleyError::InvalidInput(_) | ParleyError::InvalidSelfReference => ErrorKind::InvalidInput,
            ParleyError::RelationshipExists { .. } => ErrorKind::Conflict,
            ParleyError::RelationshipNotFound(_)
            | ParleyError::NoRelationship(..)
            | ParleyError::AccountNotFound(_)
            | ParleyError::ConversationNotFound(_)
            | ParleyError::MessageNotFound(_) => ErrorKind::NotFound,
            ParleyError::NotRelationshipTarget(_)
            | ParleyError::NotRelationshipActor(_)
            | ParleyError::NotAParticipant { .. }
            | ParleyError::MissingRole(_) => ErrorKind::Forbidden,
            ParleyError::InvalidState { .. } => ErrorKind::InvalidState,
            ParleyError::InvalidToken => ErrorKind::Unauthenticated,
            ParleyError::Database(_) | ParleyError::Pool(_) | ParleyError::Storage(_) => ErrorKind::Internal,
        }
    }

    pub fn not_a_participant(account_id: &str, conversation_id: ConversationId) -> Self {
        ParleyError::NotAParticipant {
            account_id: account_id.to_string(),
            conversation_id,
        }
    }
}

/// Rejects blank identifiers before any store access.
pub fn require_account(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ParleyError::InvalidInput(format!("{} is required", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy() {
        assert_eq!(ParleyError::InvalidSelfReference.kind(), ErrorKind::InvalidInput);
        assert_eq!(
            ParleyError::RelationshipExists { status: RelationshipStatus::Pending }.kind(),
            ErrorKind::Conflict
        );
        assert_eq!(ParleyError::NotRelationshipTarget(4).kind(), ErrorKind::Forbidden);
        assert_eq!(ParleyError::not_a_participant("mallory", 9).kind(), ErrorKind::Forbidden);
        assert_eq!(
            ParleyError::InvalidState { status: RelationshipStatus::Accepted }.kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(ParleyError::Pool("gone".into()).kind().code(), "INTERNAL_ERROR");
    }

    #[test]
    fn blank_accounts_are_invalid_input() {
        assert!(require_account("target_account_id", "  ").is_err());
        assert!(require_account("target_account_id", "bob").is_ok());
    }
}
