use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::ParleyError;

/// Opaque account identifier issued by the identity subsystem.
pub type AccountId = String;
pub type RelationshipId = i64;
pub type ConversationId = i64;
pub type MessageId = i64;

/// An unordered pair of accounts, held lowest id first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountPair {
    low: AccountId,
    high: AccountId,
}

impl AccountPair {
    pub fn new(a: &str, b: &str) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self {
            low: low.to_string(),
            high: high.to_string(),
        }
    }

    pub fn low(&self) -> &str {
        &self.low
    }

    pub fn high(&self) -> &str {
        &self.high
    }

    /// Text form for unique columns. The length prefix keeps it unambiguous when ids contain `:`.
    pub fn key(&self) -> String {
        format!("{}:{}:{}", self.low.len(), self.low, self.high)
    }
}

/// Canonical key for an unordered pair of accounts.
pub fn pair_key(a: &str, b: &str) -> String {
    AccountPair::new(a, b).key()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub account_id: AccountId,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Identity {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProfile {
    pub account_id: AccountId,
    pub display_name: String,
}

/// Human readable confirmation returned by every successful mutation.
#[derive(Debug, Clone, Serialize)]
pub struct Confirmation<T> {
    pub message: String,
    pub data: T,
}

impl<T> Confirmation<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }
}

macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParleyError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ParleyError::Storage(format!(
                        "unknown {} value '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipStatus {
    Pending,
    Accepted,
    Cancelled,
    Rejected,
}

string_enum!(RelationshipStatus {
    Pending => "pending",
    Accepted => "accepted",
    Cancelled => "cancelled",
    Rejected => "rejected",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RelationshipId,
    pub actor_account_id: AccountId,
    pub target_account_id: AccountId,
    pub status: RelationshipStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Relationship {
    pub fn pair(&self) -> AccountPair {
        AccountPair::new(&self.actor_account_id, &self.target_account_id)
    }

    pub fn involves(&self, account_id: &str) -> bool {
        self.actor_account_id == account_id || self.target_account_id == account_id
    }

    /// The account on the other end of the edge, seen from `account_id`.
    pub fn other_side(&self, account_id: &str) -> &str {
        if self.actor_account_id == account_id {
            &self.target_account_id
        } else {
            &self.actor_account_id
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationType {
    Cloud,
    Private,
    Group,
}

string_enum!(ConversationType {
    Cloud => "cloud",
    Private => "private",
    Group => "group",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub name: String,
    pub avatar: Option<String>,
    pub description: Option<String>,
    pub admin: AccountId,
    pub deputy: Option<AccountId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub conversation_type: ConversationType,
    pub participants: BTreeSet<AccountId>,
    pub group: Option<GroupInfo>,
    pub last_message_id: Option<MessageId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn is_participant(&self, account_id: &str) -> bool {
        self.participants.contains(account_id)
    }

    /// Every participant except `account_id`.
    pub fn others<'a>(&'a self, account_id: &'a str) -> impl Iterator<Item = &'a AccountId> + 'a {
        self.participants.iter().filter(move |p| p.as_str() != account_id)
    }
}

/// Input for a GROUP conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGroup {
    pub admin: AccountId,
    pub members: Vec<AccountId>,
    pub name: String,
    pub description: Option<String>,
    pub avatar: Option<String>,
}

impl NewGroup {
    /// Admin plus members, deduplicated.
    pub fn participants(&self) -> BTreeSet<AccountId> {
        let mut participants: BTreeSet<AccountId> = self
            .members
            .iter()
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect();
        participants.insert(self.admin.clone());
        participants
    }

    pub fn validate(&self) -> Result<BTreeSet<AccountId>, ParleyError> {
        if self.admin.trim().is_empty() {
            return Err(ParleyError::InvalidInput("group admin is required".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(ParleyError::InvalidInput("group name is required".to_string()));
        }
        let participants = self.participants();
        if participants.len() < 2 {
            return Err(ParleyError::InvalidInput(
                "a group needs at least two distinct participants".to_string(),
            ));
        }
        Ok(participants)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Video,
    Audio,
    File,
}

string_enum!(MessageType {
    Text => "text",
    Image => "image",
    Video => "video",
    Audio => "audio",
    File => "file",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Sent,
    Failed,
    Recall,
    Forwarded,
    Reply,
    Edited,
}

string_enum!(MessageStatus {
    Pending => "pending",
    Sent => "sent",
    Failed => "failed",
    Recall => "recall",
    Forwarded => "forwarded",
    Reply => "reply",
    Edited => "edited",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Love,
    Haha,
    Wow,
    Sad,
    Angry,
}

string_enum!(ReactionKind {
    Like => "like",
    Love => "love",
    Haha => "haha",
    Wow => "wow",
    Sad => "sad",
    Angry => "angry",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: AccountId,
    pub content: String,
    pub message_type: MessageType,
    pub status: MessageStatus,
    pub seen_by: BTreeSet<AccountId>,
    pub deleted_for: BTreeSet<AccountId>,
    pub reactions: BTreeMap<AccountId, ReactionKind>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_deleted_for(&self, account_id: &str) -> bool {
        self.deleted_for.contains(account_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_key_ignores_orientation() {
        assert_eq!(pair_key("b", "a"), pair_key("a", "b"));
        assert_eq!(pair_key("a", "b"), "1:a:b");
        assert_eq!(AccountPair::new("b", "a").low(), "a");
    }

    #[test]
    fn pair_key_separates_ids_containing_colons() {
        assert_ne!(pair_key("x:y", "z"), pair_key("x", "y:z"));
        assert_ne!(AccountPair::new("x:y", "z"), AccountPair::new("x", "y:z"));
        assert_ne!(pair_key("a:b", "c:d"), pair_key("a", "b:c:d"));
    }

    #[test]
    fn status_text_round_trips_through_from_str() {
        assert_eq!("accepted".parse::<RelationshipStatus>().unwrap(), RelationshipStatus::Accepted);
        assert_eq!(ReactionKind::Haha.as_str(), "haha");
        assert!("blocked".parse::<RelationshipStatus>().is_err());
    }

    #[test]
    fn group_participants_include_admin_once() {
        let group = NewGroup {
            admin: "alice".into(),
            members: vec!["bob".into(), "alice".into(), "bob".into(), " ".into()],
            name: "weekend".into(),
            description: None,
            avatar: None,
        };
        let participants = group.validate().unwrap();
        assert_eq!(participants.into_iter().collect::<Vec<_>>(), vec!["alice", "bob"]);
    }

    #[test]
    fn group_of_one_is_rejected() {
        let group = NewGroup {
            admin: "alice".into(),
            members: vec!["alice".into()],
            name: "solo".into(),
            description: None,
            avatar: None,
        };
        assert!(matches!(group.validate(), Err(ParleyError::InvalidInput(_))));
    }

    #[test]
    fn other_side_follows_orientation() {
        let now = Utc::now();
        let rel = Relationship {
            id: 1,
            actor_account_id: "alice".into(),
            target_account_id: "bob".into(),
            status: RelationshipStatus::Accepted,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(rel.other_side("alice"), "bob");
        assert_eq!(rel.other_side("bob"), "alice");
        assert!(rel.involves("bob"));
        assert!(!rel.involves("carol"));
    }
}
