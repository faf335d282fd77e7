use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    FriendRequest,
    FriendRequestAccepted,
    NewMessage,
}

impl EventType {
    /// Channel name clients subscribe to.
    pub fn channel(&self) -> &'static str {
        match self {
            EventType::FriendRequest => "friend_request_received",
            EventType::FriendRequestAccepted => "friend_request_accepted",
            EventType::NewMessage => "new_message",
        }
    }
}

/// Envelope pushed to every live handle of the recipient.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationEvent {
    pub event: &'static str,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub message: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn new(event_type: EventType, message: impl Into<String>, payload: Value) -> Self {
        Self {
            event: event_type.channel(),
            event_type,
            message: message.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Builds an event from any serializable payload. Payloads that fail to
    /// serialize are replaced by `null` rather than dropping the event.
    pub fn with_payload<T: Serialize>(event_type: EventType, message: impl Into<String>, payload: &T) -> Self {
        let payload = serde_json::to_value(payload).unwrap_or_else(|e| {
            tracing::warn!("Failed to serialize {:?} payload: {}", event_type, e);
            Value::Null
        });
        Self::new(event_type, message, payload)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_shape() {
        let event = NotificationEvent::new(
            EventType::FriendRequest,
            "alice sent you a friend request",
            json!({ "id": 1 }),
        );
        let value: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();

        assert_eq!(value["type"], "FRIEND_REQUEST");
        assert_eq!(value["event"], "friend_request_received");
        assert_eq!(value["message"], "alice sent you a friend request");
        assert_eq!(value["payload"]["id"], 1);
        assert!(value["timestamp"].is_string());
    }
}
