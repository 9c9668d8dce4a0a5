//! Message shapes consumed by the engine.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A finished response handed to the engine for paced delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsePayload {
    /// Message id assigned by the caller. Reused as the sequence id when present.
    pub id: Option<String>,
    pub content: String,
    pub companion_id: String,
    pub user_id: String,
    pub conversation_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ResponsePayload {
    pub fn new(
        content: impl Into<String>,
        companion_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            content: content.into(),
            companion_id: companion_id.into(),
            user_id: user_id.into(),
            conversation_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    User,
    System,
    Fragment,
    Notification,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// An outbound message waiting in the delivery queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedItem {
    pub id: String,
    pub payload: ResponsePayload,
    pub kind: MessageKind,
    pub priority: Priority,
    pub enqueued_at: DateTime<Utc>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl QueuedItem {
    /// Create an item with normal priority. The id is taken from the payload or generated.
    pub fn new(payload: ResponsePayload, kind: MessageKind) -> Self {
        let id = payload
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Self {
            id,
            payload,
            kind,
            priority: Priority::default(),
            enqueued_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

impl PartialEq for QueuedItem {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for QueuedItem {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> ResponsePayload {
        ResponsePayload::new("hello", "companion-1", "user-1")
    }

    #[test]
    fn item_identity_is_id() {
        let a = QueuedItem::new(payload(), MessageKind::User).with_id("same");
        let b = QueuedItem::new(payload(), MessageKind::System)
            .with_id("same")
            .with_priority(Priority::Urgent);
        let c = QueuedItem::new(payload(), MessageKind::User).with_id("other");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn item_reuses_payload_id() {
        let item = QueuedItem::new(payload().with_id("msg-9"), MessageKind::Fragment);
        assert_eq!(item.id, "msg-9");
        assert_eq!(item.priority, Priority::Normal);
    }

    #[test]
    fn item_serializes_snake_case_enums() {
        let item = QueuedItem::new(payload(), MessageKind::Notification)
            .with_priority(Priority::High)
            .with_metadata("source", json!("scheduler"));
        let value = serde_json::to_value(&item).expect("serialize");
        assert_eq!(value["kind"], "notification");
        assert_eq!(value["priority"], "high");
        assert_eq!(value["metadata"]["source"], "scheduler");
    }
}
