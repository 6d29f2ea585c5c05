//! Conversation records as stored and served.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub conversation_id: String,
    pub user_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One message in a conversation.
///
/// Only `role` and `content` are interpreted; any other fields the client
/// sends are kept and returned verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub role: String,
    pub content: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            message_id: None,
            parent_id: None,
            role: role.into(),
            content: content.into(),
            extra: Map::new(),
        }
    }
}

/// Validated write request handed to the store. Timestamps are the store's job.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationDraft {
    pub conversation_id: String,
    pub user_id: String,
    pub name: String,
    pub messages: Vec<Message>,
}

/// Result of an insert-or-update.
#[derive(Debug, Clone, PartialEq)]
pub struct Upserted {
    pub conversation: Conversation,
    /// True when no record with this ID existed before.
    pub created: bool,
}

/// Current time at millisecond precision, so every backend round-trips it.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Most recently updated first, ties broken by conversation ID.
pub(crate) fn sort_for_listing(conversations: &mut [Conversation]) {
    conversations.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| a.conversation_id.cmp(&b.conversation_id))
    });
}
