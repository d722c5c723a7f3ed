//! Events pushed to live connections.
//!
//! On the wire every event is one JSON object `{type, timestamp, ...payload}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AgentId, ChatId, MessageId, MessageRecord, ModelId, Role, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Connection-level notice, e.g. the welcome sent on connect.
    System { message: String },

    /// Advisory progress text.
    Status {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        chat_id: Option<ChatId>,
    },

    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        chat_id: Option<ChatId>,
    },

    AssistantChunk {
        chat_id: ChatId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<MessageId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model_id: Option<ModelId>,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_final: bool,
    },

    /// The finalized assistant row.
    AssistantMessage {
        id: MessageId,
        chat_id: ChatId,
        user_id: UserId,
        role: Role,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model_id: Option<ModelId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_id: Option<AgentId>,
        tokens_used: u32,
        created_at: DateTime<Utc>,
    },

    RemoveMessage { chat_id: ChatId, message_id: MessageId },
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn system(message: impl Into<String>) -> Self {
        Self::new(EventKind::System {
            message: message.into(),
        })
    }

    pub fn status(chat_id: ChatId, message: impl Into<String>) -> Self {
        Self::new(EventKind::Status {
            message: message.into(),
            chat_id: Some(chat_id),
        })
    }

    pub fn error(chat_id: Option<ChatId>, message: impl Into<String>) -> Self {
        Self::new(EventKind::Error {
            message: message.into(),
            chat_id,
        })
    }

    pub fn assistant_message(record: &MessageRecord) -> Self {
        Self::new(EventKind::AssistantMessage {
            id: record.id,
            chat_id: record.chat_id,
            user_id: record.user_id,
            role: record.role,
            content: record.content.clone(),
            model_id: record.model_id,
            agent_id: record.agent_id,
            tokens_used: record.tokens_used,
            created_at: record.created_at,
        })
    }

    pub fn remove_message(chat_id: ChatId, message_id: MessageId) -> Self {
        Self::new(EventKind::RemoveMessage { chat_id, message_id })
    }

    /// Wire name of the event, as found in its `type` field.
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            EventKind::System { .. } => "system",
            EventKind::Status { .. } => "status",
            EventKind::Error { .. } => "error",
            EventKind::AssistantChunk { .. } => "assistant_chunk",
            EventKind::AssistantMessage { .. } => "assistant_message",
            EventKind::RemoveMessage { .. } => "remove_message",
        }
    }
}
