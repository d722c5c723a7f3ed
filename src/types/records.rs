//! Records owned by the persistence collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::message::Role;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

id_type!(
    /// Authenticated end user.
    UserId
);
id_type!(ChatId);
id_type!(MessageId);
id_type!(ModelId);
id_type!(ProviderId);
id_type!(AgentId);

impl UserId {
    /// Author id recorded on assistant-generated messages.
    pub const ASSISTANT: UserId = UserId(0);
}

/// Supported provider backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Ollama,
    #[serde(rename = "openai")]
    OpenAI,
    Anthropic,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Ollama => "ollama",
            ProviderType::OpenAI => "openai",
            ProviderType::Anthropic => "anthropic",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A conversation owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub id: ChatId,
    pub user_id: UserId,
    pub title: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<ModelId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    pub tokens_used: u32,
    pub created_at: DateTime<Utc>,
}

/// Fields of a message about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub role: Role,
    pub content: String,
    pub model_id: Option<ModelId>,
    pub agent_id: Option<AgentId>,
    pub tokens_used: u32,
}

impl NewMessage {
    /// A user-authored message.
    pub fn user(chat_id: ChatId, user_id: UserId, content: impl Into<String>) -> Self {
        Self {
            chat_id,
            user_id,
            role: Role::User,
            content: content.into(),
            model_id: None,
            agent_id: None,
            tokens_used: 0,
        }
    }

    /// An assistant message generated by `model_id`.
    pub fn assistant(chat_id: ChatId, model_id: ModelId, content: impl Into<String>) -> Self {
        Self {
            chat_id,
            user_id: UserId::ASSISTANT,
            role: Role::Assistant,
            content: content.into(),
            model_id: Some(model_id),
            agent_id: None,
            tokens_used: 0,
        }
    }

    pub fn with_agent(mut self, agent_id: Option<AgentId>) -> Self {
        self.agent_id = agent_id;
        self
    }

    pub fn with_tokens(mut self, tokens_used: u32) -> Self {
        self.tokens_used = tokens_used;
        self
    }
}

fn default_true() -> bool {
    true
}

/// A model offered through one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub id: ModelId,
    pub provider_id: ProviderId,
    #[serde(default)]
    pub name: String,
    /// Identifier understood by the provider's API.
    pub model_id: String,
    #[serde(default)]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default)]
    pub default_system_prompt: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Provider endpoint plus the credential used to reach it.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub id: ProviderId,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

impl fmt::Debug for ProviderRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("provider_type", &self.provider_type)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A reusable persona whose system prompt overrides the model default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: AgentId,
    pub user_id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}
