use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::{Store, DEFAULT_HISTORY_LIMIT};
use crate::config::SeedConfig;
use crate::{
    AgentId, AgentRecord, ChatId, ChatRecord, Error, MessageId, MessageRecord, ModelId,
    ModelRecord, NewMessage, ProviderId, ProviderRecord, UserId,
};

#[derive(Default)]
struct Inner {
    chats: BTreeMap<ChatId, ChatRecord>,
    messages: BTreeMap<MessageId, MessageRecord>,
    models: HashMap<ModelId, ModelRecord>,
    providers: HashMap<ProviderId, ProviderRecord>,
    agents: HashMap<AgentId, AgentRecord>,
    next_chat_id: i64,
    next_message_id: i64,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Inner {
    /// Wall-clock time, nudged forward so successive writes never share a timestamp.
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(stamp);
        stamp
    }

    fn touch_chat(&mut self, chat_id: ChatId, at: DateTime<Utc>) {
        if let Some(chat) = self.chats.get_mut(&chat_id) {
            chat.updated_at = at;
        }
    }
}

/// In-process [`Store`] guarded by a single async lock.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with configured records.
    pub async fn from_seed(seed: &SeedConfig) -> Self {
        let store = Self::new();
        for provider in &seed.providers {
            store.insert_provider(provider.clone()).await;
        }
        for model in &seed.models {
            store.insert_model(model.clone()).await;
        }
        for agent in &seed.agents {
            store.insert_agent(agent.clone()).await;
        }
        for chat in &seed.chats {
            if let Err(e) = store.create_chat(chat.user_id, &chat.title).await {
                tracing::warn!(error = %e, title = %chat.title, "failed to seed chat");
            }
        }
        tracing::info!(
            providers = seed.providers.len(),
            models = seed.models.len(),
            agents = seed.agents.len(),
            chats = seed.chats.len(),
            "seeded memory store"
        );
        store
    }

    pub async fn insert_provider(&self, provider: ProviderRecord) {
        self.inner.write().await.providers.insert(provider.id, provider);
    }

    pub async fn insert_model(&self, model: ModelRecord) {
        self.inner.write().await.models.insert(model.id, model);
    }

    pub async fn insert_agent(&self, agent: AgentRecord) {
        self.inner.write().await.agents.insert(agent.id, agent);
    }

    /// Every message of a chat, oldest first.
    pub async fn messages(&self, chat_id: ChatId) -> Vec<MessageRecord> {
        self.inner
            .read()
            .await
            .messages
            .values()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn create_chat(&self, user_id: UserId, title: &str) -> Result<ChatRecord, Error> {
        let mut inner = self.inner.write().await;
        inner.next_chat_id += 1;
        let now = inner.tick();
        let chat = ChatRecord {
            id: ChatId(inner.next_chat_id),
            user_id,
            title: title.to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        inner.chats.insert(chat.id, chat.clone());
        Ok(chat)
    }

    async fn get_chat(&self, chat_id: ChatId, user_id: UserId) -> Result<ChatRecord, Error> {
        let inner = self.inner.read().await;
        let chat = inner
            .chats
            .get(&chat_id)
            .ok_or_else(|| Error::not_found(format!("chat {chat_id}")))?;
        if chat.user_id != user_id {
            return Err(Error::forbidden(format!("chat {chat_id} belongs to another user")));
        }
        Ok(chat.clone())
    }

    async fn create_message(&self, message: NewMessage) -> Result<MessageRecord, Error> {
        let mut inner = self.inner.write().await;
        if !inner.chats.contains_key(&message.chat_id) {
            return Err(Error::not_found(format!("chat {}", message.chat_id)));
        }

        inner.next_message_id += 1;
        let now = inner.tick();
        let record = MessageRecord {
            id: MessageId(inner.next_message_id),
            chat_id: message.chat_id,
            user_id: message.user_id,
            role: message.role,
            content: message.content,
            model_id: message.model_id,
            agent_id: message.agent_id,
            tokens_used: message.tokens_used,
            created_at: now,
        };
        inner.messages.insert(record.id, record.clone());
        inner.touch_chat(record.chat_id, now);
        Ok(record)
    }

    async fn get_message_history(&self, chat_id: ChatId, limit: usize) -> Result<Vec<MessageRecord>, Error> {
        let limit = if limit == 0 { DEFAULT_HISTORY_LIMIT } else { limit };
        let inner = self.inner.read().await;
        // Message ids grow with creation time, so reverse id order is newest first.
        let mut recent: Vec<MessageRecord> = inner
            .messages
            .values()
            .rev()
            .filter(|m| m.chat_id == chat_id)
            .take(limit)
            .cloned()
            .collect();
        recent.reverse();
        Ok(recent)
    }

    async fn update_message_content_and_tokens(
        &self,
        message_id: MessageId,
        content: &str,
        tokens_used: u32,
    ) -> Result<MessageRecord, Error> {
        let mut inner = self.inner.write().await;
        let now = inner.tick();
        let message = inner
            .messages
            .get_mut(&message_id)
            .ok_or_else(|| Error::not_found(format!("message {message_id}")))?;
        message.content = content.to_string();
        message.tokens_used = tokens_used;
        let updated = message.clone();
        inner.touch_chat(updated.chat_id, now);
        Ok(updated)
    }

    async fn get_model(&self, model_id: ModelId) -> Result<ModelRecord, Error> {
        self.inner
            .read()
            .await
            .models
            .get(&model_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("model {model_id}")))
    }

    async fn get_provider_with_credential(&self, provider_id: ProviderId) -> Result<ProviderRecord, Error> {
        self.inner
            .read()
            .await
            .providers
            .get(&provider_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("provider {provider_id}")))
    }

    async fn get_agent(&self, agent_id: AgentId) -> Result<AgentRecord, Error> {
        self.inner
            .read()
            .await
            .agents
            .get(&agent_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("agent {agent_id}")))
    }
}
