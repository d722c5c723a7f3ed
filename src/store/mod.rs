//! Persistence collaborator consumed by the orchestrator and the server.
//!
//! Every method is one atomic unit of work. Nothing here spans a provider
//! call, so a generation task never holds a transaction across the network.

mod memory;

pub use memory::MemoryStore;

use crate::{
    AgentId, AgentRecord, ChatId, ChatRecord, Error, MessageId, MessageRecord, ModelId,
    ModelRecord, NewMessage, ProviderId, ProviderRecord, UserId,
};

/// History window used when a caller passes a limit of zero.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

#[async_trait::async_trait]
pub trait Store: Send + Sync + 'static {
    async fn create_chat(&self, user_id: UserId, title: &str) -> Result<ChatRecord, Error>;

    /// Fetch a chat on behalf of `user_id`: `NotFound` if absent, `Forbidden`
    /// if it belongs to someone else.
    async fn get_chat(&self, chat_id: ChatId, user_id: UserId) -> Result<ChatRecord, Error>;

    /// Insert a message and bump the chat's `updated_at` in the same write.
    async fn create_message(&self, message: NewMessage) -> Result<MessageRecord, Error>;

    /// The most recent `limit` messages of a chat, oldest first.
    async fn get_message_history(&self, chat_id: ChatId, limit: usize) -> Result<Vec<MessageRecord>, Error>;

    /// Replace a message's content and token count, bumping the chat's `updated_at`.
    async fn update_message_content_and_tokens(
        &self,
        message_id: MessageId,
        content: &str,
        tokens_used: u32,
    ) -> Result<MessageRecord, Error>;

    async fn get_model(&self, model_id: ModelId) -> Result<ModelRecord, Error>;

    /// Provider record including its decrypted credential.
    async fn get_provider_with_credential(&self, provider_id: ProviderId) -> Result<ProviderRecord, Error>;

    async fn get_agent(&self, agent_id: AgentId) -> Result<AgentRecord, Error>;
}
