//! Assembles the ordered prompt sent to a connector.
//!
//! Output is always `[system?] + history (oldest first) + [trigger?]`. An agent
//! prompt replaces the model's default prompt outright; the two are never
//! joined. When a system entry is synthesized, system rows stored in the chat
//! history are dropped.

use std::sync::Arc;

use crate::store::Store;
use crate::{AgentId, ChatId, Error, Message, MessageRecord, ModelId, ModelRecord, Role};

pub struct ContextBuilder {
    store: Arc<dyn Store>,
    history_limit: usize,
}

impl ContextBuilder {
    pub fn new(store: Arc<dyn Store>, history_limit: usize) -> Self {
        Self { store, history_limit }
    }

    /// Build the prompt for a chat from its stored history.
    pub async fn build_context(
        &self,
        chat_id: ChatId,
        model_id: ModelId,
        trigger: Option<&str>,
        agent_id: Option<AgentId>,
    ) -> Result<Vec<Message>, Error> {
        let model = self.load_model(model_id).await?;
        let history = self
            .store
            .get_message_history(chat_id, self.history_limit)
            .await
            .map_err(|e| Error::context(format!("loading history for chat {chat_id}: {e}")))?;

        self.build_with_history(&model, &history, trigger, agent_id).await
    }

    /// Fetch the target model; failures surface as context errors.
    pub async fn load_model(&self, model_id: ModelId) -> Result<ModelRecord, Error> {
        self.store
            .get_model(model_id)
            .await
            .map_err(|e| Error::context(format!("loading model {model_id}: {e}")))
    }

    /// Build the prompt from history the caller already holds.
    pub async fn build_with_history(
        &self,
        model: &ModelRecord,
        history: &[MessageRecord],
        trigger: Option<&str>,
        agent_id: Option<AgentId>,
    ) -> Result<Vec<Message>, Error> {
        let agent_prompt = match agent_id {
            Some(agent_id) => self.agent_prompt(agent_id).await,
            None => None,
        };

        Ok(assemble(
            model.default_system_prompt.as_deref(),
            agent_prompt.as_deref(),
            history,
            trigger,
        ))
    }

    /// An agent that cannot be resolved contributes nothing.
    async fn agent_prompt(&self, agent_id: AgentId) -> Option<String> {
        match self.store.get_agent(agent_id).await {
            Ok(agent) => agent.system_prompt,
            Err(e) => {
                tracing::warn!(agent_id = %agent_id, error = %e, "agent not resolvable, using model prompt");
                None
            }
        }
    }
}

/// Pure assembly step shared by both build paths.
pub fn assemble(
    model_prompt: Option<&str>,
    agent_prompt: Option<&str>,
    history: &[MessageRecord],
    trigger: Option<&str>,
) -> Vec<Message> {
    let system = non_blank(agent_prompt).or(non_blank(model_prompt));

    let mut messages = Vec::with_capacity(history.len() + 2);
    if let Some(system) = system {
        messages.push(Message::system(system));
    }

    messages.extend(
        history
            .iter()
            .filter(|m| system.is_none() || m.role != Role::System)
            .map(|m| Message::new(m.role, m.content.clone())),
    );

    if let Some(trigger) = trigger.filter(|t| !t.is_empty()) {
        messages.push(Message::user(trigger));
    }

    messages
}

fn non_blank(prompt: Option<&str>) -> Option<&str> {
    prompt.filter(|p| !p.trim().is_empty())
}
