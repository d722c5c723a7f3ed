//! Streaming orchestrator: one background task per generation request.
//!
//! A task walks `INIT → FETCH_HISTORY → BUILD_CONTEXT → RESOLVE_CONNECTOR →
//! GENERATE → PERSIST_FINAL → DONE`. Any failure ends it in `ERROR`: the user
//! gets an `error` event and whatever was already written stays written.
//! Errors never travel back to the request that spawned the task.
//!
//! Tasks on the same chat are not serialized against each other.

mod preamble;
mod regenerate;
mod task;

pub use preamble::{strip_thinking_preamble, token_estimate, THINKING_MARKER};
pub use regenerate::{find_regeneration_target, RegenerationTarget};
pub use task::TaskState;

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::call::CallContext;
use crate::config::GenerationSettings;
use crate::context::ContextBuilder;
use crate::events::Event;
use crate::factory::ConnectorFactory;
use crate::hub::HubHandle;
use crate::provider::Connector;
use crate::store::Store;
use crate::{
    AgentId, ChatCompletionRequest, ChatId, Error, Message, MessageRecord, ModelId, ModelRecord,
    NewMessage, UserId,
};
use task::{StreamingSink, TaskTrace};

/// A new answer to the latest message of a chat.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub model_id: ModelId,
    pub agent_id: Option<AgentId>,
}

/// A fresh answer replacing the chat's most recent assistant message.
#[derive(Debug, Clone, PartialEq)]
pub struct RegenerationRequest {
    pub user_id: UserId,
    pub chat_id: ChatId,
    /// Overrides the model of the message being replaced.
    pub model_id: Option<ModelId>,
}

pub struct Orchestrator {
    store: Arc<dyn Store>,
    hub: HubHandle,
    factory: Arc<dyn ConnectorFactory>,
    context: ContextBuilder,
    settings: GenerationSettings,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        hub: HubHandle,
        factory: Arc<dyn ConnectorFactory>,
        settings: GenerationSettings,
    ) -> Self {
        let context = ContextBuilder::new(store.clone(), settings.history_limit);
        Self {
            store,
            hub,
            factory,
            context,
            settings,
        }
    }

    /// Start a generation task in the background.
    pub fn spawn_generation(self: &Arc<Self>, request: GenerationRequest) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let ctx = CallContext::with_timeout(this.settings.timeout());
            let _ = this.generate(&ctx, &request).await;
        })
    }

    /// Start a regeneration task in the background.
    pub fn spawn_regeneration(self: &Arc<Self>, request: RegenerationRequest) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let ctx = CallContext::with_timeout(this.settings.timeout());
            let _ = this.regenerate(&ctx, &request).await;
        })
    }

    /// Answer the latest message of a chat, reporting the outcome to the user.
    ///
    /// Returns the finalized assistant row, or `None` when the provider
    /// produced no text.
    pub async fn generate(
        &self,
        ctx: &CallContext,
        request: &GenerationRequest,
    ) -> Result<Option<MessageRecord>, Error> {
        let mut trace = TaskTrace::new("generation", request.user_id, request.chat_id);
        let outcome = self.run_generation(ctx, &mut trace, request).await;
        self.finish(&mut trace, &outcome).await;
        outcome
    }

    /// Re-answer the user message behind the chat's most recent assistant message.
    pub async fn regenerate(
        &self,
        ctx: &CallContext,
        request: &RegenerationRequest,
    ) -> Result<Option<MessageRecord>, Error> {
        let mut trace = TaskTrace::new("regeneration", request.user_id, request.chat_id);
        let outcome = self.run_regeneration(ctx, &mut trace, request).await;
        self.finish(&mut trace, &outcome).await;
        outcome
    }

    async fn run_generation(
        &self,
        ctx: &CallContext,
        trace: &mut TaskTrace,
        request: &GenerationRequest,
    ) -> Result<Option<MessageRecord>, Error> {
        self.status(trace, "Processing...").await;

        trace.advance(TaskState::FetchHistory);
        let history = self
            .store
            .get_message_history(request.chat_id, self.settings.history_limit)
            .await?;

        trace.advance(TaskState::BuildContext);
        let model = self.context.load_model(request.model_id).await?;
        let messages = self
            .context
            .build_with_history(&model, &history, None, request.agent_id)
            .await?;

        self.stream_answer(ctx, trace, &model, messages, request.agent_id)
            .await
    }

    async fn run_regeneration(
        &self,
        ctx: &CallContext,
        trace: &mut TaskTrace,
        request: &RegenerationRequest,
    ) -> Result<Option<MessageRecord>, Error> {
        self.status(trace, "Regenerating response...").await;

        trace.advance(TaskState::FetchHistory);
        let history = self
            .store
            .get_message_history(request.chat_id, self.settings.history_limit)
            .await?;
        let target = find_regeneration_target(&history)?;
        let model_id = target.model_id(request.model_id)?;
        tracing::debug!(
            chat_id = %request.chat_id,
            trigger_id = %target.trigger.id,
            replaced_id = %target.replaced.id,
            model_id = %model_id,
            "resolved regeneration target"
        );

        trace.advance(TaskState::BuildContext);
        let model = self.context.load_model(model_id).await?;
        let messages = self
            .context
            .build_with_history(
                &model,
                target.prior,
                Some(target.trigger.content.as_str()),
                target.agent_id(),
            )
            .await?;

        // A regeneration must replace the answer with something.
        match self
            .stream_answer(ctx, trace, &model, messages, target.agent_id())
            .await?
        {
            Some(record) => Ok(Some(record)),
            None => Err(Error::validation(
                "Regeneration produced no content. Please try again.",
            )),
        }
    }

    /// RESOLVE_CONNECTOR through PERSIST_FINAL, shared by both task kinds.
    async fn stream_answer(
        &self,
        ctx: &CallContext,
        trace: &mut TaskTrace,
        model: &ModelRecord,
        messages: Vec<Message>,
        agent_id: Option<AgentId>,
    ) -> Result<Option<MessageRecord>, Error> {
        trace.advance(TaskState::ResolveConnector);
        let connector = self.resolve_connector(ctx, model).await?;

        trace.advance(TaskState::Generate);
        self.status(trace, "Generating response...").await;

        let request = ChatCompletionRequest::new(model.model_id.clone(), messages)
            .temperature(model.temperature)
            .max_tokens(model.max_tokens);
        let mut sink = StreamingSink::new(
            self.store.clone(),
            self.hub.clone(),
            trace.user_id,
            trace.chat_id,
            model.id,
            agent_id,
        );

        let result = connector
            .generate_chat_completion(ctx, &request, &mut sink)
            .await;
        if let Err(e) = result {
            sink.flush(false).await;
            return Err(e);
        }
        sink.flush(true).await;

        trace.advance(TaskState::PersistFinal);
        if sink.content().is_empty() {
            tracing::info!(chat_id = %trace.chat_id, "provider returned no content");
            return Ok(None);
        }

        let cleaned = strip_thinking_preamble(sink.content());
        let tokens = token_estimate(&cleaned);
        let record = match sink.message_id() {
            Some(id) => {
                self.store
                    .update_message_content_and_tokens(id, &cleaned, tokens)
                    .await?
            }
            None => {
                let message = NewMessage::assistant(trace.chat_id, model.id, cleaned)
                    .with_agent(agent_id)
                    .with_tokens(tokens);
                self.store.create_message(message).await?
            }
        };

        self.hub
            .send(trace.user_id, Event::assistant_message(&record))
            .await;
        Ok(Some(record))
    }

    /// Look up the provider behind `model` and build its connector. The
    /// health check only warns.
    async fn resolve_connector(
        &self,
        ctx: &CallContext,
        model: &ModelRecord,
    ) -> Result<Arc<dyn Connector>, Error> {
        let provider = self
            .store
            .get_provider_with_credential(model.provider_id)
            .await?;
        let connector = self.factory.create(&provider)?;

        let check_ctx = ctx.child_with_timeout(self.settings.health_check_timeout());
        if let Err(e) = connector.health_check(&check_ctx).await {
            tracing::warn!(
                provider_id = %provider.id,
                provider_type = %provider.provider_type,
                error = %e,
                "provider health check failed, continuing"
            );
        }
        Ok(connector)
    }

    async fn status(&self, trace: &TaskTrace, message: &str) {
        self.hub
            .send(trace.user_id, Event::status(trace.chat_id, message))
            .await;
    }

    async fn finish(&self, trace: &mut TaskTrace, outcome: &Result<Option<MessageRecord>, Error>) {
        match outcome {
            Ok(record) => {
                trace.advance(TaskState::Done);
                tracing::info!(
                    task = trace.kind,
                    chat_id = %trace.chat_id,
                    user_id = %trace.user_id,
                    message_id = record.as_ref().map(|r| r.id.0),
                    "task completed"
                );
            }
            Err(e) => {
                let failed_in = trace.state();
                trace.advance(TaskState::Error);
                tracing::error!(
                    task = trace.kind,
                    chat_id = %trace.chat_id,
                    user_id = %trace.user_id,
                    state = %failed_in,
                    kind = ?e.kind(),
                    error = %e,
                    "task failed"
                );
                self.hub
                    .send(trace.user_id, Event::error(Some(trace.chat_id), e.to_string()))
                    .await;
            }
        }
    }
}
