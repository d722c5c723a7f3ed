use std::fmt;
use std::sync::Arc;

use crate::events::{Event, EventKind};
use crate::hub::HubHandle;
use crate::provider::ChunkSink;
use crate::store::Store;
use crate::{AgentId, ChatId, Chunk, Error, MessageId, ModelId, NewMessage, UserId};

/// Steps of one generation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Init,
    FetchHistory,
    BuildContext,
    ResolveConnector,
    Generate,
    PersistFinal,
    Done,
    Error,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Init => "init",
            TaskState::FetchHistory => "fetch_history",
            TaskState::BuildContext => "build_context",
            TaskState::ResolveConnector => "resolve_connector",
            TaskState::Generate => "generate",
            TaskState::PersistFinal => "persist_final",
            TaskState::Done => "done",
            TaskState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Identity and progress of a running task, used for logging.
#[derive(Debug)]
pub(crate) struct TaskTrace {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub kind: &'static str,
    state: TaskState,
}

impl TaskTrace {
    pub fn new(kind: &'static str, user_id: UserId, chat_id: ChatId) -> Self {
        Self {
            user_id,
            chat_id,
            kind,
            state: TaskState::Init,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn advance(&mut self, next: TaskState) {
        tracing::debug!(
            task = self.kind,
            chat_id = %self.chat_id,
            user_id = %self.user_id,
            from = %self.state,
            to = %next,
            "task state"
        );
        self.state = next;
    }
}

/// Chunk handler of the GENERATE step.
///
/// The first chunk with text creates the assistant row; every forwarded
/// chunk carries that row's id. Forwarding runs one chunk behind the
/// connector so a trailing empty terminal chunk folds into the last text
/// chunk instead of producing an extra event.
pub(crate) struct StreamingSink {
    store: Arc<dyn Store>,
    hub: HubHandle,
    user_id: UserId,
    chat_id: ChatId,
    model_id: ModelId,
    agent_id: Option<AgentId>,
    message_id: Option<MessageId>,
    content: String,
    pending: Option<String>,
}

impl StreamingSink {
    pub fn new(
        store: Arc<dyn Store>,
        hub: HubHandle,
        user_id: UserId,
        chat_id: ChatId,
        model_id: ModelId,
        agent_id: Option<AgentId>,
    ) -> Self {
        Self {
            store,
            hub,
            user_id,
            chat_id,
            model_id,
            agent_id,
            message_id: None,
            content: String::new(),
            pending: None,
        }
    }

    /// Id of the assistant row, once created.
    pub fn message_id(&self) -> Option<MessageId> {
        self.message_id
    }

    /// Text received so far.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Forward the held-back chunk, if any.
    pub async fn flush(&mut self, is_final: bool) {
        if let Some(content) = self.pending.take() {
            self.forward(content, is_final).await;
        }
    }

    async fn ensure_row(&mut self) -> Result<MessageId, Error> {
        if let Some(id) = self.message_id {
            return Ok(id);
        }
        let placeholder = NewMessage::assistant(self.chat_id, self.model_id, "").with_agent(self.agent_id);
        let record = self.store.create_message(placeholder).await?;
        tracing::debug!(chat_id = %self.chat_id, message_id = %record.id, "created assistant row");
        self.message_id = Some(record.id);
        Ok(record.id)
    }

    async fn forward(&self, content: String, is_final: bool) {
        let event = Event::new(EventKind::AssistantChunk {
            chat_id: self.chat_id,
            message_id: self.message_id,
            model_id: Some(self.model_id),
            content,
            is_final,
        });
        self.hub.send(self.user_id, event).await;
    }
}

#[async_trait::async_trait]
impl ChunkSink for StreamingSink {
    async fn on_chunk(&mut self, chunk: Chunk) -> Result<(), Error> {
        if chunk.content.is_empty() {
            if chunk.is_final {
                self.flush(true).await;
            }
            return Ok(());
        }

        self.ensure_row().await?;
        self.content.push_str(&chunk.content);

        if let Some(previous) = self.pending.take() {
            self.forward(previous, false).await;
        }
        if chunk.is_final {
            self.forward(chunk.content, true).await;
        } else {
            self.pending = Some(chunk.content);
        }
        Ok(())
    }
}
