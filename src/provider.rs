use crate::call::CallContext;
use crate::{ChatCompletionRequest, Chunk, Error, ProviderType};

/// Receives the chunks of one streaming completion.
///
/// Returning an error is terminal: the connector stops reading and hands the
/// error back to its caller without invoking the sink again.
#[async_trait::async_trait]
pub trait ChunkSink: Send {
    async fn on_chunk(&mut self, chunk: Chunk) -> Result<(), Error>;
}

/// One uniform streaming chat-completion contract over a vendor protocol.
#[async_trait::async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Stream a completion for `request` into `sink`.
    ///
    /// The read loop observes `ctx` between chunks and ends with
    /// [`Error::Cancelled`] or [`Error::DeadlineExceeded`] when it fires.
    async fn generate_chat_completion(
        &self,
        ctx: &CallContext,
        request: &ChatCompletionRequest,
        sink: &mut dyn ChunkSink,
    ) -> Result<(), Error>;

    /// Minimal connectivity and credential check. A rejected credential is
    /// reported as [`Error::ProviderAuth`], anything else as a transport error.
    async fn health_check(&self, ctx: &CallContext) -> Result<(), Error>;

    fn provider_type(&self) -> ProviderType;
}

/// Deliver `chunk` to `sink`, tagging failures as callback errors.
pub(crate) async fn deliver(sink: &mut dyn ChunkSink, chunk: Chunk) -> Result<(), Error> {
    sink.on_chunk(chunk).await.map_err(|e| match e {
        Error::StreamCallback(_) => e,
        e if e.is_cancellation() => e,
        other => Error::callback(other.to_string()),
    })
}

/// Collects every chunk; handy for tests and non-interactive callers.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub chunks: Vec<Chunk>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concatenated text of all chunks received so far.
    pub fn text(&self) -> String {
        self.chunks.iter().map(|c| c.content.as_str()).collect()
    }
}

#[async_trait::async_trait]
impl ChunkSink for CollectingSink {
    async fn on_chunk(&mut self, chunk: Chunk) -> Result<(), Error> {
        self.chunks.push(chunk);
        Ok(())
    }
}
