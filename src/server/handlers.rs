//! REST handlers. Each one validates, persists what the caller asked for,
//! and hands generation to a background task without waiting on it.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::identity::CurrentUser;
use super::state::AppState;
use crate::orchestrator::{GenerationRequest, RegenerationRequest};
use crate::{AgentId, ChatId, ChatRecord, Error, MessageRecord, ModelId, NewMessage};

/// Longest chat title derived from a first message, in characters.
const MAX_DERIVED_TITLE_CHARS: usize = 60;
const DEFAULT_TITLE: &str = "New Chat";

#[derive(Debug, Clone, Deserialize)]
pub struct MessageInput {
    pub content: String,
    pub model_id: ModelId,
    #[serde(default)]
    pub agent_id: Option<AgentId>,
}

impl MessageInput {
    fn validate(&self) -> Result<(), Error> {
        if self.content.trim().is_empty() {
            return Err(Error::validation("message content cannot be empty"));
        }
        if self.model_id.0 <= 0 {
            return Err(Error::validation("a valid model_id is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateChatBody {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub first_message: Option<MessageInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegenerateBody {
    #[serde(default)]
    pub model_id: Option<ModelId>,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub status: &'static str,
}

/// Title for a new chat: the explicit one, else the first message cut to length.
pub fn derive_title(title: Option<&str>, first_message: Option<&str>) -> String {
    if let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) {
        return title.to_string();
    }
    match first_message.filter(|m| !m.is_empty()) {
        Some(content) if content.chars().count() > MAX_DERIVED_TITLE_CHARS => {
            let cut: String = content.chars().take(MAX_DERIVED_TITLE_CHARS).collect();
            format!("{cut}...")
        }
        Some(content) => content.to_string(),
        None => DEFAULT_TITLE.to_string(),
    }
}

/// GET /api/info
pub async fn info() -> Json<InfoResponse> {
    Json(InfoResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        status: "ok",
    })
}

/// POST /api/chats
pub async fn create_chat(
    State(state): State<AppState>,
    user: CurrentUser,
    body: Option<Json<CreateChatBody>>,
) -> Result<(StatusCode, Json<ChatRecord>), ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    if let Some(first) = &body.first_message {
        first.validate()?;
    }

    let title = derive_title(
        body.title.as_deref(),
        body.first_message.as_ref().map(|m| m.content.as_str()),
    );
    let chat = state.store.create_chat(user.id(), &title).await?;
    tracing::info!(chat_id = %chat.id, user_id = %user.id(), "chat created");

    if let Some(first) = body.first_message {
        let message = NewMessage::user(chat.id, user.id(), first.content).with_agent(first.agent_id);
        match state.store.create_message(message).await {
            Ok(saved) => {
                state.orchestrator.spawn_generation(GenerationRequest {
                    user_id: user.id(),
                    chat_id: chat.id,
                    model_id: first.model_id,
                    agent_id: saved.agent_id,
                });
            }
            // The chat exists either way; the client can resend the message.
            Err(e) => tracing::error!(chat_id = %chat.id, error = %e, "failed to save first message"),
        }
    }

    Ok((StatusCode::CREATED, Json(chat)))
}

/// POST /api/chats/{chat_id}/messages
pub async fn create_message(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(chat_id): Path<ChatId>,
    Json(body): Json<MessageInput>,
) -> Result<(StatusCode, Json<MessageRecord>), ApiError> {
    body.validate()?;
    state.store.get_chat(chat_id, user.id()).await?;

    let message = NewMessage::user(chat_id, user.id(), body.content).with_agent(body.agent_id);
    let saved = state.store.create_message(message).await?;
    tracing::info!(
        chat_id = %chat_id,
        user_id = %user.id(),
        message_id = %saved.id,
        model_id = %body.model_id,
        "user message saved"
    );

    state.orchestrator.spawn_generation(GenerationRequest {
        user_id: user.id(),
        chat_id,
        model_id: body.model_id,
        agent_id: body.agent_id,
    });

    Ok((StatusCode::ACCEPTED, Json(saved)))
}

/// POST /api/chats/{chat_id}/messages/regenerate
pub async fn regenerate(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(chat_id): Path<ChatId>,
    body: Option<Json<RegenerateBody>>,
) -> Result<StatusCode, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    if body.model_id.is_some_and(|id| id.0 <= 0) {
        return Err(ApiError::bad_request("model_id must be positive"));
    }
    state.store.get_chat(chat_id, user.id()).await?;

    state.orchestrator.spawn_regeneration(RegenerationRequest {
        user_id: user.id(),
        chat_id,
        model_id: body.model_id,
    });

    Ok(StatusCode::ACCEPTED)
}
