//! WebSocket endpoint: one hub connection per socket.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;

use super::identity::CurrentUser;
use super::state::AppState;
use crate::events::Event;
use crate::hub::HubHandle;
use crate::UserId;

/// Keepalive ping period; nine tenths of the 60 s pong wait.
const PING_INTERVAL: Duration = Duration::from_secs(54);

/// GET /ws
pub async fn ws_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    ws: WebSocketUpgrade,
) -> Response {
    let user_id = user.id();
    tracing::info!(%user_id, "WebSocket upgrade request");
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, hub, user_id))
}

async fn handle_socket(socket: WebSocket, hub: HubHandle, user_id: UserId) {
    let (mut sender, mut receiver) = socket.split();
    let (conn_id, events) = hub.register(user_id).await;

    let welcome = Event::system(format!("Welcome! Connected as user {user_id}"));
    if let Err(e) = send_event(&mut sender, &welcome).await {
        tracing::warn!(%conn_id, %user_id, error = %e, "failed to send welcome");
        hub.unregister(conn_id).await;
        return;
    }

    let mut send_task = tokio::spawn(write_pump(sender, events));

    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {
                    // Clients only listen; anything they send is ignored.
                }
                Some(Err(e)) => {
                    tracing::debug!(%conn_id, error = %e, "WebSocket read error");
                    break;
                }
            },
            _ = &mut send_task => break,
        }
    }

    send_task.abort();
    hub.unregister(conn_id).await;
    tracing::info!(%conn_id, %user_id, "WebSocket connection closed");
}

type SocketSink = futures::stream::SplitSink<WebSocket, Message>;

async fn write_pump(mut sender: SocketSink, mut events: mpsc::Receiver<Event>) {
    let mut ping = tokio::time::interval_at(tokio::time::Instant::now() + PING_INTERVAL, PING_INTERVAL);

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    // Unregistered by the hub.
                    let _ = sender.send(Message::Close(None)).await;
                    return;
                };
                if send_event(&mut sender, &event).await.is_err() {
                    return;
                }
            }
            _ = ping.tick() => {
                if sender.send(Message::Ping(Default::default())).await.is_err() {
                    return;
                }
            }
        }
    }
}

async fn send_event(sender: &mut SocketSink, event: &Event) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!(error = %e, event = event.type_name(), "failed to serialize event");
            return Ok(());
        }
    };
    sender.send(Message::Text(json.into())).await
}
