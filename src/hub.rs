//! Connection hub: fans events out to every live connection of a user.
//!
//! The user → connections map is owned by a single task. Everything else talks
//! to it through [`HubHandle`], which only sends commands over a channel, so
//! registration, removal and delivery are applied strictly in arrival order.
//! Delivery to a connection never waits: when its bounded queue is full the
//! event is dropped for that connection alone.

use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::config::HubSettings;
use crate::events::Event;
use crate::UserId;

/// Identifies one registered connection.
pub type ConnectionId = Uuid;

enum Command {
    Register {
        conn_id: ConnectionId,
        user_id: UserId,
        tx: mpsc::Sender<Event>,
    },
    Unregister {
        conn_id: ConnectionId,
    },
    Send {
        user_id: UserId,
        event: Event,
    },
    ConnectionCount {
        user_id: Option<UserId>,
        reply: oneshot::Sender<usize>,
    },
}

/// The single owner of the connection map.
pub struct Hub {
    commands: mpsc::Receiver<Command>,
    users: HashMap<UserId, HashMap<ConnectionId, mpsc::Sender<Event>>>,
    owners: HashMap<ConnectionId, UserId>,
}

impl Hub {
    /// Start the hub loop on the current runtime and return a handle to it.
    ///
    /// The loop ends once every handle has been dropped.
    pub fn spawn(settings: &HubSettings) -> HubHandle {
        let (tx, rx) = mpsc::channel(settings.command_queue);
        let hub = Hub {
            commands: rx,
            users: HashMap::new(),
            owners: HashMap::new(),
        };
        tokio::spawn(hub.run());
        HubHandle {
            commands: tx,
            connection_queue: settings.connection_queue,
        }
    }

    async fn run(mut self) {
        tracing::debug!("hub started");
        while let Some(command) = self.commands.recv().await {
            self.apply(command);
        }
        tracing::debug!(connections = self.owners.len(), "hub stopped");
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Register { conn_id, user_id, tx } => {
                self.users.entry(user_id).or_default().insert(conn_id, tx);
                self.owners.insert(conn_id, user_id);
                tracing::info!(%conn_id, %user_id, "connection registered");
            }
            Command::Unregister { conn_id } => self.unregister(conn_id),
            Command::Send { user_id, event } => self.deliver(user_id, event),
            Command::ConnectionCount { user_id, reply } => {
                let count = match user_id {
                    Some(user_id) => self.users.get(&user_id).map_or(0, HashMap::len),
                    None => self.owners.len(),
                };
                let _ = reply.send(count);
            }
        }
    }

    fn unregister(&mut self, conn_id: ConnectionId) {
        let Some(user_id) = self.owners.remove(&conn_id) else {
            return;
        };
        if let Some(connections) = self.users.get_mut(&user_id) {
            // Dropping the sender closes the connection's queue.
            connections.remove(&conn_id);
            if connections.is_empty() {
                self.users.remove(&user_id);
            }
        }
        tracing::info!(%conn_id, %user_id, "connection unregistered");
    }

    fn deliver(&mut self, user_id: UserId, event: Event) {
        let Some(connections) = self.users.get(&user_id) else {
            tracing::debug!(%user_id, event = event.type_name(), "no live connection for user");
            return;
        };

        for (conn_id, tx) in connections {
            match tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(
                        %conn_id,
                        %user_id,
                        event = event.type_name(),
                        "connection queue full, dropping event"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!(%conn_id, %user_id, "connection queue closed");
                }
            }
        }
    }
}

/// Cheap, cloneable access to the hub.
#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::Sender<Command>,
    connection_queue: usize,
}

impl HubHandle {
    /// Register a new connection for `user_id`; events for the user arrive on
    /// the returned receiver until the connection is unregistered.
    pub async fn register(&self, user_id: UserId) -> (ConnectionId, mpsc::Receiver<Event>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.connection_queue);
        self.submit(Command::Register { conn_id, user_id, tx }).await;
        (conn_id, rx)
    }

    pub async fn unregister(&self, conn_id: ConnectionId) {
        self.submit(Command::Unregister { conn_id }).await;
    }

    /// Queue `event` for every live connection of `user_id`. Best effort.
    pub async fn send(&self, user_id: UserId, event: Event) {
        self.submit(Command::Send { user_id, event }).await;
    }

    /// Number of live connections, for one user or overall.
    pub async fn connection_count(&self, user_id: Option<UserId>) -> usize {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::ConnectionCount { user_id, reply }).await;
        rx.await.unwrap_or(0)
    }

    async fn submit(&self, command: Command) {
        if self.commands.send(command).await.is_err() {
            tracing::warn!("hub is not running, command discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChatId;

    fn settings(connection_queue: usize) -> HubSettings {
        HubSettings {
            connection_queue,
            command_queue: 16,
        }
    }

    #[tokio::test]
    async fn test_send_reaches_every_connection_of_user() {
        let hub = Hub::spawn(&settings(8));
        let (_a, mut rx_a) = hub.register(UserId(1)).await;
        let (_b, mut rx_b) = hub.register(UserId(1)).await;
        let (_c, mut rx_other) = hub.register(UserId(2)).await;

        hub.send(UserId(1), Event::status(ChatId(1), "Processing...")).await;
        assert_eq!(hub.connection_count(Some(UserId(1))).await, 2);

        assert_eq!(rx_a.recv().await.unwrap().type_name(), "status");
        assert_eq!(rx_b.recv().await.unwrap().type_name(), "status");
        assert!(rx_other.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unregister_closes_queue_and_prunes_user() {
        let hub = Hub::spawn(&settings(8));
        let (conn, mut rx) = hub.register(UserId(1)).await;
        hub.unregister(conn).await;

        assert!(rx.recv().await.is_none());
        assert_eq!(hub.connection_count(Some(UserId(1))).await, 0);
        assert_eq!(hub.connection_count(None).await, 0);

        // Unknown ids are ignored.
        hub.unregister(conn).await;
        assert_eq!(hub.connection_count(None).await, 0);
    }

    #[tokio::test]
    async fn test_full_queue_drops_for_that_connection_only() {
        let hub = Hub::spawn(&settings(1));
        let (_slow, mut slow_rx) = hub.register(UserId(1)).await;
        let (_fast, mut fast_rx) = hub.register(UserId(1)).await;

        hub.send(UserId(1), Event::system("one")).await;
        assert!(fast_rx.recv().await.is_some());
        hub.send(UserId(1), Event::system("two")).await;
        // Round trip through the hub so both sends have been applied.
        hub.connection_count(None).await;

        assert!(fast_rx.recv().await.is_some());
        assert!(slow_rx.recv().await.is_some());
        assert!(slow_rx.try_recv().is_err());
    }
}
