//! Realtime delivery
//!
//! Push events fan out over an in-process broadcast channel, optionally
//! bridged through Redis pub/sub so inserts on one instance reach
//! subscribers on another. Transport ordering is best-effort; the client
//! reconciler owns final ordering.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::models::Message;

const EVENT_CHANNEL: &str = "crewchat:message-events";
const BUS_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Inserted,
    Updated,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MessageEvent {
    pub kind: EventKind,
    pub message: Message,
}

impl MessageEvent {
    pub fn inserted(message: Message) -> Self {
        Self {
            kind: EventKind::Inserted,
            message,
        }
    }

    pub fn updated(message: Message) -> Self {
        Self {
            kind: EventKind::Updated,
            message,
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MessageEvent>,
    redis: Option<ConnectionManager>,
}

impl EventBus {
    pub fn new(redis: Option<ConnectionManager>) -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender, redis }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MessageEvent> {
        self.sender.subscribe()
    }

    /// Deliver to local subscribers and, when configured, to the Redis
    /// channel for other instances. Delivery failures are logged, never
    /// propagated; the poll fallback covers missed pushes.
    pub async fn publish(&self, event: MessageEvent) {
        // send() errs only when there are no subscribers
        let _ = self.sender.send(event.clone());

        if let Some(redis) = &self.redis {
            match serde_json::to_string(&event) {
                Ok(payload) => {
                    let mut conn = redis.clone();
                    if let Err(e) = conn.publish::<_, _, ()>(EVENT_CHANNEL, payload).await {
                        warn!(error = %e, "Failed to publish event to Redis");
                    }
                }
                Err(e) => warn!(error = %e, "Failed to serialize message event"),
            }
        }
    }

    /// Events published locally on this instance, re-broadcast from Redis on
    /// the others via `spawn_redis_listener`.
    pub fn local_sender(&self) -> broadcast::Sender<MessageEvent> {
        self.sender.clone()
    }
}

/// Bridge Redis pub/sub into the local broadcast channel. Runs until the
/// connection drops; the caller owns reconnection policy.
pub async fn spawn_redis_listener(bus: EventBus, redis_url: String) {
    tokio::spawn(async move {
        let client = match redis::Client::open(redis_url.as_str()) {
            Ok(client) => client,
            Err(e) => {
                error!(error = %e, "Invalid Redis URL, cross-instance events disabled");
                return;
            }
        };

        let mut pubsub = match client.get_async_pubsub().await {
            Ok(pubsub) => pubsub,
            Err(e) => {
                error!(error = %e, "Failed to connect Redis pub/sub");
                return;
            }
        };

        if let Err(e) = pubsub.subscribe(EVENT_CHANNEL).await {
            error!(error = %e, "Failed to subscribe to event channel");
            return;
        }

        info!("Redis event listener started");
        let sender = bus.local_sender();
        let mut stream = pubsub.on_message();

        use futures::StreamExt;
        while let Some(msg) = stream.next().await {
            let payload: String = match msg.get_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(error = %e, "Unreadable Redis event payload");
                    continue;
                }
            };

            match serde_json::from_str::<MessageEvent>(&payload) {
                Ok(event) => {
                    let _ = sender.send(event);
                }
                Err(e) => warn!(error = %e, "Unparseable Redis event"),
            }
        }

        warn!("Redis event listener stopped");
    });
}
