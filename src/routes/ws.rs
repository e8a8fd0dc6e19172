// WebSocket subscription for push-delivered message events

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::AppState;
use crate::realtime::MessageEvent;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/ws", get(ws_handler))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    conversation_id: Option<Uuid>,
    channel_id: Option<Uuid>,
}

async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| stream_events(socket, state, query))
}

/// Forward matching insert/update events as JSON frames. Delivery here is
/// best-effort; the client reconciler and poll fallback own consistency.
async fn stream_events(mut socket: WebSocket, state: AppState, query: WsQuery) {
    let mut events = state.events.subscribe();

    loop {
        tokio::select! {
            event = events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    // A lagged subscriber just misses events; the poll
                    // fallback fills the gap.
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event subscriber lagged");
                        continue;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                };

                if !event_matches(&event, &query) {
                    continue;
                }

                let payload = match serde_json::to_string(&event) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(error = %e, "Failed to serialize event");
                        continue;
                    }
                };

                if socket.send(WsMessage::Text(payload.into())).await.is_err() {
                    debug!("WebSocket closed by client");
                    break;
                }
            }
            incoming = socket.recv() => {
                // Clients only send close frames; any None/Err ends the stream.
                match incoming {
                    Some(Ok(_)) => continue,
                    _ => break,
                }
            }
        }
    }
}

fn event_matches(event: &MessageEvent, query: &WsQuery) -> bool {
    match (query.conversation_id, query.channel_id) {
        (Some(conversation_id), _) => event.message.conversation_id == Some(conversation_id),
        (_, Some(channel_id)) => event.message.channel_id == Some(channel_id),
        _ => true,
    }
}
