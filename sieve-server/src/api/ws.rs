//! WebSocket endpoint
//!
//! Adapts axum's socket to the transport-neutral [`ConnectionHandler`]:
//! text and binary frames become payloads, events go out as text frames.

use crate::connection::{ConnectionHandler, Inbound};
use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{future, SinkExt, StreamExt};
use tracing::debug;

/// GET /ws - upgrade to a streaming session
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let max = state.max_payload_bytes;
    ws.max_message_size(max)
        .max_frame_size(max)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let handler = ConnectionHandler::new(state.gate.clone(), state.pipeline.clone());
    let connection_id = handler.connection_id();

    let (sender, receiver) = socket.split();

    let inbound = receiver.map(move |frame| match frame {
        Ok(message) => to_inbound(message),
        Err(e) => {
            debug!(%connection_id, error = %e, "WebSocket receive error");
            Inbound::Close
        }
    });
    let outbound = sender.with(|json: String| future::ready(Ok::<_, axum::Error>(Message::Text(json))));

    handler.serve(inbound, outbound).await;
}

fn to_inbound(message: Message) -> Inbound {
    match message {
        Message::Text(text) => Inbound::Payload(text),
        Message::Binary(bytes) => Inbound::Payload(String::from_utf8_lossy(&bytes).into_owned()),
        Message::Ping(_) | Message::Pong(_) => Inbound::Ignored,
        Message::Close(_) => Inbound::Close,
    }
}

/// Build WebSocket routes
pub fn ws_routes() -> Router<AppState> {
    Router::new().route("/ws", get(ws_handler))
}
