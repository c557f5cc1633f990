//! WebSocket upload endpoint
//!
//! Each connection gets its own protocol engine and a pair of tasks: this
//! handler reads inbound messages sequentially, and a writer task drains a
//! bounded outbound queue. A full queue drops the reply rather than blocking
//! the reader: ingestion keeps moving even when the client reads slowly.
//! When either side ends, the other is signalled through the channel closing,
//! and the connection tears down after both have finished.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::HeaderMap,
    response::Response,
};
use futures::{SinkExt, StreamExt};
use loft_upload::UploadEngine;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::state::AppState;

/// Replies queued but not yet written. Beyond this, replies are dropped.
const OUTBOUND_QUEUE_CAPACITY: usize = 32;

pub async fn upload_socket(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    // Authentication happens upstream; the authenticated user id arrives as
    // a header when present.
    let owner_id = headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value).ok());

    ws.on_upgrade(move |socket| handle_socket(socket, state, owner_id))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, owner_id: Option<Uuid>) {
    let (mut sender, mut receiver) = socket.split();
    let (reply_tx, mut reply_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE_CAPACITY);

    let writer = tokio::spawn(async move {
        while let Some(reply) = reply_rx.recv().await {
            if sender.send(Message::Text(reply.into())).await.is_err() {
                // Dropping the receiver tells the reader to stop.
                break;
            }
        }
    });

    let mut engine = UploadEngine::new(
        state.sessions.clone(),
        state.selector.clone(),
        state.url_policy,
        state.config.base_url.clone(),
        state.lifecycle.clone(),
        owner_id,
    );

    while let Some(Ok(message)) = receiver.next().await {
        let reply = match message {
            Message::Text(text) => Some(engine.handle_message(text.as_str()).await),
            Message::Binary(frame) => Some(engine.handle_frame(frame).await),
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => None,
        };

        if let Some(reply) = reply {
            match reply_tx.try_send(reply.to_json()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!("Outbound queue full, dropping upload reply");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => break,
            }
        }
    }

    // Closing the queue lets the writer drain what is left and exit; any
    // session the client abandoned stays registered until the stale sweep.
    drop(reply_tx);
    let _ = writer.await;

    tracing::debug!("Upload connection closed");
}
