use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use chatline_auth::Identity;
use chatline_realtime::{admit, ClientEvent};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::{ApiError, AppState};

/// How long the writer may keep flushing queued events after the reader stops.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
pub struct WebSocketQuery {
    token: Option<String>,
}

/// Admission happens here, before the upgrade: a missing or invalid token
/// is answered with 401 and the socket is never registered.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WebSocketQuery>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let identity = admit(state.authenticator(), params.token.as_deref()).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, identity)))
}

async fn handle_socket(socket: WebSocket, state: AppState, identity: Identity) {
    let hub = state.hub().clone();
    let (handle, mut outbound) = match hub.connect(identity) {
        Ok(connection) => connection,
        Err(err) => {
            error!(error = %err, "failed to register connection");
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let connection_id = handle.id;

    let mut writer = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let payload = match serde_json::to_string(&event) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(connection_id, error = %err, "failed to encode event");
                    continue;
                }
            };
            if let Err(err) = ws_sender.send(Message::Text(payload)).await {
                debug!(connection_id, error = %err, "socket write failed");
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    let mut writer_finished = false;
    loop {
        tokio::select! {
            frame = ws_receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => {
                        if let Err(err) = hub.dispatch(&handle, event).await {
                            debug!(connection_id, error = %err, "client event failed");
                        }
                    }
                    Err(err) => hub.reject_frame(&handle, &err.to_string()),
                },
                Some(Ok(Message::Close(_))) | None => break,
                // Binary, ping and pong frames carry no events.
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!(connection_id, error = %err, "socket read failed");
                    break;
                }
            },
            _ = &mut writer => {
                writer_finished = true;
                break;
            }
        }
    }

    // Unregistering drops the outbound sender; the writer then flushes what it
    // still can and completes the close handshake on its own.
    if let Err(err) = hub.disconnect(&handle) {
        error!(connection_id, error = %err, "failed to unregister connection");
    }
    if !writer_finished
        && tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
            .await
            .is_err()
    {
        debug!(connection_id, "socket writer did not drain in time");
        writer.abort();
    }
}
