//! WebSocket handler for live reload.
//!
//! A connection is one live channel. Its first `subscribe` message attaches
//! it to a page; later ones move it. Closing the socket detaches it.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use quire_engine::{EngineEvent, ReloadEvent};
use quire_watch::ChannelId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::state::AppState;

/// Message from the browser.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ClientMessage {
    /// The tab displays the page served at `path`.
    Subscribe { path: String },
}

/// Message to the browser.
#[derive(Debug, Serialize)]
struct ReloadMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    path: &'a str,
}

impl<'a> From<&'a ReloadEvent> for ReloadMessage<'a> {
    fn from(event: &'a ReloadEvent) -> Self {
        Self {
            kind: "reload",
            path: &event.url,
        }
    }
}

/// Handle WebSocket upgrade for live reload.
pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle an established WebSocket connection.
async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let channel = ChannelId::new();
    // Subscribe before registering so no reload for our page is missed.
    let mut reloads = state.engine.subscribe();
    let mut page: Option<PathBuf> = None;

    loop {
        tokio::select! {
            result = reloads.recv() => {
                match result {
                    Ok(event) => {
                        if page.as_ref() != Some(&event.page) {
                            continue;
                        }
                        let Ok(msg) = serde_json::to_string(&ReloadMessage::from(&event)) else {
                            continue;
                        };
                        if socket.send(Message::Text(msg.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(%channel, skipped, "Live reload channel lagged");
                    }
                }
            }
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(source) = subscribe(&state, channel, text.as_str()) {
                            page = Some(source);
                        }
                    }
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    if page.is_some() {
        // The loop may already be gone during shutdown
        let _ = state.events.send(EngineEvent::SubscriptionRemoved { channel });
    }
}

/// Attach `channel` to the page named by a `subscribe` message.
fn subscribe(state: &AppState, channel: ChannelId, text: &str) -> Option<PathBuf> {
    let ClientMessage::Subscribe { path } = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(err) => {
            tracing::debug!(%channel, error = %err, "Ignoring malformed live reload message");
            return None;
        }
    };

    let Some(source) = state.engine.resolve_url(&path) else {
        tracing::debug!(%channel, url = %path, "Subscription to unknown page ignored");
        return None;
    };

    let event = EngineEvent::SubscriptionAdded {
        channel,
        page: source.clone(),
    };
    state.events.send(event).ok()?;
    Some(source)
}
