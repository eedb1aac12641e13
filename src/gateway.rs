//! JSON-over-websocket bridge to the chat platform relay.
//!
//! Inbound frames carry commands, button interactions and reactions.
//! Outbound frames carry announcements, replies and role grants.

use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{client::IntoClientRequest, Message};

use crate::announce::Announcement;
use crate::bot::Bot;
use crate::collector::Actor;
use crate::commands::Command;

const PING_INTERVAL: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    Command {
        channel_id: String,
        #[serde(default)]
        interaction_id: Option<String>,
        user: Actor,
        command: Command,
    },
    Interaction {
        id: String,
        channel_id: String,
        #[serde(default)]
        custom_id: Option<String>,
        user: Actor,
        #[serde(default)]
        at_ms: u64,
    },
    Reaction {
        channel_id: String,
        emoji: String,
        user: Actor,
        #[serde(default)]
        at_ms: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    Announce {
        channel_id: String,
        announcement: Announcement,
    },
    Reply {
        channel_id: String,
        interaction_id: Option<String>,
        content: String,
        ephemeral: bool,
    },
    Defer {
        interaction_id: String,
    },
    GrantRole {
        channel_id: String,
        user_id: String,
        role_id: String,
    },
}

pub fn parse_inbound(text: &str) -> serde_json::Result<InboundEvent> {
    serde_json::from_str(text)
}

/// Keeps a relay connection open forever, reconnecting on failure.
/// Returns once every outbound sender has been dropped.
pub async fn run_gateway(
    url: &str,
    token: &str,
    bot: &Bot,
    mut outbox: mpsc::UnboundedReceiver<OutboundFrame>,
) -> Result<()> {
    loop {
        let mut ws = match connect_websocket(url, token).await {
            Ok(ws) => ws,
            Err(err) => {
                tracing::warn!("[Gateway] Connect error: {err:#}");
                tokio::time::sleep(RECONNECT_DELAY).await;
                continue;
            }
        };

        tracing::info!("[Gateway] Connected to {url}");
        let mut ping = tokio::time::interval(PING_INTERVAL);
        loop {
            tokio::select! {
                _ = ping.tick() => {
                    if let Err(err) = ws.send(Message::Ping(Vec::new().into())).await {
                        tracing::warn!("[Gateway] Ping error: {err}");
                        break;
                    }
                }
                frame = outbox.recv() => {
                    let Some(frame) = frame else {
                        tracing::info!("[Gateway] Outbox closed, shutting down");
                        return Ok(());
                    };
                    let text = serde_json::to_string(&frame)
                        .context("Failed to serialize outbound frame")?;
                    if let Err(err) = ws.send(Message::Text(text.into())).await {
                        tracing::error!("[Gateway] Send error, frame dropped: {err}");
                        break;
                    }
                }
                msg = ws.next() => {
                    let msg = match msg {
                        Some(Ok(msg)) => msg,
                        Some(Err(err)) => {
                            tracing::warn!("[Gateway] Read error: {err}");
                            break;
                        }
                        None => {
                            tracing::info!("[Gateway] Connection closed, reconnecting");
                            break;
                        }
                    };
                    let text = match msg {
                        Message::Text(text) => text.to_string(),
                        Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
                            Ok(text) => text,
                            Err(err) => {
                                tracing::warn!("[Gateway] Invalid utf8 frame: {err}");
                                continue;
                            }
                        },
                        _ => continue,
                    };
                    match parse_inbound(&text) {
                        Ok(event) => bot.handle(event),
                        Err(err) => tracing::warn!("[Gateway] Skipping malformed frame: {err}"),
                    }
                }
            }
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

async fn connect_websocket(
    url: &str,
    token: &str,
) -> Result<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
> {
    let mut request = url
        .into_client_request()
        .context("Failed to build websocket request")?;
    request.headers_mut().insert(
        "Authorization",
        http::HeaderValue::from_str(&format!("Bot {token}")).context("Invalid auth header")?,
    );
    let (ws, _) = tokio_tungstenite::connect_async(request)
        .await
        .context("Failed to connect websocket")?;
    Ok(ws)
}
