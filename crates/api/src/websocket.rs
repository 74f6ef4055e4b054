use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use bearmobile_core::{AgentEvent, OnEvent, SupportCore};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    display_text,
    error::ApiError,
    routes::conversation::{parse_model, validate_message},
};

/// Message sent by the chat page.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientFrame {
    #[serde(default)]
    pub session_id: Option<Uuid>,
    pub message: String,
    #[serde(default)]
    pub model: Option<String>,
}

/// Progress and results streamed back to the chat page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Thinking,
    ToolCallStart {
        id: String,
        name: String,
    },
    ToolCallEnd {
        id: String,
        name: String,
        success: bool,
    },
    Answer {
        session_id: Uuid,
        response: String,
        display: String,
        cached: bool,
    },
    Error {
        message: String,
    },
}

impl ServerFrame {
    /// Agent events the page shows; the rest only go to the log.
    pub fn from_event(event: AgentEvent) -> Option<Self> {
        match event {
            AgentEvent::Thinking => Some(ServerFrame::Thinking),
            AgentEvent::ToolCallStart { id, name } => Some(ServerFrame::ToolCallStart { id, name }),
            AgentEvent::ToolCallEnd { id, name, success } => {
                Some(ServerFrame::ToolCallEnd { id, name, success })
            }
            other => {
                debug!("Agent event: {:?}", other);
                None
            }
        }
    }
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(core): State<Arc<SupportCore>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, core))
}

async fn handle_socket(socket: WebSocket, core: Arc<SupportCore>) {
    let connection_id = Uuid::new_v4();
    info!("WebSocket connection {} established", connection_id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();

    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let json_msg = match serde_json::to_string(&frame) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize WebSocket frame: {}", e);
                    continue;
                }
            };

            if sender.send(Message::Text(json_msg)).await.is_err() {
                break;
            }
        }
    });

    // Turns on one connection run one after another
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                debug!("Received WebSocket message on {}", connection_id);
                let frame = match handle_text(&core, &text, &tx).await {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!("WebSocket turn failed: {}", e);
                        ServerFrame::Error {
                            message: e.public_message(),
                        }
                    }
                };
                if tx.send(frame).is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                error!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    drop(tx);
    if let Err(e) = send_task.await {
        error!("WebSocket sender task failed: {}", e);
    }
    info!("WebSocket connection {} closed", connection_id);
}

async fn handle_text(
    core: &SupportCore,
    text: &str,
    tx: &mpsc::UnboundedSender<ServerFrame>,
) -> Result<ServerFrame, ApiError> {
    let frame: ClientFrame = serde_json::from_str(text)
        .map_err(|e| ApiError::WebSocket(format!("Invalid message: {}", e)))?;
    validate_message(&frame.message)?;
    let model = parse_model(frame.model.as_deref())?;

    let events = tx.clone();
    let on_event: OnEvent = Box::new(move |event| {
        if let Some(frame) = ServerFrame::from_event(event) {
            let _ = events.send(frame);
        }
    });

    let outcome = core
        .orchestrator
        .handle_turn(frame.session_id, &frame.message, model, Some(&on_event))
        .await?;

    Ok(ServerFrame::Answer {
        display: display_text(&outcome.response, outcome.cached),
        session_id: outcome.session_id,
        response: outcome.response,
        cached: outcome.cached,
    })
}
