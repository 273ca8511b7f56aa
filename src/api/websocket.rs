//! WebSocket event stream
//!
//! Each client gets `round:state` on connect, then every broadcast
//! [`RoundEvent`]. Clients may place bets over the same socket; the
//! confirmation or error goes back to that client only.

use super::handlers::AppState;
use crate::round::{BetSubmission, RoundEvent};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Inbound messages, tagged by `type`
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "bet:place")]
    PlaceBet(BetSubmission),
}

pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

/// Handle a client message; `None` when nothing should be sent back
pub async fn handle_client_text(state: &AppState, text: &str) -> Option<RoundEvent> {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            return Some(RoundEvent::BetError {
                error: format!("Invalid message: {}", e),
            })
        }
    };

    match message {
        ClientMessage::PlaceBet(submission) => {
            match state.rounds.submit_bet(submission).await {
                Ok(receipt) => Some(RoundEvent::BetConfirmed {
                    round_id: receipt.round_id,
                    tx_ref: receipt.tx_ref,
                }),
                Err(rejection) => Some(RoundEvent::BetError {
                    error: rejection.to_string(),
                }),
            }
        }
    }
}

async fn handle_connection(socket: WebSocket, state: Arc<AppState>) {
    let client_id = Uuid::new_v4().to_string();
    state.metrics.ws_connected();
    info!(client_id = %client_id, "WebSocket client connected");

    let (mut sender, mut receiver) = socket.split();
    let mut events = state.rounds.subscribe();
    let (direct_tx, mut direct_rx) = mpsc::channel::<RoundEvent>(16);

    let welcome = RoundEvent::State {
        round: state.rounds.current_round(),
    };
    if let Ok(text) = serde_json::to_string(&welcome) {
        if sender.send(Message::Text(text)).await.is_err() {
            state.metrics.ws_disconnected();
            return;
        }
    }

    let send_client = client_id.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                direct = direct_rx.recv() => match direct {
                    Some(event) => event,
                    None => break,
                },
                broadcast = events.recv() => match broadcast {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(client_id = %send_client, skipped, "Client lagging, events dropped");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
            };

            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Failed to serialize event");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                debug!(client_id = %send_client, "Client disconnected");
                break;
            }
        }
    });

    let recv_state = state.clone();
    let recv_client = client_id.clone();
    let mut receive_task = tokio::spawn(async move {
        while let Some(message) = receiver.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    if let Some(reply) = handle_client_text(&recv_state, &text).await {
                        if direct_tx.send(reply).await.is_err() {
                            break;
                        }
                    }
                }
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    debug!(client_id = %recv_client, error = %e, "WebSocket receive error");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => receive_task.abort(),
        _ = &mut receive_task => send_task.abort(),
    }

    state.metrics.ws_disconnected();
    info!(client_id = %client_id, "WebSocket client disconnected");
}
