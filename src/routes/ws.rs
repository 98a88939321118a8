//! WebSocket upgrade + message loop.
//!
//! Every turn is acknowledged right away with a sequence number. Turns are then
//! handed to a per-connection worker that processes them in arrival order;
//! the loop forwards its `replies` messages as they complete.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::logic::handle_turn;
use crate::protocol::{ClientWsMessage, InboundTurn, ServerWsMessage};
use crate::state::AppState;
use crate::util::trunc_for_log;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "gdz_catalog", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn send(socket: &mut WebSocket, msg: &ServerWsMessage) -> bool {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });
  match socket.send(Message::Text(out)).await {
    Ok(()) => true,
    Err(e) => {
      error!(target: "gdz_catalog", error = %e, "WS send error");
      false
    }
  }
}

/// Drain queued turns one by one; stops when the connection is gone.
async fn turn_worker(
  state: Arc<AppState>,
  mut turns: mpsc::UnboundedReceiver<(u64, InboundTurn)>,
  out: mpsc::UnboundedSender<ServerWsMessage>,
) {
  while let Some((seq, turn)) = turns.recv().await {
    let conversation = turn.conversation;
    let replies = handle_turn(&state, turn).await;
    if out.send(ServerWsMessage::Replies { seq, conversation, replies }).is_err() {
      debug!(target: "gdz_catalog", seq, "Connection closed before replies were sent");
    }
  }
}

type TurnSender = mpsc::UnboundedSender<(u64, InboundTurn)>;

/// Answer one client frame. A turn is queued for the worker and acknowledged
/// at once; `None` means the worker is gone.
fn accept_frame(txt: &str, seq: &mut u64, turns: &TurnSender) -> Option<ServerWsMessage> {
  Some(match serde_json::from_str::<ClientWsMessage>(txt) {
    Ok(ClientWsMessage::Ping) => ServerWsMessage::Pong,
    Ok(ClientWsMessage::Turn(turn)) => {
      *seq += 1;
      debug!(target: "gdz_catalog", seq = *seq, conversation = turn.conversation, "WS turn queued");
      turns.send((*seq, turn)).ok()?;
      ServerWsMessage::Ack { seq: *seq }
    }
    Err(e) => {
      debug!(target: "gdz_catalog", raw = %trunc_for_log(txt, 200), "WS invalid JSON");
      ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) }
    }
  })
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "gdz_catalog", "WebSocket connected");
  let (turn_tx, turn_rx) = mpsc::unbounded_channel();
  let (out_tx, mut out_rx) = mpsc::unbounded_channel();
  let worker = tokio::spawn(turn_worker(state, turn_rx, out_tx));
  let mut seq: u64 = 0;

  loop {
    tokio::select! {
      incoming = socket.recv() => {
        let msg = match incoming {
          Some(Ok(msg)) => msg,
          Some(Err(e)) => {
            warn!(target: "gdz_catalog", error = %e, "WS receive error");
            break;
          }
          None => break,
        };
        match msg {
          Message::Text(txt) => {
            let Some(reply) = accept_frame(&txt, &mut seq, &turn_tx) else {
              error!(target: "gdz_catalog", "Turn worker stopped");
              break;
            };
            if !send(&mut socket, &reply).await {
              break;
            }
          }
          Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
          Message::Close(_) => break,
          _ => {}
        }
      }
      Some(out) = out_rx.recv() => {
        if !send(&mut socket, &out).await {
          break;
        }
      }
    }
  }

  // Queued turns still run so their effects persist; their replies are dropped.
  drop(turn_tx);
  drop(out_rx);
  if let Err(e) = worker.await {
    error!(target: "gdz_catalog", error = %e, "Turn worker panicked");
  }
  info!(target: "gdz_catalog", "WebSocket disconnected");
}
