//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs basic result info.

use std::sync::Arc;
use axum::{extract::State, http::StatusCode, response::{IntoResponse, Response}, Json};
use tracing::{error, info, instrument};

use crate::logic::handle_turn;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_stats(State(state): State<Arc<AppState>>) -> Response {
  match state.blocking(|st| Ok(st.catalog.statistics()?)).await {
    Ok(statistics) => {
      let active_sessions = state.sessions.len().await;
      Json(StatsOut { statistics, active_sessions }).into_response()
    }
    Err(e) => {
      error!(target: "gdz_catalog", error = %e, "HTTP stats failed");
      (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": e.to_string() }))).into_response()
    }
  }
}

/// One turn, processed synchronously; the replies are the response body.
#[instrument(level = "info", skip(state, turn), fields(conversation = turn.conversation))]
pub async fn http_post_turn(
  State(state): State<Arc<AppState>>,
  Json(turn): Json<InboundTurn>,
) -> impl IntoResponse {
  let replies = handle_turn(&state, turn).await;
  info!(target: "gdz_catalog", replies = replies.len(), "HTTP turn handled");
  Json(TurnOut { replies })
}
