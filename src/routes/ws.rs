//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic; we reply with a single JSON message per request.
//! Timer-driven session advances are pushed without a request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, error, instrument, debug, warn};

use crate::logic;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::{AppState, SessionEvent};

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "codedrill", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "codedrill", "WebSocket connected");
  let mut events = state.events.subscribe();

  loop {
    let reply_msg = tokio::select! {
      incoming = socket.recv() => {
        let Some(Ok(msg)) = incoming else { break };
        match msg {
          Message::Text(txt) => match serde_json::from_str::<ClientWsMessage>(&txt) {
            Ok(incoming) => {
              debug!(target: "codedrill", "WS received: {:?}", &incoming);
              handle_client_ws(incoming, &state).await
            }
            Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
          },
          Message::Ping(payload) => {
            let _ = socket.send(Message::Pong(payload)).await;
            continue;
          }
          Message::Close(_) => break,
          _ => continue,
        }
      }
      event = events.recv() => match event {
        Ok(SessionEvent::Advanced { outcome, session }) => ServerWsMessage::Advanced { outcome, session },
        Err(RecvError::Lagged(n)) => {
          warn!(target: "codedrill", skipped = n, "WS client lagging behind session events");
          continue;
        }
        Err(RecvError::Closed) => break,
      },
    };

    let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
      serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
    });

    if let Err(e) = socket.send(Message::Text(out)).await {
      error!(target: "codedrill", error = %e, "WS send error");
      break;
    }
  }
  info!(target: "codedrill", "WebSocket disconnected");
}

#[instrument(level = "info", skip(state))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  let result = match msg {
    ClientWsMessage::Ping => Ok(ServerWsMessage::Pong),

    ClientWsMessage::StartSession { params } => logic::start_session(state, params)
      .await
      .map(|view| ServerWsMessage::Session { session: Some(view) }),

    ClientWsMessage::GetSession => Ok(ServerWsMessage::Session { session: logic::current_session(state).await }),

    ClientWsMessage::SubmitAnswer { answer } => logic::submit_answer(state, None, &answer)
      .await
      .map(|result| ServerWsMessage::AnswerResult { result }),

    ClientWsMessage::Hint => logic::request_hint(state, None)
      .await
      .map(|hints| ServerWsMessage::Hint { hints }),

    ClientWsMessage::RevealAnswer => logic::reveal_answer(state, None)
      .await
      .map(|r| ServerWsMessage::Answer { answer: r.answer }),

    ClientWsMessage::EndSession => logic::end_session(state, None)
      .await
      .map(|()| ServerWsMessage::SessionEnded),

    ClientWsMessage::GetProgress => Ok(ServerWsMessage::Progress { progress: logic::progress_summary(state).await }),
  };

  result.unwrap_or_else(|e| ServerWsMessage::Error { message: e.to_string() })
}
