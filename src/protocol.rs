//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and chat transport independently.

use serde::{Deserialize, Serialize};

use crate::domain::{ConversationId, SenderInfo, Statistics};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    Turn(InboundTurn),
}

/// One inbound chat event for one conversation.
#[derive(Debug, Deserialize)]
pub struct InboundTurn {
    pub conversation: ConversationId,
    #[serde(default)]
    pub sender: Option<SenderInfo>,
    pub event: TurnEvent,
}

fn default_mime() -> String {
    "image/jpeg".into()
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnEvent {
    Text {
        text: String,
    },
    /// A choice button was pressed.
    Select {
        token: String,
    },
    Media {
        #[serde(rename = "dataBase64")]
        data_base64: String,
        #[serde(default = "default_mime")]
        mime: String,
    },
    Document {
        #[serde(rename = "fileName")]
        file_name: String,
        #[serde(rename = "dataBase64")]
        data_base64: String,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    /// Sent as soon as a turn is received, before it is processed.
    Ack { seq: u64 },
    Replies {
        seq: u64,
        conversation: ConversationId,
        replies: Vec<Reply>,
    },
    Error { message: String },
}

/// A button: what the user sees and the token sent back when pressed.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    pub token: String,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentOut {
    pub file_name: String,
    pub data_base64: String,
}

/// One rendered message for the chat transport.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// Rows of buttons.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Vec<Choice>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<DocumentOut>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply { text: text.into(), ..Default::default() }
    }
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Serialize)]
pub struct TurnOut {
    pub replies: Vec<Reply>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsOut {
    #[serde(flatten)]
    pub statistics: Statistics,
    pub active_sessions: usize,
}
