//! Service protocol messages.
//!
//! On the wire every frame is a JSON object `{"kind": ..., "data": {...}}`.
//! Decoded frames become [`Message`]s: a kind string plus its field map.

use crate::ConnectionId;
use client_storage::Credential;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Field map carried by a message.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Message kinds the client knows how to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    AuthResponse,
    BalanceInfo,
    VersionInfo,
    Pong,
    /// Generated locally when a connection drops after it was open.
    ConnectionFailed,
}

impl MessageKind {
    pub const ALL: [MessageKind; 5] = [
        MessageKind::AuthResponse,
        MessageKind::BalanceInfo,
        MessageKind::VersionInfo,
        MessageKind::Pong,
        MessageKind::ConnectionFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::AuthResponse => "auth_response",
            MessageKind::BalanceInfo => "balance_info",
            MessageKind::VersionInfo => "version_info",
            MessageKind::Pong => "pong",
            MessageKind::ConnectionFailed => "connection_failed",
        }
    }

    /// Look up a wire kind. Unknown kinds yield `None`.
    pub fn parse(kind: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == kind)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub kind: String,
    #[serde(rename = "data", default)]
    pub fields: Fields,
}

impl Message {
    pub fn new(kind: impl Into<String>, fields: Fields) -> Self {
        Self {
            kind: kind.into(),
            fields,
        }
    }

    /// The known kind of this message, if any.
    pub fn known_kind(&self) -> Option<MessageKind> {
        MessageKind::parse(&self.kind)
    }

    /// Authentication frame sent right after the socket opens.
    pub fn auth(credential: &Credential) -> Self {
        let mut fields = Fields::new();
        fields.insert("email".into(), credential.email.clone().into());
        fields.insert("password".into(), credential.password.clone().into());
        Self::new("auth", fields)
    }

    /// Heartbeat frame.
    pub fn ping() -> Self {
        Self::new("ping", Fields::new())
    }

    /// Local notification that `connection` dropped after it was open.
    pub fn connection_failed(connection: ConnectionId, reason: impl Into<String>) -> Self {
        let reason: String = reason.into();
        let mut fields = Fields::new();
        fields.insert("connection".into(), connection.as_str().into());
        fields.insert("reason".into(), reason.into());
        Self::new(MessageKind::ConnectionFailed.as_str(), fields)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
