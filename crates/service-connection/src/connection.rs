//! The connection abstraction shared by real and test transports.

use crate::{ConnectionResult, Message};
use async_trait::async_trait;
use client_storage::Credential;
use futures_util::stream::BoxStream;
use std::fmt;
use std::sync::Arc;

/// Which backend service a connection talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionId {
    Manager,
    Fetcher,
}

impl ConnectionId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionId::Manager => "manager",
            ConnectionId::Fetcher => "fetcher",
        }
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Connecting,
    Open,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportOptions {
    pub tls_enabled: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self { tls_enabled: true }
    }
}

/// Decoded messages from an open connection.
///
/// The stream ends when the connection is closed. An `Err` item means the
/// connection failed and no further items follow.
pub type MessageStream = BoxStream<'static, ConnectionResult<Message>>;

/// One logical persistent link to a remote service.
///
/// Implementations own their connect retry policy; `open` only returns an
/// error once retrying has been given up.
#[async_trait]
pub trait Connection: Send + Sync {
    fn id(&self) -> ConnectionId;

    fn state(&self) -> ConnectionState;

    async fn open(&self, credential: &Credential) -> ConnectionResult<MessageStream>;

    /// Close the link. Safe to call in any state.
    async fn close(&self);
}

/// Builds the connections for a session.
pub trait Connector: Send + Sync {
    fn connection(&self, id: ConnectionId, options: TransportOptions) -> Arc<dyn Connection>;
}
