//! Persistent links to the Chainprox backend services.
//!
//! This crate provides:
//! - The decoded [`Message`] type and the known message kinds
//! - The [`Connection`] abstraction and a WebSocket implementation
//! - Connect retry with exponential backoff and heartbeat pings
//! - [`ConnectionSupervisor`], which opens the manager and fetcher
//!   connections together and funnels their messages into one channel

mod connection;
mod error;
mod messages;
mod supervisor;
mod ws;

pub use connection::{
    Connection, ConnectionId, ConnectionState, Connector, MessageStream, TransportOptions,
};
pub use error::{ConnectionError, ConnectionResult};
pub use messages::{Fields, Message, MessageKind};
pub use supervisor::{ConnectionSupervisor, Inbound};
pub use ws::{WsConnection, WsConnector, WsSettings};
