//! Consumers for every known message kind.

mod auth;
mod balance;
mod connection;
mod heartbeat;
mod version;

pub use auth::AuthResponseConsumer;
pub use balance::BalanceInfoConsumer;
pub use connection::ConnectionFailedConsumer;
pub use heartbeat::PongConsumer;
pub use version::VersionInfoConsumer;

use crate::events::Notifier;
use crate::SessionManager;
use anyhow::Context;
use client_config_and_utils::HostPlatform;
use client_storage::CredentialStore;
use message_dispatcher::{DispatchResult, MessageDispatcher};
use self_updater::UpdateManager;
use serde_json::Value;
use service_connection::{Fields, MessageKind};
use std::sync::Arc;

/// Build the dispatcher with one consumer per known kind.
pub fn build_dispatcher(
    session: Arc<SessionManager>,
    store: Arc<dyn CredentialStore>,
    updates: Arc<UpdateManager>,
    notifier: Notifier,
    host: HostPlatform,
) -> DispatchResult<MessageDispatcher> {
    let mut dispatcher = MessageDispatcher::new();
    dispatcher.register(
        MessageKind::AuthResponse,
        Arc::new(AuthResponseConsumer::new(session.clone())),
    )?;
    dispatcher.register(
        MessageKind::BalanceInfo,
        Arc::new(BalanceInfoConsumer::new(notifier.clone())),
    )?;
    dispatcher.register(
        MessageKind::VersionInfo,
        Arc::new(VersionInfoConsumer::new(store, updates, notifier, host)),
    )?;
    dispatcher.register(MessageKind::Pong, Arc::new(PongConsumer))?;
    dispatcher.register(
        MessageKind::ConnectionFailed,
        Arc::new(ConnectionFailedConsumer::new(session)),
    )?;
    Ok(dispatcher)
}

fn field<'a>(fields: &'a Fields, name: &str) -> anyhow::Result<&'a Value> {
    fields
        .get(name)
        .with_context(|| format!("missing field `{}`", name))
}

fn str_field<'a>(fields: &'a Fields, name: &str) -> anyhow::Result<&'a str> {
    field(fields, name)?
        .as_str()
        .with_context(|| format!("field `{}` is not a string", name))
}
