use super::str_field;
use crate::SessionManager;
use async_trait::async_trait;
use message_dispatcher::Consumer;
use service_connection::Fields;
use std::sync::Arc;

/// `connection_failed {connection, reason}`: raised locally when a service
/// connection drops; the whole session is closed.
pub struct ConnectionFailedConsumer {
    session: Arc<SessionManager>,
}

impl ConnectionFailedConsumer {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Consumer for ConnectionFailedConsumer {
    async fn consume(&self, fields: &Fields) -> anyhow::Result<()> {
        let connection = str_field(fields, "connection")?;
        let reason = str_field(fields, "reason").unwrap_or("unknown");
        self.session
            .handle_connection_failure(connection, reason)
            .await;
        Ok(())
    }
}
