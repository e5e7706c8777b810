use async_trait::async_trait;
use message_dispatcher::Consumer;
use service_connection::Fields;

/// `pong {}`: heartbeat reply, nothing to do.
pub struct PongConsumer;

#[async_trait]
impl Consumer for PongConsumer {
    async fn consume(&self, _fields: &Fields) -> anyhow::Result<()> {
        Ok(())
    }
}
