use super::field;
use crate::SessionManager;
use async_trait::async_trait;
use message_dispatcher::Consumer;
use serde_json::Value;
use service_connection::Fields;
use std::sync::Arc;

/// `auth_response {error}`: an empty error means the login was accepted.
pub struct AuthResponseConsumer {
    session: Arc<SessionManager>,
}

impl AuthResponseConsumer {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Consumer for AuthResponseConsumer {
    async fn consume(&self, fields: &Fields) -> anyhow::Result<()> {
        let error = match field(fields, "error")? {
            Value::Null => String::new(),
            Value::String(error) => error.clone(),
            other => other.to_string(),
        };

        if error.is_empty() {
            self.session.confirm_authenticated()?;
        } else {
            self.session.reject_authentication(&error).await?;
        }
        Ok(())
    }
}
