use super::field;
use crate::events::{ClientEvent, Notifier};
use anyhow::Context;
use async_trait::async_trait;
use client_config_and_utils::format_size;
use message_dispatcher::Consumer;
use service_connection::Fields;

/// `balance_info {balance_amount}`: the traffic balance in bytes.
pub struct BalanceInfoConsumer {
    notifier: Notifier,
}

impl BalanceInfoConsumer {
    pub fn new(notifier: Notifier) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl Consumer for BalanceInfoConsumer {
    async fn consume(&self, fields: &Fields) -> anyhow::Result<()> {
        let amount = field(fields, "balance_amount")?
            .as_f64()
            .context("field `balance_amount` is not a number")?;

        self.notifier.notify(ClientEvent::BalanceUpdated {
            text: format!("Balance: {}", format_size(amount)),
        });
        Ok(())
    }
}
