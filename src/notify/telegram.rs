use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::config::TelegramConfig;
use crate::models::Trade;
use crate::notify::{format_trade_setup, Notifier, NotifyError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

/// Sends setups to the operator chat through the Bot API `sendMessage` call.
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(cfg: &TelegramConfig) -> Result<Self, NotifyError> {
        if cfg.bot_token.is_empty() {
            return Err(NotifyError::NotConfigured("bot token"));
        }
        if cfg.chat_id.is_empty() {
            return Err(NotifyError::NotConfigured("chat id"));
        }
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            bot_token: cfg.bot_token.clone(),
            chat_id: cfg.chat_id.clone(),
        })
    }

    pub async fn send_text(&self, text: &str) -> Result<(), NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let resp = self
            .client
            .post(url)
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text,
                disable_web_page_preview: true,
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        debug!("Delivered message to chat {}", self.chat_id);
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_trade_setup(&self, trade: &Trade) -> Result<(), NotifyError> {
        self.send_text(&format_trade_setup(trade)).await
    }
}
