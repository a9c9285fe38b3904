use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::TelegramConfig;
use crate::feed::{ChannelRoutes, Feed};
use crate::models::InboundMessage;

const RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    channel_post: Option<Post>,
}

#[derive(Debug, Deserialize)]
struct Post {
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    photo: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
    #[serde(default)]
    username: Option<String>,
}

/// Long-polls the Bot API for posts in the configured channels. The bot must
/// be a member of each source channel to receive its posts.
pub struct TelegramFeed {
    client: Client,
    api_base: String,
    bot_token: String,
    poll_timeout_secs: u64,
    offset: i64,
    routes: ChannelRoutes,
}

impl TelegramFeed {
    pub fn new(cfg: &TelegramConfig, routes: ChannelRoutes) -> Result<Self> {
        anyhow::ensure!(!cfg.bot_token.is_empty(), "TELEGRAM_BOT_TOKEN is not set");
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.poll_timeout_secs + 10))
            .build()
            .context("building telegram client")?;
        Ok(Self {
            client,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            bot_token: cfg.bot_token.clone(),
            poll_timeout_secs: cfg.poll_timeout_secs,
            offset: 0,
            routes,
        })
    }

    async fn poll(&mut self) -> Result<Vec<InboundMessage>> {
        let url = format!("{}/bot{}/getUpdates", self.api_base, self.bot_token);
        let resp = self
            .client
            .get(url)
            .query(&[
                ("offset", self.offset.to_string()),
                ("timeout", self.poll_timeout_secs.to_string()),
                ("allowed_updates", r#"["channel_post"]"#.to_string()),
            ])
            .send()
            .await
            .context("Failed to fetch updates")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Telegram API error {}: {}", status, body);
        }

        let data: UpdatesResponse = resp.json().await.context("Failed to parse updates")?;
        if !data.ok {
            anyhow::bail!(
                "Telegram API refused getUpdates: {}",
                data.description.unwrap_or_default()
            );
        }

        let (messages, next) = extract_messages(&self.routes, data.result);
        if let Some(next) = next {
            self.offset = next;
        }
        Ok(messages)
    }
}

/// Keeps channel posts from routed chats. Returns the offset that
/// acknowledges every update seen, including skipped ones.
fn extract_messages(routes: &ChannelRoutes, updates: Vec<Update>) -> (Vec<InboundMessage>, Option<i64>) {
    let next = updates.iter().map(|u| u.update_id + 1).max();
    let messages = updates
        .into_iter()
        .filter_map(|u| u.channel_post)
        .filter_map(|post| {
            let channel = routes.resolve(post.chat.username.as_deref(), post.chat.id)?;
            let has_image = post.photo.as_ref().is_some_and(|p| !p.is_empty());
            let text = post.text.or(post.caption).unwrap_or_default();
            Some(InboundMessage {
                channel: channel.clone(),
                text,
                has_image,
            })
        })
        .collect();
    (messages, next)
}

#[async_trait]
impl Feed for TelegramFeed {
    async fn run(
        &mut self,
        tx: mpsc::Sender<InboundMessage>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        if self.routes.is_empty() {
            warn!("No enabled channels to monitor");
        }
        info!("Listening for channel posts");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let polled = tokio::select! {
                _ = shutdown.changed() => break,
                polled = self.poll() => polled,
            };

            match polled {
                Ok(messages) => {
                    for msg in messages {
                        debug!("Post from channel {}", msg.channel);
                        if tx.send(msg).await.is_err() {
                            info!("Message queue closed, feed stopping");
                            return Ok(());
                        }
                    }
                }
                Err(e) => {
                    warn!("Channel feed error: {:#}", e);
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(RETRY_DELAY) => {}
                    }
                }
            }
        }

        info!("Channel feed stopped");
        Ok(())
    }
}
