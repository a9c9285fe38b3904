pub mod telegram;

pub use telegram::TelegramFeed;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{mpsc, watch};

use crate::config::Config;
use crate::models::{ChannelId, InboundMessage};

/// Source of channel messages. Runs until shutdown is signalled or the
/// receiving side goes away.
#[async_trait]
pub trait Feed: Send {
    async fn run(
        &mut self,
        tx: mpsc::Sender<InboundMessage>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<()>;
}

/// Maps a source chat (by `@username` or numeric id) to the configured channel.
#[derive(Debug, Clone, Default)]
pub struct ChannelRoutes {
    by_username: HashMap<String, ChannelId>,
    by_chat_id: HashMap<i64, ChannelId>,
}

impl ChannelRoutes {
    pub fn from_config(cfg: &Config) -> Self {
        let mut routes = Self::default();
        for channel in cfg.enabled_channels() {
            routes.add(&channel.source, channel.id.clone());
        }
        routes
    }

    pub fn add(&mut self, source: &str, channel: ChannelId) {
        let source = source.trim();
        match source.parse::<i64>() {
            Ok(id) => {
                self.by_chat_id.insert(id, channel);
            }
            Err(_) => {
                let name = source.trim_start_matches('@').to_lowercase();
                self.by_username.insert(name, channel);
            }
        }
    }

    pub fn resolve(&self, username: Option<&str>, chat_id: i64) -> Option<&ChannelId> {
        self.by_chat_id.get(&chat_id).or_else(|| {
            username.and_then(|u| self.by_username.get(&u.trim_start_matches('@').to_lowercase()))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.by_username.is_empty() && self.by_chat_id.is_empty()
    }
}
