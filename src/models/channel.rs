use serde::{Deserialize, Serialize};
use std::fmt;

/// Short identifier of a monitored signal channel (e.g. `A`, `B`).
///
/// Channels come from configuration, so the set is open-ended; the id is
/// upper-cased on construction and used verbatim as the trade-id prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        ChannelId::new(s)
    }
}

impl From<String> for ChannelId {
    fn from(s: String) -> Self {
        ChannelId::new(s)
    }
}

impl From<ChannelId> for String {
    fn from(id: ChannelId) -> Self {
        id.0
    }
}

/// One event delivered by a channel feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub channel: ChannelId,
    pub text: String,
    pub has_image: bool,
}

impl InboundMessage {
    pub fn text(channel: impl Into<ChannelId>, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            text: text.into(),
            has_image: false,
        }
    }

    /// Photo posts without a caption carry no parseable text.
    pub fn is_image_only(&self) -> bool {
        self.has_image && self.text.trim().is_empty()
    }
}
