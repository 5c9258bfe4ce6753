pub mod events;
pub mod slack;

use std::sync::OnceLock;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A plain user message received from the event stream
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Platform user ID of the author
    pub user_id: String,
    /// Channel the message was posted in
    pub channel_id: String,
    /// The message text
    pub text: String,
}

/// A message to be posted with `chat.postMessage`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    pub text: String,
    pub channel: String,
    pub as_user: bool,
    pub link_names: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_emoji: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl OutboundMessage {
    /// A message posted as the bot user itself, with `@name` linking enabled
    pub fn new(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            channel: channel.into(),
            as_user: true,
            link_names: true,
            username: None,
            icon_emoji: None,
            attachments: Vec::new(),
        }
    }

    /// Post under a different display name and icon
    pub fn with_persona(mut self, username: &str, icon_emoji: &str) -> Self {
        self.as_user = false;
        self.username = Some(username.to_string());
        self.icon_emoji = Some(icon_emoji.to_string());
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attachment {
    pub color: String,
    pub title: String,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[allow(dead_code)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[allow(dead_code)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub creator: String,
    #[serde(default)]
    pub members: Vec<String>,
}

/// The bot's own identity, as reported by the authentication handshake
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SelfInfo {
    pub id: String,
    pub name: String,
}

/// Write-once holder for the bot's identity.
///
/// Published once after authentication; reads before that return `None`.
#[derive(Debug, Default)]
pub struct SelfIdentity {
    inner: OnceLock<SelfInfo>,
}

impl SelfIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the identity. Returns false if it was already set; the first
    /// value is kept.
    pub fn publish(&self, info: SelfInfo) -> bool {
        self.inner.set(info).is_ok()
    }

    pub fn get(&self) -> Option<&SelfInfo> {
        self.inner.get()
    }

    pub fn require(&self) -> Result<&SelfInfo> {
        self.get()
            .ok_or_else(|| anyhow::anyhow!("Bot identity is not ready yet"))
    }
}

/// Web API operations the bot needs from the chat platform
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn channel_info(&self, channel_id: &str) -> Result<ChannelInfo>;

    async fn user_info(&self, user_id: &str) -> Result<UserInfo>;

    async fn post_message(&self, message: &OutboundMessage) -> Result<()>;
}
