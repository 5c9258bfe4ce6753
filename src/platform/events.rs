use anyhow::{Context, Result};
use serde::Deserialize;

use crate::platform::IncomingMessage;

/// RTM events the bot reacts to. Everything else lands in `Other`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Message(MessageEvent),
    ChannelArchive {
        channel: String,
        user: String,
    },
    ChannelCreated {
        channel: ChannelRef,
    },
    ChannelDeleted {
        channel: String,
    },
    ChannelRename {
        channel: ChannelRef,
    },
    ChannelUnarchive {
        channel: String,
        user: String,
    },
    EmojiChanged(EmojiChange),
    MemberJoinedChannel {
        user: String,
        channel: String,
    },
    MemberLeftChannel {
        user: String,
        channel: String,
    },
    FileCreated {
        file: FileRef,
    },
    #[serde(other)]
    Other,
}

impl Event {
    /// Short name used in log spans
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Message(_) => "message",
            Event::ChannelArchive { .. } => "channel_archive",
            Event::ChannelCreated { .. } => "channel_created",
            Event::ChannelDeleted { .. } => "channel_deleted",
            Event::ChannelRename { .. } => "channel_rename",
            Event::ChannelUnarchive { .. } => "channel_unarchive",
            Event::EmojiChanged(_) => "emoji_changed",
            Event::MemberJoinedChannel { .. } => "member_joined_channel",
            Event::MemberLeftChannel { .. } => "member_left_channel",
            Event::FileCreated { .. } => "file_created",
            Event::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageEvent {
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl MessageEvent {
    /// Returns the message if it was typed by a user. Edits, joins, bot
    /// posts and other system messages carry a subtype and are skipped.
    pub fn into_user_message(self) -> Option<IncomingMessage> {
        if self.subtype.is_some() {
            return None;
        }
        Some(IncomingMessage {
            user_id: self.user?,
            channel_id: self.channel?,
            text: self.text?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[allow(dead_code)]
pub struct ChannelRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub creator: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FileRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum EmojiChange {
    Add {
        name: String,
        value: String,
    },
    Remove {
        names: Vec<String>,
    },
    #[serde(other)]
    Other,
}

/// Decode one RTM frame
pub fn parse_event(frame: &str) -> Result<Event> {
    serde_json::from_str(frame).context("Malformed event payload")
}
