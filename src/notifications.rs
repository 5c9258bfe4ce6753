use anyhow::{Context, Result};

use crate::platform::events::{EmojiChange, Event};
use crate::platform::{Attachment, ChatApi, OutboundMessage};

const EMOJI_ATTACHMENT_COLOR: &str = "#36a64f";

/// Build the messages announcing a workspace event.
///
/// Most notices go to `announce_channel`; membership changes are announced
/// in the channel where they happened. Returns an empty list for events that
/// are not announced (including plain messages).
pub async fn render(
    event: &Event,
    api: &dyn ChatApi,
    announce_channel: &str,
) -> Result<Vec<OutboundMessage>> {
    let announce = |text: String| OutboundMessage::new(announce_channel, text);

    let messages = match event {
        Event::EmojiChanged(EmojiChange::Add { name, value }) => vec![announce(format!(":{}:", name))
            .with_attachment(Attachment {
                color: EMOJI_ATTACHMENT_COLOR.to_string(),
                title: name.clone(),
                image_url: value.clone(),
            })],
        Event::EmojiChanged(EmojiChange::Remove { names }) => names
            .iter()
            .map(|name| announce(format!(":{}: has been removed", name)))
            .collect(),
        Event::ChannelArchive { channel, user } => {
            let (channel, user) = channel_and_user(api, channel, user).await?;
            vec![announce(format!(
                ":skull: channel(#{}) has been archived by @{}",
                channel, user
            ))]
        }
        Event::ChannelUnarchive { channel, user } => {
            let (channel, user) = channel_and_user(api, channel, user).await?;
            vec![announce(format!(
                ":zombie: channel(#{}) has been unarchived by @{}",
                channel, user
            ))]
        }
        Event::ChannelCreated { channel } => {
            let creator_id = channel
                .creator
                .as_deref()
                .with_context(|| format!("channel #{} has no creator", channel.name))?;
            let creator = api.user_info(creator_id).await?;
            vec![announce(format!(
                ":baby: channel created. #{} by @{}",
                channel.name, creator.name
            ))]
        }
        Event::ChannelDeleted { channel } => vec![announce(format!(
            ":cop: channel(id: {}) has been *deleted* by *admin*",
            channel
        ))],
        Event::ChannelRename { channel } => vec![announce(format!(
            ":writing_hand: one channel has been renamed to #{}",
            channel.name
        ))],
        Event::MemberJoinedChannel { user, channel } => {
            let user = api.user_info(user).await?;
            vec![OutboundMessage::new(
                channel.as_str(),
                format!(":+1: Welcome @{}", user.name),
            )]
        }
        Event::MemberLeftChannel { user, channel } => {
            let info = api.channel_info(channel).await?;
            let (creator, target) =
                tokio::try_join!(api.user_info(&info.creator), api.user_info(user))?;
            vec![OutboundMessage::new(
                channel.as_str(),
                format!(
                    ":loudspeaker: @{} 抜け忍を検知 => @{}",
                    creator.name, target.name
                ),
            )]
        }
        Event::FileCreated { file } => vec![announce(format!(
            ":page_facing_up: a file has been uploaded (id: {})",
            file.id
        ))],
        Event::EmojiChanged(EmojiChange::Other) | Event::Message(_) | Event::Other => Vec::new(),
    };

    Ok(messages)
}

async fn channel_and_user(
    api: &dyn ChatApi,
    channel_id: &str,
    user_id: &str,
) -> Result<(String, String)> {
    let (channel, user) = tokio::join!(api.channel_info(channel_id), api.user_info(user_id));
    match (channel, user) {
        (Ok(channel), Ok(user)) => Ok((channel.name, user.name)),
        (Ok(_), Err(_)) => anyhow::bail!("Cannot find user: {}", user_id),
        (Err(_), Ok(_)) => anyhow::bail!("Cannot find channel: {}", channel_id),
        (Err(_), Err(_)) => anyhow::bail!(
            "Cannot find user: {} and channel: {}",
            user_id,
            channel_id
        ),
    }
}

/// Text of the announcement posted after authenticating
pub fn hello(bot_name: &str, version: &str) -> String {
    format!(":information_source: {}(version {})", bot_name, version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::actions::testing::FakeApi;
    use crate::platform::events::{ChannelRef, FileRef, MessageEvent};

    fn api() -> FakeApi {
        FakeApi::default()
            .with_user("U1", "taro")
            .with_user("U2", "hanako")
            .with_channel("C1", "random", "U1", &["U1", "U2"])
    }

    async fn texts(event: Event) -> Vec<String> {
        render(&event, &api(), "CANNOUNCE")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.text)
            .collect()
    }

    #[tokio::test]
    async fn test_emoji_add_has_attachment() {
        let event = Event::EmojiChanged(EmojiChange::Add {
            name: "party".to_string(),
            value: "https://emoji/party.png".to_string(),
        });
        let messages = render(&event, &api(), "CANNOUNCE").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, ":party:");
        assert_eq!(messages[0].channel, "CANNOUNCE");
        assert_eq!(messages[0].attachments[0].image_url, "https://emoji/party.png");
        assert_eq!(messages[0].attachments[0].color, "#36a64f");
    }

    #[tokio::test]
    async fn test_emoji_remove_one_message_per_name() {
        let event = Event::EmojiChanged(EmojiChange::Remove {
            names: vec!["a".to_string(), "b".to_string()],
        });
        assert_eq!(
            texts(event).await,
            vec![":a: has been removed", ":b: has been removed"]
        );
    }

    #[tokio::test]
    async fn test_channel_archive_and_unarchive() {
        let archive = Event::ChannelArchive {
            channel: "C1".to_string(),
            user: "U2".to_string(),
        };
        assert_eq!(
            texts(archive).await,
            vec![":skull: channel(#random) has been archived by @hanako"]
        );

        let unarchive = Event::ChannelUnarchive {
            channel: "C1".to_string(),
            user: "U1".to_string(),
        };
        assert_eq!(
            texts(unarchive).await,
            vec![":zombie: channel(#random) has been unarchived by @taro"]
        );
    }

    #[tokio::test]
    async fn test_archive_lookup_failures() {
        let event = Event::ChannelArchive {
            channel: "C1".to_string(),
            user: "U404".to_string(),
        };
        let err = render(&event, &api(), "CANNOUNCE").await.unwrap_err();
        assert_eq!(err.to_string(), "Cannot find user: U404");

        let event = Event::ChannelArchive {
            channel: "C404".to_string(),
            user: "U404".to_string(),
        };
        let err = render(&event, &api(), "CANNOUNCE").await.unwrap_err();
        assert_eq!(err.to_string(), "Cannot find user: U404 and channel: C404");
    }

    #[tokio::test]
    async fn test_channel_created_names_creator() {
        let event = Event::ChannelCreated {
            channel: ChannelRef {
                id: "C2".to_string(),
                name: "new-room".to_string(),
                creator: Some("U1".to_string()),
            },
        };
        assert_eq!(
            texts(event).await,
            vec![":baby: channel created. #new-room by @taro"]
        );
    }

    #[tokio::test]
    async fn test_deleted_and_renamed() {
        let deleted = Event::ChannelDeleted {
            channel: "C9".to_string(),
        };
        assert_eq!(
            texts(deleted).await,
            vec![":cop: channel(id: C9) has been *deleted* by *admin*"]
        );

        let renamed = Event::ChannelRename {
            channel: ChannelRef {
                id: "C1".to_string(),
                name: "chatter".to_string(),
                creator: None,
            },
        };
        assert_eq!(
            texts(renamed).await,
            vec![":writing_hand: one channel has been renamed to #chatter"]
        );
    }

    #[tokio::test]
    async fn test_membership_posts_in_that_channel() {
        let joined = Event::MemberJoinedChannel {
            user: "U2".to_string(),
            channel: "C1".to_string(),
        };
        let messages = render(&joined, &api(), "CANNOUNCE").await.unwrap();
        assert_eq!(messages[0].text, ":+1: Welcome @hanako");
        assert_eq!(messages[0].channel, "C1");

        let left = Event::MemberLeftChannel {
            user: "U2".to_string(),
            channel: "C1".to_string(),
        };
        let messages = render(&left, &api(), "CANNOUNCE").await.unwrap();
        assert_eq!(messages[0].text, ":loudspeaker: @taro 抜け忍を検知 => @hanako");
        assert_eq!(messages[0].channel, "C1");
    }

    #[tokio::test]
    async fn test_file_created() {
        let event = Event::FileCreated {
            file: FileRef {
                id: "F123".to_string(),
            },
        };
        assert_eq!(
            texts(event).await,
            vec![":page_facing_up: a file has been uploaded (id: F123)"]
        );
    }

    #[tokio::test]
    async fn test_unannounced_events() {
        let message = Event::Message(MessageEvent {
            subtype: None,
            user: Some("U1".to_string()),
            channel: Some("C1".to_string()),
            text: Some("hi".to_string()),
        });
        assert!(texts(message).await.is_empty());
        assert!(texts(Event::Other).await.is_empty());
    }

    #[test]
    fn test_hello() {
        assert_eq!(hello("fbot", "0.1.0"), ":information_source: fbot(version 0.1.0)");
    }
}
