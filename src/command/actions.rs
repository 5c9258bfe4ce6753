use std::sync::{Arc, LazyLock};

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use regex::Regex;
use tracing::debug;

use crate::generator::TextGenerator;
use crate::platform::{
    ChannelInfo, ChatApi, IncomingMessage, OutboundMessage, SelfIdentity, UserInfo,
};

static USER_MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<@([UW][A-Z0-9]{8,})(?:\|[^>]*)?>").expect("valid mention pattern")
});

/// Everything an action may touch: the message that triggered it and the
/// platform collaborators.
#[derive(Clone)]
pub struct ActionContext {
    pub message: IncomingMessage,
    pub api: Arc<dyn ChatApi>,
    pub generator: Arc<dyn TextGenerator>,
    pub identity: Arc<SelfIdentity>,
}

impl ActionContext {
    /// A reply posted in the channel the command came from
    fn reply(&self, text: impl Into<String>) -> OutboundMessage {
        OutboundMessage::new(self.message.channel_id.clone(), text)
    }
}

/// A command handler producing one outbound message per invocation
#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> &'static str;

    /// Argument synopsis shown by `help`, e.g. `ojichat [@target/me]`
    fn usage(&self) -> &'static str {
        self.name()
    }

    fn description(&self) -> &'static str;

    async fn run(&self, args: &[String], ctx: &ActionContext) -> Result<OutboundMessage>;
}

// ── ojichat ────────────────────────────────────────────────────────────────

/// Feeds a channel member's name to the generator and posts the result under
/// the persona's name.
pub struct OjichatAction;

const PERSONA_NAME: &str = "おぢさん";
const PERSONA_ICON: &str = ":brain:";

pub(crate) fn mentioned_user(arg: &str) -> Option<&str> {
    USER_MENTION
        .captures(arg)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Random channel member other than the bot
fn random_member<'a>(channel: &'a ChannelInfo, self_id: &str) -> Option<&'a str> {
    let candidates: Vec<&str> = channel
        .members
        .iter()
        .map(String::as_str)
        .filter(|m| *m != self_id)
        .collect();
    candidates.choose(&mut rand::thread_rng()).copied()
}

async fn resolve_target(
    target: Option<&str>,
    channel: &ChannelInfo,
    ctx: &ActionContext,
) -> Result<UserInfo> {
    let user_id = if let Some(id) = target.and_then(mentioned_user) {
        id.to_string()
    } else if target == Some("me") {
        ctx.message.user_id.clone()
    } else {
        let me = ctx.identity.require()?;
        random_member(channel, &me.id)
            .with_context(|| format!("No one to pick in channel #{}", channel.name))?
            .to_string()
    };
    debug!("ojichat target: {}", user_id);
    ctx.api
        .user_info(&user_id)
        .await
        .context("failed to fetch user info")
}

pub(crate) fn decorate(generated: &str, name: &str) -> String {
    let text = if name.is_empty() {
        generated.to_string()
    } else {
        generated.replacen(name, &format!(" @{} ", name), 1)
    };
    text.replacen('裸', "<CENSORED #8>", 1)
}

#[async_trait]
impl Action for OjichatAction {
    fn name(&self) -> &'static str {
        "ojichat"
    }

    fn usage(&self) -> &'static str {
        "ojichat [@target/me]"
    }

    fn description(&self) -> &'static str {
        "call ojichat:heart: for random/@target/you"
    }

    async fn run(&self, args: &[String], ctx: &ActionContext) -> Result<OutboundMessage> {
        let channel = ctx.api.channel_info(&ctx.message.channel_id).await?;
        let user = resolve_target(args.first().map(String::as_str), &channel, ctx).await?;
        let generated = ctx.generator.generate(&user.name).await?;
        Ok(ctx
            .reply(decorate(&generated, &user.name))
            .with_persona(PERSONA_NAME, PERSONA_ICON))
    }
}

// ── stats ──────────────────────────────────────────────────────────────────

pub struct StatsAction;

fn format_created(created: i64) -> String {
    chrono::DateTime::from_timestamp(created, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[async_trait]
impl Action for StatsAction {
    fn name(&self) -> &'static str {
        "stats"
    }

    fn description(&self) -> &'static str {
        "show statistics of this channel"
    }

    async fn run(&self, _args: &[String], ctx: &ActionContext) -> Result<OutboundMessage> {
        let channel = ctx.api.channel_info(&ctx.message.channel_id).await?;
        let creator = if channel.creator.is_empty() {
            "unknown".to_string()
        } else {
            let user = ctx.api.user_info(&channel.creator).await?;
            format!("@{}", user.name)
        };
        let text = format!(
            ":bar_chart: #{}\n  members: {}\n  created: {} by {}",
            channel.name,
            channel.members.len(),
            format_created(channel.created),
            creator
        );
        Ok(ctx.reply(text))
    }
}

// ── version ────────────────────────────────────────────────────────────────

pub struct VersionAction;

#[async_trait]
impl Action for VersionAction {
    fn name(&self) -> &'static str {
        "version"
    }

    fn description(&self) -> &'static str {
        "show version"
    }

    async fn run(&self, _args: &[String], ctx: &ActionContext) -> Result<OutboundMessage> {
        Ok(ctx.reply(env!("CARGO_PKG_VERSION")))
    }
}

// ── help ───────────────────────────────────────────────────────────────────

/// Lists the commands registered in the table, plus the passive skills
pub struct HelpAction {
    text: String,
}

impl HelpAction {
    pub fn new<'a>(actions: impl IntoIterator<Item = &'a dyn Action>) -> Self {
        let mut lines = vec!["active skills:".to_string()];
        for action in actions {
            lines.push(format!("  $ {}\t{}", action.usage(), action.description()));
        }
        lines.push("  $ help\tshow this message".to_string());
        lines.push("passive skills:".to_string());
        lines.push("  - notify emoji event".to_string());
        lines.push("  - notify channel event".to_string());
        Self {
            text: lines.join("\n"),
        }
    }
}

#[async_trait]
impl Action for HelpAction {
    fn name(&self) -> &'static str {
        "help"
    }

    fn description(&self) -> &'static str {
        "show this message"
    }

    async fn run(&self, _args: &[String], ctx: &ActionContext) -> Result<OutboundMessage> {
        Ok(ctx.reply(self.text.clone()))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn api() -> Arc<FakeApi> {
        Arc::new(
            FakeApi::default()
                .with_user("UAUTHOR01", "taro")
                .with_user("UHANAKO01", "hanako")
                .with_user("UBOT00001", "fbot")
                .with_channel("C1", "random", "UAUTHOR01", &["UAUTHOR01", "UBOT00001"]),
        )
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_mentioned_user() {
        assert_eq!(mentioned_user("<@U01234567>"), Some("U01234567"));
        assert_eq!(mentioned_user("<@U0123456789|taro>"), Some("U0123456789"));
        assert_eq!(mentioned_user("me"), None);
        assert_eq!(mentioned_user("<@U123>"), None);
    }

    #[test]
    fn test_decorate_links_name_and_censors() {
        assert_eq!(
            decorate("taroチャン、裸で寝てるのかな？裸", "taro"),
            " @taro チャン、<CENSORED #8>で寝てるのかな？裸"
        );
        assert_eq!(decorate("hello", ""), "hello");
    }

    #[tokio::test]
    async fn test_ojichat_me_targets_author() {
        let ctx = context(api(), "UAUTHOR01", "C1");
        let msg = OjichatAction.run(&args(&["me"]), &ctx).await.unwrap();
        assert!(msg.text.starts_with(" @taro チャン"));
        assert_eq!(msg.channel, "C1");
        assert!(!msg.as_user);
        assert_eq!(msg.username.as_deref(), Some("おぢさん"));
        assert_eq!(msg.icon_emoji.as_deref(), Some(":brain:"));
    }

    #[tokio::test]
    async fn test_ojichat_mention_targets_user() {
        let ctx = context(api(), "UAUTHOR01", "C1");
        let msg = OjichatAction
            .run(&args(&["<@UHANAKO01>"]), &ctx)
            .await
            .unwrap();
        assert!(msg.text.contains("@hanako"));
    }

    #[tokio::test]
    async fn test_ojichat_random_never_picks_bot() {
        let ctx = context(api(), "UAUTHOR01", "C1");
        for _ in 0..10 {
            let msg = OjichatAction.run(&args(&["rand"]), &ctx).await.unwrap();
            assert!(msg.text.contains("@taro"));
        }
    }

    #[tokio::test]
    async fn test_ojichat_random_requires_identity() {
        let mut ctx = context(api(), "UAUTHOR01", "C1");
        ctx.identity = Arc::new(SelfIdentity::new());
        let err = OjichatAction.run(&[], &ctx).await.unwrap_err();
        assert!(err.to_string().contains("not ready"));
    }

    #[tokio::test]
    async fn test_ojichat_unknown_channel_fails() {
        let ctx = context(api(), "UAUTHOR01", "C404");
        assert!(OjichatAction.run(&args(&["me"]), &ctx).await.is_err());
    }

    #[tokio::test]
    async fn test_ojichat_unknown_user_fails() {
        let ctx = context(api(), "UAUTHOR01", "C1");
        let err = OjichatAction
            .run(&args(&["<@UNOBODY001>"]), &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to fetch user info"));
    }

    #[tokio::test]
    async fn test_stats_reports_channel() {
        let ctx = context(api(), "UAUTHOR01", "C1");
        let msg = StatsAction.run(&[], &ctx).await.unwrap();
        assert_eq!(
            msg.text,
            ":bar_chart: #random\n  members: 2\n  created: 2019-01-01 by @taro"
        );
        assert!(msg.as_user);
    }

    #[tokio::test]
    async fn test_version_reports_crate_version() {
        let ctx = context(api(), "UAUTHOR01", "C1");
        let msg = VersionAction.run(&[], &ctx).await.unwrap();
        assert_eq!(msg.text, env!("CARGO_PKG_VERSION"));
        assert_eq!(msg.channel, "C1");
    }

    #[tokio::test]
    async fn test_help_lists_actions() {
        let help = HelpAction::new([&OjichatAction as &dyn Action, &VersionAction as &dyn Action]);
        let ctx = context(api(), "UAUTHOR01", "C1");
        let msg = help.run(&[], &ctx).await.unwrap();
        assert!(msg.text.starts_with("active skills:"));
        assert!(msg.text.contains("$ ojichat [@target/me]"));
        assert!(msg.text.contains("$ version\tshow version"));
        assert!(msg.text.contains("$ help\tshow this message"));
        assert!(msg.text.contains("passive skills:"));
    }
}
