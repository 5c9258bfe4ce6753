use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SlackConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Channel that receives authentication and workspace notifications
    #[serde(default)]
    pub channel: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneratorConfig {
    #[serde(default = "default_generator_command")]
    pub command: String,
    #[serde(default = "default_generator_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    /// Pause between two iterations of a repeated command
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// Upper bound on `-c`; unbounded when absent
    #[serde(default)]
    pub max_runs: Option<u32>,
}

fn default_api_base_url() -> String {
    "https://slack.com/api".to_string()
}

fn default_generator_command() -> String {
    "ojichat".to_string()
}

fn default_generator_timeout_secs() -> u64 {
    5
}

fn default_delay_ms() -> u64 {
    1000
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            channel: String::new(),
            api_base_url: default_api_base_url(),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            command: default_generator_command(),
            timeout_secs: default_generator_timeout_secs(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            max_runs: None,
        }
    }
}

impl GeneratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SchedulerConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Config {
    /// Load the config file if it exists, then apply `SLACK_TOKEN` and
    /// `SLACK_CHANNEL` from the environment.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config: Config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::parse("")?
        };

        config.apply_env(
            std::env::var("SLACK_TOKEN").ok(),
            std::env::var("SLACK_CHANNEL").ok(),
        );
        config.validate()?;

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML configuration")
    }

    fn apply_env(&mut self, token: Option<String>, channel: Option<String>) {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            self.slack.bot_token = token;
        }
        if let Some(channel) = channel.filter(|c| !c.is_empty()) {
            self.slack.channel = channel;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.slack.bot_token.is_empty() {
            anyhow::bail!("Missing token: set [slack] bot_token or SLACK_TOKEN");
        }
        if self.slack.channel.is_empty() {
            anyhow::bail!("Missing channel: set [slack] channel or SLACK_CHANNEL");
        }
        Ok(())
    }
}
