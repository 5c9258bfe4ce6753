use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use crate::config::GeneratorConfig;

/// External text generator used by the persona command
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, target: &str) -> Result<String>;
}

/// Runs the `ojichat` binary with the target name as its only argument
pub struct OjichatGenerator {
    command: String,
    timeout: Duration,
}

impl OjichatGenerator {
    pub fn new(config: &GeneratorConfig) -> Self {
        Self {
            command: config.command.clone(),
            timeout: config.timeout(),
        }
    }
}

#[async_trait]
impl TextGenerator for OjichatGenerator {
    async fn generate(&self, target: &str) -> Result<String> {
        info!("Running generator: {} {}", self.command, target);

        let child = tokio::process::Command::new(&self.command)
            .arg(target)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "timeout(cmd: '{}', args: '{}') after {:?}",
                    self.command,
                    target,
                    self.timeout
                )
            })?
            .with_context(|| format!("Failed to execute command: {}", self.command))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            anyhow::bail!("{} failed: {}", self.command, stderr.trim_end());
        }
        if !output.status.success() {
            anyhow::bail!(
                "{} exited with code {}",
                self.command,
                output.status.code().unwrap_or(-1)
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
