use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::command::actions::{Action, ActionContext};
use crate::config::SchedulerConfig;
use crate::platform::{ChatApi, OutboundMessage};

/// Destination for the messages produced by a run
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn post(&self, message: &OutboundMessage) -> Result<()>;
}

#[async_trait]
impl<T: ChatApi + ?Sized> MessageSink for T {
    async fn post(&self, message: &OutboundMessage) -> Result<()> {
        self.post_message(message).await
    }
}

/// Outcome of a repeated run
#[derive(Debug)]
pub struct RunReport {
    /// Iterations asked for, after clamping
    pub requested: u32,
    /// Iterations whose message was posted
    pub posted: u32,
    /// The failure that stopped the run early
    pub error: Option<anyhow::Error>,
}

impl RunReport {
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.posted == self.requested
    }
}

/// Runs an action a bounded number of times, one iteration after another,
/// pausing `delay` after each post.
#[derive(Debug, Clone)]
pub struct RepeatScheduler {
    delay: Duration,
    max_runs: Option<u32>,
}

impl RepeatScheduler {
    pub fn new(delay: Duration, max_runs: Option<u32>) -> Self {
        Self { delay, max_runs }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.delay(), config.max_runs)
    }

    fn clamp(&self, runs: u32) -> u32 {
        match self.max_runs {
            Some(max) if runs > max => {
                warn!("Requested {} runs, capping at {}", runs, max);
                max
            }
            _ => runs,
        }
    }

    /// Stops at the first failing action or post. Messages already posted
    /// stay posted.
    pub async fn run<S>(
        &self,
        action: &dyn Action,
        args: &[String],
        ctx: &ActionContext,
        runs: u32,
        sink: &S,
    ) -> RunReport
    where
        S: MessageSink + ?Sized,
    {
        let requested = self.clamp(runs);
        let mut report = RunReport {
            requested,
            posted: 0,
            error: None,
        };

        for iteration in 1..=requested {
            debug!("{}: iteration {}/{}", action.name(), iteration, requested);

            let message = match action.run(args, ctx).await {
                Ok(message) => message,
                Err(e) => {
                    report.error = Some(e.context(format!(
                        "{} failed on iteration {}/{}",
                        action.name(),
                        iteration,
                        requested
                    )));
                    return report;
                }
            };

            if let Err(e) = sink.post(&message).await {
                report.error = Some(e.context(format!(
                    "Failed to post {} result on iteration {}/{}",
                    action.name(),
                    iteration,
                    requested
                )));
                return report;
            }
            report.posted += 1;

            tokio::time::sleep(self.delay).await;
        }

        report
    }
}
