use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::command::actions::ActionContext;
use crate::command::table::CommandTable;
use crate::command::{self, Command};
use crate::config::Config;
use crate::generator::TextGenerator;
use crate::notifications;
use crate::platform::events::Event;
use crate::platform::slack::{self, SlackClient};
use crate::platform::{ChatApi, IncomingMessage, OutboundMessage, SelfIdentity, SelfInfo};
use crate::scheduler::{RepeatScheduler, RunReport};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const EVENT_BUFFER: usize = 100;

/// Shared application state
pub struct AppState {
    config: Config,
    api: Arc<dyn ChatApi>,
    generator: Arc<dyn TextGenerator>,
    identity: Arc<SelfIdentity>,
    commands: CommandTable,
    scheduler: RepeatScheduler,
}

impl AppState {
    pub fn new(config: Config, api: Arc<dyn ChatApi>, generator: Arc<dyn TextGenerator>) -> Self {
        let scheduler = RepeatScheduler::from_config(&config.scheduler);
        let commands = CommandTable::new();
        info!(
            "Commands: {}",
            commands.names().collect::<Vec<_>>().join(", ")
        );
        Self {
            config,
            api,
            generator,
            identity: Arc::new(SelfIdentity::new()),
            commands,
            scheduler,
        }
    }
}

/// Connect to the RTM stream and route events until the process stops.
/// A dropped connection is re-established after a short pause.
pub async fn run(state: Arc<AppState>, client: Arc<SlackClient>) -> Result<()> {
    info!("Starting Slack RTM client...");

    loop {
        match client.rtm_connect().await {
            Ok(session) => {
                on_authenticated(&state, session.self_info).await;

                let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
                let url = session.url;
                let listener = tokio::spawn(async move { slack::listen(&url, tx).await });

                while let Some(event) = rx.recv().await {
                    route_event(&state, event);
                }

                match listener.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!("RTM listener failed: {:#}", e),
                    Err(e) => error!("RTM listener task panicked: {}", e),
                }
            }
            Err(e) => error!("rtm.connect failed: {:#}", e),
        }

        warn!("Disconnected, reconnecting in {:?}", RECONNECT_DELAY);
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

async fn on_authenticated(state: &AppState, me: SelfInfo) {
    let span = info_span!("event", kind = "authenticated");
    async {
        info!("Authenticated as {} ({})", me.name, me.id);
        if !state.identity.publish(me.clone()) {
            debug!("Bot identity already published");
        }

        let text = notifications::hello(&me.name, env!("CARGO_PKG_VERSION"));
        let msg = OutboundMessage::new(state.config.slack.channel.as_str(), text);
        if let Err(e) = state.api.post_message(&msg).await {
            error!("Failed to announce startup: {:#}", e);
        }
    }
    .instrument(span)
    .await
}

/// Hand one event to its own task so the stream is never blocked
fn route_event(state: &Arc<AppState>, event: Event) {
    let span = info_span!("event", kind = event.kind());
    match event {
        Event::Message(msg) => match msg.into_user_message() {
            Some(incoming) => {
                let state = Arc::clone(state);
                tokio::spawn(
                    async move {
                        handle_message(&state, incoming).await;
                    }
                    .instrument(span),
                );
            }
            None => debug!(parent: &span, "Ignoring system message"),
        },
        Event::Other => {}
        event => {
            let state = Arc::clone(state);
            tokio::spawn(
                async move {
                    notify(&state, &event).await;
                }
                .instrument(span),
            );
        }
    }
}

/// Run the command pipeline for one message. Returns `None` when the message
/// is not a command.
pub async fn handle_message(state: &AppState, incoming: IncomingMessage) -> Option<RunReport> {
    info!(
        "Message from {} in {}: {}",
        incoming.user_id, incoming.channel_id, incoming.text
    );

    let parsed = command::parse(&incoming.text);
    debug!(is_cmd = parsed.is_cmd(), "Parsed message");
    let cmd = match parsed {
        Command::Valid(cmd) => cmd,
        Command::Invalid { input } => {
            debug!("not cmd message: {}", input);
            return None;
        }
    };
    info!(cmd = %cmd.cmd, args = ?cmd.args, runs = cmd.runs, "Parsed command");

    let action = state.commands.resolve(&cmd.cmd);
    let ctx = ActionContext {
        message: incoming,
        api: Arc::clone(&state.api),
        generator: Arc::clone(&state.generator),
        identity: Arc::clone(&state.identity),
    };

    let report = state
        .scheduler
        .run(action.as_ref(), &cmd.args, &ctx, cmd.runs, state.api.as_ref())
        .await;

    match &report.error {
        Some(e) => error!(
            "Command '{}' stopped after {}/{} posts: {:#}",
            cmd.cmd, report.posted, report.requested, e
        ),
        None => info!("Command '{}' posted {} message(s)", cmd.cmd, report.posted),
    }

    Some(report)
}

async fn notify(state: &AppState, event: &Event) {
    let messages =
        match notifications::render(event, state.api.as_ref(), &state.config.slack.channel).await {
            Ok(messages) => messages,
            Err(e) => {
                error!("Failed to build notification: {:#}", e);
                return;
            }
        };

    for msg in messages {
        match state.api.post_message(&msg).await {
            Ok(()) => info!("Posted notification to {}", msg.channel),
            Err(e) => error!("Failed to post notification: {:#}", e),
        }
    }
}
