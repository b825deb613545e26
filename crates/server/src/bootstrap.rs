use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use askwolf_agent::{QueryPipeline, SpokenAnswerClient, WitClient};
use askwolf_core::config::{AppConfig, ConfigError, LoadOptions};
use askwolf_slack::{
    analytics::{analytics_channel, AnalyticsSink, CommandEvent},
    commands::{CommandDefinition, PatternError},
    events::CommandDispatcher,
    sender::HttpMessageSender,
    socket::{NoopSocketTransport, ReconnectPolicy, SocketModeRunner},
};
use tokio::sync::mpsc;

use crate::handler::AskCommandHandler;

pub const QUERY_COMMAND_PATTERN: &str = "query for bot - <message>";
pub const QUERY_COMMAND_DESCRIPTION: &str = "send any question to wolfram";
pub const QUERY_COMMAND_EXAMPLE: &str = "what is the fastest car on the planet";

pub struct Application {
    pub config: AppConfig,
    pub slack_runner: SocketModeRunner,
    pub analytics_events: mpsc::UnboundedReceiver<CommandEvent>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Command(#[from] PatternError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Composition root: every adapter is constructed here and injected
/// explicitly; nothing module-global survives past this function.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let (analytics_sink, analytics_events): (AnalyticsSink, _) = analytics_channel();

    let sender =
        Arc::new(HttpMessageSender::new(&config.slack.base_url, config.slack.bot_token.clone()));
    let pipeline = Arc::new(QueryPipeline::new(
        Arc::new(WitClient::from_config(&config.wit)),
        Arc::new(SpokenAnswerClient::from_config(&config.wolfram)),
        config.bot.reply_policy,
    ));

    let mut dispatcher = CommandDispatcher::new(analytics_sink, sender);
    dispatcher.register(
        CommandDefinition::new(
            QUERY_COMMAND_PATTERN,
            QUERY_COMMAND_DESCRIPTION,
            QUERY_COMMAND_EXAMPLE,
        )?,
        AskCommandHandler::new(pipeline),
    );

    info!(
        event_name = "system.bootstrap.commands_registered",
        correlation_id = "bootstrap",
        command = QUERY_COMMAND_PATTERN,
        "command dispatcher configured"
    );

    // Socket-mode transport seam: the noop transport stands in until a
    // WebSocket transport is wired behind `SocketTransport`.
    let slack_runner = SocketModeRunner::new(
        Arc::new(NoopSocketTransport),
        dispatcher,
        ReconnectPolicy::default(),
    );

    Ok(Application { config, slack_runner, analytics_events })
}
