use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{
    analytics::{AnalyticsSink, CommandEvent},
    commands::CommandDefinition,
    sender::MessageSender,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    Message(MessageEvent),
    Unsupported { event_type: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub channel_id: String,
    pub user_id: String,
    pub text: String,
    pub ts: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

/// One matched command invocation: the bound parameters plus where the reply
/// should go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandRequest {
    pub command: String,
    pub parameters: HashMap<String, String>,
    pub channel_id: String,
    pub user_id: String,
    pub correlation_id: String,
}

impl CommandRequest {
    /// Returns the bound value of a placeholder, or the empty string when the
    /// placeholder was not bound.
    pub fn param(&self, name: &str) -> &str {
        self.parameters.get(name).map(String::as_str).unwrap_or("")
    }
}

/// Response writer scoped to the originating channel. Send failures are
/// logged, not propagated: the dispatcher never sees handler-side faults.
pub struct ResponseWriter {
    sender: Arc<dyn MessageSender>,
    channel_id: String,
    correlation_id: String,
}

impl ResponseWriter {
    pub fn new(sender: Arc<dyn MessageSender>, channel_id: &str, correlation_id: &str) -> Self {
        Self {
            sender,
            channel_id: channel_id.to_owned(),
            correlation_id: correlation_id.to_owned(),
        }
    }

    pub async fn reply(&self, text: &str) {
        if let Err(error) = self.sender.post_message(&self.channel_id, text).await {
            warn!(
                event_name = "egress.slack.reply_failed",
                channel_id = %self.channel_id,
                correlation_id = %self.correlation_id,
                error = %error,
                "failed to post reply"
            );
        }
    }
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, request: &CommandRequest, response: &ResponseWriter);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled,
    Ignored,
}

struct RegisteredCommand {
    definition: CommandDefinition,
    handler: Arc<dyn CommandHandler>,
}

/// Matches inbound message events against registered command patterns and
/// invokes the handler exactly once per match, emitting one analytics event
/// per invocation regardless of handler outcome.
pub struct CommandDispatcher {
    commands: Vec<RegisteredCommand>,
    analytics: AnalyticsSink,
    sender: Arc<dyn MessageSender>,
}

impl CommandDispatcher {
    pub fn new(analytics: AnalyticsSink, sender: Arc<dyn MessageSender>) -> Self {
        Self { commands: Vec::new(), analytics, sender }
    }

    pub fn register<H>(&mut self, definition: CommandDefinition, handler: H)
    where
        H: CommandHandler + 'static,
    {
        self.commands.push(RegisteredCommand { definition, handler: Arc::new(handler) });
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    pub async fn dispatch(&self, envelope: &SlackEnvelope, ctx: &EventContext) -> DispatchOutcome {
        let SlackEvent::Message(message) = &envelope.event else {
            return DispatchOutcome::Ignored;
        };

        for command in &self.commands {
            let Some(parameters) = command.definition.pattern.bind(&message.text) else {
                continue;
            };

            let request = CommandRequest {
                command: command.definition.pattern.raw().to_owned(),
                parameters: parameters.clone(),
                channel_id: message.channel_id.clone(),
                user_id: message.user_id.clone(),
                correlation_id: ctx.correlation_id.clone(),
            };

            self.analytics.emit(CommandEvent::received(&request.command, parameters));

            let response = ResponseWriter::new(
                Arc::clone(&self.sender),
                &message.channel_id,
                &ctx.correlation_id,
            );
            command.handler.handle(&request, &response).await;
            return DispatchOutcome::Handled;
        }

        debug!(
            correlation_id = %ctx.correlation_id,
            channel_id = %message.channel_id,
            "message matched no registered command"
        );
        DispatchOutcome::Ignored
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::{
        CommandDispatcher, CommandHandler, CommandRequest, DispatchOutcome, EventContext,
        MessageEvent, ResponseWriter, SlackEnvelope, SlackEvent,
    };
    use crate::{
        analytics::analytics_channel,
        commands::CommandDefinition,
        sender::{MessageSender, SendError},
    };

    #[derive(Default)]
    struct RecordingSender {
        posts: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        async fn post_message(&self, channel_id: &str, text: &str) -> Result<(), SendError> {
            self.posts.lock().await.push((channel_id.to_owned(), text.to_owned()));
            Ok(())
        }
    }

    struct EchoHandler;

    #[async_trait]
    impl CommandHandler for EchoHandler {
        async fn handle(&self, request: &CommandRequest, response: &ResponseWriter) {
            response.reply(request.param("message")).await;
        }
    }

    fn message_envelope(envelope_id: &str, text: &str) -> SlackEnvelope {
        SlackEnvelope {
            envelope_id: envelope_id.to_owned(),
            event: SlackEvent::Message(MessageEvent {
                channel_id: "C1".to_owned(),
                user_id: "U1".to_owned(),
                text: text.to_owned(),
                ts: "1730000000.1000".to_owned(),
            }),
        }
    }

    fn query_definition() -> CommandDefinition {
        CommandDefinition::new(
            "query for bot - <message>",
            "send any question to wolfram",
            "what is the fastest car on the planet",
        )
        .expect("definition")
    }

    #[tokio::test]
    async fn matched_message_invokes_handler_with_bound_parameter() {
        let (sink, mut events) = analytics_channel();
        let sender = Arc::new(RecordingSender::default());
        let mut dispatcher = CommandDispatcher::new(sink, sender.clone());
        dispatcher.register(query_definition(), EchoHandler);

        let outcome = dispatcher
            .dispatch(
                &message_envelope("env-1", "query for bot - what is the speed of light"),
                &EventContext::default(),
            )
            .await;

        assert_eq!(outcome, DispatchOutcome::Handled);
        let posts = sender.posts.lock().await;
        assert_eq!(
            posts.as_slice(),
            &[("C1".to_owned(), "what is the speed of light".to_owned())]
        );

        let event = events.try_recv().expect("one analytics event");
        assert_eq!(event.command, "query for bot - <message>");
        assert_eq!(
            event.parameters.get("message").map(String::as_str),
            Some("what is the speed of light")
        );
        assert!(events.try_recv().is_err(), "exactly one analytics event per invocation");
    }

    #[tokio::test]
    async fn one_analytics_event_even_when_reply_send_fails() {
        struct FailingSender;

        #[async_trait]
        impl MessageSender for FailingSender {
            async fn post_message(&self, _channel_id: &str, _text: &str) -> Result<(), SendError> {
                Err(SendError::Api("channel_not_found".to_owned()))
            }
        }

        let (sink, mut events) = analytics_channel();
        let mut dispatcher = CommandDispatcher::new(sink, Arc::new(FailingSender));
        dispatcher.register(query_definition(), EchoHandler);

        let outcome = dispatcher
            .dispatch(&message_envelope("env-2", "query for bot - hi"), &EventContext::default())
            .await;

        assert_eq!(outcome, DispatchOutcome::Handled);
        assert!(events.try_recv().is_ok());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn non_matching_message_is_ignored_without_analytics_event() {
        let (sink, mut events) = analytics_channel();
        let sender = Arc::new(RecordingSender::default());
        let mut dispatcher = CommandDispatcher::new(sink, sender.clone());
        dispatcher.register(query_definition(), EchoHandler);

        let outcome = dispatcher
            .dispatch(&message_envelope("env-3", "random channel banter"), &EventContext::default())
            .await;

        assert_eq!(outcome, DispatchOutcome::Ignored);
        assert!(sender.posts.lock().await.is_empty());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsupported_event_is_ignored() {
        let (sink, _events) = analytics_channel();
        let dispatcher = CommandDispatcher::new(sink, Arc::new(RecordingSender::default()));

        let outcome = dispatcher
            .dispatch(
                &SlackEnvelope {
                    envelope_id: "env-4".to_owned(),
                    event: SlackEvent::Unsupported { event_type: "reaction_added".to_owned() },
                },
                &EventContext::default(),
            )
            .await;

        assert_eq!(outcome, DispatchOutcome::Ignored);
    }

    #[test]
    fn request_param_defaults_to_empty_string() {
        let request = CommandRequest {
            command: "query for bot - <message>".to_owned(),
            parameters: Default::default(),
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
            correlation_id: "env-5".to_owned(),
        };
        assert_eq!(request.param("message"), "");
    }
}
