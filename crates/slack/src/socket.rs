use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::events::{CommandDispatcher, EventContext, SlackEnvelope};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Transport that connects nowhere and yields no envelopes. Useful for
/// configuration smoke runs where no Slack connection is wanted.
#[derive(Default)]
pub struct NoopSocketTransport;

#[async_trait]
impl SocketTransport for NoopSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _envelope_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Pumps envelopes from the socket transport into the command dispatcher.
///
/// Transient transport failures are retried with exponential backoff; when
/// the retry budget is exhausted the last error is returned so the process
/// can exit non-zero. A cleanly closed stream ends the loop without error.
pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: CommandDispatcher,
    reconnect_policy: ReconnectPolicy,
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        dispatcher: CommandDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    pub async fn start(&self) -> Result<(), TransportError> {
        let mut last_error = None;

        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "socket mode transport failed"
                    );
                    last_error = Some(transport_error);

                    if attempt < self.reconnect_policy.max_retries {
                        let delay = self.reconnect_policy.backoff(attempt);
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        let error = last_error
            .unwrap_or_else(|| TransportError::Connect("retry budget exhausted".to_owned()));
        warn!(
            max_retries = self.reconnect_policy.max_retries,
            error = %error,
            "socket mode retries exhausted; connection loop is fatal"
        );
        Err(error)
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening socket mode transport connection");
        self.transport.connect().await?;
        info!(attempt, "socket mode transport connected");

        loop {
            let Some(envelope) = self.transport.next_envelope().await? else {
                info!(attempt, "socket mode transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };

            debug!(
                event_name = "ingress.slack.envelope_received",
                envelope_id = %envelope.envelope_id,
                correlation_id = %envelope.envelope_id,
                "received slack envelope"
            );

            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    event_name = "ingress.slack.ack_failed",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    error = %error,
                    "failed to acknowledge slack envelope"
                );
            }

            let context = EventContext { correlation_id: envelope.envelope_id.clone() };
            self.dispatcher.dispatch(&envelope, &context).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::{
        NoopSocketTransport, ReconnectPolicy, SocketModeRunner, SocketTransport, TransportError,
    };
    use crate::{
        analytics::analytics_channel,
        commands::CommandDefinition,
        events::{
            CommandDispatcher, CommandHandler, CommandRequest, MessageEvent, ResponseWriter,
            SlackEnvelope, SlackEvent,
        },
        sender::{MessageSender, SendError},
    };

    #[derive(Default)]
    struct ScriptedTransport {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        connect_results: VecDeque<Result<(), TransportError>>,
        envelopes: VecDeque<Result<Option<SlackEnvelope>, TransportError>>,
        connect_attempts: usize,
        acknowledgements: Vec<String>,
    }

    impl ScriptedTransport {
        fn with_script(
            connect_results: Vec<Result<(), TransportError>>,
            envelopes: Vec<Result<Option<SlackEnvelope>, TransportError>>,
        ) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    connect_results: connect_results.into(),
                    envelopes: envelopes.into(),
                    connect_attempts: 0,
                    acknowledgements: Vec::new(),
                }),
            }
        }

        async fn connect_attempts(&self) -> usize {
            self.state.lock().await.connect_attempts
        }

        async fn acknowledgements(&self) -> Vec<String> {
            self.state.lock().await.acknowledgements.clone()
        }
    }

    #[async_trait]
    impl SocketTransport for ScriptedTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.connect_attempts += 1;
            state.connect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
            let mut state = self.state.lock().await;
            state.envelopes.pop_front().unwrap_or(Ok(None))
        }

        async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.acknowledgements.push(envelope_id.to_owned());
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingSender {
        posts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MessageSender for CountingSender {
        async fn post_message(&self, _channel_id: &str, text: &str) -> Result<(), SendError> {
            self.posts.lock().await.push(text.to_owned());
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

    fn dispatcher_with_sender(sender: Arc<CountingSender>) -> CommandDispatcher {
        let (sink, _events) = analytics_channel();
        let mut dispatcher = CommandDispatcher::new(sink, sender);
        dispatcher.register(
            CommandDefinition::new(
                "query for bot - <message>",
                "send any question to wolfram",
                "what is the fastest car on the planet",
            )
            .expect("definition"),
            EchoHandler,
        );
        dispatcher
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

    #[tokio::test]
    async fn reconnects_after_initial_connect_failure() {
        let sender = Arc::new(CountingSender::default());
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Err(TransportError::Connect("network down".to_owned())), Ok(())],
            vec![Ok(Some(message_envelope("env-1", "query for bot - hello"))), Ok(None)],
        ));

        let runner = SocketModeRunner::new(
            transport.clone(),
            dispatcher_with_sender(sender.clone()),
            ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 },
        );

        runner.start().await.expect("runner should recover after reconnect");

        assert_eq!(transport.connect_attempts().await, 2);
        assert_eq!(transport.acknowledgements().await, vec!["env-1"]);
        assert_eq!(sender.posts.lock().await.as_slice(), &["hello".to_owned()]);
    }

    #[tokio::test]
    async fn exhausted_retries_return_fatal_error() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![
                Err(TransportError::Connect("fail-1".to_owned())),
                Err(TransportError::Connect("fail-2".to_owned())),
                Err(TransportError::Connect("fail-3".to_owned())),
            ],
            vec![],
        ));

        let runner = SocketModeRunner::new(
            transport.clone(),
            dispatcher_with_sender(Arc::new(CountingSender::default())),
            ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 },
        );

        let error = runner.start().await.expect_err("exhausted retries must be fatal");
        assert_eq!(error, TransportError::Connect("fail-3".to_owned()));
        assert_eq!(transport.connect_attempts().await, 3);
    }

    #[tokio::test]
    async fn noop_transport_closes_cleanly() {
        let runner = SocketModeRunner::new(
            Arc::new(NoopSocketTransport),
            dispatcher_with_sender(Arc::new(CountingSender::default())),
            ReconnectPolicy::default(),
        );
        runner.start().await.expect("noop transport should close cleanly");
    }

    #[test]
    fn backoff_is_capped_at_max_delay() {
        let policy = ReconnectPolicy { max_retries: 10, base_delay_ms: 250, max_delay_ms: 5_000 };
        assert_eq!(policy.backoff(0).as_millis(), 250);
        assert_eq!(policy.backoff(1).as_millis(), 500);
        assert_eq!(policy.backoff(9).as_millis(), 5_000);
    }
}
