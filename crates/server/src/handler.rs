use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use askwolf_agent::QueryPipeline;
use askwolf_slack::events::{CommandHandler, CommandRequest, ResponseWriter};

/// Handler behind `query for bot - <message>`: runs the question pipeline and
/// sends exactly one reply per invocation.
pub struct AskCommandHandler {
    pipeline: Arc<QueryPipeline>,
}

impl AskCommandHandler {
    pub fn new(pipeline: Arc<QueryPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl CommandHandler for AskCommandHandler {
    async fn handle(&self, request: &CommandRequest, response: &ResponseWriter) {
        let question = request.param("message");
        let outcome = self.pipeline.answer_question(question).await;

        info!(
            event_name = "bot.question_answered",
            correlation_id = %request.correlation_id,
            channel_id = %request.channel_id,
            question = %question,
            extracted_query = %outcome.extracted_query,
            degraded = outcome.degraded(),
            "question pipeline completed"
        );

        response.reply(&outcome.reply).await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use askwolf_agent::{
        extract::SEARCH_QUERY_ENTITY, AnswerClient, AnswerError, NluClient, NluError,
        QueryPipeline,
    };
    use askwolf_core::config::ReplyPolicy;
    use askwolf_slack::{
        events::{CommandHandler, CommandRequest, ResponseWriter},
        sender::{MessageSender, SendError},
    };

    use super::AskCommandHandler;

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

    struct FixedNlu;

    #[async_trait]
    impl NluClient for FixedNlu {
        async fn parse_message(&self, _text: &str) -> Result<serde_json::Value, NluError> {
            Ok(serde_json::json!({
                "entities": {
                    SEARCH_QUERY_ENTITY: [{ "confidence": 0.99, "value": "speed of light" }]
                }
            }))
        }
    }

    struct FailingNlu;

    #[async_trait]
    impl NluClient for FailingNlu {
        async fn parse_message(&self, _text: &str) -> Result<serde_json::Value, NluError> {
            Err(NluError::Status { status: 500 })
        }
    }

    struct FixedAnswers;

    #[async_trait]
    impl AnswerClient for FixedAnswers {
        async fn spoken_answer(&self, query: &str) -> Result<String, AnswerError> {
            Ok(format!("About {query}: roughly 300 thousand kilometers per second"))
        }
    }

    struct FailingAnswers;

    #[async_trait]
    impl AnswerClient for FailingAnswers {
        async fn spoken_answer(&self, _query: &str) -> Result<String, AnswerError> {
            Err(AnswerError::Status { status: 503 })
        }
    }

    fn request(question: &str) -> CommandRequest {
        let mut parameters = HashMap::new();
        parameters.insert("message".to_owned(), question.to_owned());
        CommandRequest {
            command: "query for bot - <message>".to_owned(),
            parameters,
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
            correlation_id: "env-1".to_owned(),
        }
    }

    #[tokio::test]
    async fn sends_exactly_one_reply_on_success() {
        let sender = Arc::new(RecordingSender::default());
        let handler = AskCommandHandler::new(Arc::new(QueryPipeline::new(
            Arc::new(FixedNlu),
            Arc::new(FixedAnswers),
            ReplyPolicy::FailOpen,
        )));
        let response = ResponseWriter::new(sender.clone(), "C1", "env-1");

        handler.handle(&request("what is the speed of light"), &response).await;

        let posts = sender.posts.lock().await;
        assert_eq!(posts.len(), 1);
        assert!(posts[0].1.contains("speed of light"));
    }

    #[tokio::test]
    async fn sends_exactly_one_empty_reply_when_both_upstreams_fail_open() {
        let sender = Arc::new(RecordingSender::default());
        let handler = AskCommandHandler::new(Arc::new(QueryPipeline::new(
            Arc::new(FailingNlu),
            Arc::new(FailingAnswers),
            ReplyPolicy::FailOpen,
        )));
        let response = ResponseWriter::new(sender.clone(), "C1", "env-2");

        handler.handle(&request("anything"), &response).await;

        let posts = sender.posts.lock().await;
        assert_eq!(posts.as_slice(), &[("C1".to_owned(), String::new())]);
    }

    #[tokio::test]
    async fn sends_apology_reply_when_fail_closed() {
        let sender = Arc::new(RecordingSender::default());
        let handler = AskCommandHandler::new(Arc::new(QueryPipeline::new(
            Arc::new(FailingNlu),
            Arc::new(FailingAnswers),
            ReplyPolicy::FailClosed,
        )));
        let response = ResponseWriter::new(sender.clone(), "C1", "env-3");

        handler.handle(&request("anything"), &response).await;

        let posts = sender.posts.lock().await;
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].1, askwolf_agent::APOLOGY_REPLY);
    }
}
