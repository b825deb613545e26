use std::sync::Arc;

use tracing::warn;

use askwolf_core::config::ReplyPolicy;

use crate::{extract, nlu::NluClient, wolfram::AnswerClient};

/// Reply sent instead of a degraded answer when the policy is fail-closed.
pub const APOLOGY_REPLY: &str =
    "Sorry, I could not find an answer to that right now. Please try again later.";

/// Result of one pipeline run. `reply` is always present: a matched question
/// produces exactly one reply regardless of upstream outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub reply: String,
    pub extracted_query: String,
    pub nlu_error: Option<String>,
    pub answer_error: Option<String>,
}

impl PipelineOutcome {
    pub fn degraded(&self) -> bool {
        self.nlu_error.is_some() || self.answer_error.is_some()
    }
}

/// Two-stage question pipeline: NLU parse and entity extraction produce the
/// intermediate search query, which feeds the knowledge API call.
///
/// The stages are strictly sequential because the second call's input is the
/// first call's output. Under `ReplyPolicy::FailOpen` the pipeline never
/// short-circuits: an NLU failure degrades the query to the empty string and
/// the knowledge API is still invoked with it, and a knowledge failure
/// degrades the reply to the empty string. `ReplyPolicy::FailClosed` replaces
/// either degradation with an apology reply.
pub struct QueryPipeline {
    nlu: Arc<dyn NluClient>,
    answers: Arc<dyn AnswerClient>,
    policy: ReplyPolicy,
}

impl QueryPipeline {
    pub fn new(nlu: Arc<dyn NluClient>, answers: Arc<dyn AnswerClient>, policy: ReplyPolicy) -> Self {
        Self { nlu, answers, policy }
    }

    pub fn policy(&self) -> ReplyPolicy {
        self.policy
    }

    pub async fn answer_question(&self, question: &str) -> PipelineOutcome {
        let (extracted_query, nlu_error) = match self.nlu.parse_message(question).await {
            Ok(document) => (extract::search_query(&document), None),
            Err(error) => {
                warn!(
                    event_name = "pipeline.nlu_failed",
                    error = %error,
                    "nlu parse failed; degrading to empty query"
                );
                (String::new(), Some(error.to_string()))
            }
        };

        if self.policy == ReplyPolicy::FailClosed && nlu_error.is_some() {
            return PipelineOutcome {
                reply: APOLOGY_REPLY.to_owned(),
                extracted_query,
                nlu_error,
                answer_error: None,
            };
        }

        let (reply, answer_error) = match self.answers.spoken_answer(&extracted_query).await {
            Ok(answer) => (answer, None),
            Err(error) => {
                warn!(
                    event_name = "pipeline.answer_failed",
                    query = %extracted_query,
                    error = %error,
                    "knowledge api call failed"
                );
                let reply = match self.policy {
                    // Preserved source behavior: send the zero-value answer.
                    ReplyPolicy::FailOpen => String::new(),
                    ReplyPolicy::FailClosed => APOLOGY_REPLY.to_owned(),
                };
                (reply, Some(error.to_string()))
            }
        };

        PipelineOutcome { reply, extracted_query, nlu_error, answer_error }
    }
}
