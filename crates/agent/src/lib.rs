//! Question-answering pipeline: NLU parse, entity extraction, spoken answer.

pub mod extract;
pub mod nlu;
pub mod pipeline;
pub mod wolfram;

pub use nlu::{NluClient, NluError, WitClient};
pub use pipeline::{PipelineOutcome, QueryPipeline, APOLOGY_REPLY};
pub use wolfram::{AnswerClient, AnswerError, SpokenAnswerClient};
