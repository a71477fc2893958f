//! Question Sources
//!
//! External collaborators that produce trivia questions.
//!
//! - `pool`: built-in questions served in rotation
//! - `gemini`: generative-text service over HTTP

pub mod gemini;
pub mod pool;

use std::future::Future;
use thiserror::Error;

use crate::game::question::{Question, QuestionError};

pub use gemini::{GeminiConfig, GeminiQuestionSource};
pub use pool::QuestionPool;

/// Failure to obtain a usable question.
#[derive(Debug, Error)]
pub enum QuestionSourceError {
    /// Upstream request failed.
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Upstream answered with an error status.
    #[error("upstream returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body (truncated).
        body: String,
    },
    /// Response carried no question text.
    #[error("no content in upstream response")]
    MissingContent,
    /// Question text was not valid JSON.
    #[error("malformed question payload: {0}")]
    Parse(#[from] serde_json::Error),
    /// Question JSON had the wrong shape.
    #[error("invalid question: {0}")]
    Invalid(#[from] QuestionError),
    /// Source has nothing to serve.
    #[error("question source is empty")]
    Empty,
}

/// Produces questions for a topic and difficulty.
pub trait QuestionSource: Send + Sync + 'static {
    /// Fetch one validated question.
    fn fetch_question(
        &self,
        topic: &str,
        difficulty: &str,
    ) -> impl Future<Output = Result<Question, QuestionSourceError>> + Send;
}

/// The source selected at startup.
pub enum QuestionBackend {
    /// Built-in rotation.
    Pool(QuestionPool),
    /// Generative-text service.
    Gemini(GeminiQuestionSource),
}

impl QuestionBackend {
    /// Backend name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            QuestionBackend::Pool(_) => "built-in pool",
            QuestionBackend::Gemini(_) => "gemini",
        }
    }
}

impl QuestionSource for QuestionBackend {
    async fn fetch_question(
        &self,
        topic: &str,
        difficulty: &str,
    ) -> Result<Question, QuestionSourceError> {
        match self {
            QuestionBackend::Pool(pool) => pool.fetch_question(topic, difficulty).await,
            QuestionBackend::Gemini(gemini) => gemini.fetch_question(topic, difficulty).await,
        }
    }
}
