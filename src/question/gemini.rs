//! Gemini Question Source
//!
//! Asks Google's generative-language API for a trivia question in strict
//! JSON, then parses and validates it. The server only reads the key; it
//! never issues or stores credentials.

use std::future::Future;
use std::time::Duration;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::game::question::Question;
use super::{QuestionSource, QuestionSourceError};

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Gemini client configuration.
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    /// API key.
    pub api_key: String,
    /// Model name.
    pub model: String,
    /// Base URL of the models endpoint.
    pub endpoint: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Create config from environment variables.
    ///
    /// Returns `None` when `GEMINI_API_KEY` is unset or empty.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
        Some(Self {
            api_key,
            model: std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            endpoint: std::env::var("GEMINI_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
            timeout: Duration::from_secs(crate::game::round::env_or("GEMINI_TIMEOUT_SECS", 8)),
        })
    }

    fn url(&self) -> String {
        format!("{}/{}:generateContent", self.endpoint.trim_end_matches('/'), self.model)
    }
}

/// Question source backed by the Gemini API.
pub struct GeminiQuestionSource {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiQuestionSource {
    /// Create a source with its own HTTP client.
    pub fn new(config: GeminiConfig) -> Result<Self, QuestionSourceError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    async fn request(&self, topic: &str, difficulty: &str) -> Result<Question, QuestionSourceError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": build_prompt(topic, difficulty) }] }]
        });

        let response = self
            .client
            .post(self.config.url())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: String = response.text().await.unwrap_or_default().chars().take(512).collect();
            warn!("Gemini returned {}: {}", status, body);
            return Err(QuestionSourceError::Status { status: status.as_u16(), body });
        }

        let payload: Value = response.json().await?;
        let question = parse_response(&payload)?;
        debug!("Fetched question on {:?} ({}): {}", topic, difficulty, question.prompt);
        Ok(question)
    }
}

impl QuestionSource for GeminiQuestionSource {
    fn fetch_question(
        &self,
        topic: &str,
        difficulty: &str,
    ) -> impl Future<Output = Result<Question, QuestionSourceError>> + Send {
        self.request(topic, difficulty)
    }
}

/// Prompt asking for one question in strict JSON.
pub fn build_prompt(topic: &str, difficulty: &str) -> String {
    format!(
        "Generate a trivia question about {topic}, difficulty {difficulty}. \
         Format the output strictly as JSON:\n\
         {{\n  \"question\": \"...\",\n  \"options\": [\"A\", \"B\", \"C\", \"D\"],\n  \
         \"answer\": \"...\"\n}}\n\
         The answer must be the exact text of one of the options."
    )
}

/// The JSON object the model is asked to produce.
#[derive(Debug, Deserialize)]
struct GeneratedTrivia {
    question: String,
    options: Vec<String>,
    answer: String,
}

/// Extract and validate the question from a `generateContent` response.
pub fn parse_response(payload: &Value) -> Result<Question, QuestionSourceError> {
    let text = payload
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .ok_or(QuestionSourceError::MissingContent)?;

    let trivia: GeneratedTrivia = serde_json::from_str(strip_code_fences(text))?;
    Ok(Question::new(trivia.question, trivia.options, trivia.answer)?)
}

/// Remove Markdown code fences (```json ... ```) around model output.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::question::QuestionError;

    fn envelope(text: &str) -> Value {
        json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {} "), "{}");
    }

    #[test]
    fn test_parse_fenced_response() {
        let text = "```json\n{\"question\": \"2+2?\", \"options\": [\"3\", \"4\", \"5\", \"22\"], \"answer\": \"4\"}\n```";
        let q = parse_response(&envelope(text)).unwrap();
        assert_eq!(q.prompt, "2+2?");
        assert!(q.is_correct("4"));
    }

    #[test]
    fn test_missing_content() {
        let err = parse_response(&json!({ "candidates": [] })).unwrap_err();
        assert!(matches!(err, QuestionSourceError::MissingContent));
    }

    #[test]
    fn test_unparseable_text() {
        let err = parse_response(&envelope("Sure! Here is a question:")).unwrap_err();
        assert!(matches!(err, QuestionSourceError::Parse(_)));
    }

    #[test]
    fn test_answer_not_in_options() {
        let text = r#"{"question": "2+2?", "options": ["3", "5", "6", "22"], "answer": "4"}"#;
        let err = parse_response(&envelope(text)).unwrap_err();
        assert!(matches!(
            err,
            QuestionSourceError::Invalid(QuestionError::AnswerNotInOptions(_))
        ));
    }

    #[test]
    fn test_prompt_mentions_topic() {
        let prompt = build_prompt("geography", "hard");
        assert!(prompt.contains("geography"));
        assert!(prompt.contains("difficulty hard"));
        assert!(prompt.contains("\"options\""));
    }

    #[test]
    fn test_url() {
        let config = GeminiConfig {
            api_key: "k".into(),
            model: "m".into(),
            endpoint: "https://example.test/models/".into(),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(config.url(), "https://example.test/models/m:generateContent");
    }
}
