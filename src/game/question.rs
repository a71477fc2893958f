//! Trivia Questions
//!
//! The question shape shared by every question source, plus the sanitized
//! form that is broadcast to clients (answer withheld).

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Number of answer options every question must carry.
pub const OPTION_COUNT: usize = 4;

/// A trivia question with its correct answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Prompt text.
    pub prompt: String,
    /// Answer options, in display order.
    pub options: Vec<String>,
    /// Correct option text. Always literally equal to one of `options`.
    pub answer: String,
}

/// Data-integrity faults in a question payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuestionError {
    /// Prompt is empty or whitespace.
    #[error("question prompt is empty")]
    EmptyPrompt,
    /// Wrong number of options.
    #[error("expected {expected} options, found {found}")]
    WrongOptionCount {
        /// Required option count.
        expected: usize,
        /// Option count in the payload.
        found: usize,
    },
    /// Same option text listed twice.
    #[error("duplicate option: {0:?}")]
    DuplicateOption(String),
    /// Answer does not match any option.
    #[error("answer {0:?} is not one of the options")]
    AnswerNotInOptions(String),
}

impl Question {
    /// Build and validate a question.
    pub fn new(
        prompt: impl Into<String>,
        options: impl IntoIterator<Item = impl Into<String>>,
        answer: impl Into<String>,
    ) -> Result<Self, QuestionError> {
        let question = Self {
            prompt: prompt.into(),
            options: options.into_iter().map(Into::into).collect(),
            answer: answer.into(),
        };
        question.validate()?;
        Ok(question)
    }

    /// Check the shape: prompt, exactly [`OPTION_COUNT`] distinct options,
    /// answer equal to one of them.
    pub fn validate(&self) -> Result<(), QuestionError> {
        if self.prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }
        if self.options.len() != OPTION_COUNT {
            return Err(QuestionError::WrongOptionCount {
                expected: OPTION_COUNT,
                found: self.options.len(),
            });
        }
        for (i, option) in self.options.iter().enumerate() {
            if self.options[..i].contains(option) {
                return Err(QuestionError::DuplicateOption(option.clone()));
            }
        }
        if !self.options.contains(&self.answer) {
            return Err(QuestionError::AnswerNotInOptions(self.answer.clone()));
        }
        Ok(())
    }

    /// Exact string comparison against the correct answer.
    #[inline]
    pub fn is_correct(&self, answer: &str) -> bool {
        self.answer == answer
    }

    /// Client-facing copy without the answer.
    pub fn public(&self) -> PublicQuestion {
        PublicQuestion {
            prompt: self.prompt.clone(),
            options: self.options.clone(),
        }
    }
}

/// Question as broadcast to players.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicQuestion {
    /// Prompt text.
    pub prompt: String,
    /// Answer options.
    pub options: Vec<String>,
}
