//! Built-in Question Pool
//!
//! Fixed questions served in rotation. Used when no question service is
//! configured, and in tests.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::game::question::Question;
use super::{QuestionSource, QuestionSourceError};

/// Rotating pool of questions. Topic and difficulty are ignored.
pub struct QuestionPool {
    questions: Vec<Question>,
    next: AtomicUsize,
}

impl QuestionPool {
    /// Pool over the given questions.
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions, next: AtomicUsize::new(0) }
    }

    /// The questions bundled with the server.
    pub fn builtin() -> Self {
        let rows: [(&str, [&str; 4], &str); 10] = [
            ("What is the capital of Japan?", ["Beijing", "Seoul", "Tokyo", "Bangkok"], "Tokyo"),
            ("Which planet is known as the Red Planet?", ["Earth", "Mars", "Jupiter", "Venus"], "Mars"),
            (
                "Who wrote \"To Kill a Mockingbird\"?",
                ["Harper Lee", "Mark Twain", "J.K. Rowling", "F. Scott Fitzgerald"],
                "Harper Lee",
            ),
            ("What is the largest mammal in the world?", ["Elephant", "Blue Whale", "Great White Shark", "Giraffe"], "Blue Whale"),
            ("Which element has the chemical symbol O?", ["Gold", "Oxygen", "Osmium", "Iron"], "Oxygen"),
            ("How many continents are there?", ["5", "6", "7", "8"], "7"),
            ("Which ocean is the largest?", ["Atlantic", "Indian", "Arctic", "Pacific"], "Pacific"),
            ("Who painted the Mona Lisa?", ["Michelangelo", "Leonardo da Vinci", "Raphael", "Donatello"], "Leonardo da Vinci"),
            ("What is the hardest natural substance?", ["Diamond", "Quartz", "Granite", "Iron"], "Diamond"),
            ("Which river flows through Cairo?", ["Amazon", "Danube", "Nile", "Tigris"], "Nile"),
        ];

        let questions = rows
            .into_iter()
            .filter_map(|(prompt, options, answer)| Question::new(prompt, options, answer).ok())
            .collect();
        Self::new(questions)
    }

    /// Number of questions in the pool.
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// True if the pool has no questions.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    fn next_question(&self) -> Result<Question, QuestionSourceError> {
        if self.questions.is_empty() {
            return Err(QuestionSourceError::Empty);
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.questions.len();
        Ok(self.questions[index].clone())
    }
}

impl QuestionSource for QuestionPool {
    fn fetch_question(
        &self,
        _topic: &str,
        _difficulty: &str,
    ) -> impl Future<Output = Result<Question, QuestionSourceError>> + Send {
        std::future::ready(self.next_question())
    }
}
