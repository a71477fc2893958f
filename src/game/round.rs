//! Round Resolution
//!
//! Scoring for one question round of the fixed-round-cap ruleset, and the
//! configuration that paces a match.
//!
//! ## Scoring
//!
//! - Exactly one player answered correctly: that player scores 1 and wins.
//! - Both correct, both wrong, both missing: draw, no score change.
//!
//! A missing answer counts as wrong.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::game::state::{ConnectionId, MatchPhase, MatchState, RuleSet, Slot};

/// Default seconds a question stays open.
pub const ROUND_TIMEOUT_SECS: u64 = 10;

/// Default pause between a round result and the next question.
pub const INTER_ROUND_DELAY_SECS: u64 = 4;

/// Default number of rounds in a match.
pub const DEFAULT_ROUND_CAP: u32 = 10;

/// Configuration for match pacing and question selection.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Ruleset new matches are created with.
    pub ruleset: RuleSet,
    /// How long a question stays open.
    pub round_timeout: Duration,
    /// Pause between a round result and the next question.
    pub inter_round_delay: Duration,
    /// Rounds per match (rounds ruleset only).
    pub round_cap: u32,
    /// Topic pool questions are drawn from.
    pub topics: Vec<String>,
    /// Difficulty passed to the question source.
    pub difficulty: String,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            ruleset: RuleSet::Rounds,
            round_timeout: Duration::from_secs(ROUND_TIMEOUT_SECS),
            inter_round_delay: Duration::from_secs(INTER_ROUND_DELAY_SECS),
            round_cap: DEFAULT_ROUND_CAP,
            topics: vec!["general".to_string()],
            difficulty: "medium".to_string(),
        }
    }
}

impl MatchConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let ruleset = match std::env::var("TRIVIA_RULESET").ok().as_deref() {
            Some("territorial") => RuleSet::Territorial,
            Some("rounds") | None => RuleSet::Rounds,
            Some(other) => {
                warn!("Unknown TRIVIA_RULESET {:?}, using rounds", other);
                RuleSet::Rounds
            }
        };

        let topics: Vec<String> = std::env::var("TRIVIA_TOPICS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            ruleset,
            round_timeout: Duration::from_secs(env_or(
                "TRIVIA_ROUND_TIMEOUT_SECS",
                defaults.round_timeout.as_secs(),
            )),
            inter_round_delay: Duration::from_secs(env_or(
                "TRIVIA_INTER_ROUND_DELAY_SECS",
                defaults.inter_round_delay.as_secs(),
            )),
            round_cap: env_or("TRIVIA_ROUND_CAP", defaults.round_cap).max(1),
            topics: if topics.is_empty() { defaults.topics } else { topics },
            difficulty: std::env::var("TRIVIA_DIFFICULTY").unwrap_or(defaults.difficulty),
        }
    }

    /// Pick a topic from the pool.
    pub fn pick_topic(&self) -> &str {
        use rand::seq::SliceRandom;
        self.topics
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or("general")
    }
}

/// Read and parse an environment variable, warning on garbage.
pub(crate) fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring unparseable {}={:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}

/// Outcome of a resolved round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOutcome {
    /// Round number that was resolved.
    pub round: u32,
    /// Correct answer text.
    pub correct_answer: String,
    /// Every player's answer, `None` when missing.
    pub answers: BTreeMap<ConnectionId, Option<String>>,
    /// Round winner, `None` on a draw.
    pub winner: Option<ConnectionId>,
}

/// Score the live round.
///
/// Returns `None` (and leaves the state untouched) unless a question is live.
/// On success the phase is `Resolving`; the caller decides what follows.
pub fn resolve_round(state: &mut MatchState) -> Option<RoundOutcome> {
    if state.phase != MatchPhase::QuestionLive {
        return None;
    }
    let question = state.question.as_ref()?;

    let first_correct = state.answer_of(Slot::First).is_some_and(|a| question.is_correct(a));
    let second_correct = state.answer_of(Slot::Second).is_some_and(|a| question.is_correct(a));
    let correct_answer = question.answer.clone();

    let winner_slot = match (first_correct, second_correct) {
        (true, false) => Some(Slot::First),
        (false, true) => Some(Slot::Second),
        _ => None,
    };

    let winner = winner_slot.map(|slot| {
        let player = state.player_mut(slot);
        player.score += 1;
        player.id
    });

    state.phase = MatchPhase::Resolving;

    Some(RoundOutcome {
        round: state.round,
        correct_answer,
        answers: state.answer_map(),
        winner,
    })
}

/// Whether the round just resolved was the last one.
#[inline]
pub fn is_final_round(state: &MatchState, config: &MatchConfig) -> bool {
    state.round >= config.round_cap
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::question::Question;
    use proptest::prelude::*;

    fn live_match() -> (MatchState, ConnectionId, ConnectionId) {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        let mut state = MatchState::new(a, b, RuleSet::Rounds);
        let q = Question::new("Largest mammal?", ["Elephant", "Blue Whale", "Great White Shark", "Giraffe"], "Blue Whale")
            .unwrap();
        state.begin_round(q);
        (state, a, b)
    }

    #[test]
    fn test_one_correct_wins() {
        let (mut state, a, b) = live_match();
        state.record_answer(&a, "Elephant");
        state.record_answer(&b, "Blue Whale");

        let outcome = resolve_round(&mut state).unwrap();
        assert_eq!(outcome.winner, Some(b));
        assert_eq!(outcome.correct_answer, "Blue Whale");
        assert_eq!(state.player(Slot::Second).score, 1);
        assert_eq!(state.player(Slot::First).score, 0);
        assert_eq!(state.phase, MatchPhase::Resolving);
    }

    #[test]
    fn test_missing_answer_counts_as_wrong() {
        let (mut state, a, b) = live_match();
        state.record_answer(&a, "Blue Whale");

        let outcome = resolve_round(&mut state).unwrap();
        assert_eq!(outcome.winner, Some(a));
        assert_eq!(outcome.answers[&b], None);
    }

    #[test]
    fn test_both_missing_is_draw() {
        let (mut state, _, _) = live_match();
        let outcome = resolve_round(&mut state).unwrap();
        assert_eq!(outcome.winner, None);
        assert_eq!(outcome.answers.len(), 2);
        assert!(outcome.answers.values().all(Option::is_none));
    }

    #[test]
    fn test_resolve_only_once() {
        let (mut state, a, _) = live_match();
        state.record_answer(&a, "Blue Whale");
        assert!(resolve_round(&mut state).is_some());
        assert!(resolve_round(&mut state).is_none());
        assert_eq!(state.player(Slot::First).score, 1);
    }

    #[test]
    fn test_final_round() {
        let (mut state, _, _) = live_match();
        let config = MatchConfig { round_cap: 2, ..Default::default() };
        assert!(!is_final_round(&state, &config));
        state.round = 2;
        assert!(is_final_round(&state, &config));
    }

    #[test]
    fn test_default_config() {
        let config = MatchConfig::default();
        assert_eq!(config.round_timeout, Duration::from_secs(10));
        assert_eq!(config.inter_round_delay, Duration::from_secs(4));
        assert_eq!(config.round_cap, 10);
        assert_eq!(config.pick_topic(), "general");
    }

    fn answer_strategy() -> impl Strategy<Value = Option<bool>> {
        prop_oneof![Just(None), Just(Some(true)), Just(Some(false))]
    }

    proptest! {
        #[test]
        fn prop_score_changes_only_on_split_result(
            first in answer_strategy(),
            second in answer_strategy(),
        ) {
            let (mut state, a, b) = live_match();
            for (id, answer) in [(a, first), (b, second)] {
                if let Some(correct) = answer {
                    state.record_answer(&id, if correct { "Blue Whale" } else { "Giraffe" });
                }
            }

            let outcome = resolve_round(&mut state).unwrap();
            let first_ok = first == Some(true);
            let second_ok = second == Some(true);
            let total: u32 = state.players.iter().map(|p| p.score).sum();

            if first_ok != second_ok {
                let expected = if first_ok { a } else { b };
                prop_assert_eq!(outcome.winner, Some(expected));
                prop_assert_eq!(total, 1);
            } else {
                prop_assert_eq!(outcome.winner, None);
                prop_assert_eq!(total, 0);
            }
        }
    }
}
