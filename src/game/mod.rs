//! Game Logic Module
//!
//! Match rules, free of I/O and timers.
//!
//! ## Module Structure
//!
//! - `question`: Question model and validation
//! - `state`: Match state, players, region ownership
//! - `round`: Round scoring and match pacing config
//! - `territory`: Claim and attack rules

pub mod question;
pub mod round;
pub mod state;
pub mod territory;

// Re-export key types
pub use question::{PublicQuestion, Question, QuestionError};
pub use round::{MatchConfig, RoundOutcome};
pub use state::{ConnectionId, MatchId, MatchPhase, MatchState, Owner, Player, RuleSet, Slot};
pub use territory::{AttackOutcome, Selection, SelectionRejected};
