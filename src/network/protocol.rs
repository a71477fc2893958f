//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every message is a JSON object tagged by `"type"` (snake_case).

use std::collections::BTreeMap;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::core::region::RegionId;
use crate::game::question::PublicQuestion;
use crate::game::round::RoundOutcome;
use crate::game::state::{ConnectionId, MatchPhase, MatchState, Owner, RuleSet, Slot};
use crate::game::territory::AttackOutcome;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Enter matchmaking.
    Join,

    /// Leave the queue or forfeit the current match.
    Leave,

    /// Answer the live question.
    SubmitAnswer {
        /// Match the answer is for.
        match_id: String,
        /// Chosen option text.
        answer: String,
    },

    /// Territorial ruleset: claim or attack a region.
    SelectRegion {
        /// Target region.
        region: RegionId,
        /// Question topic for an attack.
        #[serde(default)]
        topic: Option<String>,
        /// Question difficulty for an attack.
        #[serde(default)]
        difficulty: Option<String>,
    },

    /// Ping for latency measurement.
    Ping {
        /// Client timestamp, echoed back.
        timestamp: u64,
    },
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once on connect.
    Welcome {
        /// This connection's identity.
        connection_id: ConnectionId,
        /// Server version.
        server_version: String,
    },

    /// Queued; waiting for an opponent.
    Waiting,

    /// Paired with an opponent.
    MatchFound(MatchSnapshot),

    /// A question is live.
    NewQuestion {
        /// Question without its answer.
        question: PublicQuestion,
        /// Round number (1-based).
        round: u32,
        /// Time allowed to answer, in milliseconds.
        time_limit_ms: u64,
    },

    /// The opponent has locked in an answer.
    OpponentAnswered,

    /// Round scored (rounds ruleset).
    RoundResult(RoundResultInfo),

    /// Attack decided (territorial ruleset).
    AttackResult(AttackResultInfo),

    /// Region ownership or turn changed without a question (territorial claims).
    TerritoryUpdate(MatchSnapshot),

    /// Match finished.
    GameOver(MatchSnapshot),

    /// The other participant left; the match is over.
    OpponentDisconnected,

    /// Error message.
    Error(ServerError),

    /// Pong response.
    Pong {
        /// Echoed client timestamp.
        timestamp: u64,
        /// Server wall clock (Unix ms).
        server_time: i64,
    },

    /// Server is shutting down.
    Shutdown {
        /// Reason shown to the player.
        reason: String,
    },
}

/// Per-player entry in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    /// Connection identity.
    pub id: ConnectionId,
    /// Seat.
    pub slot: Slot,
    /// Rounds won.
    pub score: u32,
    /// Territorial: initial claim made.
    pub has_claimed: bool,
}

/// Full match state as shown to clients (never includes the answer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    /// Match identifier.
    pub match_id: String,
    /// Ruleset.
    pub ruleset: RuleSet,
    /// Both players, first seat first.
    pub players: Vec<PlayerInfo>,
    /// Rounds started so far.
    pub round: u32,
    /// Current phase.
    pub phase: MatchPhase,
    /// Owned regions.
    pub regions: BTreeMap<RegionId, Owner>,
    /// Territorial: seat on turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn: Option<Slot>,
    /// When the match was created.
    pub created_at: DateTime<Utc>,
}

impl From<&MatchState> for MatchSnapshot {
    fn from(state: &MatchState) -> Self {
        Self {
            match_id: state.id.to_string(),
            ruleset: state.ruleset,
            players: state
                .players
                .iter()
                .map(|p| PlayerInfo {
                    id: p.id,
                    slot: p.slot,
                    score: p.score,
                    has_claimed: state.has_claimed[p.slot.index()],
                })
                .collect(),
            round: state.round,
            phase: state.phase,
            regions: state.regions.clone(),
            turn: (state.ruleset == RuleSet::Territorial).then_some(state.turn),
            created_at: state.created_at,
        }
    }
}

/// Round result payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResultInfo {
    /// Round number.
    pub round: u32,
    /// Correct answer text.
    pub correct_answer: String,
    /// Answer per player id; `null` when missing.
    pub answers: BTreeMap<String, Option<String>>,
    /// Round winner, `null` on a draw.
    pub winner_id: Option<ConnectionId>,
    /// Match after scoring.
    pub game: MatchSnapshot,
}

impl RoundResultInfo {
    /// Build from a resolved round.
    pub fn new(outcome: RoundOutcome, state: &MatchState) -> Self {
        Self {
            round: outcome.round,
            correct_answer: outcome.correct_answer,
            answers: outcome
                .answers
                .into_iter()
                .map(|(id, answer)| (id.to_string(), answer))
                .collect(),
            winner_id: outcome.winner,
            game: MatchSnapshot::from(state),
        }
    }
}

/// Attack result payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackResultInfo {
    /// Round number of the attack question.
    pub round: u32,
    /// Targeted region.
    pub region: RegionId,
    /// Attacking player.
    pub attacker_id: ConnectionId,
    /// Attacker's answer; `null` on timeout.
    pub answer: Option<String>,
    /// Correct answer text.
    pub correct_answer: String,
    /// Whether the region changed hands.
    pub captured: bool,
    /// Match after the attack.
    pub game: MatchSnapshot,
}

impl AttackResultInfo {
    /// Build from a resolved attack.
    pub fn new(outcome: AttackOutcome, state: &MatchState) -> Self {
        Self {
            round: outcome.round,
            region: outcome.region,
            attacker_id: outcome.attacker,
            answer: outcome.answer,
            correct_answer: outcome.correct_answer,
            captured: outcome.captured,
            game: MatchSnapshot::from(state),
        }
    }
}

/// Server error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl ServerError {
    /// Build an error payload.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Frame could not be parsed.
    InvalidMessage,
    /// Join while already seated.
    AlreadyInMatch,
    /// Question could not be obtained; the match is over.
    QuestionUnavailable,
    /// Connection limit reached; the socket is closed after this.
    ServerOverloaded,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Build an error message.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error(ServerError::new(code, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::question::Question;
    use crate::game::round::resolve_round;

    #[test]
    fn test_client_message_tags() {
        let msg = ClientMessage::from_json(r#"{"type":"submit_answer","match_id":"m","answer":"Mars"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::SubmitAnswer { match_id: "m".into(), answer: "Mars".into() }
        );

        let msg = ClientMessage::from_json(r#"{"type":"join"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Join);
    }

    #[test]
    fn test_select_region_optional_fields() {
        let msg = ClientMessage::from_json(r#"{"type":"select_region","region":"region-3"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::SelectRegion { region: "region-3".into(), topic: None, difficulty: None }
        );
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(ClientMessage::from_json(r#"{"type":"teleport"}"#).is_err());
        assert!(ClientMessage::from_json("not json").is_err());
    }

    #[test]
    fn test_round_result_wire_shape() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        let mut state = MatchState::new(a, b, RuleSet::Rounds);
        state.begin_round(Question::new("Q?", ["w", "x", "y", "z"], "x").unwrap());
        state.record_answer(&a, "x");
        let outcome = resolve_round(&mut state).unwrap();

        let msg = ServerMessage::RoundResult(RoundResultInfo::new(outcome, &state));
        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();

        assert_eq!(json["type"], "round_result");
        assert_eq!(json["correct_answer"], "x");
        assert_eq!(json["winner_id"], a.to_string());
        assert_eq!(json["answers"][a.to_string()], "x");
        assert!(json["answers"][b.to_string()].is_null());
        assert_eq!(json["game"]["players"][0]["score"], 1);
        assert!(json["game"].get("turn").is_none());
    }

    #[test]
    fn test_new_question_has_no_answer() {
        let q = Question::new("Q?", ["w", "x", "y", "z"], "x").unwrap();
        let msg = ServerMessage::NewQuestion { question: q.public(), round: 1, time_limit_ms: 10_000 };
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"new_question\""));
        assert!(!json.contains("answer"));
    }

    #[test]
    fn test_error_codes() {
        let msg = ServerMessage::error(ErrorCode::QuestionUnavailable, "upstream down");
        let json = msg.to_json().unwrap();
        assert!(json.contains("question_unavailable"));
        assert_eq!(ServerMessage::from_json(&json).unwrap(), msg);
    }

    #[test]
    fn test_unit_variants() {
        assert_eq!(ServerMessage::Waiting.to_json().unwrap(), r#"{"type":"waiting"}"#);
        assert_eq!(
            ServerMessage::OpponentDisconnected.to_json().unwrap(),
            r#"{"type":"opponent_disconnected"}"#
        );
    }
}
