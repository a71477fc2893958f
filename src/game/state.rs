//! Match State Definitions
//!
//! Per-match state: the two players, turn pointer, round counter, region
//! ownership, pending answers and the live question.
//! Uses BTreeMap for ordered iteration in snapshots.

use std::collections::BTreeMap;
use std::fmt;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::core::region::RegionId;
use crate::game::question::Question;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Opaque connection handle identifying a player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub uuid::Uuid);

impl ConnectionId {
    /// Allocate a fresh random identity.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Match identifier, derived from the two player identities.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub String);

impl MatchId {
    /// `"<first>-<second>"`.
    pub fn from_players(first: &ConnectionId, second: &ConnectionId) -> Self {
        Self(format!("{first}-{second}"))
    }

    /// Borrow as str.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// SLOTS & OWNERSHIP
// =============================================================================

/// Seat of a player within a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    /// Player who was waiting first.
    First,
    /// Player whose join completed the pairing.
    Second,
}

impl Slot {
    /// Array index (0 or 1).
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Slot::First => 0,
            Slot::Second => 1,
        }
    }

    /// The opposing seat.
    #[inline]
    pub fn other(self) -> Slot {
        match self {
            Slot::First => Slot::Second,
            Slot::Second => Slot::First,
        }
    }
}

/// Owner of a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Owner {
    /// Nobody holds the region.
    #[default]
    Unoccupied,
    /// Held by the first player.
    PlayerOne,
    /// Held by the second player.
    PlayerTwo,
}

impl From<Slot> for Owner {
    fn from(slot: Slot) -> Self {
        match slot {
            Slot::First => Owner::PlayerOne,
            Slot::Second => Owner::PlayerTwo,
        }
    }
}

// =============================================================================
// PLAYER
// =============================================================================

/// A player seated in a match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Connection identity.
    pub id: ConnectionId,
    /// Rounds won.
    pub score: u32,
    /// Seat.
    pub slot: Slot,
}

impl Player {
    /// New player with zero score.
    pub fn new(id: ConnectionId, slot: Slot) -> Self {
        Self { id, score: 0, slot }
    }
}

// =============================================================================
// MATCH STATE
// =============================================================================

/// Which ruleset drives the match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSet {
    /// Both players answer every question; fixed round cap.
    #[default]
    Rounds,
    /// Claim a start region, then attack adjacent enemy regions.
    Territorial,
}

/// Match lifecycle phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Next question is being fetched (or the inter-round delay is running).
    AwaitingQuestion,
    /// Question broadcast, collecting answers, round timer armed.
    QuestionLive,
    /// Scoring the round.
    Resolving,
    /// Territorial only: waiting for the player on turn to pick a region.
    AwaitingSelection,
    /// Terminal.
    GameOver,
}

/// An attack waiting for its question to be answered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAttack {
    /// Attacking seat.
    pub attacker: Slot,
    /// Targeted region.
    pub region: RegionId,
}

/// Result of offering an answer to the match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// Answer stored for this round.
    Recorded,
    /// This player already answered this round; nothing changed.
    Duplicate,
    /// No question is live.
    NotLive,
    /// Sender is not seated in this match.
    NotParticipant,
    /// Sender is seated but their answer does not count this round.
    NotEligible,
}

/// Complete state of one two-player match.
#[derive(Clone, Debug)]
pub struct MatchState {
    /// Match identifier.
    pub id: MatchId,
    /// Ruleset.
    pub ruleset: RuleSet,
    /// Seated players, indexed by [`Slot::index`].
    pub players: [Player; 2],
    /// Rounds started so far (0 before the first question).
    pub round: u32,
    /// Current phase.
    pub phase: MatchPhase,
    /// Region ownership. Absent keys are unoccupied.
    pub regions: BTreeMap<RegionId, Owner>,
    /// Answers submitted for the current round.
    pub answers: BTreeMap<ConnectionId, String>,
    /// The live (or last) question.
    pub question: Option<Question>,
    /// Territorial: seat whose turn it is.
    pub turn: Slot,
    /// Territorial: whether each seat has made its initial claim.
    pub has_claimed: [bool; 2],
    /// Territorial: attack awaiting its question.
    pub pending_attack: Option<PendingAttack>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl MatchState {
    /// Create a match for two players. The first is the one who waited.
    pub fn new(first: ConnectionId, second: ConnectionId, ruleset: RuleSet) -> Self {
        let phase = match ruleset {
            RuleSet::Rounds => MatchPhase::AwaitingQuestion,
            RuleSet::Territorial => MatchPhase::AwaitingSelection,
        };

        Self {
            id: MatchId::from_players(&first, &second),
            ruleset,
            players: [Player::new(first, Slot::First), Player::new(second, Slot::Second)],
            round: 0,
            phase,
            regions: BTreeMap::new(),
            answers: BTreeMap::new(),
            question: None,
            turn: Slot::First,
            has_claimed: [false; 2],
            pending_attack: None,
            created_at: Utc::now(),
        }
    }

    /// Seat of a connection, if it plays in this match.
    pub fn slot_of(&self, id: &ConnectionId) -> Option<Slot> {
        self.players.iter().find(|p| p.id == *id).map(|p| p.slot)
    }

    /// Player in a seat.
    #[inline]
    pub fn player(&self, slot: Slot) -> &Player {
        &self.players[slot.index()]
    }

    /// Mutable player in a seat.
    #[inline]
    pub fn player_mut(&mut self, slot: Slot) -> &mut Player {
        &mut self.players[slot.index()]
    }

    /// Both player identities.
    pub fn participants(&self) -> [ConnectionId; 2] {
        [self.players[0].id, self.players[1].id]
    }

    /// The other participant.
    pub fn opponent_of(&self, id: &ConnectionId) -> Option<ConnectionId> {
        self.slot_of(id).map(|slot| self.player(slot.other()).id)
    }

    /// Owner of a region.
    pub fn owner_of(&self, region: &str) -> Owner {
        self.regions.get(region).copied().unwrap_or_default()
    }

    /// Regions held by a seat.
    pub fn owned_by(&self, slot: Slot) -> impl Iterator<Item = &str> {
        let owner = Owner::from(slot);
        self.regions
            .iter()
            .filter(move |(_, o)| **o == owner)
            .map(|(region, _)| region.as_str())
    }

    /// Start a new round: store the question, clear answers, bump the counter.
    /// Returns the new round number.
    pub fn begin_round(&mut self, question: Question) -> u32 {
        self.question = Some(question);
        self.answers.clear();
        self.round += 1;
        self.phase = MatchPhase::QuestionLive;
        self.round
    }

    /// Seats whose answers count this round.
    pub fn answering_slots(&self) -> Vec<Slot> {
        match (self.ruleset, &self.pending_attack) {
            (RuleSet::Territorial, Some(attack)) => vec![attack.attacker],
            (RuleSet::Territorial, None) => Vec::new(),
            (RuleSet::Rounds, _) => vec![Slot::First, Slot::Second],
        }
    }

    /// Record an answer. The first answer per player per round wins.
    pub fn record_answer(&mut self, id: &ConnectionId, answer: &str) -> AnswerOutcome {
        let Some(slot) = self.slot_of(id) else {
            return AnswerOutcome::NotParticipant;
        };
        if self.phase != MatchPhase::QuestionLive {
            return AnswerOutcome::NotLive;
        }
        if !self.answering_slots().contains(&slot) {
            return AnswerOutcome::NotEligible;
        }
        if self.answers.contains_key(id) {
            return AnswerOutcome::Duplicate;
        }
        self.answers.insert(*id, answer.to_string());
        AnswerOutcome::Recorded
    }

    /// Every player who counts this round has answered.
    pub fn all_answered(&self) -> bool {
        let slots = self.answering_slots();
        !slots.is_empty()
            && slots
                .iter()
                .all(|slot| self.answers.contains_key(&self.player(*slot).id))
    }

    /// Answer a seat submitted this round, if any.
    pub fn answer_of(&self, slot: Slot) -> Option<&str> {
        self.answers.get(&self.player(slot).id).map(String::as_str)
    }

    /// Per-player answer map including missing entries.
    pub fn answer_map(&self) -> BTreeMap<ConnectionId, Option<String>> {
        self.players
            .iter()
            .map(|p| (p.id, self.answers.get(&p.id).cloned()))
            .collect()
    }

    /// Hand the turn to the other seat.
    pub fn switch_turn(&mut self) {
        self.turn = self.turn.other();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question() -> Question {
        Question::new("Red planet?", ["Earth", "Mars", "Jupiter", "Venus"], "Mars").unwrap()
    }

    fn new_match(ruleset: RuleSet) -> (MatchState, ConnectionId, ConnectionId) {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        (MatchState::new(a, b, ruleset), a, b)
    }

    #[test]
    fn test_match_id_from_players() {
        let (state, a, b) = new_match(RuleSet::Rounds);
        assert_eq!(state.id.as_str(), format!("{a}-{b}"));
        assert_eq!(state.round, 0);
        assert_eq!(state.phase, MatchPhase::AwaitingQuestion);
        assert!(state.regions.is_empty());
        assert!(state.answers.is_empty());
    }

    #[test]
    fn test_slots() {
        let (state, a, b) = new_match(RuleSet::Rounds);
        assert_eq!(state.slot_of(&a), Some(Slot::First));
        assert_eq!(state.slot_of(&b), Some(Slot::Second));
        assert_eq!(state.slot_of(&ConnectionId::new()), None);
        assert_eq!(state.opponent_of(&a), Some(b));
        assert_eq!(Slot::First.other(), Slot::Second);
    }

    #[test]
    fn test_begin_round_clears_answers() {
        let (mut state, a, _) = new_match(RuleSet::Rounds);
        assert_eq!(state.begin_round(question()), 1);
        assert_eq!(state.record_answer(&a, "Mars"), AnswerOutcome::Recorded);
        assert_eq!(state.begin_round(question()), 2);
        assert!(state.answers.is_empty());
        assert_eq!(state.phase, MatchPhase::QuestionLive);
    }

    #[test]
    fn test_duplicate_answer_ignored() {
        let (mut state, a, _) = new_match(RuleSet::Rounds);
        state.begin_round(question());
        assert_eq!(state.record_answer(&a, "Earth"), AnswerOutcome::Recorded);
        assert_eq!(state.record_answer(&a, "Mars"), AnswerOutcome::Duplicate);
        assert_eq!(state.answer_of(Slot::First), Some("Earth"));
    }

    #[test]
    fn test_answer_rejected_when_not_live() {
        let (mut state, a, _) = new_match(RuleSet::Rounds);
        assert_eq!(state.record_answer(&a, "Mars"), AnswerOutcome::NotLive);
        let stranger = ConnectionId::new();
        state.begin_round(question());
        assert_eq!(state.record_answer(&stranger, "Mars"), AnswerOutcome::NotParticipant);
    }

    #[test]
    fn test_all_answered() {
        let (mut state, a, b) = new_match(RuleSet::Rounds);
        state.begin_round(question());
        state.record_answer(&a, "Mars");
        assert!(!state.all_answered());
        state.record_answer(&b, "Venus");
        assert!(state.all_answered());

        let map = state.answer_map();
        assert_eq!(map[&a].as_deref(), Some("Mars"));
        assert_eq!(map[&b].as_deref(), Some("Venus"));
    }

    #[test]
    fn test_territorial_only_attacker_answers() {
        let (mut state, a, b) = new_match(RuleSet::Territorial);
        state.pending_attack = Some(PendingAttack { attacker: Slot::Second, region: "region-1".into() });
        state.begin_round(question());
        assert_eq!(state.record_answer(&a, "Mars"), AnswerOutcome::NotEligible);
        assert!(!state.all_answered());
        assert_eq!(state.record_answer(&b, "Mars"), AnswerOutcome::Recorded);
        assert!(state.all_answered());
    }

    #[test]
    fn test_ownership_queries() {
        let (mut state, _, _) = new_match(RuleSet::Territorial);
        state.regions.insert("region-0".into(), Owner::PlayerOne);
        state.regions.insert("region-5".into(), Owner::PlayerTwo);
        assert_eq!(state.owner_of("region-0"), Owner::PlayerOne);
        assert_eq!(state.owner_of("region-9"), Owner::Unoccupied);
        assert_eq!(state.owned_by(Slot::Second).collect::<Vec<_>>(), vec!["region-5"]);
    }
}
