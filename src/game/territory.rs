//! Territorial Ruleset
//!
//! Region selection for the claim-then-attack variant.
//!
//! Each player first claims one unoccupied region (no question). After both
//! have claimed, every selection is an attack on a region that is adjacent,
//! in either direction of the adjacency table, to one the attacker holds.
//! Attacks are decided by the attacker's answer to a question; the turn
//! passes after every claim and every attack.

use thiserror::Error;

use crate::core::region::{RegionGraph, RegionId};
use crate::game::state::{ConnectionId, MatchPhase, MatchState, Owner, PendingAttack, RuleSet, Slot};

/// Accepted region selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Initial claim applied; turn already switched.
    Claimed {
        /// Claimed region.
        region: RegionId,
        /// Claiming seat.
        slot: Slot,
    },
    /// Attack accepted; a question must now be fetched.
    Attack {
        /// Targeted region.
        region: RegionId,
        /// Attacking seat.
        slot: Slot,
    },
}

/// Why a selection had no effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionRejected {
    /// Match is not territorial.
    #[error("match does not use territorial rules")]
    WrongRuleSet,
    /// Sender is not seated here.
    #[error("not a participant")]
    NotParticipant,
    /// Not the sender's turn.
    #[error("not your turn")]
    NotYourTurn,
    /// An attack question is still open.
    #[error("attack already in progress")]
    AttackInProgress,
    /// Region is not on the map.
    #[error("unknown region {0}")]
    UnknownRegion(RegionId),
    /// Claim target already has an owner.
    #[error("region {0} is already occupied")]
    AlreadyOccupied(RegionId),
    /// Attack on one's own region.
    #[error("region {0} is already yours")]
    OwnRegion(RegionId),
    /// Attack target not adjacent to any owned region.
    #[error("region {0} is not adjacent to your territory")]
    NotAdjacent(RegionId),
}

/// Apply a region selection by `id`.
///
/// Claims are applied immediately. Attacks set the pending attack and move
/// the match to `AwaitingQuestion`; ownership changes only in
/// [`resolve_attack`].
pub fn select_region(
    state: &mut MatchState,
    graph: &RegionGraph,
    id: &ConnectionId,
    region: &str,
) -> Result<Selection, SelectionRejected> {
    if state.ruleset != RuleSet::Territorial {
        return Err(SelectionRejected::WrongRuleSet);
    }
    let slot = state.slot_of(id).ok_or(SelectionRejected::NotParticipant)?;
    if state.phase != MatchPhase::AwaitingSelection || state.pending_attack.is_some() {
        return Err(SelectionRejected::AttackInProgress);
    }
    if state.turn != slot {
        return Err(SelectionRejected::NotYourTurn);
    }
    if !graph.contains(region) {
        return Err(SelectionRejected::UnknownRegion(region.to_string()));
    }

    let owner = state.owner_of(region);

    if !state.has_claimed[slot.index()] {
        if owner != Owner::Unoccupied {
            return Err(SelectionRejected::AlreadyOccupied(region.to_string()));
        }
        state.regions.insert(region.to_string(), Owner::from(slot));
        state.has_claimed[slot.index()] = true;
        state.switch_turn();
        return Ok(Selection::Claimed { region: region.to_string(), slot });
    }

    if owner == Owner::from(slot) {
        return Err(SelectionRejected::OwnRegion(region.to_string()));
    }
    if !graph.is_adjacent_to_any(region, state.owned_by(slot)) {
        return Err(SelectionRejected::NotAdjacent(region.to_string()));
    }

    state.pending_attack = Some(PendingAttack { attacker: slot, region: region.to_string() });
    state.phase = MatchPhase::AwaitingQuestion;
    Ok(Selection::Attack { region: region.to_string(), slot })
}

/// Outcome of a resolved attack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackOutcome {
    /// Round number of the attack question.
    pub round: u32,
    /// Attacking player.
    pub attacker: ConnectionId,
    /// Targeted region.
    pub region: RegionId,
    /// Attacker's answer, `None` on timeout.
    pub answer: Option<String>,
    /// Correct answer text.
    pub correct_answer: String,
    /// Whether ownership transferred to the attacker.
    pub captured: bool,
}

/// Decide the live attack question.
///
/// A correct answer transfers the region; anything else leaves it alone.
/// The turn switches either way and the match returns to `AwaitingSelection`.
pub fn resolve_attack(state: &mut MatchState) -> Option<AttackOutcome> {
    if state.phase != MatchPhase::QuestionLive {
        return None;
    }
    let question = state.question.as_ref()?;
    let attack = state.pending_attack.clone()?;

    let answer = state.answer_of(attack.attacker).map(String::from);
    let captured = answer.as_deref().is_some_and(|a| question.is_correct(a));
    let correct_answer = question.answer.clone();

    if captured {
        state.regions.insert(attack.region.clone(), Owner::from(attack.attacker));
    }
    state.pending_attack = None;
    state.switch_turn();
    state.phase = MatchPhase::AwaitingSelection;

    Some(AttackOutcome {
        round: state.round,
        attacker: state.player(attack.attacker).id,
        region: attack.region,
        answer,
        correct_answer,
        captured,
    })
}
