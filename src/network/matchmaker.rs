//! Matchmaker
//!
//! Pairs players through a single waiting slot. The first player to join
//! waits; the next one is paired with them immediately.

use tracing::info;

use crate::game::state::{ConnectionId, MatchId, MatchState, RuleSet};
use crate::network::session::{MatchSession, SessionManager};

/// Result of a join request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Stored in the waiting slot.
    Waiting,
    /// Already the waiting player; nothing changed.
    AlreadyWaiting,
    /// Already seated in a match; nothing changed.
    AlreadyInMatch(MatchId),
    /// Paired; a new match was registered.
    Matched(MatchId),
}

/// Result of a leave request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// Connection was neither waiting nor playing.
    NotFound,
    /// Waiting slot cleared.
    LeftQueue,
    /// Match torn down; the remaining player must be told.
    MatchAbandoned {
        /// Removed match.
        match_id: MatchId,
        /// Participant left behind.
        remaining: ConnectionId,
    },
}

/// Two-player matchmaker over the session store.
#[derive(Debug, Clone, Copy)]
pub struct Matchmaker {
    ruleset: RuleSet,
}

impl Matchmaker {
    /// Matchmaker creating matches with `ruleset`.
    pub fn new(ruleset: RuleSet) -> Self {
        Self { ruleset }
    }

    /// Queue a player, or pair them with the waiting one.
    pub fn join(&self, store: &mut SessionManager, id: ConnectionId) -> JoinOutcome {
        if let Some(match_id) = store.match_of(&id) {
            return JoinOutcome::AlreadyInMatch(match_id.clone());
        }

        match store.take_waiting() {
            None => {
                store.set_waiting(id);
                JoinOutcome::Waiting
            }
            Some(waiting) if waiting == id => {
                store.set_waiting(id);
                JoinOutcome::AlreadyWaiting
            }
            Some(first) => {
                let state = MatchState::new(first, id, self.ruleset);
                let match_id = store.insert(MatchSession::new(state));
                info!("Match found! {} vs {} ({:?})", first.short(), id.short(), self.ruleset);
                JoinOutcome::Matched(match_id)
            }
        }
    }

    /// Remove a player from the queue, or end their match.
    pub fn leave(&self, store: &mut SessionManager, id: &ConnectionId) -> LeaveOutcome {
        if store.clear_waiting_if(id) {
            return LeaveOutcome::LeftQueue;
        }

        let Some(match_id) = store.match_of(id).cloned() else {
            return LeaveOutcome::NotFound;
        };
        match store.remove(&match_id) {
            Some(session) => {
                let remaining = session.state.opponent_of(id).unwrap_or(*id);
                LeaveOutcome::MatchAbandoned { match_id, remaining }
            }
            None => LeaveOutcome::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{MatchPhase, Slot};

    #[test]
    fn test_first_join_waits() {
        let mut store = SessionManager::new();
        let mm = Matchmaker::new(RuleSet::Rounds);
        let a = ConnectionId::new();

        assert_eq!(mm.join(&mut store, a), JoinOutcome::Waiting);
        assert_eq!(store.waiting(), Some(a));
        assert_eq!(mm.join(&mut store, a), JoinOutcome::AlreadyWaiting);
        assert_eq!(store.session_count(), 0);
    }

    #[test]
    fn test_second_join_matches() {
        let mut store = SessionManager::new();
        let mm = Matchmaker::new(RuleSet::Rounds);
        let a = ConnectionId::new();
        let b = ConnectionId::new();

        mm.join(&mut store, a);
        let JoinOutcome::Matched(match_id) = mm.join(&mut store, b) else {
            panic!("expected a match");
        };

        assert_eq!(store.waiting(), None);
        let session = store.get(&match_id).unwrap();
        assert_eq!(session.state.player(Slot::First).id, a);
        assert_eq!(session.state.player(Slot::Second).id, b);
        assert_eq!(session.state.round, 0);
        assert_eq!(session.state.phase, MatchPhase::AwaitingQuestion);
        assert!(!session.has_round_timer());

        assert_eq!(mm.join(&mut store, a), JoinOutcome::AlreadyInMatch(match_id));
    }

    #[test]
    fn test_leave_queue() {
        let mut store = SessionManager::new();
        let mm = Matchmaker::new(RuleSet::Rounds);
        let a = ConnectionId::new();

        mm.join(&mut store, a);
        assert_eq!(mm.leave(&mut store, &a), LeaveOutcome::LeftQueue);
        assert_eq!(store.waiting(), None);
        assert_eq!(mm.leave(&mut store, &a), LeaveOutcome::NotFound);
    }

    #[test]
    fn test_leave_match_ends_it() {
        let mut store = SessionManager::new();
        let mm = Matchmaker::new(RuleSet::Territorial);
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        let c = ConnectionId::new();

        mm.join(&mut store, a);
        let JoinOutcome::Matched(match_id) = mm.join(&mut store, b) else {
            panic!("expected a match");
        };
        mm.join(&mut store, c);

        assert_eq!(
            mm.leave(&mut store, &b),
            LeaveOutcome::MatchAbandoned { match_id: match_id.clone(), remaining: a }
        );
        assert!(!store.contains(&match_id));
        assert_eq!(store.match_of(&a), None);
        // the third player keeps waiting
        assert_eq!(store.waiting(), Some(c));
    }
}
