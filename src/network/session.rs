//! Match Session Management
//!
//! A session is one live match plus the timers it owns. The session manager
//! is the process-wide store: the single waiting slot and the registry of
//! sessions by match id. Both are owned by the coordinator task, so nothing
//! here is locked.

use std::collections::BTreeMap;

use crate::game::state::{ConnectionId, MatchId, MatchState};
use crate::network::timer::ScheduledTask;

/// A live match and its scheduled work.
#[derive(Debug)]
pub struct MatchSession {
    /// Game state.
    pub state: MatchState,
    /// Round timeout; armed only while a question is live.
    round_timer: Option<ScheduledTask>,
    /// Pending start of the next round.
    next_round: Option<ScheduledTask>,
    /// Token of the question fetch currently in flight.
    fetch_seq: u64,
}

impl MatchSession {
    /// Wrap a fresh match.
    pub fn new(state: MatchState) -> Self {
        Self {
            state,
            round_timer: None,
            next_round: None,
            fetch_seq: 0,
        }
    }

    /// Match identifier.
    pub fn id(&self) -> &MatchId {
        &self.state.id
    }

    /// Arm the round timer, replacing (and cancelling) any previous one.
    pub fn arm_round_timer(&mut self, task: ScheduledTask) {
        self.round_timer = Some(task);
    }

    /// Cancel the round timer. Returns true if one was armed.
    pub fn cancel_round_timer(&mut self) -> bool {
        match self.round_timer.take() {
            Some(task) => {
                task.cancel();
                true
            }
            None => false,
        }
    }

    /// Whether a round timer is armed.
    pub fn has_round_timer(&self) -> bool {
        self.round_timer.is_some()
    }

    /// Schedule the next round, replacing any pending one.
    pub fn schedule_next_round(&mut self, task: ScheduledTask) {
        self.next_round = Some(task);
    }

    /// Forget the next-round task once it has fired.
    pub fn clear_next_round(&mut self) {
        self.next_round = None;
    }

    /// Whether a next-round task is pending.
    pub fn has_next_round(&self) -> bool {
        self.next_round.is_some()
    }

    /// Start a new question fetch and return its token.
    /// Any fetch still in flight becomes stale.
    pub fn begin_fetch(&mut self) -> u64 {
        self.fetch_seq += 1;
        self.fetch_seq
    }

    /// Whether `seq` is the fetch currently expected.
    pub fn is_current_fetch(&self, seq: u64) -> bool {
        self.fetch_seq == seq
    }

    /// Cancel all scheduled work.
    pub fn cancel_all(&mut self) {
        self.cancel_round_timer();
        self.next_round = None;
        self.fetch_seq += 1;
    }
}

/// Process-wide store of matchmaking and match state.
#[derive(Debug, Default)]
pub struct SessionManager {
    /// The one player waiting for an opponent.
    waiting: Option<ConnectionId>,
    /// Active sessions.
    sessions: BTreeMap<MatchId, MatchSession>,
    /// Player to session mapping.
    player_sessions: BTreeMap<ConnectionId, MatchId>,
}

impl SessionManager {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Waiting slot
    // -------------------------------------------------------------------------

    /// Current waiting player.
    pub fn waiting(&self) -> Option<ConnectionId> {
        self.waiting
    }

    /// Put a player in the waiting slot. Returns the previous occupant.
    pub fn set_waiting(&mut self, id: ConnectionId) -> Option<ConnectionId> {
        self.waiting.replace(id)
    }

    /// Empty the waiting slot.
    pub fn take_waiting(&mut self) -> Option<ConnectionId> {
        self.waiting.take()
    }

    /// Empty the waiting slot if `id` occupies it.
    pub fn clear_waiting_if(&mut self, id: &ConnectionId) -> bool {
        if self.waiting.as_ref() == Some(id) {
            self.waiting = None;
            true
        } else {
            false
        }
    }

    // -------------------------------------------------------------------------
    // Registry
    // -------------------------------------------------------------------------

    /// Register a session and map both players to it.
    pub fn insert(&mut self, session: MatchSession) -> MatchId {
        let id = session.id().clone();
        for player in session.state.participants() {
            self.player_sessions.insert(player, id.clone());
        }
        self.sessions.insert(id.clone(), session);
        id
    }

    /// Get a session by ID.
    pub fn get(&self, id: &MatchId) -> Option<&MatchSession> {
        self.sessions.get(id)
    }

    /// Get a session by ID, mutably.
    pub fn get_mut(&mut self, id: &MatchId) -> Option<&mut MatchSession> {
        self.sessions.get_mut(id)
    }

    /// Match a player is seated in.
    pub fn match_of(&self, player: &ConnectionId) -> Option<&MatchId> {
        self.player_sessions.get(player)
    }

    /// Remove a session, unmap its players and cancel its timers.
    pub fn remove(&mut self, id: &MatchId) -> Option<MatchSession> {
        let mut session = self.sessions.remove(id)?;
        for player in session.state.participants() {
            if self.player_sessions.get(&player) == Some(id) {
                self.player_sessions.remove(&player);
            }
        }
        session.cancel_all();
        Some(session)
    }

    /// Whether a match id is registered.
    pub fn contains(&self, id: &MatchId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Get active session count.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Ids of all active sessions.
    pub fn match_ids(&self) -> Vec<MatchId> {
        self.sessions.keys().cloned().collect()
    }
}
