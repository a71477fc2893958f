//! Match Coordinator
//!
//! The single dispatcher that owns every match. All state mutation happens
//! inside one task fed by a command queue; connection tasks, question
//! fetches and timers only ever post commands.
//!
//! ```text
//! socket tasks ──┐
//! fetch tasks  ──┼──► mpsc<Command> ──► Coordinator ──► Gateway ──► sockets
//! timers       ──┘                      (SessionManager)
//! ```
//!
//! Posted commands carry the match id and a round number or fetch token.
//! A command whose match is gone, or whose round has moved on, is dropped.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::core::region::{RegionGraph, RegionId};
use crate::game::question::Question;
use crate::game::round::{is_final_round, resolve_round, MatchConfig};
use crate::game::state::{AnswerOutcome, ConnectionId, MatchId, MatchPhase, RuleSet};
use crate::game::territory::{resolve_attack, select_region, Selection};
use crate::network::gateway::Gateway;
use crate::network::matchmaker::{JoinOutcome, LeaveOutcome, Matchmaker};
use crate::network::protocol::{
    AttackResultInfo, ClientMessage, ErrorCode, MatchSnapshot, RoundResultInfo, ServerMessage,
};
use crate::network::session::SessionManager;
use crate::network::timer::ScheduledTask;
use crate::question::{QuestionSource, QuestionSourceError};

/// Capacity of the command queue.
pub const COMMAND_QUEUE_CAPACITY: usize = 1024;

// =============================================================================
// COMMANDS
// =============================================================================

/// Everything the coordinator reacts to.
#[derive(Debug)]
pub enum Command {
    /// A socket was accepted.
    Connected {
        /// New connection.
        conn: ConnectionId,
        /// Its outbound queue.
        sender: mpsc::Sender<ServerMessage>,
    },
    /// A parsed client frame.
    Message {
        /// Sender.
        conn: ConnectionId,
        /// Frame.
        msg: ClientMessage,
    },
    /// A socket closed.
    Disconnected {
        /// Closed connection.
        conn: ConnectionId,
    },
    /// A question fetch finished.
    QuestionFetched {
        /// Match that asked.
        match_id: MatchId,
        /// Fetch token.
        seq: u64,
        /// Question or failure.
        result: Result<Question, QuestionSourceError>,
    },
    /// A round timer fired.
    RoundTimeout {
        /// Match.
        match_id: MatchId,
        /// Round the timer was armed for.
        round: u32,
    },
    /// The inter-round delay elapsed.
    NextRound {
        /// Match.
        match_id: MatchId,
        /// Round that was just resolved.
        round: u32,
    },
    /// Stop the coordinator.
    Shutdown,
}

/// Cloneable handle for posting commands.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    /// Post a command. Returns false if the coordinator has stopped.
    pub async fn send(&self, command: Command) -> bool {
        self.tx.send(command).await.is_ok()
    }

    /// Announce a new connection.
    pub async fn connected(&self, conn: ConnectionId, sender: mpsc::Sender<ServerMessage>) -> bool {
        self.send(Command::Connected { conn, sender }).await
    }

    /// Forward a client frame.
    pub async fn message(&self, conn: ConnectionId, msg: ClientMessage) -> bool {
        self.send(Command::Message { conn, msg }).await
    }

    /// Announce a closed connection.
    pub async fn disconnected(&self, conn: ConnectionId) -> bool {
        self.send(Command::Disconnected { conn }).await
    }

    /// Ask the coordinator to stop.
    pub async fn shutdown(&self) -> bool {
        self.send(Command::Shutdown).await
    }
}

// =============================================================================
// COORDINATOR
// =============================================================================

/// Owns the session store and drives every match.
pub struct Coordinator<Q: QuestionSource> {
    config: MatchConfig,
    graph: Arc<RegionGraph>,
    source: Arc<Q>,
    sessions: SessionManager,
    matchmaker: Matchmaker,
    gateway: Gateway,
    tx: mpsc::Sender<Command>,
    rx: mpsc::Receiver<Command>,
}

impl<Q: QuestionSource> Coordinator<Q> {
    /// Create a coordinator and the handle used to feed it.
    pub fn new(config: MatchConfig, graph: Arc<RegionGraph>, source: Arc<Q>) -> (Self, CoordinatorHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let handle = CoordinatorHandle { tx: tx.clone() };
        let coordinator = Self {
            matchmaker: Matchmaker::new(config.ruleset),
            config,
            graph,
            source,
            sessions: SessionManager::new(),
            gateway: Gateway::new(),
            tx,
            rx,
        };
        (coordinator, handle)
    }

    /// Session store (read-only).
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Process commands until shutdown.
    pub async fn run(mut self) {
        info!(
            "Coordinator running: {:?} ruleset, {} regions, round cap {}",
            self.config.ruleset,
            self.graph.len(),
            self.config.round_cap
        );
        while self.step().await {}
        info!("Coordinator stopped");
    }

    /// Wait for one command and handle it. Returns false once stopped.
    pub async fn step(&mut self) -> bool {
        match self.rx.recv().await {
            Some(command) => self.handle(command),
            None => false,
        }
    }

    /// Handle one command. Returns false on shutdown.
    pub fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Connected { conn, sender } => {
                debug!("Connection {} registered", conn.short());
                self.gateway.register(conn, sender);
            }
            Command::Message { conn, msg } => self.on_message(conn, msg),
            Command::Disconnected { conn } => {
                self.leave(&conn);
                self.gateway.unregister(&conn);
                debug!("Connection {} unregistered", conn.short());
            }
            Command::QuestionFetched { match_id, seq, result } => {
                self.on_question_fetched(&match_id, seq, result)
            }
            Command::RoundTimeout { match_id, round } => self.on_round_timeout(&match_id, round),
            Command::NextRound { match_id, round } => self.on_next_round(&match_id, round),
            Command::Shutdown => {
                let ids = self.sessions.match_ids();
                info!("Shutting down, ending {} matches", ids.len());
                for id in ids {
                    self.sessions.remove(&id);
                }
                return false;
            }
        }
        true
    }

    fn on_message(&mut self, conn: ConnectionId, msg: ClientMessage) {
        match msg {
            ClientMessage::Join => self.join(conn),
            ClientMessage::Leave => self.leave(&conn),
            ClientMessage::SubmitAnswer { match_id, answer } => {
                self.submit_answer(&MatchId(match_id), &conn, &answer)
            }
            ClientMessage::SelectRegion { region, topic, difficulty } => {
                self.on_select_region(&conn, region, topic, difficulty)
            }
            ClientMessage::Ping { timestamp } => {
                self.gateway.send(
                    &conn,
                    ServerMessage::Pong {
                        timestamp,
                        server_time: chrono::Utc::now().timestamp_millis(),
                    },
                );
            }
        }
    }

    // -------------------------------------------------------------------------
    // Matchmaking
    // -------------------------------------------------------------------------

    fn join(&mut self, conn: ConnectionId) {
        match self.matchmaker.join(&mut self.sessions, conn) {
            JoinOutcome::Waiting | JoinOutcome::AlreadyWaiting => {
                info!("Player {} waiting for an opponent", conn.short());
                self.gateway.send(&conn, ServerMessage::Waiting);
            }
            JoinOutcome::AlreadyInMatch(match_id) => {
                debug!("Player {} already in match {}", conn.short(), match_id);
                self.gateway.send(
                    &conn,
                    ServerMessage::error(ErrorCode::AlreadyInMatch, "Already in a match"),
                );
            }
            JoinOutcome::Matched(match_id) => {
                let Some(session) = self.sessions.get(&match_id) else {
                    return;
                };
                let found = ServerMessage::MatchFound(MatchSnapshot::from(&session.state));
                self.gateway.broadcast(&session.state.participants(), &found);

                if session.state.ruleset == RuleSet::Rounds {
                    let topic = self.config.pick_topic().to_string();
                    let difficulty = self.config.difficulty.clone();
                    self.request_question(&match_id, topic, difficulty);
                }
            }
        }
    }

    fn leave(&mut self, conn: &ConnectionId) {
        match self.matchmaker.leave(&mut self.sessions, conn) {
            LeaveOutcome::NotFound => {}
            LeaveOutcome::LeftQueue => {
                info!("Player {} left the queue", conn.short());
            }
            LeaveOutcome::MatchAbandoned { match_id, remaining } => {
                info!("Player {} left, match {} ended", conn.short(), match_id);
                self.gateway.send(&remaining, ServerMessage::OpponentDisconnected);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Round lifecycle
    // -------------------------------------------------------------------------

    /// Start fetching the next question for a match.
    fn request_question(&mut self, match_id: &MatchId, topic: String, difficulty: String) {
        let Some(session) = self.sessions.get_mut(match_id) else {
            return;
        };
        session.state.phase = MatchPhase::AwaitingQuestion;
        let seq = session.begin_fetch();
        debug!("Match {} fetching question #{} ({}/{})", match_id, seq, topic, difficulty);

        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        let match_id = match_id.clone();
        tokio::spawn(async move {
            let result = source.fetch_question(&topic, &difficulty).await;
            if tx.send(Command::QuestionFetched { match_id, seq, result }).await.is_err() {
                debug!("Coordinator gone, dropping fetched question");
            }
        });
    }

    fn on_question_fetched(
        &mut self,
        match_id: &MatchId,
        seq: u64,
        result: Result<Question, QuestionSourceError>,
    ) {
        let Some(session) = self.sessions.get_mut(match_id) else {
            debug!("Question for removed match {} dropped", match_id);
            return;
        };
        if !session.is_current_fetch(seq) || session.state.phase != MatchPhase::AwaitingQuestion {
            debug!("Stale question #{} for match {} dropped", seq, match_id);
            return;
        }

        let question = match result {
            Ok(question) => question,
            Err(e) => {
                warn!("Question fetch failed for match {}: {}", match_id, e);
                self.end_match_with_error(match_id, &e);
                return;
            }
        };

        let public = question.public();
        let round = session.state.begin_round(question);
        let timeout = self.config.round_timeout;
        session.arm_round_timer(post_after(
            &self.tx,
            timeout,
            Command::RoundTimeout { match_id: match_id.clone(), round },
        ));

        info!("Match {} round {} started", match_id, round);
        self.gateway.broadcast(
            &session.state.participants(),
            &ServerMessage::NewQuestion {
                question: public,
                round,
                time_limit_ms: duration_ms(timeout),
            },
        );
    }

    fn submit_answer(&mut self, match_id: &MatchId, conn: &ConnectionId, answer: &str) {
        let Some(session) = self.sessions.get_mut(match_id) else {
            debug!("Answer from {} for unknown match {} ignored", conn.short(), match_id);
            return;
        };

        match session.state.record_answer(conn, answer) {
            AnswerOutcome::Recorded => {}
            outcome => {
                debug!("Answer from {} ignored: {:?}", conn.short(), outcome);
                return;
            }
        }

        if session.state.all_answered() {
            session.cancel_round_timer();
            self.resolve(match_id);
        } else if let Some(opponent) = session.state.opponent_of(conn) {
            self.gateway.send(&opponent, ServerMessage::OpponentAnswered);
        }
    }

    fn on_round_timeout(&mut self, match_id: &MatchId, round: u32) {
        let Some(session) = self.sessions.get_mut(match_id) else {
            debug!("Timer for removed match {} ignored", match_id);
            return;
        };
        if session.state.round != round || session.state.phase != MatchPhase::QuestionLive {
            debug!("Stale timer for match {} round {} ignored", match_id, round);
            return;
        }
        session.cancel_round_timer();
        info!("Match {} round {} timed out", match_id, round);
        self.resolve(match_id);
    }

    /// Score the live question and decide what follows.
    fn resolve(&mut self, match_id: &MatchId) {
        match self.sessions.get(match_id).map(|s| s.state.ruleset) {
            Some(RuleSet::Rounds) => self.finish_round(match_id),
            Some(RuleSet::Territorial) => self.finish_attack(match_id),
            None => {}
        }
    }

    fn finish_round(&mut self, match_id: &MatchId) {
        let Some(session) = self.sessions.get_mut(match_id) else {
            return;
        };
        let Some(outcome) = resolve_round(&mut session.state) else {
            return;
        };
        let participants = session.state.participants();
        let round = outcome.round;

        info!(
            "Match {} round {} result: {}",
            match_id,
            round,
            outcome.winner.map(|w| w.short()).unwrap_or_else(|| "draw".to_string())
        );

        if is_final_round(&session.state, &self.config) {
            session.state.phase = MatchPhase::GameOver;
            let result = ServerMessage::RoundResult(RoundResultInfo::new(outcome, &session.state));
            let over = ServerMessage::GameOver(MatchSnapshot::from(&session.state));
            self.sessions.remove(match_id);

            info!("Match {} over after {} rounds", match_id, round);
            self.gateway.broadcast(&participants, &result);
            self.gateway.broadcast(&participants, &over);
            return;
        }

        session.state.phase = MatchPhase::AwaitingQuestion;
        let result = ServerMessage::RoundResult(RoundResultInfo::new(outcome, &session.state));
        session.schedule_next_round(post_after(
            &self.tx,
            self.config.inter_round_delay,
            Command::NextRound { match_id: match_id.clone(), round },
        ));
        self.gateway.broadcast(&participants, &result);
    }

    fn finish_attack(&mut self, match_id: &MatchId) {
        let Some(session) = self.sessions.get_mut(match_id) else {
            return;
        };
        let Some(outcome) = resolve_attack(&mut session.state) else {
            return;
        };

        info!(
            "Match {} attack on {} by {}: {}",
            match_id,
            outcome.region,
            outcome.attacker.short(),
            if outcome.captured { "captured" } else { "repelled" }
        );

        let result = ServerMessage::AttackResult(AttackResultInfo::new(outcome, &session.state));
        self.gateway.broadcast(&session.state.participants(), &result);
    }

    fn on_next_round(&mut self, match_id: &MatchId, round: u32) {
        let Some(session) = self.sessions.get_mut(match_id) else {
            debug!("Next round for removed match {} ignored", match_id);
            return;
        };
        if session.state.round != round || session.state.phase != MatchPhase::AwaitingQuestion {
            debug!("Stale next round for match {} ignored", match_id);
            return;
        }
        session.clear_next_round();

        let topic = self.config.pick_topic().to_string();
        let difficulty = self.config.difficulty.clone();
        self.request_question(match_id, topic, difficulty);
    }

    /// Tell both players the match cannot continue and drop it.
    fn end_match_with_error(&mut self, match_id: &MatchId, error: &QuestionSourceError) {
        let Some(session) = self.sessions.remove(match_id) else {
            return;
        };
        info!("Match {} ended: question unavailable", match_id);
        self.gateway.broadcast(
            &session.state.participants(),
            &ServerMessage::error(
                ErrorCode::QuestionUnavailable,
                format!("Could not load a question: {error}"),
            ),
        );
    }

    // -------------------------------------------------------------------------
    // Territorial
    // -------------------------------------------------------------------------

    fn on_select_region(
        &mut self,
        conn: &ConnectionId,
        region: RegionId,
        topic: Option<String>,
        difficulty: Option<String>,
    ) {
        let Some(match_id) = self.sessions.match_of(conn).cloned() else {
            debug!("Selection from {} outside a match ignored", conn.short());
            return;
        };
        let Some(session) = self.sessions.get_mut(&match_id) else {
            return;
        };

        match select_region(&mut session.state, &self.graph, conn, &region) {
            Ok(Selection::Claimed { region, slot }) => {
                info!("Match {} {:?} claimed {}", match_id, slot, region);
                let update = ServerMessage::TerritoryUpdate(MatchSnapshot::from(&session.state));
                self.gateway.broadcast(&session.state.participants(), &update);
            }
            Ok(Selection::Attack { region, slot }) => {
                info!("Match {} {:?} attacks {}", match_id, slot, region);
                let topic = topic.unwrap_or_else(|| self.config.pick_topic().to_string());
                let difficulty = difficulty.unwrap_or_else(|| self.config.difficulty.clone());
                self.request_question(&match_id, topic, difficulty);
            }
            Err(rejected) => {
                debug!("Selection of {} by {} ignored: {}", region, conn.short(), rejected);
            }
        }
    }
}

/// Schedule `command` to be posted after `delay`.
fn post_after(tx: &mpsc::Sender<Command>, delay: Duration, command: Command) -> ScheduledTask {
    let tx = tx.clone();
    ScheduledTask::after(delay, async move {
        let _ = tx.send(command).await;
    })
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
