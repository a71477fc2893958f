//! # Trivia Clash Server
//!
//! Authoritative match server for a two-player territory-conquest trivia game.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   TRIVIA CLASH SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Shared data                               │
//! │  └── region.rs   - Region adjacency graph                    │
//! │                                                              │
//! │  game/           - Match rules (no I/O)                      │
//! │  ├── question.rs - Question model and validation             │
//! │  ├── state.rs    - Match and player state                    │
//! │  ├── round.rs    - Round scoring, pacing config              │
//! │  └── territory.rs- Claims and attacks                        │
//! │                                                              │
//! │  question/       - Question sources                          │
//! │  ├── pool.rs     - Built-in rotating pool                    │
//! │  └── gemini.rs   - Generative-text trivia service            │
//! │                                                              │
//! │  network/        - Coordination and transport                │
//! │  ├── coordinator.rs - Single-dispatcher match actor          │
//! │  ├── matchmaker.rs  - Waiting slot pairing                   │
//! │  ├── session.rs     - Session store, per-match timers        │
//! │  ├── timer.rs       - Cancellable scheduled tasks            │
//! │  ├── gateway.rs     - Outbound delivery                      │
//! │  ├── protocol.rs    - Message types                          │
//! │  └── server.rs      - WebSocket server                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//!
//! Every match mutation happens on the coordinator task. Sockets, question
//! fetches and timers communicate with it only through its command queue,
//! so the session store needs no locks.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;
pub mod question;

// Re-export commonly used types
pub use crate::core::region::{RegionGraph, RegionId};
pub use game::round::MatchConfig;
pub use game::state::{ConnectionId, MatchId, MatchState};
pub use network::{Coordinator, CoordinatorHandle, GameServer, ServerConfig};
pub use question::{QuestionBackend, QuestionSource, QuestionSourceError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
