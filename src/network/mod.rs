//! Network Layer
//!
//! WebSocket server, match coordination and message delivery.
//! Rules live in `game/`; this layer owns timers, sessions and sockets.

pub mod coordinator;
pub mod gateway;
pub mod matchmaker;
pub mod protocol;
pub mod server;
pub mod session;
pub mod timer;

pub use coordinator::{Command, Coordinator, CoordinatorHandle};
pub use gateway::Gateway;
pub use matchmaker::{JoinOutcome, LeaveOutcome, Matchmaker};
pub use protocol::{ClientMessage, ErrorCode, MatchSnapshot, ServerMessage};
pub use server::{GameServer, GameServerError, ServerConfig};
pub use session::{MatchSession, SessionManager};
pub use timer::ScheduledTask;
