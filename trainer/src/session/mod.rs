//! Engine session actor: a full game against the engine, with live
//! evaluation, move-quality tagging, hints, undo, and settlement into
//! the progression ledger.

mod actor;
mod commands;
mod evals;
mod events;
mod handle;
mod quality;
mod snapshot;
mod state;
mod tasks;

pub use actor::EngineSet;
pub use commands::SessionError;
pub use evals::{normalize, EvalEntry, EvalLedger, NormalizedEval};
pub use events::{EvalUpdate, SessionEvent};
pub use handle::SessionHandle;
pub use quality::{classify, MoveQuality};
pub use snapshot::{HintMarker, MoveRecord, SessionSnapshot};
pub use state::{GameOverReason, GameResult};
pub use tasks::{TaskKind, TaskRegistry};

use chess::PieceColor;
use tokio::sync::{broadcast, mpsc};

use crate::progress::ProgressLedger;

/// Spawn a session actor and return its handle. The session starts
/// disabled; enable it to begin a game.
pub fn spawn_session(
    engines: EngineSet,
    ledger: ProgressLedger,
    player_color: PieceColor,
    difficulty: u8,
) -> SessionHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (event_tx, _) = broadcast::channel(100);
    let state = state::SessionState::new(player_color, difficulty);
    tokio::spawn(actor::run_session_actor(
        state, engines, ledger, cmd_rx, event_tx,
    ));
    SessionHandle::new(cmd_tx)
}
