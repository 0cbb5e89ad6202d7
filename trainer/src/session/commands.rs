use chess::PieceColor;
use tokio::sync::{broadcast, oneshot};

use super::events::SessionEvent;
use super::snapshot::SessionSnapshot;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("Session is not active")]
    NotActive,
    #[error("Illegal move: {0}")]
    IllegalMove(String),
    #[error("Not your turn")]
    NotYourTurn,
    #[error("Game already concluded")]
    GameConcluded,
    #[error("Nothing to undo")]
    NothingToUndo,
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Commands sent to the session actor. Each embeds a oneshot for the
/// reply.
pub enum SessionCommand {
    /// Turn the engine session on (fresh game) or off.
    SetEnabled {
        enabled: bool,
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    NewGame {
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    SetPlayerColor {
        color: PieceColor,
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    SetDifficulty {
        level: u8,
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    UserMove {
        /// Coordinate notation, e.g. "e2e4" or "e7e8q".
        mv: String,
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    ToggleHint {
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    Undo {
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    Resign {
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    GetSnapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Subscribe {
        reply: oneshot::Sender<(SessionSnapshot, broadcast::Receiver<SessionEvent>)>,
    },
    Shutdown,
}
