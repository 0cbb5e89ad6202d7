use chess::PieceColor;
use tokio::sync::{broadcast, mpsc, oneshot};

use super::commands::{SessionCommand, SessionError};
use super::events::SessionEvent;
use super::snapshot::SessionSnapshot;

/// Cheap, cloneable handle to a session actor.
#[derive(Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub(crate) fn new(cmd_tx: mpsc::Sender<SessionCommand>) -> Self {
        Self { cmd_tx }
    }

    pub async fn set_enabled(&self, enabled: bool) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| SessionCommand::SetEnabled { enabled, reply })
            .await
    }

    pub async fn new_game(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| SessionCommand::NewGame { reply }).await
    }

    pub async fn set_player_color(
        &self,
        color: PieceColor,
    ) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| SessionCommand::SetPlayerColor { color, reply })
            .await
    }

    pub async fn set_difficulty(&self, level: u8) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| SessionCommand::SetDifficulty { level, reply })
            .await
    }

    pub async fn user_move(&self, mv: impl Into<String>) -> Result<SessionSnapshot, SessionError> {
        let mv = mv.into();
        self.request(|reply| SessionCommand::UserMove { mv, reply })
            .await
    }

    pub async fn toggle_hint(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| SessionCommand::ToggleHint { reply })
            .await
    }

    pub async fn undo(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| SessionCommand::Undo { reply }).await
    }

    pub async fn resign(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| SessionCommand::Resign { reply }).await
    }

    pub async fn get_snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::GetSnapshot { reply: tx }).await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))
    }

    pub async fn subscribe(
        &self,
    ) -> Result<(SessionSnapshot, broadcast::Receiver<SessionEvent>), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Subscribe { reply: tx }).await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))
    }

    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(SessionCommand::Shutdown).await;
    }

    async fn request<F>(&self, build: F) -> Result<SessionSnapshot, SessionError>
    where
        F: FnOnce(oneshot::Sender<Result<SessionSnapshot, SessionError>>) -> SessionCommand,
    {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx)).await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))?
    }

    async fn send(&self, cmd: SessionCommand) -> Result<(), SessionError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| SessionError::Internal("Session actor closed".into()))
    }
}
