use std::time::Duration;

use engine::{AnalysisChannel, EngineStatus, InstanceKind, RankedMove};
use tokio::sync::{broadcast, mpsc};
use tracing::Instrument;

use crate::progress::ProgressLedger;

use super::commands::{SessionCommand, SessionError};
use super::evals::normalize;
use super::events::{EvalUpdate, SessionEvent};
use super::snapshot::HintMarker;
use super::state::SessionState;
use super::tasks::{TaskKind, TaskRegistry};

/// Pacing delay before the engine's reply lands on the board.
const ENGINE_REPLY_DELAY: Duration = Duration::from_millis(3000);
/// Delay before the automatic opening move when the player has black.
const AUTO_OPEN_DELAY: Duration = Duration::from_millis(500);
const HINT_LIFETIME: Duration = Duration::from_secs(5);
const QUALITY_LIFETIME: Duration = Duration::from_secs(2);

const ANALYSIS_DEPTH: u32 = 12;
const HINT_DEPTH: u32 = 14;
const TOP_MOVES_DEPTH: u32 = 14;
const TOP_MOVES_COUNT: usize = 3;

/// The three isolated engine instances one session drives.
#[derive(Clone)]
pub struct EngineSet {
    pub opponent: AnalysisChannel,
    pub analysis: AnalysisChannel,
    pub hint: AnalysisChannel,
}

impl EngineSet {
    pub async fn spawn() -> Self {
        Self {
            opponent: AnalysisChannel::spawn(InstanceKind::Opponent).await,
            analysis: AnalysisChannel::spawn(InstanceKind::Analysis).await,
            hint: AnalysisChannel::spawn(InstanceKind::Hint).await,
        }
    }

    /// All instances offline. Requests resolve to their sentinels.
    pub fn offline() -> Self {
        Self {
            opponent: AnalysisChannel::offline(InstanceKind::Opponent),
            analysis: AnalysisChannel::offline(InstanceKind::Analysis),
            hint: AnalysisChannel::offline(InstanceKind::Hint),
        }
    }

    /// Any instance without a live process behind it.
    pub fn any_offline(&self) -> bool {
        [&self.opponent, &self.analysis, &self.hint]
            .iter()
            .any(|c| c.status() == EngineStatus::Offline)
    }
}

/// Results of deferred work flowing back into the actor. Each carries
/// the position key it was computed for; stale results are dropped by
/// key comparison.
enum InternalEvent {
    EngineMove { key: String, mv: Option<String> },
    TopMoves { key: String, moves: Vec<RankedMove> },
    HintReady { key: String, mv: Option<String> },
    HintExpired,
    QualityExpired,
}

/// The main session actor loop. Owns all mutable state; commands,
/// deferred-task results, and evaluation updates are processed
/// sequentially.
pub(crate) async fn run_session_actor(
    state: SessionState,
    engines: EngineSet,
    ledger: ProgressLedger,
    cmd_rx: mpsc::Receiver<SessionCommand>,
    event_tx: broadcast::Sender<SessionEvent>,
) {
    run_inner(state, engines, ledger, cmd_rx, event_tx)
        .instrument(tracing::info_span!("session"))
        .await;
}

async fn run_inner(
    mut state: SessionState,
    engines: EngineSet,
    ledger: ProgressLedger,
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
    event_tx: broadcast::Sender<SessionEvent>,
) {
    tracing::info!("Session actor started");
    state.engine_offline = engines.any_offline();

    let (internal_tx, mut internal_rx) = mpsc::channel(32);
    let mut eval_rx = engines.analysis.evaluations();

    let mut actor = Actor {
        state,
        engines,
        ledger,
        tasks: TaskRegistry::new(),
        event_tx,
        internal_tx,
    };

    loop {
        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SessionCommand::Shutdown) | None => {
                        actor.tasks.drain();
                        actor.engines.opponent.shutdown().await;
                        actor.engines.analysis.shutdown().await;
                        actor.engines.hint.shutdown().await;
                        break;
                    }
                    Some(cmd) => actor.handle_command(cmd).await,
                }
            }

            Some(internal) = internal_rx.recv() => {
                actor.handle_internal(internal).await;
            }

            Ok(()) = eval_rx.changed() => {
                let update = eval_rx.borrow_and_update().clone();
                if let Some(raw) = update {
                    actor.on_evaluation(raw);
                }
            }
        }
    }

    tracing::info!("Session actor exited");
}

struct Actor {
    state: SessionState,
    engines: EngineSet,
    ledger: ProgressLedger,
    tasks: TaskRegistry,
    event_tx: broadcast::Sender<SessionEvent>,
    internal_tx: mpsc::Sender<InternalEvent>,
}

impl Actor {
    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::SetEnabled { enabled, reply } => {
                if enabled == self.state.enabled {
                    let _ = reply.send(Ok(self.state.snapshot()));
                    return;
                }
                if enabled {
                    self.state.enabled = true;
                    self.start_new_game().await;
                } else {
                    self.tasks.drain();
                    self.engines.opponent.cancel().await;
                    self.engines.analysis.cancel().await;
                    self.engines.hint.cancel().await;
                    self.state.enabled = false;
                    self.state.engine_thinking = false;
                    self.broadcast_state();
                }
                let _ = reply.send(Ok(self.state.snapshot()));
            }
            SessionCommand::NewGame { reply } => {
                if !self.state.enabled {
                    let _ = reply.send(Err(SessionError::NotActive));
                    return;
                }
                self.start_new_game().await;
                let _ = reply.send(Ok(self.state.snapshot()));
            }
            SessionCommand::SetPlayerColor { color, reply } => {
                if self.state.game_over() {
                    let _ = reply.send(Err(SessionError::GameConcluded));
                    return;
                }
                self.state.player_color = color;
                // Switching sides mid-game makes no sense; start over.
                if self.state.enabled {
                    self.start_new_game().await;
                }
                let _ = reply.send(Ok(self.state.snapshot()));
            }
            SessionCommand::SetDifficulty { level, reply } => {
                if self.state.game_over() {
                    let _ = reply.send(Err(SessionError::GameConcluded));
                    return;
                }
                self.state.difficulty = level;
                self.engines.opponent.configure_strength(Some(level)).await;
                self.broadcast_state();
                let _ = reply.send(Ok(self.state.snapshot()));
            }
            SessionCommand::UserMove { mv, reply } => {
                match self.state.apply_user_move(&mv) {
                    Ok(()) => {
                        self.tasks.cancel(TaskKind::HintExpiry);
                        self.tasks.cancel(TaskKind::HintLookup);
                        if self.state.game_over() {
                            self.conclude().await;
                        } else {
                            self.restart_analysis().await;
                            self.drive_engine();
                            if self.state.quality.is_some() {
                                self.schedule_quality_expiry();
                            }
                        }
                        self.broadcast_state();
                        let _ = reply.send(Ok(self.state.snapshot()));
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }
            SessionCommand::ToggleHint { reply } => {
                if !self.state.enabled {
                    let _ = reply.send(Err(SessionError::NotActive));
                    return;
                }
                if self.state.hint.take().is_some() {
                    self.tasks.cancel(TaskKind::HintExpiry);
                    self.broadcast_state();
                } else if !self.state.game_over() && self.state.is_player_turn() {
                    // Charged only once the lookup actually produces a
                    // marker, so an unavailable engine costs nothing.
                    self.request_hint();
                }
                let _ = reply.send(Ok(self.state.snapshot()));
            }
            SessionCommand::Undo { reply } => {
                match self.undo().await {
                    Ok(()) => {
                        self.broadcast_state();
                        let _ = reply.send(Ok(self.state.snapshot()));
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }
            SessionCommand::Resign { reply } => match self.state.apply_resign() {
                Ok(_) => {
                    self.conclude().await;
                    self.broadcast_state();
                    let _ = reply.send(Ok(self.state.snapshot()));
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            SessionCommand::GetSnapshot { reply } => {
                let _ = reply.send(self.state.snapshot());
            }
            SessionCommand::Subscribe { reply } => {
                let snapshot = self.state.snapshot();
                let rx = self.event_tx.subscribe();
                let _ = reply.send((snapshot, rx));
            }
            SessionCommand::Shutdown => unreachable!(),
        }
    }

    async fn handle_internal(&mut self, event: InternalEvent) {
        match event {
            InternalEvent::EngineMove { key, mv } => {
                if !self.state.enabled || self.state.game_over() || key != self.state.game.key() {
                    tracing::debug!("Dropping stale engine move");
                    self.state.engine_thinking = false;
                    return;
                }
                let Some(mv) = mv else {
                    tracing::warn!("Engine produced no move; board stays with the user");
                    self.state.engine_thinking = false;
                    self.broadcast_state();
                    return;
                };
                match self.state.apply_engine_move(&mv) {
                    Ok(()) => {
                        if self.state.game_over() {
                            self.conclude().await;
                        } else {
                            self.restart_analysis().await;
                            self.drive_engine();
                        }
                        self.broadcast_state();
                    }
                    Err(e) => {
                        tracing::error!("Failed to apply engine move {}: {}", mv, e);
                        let _ = self.event_tx.send(SessionEvent::Error(e.to_string()));
                    }
                }
            }
            InternalEvent::TopMoves { key, moves } => {
                if key == self.state.game.key() && !self.state.game_over() {
                    self.state.top_moves = moves;
                }
            }
            InternalEvent::HintReady { key, mv } => {
                if !self.state.enabled || self.state.game_over() || key != self.state.game.key() {
                    return;
                }
                let Some(mv) = mv.filter(|m| m.len() >= 4) else {
                    return;
                };
                self.state.hint = Some(HintMarker {
                    from: mv[0..2].to_string(),
                    to: mv[2..4].to_string(),
                });
                self.state.hints_used += 1;
                self.schedule_expiry(TaskKind::HintExpiry, HINT_LIFETIME, || {
                    InternalEvent::HintExpired
                });
                self.broadcast_state();
            }
            InternalEvent::HintExpired => {
                if self.state.hint.take().is_some() {
                    self.broadcast_state();
                }
            }
            InternalEvent::QualityExpired => {
                if self.state.quality.take().is_some() {
                    self.broadcast_state();
                }
            }
        }
    }

    fn on_evaluation(&mut self, raw: engine::Evaluation) {
        let value = normalize(&raw);
        let live_key = self.state.game.key();
        if self.state.evals.record(&raw.position_key, value, &live_key) {
            let _ = self.event_tx.send(SessionEvent::Evaluation(EvalUpdate {
                value,
                position_key: raw.position_key,
            }));
        }
    }

    async fn start_new_game(&mut self) {
        self.tasks.drain();
        self.engines.opponent.cancel().await;
        self.engines.hint.cancel().await;
        self.state.reset_game();
        self.engines
            .opponent
            .configure_strength(Some(self.state.difficulty))
            .await;
        self.restart_analysis().await;
        self.drive_engine();
        self.broadcast_state();
        tracing::info!(
            "New game: playing {} at difficulty {}",
            self.state.player_color,
            self.state.difficulty
        );
    }

    async fn undo(&mut self) -> Result<(), SessionError> {
        // Rewinding invalidates every pending search and timer.
        self.tasks.drain();
        self.engines.opponent.cancel().await;
        self.engines.hint.cancel().await;
        self.state.apply_undo()?;
        self.restart_analysis().await;
        self.drive_engine();
        Ok(())
    }

    async fn conclude(&mut self) {
        self.tasks.drain();
        self.engines.opponent.cancel().await;
        self.engines.analysis.cancel().await;
        self.engines.hint.cancel().await;
        if let Some(result) = self.state.result {
            self.ledger
                .settle_match(result.winner, self.state.player_color, self.state.match_xp);
        }
    }

    async fn restart_analysis(&mut self) {
        self.engines
            .analysis
            .start_analysis(&self.state.game.to_fen(), ANALYSIS_DEPTH)
            .await;
    }

    /// Put the game in motion for whoever is to move: schedule the
    /// engine's reply, or fetch fresh candidates for the user's turn.
    fn drive_engine(&mut self) {
        if !self.state.enabled || self.state.game_over() {
            return;
        }
        if self.state.is_player_turn() {
            self.refresh_top_moves();
        } else {
            let (kind, delay) = if self.state.game.history().is_empty() {
                (TaskKind::AutoOpen, AUTO_OPEN_DELAY)
            } else {
                (TaskKind::EngineReply, ENGINE_REPLY_DELAY)
            };
            self.schedule_engine_reply(kind, delay);
        }
    }

    fn schedule_engine_reply(&mut self, kind: TaskKind, delay: Duration) {
        self.state.engine_thinking = true;
        let opponent = self.engines.opponent.clone();
        let fen = self.state.game.to_fen();
        let key = self.state.game.key();
        let level = self.state.difficulty;
        let tx = self.internal_tx.clone();
        self.tasks.set(
            kind,
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let mv = opponent.best_move(&fen, Some(level), None).await;
                let _ = tx.send(InternalEvent::EngineMove { key, mv }).await;
            }),
        );
    }

    fn refresh_top_moves(&mut self) {
        let channel = self.engines.hint.clone();
        let fen = self.state.game.to_fen();
        let key = self.state.game.key();
        let tx = self.internal_tx.clone();
        self.tasks.set(
            TaskKind::TopMoves,
            tokio::spawn(async move {
                let moves = channel.top_moves(&fen, TOP_MOVES_COUNT, TOP_MOVES_DEPTH).await;
                let _ = tx.send(InternalEvent::TopMoves { key, moves }).await;
            }),
        );
    }

    fn request_hint(&mut self) {
        let channel = self.engines.hint.clone();
        let fen = self.state.game.to_fen();
        let key = self.state.game.key();
        let tx = self.internal_tx.clone();
        self.tasks.set(
            TaskKind::HintLookup,
            tokio::spawn(async move {
                let mv = channel.best_move(&fen, None, Some(HINT_DEPTH)).await;
                let _ = tx.send(InternalEvent::HintReady { key, mv }).await;
            }),
        );
    }

    fn schedule_quality_expiry(&mut self) {
        self.schedule_expiry(TaskKind::QualityExpiry, QUALITY_LIFETIME, || {
            InternalEvent::QualityExpired
        });
    }

    fn schedule_expiry<F>(&mut self, kind: TaskKind, after: Duration, event: F)
    where
        F: FnOnce() -> InternalEvent + Send + 'static,
    {
        let tx = self.internal_tx.clone();
        self.tasks.set(
            kind,
            tokio::spawn(async move {
                tokio::time::sleep(after).await;
                let _ = tx.send(event()).await;
            }),
        );
    }

    fn broadcast_state(&self) {
        let _ = self
            .event_tx
            .send(SessionEvent::StateChanged(self.state.snapshot()));
    }
}
