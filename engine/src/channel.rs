//! Asynchronous request/response wrapper around one engine process.
//!
//! Each channel instance owns its own process and at most one outstanding
//! search: issuing a new request first cancels the previous one, so
//! responses always correspond to the most recent request.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot, watch};

use chess::{position_key, PieceColor};

use crate::stockfish::StockfishProcess;
use crate::uci::UciMessage;
use crate::{score_to_cp, Evaluation, RankedMove, ScoreKind};

/// The three isolated channel instances used by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceKind {
    /// Plays engine replies at the configured difficulty.
    Opponent,
    /// Continuous background evaluation of the current position.
    Analysis,
    /// On-demand best-move and top-moves lookups at full strength.
    Hint,
}

impl InstanceKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Opponent => "opponent",
            Self::Analysis => "analysis",
            Self::Hint => "hint",
        }
    }

    /// Minimum score swing (centipawns) that bypasses the time throttle.
    fn significance_threshold(self) -> i32 {
        match self {
            Self::Analysis => 2,
            _ => 5,
        }
    }

    /// Minimum interval between surfaced updates with small swings.
    fn min_interval(self) -> Duration {
        match self {
            Self::Analysis => Duration::from_millis(150),
            _ => Duration::from_millis(300),
        }
    }
}

/// Whether the underlying process could be started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Ready,
    /// Process creation failed; every request resolves with its sentinel.
    Offline,
}

enum Request {
    ConfigureStrength {
        level: Option<u8>,
    },
    BestMove {
        fen: String,
        level: Option<u8>,
        depth_override: Option<u32>,
        reply: oneshot::Sender<Option<String>>,
    },
    TopMoves {
        fen: String,
        count: usize,
        depth: u32,
        reply: oneshot::Sender<Vec<RankedMove>>,
    },
    StartAnalysis {
        fen: String,
        depth: u32,
    },
    Cancel,
    Shutdown,
}

/// Handle to one channel instance. Cheap to clone.
#[derive(Clone)]
pub struct AnalysisChannel {
    kind: InstanceKind,
    status: EngineStatus,
    req_tx: Option<mpsc::Sender<Request>>,
    eval_rx: watch::Receiver<Option<Evaluation>>,
    // Keeps the watch alive for offline channels.
    _offline_eval_tx: Option<Arc<watch::Sender<Option<Evaluation>>>>,
}

impl AnalysisChannel {
    /// Spawn the engine process for this instance. On failure the channel
    /// comes up offline and degrades to sentinel results instead of
    /// erroring.
    pub async fn spawn(kind: InstanceKind) -> Self {
        match StockfishProcess::spawn().await {
            Ok(process) => {
                let (req_tx, req_rx) = mpsc::channel(32);
                let (eval_tx, eval_rx) = watch::channel(None);
                let actor = ChannelActor::new(kind, process, eval_tx);
                tokio::spawn(actor.run(req_rx));
                Self {
                    kind,
                    status: EngineStatus::Ready,
                    req_tx: Some(req_tx),
                    eval_rx,
                    _offline_eval_tx: None,
                }
            }
            Err(e) => {
                tracing::warn!("{}: engine unavailable: {}", kind.label(), e);
                Self::offline(kind)
            }
        }
    }

    /// A channel with no engine behind it. Used when process creation
    /// fails, and by tests exercising degraded mode.
    pub fn offline(kind: InstanceKind) -> Self {
        let (eval_tx, eval_rx) = watch::channel(None);
        Self {
            kind,
            status: EngineStatus::Offline,
            req_tx: None,
            eval_rx,
            _offline_eval_tx: Some(Arc::new(eval_tx)),
        }
    }

    pub fn kind(&self) -> InstanceKind {
        self.kind
    }

    pub fn status(&self) -> EngineStatus {
        self.status
    }

    /// Stream of throttled evaluation updates from this instance.
    pub fn evaluations(&self) -> watch::Receiver<Option<Evaluation>> {
        self.eval_rx.clone()
    }

    /// Map a difficulty level to engine strength options. `None` requests
    /// unconstrained maximum strength.
    pub async fn configure_strength(&self, level: Option<u8>) {
        self.send(Request::ConfigureStrength { level }).await;
    }

    /// Depth-bounded best-move search. `level` is the difficulty to play
    /// at, `None` for full strength. Cancels any in-flight request on
    /// this instance first. Resolves `None` when the engine is offline,
    /// cancelled, or yields no legal move.
    pub async fn best_move(
        &self,
        fen: &str,
        level: Option<u8>,
        depth_override: Option<u32>,
    ) -> Option<String> {
        let req_tx = self.req_tx.as_ref()?;
        let (reply, rx) = oneshot::channel();
        let req = Request::BestMove {
            fen: fen.to_string(),
            level,
            depth_override,
            reply,
        };
        if req_tx.send(req).await.is_err() {
            return None;
        }
        rx.await.unwrap_or(None)
    }

    /// Multi-line search for the `count` best moves, descending by score.
    pub async fn top_moves(&self, fen: &str, count: usize, depth: u32) -> Vec<RankedMove> {
        let Some(req_tx) = self.req_tx.as_ref() else {
            return Vec::new();
        };
        let (reply, rx) = oneshot::channel();
        let req = Request::TopMoves {
            fen: fen.to_string(),
            count,
            depth,
            reply,
        };
        if req_tx.send(req).await.is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Start continuous background evaluation: a shallow fast pass for
    /// immediate feedback, then the requested depth. Updates arrive on
    /// [`Self::evaluations`].
    pub async fn start_analysis(&self, fen: &str, depth: u32) {
        self.send(Request::StartAnalysis {
            fen: fen.to_string(),
            depth,
        })
        .await;
    }

    /// Stop any in-flight search. Idempotent.
    pub async fn cancel(&self) {
        self.send(Request::Cancel).await;
    }

    pub async fn shutdown(&self) {
        self.send(Request::Shutdown).await;
    }

    async fn send(&self, req: Request) {
        if let Some(tx) = self.req_tx.as_ref() {
            let _ = tx.send(req).await;
        }
    }
}

/// The single outstanding request slot.
enum Pending {
    Idle,
    BestMove {
        reply: oneshot::Sender<Option<String>>,
    },
    TopMoves {
        reply: oneshot::Sender<Vec<RankedMove>>,
        lines: BTreeMap<u32, RankedMove>,
        count: usize,
        best_depth: u32,
    },
    Analysis {
        /// Deep pass still to be issued once the shallow pass terminates.
        deep_depth: Option<u32>,
    },
}

struct ChannelActor {
    kind: InstanceKind,
    process: StockfishProcess,
    pending: Pending,
    /// Terminators owed by searches that were cancelled with `stop`.
    discard_bestmoves: u32,
    cur_turn: PieceColor,
    cur_key: String,
    eval_tx: watch::Sender<Option<Evaluation>>,
    throttle: Throttle,
}

impl ChannelActor {
    fn new(
        kind: InstanceKind,
        process: StockfishProcess,
        eval_tx: watch::Sender<Option<Evaluation>>,
    ) -> Self {
        Self {
            kind,
            process,
            pending: Pending::Idle,
            discard_bestmoves: 0,
            cur_turn: PieceColor::White,
            cur_key: position_key(""),
            eval_tx,
            throttle: Throttle::new(kind.significance_threshold(), kind.min_interval()),
        }
    }

    async fn run(mut self, mut req_rx: mpsc::Receiver<Request>) {
        tracing::debug!("{}: channel actor started", self.kind.label());
        loop {
            tokio::select! {
                req = req_rx.recv() => {
                    match req {
                        Some(Request::Shutdown) | None => {
                            self.cancel_pending().await;
                            self.process.shutdown().await;
                            break;
                        }
                        Some(req) => self.handle_request(req).await,
                    }
                }
                Some(msg) = self.process.recv() => {
                    self.handle_message(msg).await;
                }
            }
        }
        tracing::debug!("{}: channel actor exited", self.kind.label());
    }

    async fn handle_request(&mut self, req: Request) {
        match req {
            Request::ConfigureStrength { level } => {
                self.send_strength(level).await;
            }
            Request::BestMove {
                fen,
                level,
                depth_override,
                reply,
            } => {
                self.cancel_pending().await;
                self.send_strength(level).await;
                self.set_position(&fen).await;
                let depth =
                    depth_override.unwrap_or_else(|| search_depth(level.unwrap_or(0)));
                self.process.send(format!("go depth {}", depth)).await;
                self.pending = Pending::BestMove { reply };
            }
            Request::TopMoves {
                fen,
                count,
                depth,
                reply,
            } => {
                self.cancel_pending().await;
                self.send_strength(None).await;
                self.process
                    .send(format!("setoption name MultiPV value {}", count))
                    .await;
                self.set_position(&fen).await;
                self.process.send(format!("go depth {}", depth)).await;
                self.pending = Pending::TopMoves {
                    reply,
                    lines: BTreeMap::new(),
                    count,
                    best_depth: 0,
                };
            }
            Request::StartAnalysis { fen, depth } => {
                self.cancel_pending().await;
                self.send_strength(None).await;
                self.set_position(&fen).await;
                // Seed a neutral value under the new key so consumers see a
                // defined evaluation while the deep search is pending.
                let _ = self
                    .eval_tx
                    .send(Some(Evaluation::pending(self.cur_turn, self.cur_key.clone())));
                // Fast shallow pass first; the deep pass is issued when the
                // shallow search terminates.
                self.process.send("go depth 1").await;
                self.pending = Pending::Analysis {
                    deep_depth: Some(depth),
                };
            }
            Request::Cancel => {
                self.cancel_pending().await;
            }
            Request::Shutdown => unreachable!(),
        }
    }

    async fn handle_message(&mut self, msg: UciMessage) {
        match msg {
            UciMessage::BestMove { mv, .. } => {
                if self.discard_bestmoves > 0 {
                    self.discard_bestmoves -= 1;
                    tracing::trace!("{}: discarding stale bestmove {}", self.kind.label(), mv);
                    return;
                }
                match std::mem::replace(&mut self.pending, Pending::Idle) {
                    Pending::Idle => {}
                    Pending::BestMove { reply } => {
                        let result = if mv == "(none)" || mv.len() < 4 {
                            None
                        } else {
                            Some(mv)
                        };
                        let _ = reply.send(result);
                    }
                    Pending::TopMoves {
                        reply,
                        lines,
                        count,
                        ..
                    } => {
                        // Restore single-line mode for subsequent requests.
                        self.process.send("setoption name MultiPV value 1").await;
                        let _ = reply.send(rank_lines(lines, count));
                    }
                    Pending::Analysis { deep_depth } => {
                        if let Some(depth) = deep_depth {
                            self.process.send(format!("go depth {}", depth)).await;
                            self.pending = Pending::Analysis { deep_depth: None };
                        }
                    }
                }
            }
            UciMessage::Info(info) => {
                if let Some((kind, value)) = info.score {
                    if let Pending::TopMoves {
                        lines, best_depth, ..
                    } = &mut self.pending
                    {
                        let depth = info.depth.unwrap_or(0);
                        let line = info.multipv.unwrap_or(1);
                        if let Some(first) = info.pv.first() {
                            if depth >= *best_depth {
                                *best_depth = depth;
                                lines.insert(
                                    line,
                                    RankedMove {
                                        mv: first.clone(),
                                        score: value,
                                        kind,
                                        depth,
                                    },
                                );
                            }
                        }
                    }

                    if self.throttle.admit(value, Instant::now()) {
                        let _ = self.eval_tx.send(Some(Evaluation {
                            kind,
                            value,
                            turn: self.cur_turn,
                            position_key: self.cur_key.clone(),
                        }));
                    }
                }
            }
            UciMessage::UciOk | UciMessage::ReadyOk | UciMessage::Id { .. } => {}
        }
    }

    /// Stop the in-flight search, if any, resolving its consumer with the
    /// cancellation sentinel.
    async fn cancel_pending(&mut self) {
        match std::mem::replace(&mut self.pending, Pending::Idle) {
            Pending::Idle => {}
            Pending::BestMove { reply } => {
                self.process.send("stop").await;
                self.discard_bestmoves += 1;
                let _ = reply.send(None);
            }
            Pending::TopMoves { reply, .. } => {
                self.process.send("stop").await;
                self.process.send("setoption name MultiPV value 1").await;
                self.discard_bestmoves += 1;
                let _ = reply.send(Vec::new());
            }
            Pending::Analysis { .. } => {
                self.process.send("stop").await;
                self.discard_bestmoves += 1;
            }
        }
    }

    async fn send_strength(&mut self, level: Option<u8>) {
        match level {
            None => {
                self.process
                    .send("setoption name UCI_LimitStrength value false")
                    .await;
                self.process.send("setoption name Skill Level value 20").await;
            }
            Some(level) => {
                let (skill, elo) = strength_settings(level);
                self.process
                    .send(format!("setoption name Skill Level value {}", skill))
                    .await;
                self.process
                    .send("setoption name UCI_LimitStrength value true")
                    .await;
                self.process
                    .send(format!("setoption name UCI_Elo value {}", elo))
                    .await;
                tracing::debug!(
                    "{}: difficulty {} (skill {}, elo {})",
                    self.kind.label(),
                    level,
                    skill,
                    elo
                );
            }
        }
    }

    async fn set_position(&mut self, fen: &str) {
        self.cur_key = position_key(fen);
        self.cur_turn = fen
            .split_whitespace()
            .nth(1)
            .and_then(|f| f.chars().next())
            .and_then(PieceColor::from_char)
            .unwrap_or(PieceColor::White);
        self.process.send(format!("position fen {}", fen)).await;
    }
}

/// skill = round(level / 10 * 20) clamped to the engine's 0–20 range;
/// elo = 1350 + level * 150. Levels above the 20-point scale are
/// clamped so the Elo stays inside what the engine accepts.
fn strength_settings(level: u8) -> (u8, u32) {
    let level = level.min(20);
    let skill = ((f64::from(level) / 10.0 * 20.0).round() as u8).min(20);
    let elo = 1350 + u32::from(level) * 150;
    (skill, elo)
}

/// Default search depth at a difficulty: 1 at level 0, else level * 2.
fn search_depth(difficulty: u8) -> u32 {
    if difficulty == 0 {
        1
    } else {
        u32::from(difficulty) * 2
    }
}

/// Order collected PV lines by descending score; BTreeMap iteration keeps
/// engine-reported line order for ties.
fn rank_lines(lines: BTreeMap<u32, RankedMove>, count: usize) -> Vec<RankedMove> {
    let mut ranked: Vec<RankedMove> = lines.into_values().collect();
    ranked.sort_by_key(|m| std::cmp::Reverse(score_to_cp(m.kind, m.score)));
    ranked.truncate(count);
    ranked
}

/// Update throttle: surface a value only if it changed AND (the swing is
/// significant OR enough time passed since the last surfaced update).
struct Throttle {
    last_value: i32,
    last_update: Instant,
    threshold: i32,
    min_interval: Duration,
}

impl Throttle {
    fn new(threshold: i32, min_interval: Duration) -> Self {
        Self {
            last_value: 0,
            // Backdate so the first real update is never suppressed.
            // checked_sub: Instant cannot go before the process epoch.
            last_update: Instant::now()
                .checked_sub(min_interval * 2)
                .unwrap_or_else(Instant::now),
            threshold,
            min_interval,
        }
    }

    fn admit(&mut self, value: i32, now: Instant) -> bool {
        let changed = value != self.last_value;
        let significant = (value - self.last_value).abs() > self.threshold;
        let time_passed = now.duration_since(self.last_update) > self.min_interval;
        if changed && (significant || time_passed) {
            self.last_value = value;
            self.last_update = now;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strength_settings_formula() {
        assert_eq!(strength_settings(5), (10, 2100));
        assert_eq!(strength_settings(10), (20, 2850));
        // High levels clamp skill at the engine maximum.
        assert_eq!(strength_settings(20), (20, 4350));
        // Off-scale levels clamp entirely rather than overshooting Elo.
        assert_eq!(strength_settings(25), (20, 4350));
    }

    #[test]
    fn test_throttle_admits_first_update_right_after_construction() {
        let mut t = Throttle::new(5, Duration::from_millis(300));
        assert!(t.admit(40, Instant::now()));
    }

    #[test]
    fn test_search_depth_mapping() {
        assert_eq!(search_depth(0), 1);
        assert_eq!(search_depth(5), 10);
        assert_eq!(search_depth(12), 24);
    }

    #[test]
    fn test_rank_lines_orders_by_score() {
        let mut lines = BTreeMap::new();
        lines.insert(
            1,
            RankedMove {
                mv: "e2e4".into(),
                score: 30,
                kind: ScoreKind::Centipawns,
                depth: 12,
            },
        );
        lines.insert(
            2,
            RankedMove {
                mv: "d2d4".into(),
                score: 45,
                kind: ScoreKind::Centipawns,
                depth: 12,
            },
        );
        lines.insert(
            3,
            RankedMove {
                mv: "g1f3".into(),
                score: 2,
                kind: ScoreKind::Mate,
                depth: 12,
            },
        );
        let ranked = rank_lines(lines, 3);
        assert_eq!(ranked[0].mv, "g1f3");
        assert_eq!(ranked[1].mv, "d2d4");
        assert_eq!(ranked[2].mv, "e2e4");
    }

    #[test]
    fn test_rank_lines_truncates() {
        let mut lines = BTreeMap::new();
        for i in 0..5u32 {
            lines.insert(
                i,
                RankedMove {
                    mv: format!("m{}", i),
                    score: i as i32,
                    kind: ScoreKind::Centipawns,
                    depth: 10,
                },
            );
        }
        assert_eq!(rank_lines(lines, 3).len(), 3);
    }

    #[test]
    fn test_throttle_suppresses_small_fast_changes() {
        let mut t = Throttle::new(5, Duration::from_millis(300));
        let now = Instant::now();
        assert!(t.admit(40, now));
        // Small swing, no time passed: suppressed.
        assert!(!t.admit(42, now));
        // Large swing passes immediately.
        assert!(t.admit(80, now));
        // Unchanged value never re-surfaces.
        assert!(!t.admit(80, now + Duration::from_secs(1)));
        // Small swing after the interval passes.
        assert!(t.admit(82, now + Duration::from_secs(2)));
    }

    #[test]
    fn test_offline_channel_resolves_sentinels() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        rt.block_on(async {
            let channel = AnalysisChannel::offline(InstanceKind::Hint);
            assert_eq!(channel.status(), EngineStatus::Offline);
            assert_eq!(channel.best_move("fen", Some(5), None).await, None);
            assert!(channel.top_moves("fen", 3, 14).await.is_empty());
            // No-ops, must not panic.
            channel.start_analysis("fen", 12).await;
            channel.cancel().await;
        });
    }
}
