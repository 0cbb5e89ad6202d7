use chess::PieceColor;

use super::evals::{EvalEntry, NormalizedEval};
use super::quality::MoveQuality;
use super::state::GameResult;

/// Complete, immutable snapshot of session state.
/// Sent to subscribers on every state change and on subscribe.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub enabled: bool,
    pub fen: String,
    pub side_to_move: String,
    pub player_color: PieceColor,
    pub difficulty: u8,
    pub history: Vec<MoveRecord>,
    /// White-positive evaluation of the live position.
    pub evaluation: NormalizedEval,
    /// Per-ply evaluation history, aligned with `history`.
    pub eval_history: Vec<EvalEntry>,
    pub material_balance: i32,
    pub hint: Option<HintMarker>,
    pub quality: Option<MoveQuality>,
    pub hints_used: u32,
    /// XP accumulated this match from move-quality rewards.
    pub match_xp: u32,
    pub engine_thinking: bool,
    /// No engine process is available; assists are degraded.
    pub engine_offline: bool,
    pub game_over: bool,
    pub result: Option<GameResult>,
}

/// A single move in the history.
#[derive(Debug, Clone)]
pub struct MoveRecord {
    pub from: String,
    pub to: String,
    pub piece: String,
    pub captured: Option<String>,
    pub promotion: Option<String>,
    pub san: String,
    pub fen_after: String,
}

/// Squares highlighted for a hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintMarker {
    pub from: String,
    pub to: String,
}
