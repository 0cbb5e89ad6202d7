use chess::{convert_uci_castling, format_square, parse_uci_move, Game, PieceColor};
use engine::RankedMove;

use super::commands::SessionError;
use super::evals::EvalLedger;
use super::quality::{self, MoveQuality};
use super::snapshot::{HintMarker, MoveRecord, SessionSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOverReason {
    Checkmate,
    Stalemate,
    Repetition,
    InsufficientMaterial,
    Resignation,
}

/// How a game concluded. `winner: None` is a draw. Created exactly
/// once per session and immutable until the next game starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameResult {
    pub winner: Option<PieceColor>,
    pub reason: GameOverReason,
    pub move_count: usize,
    pub hints_used: u32,
    pub material_balance: i32,
    /// What this match settles for: the flat win/loss amount plus the
    /// quality rewards accumulated during play.
    pub earned_xp: u32,
}

/// All mutable session state. Owned by the actor; every method is
/// synchronous so the rules can be tested without a runtime.
pub struct SessionState {
    pub game: Game,
    pub enabled: bool,
    pub player_color: PieceColor,
    pub difficulty: u8,
    pub evals: EvalLedger,
    /// Engine candidates for the position the user moves from next.
    pub top_moves: Vec<RankedMove>,
    pub hint: Option<HintMarker>,
    pub quality: Option<MoveQuality>,
    pub hints_used: u32,
    pub match_xp: u32,
    pub engine_thinking: bool,
    /// Set once at actor startup when no engine process could be
    /// spawned. Assists degrade to no-ops for the whole session.
    pub engine_offline: bool,
    pub result: Option<GameResult>,
}

impl SessionState {
    pub fn new(player_color: PieceColor, difficulty: u8) -> Self {
        Self {
            game: Game::new(),
            enabled: false,
            player_color,
            difficulty,
            evals: EvalLedger::new(),
            top_moves: Vec::new(),
            hint: None,
            quality: None,
            hints_used: 0,
            match_xp: 0,
            engine_thinking: false,
            engine_offline: false,
            result: None,
        }
    }

    pub fn game_over(&self) -> bool {
        self.result.is_some()
    }

    pub fn is_player_turn(&self) -> bool {
        self.game.side_to_move() == self.player_color
    }

    /// Fresh board, everything per-match cleared. Color and difficulty
    /// survive.
    pub fn reset_game(&mut self) {
        self.game = Game::new();
        self.evals.reset();
        self.top_moves.clear();
        self.hint = None;
        self.quality = None;
        self.hints_used = 0;
        self.match_xp = 0;
        self.engine_thinking = false;
        self.result = None;
    }

    /// Validate and commit a user move, tagging its quality against the
    /// candidate list captured before the move.
    pub fn apply_user_move(&mut self, mv: &str) -> Result<(), SessionError> {
        self.ensure_active()?;
        if !self.is_player_turn() {
            return Err(SessionError::NotYourTurn);
        }
        let committed = self.commit_move(mv)?;

        self.hint = None;
        self.quality = quality::classify(mv, &self.top_moves);
        if let Some(q) = self.quality {
            self.match_xp += q.xp_reward();
            tracing::debug!("Move {} tagged {} (+{} XP)", committed, q.label(), q.xp_reward());
        }
        self.top_moves.clear();

        self.observe_game_over();
        Ok(())
    }

    /// Commit an engine reply. The move was produced for this exact
    /// position; anything illegal here is an engine fault, not user
    /// error.
    pub fn apply_engine_move(&mut self, mv: &str) -> Result<(), SessionError> {
        self.engine_thinking = false;
        if self.game_over() {
            return Err(SessionError::GameConcluded);
        }
        self.commit_move(mv)
            .map_err(|_| SessionError::Internal(format!("Engine played illegal move {}", mv)))?;
        self.top_moves.clear();
        self.observe_game_over();
        Ok(())
    }

    /// Rewind: one ply while the engine still owes its reply, a full
    /// exchange of two once it is the user's turn again.
    pub fn apply_undo(&mut self) -> Result<(), SessionError> {
        self.ensure_active()?;
        let len = self.game.history().len();
        if len == 0 {
            return Err(SessionError::NothingToUndo);
        }
        let plies = if self.is_player_turn() { 2 } else { 1 }.min(len);
        self.game
            .undo_plies(plies)
            .map_err(|e| SessionError::Internal(e.to_string()))?;

        self.evals.truncate(self.game.history().len());
        self.hint = None;
        self.quality = None;
        self.top_moves.clear();
        self.engine_thinking = false;
        Ok(())
    }

    pub fn apply_resign(&mut self) -> Result<GameResult, SessionError> {
        self.ensure_active()?;
        let result = self.make_result(
            Some(self.player_color.opponent()),
            GameOverReason::Resignation,
        );
        self.result = Some(result);
        self.engine_thinking = false;
        tracing::info!("Player resigned");
        Ok(result)
    }

    /// Check the board for a terminal state and record it. Idempotent:
    /// returns Some only on the transition that concluded the game.
    pub fn observe_game_over(&mut self) -> Option<GameResult> {
        if self.result.is_some() {
            return None;
        }
        let (winner, reason) = if self.game.is_checkmate() {
            // The side to move is the one mated.
            (
                Some(self.game.side_to_move().opponent()),
                GameOverReason::Checkmate,
            )
        } else if self.game.is_stalemate() {
            (None, GameOverReason::Stalemate)
        } else if self.game.is_threefold_repetition() {
            (None, GameOverReason::Repetition)
        } else if self.game.is_insufficient_material() {
            (None, GameOverReason::InsufficientMaterial)
        } else {
            return None;
        };

        let result = self.make_result(winner, reason);
        tracing::info!("Game over: {:?}", result);
        self.result = Some(result);
        self.engine_thinking = false;
        Some(result)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            enabled: self.enabled,
            fen: self.game.to_fen(),
            side_to_move: self.game.side_to_move().to_string(),
            player_color: self.player_color,
            difficulty: self.difficulty,
            history: self
                .game
                .history()
                .iter()
                .map(|entry| MoveRecord {
                    from: format_square(entry.from),
                    to: format_square(entry.to),
                    piece: entry.piece.to_char_upper().to_string(),
                    captured: entry.captured.map(|p| p.to_char_upper().to_string()),
                    promotion: entry.promotion.map(|p| p.to_char_upper().to_string()),
                    san: entry.san.clone(),
                    fen_after: entry.fen.clone(),
                })
                .collect(),
            evaluation: self.evals.current(),
            eval_history: self.evals.entries().to_vec(),
            material_balance: self.game.material_balance(),
            hint: self.hint.clone(),
            quality: self.quality,
            hints_used: self.hints_used,
            match_xp: self.match_xp,
            engine_thinking: self.engine_thinking,
            engine_offline: self.engine_offline,
            game_over: self.game_over(),
            result: self.result,
        }
    }

    fn make_result(&self, winner: Option<PieceColor>, reason: GameOverReason) -> GameResult {
        GameResult {
            winner,
            reason,
            move_count: self.game.history().len(),
            hints_used: self.hints_used,
            material_balance: self.game.material_balance(),
            earned_xp: crate::progress::match_xp(winner == Some(self.player_color))
                + self.match_xp,
        }
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        if !self.enabled {
            return Err(SessionError::NotActive);
        }
        if self.game_over() {
            return Err(SessionError::GameConcluded);
        }
        Ok(())
    }

    /// Parse, castling-convert, and play a coordinate move, then append
    /// the placeholder evaluation for the new position.
    fn commit_move(&mut self, mv: &str) -> Result<String, SessionError> {
        let parsed =
            parse_uci_move(mv).map_err(|_| SessionError::IllegalMove(mv.to_string()))?;
        let converted = convert_uci_castling(parsed, &self.game.legal_moves());
        let entry = self
            .game
            .make_move(converted)
            .map_err(|_| SessionError::IllegalMove(mv.to_string()))?;
        self.evals.push_placeholder(self.game.key());
        Ok(entry.san)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::ScoreKind;

    fn active_state(player_color: PieceColor) -> SessionState {
        let mut state = SessionState::new(player_color, 5);
        state.enabled = true;
        state
    }

    fn ranked(moves: &[&str]) -> Vec<RankedMove> {
        moves
            .iter()
            .map(|mv| RankedMove {
                mv: mv.to_string(),
                score: 0,
                kind: ScoreKind::Centipawns,
                depth: 14,
            })
            .collect()
    }

    #[test]
    fn test_inactive_session_rejects_moves() {
        let mut state = SessionState::new(PieceColor::White, 5);
        assert!(matches!(
            state.apply_user_move("e2e4"),
            Err(SessionError::NotActive)
        ));
    }

    #[test]
    fn test_user_cannot_move_for_the_engine() {
        let mut state = active_state(PieceColor::Black);
        assert!(matches!(
            state.apply_user_move("e2e4"),
            Err(SessionError::NotYourTurn)
        ));
    }

    #[test]
    fn test_move_appends_placeholder_eval() {
        let mut state = active_state(PieceColor::White);
        state.apply_user_move("e2e4").unwrap();
        assert_eq!(state.evals.entries().len(), 1);
        assert_eq!(state.evals.entries()[0].position_key, state.game.key());
    }

    #[test]
    fn test_quality_tagged_and_xp_credited() {
        let mut state = active_state(PieceColor::White);
        state.top_moves = ranked(&["e2e4", "d2d4", "g1f3"]);
        state.apply_user_move("d2d4").unwrap();
        assert_eq!(state.quality, Some(MoveQuality::Second));
        assert_eq!(state.match_xp, 6);
        // The candidate list is consumed by the move.
        assert!(state.top_moves.is_empty());
    }

    #[test]
    fn test_mistake_without_candidates_goes_untagged() {
        let mut state = active_state(PieceColor::White);
        state.apply_user_move("a2a3").unwrap();
        assert_eq!(state.quality, None);
        assert_eq!(state.match_xp, 0);
    }

    #[test]
    fn test_fools_mate_concludes_for_the_engine() {
        let mut state = active_state(PieceColor::White);
        state.apply_user_move("f2f3").unwrap();
        state.apply_engine_move("e7e5").unwrap();
        state.apply_user_move("g2g4").unwrap();
        state.apply_engine_move("d8h4").unwrap();

        let result = state.result.expect("game should be over");
        assert_eq!(result.winner, Some(PieceColor::Black));
        assert_eq!(result.reason, GameOverReason::Checkmate);
        assert_eq!(result.move_count, 4);
        // A loss still settles the participation amount.
        assert_eq!(result.earned_xp, 25);
        // Idempotent: the observation only fires once.
        assert!(state.observe_game_over().is_none());
        assert!(matches!(
            state.apply_user_move("a2a3"),
            Err(SessionError::GameConcluded)
        ));
    }

    #[test]
    fn test_undo_rewinds_full_exchange_on_player_turn() {
        let mut state = active_state(PieceColor::White);
        state.apply_user_move("e2e4").unwrap();
        state.apply_engine_move("e7e5").unwrap();

        state.apply_undo().unwrap();
        assert!(state.game.history().is_empty());
        assert!(state.evals.entries().is_empty());
    }

    #[test]
    fn test_undo_rewinds_one_ply_while_engine_owes_reply() {
        let mut state = active_state(PieceColor::White);
        state.apply_user_move("e2e4").unwrap();

        state.apply_undo().unwrap();
        assert!(state.game.history().is_empty());
        assert!(state.is_player_turn());
    }

    #[test]
    fn test_undo_with_empty_history() {
        let mut state = active_state(PieceColor::White);
        assert!(matches!(
            state.apply_undo(),
            Err(SessionError::NothingToUndo)
        ));
    }

    #[test]
    fn test_resign_names_opponent_winner_once() {
        let mut state = active_state(PieceColor::White);
        state.apply_user_move("e2e4").unwrap();

        let result = state.apply_resign().unwrap();
        assert_eq!(result.winner, Some(PieceColor::Black));
        assert_eq!(result.reason, GameOverReason::Resignation);
        assert_eq!(result.move_count, 1);
        assert_eq!(result.earned_xp, 25);
        assert!(matches!(
            state.apply_resign(),
            Err(SessionError::GameConcluded)
        ));
    }

    #[test]
    fn test_engine_illegal_move_is_internal_error() {
        let mut state = active_state(PieceColor::White);
        state.apply_user_move("e2e4").unwrap();
        assert!(matches!(
            state.apply_engine_move("e2e4"),
            Err(SessionError::Internal(_))
        ));
    }

    #[test]
    fn test_reset_survives_color_and_difficulty() {
        let mut state = active_state(PieceColor::Black);
        state.difficulty = 9;
        state.match_xp = 30;
        state.hints_used = 2;
        state.result = Some(GameResult {
            winner: None,
            reason: GameOverReason::Stalemate,
            move_count: 0,
            hints_used: 2,
            material_balance: 0,
            earned_xp: 25,
        });

        state.reset_game();
        assert_eq!(state.player_color, PieceColor::Black);
        assert_eq!(state.difficulty, 9);
        assert_eq!(state.match_xp, 0);
        assert_eq!(state.hints_used, 0);
        assert!(state.result.is_none());
        assert!(state.game.history().is_empty());
    }

    #[test]
    fn test_snapshot_reflects_history() {
        let mut state = active_state(PieceColor::White);
        state.apply_user_move("e2e4").unwrap();
        let snap = state.snapshot();
        assert_eq!(snap.history.len(), 1);
        assert_eq!(snap.history[0].san, "e4");
        assert_eq!(snap.side_to_move, "black");
        assert_eq!(snap.eval_history.len(), 1);
        assert!(!snap.game_over);
    }
}
