use chess::{convert_uci_castling, parse_uci_move, Game, GameError};

use crate::progress::stars_for_hints;

use super::loader::PuzzleRecord;

/// Verdict on one user attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    Correct,
    /// The owner reverts the visual state after a short delay.
    Wrong,
}

/// Final score of a completed puzzle, handed to the progression ledger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PuzzleOutcome {
    pub stars: f32,
    pub hints_used: u32,
}

/// One puzzle attempt against a fixed scripted line.
///
/// The scripted opponent owns the even move indices: the owner calls
/// [`Self::play_scripted`] for those after a pacing delay. User input
/// is matched against the expected move at the current index whatever
/// its parity, so a user who beats the pacing delay to an obvious
/// scripted move simply advances the line.
pub struct PuzzleSession {
    id: String,
    game: Game,
    moves: Vec<String>,
    index: usize,
    hints_used: u32,
    outcome_taken: bool,
}

impl PuzzleSession {
    pub fn new(record: &PuzzleRecord) -> Result<Self, GameError> {
        Ok(Self {
            id: record.id.clone(),
            game: Game::from_fen(&record.fen)?,
            moves: record.moves.clone(),
            index: 0,
            hints_used: 0,
            outcome_taken: false,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn hints_used(&self) -> u32 {
        self.hints_used
    }

    pub fn is_complete(&self) -> bool {
        self.index >= self.moves.len()
    }

    /// Whether the pacing timer should auto-play the next move.
    pub fn is_opponent_turn(&self) -> bool {
        !self.is_complete() && self.index % 2 == 0
    }

    /// The next move in the script, if any remain.
    pub fn expected(&self) -> Option<&str> {
        self.moves.get(self.index).map(String::as_str)
    }

    /// Play the scripted opponent's move. Returns the move played, or
    /// None when it is not the opponent's turn or the script is broken.
    pub fn play_scripted(&mut self) -> Option<String> {
        if !self.is_opponent_turn() {
            return None;
        }
        let mv = self.moves[self.index].clone();
        if self.apply(&mv).is_none() {
            tracing::warn!("Puzzle {}: scripted move {} is not legal", self.id, mv);
            return None;
        }
        self.index += 1;
        Some(mv)
    }

    /// Try the user's move against the script.
    pub fn try_user_move(&mut self, mv: &str) -> Feedback {
        if self.is_complete() || self.moves[self.index] != mv {
            return Feedback::Wrong;
        }
        if self.apply(mv).is_none() {
            tracing::warn!("Puzzle {}: expected move {} is not legal", self.id, mv);
            return Feedback::Wrong;
        }
        self.index += 1;
        Feedback::Correct
    }

    /// Reveal the expected move's squares. Costs half a star.
    pub fn hint(&mut self) -> Option<(String, String)> {
        if self.is_complete() {
            return None;
        }
        let mv = &self.moves[self.index];
        if mv.len() < 4 {
            return None;
        }
        self.hints_used += 1;
        Some((mv[0..2].to_string(), mv[2..4].to_string()))
    }

    /// Play the expected move for the user. Counts as a hint.
    pub fn auto_move(&mut self) -> Option<String> {
        if self.is_complete() {
            return None;
        }
        let mv = self.moves[self.index].clone();
        match self.try_user_move(&mv) {
            Feedback::Correct => {
                self.hints_used += 1;
                Some(mv)
            }
            Feedback::Wrong => None,
        }
    }

    /// The final score, yielded exactly once after the script finishes.
    pub fn take_outcome(&mut self) -> Option<PuzzleOutcome> {
        if !self.is_complete() || self.outcome_taken {
            return None;
        }
        self.outcome_taken = true;
        Some(PuzzleOutcome {
            stars: stars_for_hints(self.hints_used),
            hints_used: self.hints_used,
        })
    }

    fn apply(&mut self, mv: &str) -> Option<()> {
        let parsed = parse_uci_move(mv).ok()?;
        let converted = convert_uci_castling(parsed, &self.game.legal_moves());
        self.game.make_move(converted).ok()?;
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Black shuffles a wing pawn, then white delivers a back-rank mate.
    fn back_rank_puzzle() -> PuzzleRecord {
        PuzzleRecord {
            id: "m1-001".into(),
            fen: "6k1/p4ppp/8/8/8/8/5PPP/3R2K1 b - - 0 1".into(),
            moves: vec!["a7a6".into(), "d1d8".into()],
            mate_type: "back-rank".into(),
            level: 1,
        }
    }

    #[test]
    fn test_clean_solve_earns_three_stars() {
        let mut session = PuzzleSession::new(&back_rank_puzzle()).unwrap();
        assert!(session.is_opponent_turn());

        assert_eq!(session.play_scripted().as_deref(), Some("a7a6"));
        assert!(!session.is_opponent_turn());

        assert_eq!(session.try_user_move("d1d8"), Feedback::Correct);
        assert!(session.is_complete());
        assert!(session.game().is_checkmate());

        let outcome = session.take_outcome().unwrap();
        assert_eq!(outcome.stars, 3.0);
        assert_eq!(outcome.hints_used, 0);
        // Fires exactly once.
        assert!(session.take_outcome().is_none());
    }

    #[test]
    fn test_wrong_move_leaves_state_untouched() {
        let mut session = PuzzleSession::new(&back_rank_puzzle()).unwrap();
        session.play_scripted();

        assert_eq!(session.try_user_move("d1d2"), Feedback::Wrong);
        assert!(!session.is_complete());
        assert_eq!(session.game().history().len(), 1);

        // Still solvable afterwards.
        assert_eq!(session.try_user_move("d1d8"), Feedback::Correct);
        assert!(session.is_complete());
    }

    #[test]
    fn test_user_can_preempt_the_pacing_timer() {
        let mut session = PuzzleSession::new(&back_rank_puzzle()).unwrap();
        // Playing the scripted move before the timer fires advances
        // the line; a non-matching move is still wrong.
        assert_eq!(session.try_user_move("d1d8"), Feedback::Wrong);
        assert_eq!(session.try_user_move("a7a6"), Feedback::Correct);
        assert!(!session.is_opponent_turn());
    }

    #[test]
    fn test_single_move_puzzle_completes_at_index_zero() {
        let record = PuzzleRecord {
            id: "m1-002".into(),
            fen: "6k1/p4ppp/8/8/8/8/5PPP/3R2K1 w - - 0 1".into(),
            moves: vec!["d1d8".into()],
            mate_type: "back-rank".into(),
            level: 1,
        };
        let mut session = PuzzleSession::new(&record).unwrap();

        assert_eq!(session.try_user_move("d1d8"), Feedback::Correct);
        assert!(session.is_complete());
        let outcome = session.take_outcome().unwrap();
        assert_eq!(outcome.stars, 3.0);
        assert!(session.take_outcome().is_none());
    }

    #[test]
    fn test_hint_and_auto_move_cost_stars() {
        let mut session = PuzzleSession::new(&back_rank_puzzle()).unwrap();
        session.play_scripted();

        assert_eq!(session.hint(), Some(("d1".into(), "d8".into())));
        assert_eq!(session.auto_move().as_deref(), Some("d1d8"));
        assert!(session.is_complete());

        let outcome = session.take_outcome().unwrap();
        assert_eq!(outcome.hints_used, 2);
        assert_eq!(outcome.stars, 2.0);
    }

    #[test]
    fn test_hint_unavailable_after_completion() {
        let mut session = PuzzleSession::new(&back_rank_puzzle()).unwrap();
        session.play_scripted();
        session.try_user_move("d1d8");
        assert!(session.is_complete());
        assert!(session.hint().is_none());
        assert!(session.auto_move().is_none());
    }

    #[test]
    fn test_completed_puzzle_settles_into_the_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = crate::progress::ProgressLedger::new(dir.path());

        let mut session = PuzzleSession::new(&back_rank_puzzle()).unwrap();
        session.play_scripted();
        assert_eq!(session.try_user_move("d1d8"), Feedback::Correct);

        let outcome = session.take_outcome().unwrap();
        let settlement = ledger.settle_puzzle(session.id(), outcome.stars);
        assert_eq!(settlement.stars_recorded, 3.0);
        assert_eq!(settlement.xp_awarded, 50);
        assert_eq!(ledger.xp_total(), 50);
    }

    #[test]
    fn test_short_fen_rehabilitated() {
        let record = PuzzleRecord {
            fen: "6k1/p4ppp/8/8/8/8/5PPP/3R2K1 b".into(),
            ..back_rank_puzzle()
        };
        let session = PuzzleSession::new(&record).unwrap();
        assert!(session.is_opponent_turn());
    }
}
