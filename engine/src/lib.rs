pub mod channel;
pub mod stockfish;
pub mod uci;

pub use channel::{AnalysisChannel, EngineStatus, InstanceKind};
pub use stockfish::StockfishProcess;
pub use uci::{parse_uci_message, UciError, UciMessage};

use chess::PieceColor;

/// Score kind reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreKind {
    Centipawns,
    Mate,
}

/// Raw evaluation event from one analysis instance.
///
/// The value is side-to-move-relative, exactly as the engine reports it.
/// Consumers normalize to white-positive orientation.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub kind: ScoreKind,
    pub value: i32,
    /// Side to move in the evaluated position.
    pub turn: PieceColor,
    pub position_key: String,
}

impl Evaluation {
    /// Neutral placeholder evaluation for a position.
    pub fn pending(turn: PieceColor, position_key: String) -> Self {
        Self {
            kind: ScoreKind::Centipawns,
            value: 0,
            turn,
            position_key,
        }
    }
}

/// One ranked candidate move from a multi-line search.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedMove {
    /// Coordinate notation, e.g. "e2e4".
    pub mv: String,
    /// Side-to-move-relative score.
    pub score: i32,
    pub kind: ScoreKind,
    pub depth: u32,
}

/// Collapse a score into comparable centipawns; mate scores map to large
/// magnitudes so that shorter mates rank higher.
pub fn score_to_cp(kind: ScoreKind, value: i32) -> i32 {
    match kind {
        ScoreKind::Centipawns => value,
        ScoreKind::Mate => {
            if value > 0 {
                30_000 - value * 100
            } else {
                -30_000 - value * 100
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mate_outranks_centipawns() {
        assert!(score_to_cp(ScoreKind::Mate, 2) > score_to_cp(ScoreKind::Centipawns, 900));
        assert!(score_to_cp(ScoreKind::Mate, -2) < score_to_cp(ScoreKind::Centipawns, -900));
    }

    #[test]
    fn test_shorter_mate_ranks_higher() {
        assert!(score_to_cp(ScoreKind::Mate, 1) > score_to_cp(ScoreKind::Mate, 3));
    }
}
