//! FEN parsing, formatting and the position key codec.

use cozy_chess::Board;

/// FEN of the standard starting position.
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Position key of the standard starting position (first four FEN fields).
pub const START_POSITION_KEY: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -";

#[derive(Debug, thiserror::Error)]
pub enum FenError {
    #[error("Invalid FEN format: {0}")]
    InvalidFormat(String),
}

/// Parse a FEN string into a Board.
pub fn parse_fen(fen: &str) -> Result<Board, FenError> {
    fen.parse()
        .map_err(|_| FenError::InvalidFormat(fen.to_string()))
}

/// Format a Board as a FEN string.
pub fn format_fen(board: &Board) -> String {
    board.to_string()
}

/// Canonical identity of a position: the first four space-delimited FEN
/// fields (placement, side to move, castling, en passant). Move counters
/// are irrelevant for evaluation matching.
///
/// Empty or placeholder input degenerates to the starting-position key.
/// Inputs with fewer than four fields join whatever fields exist.
pub fn position_key(fen: &str) -> String {
    if fen.is_empty() || fen == "start" {
        return START_POSITION_KEY.to_string();
    }
    fen.split_whitespace()
        .take(4)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Pad an incomplete FEN up to the six standard fields with defaults
/// (`w`, `-`, `-`, `0`, `1`). Puzzle CSVs frequently carry truncated FENs.
pub fn rehabilitate_fen(fen: &str) -> String {
    if fen.is_empty() {
        return START_FEN.to_string();
    }
    let mut fields: Vec<&str> = fen.split_whitespace().collect();
    if fields.len() >= 6 {
        return fen.to_string();
    }
    const DEFAULTS: [&str; 5] = ["w", "-", "-", "0", "1"];
    while fields.len() < 6 {
        fields.push(DEFAULTS[fields.len() - 1]);
    }
    fields.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_key_ignores_move_counters() {
        let a = "8/8/8/4k3/8/8/4K3/6R1 w - - 0 1";
        let b = "8/8/8/4k3/8/8/4K3/6R1 w - - 12 47";
        assert_eq!(position_key(a), position_key(b));
    }

    #[test]
    fn test_position_key_placeholder() {
        assert_eq!(position_key(""), START_POSITION_KEY);
        assert_eq!(position_key("start"), START_POSITION_KEY);
    }

    #[test]
    fn test_position_key_lenient_on_short_input() {
        assert_eq!(position_key("8/8/8/4k3/8/8/4K3/6R1 w"), "8/8/8/4k3/8/8/4K3/6R1 w");
    }

    #[test]
    fn test_rehabilitate_partial_fen() {
        let fixed = rehabilitate_fen("8/8/8/4k3/8/8/4K3/6R1 w");
        assert_eq!(fixed, "8/8/8/4k3/8/8/4K3/6R1 w - - 0 1");
        assert!(parse_fen(&fixed).is_ok());
    }

    #[test]
    fn test_rehabilitate_complete_fen_unchanged() {
        assert_eq!(rehabilitate_fen(START_FEN), START_FEN);
    }

    #[test]
    fn test_start_fen_parses() {
        let board = parse_fen(START_FEN).unwrap();
        assert_eq!(position_key(&format_fen(&board)), START_POSITION_KEY);
    }
}
