//! Coordinate-move (UCI) parsing and formatting helpers.

use cozy_chess::{File, Move, Piece, Rank, Square};

#[derive(Debug, Clone, thiserror::Error)]
pub enum UciMoveError {
    #[error("Invalid move: {0}")]
    InvalidMove(String),
    #[error("Invalid square: {0}")]
    InvalidSquare(String),
    #[error("Invalid promotion: {0}")]
    InvalidPromotion(String),
}

/// Parse a coordinate move (e2e4, e7e8q).
pub fn parse_uci_move(s: &str) -> Result<Move, UciMoveError> {
    if s.len() < 4 {
        return Err(UciMoveError::InvalidMove(s.to_string()));
    }

    let from = parse_square(&s[0..2])?;
    let to = parse_square(&s[2..4])?;

    let promotion = match &s[4..] {
        "" => None,
        "q" => Some(Piece::Queen),
        "r" => Some(Piece::Rook),
        "b" => Some(Piece::Bishop),
        "n" => Some(Piece::Knight),
        _ => return Err(UciMoveError::InvalidPromotion(s.to_string())),
    };

    Ok(Move {
        from,
        to,
        promotion,
    })
}

pub fn parse_square(s: &str) -> Result<Square, UciMoveError> {
    if s.len() != 2 {
        return Err(UciMoveError::InvalidSquare(s.to_string()));
    }
    let mut chars = s.chars();

    let file = match chars.next() {
        Some(c @ 'a'..='h') => File::index(c as usize - 'a' as usize),
        _ => return Err(UciMoveError::InvalidSquare(s.to_string())),
    };
    let rank = match chars.next() {
        Some(c @ '1'..='8') => Rank::index(c as usize - '1' as usize),
        _ => return Err(UciMoveError::InvalidSquare(s.to_string())),
    };

    Ok(Square::new(file, rank))
}

/// Format a move in coordinate notation (e.g., "e2e4", "e7e8q").
pub fn format_uci_move(mv: Move) -> String {
    let mut s = format!("{}{}", format_square(mv.from), format_square(mv.to));
    if let Some(promo) = mv.promotion {
        s.push(crate::types::PieceKind::from(promo).to_char_lower());
    }
    s
}

pub fn format_square(sq: Square) -> String {
    let file = (b'a' + sq.file() as u8) as char;
    let rank = (b'1' + sq.rank() as u8) as char;
    format!("{}{}", file, rank)
}

/// Convert UCI castling notation to cozy_chess notation.
///
/// UCI uses king-moves-two-squares (e1g1, e1c1, e8g8, e8c8); cozy_chess
/// uses king-to-rook (e1h1, e1a1, e8h8, e8a8). Returns the converted move
/// only when it appears in the legal move list, otherwise the input.
pub fn convert_uci_castling(mv: Move, legal_moves: &[Move]) -> Move {
    let is_back_rank = matches!(mv.from.rank(), Rank::First | Rank::Eighth);
    let from_e_file = matches!(mv.from.file(), File::E);
    let to_g_or_c = matches!(mv.to.file(), File::G | File::C);

    if is_back_rank && from_e_file && to_g_or_c && mv.promotion.is_none() {
        let rook_file = match mv.to.file() {
            File::G => File::H,
            _ => File::A,
        };
        let converted = Move {
            from: mv.from,
            to: Square::new(rook_file, mv.from.rank()),
            promotion: None,
        };
        if legal_moves.contains(&converted) {
            return converted;
        }
    }

    mv
}
