use cozy_chess::{Board, Color, Move, Piece, Square};

use crate::fen;
use crate::types::{PieceColor, PieceKind};

/// Game state wrapper around a cozy-chess Board.
///
/// Keeps the move history and the position-key trail needed for
/// threefold-repetition detection. Undo never inverts a move: the
/// truncated history is replayed from the start position.
#[derive(Debug, Clone)]
pub struct Game {
    position: Board,
    history: Vec<HistoryEntry>,
    position_keys: Vec<String>,
    start_position: StartPosition,
}

/// Structured result of a committed move.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub mv: Move,
    pub from: Square,
    pub to: Square,
    pub piece: PieceKind,
    pub piece_color: PieceColor,
    pub captured: Option<PieceKind>,
    pub promotion: Option<PieceKind>,
    pub san: String,
    /// FEN of the position after this move.
    pub fen: String,
}

#[derive(Debug, Clone)]
enum StartPosition {
    Standard,
    Fen(String),
}

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("Illegal move")]
    IllegalMove,
    #[error("Nothing to undo")]
    NothingToUndo,
    #[error("FEN parse error: {0}")]
    Fen(#[from] fen::FenError),
}

impl Game {
    /// Create a new game from the standard starting position.
    pub fn new() -> Self {
        let position = Board::default();
        let key = fen::position_key(&fen::format_fen(&position));
        Self {
            position,
            history: Vec::new(),
            position_keys: vec![key],
            start_position: StartPosition::Standard,
        }
    }

    /// Create a game from a FEN string. Incomplete FENs are rehabilitated
    /// before parsing.
    pub fn from_fen(input: &str) -> Result<Self, GameError> {
        let full = fen::rehabilitate_fen(input);
        let position = fen::parse_fen(&full)?;
        let key = fen::position_key(&fen::format_fen(&position));
        Ok(Self {
            position,
            history: Vec::new(),
            position_keys: vec![key],
            start_position: StartPosition::Fen(full),
        })
    }

    pub fn position(&self) -> &Board {
        &self.position
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn side_to_move(&self) -> PieceColor {
        self.position.side_to_move().into()
    }

    pub fn to_fen(&self) -> String {
        fen::format_fen(&self.position)
    }

    /// Position key of the current position.
    pub fn key(&self) -> String {
        fen::position_key(&self.to_fen())
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        let mut moves = Vec::new();
        self.position.generate_moves(|mvs| {
            moves.extend(mvs);
            false
        });
        moves
    }

    pub fn piece_on(&self, sq: Square) -> Option<(PieceKind, PieceColor)> {
        let piece = self.position.piece_on(sq)?;
        let color = self.position.color_on(sq)?;
        Some((piece.into(), color.into()))
    }

    /// Make a move on the board, returning the structured history entry.
    pub fn make_move(&mut self, mv: Move) -> Result<HistoryEntry, GameError> {
        if !self.legal_moves().contains(&mv) {
            return Err(GameError::IllegalMove);
        }

        let piece = self
            .position
            .piece_on(mv.from)
            .ok_or(GameError::IllegalMove)?;
        let piece_color = self
            .position
            .color_on(mv.from)
            .ok_or(GameError::IllegalMove)?;
        let captured = self
            .position
            .piece_on(mv.to)
            .filter(|_| self.position.color_on(mv.to) != Some(piece_color))
            // En passant lands on an empty square; the captured pawn
            // sits beside the origin, not on the destination.
            .or_else(|| {
                (piece == Piece::Pawn && mv.from.file() != mv.to.file()).then_some(Piece::Pawn)
            });

        let san = generate_san(&self.position, mv);

        let mut next = self.position.clone();
        next.play_unchecked(mv);
        self.position = next;

        let fen_after = self.to_fen();
        self.position_keys.push(fen::position_key(&fen_after));

        let entry = HistoryEntry {
            mv,
            from: mv.from,
            to: mv.to,
            piece: piece.into(),
            piece_color: piece_color.into(),
            captured: captured.map(Into::into),
            promotion: mv.promotion.map(Into::into),
            san,
            fen: fen_after,
        };
        self.history.push(entry.clone());

        Ok(entry)
    }

    /// Remove the last `plies` moves by replaying the truncated history
    /// from the start position.
    pub fn undo_plies(&mut self, plies: usize) -> Result<(), GameError> {
        if plies == 0 {
            return Ok(());
        }
        if self.history.len() < plies {
            return Err(GameError::NothingToUndo);
        }
        self.history.truncate(self.history.len() - plies);
        self.position_keys.truncate(self.history.len() + 1);
        self.rebuild_position()
    }

    fn rebuild_position(&mut self) -> Result<(), GameError> {
        let mut board = match &self.start_position {
            StartPosition::Standard => Board::default(),
            StartPosition::Fen(f) => fen::parse_fen(f)?,
        };
        for entry in &self.history {
            // History moves were legal when committed.
            board.play_unchecked(entry.mv);
        }
        self.position = board;
        Ok(())
    }

    pub fn in_check(&self) -> bool {
        !self.position.checkers().is_empty()
    }

    pub fn is_checkmate(&self) -> bool {
        self.in_check() && self.legal_moves().is_empty()
    }

    pub fn is_stalemate(&self) -> bool {
        !self.in_check() && self.legal_moves().is_empty()
    }

    /// The current position has occurred three or more times.
    pub fn is_threefold_repetition(&self) -> bool {
        let current = self.key();
        self.position_keys.iter().filter(|k| **k == current).count() >= 3
    }

    /// Neither side can force mate: bare kings, king plus one minor, or
    /// kings with same-colored bishops only.
    pub fn is_insufficient_material(&self) -> bool {
        let b = &self.position;
        let heavy = b.pieces(Piece::Pawn) | b.pieces(Piece::Rook) | b.pieces(Piece::Queen);
        if !heavy.is_empty() {
            return false;
        }

        let knights = b.pieces(Piece::Knight);
        let bishops = b.pieces(Piece::Bishop);
        match (knights.len(), bishops.len()) {
            (0, 0) => true,
            (1, 0) | (0, 1) => true,
            (0, _) => {
                let mut shades = bishops.into_iter().map(square_shade);
                let first = shades.next();
                shades.all(|s| Some(s) == first)
            }
            _ => false,
        }
    }

    pub fn is_game_over(&self) -> bool {
        self.legal_moves().is_empty()
            || self.is_threefold_repetition()
            || self.is_insufficient_material()
    }

    /// White-positive material sum in pawn units.
    pub fn material_balance(&self) -> i32 {
        let mut balance = 0;
        for sq in self.position.occupied() {
            let piece: PieceKind = match self.position.piece_on(sq) {
                Some(p) => p.into(),
                None => continue,
            };
            let value = piece.material_value();
            match self.position.color_on(sq) {
                Some(Color::White) => balance += value,
                Some(Color::Black) => balance -= value,
                None => {}
            }
        }
        balance
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

fn square_shade(sq: Square) -> bool {
    (sq.file() as usize + sq.rank() as usize) % 2 == 0
}

/// Generate SAN for a legal move in the given position, including
/// disambiguation and check/checkmate suffixes.
fn generate_san(board: &Board, mv: Move) -> String {
    let piece = board.piece_on(mv.from).unwrap_or(Piece::Pawn);
    let mover = board.side_to_move();

    // cozy-chess encodes castling as king-takes-own-rook.
    if piece == Piece::King && board.color_on(mv.to) == Some(mover) {
        let base = if mv.to.file() > mv.from.file() {
            "O-O"
        } else {
            "O-O-O"
        };
        return format!("{}{}", base, san_suffix(board, mv));
    }

    let is_capture = board.piece_on(mv.to).is_some()
        || (piece == Piece::Pawn && mv.from.file() != mv.to.file());

    let mut san = String::new();
    match piece {
        Piece::Pawn => {
            if is_capture {
                san.push((b'a' + mv.from.file() as u8) as char);
            }
        }
        _ => {
            san.push(PieceKind::from(piece).to_char_upper());
            san.push_str(&disambiguation(board, mv, piece));
        }
    }

    if is_capture {
        san.push('x');
    }
    san.push_str(&crate::uci::format_square(mv.to));

    if let Some(promo) = mv.promotion {
        san.push('=');
        san.push(PieceKind::from(promo).to_char_upper());
    }

    san.push_str(&san_suffix(board, mv));
    san
}

/// File or rank qualifier when another piece of the same kind can reach
/// the same destination.
fn disambiguation(board: &Board, mv: Move, piece: Piece) -> String {
    let mut rivals = Vec::new();
    board.generate_moves(|mvs| {
        for other in mvs {
            if other.to == mv.to && other.from != mv.from && board.piece_on(other.from) == Some(piece)
            {
                rivals.push(other.from);
            }
        }
        false
    });

    if rivals.is_empty() {
        return String::new();
    }
    if rivals.iter().all(|sq| sq.file() != mv.from.file()) {
        return ((b'a' + mv.from.file() as u8) as char).to_string();
    }
    ((b'1' + mv.from.rank() as u8) as char).to_string()
}

fn san_suffix(board: &Board, mv: Move) -> &'static str {
    let mut next = board.clone();
    next.play_unchecked(mv);
    if next.checkers().is_empty() {
        return "";
    }
    let mut any = false;
    next.generate_moves(|_| {
        any = true;
        true
    });
    if any {
        "+"
    } else {
        "#"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uci::parse_uci_move;

    fn play(game: &mut Game, moves: &[&str]) {
        for m in moves {
            let mv = parse_uci_move(m).unwrap();
            game.make_move(mv).unwrap();
        }
    }

    #[test]
    fn test_make_move_records_san_and_fen() {
        let mut game = Game::new();
        let entry = game.make_move(parse_uci_move("e2e4").unwrap()).unwrap();
        assert_eq!(entry.san, "e4");
        assert_eq!(entry.piece_color, PieceColor::White);
        assert!(entry.fen.contains(" b "));
        assert_eq!(game.history().len(), 1);
    }

    #[test]
    fn test_illegal_move_rejected() {
        let mut game = Game::new();
        assert!(game.make_move(parse_uci_move("e2e5").unwrap()).is_err());
        assert!(game.history().is_empty());
    }

    #[test]
    fn test_undo_replays_from_start() {
        let mut game = Game::new();
        play(&mut game, &["e2e4", "e7e5", "g1f3"]);
        game.undo_plies(2).unwrap();
        assert_eq!(game.history().len(), 1);
        assert_eq!(game.side_to_move(), PieceColor::Black);
        assert_eq!(game.to_fen(), game.history()[0].fen);
    }

    #[test]
    fn test_undo_too_many_plies() {
        let mut game = Game::new();
        play(&mut game, &["e2e4"]);
        assert!(game.undo_plies(2).is_err());
    }

    #[test]
    fn test_fools_mate_is_checkmate() {
        let mut game = Game::new();
        play(&mut game, &["f2f3", "e7e5", "g2g4", "d8h4"]);
        assert!(game.is_checkmate());
        assert!(game.is_game_over());
        assert_eq!(game.history().last().unwrap().san, "Qh4#");
        // White is to move and mated.
        assert_eq!(game.side_to_move(), PieceColor::White);
    }

    #[test]
    fn test_stalemate_detected() {
        let game = Game::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        assert!(game.is_stalemate());
        assert!(!game.is_checkmate());
    }

    #[test]
    fn test_threefold_repetition() {
        let mut game = Game::new();
        play(
            &mut game,
            &["g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1", "f6g8"],
        );
        assert!(game.is_threefold_repetition());
    }

    #[test]
    fn test_insufficient_material_king_vs_king() {
        let game = Game::from_fen("8/8/8/4k3/8/8/4K3/8 w - - 0 1").unwrap();
        assert!(game.is_insufficient_material());
    }

    #[test]
    fn test_sufficient_material_with_rook() {
        let game = Game::from_fen("8/8/8/4k3/8/8/4K3/6R1 w - - 0 1").unwrap();
        assert!(!game.is_insufficient_material());
    }

    #[test]
    fn test_material_balance() {
        let game = Game::from_fen("8/8/8/4k3/8/8/4K3/6R1 w - - 0 1").unwrap();
        assert_eq!(game.material_balance(), 5);
        assert_eq!(Game::new().material_balance(), 0);
    }

    #[test]
    fn test_capture_san() {
        let mut game = Game::new();
        play(&mut game, &["e2e4", "d7d5"]);
        let entry = game.make_move(parse_uci_move("e4d5").unwrap()).unwrap();
        assert_eq!(entry.san, "exd5");
        assert_eq!(entry.captured, Some(PieceKind::Pawn));
    }

    #[test]
    fn test_en_passant_records_captured_pawn() {
        let mut game = Game::new();
        play(&mut game, &["e2e4", "a7a6", "e4e5", "d7d5"]);
        let entry = game.make_move(parse_uci_move("e5d6").unwrap()).unwrap();
        assert_eq!(entry.san, "exd6");
        assert_eq!(entry.captured, Some(PieceKind::Pawn));
    }

    #[test]
    fn test_from_truncated_fen() {
        let game = Game::from_fen("8/8/8/4k3/8/8/4K3/6R1 w").unwrap();
        assert_eq!(game.side_to_move(), PieceColor::White);
    }
}
