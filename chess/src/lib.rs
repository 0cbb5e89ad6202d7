pub mod fen;
pub mod game;
pub mod types;
pub mod uci;

pub use fen::{
    format_fen, parse_fen, position_key, rehabilitate_fen, FenError, START_FEN, START_POSITION_KEY,
};
pub use game::{Game, GameError, HistoryEntry};
pub use types::{PieceColor, PieceKind};
pub use uci::{convert_uci_castling, format_square, format_uci_move, parse_uci_move, UciMoveError};
