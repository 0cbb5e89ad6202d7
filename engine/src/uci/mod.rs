pub mod parser;

pub use parser::{parse_uci_message, InfoLine, UciMessage};

#[derive(Debug, thiserror::Error)]
pub enum UciError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Engine binary not found")]
    BinaryNotFound,
    #[error("Engine has no stdin")]
    NoStdin,
    #[error("Engine has no stdout")]
    NoStdout,
    #[error("Timeout waiting for engine to respond")]
    HandshakeTimeout,
    #[error("Engine closed before completing handshake")]
    HandshakeClosed,
    #[error("Malformed UCI message: {0}")]
    MalformedMessage(String),
    #[error("Unknown UCI message: {0}")]
    UnknownMessage(String),
}
