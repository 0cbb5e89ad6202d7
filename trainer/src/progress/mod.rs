//! Progression persistence: puzzle results, lifetime XP, and the
//! player profile with its daily streak.

mod json_store;
mod ledger;
mod profile;
mod xp;

pub use json_store::{JsonStore, Storable};
pub use ledger::{ProgressLedger, PuzzleResult, PuzzleSettlement};
pub use profile::Profile;
pub use xp::{match_xp, puzzle_xp_tier, stars_for_hints};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
