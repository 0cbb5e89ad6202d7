//! Scripted mate-in-N puzzle mode.

mod loader;
mod session;

pub use loader::{build_roadmap, load_puzzles, parse_puzzle_csv, PuzzleRecord, RoadmapStage};
pub use session::{Feedback, PuzzleOutcome, PuzzleSession};
