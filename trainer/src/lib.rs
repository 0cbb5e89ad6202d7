//! Chess training coordinator: engine sessions, scripted puzzles, and
//! file-backed player progression.

pub mod config;
pub mod progress;
pub mod puzzle;
pub mod session;
