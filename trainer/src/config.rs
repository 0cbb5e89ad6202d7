//! Configuration for the trainer.
//!
//! Handles data directory resolution with the following precedence:
//! 1. TRAINER_DATA_DIR environment variable
//! 2. ~/.config/chess-trainer/data (production default)
//! 3. ./data (fallback for development)

use std::path::PathBuf;

const DEFAULT_CONFIG_DIR: &str = ".config/chess-trainer/data";
const DEV_DATA_DIR: &str = "./data";

/// Get the data directory for persistence.
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TRAINER_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(DEFAULT_CONFIG_DIR);
    }

    PathBuf::from(DEV_DATA_DIR)
}

/// Path to the puzzle catalog. `TRAINER_PUZZLES_FILE` overrides the
/// default `puzzles.csv` inside the data directory.
pub fn get_puzzles_path() -> PathBuf {
    if let Ok(path) = std::env::var("TRAINER_PUZZLES_FILE") {
        return PathBuf::from(path);
    }
    get_data_dir().join("puzzles.csv")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_data_dir_is_nonempty() {
        let dir = get_data_dir();
        assert!(!dir.as_os_str().is_empty());
    }

    #[test]
    fn test_puzzles_path_defaults_to_data_dir() {
        if std::env::var("TRAINER_PUZZLES_FILE").is_err() {
            assert!(get_puzzles_path().ends_with("puzzles.csv"));
        }
    }
}
