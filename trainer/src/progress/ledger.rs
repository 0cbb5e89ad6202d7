use std::path::Path;

use chess::PieceColor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::json_store::{JsonStore, Storable};
use super::profile::Profile;
use super::xp;

/// Settled result of one puzzle. Keyed by puzzle id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PuzzleResult {
    pub puzzle_id: String,
    /// Best star value ever achieved.
    pub stars: f32,
    /// Total XP paid out for this puzzle across attempts.
    pub xp_awarded: u32,
    pub completed: bool,
    pub updated_at: DateTime<Utc>,
}

impl Storable for PuzzleResult {
    fn key(&self) -> String {
        self.puzzle_id.clone()
    }
}

/// Lifetime XP counter. Singleton record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct XpTotal {
    xp: u64,
}

impl Storable for XpTotal {
    fn key(&self) -> String {
        "xp_total".to_string()
    }
}

/// What one puzzle settlement paid out.
#[derive(Debug, Clone, PartialEq)]
pub struct PuzzleSettlement {
    pub stars_recorded: f32,
    pub xp_awarded: u32,
    pub xp_total: u64,
}

/// File-backed progression ledger.
///
/// Every operation degrades on store failure: errors are logged and a
/// default comes back, so gameplay never stalls on a broken data
/// directory. Callers on the session actor serialize all access.
pub struct ProgressLedger {
    results: JsonStore<PuzzleResult>,
    profile: JsonStore<Profile>,
    totals: JsonStore<XpTotal>,
}

impl ProgressLedger {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            results: JsonStore::new(data_dir.join("results")),
            profile: JsonStore::new(data_dir.join("profile")),
            totals: JsonStore::new(data_dir.join("profile")),
        }
    }

    /// Load the profile, creating it on first run, and advance the
    /// daily streak for today.
    pub fn load_profile(&self) -> Profile {
        self.load_profile_at(Utc::now().date_naive())
    }

    fn load_profile_at(&self, today: chrono::NaiveDate) -> Profile {
        let mut profile = match self.profile.load("profile") {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                let profile = Profile::new(today);
                tracing::info!("Created profile for {}", profile.username);
                profile
            }
            Err(e) => {
                tracing::warn!("Profile unavailable, using a fresh one: {}", e);
                Profile::new(today)
            }
        };
        profile.touch(today);
        self.save_profile(&profile);
        profile
    }

    pub fn save_profile(&self, profile: &Profile) {
        if let Err(e) = self.profile.save(profile) {
            tracing::warn!("Failed to save profile: {}", e);
        }
    }

    pub fn xp_total(&self) -> u64 {
        match self.totals.load("xp_total") {
            Ok(Some(total)) => total.xp,
            Ok(None) => 0,
            Err(e) => {
                tracing::warn!("XP total unavailable: {}", e);
                0
            }
        }
    }

    fn add_xp(&self, amount: u32) -> u64 {
        let total = self.xp_total() + u64::from(amount);
        if let Err(e) = self.totals.save(&XpTotal { xp: total }) {
            tracing::warn!("Failed to save XP total: {}", e);
        }
        total
    }

    /// Settle a completed puzzle attempt.
    ///
    /// Stars never decrease: the stored value is the best of the prior
    /// record and this attempt. XP is paid as the difference between
    /// this attempt's tier and what the puzzle already paid out, so
    /// replaying a puzzle can only top up to its best-ever tier.
    pub fn settle_puzzle(&self, puzzle_id: &str, stars: f32) -> PuzzleSettlement {
        let prior = match self.results.load(puzzle_id) {
            Ok(prior) => prior,
            Err(e) => {
                tracing::warn!("Puzzle record {} unavailable: {}", puzzle_id, e);
                None
            }
        };

        let prior_stars = prior.as_ref().map(|r| r.stars).unwrap_or(0.0);
        let prior_xp = prior.as_ref().map(|r| r.xp_awarded).unwrap_or(0);

        let tier = xp::puzzle_xp_tier(stars);
        let awarded = tier.saturating_sub(prior_xp);

        let record = PuzzleResult {
            puzzle_id: puzzle_id.to_string(),
            stars: stars.max(prior_stars),
            xp_awarded: prior_xp + awarded,
            completed: true,
            updated_at: Utc::now(),
        };
        if let Err(e) = self.results.save(&record) {
            tracing::warn!("Failed to save puzzle record {}: {}", puzzle_id, e);
        }

        let xp_total = if awarded > 0 {
            self.add_xp(awarded)
        } else {
            self.xp_total()
        };

        tracing::info!(
            "Puzzle {} settled: {} stars, +{} XP",
            puzzle_id,
            record.stars,
            awarded
        );
        PuzzleSettlement {
            stars_recorded: record.stars,
            xp_awarded: awarded,
            xp_total,
        }
    }

    /// Settle a finished match: flat win/loss XP plus whatever the
    /// session accumulated from move-quality rewards. Matches are never
    /// deduplicated.
    pub fn settle_match(
        &self,
        winner: Option<PieceColor>,
        player_color: PieceColor,
        session_xp: u32,
    ) -> u64 {
        let won = winner == Some(player_color);
        let awarded = xp::match_xp(won) + session_xp;
        let total = self.add_xp(awarded);
        tracing::info!("Match settled: won={}, +{} XP", won, awarded);
        total
    }

    pub fn result_for(&self, puzzle_id: &str) -> Option<PuzzleResult> {
        self.results.load(puzzle_id).unwrap_or_else(|e| {
            tracing::warn!("Puzzle record {} unavailable: {}", puzzle_id, e);
            None
        })
    }

    pub fn all_results(&self) -> Vec<PuzzleResult> {
        self.results.load_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> (tempfile::TempDir, ProgressLedger) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ProgressLedger::new(dir.path());
        (dir, ledger)
    }

    #[test]
    fn test_first_settlement_pays_full_tier() {
        let (_dir, ledger) = ledger();
        let settlement = ledger.settle_puzzle("mate-1", 3.0);
        assert_eq!(settlement.xp_awarded, 50);
        assert_eq!(settlement.stars_recorded, 3.0);
        assert_eq!(ledger.xp_total(), 50);
    }

    #[test]
    fn test_replay_tops_up_only() {
        let (_dir, ledger) = ledger();
        // Sloppy first attempt: two hints, 2.0 stars, 30 XP.
        ledger.settle_puzzle("mate-1", 2.0);
        // Clean replay tops up to the 50 XP tier.
        let settlement = ledger.settle_puzzle("mate-1", 3.0);
        assert_eq!(settlement.xp_awarded, 20);
        assert_eq!(ledger.xp_total(), 50);
        // A third, worse attempt pays nothing and keeps the best stars.
        let settlement = ledger.settle_puzzle("mate-1", 1.0);
        assert_eq!(settlement.xp_awarded, 0);
        assert_eq!(settlement.stars_recorded, 3.0);
        assert_eq!(ledger.xp_total(), 50);
    }

    #[test]
    fn test_match_settlement_always_pays() {
        let (_dir, ledger) = ledger();
        let total = ledger.settle_match(Some(PieceColor::White), PieceColor::White, 16);
        assert_eq!(total, 116);
        // Draw pays the consolation amount.
        let total = ledger.settle_match(None, PieceColor::White, 0);
        assert_eq!(total, 141);
        // Loss too, and repeat matches stack.
        let total = ledger.settle_match(Some(PieceColor::Black), PieceColor::White, 0);
        assert_eq!(total, 166);
    }

    #[test]
    fn test_profile_created_once_and_streak_advances() {
        let (_dir, ledger) = ledger();
        let day1 = chrono::NaiveDate::from_ymd_opt(2026, 8, 27).unwrap();
        let day2 = chrono::NaiveDate::from_ymd_opt(2026, 8, 28).unwrap();

        let first = ledger.load_profile_at(day1);
        assert_eq!(first.streak, 1);

        let second = ledger.load_profile_at(day2);
        assert_eq!(second.username, first.username);
        assert_eq!(second.streak, 2);

        // A long gap resets to one.
        let later = ledger.load_profile_at(chrono::NaiveDate::from_ymd_opt(2026, 9, 10).unwrap());
        assert_eq!(later.streak, 1);
    }

    #[test]
    fn test_broken_store_degrades_to_defaults() {
        let ledger = ProgressLedger::new(Path::new("/dev/null/nope"));
        assert_eq!(ledger.xp_total(), 0);
        let settlement = ledger.settle_puzzle("mate-1", 3.0);
        assert_eq!(settlement.xp_awarded, 50);
        assert!(ledger.all_results().is_empty());
    }
}
