use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::json_store::Storable;

const PROFILE_KEY: &str = "profile";

const ADJECTIVES: &[&str] = &[
    "Swift", "Bold", "Quiet", "Clever", "Sharp", "Steady", "Lucky", "Fierce",
];
const PIECES: &[&str] = &["Pawn", "Knight", "Bishop", "Rook", "Queen", "King"];

/// Player profile. Singleton record in the profile store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub username: String,
    pub join_date: NaiveDate,
    pub last_active: NaiveDate,
    pub streak: u32,
    pub has_setup: bool,
}

impl Storable for Profile {
    fn key(&self) -> String {
        PROFILE_KEY.to_string()
    }
}

impl Profile {
    /// Fresh profile with a generated username and a one-day streak.
    pub fn new(today: NaiveDate) -> Self {
        Self {
            username: generate_username(),
            join_date: today,
            last_active: today,
            streak: 1,
            has_setup: false,
        }
    }

    /// Record activity on `today`, advancing or resetting the streak.
    pub fn touch(&mut self, today: NaiveDate) {
        self.streak = advance_streak(self.streak, self.last_active, today);
        self.last_active = today;
    }
}

/// Consecutive-day streak rule: next calendar day extends, a gap resets
/// to one, same day leaves the streak untouched.
fn advance_streak(streak: u32, last_active: NaiveDate, today: NaiveDate) -> u32 {
    match (today - last_active).num_days() {
        0 => streak,
        1 => streak + 1,
        d if d > 1 => 1,
        // Clock went backwards; leave the streak alone.
        _ => streak,
    }
}

fn generate_username() -> String {
    let mut rng = rand::thread_rng();
    let adjective = ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())];
    let piece = PIECES[rng.gen_range(0..PIECES.len())];
    format!("{}{}{}", adjective, piece, rng.gen_range(100..1000))
}
