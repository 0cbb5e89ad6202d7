//! XP and star arithmetic.

/// Stars for a puzzle attempt: start at 3, lose half a star per hint,
/// floor at 1.
pub fn stars_for_hints(hints_used: u32) -> f32 {
    (3.0 - 0.5 * hints_used as f32).max(1.0)
}

/// XP tier for a puzzle attempt's star value.
pub fn puzzle_xp_tier(stars: f32) -> u32 {
    if stars >= 3.0 {
        50
    } else if stars >= 2.5 {
        40
    } else if stars >= 2.0 {
        30
    } else if stars >= 1.5 {
        20
    } else {
        10
    }
}

/// Flat XP for finishing a match. Losses and draws still pay out.
pub fn match_xp(won: bool) -> u32 {
    if won {
        100
    } else {
        25
    }
}
