use engine::RankedMove;

/// Quality tag for a user move, judged against the engine's candidate
/// list for the position the move was played from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveQuality {
    Best,
    Second,
    Third,
    Mistake,
}

impl MoveQuality {
    pub fn label(self) -> &'static str {
        match self {
            Self::Best => "best",
            Self::Second => "second",
            Self::Third => "third",
            Self::Mistake => "mistake",
        }
    }

    /// Immediate XP credited to the running match total.
    pub fn xp_reward(self) -> u32 {
        match self {
            Self::Best => 10,
            Self::Second => 6,
            Self::Third => 3,
            Self::Mistake => 0,
        }
    }
}

/// Classify a coordinate move against the ranked candidates. Returns
/// None when no candidate list was available, so the move goes untagged
/// rather than being called a mistake.
pub fn classify(mv: &str, candidates: &[RankedMove]) -> Option<MoveQuality> {
    if candidates.is_empty() {
        return None;
    }
    Some(match candidates.iter().position(|c| c.mv == mv) {
        Some(0) => MoveQuality::Best,
        Some(1) => MoveQuality::Second,
        Some(2) => MoveQuality::Third,
        _ => MoveQuality::Mistake,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::ScoreKind;

    fn candidates(moves: &[&str]) -> Vec<RankedMove> {
        moves
            .iter()
            .map(|mv| RankedMove {
                mv: mv.to_string(),
                score: 0,
                kind: ScoreKind::Centipawns,
                depth: 14,
            })
            .collect()
    }

    #[test]
    fn test_ranks_map_to_tags() {
        let list = candidates(&["e2e4", "d2d4", "g1f3"]);
        assert_eq!(classify("e2e4", &list), Some(MoveQuality::Best));
        assert_eq!(classify("d2d4", &list), Some(MoveQuality::Second));
        assert_eq!(classify("g1f3", &list), Some(MoveQuality::Third));
        assert_eq!(classify("a2a3", &list), Some(MoveQuality::Mistake));
    }

    #[test]
    fn test_no_candidates_means_no_tag() {
        assert_eq!(classify("e2e4", &[]), None);
    }

    #[test]
    fn test_xp_rewards() {
        assert_eq!(MoveQuality::Best.xp_reward(), 10);
        assert_eq!(MoveQuality::Second.xp_reward(), 6);
        assert_eq!(MoveQuality::Third.xp_reward(), 3);
        assert_eq!(MoveQuality::Mistake.xp_reward(), 0);
    }
}
