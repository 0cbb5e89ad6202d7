//! Evaluation normalization and the per-move evaluation history.

use chess::PieceColor;
use engine::{Evaluation, ScoreKind};

/// White-positive evaluation: positive favors white regardless of whose
/// turn it was in the evaluated position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizedEval {
    Centipawns(i32),
    MateIn(i32),
}

impl NormalizedEval {
    pub const EVEN: Self = Self::Centipawns(0);

    pub fn is_mate(self) -> bool {
        matches!(self, Self::MateIn(_))
    }

    /// Comparable centipawn magnitude, mates mapped past any material
    /// score.
    pub fn as_cp(self) -> i32 {
        match self {
            Self::Centipawns(cp) => engine::score_to_cp(ScoreKind::Centipawns, cp),
            Self::MateIn(n) => engine::score_to_cp(ScoreKind::Mate, n),
        }
    }
}

impl std::fmt::Display for NormalizedEval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Centipawns(cp) => write!(f, "{:+.2}", f64::from(*cp) / 100.0),
            Self::MateIn(n) if *n >= 0 => write!(f, "#{}", n),
            Self::MateIn(n) => write!(f, "#-{}", -n),
        }
    }
}

/// Flip a raw side-to-move-relative engine score into white-positive
/// orientation.
pub fn normalize(eval: &Evaluation) -> NormalizedEval {
    let sign = match eval.turn {
        PieceColor::White => 1,
        PieceColor::Black => -1,
    };
    match eval.kind {
        ScoreKind::Centipawns => NormalizedEval::Centipawns(eval.value * sign),
        ScoreKind::Mate => NormalizedEval::MateIn(eval.value * sign),
    }
}

/// One cell of the evaluation history, aligned with the move list.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalEntry {
    pub position_key: String,
    pub value: NormalizedEval,
}

/// Current evaluation plus the per-ply history.
///
/// Entries start as zero placeholders when a move is committed and are
/// backfilled by key as deeper evaluations arrive, so late results land
/// on the right ply even after further moves.
#[derive(Debug, Default)]
pub struct EvalLedger {
    current: NormalizedEval,
    entries: Vec<EvalEntry>,
}

impl Default for NormalizedEval {
    fn default() -> Self {
        Self::EVEN
    }
}

impl EvalLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> NormalizedEval {
        self.current
    }

    pub fn entries(&self) -> &[EvalEntry] {
        &self.entries
    }

    pub fn reset(&mut self) {
        self.current = NormalizedEval::EVEN;
        self.entries.clear();
    }

    /// Append a zero placeholder for a freshly committed move.
    pub fn push_placeholder(&mut self, position_key: String) {
        self.entries.push(EvalEntry {
            position_key,
            value: NormalizedEval::EVEN,
        });
    }

    /// Drop entries past `len`, realigning after an undo. The current
    /// cell falls back to the last surviving entry.
    pub fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
        self.current = self
            .entries
            .last()
            .map(|e| e.value)
            .unwrap_or(NormalizedEval::EVEN);
    }

    /// Record an evaluation for a position key. Updates the current
    /// cell when the key matches the live position, and backfills every
    /// history entry under that key. Returns whether the current cell
    /// changed.
    ///
    /// In the history, a zero centipawn value never overwrites a
    /// nonzero one: shallow passes report zero before the search
    /// settles, and losing an established score to that would make the
    /// bar flicker. Mate scores always win. The current cell has no
    /// such guard, so a position that genuinely settles at even does
    /// show as even.
    pub fn record(&mut self, key: &str, value: NormalizedEval, live_key: &str) -> bool {
        let mut current_changed = false;
        if key == live_key && self.current != value {
            self.current = value;
            current_changed = true;
        }
        for entry in self.entries.iter_mut().filter(|e| e.position_key == key) {
            if !zero_blocked(entry.value, value) {
                entry.value = value;
            }
        }
        current_changed
    }
}

fn zero_blocked(existing: NormalizedEval, incoming: NormalizedEval) -> bool {
    incoming == NormalizedEval::EVEN && existing != NormalizedEval::EVEN
}
