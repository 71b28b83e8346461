//! The level ladder: difficulty tiers controlling fall speed and scoring.

use std::time::Duration;

/// A difficulty tier. Levels form a forward chain: reaching
/// `next_level_score` advances to the next entry in [`LEVELS`]; a threshold
/// of `None` marks the terminal level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level {
    /// Display label for the info panel.
    pub display: &'static str,
    /// 1-based position in the ladder; weights the immediate per-line award.
    pub ordinal: u32,
    /// Score needed to advance, `None` at the max level.
    pub next_level_score: Option<u32>,
    /// Per-line multiplier for the deferred combo bonus.
    pub score_delta: u32,
    /// Period of the gravity tick and of the clear-resolution delay.
    pub interval: Duration,
}

const fn level(
    display: &'static str,
    ordinal: u32,
    next_level_score: Option<u32>,
    score_delta: u32,
    interval_ms: u64,
) -> Level {
    Level {
        display,
        ordinal,
        next_level_score,
        score_delta,
        interval: Duration::from_millis(interval_ms),
    }
}

/// The full ladder. Thresholds are non-decreasing along the chain.
pub const LEVELS: [Level; 10] = [
    level("Level 1", 1, Some(10), 1, 700),
    level("Level 2", 2, Some(30), 2, 600),
    level("Level 3", 3, Some(60), 3, 600),
    level("Level 4", 4, Some(100), 4, 500),
    level("Level 5", 5, Some(150), 5, 500),
    level("Level 6", 6, Some(210), 6, 400),
    level("Level 7", 7, Some(280), 7, 400),
    level("Level 8", 8, Some(360), 8, 300),
    level("Level 9", 9, Some(450), 9, 300),
    level("Level Max", 10, None, 10, 200),
];
