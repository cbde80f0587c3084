//! Level System
//!
//! One canonical rule: a fixed XP step per level.
//!
//! level = floor(xp / step) + 1
//!
//! With the default step of 500:
//! - 0..=499 XP: level 1
//! - 500..=999 XP: level 2
//! - 2925 XP (every lesson, no badges): level 6
//!
//! Rank titles are a separate, display-only band keyed on XP thresholds.
//! They never feed back into the numeric level.

use crate::error::{ProgressError, Result};
use serde::Serialize;

/// Default XP required per level
pub const DEFAULT_LEVEL_STEP: u64 = 500;

/// Rank bands: (minimum XP, title)
pub const RANK_BANDS: &[(u64, &str)] = &[
    (0, "Novice"),
    (500, "Apprentice"),
    (1200, "Competent"),
    (2200, "Proficient"),
    (3500, "Expert"),
];

/// Derive a level using the default step
pub fn derive_level(xp: u64) -> u32 {
    LevelRule::default().derive(xp)
}

/// Step-function level rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelRule {
    step: u64,
}

impl LevelRule {
    pub fn new(step: u64) -> Result<Self> {
        if step == 0 {
            return Err(ProgressError::InvalidConfig(
                "level_step must be greater than zero".to_string(),
            ));
        }
        Ok(Self { step })
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    /// Level for a total XP value. Total, monotonic, starts at 1.
    pub fn derive(&self, xp: u64) -> u32 {
        let level = (xp / self.step).saturating_add(1);
        u32::try_from(level).unwrap_or(u32::MAX)
    }

    /// Total XP at which `level` begins
    pub fn xp_for_level(&self, level: u32) -> u64 {
        (level.max(1) as u64 - 1).saturating_mul(self.step)
    }

    /// XP still needed to reach the next level
    pub fn xp_to_next_level(&self, xp: u64) -> u64 {
        let next = self.derive(xp).saturating_add(1);
        self.xp_for_level(next).saturating_sub(xp)
    }

    /// Progress through the current level as a percentage (0-100)
    pub fn progress_to_next_level(&self, xp: u64) -> u8 {
        let into_level = (xp % self.step) as u128;
        ((into_level * 100) / self.step as u128) as u8
    }
}

impl Default for LevelRule {
    fn default() -> Self {
        Self {
            step: DEFAULT_LEVEL_STEP,
        }
    }
}

/// Display title for an XP band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rank {
    pub title: &'static str,
    pub min_xp: u64,
}

impl Rank {
    pub fn from_xp(xp: u64) -> Self {
        for &(min_xp, title) in RANK_BANDS.iter().rev() {
            if xp >= min_xp {
                return Self { title, min_xp };
            }
        }
        Self {
            title: RANK_BANDS[0].1,
            min_xp: RANK_BANDS[0].0,
        }
    }

    /// The next rank up, if any
    pub fn next(&self) -> Option<Rank> {
        RANK_BANDS
            .iter()
            .find(|&&(min_xp, _)| min_xp > self.min_xp)
            .map(|&(min_xp, title)| Rank { title, min_xp })
    }

    /// XP still needed for the next rank (0 at the top band)
    pub fn xp_to_next(&self, xp: u64) -> u64 {
        self.next()
            .map(|n| n.min_xp.saturating_sub(xp))
            .unwrap_or(0)
    }
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title)
    }
}
