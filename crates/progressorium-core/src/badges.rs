//! Badge rule set.
//!
//! Each badge is a pure predicate over `ProgressState` plus a one-time XP
//! bonus. Declaration order is evaluation order.

use crate::error::{ProgressError, Result};
use crate::state::ProgressState;
use serde::Serialize;
use std::collections::HashSet;

/// Predicate deciding whether a badge qualifies
pub type BadgeCondition = fn(&ProgressState) -> bool;

/// One badge definition
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BadgeDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub xp_bonus: u64,
    #[serde(skip)]
    pub condition: BadgeCondition,
}

impl BadgeDescriptor {
    pub const fn new(
        id: &'static str,
        name: &'static str,
        description: &'static str,
        xp_bonus: u64,
        condition: BadgeCondition,
    ) -> Self {
        Self {
            id,
            name,
            description,
            xp_bonus,
            condition,
        }
    }

    pub fn qualifies(&self, state: &ProgressState) -> bool {
        (self.condition)(state)
    }
}

const FOUNDATION_IDS: &[u32] = &[1, 2, 3, 4, 5];
const SYNTHESIS_IDS: &[u32] = &[6, 7, 8, 9, 10, 11, 12];
const CREATION_IDS: &[u32] = &[13, 14, 15, 16];
const STRATEGY_IDS: &[u32] = &[17, 18, 19, 20];
const WORKFLOW_IDS: &[u32] = &[11, 12, 13, 14, 15, 16, 17, 18, 19];
const ALL_IDS: &[u32] = &[
    1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20,
];

/// Built-in badges, in evaluation order
pub const BADGES: &[BadgeDescriptor] = &[
    BadgeDescriptor::new("first-win", "First Steps", "Complete any 1 lesson", 50, |p| {
        p.completed_count() >= 1
    }),
    BadgeDescriptor::new(
        "foundation",
        "Foundation Builder",
        "Complete all Foundation lessons (1-5)",
        150,
        |p| p.has_completed_all(FOUNDATION_IDS),
    ),
    BadgeDescriptor::new(
        "synthesis-master",
        "Synthesis Master",
        "Complete all Synthesis lessons (6-12)",
        200,
        |p| p.has_completed_all(SYNTHESIS_IDS),
    ),
    BadgeDescriptor::new(
        "creator",
        "Creative Catalyst",
        "Complete all Creation lessons (13-16)",
        200,
        |p| p.has_completed_all(CREATION_IDS),
    ),
    BadgeDescriptor::new(
        "strategist",
        "Master Strategist",
        "Complete all Strategy lessons (17-20)",
        250,
        |p| p.has_completed_all(STRATEGY_IDS),
    ),
    BadgeDescriptor::new(
        "workflow-warrior",
        "Workflow Warrior",
        "Complete lessons 11-19 (The Distillery through Relay Race)",
        300,
        |p| p.has_completed_all(WORKFLOW_IDS),
    ),
    BadgeDescriptor::new(
        "vault-master",
        "Vault Master",
        "Complete lesson 20 with 5 templates saved",
        500,
        |p| p.has_completed_all(&[20]) && p.counters().saved_templates.len() >= 5,
    ),
    BadgeDescriptor::new(
        "perfect-ten",
        "Perfectionist",
        "Score 100% on any 10 games",
        300,
        |p| p.counters().perfect_scores.len() >= 10,
    ),
    BadgeDescriptor::new(
        "speed-demon",
        "Speed Demon",
        "Complete 5 games with time bonuses",
        200,
        |p| p.counters().speed_bonuses.len() >= 5,
    ),
    BadgeDescriptor::new(
        "streak-master",
        "Streak Master",
        "Achieve a 5-game winning streak",
        250,
        |p| p.counters().best_streak >= 5,
    ),
    BadgeDescriptor::new(
        "completionist",
        "Completionist",
        "Complete all 20 lessons",
        1000,
        |p| p.has_completed_all(ALL_IDS),
    ),
];

/// Ordered, id-unique set of badges
#[derive(Debug, Clone)]
pub struct BadgeRuleSet {
    badges: Vec<BadgeDescriptor>,
}

impl BadgeRuleSet {
    pub fn new(badges: Vec<BadgeDescriptor>) -> Result<Self> {
        let mut seen = HashSet::new();
        for badge in &badges {
            if !seen.insert(badge.id) {
                return Err(ProgressError::InvalidCatalog(format!(
                    "duplicate badge id '{}'",
                    badge.id
                )));
            }
        }
        Ok(Self { badges })
    }

    pub fn builtin() -> Self {
        Self {
            badges: BADGES.to_vec(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &BadgeDescriptor> {
        self.badges.iter()
    }

    pub fn len(&self) -> usize {
        self.badges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.badges.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&BadgeDescriptor> {
        self.badges.iter().find(|b| b.id == id)
    }

    /// Descriptors for the badges already in `state`, in award order.
    /// Ids with no descriptor (e.g. from an older rule set) are skipped.
    pub fn earned(&self, state: &ProgressState) -> Vec<&BadgeDescriptor> {
        state.badges().iter().filter_map(|id| self.get(id)).collect()
    }

    /// Sum of every badge bonus
    pub fn total_bonus_xp(&self) -> u64 {
        self.badges.iter().map(|b| b.xp_bonus).sum()
    }
}

impl Default for BadgeRuleSet {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Format a badge for an unlock notification
pub fn format_badge_unlock(badge: &BadgeDescriptor) -> String {
    format!(
        "Badge unlocked: {} - {} (+{} XP)",
        badge.name, badge.description, badge.xp_bonus
    )
}
