//! Progression Engine
//!
//! Pure transformations over `ProgressState`. No I/O happens here; callers
//! persist the returned state through the store.
//!
//! ## Transitions
//!
//! 1. `apply_completion`: validate the event, credit XP once per lesson id
//! 2. `evaluate_badges`: grant every newly qualifying badge and its bonus
//!
//! Both return a new state and leave the input untouched.

use crate::badges::{BadgeDescriptor, BadgeRuleSet};
use crate::catalog::{Catalog, LessonId};
use crate::error::{ProgressError, Result};
use crate::levels::LevelRule;
use crate::state::ProgressState;

/// Result of folding one completion event into state
#[derive(Debug, Clone)]
pub struct CompletionApplied {
    pub state: ProgressState,
    /// XP actually added (0 on a replay)
    pub xp_credited: u64,
    /// The lesson was already in `completed` before this event
    pub already_completed: bool,
}

/// Result of a badge evaluation pass
#[derive(Debug, Clone)]
pub struct BadgeEvaluation {
    pub state: ProgressState,
    /// Badges granted by this pass, in declaration order
    pub newly_awarded: Vec<BadgeDescriptor>,
    pub bonus_xp: u64,
}

/// Reference data plus the level rule
#[derive(Debug, Clone)]
pub struct ProgressionEngine {
    catalog: Catalog,
    badges: BadgeRuleSet,
    rule: LevelRule,
}

impl ProgressionEngine {
    pub fn new(catalog: Catalog, badges: BadgeRuleSet, rule: LevelRule) -> Self {
        Self {
            catalog,
            badges,
            rule,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn badges(&self) -> &BadgeRuleSet {
        &self.badges
    }

    pub fn rule(&self) -> &LevelRule {
        &self.rule
    }

    pub fn derive_level(&self, xp: u64) -> u32 {
        self.rule.derive(xp)
    }

    /// Share of the catalog completed, 0.0-100.0. Ids outside the catalog
    /// do not count.
    pub fn completion_percent(&self, state: &ProgressState) -> f64 {
        if self.catalog.is_empty() {
            return 0.0;
        }
        let done = self.catalog.completed_lessons(state.completed()).len();
        let pct = 100.0 * done as f64 / self.catalog.len() as f64;
        pct.min(100.0)
    }

    /// Sum of lesson XP and every badge bonus
    pub fn total_possible_xp(&self) -> u64 {
        self.catalog.total_lesson_xp() + self.badges.total_bonus_xp()
    }

    /// Fold a lesson completion into state.
    ///
    /// Unknown lessons and negative awards are rejected without touching the
    /// state. A lesson already in `completed` credits nothing.
    pub fn apply_completion(
        &self,
        state: &ProgressState,
        lesson_id: LessonId,
        xp_awarded: i64,
    ) -> Result<CompletionApplied> {
        if !self.catalog.contains(lesson_id) {
            return Err(ProgressError::UnknownLesson(lesson_id.value()));
        }
        let award = u64::try_from(xp_awarded).map_err(|_| ProgressError::NegativeXp(xp_awarded))?;

        let mut next = state.clone();
        if state.has_completed(lesson_id) {
            return Ok(CompletionApplied {
                state: next,
                xp_credited: 0,
                already_completed: true,
            });
        }

        next.xp = next.xp.saturating_add(award);
        next.completed.push(lesson_id);
        next.ledger.lessons.insert(lesson_id, award);
        next.level = self.rule.derive(next.xp);

        Ok(CompletionApplied {
            state: next,
            xp_credited: award,
            already_completed: false,
        })
    }

    /// Grant every badge not yet held whose condition holds.
    ///
    /// Conditions are checked against the input state, so the set granted in
    /// one pass does not depend on declaration order; bonuses are then added
    /// in declaration order.
    pub fn evaluate_badges(&self, state: &ProgressState) -> BadgeEvaluation {
        let newly_awarded: Vec<BadgeDescriptor> = self
            .badges
            .iter()
            .filter(|b| !state.has_badge(b.id) && b.qualifies(state))
            .copied()
            .collect();

        let mut next = state.clone();
        let mut bonus_xp = 0u64;
        for badge in &newly_awarded {
            next.badges.push(badge.id.to_string());
            next.ledger.badges.insert(badge.id.to_string(), badge.xp_bonus);
            bonus_xp = bonus_xp.saturating_add(badge.xp_bonus);
        }
        next.xp = next.xp.saturating_add(bonus_xp);
        next.level = self.rule.derive(next.xp);

        BadgeEvaluation {
            state: next,
            newly_awarded,
            bonus_xp,
        }
    }
}

impl Default for ProgressionEngine {
    fn default() -> Self {
        Self::new(Catalog::builtin(), BadgeRuleSet::builtin(), LevelRule::default())
    }
}
