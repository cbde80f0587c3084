//! Learner progress state.
//!
//! `ProgressState` is only ever built through `ProgressState::new`,
//! `ProgressState::from_parts` or the engine transitions, so the level always
//! matches the XP under the rule it was derived with and the completed/badge
//! lists never hold duplicates.

use crate::catalog::LessonId;
use crate::levels::LevelRule;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counters some badge conditions read. Every field defaults to empty/zero so
/// conditions stay total even when no game ever increments them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProgressCounters {
    pub saved_templates: Vec<String>,
    pub perfect_scores: Vec<LessonId>,
    pub speed_bonuses: Vec<LessonId>,
    pub best_streak: u32,
}

impl ProgressCounters {
    /// Drop duplicate entries, keeping first occurrence order
    pub fn normalize(&mut self) {
        dedup_in_order(&mut self.saved_templates);
        dedup_in_order(&mut self.perfect_scores);
        dedup_in_order(&mut self.speed_bonuses);
    }

    /// Set-union the lists and keep the larger streak
    pub fn merge(&mut self, other: &ProgressCounters) {
        union_into(&mut self.saved_templates, &other.saved_templates);
        union_into(&mut self.perfect_scores, &other.perfect_scores);
        union_into(&mut self.speed_bonuses, &other.speed_bonuses);
        self.best_streak = self.best_streak.max(other.best_streak);
    }
}

/// XP credited per source, so a merge of two snapshots can re-add XP
/// instead of guessing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XpLedger {
    pub lessons: BTreeMap<LessonId, u64>,
    pub badges: BTreeMap<String, u64>,
}

impl XpLedger {
    pub fn total(&self) -> u64 {
        self.lessons
            .values()
            .chain(self.badges.values())
            .fold(0u64, |acc, xp| acc.saturating_add(*xp))
    }

    /// Add entries missing from `self`; existing credits win
    pub fn merge(&mut self, other: &XpLedger) {
        for (id, xp) in &other.lessons {
            self.lessons.entry(*id).or_insert(*xp);
        }
        for (id, xp) in &other.badges {
            self.badges.entry(id.clone()).or_insert(*xp);
        }
    }
}

/// A learner's accumulated progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressState {
    pub(crate) xp: u64,
    pub(crate) level: u32,
    pub(crate) completed: Vec<LessonId>,
    pub(crate) badges: Vec<String>,
    pub(crate) counters: ProgressCounters,
    pub(crate) ledger: XpLedger,
}

impl ProgressState {
    /// Empty state: 0 XP, level 1, nothing completed
    pub fn new() -> Self {
        Self {
            xp: 0,
            level: 1,
            completed: Vec::new(),
            badges: Vec::new(),
            counters: ProgressCounters::default(),
            ledger: XpLedger::default(),
        }
    }

    /// Assemble a state from raw parts, deduplicating and re-deriving level
    pub fn from_parts(
        xp: u64,
        mut completed: Vec<LessonId>,
        mut badges: Vec<String>,
        mut counters: ProgressCounters,
        rule: &LevelRule,
    ) -> Self {
        dedup_in_order(&mut completed);
        dedup_in_order(&mut badges);
        counters.normalize();

        Self {
            xp,
            level: rule.derive(xp),
            completed,
            badges,
            counters,
            ledger: XpLedger::default(),
        }
    }

    /// Attach the per-source credits a record was saved with
    pub(crate) fn with_ledger(mut self, ledger: XpLedger) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn xp(&self) -> u64 {
        self.xp
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    /// Completed lesson ids in completion order
    pub fn completed(&self) -> &[LessonId] {
        &self.completed
    }

    /// Awarded badge ids in award order
    pub fn badges(&self) -> &[String] {
        &self.badges
    }

    pub fn counters(&self) -> &ProgressCounters {
        &self.counters
    }

    pub fn ledger(&self) -> &XpLedger {
        &self.ledger
    }

    /// The ledger credits exactly the completed lessons and held badges, and
    /// sums to `xp`. Records from older saves carry no ledger.
    pub fn ledger_is_exact(&self) -> bool {
        self.ledger.lessons.len() == self.completed.len()
            && self.ledger.badges.len() == self.badges.len()
            && self.completed.iter().all(|id| self.ledger.lessons.contains_key(id))
            && self.badges.iter().all(|id| self.ledger.badges.contains_key(id))
            && self.ledger.total() == self.xp
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn has_completed(&self, id: LessonId) -> bool {
        self.completed.contains(&id)
    }

    /// True when every id in `ids` has been completed
    pub fn has_completed_all(&self, ids: &[u32]) -> bool {
        ids.iter().all(|&id| self.has_completed(LessonId(id)))
    }

    pub fn has_badge(&self, id: &str) -> bool {
        self.badges.iter().any(|b| b == id)
    }

    /// Most recently completed lesson
    pub fn last_completed(&self) -> Option<LessonId> {
        self.completed.last().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.xp == 0 && self.completed.is_empty() && self.badges.is_empty()
    }

    /// Re-derive level after the rule changed (e.g. a new config step)
    pub fn rederive_level(&mut self, rule: &LevelRule) {
        self.level = rule.derive(self.xp);
    }
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn dedup_in_order<T: PartialEq>(items: &mut Vec<T>) {
    let mut i = 0;
    while i < items.len() {
        if items[..i].contains(&items[i]) {
            items.remove(i);
        } else {
            i += 1;
        }
    }
}

pub(crate) fn union_into<T: PartialEq + Clone>(into: &mut Vec<T>, other: &[T]) {
    for item in other {
        if !into.contains(item) {
            into.push(item.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_empty() {
        let state = ProgressState::new();
        assert_eq!(state.xp(), 0);
        assert_eq!(state.level(), 1);
        assert!(state.completed().is_empty());
        assert!(state.badges().is_empty());
        assert!(state.is_empty());
        assert!(state.last_completed().is_none());
    }

    #[test]
    fn test_from_parts_dedups_and_derives_level() {
        let state = ProgressState::from_parts(
            1250,
            vec![LessonId(3), LessonId(1), LessonId(3)],
            vec!["first-win".to_string(), "first-win".to_string()],
            ProgressCounters::default(),
            &LevelRule::default(),
        );
        assert_eq!(state.completed(), &[LessonId(3), LessonId(1)]);
        assert_eq!(state.badges(), &["first-win".to_string()]);
        assert_eq!(state.level(), 3);
        assert_eq!(state.last_completed(), Some(LessonId(1)));
    }

    #[test]
    fn test_has_completed_all() {
        let state = ProgressState::from_parts(
            0,
            vec![LessonId(1), LessonId(2)],
            vec![],
            ProgressCounters::default(),
            &LevelRule::default(),
        );
        assert!(state.has_completed_all(&[1, 2]));
        assert!(!state.has_completed_all(&[1, 2, 3]));
        assert!(state.has_completed_all(&[]));
    }

    #[test]
    fn test_counters_merge() {
        let mut a = ProgressCounters {
            saved_templates: vec!["a".to_string()],
            perfect_scores: vec![LessonId(1)],
            speed_bonuses: vec![],
            best_streak: 2,
        };
        let b = ProgressCounters {
            saved_templates: vec!["a".to_string(), "b".to_string()],
            perfect_scores: vec![LessonId(2)],
            speed_bonuses: vec![LessonId(4)],
            best_streak: 1,
        };
        a.merge(&b);
        assert_eq!(a.saved_templates, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(a.perfect_scores, vec![LessonId(1), LessonId(2)]);
        assert_eq!(a.speed_bonuses, vec![LessonId(4)]);
        assert_eq!(a.best_streak, 2);
    }

    #[test]
    fn test_ledger_merge_keeps_existing_credits() {
        let mut a = XpLedger::default();
        a.lessons.insert(LessonId(1), 100);
        a.badges.insert("first-win".to_string(), 50);
        let mut b = XpLedger::default();
        b.lessons.insert(LessonId(1), 80);
        b.lessons.insert(LessonId(2), 125);
        b.badges.insert("first-win".to_string(), 50);

        a.merge(&b);
        assert_eq!(a.lessons[&LessonId(1)], 100);
        assert_eq!(a.total(), 275);
    }

    #[test]
    fn test_ledger_exactness() {
        assert!(ProgressState::new().ledger_is_exact());

        let legacy = ProgressState::from_parts(
            100,
            vec![LessonId(1)],
            vec![],
            ProgressCounters::default(),
            &LevelRule::default(),
        );
        assert!(!legacy.ledger_is_exact());

        let mut ledger = XpLedger::default();
        ledger.lessons.insert(LessonId(1), 100);
        assert!(legacy.with_ledger(ledger).ledger_is_exact());
    }

    #[test]
    fn test_dedup_in_order() {
        let mut v = vec![3, 1, 3, 2, 1];
        dedup_in_order(&mut v);
        assert_eq!(v, vec![3, 1, 2]);
    }
}
