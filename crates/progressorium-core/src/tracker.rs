//! Progress Tracker
//!
//! The single owner of the learner's in-memory state. Views read snapshots
//! or subscribe to the watch channel; every mutation goes through
//! `apply_lesson_completion` or `reset_progress` and is persisted before the
//! call returns. Storage failures are logged and reported, never raised.

use crate::badges::{BadgeDescriptor, BadgeRuleSet};
use crate::catalog::{Catalog, LessonDescriptor, LessonId};
use crate::config::ProgressConfig;
use crate::engine::ProgressionEngine;
use crate::error::Result;
use crate::levels::Rank;
use crate::state::ProgressState;
use crate::store::{LoadStatus, ProgressStore};
use tokio::sync::watch;
use tracing::{info, warn};

/// What one completion did to the learner's state
#[derive(Debug, Clone)]
pub struct CompletionRecord {
    pub lesson_id: LessonId,
    /// Lesson XP added (0 on a replay)
    pub xp_credited: u64,
    /// Badge bonus XP added by this completion
    pub badge_bonus_xp: u64,
    pub already_completed: bool,
    pub newly_awarded: Vec<BadgeDescriptor>,
    pub level_before: u32,
    pub level_after: u32,
    /// False only when the write to storage failed
    pub saved: bool,
}

impl CompletionRecord {
    pub fn total_xp_gained(&self) -> u64 {
        self.xp_credited + self.badge_bonus_xp
    }

    pub fn leveled_up(&self) -> bool {
        self.level_after > self.level_before
    }
}

pub struct ProgressTracker {
    engine: ProgressionEngine,
    store: ProgressStore,
    state: ProgressState,
    load_status: LoadStatus,
    updates: watch::Sender<ProgressState>,
}

impl ProgressTracker {
    /// Load persisted state and take ownership of it
    pub fn new(engine: ProgressionEngine, store: ProgressStore) -> Self {
        let loaded = store.load_with_status();
        let mut state = loaded.state;
        state.rederive_level(engine.rule());

        match &loaded.status {
            LoadStatus::Recovered(reason) => {
                warn!("Progress could not be restored ({}), starting fresh", reason)
            }
            LoadStatus::Restored => info!(
                "Restored progress: {} XP, level {}, {} lessons",
                state.xp(),
                state.level(),
                state.completed_count()
            ),
            LoadStatus::Fresh => {}
        }

        let (updates, _) = watch::channel(state.clone());
        Self {
            engine,
            store,
            state,
            load_status: loaded.status,
            updates,
        }
    }

    /// Built-in course, file-backed storage per `config`
    pub fn open(config: &ProgressConfig) -> Result<Self> {
        let engine = ProgressionEngine::new(
            Catalog::builtin(),
            BadgeRuleSet::builtin(),
            config.level_rule()?,
        );
        let store = ProgressStore::open(config)?;
        Ok(Self::new(engine, store))
    }

    pub fn engine(&self) -> &ProgressionEngine {
        &self.engine
    }

    pub fn catalog(&self) -> &Catalog {
        self.engine.catalog()
    }

    pub fn load_status(&self) -> &LoadStatus {
        &self.load_status
    }

    /// Current snapshot
    pub fn get_progress(&self) -> &ProgressState {
        &self.state
    }

    /// Receiver that always holds the latest snapshot
    pub fn subscribe(&self) -> watch::Receiver<ProgressState> {
        self.updates.subscribe()
    }

    pub fn current_level(&self) -> u32 {
        self.state.level()
    }

    pub fn completion_percent(&self) -> f64 {
        self.engine.completion_percent(&self.state)
    }

    pub fn earned_badges(&self) -> Vec<&BadgeDescriptor> {
        self.engine.badges().earned(&self.state)
    }

    pub fn rank(&self) -> Rank {
        Rank::from_xp(self.state.xp())
    }

    pub fn xp_to_next_level(&self) -> u64 {
        self.engine.rule().xp_to_next_level(self.state.xp())
    }

    pub fn progress_to_next_level(&self) -> u8 {
        self.engine.rule().progress_to_next_level(self.state.xp())
    }

    pub fn completed_lessons(&self) -> Vec<&LessonDescriptor> {
        self.engine.catalog().completed_lessons(self.state.completed())
    }

    /// Every catalog lesson has been completed
    pub fn course_complete(&self) -> bool {
        let catalog = self.engine.catalog();
        !catalog.is_empty()
            && catalog
                .lessons()
                .iter()
                .all(|l| self.state.has_completed(l.id))
    }

    /// Validate and apply a completion, grant badges, then persist.
    ///
    /// Invalid events return an error and leave state untouched. A replay of
    /// an already completed lesson credits no lesson XP, but the badge pass
    /// still runs: a badge that qualifies through completions merged in from
    /// another session is granted then.
    pub fn apply_lesson_completion(
        &mut self,
        lesson_id: LessonId,
        xp_awarded: i64,
    ) -> Result<CompletionRecord> {
        let level_before = self.state.level();

        let applied = self
            .engine
            .apply_completion(&self.state, lesson_id, xp_awarded)?;
        let evaluation = self.engine.evaluate_badges(&applied.state);

        if applied.already_completed {
            tracing::debug!("Lesson {} replayed, no XP credited", lesson_id);
        }
        for badge in &evaluation.newly_awarded {
            info!("Badge '{}' awarded (+{} XP)", badge.id, badge.xp_bonus);
        }

        let changed = evaluation.state != self.state;
        let saved = if changed {
            self.commit(evaluation.state)
        } else {
            true
        };

        let level_after = self.state.level();
        if level_after > level_before {
            info!("Level up: {} -> {}", level_before, level_after);
        }

        Ok(CompletionRecord {
            lesson_id,
            xp_credited: applied.xp_credited,
            badge_bonus_xp: evaluation.bonus_xp,
            already_completed: applied.already_completed,
            newly_awarded: evaluation.newly_awarded,
            level_before,
            level_after,
            saved,
        })
    }

    /// Drop all progress, in memory and in storage.
    ///
    /// Returns false if the stored record could not be erased; the in-memory
    /// state is reset either way.
    pub fn reset_progress(&mut self) -> bool {
        self.state = ProgressState::new();
        self.updates.send_replace(self.state.clone());

        match self.store.clear() {
            Ok(()) => {
                info!("Progress reset");
                true
            }
            Err(e) => {
                warn!("Progress reset in memory but storage was not cleared: {}", e);
                false
            }
        }
    }

    /// Adopt `next`, persist it and notify subscribers
    fn commit(&mut self, next: ProgressState) -> bool {
        let saved = match self.store.save(&next) {
            Ok(mut written) => {
                written.rederive_level(self.engine.rule());
                self.state = written;
                true
            }
            Err(e) => {
                warn!("Progress not saved, keeping it in memory: {}", e);
                self.state = next;
                false
            }
        };
        self.updates.send_replace(self.state.clone());
        saved
    }
}
