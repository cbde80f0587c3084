//! Completion handoff: the step between a finished mini-game and the shell.
//!
//! A game reports its award, the tracker folds it in and persists it, and the
//! shell is told which screen comes next. Calling it twice for the same
//! attempt is safe; the second call credits nothing.

use crate::badges::BadgeDescriptor;
use crate::catalog::{LessonDescriptor, LessonId};
use crate::error::{ProgressError, Result};
use crate::tracker::ProgressTracker;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What a mini-game reports when it ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameResult {
    pub xp_awarded: i64,
    /// Celebratory only; never gates XP or badges
    #[serde(default)]
    pub perfect: bool,
}

impl GameResult {
    pub fn new(xp_awarded: i64) -> Self {
        Self {
            xp_awarded,
            perfect: false,
        }
    }

    pub fn perfect(xp_awarded: i64) -> Self {
        Self {
            xp_awarded,
            perfect: true,
        }
    }
}

/// Where the shell navigates after a lesson
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "screen", rename_all = "camelCase")]
pub enum NextScreen {
    Lesson { id: LessonId, slug: &'static str },
    LessonIndex,
    CourseComplete,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffOutcome {
    pub lesson: LessonDescriptor,
    pub xp_credited: u64,
    pub badge_bonus_xp: u64,
    pub already_completed: bool,
    pub perfect: bool,
    pub newly_awarded: Vec<BadgeDescriptor>,
    pub level_before: u32,
    pub level_after: u32,
    pub saved: bool,
    pub next: NextScreen,
}

impl HandoffOutcome {
    pub fn leveled_up(&self) -> bool {
        self.level_after > self.level_before
    }

    pub fn total_xp_gained(&self) -> u64 {
        self.xp_credited + self.badge_bonus_xp
    }
}

/// Apply a finished game to the tracker and pick the next screen
pub fn finish_lesson(
    tracker: &mut ProgressTracker,
    lesson_id: LessonId,
    result: GameResult,
) -> Result<HandoffOutcome> {
    let lesson = *tracker
        .catalog()
        .by_id(lesson_id)
        .ok_or(ProgressError::UnknownLesson(lesson_id.value()))?;

    let record = tracker.apply_lesson_completion(lesson_id, result.xp_awarded)?;
    let next = next_screen(tracker, lesson_id);
    debug!("Lesson {} handed off, next: {:?}", lesson.slug, next);

    Ok(HandoffOutcome {
        lesson,
        xp_credited: record.xp_credited,
        badge_bonus_xp: record.badge_bonus_xp,
        already_completed: record.already_completed,
        perfect: result.perfect,
        newly_awarded: record.newly_awarded,
        level_before: record.level_before,
        level_after: record.level_after,
        saved: record.saved,
        next,
    })
}

/// Same as `finish_lesson`, addressing the game by its route slug
pub fn finish_lesson_by_slug(
    tracker: &mut ProgressTracker,
    slug: &str,
    result: GameResult,
) -> Result<HandoffOutcome> {
    let id = tracker
        .catalog()
        .by_slug(slug)
        .map(|l| l.id)
        .ok_or_else(|| ProgressError::UnknownSlug(slug.to_string()))?;
    finish_lesson(tracker, id, result)
}

/// Next lesson in catalog order, else the course-complete or index screen
pub fn next_screen(tracker: &ProgressTracker, after: LessonId) -> NextScreen {
    if let Some(next) = tracker.catalog().next_after(after) {
        return NextScreen::Lesson {
            id: next.id,
            slug: next.slug,
        };
    }
    if tracker.course_complete() {
        NextScreen::CourseComplete
    } else {
        NextScreen::LessonIndex
    }
}
