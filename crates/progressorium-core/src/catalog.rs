//! Lesson catalog - immutable reference table of the twenty mini-games.
//!
//! Lesson id order is navigation order: the lesson after id N is the next
//! entry in the table, not necessarily N + 1.

use crate::error::{ProgressError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Stable lesson identifier (positive, persisted as a bare integer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LessonId(pub u32);

impl LessonId {
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl From<u32> for LessonId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for LessonId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Thematic grouping of lessons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layer {
    Foundation,
    Synthesis,
    Creation,
    Strategy,
}

impl Layer {
    pub const ALL: [Layer; 4] = [
        Layer::Foundation,
        Layer::Synthesis,
        Layer::Creation,
        Layer::Strategy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Foundation => "Foundation",
            Layer::Synthesis => "Synthesis",
            Layer::Creation => "Creation",
            Layer::Strategy => "Strategy",
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One lesson in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LessonDescriptor {
    pub id: LessonId,
    /// URL-safe route segment, unique across the catalog
    pub slug: &'static str,
    pub title: &'static str,
    pub layer: Layer,
    /// Reference XP value shown in the lesson browser
    pub xp: u32,
}

impl LessonDescriptor {
    pub const fn new(
        id: u32,
        slug: &'static str,
        title: &'static str,
        layer: Layer,
        xp: u32,
    ) -> Self {
        Self {
            id: LessonId(id),
            slug,
            title,
            layer,
            xp,
        }
    }
}

/// The built-in course, in navigation order
pub const LESSONS: &[LessonDescriptor] = &[
    LessonDescriptor::new(1, "partnership-calibrator", "The Partnership Calibrator", Layer::Foundation, 100),
    LessonDescriptor::new(2, "goal-forge", "Goal Forge", Layer::Foundation, 100),
    LessonDescriptor::new(3, "spec-lab", "SPEC Lab", Layer::Foundation, 100),
    LessonDescriptor::new(4, "the-chunker", "The Chunker", Layer::Foundation, 100),
    LessonDescriptor::new(5, "workflow-sorter", "Workflow Sorter", Layer::Foundation, 100),
    LessonDescriptor::new(6, "the-interrogator", "The Interrogator", Layer::Synthesis, 125),
    LessonDescriptor::new(7, "speed-draft-arena", "Speed Draft Arena", Layer::Synthesis, 125),
    LessonDescriptor::new(8, "the-crucible", "The Crucible", Layer::Synthesis, 125),
    LessonDescriptor::new(9, "the-refinery", "The Refinery", Layer::Synthesis, 125),
    LessonDescriptor::new(10, "claim-detector", "Claim Detector", Layer::Synthesis, 125),
    LessonDescriptor::new(11, "the-distillery", "The Distillery", Layer::Synthesis, 150),
    LessonDescriptor::new(12, "the-reconciler", "The Reconciler", Layer::Synthesis, 150),
    LessonDescriptor::new(13, "idea-funnel", "Idea Funnel", Layer::Creation, 175),
    LessonDescriptor::new(14, "the-shapeshifter", "The Shapeshifter", Layer::Creation, 175),
    LessonDescriptor::new(15, "red-pen-room", "Red Pen Room", Layer::Creation, 175),
    LessonDescriptor::new(16, "decision-arena", "Decision Arena", Layer::Creation, 175),
    LessonDescriptor::new(17, "the-decomposer", "The Decomposer", Layer::Strategy, 200),
    LessonDescriptor::new(18, "skeptics-gauntlet", "Skeptic's Gauntlet", Layer::Strategy, 200),
    LessonDescriptor::new(19, "relay-race", "Relay Race", Layer::Strategy, 200),
    LessonDescriptor::new(20, "the-vault", "The Vault", Layer::Strategy, 200),
];

/// Validated, ordered lesson table
#[derive(Debug, Clone)]
pub struct Catalog {
    lessons: Vec<LessonDescriptor>,
}

impl Catalog {
    /// Build a catalog, rejecting tables that break id/slug/xp rules
    pub fn new(lessons: Vec<LessonDescriptor>) -> Result<Self> {
        let mut slugs = HashSet::new();
        let mut prev: Option<LessonId> = None;

        for lesson in &lessons {
            if lesson.id.0 == 0 {
                return Err(ProgressError::InvalidCatalog(format!(
                    "lesson '{}' has id 0",
                    lesson.slug
                )));
            }
            if let Some(p) = prev {
                if lesson.id <= p {
                    return Err(ProgressError::InvalidCatalog(format!(
                        "lesson ids must be strictly ascending ({} after {})",
                        lesson.id, p
                    )));
                }
            }
            if !is_url_safe(lesson.slug) {
                return Err(ProgressError::InvalidCatalog(format!(
                    "slug '{}' is not URL-safe",
                    lesson.slug
                )));
            }
            if !slugs.insert(lesson.slug) {
                return Err(ProgressError::InvalidCatalog(format!(
                    "duplicate slug '{}'",
                    lesson.slug
                )));
            }
            if lesson.xp == 0 {
                return Err(ProgressError::InvalidCatalog(format!(
                    "lesson {} has zero XP",
                    lesson.id
                )));
            }
            prev = Some(lesson.id);
        }

        Ok(Self { lessons })
    }

    /// The built-in twenty-lesson course
    pub fn builtin() -> Self {
        Self {
            lessons: LESSONS.to_vec(),
        }
    }

    pub fn lessons(&self) -> &[LessonDescriptor] {
        &self.lessons
    }

    pub fn len(&self) -> usize {
        self.lessons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lessons.is_empty()
    }

    pub fn contains(&self, id: LessonId) -> bool {
        self.by_id(id).is_some()
    }

    pub fn by_id(&self, id: LessonId) -> Option<&LessonDescriptor> {
        self.lessons.iter().find(|l| l.id == id)
    }

    pub fn by_slug(&self, slug: &str) -> Option<&LessonDescriptor> {
        self.lessons.iter().find(|l| l.slug == slug)
    }

    pub fn by_layer(&self, layer: Layer) -> Vec<&LessonDescriptor> {
        self.lessons.iter().filter(|l| l.layer == layer).collect()
    }

    /// Lessons whose ids appear in `completed`, in catalog order
    pub fn completed_lessons(&self, completed: &[LessonId]) -> Vec<&LessonDescriptor> {
        self.lessons
            .iter()
            .filter(|l| completed.contains(&l.id))
            .collect()
    }

    /// The lesson following `id` in navigation order
    pub fn next_after(&self, id: LessonId) -> Option<&LessonDescriptor> {
        let pos = self.lessons.iter().position(|l| l.id == id)?;
        self.lessons.get(pos + 1)
    }

    pub fn first(&self) -> Option<&LessonDescriptor> {
        self.lessons.first()
    }

    /// Sum of every lesson's reference XP
    pub fn total_lesson_xp(&self) -> u64 {
        self.lessons.iter().map(|l| l.xp as u64).sum()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn is_url_safe(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_is_valid() {
        let catalog = Catalog::new(LESSONS.to_vec()).unwrap();
        assert_eq!(catalog.len(), 20);
        assert_eq!(catalog.first().unwrap().slug, "partnership-calibrator");
    }

    #[test]
    fn test_layer_sizes() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.by_layer(Layer::Foundation).len(), 5);
        assert_eq!(catalog.by_layer(Layer::Synthesis).len(), 7);
        assert_eq!(catalog.by_layer(Layer::Creation).len(), 4);
        assert_eq!(catalog.by_layer(Layer::Strategy).len(), 4);
    }

    #[test]
    fn test_lookup_by_slug_and_id() {
        let catalog = Catalog::builtin();
        let vault = catalog.by_slug("the-vault").unwrap();
        assert_eq!(vault.id, LessonId(20));
        assert_eq!(catalog.by_id(LessonId(6)).unwrap().slug, "the-interrogator");
        assert!(catalog.by_slug("not-a-game").is_none());
        assert!(!catalog.contains(LessonId(21)));
    }

    #[test]
    fn test_next_after() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.next_after(LessonId(1)).unwrap().id, LessonId(2));
        assert!(catalog.next_after(LessonId(20)).is_none());
        assert!(catalog.next_after(LessonId(99)).is_none());
    }

    #[test]
    fn test_total_lesson_xp() {
        // 5*100 + 5*125 + 2*150 + 4*175 + 4*200
        assert_eq!(Catalog::builtin().total_lesson_xp(), 2925);
    }

    #[test]
    fn test_rejects_duplicate_slug() {
        let lessons = vec![
            LessonDescriptor::new(1, "same", "A", Layer::Foundation, 100),
            LessonDescriptor::new(2, "same", "B", Layer::Foundation, 100),
        ];
        assert!(matches!(
            Catalog::new(lessons),
            Err(ProgressError::InvalidCatalog(_))
        ));
    }

    #[test]
    fn test_rejects_unordered_ids() {
        let lessons = vec![
            LessonDescriptor::new(2, "b", "B", Layer::Foundation, 100),
            LessonDescriptor::new(1, "a", "A", Layer::Foundation, 100),
        ];
        assert!(Catalog::new(lessons).is_err());
    }

    #[test]
    fn test_rejects_bad_slug_and_zero_xp() {
        let bad_slug = vec![LessonDescriptor::new(1, "Has Space", "A", Layer::Foundation, 100)];
        assert!(Catalog::new(bad_slug).is_err());

        let zero_xp = vec![LessonDescriptor::new(1, "a", "A", Layer::Foundation, 0)];
        assert!(Catalog::new(zero_xp).is_err());
    }

    #[test]
    fn test_completed_lessons_in_catalog_order() {
        let catalog = Catalog::builtin();
        let done = catalog.completed_lessons(&[LessonId(3), LessonId(1), LessonId(77)]);
        let ids: Vec<u32> = done.iter().map(|l| l.id.0).collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
