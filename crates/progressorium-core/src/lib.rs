//! Learner progression for the Progressorium game suite.
//!
//! Owns the XP/level/badge state, folds lesson completions into it, and
//! persists it between sessions. Everything is in-process and synchronous.

pub mod badges;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod handoff;
pub mod levels;
pub mod state;
pub mod store;
pub mod tracker;

pub use badges::{BadgeDescriptor, BadgeRuleSet, BADGES};
pub use catalog::{Catalog, Layer, LessonDescriptor, LessonId, LESSONS};
pub use config::ProgressConfig;
pub use engine::{BadgeEvaluation, CompletionApplied, ProgressionEngine};
pub use error::{ProgressError, Result};
pub use handoff::{finish_lesson, finish_lesson_by_slug, GameResult, HandoffOutcome, NextScreen};
pub use levels::{derive_level, LevelRule, Rank};
pub use state::{ProgressCounters, ProgressState, XpLedger};
pub use store::{FileBackend, LoadStatus, MemoryBackend, ProgressStore, StorageBackend};
pub use tracker::{CompletionRecord, ProgressTracker};

/// Config file name looked up by the tools
pub const CONFIG_FILE_NAME: &str = "progressorium.toml";
