//! Progress Store
//!
//! Owns the persisted learner record and its load/save lifecycle. Nothing
//! outside this module touches a storage backend.
//!
//! Record layout (JSON, one record per storage key):
//!
//! ```json
//! { "xp": 275, "level": 1, "completed": [1, 2], "badges": ["first-win"],
//!   "counters": { "savedTemplates": [], "perfectScores": [],
//!                 "speedBonuses": [], "bestStreak": 0 },
//!   "ledger": { "lessons": { "1": 100, "2": 125 }, "badges": { "first-win": 50 } },
//!   "updatedAt": "2026-01-01T00:00:00Z" }
//! ```
//!
//! Missing fields take empty-state values, unknown fields are ignored, and
//! the stored level is always recomputed from XP.
//!
//! Two sessions sharing one backend are last-writer-wins. With merge enabled
//! each save first reloads the record and unions `completed`, `badges` and
//! counters. XP is re-added from the merged per-source ledger when both
//! sides carry an exact one, else the larger XP is kept. After a failed
//! `clear`, merging is suspended until a write succeeds so the old record
//! cannot come back.

use crate::catalog::LessonId;
use crate::config::ProgressConfig;
use crate::error::Result;
use crate::levels::LevelRule;
use crate::state::{union_into, ProgressCounters, ProgressState, XpLedger};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Key/value storage medium
pub trait StorageBackend: Send {
    /// Read the value under `key`, `None` if absent
    fn read(&self, key: &str) -> io::Result<Option<String>>;

    fn write(&self, key: &str, value: &str) -> io::Result<()>;

    /// Remove `key`; removing an absent key is not an error
    fn remove(&self, key: &str) -> io::Result<()>;
}

/// One `<key>.json` file per key under a directory
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe_key = key.replace(['/', '\\', ':'], "_");
        self.dir.join(format!("{}.json", safe_key))
    }
}

impl StorageBackend for FileBackend {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// In-process map. Clones share the same entries, like two tabs sharing one
/// origin's storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory backend lock poisoned"))
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// On-disk shape of the learner record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PersistedProgress {
    xp: u64,
    level: Option<u64>,
    completed: Vec<LessonId>,
    badges: Vec<String>,
    counters: ProgressCounters,
    ledger: XpLedger,
    updated_at: Option<DateTime<Utc>>,
}

impl PersistedProgress {
    fn from_state(state: &ProgressState) -> Self {
        Self {
            xp: state.xp(),
            level: Some(state.level() as u64),
            completed: state.completed().to_vec(),
            badges: state.badges().to_vec(),
            counters: state.counters().clone(),
            ledger: state.ledger().clone(),
            updated_at: Some(Utc::now()),
        }
    }

    fn into_state(self, rule: &LevelRule) -> ProgressState {
        let state =
            ProgressState::from_parts(self.xp, self.completed, self.badges, self.counters, rule)
                .with_ledger(self.ledger);
        if let Some(stored) = self.level {
            if stored != state.level() as u64 {
                tracing::debug!(
                    "Stored level {} disagrees with {} XP, using level {}",
                    stored,
                    state.xp(),
                    state.level()
                );
            }
        }
        state
    }
}

/// How a load resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    /// Nothing stored yet
    Fresh,
    /// A valid record was read
    Restored,
    /// Stored data was unreadable or corrupt; empty state used instead
    Recovered(String),
}

impl LoadStatus {
    pub fn is_anomaly(&self) -> bool {
        matches!(self, LoadStatus::Recovered(_))
    }
}

#[derive(Debug, Clone)]
pub struct Loaded {
    pub state: ProgressState,
    pub status: LoadStatus,
}

/// Persists `ProgressState` under a single key
pub struct ProgressStore {
    backend: Box<dyn StorageBackend>,
    key: String,
    rule: LevelRule,
    merge_on_save: bool,
    merge_suspended: bool,
}

impl ProgressStore {
    pub fn new(
        backend: Box<dyn StorageBackend>,
        key: impl Into<String>,
        rule: LevelRule,
        merge_on_save: bool,
    ) -> Self {
        Self {
            backend,
            key: key.into(),
            rule,
            merge_on_save,
            merge_suspended: false,
        }
    }

    /// File-backed store at the configured data dir
    pub fn open(config: &ProgressConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            Box::new(FileBackend::new(&config.data_dir)),
            config.storage_key.clone(),
            config.level_rule()?,
            config.merge_on_save,
        ))
    }

    /// In-memory store with default rule and merging on
    pub fn in_memory(backend: MemoryBackend) -> Self {
        Self::new(
            Box::new(backend),
            crate::config::DEFAULT_STORAGE_KEY,
            LevelRule::default(),
            true,
        )
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load stored progress, falling back to the empty state
    pub fn load(&self) -> ProgressState {
        self.load_with_status().state
    }

    pub fn load_with_status(&self) -> Loaded {
        let raw = match self.backend.read(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                return Loaded {
                    state: ProgressState::new(),
                    status: LoadStatus::Fresh,
                }
            }
            Err(e) => {
                tracing::warn!("Progress storage unreadable, starting empty: {}", e);
                return Loaded {
                    state: ProgressState::new(),
                    status: LoadStatus::Recovered(format!("storage unreadable: {}", e)),
                };
            }
        };

        match self.parse(&raw) {
            Ok(state) => Loaded {
                state,
                status: LoadStatus::Restored,
            },
            Err(e) => {
                tracing::warn!("Stored progress is corrupt, starting empty: {}", e);
                Loaded {
                    state: ProgressState::new(),
                    status: LoadStatus::Recovered(format!("corrupt record: {}", e)),
                }
            }
        }
    }

    fn parse(&self, raw: &str) -> Result<ProgressState> {
        let record: PersistedProgress = serde_json::from_str(raw)?;
        Ok(record.into_state(&self.rule))
    }

    /// Persist `state`, returning what was written.
    ///
    /// With merging on, the written state is `state` unioned with whatever
    /// valid record is currently stored.
    pub fn save(&mut self, state: &ProgressState) -> Result<ProgressState> {
        let to_write = if self.merge_on_save && !self.merge_suspended {
            self.merge_with_stored(state)
        } else {
            state.clone()
        };

        let json = serde_json::to_string_pretty(&PersistedProgress::from_state(&to_write))?;
        self.backend.write(&self.key, &json)?;
        self.merge_suspended = false;
        Ok(to_write)
    }

    /// Erase the stored record. On failure the stale record stays in storage,
    /// so merging is suspended until the next successful save replaces it.
    pub fn clear(&mut self) -> Result<()> {
        if let Err(e) = self.backend.remove(&self.key) {
            self.merge_suspended = true;
            return Err(e.into());
        }
        self.merge_suspended = false;
        Ok(())
    }

    fn merge_with_stored(&self, state: &ProgressState) -> ProgressState {
        let stored = match self.backend.read(&self.key) {
            Ok(Some(raw)) => match self.parse(&raw) {
                Ok(stored) => stored,
                Err(e) => {
                    tracing::debug!("Overwriting corrupt stored progress: {}", e);
                    return state.clone();
                }
            },
            Ok(None) => return state.clone(),
            Err(e) => {
                tracing::debug!("Could not reload progress before save: {}", e);
                return state.clone();
            }
        };

        merge_states(state, &stored, &self.rule)
    }
}

/// Union of two snapshots, `ours` order and credits first
pub fn merge_states(ours: &ProgressState, theirs: &ProgressState, rule: &LevelRule) -> ProgressState {
    let mut completed = ours.completed().to_vec();
    union_into(&mut completed, theirs.completed());

    let mut badges = ours.badges().to_vec();
    union_into(&mut badges, theirs.badges());

    let mut counters = ours.counters().clone();
    counters.merge(theirs.counters());

    let mut ledger = ours.ledger().clone();
    ledger.merge(theirs.ledger());

    let xp = if ours.ledger_is_exact() && theirs.ledger_is_exact() {
        ledger.total()
    } else {
        ours.xp().max(theirs.xp())
    };
    if completed.len() > ours.completed_count() || badges.len() > ours.badges().len() {
        tracing::debug!(
            "Merged progress from another session: {} lessons, {} badges",
            completed.len(),
            badges.len()
        );
    }

    ProgressState::from_parts(xp, completed, badges, counters, rule).with_ledger(ledger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_state() -> ProgressState {
        ProgressState::from_parts(
            275,
            vec![LessonId(1), LessonId(2)],
            vec!["first-win".to_string()],
            ProgressCounters::default(),
            &LevelRule::default(),
        )
    }

    #[test]
    fn test_fresh_load() {
        let store = ProgressStore::in_memory(MemoryBackend::new());
        let loaded = store.load_with_status();
        assert_eq!(loaded.status, LoadStatus::Fresh);
        assert!(loaded.state.is_empty());
    }

    #[test]
    fn test_memory_roundtrip() {
        let mut store = ProgressStore::in_memory(MemoryBackend::new());
        store.save(&sample_state()).unwrap();
        let loaded = store.load_with_status();
        assert_eq!(loaded.status, LoadStatus::Restored);
        assert_eq!(loaded.state, sample_state());
    }

    #[test]
    fn test_corrupt_json_recovers_empty() {
        let backend = MemoryBackend::new();
        backend.write("aiSkillsProgress", "{not json").unwrap();
        let store = ProgressStore::in_memory(backend);
        let loaded = store.load_with_status();
        assert!(loaded.status.is_anomaly());
        assert!(loaded.state.is_empty());
    }

    #[test]
    fn test_schema_mismatch_recovers_empty() {
        let backend = MemoryBackend::new();
        backend
            .write("aiSkillsProgress", r#"{"xp": "lots", "completed": [1]}"#)
            .unwrap();
        let store = ProgressStore::in_memory(backend);
        assert!(store.load_with_status().status.is_anomaly());
    }

    #[test]
    fn test_lenient_fields() {
        let backend = MemoryBackend::new();
        backend
            .write(
                "aiSkillsProgress",
                r#"{"xp": 1200, "level": 1, "completed": [2, 2, 5], "theme": "dark"}"#,
            )
            .unwrap();
        let store = ProgressStore::in_memory(backend);
        let state = store.load();
        assert_eq!(state.xp(), 1200);
        assert_eq!(state.level(), 3);
        assert_eq!(state.completed(), &[LessonId(2), LessonId(5)]);
        assert!(state.badges().is_empty());
    }

    #[test]
    fn test_clear() {
        let backend = MemoryBackend::new();
        let mut store = ProgressStore::in_memory(backend.clone());
        store.save(&sample_state()).unwrap();
        store.clear().unwrap();
        assert!(backend.read("aiSkillsProgress").unwrap().is_none());
        assert_eq!(store.load_with_status().status, LoadStatus::Fresh);
        // clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_save_merges_with_other_session() {
        let backend = MemoryBackend::new();
        let mut tab_a = ProgressStore::in_memory(backend.clone());
        let mut tab_b = ProgressStore::in_memory(backend.clone());

        let a_state = ProgressState::from_parts(
            100,
            vec![LessonId(1)],
            vec![],
            ProgressCounters::default(),
            &LevelRule::default(),
        );
        tab_a.save(&a_state).unwrap();

        let b_state = ProgressState::from_parts(
            125,
            vec![LessonId(6)],
            vec!["first-win".to_string()],
            ProgressCounters::default(),
            &LevelRule::default(),
        );
        let written = tab_b.save(&b_state).unwrap();

        assert_eq!(written.completed(), &[LessonId(6), LessonId(1)]);
        assert_eq!(written.badges(), &["first-win".to_string()]);
        assert_eq!(written.xp(), 125);
        assert_eq!(tab_a.load(), written);
    }

    #[test]
    fn test_merge_re_adds_xp_from_ledgers() {
        let engine = crate::engine::ProgressionEngine::default();
        let finish = |state: &ProgressState, id: u32, xp: i64| {
            let applied = engine.apply_completion(state, LessonId(id), xp).unwrap();
            engine.evaluate_badges(&applied.state).state
        };
        let tab_a = finish(&ProgressState::new(), 1, 100);
        let tab_b = finish(&ProgressState::new(), 2, 125);

        let merged = merge_states(&tab_b, &tab_a, engine.rule());
        assert_eq!(merged.completed(), &[LessonId(2), LessonId(1)]);
        assert_eq!(merged.xp(), 100 + 125 + 50);
        assert!(merged.ledger_is_exact());
    }

    #[test]
    fn test_merge_without_ledger_keeps_larger_xp() {
        let engine = crate::engine::ProgressionEngine::default();
        let ours = engine
            .apply_completion(&ProgressState::new(), LessonId(2), 125)
            .unwrap()
            .state;
        let legacy = ProgressState::from_parts(
            400,
            vec![LessonId(1)],
            vec![],
            ProgressCounters::default(),
            &LevelRule::default(),
        );
        assert_eq!(merge_states(&ours, &legacy, engine.rule()).xp(), 400);
    }

    #[test]
    fn test_ledger_roundtrip() {
        let engine = crate::engine::ProgressionEngine::default();
        let state = engine
            .apply_completion(&ProgressState::new(), LessonId(3), 100)
            .unwrap()
            .state;
        let mut store = ProgressStore::in_memory(MemoryBackend::new());
        store.save(&state).unwrap();
        let loaded = store.load();
        assert_eq!(loaded.ledger().lessons[&LessonId(3)], 100);
        assert!(loaded.ledger_is_exact());
    }

    #[test]
    fn test_save_without_merge_overwrites() {
        let backend = MemoryBackend::new();
        let mut store = ProgressStore::new(
            Box::new(backend.clone()),
            "k",
            LevelRule::default(),
            false,
        );
        store.save(&sample_state()).unwrap();
        store.save(&ProgressState::new()).unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_file_backend_roundtrip() {
        let dir = tempdir().unwrap();
        let config = ProgressConfig {
            data_dir: dir.path().join("nested"),
            ..ProgressConfig::default()
        };
        let mut store = ProgressStore::open(&config).unwrap();
        store.save(&sample_state()).unwrap();

        let path = dir.path().join("nested").join("aiSkillsProgress.json");
        assert!(path.exists());
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"updatedAt\""));

        let reopened = ProgressStore::open(&config).unwrap();
        assert_eq!(reopened.load(), sample_state());
    }

    #[test]
    fn test_file_backend_missing_and_remove() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::new(dir.path());
        assert!(backend.read("absent").unwrap().is_none());
        backend.remove("absent").unwrap();
    }

    #[test]
    fn test_file_backend_sanitizes_key() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::new(dir.path());
        backend.write("a/b:c", "{}").unwrap();
        assert!(dir.path().join("a_b_c.json").exists());
    }
}
