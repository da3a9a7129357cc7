//! Prototype Store
//!
//! Labeled feature vectors kept across runs. Each label holds its prototypes
//! in insertion order; adding never replaces, so repeating an example weights
//! that label more heavily.
//!
//! On disk the store is one JSON document written atomically (temp file,
//! fsync, rename). A missing file is an empty store, and so is a file that
//! cannot be parsed: the classifier stays usable with rule scores alone.

use crate::error::StoreError;
use crate::features::FeatureVector;
use crate::labels::ActivityLabel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const STORE_SCHEMA_VERSION: u32 = 1;

/// Default file name used when no store path is given
pub const DEFAULT_STORE_FILE: &str = "trained_samples.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prototype {
    pub label: ActivityLabel,
    pub features: FeatureVector,
    /// File name of the clip the prototype came from
    pub source: Option<String>,
    /// RFC3339 creation time
    pub created_at: Option<String>,
}

/// On-disk record; the label is the enclosing map key
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredPrototype {
    features: FeatureVector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
}

#[derive(Debug, Serialize)]
struct StoreFileOut<'a> {
    schema_version: u32,
    prototypes: BTreeMap<ActivityLabel, Vec<StoredPrototypeRef<'a>>>,
}

#[derive(Debug, Serialize)]
struct StoredPrototypeRef<'a> {
    features: &'a FeatureVector,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<&'a str>,
}

/// Labels are read as plain strings so one unknown label does not discard
/// the whole file.
#[derive(Debug, Deserialize)]
struct StoreFileIn {
    #[serde(default)]
    schema_version: u32,
    #[serde(default)]
    prototypes: BTreeMap<String, Vec<StoredPrototype>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrototypeStore {
    prototypes: BTreeMap<ActivityLabel, Vec<Prototype>>,
}

impl PrototypeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a prototype under `label`.
    pub fn add(&mut self, label: ActivityLabel, features: FeatureVector) {
        self.push(Prototype {
            label,
            features,
            source: None,
            created_at: None,
        });
    }

    /// Append a prototype recording the clip it came from and when.
    pub fn add_with_source(&mut self, label: ActivityLabel, features: FeatureVector, source: &str) {
        self.push(Prototype {
            label,
            features,
            source: Some(source.to_string()),
            created_at: Some(chrono::Utc::now().to_rfc3339()),
        });
    }

    fn push(&mut self, prototype: Prototype) {
        self.prototypes
            .entry(prototype.label)
            .or_default()
            .push(prototype);
    }

    /// Prototypes stored under `label` (empty when none)
    pub fn get(&self, label: ActivityLabel) -> &[Prototype] {
        self.prototypes.get(&label).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every fixed label with its prototypes, in label order.
    pub fn all(&self) -> impl Iterator<Item = (ActivityLabel, &[Prototype])> + '_ {
        ActivityLabel::ALL.iter().map(move |&label| (label, self.get(label)))
    }

    pub fn len(&self) -> usize {
        self.prototypes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load from `path`. Missing or unparsable files yield an empty store;
    /// only I/O failures on an existing file are errors.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let Some(text) = read_store_file(path)? else {
            return Ok(Self::new());
        };
        match Self::parse(&text) {
            Ok((store, _)) => {
                debug!(path = %path.display(), prototypes = store.len(), "prototype store loaded");
                Ok(store)
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "prototype store is malformed, continuing without prototypes"
                );
                Ok(Self::new())
            }
        }
    }

    /// Load ahead of a rewrite. A file that is unparsable, or holds entries
    /// this build cannot read, is first moved to `<store>.corrupt` so the
    /// following [`persist`](Self::persist) does not destroy it.
    pub fn load_for_update(path: &Path) -> Result<Self, StoreError> {
        let Some(text) = read_store_file(path)? else {
            return Ok(Self::new());
        };
        let (store, reason) = match Self::parse(&text) {
            Ok((store, 0)) => return Ok(store),
            Ok((store, skipped)) => (store, format!("{skipped} prototypes with unknown labels")),
            Err(e) => (Self::new(), e.to_string()),
        };

        let backup = free_backup_path(path);
        fs::rename(path, &backup)?;
        warn!(
            path = %path.display(),
            backup = %backup.display(),
            reason = %reason,
            "unreadable prototype store set aside before rewrite"
        );
        Ok(store)
    }

    /// Parse a store document; also returns how many entries were skipped.
    fn parse(text: &str) -> Result<(Self, usize), serde_json::Error> {
        let file: StoreFileIn = serde_json::from_str(text)?;

        if file.schema_version > STORE_SCHEMA_VERSION {
            warn!(
                found = file.schema_version,
                expected = STORE_SCHEMA_VERSION,
                "prototype store written by a newer version, reading known fields only"
            );
        }

        let mut store = Self::new();
        let mut skipped = 0;
        for (raw_label, entries) in file.prototypes {
            let label = match raw_label.parse::<ActivityLabel>() {
                Ok(label) => label,
                Err(_) => {
                    warn!(label = %raw_label, count = entries.len(), "skipping prototypes with unknown label");
                    skipped += entries.len();
                    continue;
                }
            };
            for entry in entries {
                store.push(Prototype {
                    label,
                    features: entry.features,
                    source: entry.source,
                    created_at: entry.created_at,
                });
            }
        }
        Ok((store, skipped))
    }

    /// Persist atomically: write a sibling temp file, sync it, rename over `path`.
    pub fn persist(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let out = StoreFileOut {
            schema_version: STORE_SCHEMA_VERSION,
            prototypes: self
                .prototypes
                .iter()
                .filter(|(_, list)| !list.is_empty())
                .map(|(label, list)| {
                    let records = list
                        .iter()
                        .map(|p| StoredPrototypeRef {
                            features: &p.features,
                            source: p.source.as_deref(),
                            created_at: p.created_at.as_deref(),
                        })
                        .collect();
                    (*label, records)
                })
                .collect(),
        };
        let data = serde_json::to_vec_pretty(&out)?;

        let temp_path = sibling_path(path, "tmp");
        let write_result = (|| -> Result<(), StoreError> {
            let mut file = File::create(&temp_path)?;
            file.write_all(&data)?;
            file.flush()?;
            file.sync_all()?;
            Ok(())
        })();

        if let Err(e) = write_result.and_then(|_| fs::rename(&temp_path, path).map_err(StoreError::from)) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        info!(path = %path.display(), prototypes = self.len(), "prototype store saved");
        Ok(())
    }
}

/// File contents, or `None` when there is no store yet
fn read_store_file(path: &Path) -> Result<Option<String>, StoreError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no prototype store yet, starting empty");
            Ok(None)
        }
        Err(e) => Err(StoreError::Io(e)),
    }
}

/// `<store>.corrupt`, or `<store>.corrupt.N` when earlier backups exist
fn free_backup_path(path: &Path) -> PathBuf {
    let first = sibling_path(path, "corrupt");
    if !first.exists() {
        return first;
    }
    (1u32..)
        .map(|n| sibling_path(path, &format!("corrupt.{n}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

/// `trained_samples.json` → `trained_samples.json.<suffix>`
fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// Exclusive lock over a store's load-modify-persist cycle.
///
/// Backed by a `<store>.lock` file created with create-new semantics and
/// removed when the guard drops. A lock file older than
/// [`StoreLock::STALE_AFTER`] is left over from a killed writer and is broken.
#[derive(Debug)]
pub struct StoreLock {
    lock_path: PathBuf,
}

impl StoreLock {
    const RETRY_INTERVAL: Duration = Duration::from_millis(50);
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
    /// A write holds the lock for milliseconds; anything this old is abandoned
    pub const STALE_AFTER: Duration = Duration::from_secs(60);

    pub fn acquire(store_path: &Path) -> Result<Self, StoreError> {
        Self::acquire_with_timeout(store_path, Self::DEFAULT_TIMEOUT)
    }

    pub fn acquire_with_timeout(store_path: &Path, timeout: Duration) -> Result<Self, StoreError> {
        if let Some(parent) = store_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let lock_path = sibling_path(store_path, "lock");
        let started = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&lock_path) {
                Ok(mut file) => {
                    // pid is informational only, for whoever finds a stale lock
                    let _ = writeln!(file, "{}", std::process::id());
                    debug!(lock = %lock_path.display(), "store lock acquired");
                    return Ok(Self { lock_path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if break_stale_lock(&lock_path) {
                        continue;
                    }
                    if started.elapsed() >= timeout {
                        return Err(StoreError::Locked {
                            path: lock_path.display().to_string(),
                        });
                    }
                    std::thread::sleep(Self::RETRY_INTERVAL);
                }
                Err(e) => return Err(StoreError::Io(e)),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

/// Remove `lock_path` when it is older than [`StoreLock::STALE_AFTER`].
fn break_stale_lock(lock_path: &Path) -> bool {
    let age = fs::metadata(lock_path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok());
    let Some(age) = age.filter(|age| *age >= StoreLock::STALE_AFTER) else {
        return false;
    };

    let holder = fs::read_to_string(lock_path).unwrap_or_default();
    warn!(
        lock = %lock_path.display(),
        age_secs = age.as_secs(),
        pid = holder.trim(),
        "breaking stale store lock"
    );
    match fs::remove_file(lock_path) {
        Ok(()) => true,
        Err(e) => e.kind() == ErrorKind::NotFound,
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.lock_path) {
            warn!(lock = %self.lock_path.display(), error = %e, "failed to release store lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fv(avg_motion: f64) -> FeatureVector {
        FeatureVector {
            frame_count: 12,
            avg_motion,
            peak_motion: avg_motion * 2.0,
            calm_ratio: 0.5,
            ..FeatureVector::zero()
        }
    }

    #[test]
    fn test_add_appends_duplicates() {
        let mut store = PrototypeStore::new();
        store.add(ActivityLabel::Theft, fv(1.0));
        store.add(ActivityLabel::Theft, fv(1.0));
        assert_eq!(store.get(ActivityLabel::Theft).len(), 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_all_lists_every_label() {
        let mut store = PrototypeStore::new();
        store.add(ActivityLabel::Assault, fv(2.0));

        let all: Vec<_> = store.all().collect();
        assert_eq!(all.len(), ActivityLabel::COUNT);
        assert_eq!(all[0].0, ActivityLabel::Normal);
        assert!(all[0].1.is_empty());
        assert_eq!(store.get(ActivityLabel::Assault).len(), 1);
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = PrototypeStore::load(&dir.path().join("absent.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_malformed_file_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{ not json").unwrap();
        let store = PrototypeStore::load(&path).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_round_trip_preserves_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let mut store = PrototypeStore::new();
        store.add(ActivityLabel::Robbery, fv(1.0));
        store.add_with_source(ActivityLabel::Robbery, fv(2.0), "rob_02.mp4");
        store.add(ActivityLabel::Normal, fv(0.1));
        store.add(ActivityLabel::Robbery, fv(3.0));
        store.persist(&path).unwrap();

        let loaded = PrototypeStore::load(&path).unwrap();
        assert_eq!(loaded, store);

        let motions: Vec<f64> = loaded
            .get(ActivityLabel::Robbery)
            .iter()
            .map(|p| p.features.avg_motion)
            .collect();
        assert_eq!(motions, vec![1.0, 2.0, 3.0]);
        assert_eq!(loaded.get(ActivityLabel::Robbery)[1].source.as_deref(), Some("rob_02.mp4"));
        assert!(!sibling_path(&path, "tmp").exists());
    }

    #[test]
    fn test_update_sets_aside_malformed_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{ not json").unwrap();

        let mut store = PrototypeStore::load_for_update(&path).unwrap();
        assert!(store.is_empty());
        let backup = sibling_path(&path, "corrupt");
        assert_eq!(fs::read_to_string(&backup).unwrap(), "{ not json");
        assert!(!path.exists());

        store.add(ActivityLabel::Theft, fv(1.0));
        store.persist(&path).unwrap();
        fs::write(&path, "truncated {").unwrap();
        PrototypeStore::load_for_update(&path).unwrap();
        assert_eq!(fs::read_to_string(&backup).unwrap(), "{ not json");
        assert_eq!(fs::read_to_string(sibling_path(&path, "corrupt.1")).unwrap(), "truncated {");
    }

    #[test]
    fn test_update_keeps_readable_store_in_place() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let mut store = PrototypeStore::new();
        store.add(ActivityLabel::Normal, fv(0.2));
        store.persist(&path).unwrap();

        assert_eq!(PrototypeStore::load_for_update(&path).unwrap(), store);
        assert!(path.exists());
        assert!(!sibling_path(&path, "corrupt").exists());
    }

    #[test]
    fn test_unknown_labels_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let doc = serde_json::json!({
            "schema_version": 1,
            "prototypes": {
                "riot": [{ "features": { "frame_count": 3 } }],
                "theft": [{ "features": { "frame_count": 4, "avg_motion": 1.5 } }]
            }
        });
        fs::write(&path, doc.to_string()).unwrap();

        let store = PrototypeStore::load(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(ActivityLabel::Theft)[0].features.avg_motion, 1.5);

        // a rewrite would drop the "riot" entry, so the original is kept aside
        let for_update = PrototypeStore::load_for_update(&path).unwrap();
        assert_eq!(for_update, store);
        assert!(sibling_path(&path, "corrupt").exists());
    }

    #[test]
    fn test_file_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let mut store = PrototypeStore::new();
        store.add(ActivityLabel::RoadAccident, fv(1.0));
        store.persist(&path).unwrap();

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["schema_version"], 1);
        assert_eq!(value["prototypes"]["road accident"][0]["features"]["frame_count"], 12);
        assert!(value["prototypes"]["road accident"][0].get("source").is_none());
    }

    #[test]
    fn test_lock_is_exclusive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");

        let lock = StoreLock::acquire(&path).unwrap();
        assert!(lock.path().exists());

        let second = StoreLock::acquire_with_timeout(&path, Duration::from_millis(120));
        assert!(matches!(second, Err(StoreError::Locked { .. })));

        drop(lock);
        let third = StoreLock::acquire_with_timeout(&path, Duration::from_millis(120));
        assert!(third.is_ok());
    }

    #[test]
    fn test_locked_error_names_lock_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let _held = StoreLock::acquire(&path).unwrap();

        let err = StoreLock::acquire_with_timeout(&path, Duration::from_millis(60)).unwrap_err();
        assert!(err.to_string().contains("store.json.lock"));
    }

    #[test]
    fn test_abandoned_lock_is_broken() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let lock_path = sibling_path(&path, "lock");
        fs::write(&lock_path, "4242\n").unwrap();
        let old = std::time::SystemTime::now() - StoreLock::STALE_AFTER - Duration::from_secs(5);
        File::options().write(true).open(&lock_path).unwrap().set_modified(old).unwrap();

        let lock = StoreLock::acquire_with_timeout(&path, Duration::from_millis(60)).unwrap();
        assert_eq!(lock.path(), lock_path.as_path());
        let pid = fs::read_to_string(&lock_path).unwrap();
        assert_eq!(pid.trim(), std::process::id().to_string());
    }

    #[test]
    fn test_fresh_foreign_lock_is_respected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        fs::write(sibling_path(&path, "lock"), "4242\n").unwrap();

        let result = StoreLock::acquire_with_timeout(&path, Duration::from_millis(60));
        assert!(matches!(result, Err(StoreError::Locked { .. })));
        assert!(sibling_path(&path, "lock").exists());
    }
}
