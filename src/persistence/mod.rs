//! History log and cache-stats snapshot persistence (C12).
//!
//! Neither of these is allowed to be a correctness requirement: per
//! SPEC_FULL §4.11/§6, a write failure is logged and dropped, never
//! propagated. There is no retry, no buffering queue — "best-effort" here
//! means exactly one attempt per call, following the same
//! log-the-real-error-never-propagate posture as
//! [`crate::errors::AppError`]'s boundary handling.

use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::pipeline::state::LocationResult;

/// Appends one [`LocationResult`] per line as JSON to a configured file.
/// The only persistence this system does beyond the cache-stats snapshot.
pub struct HistoryLog {
    path: PathBuf,
}

#[derive(Serialize)]
struct HistoryRecord<'a> {
    timestamp: DateTime<Utc>,
    result: &'a LocationResult,
}

impl HistoryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one record. Best-effort: a write failure is logged and
    /// swallowed, never surfaced to the caller.
    pub fn append(&self, result: &LocationResult) {
        let record = HistoryRecord { timestamp: Utc::now(), result };
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize history record, dropping");
                return;
            }
        };

        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(path = %parent.display(), error = %e, "failed to create history log directory, dropping record");
                return;
            }
        }

        let opened = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path);
        match opened {
            Ok(mut file) => {
                if let Err(e) = writeln!(file, "{line}") {
                    tracing::warn!(path = %self.path.display(), error = %e, "failed to append history record, dropping");
                }
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to open history log, dropping record");
            }
        }
    }
}

/// Rolling snapshot of `CacheManager::stats_summary()`, capped at
/// [`Self::MAX_ENTRIES`] records. Rewrites the whole file each call — the
/// simplest correct implementation of "at most 100 JSON records", since
/// the full list is always small enough to hold in memory.
pub struct CacheStatsSnapshotWriter {
    path: PathBuf,
}

#[derive(Serialize)]
struct SnapshotRecord {
    timestamp: DateTime<Utc>,
    stats: serde_json::Value,
}

impl CacheStatsSnapshotWriter {
    pub const MAX_ENTRIES: usize = 100;

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Record one `stats_summary()` snapshot, pruning to the most recent
    /// [`Self::MAX_ENTRIES`] entries. Best-effort in both directions: a
    /// corrupt or missing existing file is treated as an empty history
    /// rather than an error.
    pub fn record(&self, stats: &serde_json::Value) {
        let mut history = self.read_existing();
        history.push(SnapshotRecord { timestamp: Utc::now(), stats: stats.clone() });
        if history.len() > Self::MAX_ENTRIES {
            let drop = history.len() - Self::MAX_ENTRIES;
            history.drain(0..drop);
        }

        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(path = %parent.display(), error = %e, "failed to create cache stats snapshot directory, dropping");
                return;
            }
        }

        match serde_json::to_vec_pretty(&history) {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(&self.path, bytes) {
                    tracing::warn!(path = %self.path.display(), error = %e, "failed to write cache stats snapshot, dropping");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize cache stats snapshot, dropping");
            }
        }
    }

    fn read_existing(&self) -> Vec<SnapshotRecord> {
        let Ok(bytes) = std::fs::read(&self.path) else {
            return Vec::new();
        };
        match serde_json::from_slice::<Vec<RawSnapshotRecord>>(&bytes) {
            Ok(records) => records
                .into_iter()
                .map(|r| SnapshotRecord { timestamp: r.timestamp, stats: r.stats })
                .collect(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "existing cache stats snapshot is corrupt, starting fresh");
                Vec::new()
            }
        }
    }
}

#[derive(serde::Deserialize)]
struct RawSnapshotRecord {
    timestamp: DateTime<Utc>,
    stats: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorType;

    fn temp_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("persistence_test_{label}_{}_{}", std::process::id(), unique_suffix()))
    }

    fn unique_suffix() -> u64 {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        COUNTER.fetch_add(1, Ordering::Relaxed)
    }

    #[test]
    fn history_log_appends_one_json_line_per_call() {
        let path = temp_path("history");
        let log = HistoryLog::new(&path);
        log.append(&LocationResult::success("東京", "晴れ".into(), "傘は不要".into(), serde_json::json!({})));
        log.append(&LocationResult::failure("架空市", ErrorType::LocationNotFound, serde_json::json!({})));

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in &lines {
            let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(parsed.get("timestamp").is_some());
            assert!(parsed.get("result").is_some());
        }

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn history_log_creates_missing_parent_directory() {
        let path = std::env::temp_dir()
            .join(format!("persistence_test_nested_{}_{}", std::process::id(), unique_suffix()))
            .join("history.jsonl");
        let log = HistoryLog::new(&path);
        log.append(&LocationResult::success("東京", "晴れ".into(), "傘は不要".into(), serde_json::json!({})));
        assert!(path.exists());
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn cache_stats_snapshot_caps_at_max_entries() {
        let path = temp_path("snapshot");
        let writer = CacheStatsSnapshotWriter::new(&path);
        for i in 0..(CacheStatsSnapshotWriter::MAX_ENTRIES + 10) {
            writer.record(&serde_json::json!({"iteration": i}));
        }
        let contents = std::fs::read_to_string(&path).unwrap();
        let records: Vec<serde_json::Value> = serde_json::from_str(&contents).unwrap();
        assert_eq!(records.len(), CacheStatsSnapshotWriter::MAX_ENTRIES);
        assert_eq!(records.last().unwrap()["stats"]["iteration"], CacheStatsSnapshotWriter::MAX_ENTRIES + 9);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn cache_stats_snapshot_survives_corrupt_existing_file() {
        let path = temp_path("corrupt");
        std::fs::write(&path, b"not json").unwrap();
        let writer = CacheStatsSnapshotWriter::new(&path);
        writer.record(&serde_json::json!({"ok": true}));

        let contents = std::fs::read_to_string(&path).unwrap();
        let records: Vec<serde_json::Value> = serde_json::from_str(&contents).unwrap();
        assert_eq!(records.len(), 1);

        std::fs::remove_file(&path).ok();
    }
}
