//! Lazy, partition-based reference-comment repository.
//!
//! Ported from `original_source/src/repositories/lazy_comment_repository.py`:
//! nothing is loaded at construction time; each `(season, kind)` partition is
//! read from disk only the first time a method needs it, and the result is
//! cached in an internal [`TTLCache`]. Partition loads that happen together
//! (e.g. `get_recent` needing several seasons) run as a bounded-parallel
//! batch, following the teacher's `buffer_unordered`-over-futures pattern in
//! `services/forecast.rs::resolve_race_forecasts` (there: bounded-parallel
//! yr.no fetches; here: bounded-parallel CSV partition loads).

use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::types::{CommentKind, ReferenceComment, Season};
use crate::cache::TTLCache;
use crate::errors::AppError;

const PARTITION_CACHE_TTL: Duration = Duration::from_secs(3600);
const MAX_CONCURRENT_PARTITION_LOADS: usize = 4;
/// If more than this fraction of rows in one partition are silently
/// discarded for parse errors, the repository logs a warning (never fails).
const MAX_SILENT_DISCARD_FRACTION: f64 = 0.05;

pub struct CommentRepository {
    data_dir: PathBuf,
    cache: Arc<TTLCache<String, Vec<ReferenceComment>>>,
}

impl CommentRepository {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            cache: Arc::new(TTLCache::new(PARTITION_CACHE_TTL, 32)),
        }
    }

    pub fn with_cache(
        data_dir: impl Into<PathBuf>,
        cache: Arc<TTLCache<String, Vec<ReferenceComment>>>,
    ) -> Self {
        Self {
            data_dir: data_dir.into(),
            cache,
        }
    }

    fn partition_path(&self, season: Season, kind: CommentKind) -> PathBuf {
        self.data_dir.join(format!(
            "{}_{}_enhanced100.csv",
            season.as_str(),
            kind.as_str()
        ))
    }

    fn partition_cache_key(season: Season, kind: CommentKind) -> String {
        format!("{}_{}", season.as_str(), kind.as_str())
    }

    /// Load one partition, using the cache if present. Missing files yield
    /// an empty partition rather than an error.
    async fn load_partition(
        &self,
        season: Season,
        kind: CommentKind,
    ) -> Vec<ReferenceComment> {
        let cache_key = Self::partition_cache_key(season, kind);
        if let Some(cached) = self.cache.get(&cache_key) {
            return cached;
        }

        let path = self.partition_path(season, kind);
        let comments = tokio::task::spawn_blocking(move || parse_partition_file(&path, season, kind))
            .await
            .unwrap_or_else(|join_err| {
                tracing::error!(%join_err, "partition load task panicked");
                Vec::new()
            });

        self.cache.set(cache_key, comments.clone(), None);
        comments
    }

    async fn load_partitions(
        &self,
        combinations: Vec<(Season, CommentKind)>,
    ) -> Vec<ReferenceComment> {
        stream::iter(combinations.into_iter().map(|(season, kind)| async move {
            self.load_partition(season, kind).await
        }))
        .buffer_unordered(MAX_CONCURRENT_PARTITION_LOADS)
        .flat_map(stream::iter)
        .collect()
        .await
    }

    /// All comments across the given seasons (both kinds), capped at `limit`.
    pub async fn get_by_season(
        &self,
        seasons: &[Season],
        limit: usize,
    ) -> Result<Vec<ReferenceComment>, AppError> {
        let combinations: Vec<(Season, CommentKind)> = seasons
            .iter()
            .flat_map(|s| CommentKind::ALL.iter().map(move |k| (*s, *k)))
            .collect();
        let mut comments = self.load_partitions(combinations).await;
        comments.truncate(limit);
        Ok(comments)
    }

    /// Comments relevant to the current calendar month (SPEC_FULL §4.5
    /// month -> season table), sorted by `count` descending, top `limit`.
    pub async fn get_recent(&self, limit: usize) -> Result<Vec<ReferenceComment>, AppError> {
        let month = chrono::Utc::now().with_timezone(&chrono_tz::Asia::Tokyo).date_naive().format("%m").to_string().parse::<u32>().unwrap_or(1);
        self.get_recent_for_month(month, limit).await
    }

    /// Testable variant of [`Self::get_recent`] taking the month explicitly.
    pub async fn get_recent_for_month(
        &self,
        month: u32,
        limit: usize,
    ) -> Result<Vec<ReferenceComment>, AppError> {
        let seasons = Season::relevant_for_month(month);
        let combinations: Vec<(Season, CommentKind)> = seasons
            .iter()
            .flat_map(|s| CommentKind::ALL.iter().map(move |k| (*s, *k)))
            .collect();
        let mut comments = self.load_partitions(combinations).await;
        comments.sort_by(|a, b| b.count.cmp(&a.count));
        comments.truncate(limit);
        Ok(comments)
    }

    /// Every partition, capped per-partition at `max_per_partition`.
    pub async fn all_available(
        &self,
        max_per_partition: usize,
    ) -> Result<Vec<ReferenceComment>, AppError> {
        let combinations: Vec<(Season, CommentKind)> = Season::ALL
            .iter()
            .flat_map(|s| CommentKind::ALL.iter().map(move |k| (*s, *k)))
            .collect();

        let partitions: Vec<Vec<ReferenceComment>> = stream::iter(
            combinations
                .into_iter()
                .map(|(season, kind)| async move { self.load_partition(season, kind).await }),
        )
        .buffer_unordered(MAX_CONCURRENT_PARTITION_LOADS)
        .collect()
        .await;

        let mut all = Vec::new();
        for mut partition in partitions {
            partition.truncate(max_per_partition);
            all.extend(partition);
        }
        Ok(all)
    }
}

fn parse_partition_file(
    path: &Path,
    season: Season,
    kind: CommentKind,
) -> Vec<ReferenceComment> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "comment partition file not found, treating as empty");
        return Vec::new();
    }

    let mut reader = match csv::ReaderBuilder::new().has_headers(true).from_path(path) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to open comment partition file");
            return Vec::new();
        }
    };

    let text_column = match kind {
        CommentKind::WeatherComment => "weather_comment",
        CommentKind::Advice => "advice",
    };

    let headers = match reader.headers() {
        Ok(h) => h.clone(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read comment partition headers");
            return Vec::new();
        }
    };
    let text_idx = headers.iter().position(|h| h == text_column);
    let count_idx = headers.iter().position(|h| h == "count");

    let mut comments = Vec::new();
    let mut total_rows = 0usize;
    let mut discarded_rows = 0usize;

    for (row_number, record) in reader.records().enumerate() {
        total_rows += 1;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(path = %path.display(), row_number, error = %e, "skipping unparseable CSV row");
                discarded_rows += 1;
                continue;
            }
        };

        let Some(text_idx) = text_idx else {
            discarded_rows += 1;
            continue;
        };
        let raw_text = record.get(text_idx).unwrap_or("").trim();
        if raw_text.is_empty() {
            discarded_rows += 1;
            continue;
        }

        let (text, was_truncated) = ReferenceComment::truncate_text(raw_text);
        if was_truncated {
            tracing::warn!(path = %path.display(), row_number, "reference comment text truncated to 200 chars");
        }

        let count = count_idx
            .and_then(|idx| record.get(idx))
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or_else(|| {
                tracing::debug!(path = %path.display(), row_number, "missing/invalid count, defaulting to 0");
                0
            });

        comments.push(ReferenceComment {
            text,
            kind,
            season,
            source_row: row_number,
            count,
        });
    }

    if total_rows > 0 {
        let discard_fraction = discarded_rows as f64 / total_rows as f64;
        if discard_fraction > MAX_SILENT_DISCARD_FRACTION {
            tracing::warn!(
                path = %path.display(),
                discarded_rows,
                total_rows,
                discard_fraction,
                "comment partition discarded more than 5% of rows"
            );
        }
    }

    comments
}
