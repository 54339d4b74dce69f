use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::Result;
use crate::models::{BillKey, BillText};
use crate::sync::staleness::{self, Staleness};

/// Fetches secondary documents by URL.
#[allow(async_fn_in_trait)]
pub trait DocumentSource {
    async fn fetch_document(&self, url: &str) -> Result<String>;
}

/// One cached document, identified entirely by its filename.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: BillKey,
    pub content_date: NaiveDate,
    pub path: PathBuf,
}

#[derive(Debug, Default)]
pub struct CacheReport {
    /// Documents fetched and written this pass.
    pub fetched: usize,
    /// Superseded files deleted after a confirmed write.
    pub replaced: usize,
    /// Keys whose cached copy already matched the store.
    pub current: usize,
    /// Fetches or writes that failed, previous copy retained.
    pub failed: usize,
    /// Cache files dated ahead of the store. Logged and kept.
    pub ahead: usize,
}

/// Maintains the on-disk cache of bill text documents. The filename is the
/// only index: `{congress}.{type}.{number}.{content_date}.{generated}.htm`.
pub struct TextCache {
    dir: PathBuf,
}

impl TextCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Every conforming cache entry on disk. Files that do not parse as
    /// cache filenames are skipped with a debug log.
    pub async fn entries(&self) -> Result<Vec<CacheEntry>> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            match parse_cache_filename(name) {
                Some((key, content_date)) => entries.push(CacheEntry {
                    key,
                    content_date,
                    path: entry.path(),
                }),
                None => tracing::debug!("Skipping non-cache file: {}", name),
            }
        }
        Ok(entries)
    }

    /// Write a document under a fresh cache filename. The body lands in a
    /// temp file first and is renamed into place so readers never observe
    /// a half-written document.
    pub async fn write_document(
        &self,
        key: BillKey,
        content_date: NaiveDate,
        body: &str,
    ) -> Result<PathBuf> {
        let filename = cache_filename(key, content_date, Utc::now());
        let final_path = self.dir.join(&filename);
        let tmp_path = self.dir.join(format!("{filename}.tmp"));

        tokio::fs::write(&tmp_path, body).await?;
        tokio::fs::rename(&tmp_path, &final_path).await?;

        Ok(final_path)
    }

    /// Bring the cache in line with the store's content dates. Missing or
    /// outdated documents are fetched; a superseded file is deleted only
    /// after its replacement is confirmed on disk, and a failed fetch
    /// keeps whatever was cached before.
    pub async fn refresh<S: DocumentSource>(
        &self,
        records: &[BillText],
        source: &S,
        delay: Duration,
    ) -> Result<CacheReport> {
        self.ensure_dir().await?;
        let entries = self.entries().await?;
        let mut report = CacheReport::default();
        let mut fetches = 0usize;

        for record in records {
            let Some(content_date) = record.text_date else {
                tracing::debug!("No text date recorded for {}, skipping", record.key);
                continue;
            };
            let Some(url) = record.text_url.as_deref() else {
                tracing::debug!("No text URL recorded for {}, skipping", record.key);
                continue;
            };

            let existing: Vec<&CacheEntry> =
                entries.iter().filter(|e| e.key == record.key).collect();
            let newest = existing.iter().map(|e| e.content_date).max();

            match staleness::by_content_date(content_date, newest) {
                Staleness::New | Staleness::StaleUpdate => {
                    if fetches > 0 {
                        tokio::time::sleep(delay).await;
                    }
                    fetches += 1;

                    let body = match source.fetch_document(url).await {
                        Ok(body) => body,
                        Err(e) => {
                            tracing::warn!(
                                "Failed to fetch document for {}: {}. Keeping the previous copy",
                                record.key,
                                e
                            );
                            report.failed += 1;
                            continue;
                        }
                    };

                    match self.write_document(record.key, content_date, &body).await {
                        Ok(path) => {
                            tracing::info!("Cached {} at {}", record.key, path.display());
                            report.fetched += 1;
                            for old in &existing {
                                if old.content_date < content_date {
                                    match tokio::fs::remove_file(&old.path).await {
                                        Ok(()) => {
                                            tracing::info!(
                                                "Deleted superseded cache file: {}",
                                                old.path.display()
                                            );
                                            report.replaced += 1;
                                        }
                                        Err(e) => tracing::warn!(
                                            "Failed to delete superseded cache file {}: {}",
                                            old.path.display(),
                                            e
                                        ),
                                    }
                                }
                            }
                        }
                        Err(e) => {
                            tracing::error!(
                                "Failed to write cache file for {}: {}",
                                record.key,
                                e
                            );
                            report.failed += 1;
                        }
                    }
                }
                Staleness::Current => match newest {
                    Some(have) if have > content_date => {
                        tracing::warn!(
                            "Cache for {} is dated {} but the store says {}. Leaving the file in place",
                            record.key,
                            have,
                            content_date
                        );
                        report.ahead += 1;
                    }
                    _ => report.current += 1,
                },
                Staleness::Ignore => {}
            }
        }

        // Orphans are only noted here; removal requires an explicit sweep.
        let keys: BTreeSet<BillKey> = records.iter().map(|r| r.key).collect();
        for entry in &entries {
            if !keys.contains(&entry.key) {
                tracing::debug!(
                    "Cache file {} has no text record, left for an explicit sweep",
                    entry.path.display()
                );
            }
        }

        Ok(report)
    }

    /// Remove cache files whose key has no text record at all. This never
    /// runs as part of a refresh; it has to be requested explicitly.
    pub async fn sweep_orphans(&self, records: &[BillText]) -> Result<usize> {
        self.ensure_dir().await?;
        let keys: BTreeSet<BillKey> = records.iter().map(|r| r.key).collect();

        let mut removed = 0;
        for entry in self.entries().await? {
            if !keys.contains(&entry.key) {
                match tokio::fs::remove_file(&entry.path).await {
                    Ok(()) => {
                        tracing::info!("Removed orphaned cache file: {}", entry.path.display());
                        removed += 1;
                    }
                    Err(e) => tracing::warn!(
                        "Failed to remove orphaned cache file {}: {}",
                        entry.path.display(),
                        e
                    ),
                }
            }
        }
        Ok(removed)
    }
}

pub fn cache_filename(key: BillKey, content_date: NaiveDate, generated: DateTime<Utc>) -> String {
    format!(
        "{}.{}.{}.htm",
        key,
        content_date.format("%Y-%m-%d"),
        generated.format("%Y-%m-%d-%H%M")
    )
}

pub fn parse_cache_filename(name: &str) -> Option<(BillKey, NaiveDate)> {
    let stem = name.strip_suffix(".htm")?;
    let parts: Vec<&str> = stem.split('.').collect();
    if parts.len() != 5 {
        return None;
    }
    let congress = parts[0].parse().ok()?;
    let bill_type = parts[1].parse().ok()?;
    let number = parts[2].parse().ok()?;
    let content_date = NaiveDate::parse_from_str(parts[3], "%Y-%m-%d").ok()?;
    // The generation stamp has to at least look like one.
    chrono::NaiveDateTime::parse_from_str(parts[4], "%Y-%m-%d-%H%M").ok()?;
    Some((BillKey::new(congress, bill_type, number), content_date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::BillType;
    use std::cell::Cell;
    use tempfile::tempdir;

    struct ScriptedDocs {
        fail: bool,
        calls: Cell<usize>,
    }

    impl ScriptedDocs {
        fn new() -> Self {
            Self {
                fail: false,
                calls: Cell::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                calls: Cell::new(0),
            }
        }
    }

    impl DocumentSource for ScriptedDocs {
        async fn fetch_document(&self, _url: &str) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                Err(AppError::Api("fetch failed".into()))
            } else {
                Ok("<html>bill text</html>".to_string())
            }
        }
    }

    fn key() -> BillKey {
        BillKey::new(118, BillType::Hr, 7032)
    }

    fn record(date: (i32, u32, u32)) -> BillText {
        BillText {
            key: key(),
            text_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2),
            text_url: Some(
                "https://www.congress.gov/118/bills/hr7032/BILLS-118hr7032ih.htm".into(),
            ),
            xml_url: None,
            pdf_url: None,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn filenames_round_trip() {
        let date = NaiveDate::from_ymd_opt(2024, 4, 29).expect("date");
        let generated = DateTime::parse_from_rfc3339("2024-09-10T12:30:00Z")
            .expect("ts")
            .with_timezone(&Utc);

        let name = cache_filename(key(), date, generated);
        assert_eq!(name, "118.hr.7032.2024-04-29.2024-09-10-1230.htm");
        assert_eq!(parse_cache_filename(&name), Some((key(), date)));
    }

    #[test]
    fn non_conforming_names_are_rejected() {
        assert!(parse_cache_filename("notes.txt").is_none());
        assert!(parse_cache_filename("118.hr.7032.notadate.2024-09-10-1230.htm").is_none());
        assert!(parse_cache_filename("118.treaty.1.2024-04-29.2024-09-10-1230.htm").is_none());
        assert!(parse_cache_filename("118.hr.7032.2024-04-29.garbage.htm").is_none());
        assert!(parse_cache_filename("118.hr.7032.2024-04-29.htm").is_none());
    }

    #[tokio::test]
    async fn missing_documents_are_fetched_fresh() {
        let dir = tempdir().expect("tempdir");
        let cache = TextCache::new(dir.path());

        let docs = ScriptedDocs::new();
        let report = cache
            .refresh(&[record((2024, 4, 29))], &docs, Duration::ZERO)
            .await
            .expect("refresh");

        assert_eq!(report.fetched, 1);
        assert_eq!(report.replaced, 0);
        assert_eq!(docs.calls.get(), 1);
        let entries = cache.entries().await.expect("entries");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, key());
    }

    #[tokio::test]
    async fn newer_store_date_replaces_the_old_file() {
        let dir = tempdir().expect("tempdir");
        let cache = TextCache::new(dir.path());
        cache.ensure_dir().await.expect("mkdir");

        let old_date = NaiveDate::from_ymd_opt(2024, 4, 29).expect("date");
        let old_path = cache
            .write_document(key(), old_date, "<html>old</html>")
            .await
            .expect("seed");

        let docs = ScriptedDocs::new();
        let report = cache
            .refresh(&[record((2024, 9, 10))], &docs, Duration::ZERO)
            .await
            .expect("refresh");

        assert_eq!(report.fetched, 1);
        assert_eq!(report.replaced, 1);
        let entries = cache.entries().await.expect("entries");
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].content_date,
            NaiveDate::from_ymd_opt(2024, 9, 10).expect("date")
        );
        assert!(!old_path.exists());
    }

    #[tokio::test]
    async fn failed_fetch_retains_the_previous_copy() {
        let dir = tempdir().expect("tempdir");
        let cache = TextCache::new(dir.path());
        cache.ensure_dir().await.expect("mkdir");

        let old_date = NaiveDate::from_ymd_opt(2024, 4, 29).expect("date");
        let old_path = cache
            .write_document(key(), old_date, "<html>old</html>")
            .await
            .expect("seed");

        let docs = ScriptedDocs::failing();
        let report = cache
            .refresh(&[record((2024, 9, 10))], &docs, Duration::ZERO)
            .await
            .expect("refresh");

        assert_eq!(report.failed, 1);
        assert_eq!(report.fetched, 0);
        assert!(old_path.exists());
    }

    #[tokio::test]
    async fn at_most_one_file_per_key_after_a_pass() {
        let dir = tempdir().expect("tempdir");
        let cache = TextCache::new(dir.path());
        cache.ensure_dir().await.expect("mkdir");

        // Two stale generations left over from earlier runs.
        for name in [
            "118.hr.7032.2024-03-01.2024-03-01-0900.htm",
            "118.hr.7032.2024-04-29.2024-04-29-0900.htm",
        ] {
            tokio::fs::write(dir.path().join(name), "<html>old</html>")
                .await
                .expect("seed");
        }

        let docs = ScriptedDocs::new();
        cache
            .refresh(&[record((2024, 9, 10))], &docs, Duration::ZERO)
            .await
            .expect("refresh");

        let entries = cache.entries().await.expect("entries");
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].content_date,
            NaiveDate::from_ymd_opt(2024, 9, 10).expect("date")
        );
    }

    #[tokio::test]
    async fn matching_dates_fetch_nothing() {
        let dir = tempdir().expect("tempdir");
        let cache = TextCache::new(dir.path());
        cache.ensure_dir().await.expect("mkdir");

        let date = NaiveDate::from_ymd_opt(2024, 4, 29).expect("date");
        cache
            .write_document(key(), date, "<html>current</html>")
            .await
            .expect("seed");

        let docs = ScriptedDocs::new();
        let report = cache
            .refresh(&[record((2024, 4, 29))], &docs, Duration::ZERO)
            .await
            .expect("refresh");

        assert_eq!(report.current, 1);
        assert_eq!(docs.calls.get(), 0);
    }

    #[tokio::test]
    async fn cache_ahead_of_store_is_kept_and_reported() {
        let dir = tempdir().expect("tempdir");
        let cache = TextCache::new(dir.path());
        cache.ensure_dir().await.expect("mkdir");

        let future = NaiveDate::from_ymd_opt(2099, 1, 1).expect("date");
        let path = cache
            .write_document(key(), future, "<html>ahead</html>")
            .await
            .expect("seed");

        let docs = ScriptedDocs::new();
        let report = cache
            .refresh(&[record((2024, 9, 10))], &docs, Duration::ZERO)
            .await
            .expect("refresh");

        assert_eq!(report.ahead, 1);
        assert_eq!(docs.calls.get(), 0);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn sweep_removes_only_keyless_entries() {
        let dir = tempdir().expect("tempdir");
        let cache = TextCache::new(dir.path());
        cache.ensure_dir().await.expect("mkdir");

        let tracked = NaiveDate::from_ymd_opt(2024, 4, 29).expect("date");
        let tracked_path = cache
            .write_document(key(), tracked, "<html>tracked</html>")
            .await
            .expect("seed");
        tokio::fs::write(
            dir.path().join("117.s.42.2023-01-15.2023-01-15-0900.htm"),
            "<html>orphan</html>",
        )
        .await
        .expect("seed orphan");
        tokio::fs::write(dir.path().join("README.txt"), "not a cache file")
            .await
            .expect("seed stray");

        let removed = cache
            .sweep_orphans(&[record((2024, 4, 29))])
            .await
            .expect("sweep");

        assert_eq!(removed, 1);
        assert!(tracked_path.exists());
        assert!(dir.path().join("README.txt").exists());
        assert!(!dir.path().join("117.s.42.2023-01-15.2023-01-15-0900.htm").exists());
    }
}
