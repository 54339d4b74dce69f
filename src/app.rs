use chrono::Utc;

use crate::ai::{self, Claude, Classifier, Summarizer};
use crate::config::Config;
use crate::congress::{CongressBillSource, CongressClient};
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::BillText;
use crate::services::{CacheReport, TextCache};
use crate::sync::{PageConfig, Pager, Reconciler, SyncReport, UpsertStrategy};

pub struct App {
    config: Config,
    pub repository: Repository,
    cache: TextCache,
    client: Option<CongressClient>,
    claude: Option<Claude>,
}

impl App {
    pub async fn new(config: Config) -> Result<Self> {
        let repository = Repository::new(&config.db_path).await?;
        let cache = TextCache::new(&config.cache_dir);

        let client = if config.congress_api_key.is_some() {
            Some(CongressClient::new(&config)?)
        } else {
            None
        };

        let claude = config
            .claude_api_key
            .as_ref()
            .map(|key| Claude::new(key.clone()));

        Ok(Self {
            config,
            repository,
            cache,
            client,
            claude,
        })
    }

    fn client(&self) -> Result<&CongressClient> {
        self.client.as_ref().ok_or_else(|| {
            AppError::Config("congress_api_key is not set; add it to config.toml".to_string())
        })
    }

    fn claude(&self) -> Result<&Claude> {
        self.claude.as_ref().ok_or_else(|| {
            AppError::Config("claude_api_key is not set; add it to config.toml".to_string())
        })
    }

    fn page_config(&self) -> PageConfig {
        PageConfig {
            page_size: self.config.page_size,
            politeness_delay: self.config.request_delay(),
            rate_limit_delay: self.config.rate_limit_delay(),
            window: None,
            checkpoint: None,
        }
    }

    /// Incremental pass over bills updated within the recent window.
    pub async fn sync_recent(&self) -> Result<SyncReport> {
        let to = Utc::now();
        let from = to - chrono::Duration::days(i64::from(self.config.sync_window_days));
        let config = PageConfig {
            window: Some((from, to)),
            ..self.page_config()
        };
        self.run_sync(config, UpsertStrategy::UpdateInPlace).await
    }

    /// Full walk of the configured congress, replacing stored rows. The
    /// optional checkpoint keeps the walk from paging past the session
    /// start once the feed reaches bills older than it.
    pub async fn sync_baseline(&self) -> Result<SyncReport> {
        let checkpoint = self
            .config
            .congress_start_date
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc());
        let config = PageConfig {
            checkpoint,
            ..self.page_config()
        };
        self.run_sync(config, UpsertStrategy::Replace).await
    }

    async fn run_sync(&self, config: PageConfig, strategy: UpsertStrategy) -> Result<SyncReport> {
        let client = self.client()?;
        let source = CongressBillSource::new(client, self.config.congress);
        let mut pager = Pager::new(source, config);
        let reconciler = Reconciler::new(&self.repository, strategy);

        let mut report = SyncReport::default();
        while let Some(batch) = pager.next_batch().await? {
            reconciler.reconcile_batch(&batch, &mut report).await;
        }

        tracing::info!(
            "Bill sync finished: {} inserted, {} updated, {} unchanged, {} ignored, {} failed",
            report.inserted,
            report.updated,
            report.unchanged,
            report.ignored,
            report.failed
        );
        Ok(report)
    }

    /// Fetch full action histories for bills whose sync flag is clear.
    pub async fn sync_actions(&self) -> Result<usize> {
        let client = self.client()?;
        let pending = self.repository.bills_needing_action_sync().await?;
        if pending.is_empty() {
            return Ok(0);
        }
        tracing::info!("Syncing actions for {} bills", pending.len());

        let mut synced = 0usize;
        for (i, bill) in pending.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.request_delay()).await;
            }
            let actions = match client.bill_actions(bill.key).await {
                Ok(wire) => wire
                    .into_iter()
                    .map(|w| w.into_action(bill.key))
                    .collect::<Vec<_>>(),
                Err(e) => {
                    tracing::warn!("Failed to fetch actions for {}: {}", bill.key, e);
                    continue;
                }
            };
            let inserted = self.repository.insert_actions(actions).await?;
            self.repository.mark_actions_synced(bill.key).await?;
            tracing::info!("Stored {} new actions for {}", inserted, bill.key);
            synced += 1;
        }
        Ok(synced)
    }

    /// Refresh text-version URLs for bills acted on since their last
    /// text fetch. Bills without a dated version yet are retried on the
    /// next pass.
    pub async fn refresh_text_urls(&self) -> Result<usize> {
        let client = self.client()?;
        let pending = self.repository.bills_needing_text_refresh().await?;
        if pending.is_empty() {
            return Ok(0);
        }
        tracing::info!("Refreshing text URLs for {} bills", pending.len());

        let mut refreshed = 0usize;
        for (i, bill) in pending.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.request_delay()).await;
            }
            let versions = match client.text_versions(bill.key).await {
                Ok(versions) => versions,
                Err(e) => {
                    tracing::warn!("Failed to fetch text versions for {}: {}", bill.key, e);
                    continue;
                }
            };
            let Some(latest) = versions.latest() else {
                tracing::debug!("No dated text version for {} yet", bill.key);
                continue;
            };
            let record = BillText {
                key: bill.key,
                text_date: latest.parsed_date(),
                text_url: latest.url_for("Formatted Text"),
                xml_url: latest.url_for("Formatted XML"),
                pdf_url: latest.url_for("PDF"),
                fetched_at: Utc::now(),
            };
            self.repository.replace_text_record(record).await?;
            refreshed += 1;
        }
        Ok(refreshed)
    }

    /// Download documents for text records whose cached copy is missing
    /// or older than the recorded content date.
    pub async fn refresh_text_cache(&self) -> Result<CacheReport> {
        let client = self.client()?;
        let records = self.repository.current_text_records().await?;
        let report = self
            .cache
            .refresh(&records, client, self.config.request_delay())
            .await?;
        tracing::info!(
            "Text cache pass: {} fetched, {} superseded removed, {} current, {} failed, {} ahead of store",
            report.fetched,
            report.replaced,
            report.current,
            report.failed,
            report.ahead
        );
        Ok(report)
    }

    /// Explicitly remove cache files for keys with no text record.
    pub async fn sweep_cache(&self) -> Result<usize> {
        let records = self.repository.current_text_records().await?;
        let removed = self.cache.sweep_orphans(&records).await?;
        tracing::info!("Swept {} orphaned cache files", removed);
        Ok(removed)
    }

    /// Assign importance labels to bills that have none.
    pub async fn classify_pending(&self) -> Result<usize> {
        let claude = self.claude()?;
        self.classify_with(claude).await
    }

    async fn classify_with<C: Classifier>(&self, classifier: &C) -> Result<usize> {
        let pending = self.repository.bills_without_importance().await?;
        if pending.is_empty() {
            return Ok(0);
        }
        tracing::info!("Classifying {} bills", pending.len());

        let mut classified = 0usize;
        for bill in &pending {
            // Presidential and public-law actions need no model call.
            let shortcut = bill
                .latest_action_text
                .as_deref()
                .and_then(ai::automatic_importance);
            if let Some(importance) = shortcut {
                self.repository.set_importance(bill.key, importance).await?;
                tracing::info!(
                    "{} involves the President or a public law, marked {}",
                    bill.key,
                    importance
                );
                classified += 1;
                continue;
            }

            let actions = self.repository.actions_for(bill.key).await?;
            let reply = match classifier
                .classify_importance(bill.key, &bill.title, &actions)
                .await
            {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!("Failed to classify {}: {}", bill.key, e);
                    continue;
                }
            };
            match ai::parse_importance(&reply) {
                Some(importance) => {
                    self.repository.set_importance(bill.key, importance).await?;
                    tracing::info!("Classified {} as {}", bill.key, importance);
                    classified += 1;
                }
                None => {
                    // Left NULL so the next run retries.
                    tracing::warn!("Unusable importance reply for {}: {}", bill.key, reply.trim());
                }
            }
        }
        Ok(classified)
    }

    /// Summarize bills whose cached document is newer than their stored
    /// summary. Records whose document has not been cached yet are picked
    /// up on a later pass.
    pub async fn summarize_updated(&self) -> Result<usize> {
        let claude = self.claude()?;
        self.summarize_with(claude).await
    }

    async fn summarize_with<S: Summarizer>(&self, summarizer: &S) -> Result<usize> {
        let pending = self.repository.bills_needing_summary().await?;
        if pending.is_empty() {
            return Ok(0);
        }
        tracing::info!("Summarizing {} bills", pending.len());

        self.cache.ensure_dir().await?;
        let entries = self.cache.entries().await?;

        let mut summarized = 0usize;
        for record in &pending {
            let Some(text_date) = record.text_date else {
                continue;
            };
            let Some(entry) = entries
                .iter()
                .find(|e| e.key == record.key && e.content_date == text_date)
            else {
                tracing::debug!("No cached document for {} dated {} yet", record.key, text_date);
                continue;
            };
            let Some(bill) = self.repository.find_bill(record.key).await? else {
                tracing::warn!("Text record for {} has no bill row, skipping", record.key);
                continue;
            };

            let html = match tokio::fs::read_to_string(&entry.path).await {
                Ok(html) => html,
                Err(e) => {
                    tracing::warn!(
                        "Failed to read cached document {}: {}",
                        entry.path.display(),
                        e
                    );
                    continue;
                }
            };
            let text = match html2text::from_read(html.as_bytes(), 80) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Failed to convert document for {} to text: {}", record.key, e);
                    continue;
                }
            };

            let actions = self.repository.actions_for(record.key).await?;
            let summary = match summarizer
                .summarize_bill(record.key, &bill.title, &actions, &text)
                .await
            {
                Ok(summary) => summary,
                Err(e) => {
                    tracing::warn!("Failed to summarize {}: {}", record.key, e);
                    continue;
                }
            };
            self.repository
                .save_summary(
                    record.key,
                    Some(text_date),
                    summary,
                    summarizer.model_version().to_string(),
                )
                .await?;
            tracing::info!("Summarized {} as of {}", record.key, text_date);
            summarized += 1;
        }
        Ok(summarized)
    }

    /// One pass of every stage in order. A failing stage is logged and
    /// the cycle moves on to the next one.
    pub async fn run_cycle(&self) -> Result<()> {
        self.client()?;

        let mut failures = 0usize;

        let changed = match self.sync_recent().await {
            Ok(report) => report.changed.len(),
            Err(e) => {
                tracing::error!("Recent sync failed: {}", e);
                failures += 1;
                0
            }
        };

        let actions = match self.sync_actions().await {
            Ok(count) => count,
            Err(e) => {
                tracing::error!("Action sync failed: {}", e);
                failures += 1;
                0
            }
        };

        let texts = match self.refresh_text_urls().await {
            Ok(count) => count,
            Err(e) => {
                tracing::error!("Text URL refresh failed: {}", e);
                failures += 1;
                0
            }
        };

        let cached = match self.refresh_text_cache().await {
            Ok(report) => report.fetched,
            Err(e) => {
                tracing::error!("Text cache refresh failed: {}", e);
                failures += 1;
                0
            }
        };

        let (mut classified, mut summarized) = (0, 0);
        if self.claude.is_some() {
            classified = match self.classify_pending().await {
                Ok(count) => count,
                Err(e) => {
                    tracing::error!("Classification failed: {}", e);
                    failures += 1;
                    0
                }
            };
            summarized = match self.summarize_updated().await {
                Ok(count) => count,
                Err(e) => {
                    tracing::error!("Summarization failed: {}", e);
                    failures += 1;
                    0
                }
            };
        } else {
            tracing::info!("claude_api_key is not set, skipping classification and summarization");
        }

        tracing::info!(
            "Cycle finished: {} bills changed, {} action histories, {} text records, \
             {} documents cached, {} classified, {} summarized, {} stage failures",
            changed,
            actions,
            texts,
            cached,
            classified,
            summarized,
            failures
        );
        Ok(())
    }
}
