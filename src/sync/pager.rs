use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::congress::types::WireBill;
use crate::error::{AppError, Result};

/// Anything that can serve offset/limit pages of bill records sorted by
/// descending update date.
#[allow(async_fn_in_trait)]
pub trait BillSource {
    async fn fetch_page(
        &mut self,
        offset: u32,
        limit: u32,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<WireBill>>;
}

#[derive(Debug, Clone)]
pub struct PageConfig {
    /// Records per page, bounded by the provider's maximum of 250.
    pub page_size: u32,
    /// Fixed delay between successive page requests.
    pub politeness_delay: Duration,
    /// Longer fixed delay before retrying the same offset after HTTP 429.
    pub rate_limit_delay: Duration,
    /// Optional time window scoping the query.
    pub window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// Stop once a batch's oldest update stamp is not newer than this.
    pub checkpoint: Option<DateTime<Utc>>,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            page_size: 250,
            politeness_delay: Duration::from_secs(1),
            rate_limit_delay: Duration::from_secs(60),
            window: None,
            checkpoint: None,
        }
    }
}

/// Walks a bill source page by page until exhaustion or the checkpoint.
///
/// The provider sorts by descending update date, so once the oldest record
/// in a batch is not newer than the checkpoint, everything past it has
/// already been synced and the walk stops without another request. The
/// boundary batch itself is still yielded so its records get reconciled.
pub struct Pager<S: BillSource> {
    source: S,
    config: PageConfig,
    offset: u32,
    exhausted: bool,
}

impl<S: BillSource> Pager<S> {
    pub fn new(source: S, config: PageConfig) -> Self {
        Self {
            source,
            config,
            offset: 0,
            exhausted: false,
        }
    }

    /// The next batch of records, or None once the walk is over.
    ///
    /// A rate-limited request sleeps the configured delay and retries the
    /// same offset. Any other error aborts the walk and surfaces to the
    /// caller, who resumes on the next scheduled run.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<WireBill>>> {
        if self.exhausted {
            return Ok(None);
        }

        if self.offset > 0 {
            tokio::time::sleep(self.config.politeness_delay).await;
        }

        let batch = loop {
            match self
                .source
                .fetch_page(self.offset, self.config.page_size, self.config.window)
                .await
            {
                Ok(batch) => break batch,
                Err(AppError::RateLimited) => {
                    tracing::warn!(
                        "Rate limited at offset {}, sleeping {:?} before retrying",
                        self.offset,
                        self.config.rate_limit_delay
                    );
                    tokio::time::sleep(self.config.rate_limit_delay).await;
                }
                Err(e) => {
                    self.exhausted = true;
                    return Err(e);
                }
            }
        };

        if batch.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }

        self.offset += batch.len() as u32;

        // A short page means the result set is exhausted.
        if (batch.len() as u32) < self.config.page_size {
            self.exhausted = true;
        }

        if let Some(checkpoint) = self.config.checkpoint {
            if let Some(oldest) = batch.iter().filter_map(|b| b.update_stamp()).min() {
                if oldest <= checkpoint {
                    tracing::debug!(
                        "Batch reached checkpoint {} at offset {}, stopping after this batch",
                        checkpoint,
                        self.offset
                    );
                    self.exhausted = true;
                }
            }
        }

        Ok(Some(batch))
    }
}
