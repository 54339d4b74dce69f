use std::collections::BTreeSet;

use crate::congress::types::WireBill;
use crate::db::Repository;
use crate::error::Result;
use crate::models::{BillCandidate, BillKey};

use super::staleness::{self, Staleness};

/// How a stale row gets rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertStrategy {
    /// Update the mutable columns in place, resetting derived flags.
    UpdateInPlace,
    /// Delete-then-reinsert the full row.
    Replace,
}

/// Outcome of a reconciliation pass. `changed` is the set of natural keys
/// inserted or updated, which scopes all downstream work.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub ignored: usize,
    pub failed: usize,
    pub changed: BTreeSet<BillKey>,
}

impl SyncReport {
    pub fn processed(&self) -> usize {
        self.inserted + self.updated + self.unchanged + self.ignored + self.failed
    }

    fn tally(&mut self, disposition: Staleness) {
        match disposition {
            Staleness::New => self.inserted += 1,
            Staleness::StaleUpdate => self.updated += 1,
            Staleness::Current => self.unchanged += 1,
            Staleness::Ignore => self.ignored += 1,
        }
    }
}

/// Merges fetched batches into the store by staleness disposition.
pub struct Reconciler<'a> {
    repo: &'a Repository,
    strategy: UpsertStrategy,
}

impl<'a> Reconciler<'a> {
    pub fn new(repo: &'a Repository, strategy: UpsertStrategy) -> Self {
        Self { repo, strategy }
    }

    /// Reconcile one batch in provider order. Malformed records and
    /// per-record store failures are logged and skipped; they never abort
    /// the rest of the batch.
    pub async fn reconcile_batch(&self, batch: &[WireBill], report: &mut SyncReport) {
        for wire in batch {
            let Some(candidate) = wire.candidate() else {
                tracing::warn!("Ignoring bill record with unparsable key: {:?}", wire);
                report.tally(Staleness::Ignore);
                continue;
            };
            let key = candidate.key;
            match self.store(candidate).await {
                Ok(disposition) => {
                    if matches!(disposition, Staleness::New | Staleness::StaleUpdate) {
                        report.changed.insert(key);
                    }
                    report.tally(disposition);
                }
                Err(e) => {
                    tracing::error!("Failed to store bill {}: {}", key, e);
                    report.failed += 1;
                }
            }
        }
    }

    /// Apply one candidate's disposition to the store and return it.
    async fn store(&self, candidate: BillCandidate) -> Result<Staleness> {
        let stored = self.repo.find_bill(candidate.key).await?;

        let disposition = staleness::by_update_date(&candidate, stored.as_ref());
        match disposition {
            Staleness::New => self.repo.insert_bill(candidate).await?,
            Staleness::StaleUpdate => match self.strategy {
                UpsertStrategy::UpdateInPlace => self.repo.update_bill(candidate).await?,
                UpsertStrategy::Replace => self.repo.replace_bill(candidate).await?,
            },
            Staleness::Current | Staleness::Ignore => {}
        }
        Ok(disposition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::congress::types::{BillNumber, WireLatestAction};
    use crate::models::{parse_timestamp, BillType, Importance};
    use tempfile::tempdir;

    fn wire(number: i64, update: &str) -> WireBill {
        WireBill {
            congress: Some(118),
            bill_type: Some("hr".into()),
            number: Some(BillNumber::Int(number)),
            title: Some(format!("Bill {number}")),
            latest_action: Some(WireLatestAction {
                action_date: Some("2024-04-29".into()),
                text: Some("Referred to committee.".into()),
            }),
            update_date: Some(update.into()),
            url: Some(format!(
                "https://api.congress.gov/v3/bill/118/hr/{number}?format=json"
            )),
            ..Default::default()
        }
    }

    fn key(number: i64) -> BillKey {
        BillKey::new(118, BillType::Hr, number)
    }

    async fn repo(dir: &tempfile::TempDir) -> Repository {
        let path = dir.path().join("bills.db");
        Repository::new(path.to_str().expect("utf-8 path"))
            .await
            .expect("open repository")
    }

    #[tokio::test]
    async fn first_sight_inserts_and_reports_the_key() {
        let dir = tempdir().expect("tempdir");
        let repo = repo(&dir).await;
        let reconciler = Reconciler::new(&repo, UpsertStrategy::UpdateInPlace);

        let mut report = SyncReport::default();
        reconciler
            .reconcile_batch(&[wire(7032, "2024-04-29")], &mut report)
            .await;

        assert_eq!(report.inserted, 1);
        assert_eq!(report.changed, BTreeSet::from([key(7032)]));
        let bill = repo
            .find_bill(key(7032))
            .await
            .expect("find")
            .expect("present");
        assert_eq!(bill.update_date, parse_timestamp("2024-04-29"));
    }

    #[tokio::test]
    async fn unchanged_resupply_is_a_noop() {
        let dir = tempdir().expect("tempdir");
        let repo = repo(&dir).await;
        let reconciler = Reconciler::new(&repo, UpsertStrategy::UpdateInPlace);

        let batch = [wire(7032, "2024-04-29")];
        let mut first = SyncReport::default();
        reconciler.reconcile_batch(&batch, &mut first).await;
        repo.set_importance(key(7032), Importance::Important)
            .await
            .expect("set importance");

        let mut second = SyncReport::default();
        reconciler.reconcile_batch(&batch, &mut second).await;

        assert_eq!(second.unchanged, 1);
        assert!(second.changed.is_empty());
        let bill = repo
            .find_bill(key(7032))
            .await
            .expect("find")
            .expect("present");
        assert_eq!(bill.update_date, parse_timestamp("2024-04-29"));
        // Untouched rows keep their derived state.
        assert_eq!(bill.importance, Some(Importance::Important));
    }

    #[tokio::test]
    async fn newer_resupply_updates_and_resets_flags() {
        let dir = tempdir().expect("tempdir");
        let repo = repo(&dir).await;
        let reconciler = Reconciler::new(&repo, UpsertStrategy::UpdateInPlace);

        let mut report = SyncReport::default();
        reconciler
            .reconcile_batch(&[wire(7032, "2024-04-29")], &mut report)
            .await;
        repo.set_importance(key(7032), Importance::MustKnow)
            .await
            .expect("set importance");
        repo.mark_actions_synced(key(7032)).await.expect("mark");
        repo.mark_posted(key(7032)).await.expect("mark");

        let mut report = SyncReport::default();
        reconciler
            .reconcile_batch(&[wire(7032, "2024-09-10")], &mut report)
            .await;

        assert_eq!(report.updated, 1);
        assert_eq!(report.changed, BTreeSet::from([key(7032)]));
        let bill = repo
            .find_bill(key(7032))
            .await
            .expect("find")
            .expect("present");
        assert_eq!(bill.update_date, parse_timestamp("2024-09-10"));
        assert!(bill.importance.is_none());
        assert!(!bill.actions_synced);
        assert!(!bill.tweet_created);
    }

    #[tokio::test]
    async fn replace_strategy_reinserts_stale_rows() {
        let dir = tempdir().expect("tempdir");
        let repo = repo(&dir).await;
        let reconciler = Reconciler::new(&repo, UpsertStrategy::Replace);

        let mut report = SyncReport::default();
        reconciler
            .reconcile_batch(&[wire(7032, "2024-04-29")], &mut report)
            .await;
        repo.set_importance(key(7032), Importance::Minimal)
            .await
            .expect("set importance");

        let mut report = SyncReport::default();
        reconciler
            .reconcile_batch(&[wire(7032, "2024-09-10")], &mut report)
            .await;

        assert_eq!(report.updated, 1);
        let bill = repo
            .find_bill(key(7032))
            .await
            .expect("find")
            .expect("present");
        assert_eq!(bill.update_date, parse_timestamp("2024-09-10"));
        assert!(bill.importance.is_none());
    }

    #[tokio::test]
    async fn second_identical_run_changes_nothing() {
        let dir = tempdir().expect("tempdir");
        let repo = repo(&dir).await;
        let reconciler = Reconciler::new(&repo, UpsertStrategy::UpdateInPlace);

        let batch = [
            wire(1, "2024-04-29"),
            wire(2, "2024-05-01"),
            wire(3, "2024-05-02"),
        ];
        let mut first = SyncReport::default();
        reconciler.reconcile_batch(&batch, &mut first).await;
        let mut second = SyncReport::default();
        reconciler.reconcile_batch(&batch, &mut second).await;

        assert_eq!(first.inserted, 3);
        assert_eq!(second.unchanged, 3);
        assert!(second.changed.is_empty());
    }

    #[tokio::test]
    async fn older_or_equal_stamps_never_alter_the_row() {
        let dir = tempdir().expect("tempdir");
        let repo = repo(&dir).await;
        let reconciler = Reconciler::new(&repo, UpsertStrategy::UpdateInPlace);

        let mut report = SyncReport::default();
        reconciler
            .reconcile_batch(&[wire(7032, "2024-09-10")], &mut report)
            .await;

        let mut report = SyncReport::default();
        let mut older = wire(7032, "2024-04-29");
        older.title = Some("Renamed in an old snapshot".into());
        reconciler.reconcile_batch(&[older], &mut report).await;

        assert!(report.changed.is_empty());
        let bill = repo
            .find_bill(key(7032))
            .await
            .expect("find")
            .expect("present");
        assert_eq!(bill.update_date, parse_timestamp("2024-09-10"));
        assert_eq!(bill.title, "Bill 7032");
    }

    #[tokio::test]
    async fn unparsable_keys_are_ignored_not_stored() {
        let dir = tempdir().expect("tempdir");
        let repo = repo(&dir).await;
        let reconciler = Reconciler::new(&repo, UpsertStrategy::UpdateInPlace);

        let mut bad = wire(7032, "2024-04-29");
        bad.bill_type = None;

        let mut report = SyncReport::default();
        reconciler.reconcile_batch(&[bad], &mut report).await;

        assert_eq!(report.ignored, 1);
        assert!(report.changed.is_empty());
        assert!(repo
            .find_bill(key(7032))
            .await
            .expect("find")
            .is_none());
    }
}
