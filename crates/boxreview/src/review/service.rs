//! Entry points used by the UI layer: fetch the next page, commit a
//! decision, give a page back.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};

use super::{CommitReceipt, Decision, DecisionProcessor, DocumentBox, LockManager, Page};
use super::{QueueItem, QueueSelector};
use crate::access::{self, ImageUrlSigner};
use crate::audit::{self, ReviewHistory};
use crate::clock::{Clock, SystemClock};
use crate::config::{QueueConfig, ReviewConfig};
use crate::db::{box_repo, page_repo, Database};
use crate::error::{BoxReviewError, ConfigError, ReviewError};
use crate::ingest::{self, BatchManifest, IngestReport};
use crate::progress::{self, BoxFilter, BoxSummary, ProgressReport};

/// The review engine over one store.
///
/// Cheap to clone; every reviewer session can hold its own copy.
#[derive(Clone)]
pub struct ReviewService {
    db: Database,
    locks: LockManager,
    queue: QueueSelector,
    decisions: DecisionProcessor,
    clock: Arc<dyn Clock>,
}

impl ReviewService {
    pub fn new(db: Database, config: &QueueConfig) -> Self {
        Self::with_clock(db, config, Arc::new(SystemClock))
    }

    pub fn with_clock(db: Database, config: &QueueConfig, clock: Arc<dyn Clock>) -> Self {
        let locks = LockManager::new(config.lease());
        Self {
            db,
            locks,
            queue: QueueSelector::new(locks, config.scan_page_size, config.release_prior_locks),
            decisions: DecisionProcessor::new(locks),
            clock,
        }
    }

    /// Opens the configured database and builds a service over it.
    pub fn open(config: &ReviewConfig) -> Result<Self, BoxReviewError> {
        let path = config.database_path().ok_or_else(|| ConfigError::Validation {
            message: "no database_path configured and no home directory found".to_string(),
        })?;
        let db = Database::open(&path)?;
        Ok(Self::new(db, &config.queue))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.locks
    }

    // Stored timestamps keep milliseconds; truncate so in-memory values match.
    fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(3)
    }

    /// Next page from the whole backlog, or `None` when there is no work
    /// that is not leased to someone else.
    pub fn next(&self, reviewer_id: &str) -> Result<Option<QueueItem>, ReviewError> {
        self.next_in(reviewer_id, None)
    }

    /// Like [`next`](Self::next), limited to one tenant's pages.
    pub fn next_for_tenant(
        &self,
        reviewer_id: &str,
        tenant_id: &str,
    ) -> Result<Option<QueueItem>, ReviewError> {
        self.next_in(reviewer_id, Some(tenant_id))
    }

    fn next_in(
        &self,
        reviewer_id: &str,
        tenant_id: Option<&str>,
    ) -> Result<Option<QueueItem>, ReviewError> {
        let now = self.now();
        let item = self
            .db
            .with_tx(|tx| self.queue.next(tx, reviewer_id, tenant_id, now))?;

        match &item {
            Some(item) => log::debug!(
                "Assigned page {} ({} #{}) to {} until {}",
                item.page.id,
                item.page.batch_id,
                item.page.page_number,
                reviewer_id,
                item.lock_expires_at
            ),
            None => log::debug!("No page available for {}", reviewer_id),
        }
        Ok(item)
    }

    /// Commits a decision given as text. Unknown values are rejected with
    /// `InvalidDecision` before anything is read or written.
    pub fn commit(
        &self,
        page_id: &str,
        reviewer_id: &str,
        decision: &str,
    ) -> Result<CommitReceipt, ReviewError> {
        let decision: Decision = decision.parse()?;
        self.commit_decision(page_id, reviewer_id, decision)
    }

    pub fn commit_decision(
        &self,
        page_id: &str,
        reviewer_id: &str,
        decision: Decision,
    ) -> Result<CommitReceipt, ReviewError> {
        let now = self.now();
        let decisions = &self.decisions;
        let result = self
            .db
            .with_tx(|tx| decisions.commit(tx, page_id, reviewer_id, decision, now));
        if let Err(e) = &result {
            log::warn!(
                "Commit of page {} by {} rejected: {}",
                page_id,
                reviewer_id,
                e
            );
        }
        result
    }

    /// Gives a page back before its lease runs out.
    pub fn release(&self, page_id: &str, reviewer_id: &str) -> Result<(), ReviewError> {
        self.db.with_tx(|tx| {
            if page_repo::find_by_id(tx, page_id)?.is_none() {
                return Err(ReviewError::PageNotFound(page_id.to_string()));
            }
            if !self.locks.release(tx, page_id, reviewer_id)? {
                return Err(ReviewError::NotLockHolder {
                    page_id: page_id.to_string(),
                    reviewer: reviewer_id.to_string(),
                });
            }
            log::debug!("{} released page {}", reviewer_id, page_id);
            Ok(())
        })
    }

    pub fn page(&self, page_id: &str) -> Result<Option<Page>, ReviewError> {
        let row = self
            .db
            .with_conn(|conn| page_repo::find_by_id(conn, page_id))?;
        Ok(row.map(Page::try_from).transpose()?)
    }

    pub fn document_box(&self, box_id: &str) -> Result<Option<DocumentBox>, ReviewError> {
        let row = self
            .db
            .with_conn(|conn| box_repo::find_by_id(conn, box_id))?;
        Ok(row.map(DocumentBox::try_from).transpose()?)
    }

    // ─── Boxes, audit and ingestion ─────────────────────────────────────────

    pub fn list_boxes(
        &self,
        tenant_id: &str,
        filter: BoxFilter,
    ) -> Result<Vec<BoxSummary>, ReviewError> {
        progress::list_boxes(&self.db, tenant_id, filter)
    }

    pub fn progress(&self, tenant_id: &str) -> Result<ProgressReport, ReviewError> {
        progress::progress_report(&self.db, tenant_id)
    }

    pub fn history(
        &self,
        reviewer_id: &str,
        limit: u64,
        cursor: Option<u64>,
    ) -> Result<ReviewHistory, ReviewError> {
        audit::reviewer_history(&self.db, reviewer_id, limit, cursor)
    }

    pub fn recount_box(&self, box_id: &str) -> Result<DocumentBox, ReviewError> {
        audit::recount_box(&self.db, box_id, self.now())
    }

    pub fn ingest(&self, manifest: &BatchManifest) -> Result<IngestReport, ReviewError> {
        ingest::ingest_batch(&self.db, manifest, self.now())
    }

    /// Signed image URL for a page, after the tenant group check.
    pub fn page_image_url(
        &self,
        signer: &dyn ImageUrlSigner,
        page_id: &str,
        groups: &[String],
    ) -> Result<String, ReviewError> {
        let page = self
            .page(page_id)?
            .ok_or_else(|| ReviewError::PageNotFound(page_id.to_string()))?;
        access::page_image_url(signer, &page, groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn service() -> ReviewService {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute_batch(
                "INSERT INTO boxes (id, box_number, tenant_id, total_pages, created_at, updated_at)
                 VALUES ('box-1', '001', 'acme', 1, '2026-01-01', '2026-01-01');
                 INSERT INTO pages (id, batch_id, box_id, tenant_id, page_number, filename,
                                    image_key)
                 VALUES ('p1', 'b001', 'box-1', 'acme', 1, 'b001.pdf',
                         'acme/001/b001/page_0001.png');",
            )?;
            Ok(())
        })
        .unwrap();
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        ReviewService::with_clock(db, &QueueConfig::default(), clock)
    }

    #[test]
    fn test_invalid_decision_writes_nothing() {
        let svc = service();
        svc.next("alice").unwrap().unwrap();

        let err = svc.commit("p1", "alice", "burn").unwrap_err();
        assert!(matches!(err, ReviewError::InvalidDecision(ref d) if d == "burn"));

        let page = svc.page("p1").unwrap().unwrap();
        assert!(page.is_pending());
        assert_eq!(page.lock.unwrap().holder, "alice");
        let reviewed = svc.document_box("box-1").unwrap().unwrap().pages_reviewed;
        assert_eq!(reviewed, 0);
    }

    #[test]
    fn test_release_requires_holder() {
        let svc = service();
        svc.next("alice").unwrap().unwrap();

        assert!(matches!(
            svc.release("p1", "bob"),
            Err(ReviewError::NotLockHolder { .. })
        ));
        assert!(matches!(
            svc.release("missing", "alice"),
            Err(ReviewError::PageNotFound(_))
        ));

        svc.release("p1", "alice").unwrap();
        assert!(svc.page("p1").unwrap().unwrap().lock.is_none());
        assert_eq!(svc.next("bob").unwrap().unwrap().page.id, "p1");
    }
}
