//! Committing a reviewer's decision.
//!
//! The page transition, the audit entry and the box roll-up are written by
//! one call that must run inside a single transaction; if any step fails the
//! caller's transaction rolls all of them back.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

use super::{BoxStatus, Decision, DocumentBox, LockManager, Page};
use crate::db::review_repo::{self, ReviewRow};
use crate::db::{box_repo, format_timestamp, page_repo};
use crate::error::ReviewError;

/// What a successful commit changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitReceipt {
    pub page_id: String,
    pub decision: Decision,
    pub box_id: String,
    pub box_number: String,
    pub box_pages_reviewed: u32,
    pub box_total_pages: u32,
    pub box_status: BoxStatus,
}

/// Validates and applies decisions.
#[derive(Debug, Clone, Copy)]
pub struct DecisionProcessor {
    locks: LockManager,
}

impl DecisionProcessor {
    pub fn new(locks: LockManager) -> Self {
        Self { locks }
    }

    /// Records `decision` for a pending page.
    ///
    /// Fails without writing anything if the page is unknown, already
    /// reviewed, or leased by another reviewer whose lease is still live.
    pub fn commit(
        &self,
        conn: &Connection,
        page_id: &str,
        reviewer_id: &str,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> Result<CommitReceipt, ReviewError> {
        let row = page_repo::find_by_id(conn, page_id)?
            .ok_or_else(|| ReviewError::PageNotFound(page_id.to_string()))?;
        let page = Page::try_from(row)?;

        if let Some(previous) = page.status.decision() {
            return Err(ReviewError::AlreadyReviewed {
                page_id: page.id,
                status: previous.to_string(),
            });
        }
        if self.locks.is_held_by_other(&page, reviewer_id, now) {
            let holder = page.lock.map(|lock| lock.holder).unwrap_or_default();
            return Err(ReviewError::LockLost {
                page_id: page.id,
                holder,
            });
        }

        let reviewed_at = format_timestamp(now);
        let decision_str = decision.as_str();
        if !page_repo::mark_reviewed(conn, &page.id, decision_str, reviewer_id, &reviewed_at)? {
            return Err(transition_conflict(conn, &page.id)?);
        }

        let box_row = box_repo::find_by_id(conn, &page.box_id)?
            .ok_or_else(|| ReviewError::BoxNotFound(page.box_id.clone()))?;

        review_repo::insert(
            conn,
            &ReviewRow {
                id: uuid::Uuid::new_v4().to_string(),
                user_id: reviewer_id.to_string(),
                tenant_id: page.tenant_id.clone(),
                page_id: page.id.clone(),
                box_id: page.box_id.clone(),
                box_number: box_row.box_number.clone(),
                batch_id: page.batch_id.clone(),
                page_number: i64::from(page.page_number),
                decision: decision_str.to_string(),
                created_at: reviewed_at.clone(),
            },
        )?;

        box_repo::apply_decision(conn, &page.box_id, decision.counts(), &reviewed_at)?;
        let updated = box_repo::find_by_id(conn, &page.box_id)?
            .ok_or_else(|| ReviewError::BoxNotFound(page.box_id.clone()))?;
        let updated = DocumentBox::try_from(updated)?;

        log::info!(
            "{} marked page {} ({} #{}) as {}; box {} at {}/{}",
            reviewer_id,
            page.id,
            page.batch_id,
            page.page_number,
            decision,
            updated.box_number,
            updated.pages_reviewed,
            updated.total_pages
        );

        Ok(CommitReceipt {
            page_id: page.id,
            decision,
            box_id: updated.id,
            box_number: updated.box_number,
            box_pages_reviewed: updated.pages_reviewed,
            box_total_pages: updated.total_pages,
            box_status: updated.status,
        })
    }
}

/// Explains why a page could not leave `pending`, from its stored state.
fn transition_conflict(conn: &Connection, page_id: &str) -> Result<ReviewError, ReviewError> {
    let err = match page_repo::find_by_id(conn, page_id)? {
        Some(current) => ReviewError::AlreadyReviewed {
            page_id: page_id.to_string(),
            status: current.review_status,
        },
        None => ReviewError::PageNotFound(page_id.to_string()),
    };
    Ok(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute_batch(
                "INSERT INTO boxes (id, box_number, tenant_id, total_pages, created_at, updated_at)
                 VALUES ('box-1', '001', 'acme', 2, '2026-01-01', '2026-01-01');
                 INSERT INTO pages (id, batch_id, box_id, tenant_id, page_number, filename,
                                    image_key)
                 VALUES
                   ('p1', 'b001', 'box-1', 'acme', 1, 'b001.pdf', 'acme/001/b001/page_0001.png'),
                   ('p2', 'b001', 'box-1', 'acme', 2, 'b001.pdf', 'acme/001/b001/page_0002.png');",
            )?;
            Ok(())
        })
        .unwrap();
        db
    }

    fn commit(
        db: &Database,
        page_id: &str,
        reviewer: &str,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> Result<CommitReceipt, ReviewError> {
        let processor = DecisionProcessor::new(LockManager::default());
        db.with_tx(|tx| processor.commit(tx, page_id, reviewer, decision, now))
    }

    #[test]
    fn test_commit_writes_page_audit_and_box() {
        let db = seeded();
        let receipt = commit(&db, "p1", "alice", Decision::Shred, t0()).unwrap();
        assert_eq!(receipt.box_pages_reviewed, 1);
        assert_eq!(receipt.box_status, BoxStatus::InProgress);

        db.with_conn(|conn| {
            let page = page_repo::find_by_id(conn, "p1")?.unwrap();
            assert_eq!(page.review_status, "shred");
            assert_eq!(page.reviewed_by.as_deref(), Some("alice"));
            let audit = review_repo::find_by_page(conn, "p1")?.unwrap();
            assert_eq!(audit.user_id, "alice");
            assert_eq!(audit.box_number, "001");
            assert_eq!(audit.batch_id, "b001");
            assert_eq!(audit.page_number, 1);
            assert_eq!(audit.decision, "shred");
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_second_commit_is_rejected_and_not_counted() {
        let db = seeded();
        commit(&db, "p1", "alice", Decision::Shred, t0()).unwrap();
        let err = commit(&db, "p1", "bob", Decision::Retain, t0()).unwrap_err();
        assert!(matches!(
            err,
            ReviewError::AlreadyReviewed { ref status, .. } if status == "shred"
        ));

        let row = db
            .with_conn(|conn| box_repo::find_by_id(conn, "box-1"))
            .unwrap()
            .unwrap();
        assert_eq!(row.pages_reviewed, 1);
        assert_eq!(row.pages_retain, 0);
    }

    #[test]
    fn test_unknown_page() {
        let db = seeded();
        let err = commit(&db, "nope", "alice", Decision::Shred, t0()).unwrap_err();
        assert!(matches!(err, ReviewError::PageNotFound(id) if id == "nope"));
    }

    #[test]
    fn test_live_foreign_lock_blocks_commit() {
        let db = seeded();
        let locks = LockManager::default();
        db.with_conn(|conn| locks.acquire(conn, "p1", "alice", t0()))
            .unwrap();

        let later = t0() + Duration::minutes(1);
        let err = commit(&db, "p1", "bob", Decision::Shred, later).unwrap_err();
        assert!(matches!(err, ReviewError::LockLost { ref holder, .. } if holder == "alice"));

        // Nothing was written.
        let row = db
            .with_conn(|conn| page_repo::find_by_id(conn, "p1"))
            .unwrap()
            .unwrap();
        assert_eq!(row.review_status, "pending");
        assert_eq!(row.locked_by.as_deref(), Some("alice"));
    }

    #[test]
    fn test_expired_foreign_lock_allows_commit() {
        let db = seeded();
        let locks = LockManager::default();
        db.with_conn(|conn| locks.acquire(conn, "p1", "alice", t0()))
            .unwrap();

        let later = t0() + Duration::minutes(6);
        let receipt = commit(&db, "p1", "bob", Decision::Unsure, later).unwrap();
        assert_eq!(receipt.decision, Decision::Unsure);
    }

    #[test]
    fn test_last_page_completes_box() {
        let db = seeded();
        commit(&db, "p1", "alice", Decision::Shred, t0()).unwrap();
        let receipt = commit(&db, "p2", "bob", Decision::Retain, t0()).unwrap();
        assert_eq!(receipt.box_status, BoxStatus::Complete);
        assert_eq!(receipt.box_pages_reviewed, 2);
        assert_eq!(receipt.box_total_pages, 2);
    }

    #[test]
    fn test_transition_conflict_reports_stored_status() {
        let db = seeded();
        commit(&db, "p2", "alice", Decision::Retain, t0()).unwrap();

        db.with_conn(|conn| {
            let err = transition_conflict(conn, "p2").unwrap();
            assert!(matches!(
                err,
                ReviewError::AlreadyReviewed { ref status, .. } if status == "retain"
            ));
            let err = transition_conflict(conn, "gone").unwrap();
            assert!(matches!(err, ReviewError::PageNotFound(ref id) if id == "gone"));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_failed_audit_insert_rolls_back_whole_commit() {
        let db = seeded();
        let locks = LockManager::default();
        db.with_conn(|conn| {
            locks.acquire(conn, "p1", "alice", t0())?;
            // A stray audit row for p1 makes the UNIQUE(page_id) insert fail.
            conn.execute_batch(
                "INSERT INTO user_reviews (id, user_id, tenant_id, page_id, box_id, box_number,
                                           batch_id, page_number, decision, created_at)
                 VALUES ('stray', 'mallory', 'acme', 'p1', 'box-1', '001', 'b001', 1, 'retain',
                         '2026-01-01T00:00:00.000Z');",
            )?;
            Ok(())
        })
        .unwrap();

        let err = commit(&db, "p1", "alice", Decision::Shred, t0()).unwrap_err();
        assert!(matches!(err, ReviewError::StoreUnavailable(_)));

        db.with_conn(|conn| {
            let page = page_repo::find_by_id(conn, "p1")?.unwrap();
            assert_eq!(page.review_status, "pending");
            assert_eq!(page.locked_by.as_deref(), Some("alice"));
            assert!(page.reviewed_at.is_none());
            let b = box_repo::find_by_id(conn, "box-1")?.unwrap();
            assert_eq!(b.pages_reviewed, 0);
            assert_eq!(b.pages_shred, 0);
            assert_eq!(b.status, "pending");
            Ok(())
        })
        .unwrap();
    }
}
