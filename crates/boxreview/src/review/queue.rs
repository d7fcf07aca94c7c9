//! Next-page selection.
//!
//! Pending pages are handed out in a single global order, batch id then
//! page number, skipping pages whose lease is held by someone else.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

use super::{DocumentBox, Lock, LockManager, Page};
use crate::db::box_repo;
use crate::db::page_repo::{self, QueueCursor};
use crate::error::ReviewError;

/// A page assigned to a reviewer, with a read-only snapshot of its box's
/// progress for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub page: Page,
    pub box_number: String,
    pub box_total_pages: u32,
    pub box_pages_reviewed: u32,
    pub lock_expires_at: DateTime<Utc>,
}

/// Picks and locks the next page for a reviewer.
#[derive(Debug, Clone, Copy)]
pub struct QueueSelector {
    locks: LockManager,
    scan_page_size: u32,
    release_prior_locks: bool,
}

impl QueueSelector {
    pub fn new(locks: LockManager, scan_page_size: u32, release_prior_locks: bool) -> Self {
        Self {
            locks,
            scan_page_size: scan_page_size.max(1),
            release_prior_locks,
        }
    }

    /// Returns the first available pending page in queue order, locked to
    /// `reviewer_id`, or `None` when nothing is left to hand out.
    ///
    /// Run inside a transaction: the lock and the release of the reviewer's
    /// other locks must land together.
    pub fn next(
        &self,
        conn: &Connection,
        reviewer_id: &str,
        tenant_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<QueueItem>, ReviewError> {
        let mut cursor: Option<QueueCursor> = None;

        loop {
            let candidates =
                page_repo::pending_after(conn, tenant_id, cursor.as_ref(), self.scan_page_size)?;
            let exhausted = (candidates.len() as u32) < self.scan_page_size;
            cursor = candidates.last().map(QueueCursor::from);

            for row in candidates {
                let page = Page::try_from(row)?;
                if !self.locks.is_available(&page, reviewer_id, now) {
                    continue;
                }
                if !self.locks.acquire(conn, &page.id, reviewer_id, now)? {
                    log::debug!(
                        "Page {} was taken before {} could lock it",
                        page.id,
                        reviewer_id
                    );
                    continue;
                }
                if self.release_prior_locks {
                    let released = self.locks.release_others(conn, reviewer_id, &page.id)?;
                    if released > 0 {
                        log::debug!(
                            "Released {} earlier lock(s) held by {}",
                            released,
                            reviewer_id
                        );
                    }
                }
                return self.assign(conn, page, reviewer_id, now).map(Some);
            }

            if exhausted {
                return Ok(None);
            }
        }
    }

    fn assign(
        &self,
        conn: &Connection,
        mut page: Page,
        reviewer_id: &str,
        now: DateTime<Utc>,
    ) -> Result<QueueItem, ReviewError> {
        let row = box_repo::find_by_id(conn, &page.box_id)?
            .ok_or_else(|| ReviewError::BoxNotFound(page.box_id.clone()))?;
        let doc_box = DocumentBox::try_from(row)?;

        page.lock = Some(Lock {
            holder: reviewer_id.to_string(),
            acquired_at: now,
        });

        Ok(QueueItem {
            page,
            box_number: doc_box.box_number,
            box_total_pages: doc_box.total_pages,
            box_pages_reviewed: doc_box.pages_reviewed,
            lock_expires_at: self.locks.expires_at(now),
        })
    }
}
