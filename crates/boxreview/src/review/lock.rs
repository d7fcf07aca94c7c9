//! Soft per-page leases.
//!
//! A lock is the `(locked_by, locked_at)` pair on the page row. There is no
//! renewal protocol: a lease is free again once `lease` has elapsed since it
//! was acquired, and expiry is evaluated fresh on every check.

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;

use super::Page;
use crate::db::{format_timestamp, page_repo, DatabaseError};

/// Default lease length in seconds.
pub const DEFAULT_LEASE_SECS: i64 = 300;

/// Grants, checks and releases page leases.
#[derive(Debug, Clone, Copy)]
pub struct LockManager {
    lease: Duration,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_LEASE_SECS))
    }
}

impl LockManager {
    pub fn new(lease: Duration) -> Self {
        Self { lease }
    }

    pub fn lease(&self) -> Duration {
        self.lease
    }

    /// True if the page is unlocked, locked by `requester_id`, or its lock
    /// is at least one lease old.
    pub fn is_available(&self, page: &Page, requester_id: &str, now: DateTime<Utc>) -> bool {
        match &page.lock {
            None => true,
            Some(lock) if lock.holder == requester_id => true,
            Some(lock) => now - lock.acquired_at >= self.lease,
        }
    }

    /// True if someone other than `requester_id` holds an unexpired lease.
    pub fn is_held_by_other(&self, page: &Page, requester_id: &str, now: DateTime<Utc>) -> bool {
        !self.is_available(page, requester_id, now)
    }

    /// When a lease acquired at `acquired_at` runs out.
    pub fn expires_at(&self, acquired_at: DateTime<Utc>) -> DateTime<Utc> {
        acquired_at + self.lease
    }

    /// Takes the lease on a pending page.
    ///
    /// The availability rule is re-checked by the store in the same write,
    /// so two reviewers racing for one page cannot both win. Returns whether
    /// the lease was taken.
    pub fn acquire(
        &self,
        conn: &Connection,
        page_id: &str,
        requester_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        page_repo::try_lock(
            conn,
            page_id,
            requester_id,
            &format_timestamp(now),
            &format_timestamp(now - self.lease),
        )
    }

    /// Drops the lease if `holder` holds it. Returns whether it was held.
    pub fn release(
        &self,
        conn: &Connection,
        page_id: &str,
        holder: &str,
    ) -> Result<bool, DatabaseError> {
        page_repo::release_lock(conn, page_id, holder)
    }

    /// Drops every lease `holder` has on pending pages except `keep_page_id`.
    pub fn release_others(
        &self,
        conn: &Connection,
        holder: &str,
        keep_page_id: &str,
    ) -> Result<usize, DatabaseError> {
        page_repo::release_other_locks(conn, holder, keep_page_id)
    }
}
