//! Page repository: review state and lock fields of the `pages` table.
//!
//! The lock columns are only ever written through the conditional updates
//! below, so a writer that lost a race sees `false` instead of silently
//! overwriting the winner.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::DatabaseError;

/// A raw page row from the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRow {
    pub id: String,
    pub batch_id: String,
    pub box_id: String,
    pub tenant_id: String,
    pub page_number: i64,
    pub filename: String,
    pub image_key: String,
    pub review_status: String,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<String>,
    pub locked_by: Option<String>,
    pub locked_at: Option<String>,
}

impl PageRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            batch_id: row.get("batch_id")?,
            box_id: row.get("box_id")?,
            tenant_id: row.get("tenant_id")?,
            page_number: row.get("page_number")?,
            filename: row.get("filename")?,
            image_key: row.get("image_key")?,
            review_status: row.get("review_status")?,
            reviewed_by: row.get("reviewed_by")?,
            reviewed_at: row.get("reviewed_at")?,
            locked_by: row.get("locked_by")?,
            locked_at: row.get("locked_at")?,
        })
    }
}

/// Position in the queue order, used for keyset pagination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueCursor {
    pub batch_id: String,
    pub page_number: i64,
}

impl From<&PageRow> for QueueCursor {
    fn from(row: &PageRow) -> Self {
        Self {
            batch_id: row.batch_id.clone(),
            page_number: row.page_number,
        }
    }
}

/// Inserts a new page row.
pub fn insert(conn: &Connection, page: &PageRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO pages (id, batch_id, box_id, tenant_id, page_number, filename, image_key,
         review_status, reviewed_by, reviewed_at, locked_by, locked_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            page.id,
            page.batch_id,
            page.box_id,
            page.tenant_id,
            page.page_number,
            page.filename,
            page.image_key,
            page.review_status,
            page.reviewed_by,
            page.reviewed_at,
            page.locked_by,
            page.locked_at,
        ],
    )?;
    Ok(())
}

/// Finds a page by its ID.
pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<PageRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM pages WHERE id = ?1",
            params![id],
            PageRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Returns up to `limit` pending pages strictly after `after` in
/// `(batch_id, page_number)` order, optionally restricted to one tenant.
pub fn pending_after(
    conn: &Connection,
    tenant_id: Option<&str>,
    after: Option<&QueueCursor>,
    limit: u32,
) -> Result<Vec<PageRow>, DatabaseError> {
    let mut conditions = vec!["review_status = 'pending'".to_string()];
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(tenant_id) = tenant_id {
        conditions.push(format!("tenant_id = ?{}", param_values.len() + 1));
        param_values.push(Box::new(tenant_id.to_string()));
    }
    if let Some(cursor) = after {
        let batch = param_values.len() + 1;
        let number = param_values.len() + 2;
        conditions.push(format!(
            "(batch_id > ?{batch} OR (batch_id = ?{batch} AND page_number > ?{number}))"
        ));
        param_values.push(Box::new(cursor.batch_id.clone()));
        param_values.push(Box::new(cursor.page_number));
    }
    param_values.push(Box::new(limit));

    let sql = format!(
        "SELECT * FROM pages WHERE {} ORDER BY batch_id ASC, page_number ASC LIMIT ?{}",
        conditions.join(" AND "),
        param_values.len()
    );

    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_ref.as_slice(), PageRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Sets the lock on a pending page if it is free, already held by
/// `reviewer_id`, or was acquired at or before `expired_before`.
///
/// Returns whether the lock was taken.
pub fn try_lock(
    conn: &Connection,
    id: &str,
    reviewer_id: &str,
    locked_at: &str,
    expired_before: &str,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE pages SET locked_by = ?2, locked_at = ?3
         WHERE id = ?1 AND review_status = 'pending'
           AND (locked_by IS NULL OR locked_by = ?2 OR locked_at <= ?4)",
        params![id, reviewer_id, locked_at, expired_before],
    )?;
    Ok(changed == 1)
}

/// Clears the lock on a page, but only if `holder` holds it.
pub fn release_lock(conn: &Connection, id: &str, holder: &str) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE pages SET locked_by = NULL, locked_at = NULL
         WHERE id = ?1 AND locked_by = ?2",
        params![id, holder],
    )?;
    Ok(changed == 1)
}

/// Clears every lock `holder` has on pending pages other than `keep_id`.
pub fn release_other_locks(
    conn: &Connection,
    holder: &str,
    keep_id: &str,
) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE pages SET locked_by = NULL, locked_at = NULL
         WHERE locked_by = ?1 AND id != ?2 AND review_status = 'pending'",
        params![holder, keep_id],
    )?;
    Ok(changed)
}

/// Moves a pending page to its terminal status and clears its lock in the
/// same statement.
///
/// Returns `false` if the page does not exist or was already reviewed.
pub fn mark_reviewed(
    conn: &Connection,
    id: &str,
    status: &str,
    reviewer_id: &str,
    reviewed_at: &str,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE pages SET review_status = ?2, reviewed_by = ?3, reviewed_at = ?4,
         locked_by = NULL, locked_at = NULL
         WHERE id = ?1 AND review_status = 'pending'",
        params![id, status, reviewer_id, reviewed_at],
    )?;
    Ok(changed == 1)
}

/// Lists the pages currently locked by `holder`.
pub fn find_locked_by(conn: &Connection, holder: &str) -> Result<Vec<PageRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM pages WHERE locked_by = ?1
         ORDER BY batch_id, page_number",
    )?;
    let rows = stmt
        .query_map(params![holder], PageRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Lists the pages of a box in queue order.
pub fn list_by_box(conn: &Connection, box_id: &str) -> Result<Vec<PageRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM pages WHERE box_id = ?1
         ORDER BY batch_id, page_number",
    )?;
    let rows = stmt
        .query_map(params![box_id], PageRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Counts the pages already ingested for a batch.
pub fn count_by_batch(conn: &Connection, batch_id: &str) -> Result<u64, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pages WHERE batch_id = ?1",
        params![batch_id],
        |r| r.get(0),
    )?;
    Ok(count as u64)
}
