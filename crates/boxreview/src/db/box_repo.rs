//! Box repository: roll-up counters and status for the `boxes` table.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::DatabaseError;

/// A raw box row from the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxRow {
    pub id: String,
    pub box_number: String,
    pub tenant_id: String,
    pub total_pages: i64,
    pub pages_reviewed: i64,
    pub pages_shred: i64,
    pub pages_unsure: i64,
    pub pages_retain: i64,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl BoxRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            box_number: row.get("box_number")?,
            tenant_id: row.get("tenant_id")?,
            total_pages: row.get("total_pages")?,
            pages_reviewed: row.get("pages_reviewed")?,
            pages_shred: row.get("pages_shred")?,
            pages_unsure: row.get("pages_unsure")?,
            pages_retain: row.get("pages_retain")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Per-decision increments applied by [`apply_decision`].
///
/// Exactly one of the three is 1 for a committed decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecisionCounts {
    pub shred: i64,
    pub unsure: i64,
    pub retain: i64,
}

impl DecisionCounts {
    pub fn total(&self) -> i64 {
        self.shred + self.unsure + self.retain
    }
}

/// Inserts a new box row.
pub fn insert(conn: &Connection, row: &BoxRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO boxes (id, box_number, tenant_id, total_pages, pages_reviewed,
         pages_shred, pages_unsure, pages_retain, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            row.id,
            row.box_number,
            row.tenant_id,
            row.total_pages,
            row.pages_reviewed,
            row.pages_shred,
            row.pages_unsure,
            row.pages_retain,
            row.status,
            row.created_at,
            row.updated_at,
        ],
    )?;
    Ok(())
}

/// Finds a box by its ID.
pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<BoxRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM boxes WHERE id = ?1",
            params![id],
            BoxRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Finds a box by its human box number within a tenant.
pub fn find_by_number(
    conn: &Connection,
    tenant_id: &str,
    box_number: &str,
) -> Result<Option<BoxRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM boxes WHERE tenant_id = ?1 AND box_number = ?2",
            params![tenant_id, box_number],
            BoxRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Lists all boxes of a tenant ordered by box number.
pub fn list_by_tenant(conn: &Connection, tenant_id: &str) -> Result<Vec<BoxRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM boxes WHERE tenant_id = ?1
         ORDER BY box_number ASC",
    )?;
    let rows = stmt
        .query_map(params![tenant_id], BoxRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Raises `total_pages` by `count` for a box that is not yet complete.
///
/// Returns `false` when the box does not exist or is already complete.
pub fn add_pages(
    conn: &Connection,
    id: &str,
    count: i64,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE boxes SET total_pages = total_pages + ?2, updated_at = ?3
         WHERE id = ?1 AND status != 'complete'",
        params![id, count, updated_at],
    )?;
    Ok(changed == 1)
}

/// Rolls one committed decision into the box counters.
///
/// A single UPDATE: right-hand column references see the pre-update
/// values, so concurrent callers cannot lose increments and the status is
/// derived from the post-increment review count.
pub fn apply_decision(
    conn: &Connection,
    id: &str,
    delta: DecisionCounts,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE boxes SET
           pages_reviewed = pages_reviewed + 1,
           pages_shred = pages_shred + ?2,
           pages_unsure = pages_unsure + ?3,
           pages_retain = pages_retain + ?4,
           status = CASE WHEN pages_reviewed + 1 >= total_pages
                         THEN 'complete' ELSE 'in_progress' END,
           updated_at = ?5
         WHERE id = ?1",
        params![id, delta.shred, delta.unsure, delta.retain, updated_at],
    )?;
    Ok(changed == 1)
}

/// Overwrites the counters of a box with recomputed values.
///
/// Status is derived from `counts` the same way [`apply_decision`] derives
/// it, except that a box with nothing reviewed stays `pending`.
pub fn overwrite_counts(
    conn: &Connection,
    id: &str,
    counts: DecisionCounts,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE boxes SET
           pages_reviewed = ?2,
           pages_shred = ?3,
           pages_unsure = ?4,
           pages_retain = ?5,
           status = CASE WHEN ?2 = 0 THEN 'pending'
                         WHEN ?2 >= total_pages THEN 'complete'
                         ELSE 'in_progress' END,
           updated_at = ?6
         WHERE id = ?1",
        params![
            id,
            counts.total(),
            counts.shred,
            counts.unsure,
            counts.retain,
            updated_at,
        ],
    )?;
    Ok(changed == 1)
}
