//! Review audit repository: append-only `user_reviews` entries.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::box_repo::DecisionCounts;
use super::DatabaseError;

/// A raw audit row from the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRow {
    pub id: String,
    pub user_id: String,
    pub tenant_id: String,
    pub page_id: String,
    pub box_id: String,
    pub box_number: String,
    pub batch_id: String,
    pub page_number: i64,
    pub decision: String,
    pub created_at: String,
}

impl ReviewRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            tenant_id: row.get("tenant_id")?,
            page_id: row.get("page_id")?,
            box_id: row.get("box_id")?,
            box_number: row.get("box_number")?,
            batch_id: row.get("batch_id")?,
            page_number: row.get("page_number")?,
            decision: row.get("decision")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Appends an audit entry.
pub fn insert(conn: &Connection, row: &ReviewRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO user_reviews (id, user_id, tenant_id, page_id, box_id, box_number,
         batch_id, page_number, decision, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            row.id,
            row.user_id,
            row.tenant_id,
            row.page_id,
            row.box_id,
            row.box_number,
            row.batch_id,
            row.page_number,
            row.decision,
            row.created_at,
        ],
    )?;
    Ok(())
}

/// Finds the audit entry recorded for a page, if any.
pub fn find_by_page(conn: &Connection, page_id: &str) -> Result<Option<ReviewRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM user_reviews WHERE page_id = ?1",
            params![page_id],
            ReviewRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Lists a reviewer's entries newest first, returning (rows, total_count).
pub fn list_by_user(
    conn: &Connection,
    user_id: &str,
    limit: u64,
    offset: u64,
) -> Result<(Vec<ReviewRow>, u64), DatabaseError> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM user_reviews WHERE user_id = ?1",
        params![user_id],
        |r| r.get(0),
    )?;

    let mut stmt = conn.prepare(
        "SELECT * FROM user_reviews WHERE user_id = ?1
         ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3",
    )?;
    let rows = stmt
        .query_map(
            params![user_id, limit as i64, offset as i64],
            ReviewRow::from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    Ok((rows, total as u64))
}

/// Tallies the recorded decisions for a box.
pub fn decision_counts_for_box(
    conn: &Connection,
    box_id: &str,
) -> Result<DecisionCounts, DatabaseError> {
    let counts = conn.query_row(
        "SELECT
           COALESCE(SUM(decision = 'shred'), 0),
           COALESCE(SUM(decision = 'unsure'), 0),
           COALESCE(SUM(decision = 'retain'), 0)
         FROM user_reviews WHERE box_id = ?1",
        params![box_id],
        |r| {
            Ok(DecisionCounts {
                shred: r.get(0)?,
                unsure: r.get(1)?,
                retain: r.get(2)?,
            })
        },
    )?;
    Ok(counts)
}
