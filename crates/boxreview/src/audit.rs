//! The decision audit trail: reviewer history and audit-derived repair of
//! box counters.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::review_repo::{self, ReviewRow};
use crate::db::{box_repo, format_timestamp, parse_timestamp, Database, DatabaseError};
use crate::error::ReviewError;
use crate::review::{to_count, Decision, DocumentBox};

/// One immutable decision record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub reviewer_id: String,
    pub tenant_id: String,
    pub page_id: String,
    pub box_id: String,
    pub box_number: String,
    pub batch_id: String,
    pub page_number: u32,
    pub decision: Decision,
    pub reviewed_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for AuditEntry {
    type Error = DatabaseError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        let Ok(decision) = row.decision.parse::<Decision>() else {
            return Err(DatabaseError::InvalidValue {
                column: "decision",
                value: row.decision,
            });
        };

        Ok(Self {
            reviewed_at: parse_timestamp("created_at", &row.created_at)?,
            id: row.id,
            reviewer_id: row.user_id,
            tenant_id: row.tenant_id,
            page_id: row.page_id,
            box_id: row.box_id,
            box_number: row.box_number,
            batch_id: row.batch_id,
            page_number: to_count("page_number", row.page_number)?,
            decision,
        })
    }
}

/// A page of a reviewer's history, newest first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewHistory {
    pub reviews: Vec<AuditEntry>,
    pub total_count: u64,
    /// Pass back as `cursor` to fetch the following page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<u64>,
}

/// Returns up to `limit` of a reviewer's decisions starting at `cursor`.
///
/// `limit` must be positive; `next_cursor` is set whenever entries remain
/// past the returned page.
pub fn reviewer_history(
    db: &Database,
    reviewer_id: &str,
    limit: u64,
    cursor: Option<u64>,
) -> Result<ReviewHistory, ReviewError> {
    if limit == 0 {
        return Err(ReviewError::InvalidLimit);
    }
    let offset = cursor.unwrap_or(0);
    let (rows, total_count) =
        db.with_conn(|conn| review_repo::list_by_user(conn, reviewer_id, limit, offset))?;

    let reviews = rows
        .into_iter()
        .map(AuditEntry::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    let next = offset + reviews.len() as u64;
    let next_cursor = (next < total_count).then_some(next);

    Ok(ReviewHistory {
        reviews,
        total_count,
        next_cursor,
    })
}

/// Recomputes a box's counters from its audit entries and stores them.
///
/// Repairs counters that drifted from the audit trail, for example after
/// manual edits to the store.
pub fn recount_box(
    db: &Database,
    box_id: &str,
    now: DateTime<Utc>,
) -> Result<DocumentBox, ReviewError> {
    db.with_tx(|tx| {
        let before = box_repo::find_by_id(tx, box_id)?
            .ok_or_else(|| ReviewError::BoxNotFound(box_id.to_string()))?;
        let counts = review_repo::decision_counts_for_box(tx, box_id)?;

        if before.pages_reviewed != counts.total()
            || before.pages_shred != counts.shred
            || before.pages_unsure != counts.unsure
            || before.pages_retain != counts.retain
        {
            log::warn!(
                "Box {} counters drifted: stored {}/{}/{} reviewed {}, audit {}/{}/{} reviewed {}",
                before.box_number,
                before.pages_shred,
                before.pages_unsure,
                before.pages_retain,
                before.pages_reviewed,
                counts.shred,
                counts.unsure,
                counts.retain,
                counts.total()
            );
        }

        box_repo::overwrite_counts(tx, box_id, counts, &format_timestamp(now))?;
        let after = box_repo::find_by_id(tx, box_id)?
            .ok_or_else(|| ReviewError::BoxNotFound(box_id.to_string()))?;
        Ok(DocumentBox::try_from(after)?)
    })
}
