//! Review domain: pages, boxes, decisions, and the engine that hands pages
//! to reviewers and rolls their decisions up into box totals.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::box_repo::{BoxRow, DecisionCounts};
use crate::db::page_repo::PageRow;
use crate::db::{parse_timestamp, DatabaseError};
use crate::error::ReviewError;

pub mod decision;
pub mod lock;
pub mod queue;
pub mod service;

pub use decision::{CommitReceipt, DecisionProcessor};
pub use lock::LockManager;
pub use queue::{QueueItem, QueueSelector};
pub use service::ReviewService;

// ─── Decision / status enums ────────────────────────────────────────────────

/// Terminal disposition of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Shred,
    Unsure,
    Retain,
}

impl Decision {
    pub const ALL: [Decision; 3] = [Decision::Shred, Decision::Unsure, Decision::Retain];

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Shred => "shred",
            Decision::Unsure => "unsure",
            Decision::Retain => "retain",
        }
    }

    /// Counter increments for rolling this decision into a box.
    pub(crate) fn counts(&self) -> DecisionCounts {
        match self {
            Decision::Shred => DecisionCounts {
                shred: 1,
                ..Default::default()
            },
            Decision::Unsure => DecisionCounts {
                unsure: 1,
                ..Default::default()
            },
            Decision::Retain => DecisionCounts {
                retain: 1,
                ..Default::default()
            },
        }
    }
}

impl FromStr for Decision {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shred" => Ok(Decision::Shred),
            "unsure" => Ok(Decision::Unsure),
            "retain" => Ok(Decision::Retain),
            other => Err(ReviewError::InvalidDecision(other.to_string())),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review status of a page. `Pending` is the only non-terminal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Shred,
    Unsure,
    Retain,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Shred => "shred",
            ReviewStatus::Unsure => "unsure",
            ReviewStatus::Retain => "retain",
        }
    }

    pub fn decision(&self) -> Option<Decision> {
        match self {
            ReviewStatus::Pending => None,
            ReviewStatus::Shred => Some(Decision::Shred),
            ReviewStatus::Unsure => Some(Decision::Unsure),
            ReviewStatus::Retain => Some(Decision::Retain),
        }
    }

    fn parse(value: &str) -> Result<Self, DatabaseError> {
        match value {
            "pending" => Ok(ReviewStatus::Pending),
            "shred" => Ok(ReviewStatus::Shred),
            "unsure" => Ok(ReviewStatus::Unsure),
            "retain" => Ok(ReviewStatus::Retain),
            other => Err(DatabaseError::InvalidValue {
                column: "review_status",
                value: other.to_string(),
            }),
        }
    }
}

impl From<Decision> for ReviewStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Shred => ReviewStatus::Shred,
            Decision::Unsure => ReviewStatus::Unsure,
            Decision::Retain => ReviewStatus::Retain,
        }
    }
}

/// Roll-up status of a box: pending → in_progress → complete, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxStatus {
    Pending,
    InProgress,
    Complete,
}

impl BoxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoxStatus::Pending => "pending",
            BoxStatus::InProgress => "in_progress",
            BoxStatus::Complete => "complete",
        }
    }

    /// The status a box with these counts must have.
    pub fn for_progress(pages_reviewed: u32, total_pages: u32) -> Self {
        if pages_reviewed == 0 {
            BoxStatus::Pending
        } else if pages_reviewed >= total_pages {
            BoxStatus::Complete
        } else {
            BoxStatus::InProgress
        }
    }

    fn parse(value: &str) -> Result<Self, DatabaseError> {
        match value {
            "pending" => Ok(BoxStatus::Pending),
            "in_progress" => Ok(BoxStatus::InProgress),
            "complete" => Ok(BoxStatus::Complete),
            other => Err(DatabaseError::InvalidValue {
                column: "status",
                value: other.to_string(),
            }),
        }
    }
}

/// Outcome suggested for a fully reviewed box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    /// Every page was marked shred.
    Shred,
    /// At least one page must be kept.
    Retain,
    /// No retain pages, but some were unsure.
    Review,
}

// ─── Page ───────────────────────────────────────────────────────────────────

/// A reviewer's lease on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lock {
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
}

/// One scanned page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    pub batch_id: String,
    pub box_id: String,
    pub tenant_id: String,
    /// 1-based, unique within the batch.
    pub page_number: u32,
    pub filename: String,
    pub image_key: String,
    pub status: ReviewStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock: Option<Lock>,
}

impl Page {
    pub fn is_pending(&self) -> bool {
        self.status == ReviewStatus::Pending
    }
}

impl TryFrom<PageRow> for Page {
    type Error = DatabaseError;

    fn try_from(row: PageRow) -> Result<Self, Self::Error> {
        let lock = match (row.locked_by, row.locked_at) {
            (Some(holder), Some(at)) => Some(Lock {
                holder,
                acquired_at: parse_timestamp("locked_at", &at)?,
            }),
            (None, None) => None,
            (holder, _) => {
                return Err(DatabaseError::InvalidValue {
                    column: "locked_by",
                    value: holder.unwrap_or_default(),
                });
            }
        };
        let reviewed_at = row
            .reviewed_at
            .as_deref()
            .map(|at| parse_timestamp("reviewed_at", at))
            .transpose()?;

        Ok(Self {
            page_number: to_count("page_number", row.page_number)?,
            status: ReviewStatus::parse(&row.review_status)?,
            id: row.id,
            batch_id: row.batch_id,
            box_id: row.box_id,
            tenant_id: row.tenant_id,
            filename: row.filename,
            image_key: row.image_key,
            reviewed_by: row.reviewed_by,
            reviewed_at,
            lock,
        })
    }
}

// ─── Box ────────────────────────────────────────────────────────────────────

/// A physical box and its roll-up counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentBox {
    pub id: String,
    pub box_number: String,
    pub tenant_id: String,
    pub total_pages: u32,
    pub pages_reviewed: u32,
    pub pages_shred: u32,
    pub pages_unsure: u32,
    pub pages_retain: u32,
    pub status: BoxStatus,
}

impl DocumentBox {
    /// `None` until every page of the box has been reviewed.
    pub fn recommendation(&self) -> Option<Recommendation> {
        if self.status != BoxStatus::Complete {
            return None;
        }
        if self.pages_retain > 0 {
            Some(Recommendation::Retain)
        } else if self.pages_unsure > 0 {
            Some(Recommendation::Review)
        } else {
            Some(Recommendation::Shred)
        }
    }

    /// Rounded percentage of reviewed pages; 0 for an empty box.
    pub fn percent_complete(&self) -> u32 {
        percent(self.pages_reviewed as u64, self.total_pages as u64)
    }
}

impl TryFrom<BoxRow> for DocumentBox {
    type Error = DatabaseError;

    fn try_from(row: BoxRow) -> Result<Self, Self::Error> {
        Ok(Self {
            total_pages: to_count("total_pages", row.total_pages)?,
            pages_reviewed: to_count("pages_reviewed", row.pages_reviewed)?,
            pages_shred: to_count("pages_shred", row.pages_shred)?,
            pages_unsure: to_count("pages_unsure", row.pages_unsure)?,
            pages_retain: to_count("pages_retain", row.pages_retain)?,
            status: BoxStatus::parse(&row.status)?,
            id: row.id,
            box_number: row.box_number,
            tenant_id: row.tenant_id,
        })
    }
}

pub(crate) fn percent(part: u64, whole: u64) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round() as u32
}

pub(crate) fn to_count(column: &'static str, value: i64) -> Result<u32, DatabaseError> {
    u32::try_from(value).map_err(|_| DatabaseError::InvalidValue {
        column,
        value: value.to_string(),
    })
}
