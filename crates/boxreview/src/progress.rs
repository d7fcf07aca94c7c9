//! Read-side views over box roll-ups: filtered box lists and the tenant
//! progress report.

use serde::{Deserialize, Serialize};

use crate::db::{box_repo, Database};
use crate::error::ReviewError;
use crate::review::{percent, BoxStatus, DocumentBox, Recommendation};

/// Which boxes to list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxFilter {
    #[default]
    All,
    Pending,
    InProgress,
    Complete,
    /// Complete boxes recommended for shredding.
    Shred,
    /// Complete boxes that contain at least one retain page.
    Retain,
}

impl BoxFilter {
    pub fn matches(&self, doc_box: &DocumentBox) -> bool {
        match self {
            BoxFilter::All => true,
            BoxFilter::Pending => doc_box.status == BoxStatus::Pending,
            BoxFilter::InProgress => doc_box.status == BoxStatus::InProgress,
            BoxFilter::Complete => doc_box.status == BoxStatus::Complete,
            BoxFilter::Shred => doc_box.recommendation() == Some(Recommendation::Shred),
            BoxFilter::Retain => doc_box.recommendation() == Some(Recommendation::Retain),
        }
    }
}

/// A box with its derived display fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxSummary {
    #[serde(flatten)]
    pub doc_box: DocumentBox,
    pub percent_complete: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<Recommendation>,
}

impl From<DocumentBox> for BoxSummary {
    fn from(doc_box: DocumentBox) -> Self {
        Self {
            percent_complete: doc_box.percent_complete(),
            recommendation: doc_box.recommendation(),
            doc_box,
        }
    }
}

/// Decision totals across boxes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReviewBreakdown {
    pub shred: u64,
    pub unsure: u64,
    pub retain: u64,
}

/// Box counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxesSummary {
    pub total: u64,
    pub complete: u64,
    pub in_progress: u64,
    pub pending: u64,
}

/// Tenant-wide review progress.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    pub total_pages: u64,
    pub pages_reviewed: u64,
    pub pages_remaining: u64,
    pub percent_complete: u32,
    pub breakdown: ReviewBreakdown,
    pub boxes_summary: BoxesSummary,
    pub boxes: Vec<BoxSummary>,
}

/// Lists a tenant's boxes ordered by box number.
pub fn list_boxes(
    db: &Database,
    tenant_id: &str,
    filter: BoxFilter,
) -> Result<Vec<BoxSummary>, ReviewError> {
    let rows = db.with_conn(|conn| box_repo::list_by_tenant(conn, tenant_id))?;
    let mut boxes = Vec::with_capacity(rows.len());
    for row in rows {
        let doc_box = DocumentBox::try_from(row)?;
        if filter.matches(&doc_box) {
            boxes.push(BoxSummary::from(doc_box));
        }
    }
    Ok(boxes)
}

/// Builds the progress report for a tenant.
pub fn progress_report(db: &Database, tenant_id: &str) -> Result<ProgressReport, ReviewError> {
    let boxes = list_boxes(db, tenant_id, BoxFilter::All)?;

    let mut report = ProgressReport {
        total_pages: 0,
        pages_reviewed: 0,
        pages_remaining: 0,
        percent_complete: 0,
        breakdown: ReviewBreakdown::default(),
        boxes_summary: BoxesSummary::default(),
        boxes: Vec::new(),
    };

    for summary in &boxes {
        let b = &summary.doc_box;
        report.total_pages += u64::from(b.total_pages);
        report.pages_reviewed += u64::from(b.pages_reviewed);
        report.breakdown.shred += u64::from(b.pages_shred);
        report.breakdown.unsure += u64::from(b.pages_unsure);
        report.breakdown.retain += u64::from(b.pages_retain);

        report.boxes_summary.total += 1;
        match b.status {
            BoxStatus::Pending => report.boxes_summary.pending += 1,
            BoxStatus::InProgress => report.boxes_summary.in_progress += 1,
            BoxStatus::Complete => report.boxes_summary.complete += 1,
        }
    }

    report.pages_remaining = report.total_pages.saturating_sub(report.pages_reviewed);
    report.percent_complete = percent(report.pages_reviewed, report.total_pages);
    report.boxes = boxes;
    Ok(report)
}
