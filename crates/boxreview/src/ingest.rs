//! Batch ingestion: registers the pages of a scanned PDF and grows the box
//! they belong to.
//!
//! Scans arrive as `box_<nnn>_<yyyymmdd>_<hhmmss>.pdf`. The file stem is
//! the batch id, which is why batch ids of one box sort by scan time.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::Serialize;

use crate::db::box_repo::{self, BoxRow};
use crate::db::page_repo::{self, PageRow};
use crate::db::{format_timestamp, Database};
use crate::error::ReviewError;
use crate::review::{BoxStatus, DocumentBox, ReviewStatus};

static RE_SCAN_FILENAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^box_(\d{3})_(\d{8})_(\d{6})\.pdf$").unwrap());

/// Identity of one scanned PDF, parsed from its filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFile {
    pub box_number: String,
    pub batch_id: String,
    pub scanned_at: NaiveDateTime,
}

/// Parses `box_007_20251110_173850.pdf` into box `007`, batch
/// `box_007_20251110_173850`.
pub fn parse_scan_filename(filename: &str) -> Result<ScanFile, ReviewError> {
    let caps = RE_SCAN_FILENAME.captures(filename).ok_or_else(|| {
        ReviewError::InvalidBatch(format!(
            "'{filename}' does not match box_NNN_YYYYMMDD_HHMMSS.pdf"
        ))
    })?;

    let stamp = format!("{}{}", &caps[2], &caps[3]);
    let scanned_at = NaiveDateTime::parse_from_str(&stamp, "%Y%m%d%H%M%S").map_err(|_| {
        ReviewError::InvalidBatch(format!("'{filename}' carries an invalid scan time"))
    })?;

    // Stem without the extension, lowercased so `.PDF` uploads share ids.
    let stem_len = filename.len() - ".pdf".len();
    Ok(ScanFile {
        box_number: caps[1].to_string(),
        batch_id: filename[..stem_len].to_ascii_lowercase(),
        scanned_at,
    })
}

/// Everything needed to register one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchManifest {
    pub tenant_id: String,
    pub box_number: String,
    pub batch_id: String,
    pub filename: String,
    pub page_count: u32,
}

impl BatchManifest {
    /// Builds a manifest from a scan filename.
    pub fn from_scan(
        tenant_id: &str,
        filename: &str,
        page_count: u32,
    ) -> Result<Self, ReviewError> {
        let scan = parse_scan_filename(filename)?;
        Ok(Self {
            tenant_id: tenant_id.to_string(),
            box_number: scan.box_number,
            batch_id: scan.batch_id,
            filename: filename.to_string(),
            page_count,
        })
    }
}

/// Outcome of [`ingest_batch`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub batch_id: String,
    pub box_created: bool,
    pub pages_created: u32,
    pub page_ids: Vec<String>,
    #[serde(rename = "box")]
    pub doc_box: DocumentBox,
}

/// Storage key of a page image.
pub fn image_key(tenant_id: &str, box_number: &str, batch_id: &str, page_number: u32) -> String {
    format!("{tenant_id}/{box_number}/{batch_id}/page_{page_number:04}.png")
}

/// Registers every page of a batch as `pending` and raises the box's
/// `total_pages`, creating the box on first sight.
///
/// Runs as one transaction. Rejects empty batches, batches already
/// ingested, and boxes that are already complete.
pub fn ingest_batch(
    db: &Database,
    manifest: &BatchManifest,
    now: DateTime<Utc>,
) -> Result<IngestReport, ReviewError> {
    if manifest.page_count == 0 {
        let reason = format!("batch {} has no pages", manifest.batch_id);
        return Err(ReviewError::InvalidBatch(reason));
    }
    if manifest.batch_id.trim().is_empty() || manifest.tenant_id.trim().is_empty() {
        let reason = "tenant and batch id must not be empty".to_string();
        return Err(ReviewError::InvalidBatch(reason));
    }

    let stamp = format_timestamp(now);

    let report = db.with_tx(|tx| {
        if page_repo::count_by_batch(tx, &manifest.batch_id)? > 0 {
            return Err(ReviewError::BatchExists(manifest.batch_id.clone()));
        }

        let (box_row, box_created) =
            match box_repo::find_by_number(tx, &manifest.tenant_id, &manifest.box_number)? {
                Some(existing) => (existing, false),
                None => {
                    let row = BoxRow {
                        id: uuid::Uuid::new_v4().to_string(),
                        box_number: manifest.box_number.clone(),
                        tenant_id: manifest.tenant_id.clone(),
                        total_pages: 0,
                        pages_reviewed: 0,
                        pages_shred: 0,
                        pages_unsure: 0,
                        pages_retain: 0,
                        status: BoxStatus::Pending.as_str().to_string(),
                        created_at: stamp.clone(),
                        updated_at: stamp.clone(),
                    };
                    box_repo::insert(tx, &row)?;
                    (row, true)
                }
            };

        if !box_repo::add_pages(tx, &box_row.id, i64::from(manifest.page_count), &stamp)? {
            return Err(ReviewError::BoxComplete(manifest.box_number.clone()));
        }

        let mut page_ids = Vec::with_capacity(manifest.page_count as usize);
        for page_number in 1..=manifest.page_count {
            let page = PageRow {
                id: uuid::Uuid::new_v4().to_string(),
                batch_id: manifest.batch_id.clone(),
                box_id: box_row.id.clone(),
                tenant_id: manifest.tenant_id.clone(),
                page_number: i64::from(page_number),
                filename: manifest.filename.clone(),
                image_key: image_key(
                    &manifest.tenant_id,
                    &manifest.box_number,
                    &manifest.batch_id,
                    page_number,
                ),
                review_status: ReviewStatus::Pending.as_str().to_string(),
                reviewed_by: None,
                reviewed_at: None,
                locked_by: None,
                locked_at: None,
            };
            page_repo::insert(tx, &page)?;
            page_ids.push(page.id);
        }

        let updated = box_repo::find_by_id(tx, &box_row.id)?
            .ok_or_else(|| ReviewError::BoxNotFound(box_row.id.clone()))?;

        Ok(IngestReport {
            batch_id: manifest.batch_id.clone(),
            box_created,
            pages_created: manifest.page_count,
            page_ids,
            doc_box: DocumentBox::try_from(updated)?,
        })
    })?;

    log::info!(
        "Ingested batch {} ({} pages) into box {} for tenant {}",
        report.batch_id,
        report.pages_created,
        report.doc_box.box_number,
        report.doc_box.tenant_id
    );

    Ok(report)
}
