//! Test harness for isolated test execution.
//!
//! The `TestHarness` struct owns a temporary directory with a file-backed
//! database, a manual clock, and a `ReviewService` wired to both, so
//! lease expiry can be driven without sleeping.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

use boxreview::db::page_repo;
use boxreview::{
    BatchManifest, Database, DocumentBox, IngestReport, ManualClock, Page, QueueConfig,
    ReviewService,
};

use super::builders::BatchBuilder;

/// Test harness providing an isolated store for integration tests.
pub struct TestHarness {
    /// Temporary directory holding the database file.
    temp_dir: TempDir,
    /// Path of the SQLite database within temp_dir.
    pub db_path: PathBuf,
    /// Clock shared by every service the harness hands out.
    pub clock: Arc<ManualClock>,
    pub service: ReviewService,
    queue_config: QueueConfig,
}

impl TestHarness {
    /// Create a new test harness with the default queue settings.
    pub fn new() -> Self {
        Self::with_queue_config(QueueConfig::default())
    }

    /// Create a new test harness with custom queue settings.
    pub fn with_queue_config(queue_config: QueueConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("data").join("boxreview.db");
        let db = Database::open(&db_path).expect("Failed to open database");
        let clock = Arc::new(ManualClock::new(Self::start_time()));
        let service = ReviewService::with_clock(db, &queue_config, clock.clone());

        Self {
            temp_dir,
            db_path,
            clock,
            service,
            queue_config,
        }
    }

    /// Fixed starting instant of the manual clock.
    pub fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    /// Get the base temp directory path.
    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// A service over a second, independent connection to the same file.
    pub fn second_connection(&self) -> ReviewService {
        let db = Database::open(&self.db_path).expect("Failed to reopen database");
        ReviewService::with_clock(db, &self.queue_config, self.clock.clone())
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    pub fn now(&self) -> DateTime<Utc> {
        use boxreview::Clock;
        self.clock.now()
    }

    /// Ingest a batch built with `BatchBuilder`.
    pub fn ingest(&self, batch: BatchBuilder) -> IngestReport {
        self.ingest_manifest(&batch.build())
    }

    pub fn ingest_manifest(&self, manifest: &BatchManifest) -> IngestReport {
        self.service
            .ingest(manifest)
            .expect("Failed to ingest batch")
    }

    /// Ingest `pages` pages for box `box_number` of tenant `acme`.
    pub fn ingest_simple(&self, box_number: &str, batch_id: &str, pages: u32) -> IngestReport {
        self.ingest(
            BatchBuilder::new(batch_id)
                .box_number(box_number)
                .pages(pages),
        )
    }

    /// Load a page, panicking if it does not exist.
    pub fn page(&self, page_id: &str) -> Page {
        self.service
            .page(page_id)
            .expect("Failed to load page")
            .expect("Page not found")
    }

    /// Load a box, panicking if it does not exist.
    pub fn document_box(&self, box_id: &str) -> DocumentBox {
        self.service
            .document_box(box_id)
            .expect("Failed to load box")
            .expect("Box not found")
    }

    /// ID of page `page_number` of `batch_id`.
    pub fn page_id(&self, batch_id: &str, page_number: u32) -> String {
        self.pages_of_batch(batch_id)
            .into_iter()
            .find(|p| p.page_number == page_number)
            .map(|p| p.id)
            .expect("Page not found in batch")
    }

    /// All pages of a batch, ordered by page number.
    pub fn pages_of_batch(&self, batch_id: &str) -> Vec<Page> {
        let rows = self
            .service
            .database()
            .with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT box_id FROM pages WHERE batch_id = ?1 LIMIT 1",
                )?;
                let box_id: String = stmt.query_row([batch_id], |r| r.get(0))?;
                page_repo::list_by_box(conn, &box_id)
            })
            .expect("Failed to list pages");
        let mut pages: Vec<Page> = rows
            .into_iter()
            .filter(|r| r.batch_id == batch_id)
            .map(|r| Page::try_from(r).expect("Invalid page row"))
            .collect();
        pages.sort_by_key(|p| p.page_number);
        pages
    }

    /// Check the box roll-up invariant for one box.
    pub fn assert_box_invariant(&self, box_id: &str) {
        let b = self.document_box(box_id);
        assert_eq!(
            b.pages_reviewed,
            b.pages_shred + b.pages_unsure + b.pages_retain,
            "reviewed count must equal the sum of decisions for box {}",
            b.box_number
        );
        assert_eq!(
            b.status,
            boxreview::BoxStatus::for_progress(b.pages_reviewed, b.total_pages),
            "status out of step with counters for box {}",
            b.box_number
        );
    }

    /// Write a config file into the temp directory.
    pub fn write_config(&self, filename: &str, json: &str) -> PathBuf {
        let path = self.temp_dir.path().join(filename);
        std::fs::write(&path, json).expect("Failed to write config file");
        path
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
