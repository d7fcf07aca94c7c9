//! Multi-tenant review queue for document-retention decisions.
//!
//! Reviewers pull scanned pages one at a time under a short lease, decide
//! shred / unsure / retain, and each decision is rolled up into the
//! counters of the physical box the page came from.

pub mod access;
pub mod audit;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod progress;
pub mod review;

pub use access::{check_image_access, ImageUrlSigner};
pub use audit::{AuditEntry, ReviewHistory};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{load_config, LogFormat, LoggingConfig, QueueConfig, ReviewConfig};
pub use db::{Database, DatabaseError};
pub use error::{BoxReviewError, ConfigError, Result, ReviewError};
pub use ingest::{parse_scan_filename, BatchManifest, IngestReport, ScanFile};
pub use progress::{BoxFilter, BoxSummary, ProgressReport};
pub use review::{
    BoxStatus, CommitReceipt, Decision, DocumentBox, Lock, Page, QueueItem, Recommendation,
    ReviewService, ReviewStatus,
};
