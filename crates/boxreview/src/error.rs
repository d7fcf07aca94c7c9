use std::path::PathBuf;
use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum BoxReviewError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Review error: {0}")]
    Review(#[from] ReviewError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Errors surfaced by the review queue and decision operations.
#[derive(Error, Debug)]
pub enum ReviewError {
    /// Decision outside shred / unsure / retain. Nothing was written.
    #[error("Invalid decision '{0}': expected shred, unsure or retain")]
    InvalidDecision(String),

    #[error("Page not found: {0}")]
    PageNotFound(String),

    #[error("Box not found: {0}")]
    BoxNotFound(String),

    /// The page already left `pending`; the terminal status is unchanged.
    #[error("Page {page_id} was already reviewed as {status}")]
    AlreadyReviewed { page_id: String, status: String },

    /// Another reviewer holds an unexpired lease on the page.
    #[error("Page {page_id} is locked by {holder}")]
    LockLost { page_id: String, holder: String },

    #[error("Reviewer {reviewer} does not hold the lock on page {page_id}")]
    NotLockHolder { page_id: String, reviewer: String },

    #[error("Box {0} is complete and cannot take new pages")]
    BoxComplete(String),

    #[error("Batch {0} has already been ingested")]
    BatchExists(String),

    #[error("Invalid batch: {0}")]
    InvalidBatch(String),

    #[error("History page size must be at least 1")]
    InvalidLimit,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Failed to generate image URL: {0}")]
    ImageUrl(String),

    /// The store failed; the whole call may be retried.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] DatabaseError),
}

pub type Result<T> = std::result::Result<T, BoxReviewError>;
