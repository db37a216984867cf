use std::collections::BTreeMap;

use thiserror::Error;

use crate::models::{IdentityKey, SourceTag};
use crate::sources::RawPosting;

/// A source could not be fetched or its payload could not be read.
/// Recorded per source; never aborts sibling sources.
#[derive(Debug, Error)]
pub enum SourceFetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed feed: {0}")]
    Feed(#[from] quick_xml::Error),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// A raw posting that could not become a `NormalizedJob`. The item is dropped
/// from the batch and reported.
#[derive(Debug, Error)]
#[error("{tag}: {reason}")]
pub struct NormalizationError {
    pub tag: SourceTag,
    pub raw: RawPosting,
    pub reason: String,
}

/// The tracker refused or failed to store a record.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("sheets request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sheets API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("already tracked: {0}")]
    Duplicate(IdentityKey),

    #[error("tracker not configured: {0}")]
    NotConfigured(String),
}

/// Hard failures of an ingestion run. Everything else lands in the report.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("no sources configured")]
    NoSources,

    #[error("all {} sources failed", .0.len())]
    AllSourcesFailed(BTreeMap<SourceTag, SourceFetchError>),
}
