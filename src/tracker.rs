use crate::dedup::KnownKeys;
use crate::errors::PersistenceError;
use crate::models::{IdentityKey, NormalizedJob};

/// Tracker columns, in sheet order.
pub const COLUMNS: [&str; 11] = [
    "added_at",
    "company",
    "role",
    "location",
    "deadline", // ISO date/time or blank
    "apply_link",
    "source", // simplify, rss:<feed>, scraper:<name>
    "status",
    "resume_file",
    "cover_letter_file",
    "notes",
];

const COMPANY_COL: usize = 1;
const ROLE_COL: usize = 2;
const APPLY_LINK_COL: usize = 5;

/// The store that owns identity state. Each `append` writes one whole record
/// or nothing.
pub trait Tracker {
    fn append(&self, job: &NormalizedJob) -> Result<(), PersistenceError>;
    fn known_identity_keys(&self) -> Result<KnownKeys, PersistenceError>;
}

/// A fresh record as a row. Material file columns start empty.
pub fn to_row(job: &NormalizedJob) -> Vec<String> {
    vec![
        job.added_at.to_rfc3339(),
        job.company.clone(),
        job.role.clone(),
        job.location.clone(),
        job.deadline.map(|d| d.to_string()).unwrap_or_default(),
        job.apply_link.clone(),
        job.source.to_string(),
        job.status.to_string(),
        String::new(),
        String::new(),
        job.notes.clone(),
    ]
}

/// Rebuild the identity key of a stored row. Rows without an apply link were
/// not written by ingestion and are ignored.
pub fn identity_from_row(row: &[String]) -> Option<IdentityKey> {
    let cell = |i: usize| row.get(i).map(String::as_str).unwrap_or("");
    if cell(APPLY_LINK_COL).trim().is_empty() {
        return None;
    }
    Some(IdentityKey::new(cell(COMPANY_COL), cell(ROLE_COL), cell(APPLY_LINK_COL)))
}
