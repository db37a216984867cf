use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Application status of a tracked posting. Ingestion only ever creates `New`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    New,
    Interested,
    Applied,
    Interview,
    Offer,
    Rejected,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::New,
        Status::Interested,
        Status::Applied,
        Status::Interview,
        Status::Offer,
        Status::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::New => "new",
            Status::Interested => "interested",
            Status::Applied => "applied",
            Status::Interview => "interview",
            Status::Offer => "offer",
            Status::Rejected => "rejected",
        }
    }

    /// Whether a deadline still matters for a job in this state.
    pub fn is_open(&self) -> bool {
        matches!(self, Status::New | Status::Interested)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown status '{0}' (expected one of: new, interested, applied, interview, offer, rejected)")]
pub struct UnknownStatus(pub String);

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Which adapter a record came from. Renders as "simplify", "rss:<feed-url>",
/// "scraper:<name>".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceTag {
    Simplify,
    Rss(String),
    Scraper(String),
    Other(String),
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceTag::Simplify => f.write_str("simplify"),
            SourceTag::Rss(url) => write!(f, "rss:{}", url),
            SourceTag::Scraper(name) => write!(f, "scraper:{}", name),
            SourceTag::Other(raw) => f.write_str(raw),
        }
    }
}

impl From<&str> for SourceTag {
    fn from(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == "simplify" {
            SourceTag::Simplify
        } else if let Some(url) = raw.strip_prefix("rss:") {
            SourceTag::Rss(url.to_string())
        } else if let Some(name) = raw.strip_prefix("scraper:") {
            SourceTag::Scraper(name.to_string())
        } else {
            SourceTag::Other(raw.to_string())
        }
    }
}

impl Serialize for SourceTag {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SourceTag {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(SourceTag::from(raw.as_str()))
    }
}

/// An application deadline. Sources that only give a calendar day stay a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Deadline {
    At(DateTime<Utc>),
    On(NaiveDate),
}

impl Deadline {
    pub fn date(&self) -> NaiveDate {
        match self {
            Deadline::At(at) => at.date_naive(),
            Deadline::On(day) => *day,
        }
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deadline::At(at) => f.write_str(&at.to_rfc3339()),
            Deadline::On(day) => write!(f, "{}", day.format("%Y-%m-%d")),
        }
    }
}

/// Deterministic identity of a posting: company, role and apply link,
/// each trimmed and lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn new(company: &str, role: &str, apply_link: &str) -> Self {
        Self(format!(
            "{}|||{}|||{}",
            fold(company),
            fold(role),
            fold(apply_link)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for IdentityKey {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

fn fold(part: &str) -> String {
    part.trim().to_lowercase()
}

/// The canonical record every adapter's output is normalized into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedJob {
    pub company: String,
    pub role: String,
    pub location: String, // empty means unspecified
    pub deadline: Option<Deadline>,
    pub apply_link: String,
    pub source: SourceTag,
    pub notes: String,
    pub status: Status,
    pub added_at: DateTime<Utc>,
}

impl NormalizedJob {
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey::new(&self.company, &self.role, &self.apply_link)
    }
}

/// A job as stored in the local tracker, with the columns owned by the
/// tracking surface rather than by ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct TrackedJob {
    pub id: i64,
    pub job: NormalizedJob,
    pub resume_file: Option<String>,
    pub cover_letter_file: Option<String>,
    pub reminder_event: Option<String>,
    pub updated_at: String,
}
