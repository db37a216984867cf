use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use std::ops::RangeInclusive;

use crate::errors::NormalizationError;
use crate::models::{Deadline, NormalizedJob, SourceTag, Status};
use crate::sources::RawPosting;

pub const UNKNOWN_COMPANY: &str = "Unknown";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%B %d, %Y", "%b %d, %Y", "%d %B %Y"];

// Anything outside this is a misread field, not a real deadline.
const PLAUSIBLE_YEARS: RangeInclusive<i32> = 2000..=2100;

/// Normalize one raw posting. The caller supplies the ingestion timestamp so a
/// whole run shares one `added_at`.
pub fn normalize_at(
    raw: &RawPosting,
    tag: &SourceTag,
    ingested_at: DateTime<Utc>,
) -> Result<NormalizedJob, NormalizationError> {
    let fields = raw.fields();

    let Some(apply_link) = fields.apply_link.map(str::trim).filter(|l| !l.is_empty()) else {
        return Err(NormalizationError {
            tag: tag.clone(),
            raw: raw.clone(),
            reason: "missing apply link".to_string(),
        });
    };

    let company = match clean(fields.company) {
        c if c.is_empty() => UNKNOWN_COMPANY.to_string(),
        c => c,
    };

    Ok(NormalizedJob {
        company,
        role: clean(fields.role),
        location: clean(fields.location),
        deadline: fields.deadline.and_then(parse_deadline),
        apply_link: apply_link.to_string(),
        source: tag.clone(),
        notes: clean(fields.notes),
        status: Status::New,
        added_at: ingested_at,
    })
}

fn clean(field: Option<&str>) -> String {
    field.map(str::trim).unwrap_or_default().to_string()
}

/// Recognise the deadline formats sources actually send. Anything else is
/// treated as no deadline rather than guessed at. Times without an offset are
/// taken as UTC.
pub fn parse_deadline(raw: &str) -> Option<Deadline> {
    parse_any(raw.trim()).filter(|deadline| PLAUSIBLE_YEARS.contains(&deadline.date().year()))
}

fn parse_any(raw: &str) -> Option<Deadline> {
    if raw.is_empty() {
        return None;
    }

    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(Deadline::At(at.with_timezone(&Utc)));
    }
    if let Ok(at) = DateTime::parse_from_rfc2822(raw) {
        return Some(Deadline::At(at.with_timezone(&Utc)));
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(at) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Deadline::At(at.and_utc()));
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(day) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(Deadline::On(day));
        }
    }

    // Unix epochs, as some APIs send them: 10 digits of seconds or 13 of millis
    if !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let at = match raw.len() {
        10 => DateTime::from_timestamp(raw.parse().ok()?, 0),
        13 => DateTime::from_timestamp_millis(raw.parse().ok()?),
        _ => None,
    };
    at.map(Deadline::At)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{FeedEntry, ScrapedCard, SimplifyPosting};

    fn normalize(raw: &RawPosting, tag: &SourceTag) -> Result<NormalizedJob, NormalizationError> {
        normalize_at(raw, tag, Utc::now())
    }

    fn feed(title: &str, link: Option<&str>, author: Option<&str>) -> RawPosting {
        RawPosting::Feed(FeedEntry {
            title: Some(title.to_string()),
            link: link.map(String::from),
            author: author.map(String::from),
            summary: None,
        })
    }

    fn simplify(company: Option<&str>, deadline: Option<&str>) -> RawPosting {
        RawPosting::Simplify(SimplifyPosting {
            company: company.map(String::from),
            title: Some("  SWE Intern ".to_string()),
            location: Some("Remote".to_string()),
            deadline: deadline.map(String::from),
            url: Some(" https://simplify.jobs/p/1 ".to_string()),
            source: Some("greenhouse".to_string()),
        })
    }

    #[test]
    fn test_rss_entry_normalizes() {
        let tag = SourceTag::Rss("https://feeds.example.com/interns".into());
        let raw = feed("SWE Intern", Some("https://x.co/1"), Some("Acme"));
        let job = normalize(&raw, &tag).unwrap();

        assert_eq!(job.company, "Acme");
        assert_eq!(job.role, "SWE Intern");
        assert_eq!(job.apply_link, "https://x.co/1");
        assert_eq!(job.source, tag);
        assert_eq!(job.status, Status::New);
        assert_eq!(job.location, "");
        assert_eq!(job.deadline, None);
    }

    #[test]
    fn test_missing_link_is_an_error() {
        let tag = SourceTag::Rss("https://feeds.example.com/interns".into());
        for link in [None, Some(""), Some("   ")] {
            let raw = feed("SWE Intern", link, Some("Acme"));
            let err = normalize(&raw, &tag).unwrap_err();
            assert_eq!(err.tag, tag);
            assert_eq!(err.raw, raw);
        }

        let card = RawPosting::Scraped(ScrapedCard {
            company: "Amazon".into(),
            title: Some("SDE Intern".into()),
            location: None,
            link: None,
        });
        assert!(normalize(&card, &SourceTag::Scraper("amazon".into())).is_err());
    }

    #[test]
    fn test_blank_company_becomes_unknown() {
        for company in [None, Some(""), Some("  ")] {
            let job = normalize(&simplify(company, None), &SourceTag::Simplify).unwrap();
            assert_eq!(job.company, "Unknown");
        }
    }

    #[test]
    fn test_fields_are_trimmed_not_recased() {
        let job = normalize(&simplify(Some(" ACME Corp "), None), &SourceTag::Simplify).unwrap();
        assert_eq!(job.company, "ACME Corp");
        assert_eq!(job.role, "SWE Intern");
        assert_eq!(job.apply_link, "https://simplify.jobs/p/1");
        assert_eq!(job.notes, "greenhouse");
    }

    #[test]
    fn test_deadline_parsed_or_absent() {
        let job = normalize(&simplify(Some("Acme"), Some("2025-02-01")), &SourceTag::Simplify).unwrap();
        assert_eq!(
            job.deadline,
            Some(Deadline::On(NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()))
        );

        let job = normalize(&simplify(Some("Acme"), Some("rolling")), &SourceTag::Simplify).unwrap();
        assert_eq!(job.deadline, None);
    }

    #[test]
    fn test_added_at_is_the_given_timestamp() {
        let at = DateTime::parse_from_rfc3339("2025-01-10T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let job = normalize_at(&simplify(Some("Acme"), None), &SourceTag::Simplify, at).unwrap();
        assert_eq!(job.added_at, at);
    }

    #[test]
    fn test_parse_deadline_formats() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        let noon = day.and_hms_opt(12, 0, 0).unwrap().and_utc();

        assert_eq!(parse_deadline("2025-03-15T12:00:00Z"), Some(Deadline::At(noon)));
        assert_eq!(parse_deadline("2025-03-15T14:00:00+02:00"), Some(Deadline::At(noon)));
        assert_eq!(parse_deadline("Sat, 15 Mar 2025 12:00:00 +0000"), Some(Deadline::At(noon)));
        assert_eq!(parse_deadline("2025-03-15 12:00:00"), Some(Deadline::At(noon)));
        assert_eq!(parse_deadline("2025-03-15T12:00"), Some(Deadline::At(noon)));

        assert_eq!(parse_deadline("2025-03-15"), Some(Deadline::On(day)));
        assert_eq!(parse_deadline("03/15/2025"), Some(Deadline::On(day)));
        assert_eq!(parse_deadline("March 15, 2025"), Some(Deadline::On(day)));
        assert_eq!(parse_deadline("Mar 15, 2025"), Some(Deadline::On(day)));
        assert_eq!(parse_deadline("15 March 2025"), Some(Deadline::On(day)));

        assert_eq!(parse_deadline("1742040000"), Some(Deadline::At(noon)));
        assert_eq!(parse_deadline("1742040000000"), Some(Deadline::At(noon)));
    }

    #[test]
    fn test_parse_deadline_rejects_implausible_epochs() {
        // 9, 11 and 16 digits are neither seconds nor millis
        assert_eq!(parse_deadline("174204000"), None);
        assert_eq!(parse_deadline("17420400000"), None);
        assert_eq!(parse_deadline("1742040000000000"), None);
        // 10 digits, but 1973
        assert_eq!(parse_deadline("0100000000"), None);
        // 13 digits, but 2286
        assert_eq!(parse_deadline("9999999999999"), None);
        assert_eq!(parse_deadline("03/15/1850"), None);
    }

    #[test]
    fn test_parse_deadline_rejects_garbage() {
        assert_eq!(parse_deadline(""), None);
        assert_eq!(parse_deadline("ASAP"), None);
        assert_eq!(parse_deadline("2025-13-45"), None);
        assert_eq!(parse_deadline("42"), None);
    }
}
