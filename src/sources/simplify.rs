use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use super::{FetchParams, RawFields, RawPosting, SourceAdapter};
use crate::errors::SourceFetchError;
use crate::models::SourceTag;

/// One entry of the Simplify search API's `results` array.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimplifyPosting {
    pub company: Option<String>,
    pub title: Option<String>,
    // Simplify omits the field for remote roles.
    #[serde(default = "remote")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub deadline: Option<String>,
    pub url: Option<String>,
    pub source: Option<String>,
}

impl SimplifyPosting {
    pub fn fields(&self) -> RawFields<'_> {
        RawFields {
            company: self.company.as_deref(),
            role: self.title.as_deref(),
            location: self.location.as_deref(),
            deadline: self.deadline.as_deref(),
            apply_link: self.url.as_deref(),
            notes: self.source.as_deref(),
        }
    }
}

fn remote() -> Option<String> {
    Some("Remote".to_string())
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SimplifyPosting>,
}

pub struct SimplifyClient {
    client: reqwest::blocking::Client,
    base: String,
    api_key: Option<String>,
}

impl SimplifyClient {
    pub fn new(client: reqwest::blocking::Client, base: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            base: base.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

impl SourceAdapter for SimplifyClient {
    fn tag(&self) -> SourceTag {
        SourceTag::Simplify
    }

    fn fetch(&self, params: &FetchParams) -> Result<Vec<RawPosting>, SourceFetchError> {
        let url = format!("{}/v1/jobs/search", self.base);
        let mut request = self
            .client
            .get(&url)
            .query(&[("q", params.query.as_str()), ("type", "internship")]);
        if let Some(location) = &params.location {
            request = request.query(&[("location", location.as_str())]);
        }
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!(%url, query = %params.query, "Searching Simplify");
        let response = request.send()?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            return Err(SourceFetchError::Status { status, body });
        }

        let body = response.text()?;
        let postings = parse_results(&body)?;
        Ok(postings.into_iter().map(RawPosting::Simplify).collect())
    }
}

pub fn parse_results(body: &str) -> Result<Vec<SimplifyPosting>, SourceFetchError> {
    let response: SearchResponse = serde_json::from_str(body)?;
    Ok(response.results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_results_maps_fields() {
        let body = r#"{
            "results": [
                {
                    "company": "Acme",
                    "title": "SWE Intern",
                    "location": "New York, NY",
                    "deadline": "2025-02-01",
                    "url": "https://simplify.jobs/p/1",
                    "source": "greenhouse"
                }
            ]
        }"#;
        let postings = parse_results(body).unwrap();
        assert_eq!(postings.len(), 1);

        let fields = postings[0].fields();
        assert_eq!(fields.company, Some("Acme"));
        assert_eq!(fields.role, Some("SWE Intern"));
        assert_eq!(fields.location, Some("New York, NY"));
        assert_eq!(fields.deadline, Some("2025-02-01"));
        assert_eq!(fields.apply_link, Some("https://simplify.jobs/p/1"));
        assert_eq!(fields.notes, Some("greenhouse"));
    }

    #[test]
    fn test_missing_location_defaults_to_remote() {
        let body = r#"{"results": [{"company": "Acme", "url": "https://x.co/1"}]}"#;
        let postings = parse_results(body).unwrap();
        assert_eq!(postings[0].location.as_deref(), Some("Remote"));
        assert_eq!(postings[0].title, None);
        assert_eq!(postings[0].deadline, None);
    }

    #[test]
    fn test_null_location_stays_empty() {
        let body = r#"{"results": [{"company": "Acme", "location": null, "url": "https://x.co/1"}]}"#;
        let postings = parse_results(body).unwrap();
        assert_eq!(postings[0].location, None);
    }

    #[test]
    fn test_numeric_deadline_is_kept_as_text() {
        let body = r#"{"results": [{"url": "https://x.co/1", "deadline": 1735689600}]}"#;
        let postings = parse_results(body).unwrap();
        assert_eq!(postings[0].deadline.as_deref(), Some("1735689600"));
    }

    #[test]
    fn test_missing_results_is_empty() {
        assert!(parse_results("{}").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_body_is_an_error() {
        let err = parse_results("<html>rate limited</html>").unwrap_err();
        assert!(matches!(err, SourceFetchError::Json(_)));
    }
}
