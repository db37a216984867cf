use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::{FetchParams, RawFields, RawPosting, SourceAdapter};
use crate::errors::SourceFetchError;
use crate::models::SourceTag;

const BASE_URL: &str = "https://www.amazon.jobs";
const SEARCH_URL: &str = "https://www.amazon.jobs/en/search";
const COMPANY: &str = "Amazon";

/// One `div.job-tile` card from the amazon.jobs search page.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedCard {
    pub company: String,
    pub title: Option<String>,
    pub location: Option<String>,
    pub link: Option<String>,
}

impl ScrapedCard {
    pub fn fields(&self) -> RawFields<'_> {
        RawFields {
            company: Some(self.company.as_str()),
            role: self.title.as_deref(),
            location: self.location.as_deref(),
            deadline: None,
            apply_link: self.link.as_deref(),
            notes: None,
        }
    }
}

pub struct AmazonScraper {
    client: reqwest::blocking::Client,
}

impl AmazonScraper {
    pub fn new(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

impl SourceAdapter for AmazonScraper {
    fn tag(&self) -> SourceTag {
        SourceTag::Scraper("amazon".to_string())
    }

    fn fetch(&self, params: &FetchParams) -> Result<Vec<RawPosting>, SourceFetchError> {
        let mut query = vec![
            ("base_query", params.query.as_str()),
            ("category[]", "software-development"),
            ("job_type", "Internship"),
        ];
        if let Some(location) = &params.location {
            query.push(("location", location.as_str()));
        }

        debug!(query = %params.query, "Scraping amazon.jobs");
        let response = self.client.get(SEARCH_URL).query(&query).send()?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            return Err(SourceFetchError::Status { status, body });
        }

        let html = response.text()?;
        let cards = parse_job_tiles(&html)?;
        Ok(cards.into_iter().map(RawPosting::Scraped).collect())
    }
}

fn selector(css: &str) -> Result<Selector, SourceFetchError> {
    Selector::parse(css).map_err(|e| SourceFetchError::Malformed(format!("bad selector {css}: {e}")))
}

fn text_of(card: &ElementRef<'_>, sel: &Selector) -> Option<String> {
    card.select(sel)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" ").trim().to_string())
        .filter(|text| !text.is_empty())
}

pub fn parse_job_tiles(html: &str) -> Result<Vec<ScrapedCard>, SourceFetchError> {
    let document = Html::parse_document(html);
    let tile = selector("div.job-tile")?;
    let title = selector("h3.job-title")?;
    let link = selector("a.job-link")?;
    let location = selector("p.location-and-id")?;

    let cards = document
        .select(&tile)
        .map(|card| ScrapedCard {
            company: COMPANY.to_string(),
            title: text_of(&card, &title),
            location: text_of(&card, &location).map(|l| strip_job_id(&l)),
            link: card
                .select(&link)
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(absolute_link),
        })
        .collect();

    Ok(cards)
}

fn absolute_link(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        None
    } else if href.starts_with("http://") || href.starts_with("https://") {
        Some(href.to_string())
    } else {
        Some(format!("{}/{}", BASE_URL, href.trim_start_matches('/')))
    }
}

static JOB_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*\|\s*job\s*id:?\s*\S+\s*$").expect("job id pattern is valid"));

/// "USA, WA, Seattle | Job ID: 2812345" -> "USA, WA, Seattle"
fn strip_job_id(raw: &str) -> String {
    JOB_ID_RE.replace(raw, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<html><body>
  <div class="job-tile">
    <h3 class="job-title">Software Dev Engineer Intern</h3>
    <p class="location-and-id">USA, WA, Seattle | Job ID: 2812345</p>
    <a class="job-link" href="/en/jobs/2812345/software-dev-engineer-intern">View</a>
  </div>
  <div class="job-tile">
    <h3 class="job-title">  Applied Scientist Intern </h3>
    <a class="job-link" href="https://www.amazon.jobs/en/jobs/99">View</a>
  </div>
  <div class="job-tile">
    <h3 class="job-title">Broken card</h3>
  </div>
</body></html>"#;

    #[test]
    fn test_parse_job_tiles() {
        let cards = parse_job_tiles(PAGE).unwrap();
        assert_eq!(cards.len(), 3);

        assert_eq!(cards[0].company, "Amazon");
        assert_eq!(cards[0].title.as_deref(), Some("Software Dev Engineer Intern"));
        assert_eq!(cards[0].location.as_deref(), Some("USA, WA, Seattle"));
        assert_eq!(
            cards[0].link.as_deref(),
            Some("https://www.amazon.jobs/en/jobs/2812345/software-dev-engineer-intern")
        );

        assert_eq!(cards[1].title.as_deref(), Some("Applied Scientist Intern"));
        assert_eq!(cards[1].location, None);
        assert_eq!(cards[1].link.as_deref(), Some("https://www.amazon.jobs/en/jobs/99"));

        // Missing link is left for the normalizer to reject.
        assert_eq!(cards[2].link, None);
    }

    #[test]
    fn test_page_without_tiles_is_empty() {
        let cards = parse_job_tiles("<html><body><p>No results</p></body></html>").unwrap();
        assert!(cards.is_empty());
    }

    #[test]
    fn test_strip_job_id() {
        assert_eq!(strip_job_id("USA, WA, Seattle | Job ID: 2812345"), "USA, WA, Seattle");
        assert_eq!(strip_job_id("Remote"), "Remote");
    }

    #[test]
    fn test_absolute_link() {
        assert_eq!(absolute_link(""), None);
        assert_eq!(
            absolute_link("en/jobs/1"),
            Some("https://www.amazon.jobs/en/jobs/1".to_string())
        );
        assert_eq!(
            absolute_link("https://example.com/a"),
            Some("https://example.com/a".to_string())
        );
    }
}
