pub mod amazon;
pub mod rss;
pub mod simplify;

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::warn;

use crate::config::Config;
use crate::errors::SourceFetchError;
use crate::models::SourceTag;

pub use amazon::{AmazonScraper, ScrapedCard};
pub use rss::{FeedEntry, RssFeed};
pub use simplify::{SimplifyClient, SimplifyPosting};

pub const DEFAULT_QUERY: &str = "software engineering intern";

/// What a run is looking for. Each adapter maps this onto its own query syntax.
#[derive(Debug, Clone)]
pub struct FetchParams {
    pub query: String,
    pub location: Option<String>,
}

impl Default for FetchParams {
    fn default() -> Self {
        Self {
            query: DEFAULT_QUERY.to_string(),
            location: None,
        }
    }
}

/// One external source of postings.
pub trait SourceAdapter: Send + Sync {
    fn tag(&self) -> SourceTag;
    fn fetch(&self, params: &FetchParams) -> Result<Vec<RawPosting>, SourceFetchError>;
}

/// A posting exactly as one adapter produced it, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPosting {
    Simplify(SimplifyPosting),
    Feed(FeedEntry),
    Scraped(ScrapedCard),
}

/// The subset of `NormalizedJob` fields a raw posting can supply. `None`
/// means the source did not provide the field at all.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct RawFields<'a> {
    pub company: Option<&'a str>,
    pub role: Option<&'a str>,
    pub location: Option<&'a str>,
    pub deadline: Option<&'a str>,
    pub apply_link: Option<&'a str>,
    pub notes: Option<&'a str>,
}

impl RawPosting {
    pub fn fields(&self) -> RawFields<'_> {
        match self {
            RawPosting::Simplify(posting) => posting.fields(),
            RawPosting::Feed(entry) => entry.fields(),
            RawPosting::Scraped(card) => card.fields(),
        }
    }
}

pub fn http_client(timeout: Duration) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("scout/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

/// Build every adapter the configuration enables, in a stable order.
pub fn configured(config: &Config) -> Result<Vec<Box<dyn SourceAdapter>>> {
    let client = http_client(config.http_timeout)?;
    let mut adapters: Vec<Box<dyn SourceAdapter>> = vec![Box::new(SimplifyClient::new(
        client.clone(),
        &config.simplify_base,
        config.simplify_api_key.clone(),
    ))];

    for url in &config.rss_feeds {
        adapters.push(Box::new(RssFeed::new(client.clone(), url)));
    }

    for name in &config.scrapers {
        match name.as_str() {
            "amazon" => adapters.push(Box::new(AmazonScraper::new(client.clone()))),
            other => warn!(scraper = other, "Unknown scraper, skipping"),
        }
    }

    Ok(adapters)
}

/// Keep only adapters whose tag starts with `prefix` (e.g. "rss", "scraper:amazon").
pub fn only(adapters: Vec<Box<dyn SourceAdapter>>, prefix: &str) -> Vec<Box<dyn SourceAdapter>> {
    adapters
        .into_iter()
        .filter(|adapter| adapter.tag().to_string().starts_with(prefix))
        .collect()
}
