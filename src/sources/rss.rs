use std::sync::LazyLock;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use tracing::debug;

use super::{FetchParams, RawFields, RawPosting, SourceAdapter};
use crate::errors::SourceFetchError;
use crate::models::SourceTag;

/// One RSS `<item>` or Atom `<entry>`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub author: Option<String>,
    pub summary: Option<String>,
}

impl FeedEntry {
    pub fn fields(&self) -> RawFields<'_> {
        // Feeds carry no location or deadline.
        RawFields {
            company: self.author.as_deref(),
            role: self.title.as_deref(),
            location: None,
            deadline: None,
            apply_link: self.link.as_deref(),
            notes: self.summary.as_deref(),
        }
    }
}

pub struct RssFeed {
    client: reqwest::blocking::Client,
    url: String,
}

impl RssFeed {
    pub fn new(client: reqwest::blocking::Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }
}

impl SourceAdapter for RssFeed {
    fn tag(&self) -> SourceTag {
        SourceTag::Rss(self.url.clone())
    }

    // Feeds are static; the search query does not apply.
    fn fetch(&self, _params: &FetchParams) -> Result<Vec<RawPosting>, SourceFetchError> {
        debug!(url = %self.url, "Fetching feed");
        let response = self.client.get(&self.url).send()?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            return Err(SourceFetchError::Status { status, body });
        }

        let xml = response.text()?;
        let entries = parse_feed(&xml)?;
        Ok(entries.into_iter().map(RawPosting::Feed).collect())
    }
}

fn is_entry(name: &[u8]) -> bool {
    name == b"item" || name == b"entry"
}

/// Parse RSS 2.0 or Atom into entries. Unknown elements are ignored.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>, SourceFetchError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut entries = Vec::new();
    let mut current: Option<OpenEntry> = None;
    let mut saw_root = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                saw_root = true;
                let name = e.local_name().as_ref().to_vec();
                if is_entry(&name) && current.is_none() {
                    current = Some(OpenEntry::new(stack.len() + 1));
                } else if let Some(open) = current.as_mut() {
                    if name == b"link" && stack.len() == open.depth {
                        absorb_link_href(&mut open.entry, &e)?;
                    }
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                saw_root = true;
                if let Some(open) = current.as_mut() {
                    if e.local_name().as_ref() == b"link" && stack.len() == open.depth {
                        absorb_link_href(&mut open.entry, &e)?;
                    }
                }
            }
            Event::Text(t) => {
                if let Some(open) = current.as_mut() {
                    let text = t.unescape()?;
                    open.absorb_text(&stack, &text);
                }
            }
            Event::CData(c) => {
                if let Some(open) = current.as_mut() {
                    let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                    open.absorb_text(&stack, &text);
                }
            }
            Event::End(e) => {
                stack.pop();
                let closes_entry = matches!(&current, Some(open) if stack.len() + 1 == open.depth)
                    && is_entry(e.local_name().as_ref());
                if closes_entry {
                    if let Some(open) = current.take() {
                        entries.push(open.finish());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(SourceFetchError::Malformed("document has no elements".to_string()));
    }
    Ok(entries)
}

// Atom links: prefer rel="alternate" (or no rel) over enclosures and self links.
fn absorb_link_href(entry: &mut FeedEntry, e: &BytesStart<'_>) -> Result<(), SourceFetchError> {
    let rel = match e.try_get_attribute("rel").map_err(quick_xml::Error::from)? {
        Some(attr) => Some(attr.unescape_value()?.into_owned()),
        None => None,
    };
    if !matches!(rel.as_deref(), None | Some("alternate")) {
        return Ok(());
    }
    if let Some(href) = e.try_get_attribute("href").map_err(quick_xml::Error::from)? {
        let href = href.unescape_value()?;
        if entry.link.is_none() && !href.trim().is_empty() {
            entry.link = Some(href.into_owned());
        }
    }
    Ok(())
}

/// An entry being parsed. `<link>` text is kept apart from `href` links so
/// the two never concatenate; an `href` link wins when both are present.
struct OpenEntry {
    entry: FeedEntry,
    depth: usize,
    link_text: Option<String>,
}

impl OpenEntry {
    fn new(depth: usize) -> Self {
        Self {
            entry: FeedEntry::default(),
            depth,
            link_text: None,
        }
    }

    fn absorb_text(&mut self, stack: &[Vec<u8>], text: &str) {
        let Some(element) = stack.last() else { return };
        let depth = self.depth;
        let entry = &mut self.entry;
        let target = if stack.len() == depth + 1 {
            match element.as_slice() {
                b"title" => &mut entry.title,
                b"link" => &mut self.link_text,
                b"author" | b"creator" => &mut entry.author,
                b"description" | b"summary" => &mut entry.summary,
                _ => return,
            }
        } else if stack.len() == depth + 2 && element == b"name" && stack[depth] == b"author" {
            &mut entry.author
        } else {
            return;
        };
        target.get_or_insert_with(String::new).push_str(text);
    }

    fn finish(self) -> FeedEntry {
        let mut entry = self.entry;
        if entry.link.is_none() {
            entry.link = self.link_text;
        }
        entry.finish()
    }
}

impl FeedEntry {
    fn finish(mut self) -> Self {
        for field in [&mut self.title, &mut self.link, &mut self.summary] {
            if field.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *field = None;
            }
        }
        self.author = self.author.as_deref().and_then(author_name);
        self
    }
}

static EMAIL_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\S+@\S+\s*\((?P<name>[^)]+)\)$").expect("author pattern is valid"));

/// RSS `<author>` is usually `email (Name)`; keep just the name.
fn author_name(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match EMAIL_NAME_RE.captures(raw) {
        Some(caps) => Some(caps["name"].trim().to_string()),
        None => Some(raw.to_string()),
    }
}
