use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::models::Deadline;

const CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3/calendars";

/// Handle to a created calendar event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventHandle {
    pub id: String,
    pub link: Option<String>,
}

pub trait Calendar {
    fn schedule(&self, title: &str, deadline: &Deadline, reference_url: Option<&str>) -> Result<EventHandle>;
}

/// Google Calendar event time fields. Timed deadlines get a one-hour slot,
/// date-only deadlines an all-day event.
fn event_times(deadline: &Deadline) -> (Value, Value) {
    match deadline {
        Deadline::At(at) => (
            json!({ "dateTime": at.to_rfc3339() }),
            json!({ "dateTime": (*at + Duration::hours(1)).to_rfc3339() }),
        ),
        Deadline::On(day) => {
            let next = day.succ_opt().unwrap_or(*day);
            (
                json!({ "date": day.format("%Y-%m-%d").to_string() }),
                json!({ "date": next.format("%Y-%m-%d").to_string() }),
            )
        }
    }
}

pub fn event_body(title: &str, deadline: &Deadline, reference_url: Option<&str>) -> Value {
    let (start, end) = event_times(deadline);
    json!({
        "summary": title,
        "start": start,
        "end": end,
        "description": reference_url.unwrap_or(""),
    })
}

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    id: String,
    #[serde(rename = "htmlLink")]
    html_link: Option<String>,
}

pub struct GoogleCalendar {
    client: reqwest::blocking::Client,
    calendar_id: String,
    token: String,
}

impl GoogleCalendar {
    pub fn new(client: reqwest::blocking::Client, calendar_id: &str, token: &str) -> Self {
        Self {
            client,
            calendar_id: calendar_id.to_string(),
            token: token.to_string(),
        }
    }

    fn events_url(&self) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(CALENDAR_API)?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Calendar API URL cannot be a base"))?
            .push(&self.calendar_id)
            .push("events");
        Ok(url)
    }
}

impl Calendar for GoogleCalendar {
    fn schedule(&self, title: &str, deadline: &Deadline, reference_url: Option<&str>) -> Result<EventHandle> {
        let response = self
            .client
            .post(self.events_url()?)
            .bearer_auth(&self.token)
            .json(&event_body(title, deadline, reference_url))
            .send()
            .context("Failed to send request to Google Calendar")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(anyhow!(
                "Google Calendar request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let event: CreatedEvent = response
            .json()
            .context("Failed to parse Google Calendar response")?;
        Ok(EventHandle {
            id: event.id,
            link: event.html_link,
        })
    }
}

/// Appends events to a local iCalendar file that any calendar app can import.
pub struct IcsCalendar {
    path: PathBuf,
}

const ICS_HEADER: &str = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//scout//deadlines//EN\r\n";
const ICS_FOOTER: &str = "END:VCALENDAR\r\n";

impl IcsCalendar {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl Calendar for IcsCalendar {
    fn schedule(&self, title: &str, deadline: &Deadline, reference_url: Option<&str>) -> Result<EventHandle> {
        let uid = format!("{:016x}@scout", rand::random::<u64>());
        let event = vevent(&uid, title, deadline, reference_url);

        let existing = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()));
            }
        };
        let body = match existing.rfind("END:VCALENDAR") {
            Some(idx) => existing[..idx].to_string(),
            None => ICS_HEADER.to_string(),
        };

        fs::write(&self.path, format!("{body}{event}{ICS_FOOTER}"))
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        Ok(EventHandle { id: uid, link: None })
    }
}

fn vevent(uid: &str, title: &str, deadline: &Deadline, reference_url: Option<&str>) -> String {
    let (start, end) = match deadline {
        Deadline::At(at) => (
            format!("DTSTART:{}", at.format("%Y%m%dT%H%M%SZ")),
            format!("DTEND:{}", (*at + Duration::hours(1)).format("%Y%m%dT%H%M%SZ")),
        ),
        Deadline::On(day) => (
            format!("DTSTART;VALUE=DATE:{}", day.format("%Y%m%d")),
            format!("DTEND;VALUE=DATE:{}", day.succ_opt().unwrap_or(*day).format("%Y%m%d")),
        ),
    };

    let mut lines = vec![
        "BEGIN:VEVENT".to_string(),
        format!("UID:{uid}"),
        format!("DTSTAMP:{}", Utc::now().format("%Y%m%dT%H%M%SZ")),
        start,
        end,
        format!("SUMMARY:{}", escape_ics(title)),
    ];
    if let Some(url) = reference_url {
        lines.push(format!("DESCRIPTION:{}", escape_ics(url)));
        lines.push(format!("URL:{url}"));
    }
    lines.push("END:VEVENT".to_string());

    lines.iter().map(|line| fold_line(line)).collect()
}

const ICS_LINE_OCTETS: usize = 75;

/// Fold a content line to 75 octets per physical line, continuing with a
/// leading space. Never splits a UTF-8 sequence.
fn fold_line(line: &str) -> String {
    let mut out = String::with_capacity(line.len() + 8);
    let mut width = 0;
    for ch in line.chars() {
        if width + ch.len_utf8() > ICS_LINE_OCTETS {
            out.push_str("\r\n ");
            width = 1;
        }
        out.push(ch);
        width += ch.len_utf8();
    }
    out.push_str("\r\n");
    out
}

fn escape_ics(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}
