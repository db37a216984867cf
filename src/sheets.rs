use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::config::Config;
use crate::dedup::KnownKeys;
use crate::errors::PersistenceError;
use crate::models::NormalizedJob;
use crate::tracker::{identity_from_row, to_row, Tracker, COLUMNS};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
pub const SHEET_NAME: &str = "Internships";

#[derive(Debug, Deserialize)]
struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<Sheet>,
}

#[derive(Debug, Deserialize)]
struct Sheet {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Tracker backed by a Google Sheet, one row per posting.
pub struct SheetsTracker {
    client: reqwest::blocking::Client,
    spreadsheet_id: String,
    token: String,
}

impl SheetsTracker {
    pub fn new(client: reqwest::blocking::Client, spreadsheet_id: &str, token: &str) -> Self {
        Self {
            client,
            spreadsheet_id: spreadsheet_id.to_string(),
            token: token.to_string(),
        }
    }

    pub fn from_config(config: &Config, client: reqwest::blocking::Client) -> Result<Self, PersistenceError> {
        let spreadsheet_id = config.spreadsheet_id.as_deref().ok_or_else(|| {
            PersistenceError::NotConfigured("GOOGLE_SHEETS_SPREADSHEET_ID is not set".to_string())
        })?;
        let token = config.google_access_token.as_deref().ok_or_else(|| {
            PersistenceError::NotConfigured("GOOGLE_ACCESS_TOKEN is not set".to_string())
        })?;
        Ok(Self::new(client, spreadsheet_id, token))
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/{}{}", SHEETS_API, self.spreadsheet_id, suffix)
    }

    /// Create the tracker sheet with its header row if it is missing.
    pub fn ensure_sheet(&self) -> Result<(), PersistenceError> {
        let response = self
            .client
            .get(self.url(""))
            .query(&[("fields", "sheets.properties.title")])
            .bearer_auth(&self.token)
            .send()?;
        let spreadsheet: Spreadsheet = check(response)?.json()?;
        if has_sheet(&spreadsheet, SHEET_NAME) {
            return Ok(());
        }

        info!(sheet = SHEET_NAME, "Creating tracker sheet");
        let body = json!({
            "requests": [{ "addSheet": { "properties": { "title": SHEET_NAME } } }]
        });
        let response = self
            .client
            .post(self.url(":batchUpdate"))
            .bearer_auth(&self.token)
            .json(&body)
            .send()?;
        check(response)?;

        let header: Vec<String> = COLUMNS.iter().map(|c| c.to_string()).collect();
        self.append_rows(&[header])
    }

    fn append_rows(&self, rows: &[Vec<String>]) -> Result<(), PersistenceError> {
        let response = self
            .client
            .post(self.url(&format!("/values/{}!A1:append", SHEET_NAME)))
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(&self.token)
            .json(&json!({ "values": rows }))
            .send()?;
        check(response)?;
        Ok(())
    }
}

impl Tracker for SheetsTracker {
    // A single values:append call writes the whole row or nothing.
    fn append(&self, job: &NormalizedJob) -> Result<(), PersistenceError> {
        self.append_rows(&[to_row(job)])
    }

    fn known_identity_keys(&self) -> Result<KnownKeys, PersistenceError> {
        let response = self
            .client
            .get(self.url(&format!("/values/{}!A2:K", SHEET_NAME)))
            .bearer_auth(&self.token)
            .send()?;
        let range: ValueRange = check(response)?.json()?;
        Ok(keys_from_rows(&range.values))
    }
}

fn check(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response, PersistenceError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().unwrap_or_default();
    Err(PersistenceError::Api { status, body })
}

fn has_sheet(spreadsheet: &Spreadsheet, title: &str) -> bool {
    spreadsheet.sheets.iter().any(|s| s.properties.title == title)
}

fn keys_from_rows(rows: &[Vec<String>]) -> KnownKeys {
    rows.iter().filter_map(|row| identity_from_row(row)).collect()
}
