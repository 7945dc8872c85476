use anyhow::{Result, anyhow};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::retry::RetryPolicy;
use crate::store::repo::ApplicationStore;

const SHEETS_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

pub fn sheet_url(spreadsheet_id: &str) -> String {
    format!("https://docs.google.com/spreadsheets/d/{spreadsheet_id}/edit")
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

pub struct SheetsStore {
    http: reqwest::blocking::Client,
    access_token: String,
    spreadsheet_id: String,
    retry: RetryPolicy,
}

impl SheetsStore {
    pub fn new(access_token: String, spreadsheet_id: String, retry: RetryPolicy) -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
            access_token,
            spreadsheet_id,
            retry,
        }
    }

    fn values_url(&self, range: &str) -> String {
        format!("{SHEETS_BASE}/{}/values/{range}", self.spreadsheet_id)
    }
}

impl ApplicationStore for SheetsStore {
    fn read_rows(&self, range: &str) -> Result<Vec<Vec<String>>> {
        let url = self.values_url(range);
        let vr: ValueRange = self.retry.call("Sheets read", || {
            let resp = self
                .http
                .get(&url)
                .bearer_auth(&self.access_token)
                .send()?;
            if !resp.status().is_success() {
                return Err(anyhow!("Sheets API {}: HTTP {}", url, resp.status()));
            }
            Ok(resp.json()?)
        })?;
        Ok(vr.values)
    }

    fn append_row(&self, range: &str, row: Vec<Value>) -> Result<()> {
        let url = format!(
            "{}:append?valueInputOption=RAW&insertDataOption=INSERT_ROWS",
            self.values_url(range)
        );
        let body = json!({ "values": [row] });
        self.retry.call("Sheets append", || {
            let resp = self
                .http
                .post(&url)
                .bearer_auth(&self.access_token)
                .json(&body)
                .send()?;
            if !resp.status().is_success() {
                return Err(anyhow!("Sheets API {}: HTTP {}", url, resp.status()));
            }
            Ok(())
        })
    }
}
