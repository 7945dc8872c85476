use serde::Deserialize;
use serde_json::{Value, json};

/// Sentinel the model returns (and we propagate) for a field it could not
/// extract. Never written to the sheet.
pub const UNKNOWN: &str = "UNKNOWN";

/// Application stage, persisted as an integer 0-3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Rejected,
    Applied,
    Assessment,
    Interview,
}

impl Status {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Status::Rejected),
            1 => Some(Status::Applied),
            2 => Some(Status::Assessment),
            3 => Some(Status::Interview),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Status::Rejected => 0,
            Status::Applied => 1,
            Status::Assessment => 2,
            Status::Interview => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::Rejected => "Rejected",
            Status::Applied => "Applied",
            Status::Assessment => "Assessment",
            Status::Interview => "Interview",
        }
    }
}

/// Flattened view of one mail message, as produced by the decoder.
#[derive(Debug, Clone)]
pub struct DecodedEmail {
    pub subject: String,
    pub from: String,
    /// Raw Date header value, kept for logging.
    pub date_raw: String,
    /// Normalized to America/New_York, minute precision.
    pub date: String,
    pub body: String,
}

/// What the model gives back for one email. `position`/`company` may hold
/// the UNKNOWN sentinel; an interactive prompt may fill them in later.
#[derive(Debug, Clone, Deserialize)]
pub struct JobInfo {
    pub position: String,
    pub company: String,
    #[serde(default = "default_status_code")]
    pub status: i64,
}

fn default_status_code() -> i64 {
    1
}

impl JobInfo {
    pub fn unknown() -> Self {
        JobInfo {
            position: UNKNOWN.to_string(),
            company: UNKNOWN.to_string(),
            status: 1,
        }
    }

    pub fn position_unknown(&self) -> bool {
        self.position == UNKNOWN
    }

    pub fn company_unknown(&self) -> bool {
        self.company == UNKNOWN
    }

    /// Out-of-range status codes from the model degrade to Applied.
    pub fn status_enum(&self) -> Status {
        Status::from_code(self.status).unwrap_or(Status::Applied)
    }
}

/// One row of the sheet: [date, position, company, status].
#[derive(Debug, Clone)]
pub struct JobApplication {
    pub date: String,
    pub position: String,
    pub company: String,
    pub status: Status,
}

impl JobApplication {
    /// Dedup key. Plain underscore join, same as the stored columns are
    /// compared; collides if a position ends with what a company starts
    /// with around an underscore, which we accept.
    pub fn dedup_key(&self) -> String {
        dedup_key(&self.position, &self.company)
    }

    /// Row as it goes over the wire. The status cell stays a JSON number so
    /// a RAW-input append stores it as a numeric cell, not the text "3".
    pub fn to_row(&self) -> Vec<Value> {
        vec![
            json!(self.date),
            json!(self.position),
            json!(self.company),
            json!(self.status.code()),
        ]
    }
}

pub fn dedup_key(position: &str, company: &str) -> String {
    format!("{}_{}", position, company)
}
