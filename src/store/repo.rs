use anyhow::Result;
use serde_json::Value;

/// Columns holding position and company, read once per run for dedup.
pub const DEDUP_RANGE: &str = "Sheet1!B:C";
/// Full row layout: [date, position, company, status].
pub const APPEND_RANGE: &str = "Sheet1!A:D";

/// The tabular store the tracker appends to. Append-only from this
/// program's point of view: rows are inserted, never rewritten. Cells are
/// JSON values so numeric cells (status) survive a RAW-input append as
/// numbers rather than text.
pub trait ApplicationStore {
    fn read_rows(&self, range: &str) -> Result<Vec<Vec<String>>>;
    fn append_row(&self, range: &str, row: Vec<Value>) -> Result<()>;
}
