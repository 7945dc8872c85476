use anyhow::{Result, anyhow};
use std::time::Duration;

use jobtrack::auth::token_manager::TokenManager;
use jobtrack::config::load_config;
use jobtrack::llm::extract::Extractor;
use jobtrack::llm::gemini::GeminiClient;
use jobtrack::mail::gmail::GmailClient;
use jobtrack::pipeline::{IngestionPipeline, StdinResolver};
use jobtrack::retry::RetryPolicy;
use jobtrack::store::sheets::{SheetsStore, sheet_url};

/// Minimal entry: `jobtrack <n>` processes the n most recent emails.
/// The `track` binary carries the full CLI.
fn main() -> Result<()> {
    env_logger::init();

    let args = std::env::args().collect::<Vec<_>>();
    if args.len() != 2 {
        eprintln!("Usage: jobtrack <number-of-emails>");
        std::process::exit(1);
    }
    // u32 parse rejects negatives and oversized counts outright
    let n: u32 = match args[1].parse() {
        Ok(v) => v,
        Err(_) => {
            eprintln!("Usage: jobtrack <number-of-emails>");
            std::process::exit(1);
        }
    };
    if n == 0 {
        eprintln!("Number of emails must be positive");
        std::process::exit(1);
    }

    let cfg = load_config().map_err(|e| anyhow!("Configuration error: {e}"))?;
    let api_key = cfg.require_gemini_api_key()?.to_string();
    let spreadsheet_id = cfg.require_spreadsheet_id()?.to_string();

    let token_mgr = TokenManager::from_config(&cfg)?;
    let access_token = token_mgr.get_access_token()?;

    let retry = RetryPolicy::default();
    let gmail = GmailClient::new(access_token.clone(), retry);
    let sheets = SheetsStore::new(access_token, spreadsheet_id.clone(), retry);
    let model = GeminiClient::new(api_key, cfg.gemini_model().to_string());
    let extractor = Extractor::new(&model, retry);

    let pipeline = IngestionPipeline {
        mail: &gmail,
        extractor: &extractor,
        store: &sheets,
        resolver: &StdinResolver,
        sheet_url: sheet_url(&spreadsheet_id),
        pacing: Duration::from_secs(1),
    };
    pipeline.run(n)?;
    Ok(())
}
