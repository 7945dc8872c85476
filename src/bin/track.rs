use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use std::time::Duration;

use jobtrack::auth::token_manager::TokenManager;
use jobtrack::auth::token_store;
use jobtrack::config::{self, load_config};
use jobtrack::llm::extract::Extractor;
use jobtrack::llm::gemini::GeminiClient;
use jobtrack::mail::gmail::GmailClient;
use jobtrack::pipeline::{IngestionPipeline, StdinResolver};
use jobtrack::retry::RetryPolicy;
use jobtrack::store::sheets::{SheetsStore, sheet_url};

#[derive(Parser)]
#[command(name = "track")]
#[command(about = "Job application tracker: Gmail -> Gemini -> Google Sheets", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    cmd: Option<Command>,

    /// Shorthand: `track 25` == `track process 25`
    number: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Process emails to find job applications
    Process {
        /// Number of latest emails to process
        number: u32,
    },

    /// Show or update configuration
    Config {
        /// Set your Gemini API key
        #[arg(long)]
        gemini_api_key: Option<String>,

        /// Set your Google Sheets ID
        #[arg(long)]
        sheets_id: Option<String>,
    },

    /// Store the OAuth client secret in keyring
    SetClientSecret {
        #[arg(long)]
        client_id: String,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match (cli.cmd, cli.number) {
        (Some(Command::Process { number }), _) | (None, Some(number)) => process(number),

        (Some(Command::Config { gemini_api_key, sheets_id }), _) => {
            config_command(gemini_api_key, sheets_id)
        }

        (Some(Command::SetClientSecret { client_id }), _) => {
            eprintln!("Paste client secret (end with Ctrl-D):");
            let mut secret = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut secret)?;
            let secret = secret.trim();
            token_store::save_client_secret(&client_id, secret)?;
            println!("Saved client secret for client_id {}", client_id);
            Ok(())
        }

        (None, None) => {
            eprintln!("Usage: track <number> | track process <number> | track config");
            std::process::exit(1);
        }
    }
}

fn process(number: u32) -> Result<()> {
    // Argument checks happen before any credential or network work; clap
    // already rejected negatives and counts past u32::MAX at parse time.
    if number == 0 {
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
    pipeline.run(number)?;
    Ok(())
}

fn config_command(gemini_api_key: Option<String>, sheets_id: Option<String>) -> Result<()> {
    let mut cfg = load_config().map_err(|e| anyhow!("Configuration error: {e}"))?;

    let mut changed = false;
    if let Some(key) = gemini_api_key {
        cfg.gemini_api_key = Some(key);
        changed = true;
        println!("Gemini API key updated.");
    }
    if let Some(id) = sheets_id {
        cfg.spreadsheet_id = Some(id);
        changed = true;
        println!("Google Sheets ID updated.");
    }

    if changed {
        config::save_config(&cfg)?;
        return Ok(());
    }

    println!("Current Configuration:");
    println!(
        "Gemini API Key: {}",
        if cfg.gemini_api_key.as_deref().is_some_and(|s| !s.is_empty()) {
            "Set"
        } else {
            "Not set"
        }
    );
    println!(
        "Google Sheets ID: {}",
        cfg.spreadsheet_id.as_deref().unwrap_or("Not set")
    );
    println!(
        "OAuth client secret: {}",
        match token_store::load_client_secret(&cfg.client_id)? {
            Some(_) => "Set (keyring)",
            None => "Not set",
        }
    );
    println!("\nUse 'track config --help' for configuration options.");
    Ok(())
}
