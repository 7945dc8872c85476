use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Non-secret access-token metadata cached between runs so we can skip the
/// refresh round-trip while the token is still live.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokensFile {
    pub access_token: Option<String>,
    pub expires_at_epoch: Option<i64>, // epoch seconds
}

fn tokens_path() -> Result<PathBuf> {
    let mut p = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("no config dir available"))?
        .join("jobtrack");
    fs::create_dir_all(&p)?;
    p.push("tokens.json");
    Ok(p)
}

pub fn save_tokens(access_token: Option<&str>, expires_at_epoch: Option<i64>) -> Result<()> {
    let tf = TokensFile {
        access_token: access_token.map(|s| s.to_string()),
        expires_at_epoch,
    };
    fs::write(tokens_path()?, serde_json::to_string_pretty(&tf)?)?;
    Ok(())
}

pub fn load_tokens() -> Result<Option<TokensFile>> {
    let p = tokens_path()?;
    if !p.exists() {
        return Ok(None);
    }
    let tf: TokensFile = serde_json::from_str(&fs::read_to_string(&p)?)?;
    Ok(Some(tf))
}
