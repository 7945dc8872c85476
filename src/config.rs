use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub client_id: String,
    pub user_email: Option<String>,
    pub redirect_uri: Option<String>,
    pub gemini_api_key: Option<String>,
    pub spreadsheet_id: Option<String>,
    pub gemini_model: Option<String>,
}

fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("no config dir available"))?
        .join("jobtrack"))
}

pub fn config_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("config.toml");
    Ok(p)
}

pub fn load_config() -> Result<Config> {
    let path = config_path()?;
    if !path.exists() {
        // create a template config for users to edit
        let sample = Config {
            client_id: "YOUR_CLIENT_ID.apps.googleusercontent.com".to_string(),
            user_email: Some("you@example.com".to_string()),
            redirect_uri: Some("http://127.0.0.1:8080/callback".to_string()),
            gemini_api_key: None,
            spreadsheet_id: None,
            gemini_model: Some("gemini-1.5-flash".to_string()),
        };
        let tom = toml::to_string_pretty(&sample)?;
        fs::write(&path, tom)?;
        return Err(anyhow::anyhow!(
            "Created template config at {} — edit it and run again",
            path.display()
        ));
    }
    let s = fs::read_to_string(path)?;
    let cfg: Config = toml::from_str(&s)?;
    Ok(cfg)
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let path = config_path()?;
    let tom = toml::to_string_pretty(cfg)?;
    fs::write(&path, tom)?;
    Ok(())
}

impl Config {
    /// Missing credentials are fatal before any mail is touched.
    pub fn require_gemini_api_key(&self) -> Result<&str> {
        self.gemini_api_key
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Gemini API key not set. Set it with 'track config --gemini-api-key YOUR_KEY'"
                )
            })
    }

    pub fn require_spreadsheet_id(&self) -> Result<&str> {
        self.spreadsheet_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Google Sheets ID not set. Set it with 'track config --sheets-id YOUR_ID'"
                )
            })
    }

    pub fn gemini_model(&self) -> &str {
        self.gemini_model.as_deref().unwrap_or("gemini-1.5-flash")
    }
}
