use anyhow::{Result, anyhow};
use keyring::{Entry, Error as KeyringError};

const SERVICE: &str = "jobtrack";

fn put(account: &str, value: &str) -> Result<()> {
    Entry::new(SERVICE, account)?
        .set_password(value)
        .map_err(|e| anyhow!(e.to_string()))
}

fn get(account: &str) -> Result<Option<String>> {
    match Entry::new(SERVICE, account)?.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(KeyringError::NoEntry) => Ok(None),
        Err(e) => Err(anyhow!(e.to_string())),
    }
}

/// Refresh tokens are keyed by the account email.
pub fn save_refresh_token(username: &str, refresh_token: &str) -> Result<()> {
    put(username, refresh_token)
}

pub fn load_refresh_token(username: &str) -> Result<Option<String>> {
    get(username)
}

/// The OAuth client secret is keyed by client_id.
pub fn save_client_secret(client_id: &str, client_secret: &str) -> Result<()> {
    put(client_id, client_secret)
}

pub fn load_client_secret(client_id: &str) -> Result<Option<String>> {
    get(client_id)
}
