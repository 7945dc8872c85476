use anyhow::{Result, anyhow};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::{oauth, token_store, tokens_file};
use crate::config::Config;

/// Hands out a usable access token: cached file first, then refresh token
/// from the keyring, then the interactive PKCE flow as a last resort.
#[derive(Clone)]
pub struct TokenManager {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub user_email: String,
}

impl TokenManager {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let client_id = cfg.client_id.clone();
        let user_email = cfg
            .user_email
            .clone()
            .ok_or_else(|| anyhow!("user_email not set in config"))?;
        let redirect_uri = cfg
            .redirect_uri
            .clone()
            .unwrap_or_else(|| "http://127.0.0.1:8080/callback".to_string());

        let client_secret = token_store::load_client_secret(&client_id)?
            .or_else(|| std::env::var("OAUTH_CLIENT_SECRET").ok());

        Ok(Self {
            client_id,
            client_secret,
            redirect_uri,
            user_email,
        })
    }

    pub fn get_access_token(&self) -> Result<String> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64;

        if let Some(tf) = tokens_file::load_tokens()?
            && let (Some(at), Some(exp)) = (tf.access_token, tf.expires_at_epoch)
            && now < exp
        {
            return Ok(at);
        }

        if let Some(rt) = token_store::load_refresh_token(&self.user_email)? {
            let t =
                oauth::refresh_access_token(&self.client_id, self.client_secret.as_deref(), &rt)?;
            return self.cache(t, now);
        }

        let t = oauth::perform_pkce_flow(
            &self.client_id,
            self.client_secret.as_deref(),
            &self.redirect_uri,
            &self.user_email,
        )?;
        self.cache(t, now)
    }

    fn cache(&self, t: oauth::Tokens, now: i64) -> Result<String> {
        let exp = t.expires_in.map(|s| now + s as i64).unwrap_or(now + 3500);
        tokens_file::save_tokens(Some(&t.access_token), Some(exp))?;
        Ok(t.access_token)
    }
}
