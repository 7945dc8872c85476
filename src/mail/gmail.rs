use anyhow::{Result, anyhow};
use serde::Deserialize;

use crate::mail::message::RawMessage;
use crate::retry::RetryPolicy;

const GMAIL_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Where messages come from. The pipeline only ever iterates ids and pulls
/// full messages; everything else about the transport is this trait's problem.
pub trait MailSource {
    /// Most-recent-first ids, at most `n` of them.
    fn list_recent_ids(&self, n: u32) -> Result<Vec<String>>;
    fn get_message(&self, id: &str) -> Result<RawMessage>;
}

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

pub struct GmailClient {
    http: reqwest::blocking::Client,
    access_token: String,
    retry: RetryPolicy,
}

impl GmailClient {
    pub fn new(access_token: String, retry: RetryPolicy) -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
            access_token,
            retry,
        }
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()?;
        if !resp.status().is_success() {
            return Err(anyhow!("Gmail API {}: HTTP {}", url, resp.status()));
        }
        Ok(resp.json()?)
    }
}

impl MailSource for GmailClient {
    fn list_recent_ids(&self, n: u32) -> Result<Vec<String>> {
        let url = format!("{GMAIL_BASE}/messages?maxResults={n}");
        let list: MessageList = self.retry.call("Gmail list", || self.get_json(&url))?;
        Ok(list.messages.into_iter().map(|m| m.id).collect())
    }

    fn get_message(&self, id: &str) -> Result<RawMessage> {
        let url = format!("{GMAIL_BASE}/messages/{id}?format=full");
        self.retry.call("Gmail get", || self.get_json(&url))
    }
}
