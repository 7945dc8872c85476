use anyhow::{Result, anyhow};
use serde::Deserialize;
use serde_json::json;

const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// One-shot text completion. Stateless; all retry logic lives with the
/// caller, not here.
pub trait LanguageModel {
    fn complete(&self, prompt: &str) -> Result<String>;
}

pub struct GeminiClient {
    http: reqwest::blocking::Client,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Debug, Deserialize)]
struct TextPart {
    #[serde(default)]
    text: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
            api_key,
            model,
        }
    }
}

impl LanguageModel for GeminiClient {
    fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{GEMINI_BASE}/{}:generateContent?key={}",
            self.model, self.api_key
        );

        // deterministic output: we want the same email to classify the same way
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": 0.0,
                "topP": 0.95,
                "topK": 40,
                "maxOutputTokens": 8192,
            },
        });

        let resp = self.http.post(&url).json(&body).send()?;
        if !resp.status().is_success() {
            return Err(anyhow!("Gemini API: HTTP {}", resp.status()));
        }

        let parsed: GenerateResponse = resp.json()?;
        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| anyhow!("Gemini API returned no candidates"))?;
        Ok(text)
    }
}
