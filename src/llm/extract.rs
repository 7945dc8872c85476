use anyhow::Result;
use log::warn;

use crate::domain::application::{DecodedEmail, JobInfo};
use crate::llm::gemini::LanguageModel;
use crate::retry::RetryPolicy;

const INSTRUCTIONS: &str = r#"Extract the job position I applied to and company from this email. Include any ID numbers in the position. Otherwise, return "UNKNOWN" for both. If there's more than 1 mention of companies and one is a subsidary of the other, put the parent company first then in square brackets put the subsidary after the parent company. Put status as 0 if it's a rejection email, 1 if I've just applied, 2 if it's an online assessment, hirevue, or general screening survey, and 3 if it's an interview. Format the response as JSON with these exact keys: "position", "company", and "status" inside a code block. Ignore any irrelevant emails, promotional emails, or emails that don't contain job information. Make sure to ignore any email that isn't a job application or interview confirmation, even if those may contain JUST companies (e.g. New York Times or Medium articles that are ABOUT the job market or tech that aren't an actual job application)."#;

pub fn build_prompt(email: &DecodedEmail) -> String {
    format!(
        "{INSTRUCTIONS}\n\nEmail content:\nSubject: {}\nFrom: {}\nBody: {}",
        email.subject, email.from, email.body
    )
}

/// Pull the JSON out of a ```json fenced block if the model wrapped it in
/// one, otherwise treat the whole response as JSON.
pub fn parse_response(text: &str) -> Result<JobInfo> {
    let json_str = match text.split_once("```json") {
        Some((_, rest)) => match rest.find("```") {
            Some(end) => &rest[..end],
            None => rest,
        },
        None => text,
    };
    Ok(serde_json::from_str(json_str.trim())?)
}

/// One model call per email, with bounded backoff. An email whose
/// classification keeps failing comes back as UNKNOWN/UNKNOWN rather than
/// taking the whole run down.
pub struct Extractor<'a> {
    model: &'a dyn LanguageModel,
    retry: RetryPolicy,
}

impl<'a> Extractor<'a> {
    pub fn new(model: &'a dyn LanguageModel, retry: RetryPolicy) -> Self {
        Self { model, retry }
    }

    pub fn extract(&self, email: &DecodedEmail) -> JobInfo {
        let prompt = build_prompt(email);
        let attempt = || -> Result<JobInfo> {
            let response = self.model.complete(&prompt)?;
            parse_response(&response)
        };
        match self.retry.call("Error extracting job info", attempt) {
            Ok(info) => info,
            Err(e) => {
                warn!("extraction failed after retries: {e}");
                JobInfo::unknown()
            }
        }
    }
}
