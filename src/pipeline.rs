use anyhow::Result;
use log::error;
use std::io::{BufRead, Write};
use std::thread;
use std::time::Duration;

use crate::dedupe::DedupIndex;
use crate::domain::application::{JobApplication, JobInfo};
use crate::llm::extract::Extractor;
use crate::mail::decode;
use crate::mail::gmail::MailSource;
use crate::store::repo::{APPEND_RANGE, ApplicationStore};

/// Fills in fields the model returned as UNKNOWN. Implementations may leave
/// them UNKNOWN to decline; the email is then skipped, not treated as an
/// error.
pub trait Resolver {
    fn resolve(&self, info: &mut JobInfo);
}

/// Prompts on stdin; answering 'n' keeps the field UNKNOWN.
pub struct StdinResolver;

impl StdinResolver {
    fn ask(prompt: &str) -> Option<String> {
        print!("{prompt}");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        if std::io::stdin().lock().read_line(&mut line).is_err() {
            return None;
        }
        let answer = line.trim().to_string();
        if answer.eq_ignore_ascii_case("n") {
            None
        } else {
            Some(answer)
        }
    }
}

impl Resolver for StdinResolver {
    fn resolve(&self, info: &mut JobInfo) {
        println!("Partial info detected:");
        println!("Position: {}", info.position);
        println!("Company: {}", info.company);

        if info.position_unknown()
            && let Some(v) = Self::ask("Enter position (or 'n' to skip): ")
        {
            info.position = v;
        }
        if info.company_unknown()
            && let Some(v) = Self::ask("Enter company (or 'n' to skip): ")
        {
            info.company = v;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EmailOutcome {
    Added,
    Duplicate,
    Skipped,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    pub processed: usize,
    pub added: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub errors: usize,
}

pub struct IngestionPipeline<'a> {
    pub mail: &'a dyn MailSource,
    pub extractor: &'a Extractor<'a>,
    pub store: &'a dyn ApplicationStore,
    pub resolver: &'a dyn Resolver,
    pub sheet_url: String,
    /// Flat sleep after every email, to stay under API rate limits.
    pub pacing: Duration,
}

impl IngestionPipeline<'_> {
    /// Process the `n` most recent emails, strictly one at a time. A failure
    /// inside one email's processing is logged and the run moves on; only
    /// the initial id listing can abort the whole run.
    pub fn run(&self, n: u32) -> Result<RunReport> {
        let ids = self.mail.list_recent_ids(n)?;
        let mut report = RunReport::default();

        if ids.is_empty() {
            println!("No emails found.");
            return Ok(report);
        }

        let mut index = DedupIndex::from_store(self.store);

        println!("Processing {} emails...", ids.len());

        for (i, id) in ids.iter().enumerate() {
            println!("Processing email {}/{}...", i + 1, ids.len());
            report.processed += 1;

            match self.process_one(id, &mut index) {
                Ok(EmailOutcome::Added) => report.added += 1,
                Ok(EmailOutcome::Duplicate) => report.duplicates += 1,
                Ok(EmailOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    report.errors += 1;
                    error!("Error processing email {}: {e}", i + 1);
                }
            }

            thread::sleep(self.pacing);
        }

        println!(
            "Processing complete. View your Google Sheet: \x1b[4m{}\x1b[0m",
            self.sheet_url
        );
        Ok(report)
    }

    fn process_one(&self, id: &str, index: &mut DedupIndex) -> Result<EmailOutcome> {
        let raw = self.mail.get_message(id)?;
        let email = decode::decode(&raw);
        let mut info = self.extractor.extract(&email);

        // Nothing extracted at all: not worth prompting the user over.
        if info.position_unknown() && info.company_unknown() {
            println!("⚠️ Unable to extract info from email");
            return Ok(EmailOutcome::Skipped);
        }

        if info.position_unknown() || info.company_unknown() {
            self.resolver.resolve(&mut info);
            if info.position_unknown() || info.company_unknown() {
                println!("⚠️ Skipping email with missing information");
                return Ok(EmailOutcome::Skipped);
            }
        }

        let app = JobApplication {
            date: email.date.clone(),
            position: info.position.clone(),
            company: info.company.clone(),
            status: info.status_enum(),
        };

        let key = app.dedup_key();
        if index.contains(&key) {
            println!("ℹ️ Skipping duplicate: {} at {}", app.position, app.company);
            return Ok(EmailOutcome::Duplicate);
        }

        // Insert before the append so a repeated key later in this batch is
        // caught even while (or after) the append is in flight.
        index.insert(key);
        self.store.append_row(APPEND_RANGE, app.to_row())?;

        println!(
            "✓ Added: {} at {} - Status: {} ({})",
            app.position,
            app.company,
            app.status.code(),
            app.status.label()
        );
        Ok(EmailOutcome::Added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::application::UNKNOWN;
    use crate::llm::gemini::LanguageModel;
    use crate::mail::message::{Header, MessagePart, PartBody, RawMessage};
    use crate::retry::RetryPolicy;
    use anyhow::anyhow;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE;
    use std::cell::{Cell, RefCell};

    fn raw_message(id: &str, subject: &str, body: &str) -> RawMessage {
        RawMessage {
            id: id.to_string(),
            payload: MessagePart {
                mime_type: "text/plain".to_string(),
                headers: vec![
                    Header {
                        name: "Subject".into(),
                        value: subject.to_string(),
                    },
                    Header {
                        name: "Date".into(),
                        value: "Mon, 01 Jan 2024 15:30:00 +0000".into(),
                    },
                ],
                body: Some(PartBody {
                    data: Some(URL_SAFE.encode(body.as_bytes())),
                }),
                parts: vec![],
            },
        }
    }

    struct FakeMail {
        messages: Vec<RawMessage>,
    }

    impl MailSource for FakeMail {
        fn list_recent_ids(&self, n: u32) -> Result<Vec<String>> {
            Ok(self
                .messages
                .iter()
                .take(n as usize)
                .map(|m| m.id.clone())
                .collect())
        }

        fn get_message(&self, id: &str) -> Result<RawMessage> {
            self.messages
                .iter()
                .find(|m| m.id == id)
                .cloned()
                .ok_or_else(|| anyhow!("no such message {id}"))
        }
    }

    /// Replays a fixed response per call, in order; repeats the last one.
    struct FakeModel {
        responses: Vec<String>,
        next: Cell<usize>,
    }

    impl FakeModel {
        fn new(responses: &[&str]) -> Self {
            Self {
                responses: responses.iter().map(|s| s.to_string()).collect(),
                next: Cell::new(0),
            }
        }
    }

    impl LanguageModel for FakeModel {
        fn complete(&self, _prompt: &str) -> Result<String> {
            let i = self.next.get();
            self.next.set(i + 1);
            let i = i.min(self.responses.len() - 1);
            Ok(self.responses[i].clone())
        }
    }

    struct FakeStore {
        existing: Vec<Vec<String>>,
        appended: RefCell<Vec<Vec<serde_json::Value>>>,
        fail_appends: Cell<u32>,
    }

    impl FakeStore {
        fn empty() -> Self {
            Self {
                existing: vec![],
                appended: RefCell::new(vec![]),
                fail_appends: Cell::new(0),
            }
        }

        fn with_rows(existing: Vec<Vec<String>>) -> Self {
            Self {
                existing,
                appended: RefCell::new(vec![]),
                fail_appends: Cell::new(0),
            }
        }
    }

    impl ApplicationStore for FakeStore {
        fn read_rows(&self, _range: &str) -> Result<Vec<Vec<String>>> {
            Ok(self.existing.clone())
        }

        fn append_row(&self, _range: &str, row: Vec<serde_json::Value>) -> Result<()> {
            if self.fail_appends.get() > 0 {
                self.fail_appends.set(self.fail_appends.get() - 1);
                return Err(anyhow!("HTTP 500"));
            }
            self.appended.borrow_mut().push(row);
            Ok(())
        }
    }

    /// Declines everything, counting how often it was consulted.
    struct DecliningResolver {
        calls: Cell<u32>,
    }

    impl Resolver for DecliningResolver {
        fn resolve(&self, _info: &mut JobInfo) {
            self.calls.set(self.calls.get() + 1);
        }
    }

    struct FillingResolver {
        position: Option<String>,
        company: Option<String>,
    }

    impl Resolver for FillingResolver {
        fn resolve(&self, info: &mut JobInfo) {
            if info.position_unknown()
                && let Some(p) = &self.position
            {
                info.position = p.clone();
            }
            if info.company_unknown()
                && let Some(c) = &self.company
            {
                info.company = c.clone();
            }
        }
    }

    fn extraction(position: &str, company: &str, status: i64) -> String {
        format!("```json\n{{\"position\":\"{position}\",\"company\":\"{company}\",\"status\":{status}}}\n```")
    }

    fn run_pipeline(
        mail: &FakeMail,
        model: &FakeModel,
        store: &FakeStore,
        resolver: &dyn Resolver,
        n: u32,
    ) -> RunReport {
        let extractor = Extractor::new(model, RetryPolicy::new(5, Duration::from_millis(0)));
        let pipeline = IngestionPipeline {
            mail,
            extractor: &extractor,
            store,
            resolver,
            sheet_url: "https://docs.google.com/spreadsheets/d/test/edit".to_string(),
            pacing: Duration::from_millis(0),
        };
        pipeline.run(n).unwrap()
    }

    #[test]
    fn accepted_email_is_appended_with_full_row() {
        let mail = FakeMail {
            messages: vec![raw_message("m1", "Interview", "come interview with us")],
        };
        let model = FakeModel::new(&[&extraction("SWE Intern", "Acme", 3)]);
        let store = FakeStore::empty();
        let resolver = DecliningResolver { calls: Cell::new(0) };

        let report = run_pipeline(&mail, &model, &store, &resolver, 10);

        assert_eq!(report.added, 1);
        assert_eq!(report.errors, 0);
        let appended = store.appended.borrow();
        assert_eq!(appended[0][0], "01/01/24 10:30");
        assert_eq!(appended[0][1], "SWE Intern");
        assert_eq!(appended[0][2], "Acme");
        // numeric cell, not the text "3"
        assert_eq!(appended[0][3], 3);
        assert!(appended[0][3].is_i64());
        // never consulted: nothing was UNKNOWN
        assert_eq!(resolver.calls.get(), 0);
    }

    #[test]
    fn second_run_over_same_messages_appends_nothing() {
        let mail = FakeMail {
            messages: vec![
                raw_message("m1", "a", "x"),
                raw_message("m2", "b", "y"),
            ],
        };
        let responses = [
            extraction("SWE Intern", "Acme", 1),
            extraction("Data Analyst", "Globex", 2),
        ];
        let resolver = DecliningResolver { calls: Cell::new(0) };

        let first_store = FakeStore::empty();
        let model = FakeModel::new(&[&responses[0], &responses[1]]);
        let report = run_pipeline(&mail, &model, &first_store, &resolver, 10);
        assert_eq!(report.added, 2);

        // second run: the store now holds position/company columns for both
        let existing = first_store
            .appended
            .borrow()
            .iter()
            .map(|row| {
                vec![
                    row[1].as_str().unwrap().to_string(),
                    row[2].as_str().unwrap().to_string(),
                ]
            })
            .collect();
        let second_store = FakeStore::with_rows(existing);
        let model = FakeModel::new(&[&responses[0], &responses[1]]);
        let report = run_pipeline(&mail, &model, &second_store, &resolver, 10);

        assert_eq!(report.added, 0);
        assert_eq!(report.duplicates, 2);
        assert!(second_store.appended.borrow().is_empty());
    }

    #[test]
    fn both_fields_unknown_skips_without_prompting() {
        let mail = FakeMail {
            messages: vec![raw_message("m1", "newsletter", "50% off")],
        };
        let model = FakeModel::new(&[&extraction(UNKNOWN, UNKNOWN, 1)]);
        let store = FakeStore::empty();
        let resolver = DecliningResolver { calls: Cell::new(0) };

        let report = run_pipeline(&mail, &model, &store, &resolver, 10);

        assert_eq!(report.skipped, 1);
        assert_eq!(resolver.calls.get(), 0);
        assert!(store.appended.borrow().is_empty());
    }

    #[test]
    fn declined_resolution_skips_the_email() {
        let mail = FakeMail {
            messages: vec![raw_message("m1", "update", "thanks for applying")],
        };
        let model = FakeModel::new(&[&extraction(UNKNOWN, "Acme", 1)]);
        let store = FakeStore::empty();
        let resolver = DecliningResolver { calls: Cell::new(0) };

        let report = run_pipeline(&mail, &model, &store, &resolver, 10);

        assert_eq!(report.skipped, 1);
        assert_eq!(resolver.calls.get(), 1);
        assert!(store.appended.borrow().is_empty());
    }

    #[test]
    fn resolved_field_lets_the_email_through() {
        let mail = FakeMail {
            messages: vec![raw_message("m1", "update", "thanks for applying")],
        };
        let model = FakeModel::new(&[&extraction(UNKNOWN, "Acme", 1)]);
        let store = FakeStore::empty();
        let resolver = FillingResolver {
            position: Some("SWE Intern".to_string()),
            company: None,
        };

        let report = run_pipeline(&mail, &model, &store, &resolver, 10);

        assert_eq!(report.added, 1);
        let appended = store.appended.borrow();
        assert_eq!(appended[0][1], "SWE Intern");
        assert_eq!(appended[0][2], "Acme");
    }

    #[test]
    fn append_body_serializes_status_unquoted() {
        let mail = FakeMail {
            messages: vec![raw_message("m1", "Interview", "come interview with us")],
        };
        let model = FakeModel::new(&[&extraction("SWE Intern", "Acme", 3)]);
        let store = FakeStore::empty();
        let resolver = DecliningResolver { calls: Cell::new(0) };

        run_pipeline(&mail, &model, &store, &resolver, 10);

        // same shape the values API receives with valueInputOption=RAW
        let body = serde_json::json!({ "values": [store.appended.borrow()[0].clone()] });
        let wire = serde_json::to_string(&body).unwrap();
        assert!(wire.contains("\"Acme\",3]"));
        assert!(!wire.contains("\"3\""));
    }

    #[test]
    fn repeated_key_within_one_batch_is_a_duplicate() {
        let mail = FakeMail {
            messages: vec![
                raw_message("m1", "applied", "x"),
                raw_message("m2", "applied again", "y"),
            ],
        };
        let same = extraction("SWE Intern", "Acme", 1);
        let model = FakeModel::new(&[&same, &same]);
        let store = FakeStore::empty();
        let resolver = DecliningResolver { calls: Cell::new(0) };

        let report = run_pipeline(&mail, &model, &store, &resolver, 10);

        assert_eq!(report.added, 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(store.appended.borrow().len(), 1);
    }

    #[test]
    fn key_is_reserved_even_when_the_append_fails() {
        let mail = FakeMail {
            messages: vec![
                raw_message("m1", "applied", "x"),
                raw_message("m2", "applied again", "y"),
            ],
        };
        let same = extraction("SWE Intern", "Acme", 1);
        let model = FakeModel::new(&[&same, &same]);
        let store = FakeStore::empty();
        store.fail_appends.set(1);
        let resolver = DecliningResolver { calls: Cell::new(0) };

        let report = run_pipeline(&mail, &model, &store, &resolver, 10);

        // first email errored after reserving the key, so the second is a
        // duplicate rather than a retry of the append
        assert_eq!(report.errors, 1);
        assert_eq!(report.duplicates, 1);
        assert!(store.appended.borrow().is_empty());
    }

    #[test]
    fn one_bad_email_does_not_abort_the_batch() {
        let mail = FakeMail {
            messages: vec![
                raw_message("m1", "applied", "x"),
                raw_message("m2", "applied elsewhere", "y"),
            ],
        };
        let model = FakeModel::new(&[
            &extraction("SWE Intern", "Acme", 1),
            &extraction("Data Analyst", "Globex", 1),
        ]);
        let store = FakeStore::empty();
        store.fail_appends.set(1);
        let resolver = DecliningResolver { calls: Cell::new(0) };

        let report = run_pipeline(&mail, &model, &store, &resolver, 10);

        assert_eq!(report.errors, 1);
        assert_eq!(report.added, 1);
        assert_eq!(store.appended.borrow().len(), 1);
    }

    #[test]
    fn empty_mailbox_reports_nothing_processed() {
        let mail = FakeMail { messages: vec![] };
        let model = FakeModel::new(&["{}"]);
        let store = FakeStore::empty();
        let resolver = DecliningResolver { calls: Cell::new(0) };

        let report = run_pipeline(&mail, &model, &store, &resolver, 10);
        assert_eq!(report, RunReport::default());
    }
}
