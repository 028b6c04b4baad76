//! Commit message collection.
//!
//! [`LayeredProvider`] tries, in order: the subject/body supplied as options,
//! the `SHIPIT_COMMIT_MESSAGE` environment text, an editor session (when the
//! UI is interactive), and finally a plain prompt with the default subject.

use crate::error::Result;
use crate::policy;
use crate::ui::Ui;
use serde::{Deserialize, Serialize};

pub const COMMIT_MESSAGE_ENV: &str = "SHIPIT_COMMIT_MESSAGE";

#[derive(Debug, Clone, Default)]
pub struct CommitMessageRequest {
    pub default_subject: String,
    pub provided_subject: Option<String>,
    pub provided_body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitMessage {
    pub subject: String,
    pub body: Option<String>,
}

pub trait CommitMessageProvider {
    fn commit_message(&self, request: &CommitMessageRequest, ui: &dyn Ui) -> Result<CommitMessage>;
}

pub struct LayeredProvider {
    env_text: Option<String>,
}

impl LayeredProvider {
    pub fn new(env_text: Option<String>) -> Self {
        Self { env_text }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var(COMMIT_MESSAGE_ENV).ok())
    }
}

impl CommitMessageProvider for LayeredProvider {
    fn commit_message(&self, request: &CommitMessageRequest, ui: &dyn Ui) -> Result<CommitMessage> {
        let body = request
            .provided_body
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string);

        if let Some(subject) = &request.provided_subject {
            let subject = policy::validate_commit_subject(subject)?;
            ui.info(&format!("commit subject: {subject}"));
            return Ok(CommitMessage { subject, body });
        }

        if let Some(msg) = self.env_text.as_deref().and_then(parse_message_text) {
            tracing::debug!("commit message taken from {COMMIT_MESSAGE_ENV}");
            return Ok(CommitMessage {
                body: msg.body.or(body),
                ..msg
            });
        }

        if ui.interactive() {
            let template = editor_template(&request.default_subject);
            if let Some(msg) = ui.edit(&template).as_deref().and_then(parse_message_text) {
                return Ok(CommitMessage {
                    body: msg.body.or(body),
                    ..msg
                });
            }
        }

        let answer = ui.input("Commit subject", &request.default_subject);
        let subject = policy::validate_commit_subject(&answer)
            .unwrap_or_else(|_| request.default_subject.clone());
        Ok(CommitMessage { subject, body })
    }
}

fn editor_template(default_subject: &str) -> String {
    format!(
        "{default_subject}\n\n\
         # Write the commit subject on the first line and an optional body below.\n\
         # Lines starting with '#' are ignored. An empty message keeps the default.\n"
    )
}

/// First non-empty, non-comment line is the subject; the rest is the body.
pub fn parse_message_text(text: &str) -> Option<CommitMessage> {
    let lines: Vec<&str> = text
        .lines()
        .filter(|l| !l.trim_start().starts_with('#'))
        .collect();
    let first = lines.iter().position(|l| !l.trim().is_empty())?;
    let subject = lines[first].trim().to_string();
    let body = lines[first + 1..].join("\n").trim().to_string();
    Some(CommitMessage {
        subject,
        body: (!body.is_empty()).then_some(body),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
