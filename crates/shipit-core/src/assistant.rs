//! Assistant escalation seam.
//!
//! The remediation engine hands a [`Consultation`] to an [`Assistant`] once
//! every automated repair has failed. Implementations must degrade to a
//! printed "skipped" note instead of failing.

use crate::exec::Executor;
use crate::ui::Ui;
use serde::{Deserialize, Serialize};

/// The question the engine asks after exhausting its own repairs.
pub const REMEDIATION_QUESTION: &str = "The build still fails after automated remediation. \
What is the most likely root cause, and which shell commands should be run next to fix it?";

const EXCERPT_MAX_LINES: usize = 60;
const EXCERPT_MAX_CHARS: usize = 4000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogExcerpt {
    pub label: String,
    pub excerpt: String,
}

impl LogExcerpt {
    /// Keep the tail of `output`: the last 60 lines, at most 4000 chars.
    pub fn from_output(label: impl Into<String>, output: &str) -> Self {
        let lines: Vec<&str> = output.lines().collect();
        let start = lines.len().saturating_sub(EXCERPT_MAX_LINES);
        let mut excerpt = lines[start..].join("\n");
        if excerpt.len() > EXCERPT_MAX_CHARS {
            let mut cut = excerpt.len() - EXCERPT_MAX_CHARS;
            while !excerpt.is_char_boundary(cut) {
                cut += 1;
            }
            excerpt = excerpt[cut..].to_string();
        }
        Self {
            label: label.into(),
            excerpt,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consultation {
    pub summary: String,
    pub question: String,
    pub logs: Vec<LogExcerpt>,
}

impl Consultation {
    /// The full prompt text sent to a backend.
    pub fn prompt(&self) -> String {
        let mut out = format!("{}\n\n{}\n", self.summary, self.question);
        for log in &self.logs {
            out.push_str(&format!("\n--- {} ---\n{}\n", log.label, log.excerpt));
        }
        out
    }
}

pub trait Assistant {
    /// Print the exchange and offer any suggested commands through `ui`.
    /// Confirmed commands run through `exec`.
    fn consult(&self, consultation: &Consultation, ui: &dyn Ui, exec: &dyn Executor);
}

/// Used when escalation is disabled in config.
pub struct NoAssistant;

impl Assistant for NoAssistant {
    fn consult(&self, _consultation: &Consultation, ui: &dyn Ui, _exec: &dyn Executor) {
        ui.info("assistant skipped: disabled in configuration");
    }
}
