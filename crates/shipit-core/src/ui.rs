//! User interaction seam.
//!
//! Prompts are strict request/response suspension points: one question at a
//! time, and every question carries a default so a non-interactive run
//! (answers file, CI, piped stdin) can proceed without a terminal.

use std::cell::RefCell;
use std::collections::VecDeque;

pub trait Ui {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn success(&self, message: &str);

    /// Yes/no question; returns `default` when the user just presses enter.
    fn confirm(&self, question: &str, default: bool) -> bool;

    /// Free-text question; returns `default` on empty input.
    fn input(&self, question: &str, default: &str) -> String;

    /// Open an editor on `template`. `None` when no editor is available.
    fn edit(&self, template: &str) -> Option<String>;

    /// Whether a human can answer prompts.
    fn interactive(&self) -> bool;
}

/// A [`Ui`] that answers from pre-loaded queues and falls back to defaults.
///
/// With empty queues it is the non-interactive terminal: every prompt takes
/// its default. All output is kept in a transcript.
#[derive(Debug, Default)]
pub struct ScriptedUi {
    confirms: RefCell<VecDeque<bool>>,
    inputs: RefCell<VecDeque<String>>,
    edits: RefCell<VecDeque<String>>,
    transcript: RefCell<Vec<String>>,
    interactive: bool,
}

impl ScriptedUi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report as interactive so editor and confirmation paths are taken.
    pub fn as_interactive(mut self) -> Self {
        self.interactive = true;
        self
    }

    pub fn with_confirms(self, answers: impl IntoIterator<Item = bool>) -> Self {
        self.confirms.borrow_mut().extend(answers);
        self
    }

    pub fn with_inputs<S: Into<String>>(self, answers: impl IntoIterator<Item = S>) -> Self {
        self.inputs
            .borrow_mut()
            .extend(answers.into_iter().map(Into::into));
        self
    }

    pub fn with_edits<S: Into<String>>(self, texts: impl IntoIterator<Item = S>) -> Self {
        self.edits
            .borrow_mut()
            .extend(texts.into_iter().map(Into::into));
        self
    }

    pub fn transcript(&self) -> Vec<String> {
        self.transcript.borrow().clone()
    }

    fn log(&self, line: String) {
        self.transcript.borrow_mut().push(line);
    }
}

impl Ui for ScriptedUi {
    fn info(&self, message: &str) {
        self.log(format!("info: {message}"));
    }

    fn warn(&self, message: &str) {
        self.log(format!("warn: {message}"));
    }

    fn success(&self, message: &str) {
        self.log(format!("ok: {message}"));
    }

    fn confirm(&self, question: &str, default: bool) -> bool {
        let answer = self.confirms.borrow_mut().pop_front().unwrap_or(default);
        self.log(format!("confirm: {question} -> {answer}"));
        answer
    }

    fn input(&self, question: &str, default: &str) -> String {
        let answer = self
            .inputs
            .borrow_mut()
            .pop_front()
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| default.to_string());
        self.log(format!("input: {question} -> {answer}"));
        answer
    }

    fn edit(&self, _template: &str) -> Option<String> {
        self.edits.borrow_mut().pop_front()
    }

    fn interactive(&self) -> bool {
        self.interactive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_queues_take_defaults() {
        let ui = ScriptedUi::new();
        assert!(ui.confirm("push?", true));
        assert!(!ui.confirm("delete?", false));
        assert_eq!(ui.input("prefix", "feat"), "feat");
        assert!(ui.edit("template").is_none());
    }

    #[test]
    fn scripted_answers_are_consumed_in_order() {
        let ui = ScriptedUi::new()
            .with_confirms([false])
            .with_inputs(["fix", ""]);
        assert!(!ui.confirm("push?", true));
        assert_eq!(ui.input("prefix", "feat"), "fix");
        assert_eq!(ui.input("slug", "work"), "work");
        assert_eq!(ui.transcript().len(), 3);
    }
}
