//! The terminal [`Ui`]: coloured messages on stderr, line prompts, and the
//! user's editor for commit messages.

use console::{style, Term};
use shipit_core::ui::Ui;
use std::io::{IsTerminal, Write};
use std::process::Command;

const EDITOR_VARS: &[&str] = &["GIT_EDITOR", "VISUAL", "EDITOR"];

pub struct TerminalUi {
    term: Term,
    interactive: bool,
}

impl TerminalUi {
    /// Prompts are only shown when stdin is a terminal and `--non-interactive`
    /// was not given.
    pub fn new(non_interactive: bool) -> Self {
        let term = Term::stderr();
        let interactive = !non_interactive && std::io::stdin().is_terminal() && term.is_term();
        Self { term, interactive }
    }

    fn ask(&self, prompt: &str) -> Option<String> {
        self.term.write_str(prompt).ok()?;
        self.term.read_line().ok()
    }
}

impl Ui for TerminalUi {
    fn info(&self, message: &str) {
        let _ = self.term.write_line(message);
    }

    fn warn(&self, message: &str) {
        let _ = self
            .term
            .write_line(&format!("{} {message}", style("warning:").yellow().bold()));
    }

    fn success(&self, message: &str) {
        let _ = self
            .term
            .write_line(&format!("{} {message}", style("✓").green()));
    }

    fn confirm(&self, question: &str, default: bool) -> bool {
        if !self.interactive {
            return default;
        }
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            let Some(answer) = self.ask(&format!("{} {} ", style(question).bold(), style(hint).dim()))
            else {
                return default;
            };
            match answer.trim().to_ascii_lowercase().as_str() {
                "" => return default,
                "y" | "yes" => return true,
                "n" | "no" => return false,
                _ => {
                    let _ = self.term.write_line("please answer y or n");
                }
            }
        }
    }

    fn input(&self, question: &str, default: &str) -> String {
        if !self.interactive {
            return default.to_string();
        }
        let prompt = if default.is_empty() {
            format!("{} ", style(format!("{question}:")).bold())
        } else {
            format!(
                "{} {} ",
                style(format!("{question}:")).bold(),
                style(format!("[{default}]")).dim()
            )
        };
        match self.ask(&prompt) {
            Some(answer) if !answer.trim().is_empty() => answer.trim().to_string(),
            _ => default.to_string(),
        }
    }

    fn edit(&self, template: &str) -> Option<String> {
        if !self.interactive {
            return None;
        }
        let editor = editor_command()?;
        match run_editor(&editor, template) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(%editor, error = %e, "editor failed");
                self.warn(&format!("editor `{editor}` failed: {e}"));
                None
            }
        }
    }

    fn interactive(&self) -> bool {
        self.interactive
    }
}

/// First non-empty of `GIT_EDITOR`, `VISUAL`, `EDITOR`.
fn editor_command() -> Option<String> {
    EDITOR_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

/// Write `template` to a temp file, open it in `editor` and read it back.
fn run_editor(editor: &str, template: &str) -> std::io::Result<String> {
    let mut file = tempfile::Builder::new()
        .prefix("shipit-commit-")
        .suffix(".txt")
        .tempfile()?;
    file.write_all(template.as_bytes())?;
    file.flush()?;

    // Editor values may carry flags ("code --wait"), so go through the shell.
    let status = Command::new("sh")
        .arg("-c")
        .arg(format!("{editor} \"$1\""))
        .arg("sh")
        .arg(file.path())
        .status()?;
    if !status.success() {
        return Err(std::io::Error::other(format!("exited with {status}")));
    }
    std::fs::read_to_string(file.path())
}
