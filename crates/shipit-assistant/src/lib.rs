//! `shipit-assistant`: the assistant that the remediation engine escalates
//! to once its own repairs are exhausted, plus the interactive `chat`
//! session.
//!
//! ```text
//! Consultation ─▶ Escalation ─▶ Backend::Local  (stdin/stdout CLI)
//!                     │         Backend::Remote (messages API over HTTP)
//!                     ▼
//!             extract_commands ─▶ Ui::confirm ─▶ Executor::execute
//! ```
//!
//! Backends are async; [`Escalation`] bridges them into the synchronous
//! engine and bounds every request with the configured timeout. No error
//! leaves [`Assistant::consult`]: failures print as "assistant skipped".

pub mod error;
pub mod local;
pub mod remote;
pub mod suggest;
pub mod types;


use std::future::Future;
use std::time::Duration;

use shipit_core::assistant::{Assistant, Consultation};
use shipit_core::config::{AssistantBackend, AssistantConfig};
use shipit_core::exec::{ExecOptions, Executor};
use shipit_core::ui::Ui;

pub use error::AssistantError;
pub use local::LocalBackend;
pub use remote::RemoteBackend;
pub use suggest::extract_commands;
pub use types::{ChatMessage, Role};

pub type Result<T> = std::result::Result<T, AssistantError>;

#[derive(Debug, Clone)]
pub enum Backend {
    Local(LocalBackend),
    Remote(RemoteBackend),
}

impl Backend {
    pub async fn complete(&self, history: &[ChatMessage]) -> Result<String> {
        match self {
            Backend::Local(b) => b.complete(history).await,
            Backend::Remote(b) => b.complete(history).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Escalation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Escalation {
    backend: Backend,
    timeout: Duration,
}

impl Escalation {
    pub fn new(backend: Backend, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn from_config(config: &AssistantConfig) -> Self {
        let backend = match &config.backend {
            AssistantBackend::Local { command, args } => {
                Backend::Local(LocalBackend::new(command.clone(), args.clone()))
            }
            AssistantBackend::Remote {
                endpoint,
                model,
                api_key_env,
            } => Backend::Remote(RemoteBackend::new(
                endpoint.clone(),
                model.clone(),
                api_key_env.clone(),
            )),
        };
        Self::new(backend, Duration::from_secs(config.timeout_secs))
    }

    /// Send `history` and wait for the reply, bounded by the timeout.
    pub async fn ask(&self, history: &[ChatMessage]) -> Result<String> {
        match tokio::time::timeout(self.timeout, self.backend.complete(history)).await {
            Ok(reply) => reply,
            Err(_) => Err(AssistantError::Timeout(self.timeout.as_secs())),
        }
    }

    /// [`Escalation::ask`] from synchronous code.
    pub fn ask_blocking(&self, history: &[ChatMessage]) -> Result<String> {
        block_on(self.ask(history))
    }
}

/// Run `fut` to completion from synchronous code.
///
/// A multi-threaded runtime is borrowed via `block_in_place`. A current-thread
/// runtime cannot be blocked from inside, so the future runs on a fresh
/// runtime in a scoped thread instead.
fn block_on<T: Send>(fut: impl Future<Output = Result<T>> + Send) -> Result<T> {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| handle.block_on(fut))
        }
        Ok(_) => std::thread::scope(|s| {
            s.spawn(|| on_new_runtime(fut))
                .join()
                .unwrap_or_else(|_| Err(AssistantError::Protocol("assistant thread panicked".into())))
        }),
        Err(_) => on_new_runtime(fut),
    }
}

fn on_new_runtime<T>(fut: impl Future<Output = Result<T>>) -> Result<T> {
    tracing::debug!("using new tokio runtime");
    tokio::runtime::Runtime::new()?.block_on(fut)
}

impl Assistant for Escalation {
    fn consult(&self, consultation: &Consultation, ui: &dyn Ui, exec: &dyn Executor) {
        ui.info(&format!("asking the assistant: {}", consultation.summary));
        ui.info(&consultation.question);
        match self.ask_blocking(&[ChatMessage::user(consultation.prompt())]) {
            Ok(reply) => {
                ui.info(&reply);
                offer_commands(&reply, ui, exec);
            }
            Err(e) => {
                tracing::warn!(error = %e, "assistant consultation failed");
                ui.warn(&format!("assistant skipped: {e}"));
            }
        }
    }
}

/// Offer each suggested command individually; only confirmed ones run.
/// Returns the commands that were run.
pub fn offer_commands(reply: &str, ui: &dyn Ui, exec: &dyn Executor) -> Vec<String> {
    let mut ran = Vec::new();
    for command in extract_commands(reply) {
        if !ui.confirm(&format!("Run `{command}`?"), false) {
            continue;
        }
        let result = exec.execute(&command, "assistant suggestion", &ExecOptions::default());
        if result.ok {
            ui.success(&format!("ran `{command}`"));
        } else {
            ui.warn(&format!(
                "`{command}` failed (exit {}); see {}",
                result.exit_code,
                result.log_display()
            ));
        }
        ran.push(command);
    }
    ran
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// A conversation that keeps its history between turns.
pub struct ChatSession<'a> {
    escalation: &'a Escalation,
    history: Vec<ChatMessage>,
}

impl<'a> ChatSession<'a> {
    pub fn new(escalation: &'a Escalation) -> Self {
        Self {
            escalation,
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Send one user turn. On failure the turn is dropped from history.
    pub fn send(&mut self, text: &str) -> Result<String> {
        self.history.push(ChatMessage::user(text));
        match self.escalation.ask_blocking(&self.history) {
            Ok(reply) => {
                self.history.push(ChatMessage::assistant(reply.clone()));
                Ok(reply)
            }
            Err(e) => {
                self.history.pop();
                Err(e)
            }
        }
    }

    /// Prompt until an empty line, `exit` or `quit`. Suggested commands are
    /// offered after every reply.
    pub fn run(&mut self, ui: &dyn Ui, exec: &dyn Executor) {
        ui.info("chat with the assistant; an empty line, `exit` or `quit` ends the session");
        loop {
            let line = ui.input("you", "");
            let line = line.trim();
            if line.is_empty() || line == "exit" || line == "quit" {
                break;
            }
            match self.send(line) {
                Ok(reply) => {
                    ui.info(&reply);
                    offer_commands(&reply, ui, exec);
                }
                Err(e) => {
                    ui.warn(&format!("assistant unavailable: {e}"));
                    break;
                }
            }
        }
    }
}
