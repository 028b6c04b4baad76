use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::types::{render_transcript, ChatMessage};
use crate::{AssistantError, Result};

/// A local CLI that reads the prompt on stdin and prints its answer.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    command: String,
    args: Vec<String>,
}

impl LocalBackend {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    pub async fn complete(&self, history: &[ChatMessage]) -> Result<String> {
        let program = which::which(&self.command)
            .map_err(|_| AssistantError::CommandNotFound(self.command.clone()))?;
        tracing::info!(command = %program.display(), "asking local assistant");

        let mut child = Command::new(&program)
            .args(&self.args)
            .env_remove("CLAUDECODE")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            let prompt = render_transcript(history);
            // A backend that ignores stdin may exit before reading it.
            match stdin.write_all(prompt.as_bytes()).await {
                Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(e.into()),
                _ => {}
            }
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AssistantError::Protocol(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }
        let reply = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if reply.is_empty() {
            return Err(AssistantError::Protocol(format!("{} printed nothing", self.command)));
        }
        Ok(reply)
    }
}
