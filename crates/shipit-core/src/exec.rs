//! The shell execution primitive.
//!
//! Every command runs through [`Executor::execute`], which never fails for a
//! non-zero exit: the outcome is data. Each invocation notifies the command
//! recorder, and the shell implementation writes one log file per command
//! under `.shipit/logs/`.

use crate::paths;
use crate::recorder::{self, CommandRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

const MAX_LABEL_LEN: usize = 60;

#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Working directory; the repository root when `None`.
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    /// Never echo output, even in verbose mode.
    pub silence: bool,
}

impl ExecOptions {
    pub fn silent() -> Self {
        Self {
            silence: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecResult {
    pub ok: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub log_file: Option<PathBuf>,
}

impl ExecResult {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            ok: true,
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
            log_file: None,
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            ok: false,
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
            log_file: None,
        }
    }

    /// stdout then stderr, separated by a newline when both are present.
    pub fn combined_output(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (true, _) => self.stderr.clone(),
            (_, true) => self.stdout.clone(),
            _ => format!("{}\n{}", self.stdout, self.stderr),
        }
    }

    /// Log path for messages, or a placeholder when none was written.
    pub fn log_display(&self) -> String {
        self.log_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(no log file)".to_string())
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

pub trait Executor {
    /// Run `command` and capture its outcome. Must not panic or fail for a
    /// non-zero exit.
    fn spawn(&self, command: &str, label: &str, opts: &ExecOptions) -> ExecResult;

    /// Run `command`, then notify the recorder.
    fn execute(&self, command: &str, label: &str, opts: &ExecOptions) -> ExecResult {
        let timestamp = Utc::now();
        let start = Instant::now();
        tracing::debug!(%label, %command, "exec start");
        let result = self.spawn(command, label, opts);
        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(%label, exit_code = result.exit_code, duration_ms, "exec done");
        recorder::notify(&CommandRecord {
            command: command.to_string(),
            label: label.to_string(),
            ok: result.ok,
            exit_code: result.exit_code,
            duration_ms,
            timestamp,
        });
        result
    }
}

/// Runs commands through `sh -c` and logs each one to disk.
pub struct ShellExecutor {
    root: PathBuf,
    log_dir: PathBuf,
    verbose: bool,
}

impl ShellExecutor {
    pub fn new(root: &Path, verbose: bool) -> Self {
        Self {
            root: root.to_path_buf(),
            log_dir: paths::log_dir(root),
            verbose,
        }
    }

    fn write_log(
        &self,
        command: &str,
        label: &str,
        cwd: &Path,
        started: DateTime<Utc>,
        result: &ExecResult,
        duration_ms: u64,
    ) -> std::io::Result<PathBuf> {
        ensure_log_dir(&self.log_dir)?;
        let path = unique_log_path(&self.log_dir, started, label);
        let mut f = std::fs::File::create(&path)?;
        writeln!(f, "$ {command}")?;
        writeln!(f, "# label: {label}")?;
        writeln!(f, "# cwd: {}", cwd.display())?;
        writeln!(f, "# started: {}", started.to_rfc3339())?;
        writeln!(f, "# exit: {}  duration: {duration_ms}ms", result.exit_code)?;
        writeln!(f, "--- stdout ---")?;
        f.write_all(result.stdout.as_bytes())?;
        writeln!(f, "\n--- stderr ---")?;
        f.write_all(result.stderr.as_bytes())?;
        Ok(path)
    }
}

impl Executor for ShellExecutor {
    fn spawn(&self, command: &str, label: &str, opts: &ExecOptions) -> ExecResult {
        let started = Utc::now();
        let start = Instant::now();
        let cwd = opts.cwd.clone().unwrap_or_else(|| self.root.clone());
        let tee = self.verbose && !opts.silence;

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(&cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (k, v) in &opts.env {
            cmd.env(k, v);
        }

        let mut result = match cmd.spawn() {
            Ok(mut child) => {
                // Drain both pipes on their own threads to avoid pipe-buffer deadlocks.
                let out = child.stdout.take().map(|r| drain(r, tee, false));
                let err = child.stderr.take().map(|r| drain(r, tee, true));
                let status = child.wait();
                let stdout = out.and_then(|h| h.join().ok()).unwrap_or_default();
                let stderr = err.and_then(|h| h.join().ok()).unwrap_or_default();
                match status {
                    Ok(status) => ExecResult {
                        ok: status.success(),
                        stdout,
                        stderr,
                        exit_code: status.code().unwrap_or(-1),
                        log_file: None,
                    },
                    Err(e) => ExecResult::failure(-1, format!("wait failed: {e}")),
                }
            }
            Err(e) => ExecResult::failure(-1, format!("failed to spawn: {e}")),
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        match self.write_log(command, label, &cwd, started, &result, duration_ms) {
            Ok(path) => result.log_file = Some(path),
            Err(e) => tracing::warn!(%label, error = %e, "could not write command log"),
        }
        result
    }
}

/// Create the log directory with a `.gitignore` that hides everything in it,
/// so logs never show up as worktree changes.
fn ensure_log_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let ignore = dir.join(".gitignore");
    if !ignore.exists() {
        std::fs::write(ignore, "*\n")?;
    }
    Ok(())
}

fn drain<R: Read + Send + 'static>(
    reader: R,
    tee: bool,
    is_stderr: bool,
) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = String::new();
        let mut reader = BufReader::new(reader);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&line);
                    if tee {
                        if is_stderr {
                            eprint!("{text}");
                        } else {
                            print!("{text}");
                        }
                    }
                    buf.push_str(&text);
                }
            }
        }
        buf
    })
}

// ---------------------------------------------------------------------------
// Log file naming
// ---------------------------------------------------------------------------

/// Lowercase, collapse runs of anything outside `[a-z0-9]` to `-`, cap length.
pub fn sanitize_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for c in label.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed: String = out.trim_matches('-').chars().take(MAX_LABEL_LEN).collect();
    let trimmed = trimmed.trim_end_matches('-');
    if trimmed.is_empty() {
        "command".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn log_file_name(started: DateTime<Utc>, label: &str) -> String {
    format!(
        "{}-{}.log",
        started.format("%Y%m%d-%H%M%S-%3f"),
        sanitize_label(label)
    )
}

fn unique_log_path(dir: &Path, started: DateTime<Utc>, label: &str) -> PathBuf {
    let base = log_file_name(started, label);
    let mut path = dir.join(&base);
    let mut n = 1;
    while path.exists() {
        let stem = base.trim_end_matches(".log");
        path = dir.join(format!("{stem}-{n}.log"));
        n += 1;
    }
    path
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::CommandTrail;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn sanitize_label_collapses_and_caps() {
        assert_eq!(sanitize_label("Build: packages/api"), "build-packages-api");
        assert_eq!(sanitize_label("  --weird!!label--  "), "weird-label");
        assert_eq!(sanitize_label("!!!"), "command");
        let long = "x".repeat(200);
        assert_eq!(sanitize_label(&long).len(), MAX_LABEL_LEN);
    }

    #[test]
    fn log_file_name_is_timestamped() {
        let t = Utc.with_ymd_and_hms(2026, 3, 1, 14, 5, 9).unwrap();
        assert_eq!(
            log_file_name(t, "git push"),
            "20260301-140509-000-git-push.log"
        );
    }

    #[test]
    fn shell_executor_captures_output_and_writes_log() {
        let dir = TempDir::new().unwrap();
        let exec = ShellExecutor::new(dir.path(), false);
        let result = exec.execute("echo out; echo err >&2", "echo test", &ExecOptions::default());
        assert!(result.ok);
        assert_eq!(result.stdout.trim(), "out");
        assert_eq!(result.stderr.trim(), "err");
        let log = result.log_file.expect("log file written");
        assert!(log.starts_with(dir.path().join(".shipit/logs")));
        let content = std::fs::read_to_string(log).unwrap();
        assert!(content.contains("$ echo out; echo err >&2"));
        assert!(content.contains("# exit: 0"));
    }

    #[test]
    fn logs_stay_out_of_git_status() {
        let dir = TempDir::new().unwrap();
        let exec = ShellExecutor::new(dir.path(), false);
        if !exec.execute("git init -q", "git init", &ExecOptions::default()).ok {
            return;
        }
        assert_eq!(
            std::fs::read_to_string(dir.path().join(".shipit/logs/.gitignore")).unwrap(),
            "*\n"
        );
        exec.execute("true", "first", &ExecOptions::default());
        let status = exec.execute(
            "git status --porcelain=v1 --untracked-files=all",
            "git status",
            &ExecOptions::default(),
        );
        assert!(status.ok);
        assert_eq!(status.stdout, "", "logs leaked into the worktree");
    }

    #[test]
    fn non_zero_exit_is_data_not_error() {
        let dir = TempDir::new().unwrap();
        let exec = ShellExecutor::new(dir.path(), false);
        let result = exec.execute("exit 3", "fails", &ExecOptions::default());
        assert!(!result.ok);
        assert_eq!(result.exit_code, 3);
    }

    #[test]
    fn respects_cwd_and_env() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        let exec = ShellExecutor::new(dir.path(), false);
        let opts = ExecOptions {
            cwd: Some(dir.path().join("sub")),
            env: vec![("SHIPIT_TEST_VALUE".into(), "42".into())],
            silence: false,
        };
        let result = exec.execute("basename \"$PWD\"; echo $SHIPIT_TEST_VALUE", "pwd", &opts);
        assert_eq!(result.stdout, "sub\n42\n");
    }

    #[test]
    fn execute_notifies_recorder() {
        let dir = TempDir::new().unwrap();
        let exec = ShellExecutor::new(dir.path(), false);
        let trail = CommandTrail::start();
        exec.execute("true", "first", &ExecOptions::default());
        exec.execute("false", "second", &ExecOptions::default());
        let records = trail.records();
        assert_eq!(records.len(), 2);
        assert!(records[0].ok);
        assert_eq!(records[1].label, "second");
        assert!(!records[1].ok);
    }

    #[test]
    fn same_label_in_same_millisecond_gets_suffix() {
        let dir = TempDir::new().unwrap();
        let t = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let first = unique_log_path(dir.path(), t, "build");
        std::fs::write(&first, "").unwrap();
        let second = unique_log_path(dir.path(), t, "build");
        assert_ne!(first, second);
        assert!(second.to_string_lossy().ends_with("-build-1.log"));
    }
}
