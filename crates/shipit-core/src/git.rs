//! Git state probes. Everything here is derived fresh on each call; nothing is
//! cached across git-mutating operations.

use crate::context::Context;
use crate::error::Result;
use crate::exec::ExecOptions;
use crate::paths;
use crate::registry::alias;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// BranchStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchStatus {
    pub name: String,
    pub upstream: Option<String>,
    pub ahead: u32,
    pub behind: u32,
    pub detached: bool,
}

// ---------------------------------------------------------------------------
// WorktreeChanges
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorktreeChanges {
    pub staged: usize,
    pub unstaged: usize,
    pub untracked: usize,
    pub unmerged: usize,
    /// Files with staged changes that were modified again afterwards.
    pub partially_staged: Vec<String>,
    /// Every path mentioned (the new path for renames).
    pub paths: Vec<String>,
}

impl WorktreeChanges {
    /// Parse `git status --porcelain=v1` output.
    pub fn parse(porcelain: &str) -> Self {
        let mut changes = Self::default();
        for line in porcelain.lines() {
            if line.len() < 4 {
                continue;
            }
            let (code, rest) = line.split_at(2);
            let mut chars = code.chars();
            let x = chars.next().unwrap_or(' ');
            let y = chars.next().unwrap_or(' ');
            let raw = rest.trim_start();
            let path = raw.rsplit(" -> ").next().unwrap_or(raw);
            let path = path.trim_matches('"').to_string();
            if paths::is_log_path(&path) {
                continue;
            }

            if x == '?' && y == '?' {
                changes.untracked += 1;
            } else if is_unmerged(x, y) {
                changes.unmerged += 1;
            } else {
                if x != ' ' {
                    changes.staged += 1;
                }
                if y != ' ' {
                    changes.unstaged += 1;
                }
                if x != ' ' && y != ' ' {
                    changes.partially_staged.push(path.clone());
                }
            }
            changes.paths.push(path);
        }
        changes
    }

    pub fn is_dirty(&self) -> bool {
        !self.paths.is_empty()
    }

    pub fn describe(&self) -> String {
        format!(
            "staged:{} unstaged:{} untracked:{}",
            self.staged, self.unstaged, self.untracked
        )
    }
}

fn is_unmerged(x: char, y: char) -> bool {
    matches!(
        (x, y),
        ('D', 'D') | ('A', 'U') | ('U', 'D') | ('U', 'A') | ('D', 'U') | ('A', 'A') | ('U', 'U')
    )
}

/// Parse `git rev-list --left-right --count base...HEAD` into (behind, ahead).
pub fn parse_ahead_behind(output: &str) -> Option<(u32, u32)> {
    let mut parts = output.split_whitespace();
    let behind = parts.next()?.parse().ok()?;
    let ahead = parts.next()?.parse().ok()?;
    Some((behind, ahead))
}

// ---------------------------------------------------------------------------
// Rebase markers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebaseMarker {
    /// `rebase-merge/` (interactive or merge-backend rebase)
    Merge,
    /// `rebase-apply/` (am-backend rebase)
    Apply,
}

pub fn rebase_marker(git_dir: &Path) -> Option<RebaseMarker> {
    if git_dir.join("rebase-merge").is_dir() {
        Some(RebaseMarker::Merge)
    } else if git_dir.join("rebase-apply").is_dir() {
        Some(RebaseMarker::Apply)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Probes
// ---------------------------------------------------------------------------

impl Context<'_> {
    fn git_query(&self, alias: &str, args: &[(&str, &str)], label: &str) -> Result<Option<String>> {
        let cmd = self.registry.render(alias, args)?;
        let r = self.exec.execute(&cmd, label, &ExecOptions::silent());
        Ok(r.ok.then(|| r.stdout.trim().to_string()))
    }

    pub fn current_branch(&self) -> Result<String> {
        Ok(self
            .git_query(alias::GIT_CURRENT_BRANCH, &[], "git current branch")?
            .unwrap_or_else(|| "HEAD".to_string()))
    }

    pub fn worktree_changes(&self) -> Result<WorktreeChanges> {
        let cmd = self.registry.render(alias::GIT_STATUS, &[])?;
        let r = self.exec.execute(&cmd, "git status", &ExecOptions::silent());
        Ok(WorktreeChanges::parse(&r.stdout))
    }

    pub fn git_dir(&self) -> Result<Option<PathBuf>> {
        Ok(self
            .git_query(alias::GIT_DIR, &[], "git dir")?
            .map(|d| self.root.join(d)))
    }

    /// `<remote>/master` if it exists, else `<remote>/main`.
    pub fn default_remote_branch(&self) -> Result<String> {
        let remote = self.registry.remote();
        let master = format!("{remote}/master");
        let main = format!("{remote}/main");
        for candidate in [&master, &main] {
            let refname = format!("refs/remotes/{candidate}");
            if self
                .git_query(alias::GIT_VERIFY_REF, &[("ref", refname.as_str())], "git verify ref")?
                .is_some()
            {
                return Ok(candidate.clone());
            }
        }
        Ok(main)
    }

    /// Local name of the default branch (`master` or `main`).
    pub fn default_branch_name(&self) -> Result<String> {
        let full = self.default_remote_branch()?;
        Ok(full
            .rsplit_once('/')
            .map(|(_, b)| b.to_string())
            .unwrap_or(full))
    }

    /// `(behind, ahead)` of HEAD relative to `base`; `None` when git cannot
    /// compare them.
    pub fn ahead_behind(&self, base: &str) -> Result<Option<(u32, u32)>> {
        let counts = self.git_query(alias::GIT_AHEAD_BEHIND, &[("base", base)], "git ahead/behind")?;
        Ok(counts.as_deref().and_then(parse_ahead_behind))
    }

    /// Ahead/behind against the upstream, or against the default remote
    /// branch when there is no upstream.
    pub fn branch_status(&self) -> Result<BranchStatus> {
        let name = self.current_branch()?;
        let detached = name == "HEAD";
        let upstream = self.git_query(alias::GIT_UPSTREAM, &[], "git upstream")?;
        let base = match &upstream {
            Some(u) => u.clone(),
            None => self.default_remote_branch()?,
        };
        let (behind, ahead) = self.ahead_behind(&base)?.unwrap_or((0, 0));
        Ok(BranchStatus {
            name,
            upstream,
            ahead,
            behind,
            detached,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
