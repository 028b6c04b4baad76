//! Prepush checks: lint with autofix, type-check, scoped tests and the
//! dirty-index guard. Sequential AND-gate; the first failure stops the run.

use crate::context::Context;
use crate::error::Result;
use crate::exec::ExecOptions;
use crate::workspace::Workspace;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckKind {
    LintFix,
    Typecheck,
    Tests,
    DirtyIndex,
}

impl CheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::LintFix => "lint-fix",
            CheckKind::Typecheck => "typecheck",
            CheckKind::Tests => "tests",
            CheckKind::DirtyIndex => "dirty-index",
        }
    }
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub kind: CheckKind,
    pub ok: bool,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PrepushReport {
    pub ok: bool,
    pub checks: Vec<CheckResult>,
}

impl PrepushReport {
    pub fn failure(&self) -> Option<&CheckResult> {
        self.checks.iter().find(|c| !c.ok)
    }

    /// One line naming the failed check, or "all checks passed".
    pub fn describe(&self) -> String {
        match self.failure() {
            Some(c) => match &c.log_file {
                Some(log) => format!("{} failed: {} (see {})", c.kind, c.detail, log.display()),
                None => format!("{} failed: {}", c.kind, c.detail),
            },
            None => "all checks passed".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PrepushOptions {
    /// Also fail on any remaining change (used right after a commit).
    pub expect_clean: bool,
}

pub fn run_prepush(ctx: &Context<'_>, opts: PrepushOptions) -> Result<PrepushReport> {
    let files = ctx.inventory.changed_files(ctx.exec, ctx.registry)?;
    let scope = ctx.inventory.changed_workspaces(&files)?;
    tracing::debug!(workspaces = scope.len(), "prepush scope");

    let mut report = PrepushReport::default();
    for kind in [
        CheckKind::LintFix,
        CheckKind::Typecheck,
        CheckKind::Tests,
        CheckKind::DirtyIndex,
    ] {
        let result = match kind {
            CheckKind::LintFix => lint_fix(ctx, &scope)?,
            CheckKind::Typecheck => typecheck(ctx, &scope)?,
            CheckKind::Tests => scoped_tests(ctx, &scope)?,
            CheckKind::DirtyIndex => dirty_index(ctx, opts)?,
        };
        tracing::info!(check = %kind, ok = result.ok, "{}", result.detail);
        let ok = result.ok;
        report.checks.push(result);
        if !ok {
            return Ok(report);
        }
    }
    report.ok = true;
    Ok(report)
}

/// Run `pick(ws)` in every workspace of `scope` that has it; the first
/// failing workspace fails the check.
fn run_scripts(
    ctx: &Context<'_>,
    kind: CheckKind,
    scope: &[Workspace],
    pick: impl Fn(&Workspace) -> Option<(String, Option<String>)>,
) -> Result<CheckResult> {
    let mut ran = Vec::new();
    for ws in scope {
        let Some((script, extra)) = pick(ws) else {
            continue;
        };
        let command = ws.run_command(ctx.registry, &script, extra.as_deref())?;
        let label = format!("{} {script}", ws.name);
        let result = ctx.exec.execute(&command, &label, &ExecOptions::default());
        if !result.ok {
            return Ok(CheckResult {
                kind,
                ok: false,
                detail: format!("{label} exited {}", result.exit_code),
                log_file: result.log_file,
            });
        }
        ran.push(label);
    }
    let detail = if ran.is_empty() {
        "skipped: no workspace defines it".to_string()
    } else {
        ran.join(", ")
    };
    Ok(CheckResult {
        kind,
        ok: true,
        detail,
        log_file: None,
    })
}

pub(crate) fn lint_fix(ctx: &Context<'_>, scope: &[Workspace]) -> Result<CheckResult> {
    run_scripts(ctx, CheckKind::LintFix, scope, |ws| {
        ws.lint_fix_script()
            .map(|(s, extra)| (s.to_string(), extra.map(str::to_string)))
    })
}

pub(crate) fn typecheck(ctx: &Context<'_>, scope: &[Workspace]) -> Result<CheckResult> {
    run_scripts(ctx, CheckKind::Typecheck, scope, |ws| {
        ws.typecheck_script().map(|s| (s.to_string(), None))
    })
}

fn scoped_tests(ctx: &Context<'_>, scope: &[Workspace]) -> Result<CheckResult> {
    run_scripts(ctx, CheckKind::Tests, scope, |ws| {
        ws.test_script().map(|s| (s.to_string(), None))
    })
}

/// Unmerged paths or partially staged files fail the check. With
/// `expect_clean`, so does any remaining change.
pub fn dirty_index(ctx: &Context<'_>, opts: PrepushOptions) -> Result<CheckResult> {
    let changes = ctx.worktree_changes()?;
    let problem = if changes.unmerged > 0 {
        Some(format!("{} unmerged path(s)", changes.unmerged))
    } else if !changes.partially_staged.is_empty() {
        Some(format!(
            "partially staged: {}",
            changes.partially_staged.join(", ")
        ))
    } else if opts.expect_clean && changes.is_dirty() {
        Some(format!("uncommitted changes remain ({})", changes.describe()))
    } else {
        None
    };
    Ok(CheckResult {
        kind: CheckKind::DirtyIndex,
        ok: problem.is_none(),
        detail: problem.unwrap_or_else(|| format!("index consistent ({})", changes.describe())),
        log_file: None,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
