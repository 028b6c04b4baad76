//! The push flow: stash, rebase, branch negotiation, remediation, checks,
//! commit and push, as one gated sequence.
//!
//! Every abort leaves the tree recoverable: a failed rebase keeps the stash,
//! a failed stash apply keeps the stash entry, and nothing is pushed to a
//! protected branch.

use crate::answers::PushOptions;
use crate::commit_message::{CommitMessageProvider, CommitMessageRequest};
use crate::context::{command_failed, Context};
use crate::error::{Result, ShipitError};
use crate::policy;
use crate::prepush::{self, PrepushOptions, PrepushReport};
use crate::recorder::{summarize_commands, CommandTrail};
use crate::registry::alias;
use crate::remediation::{smart_build_fix, FixOptions};
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct PushReport {
    /// Branch at the end of the flow.
    pub branch: String,
    pub pushed: bool,
    pub committed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stash: Option<String>,
    pub remediation_ok: bool,
    /// Compacted successful commands; only filled when the push happened.
    pub commands: Vec<String>,
    pub note: String,
}

/// Run the whole flow. `options` are validated before anything runs.
pub fn run_push(
    ctx: &Context<'_>,
    options: &PushOptions,
    messages: &dyn CommitMessageProvider,
) -> Result<PushReport> {
    let options = options.clone().normalized()?;
    let trail = CommandTrail::start();
    let mut report = PushReport::default();

    // -- snapshot -----------------------------------------------------------
    let start_branch = ctx.current_branch()?;
    let user = ctx.resolve_user_name()?;
    tracing::info!(branch = %start_branch, %user, "push flow started");

    // -- stash --------------------------------------------------------------
    report.stash = stash_if_dirty(ctx, &start_branch)?;

    // -- rebase -------------------------------------------------------------
    let fetch = ctx.run(alias::GIT_FETCH, &[], "git fetch")?;
    if !fetch.ok {
        ctx.ui.warn("fetch failed; rebasing onto the last known remote state");
    }
    let upstream = ctx.default_remote_branch()?;
    let rebase = ctx.run(alias::GIT_REBASE, &[("upstream", upstream.as_str())], "git rebase")?;
    if !rebase.ok {
        if let Some(stash) = &report.stash {
            ctx.ui.warn(&format!(
                "your changes are still stashed in {stash}; resolve the rebase, then run `git stash apply {stash}`"
            ));
        }
        return Err(ShipitError::RebaseFailed {
            upstream,
            log: rebase.log_display(),
        });
    }
    ctx.ui.info(&format!("rebased onto {upstream}"));

    // -- restore stash ------------------------------------------------------
    if let Some(stash) = &report.stash {
        let apply = ctx.run(alias::GIT_STASH_APPLY, &[("stash", stash.as_str())], "git stash apply")?;
        if !apply.ok {
            return Err(ShipitError::StashRestore {
                stash_ref: stash.clone(),
            });
        }
        let dropped = ctx.run(alias::GIT_STASH_DROP, &[("stash", stash.as_str())], "git stash drop")?;
        if !dropped.ok {
            ctx.ui.warn(&format!("changes restored but {stash} could not be dropped"));
        }
    }

    // -- branch negotiation -------------------------------------------------
    report.created_branch = negotiate_branch(ctx, &start_branch, &user, &options)?;

    // -- remediation --------------------------------------------------------
    report.remediation_ok = remediate(ctx)?;

    // -- prepush checks, one retry ------------------------------------------
    let checks = prepush::run_prepush(ctx, PrepushOptions::default())?;
    if !checks.ok {
        ctx.ui.warn(&format!("{}; retrying after remediation", checks.describe()));
        report.remediation_ok = remediate(ctx)?;
        let retry = prepush::run_prepush(ctx, PrepushOptions::default())?;
        if !retry.ok {
            return Err(ShipitError::ChecksFailed(retry.describe()));
        }
    }
    ctx.ui.success("prepush checks passed");

    // -- commit -------------------------------------------------------------
    let branch = ctx.current_branch()?;
    report.committed = commit_if_dirty(ctx, &branch, &options, messages)?;

    // -- ahead/behind gate --------------------------------------------------
    if !report.committed {
        let status = ctx.branch_status()?;
        if status.ahead == 0 {
            report.branch = branch;
            report.note = "nothing to push: no local changes and no commits ahead".to_string();
            ctx.ui.success(&report.note);
            return Ok(report);
        }
        let question = format!(
            "{} has {} unpushed commit(s). Push now?",
            status.name, status.ahead
        );
        if !ctx.ui.confirm(&question, true) {
            report.branch = branch;
            report.note = "push declined".to_string();
            ctx.ui.info(&report.note);
            return Ok(report);
        }
    }

    // -- push guard and push -------------------------------------------------
    let branch = ctx.current_branch()?;
    ensure_pushable(ctx, &branch)?;
    let remote = ctx.registry.remote().to_string();
    ctx.require(
        alias::GIT_PUSH,
        &[("remote", remote.as_str()), ("branch", branch.as_str())],
        "git push",
    )?;

    report.commands = summarize_commands(&trail.records());
    report.pushed = true;
    report.note = format!("pushed {branch} to {remote}");
    report.branch = branch;
    ctx.ui.success(&report.note);
    for command in &report.commands {
        ctx.ui.info(&format!("  {command}"));
    }
    Ok(report)
}

fn stash_if_dirty(ctx: &Context<'_>, branch: &str) -> Result<Option<String>> {
    let changes = ctx.worktree_changes()?;
    if !changes.is_dirty() {
        return Ok(None);
    }
    let message = format!("shipit auto-stash on {branch} ({})", changes.describe());
    ctx.require(alias::GIT_STASH_PUSH, &[("message", message.as_str())], "git stash push")?;

    let list = ctx.run(alias::GIT_STASH_LIST, &[], "git stash list")?;
    let entries: Vec<(&str, &str)> = list
        .stdout
        .lines()
        .filter_map(|l| l.split_once('\t'))
        .collect();
    let stash = entries
        .iter()
        .find(|(_, subject)| subject.contains(&message))
        .or_else(|| entries.first())
        .map(|(r, _)| r.to_string())
        .unwrap_or_else(|| "stash@{0}".to_string());
    ctx.ui.info(&format!("stashed local changes as {stash} ({})", changes.describe()));
    Ok(Some(stash))
}

/// Create or switch to a policy-conforming branch when the current one is
/// protected or does not follow `<user>/<prefix>/<slug>`. Returns the new
/// branch name when one was created.
fn negotiate_branch(
    ctx: &Context<'_>,
    current: &str,
    user: &str,
    options: &PushOptions,
) -> Result<Option<String>> {
    let default_branch = ctx.default_branch_name()?;
    let protected = current == default_branch || ctx.config.is_protected(current);
    if !protected && policy::valid_feature_branch(current, user) {
        return Ok(None);
    }
    if protected {
        ctx.ui.info(&format!("{current} is protected; a feature branch is needed"));
    } else {
        ctx.ui.info(&format!(
            "{current} does not follow {user}/<prefix>/<name>; a feature branch is needed"
        ));
    }

    let prefix = match &options.branch_prefix {
        Some(p) => {
            ctx.ui.info(&format!("branch prefix: {p} (from options)"));
            p.clone()
        }
        None => {
            let question = format!("Branch type ({})", policy::allowed_prefixes_display());
            let answer = ctx.ui.input(&question, policy::DEFAULT_PREFIX);
            policy::validate_prefix(&answer).unwrap_or_else(|_| {
                ctx.ui.warn(&format!("'{answer}' is not a valid prefix; using {}", policy::DEFAULT_PREFIX));
                policy::DEFAULT_PREFIX.to_string()
            })
        }
    };
    let slug = match &options.branch_name {
        Some(n) => {
            ctx.ui.info(&format!("branch name: {n} (from options)"));
            n.clone()
        }
        None => {
            let answer = ctx.ui.input("Short branch name", policy::DEFAULT_SLUG);
            policy::validate_slug(&answer).unwrap_or_else(|_| {
                ctx.ui.warn(&format!("'{answer}' is not a valid name; using {}", policy::DEFAULT_SLUG));
                policy::DEFAULT_SLUG.to_string()
            })
        }
    };

    let branch = policy::branch_name(user, &prefix, &slug);
    let exists = ctx
        .run(alias::GIT_BRANCH_EXISTS, &[("branch", branch.as_str())], "git branch exists")?
        .ok;
    let checkout = if exists {
        alias::GIT_CHECKOUT
    } else {
        alias::GIT_CHECKOUT_NEW
    };
    ctx.require(checkout, &[("branch", branch.as_str())], "git checkout")?;
    ctx.ui.success(&format!("switched to {branch}"));
    Ok(Some(branch))
}

/// Run remediation; a blocked outcome aborts, any other failure is tolerated.
fn remediate(ctx: &Context<'_>) -> Result<bool> {
    let outcome = smart_build_fix(
        ctx,
        &FixOptions {
            skip_consult: !ctx.ui.interactive(),
            interactive: ctx.ui.interactive(),
            label: Some("push".to_string()),
        },
    )?;
    if let Some(message) = outcome.blocked_message {
        return Err(ShipitError::RebaseBlocked(message));
    }
    if !outcome.ok {
        ctx.ui.warn(&format!("{}; continuing to checks", outcome.summary));
    }
    Ok(outcome.ok)
}

fn commit_if_dirty(
    ctx: &Context<'_>,
    branch: &str,
    options: &PushOptions,
    messages: &dyn CommitMessageProvider,
) -> Result<bool> {
    if !ctx.worktree_changes()?.is_dirty() {
        return Ok(false);
    }
    ctx.require(alias::GIT_ADD_ALL, &[], "git add")?;

    let request = CommitMessageRequest {
        default_subject: format!("chore: update {}", policy::branch_slug(branch)),
        provided_subject: options.commit_first_line.clone(),
        provided_body: options.commit_body.clone(),
    };
    let message = messages.commit_message(&request, ctx.ui)?;
    let commit = match &message.body {
        Some(body) => ctx.run(
            alias::GIT_COMMIT_WITH_BODY,
            &[("subject", message.subject.as_str()), ("body", body.as_str())],
            "git commit",
        )?,
        None => ctx.run(
            alias::GIT_COMMIT,
            &[("subject", message.subject.as_str())],
            "git commit",
        )?,
    };
    if !commit.ok {
        return Err(command_failed("git commit", &commit));
    }
    ctx.ui.success(&format!("committed: {}", message.subject));

    let strict = PrepushOptions { expect_clean: true };
    let check = prepush::dirty_index(ctx, strict)?;
    if check.ok {
        return Ok(true);
    }

    ctx.ui.warn(&format!("{}; running lint-fix and type-check, then amending", check.detail));
    let report = recommit_fixes(ctx)?;
    if !report.ok {
        return Err(ShipitError::DirtyAfterCommit(report.describe()));
    }
    let check = prepush::dirty_index(ctx, strict)?;
    if !check.ok {
        return Err(ShipitError::DirtyAfterCommit(check.detail));
    }
    Ok(true)
}

/// Lint-fix and type-check the workspaces still dirty, stage, amend.
fn recommit_fixes(ctx: &Context<'_>) -> Result<PrepushReport> {
    let files = ctx.inventory.changed_files(ctx.exec, ctx.registry)?;
    let scope = ctx.inventory.changed_workspaces(&files)?;
    let mut report = PrepushReport::default();
    for check in [
        prepush::lint_fix(ctx, &scope)?,
        prepush::typecheck(ctx, &scope)?,
    ] {
        let ok = check.ok;
        report.checks.push(check);
        if !ok {
            return Ok(report);
        }
    }
    ctx.require(alias::GIT_ADD_ALL, &[], "git add")?;
    ctx.require(alias::GIT_COMMIT_AMEND, &[], "git commit --amend")?;
    report.ok = true;
    Ok(report)
}

/// Refuse protected targets regardless of how the flow got here.
pub(crate) fn ensure_pushable(ctx: &Context<'_>, branch: &str) -> Result<()> {
    if branch == "HEAD" || branch == ctx.default_branch_name()? || ctx.config.is_protected(branch) {
        return Err(ShipitError::ProtectedBranch(branch.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
