//! Smart build remediation.
//!
//! [`smart_build_fix`] escalates through cheaper-to-costlier repairs and stops
//! at the first one that leaves the build passing:
//!
//! 1. fast path: fetch, rebase, then clean/install/build/lint/type-check the
//!    root workspace
//! 2. targeted build of every changed workspace
//! 3. heuristic remediation chosen from the failure text
//! 4. rebuild
//! 5. reinstall and rebuild
//! 6. deep clean (interactive, confirmed) and rebuild
//! 7. failure summary and assistant consultation
//!
//! Build failures are data. A failed rebase is the one terminal condition:
//! the outcome carries a `blocked_message` and no later phase runs.

use crate::assistant::{Consultation, LogExcerpt, REMEDIATION_QUESTION};
use crate::context::Context;
use crate::error::Result;
use crate::exec::{ExecOptions, ExecResult};
use crate::git::{rebase_marker, RebaseMarker};
use crate::recorder::{CommandRecord, CommandTrail};
use crate::registry::alias;
use crate::workspace::Workspace;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct FixOptions {
    /// Return the failure outcome without consulting the assistant.
    pub skip_consult: bool,
    /// Allow the confirmed deep-clean escalation.
    pub interactive: bool,
    /// Name of the calling operation, for logs.
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildFailure {
    /// `None` for failures not scoped to a workspace.
    pub workspace: Option<Workspace>,
    pub label: String,
    pub result: ExecResult,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RemediationOutcome {
    pub ok: bool,
    pub summary: String,
    pub steps: Vec<String>,
    pub failures: Vec<BuildFailure>,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_message: Option<String>,
    pub consulted: bool,
    pub commands: Vec<CommandRecord>,
}

impl RemediationOutcome {
    pub fn is_blocked(&self) -> bool {
        self.blocked_message.is_some()
    }
}

// ---------------------------------------------------------------------------
// Heuristics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RemediationAction {
    RegenerateClient,
    CleanBuildMetadata,
    ClearPackageCache,
    RunMigrations,
    /// Only selected when a custom remediation command is configured.
    CustomRemediation,
}

pub struct Heuristic {
    pub action: RemediationAction,
    /// Lowercase substrings; any match selects the action.
    pub patterns: &'static [&'static str],
}

pub const HEURISTICS: &[Heuristic] = &[
    Heuristic {
        action: RemediationAction::RegenerateClient,
        patterns: &["prisma", "generated client"],
    },
    Heuristic {
        action: RemediationAction::CleanBuildMetadata,
        patterns: &[
            "cannot find module",
            "module not found",
            "err_module_not_found",
            "could not resolve",
            "is not a module",
            "tsbuildinfo",
            "stale",
        ],
    },
    Heuristic {
        action: RemediationAction::ClearPackageCache,
        patterns: &["eintegrity", "integrity checksum", "enotcached", "cache"],
    },
    Heuristic {
        action: RemediationAction::RunMigrations,
        patterns: &["migrat"],
    },
    Heuristic {
        action: RemediationAction::CustomRemediation,
        patterns: &["docker", "econnrefused"],
    },
];

/// Keywords looked for in failure text to pick workspace scripts.
pub const DERIVED_KEYWORDS: &[&str] =
    &["cache", "migrate", "clean", "prisma", "rebuild", "docker", "lint"];

/// Keywords always tried.
pub const DEFAULT_KEYWORDS: &[&str] = &["fix", "clean", "prepare", "postinstall"];

/// Actions whose patterns match `text` (already lowercased), in table order.
pub fn select_actions(text: &str, custom_available: bool) -> Vec<RemediationAction> {
    HEURISTICS
        .iter()
        .filter(|h| h.action != RemediationAction::CustomRemediation || custom_available)
        .filter(|h| h.patterns.iter().any(|p| text.contains(p)))
        .map(|h| h.action)
        .collect()
}

/// Derived keywords present in `text`, plus the defaults.
pub fn derive_keywords(text: &str) -> BTreeSet<&'static str> {
    DERIVED_KEYWORDS
        .iter()
        .filter(|k| text.contains(**k))
        .chain(DEFAULT_KEYWORDS)
        .copied()
        .collect()
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Run the remediation pipeline. `Err` is reserved for configuration
/// problems such as an unknown command alias.
pub fn smart_build_fix(ctx: &Context<'_>, opts: &FixOptions) -> Result<RemediationOutcome> {
    let trail = CommandTrail::start();
    let mut engine = Engine::new(ctx, opts);
    tracing::info!(label = %engine.label, "remediation started");
    let mut outcome = engine.run()?;
    outcome.commands = trail.records();
    tracing::info!(
        label = %engine.label,
        ok = outcome.ok,
        attempts = outcome.attempts,
        blocked = outcome.is_blocked(),
        "remediation finished"
    );
    Ok(outcome)
}

struct BuildTarget {
    workspace: Option<Workspace>,
    command: String,
    label: String,
}

enum FastPath {
    Passed,
    FellThrough,
    Blocked(String),
}

struct Engine<'c> {
    ctx: &'c Context<'c>,
    opts: &'c FixOptions,
    label: String,
    steps: Vec<String>,
    failures: Vec<BuildFailure>,
    /// Failures of the most recent build pass.
    latest: Vec<BuildFailure>,
    attempts: u32,
    consulted: bool,
    /// Remediation commands already run, by literal command text.
    ran: HashSet<String>,
}

impl<'c> Engine<'c> {
    fn new(ctx: &'c Context<'c>, opts: &'c FixOptions) -> Self {
        Self {
            ctx,
            opts,
            label: opts.label.clone().unwrap_or_else(|| "fix".to_string()),
            steps: Vec::new(),
            failures: Vec::new(),
            latest: Vec::new(),
            attempts: 0,
            consulted: false,
            ran: HashSet::new(),
        }
    }

    fn run(&mut self) -> Result<RemediationOutcome> {
        match self.fast_path()? {
            FastPath::Passed => {
                return Ok(self.finish(true, "fast path passed: rebased and rebuilt the root workspace"))
            }
            FastPath::Blocked(message) => return Ok(self.blocked(message)),
            FastPath::FellThrough => {}
        }

        let targets = self.build_targets()?;
        if self.build_pass(&targets, "initial targeted build") {
            return Ok(self.finish(true, "targeted build passed"));
        }

        self.heuristic_remediation()?;
        if self.build_pass(&targets, "rebuild after remediation") {
            return Ok(self.finish(true, "build passed after heuristic remediation"));
        }

        let install = self.ctx.run(alias::PM_INSTALL, &[], "reinstall dependencies")?;
        if install.ok {
            self.step("reinstalled dependencies");
            if self.build_pass(&targets, "rebuild after reinstall") {
                return Ok(self.finish(true, "build passed after reinstalling dependencies"));
            }
        } else {
            self.step(format!(
                "dependency reinstall failed (exit {}); see {}",
                install.exit_code,
                install.log_display()
            ));
            self.record_failure(None, "reinstall dependencies", install);
        }

        if self.opts.interactive
            && self.deep_clean()?
            && self.build_pass(&targets, "rebuild after deep clean")
        {
            return Ok(self.finish(true, "build passed after a deep clean"));
        }

        Ok(self.exhausted())
    }

    // -- phase 1 ------------------------------------------------------------

    fn fast_path(&mut self) -> Result<FastPath> {
        let fetch = self.ctx.run(alias::GIT_FETCH, &[], "git fetch")?;
        if !fetch.ok {
            tracing::debug!(stderr = %fetch.stderr.trim(), "fetch failed; skipping fast path");
            self.step("fast path skipped: fetch failed");
            return Ok(FastPath::FellThrough);
        }

        let upstream = self.ctx.default_remote_branch()?;
        let rebase = self.ctx.run(
            alias::GIT_REBASE,
            &[("upstream", upstream.as_str())],
            "git rebase",
        )?;
        if !rebase.ok {
            let message = self.diagnose_rebase(&upstream, &rebase)?;
            return Ok(FastPath::Blocked(message));
        }
        self.step(format!("rebased onto {upstream}"));

        let root = self.ctx.inventory.root_workspace()?;
        let registry = self.ctx.registry;
        let mut chain = vec![
            (registry.render(alias::PM_CACHE_CLEAN, &[])?, "clean package cache".to_string(), false),
            (registry.render(alias::PM_INSTALL, &[])?, "install dependencies".to_string(), false),
        ];
        if let Some(script) = root.preferred_build_script() {
            chain.push((root.run_command(registry, script, None)?, format!("root {script}"), true));
        }
        for script in [root.lint_script(), root.typecheck_script()].into_iter().flatten() {
            chain.push((root.run_command(registry, script, None)?, format!("root {script}"), false));
        }

        for (command, label, is_build) in chain {
            if is_build {
                self.attempts += 1;
            }
            let result = self.ctx.exec.execute(&command, &label, &ExecOptions::default());
            if !result.ok {
                self.step(format!(
                    "fast path stopped at {label} (exit {}); falling back to targeted builds",
                    result.exit_code
                ));
                self.record_failure(Some(root.clone()), &label, result);
                return Ok(FastPath::FellThrough);
            }
        }
        Ok(FastPath::Passed)
    }

    fn diagnose_rebase(&mut self, upstream: &str, rebase: &ExecResult) -> Result<String> {
        let mut lines = vec![format!(
            "Rebase onto {upstream} failed; automated remediation stopped."
        )];

        let mut aborted = false;
        let marker = self.ctx.git_dir()?.as_deref().and_then(rebase_marker);
        if let Some(marker) = marker {
            let kind = match marker {
                RebaseMarker::Merge => "rebase-merge",
                RebaseMarker::Apply => "rebase-apply",
            };
            let abort = self.ctx.run(alias::GIT_REBASE_ABORT, &[], "git rebase abort")?;
            aborted = abort.ok;
            if aborted {
                lines.push(format!(
                    "The in-progress rebase ({kind}) was aborted and the working tree restored."
                ));
            } else {
                lines.push(format!(
                    "A rebase ({kind}) is still in progress and could not be aborted automatically."
                ));
            }
        }

        let branch = self.ctx.current_branch()?;
        if let Some((behind, ahead)) = self.ctx.ahead_behind(upstream)? {
            lines.push(format!(
                "{branch} is {ahead} commit(s) ahead and {behind} behind {upstream}."
            ));
        }

        lines.push("Recovery options:".to_string());
        if !aborted && marker.is_some() {
            lines.push("  abort:   git rebase --abort".to_string());
        }
        lines.push(format!(
            "  resolve: git rebase {upstream}, fix the conflicts, git add <files>, git rebase --continue"
        ));
        lines.push(format!(
            "  reset:   git reset --hard {upstream} (discards local commits)"
        ));
        lines.push(format!(
            "  replay:  git checkout -b {branch}-replay {upstream} && git cherry-pick {upstream}..{branch}"
        ));
        lines.push(format!("Log: {}", rebase.log_display()));

        self.step(format!("rebase onto {upstream} failed; remediation blocked"));
        tracing::warn!(%upstream, aborted, "rebase failed; remediation blocked");
        Ok(lines.join("\n"))
    }

    // -- phase 2, 4, 5, 6 ---------------------------------------------------

    fn build_targets(&mut self) -> Result<Vec<BuildTarget>> {
        let inventory = self.ctx.inventory;
        let files = inventory.changed_files(self.ctx.exec, self.ctx.registry)?;
        let changed = inventory.changed_workspaces(&files)?;

        let mut targets = Vec::new();
        for ws in changed {
            let Some(script) = ws.preferred_build_script().map(str::to_string) else {
                tracing::debug!(workspace = %ws.name, "no build script; skipped");
                continue;
            };
            targets.push(BuildTarget {
                command: ws.run_command(self.ctx.registry, &script, None)?,
                label: format!("{} {script}", ws.name),
                workspace: Some(ws),
            });
        }

        if targets.is_empty() {
            targets.push(BuildTarget {
                workspace: None,
                command: self.ctx.registry.render(alias::PM_RUN, &[("script", "build")])?,
                label: "root build".to_string(),
            });
            self.step("no changed workspace has a build script; using the root build");
        } else {
            let names: Vec<&str> = targets.iter().map(|t| t.label.as_str()).collect();
            self.step(format!("targeted build for {}", names.join(", ")));
        }
        Ok(targets)
    }

    fn build_pass(&mut self, targets: &[BuildTarget], phase: &str) -> bool {
        self.attempts += 1;
        self.latest.clear();
        for target in targets {
            let result = self
                .ctx
                .exec
                .execute(&target.command, &target.label, &ExecOptions::default());
            if !result.ok {
                self.record_failure(target.workspace.clone(), &target.label, result);
            }
        }
        let ok = self.latest.is_empty();
        let verdict = if ok {
            "passed".to_string()
        } else {
            format!("{} of {} target(s) failed", self.latest.len(), targets.len())
        };
        self.step(format!("{phase} (attempt {}): {verdict}", self.attempts));
        ok
    }

    fn deep_clean(&mut self) -> Result<bool> {
        let question = "Delete every build output directory, build-info cache and node_modules tree, then reinstall?";
        if !self.ctx.ui.confirm(question, false) {
            self.step("deep clean declined");
            return Ok(false);
        }
        for (alias, label) in [
            (alias::FIX_DEEP_CLEAN, "deep clean"),
            (alias::PM_INSTALL, "reinstall after deep clean"),
        ] {
            let result = self.ctx.run(alias, &[], label)?;
            if !result.ok {
                self.step(format!("{label} failed (exit {})", result.exit_code));
                self.record_failure(None, label, result);
                return Ok(false);
            }
        }
        self.step("deep clean and reinstall completed");
        Ok(true)
    }

    // -- phase 3 ------------------------------------------------------------

    fn heuristic_remediation(&mut self) -> Result<()> {
        let text = self
            .latest
            .iter()
            .map(|f| f.result.combined_output())
            .collect::<Vec<_>>()
            .join("\n")
            .to_lowercase();
        let registry = self.ctx.registry;
        let mut planned: Vec<(String, String)> = Vec::new();

        for action in select_actions(&text, registry.has(alias::FIX_CUSTOM)) {
            match action {
                RemediationAction::RegenerateClient => planned.push((
                    registry.render(alias::PM_PRISMA_GENERATE, &[])?,
                    "regenerate client".to_string(),
                )),
                RemediationAction::CleanBuildMetadata => planned.push((
                    registry.render(alias::FIX_BUILD_METADATA, &[])?,
                    "clean build metadata".to_string(),
                )),
                RemediationAction::ClearPackageCache => planned.push((
                    registry.render(alias::PM_CACHE_CLEAN, &[])?,
                    "clear package cache".to_string(),
                )),
                RemediationAction::RunMigrations => {
                    for ws in self.ctx.inventory.list()? {
                        for script in ws.scripts_matching("migrate") {
                            if !ws.is_long_running(script) {
                                planned.push((
                                    ws.run_command(registry, script, None)?,
                                    format!("{} {script}", ws.name),
                                ));
                            }
                        }
                    }
                }
                RemediationAction::CustomRemediation => planned.push((
                    registry.render(alias::FIX_CUSTOM, &[])?,
                    "custom remediation".to_string(),
                )),
            }
        }

        let keywords = derive_keywords(&text);
        for ws in self.failing_workspaces()? {
            let build = ws.preferred_build_script();
            for keyword in &keywords {
                for script in ws.scripts_matching(keyword) {
                    if ws.is_long_running(script) || Some(script) == build {
                        continue;
                    }
                    planned.push((
                        ws.run_command(registry, script, None)?,
                        format!("{} {script}", ws.name),
                    ));
                }
            }
        }

        if planned.is_empty() {
            self.step("no remediation heuristic matched the failure output");
            return Ok(());
        }

        for (command, label) in planned {
            if !self.ran.insert(command.clone()) {
                tracing::debug!(%command, "remediation command already ran; skipped");
                continue;
            }
            let result = self.ctx.exec.execute(&command, &label, &ExecOptions::default());
            if result.ok {
                self.step(format!("remediation: {label}"));
            } else {
                self.step(format!(
                    "remediation: {label} failed (exit {}); see {}",
                    result.exit_code,
                    result.log_display()
                ));
            }
        }
        Ok(())
    }

    /// Workspaces of the latest failures; the root stands in for failures
    /// that have none.
    fn failing_workspaces(&self) -> Result<Vec<Workspace>> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for failure in &self.latest {
            let ws = match &failure.workspace {
                Some(ws) => ws.clone(),
                None => self.ctx.inventory.root_workspace()?,
            };
            if seen.insert(ws.location.clone()) {
                out.push(ws);
            }
        }
        Ok(out)
    }

    // -- phase 7 ------------------------------------------------------------

    fn exhausted(&mut self) -> RemediationOutcome {
        let summary = self.failure_summary();
        if self.opts.skip_consult {
            self.step("assistant consultation skipped");
        } else {
            let consultation = Consultation {
                summary: summary.clone(),
                question: REMEDIATION_QUESTION.to_string(),
                logs: self
                    .latest
                    .iter()
                    .map(|f| LogExcerpt::from_output(f.label.clone(), &f.result.combined_output()))
                    .collect(),
            };
            self.ctx
                .assistant
                .consult(&consultation, self.ctx.ui, self.ctx.exec);
            self.consulted = true;
            self.step("consulted the assistant");
        }
        self.finish(false, summary)
    }

    fn failure_summary(&self) -> String {
        let mut workspaces: Vec<&str> = Vec::new();
        for failure in &self.failures {
            let name = failure
                .workspace
                .as_ref()
                .map(|w| w.name.as_str())
                .unwrap_or("root");
            if !workspaces.contains(&name) {
                workspaces.push(name);
            }
        }
        let latest: Vec<String> = self
            .latest
            .iter()
            .map(|f| {
                format!(
                    "{} (exit {}, log {})",
                    f.label,
                    f.result.exit_code,
                    f.result.log_display()
                )
            })
            .collect();
        format!(
            "Build still failing after {} attempt(s). Workspaces involved: {}. Latest failing targets: {}.",
            self.attempts,
            if workspaces.is_empty() { "none".to_string() } else { workspaces.join(", ") },
            if latest.is_empty() { "none".to_string() } else { latest.join("; ") },
        )
    }

    // -- bookkeeping --------------------------------------------------------

    fn step(&mut self, line: impl Into<String>) {
        let line = line.into();
        tracing::info!(label = %self.label, "{line}");
        self.ctx.ui.info(&line);
        self.steps.push(line);
    }

    fn record_failure(&mut self, workspace: Option<Workspace>, label: &str, result: ExecResult) {
        let failure = BuildFailure {
            workspace,
            label: label.to_string(),
            result,
        };
        self.latest.push(failure.clone());
        self.failures.push(failure);
    }

    fn finish(&mut self, ok: bool, summary: impl Into<String>) -> RemediationOutcome {
        RemediationOutcome {
            ok,
            summary: summary.into(),
            steps: std::mem::take(&mut self.steps),
            failures: std::mem::take(&mut self.failures),
            attempts: self.attempts,
            blocked_message: None,
            consulted: self.consulted,
            commands: Vec::new(),
        }
    }

    fn blocked(&mut self, message: String) -> RemediationOutcome {
        let mut outcome = self.finish(false, "blocked: the rebase needs manual resolution");
        outcome.blocked_message = Some(message);
        outcome
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::registry::Registry;
    use crate::testing::{FakeExecutor, Fixture};
    use crate::ui::ScriptedUi;

    const APP: &str = r#"{"name":"app","scripts":{"build":"tsc -b"}}"#;

    /// Fetch fails (offline) so the fast path is skipped; `git status`
    /// reports one modified root file; everything else succeeds unless
    /// `build` says otherwise.
    fn offline(mut build: impl FnMut() -> ExecResult + 'static) -> FakeExecutor {
        FakeExecutor::new(move |cmd| {
            if cmd.starts_with("git fetch") {
                ExecResult::failure(128, "fatal: unable to access remote")
            } else if cmd.starts_with("git status") {
                ExecResult::success(" M src/index.ts\n")
            } else if cmd == "npm run build" {
                build()
            } else {
                ExecResult::success("")
            }
        })
    }

    #[test]
    fn fails_once_then_succeeds_on_rebuild() {
        let mut builds = 0;
        let fx = Fixture::new(
            APP,
            offline(move || {
                builds += 1;
                if builds == 1 {
                    ExecResult::failure(2, "error TS2307: Cannot find module './generated'")
                } else {
                    ExecResult::success("built")
                }
            }),
        );

        let outcome = smart_build_fix(&fx.ctx(), &FixOptions::default()).unwrap();

        assert!(outcome.ok, "{outcome:#?}");
        assert_eq!(outcome.attempts, 2);
        assert_eq!(fx.exec.count("npm run build"), 2);
        let cleaned = fx.exec.position("rm -rf .turbo").unwrap();
        let commands = fx.exec.commands();
        let builds: Vec<usize> = commands
            .iter()
            .enumerate()
            .filter(|(_, c)| *c == "npm run build")
            .map(|(i, _)| i)
            .collect();
        assert!(builds[0] < cleaned && cleaned < builds[1]);
        assert!(!fx.exec.ran("npm install"));
        assert!(fx.assistant.consultations.borrow().is_empty());
        assert!(outcome.commands.iter().any(|r| r.command == "npm run build"));
    }

    #[test]
    fn fast_path_success_stops_early() {
        let fx = Fixture::new(
            r#"{"name":"app","scripts":{"build":"tsc -b","lint":"eslint .","typecheck":"tsc --noEmit"}}"#,
            FakeExecutor::succeeding(),
        );

        let outcome = smart_build_fix(&fx.ctx(), &FixOptions::default()).unwrap();

        assert!(outcome.ok);
        assert_eq!(outcome.attempts, 1);
        let order = [
            "git fetch",
            "git rebase --autostash origin/master",
            "npm cache clean",
            "npm install",
            "npm run build",
            "npm run lint",
            "npm run typecheck",
        ];
        let positions: Vec<usize> = order.iter().map(|n| fx.exec.position(n).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{:?}", fx.exec.commands());
        assert!(!fx.exec.ran("git status"));
    }

    #[test]
    fn rebase_failure_blocks_every_later_phase() {
        let fx = Fixture::new(
            APP,
            FakeExecutor::new(|cmd| {
                if cmd.starts_with("git rebase --autostash") {
                    ExecResult::failure(1, "CONFLICT (content): Merge conflict in src/index.ts")
                } else if cmd == "git rev-parse --git-dir" {
                    ExecResult::success(".git\n")
                } else if cmd.starts_with("git rev-list") {
                    ExecResult::success("3\t1\n")
                } else if cmd.contains("--abbrev-ref HEAD") {
                    ExecResult::success("alice/feat/login\n")
                } else {
                    ExecResult::success("")
                }
            }),
        );
        fx.write(".git/rebase-merge/head-name", "refs/heads/alice/feat/login");

        let outcome = smart_build_fix(&fx.ctx(), &FixOptions::default()).unwrap();

        assert!(!outcome.ok);
        let message = outcome.blocked_message.as_deref().unwrap();
        assert!(message.contains("origin/master"));
        assert!(message.contains("1 commit(s) ahead and 3 behind"));
        assert!(message.contains("was aborted"));
        assert!(fx.exec.ran("git rebase --abort"));

        let commands = fx.exec.commands();
        let blocked_at = fx.exec.position("git rebase --autostash").unwrap();
        for cmd in &commands[blocked_at + 1..] {
            assert!(cmd.starts_with("git "), "unexpected command after block: {cmd}");
            assert!(!cmd.contains("install") && !cmd.contains("run build"));
        }
        assert_eq!(outcome.attempts, 0);
        assert!(!outcome.consulted);
        assert!(fx.assistant.consultations.borrow().is_empty());
    }

    #[test]
    fn exhaustion_consults_assistant_with_log_excerpts() {
        let mut fx = Fixture::new(
            APP,
            offline(|| {
                ExecResult::failure(1, "Error: Cannot connect to the Docker daemon at unix:///var/run/docker.sock")
            }),
        );
        let mut config = Config::default();
        config.remediation.custom_command = Some("make services-up".into());
        fx.registry = Registry::from_config(&config, fx.dir.path());

        let outcome = smart_build_fix(&fx.ctx(), &FixOptions::default()).unwrap();

        assert!(!outcome.ok);
        assert!(outcome.consulted);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(fx.exec.count("make services-up"), 1);
        assert!(fx.exec.ran("npm install"));
        assert!(!fx.exec.ran("-name node_modules"), "deep clean needs interactive mode");

        let consultations = fx.assistant.consultations.borrow();
        assert_eq!(consultations.len(), 1);
        let c = &consultations[0];
        assert_eq!(c.question, REMEDIATION_QUESTION);
        assert!(c.summary.contains("3 attempt(s)"));
        assert_eq!(c.logs.len(), 1);
        assert!(c.logs[0].excerpt.contains("Docker daemon"));
    }

    #[test]
    fn skip_consult_returns_without_assistant() {
        let fx = Fixture::new(APP, offline(|| ExecResult::failure(1, "boom")));
        let opts = FixOptions {
            skip_consult: true,
            ..Default::default()
        };

        let outcome = smart_build_fix(&fx.ctx(), &opts).unwrap();

        assert!(!outcome.ok);
        assert!(!outcome.consulted);
        assert!(outcome.blocked_message.is_none());
        assert!(fx.assistant.consultations.borrow().is_empty());
    }

    #[test]
    fn remediation_commands_are_deduplicated_by_text() {
        let fx = Fixture::new(
            r#"{"name":"app","scripts":{"build":"tsc -b","db:migrate":"prisma migrate deploy"}}"#,
            offline(|| ExecResult::failure(1, "pending migration found; run migrate first")),
        );
        let opts = FixOptions {
            skip_consult: true,
            ..Default::default()
        };

        smart_build_fix(&fx.ctx(), &opts).unwrap();

        assert_eq!(fx.exec.count("npm run db:migrate"), 1);
    }

    #[test]
    fn confirmed_deep_clean_rebuilds() {
        let mut builds = 0;
        let fx = Fixture::new(
            APP,
            offline(move || {
                builds += 1;
                if builds < 4 {
                    ExecResult::failure(1, "tsc exited")
                } else {
                    ExecResult::success("")
                }
            }),
        )
        .with_ui(ScriptedUi::new().with_confirms([true]));
        let opts = FixOptions {
            interactive: true,
            ..Default::default()
        };

        let outcome = smart_build_fix(&fx.ctx(), &opts).unwrap();

        assert!(outcome.ok, "{outcome:#?}");
        assert_eq!(outcome.attempts, 4);
        assert!(fx.exec.ran("-name node_modules"));
    }

    #[test]
    fn declined_deep_clean_does_not_delete() {
        let fx = Fixture::new(APP, offline(|| ExecResult::failure(1, "tsc exited")))
            .with_ui(ScriptedUi::new().with_confirms([false]));
        let opts = FixOptions {
            interactive: true,
            skip_consult: true,
            label: Some("test".into()),
        };

        let outcome = smart_build_fix(&fx.ctx(), &opts).unwrap();

        assert!(!outcome.ok);
        assert!(!fx.exec.ran("-name node_modules"));
        assert!(outcome.steps.iter().any(|s| s == "deep clean declined"));
    }

    #[test]
    fn workspaces_without_build_scripts_fall_back_to_root_build() {
        let fx = Fixture::new(
            r#"{"name":"app","workspaces":["packages/*"],"scripts":{}}"#,
            FakeExecutor::new(|cmd| {
                if cmd.starts_with("git fetch") {
                    ExecResult::failure(1, "offline")
                } else if cmd.starts_with("git status") {
                    ExecResult::success(" M packages/docs/readme.md\n")
                } else {
                    ExecResult::success("")
                }
            }),
        );
        fx.write("packages/docs/package.json", r#"{"name":"docs","scripts":{"test":"echo none"}}"#);

        let outcome = smart_build_fix(&fx.ctx(), &FixOptions::default()).unwrap();

        assert!(outcome.ok);
        assert_eq!(outcome.attempts, 1);
        assert!(fx.exec.ran("npm run build"));
        assert!(outcome.failures.is_empty());
    }

    #[test]
    fn heuristics_select_from_table() {
        let text = "error: @prisma/client did not initialize yet; eintegrity checksum failed";
        assert_eq!(
            select_actions(text, false),
            vec![
                RemediationAction::RegenerateClient,
                RemediationAction::ClearPackageCache
            ]
        );
        assert!(select_actions("docker daemon not running", false).is_empty());
        assert_eq!(
            select_actions("docker daemon not running", true),
            vec![RemediationAction::CustomRemediation]
        );
    }

    #[test]
    fn keywords_union_defaults() {
        let k = derive_keywords("please rebuild the cache");
        for expected in ["rebuild", "cache", "fix", "clean", "prepare", "postinstall"] {
            assert!(k.contains(expected), "{expected}");
        }
        assert!(!k.contains("docker"));
    }
}
