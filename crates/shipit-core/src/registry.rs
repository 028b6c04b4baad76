//! Command registry: the single table of named shell-command templates.
//!
//! Every shell invocation the engine makes is rendered from an alias here so
//! that git, package-manager, docker and remediation commands are defined in
//! one place. Templates use `{{name}}` placeholders; substituted values are
//! shell-quoted. `{{pm}}` and `{{remote}}` are always available.

use crate::error::{Result, ShipitError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Aliases
// ---------------------------------------------------------------------------

pub mod alias {
    pub const GIT_FETCH: &str = "git.fetch";
    pub const GIT_VERIFY_REF: &str = "git.verify_ref";
    pub const GIT_REBASE: &str = "git.rebase";
    pub const GIT_REBASE_ABORT: &str = "git.rebase_abort";
    pub const GIT_DIR: &str = "git.git_dir";
    pub const GIT_CURRENT_BRANCH: &str = "git.current_branch";
    pub const GIT_UPSTREAM: &str = "git.upstream";
    pub const GIT_AHEAD_BEHIND: &str = "git.ahead_behind";
    pub const GIT_STATUS: &str = "git.status";
    pub const GIT_STASH_PUSH: &str = "git.stash_push";
    pub const GIT_STASH_LIST: &str = "git.stash_list";
    pub const GIT_STASH_APPLY: &str = "git.stash_apply";
    pub const GIT_STASH_DROP: &str = "git.stash_drop";
    pub const GIT_BRANCH_EXISTS: &str = "git.branch_exists";
    pub const GIT_CHECKOUT: &str = "git.checkout";
    pub const GIT_CHECKOUT_NEW: &str = "git.checkout_new";
    pub const GIT_ADD_ALL: &str = "git.add_all";
    pub const GIT_COMMIT: &str = "git.commit";
    pub const GIT_COMMIT_WITH_BODY: &str = "git.commit_with_body";
    pub const GIT_COMMIT_AMEND: &str = "git.commit_amend";
    pub const GIT_PUSH: &str = "git.push";
    pub const GIT_USER_NAME: &str = "git.user_name";
    pub const GIT_UNMERGED: &str = "git.unmerged";

    pub const PM_INSTALL: &str = "pm.install";
    pub const PM_CACHE_CLEAN: &str = "pm.cache_clean";
    pub const PM_RUN: &str = "pm.run";
    pub const PM_RUN_IN: &str = "pm.run_in";
    pub const PM_RUN_ARGS: &str = "pm.run_args";
    pub const PM_RUN_IN_ARGS: &str = "pm.run_in_args";
    pub const PM_PRISMA_GENERATE: &str = "pm.prisma_generate";

    pub const DOCKER_INFO: &str = "docker.info";

    pub const FIX_BUILD_METADATA: &str = "remediation.clean_build_metadata";
    pub const FIX_DEEP_CLEAN: &str = "remediation.deep_clean";
    pub const FIX_CUSTOM: &str = "remediation.custom";
}

const COMMON: &[(&str, &str)] = &[
    (alias::GIT_FETCH, "git fetch --prune {{remote}}"),
    (alias::GIT_VERIFY_REF, "git rev-parse --verify --quiet {{ref}}"),
    (alias::GIT_REBASE, "git rebase --autostash {{upstream}}"),
    (alias::GIT_REBASE_ABORT, "git rebase --abort"),
    (alias::GIT_DIR, "git rev-parse --git-dir"),
    (alias::GIT_CURRENT_BRANCH, "git rev-parse --abbrev-ref HEAD"),
    (
        alias::GIT_UPSTREAM,
        "git rev-parse --abbrev-ref --symbolic-full-name @{u}",
    ),
    (
        alias::GIT_AHEAD_BEHIND,
        "git rev-list --left-right --count {{base}}...HEAD",
    ),
    (alias::GIT_STATUS, "git status --porcelain=v1 --untracked-files=all"),
    (
        alias::GIT_STASH_PUSH,
        "git stash push --include-untracked -m {{message}}",
    ),
    (alias::GIT_STASH_LIST, "git stash list --format=%gd%x09%s"),
    (alias::GIT_STASH_APPLY, "git stash apply {{stash}}"),
    (alias::GIT_STASH_DROP, "git stash drop {{stash}}"),
    (
        alias::GIT_BRANCH_EXISTS,
        "git rev-parse --verify --quiet refs/heads/{{branch}}",
    ),
    (alias::GIT_CHECKOUT, "git checkout {{branch}}"),
    (alias::GIT_CHECKOUT_NEW, "git checkout -b {{branch}}"),
    (alias::GIT_ADD_ALL, "git add -A"),
    (alias::GIT_COMMIT, "git commit -m {{subject}}"),
    (
        alias::GIT_COMMIT_WITH_BODY,
        "git commit -m {{subject}} -m {{body}}",
    ),
    (alias::GIT_COMMIT_AMEND, "git commit --amend --no-edit"),
    (alias::GIT_PUSH, "git push -u {{remote}} {{branch}}"),
    (alias::GIT_USER_NAME, "git config user.name"),
    (alias::GIT_UNMERGED, "git diff --name-only --diff-filter=U"),
    (alias::PM_INSTALL, "{{pm}} install"),
    (alias::PM_RUN, "{{pm}} run {{script}}"),
    (alias::PM_RUN_ARGS, "{{pm}} run {{script}} -- {{args}}"),
    (alias::DOCKER_INFO, "docker info --format {{format}}"),
    (
        alias::FIX_BUILD_METADATA,
        "rm -rf .turbo node_modules/.cache && find . -name '*.tsbuildinfo' -not -path '*/node_modules/*' -delete",
    ),
    (
        alias::FIX_DEEP_CLEAN,
        "find . -name node_modules -type d -prune -exec rm -rf {} + && \
         find . \\( -name dist -o -name build -o -name .next -o -name .turbo \\) -type d -prune -exec rm -rf {} + && \
         find . -name '*.tsbuildinfo' -delete",
    ),
];

// ---------------------------------------------------------------------------
// PackageManager
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Npm,
    Pnpm,
    Yarn,
    Bun,
}

impl PackageManager {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageManager::Npm => "npm",
            PackageManager::Pnpm => "pnpm",
            PackageManager::Yarn => "yarn",
            PackageManager::Bun => "bun",
        }
    }

    /// Detect from the lockfile in `root`, defaulting to npm.
    pub fn detect(root: &Path) -> Self {
        if root.join("pnpm-lock.yaml").exists() {
            PackageManager::Pnpm
        } else if root.join("yarn.lock").exists() {
            PackageManager::Yarn
        } else if root.join("bun.lockb").exists() || root.join("bun.lock").exists() {
            PackageManager::Bun
        } else {
            PackageManager::Npm
        }
    }

    fn template(&self, alias: &str) -> Option<&'static str> {
        use PackageManager::*;
        let t = match (alias, self) {
            (alias::PM_CACHE_CLEAN, Npm) => "npm cache clean --force",
            (alias::PM_CACHE_CLEAN, Pnpm) => "pnpm store prune",
            (alias::PM_CACHE_CLEAN, Yarn) => "yarn cache clean",
            (alias::PM_CACHE_CLEAN, Bun) => "bun pm cache rm",
            (alias::PM_RUN_IN, Npm) => "npm run {{script}} --prefix {{dir}}",
            (alias::PM_RUN_IN, Pnpm) => "pnpm --dir {{dir}} run {{script}}",
            (alias::PM_RUN_IN, Yarn) => "yarn --cwd {{dir}} run {{script}}",
            (alias::PM_RUN_IN, Bun) => "bun --cwd {{dir}} run {{script}}",
            (alias::PM_RUN_IN_ARGS, Npm) => "npm run {{script}} --prefix {{dir}} -- {{args}}",
            (alias::PM_RUN_IN_ARGS, Pnpm) => "pnpm --dir {{dir}} run {{script}} -- {{args}}",
            (alias::PM_RUN_IN_ARGS, Yarn) => "yarn --cwd {{dir}} run {{script}} -- {{args}}",
            (alias::PM_RUN_IN_ARGS, Bun) => "bun --cwd {{dir}} run {{script}} -- {{args}}",
            (alias::PM_PRISMA_GENERATE, Npm) => "npx prisma generate",
            (alias::PM_PRISMA_GENERATE, Pnpm) => "pnpm exec prisma generate",
            (alias::PM_PRISMA_GENERATE, Yarn) => "yarn prisma generate",
            (alias::PM_PRISMA_GENERATE, Bun) => "bunx prisma generate",
            _ => return None,
        };
        Some(t)
    }
}

impl std::fmt::Display for PackageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Registry {
    pm: PackageManager,
    remote: String,
    overrides: BTreeMap<String, String>,
}

static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();

fn placeholder_re() -> &'static Regex {
    PLACEHOLDER_RE.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").unwrap())
}

impl Registry {
    pub fn new(pm: PackageManager, remote: impl Into<String>) -> Self {
        Self {
            pm,
            remote: remote.into(),
            overrides: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &crate::config::Config, root: &Path) -> Self {
        let pm = config
            .package_manager
            .unwrap_or_else(|| PackageManager::detect(root));
        let mut registry = Self::new(pm, config.remote.clone());
        for (k, v) in &config.commands {
            registry.overrides.insert(k.clone(), v.clone());
        }
        if let Some(custom) = &config.remediation.custom_command {
            registry
                .overrides
                .insert(alias::FIX_CUSTOM.to_string(), custom.clone());
        }
        registry
    }

    pub fn package_manager(&self) -> PackageManager {
        self.pm
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// True if `alias` resolves to a template (built-in or configured).
    pub fn has(&self, alias: &str) -> bool {
        self.template(alias).is_some()
    }

    fn template(&self, alias: &str) -> Option<&str> {
        if let Some(t) = self.overrides.get(alias) {
            return Some(t.as_str());
        }
        if let Some(t) = self.pm.template(alias) {
            return Some(t);
        }
        COMMON
            .iter()
            .find(|(a, _)| *a == alias)
            .map(|(_, t)| *t)
    }

    /// Render `alias` with `args`. Every value is shell-quoted.
    pub fn render(&self, alias: &str, args: &[(&str, &str)]) -> Result<String> {
        let template = self
            .template(alias)
            .ok_or_else(|| ShipitError::UnknownCommand(alias.to_string()))?;

        let mut missing: Option<String> = None;
        let rendered = placeholder_re().replace_all(template, |caps: &regex::Captures| {
            let key = &caps[1];
            let value = match key {
                "pm" => Some(self.pm.as_str()),
                "remote" => Some(self.remote.as_str()),
                _ => args.iter().find(|(k, _)| *k == key).map(|(_, v)| *v),
            };
            match value {
                Some(v) => shell_quote(v),
                None => {
                    missing.get_or_insert_with(|| key.to_string());
                    String::new()
                }
            }
        });

        if let Some(placeholder) = missing {
            return Err(ShipitError::MissingPlaceholder {
                alias: alias.to_string(),
                placeholder,
            });
        }
        Ok(rendered.into_owned())
    }
}

/// Quote `value` for `sh`. Plain tokens are left bare.
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._/@:=+,-".contains(c));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn renders_common_git_template() {
        let r = Registry::new(PackageManager::Npm, "origin");
        assert_eq!(
            r.render(alias::GIT_PUSH, &[("branch", "alice/feat/x")]).unwrap(),
            "git push -u origin alice/feat/x"
        );
        assert_eq!(
            r.render(alias::GIT_UPSTREAM, &[]).unwrap(),
            "git rev-parse --abbrev-ref --symbolic-full-name @{u}"
        );
    }

    #[test]
    fn quotes_values_with_spaces_and_quotes() {
        let r = Registry::new(PackageManager::Npm, "origin");
        assert_eq!(
            r.render(alias::GIT_COMMIT, &[("subject", "fix: don't crash")])
                .unwrap(),
            r"git commit -m 'fix: don'\''t crash'"
        );
    }

    #[test]
    fn package_manager_specific_templates() {
        let npm = Registry::new(PackageManager::Npm, "origin");
        let pnpm = Registry::new(PackageManager::Pnpm, "origin");
        let args = [("script", "build"), ("dir", "packages/api")];
        assert_eq!(
            npm.render(alias::PM_RUN_IN, &args).unwrap(),
            "npm run build --prefix packages/api"
        );
        assert_eq!(
            pnpm.render(alias::PM_RUN_IN, &args).unwrap(),
            "pnpm --dir packages/api run build"
        );
        assert_eq!(pnpm.render(alias::PM_INSTALL, &[]).unwrap(), "pnpm install");
    }

    #[test]
    fn unknown_alias_and_missing_placeholder_are_errors() {
        let r = Registry::new(PackageManager::Npm, "origin");
        assert!(matches!(
            r.render("git.teleport", &[]),
            Err(ShipitError::UnknownCommand(_))
        ));
        assert!(matches!(
            r.render(alias::GIT_CHECKOUT_NEW, &[]),
            Err(ShipitError::MissingPlaceholder { placeholder, .. }) if placeholder == "branch"
        ));
    }

    #[test]
    fn custom_remediation_only_exists_when_configured() {
        let dir = TempDir::new().unwrap();
        let mut cfg = crate::config::Config::default();
        assert!(!Registry::from_config(&cfg, dir.path()).has(alias::FIX_CUSTOM));

        cfg.remediation.custom_command = Some("docker compose up -d".into());
        let r = Registry::from_config(&cfg, dir.path());
        assert_eq!(
            r.render(alias::FIX_CUSTOM, &[]).unwrap(),
            "docker compose up -d"
        );
    }

    #[test]
    fn config_overrides_replace_builtin_templates() {
        let dir = TempDir::new().unwrap();
        let mut cfg = crate::config::Config::default();
        cfg.commands
            .insert(alias::GIT_FETCH.into(), "git fetch {{remote}} --no-tags".into());
        cfg.remote = "upstream".into();
        let r = Registry::from_config(&cfg, dir.path());
        assert_eq!(
            r.render(alias::GIT_FETCH, &[]).unwrap(),
            "git fetch upstream --no-tags"
        );
    }

    #[test]
    fn detects_package_manager_from_lockfile() {
        let dir = TempDir::new().unwrap();
        assert_eq!(PackageManager::detect(dir.path()), PackageManager::Npm);
        std::fs::write(dir.path().join("yarn.lock"), "").unwrap();
        assert_eq!(PackageManager::detect(dir.path()), PackageManager::Yarn);
        std::fs::write(dir.path().join("pnpm-lock.yaml"), "").unwrap();
        assert_eq!(PackageManager::detect(dir.path()), PackageManager::Pnpm);
    }

    #[test]
    fn shell_quote_leaves_plain_tokens_bare() {
        assert_eq!(shell_quote("origin/main"), "origin/main");
        assert_eq!(shell_quote("stash@{0}"), "'stash@{0}'");
        assert_eq!(shell_quote(""), "''");
    }
}
