//! Branch naming policy and acting-user resolution.
//!
//! Feature branches look like `<user>/<prefix>/<slug>` where `prefix` comes
//! from a fixed set and every segment is made of `[a-z0-9._-]`.

use crate::context::Context;
use crate::error::{Result, ShipitError};
use regex::Regex;

pub const ALLOWED_PREFIXES: &[&str] = &[
    "feat", "fix", "chore", "docs", "refactor", "test", "perf", "build", "ci", "style", "revert",
];

pub const DEFAULT_PREFIX: &str = "feat";
pub const DEFAULT_SLUG: &str = "work";

const MAX_SEGMENT_LEN: usize = 80;

/// Lowercase, turn whitespace into hyphens, keep only `[a-z0-9._-]`, collapse
/// repeated hyphens, trim leading/trailing hyphens, cap at 80 chars.
/// Idempotent.
pub fn sanitize_segment(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.trim().to_lowercase().chars() {
        let c = if c.is_whitespace() || c == '/' { '-' } else { c };
        let keep = c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-');
        if !keep || (c == '-' && out.ends_with('-')) {
            continue;
        }
        out.push(c);
    }
    let capped: String = out.trim_matches('-').chars().take(MAX_SEGMENT_LEN).collect();
    capped.trim_matches('-').to_string()
}

pub fn is_allowed_prefix(prefix: &str) -> bool {
    ALLOWED_PREFIXES.contains(&prefix)
}

pub fn allowed_prefixes_display() -> String {
    ALLOWED_PREFIXES.join(", ")
}

/// Validate a supplied prefix, normalising case and surrounding whitespace.
pub fn validate_prefix(prefix: &str) -> Result<String> {
    let normalized = prefix.trim().to_lowercase();
    if is_allowed_prefix(&normalized) {
        Ok(normalized)
    } else {
        Err(ShipitError::InvalidBranchPrefix(
            prefix.to_string(),
            allowed_prefixes_display(),
        ))
    }
}

/// Validate and sanitize a supplied branch slug.
pub fn validate_slug(slug: &str) -> Result<String> {
    let sanitized = sanitize_segment(slug);
    if sanitized.is_empty() {
        return Err(ShipitError::InvalidBranchName(slug.to_string()));
    }
    Ok(sanitized)
}

/// Commit subjects must be non-empty and single-line.
pub fn validate_commit_subject(subject: &str) -> Result<String> {
    let trimmed = subject.trim();
    if trimmed.is_empty() {
        return Err(ShipitError::InvalidCommitSubject(
            "subject must not be empty".into(),
        ));
    }
    if trimmed.contains('\n') || trimmed.contains('\r') {
        return Err(ShipitError::InvalidCommitSubject(
            "subject must be a single line".into(),
        ));
    }
    Ok(trimmed.to_string())
}

pub fn branch_name(user: &str, prefix: &str, slug: &str) -> String {
    format!("{user}/{prefix}/{slug}")
}

pub fn valid_feature_branch(branch: &str, user: &str) -> bool {
    let pattern = format!(
        r"^{}/({})/[a-z0-9._-]+$",
        regex::escape(user),
        ALLOWED_PREFIXES.join("|")
    );
    Regex::new(&pattern)
        .map(|re| re.is_match(branch))
        .unwrap_or(false)
}

/// Slug portion of a feature branch, or the sanitized branch itself.
pub fn branch_slug(branch: &str) -> String {
    let last = branch.rsplit('/').next().unwrap_or(branch);
    let slug = sanitize_segment(last);
    if slug.is_empty() {
        DEFAULT_SLUG.to_string()
    } else {
        slug
    }
}

impl Context<'_> {
    /// `SHIPIT_USER`, then config `user`, then `git config user.name`, then
    /// `$USER`; sanitized. Falls back to `dev`.
    pub fn resolve_user_name(&self) -> Result<String> {
        let candidates = [
            std::env::var("SHIPIT_USER").ok(),
            self.config.user.clone(),
            self.git_user_name()?,
            std::env::var("USER").ok(),
        ];
        Ok(candidates
            .into_iter()
            .flatten()
            .map(|c| sanitize_segment(&c))
            .find(|c| !c.is_empty())
            .unwrap_or_else(|| "dev".to_string()))
    }

    fn git_user_name(&self) -> Result<Option<String>> {
        let cmd = self
            .registry
            .render(crate::registry::alias::GIT_USER_NAME, &[])?;
        let r = self
            .exec
            .execute(&cmd, "git user name", &crate::exec::ExecOptions::silent());
        Ok(r.ok
            .then(|| r.stdout.trim().to_string())
            .filter(|s| !s.is_empty()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
