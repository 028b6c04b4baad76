use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const SHIPIT_DIR: &str = ".shipit";
pub const LOG_DIR: &str = ".shipit/logs";
pub const CONFIG_FILE: &str = ".shipit/config.yaml";

pub const PACKAGE_JSON: &str = "package.json";
pub const PNPM_WORKSPACE: &str = "pnpm-workspace.yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn log_dir(root: &Path) -> PathBuf {
    root.join(LOG_DIR)
}

/// Whether a repository-relative path (as git prints it) is one of our logs.
pub fn is_log_path(rel: &str) -> bool {
    rel.strip_prefix(LOG_DIR)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// `~/.shipit/config.yaml`, if a home directory can be determined.
pub fn user_config_path() -> Option<PathBuf> {
    home::home_dir().map(|h| h.join(SHIPIT_DIR).join("config.yaml"))
}

pub fn package_json(dir: &Path) -> PathBuf {
    dir.join(PACKAGE_JSON)
}

/// Resolve the repository root.
///
/// Priority:
/// 1. `explicit` (the `--root` flag / `SHIPIT_ROOT`)
/// 2. Walk upward from `cwd` looking for `.git`
/// 3. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>, cwd: &Path) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let mut dir = cwd.to_path_buf();
    loop {
        // `.git` is a file inside worktrees and submodules
        if dir.join(".git").exists() {
            return dir;
        }
        match dir.parent() {
            Some(p) => dir = p.to_path_buf(),
            None => break,
        }
    }
    cwd.to_path_buf()
}
