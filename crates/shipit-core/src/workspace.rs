//! Workspace inventory: the buildable units of the repository.
//!
//! Discovery reads the root `package.json` (`workspaces` as a list or as
//! `{ packages: [...] }`) and `pnpm-workspace.yaml`. The inventory is built
//! once and cached until [`Inventory::invalidate`] is called.

use crate::error::Result;
use crate::exec::{ExecOptions, Executor};
use crate::git::WorktreeChanges;
use crate::paths;
use crate::registry::{alias, Registry};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Build scripts in preference order.
pub const BUILD_SCRIPT_PREFERENCE: &[&str] = &["build:ci", "build", "compile", "prepare"];
pub const TYPECHECK_SCRIPTS: &[&str] = &["typecheck", "type-check", "check-types", "tsc"];

// ---------------------------------------------------------------------------
// Workspace
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub name: String,
    /// Relative to the repository root; empty for the root workspace.
    pub location: PathBuf,
    pub scripts: BTreeMap<String, String>,
    pub is_root: bool,
}

impl Workspace {
    pub fn has_script(&self, name: &str) -> bool {
        self.scripts.contains_key(name)
    }

    /// `build:ci`, `build`, `compile`, `prepare`, else the first script whose
    /// name mentions build or compile.
    pub fn preferred_build_script(&self) -> Option<&str> {
        if let Some(s) = BUILD_SCRIPT_PREFERENCE
            .iter()
            .find(|s| self.scripts.contains_key(**s))
        {
            return Some(*s);
        }
        self.scripts
            .keys()
            .find(|k| k.contains("build") || k.contains("compile"))
            .map(String::as_str)
    }

    /// Script plus extra arguments for a lint-with-autofix run.
    pub fn lint_fix_script(&self) -> Option<(&str, Option<&str>)> {
        if self.has_script("lint:fix") {
            Some(("lint:fix", None))
        } else if self.has_script("lint") {
            Some(("lint", Some("--fix")))
        } else {
            None
        }
    }

    pub fn lint_script(&self) -> Option<&str> {
        self.has_script("lint").then_some("lint")
    }

    pub fn typecheck_script(&self) -> Option<&str> {
        TYPECHECK_SCRIPTS
            .iter()
            .find(|s| self.scripts.contains_key(**s))
            .copied()
    }

    /// The `test` script, unless it is a placeholder that tests nothing.
    pub fn test_script(&self) -> Option<&str> {
        match self.scripts.get("test") {
            Some(body) if !is_placeholder_script(body) => Some("test"),
            _ => None,
        }
    }

    /// Script names containing `keyword`, in name order.
    pub fn scripts_matching(&self, keyword: &str) -> Vec<&str> {
        self.scripts
            .keys()
            .filter(|k| k.contains(keyword))
            .map(String::as_str)
            .collect()
    }

    /// Scripts that never terminate on their own.
    pub fn is_long_running(&self, script: &str) -> bool {
        script.contains("watch")
            || script == "dev"
            || script == "start"
            || self
                .scripts
                .get(script)
                .is_some_and(|body| body.contains("--watch"))
    }

    pub fn display_location(&self) -> String {
        if self.is_root {
            ".".to_string()
        } else {
            self.location.display().to_string()
        }
    }

    /// Render a registry command that runs `script` in this workspace from
    /// the repository root. The command text names the workspace, so
    /// identical scripts in different workspaces stay distinct.
    pub fn run_command(
        &self,
        registry: &Registry,
        script: &str,
        extra: Option<&str>,
    ) -> Result<String> {
        let dir = self.location.to_string_lossy().into_owned();
        let dir = dir.as_str();
        match (self.is_root, extra) {
            (true, None) => registry.render(alias::PM_RUN, &[("script", script)]),
            (true, Some(args)) => {
                registry.render(alias::PM_RUN_ARGS, &[("script", script), ("args", args)])
            }
            (false, None) => registry.render(alias::PM_RUN_IN, &[("script", script), ("dir", dir)]),
            (false, Some(args)) => registry.render(
                alias::PM_RUN_IN_ARGS,
                &[("script", script), ("dir", dir), ("args", args)],
            ),
        }
    }
}

/// npm's "no test specified" stub, `exit 0`, `true`, a bare `echo`, or empty.
pub fn is_placeholder_script(body: &str) -> bool {
    let body = body.trim();
    body.is_empty()
        || body.contains("no test specified")
        || body == "exit 0"
        || body == "true"
        || body == ":"
        || (body.starts_with("echo")
            && !body.contains("&&")
            && !body.contains(';')
            && !body.contains("||"))
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

pub struct Inventory {
    root: PathBuf,
    cache: RefCell<Option<Vec<Workspace>>>,
}

impl Inventory {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            cache: RefCell::new(None),
        }
    }

    /// All workspaces, root first. Cached after the first call.
    pub fn list(&self) -> Result<Vec<Workspace>> {
        if let Some(cached) = self.cache.borrow().as_ref() {
            return Ok(cached.clone());
        }
        let discovered = discover(&self.root)?;
        tracing::debug!(count = discovered.len(), "workspace inventory built");
        *self.cache.borrow_mut() = Some(discovered.clone());
        Ok(discovered)
    }

    pub fn invalidate(&self) {
        self.cache.borrow_mut().take();
    }

    pub fn root_workspace(&self) -> Result<Workspace> {
        let all = self.list()?;
        Ok(all
            .into_iter()
            .find(|w| w.is_root)
            .unwrap_or_else(|| root_placeholder(&self.root)))
    }

    /// Paths with staged, unstaged or untracked changes.
    pub fn changed_files(&self, exec: &dyn Executor, registry: &Registry) -> Result<Vec<String>> {
        let cmd = registry.render(alias::GIT_STATUS, &[])?;
        let status = exec.execute(&cmd, "git status", &ExecOptions::silent());
        if !status.ok {
            tracing::warn!(stderr = %status.stderr.trim(), "git status failed; assuming no changes");
            return Ok(Vec::new());
        }
        Ok(WorktreeChanges::parse(&status.stdout).paths)
    }

    /// Workspaces touched by `files`.
    ///
    /// The root is included when some file is not under any sub-workspace,
    /// and always when no sub-workspace matched.
    pub fn changed_workspaces(&self, files: &[String]) -> Result<Vec<Workspace>> {
        let all = self.list()?;
        let mut touched: BTreeSet<usize> = BTreeSet::new();
        let mut unclaimed = false;

        for file in files {
            let file = Path::new(file);
            let mut claimed = false;
            for (i, ws) in all.iter().enumerate() {
                if !ws.is_root && file.starts_with(&ws.location) {
                    touched.insert(i);
                    claimed = true;
                }
            }
            unclaimed |= !claimed;
        }

        if touched.is_empty() || unclaimed {
            if let Some(i) = all.iter().position(|w| w.is_root) {
                touched.insert(i);
            }
        }
        Ok(touched.into_iter().map(|i| all[i].clone()).collect())
    }
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct PackageJson {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    scripts: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    workspaces: Option<WorkspacesField>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WorkspacesField {
    List(Vec<String>),
    Object {
        #[serde(default)]
        packages: Vec<String>,
    },
}

#[derive(Debug, Default, Deserialize)]
struct PnpmWorkspace {
    #[serde(default)]
    packages: Vec<String>,
}

fn read_package(dir: &Path) -> Result<Option<PackageJson>> {
    let path = paths::package_json(dir);
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(&path)?;
    Ok(Some(serde_json::from_str(&data)?))
}

fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string())
}

fn root_placeholder(root: &Path) -> Workspace {
    Workspace {
        name: dir_name(root),
        location: PathBuf::new(),
        scripts: BTreeMap::new(),
        is_root: true,
    }
}

fn to_workspace(dir: &Path, location: PathBuf, pkg: PackageJson, is_root: bool) -> Workspace {
    let scripts = pkg
        .scripts
        .into_iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
        .collect();
    Workspace {
        name: pkg.name.unwrap_or_else(|| dir_name(dir)),
        location,
        scripts,
        is_root,
    }
}

fn discover(root: &Path) -> Result<Vec<Workspace>> {
    let root_pkg = read_package(root)?.unwrap_or_default();

    let mut patterns: Vec<String> = match &root_pkg.workspaces {
        Some(WorkspacesField::List(l)) => l.clone(),
        Some(WorkspacesField::Object { packages }) => packages.clone(),
        None => Vec::new(),
    };
    let pnpm = root.join(paths::PNPM_WORKSPACE);
    if pnpm.exists() {
        let data = std::fs::read_to_string(&pnpm)?;
        let ws: PnpmWorkspace = serde_yaml::from_str(&data)?;
        patterns.extend(ws.packages);
    }

    let mut locations: BTreeSet<PathBuf> = BTreeSet::new();
    let mut excluded: BTreeSet<PathBuf> = BTreeSet::new();
    for pattern in &patterns {
        match pattern.strip_prefix('!') {
            Some(neg) => excluded.extend(expand_pattern(root, neg)),
            None => locations.extend(expand_pattern(root, pattern)),
        }
    }

    let mut workspaces = vec![to_workspace(root, PathBuf::new(), root_pkg, true)];
    for location in locations.difference(&excluded) {
        if location.as_os_str().is_empty() {
            continue;
        }
        let dir = root.join(location);
        if let Some(pkg) = read_package(&dir)? {
            workspaces.push(to_workspace(&dir, location.clone(), pkg, false));
        }
    }
    Ok(workspaces)
}

/// Expand a workspace glob into relative directories holding a package.json.
/// Supports literal segments, `*` inside a segment, and `**` for any depth.
fn expand_pattern(root: &Path, pattern: &str) -> Vec<PathBuf> {
    let cleaned = pattern.trim().trim_start_matches("./").trim_end_matches('/');
    let segments: Vec<&str> = cleaned.split('/').filter(|s| !s.is_empty()).collect();
    let mut out = Vec::new();
    expand_segments(root, PathBuf::new(), &segments, &mut out);
    out
}

fn expand_segments(dir: &Path, rel: PathBuf, segments: &[&str], out: &mut Vec<PathBuf>) {
    let Some((first, rest)) = segments.split_first() else {
        if paths::package_json(dir).exists() {
            out.push(rel);
        }
        return;
    };

    if *first == "**" {
        expand_segments(dir, rel.clone(), rest, out);
        for child in child_dirs(dir) {
            let name = dir_name(&child);
            expand_segments(&child, rel.join(&name), segments, out);
        }
    } else if first.contains('*') {
        let Some(re) = wildcard_re(first) else {
            return;
        };
        for child in child_dirs(dir) {
            let name = dir_name(&child);
            if re.is_match(&name) {
                expand_segments(&child, rel.join(&name), rest, out);
            }
        }
    } else {
        let child = dir.join(first);
        if child.is_dir() {
            expand_segments(&child, rel.join(first), rest, out);
        }
    }
}

/// Subdirectories, skipping `node_modules` and dot-directories.
fn child_dirs(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.path())
        .filter(|p| {
            let name = dir_name(p);
            name != "node_modules" && !name.starts_with('.')
        })
        .collect();
    dirs.sort();
    dirs
}

fn wildcard_re(segment: &str) -> Option<Regex> {
    let escaped = regex::escape(segment).replace(r"\*", ".*");
    Regex::new(&format!("^{escaped}$")).ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PackageManager;
    use tempfile::TempDir;

    fn write_pkg(dir: &Path, rel: &str, json: &str) {
        let d = dir.join(rel);
        std::fs::create_dir_all(&d).unwrap();
        std::fs::write(d.join("package.json"), json).unwrap();
    }

    fn ws(location: &str, scripts: &[(&str, &str)]) -> Workspace {
        Workspace {
            name: location.to_string(),
            location: PathBuf::from(location),
            scripts: scripts
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            is_root: location.is_empty(),
        }
    }

    fn monorepo() -> TempDir {
        let dir = TempDir::new().unwrap();
        write_pkg(
            dir.path(),
            "",
            r#"{"name":"mono","workspaces":["packages/*","apps/web","!packages/legacy"],"scripts":{"build":"turbo build"}}"#,
        );
        write_pkg(
            dir.path(),
            "packages/api",
            r#"{"name":"@mono/api","scripts":{"build":"tsc","test":"vitest run"}}"#,
        );
        write_pkg(dir.path(), "packages/ui", r#"{"name":"@mono/ui"}"#);
        write_pkg(dir.path(), "packages/legacy", r#"{"name":"@mono/legacy"}"#);
        write_pkg(dir.path(), "apps/web", r#"{"name":"web","scripts":{"compile":"next build"}}"#);
        std::fs::create_dir_all(dir.path().join("packages/no-manifest")).unwrap();
        dir
    }

    #[test]
    fn discovers_workspaces_with_exclusions() {
        let dir = monorepo();
        let inv = Inventory::new(dir.path());
        let names: Vec<String> = inv.list().unwrap().into_iter().map(|w| w.name).collect();
        assert_eq!(names, vec!["mono", "web", "@mono/api", "@mono/ui"]);
        let roots = inv.list().unwrap().iter().filter(|w| w.is_root).count();
        assert_eq!(roots, 1);
    }

    #[test]
    fn pnpm_workspace_file_and_object_form() {
        let dir = TempDir::new().unwrap();
        write_pkg(dir.path(), "", r#"{"name":"r","workspaces":{"packages":["libs/*"]}}"#);
        std::fs::write(dir.path().join("pnpm-workspace.yaml"), "packages:\n  - 'tools/**'\n").unwrap();
        write_pkg(dir.path(), "libs/a", r#"{"name":"a"}"#);
        write_pkg(dir.path(), "tools/x/y", r#"{"name":"y"}"#);
        write_pkg(dir.path(), "tools/node_modules/z", r#"{"name":"z"}"#);
        let inv = Inventory::new(dir.path());
        let names: Vec<String> = inv.list().unwrap().into_iter().map(|w| w.name).collect();
        assert_eq!(names, vec!["r", "a", "y"]);
    }

    #[test]
    fn root_without_package_json_still_has_root_workspace() {
        let dir = TempDir::new().unwrap();
        let inv = Inventory::new(dir.path());
        let all = inv.list().unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].is_root);
        assert!(all[0].scripts.is_empty());
    }

    #[test]
    fn cache_survives_until_invalidated() {
        let dir = monorepo();
        let inv = Inventory::new(dir.path());
        assert_eq!(inv.list().unwrap().len(), 4);
        write_pkg(dir.path(), "packages/new", r#"{"name":"new"}"#);
        assert_eq!(inv.list().unwrap().len(), 4);
        inv.invalidate();
        assert_eq!(inv.list().unwrap().len(), 5);
    }

    #[test]
    fn changed_workspaces_matches_by_location_prefix() {
        let dir = monorepo();
        let inv = Inventory::new(dir.path());
        let changed = inv
            .changed_workspaces(&["packages/api/src/index.ts".to_string()])
            .unwrap();
        let names: Vec<&str> = changed.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["@mono/api"]);
    }

    #[test]
    fn changed_workspaces_includes_root_when_nothing_else_matches() {
        let dir = monorepo();
        let inv = Inventory::new(dir.path());
        for files in [
            vec![],
            vec!["README.md".to_string()],
            vec!["packages/api-old/x.ts".to_string()],
        ] {
            let changed = inv.changed_workspaces(&files).unwrap();
            assert!(changed.iter().any(|w| w.is_root), "files: {files:?}");
        }
    }

    #[test]
    fn changed_workspaces_adds_root_for_unclaimed_files() {
        let dir = monorepo();
        let inv = Inventory::new(dir.path());
        let changed = inv
            .changed_workspaces(&["apps/web/page.tsx".into(), "turbo.json".into()])
            .unwrap();
        let names: Vec<&str> = changed.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["mono", "web"]);
    }

    #[test]
    fn preferred_build_script_order() {
        assert_eq!(
            ws("a", &[("build", "x"), ("build:ci", "y")]).preferred_build_script(),
            Some("build:ci")
        );
        assert_eq!(
            ws("a", &[("prepare", "x"), ("compile", "y")]).preferred_build_script(),
            Some("compile")
        );
        assert_eq!(
            ws("a", &[("bundle:compile-all", "x")]).preferred_build_script(),
            Some("bundle:compile-all")
        );
        assert_eq!(ws("a", &[("lint", "eslint")]).preferred_build_script(), None);
    }

    #[test]
    fn placeholder_test_scripts_are_ignored() {
        for body in [
            "echo \"Error: no test specified\" && exit 1",
            "exit 0",
            "echo skipping",
            "",
        ] {
            assert_eq!(ws("a", &[("test", body)]).test_script(), None, "{body}");
        }
        assert_eq!(ws("a", &[("test", "vitest run")]).test_script(), Some("test"));
        assert_eq!(
            ws("a", &[("test", "echo start && jest")]).test_script(),
            Some("test")
        );
    }

    #[test]
    fn run_command_names_the_workspace() {
        let registry = Registry::new(PackageManager::Npm, "origin");
        let root = ws("", &[("build", "tsc")]);
        let api = ws("packages/api", &[("build", "tsc")]);
        assert_eq!(root.run_command(&registry, "build", None).unwrap(), "npm run build");
        assert_eq!(
            api.run_command(&registry, "build", None).unwrap(),
            "npm run build --prefix packages/api"
        );
        assert_eq!(
            root.run_command(&registry, "lint", Some("--fix")).unwrap(),
            "npm run lint -- --fix"
        );
    }

    #[test]
    fn long_running_scripts_are_detected() {
        let w = ws("a", &[("clean:watch", "x"), ("clean", "rimraf dist"), ("fix", "eslint --watch")]);
        assert!(w.is_long_running("clean:watch"));
        assert!(w.is_long_running("fix"));
        assert!(!w.is_long_running("clean"));
    }
}
