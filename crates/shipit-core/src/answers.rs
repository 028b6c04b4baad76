//! Push options and the answers file that can supply them.
//!
//! Three shapes are accepted (JSON or YAML):
//!
//! ```yaml
//! branchPrefix: feat            # flat, top level
//! ---
//! push:                         # flat, under `push`
//!   branchPrefix: feat
//! ---
//! push:                         # nested
//!   branch: { prefix: feat, name: login }
//!   commit: { subject: "feat: login", body: "..." }
//! ```

use crate::error::{Result, ShipitError};
use crate::policy;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_first_line: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_body: Option<String>,
}

impl PushOptions {
    /// Validate and normalize every supplied field. Runs before any side
    /// effect so a bad value fails fast.
    pub fn normalized(self) -> Result<Self> {
        Ok(Self {
            branch_prefix: self
                .branch_prefix
                .filter(|p| !p.trim().is_empty())
                .map(|p| policy::validate_prefix(&p))
                .transpose()?,
            branch_name: self
                .branch_name
                .filter(|n| !n.trim().is_empty())
                .map(|n| policy::validate_slug(&n))
                .transpose()?,
            commit_first_line: self
                .commit_first_line
                .map(|s| policy::validate_commit_subject(&s))
                .transpose()?,
            commit_body: self
                .commit_body
                .map(|b| b.trim().to_string())
                .filter(|b| !b.is_empty()),
        })
    }

    /// Fields set in `overrides` win.
    pub fn overlay(self, overrides: PushOptions) -> Self {
        Self {
            branch_prefix: overrides.branch_prefix.or(self.branch_prefix),
            branch_name: overrides.branch_name.or(self.branch_name),
            commit_first_line: overrides.commit_first_line.or(self.commit_first_line),
            commit_body: overrides.commit_body.or(self.commit_body),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct NestedBranch {
    prefix: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NestedCommit {
    subject: Option<String>,
    body: Option<String>,
}

/// Load and normalize push options from `path`.
pub fn load(path: &Path) -> Result<PushOptions> {
    let invalid = |reason: String| ShipitError::InvalidAnswers {
        path: path.display().to_string(),
        reason,
    };
    let text = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    let raw = parse(&text).map_err(invalid)?;
    raw.normalized()
}

/// Parse answers text without normalizing.
pub fn parse(text: &str) -> std::result::Result<PushOptions, String> {
    let doc: Value = serde_yaml::from_str(text).map_err(|e| e.to_string())?;
    let doc = match doc {
        Value::Null => return Ok(PushOptions::default()),
        Value::Mapping(_) => doc,
        _ => return Err("expected a mapping at the top level".to_string()),
    };
    let section = match doc.get("push") {
        Some(push @ Value::Mapping(_)) => push.clone(),
        Some(_) => return Err("`push` must be a mapping".to_string()),
        None => doc.clone(),
    };

    let mut options = PushOptions {
        branch_prefix: string_field(&section, "branchPrefix")?,
        branch_name: string_field(&section, "branchName")?,
        commit_first_line: string_field(&section, "commitFirstLine")?,
        commit_body: string_field(&section, "commitBody")?,
    };

    if let Some(branch) = section.get("branch") {
        let nested: NestedBranch =
            serde_yaml::from_value(branch.clone()).map_err(|e| format!("branch: {e}"))?;
        options.branch_prefix = options.branch_prefix.or(nested.prefix);
        options.branch_name = options.branch_name.or(nested.name);
    }
    if let Some(commit) = section.get("commit") {
        let nested: NestedCommit =
            serde_yaml::from_value(commit.clone()).map_err(|e| format!("commit: {e}"))?;
        options.commit_first_line = options.commit_first_line.or(nested.subject);
        options.commit_body = options.commit_body.or(nested.body);
    }
    Ok(options)
}

fn string_field(section: &Value, key: &str) -> std::result::Result<Option<String>, String> {
    match section.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(_) => Err(format!("`{key}` must be a string")),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    fn expected() -> PushOptions {
        PushOptions {
            branch_prefix: Some("feat".into()),
            branch_name: Some("test-foundations".into()),
            commit_first_line: Some("test: scaffold".into()),
            commit_body: Some("body".into()),
        }
    }

    #[test]
    fn nested_and_flat_shapes_normalize_identically() {
        let dir = TempDir::new().unwrap();
        let nested = write(
            &dir,
            "nested.yaml",
            "push:\n  branch:\n    prefix: feat\n    name: Test-Foundations\n  commit:\n    subject: 'test: scaffold'\n    body: body\n",
        );
        let flat = write(
            &dir,
            "flat.yaml",
            "branchPrefix: FEAT\nbranchName: Test-Foundations\ncommitFirstLine: 'test: scaffold'\ncommitBody: \"body\\n\"\n",
        );
        let under_push = write(
            &dir,
            "push.json",
            r#"{"push": {"branchPrefix": "feat", "branchName": "test foundations", "commitFirstLine": " test: scaffold ", "commitBody": "body"}}"#,
        );

        assert_eq!(load(&nested).unwrap(), expected());
        assert_eq!(load(&flat).unwrap(), expected());
        assert_eq!(load(&under_push).unwrap(), expected());
    }

    #[test]
    fn invalid_prefix_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.yaml", "branchPrefix: feature\n");
        assert!(matches!(
            load(&path),
            Err(ShipitError::InvalidBranchPrefix(..))
        ));
    }

    #[test]
    fn malformed_file_is_invalid_answers() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.yaml", "- just\n- a list\n");
        assert!(matches!(load(&path), Err(ShipitError::InvalidAnswers { .. })));
        let missing = dir.path().join("missing.yaml");
        assert!(matches!(
            load(&missing),
            Err(ShipitError::InvalidAnswers { .. })
        ));
    }

    #[test]
    fn empty_file_yields_empty_options() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.yaml", "");
        assert_eq!(load(&path).unwrap(), PushOptions::default());
    }

    #[test]
    fn overlay_prefers_overrides() {
        let base = expected();
        let merged = base.overlay(PushOptions {
            branch_name: Some("other".into()),
            ..Default::default()
        });
        assert_eq!(merged.branch_name.as_deref(), Some("other"));
        assert_eq!(merged.branch_prefix.as_deref(), Some("feat"));
    }
}
