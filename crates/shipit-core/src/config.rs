use crate::error::Result;
use crate::paths;
use crate::registry::PackageManager;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// RemediationConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemediationConfig {
    /// Project-specific repair command (e.g. `docker compose up -d db`).
    /// The Docker heuristic only fires when this is set.
    #[serde(default)]
    pub custom_command: Option<String>,
}

// ---------------------------------------------------------------------------
// AssistantBackend / AssistantConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantBackend {
    /// A local CLI that reads the prompt on stdin and answers on stdout.
    Local {
        #[serde(default = "default_local_command")]
        command: String,
        #[serde(default = "default_local_args")]
        args: Vec<String>,
    },
    /// An Anthropic-style messages endpoint.
    Remote {
        #[serde(default = "default_endpoint")]
        endpoint: String,
        #[serde(default = "default_model")]
        model: String,
        #[serde(default = "default_api_key_env")]
        api_key_env: String,
    },
}

fn default_local_command() -> String {
    "claude".to_string()
}

fn default_local_args() -> Vec<String> {
    vec!["--print".to_string()]
}

fn default_endpoint() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

impl Default for AssistantBackend {
    fn default() -> Self {
        AssistantBackend::Local {
            command: default_local_command(),
            args: default_local_args(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssistantConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub backend: AssistantBackend,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_timeout() -> u64 {
    120
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            backend: AssistantBackend::default(),
            timeout_secs: default_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Acting user name; overrides the git identity when set.
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default = "default_remote")]
    pub remote: String,
    /// Branch names that can never be pushed to, on top of `main` and `master`.
    #[serde(default)]
    pub protected_branches: Vec<String>,
    #[serde(default)]
    pub package_manager: Option<PackageManager>,
    #[serde(default)]
    pub remediation: RemediationConfig,
    /// Alias → template overrides for the command registry.
    #[serde(default)]
    pub commands: BTreeMap<String, String>,
    #[serde(default)]
    pub assistant: AssistantConfig,
}

fn default_remote() -> String {
    "origin".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user: None,
            remote: default_remote(),
            protected_branches: Vec::new(),
            package_manager: None,
            remediation: RemediationConfig::default(),
            commands: BTreeMap::new(),
            assistant: AssistantConfig::default(),
        }
    }
}

impl Config {
    /// Load `~/.shipit/config.yaml` overlaid by `<root>/.shipit/config.yaml`.
    /// Both files are optional.
    pub fn load(root: &Path) -> Result<Self> {
        let user = match paths::user_config_path() {
            Some(p) => read_layer(&p)?,
            None => None,
        };
        let repo = read_layer(&paths::config_path(root))?;
        Self::from_layers(user, repo)
    }

    /// Merge two optional YAML layers (later wins) and deserialize.
    pub fn from_layers(
        base: Option<serde_yaml::Value>,
        overlay: Option<serde_yaml::Value>,
    ) -> Result<Self> {
        let merged = match (base, overlay) {
            (None, None) => return Ok(Self::default()),
            (Some(b), None) => b,
            (None, Some(o)) => o,
            (Some(mut b), Some(o)) => {
                merge_yaml(&mut b, o);
                b
            }
        };
        Ok(serde_yaml::from_value(merged)?)
    }

    pub fn is_protected(&self, branch: &str) -> bool {
        branch == "main" || branch == "master" || self.protected_branches.iter().any(|b| b == branch)
    }
}

fn read_layer(path: &Path) -> Result<Option<serde_yaml::Value>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(path)?;
    if data.trim().is_empty() {
        return Ok(None);
    }
    tracing::debug!(path = %path.display(), "loading config layer");
    Ok(Some(serde_yaml::from_str(&data)?))
}

/// Deep-merge mappings; any other value in `overlay` replaces the base value.
fn merge_yaml(base: &mut serde_yaml::Value, overlay: serde_yaml::Value) {
    match (base, overlay) {
        (serde_yaml::Value::Mapping(b), serde_yaml::Value::Mapping(o)) => {
            for (k, v) in o {
                match b.get_mut(&k) {
                    Some(existing) => merge_yaml(existing, v),
                    None => {
                        b.insert(k, v);
                    }
                }
            }
        }
        (b, o) => *b = o,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
