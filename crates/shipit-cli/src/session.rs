//! Everything one invocation needs, built once and lent to the engine as a
//! [`Context`].

use anyhow::Context as _;
use shipit_assistant::Escalation;
use shipit_core::assistant::{Assistant, NoAssistant};
use shipit_core::config::Config;
use shipit_core::exec::ShellExecutor;
use shipit_core::paths;
use shipit_core::registry::Registry;
use shipit_core::workspace::Inventory;
use shipit_core::Context;
use std::path::{Path, PathBuf};

use crate::ui::TerminalUi;

/// Resolved global flags.
pub struct Globals {
    pub root: PathBuf,
    pub verbose: bool,
    pub json: bool,
    pub non_interactive: bool,
}

impl Globals {
    pub fn resolve(explicit: Option<&Path>, verbose: bool, json: bool, non_interactive: bool) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            root: paths::resolve_root(explicit, &cwd),
            verbose,
            json,
            non_interactive,
        }
    }
}

pub struct Session {
    pub root: PathBuf,
    pub config: Config,
    pub registry: Registry,
    pub exec: ShellExecutor,
    pub inventory: Inventory,
    pub ui: TerminalUi,
    assistant: Box<dyn Assistant>,
}

impl Session {
    pub fn open(globals: &Globals) -> anyhow::Result<Self> {
        let root = globals.root.clone();
        let config = Config::load(&root)
            .with_context(|| format!("failed to load config for {}", root.display()))?;
        let registry = Registry::from_config(&config, &root);
        tracing::debug!(root = %root.display(), pm = %registry.package_manager(), "session opened");

        let assistant: Box<dyn Assistant> = if config.assistant.enabled {
            Box::new(Escalation::from_config(&config.assistant))
        } else {
            Box::new(NoAssistant)
        };

        Ok(Self {
            exec: ShellExecutor::new(&root, globals.verbose),
            inventory: Inventory::new(&root),
            ui: TerminalUi::new(globals.non_interactive),
            root,
            config,
            registry,
            assistant,
        })
    }

    pub fn ctx(&self) -> Context<'_> {
        Context {
            root: &self.root,
            config: &self.config,
            registry: &self.registry,
            exec: &self.exec,
            inventory: &self.inventory,
            ui: &self.ui,
            assistant: self.assistant.as_ref(),
        }
    }
}
