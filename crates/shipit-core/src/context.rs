//! The collaborators every engine operation needs, bundled by reference.

use crate::assistant::Assistant;
use crate::config::Config;
use crate::error::{Result, ShipitError};
use crate::exec::{ExecOptions, ExecResult, Executor};
use crate::registry::Registry;
use crate::ui::Ui;
use crate::workspace::Inventory;
use std::path::Path;

pub struct Context<'a> {
    pub root: &'a Path,
    pub config: &'a Config,
    pub registry: &'a Registry,
    pub exec: &'a dyn Executor,
    pub inventory: &'a Inventory,
    pub ui: &'a dyn Ui,
    pub assistant: &'a dyn Assistant,
}

impl Context<'_> {
    /// Render `alias` and execute it from the repository root.
    pub fn run(&self, alias: &str, args: &[(&str, &str)], label: &str) -> Result<ExecResult> {
        self.run_with(alias, args, label, &ExecOptions::default())
    }

    pub fn run_with(
        &self,
        alias: &str,
        args: &[(&str, &str)],
        label: &str,
        opts: &ExecOptions,
    ) -> Result<ExecResult> {
        let command = self.registry.render(alias, args)?;
        Ok(self.exec.execute(&command, label, opts))
    }

    /// Like [`Context::run`] but a non-zero exit becomes
    /// [`ShipitError::CommandFailed`].
    pub fn require(&self, alias: &str, args: &[(&str, &str)], label: &str) -> Result<ExecResult> {
        let result = self.run(alias, args, label)?;
        if result.ok {
            Ok(result)
        } else {
            Err(command_failed(label, &result))
        }
    }
}

pub(crate) fn command_failed(label: &str, result: &ExecResult) -> ShipitError {
    ShipitError::CommandFailed {
        label: label.to_string(),
        exit_code: result.exit_code,
        log: result.log_display(),
    }
}
