//! Scripted collaborators for driving the engine in unit tests.

use crate::assistant::{Assistant, Consultation};
use crate::config::Config;
use crate::context::Context;
use crate::exec::{ExecOptions, ExecResult, Executor};
use crate::registry::{PackageManager, Registry};
use crate::ui::{ScriptedUi, Ui};
use crate::workspace::Inventory;
use std::cell::RefCell;
use tempfile::TempDir;

type Handler = Box<dyn FnMut(&str) -> ExecResult>;

/// Answers every command from a closure and remembers what was run.
pub struct FakeExecutor {
    handler: RefCell<Handler>,
    commands: RefCell<Vec<String>>,
}

impl FakeExecutor {
    pub fn new(handler: impl FnMut(&str) -> ExecResult + 'static) -> Self {
        Self {
            handler: RefCell::new(Box::new(handler)),
            commands: RefCell::new(Vec::new()),
        }
    }

    /// Every command succeeds with empty output.
    pub fn succeeding() -> Self {
        Self::new(|_| ExecResult::success(""))
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }

    /// Index of the first command containing `needle`.
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.commands.borrow().iter().position(|c| c.contains(needle))
    }

    pub fn ran(&self, needle: &str) -> bool {
        self.position(needle).is_some()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.commands
            .borrow()
            .iter()
            .filter(|c| c.contains(needle))
            .count()
    }
}

impl Executor for FakeExecutor {
    fn spawn(&self, command: &str, _label: &str, _opts: &ExecOptions) -> ExecResult {
        self.commands.borrow_mut().push(command.to_string());
        (self.handler.borrow_mut())(command)
    }
}

#[derive(Default)]
pub struct RecordingAssistant {
    pub consultations: RefCell<Vec<Consultation>>,
}

impl Assistant for RecordingAssistant {
    fn consult(&self, consultation: &Consultation, _ui: &dyn Ui, _exec: &dyn Executor) {
        self.consultations.borrow_mut().push(consultation.clone());
    }
}

/// A temp repository root plus every collaborator a [`Context`] borrows.
pub struct Fixture {
    pub dir: TempDir,
    pub config: Config,
    pub registry: Registry,
    pub exec: FakeExecutor,
    pub inventory: Inventory,
    pub ui: ScriptedUi,
    pub assistant: RecordingAssistant,
}

impl Fixture {
    pub fn new(package_json: &str, exec: FakeExecutor) -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("package.json"), package_json).unwrap();
        let inventory = Inventory::new(dir.path());
        Self {
            dir,
            config: Config::default(),
            registry: Registry::new(PackageManager::Npm, "origin"),
            exec,
            inventory,
            ui: ScriptedUi::new(),
            assistant: RecordingAssistant::default(),
        }
    }

    pub fn with_ui(mut self, ui: ScriptedUi) -> Self {
        self.ui = ui;
        self
    }

    pub fn write(&self, rel: &str, body: &str) {
        let path = self.dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    pub fn ctx(&self) -> Context<'_> {
        Context {
            root: self.dir.path(),
            config: &self.config,
            registry: &self.registry,
            exec: &self.exec,
            inventory: &self.inventory,
            ui: &self.ui,
            assistant: &self.assistant,
        }
    }
}
