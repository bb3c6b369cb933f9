//! Run configuration shared across the whole run tree.
//!
//! A [`RunConfig`] is created once per run (usually from the command line or
//! by the embedding host), wrapped in an `Arc`, and handed by reference to
//! every process and dependency the container creates. It is immutable after
//! construction except for the two description fields and the extension map,
//! which live behind `RwLock` cells so the tree stays `Send`.

use camino::Utf8Path;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::sync::{Arc, RwLock};

use crate::error::{EngineError, Result};

/// Execution context selecting which handler implementation is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunMode {
    /// Plain terminal run, colored output.
    #[default]
    Terminal = 0,
    /// Run hosted inside another tool's terminal (batch runners etc.).
    ParentTerminal = 1,
    /// Run driven by a graphical host.
    Gui = 2,
}

impl RunMode {
    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Handler preference order for this mode. The configured mode is tried
    /// first; the remaining modes are consulted in this fixed order when the
    /// preferred slot carries no handler.
    pub fn preference_order(self) -> [RunMode; 3] {
        match self {
            RunMode::Terminal => [RunMode::Terminal, RunMode::ParentTerminal, RunMode::Gui],
            RunMode::ParentTerminal => [RunMode::ParentTerminal, RunMode::Terminal, RunMode::Gui],
            RunMode::Gui => [RunMode::Gui, RunMode::Terminal, RunMode::ParentTerminal],
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Terminal => write!(f, "terminal"),
            RunMode::ParentTerminal => write!(f, "parent terminal"),
            RunMode::Gui => write!(f, "gui"),
        }
    }
}

impl TryFrom<u8> for RunMode {
    type Error = EngineError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(RunMode::Terminal),
            1 => Ok(RunMode::ParentTerminal),
            2 => Ok(RunMode::Gui),
            other => Err(EngineError::Container(format!(
                "unknown run mode: {other}"
            ))),
        }
    }
}

/// Which phases are executed for a given run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunLevel {
    /// Pre dependencies, process bodies and post dependencies.
    #[default]
    All = 0,
    PreDependenciesOnly = 1,
    PostDependenciesOnly = 2,
    PreAndPostDependenciesOnly = 3,
    ProcessOnly = 4,
    ProcessAndPostDependenciesOnly = 5,
}

impl RunLevel {
    pub fn includes_pre_dependencies(self) -> bool {
        matches!(
            self,
            RunLevel::All | RunLevel::PreDependenciesOnly | RunLevel::PreAndPostDependenciesOnly
        )
    }

    pub fn includes_process(self) -> bool {
        matches!(
            self,
            RunLevel::All | RunLevel::ProcessOnly | RunLevel::ProcessAndPostDependenciesOnly
        )
    }

    pub fn includes_post_dependencies(self) -> bool {
        matches!(
            self,
            RunLevel::All
                | RunLevel::PostDependenciesOnly
                | RunLevel::PreAndPostDependenciesOnly
                | RunLevel::ProcessAndPostDependenciesOnly
        )
    }

    /// Whether dependency failure messages are surfaced under this level.
    pub(crate) fn shows_dependency_failures(self) -> bool {
        matches!(
            self,
            RunLevel::All
                | RunLevel::PreDependenciesOnly
                | RunLevel::PostDependenciesOnly
                | RunLevel::PreAndPostDependenciesOnly
        )
    }

    /// Whether process failure messages are surfaced under this level.
    pub(crate) fn shows_process_failures(self) -> bool {
        matches!(self, RunLevel::All | RunLevel::ProcessOnly)
    }
}

impl TryFrom<u8> for RunLevel {
    type Error = EngineError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(RunLevel::All),
            1 => Ok(RunLevel::PreDependenciesOnly),
            2 => Ok(RunLevel::PostDependenciesOnly),
            3 => Ok(RunLevel::PreAndPostDependenciesOnly),
            4 => Ok(RunLevel::ProcessOnly),
            5 => Ok(RunLevel::ProcessAndPostDependenciesOnly),
            other => Err(EngineError::Container(format!(
                "unknown run level: {other}"
            ))),
        }
    }
}

/// Which message categories are forwarded to the event sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DisplayMessages {
    None = 0,
    #[default]
    All = 1,
    Info = 2,
    Success = 3,
    Warning = 4,
    Failure = 5,
}

impl TryFrom<u8> for DisplayMessages {
    type Error = EngineError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(DisplayMessages::None),
            1 => Ok(DisplayMessages::All),
            2 => Ok(DisplayMessages::Info),
            3 => Ok(DisplayMessages::Success),
            4 => Ok(DisplayMessages::Warning),
            5 => Ok(DisplayMessages::Failure),
            other => Err(EngineError::Container(format!(
                "unknown display messages value: {other}"
            ))),
        }
    }
}

/// Configuration shared by the container and every process and dependency it
/// creates.
///
/// One instance exists per run, owned behind an [`Arc`]. The run mode, run
/// level, filter lists and policy flags are fixed at construction; the user
/// and ignore descriptions and the extension map remain writable because
/// collaborators fill them in after the tree is built (a GUI prompting for a
/// description, a data file overlay).
#[derive(Debug)]
pub struct RunConfig {
    run_mode: RunMode,
    run_level: RunLevel,

    processes_to_run: IndexSet<String>,
    processes_to_ignore: IndexSet<String>,

    ignore_failed_pre_dependencies: bool,
    ignore_failed_post_dependencies: bool,

    raise_exceptions: bool,
    display_messages: DisplayMessages,

    user_description: RwLock<Option<String>>,
    ignore_description: RwLock<Option<String>>,

    /// Custom data used by collaborators, keyed by name. Registration order
    /// is preserved so overlay documents replay deterministically.
    extension: RwLock<IndexMap<String, Value>>,
}

/// Shared handle to the per-run configuration.
pub type SharedConfig = Arc<RunConfig>;

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig::builder().build()
    }
}

impl RunConfig {
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder::default()
    }

    /// Wrap this configuration for sharing across the run tree.
    pub fn shared(self) -> SharedConfig {
        Arc::new(self)
    }

    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    pub fn run_level(&self) -> RunLevel {
        self.run_level
    }

    pub fn processes_to_run(&self) -> &IndexSet<String> {
        &self.processes_to_run
    }

    pub fn processes_to_ignore(&self) -> &IndexSet<String> {
        &self.processes_to_ignore
    }

    pub fn ignore_failed_pre_dependencies(&self) -> bool {
        self.ignore_failed_pre_dependencies
    }

    pub fn ignore_failed_post_dependencies(&self) -> bool {
        self.ignore_failed_post_dependencies
    }

    pub fn raise_exceptions(&self) -> bool {
        self.raise_exceptions
    }

    pub fn display_messages(&self) -> DisplayMessages {
        self.display_messages
    }

    pub fn user_description(&self) -> Option<String> {
        self.user_description.read().unwrap().clone()
    }

    pub fn set_user_description(&self, description: impl Into<String>) {
        *self.user_description.write().unwrap() = Some(description.into());
    }

    pub fn ignore_description(&self) -> Option<String> {
        self.ignore_description.read().unwrap().clone()
    }

    pub fn set_ignore_description(&self, description: impl Into<String>) {
        *self.ignore_description.write().unwrap() = Some(description.into());
    }

    /// Look up a value in the extension map.
    pub fn extension_value(&self, key: &str) -> Option<Value> {
        self.extension.read().unwrap().get(key).cloned()
    }

    /// Insert or replace a value in the extension map.
    pub fn set_extension_value(&self, key: impl Into<String>, value: Value) {
        self.extension.write().unwrap().insert(key.into(), value);
    }

    /// Clone the current extension map contents.
    pub fn extension_snapshot(&self) -> IndexMap<String, Value> {
        self.extension.read().unwrap().clone()
    }

    /// Merge entries into the extension map, overwriting same-named keys.
    pub fn merge_extension(&self, entries: IndexMap<String, Value>) {
        let mut extension = self.extension.write().unwrap();
        for (key, value) in entries {
            extension.insert(key, value);
        }
    }

    /// Load a JSON overlay document and merge it into the extension map.
    ///
    /// The file must exist; its top-level object keys overwrite same-named
    /// extension entries.
    pub fn load_overlay(&self, path: &Utf8Path) -> Result<()> {
        if !path.exists() {
            return Err(EngineError::DataFileDoesNotExist(path.to_path_buf()));
        }

        let raw = fs::read_to_string(path)?;
        let document: IndexMap<String, Value> = serde_json::from_str(&raw)?;

        tracing::info!("merging {} overlay entries from {}", document.len(), path);
        self.merge_extension(document);

        Ok(())
    }
}

/// Builder for [`RunConfig`].
#[derive(Debug, Default)]
pub struct RunConfigBuilder {
    run_mode: RunMode,
    run_level: RunLevel,
    processes_to_run: IndexSet<String>,
    processes_to_ignore: IndexSet<String>,
    ignore_failed_pre_dependencies: bool,
    ignore_failed_post_dependencies: bool,
    raise_exceptions: bool,
    display_messages: DisplayMessages,
    user_description: Option<String>,
    ignore_description: Option<String>,
}

impl RunConfigBuilder {
    pub fn run_mode(mut self, mode: RunMode) -> Self {
        self.run_mode = mode;
        self
    }

    pub fn run_level(mut self, level: RunLevel) -> Self {
        self.run_level = level;
        self
    }

    pub fn processes_to_run<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.processes_to_run = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn processes_to_ignore<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.processes_to_ignore = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn ignore_failed_pre_dependencies(mut self, value: bool) -> Self {
        self.ignore_failed_pre_dependencies = value;
        self
    }

    pub fn ignore_failed_post_dependencies(mut self, value: bool) -> Self {
        self.ignore_failed_post_dependencies = value;
        self
    }

    pub fn raise_exceptions(mut self, value: bool) -> Self {
        self.raise_exceptions = value;
        self
    }

    pub fn display_messages(mut self, value: DisplayMessages) -> Self {
        self.display_messages = value;
        self
    }

    pub fn user_description(mut self, description: impl Into<String>) -> Self {
        self.user_description = Some(description.into());
        self
    }

    pub fn ignore_description(mut self, description: impl Into<String>) -> Self {
        self.ignore_description = Some(description.into());
        self
    }

    pub fn build(self) -> RunConfig {
        RunConfig {
            run_mode: self.run_mode,
            run_level: self.run_level,
            processes_to_run: self.processes_to_run,
            processes_to_ignore: self.processes_to_ignore,
            ignore_failed_pre_dependencies: self.ignore_failed_pre_dependencies,
            ignore_failed_post_dependencies: self.ignore_failed_post_dependencies,
            raise_exceptions: self.raise_exceptions,
            display_messages: self.display_messages,
            user_description: RwLock::new(self.user_description),
            ignore_description: RwLock::new(self.ignore_description),
            extension: RwLock::new(IndexMap::new()),
        }
    }
}
