//! Top-level orchestrator owning a discovered list of processes and driving
//! their phased execution.
//!
//! A container is built once: construction resolves its process manifest
//! against the registry, applies the discovery filters and hooks, and leaves
//! the container either initialized or carrying a failure message. `run`
//! then walks the phases the run level selects — pre dependencies, process
//! bodies, post dependencies — short-circuiting on the first failed phase.

use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::sync::Arc;

use crate::config::{DisplayMessages, RunConfig, RunLevel, RunMode, SharedConfig};
use crate::display::default_sink;
use crate::error::{DispatchPhase, EngineError, ErrorScope, Result};
use crate::events::{EventSink, Messenger};

use super::process::Process;
use super::registry::{ProcessFactory, Registry};
use super::ModeTable;

const CONTAINER_RULE_WIDTH: usize = 104;
const SECTION_RULE_WIDTH: usize = 100;

/// Container banner for a run mode. GUI hosts draw their own chrome, so the
/// banner is empty there.
fn container_header(mode: RunMode, text: &str) -> String {
    match mode {
        RunMode::Gui => String::new(),
        RunMode::Terminal | RunMode::ParentTerminal => {
            let rule = "-".repeat(CONTAINER_RULE_WIDTH);
            format!("\n{rule}\n{text}\n{rule}")
        }
    }
}

/// Process / dependency section banner for a run mode.
fn section_header(mode: RunMode, text: &str) -> String {
    let rule = "-".repeat(SECTION_RULE_WIDTH);
    match mode {
        RunMode::Gui => format!("{rule}\n{text}\n{rule}"),
        RunMode::Terminal | RunMode::ParentTerminal => format!("\n    {text}\n    {rule}"),
    }
}

/// Discovery callbacks a container may install around its process
/// initialization.
#[derive(Default)]
pub struct ContainerHooks {
    /// Invoked once before any process candidate is visited.
    pub before_processes: Option<Box<dyn FnMut() + Send>>,
    /// Invoked once after all candidates were visited.
    pub after_processes: Option<Box<dyn FnMut() + Send>>,
    /// Veto hook per candidate factory; `false` skips it without
    /// construction.
    pub before_each: Option<Box<dyn FnMut(&ProcessFactory) -> bool + Send>>,
    /// Veto hook per constructed instance; `false` rejects it.
    pub after_each: Option<Box<dyn FnMut(&Process) -> bool + Send>>,
    /// Reorder the accumulated list; discovery order is kept when absent.
    pub sort: Option<Box<dyn FnMut(&mut Vec<Process>) + Send>>,
}

/// What a custom process initializer sees.
pub struct ProcessInitContext<'a> {
    pub processes: &'a mut Vec<Process>,
    config: &'a SharedConfig,
    messenger: &'a Messenger,
}

impl ProcessInitContext<'_> {
    pub fn config(&self) -> &SharedConfig {
        self.config
    }

    pub fn messenger(&self) -> &Messenger {
        self.messenger
    }
}

/// How a container populates its process list for one run mode.
pub enum ProcessInitializer {
    /// Walk the registry manifest named by the container.
    FromManifest,
    /// Populate the list directly.
    Custom(Box<dyn FnMut(&mut ProcessInitContext<'_>) -> Result<()> + Send>),
}

/// What a custom container runner sees.
pub struct ContainerRunContext<'a> {
    name: &'a str,
    pub processes: &'a mut Vec<Process>,
    config: &'a SharedConfig,
    messenger: &'a Messenger,
}

impl ContainerRunContext<'_> {
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn config(&self) -> &SharedConfig {
        self.config
    }

    pub fn messenger(&self) -> &Messenger {
        self.messenger
    }
}

/// How a container executes its phases for one run mode.
pub enum ContainerRunner {
    /// The canonical phased runner.
    Builtin,
    /// A caller-supplied runner (a GUI driving processes one at a time).
    Custom(Box<dyn FnMut(&mut ContainerRunContext<'_>) -> Result<bool> + Send>),
}

type RunGate = Box<dyn FnMut() -> Result<bool> + Send>;
type InitGate = Box<dyn Fn(&RunConfig) -> Result<bool> + Send>;

/// Top-level orchestrator for one run.
pub struct Container {
    name: String,
    description: String,
    requires_user_description: bool,

    process_manifest: Option<String>,
    process_list: Vec<Process>,

    has_initialized: bool,
    have_processes_initialized: bool,

    data_file: Option<Utf8PathBuf>,

    config: SharedConfig,
    messenger: Messenger,
    registry: Arc<Registry>,

    hooks: ContainerHooks,
    init_table: ModeTable<ProcessInitializer>,
    run_table: ModeTable<ContainerRunner>,
    before_run: Option<RunGate>,
    after_run: Option<RunGate>,
    init_gate: Option<InitGate>,

    /// Cooperative yield point invoked after each process's dependency
    /// phase, so an embedding host can service its event loop.
    event_pump: Option<Box<dyn Fn() + Send>>,
}

impl Container {
    pub fn builder(name: impl Into<String>) -> ContainerBuilder {
        ContainerBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn requires_user_description(&self) -> bool {
        self.requires_user_description
    }

    pub fn process_manifest(&self) -> Option<&str> {
        self.process_manifest.as_deref()
    }

    pub fn process_list(&self) -> &[Process] {
        &self.process_list
    }

    pub fn process_list_mut(&mut self) -> &mut [Process] {
        &mut self.process_list
    }

    pub fn has_initialized(&self) -> bool {
        self.has_initialized
    }

    pub fn set_initialized(&mut self) {
        self.has_initialized = true;
    }

    pub fn have_processes_initialized(&self) -> bool {
        self.have_processes_initialized
    }

    pub fn set_processes_initialized(&mut self) {
        self.have_processes_initialized = true;
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    pub fn messenger(&self) -> &Messenger {
        &self.messenger
    }

    pub fn data_file(&self) -> Option<&Utf8Path> {
        self.data_file.as_deref()
    }

    /// Merge a JSON overlay document into the configuration's extension map.
    /// The file must exist.
    pub fn set_data_file(&mut self, path: impl Into<Utf8PathBuf>) -> Result<()> {
        let path = path.into();
        self.config.load_overlay(&path)?;
        self.data_file = Some(path);
        Ok(())
    }

    pub fn user_description(&self) -> Option<String> {
        self.config.user_description()
    }

    pub fn set_user_description(&self, description: impl Into<String>) {
        self.config.set_user_description(description);
    }

    pub fn ignore_description(&self) -> Option<String> {
        self.config.ignore_description()
    }

    pub fn set_ignore_description(&self, description: impl Into<String>) {
        self.config.set_ignore_description(description);
    }

    /// Run every phase the run level selects over the process list.
    ///
    /// Returns `false` without doing anything when the container failed to
    /// initialize. The `before_run`/`after_run` gates bracket the phases;
    /// every error except a no-handler dispatch failure is subject to the
    /// raise policy.
    pub fn run(&mut self) -> Result<bool> {
        if !self.has_initialized {
            return Ok(false);
        }

        let before = match self.before_run.as_mut() {
            Some(gate) => gate(),
            None => Ok(true),
        };
        match before {
            Ok(true) => {}
            Ok(false) => return Ok(false),
            Err(error) => return self.convert_or_raise(error),
        }

        match self.dispatch_run() {
            Ok(true) => {}
            Ok(false) => return Ok(false),
            Err(error) => return self.convert_or_raise(error),
        }

        let after = match self.after_run.as_mut() {
            Some(gate) => gate(),
            None => Ok(true),
        };
        match after {
            Ok(true) => {}
            Ok(false) => return Ok(false),
            Err(error) => return self.convert_or_raise(error),
        }

        Ok(true)
    }

    /// Textual self-description: the container banner, its description, and
    /// every process with its pre/post dependencies. Empty until the
    /// container has initialized.
    pub fn describe(&self) -> String {
        if !self.has_initialized {
            return String::new();
        }

        let mode = self.config.run_mode();
        let mut info = container_header(mode, &format!("{} - CONTAINER", self.name));
        info.push('\n');
        info.push_str(&self.description);
        info.push('\n');

        for process in &self.process_list {
            for dependency in process.pre_dependencies() {
                info.push_str(&format!(
                    "\n{}",
                    section_header(mode, &format!("{} - PRE DEPENDENCY", dependency.name()))
                ));
                info.push_str(&format!("\n    {}\n", dependency.description()));
            }

            info.push_str(&format!(
                "\n\n{}",
                section_header(mode, &format!("{} - PROCESS", process.name()))
            ));
            info.push_str(&format!("\n    {}\n", process.description()));

            for dependency in process.post_dependencies() {
                info.push_str(&format!(
                    "\n{}",
                    section_header(mode, &format!("{} - POST DEPENDENCY", dependency.name()))
                ));
                info.push_str(&format!("\n    {}\n", dependency.description()));
            }
        }

        info
    }

    fn convert_or_raise(&self, error: EngineError) -> Result<bool> {
        if error.is_no_handler() || self.config.raise_exceptions() {
            return Err(error);
        }
        self.messenger.failure(error.to_string());
        Ok(false)
    }

    fn dispatch_run(&mut self) -> Result<bool> {
        if self.process_list.is_empty() {
            self.messenger
                .failure(format!("No process found for this container: {}", self.name));
            return Ok(false);
        }

        if self.requires_user_description
            && self
                .config
                .user_description()
                .map_or(true, |description| description.is_empty())
        {
            let message = format!(
                "A user description is required; set one on \"{}\" before running.",
                self.name
            );
            if self.config.raise_exceptions() {
                return Err(EngineError::Container(message));
            }
            self.messenger.failure(message);
            return Ok(false);
        }

        let mode = self.config.run_mode();
        let Some((index, runner)) = self.run_table.resolve_take(mode) else {
            return Err(EngineError::NoHandler {
                scope: ErrorScope::Container,
                phase: DispatchPhase::Run,
                mode,
            });
        };

        match runner {
            ContainerRunner::Builtin => {
                self.run_table.restore(index, ContainerRunner::Builtin);
                self.run_phases()
            }
            ContainerRunner::Custom(mut handler) => {
                let outcome = {
                    let Self {
                        name,
                        process_list,
                        config,
                        messenger,
                        ..
                    } = self;
                    let mut context = ContainerRunContext {
                        name,
                        processes: process_list,
                        config,
                        messenger,
                    };
                    handler(&mut context)
                };
                self.run_table
                    .restore(index, ContainerRunner::Custom(handler));
                outcome
            }
        }
    }

    /// The canonical phased runner.
    fn run_phases(&mut self) -> Result<bool> {
        let config = Arc::clone(&self.config);
        let messenger = self.messenger.clone();
        let mode = config.run_mode();

        messenger.header(container_header(
            mode,
            &format!("{} - CONTAINER", self.name.to_uppercase()),
        ));

        if config.run_level().includes_pre_dependencies() {
            tracing::debug!(container = %self.name, "running pre dependency phase");
            let mut all_passed = true;
            for process in self.process_list.iter_mut() {
                if process.is_ignored() {
                    continue;
                }
                messenger.header(section_header(
                    mode,
                    &format!("{} - PRE DEPENDENCY", process.name().to_uppercase()),
                ));
                if !process.run_pre_dependencies()? {
                    if config.ignore_failed_pre_dependencies() && process.is_ignorable() {
                        // Tolerated, the process sits out this failure.
                    } else {
                        all_passed = false;
                    }
                }
                if let Some(pump) = self.event_pump.as_ref() {
                    pump();
                }
            }
            if !all_passed {
                messenger.failure("Pre dependency failed.");
                return Ok(false);
            }
        }

        self.phase_separator();

        if config.run_level().includes_process() {
            tracing::debug!(container = %self.name, "running process phase");
            let mut any_failed = false;
            for process in self.process_list.iter_mut() {
                if process.is_ignored() {
                    continue;
                }
                messenger.header(section_header(
                    mode,
                    &format!("{} - PROCESS", process.name().to_uppercase()),
                ));
                match process.run() {
                    Ok(true) => {}
                    Ok(false) => any_failed = true,
                    Err(error) => {
                        if error.is_no_handler() || config.raise_exceptions() {
                            return Err(error);
                        }
                        messenger.failure(error.to_string());
                    }
                }
            }
            if any_failed {
                return Ok(false);
            }
        }

        self.phase_separator();

        if config.run_level().includes_post_dependencies() {
            tracing::debug!(container = %self.name, "running post dependency phase");
            let mut all_passed = true;
            for process in self.process_list.iter_mut() {
                if process.is_ignored() {
                    continue;
                }
                messenger.header(section_header(
                    mode,
                    &format!("{} - POST DEPENDENCY", process.name().to_uppercase()),
                ));
                if !process.run_post_dependencies()? {
                    // The pre flag governs the process-level skip in both
                    // dependency phases.
                    if config.ignore_failed_pre_dependencies() && process.is_ignorable() {
                        // Tolerated.
                    } else {
                        all_passed = false;
                    }
                }
                if let Some(pump) = self.event_pump.as_ref() {
                    pump();
                }
            }
            if !all_passed {
                messenger.failure("Post dependency failed.");
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Layout line between phases, shown only for terminal-style runs with
    /// chatty display settings.
    fn phase_separator(&self) {
        if !matches!(
            self.config.run_level(),
            RunLevel::All | RunLevel::PreAndPostDependenciesOnly
        ) {
            return;
        }
        if !matches!(
            self.config.display_messages(),
            DisplayMessages::All | DisplayMessages::Info
        ) {
            return;
        }
        if matches!(
            self.config.run_mode(),
            RunMode::Terminal | RunMode::ParentTerminal
        ) {
            self.messenger.raw_header("    -");
        }
    }

    fn try_initialize(&mut self) -> Result<()> {
        let should = match &self.init_gate {
            Some(gate) => gate(&self.config)?,
            None => true,
        };
        if !should {
            self.messenger.failure(format!(
                "\"{}\" container can not be initialized, no reason was given.",
                self.name
            ));
            return Ok(());
        }

        self.initialize_processes()?;
        self.has_initialized = true;
        Ok(())
    }

    fn initialize_processes(&mut self) -> Result<()> {
        let mode = self.config.run_mode();
        let Some((index, initializer)) = self.init_table.resolve_take(mode) else {
            return Err(EngineError::NoHandler {
                scope: ErrorScope::Container,
                phase: DispatchPhase::Initialization,
                mode,
            });
        };

        let outcome = match initializer {
            ProcessInitializer::FromManifest => {
                let outcome = self.initialize_from_manifest();
                self.init_table
                    .restore(index, ProcessInitializer::FromManifest);
                outcome
            }
            ProcessInitializer::Custom(mut handler) => {
                let outcome = {
                    let Self {
                        process_list,
                        config,
                        messenger,
                        ..
                    } = self;
                    let mut context = ProcessInitContext {
                        processes: process_list,
                        config,
                        messenger,
                    };
                    handler(&mut context)
                };
                self.init_table
                    .restore(index, ProcessInitializer::Custom(handler));
                outcome
            }
        };
        outcome?;

        let Self {
            hooks,
            process_list,
            ..
        } = self;
        if let Some(sort) = hooks.sort.as_mut() {
            sort(process_list);
        }

        self.have_processes_initialized = true;
        tracing::info!(
            container = %self.name,
            processes = self.process_list.len(),
            "processes initialized"
        );
        Ok(())
    }

    /// Walk the process manifest, applying the discovery policy: before-hook
    /// veto, construction, run/ignore name filters, active check,
    /// initialization gate, after-hook veto, dependency initialization,
    /// append in discovery order.
    fn initialize_from_manifest(&mut self) -> Result<()> {
        let registry = Arc::clone(&self.registry);
        let config = Arc::clone(&self.config);
        let messenger = self.messenger.clone();

        let Some(manifest_name) = self.process_manifest.clone() else {
            return Err(EngineError::Container(format!(
                "{}: no process manifest defined",
                self.name
            )));
        };

        let module_ids = registry
            .process_list(&manifest_name)
            .map_err(|error| EngineError::Container(format!("{} : {}", self.name, error)))?;

        if let Some(hook) = self.hooks.before_processes.as_mut() {
            hook();
        }

        for module_id in module_ids {
            let module = registry.process_module(module_id).map_err(|error| {
                EngineError::Container(format!(
                    "{} : process module \"{module_id}\" could not be resolved: {error}",
                    self.name
                ))
            })?;

            for factory in module.factories() {
                if let Some(hook) = self.hooks.before_each.as_mut() {
                    if !hook(factory) {
                        tracing::debug!(process = factory.name(), "vetoed before construction");
                        continue;
                    }
                }

                let mut process = factory.construct(Arc::clone(&config), messenger.clone())?;

                let to_run = config.processes_to_run();
                if !to_run.is_empty() && !to_run.contains(process.name()) {
                    tracing::debug!(process = process.name(), "rejected: not in the run list");
                    continue;
                }
                let to_ignore = config.processes_to_ignore();
                if !to_ignore.is_empty() && to_ignore.contains(process.name()) {
                    tracing::debug!(process = process.name(), "rejected: in the ignore list");
                    continue;
                }

                if !process.is_active() {
                    tracing::debug!(process = process.name(), "rejected: inactive");
                    continue;
                }

                match process.should_initialize() {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::debug!(process = process.name(), "rejected by its gate");
                        continue;
                    }
                    Err(error) => {
                        if config.raise_exceptions() {
                            return Err(error);
                        }
                        continue;
                    }
                }

                if let Some(hook) = self.hooks.after_each.as_mut() {
                    if !hook(&process) {
                        tracing::debug!(process = process.name(), "vetoed after construction");
                        continue;
                    }
                }

                process.initialize_dependencies(&registry)?;
                self.process_list.push(process);
            }
        }

        if let Some(hook) = self.hooks.after_processes.as_mut() {
            hook();
        }

        Ok(())
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("requires_user_description", &self.requires_user_description)
            .field("process_manifest", &self.process_manifest)
            .field("process_count", &self.process_list.len())
            .field("has_initialized", &self.has_initialized)
            .field("have_processes_initialized", &self.have_processes_initialized)
            .field("data_file", &self.data_file)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Container`].
///
/// `build` performs initialization: the `should_initialize` gate, process
/// discovery, and the raise-policy conversion of initialization failures.
pub struct ContainerBuilder {
    name: String,
    description: String,
    requires_user_description: bool,
    process_manifest: Option<String>,
    data_file: Option<Utf8PathBuf>,
    config: Option<SharedConfig>,
    sink: Option<Arc<dyn EventSink>>,
    messenger: Option<Messenger>,
    registry: Option<Arc<Registry>>,
    hooks: ContainerHooks,
    init_overrides: Vec<(RunMode, ProcessInitializer)>,
    run_overrides: Vec<(RunMode, ContainerRunner)>,
    before_run: Option<RunGate>,
    after_run: Option<RunGate>,
    init_gate: Option<InitGate>,
    event_pump: Option<Box<dyn Fn() + Send>>,
}

impl ContainerBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            requires_user_description: true,
            process_manifest: None,
            data_file: None,
            config: None,
            sink: None,
            messenger: None,
            registry: None,
            hooks: ContainerHooks::default(),
            init_overrides: Vec::new(),
            run_overrides: Vec::new(),
            before_run: None,
            after_run: None,
            init_gate: None,
            event_pump: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn requires_user_description(mut self, value: bool) -> Self {
        self.requires_user_description = value;
        self
    }

    /// Name the registry manifest listing this container's process modules.
    pub fn process_manifest(mut self, manifest: impl Into<String>) -> Self {
        self.process_manifest = Some(manifest.into());
        self
    }

    /// Merge this JSON overlay into the configuration during `build`. A
    /// missing file fails the build regardless of the raise policy.
    pub fn data_file(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.data_file = Some(path.into());
        self
    }

    pub fn config(mut self, config: SharedConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Install the event sink for this run tree. Ignored when a parent
    /// messenger is supplied.
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Reuse a parent's messenger instead of installing a sink, so nested
    /// construction forwards events up.
    pub fn messenger(mut self, messenger: Messenger) -> Self {
        self.messenger = Some(messenger);
        self
    }

    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn hooks(mut self, hooks: ContainerHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Replace the process initializer for a mode. The terminal slot
    /// defaults to manifest-driven discovery.
    pub fn initialize_processes_with(
        mut self,
        mode: RunMode,
        initializer: ProcessInitializer,
    ) -> Self {
        self.init_overrides.push((mode, initializer));
        self
    }

    /// Install a custom runner for a mode. The terminal slot defaults to the
    /// canonical phased runner.
    pub fn run_with<F>(mut self, mode: RunMode, handler: F) -> Self
    where
        F: FnMut(&mut ContainerRunContext<'_>) -> Result<bool> + Send + 'static,
    {
        self.run_overrides
            .push((mode, ContainerRunner::Custom(Box::new(handler))));
        self
    }

    pub fn before_run_with<F>(mut self, gate: F) -> Self
    where
        F: FnMut() -> Result<bool> + Send + 'static,
    {
        self.before_run = Some(Box::new(gate));
        self
    }

    pub fn after_run_with<F>(mut self, gate: F) -> Self
    where
        F: FnMut() -> Result<bool> + Send + 'static,
    {
        self.after_run = Some(Box::new(gate));
        self
    }

    /// Install the gate consulted before any initialization happens.
    pub fn should_initialize_when<F>(mut self, gate: F) -> Self
    where
        F: Fn(&RunConfig) -> Result<bool> + Send + 'static,
    {
        self.init_gate = Some(Box::new(gate));
        self
    }

    /// Install the cooperative yield point invoked after each process's
    /// dependency phase.
    pub fn event_pump<F>(mut self, pump: F) -> Self
    where
        F: Fn() + Send + 'static,
    {
        self.event_pump = Some(Box::new(pump));
        self
    }

    pub fn build(self) -> Result<Container> {
        let config = self
            .config
            .unwrap_or_else(|| RunConfig::default().shared());
        let messenger = match self.messenger {
            Some(messenger) => messenger,
            None => {
                let sink = self
                    .sink
                    .unwrap_or_else(|| default_sink(config.run_mode()));
                Messenger::new(sink, Arc::clone(&config))
            }
        };
        let registry = self.registry.unwrap_or_else(|| Arc::new(Registry::new()));

        let mut init_table = ModeTable::new();
        init_table.set(RunMode::Terminal, ProcessInitializer::FromManifest);
        for (mode, initializer) in self.init_overrides {
            init_table.set(mode, initializer);
        }

        let mut run_table = ModeTable::new();
        run_table.set(RunMode::Terminal, ContainerRunner::Builtin);
        for (mode, runner) in self.run_overrides {
            run_table.set(mode, runner);
        }

        let mut container = Container {
            name: self.name,
            description: self.description,
            requires_user_description: self.requires_user_description,
            process_manifest: self.process_manifest,
            process_list: Vec::new(),
            has_initialized: false,
            have_processes_initialized: false,
            data_file: None,
            config,
            messenger,
            registry,
            hooks: self.hooks,
            init_table,
            run_table,
            before_run: self.before_run,
            after_run: self.after_run,
            init_gate: self.init_gate,
            event_pump: self.event_pump,
        };

        if let Some(path) = self.data_file {
            container.set_data_file(path)?;
        }

        match container.try_initialize() {
            Ok(()) => {}
            Err(error)
                if error.is_no_handler() || container.config.raise_exceptions() =>
            {
                return Err(error);
            }
            Err(error) => {
                container.messenger.failure(format!(
                    "\"{}\" container can not be initialized: {}",
                    container.name, error
                ));
            }
        }

        Ok(container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingSink;

    fn collecting() -> (Arc<CollectingSink>, Arc<dyn EventSink>) {
        let sink = Arc::new(CollectingSink::new());
        let erased: Arc<dyn EventSink> = sink.clone();
        (sink, erased)
    }

    #[test]
    fn uninitialized_container_refuses_to_run() {
        let (_events, sink) = collecting();
        // No manifest registered, so initialization fails and is converted
        // into a failure message.
        let mut container = Container::builder("publish")
            .process_manifest("missing")
            .sink(sink)
            .build()
            .unwrap();

        assert!(!container.has_initialized());
        assert!(!container.run().unwrap());
    }

    #[test]
    fn initialization_failure_raises_under_the_policy() {
        let config = RunConfig::builder().raise_exceptions(true).build().shared();
        let result = Container::builder("publish")
            .process_manifest("missing")
            .config(config)
            .build();
        assert!(matches!(result, Err(EngineError::Container(_))));
    }

    #[test]
    fn missing_process_manifest_is_reported() {
        let config = RunConfig::builder().raise_exceptions(true).build().shared();
        let error = Container::builder("publish")
            .config(config)
            .build()
            .unwrap_err();
        assert!(error.to_string().contains("no process manifest defined"));
    }

    #[test]
    fn should_initialize_gate_blocks_discovery() {
        let (events, sink) = collecting();
        let container = Container::builder("publish")
            .process_manifest("anything")
            .sink(sink)
            .should_initialize_when(|_config| Ok(false))
            .build()
            .unwrap();

        assert!(!container.has_initialized());
        assert!(!container.have_processes_initialized());
        assert!(events
            .snapshot()
            .iter()
            .any(|event| event.text().contains("can not be initialized")));
    }

    #[test]
    fn describe_is_empty_until_initialized() {
        let (_events, sink) = collecting();
        let container = Container::builder("publish")
            .process_manifest("missing")
            .sink(sink)
            .build()
            .unwrap();
        assert!(container.describe().is_empty());
    }

    #[test]
    fn headers_have_mode_specific_layouts() {
        let banner = container_header(RunMode::Terminal, "X - CONTAINER");
        assert!(banner.contains("X - CONTAINER"));
        assert!(banner.contains(&"-".repeat(CONTAINER_RULE_WIDTH)));
        assert!(container_header(RunMode::Gui, "X - CONTAINER").is_empty());

        let section = section_header(RunMode::Gui, "Y - PROCESS");
        assert!(section.starts_with(&"-".repeat(SECTION_RULE_WIDTH)));
        let indented = section_header(RunMode::Terminal, "Y - PROCESS");
        assert!(indented.contains("\n    Y - PROCESS"));
    }
}
