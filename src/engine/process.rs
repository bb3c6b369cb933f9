//! A named unit of work owning pre/post dependency lists and a run body.
//!
//! The process runs its body through the run-mode capability table and gates
//! it behind its dependency lists. The gating policy is where the
//! failure-tolerance knobs meet: ignored dependencies are skipped, failing
//! ignorable ones can be auto-ignored, and auto-fixable ones get one fix
//! attempt before the failure is allowed to degrade to an ignore.

use std::sync::Arc;

use crate::config::{RunConfig, RunMode, SharedConfig};
use crate::error::{DispatchPhase, EngineError, ErrorScope, Result};
use crate::events::Messenger;

use super::dependency::Dependency;
use super::registry::{DependencyFactory, Registry};
use super::ModeTable;

/// What a process body sees while executing.
pub struct ProcessContext<'a> {
    name: &'a str,
    messenger: &'a Messenger,
    config: &'a SharedConfig,
}

impl ProcessContext<'_> {
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn config(&self) -> &RunConfig {
        self.config
    }

    pub fn info(&self, message: &str) {
        self.messenger.info(format!("{} : {}", self.name, message));
    }

    pub fn warning(&self, message: &str) {
        self.messenger.warning(format!("{} : {}", self.name, message));
    }

    /// Emit a success message and return `true` for collection.
    pub fn success(&self, message: &str) -> bool {
        self.messenger
            .success(format!("{} : {}", self.name, message));
        true
    }

    /// [`success`](Self::success) with the stock "OK" message.
    pub fn succeed(&self) -> bool {
        self.success("OK")
    }

    /// Emit a failure message (only when the run level executes the process
    /// phase) and return `false` for collection.
    pub fn failure(&self, message: &str) -> bool {
        if self.config.run_level().shows_process_failures() && !message.is_empty() {
            self.messenger
                .failure(format!("{} : {}", self.name, message));
        }
        false
    }
}

/// Handler invoked for a process body.
pub type ProcessHandler = Box<dyn FnMut(&mut ProcessContext<'_>) -> Result<bool> + Send>;

type InitGate = Box<dyn Fn(&RunConfig) -> Result<bool> + Send>;

/// Discovery callbacks a process may install around its dependency
/// initialization.
#[derive(Default)]
pub struct ProcessHooks {
    /// Invoked once before any dependency candidate is visited.
    pub before_dependencies: Option<Box<dyn FnMut() + Send>>,
    /// Invoked once after all candidates were visited.
    pub after_dependencies: Option<Box<dyn FnMut() + Send>>,
    /// Veto hook per candidate factory; `false` skips it without
    /// construction.
    pub before_each: Option<Box<dyn FnMut(&DependencyFactory) -> bool + Send>>,
    /// Veto hook per constructed instance; `false` rejects it.
    pub after_each: Option<Box<dyn FnMut(&Dependency) -> bool + Send>>,
    /// Reorder the accumulated lists; discovery order is kept when absent.
    pub sort: Option<Box<dyn FnMut(&mut Vec<Dependency>, &mut Vec<Dependency>) + Send>>,
}

/// What a custom dependency initializer sees.
pub struct DependencyInitContext<'a> {
    pub pre: &'a mut Vec<Dependency>,
    pub post: &'a mut Vec<Dependency>,
    config: &'a SharedConfig,
    messenger: &'a Messenger,
}

impl DependencyInitContext<'_> {
    pub fn config(&self) -> &SharedConfig {
        self.config
    }

    pub fn messenger(&self) -> &Messenger {
        self.messenger
    }
}

/// How a process populates its dependency lists for one run mode.
pub enum DependencyInitializer {
    /// Walk the registry manifest named by the process.
    FromManifest,
    /// Populate the lists directly.
    Custom(Box<dyn FnMut(&mut DependencyInitContext<'_>) -> Result<()> + Send>),
}

/// A unit of work with an optional pre/post dependency gate.
pub struct Process {
    name: String,
    description: String,
    icon: Option<String>,

    is_active: bool,
    is_ignorable: bool,
    is_ignored: bool,
    requires_description_when_ignored: bool,

    dependency_manifest: Option<String>,
    pre_dependencies: Vec<Dependency>,
    post_dependencies: Vec<Dependency>,

    run_handlers: ModeTable<ProcessHandler>,
    init_table: ModeTable<DependencyInitializer>,
    hooks: ProcessHooks,
    init_gate: Option<InitGate>,

    config: SharedConfig,
    messenger: Messenger,
}

impl Process {
    pub fn builder(name: impl Into<String>) -> ProcessBuilder {
        ProcessBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_ignorable(&self) -> bool {
        self.is_ignorable
    }

    pub fn is_ignored(&self) -> bool {
        self.is_ignored
    }

    pub fn requires_description_when_ignored(&self) -> bool {
        self.requires_description_when_ignored
    }

    pub fn dependency_manifest(&self) -> Option<&str> {
        self.dependency_manifest.as_deref()
    }

    pub fn pre_dependencies(&self) -> &[Dependency] {
        &self.pre_dependencies
    }

    pub fn pre_dependencies_mut(&mut self) -> &mut [Dependency] {
        &mut self.pre_dependencies
    }

    pub fn post_dependencies(&self) -> &[Dependency] {
        &self.post_dependencies
    }

    pub fn post_dependencies_mut(&mut self) -> &mut [Dependency] {
        &mut self.post_dependencies
    }

    /// Mark the process ignored or un-ignored. A no-op returning `false`
    /// unless the process is ignorable.
    pub fn set_ignored(&mut self, ignored: bool) -> bool {
        if !self.is_ignorable {
            return false;
        }
        self.is_ignored = ignored;
        true
    }

    /// Gate consulted during discovery; a `false` or an error rejects the
    /// candidate.
    pub(crate) fn should_initialize(&self) -> Result<bool> {
        match &self.init_gate {
            Some(gate) => gate(&self.config),
            None => Ok(true),
        }
    }

    /// Execute the body through the run-mode capability table. No dependency
    /// handling happens here; the container orchestrates the pre/post
    /// phases.
    pub fn run(&mut self) -> Result<bool> {
        let mode = self.config.run_mode();
        let Self {
            name,
            run_handlers,
            messenger,
            config,
            ..
        } = self;

        let Some(handler) = run_handlers.resolve_mut(mode) else {
            return Err(EngineError::NoHandler {
                scope: ErrorScope::Process,
                phase: DispatchPhase::Run,
                mode,
            });
        };

        let mut context = ProcessContext {
            name,
            messenger,
            config,
        };
        handler(&mut context)
    }

    /// Run every non-ignored pre dependency and fold the results.
    ///
    /// Failure tolerance, in order: an ignorable dependency is auto-ignored
    /// when `ignore_failed_pre_dependencies` is set (on error or plain
    /// failure); otherwise an automatic fix gets one attempt, and a fix that
    /// also fails degrades the dependency to ignored-and-passed under the
    /// same flag. The phase succeeds iff nothing collected `false`.
    pub fn run_pre_dependencies(&mut self) -> Result<bool> {
        let Self {
            name,
            pre_dependencies,
            config,
            messenger,
            ..
        } = self;

        if pre_dependencies.is_empty() {
            return Ok(true);
        }

        let mut results = Vec::new();
        for dependency in pre_dependencies.iter_mut() {
            if dependency.is_ignored() {
                continue;
            }

            let mut run_result = false;
            match dependency.run() {
                Ok(result) => run_result = result,
                Err(error) => {
                    if config.ignore_failed_pre_dependencies() && dependency.is_ignorable() {
                        dependency.set_ignored(true);
                        dependency.display_auto_ignored_message();
                        continue;
                    }
                    if config.raise_exceptions() {
                        return Err(error);
                    }
                    if config.run_level().shows_process_failures() {
                        messenger.failure(format!("{name} : {error}"));
                    }
                }
            }

            if !run_result {
                if config.ignore_failed_pre_dependencies() && dependency.is_ignorable() {
                    dependency.set_ignored(true);
                    dependency.display_auto_ignored_message();
                    continue;
                } else if dependency.has_fix() && dependency.run_fix_automatically() {
                    let fix_result = dependency.run_fix()?;
                    if !fix_result && config.ignore_failed_pre_dependencies() {
                        dependency.set_ignored(true);
                        run_result = true;
                    }
                }
            }

            results.push(run_result);
        }

        Ok(!results.contains(&false))
    }

    /// Run every non-ignored post dependency and fold the results.
    ///
    /// Post dependencies are side-effecting, so a handler error is never
    /// auto-ignored here; only the failed-fix path may degrade one to
    /// ignored-and-passed. Fix failures degrade under the pre-dependency
    /// ignore flag for both phases.
    pub fn run_post_dependencies(&mut self) -> Result<bool> {
        let Self {
            name,
            post_dependencies,
            config,
            messenger,
            ..
        } = self;

        if post_dependencies.is_empty() {
            return Ok(true);
        }

        let mut results = Vec::new();
        for dependency in post_dependencies.iter_mut() {
            if dependency.is_ignored() {
                continue;
            }

            let mut run_result = false;
            match dependency.run() {
                Ok(result) => run_result = result,
                Err(error) => {
                    if config.raise_exceptions() {
                        return Err(error);
                    }
                    if config.run_level().shows_process_failures() {
                        messenger.failure(format!("{name} : {error}"));
                    }
                }
            }

            if !run_result
                && dependency.has_fix()
                && dependency.run_fix_automatically()
            {
                let fix_result = dependency.run_fix()?;
                if !fix_result && config.ignore_failed_pre_dependencies() {
                    dependency.set_ignored(true);
                    run_result = true;
                }
            }

            results.push(run_result);
        }

        Ok(!results.contains(&false))
    }

    /// Populate the dependency lists through the run-mode capability table,
    /// then apply the sort hook.
    pub(crate) fn initialize_dependencies(&mut self, registry: &Registry) -> Result<()> {
        let mode = self.config.run_mode();
        let Some((index, initializer)) = self.init_table.resolve_take(mode) else {
            return Err(EngineError::NoHandler {
                scope: ErrorScope::Process,
                phase: DispatchPhase::Initialization,
                mode,
            });
        };

        let outcome = match initializer {
            DependencyInitializer::FromManifest => {
                let outcome = self.initialize_from_manifest(registry);
                self.init_table
                    .restore(index, DependencyInitializer::FromManifest);
                outcome
            }
            DependencyInitializer::Custom(mut handler) => {
                let outcome = {
                    let Self {
                        pre_dependencies,
                        post_dependencies,
                        config,
                        messenger,
                        ..
                    } = self;
                    let mut context = DependencyInitContext {
                        pre: pre_dependencies,
                        post: post_dependencies,
                        config,
                        messenger,
                    };
                    handler(&mut context)
                };
                self.init_table
                    .restore(index, DependencyInitializer::Custom(handler));
                outcome
            }
        };
        outcome?;

        let Self {
            hooks,
            pre_dependencies,
            post_dependencies,
            ..
        } = self;
        if let Some(sort) = hooks.sort.as_mut() {
            sort(pre_dependencies, post_dependencies);
        }

        tracing::debug!(
            process = %self.name,
            pre = self.pre_dependencies.len(),
            post = self.post_dependencies.len(),
            "dependencies initialized"
        );
        Ok(())
    }

    fn initialize_from_manifest(&mut self, registry: &Registry) -> Result<()> {
        let Self {
            name,
            dependency_manifest,
            hooks,
            pre_dependencies,
            post_dependencies,
            config,
            messenger,
            ..
        } = self;

        // A process that names no manifest simply has no dependency gate.
        let Some(manifest_name) = dependency_manifest.as_deref() else {
            return Ok(());
        };

        let (pre_ids, post_ids) = registry
            .dependency_lists(manifest_name)
            .map_err(|error| EngineError::Process(format!("{name} : {error}")))?;

        if let Some(hook) = hooks.before_dependencies.as_mut() {
            hook();
        }

        if let Some(module_ids) = pre_ids {
            discover_dependencies(
                name,
                module_ids,
                registry,
                hooks,
                pre_dependencies,
                config,
                messenger,
            )?;
        }
        if let Some(module_ids) = post_ids {
            discover_dependencies(
                name,
                module_ids,
                registry,
                hooks,
                post_dependencies,
                config,
                messenger,
            )?;
        }

        if let Some(hook) = hooks.after_dependencies.as_mut() {
            hook();
        }

        Ok(())
    }
}

/// Walk the modules of one dependency list, applying the discovery policy:
/// before-hook veto, construction, active check, initialization gate,
/// after-hook veto, append in discovery order.
fn discover_dependencies(
    owner: &str,
    module_ids: &[String],
    registry: &Registry,
    hooks: &mut ProcessHooks,
    target: &mut Vec<Dependency>,
    config: &SharedConfig,
    messenger: &Messenger,
) -> Result<()> {
    for module_id in module_ids {
        let module = match registry.dependency_module(module_id) {
            Ok(module) => module,
            Err(error) => {
                let message =
                    format!("dependency module \"{module_id}\" could not be resolved: {error}");
                if config.raise_exceptions() {
                    return Err(EngineError::Process(format!("{owner} : {message}")));
                }
                if config.run_level().shows_process_failures() {
                    messenger.failure(format!("{owner} : {message}"));
                }
                continue;
            }
        };

        for factory in module.factories() {
            if let Some(hook) = hooks.before_each.as_mut() {
                if !hook(factory) {
                    tracing::debug!(dependency = factory.name(), "vetoed before construction");
                    continue;
                }
            }

            let dependency = factory.construct(Arc::clone(config), messenger.clone())?;

            if !dependency.is_active() {
                tracing::debug!(dependency = dependency.name(), "rejected: inactive");
                continue;
            }

            match dependency.should_initialize() {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(dependency = dependency.name(), "rejected by its gate");
                    continue;
                }
                Err(error) => {
                    if config.raise_exceptions() {
                        return Err(error);
                    }
                    continue;
                }
            }

            if let Some(hook) = hooks.after_each.as_mut() {
                if !hook(&dependency) {
                    tracing::debug!(dependency = dependency.name(), "vetoed after construction");
                    continue;
                }
            }

            target.push(dependency);
        }
    }
    Ok(())
}

/// Builder for [`Process`].
pub struct ProcessBuilder {
    name: String,
    description: String,
    icon: Option<String>,
    is_active: bool,
    is_ignorable: bool,
    requires_description_when_ignored: bool,
    dependency_manifest: Option<String>,
    run_handlers: ModeTable<ProcessHandler>,
    init_overrides: Vec<(RunMode, DependencyInitializer)>,
    hooks: ProcessHooks,
    init_gate: Option<InitGate>,
}

impl ProcessBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            icon: None,
            is_active: true,
            is_ignorable: false,
            requires_description_when_ignored: true,
            dependency_manifest: None,
            run_handlers: ModeTable::new(),
            init_overrides: Vec::new(),
            hooks: ProcessHooks::default(),
            init_gate: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn active(mut self, value: bool) -> Self {
        self.is_active = value;
        self
    }

    pub fn ignorable(mut self, value: bool) -> Self {
        self.is_ignorable = value;
        self
    }

    pub fn requires_description_when_ignored(mut self, value: bool) -> Self {
        self.requires_description_when_ignored = value;
        self
    }

    /// Name the registry manifest listing this process's dependency modules.
    pub fn dependency_manifest(mut self, manifest: impl Into<String>) -> Self {
        self.dependency_manifest = Some(manifest.into());
        self
    }

    /// Install the body for a mode.
    pub fn run<F>(mut self, mode: RunMode, handler: F) -> Self
    where
        F: FnMut(&mut ProcessContext<'_>) -> Result<bool> + Send + 'static,
    {
        self.run_handlers.set(mode, Box::new(handler));
        self
    }

    /// Replace the dependency initializer for a mode. The terminal slot
    /// defaults to manifest-driven discovery.
    pub fn initialize_dependencies_with(
        mut self,
        mode: RunMode,
        initializer: DependencyInitializer,
    ) -> Self {
        self.init_overrides.push((mode, initializer));
        self
    }

    pub fn hooks(mut self, hooks: ProcessHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Install the discovery gate consulted before the candidate is kept.
    pub fn should_initialize_when<F>(mut self, gate: F) -> Self
    where
        F: Fn(&RunConfig) -> Result<bool> + Send + 'static,
    {
        self.init_gate = Some(Box::new(gate));
        self
    }

    pub fn build(self, config: SharedConfig, messenger: Messenger) -> Process {
        let mut init_table = ModeTable::new();
        init_table.set(RunMode::Terminal, DependencyInitializer::FromManifest);
        for (mode, initializer) in self.init_overrides {
            init_table.set(mode, initializer);
        }

        Process {
            name: self.name,
            description: self.description,
            icon: self.icon,
            is_active: self.is_active,
            is_ignorable: self.is_ignorable,
            is_ignored: false,
            requires_description_when_ignored: self.requires_description_when_ignored,
            dependency_manifest: self.dependency_manifest,
            pre_dependencies: Vec::new(),
            post_dependencies: Vec::new(),
            run_handlers: self.run_handlers,
            init_table,
            hooks: self.hooks,
            init_gate: self.init_gate,
            config,
            messenger,
        }
    }
}
