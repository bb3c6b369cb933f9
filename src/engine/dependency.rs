//! A single pre- or post-condition check attached to a process.
//!
//! A dependency carries a run handler per run mode, an optional fix, and an
//! optional user-facing action. Whether a failed dependency blocks the
//! pipeline is decided by the owning process (see the gating policy in
//! [`super::process`]); the dependency itself only records its execution
//! state and emits messages.

use crate::config::{RunConfig, RunMode, SharedConfig};
use crate::error::{DispatchPhase, EngineError, ErrorScope, Result};
use crate::events::Messenger;

use super::ModeTable;

/// Column width the dependency name is padded to in emitted messages, so a
/// run's check results line up.
pub const MESSAGE_PADDING: usize = 52;

fn padded(name: &str, message: &str) -> String {
    format!("{:<width$} : {}", name, message, width = MESSAGE_PADDING)
}

/// Execution record of one dependency.
///
/// `is_executed == false` implies `is_succeeded == false` and no failure
/// message; `reset` restores exactly that state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ExecutionState {
    pub(crate) is_executed: bool,
    pub(crate) is_succeeded: bool,
    pub(crate) failure_message: Option<String>,
}

/// What a run/fix handler sees while executing.
///
/// Handlers record their outcome through [`success`](DependencyContext::success)
/// and [`failure`](DependencyContext::failure), which update the execution
/// state and emit the matching message, and return the boolean the gating
/// layer collects.
pub struct DependencyContext<'a> {
    name: &'a str,
    state: &'a mut ExecutionState,
    messenger: &'a Messenger,
    config: &'a SharedConfig,
}

impl DependencyContext<'_> {
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn config(&self) -> &RunConfig {
        self.config
    }

    pub fn info(&self, message: &str) {
        self.messenger.info(padded(self.name, message));
    }

    pub fn warning(&self, message: &str) {
        self.messenger.warning(padded(self.name, message));
    }

    /// Record success: executed, succeeded, failure message cleared.
    pub fn success(&mut self, message: &str) -> bool {
        self.state.is_executed = true;
        self.state.is_succeeded = true;
        self.state.failure_message = None;
        self.messenger.success(padded(self.name, message));
        true
    }

    /// [`success`](Self::success) with the stock "OK" message.
    pub fn succeed(&mut self) -> bool {
        self.success("OK")
    }

    /// Record failure, retaining the last non-empty failure message. The
    /// failure is only surfaced when the run level executes dependency
    /// phases.
    pub fn failure(&mut self, message: &str) -> bool {
        self.state.is_executed = true;
        self.state.is_succeeded = false;
        if !message.is_empty() {
            self.state.failure_message = Some(message.to_string());
            if self.config.run_level().shows_dependency_failures() {
                self.messenger.failure(padded(self.name, message));
            }
        }
        false
    }
}

/// Handler invoked for a dependency's run and fix phases.
pub type DependencyHandler =
    Box<dyn FnMut(&mut DependencyContext<'_>) -> Result<bool> + Send>;

/// Handler invoked for a dependency's user-facing action.
pub type ActionHandler = Box<dyn FnMut(&mut DependencyContext<'_>) -> Result<()> + Send>;

type InitGate = Box<dyn Fn(&RunConfig) -> Result<bool> + Send>;

/// A precondition or postcondition check, optionally fixable and optionally
/// ignorable.
pub struct Dependency {
    name: String,
    description: String,

    is_active: bool,

    has_fix: bool,
    run_fix_automatically: bool,

    has_action: bool,

    is_ignorable: bool,
    is_ignored: bool,
    requires_description_when_ignored: bool,

    state: ExecutionState,

    run_handlers: ModeTable<DependencyHandler>,
    fix_handlers: ModeTable<DependencyHandler>,
    action_handler: Option<ActionHandler>,
    action_runnable: Option<Box<dyn Fn() -> bool + Send>>,
    init_gate: Option<InitGate>,

    config: SharedConfig,
    messenger: Messenger,
}

impl Dependency {
    pub fn builder(name: impl Into<String>) -> DependencyBuilder {
        DependencyBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn has_fix(&self) -> bool {
        self.has_fix
    }

    pub fn run_fix_automatically(&self) -> bool {
        self.run_fix_automatically
    }

    pub fn has_action(&self) -> bool {
        self.has_action
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

    pub fn failure_message(&self) -> Option<&str> {
        self.state.failure_message.as_deref()
    }

    pub fn is_executed(&self) -> bool {
        self.state.is_executed
    }

    pub fn is_succeeded(&self) -> bool {
        self.state.is_succeeded
    }

    /// Mark the dependency ignored or un-ignored. A no-op returning `false`
    /// unless the dependency is ignorable.
    pub fn set_ignored(&mut self, ignored: bool) -> bool {
        if !self.is_ignorable {
            return false;
        }
        self.is_ignored = ignored;
        true
    }

    /// Clear the execution record back to never-run.
    pub fn reset(&mut self) {
        self.state = ExecutionState::default();
    }

    /// Notify the user this dependency was skipped by the failure-tolerance
    /// policy rather than by hand.
    pub fn display_auto_ignored_message(&self) {
        self.messenger.info(padded(
            &self.name,
            "This dependency has been automatically ignored by the container.",
        ));
    }

    /// Gate consulted during discovery; a `false` or an error rejects the
    /// candidate.
    pub(crate) fn should_initialize(&self) -> Result<bool> {
        match &self.init_gate {
            Some(gate) => gate(&self.config),
            None => Ok(true),
        }
    }

    /// Execute the check through the run-mode capability table.
    ///
    /// The dependency counts as executed as soon as a handler is entered,
    /// even if that handler errors out.
    pub fn run(&mut self) -> Result<bool> {
        let mode = self.config.run_mode();
        let Self {
            name,
            state,
            run_handlers,
            messenger,
            config,
            ..
        } = self;

        let Some(handler) = run_handlers.resolve_mut(mode) else {
            return Err(EngineError::NoHandler {
                scope: ErrorScope::Dependency,
                phase: DispatchPhase::Run,
                mode,
            });
        };

        state.is_executed = true;
        let mut context = DependencyContext {
            name,
            state,
            messenger,
            config,
        };
        handler(&mut context)
    }

    /// Attempt the fix. Returns `false` without doing anything when the
    /// dependency declares no fix; a declared fix with no installed handler
    /// succeeds trivially.
    pub fn run_fix(&mut self) -> Result<bool> {
        if !self.has_fix {
            return Ok(false);
        }
        if self.fix_handlers.is_empty() {
            return Ok(true);
        }

        let mode = self.config.run_mode();
        let Self {
            name,
            state,
            fix_handlers,
            messenger,
            config,
            ..
        } = self;

        let Some(handler) = fix_handlers.resolve_mut(mode) else {
            return Err(EngineError::NoHandler {
                scope: ErrorScope::Dependency,
                phase: DispatchPhase::Fix,
                mode,
            });
        };

        let mut context = DependencyContext {
            name,
            state,
            messenger,
            config,
        };
        handler(&mut context)
    }

    /// Invoke the user-facing action. A no-op unless `has_action` is set; an
    /// action-bearing dependency without an installed handler is an error.
    pub fn run_action(&mut self) -> Result<()> {
        if !self.has_action {
            return Ok(());
        }

        let Self {
            name,
            state,
            action_handler,
            messenger,
            config,
            ..
        } = self;

        match action_handler {
            Some(handler) => {
                let mut context = DependencyContext {
                    name,
                    state,
                    messenger,
                    config,
                };
                handler(&mut context)
            }
            None => Err(EngineError::Dependency(format!(
                "{name}: an action handler must be installed when the dependency declares an action"
            ))),
        }
    }

    /// Whether the action is currently offerable; GUI hosts consult this to
    /// decide whether to show the action affordance.
    pub fn is_action_runnable(&self) -> bool {
        self.action_runnable.as_ref().is_some_and(|gate| gate())
    }
}

/// Builder for [`Dependency`].
pub struct DependencyBuilder {
    name: String,
    description: String,
    is_active: bool,
    has_fix: bool,
    run_fix_automatically: bool,
    has_action: bool,
    is_ignorable: bool,
    requires_description_when_ignored: bool,
    run_handlers: ModeTable<DependencyHandler>,
    fix_handlers: ModeTable<DependencyHandler>,
    action_handler: Option<ActionHandler>,
    action_runnable: Option<Box<dyn Fn() -> bool + Send>>,
    init_gate: Option<InitGate>,
}

impl DependencyBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            is_active: true,
            has_fix: false,
            run_fix_automatically: false,
            has_action: false,
            is_ignorable: false,
            requires_description_when_ignored: true,
            run_handlers: ModeTable::new(),
            fix_handlers: ModeTable::new(),
            action_handler: None,
            action_runnable: None,
            init_gate: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
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

    pub fn has_fix(mut self, value: bool) -> Self {
        self.has_fix = value;
        self
    }

    pub fn run_fix_automatically(mut self, value: bool) -> Self {
        self.run_fix_automatically = value;
        self
    }

    pub fn has_action(mut self, value: bool) -> Self {
        self.has_action = value;
        self
    }

    /// Install the run handler for a mode.
    pub fn run<F>(mut self, mode: RunMode, handler: F) -> Self
    where
        F: FnMut(&mut DependencyContext<'_>) -> Result<bool> + Send + 'static,
    {
        self.run_handlers.set(mode, Box::new(handler));
        self
    }

    /// Install a fix handler for a mode; implies `has_fix`.
    pub fn fix<F>(mut self, mode: RunMode, handler: F) -> Self
    where
        F: FnMut(&mut DependencyContext<'_>) -> Result<bool> + Send + 'static,
    {
        self.has_fix = true;
        self.fix_handlers.set(mode, Box::new(handler));
        self
    }

    /// Install the action handler; implies `has_action`.
    pub fn action<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&mut DependencyContext<'_>) -> Result<()> + Send + 'static,
    {
        self.has_action = true;
        self.action_handler = Some(Box::new(handler));
        self
    }

    pub fn action_runnable_when<F>(mut self, gate: F) -> Self
    where
        F: Fn() -> bool + Send + 'static,
    {
        self.action_runnable = Some(Box::new(gate));
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

    pub fn build(self, config: SharedConfig, messenger: Messenger) -> Dependency {
        Dependency {
            name: self.name,
            description: self.description,
            is_active: self.is_active,
            has_fix: self.has_fix,
            run_fix_automatically: self.run_fix_automatically,
            has_action: self.has_action,
            is_ignorable: self.is_ignorable,
            is_ignored: false,
            requires_description_when_ignored: self.requires_description_when_ignored,
            state: ExecutionState::default(),
            run_handlers: self.run_handlers,
            fix_handlers: self.fix_handlers,
            action_handler: self.action_handler,
            action_runnable: self.action_runnable,
            init_gate: self.init_gate,
            config,
            messenger,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::events::{CollectingSink, EngineEvent};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn harness() -> (Arc<CollectingSink>, SharedConfig, Messenger) {
        let sink = Arc::new(CollectingSink::new());
        let config = RunConfig::default().shared();
        let messenger = Messenger::new(sink.clone(), config.clone());
        (sink, config, messenger)
    }

    fn passing(config: SharedConfig, messenger: Messenger) -> Dependency {
        Dependency::builder("scene-saved")
            .description("The scene must be saved to disk.")
            .run(RunMode::Terminal, |ctx: &mut DependencyContext| {
                Ok(ctx.succeed())
            })
            .build(config, messenger)
    }

    #[test]
    fn success_sets_the_execution_triple() {
        let (sink, config, messenger) = harness();
        let mut dep = passing(config, messenger);

        assert!(dep.run().unwrap());
        assert!(dep.is_executed());
        assert!(dep.is_succeeded());
        assert!(dep.failure_message().is_none());

        let events = sink.snapshot();
        assert!(matches!(events.last(), Some(EngineEvent::Success(text)) if text.contains("OK")));
    }

    #[test]
    fn failure_retains_the_last_message() {
        let (_sink, config, messenger) = harness();
        let mut dep = Dependency::builder("frame-range")
            .run(RunMode::Terminal, |ctx: &mut DependencyContext| {
                Ok(ctx.failure("frame range is not locked"))
            })
            .build(config, messenger);

        assert!(!dep.run().unwrap());
        assert!(dep.is_executed());
        assert!(!dep.is_succeeded());
        assert_eq!(dep.failure_message(), Some("frame range is not locked"));
    }

    #[test]
    fn reset_restores_the_never_run_state() {
        let (_sink, config, messenger) = harness();
        let mut dep = Dependency::builder("frame-range")
            .run(RunMode::Terminal, |ctx: &mut DependencyContext| {
                Ok(ctx.failure("nope"))
            })
            .build(config, messenger);

        dep.run().unwrap();
        dep.reset();
        assert!(!dep.is_executed());
        assert!(!dep.is_succeeded());
        assert!(dep.failure_message().is_none());
    }

    #[test]
    fn set_ignored_is_a_no_op_unless_ignorable() {
        let (_sink, config, messenger) = harness();
        let mut strict = passing(config.clone(), messenger.clone());
        assert!(!strict.set_ignored(true));
        assert!(!strict.is_ignored());

        let mut lenient = Dependency::builder("optional-check")
            .ignorable(true)
            .build(config, messenger);
        assert!(lenient.set_ignored(true));
        assert!(lenient.is_ignored());
    }

    #[test]
    fn run_without_any_handler_is_a_no_handler_error() {
        let (_sink, config, messenger) = harness();
        let mut dep = Dependency::builder("empty").build(config, messenger);
        let err = dep.run().unwrap_err();
        assert!(err.is_no_handler());
    }

    #[test]
    fn gui_mode_falls_back_to_the_terminal_handler() {
        let sink = Arc::new(CollectingSink::new());
        let config = RunConfig::builder().run_mode(RunMode::Gui).build().shared();
        let messenger = Messenger::new(sink, config.clone());
        let mut dep = passing(config, messenger);
        assert!(dep.run().unwrap());
    }

    #[test]
    fn fix_without_declaration_is_a_no_op() {
        let (_sink, config, messenger) = harness();
        let mut dep = passing(config, messenger);
        assert!(!dep.run_fix().unwrap());
    }

    #[test]
    fn declared_fix_without_handler_succeeds_trivially() {
        let (_sink, config, messenger) = harness();
        let mut dep = Dependency::builder("auto-fixable")
            .has_fix(true)
            .build(config, messenger);
        assert!(dep.run_fix().unwrap());
    }

    #[test]
    fn installed_fix_handler_is_invoked() {
        let (_sink, config, messenger) = harness();
        let mut dep = Dependency::builder("auto-fixable")
            .fix(RunMode::Terminal, |_ctx: &mut DependencyContext| Ok(false))
            .build(config, messenger);
        assert!(!dep.run_fix().unwrap());
    }

    #[test]
    fn action_requires_a_handler_when_declared() {
        let (_sink, config, messenger) = harness();
        let mut bare = Dependency::builder("open-folder")
            .has_action(true)
            .build(config.clone(), messenger.clone());
        assert!(bare.run_action().is_err());

        let mut wired = Dependency::builder("open-folder")
            .action(|_ctx: &mut DependencyContext| Ok(()))
            .build(config, messenger);
        wired.run_action().unwrap();
        assert!(!wired.is_action_runnable());
    }

    #[test]
    fn failure_message_suppressed_for_process_only_levels() {
        let sink = Arc::new(CollectingSink::new());
        let config = RunConfig::builder()
            .run_level(crate::config::RunLevel::ProcessOnly)
            .build()
            .shared();
        let messenger = Messenger::new(sink.clone(), config.clone());
        let mut dep = Dependency::builder("quiet")
            .run(RunMode::Terminal, |ctx: &mut DependencyContext| {
                Ok(ctx.failure("broken"))
            })
            .build(config, messenger);

        dep.run().unwrap();
        // State still records the failure even though nothing was emitted.
        assert_eq!(dep.failure_message(), Some("broken"));
        assert!(sink.snapshot().is_empty());
    }

    proptest! {
        /// Whatever sequence of run/reset calls executes, a never-run (or
        /// freshly reset) dependency holds the (false, false, None) triple,
        /// and a failure message only exists on an executed dependency.
        #[test]
        fn execution_state_invariant(ops in proptest::collection::vec(0u8..3, 0..24)) {
            let (_sink, config, messenger) = harness();
            let mut dep = Dependency::builder("invariant")
                .run(RunMode::Terminal, |ctx: &mut DependencyContext| Ok(ctx.failure("bad")))
                .fix(RunMode::Terminal, |ctx: &mut DependencyContext| Ok(ctx.succeed()))
                .build(config, messenger);

            for op in ops {
                match op {
                    0 => { let _ = dep.run(); }
                    1 => { let _ = dep.run_fix(); }
                    _ => dep.reset(),
                }
                if !dep.is_executed() {
                    prop_assert!(!dep.is_succeeded());
                    prop_assert!(dep.failure_message().is_none());
                }
                if dep.failure_message().is_some() {
                    prop_assert!(dep.is_executed());
                }
            }
        }
    }
}
