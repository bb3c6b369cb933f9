//! Integration tests for registry-driven discovery.
//!
//! Discovery policy under test: veto hooks fire per candidate, inactive and
//! gated candidates are rejected, the run/ignore name filters apply to
//! processes only, order follows registration, and the sort hook may
//! reorder the accumulated lists.

use procession::engine::DependencyContext;
use procession::events::CollectingSink;
use procession::{
    Container, ContainerHooks, Dependency, DependencyFactory, DependencyModule, EngineError,
    Manifest, Process, ProcessContext, ProcessFactory, ProcessModule, Registry, RunConfig,
    RunMode,
};
use std::sync::Arc;

fn simple_process(name: &'static str) -> ProcessFactory {
    ProcessFactory::new(name, move |config, messenger| {
        Ok(Process::builder(name)
            .run(RunMode::Terminal, |ctx: &mut ProcessContext| {
                Ok(ctx.succeed())
            })
            .build(config, messenger))
    })
}

fn inactive_process(name: &'static str) -> ProcessFactory {
    ProcessFactory::new(name, move |config, messenger| {
        Ok(Process::builder(name).active(false).build(config, messenger))
    })
}

fn gated_process(name: &'static str) -> ProcessFactory {
    ProcessFactory::new(name, move |config, messenger| {
        Ok(Process::builder(name)
            .should_initialize_when(|_config| Ok(false))
            .build(config, messenger))
    })
}

fn registry_of(factories: Vec<ProcessFactory>) -> Arc<Registry> {
    let mut registry = Registry::new();
    registry.register_manifest("main", Manifest::new().with_process_list(["processes"]));
    let mut module = ProcessModule::new();
    for factory in factories {
        module = module.with(factory);
    }
    registry.register_process_module("processes", module);
    Arc::new(registry)
}

fn build(registry: Arc<Registry>) -> Container {
    Container::builder("main")
        .requires_user_description(false)
        .process_manifest("main")
        .registry(registry)
        .sink(Arc::new(CollectingSink::new()))
        .build()
        .unwrap()
}

fn discovered_names(container: &Container) -> Vec<&str> {
    container
        .process_list()
        .iter()
        .map(|process| process.name())
        .collect()
}

#[test]
fn discovery_keeps_registration_order() {
    let container = build(registry_of(vec![
        simple_process("alpha"),
        simple_process("bravo"),
        simple_process("charlie"),
    ]));
    assert_eq!(discovered_names(&container), ["alpha", "bravo", "charlie"]);
}

#[test]
fn inactive_and_gated_candidates_are_rejected() {
    let container = build(registry_of(vec![
        simple_process("alpha"),
        inactive_process("sleeping"),
        gated_process("blocked"),
        simple_process("bravo"),
    ]));
    assert_eq!(discovered_names(&container), ["alpha", "bravo"]);
}

#[test]
fn run_list_filter_keeps_only_named_processes() {
    let config = RunConfig::builder()
        .processes_to_run(["bravo"])
        .build()
        .shared();
    let container = Container::builder("main")
        .requires_user_description(false)
        .process_manifest("main")
        .registry(registry_of(vec![
            simple_process("alpha"),
            simple_process("bravo"),
        ]))
        .config(config)
        .sink(Arc::new(CollectingSink::new()))
        .build()
        .unwrap();

    assert_eq!(discovered_names(&container), ["bravo"]);
}

#[test]
fn ignore_list_filter_drops_named_processes() {
    let config = RunConfig::builder()
        .processes_to_ignore(["alpha"])
        .build()
        .shared();
    let container = Container::builder("main")
        .requires_user_description(false)
        .process_manifest("main")
        .registry(registry_of(vec![
            simple_process("alpha"),
            simple_process("bravo"),
        ]))
        .config(config)
        .sink(Arc::new(CollectingSink::new()))
        .build()
        .unwrap();

    assert_eq!(discovered_names(&container), ["bravo"]);
}

#[test]
fn hooks_can_veto_before_and_after_construction() {
    let mut hooks = ContainerHooks::default();
    hooks.before_each = Some(Box::new(|factory| factory.name() != "alpha"));
    hooks.after_each = Some(Box::new(|process| process.name() != "charlie"));

    let container = Container::builder("main")
        .requires_user_description(false)
        .process_manifest("main")
        .registry(registry_of(vec![
            simple_process("alpha"),
            simple_process("bravo"),
            simple_process("charlie"),
        ]))
        .hooks(hooks)
        .sink(Arc::new(CollectingSink::new()))
        .build()
        .unwrap();

    assert_eq!(discovered_names(&container), ["bravo"]);
}

#[test]
fn sort_hook_reorders_the_discovered_list() {
    let mut hooks = ContainerHooks::default();
    hooks.sort = Some(Box::new(|processes| {
        processes.sort_by(|a, b| b.name().cmp(a.name()));
    }));

    let container = Container::builder("main")
        .requires_user_description(false)
        .process_manifest("main")
        .registry(registry_of(vec![
            simple_process("alpha"),
            simple_process("bravo"),
            simple_process("charlie"),
        ]))
        .hooks(hooks)
        .sink(Arc::new(CollectingSink::new()))
        .build()
        .unwrap();

    assert_eq!(discovered_names(&container), ["charlie", "bravo", "alpha"]);
}

#[test]
fn unknown_process_module_fails_initialization() {
    let mut registry = Registry::new();
    registry.register_manifest("main", Manifest::new().with_process_list(["missing-module"]));

    let config = RunConfig::builder().raise_exceptions(true).build().shared();
    let error = Container::builder("main")
        .process_manifest("main")
        .registry(Arc::new(registry))
        .config(config)
        .build()
        .unwrap_err();

    assert!(matches!(error, EngineError::Container(_)));
    assert!(error.to_string().contains("missing-module"));
}

#[test]
fn manifest_failures_are_distinct() {
    let mut registry = Registry::new();
    registry.register_manifest("no-list", Manifest::new());
    registry.register_manifest(
        "empty-list",
        Manifest::new().with_process_list(Vec::<String>::new()),
    );
    let registry = Arc::new(registry);

    let raise = || RunConfig::builder().raise_exceptions(true).build().shared();

    let unknown = Container::builder("main")
        .process_manifest("unregistered")
        .registry(registry.clone())
        .config(raise())
        .build()
        .unwrap_err();
    assert!(unknown.to_string().contains("is not registered"));

    let missing = Container::builder("main")
        .process_manifest("no-list")
        .registry(registry.clone())
        .config(raise())
        .build()
        .unwrap_err();
    assert!(missing.to_string().contains("does not define a process list"));

    let empty = Container::builder("main")
        .process_manifest("empty-list")
        .registry(registry)
        .config(raise())
        .build()
        .unwrap_err();
    assert!(empty.to_string().contains("empty process list"));
}

#[test]
fn dependency_discovery_applies_the_same_policy() {
    let mut registry = Registry::new();
    registry.register_manifest("main", Manifest::new().with_process_list(["processes"]));
    registry.register_manifest(
        "checks",
        Manifest::new()
            .with_pre_dependency_list(["pre-checks"])
            .with_post_dependency_list(["post-checks"]),
    );
    registry.register_dependency_module(
        "pre-checks",
        DependencyModule::new()
            .with(DependencyFactory::new("active-check", |config, messenger| {
                Ok(Dependency::builder("active-check")
                    .run(RunMode::Terminal, |ctx: &mut DependencyContext| {
                        Ok(ctx.succeed())
                    })
                    .build(config, messenger))
            }))
            .with(DependencyFactory::new("inactive-check", |config, messenger| {
                Ok(Dependency::builder("inactive-check")
                    .active(false)
                    .build(config, messenger))
            }))
            .with(DependencyFactory::new("gated-check", |config, messenger| {
                Ok(Dependency::builder("gated-check")
                    .should_initialize_when(|_config| Ok(false))
                    .build(config, messenger))
            })),
    );
    registry.register_dependency_module(
        "post-checks",
        DependencyModule::new().with(DependencyFactory::new("result-check", |config, messenger| {
            Ok(Dependency::builder("result-check")
                .run(RunMode::Terminal, |ctx: &mut DependencyContext| {
                    Ok(ctx.succeed())
                })
                .build(config, messenger))
        })),
    );
    registry.register_process_module(
        "processes",
        ProcessModule::new().with(ProcessFactory::new("publish", |config, messenger| {
            Ok(Process::builder("publish")
                .dependency_manifest("checks")
                .run(RunMode::Terminal, |ctx: &mut ProcessContext| {
                    Ok(ctx.succeed())
                })
                .build(config, messenger))
        })),
    );

    let container = build(Arc::new(registry));
    let process = &container.process_list()[0];

    let pre_names: Vec<_> = process
        .pre_dependencies()
        .iter()
        .map(|dependency| dependency.name())
        .collect();
    assert_eq!(pre_names, ["active-check"]);

    let post_names: Vec<_> = process
        .post_dependencies()
        .iter()
        .map(|dependency| dependency.name())
        .collect();
    assert_eq!(post_names, ["result-check"]);
}

#[test]
fn unknown_dependency_module_is_tolerated_unless_raising() {
    fn registry() -> Arc<Registry> {
        let mut registry = Registry::new();
        registry.register_manifest("main", Manifest::new().with_process_list(["processes"]));
        registry.register_manifest(
            "checks",
            Manifest::new().with_pre_dependency_list(["missing-checks"]),
        );
        registry.register_process_module(
            "processes",
            ProcessModule::new().with(ProcessFactory::new("publish", |config, messenger| {
                Ok(Process::builder("publish")
                    .dependency_manifest("checks")
                    .run(RunMode::Terminal, |ctx: &mut ProcessContext| {
                        Ok(ctx.succeed())
                    })
                    .build(config, messenger))
            })),
        );
        Arc::new(registry)
    }

    // Non-raising: the module is reported and skipped, the process survives
    // with no pre dependencies.
    let container = build(registry());
    assert!(container.has_initialized());
    assert!(container.process_list()[0].pre_dependencies().is_empty());

    // Raising: initialization fails with a process error.
    let config = RunConfig::builder().raise_exceptions(true).build().shared();
    let error = Container::builder("main")
        .process_manifest("main")
        .registry(registry())
        .config(config)
        .build()
        .unwrap_err();
    assert!(matches!(error, EngineError::Process(_)));
}
