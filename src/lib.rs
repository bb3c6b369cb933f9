// Procession - dependency-gated batch pipeline orchestration
//
// A container owns an ordered set of processes; each process owns ordered
// lists of dependency checks that run before and after its body. The engine
// discovers the tree through an explicit registry, dispatches every phase
// through per-run-mode capability tables, and folds the results into a
// single pass/fail signal plus a stream of messages.

pub mod cli;
pub mod config;
pub mod display;
pub mod engine;
pub mod error;
pub mod events;
pub mod logging;

// Re-export the types an embedder touches when wiring a container
pub use config::{DisplayMessages, RunConfig, RunLevel, RunMode, SharedConfig};
pub use engine::{
    Container, ContainerHooks, Dependency, DependencyContext, DependencyFactory, DependencyModule,
    Manifest, Process, ProcessContext, ProcessFactory, ProcessHooks, ProcessModule, Registry,
};
pub use error::EngineError;
pub use events::{EngineEvent, EventSink, Messenger};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
