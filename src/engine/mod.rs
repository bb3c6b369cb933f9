//! The three-tier lifecycle engine: containers own processes, processes own
//! dependency checks, and every phase is dispatched through a per-run-mode
//! capability table.

pub mod container;
pub mod dependency;
pub mod process;
pub mod registry;

pub use container::{
    Container, ContainerBuilder, ContainerHooks, ContainerRunContext, ContainerRunner,
    ProcessInitContext, ProcessInitializer,
};
pub use dependency::{Dependency, DependencyBuilder, DependencyContext, MESSAGE_PADDING};
pub use process::{
    DependencyInitContext, DependencyInitializer, Process, ProcessBuilder, ProcessContext,
    ProcessHooks,
};
pub use registry::{
    DependencyFactory, DependencyModule, Manifest, ManifestList, ProcessFactory, ProcessModule,
    Registry, RegistryError,
};

use crate::config::RunMode;

/// Per-run-mode handler slots.
///
/// Dispatch consults the configured mode's slot first, then the remaining
/// slots in that mode's fixed preference order. An empty table means the
/// operation has no handler for any mode and must fail with a typed
/// no-handler error.
pub(crate) struct ModeTable<H> {
    slots: [Option<H>; 3],
}

impl<H> ModeTable<H> {
    pub(crate) fn new() -> Self {
        Self {
            slots: [None, None, None],
        }
    }

    pub(crate) fn set(&mut self, mode: RunMode, handler: H) {
        self.slots[mode.index()] = Some(handler);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// First filled slot following `mode`'s preference order.
    pub(crate) fn resolve_mut(&mut self, mode: RunMode) -> Option<&mut H> {
        let index = self.resolve_index(mode)?;
        self.slots[index].as_mut()
    }

    pub(crate) fn resolve_index(&self, mode: RunMode) -> Option<usize> {
        mode.preference_order()
            .into_iter()
            .map(RunMode::index)
            .find(|&index| self.slots[index].is_some())
    }

    /// Resolve and temporarily remove a handler so the caller can invoke it
    /// without aliasing the table. Pair with [`ModeTable::restore`].
    pub(crate) fn resolve_take(&mut self, mode: RunMode) -> Option<(usize, H)> {
        let index = self.resolve_index(mode)?;
        self.slots[index].take().map(|handler| (index, handler))
    }

    pub(crate) fn restore(&mut self, index: usize, handler: H) {
        self.slots[index] = Some(handler);
    }
}

impl<H> Default for ModeTable<H> {
    fn default() -> Self {
        Self::new()
    }
}
