//! Explicit registration of process and dependency implementations.
//!
//! A container names a manifest; the manifest lists module identifiers in
//! execution order; each module carries the factories that build the actual
//! units. Containers and processes walk these tables during initialization
//! instead of scanning for implementations at runtime, so the set of
//! runnable units is fixed by what the embedder registered.

use indexmap::IndexMap;
use std::fmt;
use thiserror::Error;

use crate::config::SharedConfig;
use crate::error::Result;
use crate::events::Messenger;

use super::dependency::Dependency;
use super::process::Process;

/// Which of a manifest's lists a lookup was after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestList {
    Process,
    PreDependency,
    PostDependency,
}

impl fmt::Display for ManifestList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestList::Process => write!(f, "process"),
            ManifestList::PreDependency => write!(f, "pre dependency"),
            ManifestList::PostDependency => write!(f, "post dependency"),
        }
    }
}

/// Failures while resolving manifests and modules.
///
/// An unresolvable manifest, a manifest missing the expected list and a
/// manifest whose list is empty are distinct failures; the discovery code
/// wraps them into the owning tier's error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("manifest \"{0}\" is not registered")]
    UnknownManifest(String),

    #[error("manifest \"{manifest}\" does not define a {list} list")]
    MissingList {
        manifest: String,
        list: ManifestList,
    },

    #[error("manifest \"{manifest}\" has an empty {list} list")]
    EmptyList {
        manifest: String,
        list: ManifestList,
    },

    #[error("module \"{0}\" is not registered")]
    UnknownModule(String),
}

/// Ordered lists of module identifiers for one container or process.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    process_list: Option<Vec<String>>,
    pre_dependency_list: Option<Vec<String>>,
    post_dependency_list: Option<Vec<String>>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_process_list<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.process_list = Some(modules.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_pre_dependency_list<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pre_dependency_list = Some(modules.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_post_dependency_list<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.post_dependency_list = Some(modules.into_iter().map(Into::into).collect());
        self
    }

    pub fn process_list(&self) -> Option<&[String]> {
        self.process_list.as_deref()
    }

    pub fn pre_dependency_list(&self) -> Option<&[String]> {
        self.pre_dependency_list.as_deref()
    }

    pub fn post_dependency_list(&self) -> Option<&[String]> {
        self.post_dependency_list.as_deref()
    }
}

/// Builds one [`Process`] candidate during discovery.
///
/// The name identifies the candidate to the before-hook, which may veto it
/// without construction.
pub struct ProcessFactory {
    name: String,
    construct: Box<dyn Fn(SharedConfig, Messenger) -> Result<Process> + Send + Sync>,
}

impl ProcessFactory {
    pub fn new<F>(name: impl Into<String>, construct: F) -> Self
    where
        F: Fn(SharedConfig, Messenger) -> Result<Process> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            construct: Box::new(construct),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn construct(&self, config: SharedConfig, messenger: Messenger) -> Result<Process> {
        (self.construct)(config, messenger)
    }
}

impl fmt::Debug for ProcessFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessFactory")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Builds one [`Dependency`] candidate during discovery.
pub struct DependencyFactory {
    name: String,
    construct: Box<dyn Fn(SharedConfig, Messenger) -> Result<Dependency> + Send + Sync>,
}

impl DependencyFactory {
    pub fn new<F>(name: impl Into<String>, construct: F) -> Self
    where
        F: Fn(SharedConfig, Messenger) -> Result<Dependency> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            construct: Box::new(construct),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn construct(
        &self,
        config: SharedConfig,
        messenger: Messenger,
    ) -> Result<Dependency> {
        (self.construct)(config, messenger)
    }
}

impl fmt::Debug for DependencyFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyFactory")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A registered group of process factories, enumerated in insertion order.
#[derive(Debug, Default)]
pub struct ProcessModule {
    factories: Vec<ProcessFactory>,
}

impl ProcessModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, factory: ProcessFactory) -> Self {
        self.factories.push(factory);
        self
    }

    pub fn factories(&self) -> &[ProcessFactory] {
        &self.factories
    }
}

/// A registered group of dependency factories, enumerated in insertion order.
#[derive(Debug, Default)]
pub struct DependencyModule {
    factories: Vec<DependencyFactory>,
}

impl DependencyModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, factory: DependencyFactory) -> Self {
        self.factories.push(factory);
        self
    }

    pub fn factories(&self) -> &[DependencyFactory] {
        &self.factories
    }
}

/// Registration table mapping manifest names and module identifiers to the
/// factories that build the run tree.
#[derive(Debug, Default)]
pub struct Registry {
    manifests: IndexMap<String, Manifest>,
    process_modules: IndexMap<String, ProcessModule>,
    dependency_modules: IndexMap<String, DependencyModule>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_manifest(&mut self, name: impl Into<String>, manifest: Manifest) {
        self.manifests.insert(name.into(), manifest);
    }

    pub fn register_process_module(&mut self, name: impl Into<String>, module: ProcessModule) {
        self.process_modules.insert(name.into(), module);
    }

    pub fn register_dependency_module(
        &mut self,
        name: impl Into<String>,
        module: DependencyModule,
    ) {
        self.dependency_modules.insert(name.into(), module);
    }

    pub fn manifest(&self, name: &str) -> std::result::Result<&Manifest, RegistryError> {
        self.manifests
            .get(name)
            .ok_or_else(|| RegistryError::UnknownManifest(name.to_string()))
    }

    /// Resolve a manifest's process list. The manifest must exist, define the
    /// list, and the list must be non-empty.
    pub fn process_list(&self, name: &str) -> std::result::Result<&[String], RegistryError> {
        let manifest = self.manifest(name)?;
        let list = manifest
            .process_list()
            .ok_or_else(|| RegistryError::MissingList {
                manifest: name.to_string(),
                list: ManifestList::Process,
            })?;
        if list.is_empty() {
            return Err(RegistryError::EmptyList {
                manifest: name.to_string(),
                list: ManifestList::Process,
            });
        }
        Ok(list)
    }

    /// Resolve a manifest's dependency lists. Either list may be absent, but
    /// a manifest defining neither is a missing-list failure.
    pub fn dependency_lists(
        &self,
        name: &str,
    ) -> std::result::Result<(Option<&[String]>, Option<&[String]>), RegistryError> {
        let manifest = self.manifest(name)?;
        let pre = manifest.pre_dependency_list();
        let post = manifest.post_dependency_list();
        if pre.is_none() && post.is_none() {
            return Err(RegistryError::MissingList {
                manifest: name.to_string(),
                list: ManifestList::PreDependency,
            });
        }
        Ok((pre, post))
    }

    pub fn process_module(&self, name: &str) -> std::result::Result<&ProcessModule, RegistryError> {
        self.process_modules
            .get(name)
            .ok_or_else(|| RegistryError::UnknownModule(name.to_string()))
    }

    pub fn dependency_module(
        &self,
        name: &str,
    ) -> std::result::Result<&DependencyModule, RegistryError> {
        self.dependency_modules
            .get(name)
            .ok_or_else(|| RegistryError::UnknownModule(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_manifest_is_a_distinct_failure() {
        let registry = Registry::new();
        assert_eq!(
            registry.process_list("release"),
            Err(RegistryError::UnknownManifest("release".to_string()))
        );
    }

    #[test]
    fn missing_and_empty_process_lists_are_distinct_failures() {
        let mut registry = Registry::new();
        registry.register_manifest("no-list", Manifest::new());
        registry.register_manifest(
            "empty-list",
            Manifest::new().with_process_list(Vec::<String>::new()),
        );

        assert!(matches!(
            registry.process_list("no-list"),
            Err(RegistryError::MissingList {
                list: ManifestList::Process,
                ..
            })
        ));
        assert!(matches!(
            registry.process_list("empty-list"),
            Err(RegistryError::EmptyList {
                list: ManifestList::Process,
                ..
            })
        ));
    }

    #[test]
    fn dependency_manifest_needs_at_least_one_list() {
        let mut registry = Registry::new();
        registry.register_manifest("bare", Manifest::new());
        registry.register_manifest(
            "pre-only",
            Manifest::new().with_pre_dependency_list(["checks"]),
        );

        assert!(registry.dependency_lists("bare").is_err());

        let (pre, post) = registry.dependency_lists("pre-only").unwrap();
        assert_eq!(pre.unwrap(), ["checks".to_string()]);
        assert!(post.is_none());
    }

    #[test]
    fn unknown_module_lookup_fails() {
        let registry = Registry::new();
        assert_eq!(
            registry.process_module("missing").unwrap_err(),
            RegistryError::UnknownModule("missing".to_string())
        );
        assert_eq!(
            registry.dependency_module("missing").unwrap_err(),
            RegistryError::UnknownModule("missing".to_string())
        );
    }

    #[test]
    fn modules_keep_registration_order() {
        let module = ProcessModule::new()
            .with(ProcessFactory::new("first", |_, _| unreachable!()))
            .with(ProcessFactory::new("second", |_, _| unreachable!()));
        let names: Vec<_> = module.factories().iter().map(ProcessFactory::name).collect();
        assert_eq!(names, ["first", "second"]);
    }
}
