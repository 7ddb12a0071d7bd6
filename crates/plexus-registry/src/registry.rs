//! Service registry facade
//!
//! [`ServiceRegistry`] wires the pieces together: the metadata catalog, the
//! supertype graph, the container backend, the singleton cache and the
//! subscriber index. Construction returns an `Arc` because deferred
//! provider shapes capture the registry for later resolution.
//!
//! ## Shapes
//!
//! | Lookup | Absence | Null value | 2+ candidates |
//! |--------|---------|------------|---------------|
//! | bare `lookup` | `ServiceNotFound` | `ServiceNotFound` | `AmbiguousLookup` |
//! | `lookup_optional` | `None` | `None` | `AmbiguousLookup` |
//! | `provider().get()` | `None` | `None` | `AmbiguousLookup` |
//! | `lookup_all` | empty vec | present null element | all returned |
//!
//! ## Concurrency
//!
//! Synchronous, caller's-thread execution. Class scanning is at-most-once
//! per registration key (scan-once/publish-result under one scan lock);
//! singleton construction is at-most-once per descriptor via a `OnceCell`
//! slot; PerLookup construction is unconstrained per call. Constructor
//! dependency cycles are detected per thread and fail the lookup instead
//! of blocking or recursing.

use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use plexus_domain::descriptor::{ManyProvider, ResolvedArg, Scope, ValueProvider};
use plexus_domain::error::{Error, Result};
use plexus_domain::key::{RawType, ServiceKey, Shape};
use plexus_domain::metadata::ClassMetadata;
use plexus_domain::ports::{registered_classes, ContainerBackend, ShutdownHook};
use plexus_domain::value::{AnyValue, ServiceValue};
use plexus_domain::ServiceDescriptor;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::container::MemoryContainer;
use crate::contracts::TypeGraph;
use crate::lifecycle::{stop_all_reverse, InstanceRecord, LookupHandle};
use crate::resolve::BindingContext;
use crate::scanner::ResolvedSubscriber;

thread_local! {
    /// Descriptors this thread is currently constructing, outermost first
    static CONSTRUCTION_STACK: std::cell::RefCell<Vec<(u64, String)>> =
        const { std::cell::RefCell::new(Vec::new()) };
}

/// RAII marker for one in-flight construction on the current thread
///
/// Re-entering a descriptor on the same thread means its constructor chain
/// depends on itself: for singletons the `OnceCell` would block on its own
/// initialization, for PerLookup the recursion would never terminate. The
/// frame turns both into an `UnsatisfiedDependency` naming the cycle.
struct ConstructionFrame;

impl ConstructionFrame {
    fn enter(descriptor: &ServiceDescriptor) -> Result<Self> {
        CONSTRUCTION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(start) = stack.iter().position(|(id, _)| *id == descriptor.id()) {
                let mut path: Vec<String> =
                    stack[start..].iter().map(|(_, key)| key.clone()).collect();
                path.push(descriptor.key().to_string());
                return Err(Error::UnsatisfiedDependency {
                    key: descriptor.key().to_string(),
                    source: Box::new(Error::container(format!(
                        "dependency cycle: {}",
                        path.join(" -> ")
                    ))),
                });
            }
            stack.push((descriptor.id(), descriptor.key().to_string()));
            Ok(Self)
        })
    }
}

impl Drop for ConstructionFrame {
    fn drop(&mut self) {
        CONSTRUCTION_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// The service registry extension
pub struct ServiceRegistry {
    pub(crate) backend: Arc<dyn ContainerBackend>,
    pub(crate) catalog: DashMap<RawType, Arc<ClassMetadata>>,
    pub(crate) graph: TypeGraph,
    pub(crate) scanned: Mutex<HashSet<ServiceKey>>,
    singletons: DashMap<u64, Arc<OnceCell<Arc<InstanceRecord>>>>,
    singleton_order: Mutex<Vec<Arc<InstanceRecord>>>,
    pub(crate) subscribers: DashMap<ServiceKey, Vec<Arc<ResolvedSubscriber>>>,
    unowned_per_lookup: AtomicUsize,
    shutdown_done: AtomicBool,
}

impl ServiceRegistry {
    /// Registry over the default in-memory backend
    pub fn new() -> Arc<Self> {
        Self::with_backend(Arc::new(MemoryContainer::new()))
    }

    /// Registry over a host-supplied container backend
    pub fn with_backend(backend: Arc<dyn ContainerBackend>) -> Arc<Self> {
        Arc::new(Self {
            backend,
            catalog: DashMap::new(),
            graph: TypeGraph::new(),
            scanned: Mutex::new(HashSet::new()),
            singletons: DashMap::new(),
            singleton_order: Mutex::new(Vec::new()),
            subscribers: DashMap::new(),
            unowned_per_lookup: AtomicUsize::new(0),
            shutdown_done: AtomicBool::new(false),
        })
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Add class metadata to the catalog without activating it
    ///
    /// Cataloged classes participate in supertype matching and become chain
    /// registration targets; they are scanned when first activated directly
    /// or through a chain root.
    pub fn add_metadata(&self, meta: ClassMetadata) {
        self.graph.record(&meta);
        self.catalog.insert(meta.ty, Arc::new(meta));
    }

    /// Catalog and activate one class
    ///
    /// Generic classes (declared type parameters) are cataloged only; each
    /// concrete instantiation activates via [`ServiceRegistry::register_key`].
    pub fn register_metadata(self: &Arc<Self>, meta: ClassMetadata) -> Result<()> {
        let generic = !meta.type_params.is_empty();
        let key = meta.self_key();
        self.add_metadata(meta);
        if generic {
            debug!(key = %key, "cataloged generic class; activate instantiations by key");
            return Ok(());
        }
        self.activate_in(&key, &BindingContext::root())
    }

    /// Activate an already-cataloged class by type
    pub fn register<T: ?Sized + 'static>(self: &Arc<Self>) -> Result<()> {
        self.register_key(&ServiceKey::of::<T>())
    }

    /// Activate an already-cataloged class under a concrete key
    ///
    /// The key's type arguments bind the class's declared type parameters.
    pub fn register_key(self: &Arc<Self>, key: &ServiceKey) -> Result<()> {
        if !self.catalog.contains_key(&key.raw()) {
            return Err(Error::invalid_metadata(format!(
                "no class metadata cataloged for {key}"
            )));
        }
        self.activate_in(key, &BindingContext::root())
    }

    /// Catalog every class submitted through the linkme slice
    ///
    /// Returns the number of cataloged entries; nothing is activated.
    pub fn load_linked(&self) -> usize {
        let metas = registered_classes();
        let count = metas.len();
        for meta in metas {
            self.add_metadata(meta);
        }
        count
    }

    /// Catalog and activate every non-generic class from the linkme slice
    pub fn register_linked(self: &Arc<Self>) -> Result<usize> {
        let metas = registered_classes();
        let count = metas.len();
        let keys: Vec<ServiceKey> = metas
            .iter()
            .filter(|m| m.type_params.is_empty())
            .map(ClassMetadata::self_key)
            .collect();
        for meta in metas {
            self.add_metadata(meta);
        }
        for key in &keys {
            self.activate_in(key, &BindingContext::root())?;
        }
        info!(classes = count, activated = keys.len(), "registered linked classes");
        Ok(count)
    }

    /// Register a callback to run at shutdown
    pub fn on_shutdown(&self, hook: ShutdownHook) {
        self.backend.on_shutdown(hook);
    }

    // ========================================================================
    // Instance resolution
    // ========================================================================

    /// Resolve a descriptor to a live record, honoring its scope
    pub(crate) fn resolve_descriptor(
        self: &Arc<Self>,
        descriptor: &Arc<ServiceDescriptor>,
    ) -> Result<Arc<InstanceRecord>> {
        let _frame = ConstructionFrame::enter(descriptor)?;
        match descriptor.scope() {
            Scope::Singleton => {
                let cell = self
                    .singletons
                    .entry(descriptor.id())
                    .or_insert_with(|| Arc::new(OnceCell::new()))
                    .clone();
                let record = cell.get_or_try_init(|| {
                    let record = self.construct(descriptor)?;
                    self.singleton_order
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(Arc::clone(&record));
                    Ok::<_, Error>(record)
                })?;
                Ok(Arc::clone(record))
            }
            Scope::PerLookup => self.construct(descriptor),
        }
    }

    fn construct(
        self: &Arc<Self>,
        descriptor: &Arc<ServiceDescriptor>,
    ) -> Result<Arc<InstanceRecord>> {
        let owner_value: Option<AnyValue> = match descriptor.owner_key() {
            Some(owner_key) => {
                let owner = self
                    .resolve_bare_record(owner_key)
                    .map_err(|e| e.while_constructing(descriptor.key()))?;
                Some(
                    owner
                        .value()
                        .payload()
                        .cloned()
                        .ok_or_else(|| Error::not_found(owner_key))
                        .map_err(|e| e.while_constructing(descriptor.key()))?,
                )
            }
            None => None,
        };

        let mut args = Vec::with_capacity(descriptor.params().len());
        for (shape, key) in descriptor.params() {
            let arg = self
                .resolve_shape(*shape, key, None)
                .map_err(|e| e.while_constructing(descriptor.key()))?;
            args.push(arg);
        }

        let value = descriptor.producer().produce(owner_value.as_ref(), &args)?;
        let record = InstanceRecord::new(Arc::clone(descriptor), value, owner_value);
        record.start()?;
        debug!(descriptor = %descriptor, "constructed instance");
        Ok(record)
    }

    /// Bare resolution: exactly one candidate with a non-null value
    pub(crate) fn resolve_bare_record(
        self: &Arc<Self>,
        key: &ServiceKey,
    ) -> Result<Arc<InstanceRecord>> {
        let candidates = self.backend.descriptors_for(key);
        match candidates.as_slice() {
            [] => Err(Error::not_found(key)),
            [only] => {
                let record = self.resolve_descriptor(only)?;
                if record.value().is_null() {
                    Err(Error::not_found(key))
                } else {
                    Ok(record)
                }
            }
            many => Err(Error::AmbiguousLookup {
                key: key.to_string(),
                candidates: many.iter().map(|d| d.label()).collect(),
            }),
        }
    }

    /// Resolve one wrapper shape around a key
    ///
    /// `tracked` collects PerLookup records for synchronous teardown after
    /// a topic delivery; deferred (provider) shapes resolve later and are
    /// never tracked.
    pub(crate) fn resolve_shape(
        self: &Arc<Self>,
        shape: Shape,
        key: &ServiceKey,
        mut tracked: Option<&mut Vec<Arc<InstanceRecord>>>,
    ) -> Result<ResolvedArg> {
        let mut track = |record: &Arc<InstanceRecord>| {
            if record.descriptor().scope() == Scope::PerLookup {
                if let Some(list) = tracked.as_deref_mut() {
                    list.push(Arc::clone(record));
                }
            }
        };
        match shape {
            Shape::Bare => {
                let record = self.resolve_bare_record(key)?;
                track(&record);
                Ok(ResolvedArg::Bare(record.value().clone()))
            }
            Shape::Optional => {
                let candidates = self.backend.descriptors_for(key);
                match candidates.as_slice() {
                    [] => Ok(ResolvedArg::Optional(None)),
                    [only] => {
                        let record = self.resolve_descriptor(only)?;
                        track(&record);
                        if record.value().is_null() {
                            Ok(ResolvedArg::Optional(None))
                        } else {
                            Ok(ResolvedArg::Optional(Some(record.value().clone())))
                        }
                    }
                    many => Err(Error::AmbiguousLookup {
                        key: key.to_string(),
                        candidates: many.iter().map(|d| d.label()).collect(),
                    }),
                }
            }
            Shape::Provider => Ok(ResolvedArg::Provider(self.provider_by_key(key))),
            Shape::Iterable => {
                let mut values = Vec::new();
                for candidate in self.backend.descriptors_for(key) {
                    let record = self.resolve_descriptor(&candidate)?;
                    track(&record);
                    values.push(record.value().clone());
                }
                Ok(ResolvedArg::Iterable(values))
            }
            Shape::IterableProvider => {
                Ok(ResolvedArg::IterableProvider(self.many_provider_by_key(key)))
            }
        }
    }

    fn note_unowned(&self, record: &Arc<InstanceRecord>) {
        if record.descriptor().scope() == Scope::PerLookup {
            self.unowned_per_lookup.fetch_add(1, Ordering::Relaxed);
        }
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// Bare lookup by key
    ///
    /// PerLookup instances obtained this way have no handle; their stop
    /// hooks will not run. Use [`ServiceRegistry::lookup_handle`] when
    /// teardown matters.
    pub fn lookup_by_key(self: &Arc<Self>, key: &ServiceKey) -> Result<ServiceValue> {
        let record = self.resolve_bare_record(key)?;
        self.note_unowned(&record);
        Ok(record.value().clone())
    }

    /// Bare typed lookup
    pub fn lookup<T: Send + Sync + 'static>(self: &Arc<Self>) -> Result<Arc<T>> {
        self.lookup_key(&ServiceKey::of::<T>())
    }

    /// Bare typed lookup under an explicit (possibly parameterized) key
    pub fn lookup_key<T: Send + Sync + 'static>(self: &Arc<Self>, key: &ServiceKey) -> Result<Arc<T>> {
        let value = self.lookup_by_key(key)?;
        value.downcast::<T>().ok_or_else(|| Error::Downcast {
            key: key.to_string(),
            expected: std::any::type_name::<T>(),
        })
    }

    /// Bare lookup returning a lifecycle handle
    pub fn lookup_handle_by_key(self: &Arc<Self>, key: &ServiceKey) -> Result<LookupHandle> {
        let record = self.resolve_bare_record(key)?;
        Ok(LookupHandle::new(record))
    }

    /// Typed bare lookup returning a lifecycle handle
    pub fn lookup_handle<T: Send + Sync + 'static>(self: &Arc<Self>) -> Result<LookupHandle> {
        self.lookup_handle_by_key(&ServiceKey::of::<T>())
    }

    /// Optional lookup: absence and null map to `None`, never an error
    pub fn lookup_optional_by_key(self: &Arc<Self>, key: &ServiceKey) -> Result<Option<ServiceValue>> {
        match self.resolve_shape(Shape::Optional, key, None)? {
            ResolvedArg::Optional(value) => Ok(value),
            _ => Err(Error::container("optional resolution returned a foreign shape")),
        }
    }

    /// Typed optional lookup
    pub fn lookup_optional<T: Send + Sync + 'static>(self: &Arc<Self>) -> Result<Option<Arc<T>>> {
        let key = ServiceKey::of::<T>();
        match self.lookup_optional_by_key(&key)? {
            None => Ok(None),
            Some(value) => value
                .downcast::<T>()
                .map(Some)
                .ok_or_else(|| Error::Downcast {
                    key: key.to_string(),
                    expected: std::any::type_name::<T>(),
                }),
        }
    }

    /// All matches for a contract; null values are present elements
    pub fn lookup_all_by_key(self: &Arc<Self>, key: &ServiceKey) -> Result<Vec<ServiceValue>> {
        let mut values = Vec::new();
        for candidate in self.backend.descriptors_for(key) {
            let record = self.resolve_descriptor(&candidate)?;
            self.note_unowned(&record);
            values.push(record.value().clone());
        }
        Ok(values)
    }

    /// Typed all-matches lookup; `None` elements are explicit nulls
    pub fn lookup_all<T: Send + Sync + 'static>(self: &Arc<Self>) -> Result<Vec<Option<Arc<T>>>> {
        let key = ServiceKey::of::<T>();
        self.lookup_all_key::<T>(&key)
    }

    /// Typed all-matches lookup under an explicit key
    pub fn lookup_all_key<T: Send + Sync + 'static>(
        self: &Arc<Self>,
        key: &ServiceKey,
    ) -> Result<Vec<Option<Arc<T>>>> {
        self.lookup_all_by_key(key)?
            .into_iter()
            .map(|value| {
                if value.is_null() {
                    Ok(None)
                } else {
                    value
                        .downcast::<T>()
                        .map(Some)
                        .ok_or_else(|| Error::Downcast {
                            key: key.to_string(),
                            expected: std::any::type_name::<T>(),
                        })
                }
            })
            .collect()
    }

    /// Deferred single-value lookup; missing contracts resolve to null
    pub fn provider_by_key(self: &Arc<Self>, key: &ServiceKey) -> ValueProvider {
        let registry = Arc::clone(self);
        let key = key.clone();
        ValueProvider::new(move || registry.provider_get(&key))
    }

    /// Typed deferred lookup
    pub fn provider<T: Send + Sync + 'static>(self: &Arc<Self>) -> ServiceProvider<T> {
        ServiceProvider {
            inner: self.provider_by_key(&ServiceKey::of::<T>()),
            key: ServiceKey::of::<T>(),
            _marker: PhantomData,
        }
    }

    /// Deferred all-matches lookup
    pub fn many_provider_by_key(self: &Arc<Self>, key: &ServiceKey) -> ManyProvider {
        let registry = Arc::clone(self);
        let key = key.clone();
        ManyProvider::new(move || registry.lookup_all_by_key(&key))
    }

    fn provider_get(self: &Arc<Self>, key: &ServiceKey) -> Result<ServiceValue> {
        let candidates = self.backend.descriptors_for(key);
        match candidates.as_slice() {
            [] => Ok(ServiceValue::null()),
            [only] => {
                let record = self.resolve_descriptor(only)?;
                self.note_unowned(&record);
                Ok(record.value().clone())
            }
            many => Err(Error::AmbiguousLookup {
                key: key.to_string(),
                candidates: many.iter().map(|d| d.label()).collect(),
            }),
        }
    }

    // ========================================================================
    // Shutdown and reporting
    // ========================================================================

    /// Shut the registry down: stop singletons in reverse creation order,
    /// then run registered shutdown hooks
    ///
    /// Idempotent. Teardown failures are collected and surfaced together
    /// once every hook has run.
    pub fn shutdown(&self) -> Result<()> {
        if self.shutdown_done.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let unowned = self.unowned_per_lookup.load(Ordering::Relaxed);
        if unowned > 0 {
            warn!(
                count = unowned,
                "per-lookup instances were obtained without handles; their stop hooks never ran"
            );
        }

        let order = std::mem::take(
            &mut *self
                .singleton_order
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let mut errors = stop_all_reverse(&order);

        for hook in self.backend.drain_shutdown_hooks() {
            if let Err(err) = hook() {
                warn!(error = %err, "shutdown hook failed");
                errors.push(err);
            }
        }

        info!(
            singletons = order.len(),
            failures = errors.len(),
            "registry shut down"
        );
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Teardown { errors })
        }
    }

    /// Snapshot of the registry's shape
    pub fn report(&self) -> RegistryReport {
        RegistryReport {
            classes: self.catalog.len(),
            scanned: self
                .scanned
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
            descriptors: self.backend.descriptor_count(),
            contracts: self.backend.contracts().len(),
            singletons_built: self.singletons.iter().filter(|c| c.get().is_some()).count(),
            subscribers: self.subscribers.iter().map(|e| e.value().len()).sum(),
        }
    }

    /// The report as a JSON document
    pub fn report_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.report())
            .map_err(|e| Error::container(format!("report serialization failed: {e}")))
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let report = self.report();
        f.debug_struct("ServiceRegistry")
            .field("classes", &report.classes)
            .field("descriptors", &report.descriptors)
            .field("subscribers", &report.subscribers)
            .finish()
    }
}

/// Typed deferred lookup handle
pub struct ServiceProvider<T> {
    inner: ValueProvider,
    key: ServiceKey,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> ServiceProvider<T> {
    /// Resolve now; `None` when the contract is missing or the value null
    pub fn get(&self) -> Result<Option<Arc<T>>> {
        let value = self.inner.get()?;
        if value.is_null() {
            return Ok(None);
        }
        value
            .downcast::<T>()
            .map(Some)
            .ok_or_else(|| Error::Downcast {
                key: self.key.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }
}

impl<T> std::fmt::Debug for ServiceProvider<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("key", &self.key)
            .finish()
    }
}

/// Serializable summary of the registry's contents
#[derive(Debug, Clone, Serialize)]
pub struct RegistryReport {
    /// Cataloged classes
    pub classes: usize,
    /// Activated registration keys
    pub scanned: usize,
    /// Registered descriptors
    pub descriptors: usize,
    /// Contracts with at least one descriptor
    pub contracts: usize,
    /// Singleton instances constructed so far
    pub singletons_built: usize,
    /// Indexed topic subscribers
    pub subscribers: usize,
}
