//! Service descriptors and producers
//!
//! A [`ServiceDescriptor`] is the immutable registration record for one
//! producible service: its key, the contracts it is fetchable under, its
//! scope, and a [`Producer`] that knows how to create the value. All five
//! producer kinds (static/instance field, static/instance method, enum
//! constant) share one closure-based `produce` surface, so the scanner and
//! the lifecycle coordinator never branch on the kind.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::error::Result;
use crate::key::{ServiceKey, Shape};
use crate::value::{AnyValue, ServiceValue};

/// Service scope
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Scope {
    /// One cached instance for the container's lifetime
    Singleton,
    /// A fresh instance per lookup, owned by the caller's handle
    PerLookup,
}

/// The five producer kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ProducerKind {
    /// Static field: no owner instance, no parameters
    StaticField,
    /// Instance field: read from the owning service's current instance
    InstanceField,
    /// Static method: no owner instance, zero-or-N resolved parameters
    StaticMethod,
    /// Instance method: owner instance plus resolved parameters
    InstanceMethod,
    /// One enum constant, registered individually
    EnumConstant,
}

impl ProducerKind {
    /// True for kinds that read from an owning service instance
    pub fn needs_owner(self) -> bool {
        matches!(self, ProducerKind::InstanceField | ProducerKind::InstanceMethod)
    }
}

/// Deferred single-value lookup handed to provider parameters
///
/// `get()` re-resolves on every call; a missing contract yields an explicit
/// null rather than an error.
#[derive(Clone)]
pub struct ValueProvider(Arc<dyn Fn() -> Result<ServiceValue> + Send + Sync>);

impl ValueProvider {
    /// Wrap a deferred lookup closure
    pub fn new(f: impl Fn() -> Result<ServiceValue> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Resolve now
    pub fn get(&self) -> Result<ServiceValue> {
        (self.0)()
    }
}

impl fmt::Debug for ValueProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValueProvider")
    }
}

/// Deferred all-matches lookup handed to iterable-provider parameters
#[derive(Clone)]
pub struct ManyProvider(Arc<dyn Fn() -> Result<Vec<ServiceValue>> + Send + Sync>);

impl ManyProvider {
    /// Wrap a deferred lookup closure
    pub fn new(f: impl Fn() -> Result<Vec<ServiceValue>> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Resolve now; possibly empty, never an error for a missing contract
    pub fn get(&self) -> Result<Vec<ServiceValue>> {
        (self.0)()
    }
}

impl fmt::Debug for ManyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ManyProvider")
    }
}

/// One resolved argument, matching the declared [`Shape`]
#[derive(Clone, Debug)]
pub enum ResolvedArg {
    /// Present, non-null value
    Bare(ServiceValue),
    /// `None` when absent or null
    Optional(Option<ServiceValue>),
    /// Deferred single-value lookup
    Provider(ValueProvider),
    /// All matches; elements may be explicit nulls
    Iterable(Vec<ServiceValue>),
    /// Deferred all-matches lookup
    IterableProvider(ManyProvider),
}

impl ResolvedArg {
    /// The declared shape this argument satisfies
    pub fn shape(&self) -> Shape {
        match self {
            ResolvedArg::Bare(_) => Shape::Bare,
            ResolvedArg::Optional(_) => Shape::Optional,
            ResolvedArg::Provider(_) => Shape::Provider,
            ResolvedArg::Iterable(_) => Shape::Iterable,
            ResolvedArg::IterableProvider(_) => Shape::IterableProvider,
        }
    }

    /// Downcast a bare argument
    pub fn bare<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        match self {
            ResolvedArg::Bare(value) => value.downcast::<T>(),
            _ => None,
        }
    }

    /// Downcast an optional argument
    pub fn optional<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        match self {
            ResolvedArg::Optional(Some(value)) => value.downcast::<T>(),
            _ => None,
        }
    }

    /// Downcast every present element of an iterable argument
    pub fn iterable<T: Send + Sync + 'static>(&self) -> Vec<Arc<T>> {
        match self {
            ResolvedArg::Iterable(values) => {
                values.iter().filter_map(ServiceValue::downcast::<T>).collect()
            }
            _ => Vec::new(),
        }
    }

    /// The deferred provider, when this argument is one
    pub fn provider(&self) -> Option<&ValueProvider> {
        match self {
            ResolvedArg::Provider(p) => Some(p),
            _ => None,
        }
    }
}

/// Produce closure: owner instance (for instance kinds) plus resolved args
pub type ProduceFn =
    dyn Fn(Option<&AnyValue>, &[ResolvedArg]) -> Result<ServiceValue> + Send + Sync;

/// Uniform producer abstraction over the five member kinds
#[derive(Clone)]
pub struct Producer {
    kind: ProducerKind,
    produce: Arc<ProduceFn>,
}

impl Producer {
    /// Build a producer of the given kind from its closure
    pub fn new(kind: ProducerKind, produce: Arc<ProduceFn>) -> Self {
        Self { kind, produce }
    }

    /// The tagged kind
    pub fn kind(&self) -> ProducerKind {
        self.kind
    }

    /// Produce a value
    ///
    /// `owner` is the owning service's current instance for instance kinds
    /// and `None` otherwise; `args` match the descriptor's parameter specs
    /// in order.
    pub fn produce(&self, owner: Option<&AnyValue>, args: &[ResolvedArg]) -> Result<ServiceValue> {
        (self.produce)(owner, args)
    }
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer").field("kind", &self.kind).finish()
    }
}

/// What a custom destroy directive runs against
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DestroyTarget {
    /// The produced instance itself
    ProvidedInstance,
    /// The producing owner/factory instance
    Producer,
}

/// Destroy closure, invoked on the directive's target value
pub type DestroyFn = dyn Fn(&AnyValue) -> Result<()> + Send + Sync;

/// Custom destroy directive, overriding the default stop convention
#[derive(Clone)]
pub struct DestroyDirective {
    /// Method name, for diagnostics
    pub method: &'static str,
    /// Which instance the directive runs against
    pub target: DestroyTarget,
    invoke: Arc<DestroyFn>,
}

impl DestroyDirective {
    /// Directive running against the produced instance
    pub fn on_instance(method: &'static str, invoke: Arc<DestroyFn>) -> Self {
        Self {
            method,
            target: DestroyTarget::ProvidedInstance,
            invoke,
        }
    }

    /// Directive running against the producing owner/factory
    pub fn on_producer(method: &'static str, invoke: Arc<DestroyFn>) -> Self {
        Self {
            method,
            target: DestroyTarget::Producer,
            invoke,
        }
    }

    /// Typed convenience: directive downcasting the target to `T`
    pub fn of<T: Send + Sync + 'static>(
        method: &'static str,
        target: DestroyTarget,
        f: impl Fn(&T) + Send + Sync + 'static,
    ) -> Self {
        let invoke: Arc<DestroyFn> = Arc::new(move |value| {
            if let Some(v) = value.downcast_ref::<T>() {
                f(v);
            }
            Ok(())
        });
        Self {
            method,
            target,
            invoke,
        }
    }

    /// Run the directive against the chosen target value
    pub fn invoke(&self, target: &AnyValue) -> Result<()> {
        (self.invoke)(target)
    }
}

impl fmt::Debug for DestroyDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestroyDirective")
            .field("method", &self.method)
            .field("target", &self.target)
            .finish()
    }
}

/// Lifecycle hook closure, invoked on a produced (non-null) instance
pub type HookFn = dyn Fn(&AnyValue) -> Result<()> + Send + Sync;

/// Optional start/stop hooks attached to a produced type
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    /// Runs on the Created -> Started transition
    pub start: Option<Arc<HookFn>>,
    /// Runs on the -> Stopped transition, unless a destroy directive overrides
    pub stop: Option<Arc<HookFn>>,
}

impl LifecycleHooks {
    /// No hooks
    pub fn none() -> Self {
        Self::default()
    }

    /// Typed start hook
    pub fn on_start<T: Send + Sync + 'static>(mut self, f: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.start = Some(Arc::new(move |value| {
            if let Some(v) = value.downcast_ref::<T>() {
                f(v);
            }
            Ok(())
        }));
        self
    }

    /// Typed stop hook
    pub fn on_stop<T: Send + Sync + 'static>(mut self, f: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.stop = Some(Arc::new(move |value| {
            if let Some(v) = value.downcast_ref::<T>() {
                f(v);
            }
            Ok(())
        }));
        self
    }
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("start", &self.start.is_some())
            .field("stop", &self.stop.is_some())
            .finish()
    }
}

static NEXT_DESCRIPTOR_ID: AtomicU64 = AtomicU64::new(1);

/// Immutable registration record for one producible service
#[derive(Debug)]
pub struct ServiceDescriptor {
    id: u64,
    key: ServiceKey,
    contracts: Vec<ServiceKey>,
    scope: Scope,
    owner: ServiceKey,
    owner_key: Option<ServiceKey>,
    member: &'static str,
    producer: Producer,
    params: Vec<(Shape, ServiceKey)>,
    nullable: bool,
    hooks: LifecycleHooks,
    destroy: Option<DestroyDirective>,
}

/// Builder-style construction arguments for [`ServiceDescriptor`]
///
/// The scanner assembles these; the struct keeps the field list readable at
/// the single construction site.
pub struct DescriptorSpec {
    /// Produced service key
    pub key: ServiceKey,
    /// Non-empty contract set (explicit override already applied)
    pub contracts: Vec<ServiceKey>,
    /// Scope of produced instances
    pub scope: Scope,
    /// Key of the declaring class registration
    pub owner: ServiceKey,
    /// Key to resolve the owner instance under, for instance kinds
    pub owner_key: Option<ServiceKey>,
    /// Declaring member name
    pub member: &'static str,
    /// The producer
    pub producer: Producer,
    /// Resolved parameter shapes and keys, in declaration order
    pub params: Vec<(Shape, ServiceKey)>,
    /// Whether the member may produce null
    pub nullable: bool,
    /// Lifecycle hooks of the produced type
    pub hooks: LifecycleHooks,
    /// Custom destroy directive, if any
    pub destroy: Option<DestroyDirective>,
}

impl ServiceDescriptor {
    /// Seal a spec into an immutable descriptor with a fresh identity
    pub fn new(spec: DescriptorSpec) -> Self {
        Self {
            id: NEXT_DESCRIPTOR_ID.fetch_add(1, Ordering::Relaxed),
            key: spec.key,
            contracts: spec.contracts,
            scope: spec.scope,
            owner: spec.owner,
            owner_key: spec.owner_key,
            member: spec.member,
            producer: spec.producer,
            params: spec.params,
            nullable: spec.nullable,
            hooks: spec.hooks,
            destroy: spec.destroy,
        }
    }

    /// Process-unique descriptor identity
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Produced service key
    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    /// Contracts this descriptor is fetchable under (never empty)
    pub fn contracts(&self) -> &[ServiceKey] {
        &self.contracts
    }

    /// Scope of produced instances
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Key of the declaring class registration
    pub fn owner(&self) -> &ServiceKey {
        &self.owner
    }

    /// Key the owner instance resolves under, for instance kinds
    pub fn owner_key(&self) -> Option<&ServiceKey> {
        self.owner_key.as_ref()
    }

    /// Declaring member name
    pub fn member(&self) -> &'static str {
        self.member
    }

    /// The producer
    pub fn producer(&self) -> &Producer {
        &self.producer
    }

    /// Resolved parameter shapes and keys
    pub fn params(&self) -> &[(Shape, ServiceKey)] {
        &self.params
    }

    /// Whether the member may produce null
    pub fn nullable(&self) -> bool {
        self.nullable
    }

    /// Lifecycle hooks of the produced type
    pub fn hooks(&self) -> &LifecycleHooks {
        &self.hooks
    }

    /// Custom destroy directive, if any
    pub fn destroy(&self) -> Option<&DestroyDirective> {
        self.destroy.as_ref()
    }

    /// Diagnostic label: `Owner::member -> Key`
    pub fn label(&self) -> String {
        format!("{}::{} -> {}", self.owner, self.member, self.key)
    }
}

impl fmt::Display for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
