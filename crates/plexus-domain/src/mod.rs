//! Plexus domain layer
//!
//! Core vocabulary of the service registry: lookup keys with reified type
//! arguments, immutable service descriptors with a uniform producer
//! abstraction, declarative class metadata (the member introspection
//! capability), the container backend port, and the error taxonomy.
//!
//! The runtime - resolution, scanning, lifecycle, topics - lives in
//! `plexus-registry`.

pub mod descriptor;
pub mod error;
pub mod key;
pub mod metadata;
pub mod ports;
pub mod value;

pub use descriptor::{
    DescriptorSpec, DestroyDirective, DestroyTarget, LifecycleHooks, ManyProvider, Producer,
    ProducerKind, ResolvedArg, Scope, ServiceDescriptor, ValueProvider,
};
pub use error::{Error, Result};
pub use key::{ParamSpec, RawType, ServiceKey, Shape, TypeRef};
pub use metadata::{ClassMetadata, Constructor, ProvidesMember, SubscriberDecl, SupertypeDecl};
pub use ports::{
    list_classes, registered_classes, ClassEntry, ContainerBackend, ShutdownHook, PLEXUS_CLASSES,
};
pub use value::{AnyValue, ServiceValue};
