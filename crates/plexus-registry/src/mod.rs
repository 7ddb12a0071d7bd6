//! Plexus registry
//!
//! The runtime half of Plexus: scans class metadata into service
//! descriptors, resolves lookups with generic-aware keys, coordinates
//! instance lifecycles across scopes, and distributes typed messages to
//! subscribers.
//!
//! Entry point is [`ServiceRegistry`]; the default container backend is
//! [`MemoryContainer`], replaceable through
//! [`plexus_domain::ports::ContainerBackend`].

mod chain;
pub mod container;
pub mod contracts;
pub mod lifecycle;
pub mod logging;
pub mod registry;
pub mod resolve;
pub mod scanner;
mod topic;

pub use container::MemoryContainer;
pub use contracts::TypeGraph;
pub use lifecycle::{InstanceRecord, LifecycleState, LookupHandle};
pub use logging::init_logging;
pub use registry::{RegistryReport, ServiceProvider, ServiceRegistry};
pub use resolve::BindingContext;
pub use scanner::{scan_class, ResolvedSubscriber, ScanOutput};

pub use plexus_domain as domain;
