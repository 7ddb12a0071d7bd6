//! Container and registration ports
//!
//! Two narrow seams connect Plexus to its host:
//!
//! - [`ContainerBackend`] - the underlying container's primitive
//!   register/lookup/shutdown machinery. Plexus layers resolution, scanning,
//!   lifecycle and topics on top of it; a default in-memory implementation
//!   lives in `plexus-registry`.
//! - [`PLEXUS_CLASSES`] - auto-registration of class metadata using linkme
//!   distributed slices. Classes submit a [`ClassEntry`] at compile time and
//!   are discovered at runtime, the same way provider plugins register in
//!   the rest of the stack. Test harnesses can bypass the slice and hand
//!   metadata to a registry imperatively.

use std::sync::Arc;

use crate::descriptor::ServiceDescriptor;
use crate::error::Result;
use crate::key::ServiceKey;
use crate::metadata::ClassMetadata;

/// Callback registered to run at container shutdown
pub type ShutdownHook = Box<dyn FnOnce() -> Result<()> + Send>;

/// Primitive capabilities required from the underlying container
///
/// The descriptor table and the shutdown hook list are the only state this
/// port owns. Instance production, scoping and lifecycle sit above it.
pub trait ContainerBackend: Send + Sync {
    /// Register a descriptor under every one of its contracts
    ///
    /// Fails fast with `DuplicateRegistration` when the descriptor would be
    /// indistinguishable from one already registered (see the duplicate
    /// policy in the registry documentation).
    fn register(&self, descriptor: Arc<ServiceDescriptor>) -> Result<()>;

    /// Every descriptor registered under `contract`, in registration order
    fn descriptors_for(&self, contract: &ServiceKey) -> Vec<Arc<ServiceDescriptor>>;

    /// Every contract key with at least one descriptor
    fn contracts(&self) -> Vec<ServiceKey>;

    /// Total number of registered descriptors
    fn descriptor_count(&self) -> usize;

    /// Register a callback to run at shutdown
    fn on_shutdown(&self, hook: ShutdownHook);

    /// Take all shutdown hooks, leaving the list empty
    fn drain_shutdown_hooks(&self) -> Vec<ShutdownHook>;
}

/// Registry entry for a participating class
///
/// The metadata is produced by a factory function so entries stay const-
/// constructible in the distributed slice; closures inside the metadata are
/// created fresh per call.
pub struct ClassEntry {
    /// Diagnostic class name
    pub name: &'static str,
    /// Factory producing the class's metadata
    pub metadata: fn() -> ClassMetadata,
}

// Auto-collection via linkme distributed slices - classes submit entries at compile time
#[linkme::distributed_slice]
pub static PLEXUS_CLASSES: [ClassEntry] = [..];

/// Metadata of every class registered through the distributed slice
pub fn registered_classes() -> Vec<ClassMetadata> {
    PLEXUS_CLASSES.iter().map(|e| (e.metadata)()).collect()
}

/// Names of every class registered through the distributed slice
pub fn list_classes() -> Vec<&'static str> {
    PLEXUS_CLASSES.iter().map(|e| e.name).collect()
}
