//! In-memory container backend
//!
//! [`MemoryContainer`] is the default [`ContainerBackend`]: a concurrent
//! descriptor table keyed by contract plus a shutdown hook list. It enforces
//! the duplicate-registration policy; everything above it (scoping,
//! lifecycle, topics) lives in the registry.
//!
//! ## Duplicate policy
//!
//! A registration is rejected when an already-registered descriptor is
//! indistinguishable from it at lookup time: same owner, same produced key,
//! same contract set, same producer kind, different member name. Enum
//! constants are exempt - a closed set of named values sharing the type key
//! is exactly what they are. Descriptors from different owners sharing a
//! contract are multiplicity, not collision.

use std::collections::HashSet;
use std::sync::Mutex;

use dashmap::DashMap;
use plexus_domain::descriptor::ProducerKind;
use plexus_domain::error::{Error, Result};
use plexus_domain::key::ServiceKey;
use plexus_domain::ports::{ContainerBackend, ShutdownHook};
use plexus_domain::ServiceDescriptor;
use std::sync::Arc;
use tracing::debug;

/// Default in-process container backend
pub struct MemoryContainer {
    /// Descriptors by contract, in registration order
    table: DashMap<ServiceKey, Vec<Arc<ServiceDescriptor>>>,
    /// Every registered descriptor, for counting and duplicate checks
    all: Mutex<Vec<Arc<ServiceDescriptor>>>,
    /// Hooks to run at shutdown
    hooks: Mutex<Vec<ShutdownHook>>,
}

impl MemoryContainer {
    /// Create an empty backend
    pub fn new() -> Self {
        Self {
            table: DashMap::new(),
            all: Mutex::new(Vec::new()),
            hooks: Mutex::new(Vec::new()),
        }
    }

    fn is_collision(existing: &ServiceDescriptor, incoming: &ServiceDescriptor) -> bool {
        if incoming.producer().kind() == ProducerKind::EnumConstant
            || existing.producer().kind() == ProducerKind::EnumConstant
        {
            return false;
        }
        existing.owner() == incoming.owner()
            && existing.key() == incoming.key()
            && existing.producer().kind() == incoming.producer().kind()
            && existing.member() != incoming.member()
            && same_contract_set(existing.contracts(), incoming.contracts())
    }
}

impl Default for MemoryContainer {
    fn default() -> Self {
        Self::new()
    }
}

fn same_contract_set(a: &[ServiceKey], b: &[ServiceKey]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let set: HashSet<&ServiceKey> = a.iter().collect();
    b.iter().all(|k| set.contains(k))
}

impl ContainerBackend for MemoryContainer {
    fn register(&self, descriptor: Arc<ServiceDescriptor>) -> Result<()> {
        let mut all = self
            .all
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if let Some(existing) = all.iter().find(|d| Self::is_collision(d, &descriptor)) {
            return Err(Error::DuplicateRegistration {
                contract: descriptor.key().to_string(),
                existing: existing.label(),
                incoming: descriptor.label(),
            });
        }

        for contract in descriptor.contracts() {
            self.table
                .entry(contract.clone())
                .or_default()
                .push(Arc::clone(&descriptor));
        }
        debug!(descriptor = %descriptor, contracts = descriptor.contracts().len(), "registered descriptor");
        all.push(descriptor);
        Ok(())
    }

    fn descriptors_for(&self, contract: &ServiceKey) -> Vec<Arc<ServiceDescriptor>> {
        self.table
            .get(contract)
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    fn contracts(&self) -> Vec<ServiceKey> {
        self.table.iter().map(|e| e.key().clone()).collect()
    }

    fn descriptor_count(&self) -> usize {
        self.all
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    fn on_shutdown(&self, hook: ShutdownHook) {
        self.hooks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(hook);
    }

    fn drain_shutdown_hooks(&self) -> Vec<ShutdownHook> {
        std::mem::take(
            &mut self
                .hooks
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        )
    }
}

impl std::fmt::Debug for MemoryContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryContainer")
            .field("contracts", &self.table.len())
            .field("descriptors", &self.descriptor_count())
            .finish()
    }
}
