//! Chain activation
//!
//! Activating a registration key scans its class, registers the produced
//! descriptors, indexes its subscribers, then walks the provider chain:
//! every produced type that is itself a cataloged class activates in turn,
//! inside the activating class's binding context so that resolved type
//! arguments flow down the chain.
//!
//! One scan lock serializes activation. The visited set makes activation
//! idempotent per key and breaks chain cycles; a second thread activating
//! concurrently blocks until the first finishes, then observes the result.
//!
//! Activation is two-phase: the whole chain is scanned before anything is
//! registered, and a failed activation removes its visited marks so a
//! later attempt re-scans instead of silently succeeding. A collision
//! surfaced while committing leaves any descriptors registered before it
//! in place.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError};

use plexus_domain::error::{Error, Result};
use plexus_domain::key::ServiceKey;
use tracing::{debug, info};

use crate::registry::ServiceRegistry;
use crate::resolve::BindingContext;
use crate::scanner::{scan_class, ScanOutput};

impl ServiceRegistry {
    /// Activate a registration key and everything its provider chain reaches
    pub(crate) fn activate_in(
        self: &Arc<Self>,
        key: &ServiceKey,
        outer: &BindingContext<'_>,
    ) -> Result<()> {
        let mut scanned = self.scanned.lock().unwrap_or_else(PoisonError::into_inner);
        let mut added = Vec::new();
        let mut staged = Vec::new();
        let result = self
            .collect_chain(key, outer, &mut scanned, &mut added, &mut staged)
            .and_then(|()| self.commit(staged));
        if result.is_err() {
            for visited in &added {
                scanned.remove(visited);
            }
        }
        result
    }

    /// Scan `key` and its provider chain, staging outputs without touching
    /// the backend
    fn collect_chain(
        self: &Arc<Self>,
        key: &ServiceKey,
        outer: &BindingContext<'_>,
        scanned: &mut HashSet<ServiceKey>,
        added: &mut Vec<ServiceKey>,
        staged: &mut Vec<(ServiceKey, ScanOutput)>,
    ) -> Result<()> {
        if !scanned.insert(key.clone()) {
            return Ok(());
        }
        added.push(key.clone());

        let meta = self
            .catalog
            .get(&key.raw())
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| {
                Error::invalid_metadata(format!("no class metadata cataloged for {key}"))
            })?;
        let ctx = BindingContext::nested(&meta.type_params, key, outer)?;
        let output = scan_class(&meta, key, &ctx, &self.graph)?;

        // Chain step: produced types that are themselves cataloged classes
        // activate inside this class's binding context.
        let targets = output.chain_targets.clone();
        staged.push((key.clone(), output));
        for target in targets {
            if target == *key {
                continue;
            }
            if self.catalog.contains_key(&target.raw()) {
                debug!(from = %key, to = %target, "following provider chain");
                self.collect_chain(&target, &ctx, scanned, added, staged)?;
            }
        }
        Ok(())
    }

    fn commit(self: &Arc<Self>, staged: Vec<(ServiceKey, ScanOutput)>) -> Result<()> {
        for (key, output) in staged {
            let descriptor_count = output.descriptors.len();
            for descriptor in output.descriptors {
                self.backend.register(descriptor)?;
            }
            for subscriber in output.subscribers {
                self.subscribers
                    .entry(subscriber.message_key.clone())
                    .or_default()
                    .push(subscriber);
            }
            info!(class = %key, descriptors = descriptor_count, "activated class");
        }
        Ok(())
    }
}
