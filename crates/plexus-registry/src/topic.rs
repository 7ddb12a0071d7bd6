//! Topic distribution
//!
//! Publishing resolves the message key's supertype closure and delivers to
//! every subscriber whose declared message key matches the message's own
//! key or any key in that closure. Delivery is synchronous on the caller's
//! thread; a failing subscriber is logged and skipped, never blocking the
//! rest, and the failures come back aggregated.
//!
//! PerLookup subscriber owners (and PerLookup extra parameters) constructed
//! for a delivery are torn down before publish returns.

use std::collections::HashSet;
use std::sync::Arc;

use plexus_domain::descriptor::Scope;
use plexus_domain::error::{Error, Result};
use plexus_domain::key::ServiceKey;
use plexus_domain::value::AnyValue;
use tracing::{debug, warn};

use crate::lifecycle::{stop_all_reverse, InstanceRecord};
use crate::registry::ServiceRegistry;
use crate::scanner::ResolvedSubscriber;

impl ServiceRegistry {
    /// Publish a message to every matching subscriber
    ///
    /// Returns the number of successful deliveries. Zero matches is a
    /// silent no-op.
    pub fn publish<M: Send + Sync + 'static>(self: &Arc<Self>, message: M) -> Result<usize> {
        self.publish_by_key(&ServiceKey::of::<M>(), Arc::new(message))
    }

    /// Publish under an explicit (possibly parameterized) message key
    pub fn publish_by_key(self: &Arc<Self>, key: &ServiceKey, payload: AnyValue) -> Result<usize> {
        let mut match_keys = vec![key.clone()];
        match_keys.extend(self.graph.supertypes(key));

        let mut seen: HashSet<usize> = HashSet::new();
        let mut matched: Vec<Arc<ResolvedSubscriber>> = Vec::new();
        for match_key in &match_keys {
            if let Some(list) = self.subscribers.get(match_key) {
                for subscriber in list.iter() {
                    if seen.insert(Arc::as_ptr(subscriber) as usize) {
                        matched.push(Arc::clone(subscriber));
                    }
                }
            }
        }
        debug!(message = %key, subscribers = matched.len(), "publishing");

        let mut delivered = 0usize;
        let mut errors = Vec::new();
        for subscriber in matched {
            match self.deliver(&subscriber, &payload) {
                Ok(()) => delivered += 1,
                Err(err) => {
                    warn!(
                        subscriber = subscriber.name,
                        owner = %subscriber.owner_key,
                        error = %err,
                        "subscriber delivery failed"
                    );
                    errors.push(err);
                }
            }
        }

        if errors.is_empty() {
            Ok(delivered)
        } else {
            Err(Error::Delivery { errors })
        }
    }

    fn deliver(self: &Arc<Self>, subscriber: &ResolvedSubscriber, payload: &AnyValue) -> Result<()> {
        let mut used: Vec<Arc<InstanceRecord>> = Vec::new();
        let result = self.deliver_inner(subscriber, payload, &mut used);
        let teardown = stop_all_reverse(&used);
        match result {
            Err(err) => Err(err),
            Ok(()) if teardown.is_empty() => Ok(()),
            Ok(()) => Err(Error::Teardown { errors: teardown }),
        }
    }

    fn deliver_inner(
        self: &Arc<Self>,
        subscriber: &ResolvedSubscriber,
        payload: &AnyValue,
        used: &mut Vec<Arc<InstanceRecord>>,
    ) -> Result<()> {
        let owner = self.resolve_bare_record(&subscriber.owner_key)?;
        if owner.descriptor().scope() == Scope::PerLookup {
            used.push(Arc::clone(&owner));
        }
        let owner_payload = owner
            .value()
            .payload()
            .cloned()
            .ok_or_else(|| Error::not_found(&subscriber.owner_key))?;

        let mut extras = Vec::with_capacity(subscriber.extra_params.len());
        for (shape, key) in &subscriber.extra_params {
            extras.push(self.resolve_shape(*shape, key, Some(&mut *used))?);
        }
        (subscriber.invoke)(&owner_payload, payload, &extras)
    }
}
