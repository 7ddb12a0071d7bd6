//! Lifecycle coordination
//!
//! Every produced instance carries an [`InstanceRecord`] tracking the
//! one-directional `Created -> Started -> Stopped` progression. Starting is
//! at most once; stopping is idempotent. A custom destroy directive
//! overrides the default stop hook and may run against the produced instance
//! or the producing owner.
//!
//! PerLookup callers own teardown through a [`LookupHandle`]. A per-lookup
//! instance obtained without a handle is never torn down - not at shutdown
//! either - and that is the caller's responsibility, not a registry bug.
//! Singleton records are registry-owned: closing a handle to one is a no-op,
//! and the registry stops them exactly once at shutdown, in reverse creation
//! order.

use std::sync::{Arc, Mutex, PoisonError};

use plexus_domain::descriptor::{DestroyTarget, Scope};
use plexus_domain::error::{Error, Result};
use plexus_domain::value::{AnyValue, ServiceValue};
use plexus_domain::ServiceDescriptor;
use tracing::{debug, warn};

/// One-directional lifecycle state of a produced instance
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    /// Produced, start hook not yet run
    Created,
    /// Start hook ran (or there was none)
    Started,
    /// Stop hook/destroy directive ran; terminal
    Stopped,
}

/// Lifecycle record of one produced instance
pub struct InstanceRecord {
    descriptor: Arc<ServiceDescriptor>,
    value: ServiceValue,
    /// Producing owner instance, kept for producer-targeted destroy directives
    owner: Option<AnyValue>,
    state: Mutex<LifecycleState>,
}

impl InstanceRecord {
    /// Record a freshly produced instance in `Created` state
    pub fn new(
        descriptor: Arc<ServiceDescriptor>,
        value: ServiceValue,
        owner: Option<AnyValue>,
    ) -> Arc<Self> {
        Arc::new(Self {
            descriptor,
            value,
            owner,
            state: Mutex::new(LifecycleState::Created),
        })
    }

    /// The produced value (possibly an explicit null)
    pub fn value(&self) -> &ServiceValue {
        &self.value
    }

    /// The originating descriptor
    pub fn descriptor(&self) -> &Arc<ServiceDescriptor> {
        &self.descriptor
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Transition `Created -> Started`, running the start hook once
    ///
    /// Already-started and stopped records are left untouched.
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != LifecycleState::Created {
            return Ok(());
        }
        if let (Some(hook), Some(payload)) = (&self.descriptor.hooks().start, self.value.payload())
        {
            hook(payload)?;
        }
        *state = LifecycleState::Started;
        debug!(descriptor = %self.descriptor, "instance started");
        Ok(())
    }

    /// Transition to `Stopped`, running the destroy directive or stop hook
    ///
    /// Idempotent: the second and later calls do nothing, so a destroy hook
    /// never runs twice.
    pub fn stop(&self) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state == LifecycleState::Stopped {
                return Ok(());
            }
            *state = LifecycleState::Stopped;
        }
        self.run_teardown()
    }

    fn run_teardown(&self) -> Result<()> {
        if let Some(directive) = self.descriptor.destroy() {
            let target = match directive.target {
                DestroyTarget::ProvidedInstance => self.value.payload().cloned(),
                DestroyTarget::Producer => self.owner.clone(),
            };
            return match target {
                Some(value) => directive.invoke(&value),
                None => {
                    warn!(
                        descriptor = %self.descriptor,
                        method = directive.method,
                        "destroy directive target unavailable; skipping"
                    );
                    Ok(())
                }
            };
        }
        if let (Some(hook), Some(payload)) = (&self.descriptor.hooks().stop, self.value.payload()) {
            hook(payload)?;
        }
        debug!(descriptor = %self.descriptor, "instance stopped");
        Ok(())
    }
}

impl std::fmt::Debug for InstanceRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceRecord")
            .field("descriptor", &self.descriptor.label())
            .field("state", &self.state())
            .finish()
    }
}

/// Caller-held handle to one looked-up instance
///
/// For PerLookup instances the handle is the only way to run teardown;
/// dropping it without [`LookupHandle::close`] leaks the stop hook by
/// design.
pub struct LookupHandle {
    record: Arc<InstanceRecord>,
}

impl LookupHandle {
    pub(crate) fn new(record: Arc<InstanceRecord>) -> Self {
        Self { record }
    }

    /// The held value
    pub fn value(&self) -> &ServiceValue {
        self.record.value()
    }

    /// Downcast the held value
    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.record.value().downcast::<T>()
    }

    /// Current lifecycle state of the held instance
    pub fn state(&self) -> LifecycleState {
        self.record.state()
    }

    /// Tear down a PerLookup instance; no-op for registry-owned singletons
    /// and on repeated calls
    pub fn close(&self) -> Result<()> {
        match self.record.descriptor().scope() {
            Scope::Singleton => Ok(()),
            Scope::PerLookup => self.record.stop(),
        }
    }
}

impl std::fmt::Debug for LookupHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupHandle")
            .field("record", &self.record)
            .finish()
    }
}

/// Stop every record, newest first, collecting failures
///
/// No failure blocks teardown of the remaining records; the collected
/// errors surface as one aggregate.
pub fn stop_all_reverse(records: &[Arc<InstanceRecord>]) -> Vec<Error> {
    let mut errors = Vec::new();
    for record in records.iter().rev() {
        if let Err(err) = record.stop() {
            warn!(descriptor = %record.descriptor(), error = %err, "teardown hook failed");
            errors.push(err);
        }
    }
    errors
}
