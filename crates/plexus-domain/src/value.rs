//! Produced service values
//!
//! A provider member is allowed to produce null. "A null value" and "no
//! descriptor matched" are different observations - bare lookups fail on
//! both, while iterable shapes report a present null element - so the
//! produced value tracks nullness explicitly instead of collapsing it into
//! absence.

use std::any::Any;
use std::sync::Arc;

/// Type-erased shared service payload
pub type AnyValue = Arc<dyn Any + Send + Sync>;

/// A produced service value; null is explicit, not absent
#[derive(Clone)]
pub struct ServiceValue(Option<AnyValue>);

impl ServiceValue {
    /// A present value
    pub fn present<T: Send + Sync + 'static>(value: T) -> Self {
        Self(Some(Arc::new(value)))
    }

    /// A present value from an already-erased payload
    pub fn from_arc(value: AnyValue) -> Self {
        Self(Some(value))
    }

    /// An explicit null
    pub fn null() -> Self {
        Self(None)
    }

    /// True when the producer yielded null
    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    /// The erased payload, unless null
    pub fn payload(&self) -> Option<&AnyValue> {
        self.0.as_ref()
    }

    /// Downcast the payload to `T`; `None` when null or of another type
    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.0.clone().and_then(|any| any.downcast::<T>().ok())
    }
}

impl std::fmt::Debug for ServiceValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(_) => f.write_str("ServiceValue(present)"),
            None => f.write_str("ServiceValue(null)"),
        }
    }
}
