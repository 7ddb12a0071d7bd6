//! Error handling types
//!
//! One error enum covers the whole registry surface. Registration-time
//! errors (duplicate registration, malformed metadata) fail fast at scan
//! time; lookup-time errors propagate synchronously to the caller; teardown
//! errors are collected and surfaced as one aggregate at end of shutdown.

use thiserror::Error;

/// Result type alias for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Plexus service registry
#[derive(Error, Debug)]
pub enum Error {
    /// Bare lookup found zero matches, or exactly one match whose value is null
    #[error("service not found for key: {key}")]
    ServiceNotFound {
        /// Display form of the requested key
        key: String,
    },

    /// Bare lookup matched two or more candidate descriptors
    ///
    /// The registry never picks a winner silently. Callers that want
    /// multiplicity use the iterable lookup shapes instead.
    #[error("ambiguous lookup for key {key}: {} candidates: {}", candidates.len(), candidates.join(", "))]
    AmbiguousLookup {
        /// Display form of the requested key
        key: String,
        /// Display forms of every matching descriptor
        candidates: Vec<String>,
    },

    /// A required generic parameter could not be bound from any available context
    #[error("unresolvable type variable `{variable}` in {context}")]
    UnresolvableType {
        /// Name of the unbound type variable
        variable: String,
        /// Where resolution was attempted (owner class, member)
        context: String,
    },

    /// Constructing a requested service transitively needs an unavailable dependency
    #[error("unsatisfied dependency while constructing {key}")]
    UnsatisfiedDependency {
        /// Display form of the service being constructed
        key: String,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },

    /// Two descriptors would collide on the same contract-key pairing
    #[error("duplicate registration for contract {contract}: {existing} vs {incoming}")]
    DuplicateRegistration {
        /// Display form of the colliding contract key
        contract: String,
        /// Descriptor already registered
        existing: String,
        /// Descriptor that attempted to register
        incoming: String,
    },

    /// Class metadata is malformed (scan-time validation failure)
    #[error("invalid class metadata: {message}")]
    InvalidMetadata {
        /// Description of the problem
        message: String,
    },

    /// A stored service value did not have the requested Rust type
    #[error("value for key {key} is not a `{expected}`")]
    Downcast {
        /// Display form of the looked-up key
        key: String,
        /// The requested Rust type
        expected: &'static str,
    },

    /// One or more teardown hooks failed during shutdown
    ///
    /// Individual failures never block teardown of other instances; they
    /// are collected and surfaced together once shutdown has finished.
    #[error("{} teardown hook(s) failed during shutdown", errors.len())]
    Teardown {
        /// Every hook failure, in teardown order
        errors: Vec<Error>,
    },

    /// One or more subscriber deliveries failed during a publish call
    #[error("{} subscriber delivery(ies) failed", errors.len())]
    Delivery {
        /// Every delivery failure, in delivery order
        errors: Vec<Error>,
    },

    /// Error propagated from the underlying container backend
    #[error("container error: {message}")]
    Container {
        /// Description of the backend failure
        message: String,
    },
}

impl Error {
    /// Shorthand for a [`Error::ServiceNotFound`] from any displayable key
    pub fn not_found(key: impl std::fmt::Display) -> Self {
        Error::ServiceNotFound {
            key: key.to_string(),
        }
    }

    /// Shorthand for a [`Error::InvalidMetadata`]
    pub fn invalid_metadata(message: impl Into<String>) -> Self {
        Error::InvalidMetadata {
            message: message.into(),
        }
    }

    /// Shorthand for a [`Error::Container`]
    pub fn container(message: impl Into<String>) -> Self {
        Error::Container {
            message: message.into(),
        }
    }

    /// Wrap this error as the cause of an unsatisfied dependency on `key`
    pub fn while_constructing(self, key: impl std::fmt::Display) -> Self {
        Error::UnsatisfiedDependency {
            key: key.to_string(),
            source: Box::new(self),
        }
    }

    /// True for the "nothing matched" family of errors
    ///
    /// Wrapper shapes (Optional, Provider, Iterable) use this to convert
    /// absence into empty/null instead of raising.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ServiceNotFound { .. })
    }
}
