//! Class metadata - the member introspection capability
//!
//! Plexus does not reflect over Rust types at runtime. Instead, each
//! participating class describes itself with a [`ClassMetadata`] value:
//! its type parameters, supertypes, scope, constructor, provider members
//! ("Provides"), lifecycle hooks, and topic subscribers. Metadata is built
//! with the same `with_*` builder style the rest of the codebase uses and
//! registered either through the linkme slice (see [`crate::ports`]) or
//! imperatively on a registry instance.
//!
//! ```
//! use plexus_domain::descriptor::Scope;
//! use plexus_domain::metadata::{ClassMetadata, ProvidesMember};
//!
//! struct Clock;
//!
//! let meta = ClassMetadata::of::<Clock>()
//!     .with_scope(Scope::Singleton)
//!     .constructs::<Clock>(vec![], |_| Ok(Clock))
//!     .provides(ProvidesMember::static_field("epoch", || 0_u64));
//! assert_eq!(meta.members.len(), 1);
//! ```

use std::sync::Arc;

use crate::descriptor::{
    DestroyDirective, LifecycleHooks, ProduceFn, Producer, ProducerKind, ResolvedArg, Scope,
};
use crate::error::{Error, Result};
use crate::key::{ParamSpec, RawType, ServiceKey, TypeRef};
use crate::value::{AnyValue, ServiceValue};

/// One declared supertype edge, optionally marked as a contract
#[derive(Clone, Debug)]
pub struct SupertypeDecl {
    /// The supertype, possibly parameterized over the class's variables
    pub ty: TypeRef,
    /// Whether the supertype is usable as a lookup contract
    pub contract: bool,
}

/// Constructor of the class itself as a service
#[derive(Clone)]
pub struct Constructor {
    /// Injectable parameters, in order
    pub params: Vec<ParamSpec>,
    /// Construction closure; receives resolved arguments
    pub construct: Arc<ProduceFn>,
}

impl std::fmt::Debug for Constructor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Constructor")
            .field("params", &self.params.len())
            .finish()
    }
}

/// Subscriber closure: owner instance, message payload, extra resolved args
pub type SubscribeFn = dyn Fn(&AnyValue, &AnyValue, &[ResolvedArg]) -> Result<()> + Send + Sync;

/// One declared topic subscriber method
#[derive(Clone)]
pub struct SubscriberDecl {
    /// Method name, for diagnostics
    pub name: &'static str,
    /// Declared message type; matching is contravariant over supertypes
    pub message: TypeRef,
    /// Additional injectable parameters, resolved fresh per delivery
    pub extra_params: Vec<ParamSpec>,
    /// Invocation closure
    pub invoke: Arc<SubscribeFn>,
}

impl std::fmt::Debug for SubscriberDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberDecl")
            .field("name", &self.name)
            .field("message", &self.message)
            .finish()
    }
}

/// One provider member declaration ("Provides")
#[derive(Clone)]
pub struct ProvidesMember {
    /// Member name; identical resolved signatures under the same name
    /// de-duplicate (interface default method overridden by a class)
    pub name: &'static str,
    /// Producer kind
    pub kind: ProducerKind,
    /// Produced type, possibly referencing the owner's type variables
    pub ty: TypeRef,
    /// Injectable parameters (methods only)
    pub params: Vec<ParamSpec>,
    /// Scope override; defaults to the owning class's scope
    pub scope: Option<Scope>,
    /// Explicit contract override for the produced type
    pub contracts: Option<Vec<TypeRef>>,
    /// Whether the member may produce null
    pub nullable: bool,
    /// Produce closure
    pub produce: Arc<ProduceFn>,
    /// Lifecycle hooks for produced instances
    pub hooks: LifecycleHooks,
    /// Custom destroy directive, overriding the stop hook
    pub destroy: Option<DestroyDirective>,
}

impl ProvidesMember {
    fn raw(
        name: &'static str,
        kind: ProducerKind,
        ty: TypeRef,
        params: Vec<ParamSpec>,
        produce: Arc<ProduceFn>,
    ) -> Self {
        Self {
            name,
            kind,
            ty,
            params,
            scope: None,
            contracts: None,
            nullable: false,
            produce,
            hooks: LifecycleHooks::none(),
            destroy: None,
        }
    }

    /// Static provider field producing `T`
    pub fn static_field<T: Send + Sync + 'static>(
        name: &'static str,
        f: impl Fn() -> T + Send + Sync + 'static,
    ) -> Self {
        Self::raw(
            name,
            ProducerKind::StaticField,
            TypeRef::of::<T>(),
            Vec::new(),
            Arc::new(move |_, _| Ok(ServiceValue::present(f()))),
        )
    }

    /// Static provider field that may hold null
    pub fn static_field_nullable<T: Send + Sync + 'static>(
        name: &'static str,
        f: impl Fn() -> Option<T> + Send + Sync + 'static,
    ) -> Self {
        let mut member = Self::raw(
            name,
            ProducerKind::StaticField,
            TypeRef::of::<T>(),
            Vec::new(),
            Arc::new(move |_, _| {
                Ok(match f() {
                    Some(v) => ServiceValue::present(v),
                    None => ServiceValue::null(),
                })
            }),
        );
        member.nullable = true;
        member
    }

    /// Static provider field with an explicitly-keyed produced type
    ///
    /// Used when the produced type involves the owner's type variables.
    pub fn static_field_keyed(
        name: &'static str,
        ty: TypeRef,
        f: impl Fn() -> Result<ServiceValue> + Send + Sync + 'static,
    ) -> Self {
        Self::raw(
            name,
            ProducerKind::StaticField,
            ty,
            Vec::new(),
            Arc::new(move |_, _| f()),
        )
    }

    /// Instance provider field, read from the owning service's instance
    pub fn instance_field<O, T>(
        name: &'static str,
        f: impl Fn(&O) -> T + Send + Sync + 'static,
    ) -> Self
    where
        O: Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        Self::raw(
            name,
            ProducerKind::InstanceField,
            TypeRef::of::<T>(),
            Vec::new(),
            Arc::new(move |owner, _| {
                let owner = owner.ok_or_else(|| {
                    Error::invalid_metadata(format!("instance field `{name}` produced without an owner"))
                })?;
                let o = owner.downcast_ref::<O>().ok_or_else(|| Error::Downcast {
                    key: name.to_string(),
                    expected: std::any::type_name::<O>(),
                })?;
                Ok(ServiceValue::present(f(o)))
            }),
        )
    }

    /// Instance provider field with an explicitly-keyed produced type
    pub fn instance_field_keyed<O>(
        name: &'static str,
        ty: TypeRef,
        f: impl Fn(&O) -> Result<ServiceValue> + Send + Sync + 'static,
    ) -> Self
    where
        O: Send + Sync + 'static,
    {
        Self::raw(
            name,
            ProducerKind::InstanceField,
            ty,
            Vec::new(),
            Arc::new(move |owner, _| {
                let owner = owner.ok_or_else(|| {
                    Error::invalid_metadata(format!("instance field `{name}` produced without an owner"))
                })?;
                let o = owner.downcast_ref::<O>().ok_or_else(|| Error::Downcast {
                    key: name.to_string(),
                    expected: std::any::type_name::<O>(),
                })?;
                f(o)
            }),
        )
    }

    /// Static provider method producing `T` from resolved arguments
    pub fn static_method<T: Send + Sync + 'static>(
        name: &'static str,
        params: Vec<ParamSpec>,
        f: impl Fn(&[ResolvedArg]) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        Self::raw(
            name,
            ProducerKind::StaticMethod,
            TypeRef::of::<T>(),
            params,
            Arc::new(move |_, args| Ok(ServiceValue::present(f(args)?))),
        )
    }

    /// Static provider method with an explicitly-keyed produced type
    pub fn static_method_keyed(
        name: &'static str,
        ty: TypeRef,
        params: Vec<ParamSpec>,
        f: impl Fn(&[ResolvedArg]) -> Result<ServiceValue> + Send + Sync + 'static,
    ) -> Self {
        Self::raw(
            name,
            ProducerKind::StaticMethod,
            ty,
            params,
            Arc::new(move |_, args| f(args)),
        )
    }

    /// Instance provider method on the owning service's instance
    pub fn instance_method<O, T>(
        name: &'static str,
        params: Vec<ParamSpec>,
        f: impl Fn(&O, &[ResolvedArg]) -> Result<T> + Send + Sync + 'static,
    ) -> Self
    where
        O: Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        Self::raw(
            name,
            ProducerKind::InstanceMethod,
            TypeRef::of::<T>(),
            params,
            Arc::new(move |owner, args| {
                let owner = owner.ok_or_else(|| {
                    Error::invalid_metadata(format!("instance method `{name}` invoked without an owner"))
                })?;
                let o = owner.downcast_ref::<O>().ok_or_else(|| Error::Downcast {
                    key: name.to_string(),
                    expected: std::any::type_name::<O>(),
                })?;
                Ok(ServiceValue::present(f(o, args)?))
            }),
        )
    }

    /// One provider-marked enum constant
    ///
    /// Each constant registers individually under the enum type and its
    /// contracts; the value is shared, enum constants being a closed set of
    /// named singleton values.
    pub fn enum_constant<T: Send + Sync + 'static>(name: &'static str, value: T) -> Self {
        let shared: AnyValue = Arc::new(value);
        Self::raw(
            name,
            ProducerKind::EnumConstant,
            TypeRef::of::<T>(),
            Vec::new(),
            Arc::new(move |_, _| Ok(ServiceValue::from_arc(shared.clone()))),
        )
    }

    /// Override the scope for produced instances
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Replace the produced type's contracts with an explicit list
    pub fn with_contracts(mut self, contracts: Vec<TypeRef>) -> Self {
        self.contracts = Some(contracts);
        self
    }

    /// Mark the member as allowed to produce null
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Attach lifecycle hooks to produced instances
    pub fn with_hooks(mut self, hooks: LifecycleHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Attach a custom destroy directive
    pub fn with_destroy(mut self, destroy: DestroyDirective) -> Self {
        self.destroy = Some(destroy);
        self
    }

    /// Build the tagged producer for this member
    pub fn producer(&self) -> Producer {
        Producer::new(self.kind, Arc::clone(&self.produce))
    }
}

impl std::fmt::Debug for ProvidesMember {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvidesMember")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("ty", &self.ty)
            .field("nullable", &self.nullable)
            .finish()
    }
}

/// Declarative description of one participating class
#[derive(Clone, Debug)]
pub struct ClassMetadata {
    /// The class's raw type (or constructor marker)
    pub ty: RawType,
    /// Declared type parameter names, in order
    pub type_params: Vec<&'static str>,
    /// Declared supertype edges
    pub supertypes: Vec<SupertypeDecl>,
    /// Explicit contract list; fully replaces the derived default set
    pub contract_override: Option<Vec<TypeRef>>,
    /// Default scope for the class and its members
    pub scope: Scope,
    /// False for utility classes that must not be fetchable themselves
    pub service: bool,
    /// Constructor, when the class itself is a service
    pub constructor: Option<Constructor>,
    /// Provider members
    pub members: Vec<ProvidesMember>,
    /// Lifecycle hooks for the class's own instances
    pub hooks: LifecycleHooks,
    /// Topic subscriber methods
    pub subscribers: Vec<SubscriberDecl>,
}

impl ClassMetadata {
    /// Metadata for class `T`, Singleton by default
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            ty: RawType::of::<T>(),
            type_params: Vec::new(),
            supertypes: Vec::new(),
            contract_override: None,
            scope: Scope::Singleton,
            service: true,
            constructor: None,
            members: Vec::new(),
            hooks: LifecycleHooks::none(),
            subscribers: Vec::new(),
        }
    }

    /// Declare the class's type parameter names
    pub fn with_type_params(mut self, params: &[&'static str]) -> Self {
        self.type_params = params.to_vec();
        self
    }

    /// Default scope for the class and members without an override
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Declare a contract supertype
    pub fn contract<S: ?Sized + 'static>(self) -> Self {
        self.contract_ref(TypeRef::of::<S>())
    }

    /// Declare a contract supertype by reference
    pub fn contract_ref(mut self, ty: TypeRef) -> Self {
        self.supertypes.push(SupertypeDecl { ty, contract: true });
        self
    }

    /// Declare a non-contract supertype (still used for topic matching)
    pub fn supertype<S: ?Sized + 'static>(self) -> Self {
        self.supertype_ref(TypeRef::of::<S>())
    }

    /// Declare a non-contract supertype by reference
    pub fn supertype_ref(mut self, ty: TypeRef) -> Self {
        self.supertypes.push(SupertypeDecl {
            ty,
            contract: false,
        });
        self
    }

    /// Replace the derived contract set with an explicit list
    pub fn with_explicit_contracts(mut self, contracts: Vec<TypeRef>) -> Self {
        self.contract_override = Some(contracts);
        self
    }

    /// Mark the class as a utility: never fetchable itself
    pub fn utility(mut self) -> Self {
        self.service = false;
        self
    }

    /// Declare the class's constructor
    pub fn constructs<T: Send + Sync + 'static>(
        mut self,
        params: Vec<ParamSpec>,
        f: impl Fn(&[ResolvedArg]) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        self.constructor = Some(Constructor {
            params,
            construct: Arc::new(move |_, args| Ok(ServiceValue::present(f(args)?))),
        });
        self
    }

    /// Add a provider member
    pub fn provides(mut self, member: ProvidesMember) -> Self {
        self.members.push(member);
        self
    }

    /// Attach lifecycle hooks for the class's own instances
    pub fn with_hooks(mut self, hooks: LifecycleHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Declare a typed subscriber method for messages of type `M`
    pub fn subscribes<O, M>(self, name: &'static str, f: impl Fn(&O, &M) + Send + Sync + 'static) -> Self
    where
        O: Send + Sync + 'static,
        M: Send + Sync + 'static,
    {
        self.subscribes_keyed(
            name,
            TypeRef::of::<M>(),
            Vec::new(),
            Arc::new(move |owner, message, _| {
                let o = owner.downcast_ref::<O>().ok_or_else(|| Error::Downcast {
                    key: name.to_string(),
                    expected: std::any::type_name::<O>(),
                })?;
                let m = message.downcast_ref::<M>().ok_or_else(|| Error::Downcast {
                    key: name.to_string(),
                    expected: std::any::type_name::<M>(),
                })?;
                f(o, m);
                Ok(())
            }),
        )
    }

    /// Declare a subscriber with an explicit message key and extra parameters
    pub fn subscribes_keyed(
        mut self,
        name: &'static str,
        message: TypeRef,
        extra_params: Vec<ParamSpec>,
        invoke: Arc<SubscribeFn>,
    ) -> Self {
        self.subscribers.push(SubscriberDecl {
            name,
            message,
            extra_params,
            invoke,
        });
        self
    }

    /// The class's own registration key when it carries no type parameters
    pub fn self_key(&self) -> ServiceKey {
        ServiceKey::bare(self.ty)
    }
}
