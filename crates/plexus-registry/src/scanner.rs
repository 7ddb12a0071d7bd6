//! Provides scanner
//!
//! Turns one class's [`ClassMetadata`] into immutable service descriptors
//! and resolved subscriber entries. All validation happens here, at scan
//! time, so malformed metadata aborts startup instead of surfacing on some
//! later lookup:
//!
//! - type arguments of the registration key must match the declared
//!   parameter list;
//! - explicit contract overrides must be non-empty;
//! - instance members require the owning class to be a constructible
//!   service;
//! - members whose resolved signature duplicates an earlier member of the
//!   same name are dropped (an interface default provider method overridden
//!   by an implementing class registers exactly once).
//!
//! Classes whose only registrations come from static provides members get
//! no self-descriptor: `lookup(Utility)` fails with `ServiceNotFound` while
//! the static providers stay reachable.

use std::collections::HashSet;
use std::sync::Arc;

use plexus_domain::descriptor::{DescriptorSpec, Producer, ProducerKind};
use plexus_domain::error::{Error, Result};
use plexus_domain::key::{ParamSpec, ServiceKey, Shape, TypeRef};
use plexus_domain::metadata::{ClassMetadata, SubscribeFn};
use plexus_domain::ServiceDescriptor;
use tracing::debug;

use crate::contracts::TypeGraph;
use crate::resolve::BindingContext;

/// A subscriber with its declared types resolved to concrete keys
pub struct ResolvedSubscriber {
    /// Key the owning service resolves under
    pub owner_key: ServiceKey,
    /// Resolved declared message key
    pub message_key: ServiceKey,
    /// Method name, for diagnostics
    pub name: &'static str,
    /// Extra parameters, resolved fresh per delivery
    pub extra_params: Vec<(Shape, ServiceKey)>,
    /// Invocation closure
    pub invoke: Arc<SubscribeFn>,
}

impl std::fmt::Debug for ResolvedSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSubscriber")
            .field("owner", &self.owner_key)
            .field("message", &self.message_key)
            .field("name", &self.name)
            .finish()
    }
}

/// Everything one class scan produces
#[derive(Debug)]
pub struct ScanOutput {
    /// Descriptors to hand to the container backend
    pub descriptors: Vec<Arc<ServiceDescriptor>>,
    /// Subscribers to index for topic distribution
    pub subscribers: Vec<Arc<ResolvedSubscriber>>,
    /// Produced keys whose classes may carry further providers (chain roots)
    pub chain_targets: Vec<ServiceKey>,
}

fn resolve_params(
    params: &[ParamSpec],
    ctx: &BindingContext<'_>,
    context: &str,
) -> Result<Vec<(Shape, ServiceKey)>> {
    params
        .iter()
        .map(|p| Ok((p.shape, ctx.resolve(&p.ty, context)?)))
        .collect()
}

fn resolve_contracts(
    produced: &ServiceKey,
    overrides: Option<&Vec<TypeRef>>,
    ctx: &BindingContext<'_>,
    graph: &TypeGraph,
    context: &str,
) -> Result<Vec<ServiceKey>> {
    match overrides {
        // An explicit list fully replaces the derived default set
        Some(list) => {
            if list.is_empty() {
                return Err(Error::invalid_metadata(format!(
                    "{context}: explicit contract list must not be empty"
                )));
            }
            list.iter().map(|ty| ctx.resolve(ty, context)).collect()
        }
        None => graph.default_contracts(produced),
    }
}

/// Scan one class registration into descriptors and subscribers
pub fn scan_class(
    meta: &ClassMetadata,
    owner_key: &ServiceKey,
    ctx: &BindingContext<'_>,
    graph: &TypeGraph,
) -> Result<ScanOutput> {
    if owner_key.raw() != meta.ty {
        return Err(Error::invalid_metadata(format!(
            "registration key {} does not match metadata for {}",
            owner_key,
            meta.ty.name()
        )));
    }

    let mut descriptors = Vec::new();
    let mut subscribers = Vec::new();
    let mut chain_targets = Vec::new();

    let is_service = meta.service && meta.constructor.is_some();

    // The class itself as a service
    if is_service {
        let constructor = meta
            .constructor
            .as_ref()
            .ok_or_else(|| Error::invalid_metadata("constructor vanished mid-scan"))?;
        let context = format!("{owner_key}::<constructor>");
        let contracts = resolve_contracts(
            owner_key,
            meta.contract_override.as_ref(),
            ctx,
            graph,
            &context,
        )?;
        descriptors.push(Arc::new(ServiceDescriptor::new(DescriptorSpec {
            key: owner_key.clone(),
            contracts,
            scope: meta.scope,
            owner: owner_key.clone(),
            owner_key: None,
            member: "<constructor>",
            producer: Producer::new(ProducerKind::StaticMethod, Arc::clone(&constructor.construct)),
            params: resolve_params(&constructor.params, ctx, &context)?,
            nullable: false,
            hooks: meta.hooks.clone(),
            destroy: None,
        })));
    }

    // Provider members, de-duplicated by resolved signature per member name
    let mut seen_signatures: HashSet<(&'static str, ServiceKey)> = HashSet::new();
    for member in &meta.members {
        let context = format!("{owner_key}::{}", member.name);
        let produced = ctx.resolve(&member.ty, &context)?;

        if !seen_signatures.insert((member.name, produced.clone())) {
            debug!(member = context, "skipping duplicate resolved signature");
            continue;
        }

        if member.kind.needs_owner() && !is_service {
            return Err(Error::invalid_metadata(format!(
                "{context}: instance member requires a constructible service class"
            )));
        }

        let contracts =
            resolve_contracts(&produced, member.contracts.as_ref(), ctx, graph, &context)?;
        chain_targets.push(produced.clone());
        descriptors.push(Arc::new(ServiceDescriptor::new(DescriptorSpec {
            key: produced,
            contracts,
            scope: member.scope.unwrap_or(meta.scope),
            owner: owner_key.clone(),
            owner_key: member.kind.needs_owner().then(|| owner_key.clone()),
            member: member.name,
            producer: member.producer(),
            params: resolve_params(&member.params, ctx, &context)?,
            nullable: member.nullable,
            hooks: member.hooks.clone(),
            destroy: member.destroy.clone(),
        })));
    }

    // Subscriber methods need a resolvable owning service
    for sub in &meta.subscribers {
        let context = format!("{owner_key}::{}", sub.name);
        if !is_service {
            return Err(Error::invalid_metadata(format!(
                "{context}: subscriber methods require a constructible service class"
            )));
        }
        subscribers.push(Arc::new(ResolvedSubscriber {
            owner_key: owner_key.clone(),
            message_key: ctx.resolve(&sub.message, &context)?,
            name: sub.name,
            extra_params: resolve_params(&sub.extra_params, ctx, &context)?,
            invoke: Arc::clone(&sub.invoke),
        }));
    }

    debug!(
        class = meta.ty.name(),
        descriptors = descriptors.len(),
        subscribers = subscribers.len(),
        "scanned class"
    );

    Ok(ScanOutput {
        descriptors,
        subscribers,
        chain_targets,
    })
}
