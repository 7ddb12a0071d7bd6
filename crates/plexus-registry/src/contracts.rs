//! Contract discovery
//!
//! The [`TypeGraph`] accumulates every scanned class's declared supertype
//! edges and answers two questions:
//!
//! - the default contract set of a concrete key (itself plus every
//!   transitively-reachable supertype marked as a contract), and
//! - the full supertype closure of a key, which topic distribution uses for
//!   contravariant subscriber matching.
//!
//! Edges declared on a generic class substitute the concrete key's type
//! arguments while walking, so `Repo<User>` reaches `ReadOnly<User>` - never
//! the raw constructor.

use std::collections::HashSet;

use dashmap::DashMap;
use plexus_domain::error::Result;
use plexus_domain::key::{RawType, ServiceKey};
use plexus_domain::metadata::{ClassMetadata, SupertypeDecl};
use tracing::debug;

use crate::resolve::BindingContext;

#[derive(Clone)]
struct TypeNode {
    params: Vec<&'static str>,
    supers: Vec<SupertypeDecl>,
}

/// Supertype graph over every recorded class
pub struct TypeGraph {
    nodes: DashMap<RawType, TypeNode>,
}

impl TypeGraph {
    /// Empty graph
    pub fn new() -> Self {
        Self {
            nodes: DashMap::new(),
        }
    }

    /// Record (or replace) a class's supertype declarations
    pub fn record(&self, meta: &ClassMetadata) {
        self.nodes.insert(
            meta.ty,
            TypeNode {
                params: meta.type_params.clone(),
                supers: meta.supertypes.clone(),
            },
        );
    }

    /// Default contract set of `key`: itself plus every transitively
    /// reachable supertype marked as a contract
    pub fn default_contracts(&self, key: &ServiceKey) -> Result<Vec<ServiceKey>> {
        let mut contracts = vec![key.clone()];
        let mut seen: HashSet<ServiceKey> = HashSet::new();
        seen.insert(key.clone());
        self.walk(key, &mut seen, &mut |resolved, decl| {
            if decl.contract {
                contracts.push(resolved.clone());
            }
            Ok(())
        })?;
        Ok(contracts)
    }

    /// Every supertype of `key`, transitively, regardless of contract flag
    ///
    /// Used for topic matching; edges whose arguments cannot be resolved
    /// are skipped rather than failing a publish.
    pub fn supertypes(&self, key: &ServiceKey) -> Vec<ServiceKey> {
        let mut supers = Vec::new();
        let mut seen: HashSet<ServiceKey> = HashSet::new();
        seen.insert(key.clone());
        let walked = self.walk(key, &mut seen, &mut |resolved, _| {
            supers.push(resolved.clone());
            Ok(())
        });
        if let Err(err) = walked {
            debug!(key = %key, error = %err, "skipping unresolvable supertype edge");
        }
        supers
    }

    fn walk(
        &self,
        key: &ServiceKey,
        seen: &mut HashSet<ServiceKey>,
        visit: &mut impl FnMut(&ServiceKey, &SupertypeDecl) -> Result<()>,
    ) -> Result<()> {
        let Some(node) = self.nodes.get(&key.raw()).map(|n| n.clone()) else {
            return Ok(());
        };
        let ctx = BindingContext::for_owner(&node.params, key)?;
        for decl in &node.supers {
            let resolved = ctx.resolve(&decl.ty, &key.to_string())?;
            if !seen.insert(resolved.clone()) {
                continue;
            }
            visit(&resolved, decl)?;
            self.walk(&resolved, seen, visit)?;
        }
        Ok(())
    }
}

impl Default for TypeGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TypeGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeGraph")
            .field("classes", &self.nodes.len())
            .finish()
    }
}
