//! Type-key resolution
//!
//! A [`BindingContext`] binds a class's declared type-variable names to
//! concrete [`ServiceKey`]s. Resolution consults the call site's concrete
//! context first and falls back to an outer declaring context - the same
//! two-step the test-harness injection path uses, where a generic test base
//! class's variables resolve from the concrete declaring test class rather
//! than the immediate method.
//!
//! Keys never carry unresolved variables: a `TypeRef` that still mentions an
//! unbound variable fails with `UnresolvableType` naming it.

use std::collections::HashMap;

use plexus_domain::error::{Error, Result};
use plexus_domain::key::{ServiceKey, TypeRef};

/// Bindings from type-variable names to concrete keys, with an optional
/// outer fallback context
#[derive(Debug)]
pub struct BindingContext<'a> {
    vars: HashMap<&'static str, ServiceKey>,
    outer: Option<&'a BindingContext<'a>>,
}

impl<'a> BindingContext<'a> {
    /// Empty context: every variable is unbound
    pub fn root() -> BindingContext<'static> {
        BindingContext {
            vars: HashMap::new(),
            outer: None,
        }
    }

    /// Context of an owning registration: declared parameter names zipped
    /// with the owner key's concrete arguments
    pub fn for_owner(
        params: &[&'static str],
        owner: &ServiceKey,
    ) -> Result<BindingContext<'static>> {
        if params.len() != owner.args().len() {
            return Err(Error::invalid_metadata(format!(
                "{} declares {} type parameter(s) but key carries {} argument(s)",
                owner,
                params.len(),
                owner.args().len()
            )));
        }
        Ok(BindingContext {
            vars: params
                .iter()
                .copied()
                .zip(owner.args().iter().cloned())
                .collect(),
            outer: None,
        })
    }

    /// Like [`BindingContext::for_owner`], falling back to `outer` for
    /// variables the owner key does not bind
    pub fn nested(
        params: &[&'static str],
        owner: &ServiceKey,
        outer: &'a BindingContext<'a>,
    ) -> Result<BindingContext<'a>> {
        let mut ctx = BindingContext::for_owner(params, owner)?;
        Ok(BindingContext {
            vars: std::mem::take(&mut ctx.vars),
            outer: Some(outer),
        })
    }

    fn get(&self, name: &str) -> Option<&ServiceKey> {
        self.vars
            .get(name)
            .or_else(|| self.outer.and_then(|o| o.get(name)))
    }

    /// Resolve a type reference into a concrete key
    ///
    /// `context` names the resolution site (owner class and member) for the
    /// error message.
    pub fn resolve(&self, ty: &TypeRef, context: &str) -> Result<ServiceKey> {
        match ty {
            TypeRef::Key(key) => Ok(key.clone()),
            TypeRef::Param(name) => {
                self.get(name)
                    .cloned()
                    .ok_or_else(|| Error::UnresolvableType {
                        variable: (*name).to_string(),
                        context: context.to_string(),
                    })
            }
            TypeRef::Generic { raw, args } => {
                let resolved = args
                    .iter()
                    .map(|arg| self.resolve(arg, context))
                    .collect::<Result<Vec<_>>>()?;
                Ok(ServiceKey::parameterized(*raw, resolved))
            }
        }
    }
}
