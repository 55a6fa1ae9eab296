//! Autowire candidate resolution and type queries
//!
//! Dependencies declared by type are matched against every definition whose
//! (predicted) type is assignable, plus resolvable dependencies such as the
//! factory itself. Collection-shaped dependencies receive every match;
//! scalar dependencies need exactly one, with `primary` definitions and name
//! matches breaking ties.

use crate::constructor::ConstructorResolver;
use crate::context::CreationContext;
use crate::definition::RootObjectDefinition;
use crate::types::{ParamType, TypeDescriptor, TypeHandle};
use crate::value::{ObjectRef, Value};
use crate::{FactoryError, ObjectFactory, Result};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Type name under which a factory resolves itself
pub const OBJECT_FACTORY_TYPE: &str = "ObjectFactory";

/// A dependency to be satisfied by type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDescriptor {
    /// Parameter or property name, used as a tie-breaker
    pub name: Option<String>,
    pub ty: ParamType,
    pub required: bool,
    /// Restricts candidates to definitions carrying this qualifier (or
    /// named after it)
    pub qualifier: Option<String>,
}

impl DependencyDescriptor {
    pub fn new(ty: ParamType) -> Self {
        Self {
            name: None,
            ty,
            required: true,
            qualifier: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }
}

/// One object that could satisfy a dependency
#[derive(Debug, Clone)]
pub(crate) struct AutowireCandidate {
    pub(crate) name: String,
    pub(crate) object: ObjectRef,
    /// Defined in this factory rather than an ancestor
    pub(crate) local: bool,
    /// A registered resolvable dependency rather than a named object
    pub(crate) resolvable: bool,
}

impl ObjectFactory {
    // =========================================================================
    // Dependency resolution
    // =========================================================================

    /// Resolve a dependency by type.
    ///
    /// Returns `Ok(None)` when nothing matched an optional dependency or the
    /// type is not autowirable. Names of objects used are appended to
    /// `autowired`.
    pub(crate) fn resolve_dependency(
        &self,
        descriptor: &DependencyDescriptor,
        requesting: Option<&str>,
        autowired: &mut Vec<String>,
        ctx: &mut CreationContext,
    ) -> Result<Option<Value>> {
        let element_type = match &descriptor.ty {
            ParamType::Array(e) | ParamType::List(e) | ParamType::Set(e) | ParamType::Map(e) => {
                match e.object_type_name() {
                    Some(name) => Some(name.to_string()),
                    None => return Ok(None),
                }
            }
            _ => None,
        };

        if let Some(element) = element_type {
            if self.is_ignored_dependency_type(&element) {
                return Ok(None);
            }
            let candidates = self.find_autowire_candidates(
                requesting,
                &element,
                descriptor.qualifier.as_deref(),
                ctx,
            )?;
            if candidates.is_empty() {
                return if descriptor.required {
                    Err(no_candidates(&element, descriptor))
                } else {
                    Ok(None)
                };
            }
            autowired.extend(candidates.iter().filter(|c| !c.resolvable).map(|c| c.name.clone()));

            let value = if matches!(descriptor.ty, ParamType::Map(_)) {
                Value::Map(
                    candidates
                        .into_iter()
                        .map(|c| (c.name, Value::Object(c.object)))
                        .collect(),
                )
            } else {
                Value::List(candidates.into_iter().map(|c| Value::Object(c.object)).collect())
            };
            return Ok(Some(value));
        }

        let Some(type_name) = descriptor.ty.object_type_name() else {
            return Ok(None);
        };
        if self.is_ignored_dependency_type(type_name) {
            return Ok(None);
        }

        let mut candidates =
            self.find_autowire_candidates(requesting, type_name, descriptor.qualifier.as_deref(), ctx)?;
        let chosen = match candidates.len() {
            0 => {
                return if descriptor.required {
                    Err(no_candidates(type_name, descriptor))
                } else {
                    Ok(None)
                };
            }
            1 => candidates.remove(0),
            _ => match self.determine_primary(&candidates, type_name, descriptor)? {
                Some(index) => candidates.swap_remove(index),
                None => {
                    return Err(FactoryError::NoUniqueDefinition {
                        type_name: type_name.to_string(),
                        names: candidates.into_iter().map(|c| c.name).collect(),
                        message: None,
                    });
                }
            },
        };

        #[cfg(feature = "logging")]
        trace!(target: "object_factory", dependency = %chosen.name, type_name = type_name, "Resolved dependency by type");

        if !chosen.resolvable {
            autowired.push(chosen.name);
        }
        Ok(Some(Value::Object(chosen.object)))
    }

    fn is_ignored_dependency_type(&self, type_name: &str) -> bool {
        self.inner
            .config
            .ignored_dependency_types
            .iter()
            .any(|t| t == type_name)
    }

    /// Every object assignable to `type_name` that may be autowired,
    /// excluding `requesting` itself
    pub(crate) fn find_autowire_candidates(
        &self,
        requesting: Option<&str>,
        type_name: &str,
        qualifier: Option<&str>,
        ctx: &mut CreationContext,
    ) -> Result<Vec<AutowireCandidate>> {
        let mut candidates = Vec::new();

        if type_name == OBJECT_FACTORY_TYPE && qualifier.is_none() {
            candidates.push(AutowireCandidate {
                name: OBJECT_FACTORY_TYPE.to_string(),
                object: self.self_reference(),
                local: true,
                resolvable: true,
            });
        }
        for entry in self.inner.resolvable.iter() {
            if qualifier.is_none() && entry.value().is_assignable_to(type_name) {
                candidates.push(AutowireCandidate {
                    name: entry.key().clone(),
                    object: entry.value().clone(),
                    local: true,
                    resolvable: true,
                });
            }
        }

        for name in self.names_for_type(type_name, true, true, ctx)? {
            let canonical = name.trim_start_matches('&');
            if requesting.is_some_and(|r| r == canonical) {
                continue;
            }
            if self.inner.registry.contains(canonical)
                && !self
                    .merged_definition(canonical)
                    .is_ok_and(|root| root.is_autowire_candidate())
            {
                continue;
            }
            if let Some(q) = qualifier {
                if !self.matches_qualifier(canonical, q) {
                    continue;
                }
            }
            let object = self.do_get_object(&name, None, None, ctx)?;
            candidates.push(AutowireCandidate {
                name,
                object,
                local: true,
                resolvable: false,
            });
        }

        if let Some(parent) = &self.inner.parent {
            let mut parent_ctx = CreationContext::new();
            for mut candidate in parent.find_autowire_candidates(None, type_name, qualifier, &mut parent_ctx)? {
                let shadowed = candidates.iter().any(|c| c.name == candidate.name)
                    || self.contains_local_object(&candidate.name);
                if !shadowed {
                    candidate.local = false;
                    candidates.push(candidate);
                }
            }
        }

        Ok(candidates)
    }

    fn matches_qualifier(&self, name: &str, qualifier: &str) -> bool {
        if name == qualifier || self.get_aliases(name).iter().any(|a| a == qualifier) {
            return true;
        }
        self.inner
            .registry
            .get(name)
            .is_some_and(|d| d.has_qualifier(qualifier))
            || self
                .merged_definition(name)
                .is_ok_and(|root| root.has_qualifier(qualifier))
    }

    /// Pick the primary candidate, or the one named like the dependency
    fn determine_primary(
        &self,
        candidates: &[AutowireCandidate],
        type_name: &str,
        descriptor: &DependencyDescriptor,
    ) -> Result<Option<usize>> {
        let mut primary: Option<usize> = None;
        for (index, candidate) in candidates.iter().enumerate() {
            if candidate.resolvable || !self.is_primary_object(&candidate.name, candidate.local) {
                continue;
            }
            match primary {
                None => primary = Some(index),
                Some(current) if candidates[current].local == candidate.local => {
                    return Err(FactoryError::NoUniqueDefinition {
                        type_name: type_name.to_string(),
                        names: candidates.iter().map(|c| c.name.clone()).collect(),
                        message: Some("more than one 'primary' object found among candidates".into()),
                    });
                }
                Some(_) if candidate.local => primary = Some(index),
                Some(_) => {}
            }
        }
        if primary.is_some() {
            return Ok(primary);
        }

        let Some(dependency_name) = descriptor.name.as_deref() else {
            return Ok(None);
        };
        Ok(candidates.iter().position(|c| {
            c.name == dependency_name
                || (!c.resolvable && self.get_aliases(&c.name).iter().any(|a| a == dependency_name))
        }))
    }

    fn is_primary_object(&self, name: &str, local: bool) -> bool {
        let canonical = name.trim_start_matches('&');
        if local {
            self.inner.registry.contains(canonical)
                && self
                    .merged_definition(canonical)
                    .is_ok_and(|root| root.is_primary())
        } else {
            self.inner
                .parent
                .as_ref()
                .is_some_and(|p| p.is_primary_object(name, true))
        }
    }

    // =========================================================================
    // Type queries
    // =========================================================================

    /// Type a definition will produce, without creating it.
    pub(crate) fn predict_type(&self, name: &str, root: &RootObjectDefinition) -> Result<Option<TypeHandle>> {
        if root.factory_method_name().is_some() {
            ConstructorResolver::new(self).predict_factory_method_type(name, root)
        } else {
            self.resolve_type(name, root)
        }
    }

    /// Product type of a factory object, creating the factory object only
    /// when `allow_init` is set
    fn factory_product_type(&self, name: &str, allow_init: bool, ctx: &mut CreationContext) -> Result<Option<TypeHandle>> {
        let factory = match self.inner.singletons.get(name, false) {
            Some(f) => f,
            None if allow_init => self.do_get_object(&format!("&{name}"), None, None, ctx)?,
            None => return Ok(None),
        };
        let product = factory
            .type_handle()
            .as_factory_object(factory.instance())
            .and_then(|fo| fo.object_type());
        Ok(product.map(|n| self.lookup_type(&n).unwrap_or_else(|| TypeDescriptor::named(n))))
    }

    pub(crate) fn names_for_type(
        &self,
        type_name: &str,
        include_prototypes: bool,
        allow_eager_init: bool,
        ctx: &mut CreationContext,
    ) -> Result<Vec<String>> {
        let mut result = Vec::new();

        for name in self.inner.registry.names() {
            let root = match self.merged_definition(&name) {
                Ok(root) => root,
                Err(_e) => {
                    #[cfg(feature = "logging")]
                    trace!(target: "object_factory", object = %name, error = %_e, "Skipping definition during type matching");

                    continue;
                }
            };
            if root.is_abstract() {
                continue;
            }
            let Ok(Some(ty)) = self.predict_type(&name, &root) else {
                continue;
            };

            if ty.is_factory_object() {
                let product_is_singleton = root.is_singleton();
                if include_prototypes || product_is_singleton {
                    let eager = (allow_eager_init && !root.is_lazy_init()) || self.inner.singletons.contains(&name);
                    if let Some(product) = self.factory_product_type(&name, eager, ctx)? {
                        if product.is_assignable_to(type_name) {
                            result.push(name.clone());
                            continue;
                        }
                    }
                }
                if ty.is_assignable_to(type_name) && (include_prototypes || root.is_singleton()) {
                    result.push(format!("&{name}"));
                }
            } else if ty.is_assignable_to(type_name) && (include_prototypes || root.is_singleton()) {
                result.push(name);
            }
        }

        for name in self.inner.singletons.names() {
            if self.inner.registry.contains(&name) {
                continue;
            }
            let Some(object) = self.inner.singletons.get(&name, false) else {
                continue;
            };
            let ty = object.type_handle();
            if ty.is_factory_object() {
                if let Some(product) = self.factory_product_type(&name, false, ctx)? {
                    if product.is_assignable_to(type_name) {
                        result.push(name);
                        continue;
                    }
                }
                if ty.is_assignable_to(type_name) {
                    result.push(format!("&{name}"));
                }
            } else if ty.is_assignable_to(type_name) {
                result.push(name);
            }
        }

        Ok(result)
    }

    /// Names of objects assignable to `type_name`, including factory objects
    /// whose product matches (their own type is matched as `&name`).
    pub fn object_names_for_type(
        &self,
        type_name: &str,
        include_prototypes: bool,
        allow_eager_init: bool,
    ) -> Result<Vec<String>> {
        let mut ctx = CreationContext::new();
        self.names_for_type(type_name, include_prototypes, allow_eager_init, &mut ctx)
    }

    /// All objects assignable to `type_name`, keyed by name
    pub fn get_objects_of_type(
        &self,
        type_name: &str,
        include_prototypes: bool,
        allow_eager_init: bool,
    ) -> Result<Vec<(String, ObjectRef)>> {
        let mut ctx = CreationContext::new();
        let names = self.names_for_type(type_name, include_prototypes, allow_eager_init, &mut ctx)?;
        let mut objects = Vec::with_capacity(names.len());
        for name in names {
            let object = self.do_get_object(&name, None, None, &mut ctx)?;
            objects.push((name, object));
        }
        Ok(objects)
    }

    /// The unique object assignable to `type_name`, honouring `primary`
    pub fn get_object_of_type(&self, type_name: &str) -> Result<ObjectRef> {
        let mut ctx = CreationContext::new();
        let descriptor = DependencyDescriptor::new(ParamType::object(type_name));
        let mut autowired = Vec::new();
        match self.resolve_dependency(&descriptor, None, &mut autowired, &mut ctx)? {
            Some(Value::Object(object)) => Ok(object),
            _ => Err(no_candidates(type_name, &descriptor)),
        }
    }

    /// Type of the object registered under `name`, predicted from its
    /// definition when not created yet. `&name` asks for a factory object's
    /// own type.
    pub fn get_type(&self, name: &str) -> Result<Option<TypeHandle>> {
        let deref = name.starts_with('&');
        let canonical = self.transformed_name(name);
        let mut ctx = CreationContext::new();

        if let Some(object) = self.inner.singletons.get(&canonical, false) {
            let ty = object.type_handle();
            if ty.is_factory_object() && !deref {
                return self.factory_product_type(&canonical, false, &mut ctx);
            }
            return Ok(Some(ty.clone()));
        }

        if !self.inner.registry.contains(&canonical) {
            return match &self.inner.parent {
                Some(parent) => parent.get_type(name),
                None => Ok(None),
            };
        }

        let root = self.merged_definition(&canonical)?;
        let predicted = self.predict_type(&canonical, &root)?;
        match predicted {
            Some(ty) if ty.is_factory_object() && !deref => {
                self.factory_product_type(&canonical, !root.is_abstract(), &mut ctx)
            }
            other => Ok(other),
        }
    }

    /// Whether the object under `name` is assignable to `type_name`
    pub fn is_type_match(&self, name: &str, type_name: &str) -> Result<bool> {
        Ok(self
            .get_type(name)?
            .is_some_and(|ty| ty.is_assignable_to(type_name)))
    }

    /// Make `object` injectable by type without registering it by name
    pub fn register_resolvable_dependency(&self, type_name: impl Into<String>, object: ObjectRef) {
        let type_name = type_name.into();

        #[cfg(feature = "logging")]
        debug!(target: "object_factory", type_name = %type_name, "Registered resolvable dependency");

        self.inner.resolvable.insert(type_name, object);
    }
}

fn no_candidates(type_name: &str, descriptor: &DependencyDescriptor) -> FactoryError {
    let mut message = format!(
        "expected at least 1 object of type '{type_name}' which qualifies as autowire candidate"
    );
    if let Some(q) = &descriptor.qualifier {
        message.push_str(&format!(" with qualifier '{q}'"));
    }
    FactoryError::NoSuchType {
        type_name: type_name.to_string(),
        message: Some(message),
    }
}
