//! Flattening definitions against their parent chain
//!
//! A child definition is merged over a copy of its (recursively merged)
//! parent. Results are cached per name once the object has been created at
//! least once, and invalidated whenever the definition or any of its
//! ancestors is re-registered or removed.

use crate::definition::{ObjectDefinition, ObjectScope, RootObjectDefinition};
use crate::{FactoryError, ObjectFactory, Result};
use ahash::RandomState;
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

struct CachedMerge {
    /// Raw definition the merge was computed from
    source: Arc<ObjectDefinition>,
    root: Arc<RootObjectDefinition>,
}

pub(crate) struct MergedDefinitions {
    cache: DashMap<String, CachedMerge, RandomState>,
    /// Names created at least once; only these are cached
    created: DashSet<String, RandomState>,
    /// Serializes definition mutation with cache invalidation
    pub(crate) mutation: Mutex<()>,
}

impl MergedDefinitions {
    pub(crate) fn new() -> Self {
        Self {
            cache: DashMap::with_hasher(RandomState::new()),
            created: DashSet::with_hasher(RandomState::new()),
            mutation: Mutex::new(()),
        }
    }

    pub(crate) fn mark_created(&self, name: &str) {
        if !self.created.contains(name) {
            self.created.insert(name.to_string());
        }
    }

    #[inline]
    pub(crate) fn was_created(&self, name: &str) -> bool {
        self.created.contains(name)
    }

    pub(crate) fn invalidate(&self, name: &str) {
        self.cache.remove(name);
        self.created.remove(name);
    }

    pub(crate) fn clear(&self) {
        self.cache.clear();
    }

    fn cached(&self, name: &str, source: &Arc<ObjectDefinition>) -> Option<Arc<RootObjectDefinition>> {
        self.cache
            .get(name)
            .filter(|c| Arc::ptr_eq(&c.source, source))
            .map(|c| c.root.clone())
    }
}

impl fmt::Debug for MergedDefinitions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergedDefinitions")
            .field("cached", &self.cache.len())
            .field("created", &self.created.len())
            .finish()
    }
}

impl ObjectFactory {
    /// The definition registered under `name`, flattened against its parents.
    ///
    /// Names unknown here are looked up in the parent factory.
    pub fn merged_definition(&self, name: &str) -> Result<Arc<RootObjectDefinition>> {
        let canonical = self.transformed_name(name);
        let Some(source) = self.inner.registry.get(&canonical) else {
            return match &self.inner.parent {
                Some(parent) => parent.merged_definition(&canonical),
                None => Err(FactoryError::no_such_definition(canonical)),
            };
        };

        if let Some(root) = self.inner.merged.cached(&canonical, &source) {
            return Ok(root);
        }

        let mut chain = vec![canonical.clone()];
        let root = Arc::new(RootObjectDefinition::new(self.build_merged(&canonical, &source, &mut chain)?));

        if self.inner.merged.was_created(&canonical) {
            self.inner.merged.cache.insert(
                canonical,
                CachedMerge {
                    source,
                    root: root.clone(),
                },
            );
        }
        Ok(root)
    }

    fn build_merged(
        &self,
        name: &str,
        definition: &ObjectDefinition,
        chain: &mut Vec<String>,
    ) -> Result<ObjectDefinition> {
        let Some(parent_name) = definition.parent_name() else {
            return Ok(definition.clone());
        };

        let parent_canonical = self.transformed_name(parent_name);
        let local = parent_canonical != name && self.inner.registry.contains(&parent_canonical);

        let mut merged = if local {
            // cycles can only form among local definitions
            if chain.contains(&parent_canonical) {
                return Err(FactoryError::DefinitionStore {
                    name: name.to_string(),
                    resource: definition.resource_description().map(str::to_string),
                    message: format!("circular parent definition chain: {} -> {parent_canonical}", chain.join(" -> ")),
                });
            }
            let parent_source = self.inner.registry.get(&parent_canonical).ok_or_else(|| {
                FactoryError::no_such_definition(parent_canonical.clone())
            })?;
            chain.push(parent_canonical.clone());
            let merged = self.build_merged(&parent_canonical, &parent_source, chain)?;
            chain.pop();
            merged
        } else {
            match &self.inner.parent {
                Some(parent) => parent
                    .merged_definition(&parent_canonical)
                    .map(|root| root.definition().clone())
                    .map_err(|e| parent_error(name, definition, &parent_canonical, e))?,
                None if parent_canonical == name => {
                    return Err(FactoryError::DefinitionStore {
                        name: name.to_string(),
                        resource: definition.resource_description().map(str::to_string),
                        message: "parent name is equal to the object name and there is no parent factory".into(),
                    });
                }
                None => {
                    return Err(parent_error(
                        name,
                        definition,
                        &parent_canonical,
                        FactoryError::no_such_definition(parent_canonical.clone()),
                    ));
                }
            }
        };

        // abstract is never inherited
        merged.override_from(definition);
        merged.clear_parent();

        #[cfg(feature = "logging")]
        trace!(target: "object_factory", object = name, parent = %parent_canonical, "Merged child definition");

        Ok(merged)
    }

    /// Merge an inner definition, which inherits a non-singleton scope from
    /// its containing definition
    pub(crate) fn merged_inner_definition(
        &self,
        name: &str,
        definition: &ObjectDefinition,
        containing: &RootObjectDefinition,
    ) -> Result<RootObjectDefinition> {
        let mut chain = vec![name.to_string()];
        let mut merged = self.build_merged(name, definition, &mut chain)?;
        if containing.scope() != ObjectScope::Singleton {
            merged.set_scope(containing.scope());
        }
        Ok(RootObjectDefinition::new(merged))
    }

    /// Drop every cached artefact of `name` and of definitions inheriting
    /// from it: merged definitions, the singleton and its factory product.
    pub(crate) fn reset_definition(&self, name: &str) {
        let mut visited = HashSet::new();
        self.reset_definition_inner(name, &mut visited);
    }

    fn reset_definition_inner(&self, name: &str, visited: &mut HashSet<String>) {
        if !visited.insert(name.to_string()) {
            return;
        }

        #[cfg(feature = "logging")]
        debug!(target: "object_factory", object = name, "Resetting object definition");

        self.inner.merged.invalidate(name);
        self.inner.singletons.destroy(name);
        self.inner.factory_products.remove(name);

        for pp in self.post_processors() {
            pp.reset_definition(name);
        }

        for child in self.inner.registry.children_of(name) {
            self.reset_definition_inner(&child, visited);
        }
    }
}

fn parent_error(name: &str, definition: &ObjectDefinition, parent: &str, cause: FactoryError) -> FactoryError {
    match cause {
        FactoryError::NoSuchDefinition { .. } => FactoryError::NoSuchDefinition {
            name: parent.to_string(),
            message: Some(format!("parent definition of '{name}' could not be found")),
        },
        other => FactoryError::DefinitionStore {
            name: name.to_string(),
            resource: definition.resource_description().map(str::to_string),
            message: format!("could not resolve parent definition '{parent}': {other}"),
        },
    }
}
