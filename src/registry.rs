//! Raw definition and alias storage
//!
//! The registry keeps definitions exactly as registered. Merging against
//! parent definitions happens in [`crate::merge`].

use crate::definition::ObjectDefinition;
use crate::{FactoryError, Result};
use ahash::RandomState;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

/// Outcome of [`DefinitionRegistry::register`]
#[derive(Debug, Clone)]
pub(crate) enum Registration {
    New,
    /// The name was bound to another definition before
    Replaced,
}

struct Entry {
    name: String,
    definition: Arc<ObjectDefinition>,
}

/// An alias as spelled on registration, and the name it points at
struct AliasEntry {
    alias: String,
    target: String,
}

/// Name-keyed store of raw definitions and aliases.
pub struct DefinitionRegistry {
    definitions: DashMap<String, Entry, RandomState>,
    /// Registration order of definition names
    order: RwLock<Vec<String>>,
    /// Alias key → alias entry; the target may itself be an alias
    aliases: DashMap<String, AliasEntry, RandomState>,
    case_sensitive: bool,
}

impl DefinitionRegistry {
    pub fn new(case_sensitive: bool) -> Self {
        Self {
            definitions: DashMap::with_hasher(RandomState::new()),
            order: RwLock::new(Vec::new()),
            aliases: DashMap::with_hasher(RandomState::new()),
            case_sensitive,
        }
    }

    #[inline]
    fn key(&self, name: &str) -> String {
        if self.case_sensitive {
            name.to_string()
        } else {
            name.to_ascii_lowercase()
        }
    }

    #[inline]
    fn same(&self, a: &str, b: &str) -> bool {
        if self.case_sensitive {
            a == b
        } else {
            a.eq_ignore_ascii_case(b)
        }
    }

    /// Store a validated definition under `name`.
    pub(crate) fn register(
        &self,
        name: &str,
        definition: ObjectDefinition,
        allow_overriding: bool,
    ) -> Result<Registration> {
        if name.is_empty() {
            return Err(FactoryError::DefinitionValidation {
                name: String::new(),
                message: "object name must not be empty".into(),
            });
        }
        definition.validate(name)?;

        let key = self.key(name);
        let mut order = self.order.write();
        if self.aliases.contains_key(&key) {
            // a definition takes precedence over an alias of the same name
            self.aliases.remove(&key);
        }

        let entry = Entry {
            name: name.to_string(),
            definition: Arc::new(definition),
        };
        match self.definitions.entry(key) {
            MapEntry::Occupied(mut occupied) => {
                if !allow_overriding {
                    return Err(FactoryError::DefinitionOverride {
                        name: name.to_string(),
                    });
                }
                occupied.insert(entry);

                #[cfg(feature = "logging")]
                debug!(target: "object_factory", object = name, "Overriding object definition");

                Ok(Registration::Replaced)
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(entry);
                order.push(name.to_string());

                #[cfg(feature = "logging")]
                debug!(target: "object_factory", object = name, "Registered object definition");

                Ok(Registration::New)
            }
        }
    }

    /// Unregister a definition, returning it
    pub(crate) fn remove(&self, name: &str) -> Option<Arc<ObjectDefinition>> {
        let key = self.key(name);
        let mut order = self.order.write();
        let (_, entry) = self.definitions.remove(&key)?;
        order.retain(|n| !self.same(n, &entry.name));

        #[cfg(feature = "logging")]
        debug!(target: "object_factory", object = name, "Removed object definition");

        Some(entry.definition)
    }

    /// The raw definition bound to a canonical name
    pub fn get(&self, name: &str) -> Option<Arc<ObjectDefinition>> {
        self.definitions
            .get(&self.key(name))
            .map(|e| Arc::clone(&e.definition))
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(&self.key(name))
    }

    /// Definition names in registration order
    pub fn names(&self) -> Vec<String> {
        self.order.read().clone()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Follow aliases to the canonical name; unknown names map to themselves
    pub fn canonical_name(&self, name: &str) -> String {
        let mut current = name.to_string();
        // bounded by the alias count, cycles are rejected on registration
        for _ in 0..=self.aliases.len() {
            match self.aliases.get(&self.key(&current)) {
                Some(entry) => current = entry.target.clone(),
                None => break,
            }
        }
        match self.definitions.get(&self.key(&current)) {
            Some(e) => e.name.clone(),
            None => current,
        }
    }

    #[inline]
    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(&self.key(name))
    }

    /// Bind `alias` to `name`.
    pub fn register_alias(&self, name: &str, alias: &str) -> Result<()> {
        let conflict = |message: &str| FactoryError::AliasConflict {
            name: name.to_string(),
            alias: alias.to_string(),
            message: message.to_string(),
        };

        if name.is_empty() || alias.is_empty() {
            return Err(conflict("names must not be empty"));
        }

        let _order = self.order.write();
        let key = self.key(alias);
        if self.same(name, alias) {
            self.aliases.remove(&key);
            return Ok(());
        }
        if let Some(existing) = self.aliases.get(&key) {
            if self.same(&existing.target, name) {
                return Ok(());
            }
            return Err(conflict(&format!(
                "it is already registered for name '{}'",
                existing.target
            )));
        }
        if self.definitions.contains_key(&key) {
            return Err(conflict("an object definition with that name exists"));
        }

        // walking from `name` must never reach `alias`
        let mut current = name.to_string();
        for _ in 0..=self.aliases.len() {
            if self.same(&current, alias) {
                return Err(conflict("it would create a circular alias reference"));
            }
            match self.aliases.get(&self.key(&current)) {
                Some(next) => current = next.target.clone(),
                None => break,
            }
        }

        self.aliases.insert(
            key,
            AliasEntry {
                alias: alias.to_string(),
                target: name.to_string(),
            },
        );

        #[cfg(feature = "logging")]
        debug!(target: "object_factory", object = name, alias = alias, "Registered alias");

        Ok(())
    }

    /// Every alias resolving to `name`, directly or through other aliases,
    /// spelled as registered
    pub fn aliases_of(&self, name: &str) -> Vec<String> {
        let mut found = Vec::new();
        let mut frontier = vec![name.to_string()];
        while let Some(target) = frontier.pop() {
            for entry in self.aliases.iter() {
                let alias = &entry.value().alias;
                if self.same(&entry.value().target, &target) && !found.iter().any(|f: &String| self.same(f, alias)) {
                    found.push(alias.clone());
                    frontier.push(alias.clone());
                }
            }
        }
        found.sort();
        found
    }

    /// Names of definitions whose parent is `parent`
    pub fn children_of(&self, parent: &str) -> Vec<String> {
        let with_parents: Vec<(String, String)> = self
            .definitions
            .iter()
            .filter_map(|e| {
                e.definition
                    .parent_name()
                    .map(|p| (e.name.clone(), p.to_string()))
            })
            .collect();
        with_parents
            .into_iter()
            .filter(|(_, p)| self.same(&self.canonical_name(p), parent))
            .map(|(name, _)| name)
            .collect()
    }
}

impl fmt::Debug for DefinitionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefinitionRegistry")
            .field("definitions", &self.definitions.len())
            .field("aliases", &self.aliases.len())
            .field("case_sensitive", &self.case_sensitive)
            .finish()
    }
}
