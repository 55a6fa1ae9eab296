//! Per-request creation tracking
//!
//! A [`CreationContext`] is created for each top-level lookup and passed
//! down every recursive resolution. It records which prototypes and
//! singletons the current request is building, which is how prototype cycles
//! are detected and how re-entrant lookups find eagerly cached singletons.

use crate::{FactoryError, Result};

#[derive(Debug, Default)]
pub(crate) struct CreationContext {
    prototypes: Vec<String>,
    singletons: Vec<String>,
}

impl CreationContext {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Mark a prototype as being built, failing if it already is
    pub(crate) fn begin_prototype(&mut self, name: &str) -> Result<()> {
        if self.is_prototype_in_creation(name) {
            return Err(FactoryError::CurrentlyInCreation {
                name: name.to_string(),
            });
        }
        self.prototypes.push(name.to_string());
        Ok(())
    }

    pub(crate) fn end_prototype(&mut self, name: &str) {
        if let Some(pos) = self.prototypes.iter().rposition(|n| n == name) {
            self.prototypes.remove(pos);
        }
    }

    #[inline]
    pub(crate) fn is_prototype_in_creation(&self, name: &str) -> bool {
        self.prototypes.iter().any(|n| n == name)
    }

    pub(crate) fn enter_singleton(&mut self, name: &str) {
        self.singletons.push(name.to_string());
    }

    pub(crate) fn exit_singleton(&mut self, name: &str) {
        if let Some(pos) = self.singletons.iter().rposition(|n| n == name) {
            self.singletons.remove(pos);
        }
    }

    /// Whether this request is building the singleton
    #[inline]
    pub(crate) fn is_singleton_in_creation(&self, name: &str) -> bool {
        self.singletons.iter().any(|n| n == name)
    }

    /// Nesting depth of the current resolution
    #[inline]
    pub(crate) fn depth(&self) -> usize {
        self.prototypes.len() + self.singletons.len()
    }
}
