//! Extension points around object creation and destruction
//!
//! Every hook has a no-op default, so a post-processor only implements the
//! stages it cares about. Processors run in registration order.

use crate::definition::PropertyValues;
use crate::types::{ConstructorInfo, TypeHandle};
use crate::value::ObjectRef;
use crate::Result;

/// Hooks invoked by the factory while it creates, configures and destroys
/// objects.
///
/// # Examples
///
/// ```rust
/// use object_factory::{ObjectPostProcessor, ObjectRef, Result};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// #[derive(Default)]
/// struct CountingProcessor {
///     initialized: AtomicUsize,
/// }
///
/// impl ObjectPostProcessor for CountingProcessor {
///     fn after_initialization(&self, object: ObjectRef, _name: &str) -> Result<ObjectRef> {
///         self.initialized.fetch_add(1, Ordering::SeqCst);
///         Ok(object)
///     }
/// }
/// ```
pub trait ObjectPostProcessor: Send + Sync {
    /// Return an object to skip default instantiation altogether
    fn before_instantiation(&self, _ty: &TypeHandle, _name: &str) -> Result<Option<ObjectRef>> {
        Ok(None)
    }

    /// Restrict the constructors considered for autowiring
    fn determine_candidate_constructors(
        &self,
        _ty: &TypeHandle,
        _name: &str,
    ) -> Result<Option<Vec<ConstructorInfo>>> {
        Ok(None)
    }

    /// Return `false` to skip property population
    fn after_instantiation(&self, _object: &ObjectRef, _name: &str) -> Result<bool> {
        Ok(true)
    }

    /// Replace the property values about to be applied; `None` skips them
    fn process_property_values(
        &self,
        values: PropertyValues,
        _object: &ObjectRef,
        _name: &str,
    ) -> Result<Option<PropertyValues>> {
        Ok(Some(values))
    }

    fn before_initialization(&self, object: ObjectRef, _name: &str) -> Result<ObjectRef> {
        Ok(object)
    }

    fn after_initialization(&self, object: ObjectRef, _name: &str) -> Result<ObjectRef> {
        Ok(object)
    }

    /// Called before the object's own teardown when
    /// [`requires_destruction`](Self::requires_destruction) is true
    fn before_destruction(&self, _object: &ObjectRef, _name: &str) -> Result<()> {
        Ok(())
    }

    fn requires_destruction(&self, _object: &ObjectRef) -> bool {
        false
    }

    /// The definition registered under `name` was replaced or removed
    fn reset_definition(&self, _name: &str) {}
}
