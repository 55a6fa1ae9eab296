//! Lifecycle contracts and disposal
//!
//! Types opt into callbacks by implementing one of the traits below and
//! declaring the capability on their [`TypeBuilder`](crate::TypeBuilder).
//! Singletons that need teardown get a [`DisposableAdapter`] registered in
//! creation order; the factory destroys them in reverse.

use crate::definition::ObjectDefinition;
use crate::post_processor::ObjectPostProcessor;
use crate::types::{Arguments, MethodInfo, ParamType};
use crate::value::{ObjectRef, Value};
use crate::{FactoryError, ObjectFactory, Result};
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, error};

/// Releases resources when the owning factory shuts down
pub trait Disposable: Send + Sync {
    fn dispose(&self) -> Result<()>;
}

/// Notified once every property has been set
pub trait Initializing: Send + Sync {
    fn after_properties_set(&self) -> Result<()>;
}

/// Receives the name the object is registered under
pub trait ObjectNameAware: Send + Sync {
    fn set_object_name(&self, name: &str);
}

/// Receives the factory that created the object.
///
/// Holding on to the factory from a singleton keeps the factory alive until
/// the singleton is dropped.
pub trait ObjectFactoryAware: Send + Sync {
    fn set_object_factory(&self, factory: &ObjectFactory) -> Result<()>;
}

/// An object that produces the object exposed under its own name.
///
/// Request `&name` to get the factory object itself.
pub trait FactoryObject: Send + Sync {
    /// Produce (or return the shared) product
    fn get_object(&self) -> Result<ObjectRef>;

    /// Name of the product type, if known before creation
    fn object_type(&self) -> Option<String> {
        None
    }

    /// Whether [`get_object`](Self::get_object) always returns the same instance
    fn is_singleton(&self) -> bool {
        true
    }
}

// =============================================================================
// DisposableAdapter
// =============================================================================

#[derive(Clone)]
struct DestroyMethod {
    method: MethodInfo,
    /// Called with a single `true` argument
    force: bool,
}

/// Runs every teardown step registered for one object.
pub(crate) struct DisposableAdapter {
    name: String,
    object: ObjectRef,
    invoke_disposable: bool,
    destroy_method: Option<DestroyMethod>,
    post_processors: Vec<Arc<dyn ObjectPostProcessor>>,
}

impl DisposableAdapter {
    /// Build an adapter if `object` needs any teardown.
    ///
    /// Fails when the definition names a destroy method the type does not
    /// declare.
    pub(crate) fn for_object(
        name: &str,
        object: &ObjectRef,
        definition: &ObjectDefinition,
        post_processors: &[Arc<dyn ObjectPostProcessor>],
    ) -> Result<Option<Self>> {
        let ty = object.type_handle();
        let invoke_disposable = ty.is_disposable();

        let destroy_method = match definition.destroy_method() {
            Some(method_name) => Some(find_destroy_method(ty.methods(), method_name).ok_or_else(
                || FactoryError::DefinitionValidation {
                    name: name.to_string(),
                    message: format!(
                        "couldn't find a destroy method named '{method_name}' on type '{}'",
                        ty.name()
                    ),
                },
            )?),
            None => None,
        };

        let post_processors: Vec<_> = post_processors
            .iter()
            .filter(|pp| pp.requires_destruction(object))
            .cloned()
            .collect();

        if !invoke_disposable && destroy_method.is_none() && post_processors.is_empty() {
            return Ok(None);
        }

        Ok(Some(Self {
            name: name.to_string(),
            object: object.clone(),
            invoke_disposable,
            destroy_method,
            post_processors,
        }))
    }

    #[inline]
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Destruction-aware post-processors, then [`Disposable`], then the
    /// custom destroy method. Failures are logged, never returned.
    pub(crate) fn destroy(&self) {
        #[cfg(feature = "logging")]
        debug!(target: "object_factory", object = %self.name, "Destroying object");

        for pp in &self.post_processors {
            if let Err(e) = pp.before_destruction(&self.object, &self.name) {
                log_failure(&self.name, "destruction post-processor", &e);
            }
        }

        if self.invoke_disposable {
            let ty = self.object.type_handle();
            if let Some(disposable) = ty.as_disposable(self.object.instance()) {
                if let Err(e) = disposable.dispose() {
                    log_failure(&self.name, "dispose", &e);
                }
            }
        }

        if let Some(destroy) = &self.destroy_method {
            let args = if destroy.force {
                Arguments::new(vec![Value::Bool(true)])
            } else {
                Arguments::default()
            };
            if let Err(e) = destroy.method.invoke(Some(self.object.instance()), &[], &args) {
                log_failure(&self.name, "destroy method", &e);
            }
        }
    }
}

impl fmt::Debug for DisposableAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposableAdapter")
            .field("name", &self.name)
            .field("invoke_disposable", &self.invoke_disposable)
            .field(
                "destroy_method",
                &self.destroy_method.as_ref().map(|d| d.method.name()),
            )
            .field("post_processors", &self.post_processors.len())
            .finish()
    }
}

/// Case-insensitive lookup: a zero-argument method wins over a single-bool one
fn find_destroy_method(methods: &[MethodInfo], name: &str) -> Option<DestroyMethod> {
    let named = || {
        methods
            .iter()
            .filter(move |m| !m.is_static() && m.name().eq_ignore_ascii_case(name))
    };
    named()
        .find(|m| m.params().is_empty())
        .map(|m| DestroyMethod {
            method: m.clone(),
            force: false,
        })
        .or_else(|| {
            named()
                .find(|m| m.params().len() == 1 && m.params()[0].ty == ParamType::Bool)
                .map(|m| DestroyMethod {
                    method: m.clone(),
                    force: true,
                })
        })
}

fn log_failure(name: &str, stage: &str, err: &FactoryError) {
    #[cfg(feature = "logging")]
    error!(target: "object_factory", object = name, stage = stage, error = %err, "Destruction step failed");

    #[cfg(not(feature = "logging"))]
    let _ = (name, stage, err);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeBuilder;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Resource {
        disposed: AtomicUsize,
        closed: AtomicUsize,
        forced: AtomicUsize,
    }

    impl Disposable for Resource {
        fn dispose(&self) -> Result<()> {
            self.disposed.fetch_add(1, Ordering::SeqCst);
            Err(FactoryError::invocation("dispose", "already closed"))
        }
    }

    fn resource_type() -> crate::TypeHandle {
        TypeBuilder::<Resource>::new("Resource")
            .default_constructor(Resource::default)
            .disposable()
            .method("Close", &[], None, |r: &Resource, _| {
                r.closed.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Null)
            })
            .method("Shutdown", &[("force", ParamType::Bool)], None, |r: &Resource, args| {
                if args.bool(0)? {
                    r.forced.fetch_add(1, Ordering::SeqCst);
                }
                Ok(Value::Null)
            })
            .build()
    }

    #[test]
    fn test_adapter_runs_all_steps_and_swallows_errors() {
        let obj = ObjectRef::new(Resource::default(), resource_type());
        let def = ObjectDefinition::of_type(obj.type_handle()).with_destroy_method("close");

        let adapter = DisposableAdapter::for_object("res", &obj, &def, &[])
            .unwrap()
            .unwrap();
        adapter.destroy();

        let r = obj.downcast_ref::<Resource>().unwrap();
        assert_eq!(r.disposed.load(Ordering::SeqCst), 1);
        assert_eq!(r.closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_force_fallback() {
        let obj = ObjectRef::new(Resource::default(), resource_type());
        let def = ObjectDefinition::of_type(obj.type_handle()).with_destroy_method("SHUTDOWN");

        DisposableAdapter::for_object("res", &obj, &def, &[])
            .unwrap()
            .unwrap()
            .destroy();
        assert_eq!(obj.downcast_ref::<Resource>().unwrap().forced.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_destroy_method_fails() {
        let obj = ObjectRef::new(Resource::default(), resource_type());
        let def = ObjectDefinition::of_type(obj.type_handle()).with_destroy_method("Missing");
        assert!(DisposableAdapter::for_object("res", &obj, &def, &[]).is_err());
    }

    struct Plain;

    #[test]
    fn test_no_adapter_without_teardown() {
        let ty = TypeBuilder::<Plain>::new("Plain").build();
        let obj = ObjectRef::new(Plain, ty.clone());
        let adapter = DisposableAdapter::for_object("p", &obj, &ObjectDefinition::of_type(&ty), &[]).unwrap();
        assert!(adapter.is_none());
    }
}
