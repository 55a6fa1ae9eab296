//! # Object Factory - Inversion of Control for Rust
//!
//! A container that creates, wires and manages named objects from
//! declarative [`ObjectDefinition`]s.
//!
//! ## Features
//!
//! - **Definitions** - Types, constructor arguments, property values, scopes
//!   and lifecycle callbacks described as data, with parent inheritance
//! - **Constructor resolution** - Overloads ranked by type-difference weight,
//!   factory methods (static, instance and generic)
//! - **Autowiring** - By name, by type, by constructor or auto-detected, with
//!   `primary` and qualifier disambiguation
//! - **Singletons and prototypes** - Circular property references resolved
//!   through eager caching, ordered destruction honouring dependencies
//! - **Extension points** - Post-processors around instantiation,
//!   population, initialization and destruction
//! - **Observable** - Optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! Rust has no runtime reflection, so each injectable type is described once
//! with a [`TypeBuilder`]:
//!
//! ```rust
//! use object_factory::prelude::*;
//! use parking_lot::Mutex;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! #[derive(Default)]
//! struct UserService {
//!     db: Mutex<Option<Arc<Database>>>,
//! }
//!
//! let factory = ObjectFactory::new();
//! factory.register_type(
//!     TypeBuilder::<Database>::new("Database")
//!         .constructor(&[("url", ParamType::Str)], |args| Ok(Database { url: args.string(0)? }))
//!         .build(),
//! );
//! factory.register_type(
//!     TypeBuilder::<UserService>::new("UserService")
//!         .default_constructor(UserService::default)
//!         .property("Db", ParamType::object("Database"), |s, v| {
//!             *s.db.lock() = Some(v.into_object()?);
//!             Ok(())
//!         })
//!         .build(),
//! );
//!
//! factory
//!     .register_definition(
//!         "db",
//!         ObjectDefinition::of_type_name("Database").with_indexed_arg(0, "postgres://localhost"),
//!     )
//!     .unwrap();
//! factory
//!     .register_definition(
//!         "users",
//!         ObjectDefinition::of_type_name("UserService").with_autowire(AutowireMode::ByType),
//!     )
//!     .unwrap();
//!
//! let users = factory.get_object_as::<UserService>("users").unwrap();
//! assert_eq!(users.db.lock().as_ref().unwrap().url, "postgres://localhost");
//! ```
//!
//! ## Scopes
//!
//! ```rust
//! use object_factory::prelude::*;
//!
//! struct RequestId;
//!
//! let factory = ObjectFactory::new();
//! factory.register_type(TypeBuilder::<RequestId>::new("RequestId").default_constructor(|| RequestId).build());
//! factory
//!     .register_definition(
//!         "request",
//!         ObjectDefinition::of_type_name("RequestId").with_scope(ObjectScope::Prototype),
//!     )
//!     .unwrap();
//!
//! let a = factory.get_object("request").unwrap();
//! let b = factory.get_object("request").unwrap();
//! assert!(!a.ptr_eq(&b));
//! ```
//!
//! ## Hierarchies
//!
//! A [`child`](ObjectFactory::child) factory resolves names it does not
//! define through its parent, and may shadow them.

mod autowire;
mod config;
mod constructor;
mod context;
mod convert;
mod definition;
mod error;
mod factory;
mod instantiation;
mod lifecycle;
#[cfg(feature = "logging")]
pub mod logging;
mod merge;
mod populate;
mod post_processor;
mod registry;
mod resolver;
mod singleton;
mod types;
mod value;
mod wrapper;

#[cfg(test)]
mod fixtures;

pub use autowire::{DependencyDescriptor, OBJECT_FACTORY_TYPE};
pub use config::{FactoryConfig, ObjectFactoryBuilder};
pub use constructor::{RAW_WEIGHT_BIAS, type_difference_weight};
pub use convert::{DefaultTypeConverter, TypeConverter};
pub use definition::*;
pub use error::*;
pub use factory::{FACTORY_OBJECT_PREFIX, ObjectFactory};
pub use instantiation::{InstantiationStrategy, SimpleInstantiationStrategy};
pub use lifecycle::{Disposable, FactoryObject, Initializing, ObjectFactoryAware, ObjectNameAware};
pub use post_processor::ObjectPostProcessor;
pub use registry::DefinitionRegistry;
pub use resolver::{ExpressionEvaluator, INNER_OBJECT_PREFIX};
pub use types::*;
pub use value::{Instance, ObjectRef, Value};
pub use wrapper::ObjectWrapper;

// Re-export tracing macros for convenience when logging feature is enabled
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        AutowireMode, ConfigValue, DependencyCheck, Disposable, FactoryConfig, FactoryError,
        FactoryObject, Initializing, ObjectDefinition, ObjectFactory, ObjectFactoryBuilder,
        ObjectPostProcessor, ObjectRef, ObjectScope, ParamType, Result, TypeBuilder, TypeHandle,
        Value,
    };
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_service_references_shared_repository() {
        let factory = fixture_factory();
        factory
            .register_definition(
                "svc",
                ObjectDefinition::of_type_name("ServiceImpl").with_property("repo", ConfigValue::reference("repoDef")),
            )
            .unwrap();
        factory
            .register_definition("repoDef", ObjectDefinition::of_type_name("RepoImpl"))
            .unwrap();

        let svc = factory.get_object_as::<ServiceImpl>("svc").unwrap();
        let repo = factory.get_object("repoDef").unwrap();
        assert!(svc.repo().unwrap().ptr_eq(&repo));
        assert_eq!(factory.singleton_names(), vec!["repoDef".to_string(), "svc".to_string()]);
    }

    #[test]
    fn test_singleton_identity_and_prototype_independence() {
        let factory = fixture_factory();
        factory
            .register_definition("single", ObjectDefinition::of_type_name("RepoImpl"))
            .unwrap();
        factory
            .register_definition(
                "proto",
                ObjectDefinition::of_type_name("RepoImpl").with_scope(ObjectScope::Prototype),
            )
            .unwrap();

        let a = factory.get_object("single").unwrap();
        let b = factory.get_object("single").unwrap();
        assert!(a.ptr_eq(&b));

        let p1 = factory.get_object("proto").unwrap();
        let p2 = factory.get_object("proto").unwrap();
        assert!(!p1.ptr_eq(&p2));
        assert!(factory.is_singleton("single").unwrap());
        assert!(factory.is_prototype("proto").unwrap());
    }

    #[test]
    fn test_property_cycle_resolves() {
        let factory = fixture_factory();
        factory
            .register_definition(
                "a",
                ObjectDefinition::of_type_name("Node").with_property("Peer", ConfigValue::reference("b")),
            )
            .unwrap();
        factory
            .register_definition(
                "b",
                ObjectDefinition::of_type_name("Node").with_property("Peer", ConfigValue::reference("a")),
            )
            .unwrap();

        let a = factory.get_object_as::<Node>("a").unwrap();
        let b = factory.get_object("b").unwrap();
        assert!(a.peer().unwrap().ptr_eq(&b));
        let b = b.downcast::<Node>().unwrap();
        assert!(b.peer().unwrap().ptr_eq(&factory.get_object("a").unwrap()));
    }

    #[test]
    fn test_constructor_cycle_fails() {
        let factory = fixture_factory();
        factory
            .register_definition(
                "a",
                ObjectDefinition::of_type_name("Node").with_indexed_arg(0, ConfigValue::reference("b")),
            )
            .unwrap();
        factory
            .register_definition(
                "b",
                ObjectDefinition::of_type_name("Node").with_indexed_arg(0, ConfigValue::reference("a")),
            )
            .unwrap();

        let err = factory.get_object("a").unwrap_err();
        assert!(err.is_currently_in_creation(), "{err}");
        assert!(!factory.is_currently_in_creation("a"));
        assert_eq!(factory.singleton_count(), 0);
    }

    #[test]
    fn test_prototype_cycle_fails() {
        let factory = fixture_factory();
        factory
            .register_definition(
                "p",
                ObjectDefinition::of_type_name("Node")
                    .with_scope(ObjectScope::Prototype)
                    .with_property("Peer", ConfigValue::reference("p")),
            )
            .unwrap();
        assert!(factory.get_object("p").unwrap_err().is_currently_in_creation());
    }

    #[test]
    fn test_failed_population_rolls_back_and_retries() {
        let factory = fixture_factory();
        factory
            .register_definition(
                "svc",
                ObjectDefinition::of_type_name("ServiceImpl").with_property("repo", ConfigValue::reference("missing")),
            )
            .unwrap();

        let err = factory.get_object("svc").unwrap_err();
        assert_eq!(err.object_name(), Some("svc"));
        assert!(matches!(err.root_cause(), FactoryError::NoSuchDefinition { .. }));
        assert!(!factory.is_currently_in_creation("svc"));
        assert_eq!(factory.singleton_count(), 0);

        factory
            .register_definition("missing", ObjectDefinition::of_type_name("RepoImpl"))
            .unwrap();
        let svc = factory.get_object_as::<ServiceImpl>("svc").unwrap();
        assert!(svc.repo().is_some());
    }

    #[test]
    fn test_destruction_honours_depends_on() {
        let log = EventLog::default();
        let factory = fixture_factory();
        factory.register_type(resource_type(&log));

        let resource = |name: &str| ObjectDefinition::of_type_name("Resource").with_indexed_arg(0, name);
        factory.register_definition("db", resource("db")).unwrap();
        factory
            .register_definition("cache", resource("cache").with_depends_on("db"))
            .unwrap();
        factory
            .register_definition("web", resource("web").with_depends_on("cache"))
            .unwrap();

        factory.get_object("web").unwrap();
        assert_eq!(log.take(), ["create db", "create cache", "create web"]);

        factory.destroy_singletons();
        assert_eq!(log.take(), ["dispose web", "dispose cache", "dispose db"]);
        assert_eq!(factory.singleton_count(), 0);
    }

    #[test]
    fn test_circular_depends_on_is_rejected() {
        let factory = fixture_factory();
        factory
            .register_definition("x", ObjectDefinition::of_type_name("RepoImpl").with_depends_on("y"))
            .unwrap();
        factory
            .register_definition("y", ObjectDefinition::of_type_name("RepoImpl").with_depends_on("x"))
            .unwrap();
        let err = factory.get_object("x").unwrap_err();
        assert!(matches!(err.root_cause(), FactoryError::DefinitionStore { .. }), "{err}");
        assert!(err.root_cause().to_string().contains("circular depends-on"));
    }

    #[test]
    fn test_overload_selection() {
        let factory = fixture_factory();
        factory
            .register_definition("one", ObjectDefinition::of_type_name("Widget").with_indexed_arg(0, 7))
            .unwrap();
        factory
            .register_definition(
                "two",
                ObjectDefinition::of_type_name("Widget")
                    .with_indexed_arg(0, 7)
                    .with_indexed_arg(1, "big"),
            )
            .unwrap();

        for _ in 0..3 {
            factory.register_definition("one", ObjectDefinition::of_type_name("Widget").with_indexed_arg(0, 7)).unwrap();
            let one = factory.get_object_as::<Widget>("one").unwrap();
            assert_eq!(one.constructor, "C(int)");
            assert_eq!(one.size, 7);
        }
        let two = factory.get_object_as::<Widget>("two").unwrap();
        assert_eq!(two.constructor, "C(int,string)");
        assert_eq!(two.label.as_deref(), Some("big"));
    }

    #[test]
    fn test_string_argument_converted_for_int_constructor() {
        let factory = fixture_factory();
        factory
            .register_definition("w", ObjectDefinition::of_type_name("Widget").with_named_arg("size", "12"))
            .unwrap();
        let w = factory.get_object_as::<Widget>("w").unwrap();
        assert_eq!(w.size, 12);
        assert_eq!(w.constructor, "C(int)");
    }

    #[test]
    fn test_autowire_ambiguity_and_primary() {
        let factory = fixture_factory();
        factory.register_definition("fooA", ObjectDefinition::of_type_name("FooA")).unwrap();
        factory.register_definition("fooB", ObjectDefinition::of_type_name("FooB")).unwrap();
        factory
            .register_definition(
                "consumer",
                ObjectDefinition::of_type_name("Consumer").with_autowire(AutowireMode::ByType),
            )
            .unwrap();

        let err = factory.get_object("consumer").unwrap_err();
        assert!(matches!(err, FactoryError::UnsatisfiedDependency { .. }), "{err}");
        assert!(err.to_string().contains("just 1"));

        factory
            .register_definition("fooB", ObjectDefinition::of_type_name("FooB").with_primary(true))
            .unwrap();
        for _ in 0..3 {
            let consumer = factory.get_object_as::<Consumer>("consumer").unwrap();
            assert_eq!(consumer.foo().unwrap().type_name(), "FooB");
        }
    }

    #[test]
    fn test_autowire_by_name_and_constructor() {
        let factory = fixture_factory();
        factory.register_definition("Foo", ObjectDefinition::of_type_name("FooA")).unwrap();
        factory.register_definition("other", ObjectDefinition::of_type_name("FooB")).unwrap();
        factory
            .register_definition(
                "byName",
                ObjectDefinition::of_type_name("Consumer").with_autowire(AutowireMode::ByName),
            )
            .unwrap();
        let consumer = factory.get_object_as::<Consumer>("byName").unwrap();
        assert_eq!(consumer.foo().unwrap().type_name(), "FooA");

        // the parameter name breaks the tie between the two IFoo objects
        factory
            .register_definition(
                "byCtor",
                ObjectDefinition::of_type_name("FooHolder").with_autowire(AutowireMode::Constructor),
            )
            .unwrap();
        let holder = factory.get_object_as::<FooHolder>("byCtor").unwrap();
        assert_eq!(holder.other.type_name(), "FooB");
    }

    #[test]
    fn test_alias_registration_is_idempotent() {
        let factory = fixture_factory();
        factory.register_definition("n", ObjectDefinition::of_type_name("RepoImpl")).unwrap();
        factory.register_definition("m", ObjectDefinition::of_type_name("RepoImpl")).unwrap();

        factory.register_alias("n", "a").unwrap();
        factory.register_alias("n", "a").unwrap();
        assert!(matches!(
            factory.register_alias("m", "a"),
            Err(FactoryError::AliasConflict { .. })
        ));

        assert!(factory.get_object("a").unwrap().ptr_eq(&factory.get_object("n").unwrap()));
        assert_eq!(factory.get_aliases("n"), vec!["a".to_string()]);
        assert_eq!(factory.get_aliases("a"), vec!["n".to_string()]);
    }

    #[test]
    fn test_merged_inheritance() {
        let factory = fixture_factory();
        factory
            .register_definition(
                "base",
                ObjectDefinition::of_type_name("Widget")
                    .with_abstract(true)
                    .with_indexed_arg(0, 1)
                    .with_init_method("Activate"),
            )
            .unwrap();
        factory
            .register_definition("child", ObjectDefinition::child_of("base").with_indexed_arg(1, "kid"))
            .unwrap();

        assert!(matches!(
            factory.get_object("base"),
            Err(FactoryError::ObjectIsAbstract { .. })
        ));
        let child = factory.get_object_as::<Widget>("child").unwrap();
        assert_eq!(child.constructor, "C(int,string)");
        assert_eq!(child.label.as_deref(), Some("kid"));
        assert!(child.active.load(Ordering::SeqCst));
    }

    #[test]
    fn test_factory_object_product_and_reference() {
        let factory = fixture_factory();
        factory
            .register_definition(
                "conn",
                ObjectDefinition::of_type_name("ConnectionFactory").with_property("Url", "mem://"),
            )
            .unwrap();

        let conn = factory.get_object_as::<Connection>("conn").unwrap();
        assert_eq!(conn.url, "mem://");
        assert!(Arc::ptr_eq(&conn, &factory.get_object_as::<Connection>("conn").unwrap()));

        let own = factory.get_object("&conn").unwrap();
        assert_eq!(own.type_name(), "ConnectionFactory");
        assert!(factory.is_type_match("conn", "Connection").unwrap());
        assert_eq!(factory.object_names_for_type("Connection", true, true).unwrap(), vec!["conn".to_string()]);

        assert!(matches!(
            factory.get_object("&fooA"),
            Err(FactoryError::NoSuchDefinition { .. })
        ));
    }

    #[test]
    fn test_child_factory_falls_back_to_parent() {
        let parent = fixture_factory();
        parent.register_definition("repoDef", ObjectDefinition::of_type_name("RepoImpl")).unwrap();

        let child = parent.child();
        child
            .register_definition(
                "svc",
                ObjectDefinition::of_type_name("ServiceImpl").with_property("repo", ConfigValue::parent_reference("repoDef")),
            )
            .unwrap();

        let svc = child.get_object_as::<ServiceImpl>("svc").unwrap();
        assert!(svc.repo().unwrap().ptr_eq(&parent.get_object("repoDef").unwrap()));
        assert!(child.contains_object("repoDef"));
        assert!(!child.contains_local_object("repoDef"));
        assert!(!parent.contains_object("svc"));
    }

    #[test]
    fn test_pre_instantiation_rolls_back_on_failure() {
        let log = EventLog::default();
        let factory = fixture_factory();
        factory.register_type(resource_type(&log));

        factory
            .register_definition("first", ObjectDefinition::of_type_name("Resource").with_indexed_arg(0, "first"))
            .unwrap();
        factory
            .register_definition(
                "lazy",
                ObjectDefinition::of_type_name("Resource")
                    .with_indexed_arg(0, "lazy")
                    .with_lazy_init(true),
            )
            .unwrap();
        factory
            .register_definition(
                "broken",
                ObjectDefinition::of_type_name("Widget").with_indexed_arg(0, 1).with_init_method("Missing"),
            )
            .unwrap();

        assert!(factory.pre_instantiate_singletons().is_err());
        assert_eq!(log.take(), ["create first", "dispose first"]);
        assert_eq!(factory.singleton_count(), 0);
    }

    #[test]
    fn test_lifecycle_callbacks_in_order() {
        let factory = fixture_factory();
        let processor = Arc::new(RecordingProcessor::default());
        factory.add_post_processor(processor.clone());
        factory
            .register_definition("tracked", ObjectDefinition::of_type_name("Lifecycled").with_init_method("Start"))
            .unwrap();

        let tracked = factory.get_object_as::<Lifecycled>("tracked").unwrap();
        assert_eq!(
            tracked.calls.lock().clone(),
            ["name tracked", "factory", "after_properties_set", "start"]
        );
        assert_eq!(processor.before.load(Ordering::SeqCst), 1);
        assert_eq!(processor.after.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_get_object_of_type_and_resolvable_factory() {
        let factory = fixture_factory();
        factory.register_definition("repoDef", ObjectDefinition::of_type_name("RepoImpl")).unwrap();

        let repo = factory.get_object_of_type("IRepo").unwrap();
        assert!(repo.ptr_eq(&factory.get_object("repoDef").unwrap()));

        let itself = factory.get_object_of_type(OBJECT_FACTORY_TYPE).unwrap();
        assert_eq!(itself.downcast_ref::<ObjectFactory>().unwrap().definition_count(), 1);
    }

    #[test]
    fn test_concurrent_singleton_creation() {
        struct Counted;

        let created = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let factory = ObjectFactory::new();
        let counter = created.clone();
        factory.register_type(
            TypeBuilder::<Counted>::new("Counted")
                .default_constructor(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    std::thread::sleep(std::time::Duration::from_millis(5));
                    Counted
                })
                .build(),
        );
        factory.register_definition("shared", ObjectDefinition::of_type_name("Counted")).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let factory = factory.clone();
                std::thread::spawn(move || factory.get_object("shared").unwrap())
            })
            .collect();
        let objects: Vec<ObjectRef> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(objects.iter().all(|o| o.ptr_eq(&objects[0])));
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    /// Member of the first unsatisfied dependency in the cause chain
    fn unsatisfied_member(err: &FactoryError) -> Option<String> {
        let mut current = Some(err);
        while let Some(e) = current {
            if let FactoryError::UnsatisfiedDependency { member, .. } = e {
                return Some(member.clone());
            }
            current = e.cause();
        }
        None
    }

    #[test]
    fn test_failed_circular_creation_discards_dependents() {
        let factory = fixture_factory();
        factory
            .register_definition(
                "a",
                ObjectDefinition::of_type_name("Node")
                    .with_property("Peer", ConfigValue::reference("b"))
                    .with_init_method("Missing"),
            )
            .unwrap();
        factory
            .register_definition(
                "b",
                ObjectDefinition::of_type_name("Node").with_property("Peer", ConfigValue::reference("a")),
            )
            .unwrap();

        assert!(factory.get_object("a").is_err());
        // b saw the raw a, which never made it into the cache
        assert!(factory.singleton_names().is_empty());

        factory
            .register_definition(
                "a",
                ObjectDefinition::of_type_name("Node").with_property("Peer", ConfigValue::reference("b")),
            )
            .unwrap();
        let a = factory.get_object("a").unwrap();
        let b = factory.get_object_as::<Node>("b").unwrap();
        assert!(b.peer().unwrap().ptr_eq(&a));
    }

    #[test]
    fn test_static_factory_method_overloads() {
        let factory = fixture_factory();
        factory
            .register_definition(
                "one",
                ObjectDefinition::of_type_name("WidgetMaker")
                    .with_factory_method("Create")
                    .with_indexed_arg(0, 7),
            )
            .unwrap();
        factory
            .register_definition(
                "two",
                ObjectDefinition::of_type_name("WidgetMaker")
                    .with_factory_method("Create")
                    .with_indexed_arg(0, 7)
                    .with_indexed_arg(1, "big"),
            )
            .unwrap();
        factory
            .register_definition(
                "generic",
                ObjectDefinition::of_type_name("WidgetMaker")
                    .with_factory_method("Make<int>")
                    .with_indexed_arg(0, "3"),
            )
            .unwrap();

        // predicted from the declared return type, nothing created yet
        assert_eq!(factory.get_type("one").unwrap().unwrap().name(), "Widget");
        assert!(factory.is_type_match("generic", "Widget").unwrap());
        assert_eq!(factory.singleton_count(), 0);

        let one = factory.get_object_as::<Widget>("one").unwrap();
        assert_eq!((one.constructor, one.size), ("Create(int)", 7));
        let two = factory.get_object_as::<Widget>("two").unwrap();
        assert_eq!(two.constructor, "Create(int,string)");
        assert_eq!(two.label.as_deref(), Some("big"));
        let generic = factory.get_object_as::<Widget>("generic").unwrap();
        assert_eq!(generic.constructor, "Make<T>(int)");
        assert_eq!(generic.size, 3);
        assert_eq!(generic.label.as_deref(), Some("int"));
    }

    #[test]
    fn test_conflicting_return_types_leave_type_unknown() {
        let factory = fixture_factory();
        factory
            .register_definition(
                "odd",
                ObjectDefinition::of_type_name("WidgetMaker")
                    .with_factory_method("Odd")
                    .with_indexed_arg(0, 4),
            )
            .unwrap();

        assert!(factory.get_type("odd").unwrap().is_none());
        assert!(factory.object_names_for_type("Widget", true, false).unwrap().is_empty());

        let odd = factory.get_object_as::<Widget>("odd").unwrap();
        assert_eq!(odd.constructor, "Odd(int)");
        assert_eq!(factory.get_type("odd").unwrap().unwrap().name(), "Widget");
    }

    #[test]
    fn test_instance_factory_method_on_factory_object() {
        let factory = fixture_factory();
        factory.register_definition("maker", ObjectDefinition::of_type_name("WidgetMaker")).unwrap();
        factory
            .register_definition(
                "built",
                ObjectDefinition::new()
                    .with_factory_object("maker", "Build")
                    .with_indexed_arg(0, 9),
            )
            .unwrap();

        assert_eq!(factory.get_type("built").unwrap().unwrap().name(), "Widget");

        let built = factory.get_object_as::<Widget>("built").unwrap();
        assert_eq!(built.constructor, "Build(int)");
        assert_eq!((built.size, built.label.as_deref()), (9, Some("made")));

        // the product goes away with the object that made it
        factory.destroy_singleton("maker");
        assert!(factory.singleton_names().is_empty());
    }

    #[test]
    fn test_factory_method_rejects_arguments_it_cannot_accept() {
        struct PassThrough;

        impl TypeConverter for PassThrough {
            fn convert(&self, value: Value, _required: &ParamType) -> Result<Value> {
                Ok(value)
            }
        }

        let factory = ObjectFactory::builder().type_converter(Arc::new(PassThrough)).build();
        let widget = TypeBuilder::<Widget>::new("Widget").build();
        let connection = TypeBuilder::<Connection>::new("Connection").build();
        factory.register_type(widget_maker_type(&widget, &connection));
        factory
            .register_definition(
                "w",
                ObjectDefinition::of_type_name("WidgetMaker")
                    .with_factory_method("Create")
                    .with_indexed_arg(0, "seven"),
            )
            .unwrap();

        let err = factory.get_object("w").unwrap_err();
        assert_eq!(err.object_name(), Some("w"));
        assert!(err.to_string().contains("does not accept the resolved arguments"), "{err}");
    }

    #[test]
    fn test_last_constructor_reports_its_own_failure() {
        let factory = fixture_factory();
        factory
            .register_definition("w", ObjectDefinition::of_type_name("Widget").with_indexed_arg(0, "huge"))
            .unwrap();

        let err = factory.get_object("w").unwrap_err();
        let member = unsatisfied_member(&err).unwrap();
        // the single-argument constructor was tried last
        assert_eq!(member, "parameter 0 ('size') of constructor (int)");
        assert!(matches!(err.root_cause(), FactoryError::TypeMismatch { .. }), "{err}");
    }

    #[test]
    fn test_dependency_check_modes() {
        let factory = fixture_factory();
        factory.register_definition("repo", ObjectDefinition::of_type_name("RepoImpl")).unwrap();
        let settings = |check| ObjectDefinition::of_type_name("Settings").with_dependency_check(check);

        factory.register_definition("simple", settings(DependencyCheck::Simple)).unwrap();
        let err = factory.get_object("simple").unwrap_err();
        assert_eq!(unsatisfied_member(&err).as_deref(), Some("property 'Timeout'"));

        factory
            .register_definition("simpleSet", settings(DependencyCheck::Simple).with_property("Timeout", 30))
            .unwrap();
        let simple_set = factory.get_object_as::<Settings>("simpleSet").unwrap();
        assert_eq!(*simple_set.timeout.lock(), Some(30));
        assert!(simple_set.repo.lock().is_none());

        factory
            .register_definition("objects", settings(DependencyCheck::Objects).with_property("Timeout", 30))
            .unwrap();
        let err = factory.get_object("objects").unwrap_err();
        assert_eq!(unsatisfied_member(&err).as_deref(), Some("property 'Repo'"));

        factory
            .register_definition(
                "objectsSet",
                settings(DependencyCheck::Objects).with_property("Repo", ConfigValue::reference("repo")),
            )
            .unwrap();
        assert!(factory.get_object("objectsSet").is_ok());

        factory
            .register_definition(
                "all",
                settings(DependencyCheck::All).with_property("Repo", ConfigValue::reference("repo")),
            )
            .unwrap();
        let err = factory.get_object("all").unwrap_err();
        assert_eq!(unsatisfied_member(&err).as_deref(), Some("property 'Timeout'"));

        // autowired values count as set
        factory
            .register_definition(
                "allWired",
                settings(DependencyCheck::All)
                    .with_autowire(AutowireMode::ByType)
                    .with_property("Timeout", 5),
            )
            .unwrap();
        let wired = factory.get_object_as::<Settings>("allWired").unwrap();
        assert!(wired.repo.lock().as_ref().unwrap().ptr_eq(&factory.get_object("repo").unwrap()));
    }

    #[test]
    fn test_post_processor_vetoes_population() {
        struct Veto;

        impl ObjectPostProcessor for Veto {
            fn after_instantiation(&self, _object: &ObjectRef, name: &str) -> Result<bool> {
                Ok(name != "vetoed")
            }
        }

        let factory = fixture_factory();
        factory.add_post_processor(Arc::new(Veto));
        factory.register_definition("fooA", ObjectDefinition::of_type_name("FooA")).unwrap();
        factory
            .register_definition(
                "vetoed",
                ObjectDefinition::of_type_name("Consumer").with_property("Foo", ConfigValue::reference("missing")),
            )
            .unwrap();
        factory
            .register_definition(
                "wired",
                ObjectDefinition::of_type_name("Consumer").with_property("Foo", ConfigValue::reference("fooA")),
            )
            .unwrap();

        assert!(factory.get_object_as::<Consumer>("vetoed").unwrap().foo().is_none());
        assert!(factory.get_object_as::<Consumer>("wired").unwrap().foo().is_some());
    }

    #[test]
    fn test_post_processor_rewrites_property_values() {
        struct Redirect;

        impl ObjectPostProcessor for Redirect {
            fn process_property_values(
                &self,
                mut values: PropertyValues,
                _object: &ObjectRef,
                name: &str,
            ) -> Result<Option<PropertyValues>> {
                if name == "skipped" {
                    return Ok(None);
                }
                if values.contains("Foo") {
                    values.add("Foo", ConfigValue::reference("fooB"));
                }
                Ok(Some(values))
            }
        }

        let factory = fixture_factory();
        factory.add_post_processor(Arc::new(Redirect));
        factory.register_definition("fooA", ObjectDefinition::of_type_name("FooA")).unwrap();
        factory.register_definition("fooB", ObjectDefinition::of_type_name("FooB")).unwrap();
        let consumer = || ObjectDefinition::of_type_name("Consumer").with_property("Foo", ConfigValue::reference("fooA"));
        factory.register_definition("redirected", consumer()).unwrap();
        factory.register_definition("skipped", consumer()).unwrap();

        let redirected = factory.get_object_as::<Consumer>("redirected").unwrap();
        assert!(redirected.foo().unwrap().ptr_eq(&factory.get_object("fooB").unwrap()));
        assert!(factory.get_object_as::<Consumer>("skipped").unwrap().foo().is_none());
    }

    #[test]
    fn test_post_processor_chooses_constructors() {
        struct AllConstructors;

        impl ObjectPostProcessor for AllConstructors {
            fn determine_candidate_constructors(
                &self,
                ty: &TypeHandle,
                _name: &str,
            ) -> Result<Option<Vec<ConstructorInfo>>> {
                Ok((ty.name() == "FooHolder").then(|| ty.constructors().to_vec()))
            }
        }

        let factory = fixture_factory();
        factory.register_definition("fooA", ObjectDefinition::of_type_name("FooA")).unwrap();
        factory.register_definition("holder", ObjectDefinition::of_type_name("FooHolder")).unwrap();

        // no default constructor and no autowiring
        assert!(factory.get_object("holder").is_err());

        factory.add_post_processor(Arc::new(AllConstructors));
        let holder = factory.get_object_as::<FooHolder>("holder").unwrap();
        assert!(holder.other.ptr_eq(&factory.get_object("fooA").unwrap()));
    }

    #[test]
    fn test_before_instantiation_short_circuits_creation() {
        struct Substitute(ObjectRef);

        impl ObjectPostProcessor for Substitute {
            fn before_instantiation(&self, _ty: &TypeHandle, name: &str) -> Result<Option<ObjectRef>> {
                Ok((name == "consumer").then(|| self.0.clone()))
            }
        }

        let factory = fixture_factory();
        let substitute = ObjectRef::new(Consumer::default(), factory.lookup_type("Consumer").unwrap());
        let recorder = Arc::new(RecordingProcessor::default());
        factory.add_post_processor(Arc::new(Substitute(substitute.clone())));
        factory.add_post_processor(recorder.clone());
        factory
            .register_definition(
                "consumer",
                ObjectDefinition::of_type_name("Consumer").with_property("Foo", ConfigValue::reference("missing")),
            )
            .unwrap();

        assert!(factory.get_object("consumer").unwrap().ptr_eq(&substitute));
        assert!(factory.get_object("consumer").unwrap().ptr_eq(&substitute));
        assert_eq!(recorder.before.load(Ordering::SeqCst), 0);
        assert_eq!(recorder.after.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_autowire_by_type_fills_collections() {
        let factory = fixture_factory();
        factory.register_definition("fooA", ObjectDefinition::of_type_name("FooA")).unwrap();
        factory.register_definition("fooB", ObjectDefinition::of_type_name("FooB")).unwrap();
        factory
            .register_definition(
                "registry",
                ObjectDefinition::of_type_name("FooRegistry").with_autowire(AutowireMode::ByType),
            )
            .unwrap();

        let registry = factory.get_object_as::<FooRegistry>("registry").unwrap();
        let foo_a = factory.get_object("fooA").unwrap();
        let foo_b = factory.get_object("fooB").unwrap();
        {
            let all = registry.all.lock();
            assert_eq!(all.len(), 2);
            assert!(all[0].ptr_eq(&foo_a) && all[1].ptr_eq(&foo_b));
        }
        let names: Vec<String> = registry.by_name.lock().iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(names, ["fooA", "fooB"]);

        factory.destroy_singleton("fooB");
        assert_eq!(factory.singleton_names(), vec!["fooA".to_string()]);
    }

    #[test]
    fn test_autowire_by_type_skips_unmatched_properties() {
        let factory = fixture_factory();
        factory
            .register_definition("consumer", ObjectDefinition::of_type_name("Consumer").with_autowire(AutowireMode::ByType))
            .unwrap();
        factory
            .register_definition(
                "registry",
                ObjectDefinition::of_type_name("FooRegistry").with_autowire(AutowireMode::ByType),
            )
            .unwrap();

        assert!(factory.get_object_as::<Consumer>("consumer").unwrap().foo().is_none());
        let registry = factory.get_object_as::<FooRegistry>("registry").unwrap();
        assert!(registry.all.lock().is_empty());
        assert!(registry.by_name.lock().is_empty());
    }

    #[test]
    fn test_missing_type_is_reported_by_type() {
        let factory = fixture_factory();
        let err = factory.get_object_of_type("INone").unwrap_err();
        assert!(matches!(&err, FactoryError::NoSuchType { type_name, .. } if type_name == "INone"));
        assert!(err.to_string().starts_with("No object of type 'INone' is defined"), "{err}");
    }

    #[test]
    fn test_case_insensitive_aliases_keep_their_spelling() {
        let factory = ObjectFactory::builder()
            .config(FactoryConfig::new().case_sensitive(false))
            .build();
        factory.register_type(TypeBuilder::<RepoImpl>::new("RepoImpl").default_constructor(|| RepoImpl).build());
        factory.register_definition("Repo", ObjectDefinition::of_type_name("RepoImpl")).unwrap();
        factory.register_alias("Repo", "MainRepo").unwrap();

        assert_eq!(factory.get_aliases("repo"), ["MainRepo"]);
        assert_eq!(factory.get_aliases("mainrepo"), ["Repo"]);
        assert!(factory.get_object("MAINREPO").unwrap().ptr_eq(&factory.get_object("Repo").unwrap()));
    }
}
