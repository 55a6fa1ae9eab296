//! Shared object types for end-to-end tests

use crate::lifecycle::{Disposable, FactoryObject, Initializing, ObjectFactoryAware, ObjectNameAware};
use crate::post_processor::ObjectPostProcessor;
use crate::types::{Arguments, ParamType, TypeBuilder, TypeHandle};
use crate::value::{ObjectRef, Value};
use crate::{FactoryError, ObjectFactory, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Records lifecycle events across objects
#[derive(Clone, Default)]
pub(crate) struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub(crate) fn push(&self, event: impl Into<String>) {
        self.0.lock().push(event.into());
    }

    pub(crate) fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock())
    }
}

fn object_value(value: Value) -> Result<Option<ObjectRef>> {
    match value {
        Value::Null => Ok(None),
        Value::Object(object) => Ok(Some(object)),
        other => Err(FactoryError::invocation("setter", format!("expected an object, got {}", other.type_name()))),
    }
}

fn object_arg(args: &Arguments, index: usize) -> Result<ObjectRef> {
    args.get(index)
        .and_then(Value::as_object)
        .cloned()
        .ok_or_else(|| FactoryError::invocation(format!("argument {index}"), "expected an object"))
}

// =============================================================================
// Service / repository
// =============================================================================

pub(crate) struct RepoImpl;

#[derive(Default)]
pub(crate) struct ServiceImpl {
    repo: Mutex<Option<ObjectRef>>,
}

impl ServiceImpl {
    pub(crate) fn repo(&self) -> Option<ObjectRef> {
        self.repo.lock().clone()
    }
}

// =============================================================================
// Cycles
// =============================================================================

#[derive(Default)]
pub(crate) struct Node {
    peer: Mutex<Option<ObjectRef>>,
}

impl Node {
    pub(crate) fn peer(&self) -> Option<ObjectRef> {
        self.peer.lock().clone()
    }
}

// =============================================================================
// Overloads
// =============================================================================

pub(crate) struct Widget {
    pub(crate) constructor: &'static str,
    pub(crate) size: i64,
    pub(crate) label: Option<String>,
    pub(crate) active: AtomicBool,
}

/// Static and instance factory methods producing `Widget`s
pub(crate) struct WidgetMaker {
    prefix: String,
}

fn made_widget(ty: &TypeHandle, constructor: &'static str, size: i64, label: Option<String>) -> Value {
    Value::Object(ObjectRef::new(
        Widget {
            constructor,
            size,
            label,
            active: AtomicBool::new(false),
        },
        ty.clone(),
    ))
}

// =============================================================================
// Autowiring
// =============================================================================

pub(crate) struct FooA;
pub(crate) struct FooB;

#[derive(Default)]
pub(crate) struct Consumer {
    foo: Mutex<Option<ObjectRef>>,
}

impl Consumer {
    pub(crate) fn foo(&self) -> Option<ObjectRef> {
        self.foo.lock().clone()
    }
}

pub(crate) struct FooHolder {
    pub(crate) other: ObjectRef,
}

/// Collects every `IFoo` as a list and as a name-keyed map
#[derive(Default)]
pub(crate) struct FooRegistry {
    pub(crate) all: Mutex<Vec<ObjectRef>>,
    pub(crate) by_name: Mutex<Vec<(String, ObjectRef)>>,
}

fn object_entries(value: Value) -> Result<Vec<(String, ObjectRef)>> {
    let entries: Vec<(String, Value)> = match value {
        Value::List(items) => items.into_iter().enumerate().map(|(i, v)| (i.to_string(), v)).collect(),
        Value::Map(entries) => entries,
        other => {
            return Err(FactoryError::invocation("setter", format!("expected a collection, got {}", other.type_name())));
        }
    };
    entries
        .into_iter()
        .map(|(key, v)| match v {
            Value::Object(object) => Ok((key, object)),
            other => Err(FactoryError::invocation("setter", format!("expected an object, got {}", other.type_name()))),
        })
        .collect()
}

// =============================================================================
// Dependency checks
// =============================================================================

#[derive(Default)]
pub(crate) struct Settings {
    pub(crate) timeout: Mutex<Option<i64>>,
    pub(crate) repo: Mutex<Option<ObjectRef>>,
}

// =============================================================================
// Factory objects
// =============================================================================

pub(crate) struct Connection {
    pub(crate) url: String,
}

pub(crate) struct ConnectionFactory {
    url: Mutex<String>,
    product_type: TypeHandle,
}

impl FactoryObject for ConnectionFactory {
    fn get_object(&self) -> Result<ObjectRef> {
        Ok(ObjectRef::new(
            Connection {
                url: self.url.lock().clone(),
            },
            self.product_type.clone(),
        ))
    }

    fn object_type(&self) -> Option<String> {
        Some("Connection".into())
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

pub(crate) struct Resource {
    name: String,
    log: EventLog,
}

impl Disposable for Resource {
    fn dispose(&self) -> Result<()> {
        self.log.push(format!("dispose {}", self.name));
        Ok(())
    }
}

/// `Resource(name)` logging creation and disposal into `log`
pub(crate) fn resource_type(log: &EventLog) -> TypeHandle {
    let log = log.clone();
    TypeBuilder::<Resource>::new("Resource")
        .constructor(&[("name", ParamType::Str)], move |args| {
            let name = args.string(0)?;
            log.push(format!("create {name}"));
            Ok(Resource {
                name,
                log: log.clone(),
            })
        })
        .disposable()
        .build()
}

#[derive(Default)]
pub(crate) struct Lifecycled {
    pub(crate) calls: Mutex<Vec<String>>,
}

impl ObjectNameAware for Lifecycled {
    fn set_object_name(&self, name: &str) {
        self.calls.lock().push(format!("name {name}"));
    }
}

impl ObjectFactoryAware for Lifecycled {
    fn set_object_factory(&self, _factory: &ObjectFactory) -> Result<()> {
        self.calls.lock().push("factory".into());
        Ok(())
    }
}

impl Initializing for Lifecycled {
    fn after_properties_set(&self) -> Result<()> {
        self.calls.lock().push("after_properties_set".into());
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingProcessor {
    pub(crate) before: AtomicUsize,
    pub(crate) after: AtomicUsize,
}

impl ObjectPostProcessor for RecordingProcessor {
    fn before_initialization(&self, object: ObjectRef, _name: &str) -> Result<ObjectRef> {
        self.before.fetch_add(1, Ordering::SeqCst);
        Ok(object)
    }

    fn after_initialization(&self, object: ObjectRef, _name: &str) -> Result<ObjectRef> {
        self.after.fetch_add(1, Ordering::SeqCst);
        Ok(object)
    }
}

/// `WidgetMaker`: overloaded and generic static factory methods, an
/// instance factory method, and an `Odd` overload set whose declared return
/// types disagree
pub(crate) fn widget_maker_type(widget: &TypeHandle, connection: &TypeHandle) -> TypeHandle {
    let (one, two, generic, odd, built) = (widget.clone(), widget.clone(), widget.clone(), widget.clone(), widget.clone());
    let odd_connection = connection.clone();
    TypeBuilder::<WidgetMaker>::new("WidgetMaker")
        .default_constructor(|| WidgetMaker {
            prefix: "made".into(),
        })
        .static_method("Create", &[("size", ParamType::Int)], Some("Widget"), move |args| {
            Ok(made_widget(&one, "Create(int)", args.int(0)?, None))
        })
        .static_method(
            "Create",
            &[("size", ParamType::Int), ("label", ParamType::Str)],
            Some("Widget"),
            move |args| Ok(made_widget(&two, "Create(int,string)", args.int(0)?, Some(args.string(1)?))),
        )
        .generic_static_method("Make", 1, &[("size", ParamType::Int)], Some("Widget"), move |type_args, args| {
            Ok(made_widget(&generic, "Make<T>(int)", args.int(0)?, Some(type_args.join(","))))
        })
        .static_method("Odd", &[("size", ParamType::Int)], Some("Widget"), move |args| {
            Ok(made_widget(&odd, "Odd(int)", args.int(0)?, None))
        })
        .static_method("Odd", &[("url", ParamType::Str), ("retries", ParamType::Int)], Some("Connection"), move |args| {
            Ok(Value::Object(ObjectRef::new(
                Connection { url: args.string(0)? },
                odd_connection.clone(),
            )))
        })
        .method("Build", &[("size", ParamType::Int)], Some("Widget"), move |maker, args| {
            Ok(made_widget(&built, "Build(int)", args.int(0)?, Some(maker.prefix.clone())))
        })
        .build()
}

// =============================================================================
// Factory
// =============================================================================

/// A factory knowing every fixture type except `Resource`
pub(crate) fn fixture_factory() -> ObjectFactory {
    let factory = ObjectFactory::new();

    factory.register_type(TypeBuilder::<RepoImpl>::new("RepoImpl").implements("IRepo").default_constructor(|| RepoImpl).build());
    factory.register_type(
        TypeBuilder::<ServiceImpl>::new("ServiceImpl")
            .default_constructor(ServiceImpl::default)
            .property("repo", ParamType::interface("IRepo"), |s, v| {
                *s.repo.lock() = object_value(v)?;
                Ok(())
            })
            .build(),
    );

    factory.register_type(
        TypeBuilder::<Node>::new("Node")
            .default_constructor(Node::default)
            .constructor(&[("peer", ParamType::object("Node"))], |args| {
                Ok(Node {
                    peer: Mutex::new(Some(object_arg(args, 0)?)),
                })
            })
            .property("Peer", ParamType::object("Node"), |n, v| {
                *n.peer.lock() = object_value(v)?;
                Ok(())
            })
            .build(),
    );

    let widget = TypeBuilder::<Widget>::new("Widget")
        .constructor(&[("size", ParamType::Int)], |args| {
            Ok(Widget {
                constructor: "C(int)",
                size: args.int(0)?,
                label: None,
                active: AtomicBool::new(false),
            })
        })
        .constructor(&[("size", ParamType::Int), ("label", ParamType::Str)], |args| {
            Ok(Widget {
                constructor: "C(int,string)",
                size: args.int(0)?,
                label: Some(args.string(1)?),
                active: AtomicBool::new(false),
            })
        })
        .method("Activate", &[], None, |w, _| {
            w.active.store(true, Ordering::SeqCst);
            Ok(Value::Null)
        })
        .build();
    factory.register_type(widget.clone());

    factory.register_type(TypeBuilder::<FooA>::new("FooA").implements("IFoo").default_constructor(|| FooA).build());
    factory.register_type(TypeBuilder::<FooB>::new("FooB").implements("IFoo").default_constructor(|| FooB).build());
    factory.register_type(
        TypeBuilder::<Consumer>::new("Consumer")
            .default_constructor(Consumer::default)
            .property("Foo", ParamType::interface("IFoo"), |c, v| {
                *c.foo.lock() = object_value(v)?;
                Ok(())
            })
            .build(),
    );
    factory.register_type(
        TypeBuilder::<FooRegistry>::new("FooRegistry")
            .default_constructor(FooRegistry::default)
            .property("Foos", ParamType::list_of(ParamType::interface("IFoo")), |r, v| {
                *r.all.lock() = object_entries(v)?.into_iter().map(|(_, o)| o).collect();
                Ok(())
            })
            .property("FoosByName", ParamType::map_of(ParamType::interface("IFoo")), |r, v| {
                *r.by_name.lock() = object_entries(v)?;
                Ok(())
            })
            .build(),
    );
    factory.register_type(
        TypeBuilder::<Settings>::new("Settings")
            .default_constructor(Settings::default)
            .property("Timeout", ParamType::Int, |s, v| {
                *s.timeout.lock() = v.as_int();
                Ok(())
            })
            .property("Repo", ParamType::interface("IRepo"), |s, v| {
                *s.repo.lock() = object_value(v)?;
                Ok(())
            })
            .build(),
    );
    factory.register_type(
        TypeBuilder::<FooHolder>::new("FooHolder")
            .constructor(&[("other", ParamType::interface("IFoo"))], |args| {
                Ok(FooHolder {
                    other: object_arg(args, 0)?,
                })
            })
            .build(),
    );

    let connection = TypeBuilder::<Connection>::new("Connection").build();
    factory.register_type(connection.clone());
    factory.register_type(widget_maker_type(&widget, &connection));
    factory.register_type(
        TypeBuilder::<ConnectionFactory>::new("ConnectionFactory")
            .default_constructor(move || ConnectionFactory {
                url: Mutex::new(String::new()),
                product_type: connection.clone(),
            })
            .property("Url", ParamType::Str, |f, v| {
                *f.url.lock() = v.as_str().unwrap_or_default().to_string();
                Ok(())
            })
            .factory_object()
            .build(),
    );

    factory.register_type(
        TypeBuilder::<Lifecycled>::new("Lifecycled")
            .default_constructor(Lifecycled::default)
            .method("Start", &[], None, |p, _| {
                p.calls.lock().push("start".into());
                Ok(Value::Null)
            })
            .name_aware()
            .factory_aware()
            .initializing()
            .build(),
    );

    factory
}
