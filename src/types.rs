//! Runtime type descriptors
//!
//! Rust has no runtime reflection, so every type the factory instantiates is
//! described up front by a [`TypeDescriptor`]: its nominal hierarchy, the
//! constructors and methods the factory may call, the properties it may set
//! and the lifecycle capabilities the instance implements.
//!
//! Descriptors are built with the typed [`TypeBuilder`], which wraps each
//! closure with the downcast from the type-erased [`Instance`].
//!
//! ```rust
//! use object_factory::{ParamType, TypeBuilder, Value};
//! use parking_lot::Mutex;
//!
//! struct Greeter {
//!     greeting: Mutex<String>,
//! }
//!
//! let ty = TypeBuilder::<Greeter>::new("Greeter")
//!     .implements("IGreeter")
//!     .default_constructor(|| Greeter { greeting: Mutex::new("hello".into()) })
//!     .property("Greeting", ParamType::Str, |g: &Greeter, v: Value| {
//!         *g.greeting.lock() = v.as_str().unwrap_or_default().to_string();
//!         Ok(())
//!     })
//!     .build();
//!
//! assert!(ty.is_assignable_to("IGreeter"));
//! assert!(ty.default_constructor().is_some());
//! ```

use crate::lifecycle::{Disposable, FactoryObject, Initializing, ObjectFactoryAware, ObjectNameAware};
use crate::value::{Instance, ObjectRef, Value};
use crate::{FactoryError, Result};
use ahash::RandomState;
use dashmap::DashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Shared handle to a type descriptor
pub type TypeHandle = Arc<TypeDescriptor>;

// =============================================================================
// Declared types
// =============================================================================

/// Declared type of a parameter, property or dependency.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// Accepts any value
    Any,
    Bool,
    Int,
    Float,
    Str,
    /// A concrete object type, by descriptor name
    Object(String),
    /// An interface name, implemented by descriptors
    Interface(String),
    Array(Box<ParamType>),
    List(Box<ParamType>),
    Set(Box<ParamType>),
    /// String-keyed dictionary of the element type
    Map(Box<ParamType>),
}

impl ParamType {
    pub fn object(name: impl Into<String>) -> Self {
        ParamType::Object(name.into())
    }

    pub fn interface(name: impl Into<String>) -> Self {
        ParamType::Interface(name.into())
    }

    pub fn array_of(element: ParamType) -> Self {
        ParamType::Array(Box::new(element))
    }

    pub fn list_of(element: ParamType) -> Self {
        ParamType::List(Box::new(element))
    }

    pub fn set_of(element: ParamType) -> Self {
        ParamType::Set(Box::new(element))
    }

    pub fn map_of(element: ParamType) -> Self {
        ParamType::Map(Box::new(element))
    }

    /// Primitives, strings and collections of them are "simple": they are
    /// never autowired.
    pub fn is_simple(&self) -> bool {
        match self {
            ParamType::Bool | ParamType::Int | ParamType::Float | ParamType::Str => true,
            ParamType::Array(e) | ParamType::List(e) | ParamType::Set(e) => e.is_simple(),
            _ => false,
        }
    }

    /// Element type of a collection shape
    pub fn element_type(&self) -> Option<&ParamType> {
        match self {
            ParamType::Array(e) | ParamType::List(e) | ParamType::Set(e) | ParamType::Map(e) => {
                Some(e)
            }
            _ => None,
        }
    }

    /// Type name for object and interface types
    pub fn object_type_name(&self) -> Option<&str> {
        match self {
            ParamType::Object(n) | ParamType::Interface(n) => Some(n),
            _ => None,
        }
    }

    /// Whether null is an acceptable value
    pub fn is_nullable(&self) -> bool {
        !matches!(self, ParamType::Bool | ParamType::Int | ParamType::Float)
    }

    /// Assignability of a value without any conversion
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (ParamType::Any, _) => true,
            (t, Value::Null) => t.is_nullable(),
            (ParamType::Bool, Value::Bool(_))
            | (ParamType::Int, Value::Int(_))
            | (ParamType::Float, Value::Float(_))
            | (ParamType::Str, Value::Str(_)) => true,
            (ParamType::Object(n) | ParamType::Interface(n), Value::Object(o)) => {
                o.is_assignable_to(n)
            }
            (ParamType::Array(e) | ParamType::List(e) | ParamType::Set(e), Value::List(items)) => {
                items.iter().all(|i| e.accepts(i))
            }
            (ParamType::Map(e), Value::Map(entries)) => entries.iter().all(|(_, v)| e.accepts(v)),
            _ => false,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Any => f.write_str("any"),
            ParamType::Bool => f.write_str("bool"),
            ParamType::Int => f.write_str("int"),
            ParamType::Float => f.write_str("float"),
            ParamType::Str => f.write_str("string"),
            ParamType::Object(n) | ParamType::Interface(n) => f.write_str(n),
            ParamType::Array(e) => write!(f, "{e}[]"),
            ParamType::List(e) => write!(f, "list<{e}>"),
            ParamType::Set(e) => write!(f, "set<{e}>"),
            ParamType::Map(e) => write!(f, "map<string, {e}>"),
        }
    }
}

/// A named, typed parameter
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterInfo {
    pub name: String,
    pub ty: ParamType,
}

fn parameters(params: &[(&str, ParamType)]) -> Vec<ParameterInfo> {
    params
        .iter()
        .map(|(name, ty)| ParameterInfo {
            name: (*name).to_string(),
            ty: ty.clone(),
        })
        .collect()
}

// =============================================================================
// Invocation arguments
// =============================================================================

/// Arguments handed to constructors, methods and event handlers.
#[derive(Clone, Debug, Default)]
pub struct Arguments {
    values: Vec<Value>,
}

impl Arguments {
    #[inline]
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    #[inline]
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    fn required(&self, index: usize) -> Result<&Value> {
        self.values.get(index).ok_or_else(|| {
            FactoryError::invocation(format!("argument {index}"), "argument missing")
        })
    }

    fn mismatch(index: usize, expected: &str, value: &Value) -> FactoryError {
        FactoryError::invocation(
            format!("argument {index}"),
            format!("expected {expected} but got {}", value.type_name()),
        )
    }

    pub fn int(&self, index: usize) -> Result<i64> {
        let v = self.required(index)?;
        v.as_int().ok_or_else(|| Self::mismatch(index, "int", v))
    }

    pub fn float(&self, index: usize) -> Result<f64> {
        let v = self.required(index)?;
        v.as_float().ok_or_else(|| Self::mismatch(index, "float", v))
    }

    pub fn bool(&self, index: usize) -> Result<bool> {
        let v = self.required(index)?;
        v.as_bool().ok_or_else(|| Self::mismatch(index, "bool", v))
    }

    pub fn string(&self, index: usize) -> Result<String> {
        let v = self.required(index)?;
        v.as_str()
            .map(str::to_string)
            .ok_or_else(|| Self::mismatch(index, "string", v))
    }

    /// A required object argument of type `T`
    pub fn object<T: Send + Sync + 'static>(&self, index: usize) -> Result<Arc<T>> {
        let v = self.required(index)?;
        v.object::<T>()
            .ok_or_else(|| Self::mismatch(index, std::any::type_name::<T>(), v))
    }

    /// An object argument of type `T` that may be null
    pub fn optional_object<T: Send + Sync + 'static>(&self, index: usize) -> Result<Option<Arc<T>>> {
        match self.required(index)? {
            Value::Null => Ok(None),
            v => v
                .object::<T>()
                .map(Some)
                .ok_or_else(|| Self::mismatch(index, std::any::type_name::<T>(), v)),
        }
    }

    /// Every element of a list argument, downcast to `T`
    pub fn objects<T: Send + Sync + 'static>(&self, index: usize) -> Result<Vec<Arc<T>>> {
        let v = self.required(index)?;
        let items = v.as_list().ok_or_else(|| Self::mismatch(index, "list", v))?;
        items
            .iter()
            .map(|i| {
                i.object::<T>()
                    .ok_or_else(|| Self::mismatch(index, std::any::type_name::<T>(), i))
            })
            .collect()
    }
}

// =============================================================================
// Members
// =============================================================================

type ConstructFn = Arc<dyn Fn(&Arguments) -> Result<Instance> + Send + Sync>;
type MethodFn = Arc<dyn Fn(Option<&Instance>, &[String], &Arguments) -> Result<Value> + Send + Sync>;
type SetterFn = Arc<dyn Fn(&Instance, Value) -> Result<()> + Send + Sync>;
type GetterFn = Arc<dyn Fn(&Instance) -> Result<Value> + Send + Sync>;
type SubscribeFn = Arc<dyn Fn(&Instance, EventSubscription) -> Result<()> + Send + Sync>;

/// A constructor the factory may call
#[derive(Clone)]
pub struct ConstructorInfo {
    params: Vec<ParameterInfo>,
    invoke: ConstructFn,
}

impl ConstructorInfo {
    #[inline]
    pub fn params(&self) -> &[ParameterInfo] {
        &self.params
    }

    #[inline]
    pub fn param_types(&self) -> Vec<ParamType> {
        self.params.iter().map(|p| p.ty.clone()).collect()
    }

    /// Run the constructor with already converted arguments
    #[inline]
    pub fn invoke(&self, args: &Arguments) -> Result<Instance> {
        (self.invoke)(args)
    }

    /// Short signature used in diagnostics, e.g. `(int, string)`
    pub fn signature(&self) -> String {
        signature(&self.params)
    }
}

impl fmt::Debug for ConstructorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConstructorInfo{}", self.signature())
    }
}

fn signature(params: &[ParameterInfo]) -> String {
    let parts: Vec<String> = params.iter().map(|p| p.ty.to_string()).collect();
    format!("({})", parts.join(", "))
}

/// A static or instance method
#[derive(Clone)]
pub struct MethodInfo {
    name: String,
    is_static: bool,
    generic_arity: usize,
    params: Vec<ParameterInfo>,
    return_type: Option<String>,
    invoke: MethodFn,
}

impl MethodInfo {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    #[inline]
    pub fn generic_arity(&self) -> usize {
        self.generic_arity
    }

    #[inline]
    pub fn params(&self) -> &[ParameterInfo] {
        &self.params
    }

    #[inline]
    pub fn param_types(&self) -> Vec<ParamType> {
        self.params.iter().map(|p| p.ty.clone()).collect()
    }

    /// Declared return type name, when the method returns an object
    #[inline]
    pub fn return_type(&self) -> Option<&str> {
        self.return_type.as_deref()
    }

    /// Invoke on `target` (ignored for static methods)
    pub fn invoke(
        &self,
        target: Option<&Instance>,
        type_args: &[String],
        args: &Arguments,
    ) -> Result<Value> {
        (self.invoke)(target, type_args, args)
    }

    pub fn signature(&self) -> String {
        format!("{}{}", self.name, signature(&self.params))
    }
}

impl fmt::Debug for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MethodInfo({}{})",
            if self.is_static { "static " } else { "" },
            self.signature()
        )
    }
}

/// A property exposed for injection
#[derive(Clone)]
pub struct PropertyInfo {
    name: String,
    ty: ParamType,
    setter: Option<SetterFn>,
    getter: Option<GetterFn>,
}

impl PropertyInfo {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn ty(&self) -> &ParamType {
        &self.ty
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }

    #[inline]
    pub fn is_readable(&self) -> bool {
        self.getter.is_some()
    }

    pub(crate) fn set(&self, instance: &Instance, value: Value) -> Result<()> {
        match &self.setter {
            Some(setter) => setter(instance, value),
            None => Err(FactoryError::invocation(
                format!("property '{}'", self.name),
                "property is not writable",
            )),
        }
    }

    pub(crate) fn get(&self, instance: &Instance) -> Result<Value> {
        match &self.getter {
            Some(getter) => getter(instance),
            None => Err(FactoryError::invocation(
                format!("property '{}'", self.name),
                "property is not readable",
            )),
        }
    }
}

impl fmt::Debug for PropertyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyInfo")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("writable", &self.is_writable())
            .field("readable", &self.is_readable())
            .finish()
    }
}

/// A handler attached to an event source: the object and the method to call
#[derive(Clone, Debug)]
pub struct EventSubscription {
    pub handler: ObjectRef,
    pub method: String,
}

impl EventSubscription {
    /// Raise the event on this subscriber
    pub fn invoke(&self, args: &Arguments) -> Result<Value> {
        let ty = self.handler.type_handle();
        let method = ty
            .instance_methods(&self.method)
            .find(|m| m.params().len() == args.len())
            .ok_or_else(|| {
                FactoryError::invocation(
                    format!("{}.{}", ty.name(), self.method),
                    "no handler method with a matching parameter count",
                )
            })?;
        method.invoke(Some(self.handler.instance()), &[], args)
    }
}

/// An event a type can raise
#[derive(Clone)]
pub struct EventInfo {
    name: String,
    subscribe: SubscribeFn,
}

impl EventInfo {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn subscribe(&self, source: &Instance, subscription: EventSubscription) -> Result<()> {
        (self.subscribe)(source, subscription)
    }
}

impl fmt::Debug for EventInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventInfo({})", self.name)
    }
}

// =============================================================================
// Capabilities
// =============================================================================

#[derive(Clone, Copy, Default)]
pub(crate) struct Capabilities {
    disposable: Option<fn(&Instance) -> Option<&dyn Disposable>>,
    initializing: Option<fn(&Instance) -> Option<&dyn Initializing>>,
    name_aware: Option<fn(&Instance) -> Option<&dyn ObjectNameAware>>,
    factory_aware: Option<fn(&Instance) -> Option<&dyn ObjectFactoryAware>>,
    factory_object: Option<fn(&Instance) -> Option<&dyn FactoryObject>>,
}

fn as_disposable<T: Disposable + 'static>(i: &Instance) -> Option<&dyn Disposable> {
    i.downcast_ref::<T>().map(|t| t as &dyn Disposable)
}

fn as_initializing<T: Initializing + 'static>(i: &Instance) -> Option<&dyn Initializing> {
    i.downcast_ref::<T>().map(|t| t as &dyn Initializing)
}

fn as_name_aware<T: ObjectNameAware + 'static>(i: &Instance) -> Option<&dyn ObjectNameAware> {
    i.downcast_ref::<T>().map(|t| t as &dyn ObjectNameAware)
}

fn as_factory_aware<T: ObjectFactoryAware + 'static>(i: &Instance) -> Option<&dyn ObjectFactoryAware> {
    i.downcast_ref::<T>().map(|t| t as &dyn ObjectFactoryAware)
}

fn as_factory_object<T: FactoryObject + 'static>(i: &Instance) -> Option<&dyn FactoryObject> {
    i.downcast_ref::<T>().map(|t| t as &dyn FactoryObject)
}

// =============================================================================
// TypeDescriptor
// =============================================================================

/// Everything the factory knows about one type.
///
/// `base` and `interfaces` describe the nominal hierarchy used for
/// assignability and type-difference weights. Members are not inherited from
/// the base descriptor: a derived descriptor declares its own.
pub struct TypeDescriptor {
    name: String,
    base: Option<TypeHandle>,
    interfaces: Vec<String>,
    constructors: Vec<ConstructorInfo>,
    methods: Vec<MethodInfo>,
    properties: Vec<PropertyInfo>,
    events: Vec<EventInfo>,
    capabilities: Capabilities,
}

impl TypeDescriptor {
    /// A descriptor with no members, useful for marker types
    pub fn named(name: impl Into<String>) -> TypeHandle {
        Arc::new(Self {
            name: name.into(),
            base: None,
            interfaces: Vec::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            events: Vec::new(),
            capabilities: Capabilities::default(),
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn base(&self) -> Option<&TypeHandle> {
        self.base.as_ref()
    }

    #[inline]
    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    #[inline]
    pub fn constructors(&self) -> &[ConstructorInfo] {
        &self.constructors
    }

    #[inline]
    pub fn methods(&self) -> &[MethodInfo] {
        &self.methods
    }

    #[inline]
    pub fn properties(&self) -> &[PropertyInfo] {
        &self.properties
    }

    #[inline]
    pub fn events(&self) -> &[EventInfo] {
        &self.events
    }

    /// The zero-argument constructor, if declared
    pub fn default_constructor(&self) -> Option<&ConstructorInfo> {
        self.constructors.iter().find(|c| c.params.is_empty())
    }

    pub fn property(&self, name: &str) -> Option<&PropertyInfo> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn event(&self, name: &str) -> Option<&EventInfo> {
        self.events.iter().find(|e| e.name == name)
    }

    /// Instance methods with the given name, in declaration order
    pub fn instance_methods<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodInfo> + 'a {
        self.methods
            .iter()
            .filter(move |m| !m.is_static && m.name == name)
    }

    /// Whether instances may be used where `type_name` is expected
    pub fn is_assignable_to(&self, type_name: &str) -> bool {
        self.name == type_name
            || self.interfaces.iter().any(|i| i == type_name)
            || self
                .base
                .as_ref()
                .is_some_and(|b| b.is_assignable_to(type_name))
    }

    #[inline]
    pub fn is_factory_object(&self) -> bool {
        self.capabilities.factory_object.is_some()
    }

    #[inline]
    pub fn is_disposable(&self) -> bool {
        self.capabilities.disposable.is_some()
    }

    pub(crate) fn as_disposable<'a>(&self, i: &'a Instance) -> Option<&'a dyn Disposable> {
        self.capabilities.disposable.and_then(|cast| cast(i))
    }

    pub(crate) fn as_initializing<'a>(&self, i: &'a Instance) -> Option<&'a dyn Initializing> {
        self.capabilities.initializing.and_then(|cast| cast(i))
    }

    pub(crate) fn as_name_aware<'a>(&self, i: &'a Instance) -> Option<&'a dyn ObjectNameAware> {
        self.capabilities.name_aware.and_then(|cast| cast(i))
    }

    pub(crate) fn as_factory_aware<'a>(&self, i: &'a Instance) -> Option<&'a dyn ObjectFactoryAware> {
        self.capabilities.factory_aware.and_then(|cast| cast(i))
    }

    pub(crate) fn as_factory_object<'a>(&self, i: &'a Instance) -> Option<&'a dyn FactoryObject> {
        self.capabilities.factory_object.and_then(|cast| cast(i))
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("base", &self.base.as_ref().map(|b| b.name()))
            .field("interfaces", &self.interfaces)
            .field("constructors", &self.constructors.len())
            .field("methods", &self.methods.len())
            .field("properties", &self.properties.len())
            .finish()
    }
}

// =============================================================================
// TypeBuilder
// =============================================================================

fn downcast<'a, T: Send + Sync + 'static>(instance: &'a Instance, member: &str) -> Result<&'a T> {
    instance.downcast_ref::<T>().ok_or_else(|| {
        FactoryError::invocation(
            member.to_string(),
            format!("target is not a {}", std::any::type_name::<T>()),
        )
    })
}

/// Typed builder for a [`TypeDescriptor`] describing `T`.
pub struct TypeBuilder<T> {
    descriptor: TypeDescriptor,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> TypeBuilder<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            descriptor: TypeDescriptor {
                name: name.into(),
                base: None,
                interfaces: Vec::new(),
                constructors: Vec::new(),
                methods: Vec::new(),
                properties: Vec::new(),
                events: Vec::new(),
                capabilities: Capabilities::default(),
            },
            _marker: PhantomData,
        }
    }

    /// Declare the nominal base type
    pub fn extends(mut self, base: &TypeHandle) -> Self {
        self.descriptor.base = Some(Arc::clone(base));
        self
    }

    /// Declare an implemented interface name
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.descriptor.interfaces.push(interface.into());
        self
    }

    /// Add a constructor taking the given parameters
    pub fn constructor<F>(mut self, params: &[(&str, ParamType)], ctor: F) -> Self
    where
        F: Fn(&Arguments) -> Result<T> + Send + Sync + 'static,
    {
        self.descriptor.constructors.push(ConstructorInfo {
            params: parameters(params),
            invoke: Arc::new(move |args| ctor(args).map(|t| Arc::new(t) as Instance)),
        });
        self
    }

    /// Add a zero-argument constructor
    pub fn default_constructor<F>(self, ctor: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.constructor(&[], move |_| Ok(ctor()))
    }

    /// Add a static method (typically a factory method)
    pub fn static_method<F>(
        mut self,
        name: impl Into<String>,
        params: &[(&str, ParamType)],
        returns: Option<&str>,
        method: F,
    ) -> Self
    where
        F: Fn(&Arguments) -> Result<Value> + Send + Sync + 'static,
    {
        self.descriptor.methods.push(MethodInfo {
            name: name.into(),
            is_static: true,
            generic_arity: 0,
            params: parameters(params),
            return_type: returns.map(str::to_string),
            invoke: Arc::new(move |_, _, args| method(args)),
        });
        self
    }

    /// Add a static method with `arity` generic type arguments
    pub fn generic_static_method<F>(
        mut self,
        name: impl Into<String>,
        arity: usize,
        params: &[(&str, ParamType)],
        returns: Option<&str>,
        method: F,
    ) -> Self
    where
        F: Fn(&[String], &Arguments) -> Result<Value> + Send + Sync + 'static,
    {
        self.descriptor.methods.push(MethodInfo {
            name: name.into(),
            is_static: true,
            generic_arity: arity,
            params: parameters(params),
            return_type: returns.map(str::to_string),
            invoke: Arc::new(move |_, type_args, args| method(type_args, args)),
        });
        self
    }

    /// Add an instance method
    pub fn method<F>(
        mut self,
        name: impl Into<String>,
        params: &[(&str, ParamType)],
        returns: Option<&str>,
        method: F,
    ) -> Self
    where
        F: Fn(&T, &Arguments) -> Result<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        let member = name.clone();
        self.descriptor.methods.push(MethodInfo {
            name,
            is_static: false,
            generic_arity: 0,
            params: parameters(params),
            return_type: returns.map(str::to_string),
            invoke: Arc::new(move |target, _, args| {
                let target = target.ok_or_else(|| {
                    FactoryError::invocation(member.clone(), "instance method called without a target")
                })?;
                method(downcast::<T>(target, &member)?, args)
            }),
        });
        self
    }

    /// Add a writable property
    pub fn property<S>(mut self, name: impl Into<String>, ty: ParamType, setter: S) -> Self
    where
        S: Fn(&T, Value) -> Result<()> + Send + Sync + 'static,
    {
        let name = name.into();
        let member = format!("property '{name}'");
        self.descriptor.properties.push(PropertyInfo {
            name,
            ty,
            setter: Some(Arc::new(move |i, v| setter(downcast::<T>(i, &member)?, v))),
            getter: None,
        });
        self
    }

    /// Add a readable and writable property
    pub fn property_with_getter<S, G>(
        mut self,
        name: impl Into<String>,
        ty: ParamType,
        setter: S,
        getter: G,
    ) -> Self
    where
        S: Fn(&T, Value) -> Result<()> + Send + Sync + 'static,
        G: Fn(&T) -> Value + Send + Sync + 'static,
    {
        let name = name.into();
        let set_member = format!("property '{name}'");
        let get_member = set_member.clone();
        self.descriptor.properties.push(PropertyInfo {
            name,
            ty,
            setter: Some(Arc::new(move |i, v| setter(downcast::<T>(i, &set_member)?, v))),
            getter: Some(Arc::new(move |i| Ok(getter(downcast::<T>(i, &get_member)?)))),
        });
        self
    }

    /// Add a read-only property
    pub fn read_only_property<G>(mut self, name: impl Into<String>, ty: ParamType, getter: G) -> Self
    where
        G: Fn(&T) -> Value + Send + Sync + 'static,
    {
        let name = name.into();
        let member = format!("property '{name}'");
        self.descriptor.properties.push(PropertyInfo {
            name,
            ty,
            setter: None,
            getter: Some(Arc::new(move |i| Ok(getter(downcast::<T>(i, &member)?)))),
        });
        self
    }

    /// Add an event other objects may subscribe to
    pub fn event<F>(mut self, name: impl Into<String>, subscribe: F) -> Self
    where
        F: Fn(&T, EventSubscription) -> Result<()> + Send + Sync + 'static,
    {
        let name = name.into();
        let member = format!("event '{name}'");
        self.descriptor.events.push(EventInfo {
            name,
            subscribe: Arc::new(move |i, s| subscribe(downcast::<T>(i, &member)?, s)),
        });
        self
    }

    /// Instances take part in disposal through [`Disposable`]
    pub fn disposable(mut self) -> Self
    where
        T: Disposable,
    {
        self.descriptor.capabilities.disposable = Some(as_disposable::<T>);
        self
    }

    /// Instances are notified through [`Initializing`] after population
    pub fn initializing(mut self) -> Self
    where
        T: Initializing,
    {
        self.descriptor.capabilities.initializing = Some(as_initializing::<T>);
        self
    }

    /// Instances receive their object name
    pub fn name_aware(mut self) -> Self
    where
        T: ObjectNameAware,
    {
        self.descriptor.capabilities.name_aware = Some(as_name_aware::<T>);
        self
    }

    /// Instances receive the owning factory
    pub fn factory_aware(mut self) -> Self
    where
        T: ObjectFactoryAware,
    {
        self.descriptor.capabilities.factory_aware = Some(as_factory_aware::<T>);
        self
    }

    /// Instances are factory objects producing the object exposed under their name
    pub fn factory_object(mut self) -> Self
    where
        T: FactoryObject,
    {
        self.descriptor.capabilities.factory_object = Some(as_factory_object::<T>);
        self
    }

    pub fn build(self) -> TypeHandle {
        Arc::new(self.descriptor)
    }
}

// =============================================================================
// TypeRegistry
// =============================================================================

/// Name-indexed descriptors, used to resolve definitions that name their type.
pub struct TypeRegistry {
    types: DashMap<String, TypeHandle, RandomState>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            types: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Register a descriptor under its own name, replacing any previous one
    pub fn register(&self, ty: TypeHandle) {
        self.types.insert(ty.name().to_string(), ty);
    }

    pub fn get(&self, name: &str) -> Option<TypeHandle> {
        self.types.get(name).map(|t| Arc::clone(t.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("count", &self.len())
            .finish()
    }
}
