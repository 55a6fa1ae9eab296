//! Runtime values flowing through the factory
//!
//! Constructor arguments, property values and factory-method results are all
//! carried as [`Value`]. Object instances are type-erased behind
//! [`ObjectRef`], which pairs the shared instance with its [`TypeDescriptor`].

use crate::types::{TypeDescriptor, TypeHandle};
use crate::{FactoryError, Result};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Type-erased, shareable object instance
pub type Instance = Arc<dyn Any + Send + Sync>;

/// A live object together with the descriptor of its type.
///
/// Cloning an `ObjectRef` clones the `Arc`, never the object.
#[derive(Clone)]
pub struct ObjectRef {
    instance: Instance,
    ty: TypeHandle,
}

impl ObjectRef {
    /// Wrap a freshly built value
    #[inline]
    pub fn new<T: Send + Sync + 'static>(value: T, ty: TypeHandle) -> Self {
        Self {
            instance: Arc::new(value),
            ty,
        }
    }

    /// Wrap an already shared value
    #[inline]
    pub fn from_arc<T: Send + Sync + 'static>(value: Arc<T>, ty: TypeHandle) -> Self {
        Self {
            instance: value as Instance,
            ty,
        }
    }

    /// Wrap a type-erased instance
    #[inline]
    pub fn from_instance(instance: Instance, ty: TypeHandle) -> Self {
        Self { instance, ty }
    }

    /// The type-erased instance
    #[inline]
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Descriptor of the instance's type
    #[inline]
    pub fn type_handle(&self) -> &TypeHandle {
        &self.ty
    }

    /// Name of the instance's type
    #[inline]
    pub fn type_name(&self) -> &str {
        self.ty.name()
    }

    /// Downcast to a concrete shared type
    #[inline]
    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.instance).downcast::<T>().ok()
    }

    /// Borrow as a concrete type
    #[inline]
    pub fn downcast_ref<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.instance.downcast_ref::<T>()
    }

    /// Reference identity (ignores the descriptor)
    #[inline]
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.instance), Arc::as_ptr(&other.instance))
    }

    /// Whether the instance can be used where `type_name` is expected
    #[inline]
    pub fn is_assignable_to(&self, type_name: &str) -> bool {
        self.ty.is_assignable_to(type_name)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:p}", self.ty.name(), Arc::as_ptr(&self.instance))
    }
}

/// A runtime value: a literal, an object or a managed collection.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Object(ObjectRef),
    List(Vec<Value>),
    /// String-keyed dictionary, insertion ordered
    Map(Vec<(String, Value)>),
}

impl Value {
    /// Human readable name of the runtime type, used in diagnostics
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".into(),
            Value::Bool(_) => "bool".into(),
            Value::Int(_) => "int".into(),
            Value::Float(_) => "float".into(),
            Value::Str(_) => "string".into(),
            Value::Object(o) => o.type_name().to_string(),
            Value::List(_) => "list".into(),
            Value::Map(_) => "map".into(),
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Downcast an object value; `None` for null and non-objects
    pub fn object<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.as_object().and_then(ObjectRef::downcast::<T>)
    }

    /// Downcast an object value, failing with a type mismatch
    pub fn into_object<T: Send + Sync + 'static>(self) -> Result<Arc<T>> {
        let actual = self.type_name();
        self.object::<T>().ok_or_else(|| FactoryError::TypeMismatch {
            property: None,
            required: std::any::type_name::<T>().to_string(),
            actual,
            message: None,
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Value::Object(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

/// Number of named ancestors above a descriptor (0 for a root type)
pub(crate) fn ancestor_count(ty: &TypeDescriptor) -> i32 {
    let mut count = 0;
    let mut current = ty.base();
    while let Some(base) = current {
        count += 1;
        current = base.base();
    }
    count
}
