//! Declarative object definitions
//!
//! An [`ObjectDefinition`] is the recipe for one named component: which type
//! to build (or which factory method to call), with which constructor
//! arguments and property values, in which scope, and which lifecycle
//! callbacks to run.
//!
//! Scalar settings are optional so that a child definition can distinguish
//! "not specified" from "explicitly set" when it is merged over its parent.
//!
//! ```rust
//! use object_factory::{ConfigValue, ObjectDefinition, ObjectScope};
//!
//! let parent = ObjectDefinition::of_type_name("Repository")
//!     .with_property("Timeout", 30)
//!     .with_abstract(true);
//!
//! let child = ObjectDefinition::child_of("repoBase")
//!     .with_scope(ObjectScope::Prototype)
//!     .with_property("Name", "orders")
//!     .with_indexed_arg(0, ConfigValue::reference("dataSource"));
//!
//! assert!(parent.is_abstract());
//! assert!(child.is_prototype());
//! ```

use crate::types::{ParamType, TypeHandle};
use crate::value::{ObjectRef, Value};
use crate::{FactoryError, Result};
use once_cell::sync::OnceCell;
use std::collections::BTreeMap;
use std::ops::Deref;

// =============================================================================
// Modes
// =============================================================================

/// Lifetime of objects created from a definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ObjectScope {
    /// One shared instance per factory
    #[default]
    Singleton,
    /// A fresh instance for every request
    Prototype,
}

/// How collaborators are wired without explicit configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AutowireMode {
    #[default]
    No,
    /// Properties named after known objects
    ByName,
    /// Properties whose type has exactly one candidate
    ByType,
    /// The greediest satisfiable constructor
    Constructor,
    /// `Constructor` when there is no default constructor, else `ByType`
    AutoDetect,
}

/// Which unset writable properties are reported as errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DependencyCheck {
    #[default]
    None,
    /// Object-typed properties
    Objects,
    /// Primitive, string and simple collection properties
    Simple,
    All,
}

// =============================================================================
// Raw configuration values
// =============================================================================

/// Reference to another object by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectReference {
    pub name: String,
    /// Resolve against the parent factory only
    pub to_parent: bool,
}

impl ObjectReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            to_parent: false,
        }
    }

    pub fn parent(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            to_parent: true,
        }
    }
}

/// An anonymous or named definition nested in a value position
#[derive(Debug, Clone)]
pub struct InnerDefinition {
    pub name: Option<String>,
    pub definition: ObjectDefinition,
}

/// A configured, not yet resolved value.
#[derive(Debug, Clone)]
pub enum ConfigValue {
    /// Literal runtime value
    Value(Value),
    /// Runtime reference to another object
    Reference(ObjectReference),
    /// Object created from a nested definition
    Inner(Box<InnerDefinition>),
    /// Expression handed to the configured evaluator
    Expression(String),
    /// Managed list, resolved element by element
    List(Vec<ConfigValue>),
    /// Managed string-keyed map, resolved value by value
    Map(Vec<(String, ConfigValue)>),
}

impl ConfigValue {
    pub fn reference(name: impl Into<String>) -> Self {
        ConfigValue::Reference(ObjectReference::new(name))
    }

    pub fn parent_reference(name: impl Into<String>) -> Self {
        ConfigValue::Reference(ObjectReference::parent(name))
    }

    pub fn inner(definition: ObjectDefinition) -> Self {
        ConfigValue::Inner(Box::new(InnerDefinition {
            name: None,
            definition,
        }))
    }

    pub fn named_inner(name: impl Into<String>, definition: ObjectDefinition) -> Self {
        ConfigValue::Inner(Box::new(InnerDefinition {
            name: Some(name.into()),
            definition,
        }))
    }

    pub fn expression(expression: impl Into<String>) -> Self {
        ConfigValue::Expression(expression.into())
    }

    pub fn list(items: impl IntoIterator<Item = ConfigValue>) -> Self {
        ConfigValue::List(items.into_iter().collect())
    }

    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, ConfigValue)>) -> Self {
        ConfigValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// The literal value, if this is one
    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            ConfigValue::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl From<Value> for ConfigValue {
    fn from(v: Value) -> Self {
        ConfigValue::Value(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::Value(Value::from(v))
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        ConfigValue::Value(Value::from(v))
    }
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        ConfigValue::Value(Value::Int(v))
    }
}

impl From<i32> for ConfigValue {
    fn from(v: i32) -> Self {
        ConfigValue::Value(Value::from(v))
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        ConfigValue::Value(Value::Float(v))
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Value(Value::Bool(v))
    }
}

impl From<ObjectRef> for ConfigValue {
    fn from(v: ObjectRef) -> Self {
        ConfigValue::Value(Value::Object(v))
    }
}

impl From<ObjectReference> for ConfigValue {
    fn from(v: ObjectReference) -> Self {
        ConfigValue::Reference(v)
    }
}

impl From<ObjectDefinition> for ConfigValue {
    fn from(v: ObjectDefinition) -> Self {
        ConfigValue::inner(v)
    }
}

// =============================================================================
// Constructor arguments
// =============================================================================

/// One argument value with an optional declared type
#[derive(Debug, Clone)]
pub struct ArgumentHolder<V> {
    pub value: V,
    pub declared_type: Option<ParamType>,
}

impl<V> ArgumentHolder<V> {
    pub fn new(value: V) -> Self {
        Self {
            value,
            declared_type: None,
        }
    }

    pub fn typed(value: V, ty: ParamType) -> Self {
        Self {
            value,
            declared_type: Some(ty),
        }
    }
}

/// Identifies a holder inside an [`ArgumentValues`] set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgumentSlot {
    Indexed(usize),
    Named(usize),
    Generic(usize),
}

/// Indexed, named and generic argument holders.
#[derive(Debug, Clone)]
pub struct ArgumentValues<V> {
    indexed: BTreeMap<usize, ArgumentHolder<V>>,
    named: Vec<(String, ArgumentHolder<V>)>,
    generic: Vec<ArgumentHolder<V>>,
}

/// Configured constructor arguments of a definition
pub type ConstructorArguments = ArgumentValues<ConfigValue>;

/// Constructor arguments after value resolution
pub type ResolvedArguments = ArgumentValues<Value>;

impl<V> Default for ArgumentValues<V> {
    fn default() -> Self {
        Self {
            indexed: BTreeMap::new(),
            named: Vec::new(),
            generic: Vec::new(),
        }
    }
}

impl<V: Clone> ArgumentValues<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_indexed(&mut self, index: usize, holder: ArgumentHolder<V>) {
        self.indexed.insert(index, holder);
    }

    /// Replaces an existing argument of the same name
    pub fn add_named(&mut self, name: impl Into<String>, holder: ArgumentHolder<V>) {
        let name = name.into();
        match self.named.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = holder,
            None => self.named.push((name, holder)),
        }
    }

    pub fn add_generic(&mut self, holder: ArgumentHolder<V>) {
        self.generic.push(holder);
    }

    pub fn indexed(&self) -> impl Iterator<Item = (usize, &ArgumentHolder<V>)> {
        self.indexed.iter().map(|(i, h)| (*i, h))
    }

    pub fn named(&self) -> impl Iterator<Item = (&str, &ArgumentHolder<V>)> {
        self.named.iter().map(|(n, h)| (n.as_str(), h))
    }

    pub fn generic(&self) -> &[ArgumentHolder<V>] {
        &self.generic
    }

    pub fn count(&self) -> usize {
        self.indexed.len() + self.named.len() + self.generic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Fewest parameters a constructor needs to take all arguments
    pub fn min_required(&self) -> usize {
        let highest = self.indexed.keys().next_back().map_or(0, |i| i + 1);
        self.count().max(highest)
    }

    /// Merge `other` over `self`: same index or name replaces, generic appends
    pub fn merge_from(&mut self, other: &ArgumentValues<V>) {
        for (i, h) in &other.indexed {
            self.indexed.insert(*i, h.clone());
        }
        for (n, h) in &other.named {
            self.add_named(n.clone(), h.clone());
        }
        self.generic.extend(other.generic.iter().cloned());
    }

    /// Map every holder value, keeping slots and declared types
    pub fn try_map<U, F>(&self, mut f: F) -> Result<ArgumentValues<U>>
    where
        F: FnMut(ArgumentSlot, Option<&str>, &V) -> Result<U>,
    {
        let mut out = ArgumentValues::<U>::default();
        for (i, h) in &self.indexed {
            out.indexed.insert(
                *i,
                ArgumentHolder {
                    value: f(ArgumentSlot::Indexed(*i), None, &h.value)?,
                    declared_type: h.declared_type.clone(),
                },
            );
        }
        for (pos, (n, h)) in self.named.iter().enumerate() {
            out.named.push((
                n.clone(),
                ArgumentHolder {
                    value: f(ArgumentSlot::Named(pos), Some(n), &h.value)?,
                    declared_type: h.declared_type.clone(),
                },
            ));
        }
        for (pos, h) in self.generic.iter().enumerate() {
            out.generic.push(ArgumentHolder {
                value: f(ArgumentSlot::Generic(pos), None, &h.value)?,
                declared_type: h.declared_type.clone(),
            });
        }
        Ok(out)
    }
}

impl ResolvedArguments {
    /// Find the holder for a parameter: by name, then position, then an
    /// unused generic holder whose declared type or value fits.
    pub fn find(
        &self,
        index: usize,
        name: &str,
        ty: &ParamType,
        used: &[ArgumentSlot],
    ) -> Option<(ArgumentSlot, &ArgumentHolder<Value>)> {
        let type_fits = |h: &ArgumentHolder<Value>| h.declared_type.as_ref().is_none_or(|t| t == ty);

        let named = self.named.iter().enumerate().find(|(pos, (n, h))| {
            n.eq_ignore_ascii_case(name)
                && type_fits(h)
                && !used.contains(&ArgumentSlot::Named(*pos))
        });
        if let Some((pos, (_, h))) = named {
            return Some((ArgumentSlot::Named(pos), h));
        }

        if let Some(h) = self.indexed.get(&index) {
            if type_fits(h) && !used.contains(&ArgumentSlot::Indexed(index)) {
                return Some((ArgumentSlot::Indexed(index), h));
            }
        }

        self.generic
            .iter()
            .enumerate()
            .find(|(pos, h)| {
                !used.contains(&ArgumentSlot::Generic(*pos))
                    && match &h.declared_type {
                        Some(t) => t == ty,
                        None => !h.value.is_null() && ty.accepts(&h.value),
                    }
            })
            .map(|(pos, h)| (ArgumentSlot::Generic(pos), h))
    }

    /// The next unused generic holder, regardless of type
    pub fn next_generic(&self, used: &[ArgumentSlot]) -> Option<(ArgumentSlot, &ArgumentHolder<Value>)> {
        self.generic
            .iter()
            .enumerate()
            .find(|(pos, _)| !used.contains(&ArgumentSlot::Generic(*pos)))
            .map(|(pos, h)| (ArgumentSlot::Generic(pos), h))
    }
}

// =============================================================================
// Property values and event handlers
// =============================================================================

/// One configured property assignment
#[derive(Debug, Clone)]
pub struct PropertyValue {
    pub name: String,
    pub value: ConfigValue,
}

/// Ordered property assignments; adding a name twice replaces the first.
#[derive(Debug, Clone, Default)]
pub struct PropertyValues {
    values: Vec<PropertyValue>,
}

impl PropertyValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<ConfigValue>) {
        let name = name.into();
        let value = value.into();
        match self.values.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.value = value,
            None => self.values.push(PropertyValue { name, value }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ConfigValue> {
        self.values.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.iter().any(|p| p.name == name)
    }

    pub fn remove(&mut self, name: &str) -> Option<ConfigValue> {
        let pos = self.values.iter().position(|p| p.name == name)?;
        Some(self.values.remove(pos).value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyValue> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn merge_from(&mut self, other: &PropertyValues) {
        for p in &other.values {
            self.add(p.name.clone(), p.value.clone());
        }
    }
}

impl IntoIterator for PropertyValues {
    type Item = PropertyValue;
    type IntoIter = std::vec::IntoIter<PropertyValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

/// Subscribe the configured object's `method_name` to `event_name` on `source`
#[derive(Debug, Clone)]
pub struct EventHandlerValue {
    pub source: ConfigValue,
    pub event_name: String,
    pub method_name: String,
}

// =============================================================================
// ObjectDefinition
// =============================================================================

/// The type a definition instantiates
#[derive(Debug, Clone)]
pub enum TypeRef {
    Handle(TypeHandle),
    /// Resolved lazily against the factory's type registry
    Name(String),
}

impl TypeRef {
    pub fn name(&self) -> &str {
        match self {
            TypeRef::Handle(t) => t.name(),
            TypeRef::Name(n) => n,
        }
    }
}

/// Declarative recipe for one named object.
#[derive(Debug, Clone, Default)]
pub struct ObjectDefinition {
    object_type: Option<TypeRef>,
    parent_name: Option<String>,
    scope: Option<ObjectScope>,
    lazy_init: Option<bool>,
    autowire_mode: Option<AutowireMode>,
    dependency_check: Option<DependencyCheck>,
    init_method: Option<String>,
    destroy_method: Option<String>,
    factory_object: Option<String>,
    factory_method: Option<String>,
    primary: Option<bool>,
    autowire_candidate: Option<bool>,
    resource_description: Option<String>,
    is_abstract: bool,
    constructor_args: ConstructorArguments,
    properties: PropertyValues,
    event_handlers: Vec<EventHandlerValue>,
    depends_on: Vec<String>,
    qualifiers: Vec<String>,
}

impl ObjectDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// A definition instantiating a described type
    pub fn of_type(ty: &TypeHandle) -> Self {
        Self {
            object_type: Some(TypeRef::Handle(ty.clone())),
            ..Self::default()
        }
    }

    /// A definition naming its type, resolved when first needed
    pub fn of_type_name(name: impl Into<String>) -> Self {
        Self {
            object_type: Some(TypeRef::Name(name.into())),
            ..Self::default()
        }
    }

    /// A child definition inheriting from `parent`
    pub fn child_of(parent: impl Into<String>) -> Self {
        Self {
            parent_name: Some(parent.into()),
            ..Self::default()
        }
    }

    // -------------------------------------------------------------------------
    // Builder
    // -------------------------------------------------------------------------

    pub fn with_type(mut self, ty: &TypeHandle) -> Self {
        self.object_type = Some(TypeRef::Handle(ty.clone()));
        self
    }

    pub fn with_type_name(mut self, name: impl Into<String>) -> Self {
        self.object_type = Some(TypeRef::Name(name.into()));
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_name = Some(parent.into());
        self
    }

    pub fn with_scope(mut self, scope: ObjectScope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn with_lazy_init(mut self, lazy: bool) -> Self {
        self.lazy_init = Some(lazy);
        self
    }

    pub fn with_autowire(mut self, mode: AutowireMode) -> Self {
        self.autowire_mode = Some(mode);
        self
    }

    pub fn with_dependency_check(mut self, check: DependencyCheck) -> Self {
        self.dependency_check = Some(check);
        self
    }

    pub fn with_init_method(mut self, method: impl Into<String>) -> Self {
        self.init_method = Some(method.into());
        self
    }

    pub fn with_destroy_method(mut self, method: impl Into<String>) -> Self {
        self.destroy_method = Some(method.into());
        self
    }

    /// Create through an instance method of another object
    pub fn with_factory_object(mut self, object: impl Into<String>, method: impl Into<String>) -> Self {
        self.factory_object = Some(object.into());
        self.factory_method = Some(method.into());
        self
    }

    /// Create through a static method of the definition's own type
    pub fn with_factory_method(mut self, method: impl Into<String>) -> Self {
        self.factory_method = Some(method.into());
        self
    }

    pub fn with_primary(mut self, primary: bool) -> Self {
        self.primary = Some(primary);
        self
    }

    pub fn with_autowire_candidate(mut self, candidate: bool) -> Self {
        self.autowire_candidate = Some(candidate);
        self
    }

    pub fn with_resource(mut self, description: impl Into<String>) -> Self {
        self.resource_description = Some(description.into());
        self
    }

    pub fn with_abstract(mut self, is_abstract: bool) -> Self {
        self.is_abstract = is_abstract;
        self
    }

    pub fn with_indexed_arg(mut self, index: usize, value: impl Into<ConfigValue>) -> Self {
        self.constructor_args
            .add_indexed(index, ArgumentHolder::new(value.into()));
        self
    }

    pub fn with_typed_arg(mut self, index: usize, value: impl Into<ConfigValue>, ty: ParamType) -> Self {
        self.constructor_args
            .add_indexed(index, ArgumentHolder::typed(value.into(), ty));
        self
    }

    pub fn with_named_arg(mut self, name: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.constructor_args
            .add_named(name, ArgumentHolder::new(value.into()));
        self
    }

    pub fn with_generic_arg(mut self, value: impl Into<ConfigValue>) -> Self {
        self.constructor_args
            .add_generic(ArgumentHolder::new(value.into()));
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.properties.add(name, value);
        self
    }

    pub fn with_event_handler(
        mut self,
        source: impl Into<ConfigValue>,
        event_name: impl Into<String>,
        method_name: impl Into<String>,
    ) -> Self {
        self.event_handlers.push(EventHandlerValue {
            source: source.into(),
            event_name: event_name.into(),
            method_name: method_name.into(),
        });
        self
    }

    pub fn with_depends_on(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.depends_on.contains(&name) {
            self.depends_on.push(name);
        }
        self
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        let qualifier = qualifier.into();
        if !self.qualifiers.contains(&qualifier) {
            self.qualifiers.push(qualifier);
        }
        self
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    #[inline]
    pub fn object_type(&self) -> Option<&TypeRef> {
        self.object_type.as_ref()
    }

    #[inline]
    pub fn type_name(&self) -> Option<&str> {
        self.object_type.as_ref().map(TypeRef::name)
    }

    #[inline]
    pub fn parent_name(&self) -> Option<&str> {
        self.parent_name.as_deref()
    }

    #[inline]
    pub fn scope(&self) -> ObjectScope {
        self.scope.unwrap_or_default()
    }

    #[inline]
    pub fn is_singleton(&self) -> bool {
        self.scope() == ObjectScope::Singleton
    }

    #[inline]
    pub fn is_prototype(&self) -> bool {
        self.scope() == ObjectScope::Prototype
    }

    #[inline]
    pub fn is_lazy_init(&self) -> bool {
        self.lazy_init.unwrap_or(false)
    }

    #[inline]
    pub fn autowire_mode(&self) -> AutowireMode {
        self.autowire_mode.unwrap_or_default()
    }

    #[inline]
    pub fn dependency_check(&self) -> DependencyCheck {
        self.dependency_check.unwrap_or_default()
    }

    #[inline]
    pub fn init_method(&self) -> Option<&str> {
        self.init_method.as_deref()
    }

    #[inline]
    pub fn destroy_method(&self) -> Option<&str> {
        self.destroy_method.as_deref()
    }

    #[inline]
    pub fn factory_object_name(&self) -> Option<&str> {
        self.factory_object.as_deref()
    }

    #[inline]
    pub fn factory_method_name(&self) -> Option<&str> {
        self.factory_method.as_deref()
    }

    #[inline]
    pub fn is_primary(&self) -> bool {
        self.primary.unwrap_or(false)
    }

    #[inline]
    pub fn is_autowire_candidate(&self) -> bool {
        self.autowire_candidate.unwrap_or(true)
    }

    #[inline]
    pub fn resource_description(&self) -> Option<&str> {
        self.resource_description.as_deref()
    }

    #[inline]
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    #[inline]
    pub fn constructor_args(&self) -> &ConstructorArguments {
        &self.constructor_args
    }

    #[inline]
    pub fn properties(&self) -> &PropertyValues {
        &self.properties
    }

    #[inline]
    pub fn event_handlers(&self) -> &[EventHandlerValue] {
        &self.event_handlers
    }

    #[inline]
    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    #[inline]
    pub fn qualifiers(&self) -> &[String] {
        &self.qualifiers
    }

    pub fn has_qualifier(&self, qualifier: &str) -> bool {
        self.qualifiers.iter().any(|q| q == qualifier)
    }

    #[inline]
    pub fn has_constructor_args(&self) -> bool {
        !self.constructor_args.is_empty()
    }

    pub(crate) fn set_scope(&mut self, scope: ObjectScope) {
        self.scope = Some(scope);
    }

    pub(crate) fn clear_parent(&mut self) {
        self.parent_name = None;
    }

    // -------------------------------------------------------------------------
    // Validation and merging
    // -------------------------------------------------------------------------

    /// Structural checks performed at registration time
    pub fn validate(&self, name: &str) -> Result<()> {
        let invalid = |message: &str| {
            Err(FactoryError::DefinitionValidation {
                name: name.to_string(),
                message: message.to_string(),
            })
        };

        if self.is_lazy_init() && self.is_prototype() {
            return invalid("lazy initialization is only applicable to singleton objects");
        }
        if self.factory_object.is_some() && self.factory_method.is_none() {
            return invalid("a factory object requires a factory method name");
        }
        if !self.is_abstract
            && self.object_type.is_none()
            && self.parent_name.is_none()
            && self.factory_method.is_none()
        {
            return invalid("either a type, a parent definition or a factory method is required");
        }
        Ok(())
    }

    /// Apply `child` over this (parent) definition
    pub fn override_from(&mut self, child: &ObjectDefinition) {
        fn take<T: Clone>(target: &mut Option<T>, source: &Option<T>) {
            if source.is_some() {
                target.clone_from(source);
            }
        }
        fn take_str(target: &mut Option<String>, source: &Option<String>) {
            if source.as_ref().is_some_and(|s| !s.is_empty()) {
                target.clone_from(source);
            }
        }

        take(&mut self.object_type, &child.object_type);
        self.parent_name.clone_from(&child.parent_name);
        take(&mut self.scope, &child.scope);
        take(&mut self.lazy_init, &child.lazy_init);
        take(&mut self.autowire_mode, &child.autowire_mode);
        take(&mut self.dependency_check, &child.dependency_check);
        take_str(&mut self.init_method, &child.init_method);
        take_str(&mut self.destroy_method, &child.destroy_method);
        take_str(&mut self.factory_object, &child.factory_object);
        take_str(&mut self.factory_method, &child.factory_method);
        take(&mut self.primary, &child.primary);
        take(&mut self.autowire_candidate, &child.autowire_candidate);
        take_str(&mut self.resource_description, &child.resource_description);
        self.is_abstract = child.is_abstract;

        self.constructor_args.merge_from(&child.constructor_args);
        self.properties.merge_from(&child.properties);
        for handler in &child.event_handlers {
            match self.event_handlers.iter_mut().find(|h| {
                h.event_name == handler.event_name && h.method_name == handler.method_name
            }) {
                Some(existing) => *existing = handler.clone(),
                None => self.event_handlers.push(handler.clone()),
            }
        }
        for dep in &child.depends_on {
            if !self.depends_on.contains(dep) {
                self.depends_on.push(dep.clone());
            }
        }
        for q in &child.qualifiers {
            if !self.qualifiers.contains(q) {
                self.qualifiers.push(q.clone());
            }
        }
    }
}

// =============================================================================
// RootObjectDefinition
// =============================================================================

/// A definition flattened against its parent chain, ready for creation.
#[derive(Debug)]
pub struct RootObjectDefinition {
    definition: ObjectDefinition,
    resolved_type: OnceCell<TypeHandle>,
}

impl RootObjectDefinition {
    pub(crate) fn new(mut definition: ObjectDefinition) -> Self {
        definition.clear_parent();
        let resolved_type = OnceCell::new();
        if let Some(TypeRef::Handle(ty)) = definition.object_type() {
            let _ = resolved_type.set(ty.clone());
        }
        Self {
            definition,
            resolved_type,
        }
    }

    /// The flattened definition
    #[inline]
    pub fn definition(&self) -> &ObjectDefinition {
        &self.definition
    }

    /// The type, once resolved
    #[inline]
    pub fn resolved_type(&self) -> Option<&TypeHandle> {
        self.resolved_type.get()
    }

    /// Resolve the declared type, caching the result
    pub(crate) fn resolve_type<F>(&self, lookup: F) -> Result<Option<TypeHandle>>
    where
        F: FnOnce(&str) -> Result<TypeHandle>,
    {
        match self.definition.object_type() {
            None => Ok(None),
            Some(TypeRef::Handle(ty)) => Ok(Some(ty.clone())),
            Some(TypeRef::Name(name)) => self
                .resolved_type
                .get_or_try_init(|| lookup(name))
                .map(|t| Some(t.clone())),
        }
    }

    /// Effective autowire mode for a type: `AutoDetect` picks constructor
    /// injection only when no default constructor exists
    pub fn resolved_autowire_mode(&self, ty: Option<&TypeHandle>) -> AutowireMode {
        match self.definition.autowire_mode() {
            AutowireMode::AutoDetect => match ty {
                Some(t) if t.default_constructor().is_none() => AutowireMode::Constructor,
                _ => AutowireMode::ByType,
            },
            mode => mode,
        }
    }
}

impl Deref for RootObjectDefinition {
    type Target = ObjectDefinition;

    fn deref(&self) -> &ObjectDefinition {
        &self.definition
    }
}
