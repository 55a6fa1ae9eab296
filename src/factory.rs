//! The object factory
//!
//! [`ObjectFactory`] glues the registry, the merged-definition cache, the
//! constructor resolver, the populator and the singleton registry together.
//! Every public lookup creates a fresh [`CreationContext`] and threads it
//! through the recursive resolution of dependencies.

use crate::autowire::OBJECT_FACTORY_TYPE;
use crate::config::{FactoryConfig, ObjectFactoryBuilder};
use crate::constructor::ConstructorResolver;
use crate::context::CreationContext;
use crate::convert::TypeConverter;
use crate::definition::{
    AutowireMode, DependencyCheck, ObjectDefinition, ObjectScope, RootObjectDefinition,
};
use crate::instantiation::InstantiationStrategy;
use crate::lifecycle::DisposableAdapter;
use crate::merge::MergedDefinitions;
use crate::post_processor::ObjectPostProcessor;
use crate::registry::{DefinitionRegistry, Registration};
use crate::resolver::ExpressionEvaluator;
use crate::singleton::SingletonRegistry;
use crate::types::{Arguments, ConstructorInfo, TypeBuilder, TypeHandle, TypeRegistry};
use crate::value::{ObjectRef, Value};
use crate::{FactoryError, Result};
use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;

#[cfg(feature = "logging")]
use tracing::{debug, error, trace};

/// Prefix that asks for a factory object itself rather than its product
pub const FACTORY_OBJECT_PREFIX: char = '&';

pub(crate) struct FactoryInner {
    pub(crate) config: FactoryConfig,
    pub(crate) types: TypeRegistry,
    pub(crate) registry: DefinitionRegistry,
    pub(crate) merged: MergedDefinitions,
    pub(crate) singletons: SingletonRegistry,
    pub(crate) post_processors: RwLock<Vec<Arc<dyn ObjectPostProcessor>>>,
    /// Objects injectable by type without a definition, keyed by type name
    pub(crate) resolvable: DashMap<String, ObjectRef, RandomState>,
    pub(crate) converter: Arc<dyn TypeConverter>,
    pub(crate) instantiation: Arc<dyn InstantiationStrategy>,
    pub(crate) evaluator: Option<Arc<dyn ExpressionEvaluator>>,
    pub(crate) parent: Option<ObjectFactory>,
    /// Sequence for anonymous inner object names
    pub(crate) inner_counter: AtomicUsize,
    /// Cached products of singleton factory objects
    pub(crate) factory_products: DashMap<String, ObjectRef, RandomState>,
    self_type: TypeHandle,
}

/// Inversion-of-control container creating and wiring objects from
/// declarative definitions.
///
/// Cloning is cheap and yields a handle to the same factory.
///
/// # Examples
///
/// ```rust
/// use object_factory::{ConfigValue, ObjectDefinition, ObjectFactory, ParamType, TypeBuilder};
/// use parking_lot::Mutex;
/// use std::sync::Arc;
///
/// struct Repo;
/// #[derive(Default)]
/// struct Service {
///     repo: Mutex<Option<Arc<Repo>>>,
/// }
///
/// let factory = ObjectFactory::new();
/// factory.register_type(TypeBuilder::<Repo>::new("Repo").default_constructor(|| Repo).build());
/// factory.register_type(
///     TypeBuilder::<Service>::new("Service")
///         .default_constructor(Service::default)
///         .property("Repo", ParamType::object("Repo"), |s, v| {
///             *s.repo.lock() = Some(v.into_object::<Repo>()?);
///             Ok(())
///         })
///         .build(),
/// );
///
/// factory.register_definition("repo", ObjectDefinition::of_type_name("Repo")).unwrap();
/// factory
///     .register_definition(
///         "service",
///         ObjectDefinition::of_type_name("Service").with_property("Repo", ConfigValue::reference("repo")),
///     )
///     .unwrap();
///
/// let service = factory.get_object_as::<Service>("service").unwrap();
/// let repo = factory.get_object_as::<Repo>("repo").unwrap();
/// assert!(Arc::ptr_eq(service.repo.lock().as_ref().unwrap(), &repo));
/// ```
#[derive(Clone)]
pub struct ObjectFactory {
    pub(crate) inner: Arc<FactoryInner>,
}

impl Default for ObjectFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectFactory {
    /// Create a root factory with the default configuration
    pub fn new() -> Self {
        ObjectFactoryBuilder::new().build()
    }

    pub fn builder() -> ObjectFactoryBuilder {
        ObjectFactoryBuilder::new()
    }

    pub(crate) fn from_parts(
        config: FactoryConfig,
        converter: Arc<dyn TypeConverter>,
        instantiation: Arc<dyn InstantiationStrategy>,
        evaluator: Option<Arc<dyn ExpressionEvaluator>>,
        parent: Option<ObjectFactory>,
    ) -> Self {
        #[cfg(feature = "logging")]
        debug!(
            target: "object_factory",
            has_parent = parent.is_some(),
            case_sensitive = config.case_sensitive,
            "Creating new object factory"
        );

        let registry = DefinitionRegistry::new(config.case_sensitive);
        Self {
            inner: Arc::new(FactoryInner {
                config,
                types: TypeRegistry::new(),
                registry,
                merged: MergedDefinitions::new(),
                singletons: SingletonRegistry::new(),
                post_processors: RwLock::new(Vec::new()),
                resolvable: DashMap::with_hasher(RandomState::new()),
                converter,
                instantiation,
                evaluator,
                parent,
                inner_counter: AtomicUsize::new(0),
                factory_products: DashMap::with_hasher(RandomState::new()),
                self_type: TypeBuilder::<ObjectFactory>::new(OBJECT_FACTORY_TYPE).build(),
            }),
        }
    }

    /// Create a child factory that falls back to this one for unknown names.
    ///
    /// The child shares this factory's configuration and collaborators.
    pub fn child(&self) -> ObjectFactory {
        let mut builder = ObjectFactoryBuilder::new()
            .config(self.inner.config.clone())
            .type_converter(self.inner.converter.clone())
            .instantiation_strategy(self.inner.instantiation.clone())
            .parent(self.clone());
        if let Some(evaluator) = &self.inner.evaluator {
            builder = builder.expression_evaluator(evaluator.clone());
        }
        builder.build()
    }

    #[inline]
    pub fn parent(&self) -> Option<&ObjectFactory> {
        self.inner.parent.as_ref()
    }

    #[inline]
    pub fn config(&self) -> &FactoryConfig {
        &self.inner.config
    }

    /// This factory as an injectable object
    pub(crate) fn self_reference(&self) -> ObjectRef {
        ObjectRef::new(self.clone(), self.inner.self_type.clone())
    }

    // =========================================================================
    // Types
    // =========================================================================

    /// Make a type resolvable by name in definitions
    pub fn register_type(&self, ty: TypeHandle) {
        #[cfg(feature = "logging")]
        trace!(target: "object_factory", type_name = ty.name(), "Registered type descriptor");

        self.inner.types.register(ty);
    }

    /// Find a registered type here or in an ancestor factory
    pub fn lookup_type(&self, name: &str) -> Option<TypeHandle> {
        self.inner
            .types
            .get(name)
            .or_else(|| self.inner.parent.as_ref().and_then(|p| p.lookup_type(name)))
    }

    pub(crate) fn resolve_type(&self, name: &str, root: &RootObjectDefinition) -> Result<Option<TypeHandle>> {
        root.resolve_type(|type_name| {
            self.lookup_type(type_name)
                .ok_or_else(|| FactoryError::CannotLoadType {
                    name: name.to_string(),
                    type_name: type_name.to_string(),
                })
        })
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register (or, when allowed, replace) the definition for `name`.
    ///
    /// Replacing a definition discards cached state of the name and of every
    /// definition inheriting from it.
    pub fn register_definition(&self, name: &str, definition: ObjectDefinition) -> Result<()> {
        let _mutation = self.inner.merged.mutation.lock();
        let registration = self.inner.registry.register(
            name,
            definition,
            self.inner.config.allow_definition_overriding,
        )?;
        let canonical = self.inner.registry.canonical_name(name);
        match registration {
            Registration::Replaced => self.reset_definition(&canonical),
            Registration::New if self.inner.singletons.contains(&canonical) => {
                self.reset_definition(&canonical)
            }
            Registration::New => {}
        }
        Ok(())
    }

    /// Unregister the definition for `name` and discard its cached state
    pub fn remove_definition(&self, name: &str) -> Result<()> {
        let _mutation = self.inner.merged.mutation.lock();
        let canonical = self.transformed_name(name);
        if self.inner.registry.remove(&canonical).is_none() {
            return Err(FactoryError::no_such_definition(canonical));
        }
        self.reset_definition(&canonical);
        Ok(())
    }

    /// The raw definition registered under `name` (or one of its aliases)
    pub fn definition(&self, name: &str) -> Option<Arc<ObjectDefinition>> {
        self.inner.registry.get(&self.transformed_name(name))
    }

    /// Definition names in registration order
    pub fn definition_names(&self) -> Vec<String> {
        self.inner.registry.names()
    }

    #[inline]
    pub fn definition_count(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn register_alias(&self, name: &str, alias: &str) -> Result<()> {
        self.inner.registry.register_alias(name, alias)
    }

    /// Other names for the object: the canonical name when `name` is an
    /// alias, and every alias except `name` itself
    pub fn get_aliases(&self, name: &str) -> Vec<String> {
        let requested = name.trim_start_matches(FACTORY_OBJECT_PREFIX);
        let canonical = self.transformed_name(name);
        let mut aliases = self.inner.registry.aliases_of(&canonical);
        let same = |a: &str, b: &str| {
            if self.inner.config.case_sensitive {
                a == b
            } else {
                a.eq_ignore_ascii_case(b)
            }
        };
        if !same(&canonical, requested) {
            aliases.retain(|a| !same(a, requested));
            aliases.insert(0, canonical);
        }
        aliases
    }

    /// Register an externally created, fully configured singleton
    pub fn register_singleton(&self, name: &str, object: ObjectRef) -> Result<()> {
        let canonical = self.transformed_name(name);
        self.inner.singletons.register(&canonical, object)?;

        #[cfg(feature = "logging")]
        debug!(target: "object_factory", object = %canonical, "Registered singleton instance");

        Ok(())
    }

    /// Add a post-processor; re-adding the same one moves it to the end
    pub fn add_post_processor(&self, processor: Arc<dyn ObjectPostProcessor>) {
        let mut processors = self.inner.post_processors.write();
        processors.retain(|p| !Arc::ptr_eq(p, &processor));
        processors.push(processor);
    }

    #[inline]
    pub fn post_processor_count(&self) -> usize {
        self.inner.post_processors.read().len()
    }

    pub(crate) fn post_processors(&self) -> Vec<Arc<dyn ObjectPostProcessor>> {
        self.inner.post_processors.read().clone()
    }

    // =========================================================================
    // Retrieval
    // =========================================================================

    /// The object registered under `name`, creating it if needed.
    ///
    /// `&name` returns a factory object itself instead of its product.
    ///
    /// # Deadlocks
    ///
    /// Creating a singleton holds a per-name lock until the object and every
    /// singleton it pulls in are cached. Two threads entering a circular
    /// singleton graph from opposite ends (one asking for `a`, which needs
    /// `b`, while the other asks for `b`, which needs `a`) block each other
    /// forever. Create such graphs from a single thread first, for example
    /// through [`pre_instantiate_singletons`](Self::pre_instantiate_singletons).
    pub fn get_object(&self, name: &str) -> Result<ObjectRef> {
        let mut ctx = CreationContext::new();
        self.do_get_object(name, None, None, &mut ctx)
    }

    /// The object under `name`, downcast to `T`
    pub fn get_object_as<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>> {
        let object = self.get_object(name)?;
        object
            .downcast::<T>()
            .ok_or_else(|| FactoryError::NotOfRequiredType {
                name: name.to_string(),
                required: std::any::type_name::<T>().to_string(),
                actual: object.type_name().to_string(),
            })
    }

    /// The object under `name`, which must be assignable to `type_name`
    pub fn get_object_of_required_type(&self, name: &str, type_name: &str) -> Result<ObjectRef> {
        let mut ctx = CreationContext::new();
        self.do_get_object(name, Some(type_name), None, &mut ctx)
    }

    /// Create a prototype with explicit constructor or factory-method
    /// arguments, replacing the configured ones
    pub fn get_object_with_args(&self, name: &str, args: &[Value]) -> Result<ObjectRef> {
        let mut ctx = CreationContext::new();
        self.do_get_object(name, None, Some(args), &mut ctx)
    }

    /// A fresh instance built from the definition of `name`, without
    /// property injection or initialization and never cached
    pub fn create_object(&self, name: &str, args: Option<&[Value]>) -> Result<ObjectRef> {
        let canonical = self.transformed_name(name);
        if !self.inner.registry.contains(&canonical) {
            return match &self.inner.parent {
                Some(parent) => parent.create_object(name, args),
                None => Err(FactoryError::no_such_definition(canonical)),
            };
        }
        let root = self.merged_definition(&canonical)?;
        if root.is_abstract() {
            return Err(FactoryError::ObjectIsAbstract { name: canonical });
        }
        let mut ctx = CreationContext::new();
        let ty = self.resolve_type(&canonical, &root)?;
        self.create_instance(&canonical, &root, ty.as_ref(), args.filter(|a| !a.is_empty()), &mut ctx)
    }

    /// Inject properties into an existing object and initialize it per the
    /// definition of `name`, or per its own type when `name` is unknown
    pub fn configure_object(&self, object: ObjectRef, name: &str) -> Result<ObjectRef> {
        let canonical = self.transformed_name(name);
        let root = if self.inner.registry.contains(&canonical) {
            self.merged_definition(&canonical)?
        } else {
            Arc::new(RootObjectDefinition::new(
                ObjectDefinition::of_type(object.type_handle()).with_scope(ObjectScope::Prototype),
            ))
        };
        let mut ctx = CreationContext::new();
        self.populate_object(&canonical, &root, &object, &mut ctx)?;
        self.initialize_object(&canonical, &root, object)
    }

    /// Autowire the properties of an existing object by name or by type
    pub fn autowire_object(&self, object: &ObjectRef, mode: AutowireMode, check: DependencyCheck) -> Result<()> {
        if matches!(mode, AutowireMode::Constructor) {
            return Err(FactoryError::DefinitionValidation {
                name: object.type_name().to_string(),
                message: "constructor autowiring is not applicable to an existing object".into(),
            });
        }
        let root = RootObjectDefinition::new(
            ObjectDefinition::of_type(object.type_handle())
                .with_scope(ObjectScope::Prototype)
                .with_autowire(mode)
                .with_dependency_check(check),
        );
        let mut ctx = CreationContext::new();
        self.populate_object(object.type_name(), &root, object, &mut ctx)
    }

    /// Whether a definition or singleton exists for `name` here or in an
    /// ancestor
    pub fn contains_object(&self, name: &str) -> bool {
        self.contains_local_object(name)
            || self
                .inner
                .parent
                .as_ref()
                .is_some_and(|p| p.contains_object(name))
    }

    pub fn contains_local_object(&self, name: &str) -> bool {
        let canonical = self.transformed_name(name);
        self.inner.singletons.contains(&canonical) || self.inner.registry.contains(&canonical)
    }

    pub fn is_singleton(&self, name: &str) -> Result<bool> {
        let deref = name.starts_with(FACTORY_OBJECT_PREFIX);
        let canonical = self.transformed_name(name);

        if let Some(object) = self.inner.singletons.get(&canonical, false) {
            let ty = object.type_handle();
            return Ok(match ty.as_factory_object(object.instance()) {
                Some(fo) if !deref => fo.is_singleton(),
                _ => true,
            });
        }
        if self.inner.registry.contains(&canonical) {
            return Ok(self.merged_definition(&canonical)?.is_singleton());
        }
        match &self.inner.parent {
            Some(parent) => parent.is_singleton(name),
            None => Err(FactoryError::no_such_definition(canonical)),
        }
    }

    pub fn is_prototype(&self, name: &str) -> Result<bool> {
        let deref = name.starts_with(FACTORY_OBJECT_PREFIX);
        let canonical = self.transformed_name(name);

        if self.inner.registry.contains(&canonical) {
            let root = self.merged_definition(&canonical)?;
            if root.is_prototype() {
                return Ok(true);
            }
            if deref {
                return Ok(false);
            }
            return Ok(self.inner.singletons.get(&canonical, false).is_some_and(|object| {
                object
                    .type_handle()
                    .as_factory_object(object.instance())
                    .is_some_and(|fo| !fo.is_singleton())
            }));
        }
        if self.inner.singletons.contains(&canonical) {
            return Ok(false);
        }
        match &self.inner.parent {
            Some(parent) => parent.is_prototype(name),
            None => Err(FactoryError::no_such_definition(canonical)),
        }
    }

    /// Whether the singleton under `name` is being created right now
    pub fn is_currently_in_creation(&self, name: &str) -> bool {
        self.inner.singletons.is_in_creation(&self.transformed_name(name))
    }

    /// Names of cached singletons in registration order
    pub fn singleton_names(&self) -> Vec<String> {
        self.inner.singletons.names()
    }

    #[inline]
    pub fn singleton_count(&self) -> usize {
        self.inner.singletons.count()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Create every non-abstract, non-lazy singleton.
    ///
    /// On failure every singleton created so far is destroyed before the
    /// error is returned.
    pub fn pre_instantiate_singletons(&self) -> Result<()> {
        #[cfg(feature = "logging")]
        debug!(target: "object_factory", definitions = self.definition_count(), "Pre-instantiating singletons");

        for name in self.inner.registry.names() {
            if let Err(e) = self.pre_instantiate(&name) {
                #[cfg(feature = "logging")]
                error!(target: "object_factory", object = %name, error = %e, "Pre-instantiation failed, destroying singletons");

                self.destroy_singletons();
                return Err(e);
            }
        }
        Ok(())
    }

    fn pre_instantiate(&self, name: &str) -> Result<()> {
        let root = self.merged_definition(name)?;
        if root.is_abstract() || !root.is_singleton() || root.is_lazy_init() {
            return Ok(());
        }
        let is_factory_object = self
            .predict_type(name, &root)
            .ok()
            .flatten()
            .is_some_and(|ty| ty.is_factory_object());
        if is_factory_object {
            self.get_object(&format!("{FACTORY_OBJECT_PREFIX}{name}"))?;
        } else {
            self.get_object(name)?;
        }
        Ok(())
    }

    /// Destroy every singleton, dependents before their dependencies
    pub fn destroy_singletons(&self) {
        self.inner.singletons.destroy_all();
        self.inner.factory_products.clear();
        self.inner.merged.clear();
    }

    /// Destroy one singleton and everything depending on it
    pub fn destroy_singleton(&self, name: &str) {
        let canonical = self.transformed_name(name);
        self.inner.singletons.destroy(&canonical);
        self.inner.factory_products.remove(&canonical);
    }

    /// Release every singleton; the factory stays usable
    pub fn dispose(&self) {
        self.destroy_singletons();
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Strip the factory-object prefix and resolve aliases
    pub(crate) fn transformed_name(&self, name: &str) -> String {
        self.inner
            .registry
            .canonical_name(name.trim_start_matches(FACTORY_OBJECT_PREFIX))
    }

    #[inline]
    pub(crate) fn register_dependent(&self, name: &str, dependent: &str) {
        self.inner.singletons.register_dependent(name, dependent);
    }

    pub(crate) fn do_get_object(
        &self,
        name: &str,
        required_type: Option<&str>,
        args: Option<&[Value]>,
        ctx: &mut CreationContext,
    ) -> Result<ObjectRef> {
        let canonical = self.transformed_name(name);
        let args = args.filter(|a| !a.is_empty());

        if args.is_none() {
            let allow_early = ctx.is_singleton_in_creation(&canonical);
            if let Some(shared) = self.inner.singletons.get(&canonical, allow_early) {
                let object = self.object_for_instance(shared, name, &canonical)?;
                return check_required_type(name, object, required_type);
            }
        }

        if ctx.is_prototype_in_creation(&canonical) {
            return Err(FactoryError::CurrentlyInCreation { name: canonical });
        }

        if !self.inner.registry.contains(&canonical) {
            return match &self.inner.parent {
                Some(parent) => parent.do_get_object(name, required_type, args, &mut CreationContext::new()),
                None => Err(FactoryError::no_such_definition(canonical)),
            };
        }

        self.inner.merged.mark_created(&canonical);
        let root = self.merged_definition(&canonical)?;
        if root.is_abstract() {
            return Err(FactoryError::ObjectIsAbstract { name: canonical });
        }
        if args.is_some() && root.is_singleton() {
            return Err(FactoryError::DefinitionStore {
                name: canonical,
                resource: root.resource_description().map(str::to_string),
                message: "cannot specify explicit arguments when referring to a singleton object definition".into(),
            });
        }

        for dependency in root.depends_on() {
            let dependency_name = self.transformed_name(dependency);
            if self.inner.singletons.is_dependent(&canonical, &dependency_name) {
                return Err(FactoryError::DefinitionStore {
                    name: canonical,
                    resource: root.resource_description().map(str::to_string),
                    message: format!("circular depends-on relationship with '{dependency_name}'"),
                });
            }
            self.register_dependent(&dependency_name, &canonical);
            self.do_get_object(dependency, None, None, ctx).map_err(|e| {
                FactoryError::creation_caused_by(
                    canonical.as_str(),
                    root.resource_description(),
                    format!("failed to initialize dependency '{dependency}'"),
                    e,
                )
            })?;
        }

        let instance = if root.is_singleton() {
            self.inner.singletons.get_or_create(&canonical, ctx, |ctx| {
                self.create_object_internal(&canonical, &root, None, ctx)
            })?
        } else {
            ctx.begin_prototype(&canonical)?;
            let created = self.create_object_internal(&canonical, &root, args, ctx);
            ctx.end_prototype(&canonical);
            created?
        };

        let object = self.object_for_instance(instance, name, &canonical)?;
        check_required_type(name, object, required_type)
    }

    /// Create, populate and initialize one object from its merged definition
    pub(crate) fn create_object_internal(
        &self,
        name: &str,
        root: &RootObjectDefinition,
        args: Option<&[Value]>,
        ctx: &mut CreationContext,
    ) -> Result<ObjectRef> {
        #[cfg(feature = "logging")]
        debug!(target: "object_factory", object = name, scope = ?root.scope(), depth = ctx.depth(), "Creating instance of object");

        let ty = self.resolve_type(name, root)?;

        if let Some(ty) = &ty {
            if let Some(short_circuit) = self.apply_before_instantiation(ty, name)? {
                return self.apply_after_initialization(short_circuit, name);
            }
        }

        let raw = self.create_instance(name, root, ty.as_ref(), args, ctx)?;

        let early_exposed = root.is_singleton()
            && self.inner.config.allow_circular_references
            && self.inner.singletons.is_in_creation(name);
        if early_exposed {
            self.inner.singletons.add_early(name, raw.clone());
        }

        let exposed = match self.populate_and_initialize(name, root, &raw, ctx) {
            Ok(exposed) => exposed,
            Err(e) if e.object_name() == Some(name) => return Err(e),
            Err(e) => {
                return Err(FactoryError::creation_caused_by(
                    name,
                    root.resource_description(),
                    "initialization of object failed",
                    e,
                ));
            }
        };

        if early_exposed && self.inner.singletons.was_early_accessed(name) && !exposed.ptr_eq(&raw) {
            return Err(FactoryError::creation(
                name,
                root.resource_description(),
                "object has been injected into other objects in its raw version as part of a circular reference, but has eventually been wrapped",
            ));
        }

        if root.is_singleton() {
            let adapter = DisposableAdapter::for_object(name, &raw, root.definition(), &self.post_processors())
                .map_err(|e| {
                    FactoryError::creation_caused_by(name, root.resource_description(), "invalid destruction signature", e)
                })?;
            if let Some(adapter) = adapter {
                self.inner.singletons.register_disposable(adapter);
            }
        }

        Ok(exposed)
    }

    fn populate_and_initialize(
        &self,
        name: &str,
        root: &RootObjectDefinition,
        raw: &ObjectRef,
        ctx: &mut CreationContext,
    ) -> Result<ObjectRef> {
        self.populate_object(name, root, raw, ctx)?;
        self.initialize_object(name, root, raw.clone())
    }

    /// Raw instance through a factory method, a resolved constructor or the
    /// default constructor
    pub(crate) fn create_instance(
        &self,
        name: &str,
        root: &RootObjectDefinition,
        ty: Option<&TypeHandle>,
        args: Option<&[Value]>,
        ctx: &mut CreationContext,
    ) -> Result<ObjectRef> {
        let resolver = ConstructorResolver::new(self);
        if root.factory_method_name().is_some() {
            return resolver.instantiate_using_factory_method(name, root, args, ctx);
        }

        let ty = ty.ok_or_else(|| FactoryError::DefinitionStore {
            name: name.to_string(),
            resource: root.resource_description().map(str::to_string),
            message: "no type specified and no factory method to call".into(),
        })?;

        let chosen = self.determine_constructors(ty, name)?;
        if chosen.is_some()
            || root.resolved_autowire_mode(Some(ty)) == AutowireMode::Constructor
            || root.has_constructor_args()
            || args.is_some()
        {
            return resolver.autowire_constructor(name, root, ty, chosen, args, ctx);
        }
        self.inner.instantiation.instantiate(root, name, ty)
    }

    fn determine_constructors(&self, ty: &TypeHandle, name: &str) -> Result<Option<Vec<ConstructorInfo>>> {
        for pp in self.post_processors() {
            if let Some(constructors) = pp.determine_candidate_constructors(ty, name)? {
                return Ok(Some(constructors));
            }
        }
        Ok(None)
    }

    fn apply_before_instantiation(&self, ty: &TypeHandle, name: &str) -> Result<Option<ObjectRef>> {
        for pp in self.post_processors() {
            if let Some(object) = pp.before_instantiation(ty, name)? {
                #[cfg(feature = "logging")]
                debug!(target: "object_factory", object = name, "Instantiation short-circuited by post-processor");

                return Ok(Some(object));
            }
        }
        Ok(None)
    }

    fn apply_after_initialization(&self, mut object: ObjectRef, name: &str) -> Result<ObjectRef> {
        for pp in self.post_processors() {
            object = pp.after_initialization(object, name)?;
        }
        Ok(object)
    }

    /// Lifecycle callbacks, post-processors and the init method
    pub(crate) fn initialize_object(
        &self,
        name: &str,
        root: &RootObjectDefinition,
        object: ObjectRef,
    ) -> Result<ObjectRef> {
        {
            let ty = object.type_handle();
            if let Some(aware) = ty.as_name_aware(object.instance()) {
                aware.set_object_name(name);
            }
            if let Some(aware) = ty.as_factory_aware(object.instance()) {
                aware.set_object_factory(self)?;
            }
        }

        let mut current = object;
        for pp in self.post_processors() {
            current = pp.before_initialization(current, name)?;
        }

        let ty = current.type_handle().clone();
        if let Some(initializing) = ty.as_initializing(current.instance()) {
            #[cfg(feature = "logging")]
            trace!(target: "object_factory", object = name, "Invoking after_properties_set");

            initializing.after_properties_set().map_err(|e| {
                FactoryError::creation_caused_by(name, root.resource_description(), "after_properties_set failed", e)
            })?;
        }

        if let Some(method_name) = root.init_method() {
            let method = ty
                .methods()
                .iter()
                .find(|m| !m.is_static() && m.params().is_empty() && m.name().eq_ignore_ascii_case(method_name))
                .ok_or_else(|| {
                    FactoryError::creation(
                        name,
                        root.resource_description(),
                        format!("could not find an initialization method named '{method_name}' on type '{}'", ty.name()),
                    )
                })?;

            #[cfg(feature = "logging")]
            trace!(target: "object_factory", object = name, method = method_name, "Invoking init method");

            method
                .invoke(Some(current.instance()), &[], &Arguments::default())
                .map_err(|e| {
                    FactoryError::creation_caused_by(
                        name,
                        root.resource_description(),
                        format!("init method '{method_name}' failed"),
                        e,
                    )
                })?;
        }

        self.apply_after_initialization(current, name)
    }

    /// Resolve a factory object to its product unless `&name` was requested
    pub(crate) fn object_for_instance(&self, instance: ObjectRef, name: &str, canonical: &str) -> Result<ObjectRef> {
        let ty = instance.type_handle().clone();
        if name.starts_with(FACTORY_OBJECT_PREFIX) {
            if !ty.is_factory_object() {
                return Err(FactoryError::NotOfRequiredType {
                    name: canonical.to_string(),
                    required: "FactoryObject".into(),
                    actual: ty.name().to_string(),
                });
            }
            return Ok(instance);
        }

        let Some(factory_object) = ty.as_factory_object(instance.instance()) else {
            return Ok(instance);
        };

        let shared = factory_object.is_singleton() && self.inner.singletons.contains(canonical);
        if shared {
            if let Some(product) = self.inner.factory_products.get(canonical) {
                return Ok(product.clone());
            }
        }

        let product = factory_object.get_object().map_err(|e| {
            FactoryError::creation_caused_by(canonical, None, "factory object threw an error on object creation", e)
        })?;
        let product = self.apply_after_initialization(product, canonical).map_err(|e| {
            FactoryError::creation_caused_by(
                canonical,
                None,
                "post-processing of the factory object's product failed",
                e,
            )
        })?;

        if shared {
            let cached = self
                .inner
                .factory_products
                .entry(canonical.to_string())
                .or_insert(product);
            return Ok(cached.value().clone());
        }
        Ok(product)
    }
}

fn check_required_type(name: &str, object: ObjectRef, required_type: Option<&str>) -> Result<ObjectRef> {
    match required_type {
        Some(required) if !object.is_assignable_to(required) => Err(FactoryError::NotOfRequiredType {
            name: name.to_string(),
            required: required.to_string(),
            actual: object.type_name().to_string(),
        }),
        _ => Ok(object),
    }
}

impl fmt::Debug for ObjectFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectFactory")
            .field("definitions", &self.inner.registry.len())
            .field("singletons", &self.inner.singletons.count())
            .field("post_processors", &self.post_processor_count())
            .field("has_parent", &self.inner.parent.is_some())
            .finish()
    }
}
