//! Singleton cache, creation state and ordered destruction
//!
//! Per name the registry moves through
//! `uncreated → in creation (→ eagerly cached) → cached → destroyed`.
//!
//! Creation of one name is serialized by a re-entrant per-name lock: other
//! threads block until the instance is cached, while the creating thread may
//! re-enter (for circular references) and sees the eagerly cached raw
//! instance instead. Threads entering a circular graph from opposite ends
//! wait on each other's locks; see [`ObjectFactory::get_object`].
//!
//! [`ObjectFactory::get_object`]: crate::ObjectFactory::get_object

use crate::context::CreationContext;
use crate::lifecycle::DisposableAdapter;
use crate::value::ObjectRef;
use crate::{FactoryError, Result};
use ahash::RandomState;
use dashmap::{DashMap, DashSet};
use parking_lot::{Mutex, ReentrantMutex};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

pub(crate) struct SingletonRegistry {
    completed: DashMap<String, ObjectRef, RandomState>,
    /// Registration order of completed singletons
    order: Mutex<Vec<String>>,
    /// Raw instances exposed before population
    early: DashMap<String, ObjectRef, RandomState>,
    early_accessed: DashSet<String, RandomState>,
    in_creation: DashSet<String, RandomState>,
    locks: DashMap<String, Arc<ReentrantMutex<()>>, RandomState>,
    disposables: Mutex<Vec<DisposableAdapter>>,
    /// name → names of objects depending on it
    dependents: DashMap<String, Vec<String>, RandomState>,
    /// name → names it depends on
    dependencies: DashMap<String, Vec<String>, RandomState>,
    /// containing object → inner objects destroyed with it
    contained: DashMap<String, Vec<String>, RandomState>,
    destroying: AtomicBool,
}

/// Clears creation state for a name on every exit path
struct CreationGuard<'a> {
    registry: &'a SingletonRegistry,
    name: &'a str,
}

impl Drop for CreationGuard<'_> {
    fn drop(&mut self) {
        self.registry.in_creation.remove(self.name);
        self.registry.early.remove(self.name);
        self.registry.early_accessed.remove(self.name);
    }
}

impl SingletonRegistry {
    pub(crate) fn new() -> Self {
        Self {
            completed: DashMap::with_hasher(RandomState::new()),
            order: Mutex::new(Vec::new()),
            early: DashMap::with_hasher(RandomState::new()),
            early_accessed: DashSet::with_hasher(RandomState::new()),
            in_creation: DashSet::with_hasher(RandomState::new()),
            locks: DashMap::with_hasher(RandomState::new()),
            disposables: Mutex::new(Vec::new()),
            dependents: DashMap::with_hasher(RandomState::new()),
            dependencies: DashMap::with_hasher(RandomState::new()),
            contained: DashMap::with_hasher(RandomState::new()),
            destroying: AtomicBool::new(false),
        }
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// The cached singleton, or the eagerly cached raw instance when
    /// `allow_early` is set
    pub(crate) fn get(&self, name: &str, allow_early: bool) -> Option<ObjectRef> {
        if let Some(obj) = self.completed.get(name) {
            #[cfg(feature = "logging")]
            trace!(target: "object_factory", object = name, "Singleton cache hit");

            return Some(obj.clone());
        }
        if allow_early {
            if let Some(obj) = self.early.get(name) {
                self.early_accessed.insert(name.to_string());

                #[cfg(feature = "logging")]
                debug!(target: "object_factory", object = name, "Returning eagerly cached instance of singleton that is not fully initialized yet");

                return Some(obj.clone());
            }
        }
        None
    }

    #[inline]
    pub(crate) fn contains(&self, name: &str) -> bool {
        self.completed.contains_key(name)
    }

    #[inline]
    pub(crate) fn is_in_creation(&self, name: &str) -> bool {
        self.in_creation.contains(name)
    }

    /// Names of completed singletons in registration order
    pub(crate) fn names(&self) -> Vec<String> {
        self.order.lock().clone()
    }

    #[inline]
    pub(crate) fn count(&self) -> usize {
        self.completed.len()
    }

    // =========================================================================
    // Creation
    // =========================================================================

    fn lock_for(&self, name: &str) -> Arc<ReentrantMutex<()>> {
        self.locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(ReentrantMutex::new(())))
            .clone()
    }

    /// Return the cached singleton or run `create` under the name's lock.
    ///
    /// `create` may call [`add_early`](Self::add_early) once the raw
    /// instance exists. Whatever happens inside, the in-creation mark and
    /// any early entry are gone when this returns, and a failed creation
    /// takes down every singleton that received its early instance.
    pub(crate) fn get_or_create<F>(&self, name: &str, ctx: &mut CreationContext, create: F) -> Result<ObjectRef>
    where
        F: FnOnce(&mut CreationContext) -> Result<ObjectRef>,
    {
        if let Some(obj) = self.get(name, ctx.is_singleton_in_creation(name)) {
            return Ok(obj);
        }

        let lock = self.lock_for(name);
        let _held = lock.lock();

        if let Some(obj) = self.completed.get(name) {
            return Ok(obj.clone());
        }
        if self.destroying.load(Ordering::Acquire) {
            return Err(FactoryError::DestructionInProgress {
                name: name.to_string(),
            });
        }
        if !self.in_creation.insert(name.to_string()) {
            return Err(FactoryError::CurrentlyInCreation {
                name: name.to_string(),
            });
        }
        let _guard = CreationGuard {
            registry: self,
            name,
        };

        #[cfg(feature = "logging")]
        debug!(target: "object_factory", object = name, depth = ctx.depth(), "Creating shared instance of singleton");

        ctx.enter_singleton(name);
        let result = create(ctx);
        ctx.exit_singleton(name);

        let obj = match result {
            Ok(obj) => obj,
            Err(e) => {
                if self.was_early_accessed(name) {
                    self.discard_early_dependents(name);
                }
                return Err(e);
            }
        };
        self.add_completed(name, obj.clone());
        Ok(obj)
    }

    /// Destroy the singletons that took the raw instance of a failed creation
    fn discard_early_dependents(&self, name: &str) {
        let Some((_, dependents)) = self.dependents.remove(name) else {
            return;
        };

        #[cfg(feature = "logging")]
        debug!(target: "object_factory", object = name, dependents = ?dependents, "Discarding singletons holding a failed raw instance");

        for dependent in dependents {
            self.destroy(&dependent);
        }
    }

    fn add_completed(&self, name: &str, obj: ObjectRef) {
        let mut order = self.order.lock();
        if self.completed.insert(name.to_string(), obj).is_none() {
            order.push(name.to_string());
        }
    }

    /// Expose a raw instance to re-entrant lookups from the creating request
    pub(crate) fn add_early(&self, name: &str, obj: ObjectRef) {
        #[cfg(feature = "logging")]
        debug!(target: "object_factory", object = name, "Eagerly caching object to allow for resolving potential circular references");

        self.early.insert(name.to_string(), obj);
    }

    /// Whether the early instance was handed out to another object
    #[inline]
    pub(crate) fn was_early_accessed(&self, name: &str) -> bool {
        self.early_accessed.contains(name)
    }

    /// Register a fully configured external instance
    pub(crate) fn register(&self, name: &str, obj: ObjectRef) -> Result<()> {
        let mut order = self.order.lock();
        if self.completed.contains_key(name) {
            return Err(FactoryError::DefinitionStore {
                name: name.to_string(),
                resource: None,
                message: "there is already a singleton bound under this name".into(),
            });
        }
        self.completed.insert(name.to_string(), obj);
        order.push(name.to_string());
        Ok(())
    }

    // =========================================================================
    // Dependency graph
    // =========================================================================

    pub(crate) fn register_disposable(&self, adapter: DisposableAdapter) {
        self.disposables.lock().push(adapter);
    }

    /// Record that `dependent` depends on `name`
    pub(crate) fn register_dependent(&self, name: &str, dependent: &str) {
        {
            let mut list = self.dependents.entry(name.to_string()).or_default();
            if !list.iter().any(|d| d == dependent) {
                list.push(dependent.to_string());
            }
        }
        let mut list = self.dependencies.entry(dependent.to_string()).or_default();
        if !list.iter().any(|d| d == name) {
            list.push(name.to_string());
        }
    }

    /// Destroy `inner` together with `containing`
    pub(crate) fn register_contained(&self, containing: &str, inner: &str) {
        let mut list = self.contained.entry(containing.to_string()).or_default();
        if !list.iter().any(|d| d == inner) {
            list.push(inner.to_string());
        }
        drop(list);
        self.register_dependent(inner, containing);
    }

    pub(crate) fn dependents_of(&self, name: &str) -> Vec<String> {
        self.dependents
            .get(name)
            .map(|l| l.value().clone())
            .unwrap_or_default()
    }

    pub(crate) fn dependencies_of(&self, name: &str) -> Vec<String> {
        self.dependencies
            .get(name)
            .map(|l| l.value().clone())
            .unwrap_or_default()
    }

    /// Whether `dependent` depends on `name`, directly or transitively
    pub(crate) fn is_dependent(&self, name: &str, dependent: &str) -> bool {
        let mut seen = HashSet::new();
        let mut frontier = vec![name.to_string()];
        while let Some(current) = frontier.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            for d in self.dependents_of(&current) {
                if d == dependent {
                    return true;
                }
                frontier.push(d);
            }
        }
        false
    }

    // =========================================================================
    // Destruction
    // =========================================================================

    /// Destroy every singleton in reverse registration order
    pub(crate) fn destroy_all(&self) {
        self.destroying.store(true, Ordering::Release);

        #[cfg(feature = "logging")]
        debug!(target: "object_factory", count = self.count(), "Destroying singletons");

        let names: Vec<String> = self
            .disposables
            .lock()
            .iter()
            .map(|a| a.name().to_string())
            .collect();
        for name in names.iter().rev() {
            self.destroy(name);
        }

        self.contained.clear();
        self.dependents.clear();
        self.dependencies.clear();
        self.completed.clear();
        self.early.clear();
        self.early_accessed.clear();
        self.order.lock().clear();
        self.disposables.lock().clear();

        self.destroying.store(false, Ordering::Release);
    }

    /// Evict and destroy one singleton, its dependents first
    pub(crate) fn destroy(&self, name: &str) {
        self.completed.remove(name);
        self.early.remove(name);
        self.order.lock().retain(|n| n != name);

        let adapter = {
            let mut disposables = self.disposables.lock();
            disposables
                .iter()
                .position(|a| a.name() == name)
                .map(|pos| disposables.remove(pos))
        };
        self.destroy_object(name, adapter);
    }

    fn destroy_object(&self, name: &str, adapter: Option<DisposableAdapter>) {
        if let Some((_, dependents)) = self.dependents.remove(name) {
            for dependent in dependents {
                self.destroy(&dependent);
            }
        }

        if let Some(adapter) = adapter {
            adapter.destroy();
        }

        if let Some((_, inner)) = self.contained.remove(name) {
            for inner_name in inner {
                self.destroy(&inner_name);
            }
        }

        for mut entry in self.dependents.iter_mut() {
            entry.value_mut().retain(|d| d != name);
        }
        self.dependencies.remove(name);
    }
}

impl fmt::Debug for SingletonRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingletonRegistry")
            .field("singletons", &self.completed.len())
            .field("in_creation", &self.in_creation.len())
            .field("disposables", &self.disposables.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ObjectDefinition;
    use crate::lifecycle::Disposable;
    use crate::types::TypeBuilder;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    struct Tracked {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Disposable for Tracked {
        fn dispose(&self) -> Result<()> {
            self.log.lock().push(self.name);
            Ok(())
        }
    }

    fn tracked(registry: &SingletonRegistry, name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) {
        let ty = TypeBuilder::<Tracked>::new("Tracked").disposable().build();
        let obj = ObjectRef::new(
            Tracked {
                name,
                log: Arc::clone(log),
            },
            ty.clone(),
        );
        registry.register(name, obj.clone()).unwrap();
        let adapter = DisposableAdapter::for_object(name, &obj, &ObjectDefinition::of_type(&ty), &[])
            .unwrap()
            .unwrap();
        registry.register_disposable(adapter);
    }

    struct Unit;

    fn unit() -> ObjectRef {
        ObjectRef::new(Unit, TypeBuilder::<Unit>::new("Unit").build())
    }

    #[test]
    fn test_get_or_create_caches() {
        let registry = SingletonRegistry::new();
        let mut ctx = CreationContext::new();
        let calls = AtomicUsize::new(0);

        let a = registry
            .get_or_create("a", &mut ctx, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(unit())
            })
            .unwrap();
        let b = registry.get_or_create("a", &mut ctx, |_| Ok(unit())).unwrap();

        assert!(a.ptr_eq(&b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!registry.is_in_creation("a"));
    }

    #[test]
    fn test_failure_clears_state() {
        let registry = SingletonRegistry::new();
        let mut ctx = CreationContext::new();

        let result = registry.get_or_create("a", &mut ctx, |_| {
            registry.add_early("a", unit());
            Err(FactoryError::invocation("ctor", "boom"))
        });

        assert!(result.is_err());
        assert!(!registry.is_in_creation("a"));
        assert!(registry.get("a", true).is_none());
    }

    #[test]
    fn test_reentry_sees_early_or_fails() {
        let registry = SingletonRegistry::new();
        let mut ctx = CreationContext::new();

        let err = registry
            .get_or_create("a", &mut ctx, |ctx| {
                registry.get_or_create("a", ctx, |_| Ok(unit()))
            })
            .unwrap_err();
        assert!(matches!(err, FactoryError::CurrentlyInCreation { .. }));

        let raw = unit();
        let seen = registry
            .get_or_create("b", &mut ctx, |ctx| {
                registry.add_early("b", raw.clone());
                let inner = registry.get_or_create("b", ctx, |_| Ok(unit()))?;
                assert!(registry.was_early_accessed("b"));
                Ok(inner)
            })
            .unwrap();
        assert!(seen.ptr_eq(&raw));
    }

    #[test]
    fn test_concurrent_creation_is_serialized() {
        let registry = Arc::new(SingletonRegistry::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let calls = Arc::clone(&calls);
                thread::spawn(move || {
                    let mut ctx = CreationContext::new();
                    registry
                        .get_or_create("shared", &mut ctx, |_| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(std::time::Duration::from_millis(5));
                            Ok(unit())
                        })
                        .unwrap()
                })
            })
            .collect();

        let objects: Vec<ObjectRef> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(objects.windows(2).all(|w| w[0].ptr_eq(&w[1])));
    }

    #[test]
    fn test_destroy_reverse_order_dependents_first() {
        let registry = SingletonRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        tracked(&registry, "db", &log);
        tracked(&registry, "repo", &log);
        tracked(&registry, "cache", &log);
        // db depends on cache, so it goes before cache
        registry.register_dependent("cache", "db");

        registry.destroy_all();

        assert_eq!(*log.lock(), ["db", "cache", "repo"]);
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_is_dependent_transitive() {
        let registry = SingletonRegistry::new();
        registry.register_dependent("a", "b");
        registry.register_dependent("b", "c");
        assert!(registry.is_dependent("a", "c"));
        assert!(!registry.is_dependent("c", "a"));
        assert_eq!(registry.dependencies_of("c"), ["b"]);
    }

    #[test]
    fn test_failed_creation_discards_early_dependents() {
        let registry = SingletonRegistry::new();
        let mut ctx = CreationContext::new();

        let result = registry.get_or_create("a", &mut ctx, |ctx| {
            registry.add_early("a", unit());
            registry.get_or_create("b", ctx, |ctx| {
                let raw = registry.get_or_create("a", ctx, |_| Ok(unit()))?;
                registry.register_dependent("a", "b");
                Ok(raw)
            })?;
            Err(FactoryError::invocation("init", "boom"))
        });

        assert!(result.is_err());
        assert!(!registry.contains("b"));
        assert!(registry.names().is_empty());
        assert!(registry.dependents_of("a").is_empty());
    }
}
