//! The main `Container` struct: registration, resolution and the hierarchy.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use tracing::{debug, trace};

use crate::error::{BoxError, ResolveError};
use crate::graph::{ActiveGraph, GraphId, ResolutionContext};
use crate::instance::Instance;
use crate::key::ServiceKey;
use crate::options::{ContainerBuilder, ContainerOptions};
use crate::registration::{factory_fn, FactoryFn, Registration, RegistrationHandle, RegistrationId, RegistrationTable};
use crate::resolver::Resolver;
use crate::scope::{ObjectScope, ScopeCache};

/// Mutable state of a container. Only reachable through the admission guard.
#[derive(Default)]
struct State {
  table: RegistrationTable,
  cache: ScopeCache,
}

pub(crate) struct Shared {
  options: ContainerOptions,
  parent: Option<Container>,
  // Reentrant so that factories and completion hooks running on the thread
  // that holds it can resolve from the same container again.
  state: ReentrantMutex<RefCell<State>>,
}

impl Shared {
  /// Releases everything cached for `graph` once its top-level resolution
  /// has finished.
  pub(crate) fn graph_resolution_completed(&self, graph: GraphId) {
    let guard = self.state.lock();
    let released = guard.borrow_mut().cache.graph_completed(graph);
    if !released.is_empty() {
      trace!(graph = %graph, released = released.len(), "released graph-scoped instances");
    }
    drop(released);
  }
}

/// A dependency-resolution container.
///
/// Services are registered against a [`ServiceKey`] with a factory and an
/// [`ObjectScope`], then resolved by key. Resolution builds an object graph:
/// factories and completion hooks resolve their own dependencies through the
/// [`Resolver`] they are handed, and instances published to a graph or
/// container scope are visible to every later resolution in that graph, which
/// is what lets mutually dependent services be wired together.
///
/// A container is safe to share across threads. Each container owns a
/// reentrant admission guard: the thread holding it may resolve from the same
/// container again without blocking, while other threads wait until its
/// resolution finishes. Keys missing locally are looked up in the parent
/// chain; locks are only ever requested from child to parent.
///
/// `Container` is a cheap handle; clones refer to the same registrations.
#[derive(Clone)]
pub struct Container {
  shared: Arc<Shared>,
}

impl Default for Container {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for Container {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Container")
      .field("options", &self.shared.options)
      .field("has_parent", &self.shared.parent.is_some())
      .finish_non_exhaustive()
  }
}

impl Container {
  /// Creates a new, empty `Container` with default options.
  pub fn new() -> Self {
    Self::from_parts(ContainerOptions::default(), None)
  }

  pub fn builder() -> ContainerBuilder {
    ContainerBuilder::new()
  }

  /// Creates a child container that falls back to this one for keys it does
  /// not register itself. The child starts with this container's options.
  pub fn child(&self) -> Container {
    Self::from_parts(self.shared.options.clone(), Some(self.clone()))
  }

  pub(crate) fn from_parts(options: ContainerOptions, parent: Option<Container>) -> Self {
    Self {
      shared: Arc::new(Shared {
        options,
        parent,
        state: ReentrantMutex::new(RefCell::new(State::default())),
      }),
    }
  }

  pub fn parent(&self) -> Option<&Container> {
    self.shared.parent.as_ref()
  }

  pub fn options(&self) -> &ContainerOptions {
    &self.shared.options
  }

  /// Whether `other` is a handle to this same container.
  pub fn same_as(&self, other: &Container) -> bool {
    Arc::ptr_eq(&self.shared, &other.shared)
  }

  // --- PRIVATE HELPERS ---

  fn register_internal<T: ?Sized + Send + Sync + 'static>(
    &self,
    key: ServiceKey,
    scope: ObjectScope,
    factory: Arc<FactoryFn>,
  ) -> RegistrationHandle<'_, T> {
    let registration = Registration::new(key.clone(), scope, factory);
    let id = registration.id;
    let guard = self.shared.state.lock();
    let (replaced, discarded) = {
      let mut state = guard.borrow_mut();
      let replaced = state.table.register(registration);
      let discarded = replaced.as_ref().and_then(|old| state.cache.remove(old.id));
      (replaced, discarded)
    };
    if replaced.is_some() {
      debug!(service = %key, "replaced existing registration");
    }
    // Dropped outside the borrow: a service's `Drop` may call back into this container.
    drop(discarded);
    drop(guard);
    drop(replaced);
    RegistrationHandle::new(self, key, id)
  }

  fn register_value<T, F>(&self, key: ServiceKey, factory: F) -> RegistrationHandle<'_, T>
  where
    T: Send + Sync + 'static,
    F: Fn(&Resolver<'_>) -> Result<T, BoxError> + Send + Sync + 'static,
  {
    let erased = factory_fn(move |resolver| factory(resolver).map(|value| Instance::new(Arc::new(value))));
    self.register_internal(key, self.shared.options.default_scope, erased)
  }

  fn register_shared<I, F>(&self, key: ServiceKey, factory: F) -> RegistrationHandle<'_, I>
  where
    I: ?Sized + Send + Sync + 'static,
    F: Fn(&Resolver<'_>) -> Result<Arc<I>, BoxError> + Send + Sync + 'static,
  {
    let erased = factory_fn(move |resolver| factory(resolver).map(Instance::new));
    self.register_internal(key, self.shared.options.default_scope, erased)
  }

  /// Applies `update` to the registration `id` under `key`, if it is still
  /// registered. When `update` returns true the registration's cached
  /// instances are discarded.
  pub(crate) fn update_registration<F>(&self, key: &ServiceKey, id: RegistrationId, update: F)
  where
    F: FnOnce(&mut Registration) -> bool,
  {
    let guard = self.shared.state.lock();
    let discarded = {
      let mut state = guard.borrow_mut();
      let invalidate = match state.table.get_mut(key, id) {
        Some(registration) => update(registration),
        None => return,
      };
      if invalidate {
        state.cache.remove(id)
      } else {
        None
      }
    };
    drop(discarded);
  }

  // --- PUBLIC API ---

  // --- Registration ---

  /// Registers a factory for `T` in the container's default scope.
  pub fn register<T: Send + Sync + 'static>(
    &self,
    factory: impl Fn(&Resolver<'_>) -> T + Send + Sync + 'static,
  ) -> RegistrationHandle<'_, T> {
    self.register_value(ServiceKey::of::<T>(), move |resolver| Ok(factory(resolver)))
  }

  pub fn register_named<T: Send + Sync + 'static>(
    &self,
    name: &str,
    factory: impl Fn(&Resolver<'_>) -> T + Send + Sync + 'static,
  ) -> RegistrationHandle<'_, T> {
    self.register_value(ServiceKey::named::<T>(name), move |resolver| Ok(factory(resolver)))
  }

  /// Registers a factory for `T` that may fail. Its errors are reported as
  /// [`ResolveError::FactoryFailed`].
  pub fn try_register<T: Send + Sync + 'static>(
    &self,
    factory: impl Fn(&Resolver<'_>) -> Result<T, BoxError> + Send + Sync + 'static,
  ) -> RegistrationHandle<'_, T> {
    self.register_value(ServiceKey::of::<T>(), factory)
  }

  pub fn try_register_named<T: Send + Sync + 'static>(
    &self,
    name: &str,
    factory: impl Fn(&Resolver<'_>) -> Result<T, BoxError> + Send + Sync + 'static,
  ) -> RegistrationHandle<'_, T> {
    self.register_value(ServiceKey::named::<T>(name), factory)
  }

  /// Registers a factory for a trait object, resolved as `Arc<dyn Trait>`.
  pub fn register_trait<I: ?Sized + Send + Sync + 'static>(
    &self,
    factory: impl Fn(&Resolver<'_>) -> Arc<I> + Send + Sync + 'static,
  ) -> RegistrationHandle<'_, I> {
    self.register_shared(ServiceKey::of::<I>(), move |resolver| Ok(factory(resolver)))
  }

  pub fn register_trait_named<I: ?Sized + Send + Sync + 'static>(
    &self,
    name: &str,
    factory: impl Fn(&Resolver<'_>) -> Arc<I> + Send + Sync + 'static,
  ) -> RegistrationHandle<'_, I> {
    self.register_shared(ServiceKey::named::<I>(name), move |resolver| Ok(factory(resolver)))
  }

  pub fn try_register_trait<I: ?Sized + Send + Sync + 'static>(
    &self,
    factory: impl Fn(&Resolver<'_>) -> Result<Arc<I>, BoxError> + Send + Sync + 'static,
  ) -> RegistrationHandle<'_, I> {
    self.register_shared(ServiceKey::of::<I>(), factory)
  }

  /// Registers an already constructed value. It is shared for the lifetime
  /// of the container.
  pub fn add_instance<T: Send + Sync + 'static>(&self, instance: T) -> RegistrationHandle<'_, T> {
    let instance = Arc::new(instance);
    self
      .register_shared(ServiceKey::of::<T>(), move |_| Ok(Arc::clone(&instance)))
      .in_scope(ObjectScope::Container)
  }

  pub fn add_instance_named<T: Send + Sync + 'static>(&self, name: &str, instance: T) -> RegistrationHandle<'_, T> {
    let instance = Arc::new(instance);
    self
      .register_shared(ServiceKey::named::<T>(name), move |_| Ok(Arc::clone(&instance)))
      .in_scope(ObjectScope::Container)
  }

  // --- Resolution ---

  /// Resolves the unnamed registration for `T`.
  ///
  /// Called from outside any resolution this starts a new object graph;
  /// called from a factory or completion hook running on this thread it joins
  /// the graph in progress.
  pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveError> {
    self.resolve_key(&ServiceKey::of::<T>())
  }

  pub fn resolve_named<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, ResolveError> {
    self.resolve_key(&ServiceKey::named::<T>(name))
  }

  /// Resolves within an explicit object graph. Graph-scoped instances stay
  /// cached in `context` until it is dropped, so several calls with the same
  /// context observe the same instances.
  pub fn resolve_in<T: ?Sized + Send + Sync + 'static>(
    &self,
    context: &ResolutionContext,
    name: Option<&str>,
  ) -> Result<Arc<T>, ResolveError> {
    let _active = ActiveGraph::install(context);
    self.resolve_typed(context, &ServiceKey::for_type::<T>(name))
  }

  /// Resolves a service, returning `None` instead of an error.
  pub fn get<T: ?Sized + Send + Sync + 'static>(&self, name: Option<&str>) -> Option<Arc<T>> {
    match self.resolve_key(&ServiceKey::for_type::<T>(name)) {
      Ok(instance) => Some(instance),
      Err(error) => {
        debug!(%error, "resolution failed");
        None
      }
    }
  }

  fn resolve_key<T: ?Sized + Send + Sync + 'static>(&self, key: &ServiceKey) -> Result<Arc<T>, ResolveError> {
    let active = ActiveGraph::enter();
    self.resolve_typed(active.context(), key)
  }

  pub(crate) fn resolve_typed<T: ?Sized + Send + Sync + 'static>(
    &self,
    context: &ResolutionContext,
    key: &ServiceKey,
  ) -> Result<Arc<T>, ResolveError> {
    self
      .resolve_instance(context, key)?
      .downcast::<T>()
      .ok_or_else(|| ResolveError::TypeMismatch { key: key.clone() })
  }

  fn resolve_instance(&self, context: &ResolutionContext, key: &ServiceKey) -> Result<Instance, ResolveError> {
    let _depth = context.enter(key, self.shared.options.max_resolution_depth)?;

    let guard = self.shared.state.lock();
    let registration = guard.borrow().table.lookup(key);
    let Some(registration) = registration else {
      // Give up this container's guard before waiting on the parent's.
      drop(guard);
      return match &self.shared.parent {
        Some(parent) => parent.resolve_instance(context, key),
        None => {
          debug!(
            service = %key,
            available = ?self.registered_keys(),
            "no registration found"
          );
          Err(ResolveError::NotRegistered { key: key.clone() })
        }
      };
    };

    let graph = context.graph();
    context.join(&self.shared);

    let cached = guard.borrow_mut().cache.instance(&registration, graph);
    if let Some(instance) = cached {
      trace!(service = %key, graph = %graph, "reusing cached instance");
      return Ok(instance);
    }

    let resolver = Resolver::new(self, context);
    let instance = {
      let _constructing = context.begin_construction(registration.id, key)?;
      (registration.factory)(&resolver).map_err(|source| ResolveError::FactoryFailed {
        key: key.clone(),
        source,
      })?
    };

    // Published before any completion hook runs so that cycles reaching back
    // to this registration within the graph find it.
    guard
      .borrow_mut()
      .cache
      .store(&registration, &instance, graph);
    debug!(service = %key, graph = %graph, scope = ?registration.scope, "constructed instance");

    for hook in &registration.completions {
      if let Err(source) = hook(&resolver, &instance) {
        let evicted = guard.borrow_mut().cache.evict(&registration, graph);
        drop(evicted);
        return Err(ResolveError::CompletionFailed {
          key: key.clone(),
          source,
        });
      }
    }

    Ok(instance)
  }

  // --- Introspection & maintenance ---

  /// Whether `T` can be resolved from this container or one of its parents.
  pub fn has_registration<T: ?Sized + Any>(&self, name: Option<&str>) -> bool {
    let key = ServiceKey::for_type::<T>(name);
    let mut current = Some(self);
    while let Some(container) = current {
      if container.shared.state.lock().borrow().table.contains(&key) {
        return true;
      }
      current = container.parent();
    }
    false
  }

  /// The number of registrations held by this container, not counting parents.
  pub fn registration_count(&self) -> usize {
    self.shared.state.lock().borrow().table.len()
  }

  fn registered_keys(&self) -> Vec<String> {
    let guard = self.shared.state.lock();
    let state = guard.borrow();
    state.table.keys().map(ToString::to_string).collect()
  }

  /// Discards every cached instance of registrations in `scope`. The next
  /// resolution of those registrations constructs new instances.
  pub fn reset_object_scope(&self, scope: ObjectScope) {
    let guard = self.shared.state.lock();
    let discarded = guard.borrow_mut().cache.reset(scope);
    debug!(?scope, storages = discarded.len(), "reset object scope");
    drop(discarded);
  }

  /// Removes every registration and cached instance from this container.
  /// Parents are left untouched.
  pub fn remove_all(&self) {
    let guard = self.shared.state.lock();
    let (removed, discarded) = {
      let mut state = guard.borrow_mut();
      (state.table.clear(), state.cache.clear())
    };
    debug!(registrations = removed.len(), "removed all registrations");
    drop(discarded);
    drop(guard);
    drop(removed);
  }
}
