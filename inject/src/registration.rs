//! Registrations and the per-container registration table.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::container::Container;
use crate::error::{BoxError, ResolveError};
use crate::instance::Instance;
use crate::key::ServiceKey;
use crate::resolver::Resolver;
use crate::scope::ObjectScope;

pub(crate) type FactoryFn = dyn Fn(&Resolver<'_>) -> Result<Instance, BoxError> + Send + Sync;
pub(crate) type CompletionFn = dyn Fn(&Resolver<'_>, &Instance) -> Result<(), BoxError> + Send + Sync;

/// Erases a factory closure. Taking it through a bound keeps the closure
/// generic over the resolver's lifetime.
pub(crate) fn factory_fn<F>(factory: F) -> Arc<FactoryFn>
where
  F: Fn(&Resolver<'_>) -> Result<Instance, BoxError> + Send + Sync + 'static,
{
  Arc::new(factory)
}

fn completion_fn<F>(hook: F) -> Arc<CompletionFn>
where
  F: Fn(&Resolver<'_>, &Instance) -> Result<(), BoxError> + Send + Sync + 'static,
{
  Arc::new(hook)
}

static NEXT_REGISTRATION: AtomicU64 = AtomicU64::new(1);

/// Identity of a registration, stable for its lifetime and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct RegistrationId(u64);

impl RegistrationId {
  fn next() -> Self {
    Self(NEXT_REGISTRATION.fetch_add(1, Ordering::Relaxed))
  }

  #[cfg(test)]
  pub(crate) fn for_tests(raw: u64) -> Self {
    Self(raw)
  }
}

/// A factory bound to a key, with its scope and completion hooks.
#[derive(Clone)]
pub(crate) struct Registration {
  pub(crate) id: RegistrationId,
  pub(crate) key: ServiceKey,
  pub(crate) scope: ObjectScope,
  pub(crate) factory: Arc<FactoryFn>,
  pub(crate) completions: Vec<Arc<CompletionFn>>,
}

impl Registration {
  pub(crate) fn new(key: ServiceKey, scope: ObjectScope, factory: Arc<FactoryFn>) -> Self {
    Self {
      id: RegistrationId::next(),
      key,
      scope,
      factory,
      completions: Vec::new(),
    }
  }
}

impl fmt::Debug for Registration {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Registration")
      .field("id", &self.id)
      .field("key", &self.key)
      .field("scope", &self.scope)
      .field("completions", &self.completions.len())
      .finish_non_exhaustive()
  }
}

/// Maps keys to registrations. The last registration for a key wins.
#[derive(Default)]
pub(crate) struct RegistrationTable {
  entries: HashMap<ServiceKey, Arc<Registration>>,
}

impl RegistrationTable {
  /// Inserts `registration`, returning the one it replaced.
  pub(crate) fn register(&mut self, registration: Registration) -> Option<Arc<Registration>> {
    self
      .entries
      .insert(registration.key.clone(), Arc::new(registration))
  }

  pub(crate) fn lookup(&self, key: &ServiceKey) -> Option<Arc<Registration>> {
    self.entries.get(key).cloned()
  }

  /// Mutable access to the registration for `key`, provided it is still the
  /// registration identified by `id`.
  pub(crate) fn get_mut(&mut self, key: &ServiceKey, id: RegistrationId) -> Option<&mut Registration> {
    self
      .entries
      .get_mut(key)
      .filter(|registration| registration.id == id)
      .map(Arc::make_mut)
  }

  pub(crate) fn contains(&self, key: &ServiceKey) -> bool {
    self.entries.contains_key(key)
  }

  pub(crate) fn len(&self) -> usize {
    self.entries.len()
  }

  pub(crate) fn keys(&self) -> impl Iterator<Item = &ServiceKey> {
    self.entries.keys()
  }

  pub(crate) fn clear(&mut self) -> Vec<Arc<Registration>> {
    self.entries.drain().map(|(_, registration)| registration).collect()
  }
}

/// Returned by the registration methods of [`Container`] to finish configuring
/// a registration: its scope and the hooks that run once it is constructed.
///
/// Configure a registration before it is first resolved. Changing the scope of
/// a registration discards anything already cached for it.
pub struct RegistrationHandle<'c, T: ?Sized> {
  container: &'c Container,
  key: ServiceKey,
  id: RegistrationId,
  _service: PhantomData<fn() -> Arc<T>>,
}

impl<'c, T: ?Sized + Send + Sync + 'static> RegistrationHandle<'c, T> {
  pub(crate) fn new(container: &'c Container, key: ServiceKey, id: RegistrationId) -> Self {
    Self {
      container,
      key,
      id,
      _service: PhantomData,
    }
  }

  /// Sets the object scope of the registration.
  pub fn in_scope(self, scope: ObjectScope) -> Self {
    self.container.update_registration(&self.key, self.id, |registration| {
      let changed = registration.scope != scope;
      registration.scope = scope;
      changed
    });
    self
  }

  /// Adds a hook that runs after the instance has been constructed and
  /// published to its scope cache.
  ///
  /// Hooks are where cyclic references are wired: a resolution made from a
  /// hook that reaches back to this registration within the same object graph
  /// receives this very instance. Hooks run in the order they were added.
  pub fn on_completion<F>(self, hook: F) -> Self
  where
    F: Fn(&Resolver<'_>, &Arc<T>) -> Result<(), BoxError> + Send + Sync + 'static,
  {
    let key = self.key.clone();
    let erased = completion_fn(move |resolver, instance| {
      let typed = instance
        .downcast::<T>()
        .ok_or_else(|| ResolveError::TypeMismatch { key: key.clone() })?;
      hook(resolver, &typed)
    });
    self.container.update_registration(&self.key, self.id, move |registration| {
      registration.completions.push(erased);
      false
    });
    self
  }

  pub fn key(&self) -> &ServiceKey {
    &self.key
  }
}

impl<T: ?Sized> fmt::Debug for RegistrationHandle<'_, T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RegistrationHandle")
      .field("key", &self.key)
      .field("id", &self.id)
      .finish()
  }
}
