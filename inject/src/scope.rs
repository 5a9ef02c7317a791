//! Object scopes and the storage policies behind them.

use std::collections::HashMap;

use crate::graph::GraphId;
use crate::instance::{Instance, WeakRef};
use crate::registration::{Registration, RegistrationId};

/// Governs whether, and for how long, a resolved instance is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ObjectScope {
  /// A new instance on every resolution.
  Transient,
  /// One instance per registration for each top-level resolution. All nested
  /// resolutions, including those issued from completion hooks, share it.
  /// This is what allows cyclic dependencies to be wired.
  #[default]
  Graph,
  /// One instance for the lifetime of the container that owns the registration.
  Container,
  /// One instance shared for as long as something outside the container keeps
  /// it alive. Once the last strong reference drops, the next resolution
  /// constructs a fresh instance.
  Weak,
}

impl ObjectScope {
  pub(crate) fn storage(self) -> Box<dyn InstanceStorage> {
    match self {
      ObjectScope::Transient => Box::new(TransientStorage),
      ObjectScope::Graph => Box::<GraphStorage>::default(),
      ObjectScope::Container => Box::<ContainerStorage>::default(),
      ObjectScope::Weak => Box::<WeakStorage>::default(),
    }
  }
}

/// Storage behind a single registration's scope.
///
/// Storages are only touched while the owning container's admission guard is
/// held, so they need no synchronization of their own.
pub(crate) trait InstanceStorage: Send {
  /// The live instance for `graph`, if one is cached.
  fn instance(&mut self, graph: GraphId) -> Option<Instance>;

  fn store(&mut self, instance: &Instance, graph: GraphId);

  /// Forgets the instance cached for `graph`, returning it so the caller can
  /// drop it outside of any borrow.
  fn evict(&mut self, graph: GraphId) -> Option<Instance>;

  /// Called once the top-level resolution behind `graph` has finished.
  fn graph_completed(&mut self, _graph: GraphId) -> Option<Instance> {
    None
  }
}

struct TransientStorage;

impl InstanceStorage for TransientStorage {
  fn instance(&mut self, _graph: GraphId) -> Option<Instance> {
    None
  }

  fn store(&mut self, _instance: &Instance, _graph: GraphId) {}

  fn evict(&mut self, _graph: GraphId) -> Option<Instance> {
    None
  }
}

// Several graphs can be live at once: a parent container caches graph-scoped
// instances on behalf of children resolving concurrently on other threads.
#[derive(Default)]
struct GraphStorage {
  instances: HashMap<GraphId, Instance>,
}

impl InstanceStorage for GraphStorage {
  fn instance(&mut self, graph: GraphId) -> Option<Instance> {
    self.instances.get(&graph).cloned()
  }

  fn store(&mut self, instance: &Instance, graph: GraphId) {
    self.instances.insert(graph, instance.clone());
  }

  fn evict(&mut self, graph: GraphId) -> Option<Instance> {
    self.instances.remove(&graph)
  }

  fn graph_completed(&mut self, graph: GraphId) -> Option<Instance> {
    self.instances.remove(&graph)
  }
}

#[derive(Default)]
struct ContainerStorage {
  instance: Option<Instance>,
}

impl InstanceStorage for ContainerStorage {
  fn instance(&mut self, _graph: GraphId) -> Option<Instance> {
    self.instance.clone()
  }

  fn store(&mut self, instance: &Instance, _graph: GraphId) {
    self.instance = Some(instance.clone());
  }

  fn evict(&mut self, _graph: GraphId) -> Option<Instance> {
    self.instance.take()
  }
}

#[derive(Default)]
struct WeakStorage {
  instance: Option<WeakRef>,
}

impl InstanceStorage for WeakStorage {
  // Liveness is checked lazily, on the next lookup.
  fn instance(&mut self, _graph: GraphId) -> Option<Instance> {
    let live = self.instance.as_ref().and_then(WeakRef::upgrade);
    if live.is_none() {
      self.instance = None;
    }
    live
  }

  fn store(&mut self, instance: &Instance, _graph: GraphId) {
    self.instance = Some(instance.downgrade());
  }

  fn evict(&mut self, _graph: GraphId) -> Option<Instance> {
    self.instance.take().and_then(|weak| weak.upgrade())
  }
}

/// One registration's storage. Entries removed from a [`ScopeCache`] are
/// handed back so the instances they hold can be dropped outside the
/// container's state borrow.
pub(crate) struct CacheEntry {
  scope: ObjectScope,
  storage: Box<dyn InstanceStorage>,
}

/// A container's scope cache: one storage per registration, created lazily
/// from the registration's scope the first time an instance is stored.
#[derive(Default)]
pub(crate) struct ScopeCache {
  entries: HashMap<RegistrationId, CacheEntry>,
}

impl ScopeCache {
  pub(crate) fn instance(&mut self, registration: &Registration, graph: GraphId) -> Option<Instance> {
    let entry = self.entries.get_mut(&registration.id)?;
    entry.storage.instance(graph)
  }

  pub(crate) fn store(&mut self, registration: &Registration, instance: &Instance, graph: GraphId) {
    self
      .entries
      .entry(registration.id)
      .or_insert_with(|| CacheEntry {
        scope: registration.scope,
        storage: registration.scope.storage(),
      })
      .storage
      .store(instance, graph);
  }

  pub(crate) fn evict(&mut self, registration: &Registration, graph: GraphId) -> Option<Instance> {
    self
      .entries
      .get_mut(&registration.id)
      .and_then(|entry| entry.storage.evict(graph))
  }

  /// Drops the storage for a registration entirely, e.g. when it is replaced
  /// or its scope changes.
  pub(crate) fn remove(&mut self, id: RegistrationId) -> Option<CacheEntry> {
    self.entries.remove(&id)
  }

  pub(crate) fn graph_completed(&mut self, graph: GraphId) -> Vec<Instance> {
    self
      .entries
      .values_mut()
      .filter_map(|entry| entry.storage.graph_completed(graph))
      .collect()
  }

  /// Takes out every storage belonging to `scope`.
  pub(crate) fn reset(&mut self, scope: ObjectScope) -> Vec<CacheEntry> {
    let (removed, kept): (HashMap<_, _>, HashMap<_, _>) = std::mem::take(&mut self.entries)
      .into_iter()
      .partition(|(_, entry)| entry.scope == scope);
    self.entries = kept;
    removed.into_values().collect()
  }

  pub(crate) fn clear(&mut self) -> Vec<CacheEntry> {
    self.entries.drain().map(|(_, entry)| entry).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;

  fn instance(value: u32) -> (Arc<u32>, Instance) {
    let value = Arc::new(value);
    (Arc::clone(&value), Instance::new(value))
  }

  #[test]
  fn test_reset_hands_back_only_matching_entries() {
    let mut cache = ScopeCache::default();
    let graph = GraphId::next();
    let unused = || crate::registration::factory_fn(|_| Err("unused".into()));
    let shared = Registration::new(crate::ServiceKey::of::<u32>(), ObjectScope::Container, unused());
    let per_graph = Registration::new(crate::ServiceKey::of::<u64>(), ObjectScope::Graph, unused());
    let (outside, value) = instance(1);

    cache.store(&shared, &value, graph);
    cache.store(&per_graph, &value, graph);
    drop(value);

    let removed = cache.reset(ObjectScope::Container);
    assert_eq!(removed.len(), 1);
    assert!(cache.instance(&shared, graph).is_none());
    assert!(cache.instance(&per_graph, graph).is_some());
    // The caller still owns what was taken out.
    assert_eq!(Arc::strong_count(&outside), 3);

    drop(removed);
    assert_eq!(Arc::strong_count(&outside), 2);
    assert_eq!(cache.clear().len(), 1);
    assert_eq!(Arc::strong_count(&outside), 1);
  }

  #[test]
  fn test_transient_never_caches() {
    let mut storage = ObjectScope::Transient.storage();
    let graph = GraphId::next();
    let (_, value) = instance(1);

    storage.store(&value, graph);
    assert!(storage.instance(graph).is_none());
  }

  #[test]
  fn test_graph_storage_is_keyed_by_graph() {
    let mut storage = ObjectScope::Graph.storage();
    let first = GraphId::next();
    let second = GraphId::next();
    let (a, value_a) = instance(1);
    let (b, value_b) = instance(2);

    storage.store(&value_a, first);
    storage.store(&value_b, second);

    let cached_a = storage.instance(first).unwrap().downcast::<u32>().unwrap();
    let cached_b = storage.instance(second).unwrap().downcast::<u32>().unwrap();
    assert!(Arc::ptr_eq(&cached_a, &a));
    assert!(Arc::ptr_eq(&cached_b, &b));

    assert!(storage.graph_completed(first).is_some());
    assert!(storage.instance(first).is_none());
    assert!(storage.instance(second).is_some());
  }

  #[test]
  fn test_container_storage_ignores_graph() {
    let mut storage = ObjectScope::Container.storage();
    let (a, value) = instance(7);

    storage.store(&value, GraphId::next());
    let cached = storage.instance(GraphId::next()).unwrap().downcast::<u32>().unwrap();
    assert!(Arc::ptr_eq(&cached, &a));
    assert!(storage.graph_completed(GraphId::next()).is_none());
  }

  #[test]
  fn test_weak_storage_invalidates_on_next_access() {
    let mut storage = ObjectScope::Weak.storage();
    let graph = GraphId::next();
    let (outside, value) = instance(3);

    storage.store(&value, graph);
    drop(value);
    assert!(storage.instance(graph).is_some());

    drop(outside);
    assert!(storage.instance(graph).is_none());
  }
}
