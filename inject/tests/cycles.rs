use fibre_inject::{Container, ObjectScope, ResolveError, Slot, WeakSlot};
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use std::thread;

// --- Test Fixtures ---

struct Parent {
  child: Slot<Child>,
}

struct Child {
  parent: WeakSlot<Parent>,
}

fn cyclic_container(scope: ObjectScope) -> Container {
  let container = Container::new();
  wire_cycle(&container, scope);
  container
}

fn wire_cycle(container: &Container, scope: ObjectScope) {
  container
    .register(|_| Parent { child: Slot::new() })
    .in_scope(scope)
    .on_completion(|r, parent| {
      parent.child.fill(r.resolve::<Child>()?)?;
      Ok(())
    });
  container
    .register(|_| Child {
      parent: WeakSlot::new(),
    })
    .in_scope(scope)
    .on_completion(|r, child| {
      child.parent.fill(&r.resolve::<Parent>()?)?;
      Ok(())
    });
}

fn assert_wired(parent: &Arc<Parent>) {
  let child = parent.child.get().expect("child wired");
  let back = child.parent.get().expect("parent wired");
  assert!(Arc::ptr_eq(&back, parent));
}

// --- Resolvable Cycles ---

#[test]
fn test_graph_scoped_cycle_is_wired() {
  let container = cyclic_container(ObjectScope::Graph);

  let parent = container.resolve::<Parent>().unwrap();

  assert_wired(&parent);
}

#[test]
fn test_weak_back_reference_does_not_outlive_graph() {
  let container = cyclic_container(ObjectScope::Graph);

  let child = container.resolve::<Child>().unwrap();

  // The parent was wired during the resolution, but only the graph cache
  // held it strongly, so it is gone once the graph has ended.
  assert!(child.parent.is_filled());
  assert!(child.parent.get().is_none());
}

#[test]
fn test_separate_resolutions_build_separate_cycles() {
  let container = cyclic_container(ObjectScope::Graph);

  let first = container.resolve::<Parent>().unwrap();
  let second = container.resolve::<Parent>().unwrap();

  assert_wired(&first);
  assert_wired(&second);
  assert!(!Arc::ptr_eq(&first, &second));
  assert!(!Arc::ptr_eq(&first.child.get().unwrap(), &second.child.get().unwrap()));
}

#[test]
fn test_container_scoped_cycle_is_wired_once() {
  let container = cyclic_container(ObjectScope::Container);

  let a = container.resolve::<Parent>().unwrap();
  let b = container.resolve::<Parent>().unwrap();
  let child = container.resolve::<Child>().unwrap();

  assert_wired(&a);
  assert!(Arc::ptr_eq(&a, &b));
  assert!(Arc::ptr_eq(&a.child.get().unwrap(), &child));
}

#[test]
fn test_transient_participant_anchored_by_graph_scope() {
  // A transient parent is fine as long as the other side of the cycle is
  // cached: the child's hook builds a second parent, whose own hook finds
  // the graph-scoped child.
  let container = Container::new();
  let parents = Arc::new(AtomicUsize::new(0));
  let counter = Arc::clone(&parents);
  container
    .register(move |_| {
      counter.fetch_add(1, Ordering::SeqCst);
      Parent { child: Slot::new() }
    })
    .in_scope(ObjectScope::Transient)
    .on_completion(|r, parent| {
      parent.child.fill(r.resolve::<Child>()?)?;
      Ok(())
    });
  container
    .register(|_| Child {
      parent: WeakSlot::new(),
    })
    .in_scope(ObjectScope::Graph)
    .on_completion(|r, child| {
      child.parent.fill(&r.resolve::<Parent>()?)?;
      Ok(())
    });

  let parent = container.resolve::<Parent>().unwrap();

  assert!(parent.child.get().is_some());
  assert_eq!(parents.load(Ordering::SeqCst), 2);
}

// --- Unresolvable Cycles ---

#[test]
fn test_transient_cycle_fails_instead_of_overflowing() {
  // Runs on a freshly spawned thread so the default depth limit is checked
  // against the default thread stack.
  let error = thread::spawn(|| {
    let container = cyclic_container(ObjectScope::Transient);
    container.resolve::<Parent>().err()
  })
  .join()
  .unwrap()
  .expect("transient cycle must fail");

  assert!(matches!(error, ResolveError::CompletionFailed { .. }));
  assert!(matches!(
    error.root_cause(),
    ResolveError::CyclicTransientScope { depth: 201, .. }
  ));
}

#[test]
fn test_depth_limit_is_configurable() {
  let container = Container::builder().max_resolution_depth(4).build().unwrap();
  wire_cycle(&container, ObjectScope::Transient);

  let error = container.resolve::<Parent>().err().unwrap();

  assert!(matches!(
    error.root_cause(),
    ResolveError::CyclicTransientScope { depth: 5, .. }
  ));
}

#[test]
fn test_cycle_through_factories_is_rejected() {
  struct A {
    _b: Arc<B>,
  }
  struct B {
    _a: Arc<A>,
  }

  let container = Container::new();
  container
    .try_register(|r| Ok(A { _b: r.resolve::<B>()? }))
    .in_scope(ObjectScope::Container);
  container
    .try_register(|r| Ok(B { _a: r.resolve::<A>()? }))
    .in_scope(ObjectScope::Container);

  let error = container.resolve::<A>().err().unwrap();

  assert!(matches!(error, ResolveError::FactoryFailed { .. }));
  assert!(matches!(
    error.root_cause(),
    ResolveError::CyclicTransientScope { .. }
  ));
}

#[test]
fn test_failed_resolution_releases_the_guard() {
  let container = Container::builder().max_resolution_depth(8).build().unwrap();
  wire_cycle(&container, ObjectScope::Transient);
  assert!(container.resolve::<Parent>().is_err());

  // Another thread can still get into the container afterwards.
  let other = container.clone();
  let result = thread::spawn(move || {
    other.add_instance(7_u32);
    other.resolve::<u32>().map(|value| *value).ok()
  })
  .join()
  .unwrap();

  assert_eq!(result, Some(7));
}

#[test]
fn test_failed_completion_hook_evicts_instance() {
  let container = Container::new();
  let attempts = Arc::new(AtomicUsize::new(0));
  let counter = Arc::clone(&attempts);
  container
    .register(|_| Parent { child: Slot::new() })
    .in_scope(ObjectScope::Container)
    .on_completion(move |_, _| {
      if counter.fetch_add(1, Ordering::SeqCst) == 0 {
        return Err("not ready".into());
      }
      Ok(())
    });

  let error = container.resolve::<Parent>().err().unwrap();
  assert!(matches!(error, ResolveError::CompletionFailed { .. }));

  assert!(container.resolve::<Parent>().is_ok());
  assert_eq!(attempts.load(Ordering::SeqCst), 2);
}
