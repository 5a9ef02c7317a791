use fibre_inject::{Container, GraphId, ObjectScope, Slot, WeakSlot};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  mpsc, Arc, Barrier,
};
use std::thread;
use std::time::Duration;

// Enough threads to expose a container that is not thread safe.
const TOTAL_THREADS: usize = 500;
const TIMEOUT: Duration = Duration::from_secs(30);

// --- Test Fixtures ---

trait Animal: Send + Sync {
  fn sound(&self) -> &str;
}

struct Cat;
impl Animal for Cat {
  fn sound(&self) -> &str {
    "meow"
  }
}

struct Parent {
  child: Slot<Child>,
}

struct Child {
  parent: WeakSlot<Parent>,
}

type Action = Arc<dyn Fn() + Send + Sync>;

fn action(f: impl Fn() + Send + Sync + 'static) -> Action {
  Arc::new(f)
}

/// Runs every action on `TOTAL_THREADS` threads each, all released at once,
/// and fails the test if they have not all finished within `TIMEOUT`.
fn on_multiple_threads(actions: Vec<Action>) {
  let total = actions.len() * TOTAL_THREADS;
  let barrier = Arc::new(Barrier::new(total));
  let (done_tx, done_rx) = mpsc::channel();

  let mut handles = Vec::with_capacity(total);
  for _ in 0..TOTAL_THREADS {
    for task in &actions {
      let task = Arc::clone(task);
      let barrier = Arc::clone(&barrier);
      let done_tx = done_tx.clone();
      handles.push(thread::spawn(move || {
        barrier.wait();
        task();
        let _ = done_tx.send(());
      }));
    }
  }
  drop(done_tx);

  for finished in 0..total {
    if done_rx.recv_timeout(TIMEOUT).is_err() {
      panic!("only {finished} of {total} resolutions finished; the container deadlocked or a thread panicked");
    }
  }
  for handle in handles {
    handle.join().expect("resolution thread panicked");
  }
}

fn cyclic_container(scope: ObjectScope) -> Container {
  let container = Container::new();
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
  container
}

// --- Multiple Threads ---

#[test]
fn test_resolves_circular_dependencies_on_many_threads() {
  let container = cyclic_container(ObjectScope::Graph);

  on_multiple_threads(vec![action(move || {
    let parent = container.resolve::<Parent>().expect("parent resolves");
    let child = parent.child.get().expect("child is wired");
    let back = child.parent.get().expect("parent is wired");
    assert!(Arc::ptr_eq(&back, &parent));
  })]);
}

#[test]
fn test_container_scoped_cycle_is_built_once_across_threads() {
  let container = cyclic_container(ObjectScope::Container);
  let seen = Arc::new(Mutex::new(HashSet::new()));
  let recorded = Arc::clone(&seen);

  on_multiple_threads(vec![action(move || {
    let parent = container.resolve::<Parent>().expect("parent resolves");
    let child = parent.child.get().expect("child is wired");
    assert!(Arc::ptr_eq(&child.parent.get().expect("parent is wired"), &parent));
    recorded.lock().insert(Arc::as_ptr(&parent) as usize);
  })]);

  assert_eq!(seen.lock().len(), 1);
}

#[test]
fn test_parent_and_child_containers_without_deadlock() {
  for scope in [
    ObjectScope::Transient,
    ObjectScope::Graph,
    ObjectScope::Container,
    ObjectScope::Weak,
  ] {
    let parent = Container::new();
    parent
      .register_trait::<dyn Animal>(|_| Arc::new(Cat))
      .in_scope(scope);
    let child = parent.child();

    on_multiple_threads(vec![
      action(move || {
        assert_eq!(parent.resolve::<dyn Animal>().unwrap().sound(), "meow");
      }),
      action(move || {
        assert_eq!(child.resolve::<dyn Animal>().unwrap().sound(), "meow");
      }),
    ]);
  }
}

#[test]
fn test_uses_distinct_graph_identifiers() {
  let graphs: Arc<Mutex<Vec<GraphId>>> = Arc::new(Mutex::new(Vec::new()));
  let container = Container::new();
  let recorded = Arc::clone(&graphs);
  container
    .register(move |r| {
      recorded.lock().push(r.graph());
      Cat
    })
    .in_scope(ObjectScope::Transient);

  on_multiple_threads(vec![action(move || {
    container.resolve::<Cat>().expect("cat resolves");
  })]);

  let graphs = graphs.lock();
  let distinct: HashSet<_> = graphs.iter().copied().collect();
  assert_eq!(graphs.len(), TOTAL_THREADS);
  assert_eq!(distinct.len(), TOTAL_THREADS);
}

#[test]
fn test_container_scope_first_construction_race_has_one_winner() {
  let container = Container::new();
  let built = Arc::new(AtomicUsize::new(0));
  let counter = Arc::clone(&built);
  container
    .register(move |_| {
      counter.fetch_add(1, Ordering::SeqCst);
      thread::sleep(Duration::from_millis(20));
      Cat
    })
    .in_scope(ObjectScope::Container);

  on_multiple_threads(vec![action(move || {
    container.resolve::<Cat>().expect("cat resolves");
  })]);

  assert_eq!(built.load(Ordering::SeqCst), 1);
}

// --- Nested Resolve ---

#[test]
fn test_nested_resolve_without_deadlock() {
  struct Owner {
    _pet: Arc<dyn Animal>,
  }

  let container = Container::new();
  container.register_trait::<dyn Animal>(|_| Arc::new(Cat));
  let inner = container.clone();
  // Calls straight back into the container rather than through the resolver.
  container.register(move |_| Owner {
    _pet: inner.resolve::<dyn Animal>().expect("animal resolves"),
  });

  let (done_tx, done_rx) = mpsc::channel();
  let worker = container.clone();
  thread::spawn(move || {
    let resolved = worker.resolve::<Owner>().is_ok();
    let _ = done_tx.send(resolved);
  });

  assert_eq!(done_rx.recv_timeout(Duration::from_secs(2)), Ok(true));
  container.remove_all();
}
