use fibre_inject::{Container, ObjectScope, Slot, WeakSlot};
use std::sync::Arc;
use std::thread;

struct Parent {
  child: Slot<Child>,
}

struct Child {
  parent: WeakSlot<Parent>,
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_thread_ids(true)
    .init();

  let container = Container::new();
  container
    .register(|_| Parent { child: Slot::new() })
    .in_scope(ObjectScope::Graph)
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

  // Each thread resolves its own graph; the container admits one at a time.
  let handles: Vec<_> = (0..8)
    .map(|n| {
      let container = container.clone();
      thread::spawn(move || {
        let parent = container.resolve::<Parent>().expect("parent resolves");
        let child = parent.child.get().expect("child is wired");
        assert!(Arc::ptr_eq(&child.parent.get().expect("parent is wired"), &parent));
        println!("thread {} wired its own cycle", n);
      })
    })
    .collect();

  for handle in handles {
    handle.join().expect("worker panicked");
  }
}
