use fibre_inject::{Container, ObjectScope, Slot, WeakSlot};
use std::sync::Arc;

// A parent owns its child; the child only points back weakly.
struct Parent {
  child: Slot<Child>,
}

struct Child {
  parent: WeakSlot<Parent>,
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let container = Container::new();

  // Factories only build the object. The references that close the cycle are
  // filled in by completion hooks, after each instance has been published to
  // the graph.
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

  let parent = container.resolve::<Parent>().expect("parent resolves");
  let child = parent.child.get().expect("child is wired");
  let back = child.parent.get().expect("parent is wired");

  assert!(Arc::ptr_eq(&back, &parent));
  println!("Parent and child reference each other.");

  // A second top-level resolution is a new graph and builds a new pair.
  let other = container.resolve::<Parent>().expect("parent resolves");
  assert!(!Arc::ptr_eq(&other, &parent));
  println!("A new resolution built a separate pair.");

  // With nothing cached, the same cycle cannot terminate.
  let transient = Container::builder().max_resolution_depth(16).build().expect("valid options");
  transient
    .register(|_| Parent { child: Slot::new() })
    .in_scope(ObjectScope::Transient)
    .on_completion(|r, parent| {
      parent.child.fill(r.resolve::<Child>()?)?;
      Ok(())
    });
  transient
    .register(|_| Child {
      parent: WeakSlot::new(),
    })
    .in_scope(ObjectScope::Transient)
    .on_completion(|r, child| {
      child.parent.fill(&r.resolve::<Parent>()?)?;
      Ok(())
    });

  match transient.resolve::<Parent>() {
    Ok(_) => panic!("a transient cycle must not resolve"),
    Err(error) => println!("Transient cycle rejected: {}", error.root_cause()),
  }
}
