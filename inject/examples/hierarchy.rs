use fibre_inject::{Container, ObjectScope};
use std::sync::Arc;

trait Storage: Send + Sync {
  fn describe(&self) -> String;
}

struct DiskStorage;
impl Storage for DiskStorage {
  fn describe(&self) -> String {
    "disk".to_string()
  }
}

struct MemoryStorage;
impl Storage for MemoryStorage {
  fn describe(&self) -> String {
    "memory".to_string()
  }
}

fn main() {
  // Application-wide services live in the root container.
  let root = Container::new();
  root
    .register_trait::<dyn Storage>(|_| Arc::new(DiskStorage))
    .in_scope(ObjectScope::Container);
  root.add_instance_named("app_name", String::from("inventory"));

  // A child for one test run overrides storage and inherits the rest.
  let test_scope = root.child();
  test_scope.register_trait::<dyn Storage>(|_| Arc::new(MemoryStorage));

  let name = test_scope.resolve_named::<String>("app_name").expect("inherited from root");
  println!("app name from child: {}", name);
  println!("child storage: {}", test_scope.resolve::<dyn Storage>().expect("storage").describe());
  println!("root storage: {}", root.resolve::<dyn Storage>().expect("storage").describe());

  // The override never leaks upwards.
  let sibling = root.child();
  assert_eq!(sibling.resolve::<dyn Storage>().expect("storage").describe(), "disk");

  // A container-scoped instance in the root is shared by every child.
  let a = sibling.resolve::<dyn Storage>().expect("storage");
  let b = root.resolve::<dyn Storage>().expect("storage");
  assert!(Arc::ptr_eq(&a, &b));
  println!("\nSiblings share the root's container-scoped storage.");
}
