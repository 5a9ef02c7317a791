use fibre_inject::{Container, ObjectScope};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

struct Connection {
  id: usize,
}

// Asks for the connection twice to show what each scope shares.
struct Repositories {
  users: Arc<Connection>,
  orders: Arc<Connection>,
}

fn run(scope: ObjectScope) {
  let container = Container::new();
  container
    .register(|_| Connection {
      id: NEXT_ID.fetch_add(1, Ordering::SeqCst),
    })
    .in_scope(scope);
  container.register(|r| Repositories {
    users: r.resolve::<Connection>().expect("connection"),
    orders: r.resolve::<Connection>().expect("connection"),
  });

  let first = container.resolve::<Repositories>().expect("repositories");
  let second = container.resolve::<Repositories>().expect("repositories");

  println!(
    "{:<10} first graph: users={} orders={}, second graph: users={} orders={}",
    format!("{scope:?}"),
    first.users.id,
    first.orders.id,
    second.users.id,
    second.orders.id,
  );
}

fn main() {
  for scope in [
    ObjectScope::Transient,
    ObjectScope::Graph,
    ObjectScope::Container,
    ObjectScope::Weak,
  ] {
    run(scope);
  }

  // Cached instances can be dropped without touching the registrations.
  let container = Container::new();
  container
    .register(|_| Connection {
      id: NEXT_ID.fetch_add(1, Ordering::SeqCst),
    })
    .in_scope(ObjectScope::Container);
  let before = container.resolve::<Connection>().expect("connection");
  container.reset_object_scope(ObjectScope::Container);
  let after = container.resolve::<Connection>().expect("connection");

  println!("\nAfter reset_object_scope: {} -> {}", before.id, after.id);
  assert_ne!(before.id, after.id);
}
