use fibre_inject::{global, resolve, BoxError, Container, ResolveError};
use std::panic;
use std::sync::Arc;

struct UnregisteredService;

struct Database;

struct UserService {
  _db: Arc<Database>,
}

fn main() {
  // --- Using the panicking `resolve!` macro ---
  println!("Attempting to resolve a service that was never registered...");

  let result = panic::catch_unwind(|| {
    let _service = resolve!(UnregisteredService);
  });

  assert!(result.is_err(), "resolve! should have panicked.");
  println!("Successfully caught the expected panic from resolve!.");

  // --- Using the non-panicking `get()` method ---
  println!("\nNow, attempting to resolve using the fallible `get()` method...");

  match global().get::<UnregisteredService>(None) {
    Some(_) => panic!("Should not have found the service!"),
    None => println!("Correctly received `None` for the missing service."),
  }

  // --- Failures deep inside a graph ---
  let container = Container::new();
  container.try_register(|r| -> Result<UserService, BoxError> {
    Ok(UserService {
      _db: r.resolve::<Database>()?,
    })
  });

  let error = container.resolve::<UserService>().err().expect("database is missing");
  println!("\nTop-level error: {}", error);
  match error.root_cause() {
    ResolveError::NotRegistered { key } => println!("Root cause: nothing registered for {}", key),
    other => panic!("unexpected root cause: {}", other),
  }
}
