//! The global container instance and access functions.

use crate::container::Container;
use once_cell::sync::Lazy;

// Created on first access in a thread-safe manner.
static GLOBAL_CONTAINER: Lazy<Container> = Lazy::new(Container::default);

/// Provides a reference to the process-wide container.
///
/// Useful for wiring an application from many places without passing a
/// container around. Tests should prefer their own [`Container`] so their
/// registrations stay isolated.
///
/// # Examples
///
/// ```
/// use fibre_inject::global;
///
/// global().add_instance_named("greeting", String::from("Hello from global!"));
/// let greeting = global().resolve_named::<String>("greeting").unwrap();
/// assert_eq!(*greeting, "Hello from global!");
/// ```
pub fn global() -> &'static Container {
  &GLOBAL_CONTAINER
}
