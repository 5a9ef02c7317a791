//! Public macros for ergonomic resolution from the global container.

/// Resolves a service from the global container.
///
/// # Panics
///
/// Panics with the [`ResolveError`](crate::ResolveError) if the service
/// cannot be resolved. For a non-panicking version use `global().resolve()`.
///
/// # Examples
///
/// ```
/// use fibre_inject::{global, resolve, ObjectScope};
/// use std::sync::Arc;
///
/// global().register_named("macro_doc_message", |_| String::from("hello"));
/// let message = resolve!(String, "macro_doc_message");
/// assert_eq!(*message, "hello");
///
/// trait Greeter: Send + Sync { fn greet(&self) -> String; }
/// struct EnglishGreeter;
/// impl Greeter for EnglishGreeter { fn greet(&self) -> String { "Hello!".to_string() } }
///
/// global()
///   .register_trait::<dyn Greeter>(|_| Arc::new(EnglishGreeter))
///   .in_scope(ObjectScope::Container);
/// let greeter = resolve!(trait Greeter);
/// assert_eq!(greeter.greet(), "Hello!");
/// ```
#[macro_export]
macro_rules! resolve {
    // resolve!(trait MyTrait)
    (trait $trait_ident:ident) => {
        $crate::global()
            .resolve::<dyn $trait_ident>()
            .unwrap_or_else(|error| {
                panic!(
                    "Failed to resolve required trait service {}: {}",
                    std::any::type_name::<dyn $trait_ident>(),
                    error
                )
            })
    };

    // resolve!(trait MyTrait, "name")
    (trait $trait_ident:ident, $name:expr) => {
        $crate::global()
            .resolve_named::<dyn $trait_ident>($name)
            .unwrap_or_else(|error| {
                panic!(
                    "Failed to resolve required trait service {} named '{}': {}",
                    std::any::type_name::<dyn $trait_ident>(),
                    $name,
                    error
                )
            })
    };

    // resolve!(MyService)
    ($type:ty) => {
        $crate::global()
            .resolve::<$type>()
            .unwrap_or_else(|error| {
                panic!(
                    "Failed to resolve required service {}: {}",
                    std::any::type_name::<$type>(),
                    error
                )
            })
    };

    // resolve!(MyService, "name")
    ($type:ty, $name:expr) => {
        $crate::global()
            .resolve_named::<$type>($name)
            .unwrap_or_else(|error| {
                panic!(
                    "Failed to resolve required service {} named '{}': {}",
                    std::any::type_name::<$type>(),
                    $name,
                    error
                )
            })
    };
}
