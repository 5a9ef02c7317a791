//! # Fibre Inject
//!
//! A thread-safe, hierarchical dependency-resolution container for Rust.
//!
//! Services are registered against a key with a factory, then resolved by
//! that key. Resolution builds a whole object graph: factories and completion
//! hooks resolve their own dependencies, including dependencies that refer
//! back to the service being built.
//!
//! ## Core Concepts
//!
//! - **Container**: owns registrations and the instances cached for them.
//!   Containers can form a tree; lookups that miss locally fall back to the
//!   parent chain.
//! - **Object scope**: decides how instances are reused. `Transient` builds a
//!   new one every time, `Graph` shares one per top-level resolution,
//!   `Container` shares one for the container's lifetime and `Weak` shares one
//!   for as long as callers keep it alive.
//! - **Object graph**: everything resolved during one top-level call shares a
//!   [`GraphId`]. Graph-scoped instances are cached under it and released
//!   when the call returns.
//! - **Completion hooks**: run after an instance has been constructed and
//!   published, so that cyclic references can be wired in a second step.
//! - **Thread safety**: each container has a reentrant admission guard.
//!   Nested resolution on one thread never blocks on itself; other threads
//!   wait for the resolution in progress to finish.
//!
//! ## Quick Start
//!
//! ```
//! use fibre_inject::{Container, ObjectScope, Slot, WeakSlot};
//! use std::sync::Arc;
//!
//! struct Parent {
//!   child: Slot<Child>,
//! }
//!
//! struct Child {
//!   parent: WeakSlot<Parent>,
//! }
//!
//! let container = Container::new();
//! container
//!   .register(|_| Parent { child: Slot::new() })
//!   .in_scope(ObjectScope::Graph)
//!   .on_completion(|r, parent| {
//!     parent.child.fill(r.resolve::<Child>()?)?;
//!     Ok(())
//!   });
//! container
//!   .register(|_| Child { parent: WeakSlot::new() })
//!   .in_scope(ObjectScope::Graph)
//!   .on_completion(|r, child| {
//!     child.parent.fill(&r.resolve::<Parent>()?)?;
//!     Ok(())
//!   });
//!
//! let parent = container.resolve::<Parent>().unwrap();
//! let child = parent.child.get().unwrap();
//! assert!(Arc::ptr_eq(&child.parent.get().unwrap(), &parent));
//! ```

mod container;
mod error;
mod global;
mod graph;
mod instance;
mod key;
mod macros;
mod options;
mod registration;
mod resolver;
mod scope;
mod slot;

pub use container::Container;
pub use error::{BoxError, BuildError, ResolveError, SlotError};
pub use global::global;
pub use graph::{current_graph, GraphId, ResolutionContext};
pub use key::ServiceKey;
pub use options::{ContainerBuilder, ContainerOptions, DEFAULT_MAX_RESOLUTION_DEPTH};
pub use registration::RegistrationHandle;
pub use resolver::Resolver;
pub use scope::ObjectScope;
pub use slot::{Slot, WeakSlot};
