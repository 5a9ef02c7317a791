//! The resolver handed to factories and completion hooks.

use std::fmt;
use std::sync::Arc;

use crate::container::Container;
use crate::error::ResolveError;
use crate::graph::{GraphId, ResolutionContext};
use crate::key::ServiceKey;

/// The handle factories and completion hooks resolve their dependencies with.
///
/// A resolver is bound to the container that owns the registration being
/// built and to the object graph of the resolution in progress, so every
/// lookup made through it shares that graph's graph-scoped instances.
pub struct Resolver<'a> {
  container: &'a Container,
  context: &'a ResolutionContext,
}

impl<'a> Resolver<'a> {
  pub(crate) fn new(container: &'a Container, context: &'a ResolutionContext) -> Self {
    Self { container, context }
  }

  /// Resolves the unnamed registration for `T`.
  pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveError> {
    self
      .container
      .resolve_typed(self.context, &ServiceKey::of::<T>())
  }

  /// Resolves the registration for `T` named `name`.
  pub fn resolve_named<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, ResolveError> {
    self
      .container
      .resolve_typed(self.context, &ServiceKey::named::<T>(name))
  }

  /// The object graph this resolution belongs to.
  pub fn graph(&self) -> GraphId {
    self.context.graph()
  }

  pub fn context(&self) -> &'a ResolutionContext {
    self.context
  }

  /// The container that owns the registration being resolved.
  pub fn container(&self) -> &'a Container {
    self.container
  }
}

impl fmt::Debug for Resolver<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Resolver")
      .field("graph", &self.context.graph())
      .finish_non_exhaustive()
  }
}
