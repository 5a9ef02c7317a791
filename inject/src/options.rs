//! Container configuration.

use std::fmt;

use crate::container::Container;
use crate::error::BuildError;
use crate::scope::ObjectScope;

/// The default nesting limit for a single object graph.
pub const DEFAULT_MAX_RESOLUTION_DEPTH: usize = 200;

/// Settings shared by every registration and resolution of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ContainerOptions {
  /// The scope given to new registrations unless `in_scope` overrides it.
  pub default_scope: ObjectScope,
  /// How deeply resolutions may nest within one object graph before the
  /// resolution is failed as an unresolvable cycle.
  pub max_resolution_depth: usize,
}

impl Default for ContainerOptions {
  fn default() -> Self {
    Self {
      default_scope: ObjectScope::Graph,
      max_resolution_depth: DEFAULT_MAX_RESOLUTION_DEPTH,
    }
  }
}

impl ContainerOptions {
  pub fn validate(&self) -> Result<(), BuildError> {
    if self.max_resolution_depth == 0 {
      return Err(BuildError::ZeroResolutionDepth);
    }
    Ok(())
  }
}

/// A builder for creating [`Container`] instances.
#[derive(Default)]
pub struct ContainerBuilder {
  options: ContainerOptions,
  parent: Option<Container>,
}

impl fmt::Debug for ContainerBuilder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ContainerBuilder")
      .field("options", &self.options)
      .field("has_parent", &self.parent.is_some())
      .finish()
  }
}

impl ContainerBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Replaces all options at once, e.g. with options loaded from a file.
  pub fn options(mut self, options: ContainerOptions) -> Self {
    self.options = options;
    self
  }

  /// Sets the scope new registrations start in.
  pub fn default_scope(mut self, scope: ObjectScope) -> Self {
    self.options.default_scope = scope;
    self
  }

  /// Sets the maximum nesting depth of one object graph.
  pub fn max_resolution_depth(mut self, depth: usize) -> Self {
    self.options.max_resolution_depth = depth;
    self
  }

  /// Sets the container that lookups fall back to when a key is not
  /// registered locally.
  pub fn parent(mut self, parent: &Container) -> Self {
    self.parent = Some(parent.clone());
    self
  }

  pub fn build(self) -> Result<Container, BuildError> {
    self.options.validate()?;
    Ok(Container::from_parts(self.options, self.parent))
  }
}
