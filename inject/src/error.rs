use thiserror::Error;

use crate::key::ServiceKey;

/// The error type factories and completion hooks report failures with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned when a service cannot be resolved.
///
/// A failed resolution never leaves a container locked and never leaves a
/// partially wired instance behind in the scope caches.
#[derive(Debug, Error)]
pub enum ResolveError {
  /// No registration exists for the key in the container or any of its parents.
  #[error("no registration found for {key}")]
  NotRegistered { key: ServiceKey },

  /// The registered factory returned an error. The factory is never retried.
  #[error("factory for {key} failed: {source}")]
  FactoryFailed {
    key: ServiceKey,
    #[source]
    source: BoxError,
  },

  /// A completion hook returned an error after the instance was constructed.
  #[error("completion hook for {key} failed: {source}")]
  CompletionFailed {
    key: ServiceKey,
    #[source]
    source: BoxError,
  },

  /// Resolution recursed without reaching a cached instance: either a factory
  /// was re-entered before it returned, or the nesting exceeded the
  /// container's maximum resolution depth.
  #[error("unresolvable circular dependency while resolving {key} at depth {depth}")]
  CyclicTransientScope { key: ServiceKey, depth: usize },

  /// The instance registered under the key is not of the requested type.
  #[error("instance registered for {key} is not of the requested type")]
  TypeMismatch { key: ServiceKey },
}

impl ResolveError {
  /// The key whose resolution failed.
  pub fn key(&self) -> &ServiceKey {
    match self {
      ResolveError::NotRegistered { key }
      | ResolveError::FactoryFailed { key, .. }
      | ResolveError::CompletionFailed { key, .. }
      | ResolveError::CyclicTransientScope { key, .. }
      | ResolveError::TypeMismatch { key } => key,
    }
  }

  /// Follows nested factory and hook failures down to the resolution error
  /// that started them, if the chain bottoms out in one.
  pub fn root_cause(&self) -> &ResolveError {
    let mut current = self;
    loop {
      let inner = match current {
        ResolveError::FactoryFailed { source, .. } | ResolveError::CompletionFailed { source, .. } => {
          source.downcast_ref::<ResolveError>()
        }
        _ => None,
      };
      match inner {
        Some(next) => current = next,
        None => return current,
      }
    }
  }
}

/// Errors that can occur when building a container.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
  /// A maximum resolution depth of zero would reject every resolution.
  #[error("maximum resolution depth cannot be zero")]
  ZeroResolutionDepth,
}

/// Returned when a [`Slot`](crate::Slot) or [`WeakSlot`](crate::WeakSlot) is
/// filled a second time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("slot for {type_name} is already filled")]
pub struct SlotError {
  pub type_name: &'static str,
}
