//! Object graph identity.
//!
//! Every resolution runs inside an object graph. A graph starts when a thread
//! with no active graph calls into a container, and ends when that outermost
//! call returns. Everything resolved in between, whether from factories,
//! completion hooks or direct calls on a container made while the graph is
//! active, shares one [`GraphId`]. Graph-scoped instances are cached under it.
//!
//! The engine itself only sees an explicit [`ResolutionContext`]. The
//! thread-local tracker here exists so that a factory calling back into a
//! container directly, rather than through its [`Resolver`](crate::Resolver),
//! still joins the graph it is running in.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::num::NonZeroU64;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::container::Shared;
use crate::error::ResolveError;
use crate::key::ServiceKey;
use crate::registration::RegistrationId;

static NEXT_GRAPH: AtomicU64 = AtomicU64::new(1);

thread_local! {
  static ACTIVE_GRAPH: RefCell<Option<ResolutionContext>> = const { RefCell::new(None) };
}

/// Identifies one top-level resolution and everything it transitively resolves.
///
/// Identifiers are unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(NonZeroU64);

impl GraphId {
  pub(crate) fn next() -> Self {
    let raw = NEXT_GRAPH.fetch_add(1, Ordering::Relaxed);
    // The counter starts at one and would need 2^64 graphs to wrap.
    Self(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
  }

  pub fn get(self) -> u64 {
    self.0.get()
  }
}

impl fmt::Display for GraphId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "graph#{}", self.0)
  }
}

/// The graph active on the calling thread, if a resolution is in progress.
pub fn current_graph() -> Option<GraphId> {
  ACTIVE_GRAPH.with(|active| active.borrow().as_ref().map(ResolutionContext::graph))
}

/// State of one object graph.
///
/// A context is created implicitly by the first resolution on a thread, or
/// explicitly with [`ResolutionContext::new`] to drive several resolutions
/// in one graph. Graph-scoped instances are released when the last clone of
/// the context is dropped.
///
/// Contexts are bound to the thread that created them.
#[derive(Clone)]
pub struct ResolutionContext {
  inner: Rc<GraphState>,
}

struct GraphState {
  id: GraphId,
  depth: Cell<usize>,
  constructing: RefCell<Vec<RegistrationId>>,
  participants: RefCell<Vec<Arc<Shared>>>,
}

impl ResolutionContext {
  /// Starts a new object graph.
  pub fn new() -> Self {
    let id = GraphId::next();
    debug!(graph = %id, "object graph started");
    Self {
      inner: Rc::new(GraphState {
        id,
        depth: Cell::new(0),
        constructing: RefCell::new(Vec::new()),
        participants: RefCell::new(Vec::new()),
      }),
    }
  }

  pub fn graph(&self) -> GraphId {
    self.inner.id
  }

  /// How many resolutions are currently nested in this graph.
  pub fn depth(&self) -> usize {
    self.inner.depth.get()
  }

  pub(crate) fn enter(&self, key: &ServiceKey, max_depth: usize) -> Result<DepthGuard<'_>, ResolveError> {
    let depth = self.inner.depth.get() + 1;
    if depth > max_depth {
      return Err(ResolveError::CyclicTransientScope {
        key: key.clone(),
        depth,
      });
    }
    self.inner.depth.set(depth);
    Ok(DepthGuard { state: &self.inner })
  }

  /// Marks a registration's factory as running. Re-entering the same factory
  /// before it returns is a cycle that no scope can break.
  pub(crate) fn begin_construction(
    &self,
    id: RegistrationId,
    key: &ServiceKey,
  ) -> Result<ConstructionGuard<'_>, ResolveError> {
    let mut constructing = self.inner.constructing.borrow_mut();
    if constructing.contains(&id) {
      return Err(ResolveError::CyclicTransientScope {
        key: key.clone(),
        depth: self.inner.depth.get(),
      });
    }
    constructing.push(id);
    Ok(ConstructionGuard {
      state: &self.inner,
      id,
    })
  }

  /// Records that `container` may hold instances cached for this graph.
  pub(crate) fn join(&self, container: &Arc<Shared>) {
    let mut participants = self.inner.participants.borrow_mut();
    if !participants.iter().any(|p| Arc::ptr_eq(p, container)) {
      participants.push(Arc::clone(container));
    }
  }
}

impl Default for ResolutionContext {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for ResolutionContext {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ResolutionContext")
      .field("graph", &self.inner.id)
      .field("depth", &self.inner.depth.get())
      .finish_non_exhaustive()
  }
}

impl Drop for GraphState {
  fn drop(&mut self) {
    for container in self.participants.get_mut().drain(..) {
      container.graph_resolution_completed(self.id);
    }
    debug!(graph = %self.id, "object graph completed");
  }
}

pub(crate) struct DepthGuard<'a> {
  state: &'a GraphState,
}

impl Drop for DepthGuard<'_> {
  fn drop(&mut self) {
    self.state.depth.set(self.state.depth.get().saturating_sub(1));
  }
}

pub(crate) struct ConstructionGuard<'a> {
  state: &'a GraphState,
  id: RegistrationId,
}

impl Drop for ConstructionGuard<'_> {
  fn drop(&mut self) {
    let mut constructing = self.state.constructing.borrow_mut();
    if let Some(pos) = constructing.iter().rposition(|id| *id == self.id) {
      constructing.remove(pos);
    }
  }
}

/// Keeps a graph registered as the calling thread's active graph.
///
/// Only the guard that installed the graph clears it, so nested calls leave
/// the outer graph in place.
pub(crate) struct ActiveGraph {
  context: ResolutionContext,
  installed: bool,
}

impl ActiveGraph {
  /// Joins the graph already active on this thread, or starts a new one.
  pub(crate) fn enter() -> Self {
    ACTIVE_GRAPH.with(|active| {
      let mut active = active.borrow_mut();
      match active.as_ref() {
        Some(context) => Self {
          context: context.clone(),
          installed: false,
        },
        None => {
          let context = ResolutionContext::new();
          *active = Some(context.clone());
          Self {
            context,
            installed: true,
          }
        }
      }
    })
  }

  /// Makes `context` the active graph unless another graph already is.
  pub(crate) fn install(context: &ResolutionContext) -> Self {
    ACTIVE_GRAPH.with(|active| {
      let mut active = active.borrow_mut();
      let installed = active.is_none();
      if installed {
        *active = Some(context.clone());
      }
      Self {
        context: context.clone(),
        installed,
      }
    })
  }

  pub(crate) fn context(&self) -> &ResolutionContext {
    &self.context
  }
}

impl Drop for ActiveGraph {
  fn drop(&mut self) {
    if self.installed {
      // Taken out first so the graph completes outside the thread-local borrow.
      let previous = ACTIVE_GRAPH.with(|active| active.borrow_mut().take());
      drop(previous);
    }
  }
}
