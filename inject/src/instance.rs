//! Type-erased handles to constructed services.
//!
//! Every service is held as an `Arc<T>`, where `T` may be a trait object.
//! The caches only need to clone, downgrade and downcast those handles, so the
//! concrete `Arc<T>` is hidden behind a small object-safe trait.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

trait SharedInstance: Send + Sync {
  fn as_any(&self) -> &dyn Any;
  fn clone_boxed(&self) -> Box<dyn SharedInstance>;
  fn downgrade(&self) -> Box<dyn WeakInstance>;
}

trait WeakInstance: Send + Sync {
  fn upgrade(&self) -> Option<Box<dyn SharedInstance>>;
}

impl<T: ?Sized + Send + Sync + 'static> SharedInstance for Arc<T> {
  fn as_any(&self) -> &dyn Any {
    self
  }

  fn clone_boxed(&self) -> Box<dyn SharedInstance> {
    Box::new(Arc::clone(self))
  }

  fn downgrade(&self) -> Box<dyn WeakInstance> {
    Box::new(Arc::downgrade(self))
  }
}

impl<T: ?Sized + Send + Sync + 'static> WeakInstance for Weak<T> {
  fn upgrade(&self) -> Option<Box<dyn SharedInstance>> {
    Weak::upgrade(self).map(|strong| Box::new(strong) as Box<dyn SharedInstance>)
  }
}

/// A strong, type-erased reference to a service instance.
pub(crate) struct Instance(Box<dyn SharedInstance>);

impl Instance {
  pub(crate) fn new<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
    Self(Box::new(value))
  }

  pub(crate) fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
    self.0.as_any().downcast_ref::<Arc<T>>().cloned()
  }

  pub(crate) fn downgrade(&self) -> WeakRef {
    WeakRef(self.0.downgrade())
  }
}

impl Clone for Instance {
  fn clone(&self) -> Self {
    Self(self.0.clone_boxed())
  }
}

impl fmt::Debug for Instance {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Instance").finish_non_exhaustive()
  }
}

/// A weak, type-erased reference that does not keep the instance alive.
pub(crate) struct WeakRef(Box<dyn WeakInstance>);

impl WeakRef {
  pub(crate) fn upgrade(&self) -> Option<Instance> {
    self.0.upgrade().map(Instance)
  }
}
