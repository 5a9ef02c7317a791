//! Write-once cells for references wired after construction.
//!
//! A service taking part in a cycle is published to its scope cache before its
//! dependencies are resolved. The fields that will point at those dependencies
//! start empty and are filled exactly once from a completion hook. Anything
//! reading them before then sees `None` rather than a default value.

use std::fmt;
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;

use crate::error::SlotError;

/// A strong reference filled in after construction.
pub struct Slot<T: ?Sized> {
  cell: OnceCell<Arc<T>>,
}

impl<T: ?Sized> Slot<T> {
  pub fn new() -> Self {
    Self { cell: OnceCell::new() }
  }

  pub fn fill(&self, value: Arc<T>) -> Result<(), SlotError> {
    self.cell.set(value).map_err(|_| SlotError {
      type_name: std::any::type_name::<T>(),
    })
  }

  pub fn get(&self) -> Option<Arc<T>> {
    self.cell.get().cloned()
  }

  pub fn is_filled(&self) -> bool {
    self.cell.get().is_some()
  }
}

impl<T: ?Sized> Default for Slot<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: ?Sized> fmt::Debug for Slot<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Slot").field("filled", &self.is_filled()).finish()
  }
}

/// A back-reference filled in after construction.
///
/// Use this for one side of a cycle so the two instances do not keep each
/// other alive.
pub struct WeakSlot<T: ?Sized> {
  cell: OnceCell<Weak<T>>,
}

impl<T: ?Sized> WeakSlot<T> {
  pub fn new() -> Self {
    Self { cell: OnceCell::new() }
  }

  pub fn fill(&self, value: &Arc<T>) -> Result<(), SlotError> {
    self.cell.set(Arc::downgrade(value)).map_err(|_| SlotError {
      type_name: std::any::type_name::<T>(),
    })
  }

  /// The referenced instance, if the slot is filled and the instance is alive.
  pub fn get(&self) -> Option<Arc<T>> {
    self.cell.get().and_then(Weak::upgrade)
  }

  pub fn is_filled(&self) -> bool {
    self.cell.get().is_some()
  }
}

impl<T: ?Sized> Default for WeakSlot<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: ?Sized> fmt::Debug for WeakSlot<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WeakSlot").field("filled", &self.is_filled()).finish()
  }
}
