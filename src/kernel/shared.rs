//! Explicitly shared state between task bodies
//!
//! Only one body runs at a time, so a plain `Cell` behind an `Rc` is enough.
//! Every body that touches a value gets its own handle at construction,
//! which keeps the sharing visible in the body's signature.
//!
//! Values can change while a body is suspended. Re-read after every resume.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// A `Copy` value shared between task bodies on one thread
pub struct Shared<T: Copy> {
    inner: Rc<Cell<T>>,
}

impl<T: Copy> Shared<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(Cell::new(value)),
        }
    }

    pub fn get(&self) -> T {
        self.inner.get()
    }

    pub fn set(&self, value: T) {
        self.inner.set(value);
    }

    /// Apply `f` to the current value and store the result
    pub fn update<F>(&self, f: F) -> T
    where
        F: FnOnce(T) -> T,
    {
        let next = f(self.inner.get());
        self.inner.set(next);
        next
    }
}

impl Shared<bool> {
    /// Flip the flag, returning the new value
    pub fn toggle(&self) -> bool {
        self.update(|v| !v)
    }
}

impl<T: Copy> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Copy + Default> Default for Shared<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Copy + fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Shared").field(&self.get()).finish()
    }
}
