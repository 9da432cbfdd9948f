use std::cell::{Ref, RefCell, RefMut};

use crate::error::Error;

/// A host variable which can be bound to a statement.
///
/// Bindings hold a shared borrow of the variable for as long as the statement
/// lives, while fetches must write through it and the application wants to
/// read the value between fetches. `Var` resolves this with a dynamically
/// checked cell: the statement only borrows the value inside `execute` and
/// `fetch`, so any access outside of those calls is conflict free.
///
/// ```
/// use sqlbind::Var;
///
/// let count = Var::new(0_i64);
/// count.set(3);
/// assert_eq!(3, count.get());
/// ```
///
/// Holding on to a guard returned by [`Var::borrow`] across a fetch makes the
/// fetch fail with a usage error instead of delivering the row.
pub struct Var<T> {
    cell: RefCell<T>,
}

impl<T> Var<T> {
    pub fn new(value: T) -> Self {
        Self {
            cell: RefCell::new(value),
        }
    }

    /// A copy of the current value.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.cell.borrow().clone()
    }

    /// Overwrites the current value.
    pub fn set(&self, value: T) {
        *self.cell.borrow_mut() = value;
    }

    /// Moves the current value out, leaving the default in its place.
    pub fn take(&self) -> T
    where
        T: Default,
    {
        self.cell.take()
    }

    /// Replaces the current value, returning the previous one.
    pub fn replace(&self, value: T) -> T {
        self.cell.replace(value)
    }

    /// Borrows the value in place. Useful for types which are expensive to
    /// clone, like a [`crate::Row`]. Do not hold the guard across a fetch.
    pub fn borrow(&self) -> Ref<'_, T> {
        self.cell.borrow()
    }

    /// Mutably borrows the value in place.
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.cell.borrow_mut()
    }

    pub(crate) fn try_read(&self) -> Result<Ref<'_, T>, Error> {
        self.cell
            .try_borrow()
            .map_err(|_| Error::Usage("Bound variable is borrowed during data exchange.".to_string()))
    }

    pub(crate) fn try_write(&self) -> Result<RefMut<'_, T>, Error> {
        self.cell.try_borrow_mut().map_err(|_| {
            Error::Usage("Bound variable is borrowed during data exchange.".to_string())
        })
    }
}

impl<T: Default> Default for Var<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Var<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.cell.try_borrow() {
            Ok(value) => write!(f, "Var({value:?})"),
            Err(_) => write!(f, "Var(<borrowed>)"),
        }
    }
}
