use std::ops::{Deref, DerefMut};

use log::warn;

use crate::{error::Error, session::Session};

/// Scoped transaction control.
///
/// Begins a transaction on construction and rolls it back on drop unless
/// [`Transaction::commit`] was called. Dereferences to the session, so
/// statements run inside the transaction as usual:
///
/// ```no_run
/// use sqlbind::{Session, Transaction};
///
/// # fn main() -> Result<(), sqlbind::Error> {
/// # let mut session = Session::open("sqlite3://db=:memory:")?;
/// let mut tx = Transaction::new(&mut session)?;
/// tx.once("delete from t").execute()?;
/// tx.commit()?;
/// # Ok(())
/// # }
/// ```
pub struct Transaction<'s> {
    session: &'s mut Session,
    handled: bool,
}

impl<'s> Transaction<'s> {
    pub fn new(session: &'s mut Session) -> Result<Self, Error> {
        session.begin()?;
        Ok(Transaction {
            session,
            handled: false,
        })
    }

    pub fn commit(mut self) -> Result<(), Error> {
        self.session.commit()?;
        self.handled = true;
        Ok(())
    }

    pub fn rollback(mut self) -> Result<(), Error> {
        self.session.rollback()?;
        self.handled = true;
        Ok(())
    }
}

impl Deref for Transaction<'_> {
    type Target = Session;

    fn deref(&self) -> &Session {
        self.session
    }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut Session {
        self.session
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.handled {
            // A rollback failure during unwinding must not mask the error
            // that caused it.
            if let Err(error) = self.session.rollback() {
                warn!("Failed to roll back transaction during drop: {error}");
            }
        }
    }
}
