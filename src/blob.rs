use crate::{backend::BlobBackend, error::Error, session::Session};

/// An owning handle to a large object, backed by the session it was created
/// from.
///
/// How the object is stored is a driver concern; this handle only exposes
/// offset based reads and writes. Writes past the current length zero-fill
/// the gap, so `offset + n <= len()` holds after every successful write.
pub struct Blob {
    backend: Box<dyn BlobBackend>,
}

impl Blob {
    pub fn new(session: &mut Session) -> Result<Self, Error> {
        Ok(Blob {
            backend: session.backend_mut().make_blob()?,
        })
    }

    /// Current length of the object in bytes.
    pub fn len(&mut self) -> Result<usize, Error> {
        self.backend.len()
    }

    pub fn is_empty(&mut self) -> Result<bool, Error> {
        Ok(self.len()? == 0)
    }

    /// Reads up to `buf.len()` bytes starting at `offset` into `buf`.
    /// Returns the number of bytes read.
    pub fn read_from_start(&mut self, buf: &mut [u8], offset: usize) -> Result<usize, Error> {
        self.backend.read_from_start(buf, offset)
    }

    /// Writes `data` starting at `offset`, extending the object as needed.
    /// Returns the number of bytes written.
    pub fn write_from_start(&mut self, data: &[u8], offset: usize) -> Result<usize, Error> {
        self.backend.write_from_start(data, offset)
    }

    /// Appends `data` to the object. Returns the number of bytes written.
    pub fn append(&mut self, data: &[u8]) -> Result<usize, Error> {
        self.backend.append(data)
    }

    /// Truncates the object to `new_len` bytes.
    pub fn trim(&mut self, new_len: usize) -> Result<(), Error> {
        self.backend.trim(new_len)
    }

    /// Replaces the whole object.
    pub(crate) fn assign(&mut self, data: &[u8]) -> Result<(), Error> {
        self.backend.trim(0)?;
        if !data.is_empty() {
            self.backend.write_from_start(data, 0)?;
        }
        Ok(())
    }

    pub(crate) fn read_all(&mut self) -> Result<Vec<u8>, Error> {
        let len = self.backend.len()?;
        let mut buf = vec![0; len];
        let read = self.backend.read_from_start(&mut buf, 0)?;
        buf.truncate(read);
        Ok(buf)
    }
}
