use crate::{backend::BlobBackend, error::Error};

/// Large objects are buffered in memory and exchanged as ordinary blob
/// cells; sqlite has no server side large object storage.
#[derive(Default)]
pub(crate) struct Sqlite3Blob {
    data: Vec<u8>,
}

impl BlobBackend for Sqlite3Blob {
    fn len(&mut self) -> Result<usize, Error> {
        Ok(self.data.len())
    }

    fn read_from_start(&mut self, buf: &mut [u8], offset: usize) -> Result<usize, Error> {
        if offset > self.data.len() {
            return Err(Error::Usage(
                "Cannot read past-the-end of BLOB data.".to_string(),
            ));
        }
        let available = self.data.len() - offset;
        let n = buf.len().min(available);
        buf[..n].copy_from_slice(&self.data[offset..offset + n]);
        Ok(n)
    }

    fn write_from_start(&mut self, data: &[u8], offset: usize) -> Result<usize, Error> {
        let end = offset + data.len();
        // Writes past the current length zero-fill the gap.
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[offset..end].copy_from_slice(data);
        Ok(data.len())
    }

    fn append(&mut self, data: &[u8]) -> Result<usize, Error> {
        self.data.extend_from_slice(data);
        Ok(data.len())
    }

    fn trim(&mut self, new_len: usize) -> Result<(), Error> {
        if new_len > self.data.len() {
            return Err(Error::Usage(
                "Cannot extend BLOB data by trimming it.".to_string(),
            ));
        }
        self.data.truncate(new_len);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_past_the_end_zero_fill() {
        let mut blob = Sqlite3Blob::default();
        blob.write_from_start(b"xy", 4).unwrap();
        assert_eq!(6, blob.len().unwrap());
        let mut buf = [0xff_u8; 6];
        assert_eq!(6, blob.read_from_start(&mut buf, 0).unwrap());
        assert_eq!(b"\0\0\0\0xy", &buf);
    }

    #[test]
    fn reads_are_clamped_to_the_length() {
        let mut blob = Sqlite3Blob::default();
        blob.append(b"hello").unwrap();
        let mut buf = [0_u8; 16];
        assert_eq!(3, blob.read_from_start(&mut buf, 2).unwrap());
        assert_eq!(b"llo", &buf[..3]);
        assert!(blob.read_from_start(&mut buf, 6).is_err());
    }

    #[test]
    fn trim_only_shrinks() {
        let mut blob = Sqlite3Blob::default();
        blob.append(b"hello").unwrap();
        blob.trim(2).unwrap();
        assert_eq!(2, blob.len().unwrap());
        assert!(blob.trim(10).is_err());
    }
}
