#![forbid(unsafe_code)]

//! Byte-stream utilities: store-tee reader, copy helper, hex rendering.

use std::io::{Read, Write};

/// A reader that copies every byte read through it into a secondary "store"
/// sink.  The sink sees exactly the consumed bytes; it never affects what
/// the wrapped reader returns.
pub struct StoreInputStream<R, W> {
    inner: R,
    store: W,
}

impl<R: Read, W: Write> StoreInputStream<R, W> {
    pub fn new(inner: R, store: W) -> Self {
        Self { inner, store }
    }

    /// Flush the store sink and return both halves.
    pub fn into_parts(mut self) -> std::io::Result<(R, W)> {
        self.store.flush()?;
        Ok((self.inner, self.store))
    }
}

impl<R: Read, W: Write> Read for StoreInputStream<R, W> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.store.write_all(&buf[..n])?;
        Ok(n)
    }
}

/// Read a stream to the end into a buffer.
pub fn read_all<R: Read>(mut reader: R) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Render bytes as lowercase hex.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tee_copies_consumed_bytes() {
        let data = b"raw transport bytes";
        let mut tee = StoreInputStream::new(&data[..], Vec::new());
        let out = read_all(&mut tee).unwrap();
        let (_, store) = tee.into_parts().unwrap();
        assert_eq!(out, data);
        assert_eq!(store, data);
    }

    #[test]
    fn tee_partial_read() {
        let data = b"0123456789";
        let mut tee = StoreInputStream::new(&data[..], Vec::new());
        let mut buf = [0u8; 4];
        tee.read_exact(&mut buf).unwrap();
        let (_, store) = tee.into_parts().unwrap();
        assert_eq!(store, b"0123");
    }

    #[test]
    fn hex_rendering() {
        assert_eq!(to_hex(&[0x00, 0xAB, 0x10]), "00ab10");
    }
}
