//! CRC-64 footer support for the graph file

use crc::{Crc, CRC_64_GO_ISO};
use std::io::{self, Read, Write};

/// CRC-64 (GO-ISO polynomial)
pub const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_GO_ISO);

pub fn checksum(data: &[u8]) -> u64 {
    CRC64.checksum(data)
}

/// Writer that checksums everything passing through it
pub struct CrcWriter<W> {
    inner: W,
    digest: crc::Digest<'static, u64>,
}

impl<W: Write> CrcWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            digest: CRC64.digest(),
        }
    }

    /// Write the checksum of everything so far and hand back the writer
    pub fn finish(mut self) -> io::Result<W> {
        let sum = self.digest.finalize();
        self.inner.write_all(&sum.to_le_bytes())?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for CrcWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.digest.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Reader that checksums everything read through it
pub struct CrcReader<R> {
    inner: R,
    digest: crc::Digest<'static, u64>,
}

impl<R: Read> CrcReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            digest: CRC64.digest(),
        }
    }

    /// Checksum of everything read so far, plus the stored footer that follows
    pub fn finish(mut self) -> io::Result<(u64, u64)> {
        let computed = self.digest.finalize();
        let mut footer = [0u8; 8];
        self.inner.read_exact(&mut footer)?;
        Ok((computed, u64::from_le_bytes(footer)))
    }
}

impl<R: Read> Read for CrcReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.digest.update(&buf[..n]);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_appends_checksum() {
        let mut w = CrcWriter::new(Vec::new());
        w.write_all(b"hello ").unwrap();
        w.write_all(b"world").unwrap();
        let out = w.finish().unwrap();
        assert_eq!(&out[..11], b"hello world");
        assert_eq!(out[11..], checksum(b"hello world").to_le_bytes());
    }

    #[test]
    fn test_reader_verifies_footer() {
        let mut data = b"payload".to_vec();
        data.extend_from_slice(&checksum(b"payload").to_le_bytes());

        let mut r = CrcReader::new(&data[..]);
        let mut buf = [0u8; 7];
        r.read_exact(&mut buf).unwrap();
        let (computed, stored) = r.finish().unwrap();
        assert_eq!(computed, stored);
    }
}
