//! Big-endian cursor over a shared byte buffer.
//!
//! All binary stream formats are read through [`ByteReader`]. Slices handed
//! out by the reader share the underlying [`Bytes`] allocation, which is what
//! lets record items stay undecoded until they are iterated.

use bytes::Bytes;
use mirror_common::{Hash384, HASH384_LEN};

use crate::error::{Result, StreamError};

/// Sequential reader with bounds-checked big-endian primitives.
#[derive(Debug, Clone)]
pub struct ByteReader {
    data: Bytes,
    pos: usize,
    context: &'static str,
}

impl ByteReader {
    /// Creates a reader positioned at the start of `data`.
    ///
    /// `context` names the format being read and prefixes every error.
    pub fn new(data: Bytes, context: &'static str) -> Self {
        Self {
            data,
            pos: 0,
            context,
        }
    }

    /// Current offset from the start of the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&[u8]> {
        if self.remaining() < n {
            return Err(StreamError::Truncated {
                context: self.context,
                needed: n,
                remaining: self.remaining(),
            });
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.data[start..self.pos])
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(i32::from_be_bytes(buf))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(i64::from_be_bytes(buf))
    }

    /// Reads a raw 48-byte hash.
    pub fn read_hash(&mut self) -> Result<Hash384> {
        let mut buf = [0u8; HASH384_LEN];
        buf.copy_from_slice(self.take(HASH384_LEN)?);
        Ok(Hash384(buf))
    }

    /// Reads `n` bytes as a zero-copy slice.
    pub fn read_bytes(&mut self, n: usize) -> Result<Bytes> {
        self.take(n)?;
        Ok(self.data.slice(self.pos - n..self.pos))
    }

    /// Reads an `i32` length followed by that many bytes.
    ///
    /// Lengths that are negative or larger than `max` are rejected before any
    /// allocation happens.
    pub fn read_length_prefixed(&mut self, max: usize) -> Result<Bytes> {
        let len = self.read_i32()?;
        if len < 0 || len as usize > max {
            return Err(StreamError::InvalidLength {
                context: self.context,
                length: i64::from(len),
            });
        }
        self.read_bytes(len as usize)
    }

    /// Reads a byte and checks it against an expected marker.
    pub fn expect_u8(&mut self, expected: u8) -> Result<()> {
        let found = self.read_u8()?;
        if found != expected {
            return Err(self.bad_marker(i64::from(expected), i64::from(found)));
        }
        Ok(())
    }

    /// Reads an `i32` and checks it against an expected constant.
    pub fn expect_i32(&mut self, expected: i32) -> Result<()> {
        let found = self.read_i32()?;
        if found != expected {
            return Err(self.bad_marker(i64::from(expected), i64::from(found)));
        }
        Ok(())
    }

    /// Reads an `i64` and checks it against an expected constant.
    pub fn expect_i64(&mut self, expected: i64) -> Result<()> {
        let found = self.read_i64()?;
        if found != expected {
            return Err(self.bad_marker(expected, found));
        }
        Ok(())
    }

    /// Returns the next byte without consuming it.
    pub fn peek_u8(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Returns the bytes between `start` and the current position.
    pub fn slice_from(&self, start: usize) -> Bytes {
        self.data.slice(start..self.pos)
    }

    /// Returns everything not yet read, consuming it.
    pub fn read_rest(&mut self) -> Bytes {
        let rest = self.data.slice(self.pos..);
        self.pos = self.data.len();
        rest
    }

    /// Fails if any bytes remain unread.
    pub fn finish(&self) -> Result<()> {
        if !self.is_empty() {
            return Err(StreamError::TrailingBytes {
                context: self.context,
                count: self.remaining(),
            });
        }
        Ok(())
    }

    fn bad_marker(&self, expected: i64, found: i64) -> StreamError {
        StreamError::BadMarker {
            context: self.context,
            expected,
            found,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_big_endian_values() {
        let mut data = vec![7u8];
        data.extend_from_slice(&(-2i32).to_be_bytes());
        data.extend_from_slice(&0x0102_0304_0506_0708i64.to_be_bytes());
        let mut reader = ByteReader::new(Bytes::from(data), "test");

        assert_eq!(reader.read_u8().unwrap(), 7);
        assert_eq!(reader.read_i32().unwrap(), -2);
        assert_eq!(reader.read_i64().unwrap(), 0x0102_0304_0506_0708);
        assert!(reader.finish().is_ok());
    }

    #[test]
    fn test_truncated_read() {
        let mut reader = ByteReader::new(Bytes::from_static(&[0, 0]), "test");
        let err = reader.read_i32().unwrap_err();
        assert!(matches!(
            err,
            StreamError::Truncated {
                needed: 4,
                remaining: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_length_prefixed_bounds() {
        let mut data = Vec::new();
        data.extend_from_slice(&(-1i32).to_be_bytes());
        let mut reader = ByteReader::new(Bytes::from(data), "test");
        assert!(matches!(
            reader.read_length_prefixed(10),
            Err(StreamError::InvalidLength { length: -1, .. })
        ));

        let mut data = Vec::new();
        data.extend_from_slice(&3i32.to_be_bytes());
        data.extend_from_slice(b"abc");
        let mut reader = ByteReader::new(Bytes::from(data), "test");
        assert_eq!(reader.read_length_prefixed(10).unwrap(), Bytes::from_static(b"abc"));
    }

    #[test]
    fn test_marker_and_trailing() {
        let mut reader = ByteReader::new(Bytes::from_static(&[1, 2]), "test");
        assert!(matches!(
            reader.expect_u8(9),
            Err(StreamError::BadMarker {
                expected: 9,
                found: 1,
                ..
            })
        ));
        assert!(matches!(
            reader.finish(),
            Err(StreamError::TrailingBytes { count: 1, .. })
        ));
    }

    #[test]
    fn test_slice_from_shares_buffer() {
        let mut reader = ByteReader::new(Bytes::from_static(b"hello world"), "test");
        let start = reader.position();
        reader.read_bytes(5).unwrap();
        assert_eq!(reader.slice_from(start), Bytes::from_static(b"hello"));
        assert_eq!(reader.read_rest(), Bytes::from_static(b" world"));
    }
}
