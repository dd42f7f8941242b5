//! Bounded copy with a reusable buffer.
//!
//! Entry data is never copied until EOF: every copy stops at the entry's
//! declared uncompressed size, whatever the decompression stream would
//! still yield.

use std::io::Read;
use std::io::Write;
use std::io::{self};

/// Buffer size for I/O operations (64KB).
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Reusable copy buffer, shared by all entries of one extraction.
///
/// # Examples
///
/// ```
/// use reposweep_core::copy::CopyBuffer;
/// use reposweep_core::copy::copy_bounded;
///
/// let mut buffer = CopyBuffer::new();
/// let mut input: &[u8] = b"0123456789";
/// let mut output = Vec::new();
///
/// let copied = copy_bounded(&mut input, &mut output, 4, &mut buffer).unwrap();
/// assert_eq!(copied, 4);
/// assert_eq!(output, b"0123");
/// ```
#[derive(Debug)]
pub struct CopyBuffer {
    #[allow(clippy::large_stack_arrays)]
    buf: [u8; COPY_BUFFER_SIZE],
}

impl CopyBuffer {
    /// Creates a new zeroed copy buffer.
    #[inline]
    #[must_use]
    #[allow(clippy::large_stack_arrays)]
    pub fn new() -> Self {
        Self {
            buf: [0u8; COPY_BUFFER_SIZE],
        }
    }

    /// Returns the buffer size in bytes.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        COPY_BUFFER_SIZE
    }
}

impl Default for CopyBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Copies at most `limit` bytes from `reader` to `writer`.
///
/// Stops early at EOF. Bytes beyond `limit` are left unread in `reader`.
///
/// # Errors
///
/// Returns an error if reading or writing fails. `Interrupted` reads are
/// retried.
#[allow(clippy::cast_possible_truncation)]
pub fn copy_bounded<R: Read + ?Sized, W: Write + ?Sized>(
    reader: &mut R,
    writer: &mut W,
    limit: u64,
    buffer: &mut CopyBuffer,
) -> io::Result<u64> {
    let mut total: u64 = 0;

    while total < limit {
        // remaining fits in usize whenever it is below the buffer size
        let want = (limit - total).min(COPY_BUFFER_SIZE as u64) as usize;
        let bytes_read = match reader.read(&mut buffer.buf[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        writer.write_all(&buffer.buf[..bytes_read])?;
        total += bytes_read as u64;
    }

    Ok(total)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_copy_buffer_default() {
        let buffer = CopyBuffer::default();
        assert_eq!(buffer.size(), 64 * 1024);
    }

    #[test]
    fn test_copy_empty_source() {
        let mut buffer = CopyBuffer::new();
        let mut input = Cursor::new(Vec::<u8>::new());
        let mut output = Vec::new();

        let copied = copy_bounded(&mut input, &mut output, 100, &mut buffer).unwrap();
        assert_eq!(copied, 0);
        assert!(output.is_empty());
    }

    #[test]
    fn test_copy_shorter_than_limit() {
        let mut buffer = CopyBuffer::new();
        let mut input = Cursor::new(b"Hello, World!");
        let mut output = Vec::new();

        let copied = copy_bounded(&mut input, &mut output, 1000, &mut buffer).unwrap();
        assert_eq!(copied, 13);
        assert_eq!(output, b"Hello, World!");
    }

    #[test]
    fn test_copy_truncates_at_limit() {
        let mut buffer = CopyBuffer::new();
        let mut input = Cursor::new(vec![0x42u8; 1000]);
        let mut output = Vec::new();

        let copied = copy_bounded(&mut input, &mut output, 10, &mut buffer).unwrap();
        assert_eq!(copied, 10);
        assert_eq!(output.len(), 10);
        assert_eq!(input.position(), 10);
    }

    #[test]
    fn test_copy_zero_limit_reads_nothing() {
        let mut buffer = CopyBuffer::new();
        let mut input = Cursor::new(vec![1u8; 16]);
        let mut output = Vec::new();

        assert_eq!(copy_bounded(&mut input, &mut output, 0, &mut buffer).unwrap(), 0);
        assert_eq!(input.position(), 0);
    }

    #[test]
    fn test_copy_multiple_chunks_bounded() {
        let mut buffer = CopyBuffer::new();
        let input_data = vec![0x55u8; COPY_BUFFER_SIZE * 3 + 1000];
        let limit = (COPY_BUFFER_SIZE * 2 + 17) as u64;
        let mut input = Cursor::new(&input_data);
        let mut output = Vec::new();

        let copied = copy_bounded(&mut input, &mut output, limit, &mut buffer).unwrap();
        assert_eq!(copied, limit);
        assert_eq!(output.len() as u64, limit);
    }

    #[test]
    fn test_copy_with_interrupted_reads() {
        use std::io::Error;
        use std::io::ErrorKind;

        struct InterruptedReader {
            data: Vec<u8>,
            position: usize,
            calls: usize,
        }

        impl Read for InterruptedReader {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                self.calls += 1;
                if self.calls % 2 == 1 {
                    return Err(Error::new(ErrorKind::Interrupted, "interrupted"));
                }
                let remaining = self.data.len() - self.position;
                let to_read = remaining.min(buf.len()).min(100);
                buf[..to_read].copy_from_slice(&self.data[self.position..self.position + to_read]);
                self.position += to_read;
                Ok(to_read)
            }
        }

        let mut reader = InterruptedReader {
            data: vec![0x42u8; 1000],
            position: 0,
            calls: 0,
        };
        let mut buffer = CopyBuffer::new();
        let mut output = Vec::new();

        let copied = copy_bounded(&mut reader, &mut output, 1000, &mut buffer).unwrap();
        assert_eq!(copied, 1000);
        assert_eq!(output, vec![0x42u8; 1000]);
    }

    #[test]
    fn test_copy_with_write_failure() {
        struct FailingWriter;

        impl Write for FailingWriter {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(io::Error::other("write failed"))
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut input = Cursor::new(vec![0x42u8; 1000]);
        let mut buffer = CopyBuffer::new();
        let result = copy_bounded(&mut input, &mut FailingWriter, 1000, &mut buffer);

        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::Other);
    }
}
