//! Lazy sequential reader over remotely-fetched byte chunks.

use std::io::{self, Read};

use bytes::{Buf, Bytes};

use crate::store::ChunkIter;

/// Adapts a chunk sequence into an ordinary `Read` source.
///
/// Forward-only: one cursor over the flattened chunk sequence, no seeking,
/// no rereading.
pub struct StreamAdapter {
    chunks: ChunkIter,
    current: Bytes,
    bytes_delivered: u64,
}

impl StreamAdapter {
    pub fn new(chunks: ChunkIter) -> Self {
        Self {
            chunks,
            current: Bytes::new(),
            bytes_delivered: 0,
        }
    }

    /// Wrap an already-buffered payload.
    pub fn from_buffer(payload: Bytes) -> Self {
        Self::new(Box::new(std::iter::once(Ok(payload))))
    }

    /// Total bytes handed to callers so far.
    pub fn bytes_delivered(&self) -> u64 {
        self.bytes_delivered
    }
}

impl Read for StreamAdapter {
    /// Fills `buf` across chunk boundaries; a short (possibly zero) read
    /// means end-of-data.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut written = 0;
        while written < buf.len() {
            if self.current.is_empty() {
                match self.chunks.next() {
                    Some(Ok(chunk)) => {
                        self.current = chunk;
                        continue;
                    }
                    Some(Err(err)) => return Err(io::Error::new(io::ErrorKind::Other, err)),
                    None => break,
                }
            }
            let n = (buf.len() - written).min(self.current.len());
            buf[written..written + n].copy_from_slice(&self.current[..n]);
            self.current.advance(n);
            written += n;
        }
        self.bytes_delivered += written as u64;
        Ok(written)
    }
}
