//! Growable-buffer reader over an `AsyncRead`.
//!
//! Bytes land in one `BytesMut`. Every chunk handed out is split off and
//! frozen, so the caller owns it outright and the reader never writes into
//! memory someone else can see.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{CipherError, CipherResult};

#[derive(Debug)]
pub struct BlockReader<R> {
    inner: R,
    buf: BytesMut,
    eof: bool,
}

/// A chunk and whether the input is exhausted after it.
#[derive(Debug)]
pub struct Chunk {
    pub bytes: Bytes,
    pub done: bool,
}

impl<R: AsyncRead + Unpin> BlockReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::new(),
            eof: false,
        }
    }

    /// Pull from the inner reader until `want` bytes are buffered or input
    /// ends.
    async fn fill_to(&mut self, want: usize) -> CipherResult<()> {
        while self.buf.len() < want && !self.eof {
            self.buf.reserve(want - self.buf.len());
            if self.inner.read_buf(&mut self.buf).await? == 0 {
                self.eof = true;
            }
        }
        Ok(())
    }

    fn split(&mut self, len: usize) -> Chunk {
        let bytes = self.buf.split_to(len.min(self.buf.len())).freeze();
        Chunk {
            bytes,
            done: self.eof && self.buf.is_empty(),
        }
    }

    /// Exactly `len` bytes, or fewer only when input ended first.
    pub async fn read_fill(&mut self, len: usize) -> CipherResult<Chunk> {
        self.fill_to(len).await?;
        Ok(self.split(len))
    }

    /// Up to `max` bytes. `done` is exact: it looks one byte ahead so the
    /// last chunk of the input reports it.
    pub async fn read_available(&mut self, max: usize) -> CipherResult<Chunk> {
        self.fill_to(max.saturating_add(1)).await?;
        Ok(self.split(max))
    }

    /// Everything left, failing past `limit` bytes.
    pub async fn read_to_limit(&mut self, limit: usize) -> CipherResult<Chunk> {
        self.fill_to(limit.saturating_add(1)).await?;
        if self.buf.len() > limit {
            return Err(CipherError::SizeMismatch {
                what: "message",
                expected: limit,
                actual: self.buf.len(),
            });
        }
        Ok(self.split(limit))
    }

    pub fn is_done(&self) -> bool {
        self.eof && self.buf.is_empty()
    }

    /// Release the underlying reader. Buffered bytes are discarded.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_read_fill_exact_and_short() {
        let mut reader = BlockReader::new(&b"0123456789"[..]);
        let chunk = reader.read_fill(4).await.unwrap();
        assert_eq!(&chunk.bytes[..], b"0123");
        assert!(!chunk.done);

        let chunk = reader.read_fill(10).await.unwrap();
        assert_eq!(&chunk.bytes[..], b"456789");
        assert!(chunk.done);

        let chunk = reader.read_fill(4).await.unwrap();
        assert!(chunk.bytes.is_empty());
        assert!(chunk.done);
    }

    #[tokio::test]
    async fn test_read_available_reports_done_on_last_chunk() {
        let mut reader = BlockReader::new(&b"abcdef"[..]);
        let chunk = reader.read_available(3).await.unwrap();
        assert_eq!(&chunk.bytes[..], b"abc");
        assert!(!chunk.done);

        let chunk = reader.read_available(3).await.unwrap();
        assert_eq!(&chunk.bytes[..], b"def");
        assert!(chunk.done, "exact-size final chunk must be flagged done");
        assert!(reader.is_done());
    }

    #[tokio::test]
    async fn test_empty_input() {
        let mut reader = BlockReader::new(&b""[..]);
        let chunk = reader.read_available(16).await.unwrap();
        assert!(chunk.bytes.is_empty());
        assert!(chunk.done);
    }

    #[tokio::test]
    async fn test_fills_across_many_small_writes() {
        let (mut tx, rx) = tokio::io::duplex(4);
        let writer = tokio::spawn(async move {
            for piece in [&b"he"[..], b"ll", b"o ", b"world"] {
                tx.write_all(piece).await.unwrap();
            }
        });

        let mut reader = BlockReader::new(rx);
        let chunk = reader.read_fill(11).await.unwrap();
        assert_eq!(&chunk.bytes[..], b"hello world");
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_read_available_never_returns_an_empty_unfinished_chunk() {
        let (mut tx, rx) = tokio::io::duplex(2);
        let writer = tokio::spawn(async move {
            for piece in [&b"ab"[..], b"cd", b"ef"] {
                tx.write_all(piece).await.unwrap();
                tokio::task::yield_now().await;
            }
        });

        let mut reader = BlockReader::new(rx);
        let chunk = reader.read_available(4).await.unwrap();
        assert_eq!(&chunk.bytes[..], b"abcd");
        assert!(!chunk.done);

        let chunk = reader.read_available(4).await.unwrap();
        assert_eq!(&chunk.bytes[..], b"ef");
        assert!(chunk.done);

        let chunk = reader.read_available(4).await.unwrap();
        assert!(chunk.bytes.is_empty());
        assert!(chunk.done);
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_handed_out_chunks_are_independent() {
        let mut reader = BlockReader::new(&b"aaaabbbb"[..]);
        let first = reader.read_fill(4).await.unwrap().bytes;
        let second = reader.read_fill(4).await.unwrap().bytes;
        assert_eq!(&first[..], b"aaaa");
        assert_eq!(&second[..], b"bbbb");
    }

    #[tokio::test]
    async fn test_read_to_limit() {
        let mut reader = BlockReader::new(&b"12345"[..]);
        assert!(reader.read_to_limit(4).await.is_err());

        let mut reader = BlockReader::new(&b"12345"[..]);
        let chunk = reader.read_to_limit(5).await.unwrap();
        assert_eq!(&chunk.bytes[..], b"12345");
        assert!(chunk.done);
    }
}
