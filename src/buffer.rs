//! A sliding byte window over the unread prefix of a chunked input stream.

use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;

use crate::error::MultipartParseError;

/// Once the dropped prefix exceeds this fraction of the buffer's allocated
/// capacity, the remaining bytes are compacted down to offset 0. Compacting
/// eagerly on every [`ChunkBuffer::drop_prefix`] call would turn a stream of
/// many small boundary matches into an O(n^2) memmove; amortizing over a
/// capacity fraction keeps each compaction roughly proportional to the
/// bytes actually still live.
const COMPACT_THRESHOLD_NUM: usize = 1;
const COMPACT_THRESHOLD_DEN: usize = 2;

/// Owns a contiguous byte window over an input stream.
///
/// Bytes are appended via [`ChunkBuffer::pull`] and consumed from the front
/// via [`ChunkBuffer::drop_prefix`]. Indices passed to [`ChunkBuffer::slice`],
/// [`ChunkBuffer::byte_at`], and [`ChunkBuffer::index_of`] are always
/// relative to the current logical start of the buffer (index `0` is always
/// the first not-yet-dropped byte), regardless of how much has been dropped
/// so far.
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    data: Vec<u8>,
    head: usize,
    upstream_done: bool,
}

impl ChunkBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of currently buffered, undropped bytes.
    pub fn len(&self) -> usize {
        self.data.len() - self.head
    }

    /// Returns `true` when no bytes are currently buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` once the upstream byte source has been fully drained.
    pub fn upstream_done(&self) -> bool {
        self.upstream_done
    }

    /// Returns the byte at logical offset `index`, if buffered.
    pub fn byte_at(&self, index: usize) -> Option<u8> {
        self.data.get(self.head + index).copied()
    }

    /// Returns the buffered bytes in `[start, end)`, relative to the
    /// logical start of the buffer.
    ///
    /// Panics if the range is out of bounds, matching slice-indexing
    /// semantics elsewhere in the crate.
    pub fn slice(&self, start: usize, end: usize) -> &[u8] {
        &self.data[self.head + start..self.head + end]
    }

    /// Returns all currently buffered bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.head..]
    }

    /// Returns the logical index of the first occurrence of `pattern` at or
    /// after `start`, or `None` if no match is present in the currently
    /// buffered bytes.
    pub fn index_of(&self, pattern: &[u8], start: usize) -> Option<usize> {
        if pattern.is_empty() {
            return Some(start);
        }

        let haystack = self.as_slice();
        if start >= haystack.len() {
            return None;
        }

        haystack[start..]
            .windows(pattern.len())
            .position(|window| window == pattern)
            .map(|relative| relative + start)
    }

    /// Discards the first `n` logical bytes.
    ///
    /// Panics if `n` exceeds [`ChunkBuffer::len`].
    pub fn drop_prefix(&mut self, n: usize) {
        assert!(n <= self.len(), "drop_prefix: n exceeds buffered length");
        self.head += n;

        if self.head * COMPACT_THRESHOLD_DEN >= self.data.capacity() * COMPACT_THRESHOLD_NUM {
            self.data.drain(..self.head);
            self.head = 0;
        }
    }

    /// Copies out and returns the buffered bytes in `[start, end)` as an
    /// owned, reference-counted [`Bytes`] value, without dropping them from
    /// the buffer.
    pub fn copy_range(&self, start: usize, end: usize) -> Bytes {
        Bytes::copy_from_slice(self.slice(start, end))
    }

    /// Awaits and appends the next chunk from `stream`.
    ///
    /// Returns `Poll::Ready(Ok(true))` if a chunk (possibly empty) was
    /// appended and more may follow, `Poll::Ready(Ok(false))` once the
    /// stream is exhausted, and propagates `Poll::Pending` and upstream
    /// errors unchanged.
    pub fn poll_pull<S>(
        &mut self,
        cx: &mut Context<'_>,
        stream: &mut S,
    ) -> Poll<Result<bool, MultipartParseError>>
    where
        S: Stream<Item = Result<Bytes, MultipartParseError>> + Unpin,
    {
        match std::pin::Pin::new(stream).poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(chunk))) => {
                self.data.extend_from_slice(&chunk);
                Poll::Ready(Ok(true))
            }
            Poll::Ready(Some(Err(err))) => Poll::Ready(Err(err)),
            Poll::Ready(None) => {
                self.upstream_done = true;
                Poll::Ready(Ok(false))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn block_on<F: std::future::Future>(fut: F) -> F::Output {
        futures::executor::block_on(fut)
    }

    #[test]
    fn drop_prefix_resets_logical_indices() {
        let mut buf = ChunkBuffer::new();
        let mut source = stream::iter([Ok(Bytes::from_static(b"hello world"))]);
        block_on(futures::future::poll_fn(|cx| {
            buf.poll_pull(cx, &mut source)
        }))
        .unwrap();

        assert_eq!(buf.len(), 11);
        buf.drop_prefix(6);
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.as_slice(), b"world");
        assert_eq!(buf.byte_at(0), Some(b'w'));
    }

    #[test]
    fn index_of_finds_pattern_after_drop() {
        let mut buf = ChunkBuffer::new();
        let mut source = stream::iter([Ok(Bytes::from_static(b"abc--X--def"))]);
        block_on(futures::future::poll_fn(|cx| {
            buf.poll_pull(cx, &mut source)
        }))
        .unwrap();

        buf.drop_prefix(3);
        assert_eq!(buf.index_of(b"--X--", 0), Some(0));
        assert_eq!(buf.index_of(b"def", 0), Some(5));
        assert_eq!(buf.index_of(b"zzz", 0), None);
    }

    #[test]
    fn compacts_after_many_small_drops() {
        let mut buf = ChunkBuffer::new();
        let mut source = stream::iter([Ok(Bytes::from(vec![b'x'; 4096]))]);
        block_on(futures::future::poll_fn(|cx| {
            buf.poll_pull(cx, &mut source)
        }))
        .unwrap();

        for _ in 0..2048 {
            buf.drop_prefix(1);
        }

        assert_eq!(buf.len(), 2048);
        assert!(buf.head <= buf.len());
    }
}
