//! [`PartStream`]: the per-part handle surfaced to callers.
//!
//! A `PartStream` shares the session's [`crate::parser::scanner::BoundaryScanner`]
//! state for the lifetime of one part (`PartStream<'a, S>` borrows it
//! mutably), so the borrow checker — not a runtime check — enforces that at
//! most one part is "active" at a time (§4.3, §9 of the design notes).

use std::{
    fmt,
    pin::Pin,
    task::{Context, Poll},
};

use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::error::MultipartParseError;
use crate::parser::headers::RawHeaders;
use crate::parser::scanner::{BoundaryScanner, PartHeaderBlock};

/// A single parsed multipart part: headers plus a lazy payload byte stream.
///
/// Obtained from [`crate::Multipart::next_part`]. `headers`, `name`,
/// `filename`, `media_type`, and `is_file` are available immediately; the
/// payload is only read on demand via [`PartStream::body`],
/// [`PartStream::bytes`], or [`PartStream::text`].
pub struct PartStream<'a, S> {
    header_block: PartHeaderBlock,
    scanner: &'a mut BoundaryScanner<S>,
    consumed: bool,
}

impl<S> fmt::Debug for PartStream<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartStream")
            .field("name", &self.header_block.name)
            .field("filename", &self.header_block.filename)
            .field("media_type", &self.header_block.media_type)
            .field("consumed", &self.consumed)
            .finish()
    }
}

impl<'a, S> PartStream<'a, S> {
    pub(crate) fn new(header_block: PartHeaderBlock, scanner: &'a mut BoundaryScanner<S>) -> Self {
        Self {
            header_block,
            scanner,
            consumed: false,
        }
    }

    /// Returns the parsed, ordered, case-insensitive header multimap.
    pub fn headers(&self) -> &RawHeaders {
        &self.header_block.raw
    }

    /// Returns the `name` parameter of `Content-Disposition`, if present.
    pub fn name(&self) -> Option<&str> {
        self.header_block.name.as_deref()
    }

    /// Returns the `filename`/`filename*` parameter of `Content-Disposition`,
    /// if present.
    pub fn filename(&self) -> Option<&str> {
        self.header_block.filename.as_deref()
    }

    /// Returns the part's `Content-Type`, defaulting to
    /// `application/octet-stream` when the header is absent (RFC 7578).
    pub fn media_type(&self) -> &str {
        &self.header_block.media_type
    }

    /// Returns `true` iff this part carries a `filename`.
    pub fn is_file(&self) -> bool {
        self.header_block.is_file()
    }

    /// Returns `true` once [`PartStream::body`] (or a convenience built on
    /// top of it) has been called.
    pub fn is_consumed(&self) -> bool {
        self.consumed
    }
}

impl<'a, S> PartStream<'a, S>
where
    S: Stream<Item = Result<Bytes, MultipartParseError>> + Unpin,
{
    /// Returns a lazy byte stream over this part's payload.
    ///
    /// Can only be called once per part: a second call raises
    /// [`MultipartParseError::StreamAlreadyConsumed`].
    pub fn body(&mut self) -> Result<PartBody<'_, S>, MultipartParseError> {
        if self.consumed {
            return Err(MultipartParseError::StreamAlreadyConsumed);
        }
        self.consumed = true;

        Ok(PartBody {
            scanner: &mut *self.scanner,
            finished: false,
        })
    }

    /// Reads and concatenates the entire payload.
    ///
    /// Equivalent to draining [`PartStream::body`] in full.
    pub async fn bytes(&mut self) -> Result<Bytes, MultipartParseError> {
        let mut body = self.body()?;
        let mut out = Vec::new();
        while let Some(chunk) = body.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(Bytes::from(out))
    }

    /// Reads the entire payload and decodes it as UTF-8.
    ///
    /// The crate performs no charset conversion (§1); this convenience only
    /// accepts UTF-8, the default for `multipart/form-data` text fields.
    pub async fn text(&mut self) -> Result<String, MultipartParseError> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| MultipartParseError::upstream("part body is not valid UTF-8"))
    }
}

/// The lazy payload byte stream returned by [`PartStream::body`].
///
/// Borrows the part's scanner for the lifetime of the stream, which in turn
/// cannot outlive the [`PartStream`] it was created from.
pub struct PartBody<'s, S> {
    scanner: &'s mut BoundaryScanner<S>,
    finished: bool,
}

impl<S> fmt::Debug for PartBody<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartBody")
            .field("finished", &self.finished)
            .finish()
    }
}

impl<S> Stream for PartBody<'_, S>
where
    S: Stream<Item = Result<Bytes, MultipartParseError>> + Unpin,
{
    type Item = Result<Bytes, MultipartParseError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        match self.scanner.poll_next_part_chunk(cx) {
            Poll::Ready(Ok(Some(chunk))) => Poll::Ready(Some(Ok(chunk))),
            Poll::Ready(Ok(None)) => {
                self.finished = true;
                Poll::Ready(None)
            }
            Poll::Ready(Err(err)) => {
                self.finished = true;
                Poll::Ready(Some(Err(err)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
