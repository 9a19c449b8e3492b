//! The multipart parse session: the public entry point that turns a
//! [`crate::request::RequestLike`] into an iteration of [`PartStream`]s.

use bytes::Bytes;
use futures::{Stream, future::poll_fn};

use crate::error::MultipartParseError;
use crate::limits::Limits;
use crate::parser::boundary::{get_boundary, is_multipart};
use crate::parser::scanner::BoundaryScanner;
use crate::part::PartStream;
use crate::request::RequestLike;

/// A multipart parse session.
///
/// Owns the stream reader and the [`crate::buffer::ChunkBuffer`] (via the
/// inner [`BoundaryScanner`]). Created either directly from a known
/// boundary and body stream ([`Multipart::new`]) or from a
/// [`RequestLike`] via [`parse`], which additionally validates the
/// `Content-Type` header.
#[derive(Debug)]
pub struct Multipart<S> {
    scanner: BoundaryScanner<S>,
}

impl<S> Multipart<S> {
    /// Creates a parse session from an already-known boundary token and a
    /// chunked byte stream.
    pub fn new(
        boundary: impl Into<String>,
        stream: S,
        limits: Limits,
    ) -> Result<Self, MultipartParseError> {
        Ok(Self {
            scanner: BoundaryScanner::new(boundary, stream, limits)?,
        })
    }
}

impl<S> Multipart<S>
where
    S: Stream<Item = Result<Bytes, MultipartParseError>> + Unpin,
{
    /// Returns the next part, or `None` once the close-delimiter has been
    /// seen and the epilogue discarded.
    ///
    /// If the previously yielded [`PartStream`]'s body was not fully
    /// drained (or not read at all), it is drained and discarded first —
    /// per §4.3, the outer iteration cannot skip ahead while a part is
    /// still outstanding, and the stream is single-pass so bytes cannot be
    /// skipped without being read.
    pub async fn next_part(&mut self) -> Result<Option<PartStream<'_, S>>, MultipartParseError> {
        if self.scanner.is_in_payload() {
            #[cfg(feature = "tracing")]
            tracing::debug!("multipart: discarding unconsumed part before advancing");
            self.scanner.discard_current_part().await?;
        }

        let header_block = poll_fn(|cx| self.scanner.poll_next_part_headers(cx)).await?;
        match header_block {
            Some(header_block) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    name = header_block.name.as_deref().unwrap_or("<none>"),
                    is_file = header_block.is_file(),
                    "multipart: yielding part"
                );
                Ok(Some(PartStream::new(header_block, &mut self.scanner)))
            }
            None => {
                #[cfg(feature = "tracing")]
                tracing::debug!("multipart: reached end of stream");
                Ok(None)
            }
        }
    }
}

/// Parses a [`RequestLike`] request into a [`Multipart`] session.
///
/// Validates the `Content-Type` header synchronously, before any byte is
/// read from the body: [`MultipartParseError::NotMultipart`] if it does
/// not start with `multipart/`, [`MultipartParseError::MissingBoundary`]
/// if it has no `boundary` parameter. All other errors are raised while
/// iterating (see [`crate::error`]).
pub fn parse<R>(request: R, limits: Limits) -> Result<Multipart<R::BodyStream>, MultipartParseError>
where
    R: RequestLike,
{
    let content_type = request
        .content_type()
        .ok_or(MultipartParseError::NotMultipart)?;

    if !is_multipart(content_type) {
        return Err(MultipartParseError::NotMultipart);
    }

    let boundary = get_boundary(content_type).ok_or(MultipartParseError::MissingBoundary)?;
    Multipart::new(boundary, request.into_body(), limits)
}
