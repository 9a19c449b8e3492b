//! The incremental boundary-scanning state machine.
//!
//! [`BoundaryScanner`] drives a `Preamble -> HeaderBlock -> PartPayload ->
//! (HeaderBlock | Terminated)` state machine over a [`ChunkBuffer`],
//! recognizing the dash-boundary, delimiter, and close-delimiter patterns
//! defined by RFC 2046 and framing out one part's header block and payload
//! chunks at a time.

use std::task::{Context, Poll};

use bytes::Bytes;
use futures::{Stream, future::poll_fn};

use crate::buffer::ChunkBuffer;
use crate::error::MultipartParseError;
use crate::limits::Limits;
use crate::parser::headers::{
    RawHeaders, parse_content_disposition, parse_header_block, parse_part_content_type,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Preamble,
    HeaderBlock,
    PartPayload,
    Terminated,
    Failed,
}

/// A part's parsed header block, as handed back by
/// [`BoundaryScanner::poll_next_part_headers`].
#[derive(Debug, Clone)]
pub struct PartHeaderBlock {
    /// The raw, ordered header multimap for this part.
    pub raw: RawHeaders,
    /// The `name` parameter of `Content-Disposition`, if present.
    pub name: Option<String>,
    /// The `filename`/`filename*` parameter of `Content-Disposition`, if present.
    pub filename: Option<String>,
    /// The part's `Content-Type`, defaulting to `application/octet-stream`.
    pub media_type: String,
}

impl PartHeaderBlock {
    /// Returns `true` iff this part carries a `filename`.
    pub fn is_file(&self) -> bool {
        self.filename.is_some()
    }
}

/// Incremental multipart boundary scanner over a chunked byte stream.
#[derive(Debug)]
pub struct BoundaryScanner<S> {
    stream: S,
    buffer: ChunkBuffer,
    dash_boundary: Vec<u8>,
    delimiter: Vec<u8>,
    state: State,
    limits: Limits,
    current_part_size: u64,
    current_field: Option<String>,
}

impl<S> BoundaryScanner<S> {
    /// Creates a scanner for the given boundary token and byte stream.
    pub fn new(boundary: impl Into<String>, stream: S, limits: Limits) -> Result<Self, MultipartParseError> {
        let boundary = boundary.into();
        if boundary.is_empty() {
            return Err(MultipartParseError::MissingBoundary);
        }

        Ok(Self {
            stream,
            buffer: ChunkBuffer::new(),
            dash_boundary: format!("--{boundary}").into_bytes(),
            delimiter: format!("\r\n--{boundary}").into_bytes(),
            state: State::Preamble,
            limits,
            current_part_size: 0,
            current_field: None,
        })
    }

    /// Returns `true` iff the scanner is currently positioned in a part's payload.
    pub fn is_in_payload(&self) -> bool {
        self.state == State::PartPayload
    }

    fn check_part_limit(&self, additional: u64) -> Option<MultipartParseError> {
        let limit = self.limits.max_file_size;
        if self.current_part_size.saturating_add(additional) <= limit {
            None
        } else {
            Some(MultipartParseError::PartTooLarge {
                field: self.current_field.clone(),
                limit,
            })
        }
    }

    /// Moves the scanner into `Failed` and logs the error that caused it.
    /// Every fallible transition out of `Preamble`/`HeaderBlock`/`PartPayload`
    /// routes through here so a failure is observable without the caller
    /// instrumenting anything (§7).
    fn fail(&mut self, err: MultipartParseError) -> MultipartParseError {
        self.state = State::Failed;
        #[cfg(feature = "tracing")]
        tracing::warn!(error = %err, "multipart scanner: failing session");
        err
    }
}

impl<S> BoundaryScanner<S>
where
    S: Stream<Item = Result<Bytes, MultipartParseError>> + Unpin,
{
    /// Polls until the next part's header block is available, the stream is
    /// exhausted (`Ok(None)`), or a fatal error occurs.
    ///
    /// Must only be called while [`BoundaryScanner::is_in_payload`] is
    /// `false`; the caller (see [`crate::Multipart::next_part`]) is
    /// responsible for draining or discarding the previous part's payload
    /// first.
    pub fn poll_next_part_headers(
        &mut self,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<PartHeaderBlock>, MultipartParseError>> {
        loop {
            match self.state {
                State::Preamble => match self.scan_preamble(cx) {
                    Poll::Ready(Ok(())) => continue,
                    Poll::Ready(Err(err)) => return Poll::Ready(Err(self.fail(err))),
                    Poll::Pending => return Poll::Pending,
                },
                State::HeaderBlock => match self.scan_header_block(cx) {
                    Poll::Ready(Ok(Some(header_block))) => return Poll::Ready(Ok(Some(header_block))),
                    Poll::Ready(Ok(None)) => continue,
                    Poll::Ready(Err(err)) => return Poll::Ready(Err(self.fail(err))),
                    Poll::Pending => return Poll::Pending,
                },
                State::PartPayload => {
                    return Poll::Ready(Err(MultipartParseError::Upstream {
                        message: "previous part body must be consumed before requesting the next part"
                            .to_owned(),
                    }));
                }
                State::Terminated | State::Failed => return Poll::Ready(Ok(None)),
            }
        }
    }

    /// Polls the next payload chunk for the currently active part.
    ///
    /// Returns `Ok(None)` once the part's payload is exhausted (including
    /// when called outside [`BoundaryScanner::is_in_payload`]).
    pub fn poll_next_part_chunk(
        &mut self,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<Bytes>, MultipartParseError>> {
        loop {
            if self.state != State::PartPayload {
                return Poll::Ready(Ok(None));
            }

            match self.buffer.index_of(&self.delimiter, 0) {
                Some(k) => match self.try_consume_delimiter_at(k, cx) {
                    Poll::Ready(Ok(Some(chunk))) => return Poll::Ready(Ok(Some(chunk))),
                    Poll::Ready(Ok(None)) => continue,
                    Poll::Ready(Err(err)) => return Poll::Ready(Err(self.fail(err))),
                    Poll::Pending => return Poll::Pending,
                },
                None => {
                    let safe_len = safe_emit_len(self.buffer.len(), self.delimiter.len());
                    if safe_len > 0 {
                        if let Some(err) = self.check_part_limit(safe_len as u64) {
                            return Poll::Ready(Err(self.fail(err)));
                        }

                        let chunk = self.buffer.copy_range(0, safe_len);
                        self.buffer.drop_prefix(safe_len);
                        self.current_part_size += safe_len as u64;
                        return Poll::Ready(Ok(Some(chunk)));
                    }

                    if self.buffer.upstream_done() {
                        return Poll::Ready(Err(self.fail(MultipartParseError::UnexpectedEnd)));
                    }

                    match self.buffer.poll_pull(cx, &mut self.stream) {
                        Poll::Ready(Ok(_)) => continue,
                        Poll::Ready(Err(err)) => return Poll::Ready(Err(self.fail(err))),
                        Poll::Pending => return Poll::Pending,
                    }
                }
            }
        }
    }

    /// Drains and discards the currently active part's payload, if any.
    pub async fn discard_current_part(&mut self) -> Result<(), MultipartParseError> {
        while poll_fn(|cx| self.poll_next_part_chunk(cx)).await?.is_some() {}
        Ok(())
    }

    fn scan_preamble(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), MultipartParseError>> {
        match self.buffer.index_of(&self.dash_boundary, 0) {
            Some(k) => {
                let suffix_start = k + self.dash_boundary.len();
                match match_boundary_suffix(&self.buffer, suffix_start) {
                    SuffixMatch::Terminal(extra) => {
                        self.buffer.drop_prefix(suffix_start + extra);
                        self.state = State::Terminated;
                        Poll::Ready(Ok(()))
                    }
                    SuffixMatch::Next(extra) => {
                        self.buffer.drop_prefix(suffix_start + extra);
                        self.state = State::HeaderBlock;
                        Poll::Ready(Ok(()))
                    }
                    SuffixMatch::Malformed => Poll::Ready(Err(MultipartParseError::MalformedDelimiter)),
                    SuffixMatch::Incomplete => {
                        if self.buffer.upstream_done() {
                            return Poll::Ready(Err(MultipartParseError::UnexpectedEnd));
                        }
                        match self.buffer.poll_pull(cx, &mut self.stream) {
                            Poll::Ready(Ok(_)) => Poll::Ready(Ok(())),
                            Poll::Ready(Err(err)) => Poll::Ready(Err(err)),
                            Poll::Pending => Poll::Pending,
                        }
                    }
                }
            }
            None => {
                if self.buffer.upstream_done() {
                    return Poll::Ready(Err(MultipartParseError::MissingInitialBoundary));
                }

                let safe_len = safe_emit_len(self.buffer.len(), self.dash_boundary.len());
                if safe_len > 0 {
                    self.buffer.drop_prefix(safe_len);
                }

                match self.buffer.poll_pull(cx, &mut self.stream) {
                    Poll::Ready(Ok(_)) => Poll::Ready(Ok(())),
                    Poll::Ready(Err(err)) => Poll::Ready(Err(err)),
                    Poll::Pending => Poll::Pending,
                }
            }
        }
    }

    fn scan_header_block(
        &mut self,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<PartHeaderBlock>, MultipartParseError>> {
        match self.buffer.index_of(b"\r\n\r\n", 0) {
            Some(split) if split > self.limits.max_header_size => {
                Poll::Ready(Err(MultipartParseError::HeaderTooLarge {
                    limit: self.limits.max_header_size,
                }))
            }
            Some(split) => {
                let raw_bytes = self.buffer.slice(0, split).to_vec();
                self.buffer.drop_prefix(split + 4);

                let raw = parse_header_block(&raw_bytes);
                let content_disposition = raw
                    .get("content-disposition")
                    .map(parse_content_disposition)
                    .unwrap_or_default();
                let media_type = parse_part_content_type(raw.get("content-type"));

                #[cfg(feature = "tracing")]
                tracing::trace!(
                    name = content_disposition.name.as_deref().unwrap_or("<none>"),
                    file = content_disposition.filename.is_some(),
                    "multipart scanner: part headers parsed"
                );

                self.current_part_size = 0;
                self.current_field = content_disposition.name.clone();
                self.state = State::PartPayload;

                Poll::Ready(Ok(Some(PartHeaderBlock {
                    name: content_disposition.name,
                    filename: content_disposition.filename,
                    media_type,
                    raw,
                })))
            }
            None => {
                if self.buffer.len() > self.limits.max_header_size {
                    return Poll::Ready(Err(MultipartParseError::HeaderTooLarge {
                        limit: self.limits.max_header_size,
                    }));
                }

                if self.buffer.upstream_done() {
                    return Poll::Ready(Err(MultipartParseError::UnexpectedEnd));
                }

                match self.buffer.poll_pull(cx, &mut self.stream) {
                    Poll::Ready(Ok(_)) => Poll::Ready(Ok(None)),
                    Poll::Ready(Err(err)) => Poll::Ready(Err(err)),
                    Poll::Pending => Poll::Pending,
                }
            }
        }
    }

    fn try_consume_delimiter_at(
        &mut self,
        k: usize,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<Bytes>, MultipartParseError>> {
        let suffix_start = k + self.delimiter.len();
        match match_boundary_suffix(&self.buffer, suffix_start) {
            SuffixMatch::Incomplete => {
                if self.buffer.upstream_done() {
                    return Poll::Ready(Err(MultipartParseError::UnexpectedEnd));
                }
                match self.buffer.poll_pull(cx, &mut self.stream) {
                    Poll::Ready(Ok(_)) => Poll::Ready(Ok(None)),
                    Poll::Ready(Err(err)) => Poll::Ready(Err(err)),
                    Poll::Pending => Poll::Pending,
                }
            }
            SuffixMatch::Malformed => Poll::Ready(Err(MultipartParseError::MalformedDelimiter)),
            suffix_match @ (SuffixMatch::Terminal(extra) | SuffixMatch::Next(extra)) => {
                let is_terminal = matches!(suffix_match, SuffixMatch::Terminal(_));

                if let Some(err) = self.check_part_limit(k as u64) {
                    return Poll::Ready(Err(err));
                }

                let chunk = if k == 0 {
                    None
                } else {
                    let bytes = self.buffer.copy_range(0, k);
                    self.current_part_size += k as u64;
                    Some(bytes)
                };

                self.buffer.drop_prefix(suffix_start + extra);
                self.current_field = None;

                #[cfg(feature = "tracing")]
                if is_terminal {
                    tracing::trace!("multipart scanner: terminal boundary reached");
                } else {
                    tracing::trace!("multipart scanner: moving to next part headers");
                }

                self.state = if is_terminal {
                    State::Terminated
                } else {
                    State::HeaderBlock
                };

                Poll::Ready(Ok(chunk))
            }
        }
    }
}

/// The number of bytes in `buffer_len` that are safe to emit (or discard,
/// while scanning the preamble) without risking splitting a not-yet-fully
/// buffered occurrence of a pattern `pattern_len` bytes long.
fn safe_emit_len(buffer_len: usize, pattern_len: usize) -> usize {
    buffer_len.saturating_sub(pattern_len.saturating_sub(1))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SuffixMatch {
    /// `close-delimiter` suffix (`--`) matched; value is the number of
    /// bytes from `start` (inclusive of any skipped LWS) that were consumed.
    Terminal(usize),
    /// `delimiter` suffix (CRLF) matched; value is the number of bytes
    /// consumed, as above.
    Next(usize),
    /// The two bytes following any skipped LWS were neither `--` nor CRLF.
    Malformed,
    /// Not enough bytes are buffered yet to classify the suffix.
    Incomplete,
}

/// Classifies the bytes at `start` as the suffix following a dash-boundary
/// or delimiter match: optional linear whitespace, then either `--`
/// (terminal) or CRLF (more parts follow).
fn match_boundary_suffix(buffer: &ChunkBuffer, start: usize) -> SuffixMatch {
    let mut i = start;
    loop {
        match buffer.byte_at(i) {
            Some(b' ') | Some(b'\t') => i += 1,
            Some(_) => break,
            None => return SuffixMatch::Incomplete,
        }
    }

    match (buffer.byte_at(i), buffer.byte_at(i + 1)) {
        (Some(b'-'), Some(b'-')) => SuffixMatch::Terminal(i + 2 - start),
        (Some(b'\r'), Some(b'\n')) => SuffixMatch::Next(i + 2 - start),
        (Some(_), Some(_)) => SuffixMatch::Malformed,
        _ => SuffixMatch::Incomplete,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn block_on<F: std::future::Future>(fut: F) -> F::Output {
        futures::executor::block_on(fut)
    }

    fn scanner_from(
        boundary: &str,
        body: &[u8],
    ) -> BoundaryScanner<stream::Iter<std::vec::IntoIter<Result<Bytes, MultipartParseError>>>> {
        let chunks: Vec<Result<Bytes, MultipartParseError>> =
            vec![Ok(Bytes::copy_from_slice(body))];
        BoundaryScanner::new(boundary, stream::iter(chunks), Limits::default()).unwrap()
    }

    #[test]
    fn empty_message_yields_no_parts() {
        let mut scanner = scanner_from("B", b"--B--");
        let first = block_on(poll_fn(|cx| scanner.poll_next_part_headers(cx))).unwrap();
        assert!(first.is_none());
    }

    #[test]
    fn single_field_round_trips() {
        let body = b"--B\r\nContent-Disposition: form-data; name=\"field1\"\r\n\r\nvalue1\r\n--B--";
        let mut scanner = scanner_from("B", body);
        let headers = block_on(poll_fn(|cx| scanner.poll_next_part_headers(cx)))
            .unwrap()
            .expect("a part");
        assert_eq!(headers.name.as_deref(), Some("field1"));

        let mut collected = Vec::new();
        while let Some(chunk) = block_on(poll_fn(|cx| scanner.poll_next_part_chunk(cx))).unwrap() {
            collected.extend_from_slice(&chunk);
        }
        assert_eq!(collected, b"value1");

        let next = block_on(poll_fn(|cx| scanner.poll_next_part_headers(cx))).unwrap();
        assert!(next.is_none());
    }

    #[test]
    fn empty_part_yields_zero_byte_payload() {
        let body = b"--B\r\nContent-Disposition: form-data; name=\"f\"\r\n\r\n\r\n--B--";
        let mut scanner = scanner_from("B", body);
        block_on(poll_fn(|cx| scanner.poll_next_part_headers(cx))).unwrap();
        let chunk = block_on(poll_fn(|cx| scanner.poll_next_part_chunk(cx))).unwrap();
        assert_eq!(chunk, None);
    }

    #[test]
    fn missing_initial_boundary_is_reported() {
        let mut scanner = scanner_from("B", b"not a multipart body at all");
        let err = block_on(poll_fn(|cx| scanner.poll_next_part_headers(cx))).unwrap_err();
        assert_eq!(err, MultipartParseError::MissingInitialBoundary);
    }

    #[test]
    fn malformed_delimiter_suffix_is_reported() {
        let body = b"--B\r\nContent-Disposition: form-data; name=\"f\"\r\n\r\nhello\r\n--Bxyz\r\n";
        let mut scanner = scanner_from("B", body);
        block_on(poll_fn(|cx| scanner.poll_next_part_headers(cx))).unwrap();
        let err = loop {
            match block_on(poll_fn(|cx| scanner.poll_next_part_chunk(cx))) {
                Ok(Some(_)) => continue,
                Ok(None) => panic!("expected an error before exhaustion"),
                Err(err) => break err,
            }
        };
        assert_eq!(err, MultipartParseError::MalformedDelimiter);
    }

    #[test]
    fn header_too_large_is_reported() {
        let huge_value = "x".repeat(9000);
        let body = format!("--B\r\nX-Big: {huge_value}\r\n\r\n");
        let mut scanner = scanner_from("B", body.as_bytes());
        let err = block_on(poll_fn(|cx| scanner.poll_next_part_headers(cx))).unwrap_err();
        assert_eq!(
            err,
            MultipartParseError::HeaderTooLarge {
                limit: Limits::default().max_header_size
            }
        );
    }

    #[test]
    fn part_too_large_is_reported() {
        let mut scanner = BoundaryScanner::new(
            "B",
            stream::iter(vec![Ok(Bytes::from_static(
                b"--B\r\nContent-Disposition: form-data; name=\"f\"\r\n\r\n0123456789\r\n--B--",
            ))]),
            Limits::default().with_max_file_size(4),
        )
        .unwrap();

        block_on(poll_fn(|cx| scanner.poll_next_part_headers(cx))).unwrap();
        let err = block_on(poll_fn(|cx| scanner.poll_next_part_chunk(cx))).unwrap_err();
        assert_eq!(
            err,
            MultipartParseError::PartTooLarge {
                field: Some("f".to_owned()),
                limit: 4
            }
        );
    }

    #[test]
    fn missing_close_delimiter_is_unexpected_end() {
        let body = b"--B\r\nContent-Disposition: form-data; name=\"f\"\r\n\r\nhello\r\n--B\r\n";
        let mut scanner = scanner_from("B", body);
        block_on(poll_fn(|cx| scanner.poll_next_part_headers(cx))).unwrap();
        while block_on(poll_fn(|cx| scanner.poll_next_part_chunk(cx))).unwrap().is_some() {}
        let err = block_on(poll_fn(|cx| scanner.poll_next_part_headers(cx))).unwrap_err();
        assert_eq!(err, MultipartParseError::UnexpectedEnd);
    }

    #[test]
    fn epilogue_after_close_delimiter_is_discarded() {
        let body = b"--B\r\nContent-Disposition: form-data; name=\"f\"\r\n\r\nhi\r\n--B--\r\ntrailing garbage";
        let mut scanner = scanner_from("B", body);
        block_on(poll_fn(|cx| scanner.poll_next_part_headers(cx))).unwrap();
        while block_on(poll_fn(|cx| scanner.poll_next_part_chunk(cx))).unwrap().is_some() {}
        let next = block_on(poll_fn(|cx| scanner.poll_next_part_headers(cx))).unwrap();
        assert!(next.is_none());
    }
}
