//! The minimal adapter contract this crate owns (§6.4 of the design notes).
//!
//! Turning a concrete framework request (an axum `Request`, an actix-web
//! `Payload`, a hyper `Request<Incoming>`) into something implementing
//! [`RequestLike`] is "adapter shim" work, and is explicitly out of this
//! crate's scope — it is left to caller-side glue code. [`RawRequest`] is
//! the one concrete, dependency-free implementation provided so the
//! contract is directly usable from tests and simple embedding call sites
//! without pulling in a web framework.

use bytes::Bytes;
use futures::Stream;

use crate::error::MultipartParseError;

/// The full extent of the "adapter" surface this crate owns: a way to read
/// the raw `Content-Type` header value, and a way to consume `self` into
/// the body byte-chunk stream.
pub trait RequestLike {
    /// The body's byte-chunk stream type.
    type BodyStream: Stream<Item = Result<Bytes, MultipartParseError>> + Unpin;

    /// Returns the raw `Content-Type` header value, if present.
    fn content_type(&self) -> Option<&str>;

    /// Consumes the request into its body byte-chunk stream.
    fn into_body(self) -> Self::BodyStream;
}

/// A minimal, dependency-free [`RequestLike`] pairing a content-type string
/// with a body stream.
///
/// This is the one concrete implementation owned by this crate; production
/// callers typically implement [`RequestLike`] directly on their framework's
/// request type instead of funneling through this struct.
#[derive(Debug, Clone)]
pub struct RawRequest<S> {
    content_type: Option<String>,
    body: S,
}

impl<S> RawRequest<S> {
    /// Pairs a `Content-Type` header value with a body byte-chunk stream.
    pub fn new(content_type: impl Into<String>, body: S) -> Self {
        Self {
            content_type: Some(content_type.into()),
            body,
        }
    }

    /// Builds a request with no `Content-Type` header at all, useful for
    /// exercising the [`crate::error::MultipartParseError::NotMultipart`]
    /// path in tests.
    pub fn without_content_type(body: S) -> Self {
        Self {
            content_type: None,
            body,
        }
    }
}

impl<S> RequestLike for RawRequest<S>
where
    S: Stream<Item = Result<Bytes, MultipartParseError>> + Unpin,
{
    type BodyStream = S;

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    fn into_body(self) -> Self::BodyStream {
        self.body
    }
}
