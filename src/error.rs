use thiserror::Error;

/// Errors raised while parsing a `multipart/*` body.
///
/// Every variant is fatal to the parse session in which it occurs: none are
/// recovered internally. The two variants that can be raised before the
/// first byte of the body is read ([`MultipartParseError::NotMultipart`] and
/// [`MultipartParseError::MissingBoundary`]) are surfaced synchronously from
/// [`crate::parse`]; all others are raised while iterating parts or part
/// bodies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MultipartParseError {
    /// The request's `Content-Type` does not start with `multipart/`.
    #[error("content-type is not multipart/*")]
    NotMultipart,
    /// The `Content-Type` header has no `boundary` parameter.
    #[error("content-type has no boundary parameter")]
    MissingBoundary,
    /// The stream ended during the preamble scan with no dash-boundary seen.
    #[error("stream ended before the initial boundary was found")]
    MissingInitialBoundary,
    /// Bytes following a dash-boundary were neither CRLF (optionally
    /// preceded by linear whitespace) nor `--`.
    #[error("malformed bytes following a multipart boundary")]
    MalformedDelimiter,
    /// A part's header block exceeded the configured limit without a
    /// terminating CRLFCRLF being found.
    #[error("part header block exceeded {limit} bytes")]
    HeaderTooLarge {
        /// The configured `max_header_size`, in bytes.
        limit: usize,
    },
    /// A part's payload exceeded the configured file-size limit.
    #[error("part {field:?} exceeded the {limit}-byte size limit")]
    PartTooLarge {
        /// The field name of the offending part, when known.
        field: Option<String>,
        /// The configured `max_file_size`, in bytes.
        limit: u64,
    },
    /// The stream ended mid-header-block or mid-payload before a
    /// close-delimiter was seen.
    #[error("multipart stream ended unexpectedly")]
    UnexpectedEnd,
    /// The caller attempted to read a [`crate::PartStream`]'s body twice.
    #[error("part body was already consumed")]
    StreamAlreadyConsumed,
    /// The underlying byte stream produced an error.
    #[error("multipart body stream error: {message}")]
    Upstream {
        /// Human-readable description of the upstream failure.
        message: String,
    },
}

impl MultipartParseError {
    /// Wraps an upstream stream error, preserving its message.
    pub fn upstream(err: impl std::fmt::Display) -> Self {
        Self::Upstream {
            message: err.to_string(),
        }
    }
}

