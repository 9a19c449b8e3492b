#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Streaming, backpressure-aware parser for HTTP `multipart/*` message
//! bodies (RFC 7578 / RFC 2046).
//!
//! The crate's core is an incremental boundary-scanning state machine
//! ([`parser::scanner::BoundaryScanner`]) driven over a sliding byte window
//! ([`buffer::ChunkBuffer`]) so that a multi-megabyte upload never has to be
//! buffered in memory in full. [`Multipart::next_part`] hands back one
//! [`PartStream`] at a time; each exposes its headers immediately and its
//! payload as a lazy byte stream.
//!
//! ```no_run
//! use bytes::Bytes;
//! use futures::stream;
//! use multipart_core::{Limits, Multipart};
//!
//! # async fn run() -> Result<(), multipart_core::error::MultipartParseError> {
//! let body = stream::iter([Ok::<_, multipart_core::error::MultipartParseError>(
//!     Bytes::from_static(b"--B\r\nContent-Disposition: form-data; name=\"f\"\r\n\r\nhi\r\n--B--"),
//! )]);
//! let mut multipart = Multipart::new("B", body, Limits::default())?;
//! while let Some(mut part) = multipart.next_part().await? {
//!     let _ = part.bytes().await?;
//! }
//! # Ok(())
//! # }
//! ```

/// A sliding byte window over the unread prefix of an input stream.
pub mod buffer;
/// Error types exposed by this crate.
pub mod error;
/// Per-part parsing limits.
pub mod limits;
/// The multipart parse session: `Content-Type` detection plus the part iterator.
pub mod multipart;
/// The per-part handle surfaced to callers.
pub mod part;
/// Low-level parser components: boundary/header detection and the scanning state machine.
pub mod parser;
/// The minimal adapter contract turning a platform request into a byte stream.
pub mod request;

pub use error::MultipartParseError;
pub use limits::Limits;
pub use multipart::{Multipart, parse};
pub use parser::{get_boundary, is_multipart};
pub use part::PartStream;
pub use request::{RawRequest, RequestLike};
