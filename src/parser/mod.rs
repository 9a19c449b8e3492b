/// `multipart/*` detection and `boundary` parameter extraction.
pub mod boundary;
/// Part header-block parsing and derived `Content-Disposition`/`Content-Type` views.
pub mod headers;
/// The incremental boundary-scanning state machine.
pub mod scanner;

pub use boundary::{get_boundary, is_multipart};
pub use headers::{ContentDisposition, RawHeaders, parse_content_disposition, parse_header_block, parse_part_content_type};
pub use scanner::{BoundaryScanner, PartHeaderBlock};
