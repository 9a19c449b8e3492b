/// Default value for [`Limits::max_header_size`], in bytes.
pub const DEFAULT_MAX_HEADER_SIZE: usize = 8 * 1024;

/// Default value for [`Limits::max_file_size`], in bytes (`2^31 - 1`).
pub const DEFAULT_MAX_FILE_SIZE: u64 = i32::MAX as u64;

/// Per-part limits enforced while scanning a multipart body.
///
/// Both limits are per-part, not per-request: each part starts the scan
/// with a fresh header-block byte counter and a fresh payload byte counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum size in bytes of a single part's header block, measured from
    /// the start of the header block to (but not including) the
    /// terminating CRLFCRLF.
    pub max_header_size: usize,
    /// Maximum size in bytes of a single part's payload.
    pub max_file_size: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_header_size: DEFAULT_MAX_HEADER_SIZE,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl Limits {
    /// Creates limits using the documented defaults
    /// (`max_header_size = 8192`, `max_file_size = 2^31 - 1`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum header-block size, in bytes.
    pub fn with_max_header_size(mut self, max_header_size: usize) -> Self {
        self.max_header_size = max_header_size;
        self
    }

    /// Sets the maximum per-part payload size, in bytes.
    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }
}
