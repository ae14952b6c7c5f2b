//! Server configuration

/// Default cap on the number of arguments in one request
pub const DEFAULT_MAX_ARGS: usize = 1024 * 1024;

/// Default cap on a single bulk string (512 MiB, as in Redis)
pub const DEFAULT_MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Default cap on a header or inline command line
pub const DEFAULT_MAX_INLINE_LEN: usize = 64 * 1024;

/// Limits applied while decoding client requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    /// Maximum number of arguments in one request
    pub max_args: usize,

    /// Maximum length of one bulk string argument
    pub max_bulk_len: usize,

    /// Maximum length of a header line or inline command
    pub max_inline_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_args: DEFAULT_MAX_ARGS,
            max_bulk_len: DEFAULT_MAX_BULK_LEN,
            max_inline_len: DEFAULT_MAX_INLINE_LEN,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_args(mut self, max_args: usize) -> Self {
        self.max_args = max_args;
        self
    }

    pub fn with_max_bulk_len(mut self, max_bulk_len: usize) -> Self {
        self.max_bulk_len = max_bulk_len;
        self
    }

    pub fn with_max_inline_len(mut self, max_inline_len: usize) -> Self {
        self.max_inline_len = max_inline_len;
        self
    }
}
