//! Tracing and logging setup shared by the server and tools.

pub mod tracing;

pub use crate::tracing::{LogFormat, UnknownLogFormat};

/// Initialize process-wide logging from `RUST_LOG` and `LOG_FORMAT`.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init();
}

/// Initialize with an explicit output format.
pub fn init_with(format: LogFormat) {
    tracing::init_with(format);
}
