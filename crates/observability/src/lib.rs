//! Process-wide tracing and logging setup shared by the binaries.

/// Initialize structured logging for the process.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init();
}

/// Subscriber configuration (filters, formatting).
pub mod tracing;
