//! Shared tracing/logging setup for hosts embedding the rule modules.

pub mod tracing;

/// Initialize process-wide observability.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}
