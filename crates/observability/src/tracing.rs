//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Default directive when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info";

/// Initialize tracing for the process: JSON lines, timestamps, filtered via
/// `RUST_LOG`.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with_default(DEFAULT_FILTER);
}

/// Like [`init`], with an explicit fallback directive. Hosts that want the
/// rule modules quiet by default pass e.g. `"warn,orderflow=info"`.
pub fn init_with_default(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn repeated_init_is_a_noop() {
        super::init();
        super::init_with_default("debug");
    }
}
