use std::time::Duration;

/// Format a `Duration` as a human-readable string with automatic unit scaling.
///
/// Produces output like `1.94ms`, `2.34s`, `150.00µs` using Rust's Debug format.
pub fn fmt_duration(d: Duration) -> String {
    format!("{d:.2?}")
}

/// Whole seconds for a `Retry-After` header, never zero.
pub fn retry_after_secs(d: Duration) -> u64 {
    d.as_secs().max(1)
}
