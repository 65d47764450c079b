//! Logging initialization from the top-level `log` configuration block.
//!
//! The block is opaque to the rest of the core; this module maps it onto
//! a `tracing-subscriber` registry. Initialization is best-effort: when a
//! global subscriber is already installed (tests, embedding programs),
//! the existing one is kept.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde_json::Value;
use tracing_subscriber::EnvFilter;

// Layer 3: Internal module imports
// (none)

/// Initialize the global subscriber from a `log` block.
///
/// Recognized keys: `stdout_log_level` (default `info`) and
/// `log_file_level` (accepted for compatibility; file sinks are wired by
/// the embedding program).
pub fn init(config: Option<&Value>) {
    let level = config
        .and_then(|log| {
            log.get("stdout_log_level")
                .or_else(|| log.get("log_file_level"))
        })
        .and_then(Value::as_str)
        .unwrap_or("info")
        .to_lowercase();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    // Keep any subscriber the embedding program installed first
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
