//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::sync::Once;

static INIT_LOGGING: Once = Once::new();

/// Routes `tracing` output through the test writer. Safe to call from every
/// test; the first call wins.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .with_target(true)
            .with_ansi(false)
            .try_init();
    });
}
