//! Helpers shared by the unit tests.

use std::sync::Once;

static INIT_LOGGING: Once = Once::new();

/// Routes `tracing` output through the test writer. The first call wins.
pub(crate) fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .with_target(true)
            .with_ansi(false)
            .try_init();
    });
}
