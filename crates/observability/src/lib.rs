//! Process-wide tracing setup.

/// Log output configuration.
pub mod logging;

pub use logging::LogFormat;

/// Initialize process-wide logging.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    logging::init(LogFormat::from_env());
}
