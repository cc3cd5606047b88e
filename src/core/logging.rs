//! Logging initialization and utilities

/// Initialize the logging system
///
/// Uses env_logger with default filter level of `info`.
/// Override with RUST_LOG environment variable.
///
/// # Example
/// ```
/// rkstream::core::logging::init();
/// log::info!("Streaming started");
/// ```
pub fn init() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();
}

/// Initialize logging for unit tests.
///
/// Output is captured by the test harness, and calling this from several
/// tests is harmless.
pub fn init_for_tests() {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("debug")
    )
    .is_test(true)
    .try_init();
}
