//! Logging initialization
//!
//! Library code only emits through the `log` facade; binaries and
//! integration tests call [`init`] to wire up `env_logger`.

/// Initialize `env_logger` from `RUST_LOG`, defaulting to `info`
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .try_init();
}
