//! Logger initialisation

/// Install `env_logger` with `filter` as the fallback for `RUST_LOG`
///
/// Returns `false` if a logger was already installed.
pub fn init(filter: &str) -> bool {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp_millis()
        .try_init()
        .is_ok()
}
