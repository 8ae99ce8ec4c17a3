//! Logging utilities
//!
//! The engine logs through the `log` facade. Severity mapping used across the
//! crate: critical failures (shader pipelines, unusable meshes) go to `error!`,
//! recoverable problems to `warn!`, lifecycle of batches and assets to
//! `debug!`/`info!`, and anything that runs every frame to `trace!`.

pub use log::{debug, info, warn, error, trace};
use log::LevelFilter;

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    env_logger::init();
}

/// Initialize logging with a default level, still overridable through `RUST_LOG`
///
/// Safe to call more than once; later calls are ignored.
pub fn init_with_level(level: LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}

/// Parse a level name as written in config files ("info", "debug", ...)
pub fn parse_level(name: &str) -> LevelFilter {
    name.parse().unwrap_or(LevelFilter::Info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), LevelFilter::Debug);
        assert_eq!(parse_level("WARN"), LevelFilter::Warn);
        assert_eq!(parse_level("nonsense"), LevelFilter::Info);
    }
}
