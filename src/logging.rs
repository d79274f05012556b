//! Logging bootstrap.
//!
//! A host binary wiring HF and KP into its own proxy loop calls
//! [`init_env_logger`] once at startup; everything below that initializes
//! the `log` facade with `env_logger`, the same way the teacher's
//! `logging::Logger::init_env_logger` does, minus the async file-sink
//! machinery (process/worker log routing is host-runtime plumbing, out of
//! scope for this crate).

use env_logger::Builder;
use log::LevelFilter;

/// Initializes the global logger from `RUST_LOG`, defaulting to `info`.
///
/// Safe to call once per process; a second call is a no-op failure that
/// callers are expected to ignore (mirrors `env_logger::try_init`).
pub fn init_env_logger() {
    let _ = Builder::from_env(env_logger::Env::default())
        .filter(None, LevelFilter::Info)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_env_logger();
        init_env_logger();
    }
}
