//! Config-validation entry point.
//!
//! Standing up an actual listener, balancer, and event loop is host-runtime
//! plumbing outside this crate's scope; this binary only exercises the
//! config-loading path so an operator can check a document before handing it
//! to a real proxy process.

use std::env;
use std::process::ExitCode;

use proxycore::config::Config;
use proxycore::logging;

fn main() -> ExitCode {
    logging::init_env_logger();

    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: proxycore <config.yaml>");
        return ExitCode::FAILURE;
    };

    match Config::load_from_yaml(&path) {
        Ok(config) => {
            log::info!("configuration at {path} is valid: {config:?}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("failed to load configuration from {path}: {err}");
            ExitCode::FAILURE
        }
    }
}
