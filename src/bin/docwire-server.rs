//! Standalone server answering the built-in commands.
//!
//! ```text
//! docwire-server [config.toml]
//! ```
//!
//! Without a config file the defaults apply, overridden by `DOCWIRE_*`
//! environment variables.

use std::process::ExitCode;

use docwire::config::DocwireConfig;
use docwire::protocol::builtin::{register_defaults, ServerInfo};
use docwire::protocol::registry::ResponderRegistry;
use docwire::transport::Server;
use docwire::utils::logging::init_logging;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let mut registry = ResponderRegistry::new();
    register_defaults(&mut registry, ServerInfo::from_transport(&config.transport));

    match Server::new(&config, registry, ()).run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}

fn load_config() -> docwire::Result<DocwireConfig> {
    let mut config = match std::env::args().nth(1) {
        Some(path) => DocwireConfig::from_file(path)?,
        None => DocwireConfig::default(),
    };
    config.apply_env();
    config.validate_strict()?;
    Ok(config)
}
