// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `cream` binary entry point: parses CLI arguments, wires up logging, and
//! runs the server until the process is terminated.

use cream::{Config, CreamServer};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let config = match Config::from_args() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let server = match CreamServer::new(config) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize server");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!(error = %e, "server exited with error");
        std::process::exit(1);
    }
}
