// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Command-line configuration: `cream [-h] NUM_WORKERS PORT_NUMBER MAX_ENTRIES`.

use clap::Parser;
use std::net::IpAddr;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Parser, Debug)]
#[command(name = "cream")]
#[command(author, version, about = "Networked, fixed-capacity in-memory key-value cache server", long_about = None)]
struct Args {
    /// Number of worker threads servicing connections
    num_workers: usize,

    /// TCP port to listen on
    port_number: u16,

    /// Maximum number of entries the store may hold
    max_entries: usize,
}

/// Validated server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub num_workers: usize,
    pub bind_address: IpAddr,
    pub port: u16,
    pub max_entries: usize,
}

impl Config {
    /// Parse and validate configuration from `std::env::args()`.
    ///
    /// `-h`/`--help` prints usage and exits 0; any other parse failure
    /// (missing argument, non-integer value) exits nonzero -- both handled
    /// by `clap` before this function would otherwise return.
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = Args::parse();
        Self::from_parsed(args)
    }

    fn from_parsed(args: Args) -> Result<Self, ConfigError> {
        let config = Self {
            num_workers: args.num_workers,
            bind_address: "0.0.0.0".parse().unwrap(),
            port: args.port_number,
            max_entries: args.max_entries,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.num_workers == 0 {
            return Err(ConfigError::Invalid("NUM_WORKERS must be positive".into()));
        }
        if self.max_entries == 0 {
            return Err(ConfigError::Invalid("MAX_ENTRIES must be positive".into()));
        }
        Ok(())
    }
}
