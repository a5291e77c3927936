//! Error types for slowdrip.
//!
//! Only failures that stop an operation the caller asked for live here.
//! Per-connection I/O trouble (would-block, resets, peer close) never
//! becomes an [`Error`]: the driver logs it and tears the connection down.

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Test parameters that cannot produce a meaningful run.
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Could not resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("No address found for {host}")]
    NoAddress { host: String },

    /// Opening another connection failed. Not fatal for the run: the pool
    /// caps its target at `admitted` and carries on.
    #[error("Unable to open connection #{admitted}: {source}")]
    Capacity {
        admitted: usize,
        #[source]
        source: io::Error,
    },

    /// The readiness wait itself failed. Aborts the run.
    #[error("Readiness wait failed: {0}")]
    Poll(#[source] io::Error),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }
}
