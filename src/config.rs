//! Test configuration and CLI argument parsing
//!
//! Every option can be given on the command line or through an environment
//! variable with the `SLOWDRIP_` prefix. CLI arguments win over environment
//! variables, which win over the defaults.
//!
//! ```bash
//! # Hold 200 connections open for two minutes, trickling a header every 5s
//! slowdrip -u http://127.0.0.1:8080/ -H -c 200 -i 5 -l 120
//!
//! # Same target, slow POST body instead
//! SLOWDRIP_RATE=20 slowdrip -u http://127.0.0.1:8080/login -B
//! ```

use std::fmt;
use std::time::Duration;

use clap::{ArgGroup, Parser};

use crate::error::{Error, Result};

/// What the follow-up data starves the server of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestMode {
    /// `GET` with a header block that is never terminated.
    HeaderStarve,
    /// `POST` with a body that never reaches its declared length.
    BodyStarve,
}

impl fmt::Display for TestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestMode::HeaderStarve => f.write_str("headers"),
            TestMode::BodyStarve => f.write_str("POST"),
        }
    }
}

/// Immutable parameters of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestConfig {
    /// Connections opened per second.
    pub rate: u32,
    /// Number of connections the run tries to hold open.
    pub connections: usize,
    /// Test duration in seconds.
    pub duration: u64,
    /// Seconds between two follow-up rounds.
    pub interval: u64,
    pub mode: TestMode,
}

impl TestConfig {
    pub fn new(
        rate: u32,
        connections: usize,
        duration: u64,
        interval: u64,
        mode: TestMode,
    ) -> Result<Self> {
        if rate == 0 {
            return Err(Error::config("connection rate must be at least 1 per second"));
        }
        if connections == 0 {
            return Err(Error::config("number of connections must be at least 1"));
        }
        if interval == 0 {
            return Err(Error::config("follow-up interval must be at least 1 second"));
        }
        if interval > duration {
            tracing::warn!(
                interval,
                duration,
                "follow-up interval exceeds test duration, no follow-up data will be sent"
            );
        }
        Ok(Self {
            rate,
            connections,
            duration,
            interval,
            mode,
        })
    }

    pub fn from_args(args: &Args) -> Result<Self> {
        let mode = if args.body {
            TestMode::BodyStarve
        } else {
            TestMode::HeaderStarve
        };
        Self::new(
            args.rate,
            args.connections,
            args.duration,
            args.interval,
            mode,
        )
    }

    /// How many follow-ups each connection may send over the whole run.
    pub fn followup_budget(&self) -> u64 {
        self.duration / self.interval
    }

    /// Pause after each admitted connection.
    pub fn admission_pause(&self) -> Duration {
        Duration::from_secs(1) / self.rate
    }
}

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "slowdrip",
    about = "Slow HTTP attack vulnerability test tool",
    long_about = "Opens many partial HTTP requests against a server you are authorized to test and trickles data into them to find out whether its connection handlers can be exhausted.\n\nEnvironment variables with SLOWDRIP_ prefix are supported. CLI arguments take precedence over environment variables."
)]
#[command(group(ArgGroup::new("mode").args(["headers", "body"])))]
pub struct Args {
    #[arg(
        short = 'u',
        long,
        value_name = "URL",
        help = "Target URL, e.g. http://localhost:8080/",
        env = "SLOWDRIP_URL"
    )]
    pub url: String,

    #[arg(
        short = 'H',
        long,
        help = "Starve the server with never-ending headers (default)",
        env = "SLOWDRIP_HEADERS"
    )]
    pub headers: bool,

    #[arg(
        short = 'B',
        long,
        help = "Starve the server with a never-ending POST body",
        env = "SLOWDRIP_BODY"
    )]
    pub body: bool,

    #[arg(
        short = 'c',
        long,
        value_name = "N",
        help = "Target number of connections",
        default_value_t = 50,
        env = "SLOWDRIP_CONNECTIONS"
    )]
    pub connections: usize,

    #[arg(
        short = 'r',
        long,
        value_name = "N",
        help = "Connections opened per second",
        default_value_t = 50,
        env = "SLOWDRIP_RATE"
    )]
    pub rate: u32,

    #[arg(
        short = 'l',
        long,
        value_name = "SECS",
        help = "Test duration in seconds",
        default_value_t = 240,
        env = "SLOWDRIP_DURATION"
    )]
    pub duration: u64,

    #[arg(
        short = 'i',
        long,
        value_name = "SECS",
        help = "Interval between follow-up data in seconds",
        default_value_t = 10,
        env = "SLOWDRIP_INTERVAL"
    )]
    pub interval: u64,

    #[arg(
        long,
        value_name = "LEVEL",
        help = "Log level: error, warn, info, debug, trace",
        default_value = "info",
        env = "SLOWDRIP_LOG_LEVEL"
    )]
    pub log_level: String,
}
