//! Slow HTTP attack vulnerability test engine.
//!
//! Opens many partial HTTP requests against a server and keeps each one
//! alive by trickling a small chunk of data into it at a fixed interval,
//! so the server's connection handlers stay occupied for the whole test.
//! Everything runs on one thread around a single readiness poll.

pub mod clock;
pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod pool;
pub mod report;
pub mod request;
pub mod status;
pub mod target;
pub mod transport;

pub use config::{Args, TestConfig, TestMode};
pub use driver::Driver;
pub use error::{Error, Result};
pub use report::{Reporter, Summary, TracingReporter};
pub use target::Target;
pub use transport::{Dialer, TcpDialer};
