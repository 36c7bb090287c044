//! Command-line interface of the headless client.
//!
//! ```ignore
//! use agentsync::cli::{parse_args, CliCommand};
//!
//! match parse_args(std::env::args()) {
//!     CliCommand::Run(options) => { /* start the runtime */ }
//!     CliCommand::Version => println!("agentsync {}", agentsync::cli::VERSION),
//!     _ => {}
//! }
//! ```

pub mod args;

pub use args::{parse_args, CliCommand, RunOptions, USAGE};

/// The current version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
