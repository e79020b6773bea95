#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_docs)]
/// HTTP clients for the attendance and form-data services
pub mod client;
/// Error handling and custom [`Error`](std::error::Error) types
pub mod errors;
/// Form-data records built from monthly report tables
pub mod forms;
/// Functions for reading attendance exports and form tables, and writing ledger summaries
pub mod io;
/// Business logic for reconciling attendance
mod ops;
/// A full synchronization run
pub mod sync;
/// Data types used throughout the crate
pub mod types;

pub use ops::canonicalize_name;

/// Installs the `tracing` subscriber used by the binaries.
///
/// Log lines go to stderr, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
