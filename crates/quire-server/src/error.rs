//! Server error types.

use std::io;
use std::net::AddrParseError;

/// Error starting or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// `host:port` is not a valid socket address.
    #[error("Invalid listen address {address}: {source}")]
    Address {
        address: String,
        #[source]
        source: AddrParseError,
    },
    /// Binding or serving failed.
    #[error("Server I/O error: {0}")]
    Io(#[from] io::Error),
}
