//! Crate-wide error types

use thiserror::Error;

/// Errors raised by the FTP client, the listing parser, the store and the
/// configuration loader
#[derive(Error, Debug)]
pub enum Error {
    /// IO error during network or file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS error during the FTPS upgrade
    #[error("TLS error: {0}")]
    Tls(String),

    /// Connect or read deadline expired
    #[error("Connection timeout")]
    Timeout,

    /// Server closed the connection mid-response
    #[error("Connection closed")]
    ConnectionClosed,

    /// Reply line that does not follow RFC 959 framing
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Well-formed reply with an unexpected code
    #[error("FTP error {code}: {message}")]
    Protocol {
        /// 3-digit FTP reply code (e.g. 530, 550)
        code: u16,
        /// Reply text from the server
        message: String,
    },

    /// USER/PASS sequence rejected
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// HTTP CONNECT proxy refused the tunnel
    #[error("Proxy error: {0}")]
    Proxy(String),

    /// Malformed `STAT` listing line
    #[error("Invalid listing: {0}")]
    Listing(String),

    /// SQLite error from the search index
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration file could not be parsed or failed validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid `column:direction` sort expression
    #[error("Invalid sort order: {0}")]
    InvalidOrder(String),

    /// Search produced no rows
    #[error("no directories matched")]
    NoMatches,
}

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;
