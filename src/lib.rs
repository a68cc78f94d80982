//! Multi-site FTP directory crawler with a local full-text search index
//!
//! For each configured site a control-channel FTP session (plain or
//! explicit TLS) walks the directory tree through `STAT` listings,
//! records the leaf-level directories, and atomically replaces the
//! site's rows in a SQLite/FTS4 index that is searched offline.

/// FTP control-channel client
pub mod client;
/// Command entry points used by the binary
pub mod cmd;
/// FTP command builders and reply-line parsing
pub mod commands;
/// JSON configuration with per-site defaults
pub mod config;
/// Shallow-walk crawler
pub mod crawler;
mod error;
/// `ls -l`-style listing parsing
pub mod listing;
/// SQLite/FTS4 search index
pub mod store;

pub use client::{FtpClient, TlsOptions};
pub use config::{Config, SiteConfig};
pub use crawler::{Crawler, Lister, walk};
pub use error::{Error, Result};
pub use listing::{File, FileMode};
pub use store::{Dir, SearchResult, Site, Store};
