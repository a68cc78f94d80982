//! RFC 959 control-channel FTP client with explicit-TLS support
//!
//! Directory contents are obtained through `STAT` replies, so no data
//! channel is ever opened.

mod auth;
mod connection;
mod io;
mod state;
mod stream;

use std::time::Duration;

use tracing::debug;

use crate::commands;
use crate::error::{Error, Result};
use state::SessionState;
use stream::Stream;

pub use connection::TlsOptions;

/// Async FTP control-channel client
///
/// A session is established with [`connect`](Self::connect) (or
/// [`connect_via_proxy`](Self::connect_via_proxy)), authenticated with
/// [`login`](Self::login) or [`login_with_tls`](Self::login_with_tls),
/// and then drives [`stat`](Self::stat) / [`cwd`](Self::cwd) until
/// [`quit`](Self::quit).
#[must_use]
#[derive(Debug)]
pub struct FtpClient {
    /// Control connection, plain or TLS-upgraded
    stream: Stream,
    /// Session state gating commands
    state: SessionState,
    /// Host part of the dialed address, used for SNI
    host: String,
    /// Per-response read deadline; zero disables it
    read_timeout: Duration,
}

impl FtpClient {
    /// Set the deadline applied to every subsequent response read.
    ///
    /// Each command's reply must arrive in full before `now + timeout`.
    /// A zero duration disables the deadline.
    pub fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    /// Send a command and read its reply, requiring the given code.
    ///
    /// Returns the reply code and message body. A well-formed reply with
    /// a different code is [`Error::Protocol`]; transport failures close
    /// the session.
    pub async fn cmd(&mut self, expect: u16, command: &str) -> Result<(u16, String)> {
        self.send_command(command).await?;
        let (code, message) = self.read_reply().await?;
        if code != expect {
            return Err(Error::Protocol { code, message });
        }
        Ok((code, message))
    }

    /// Issue `STAT <path>` and return the embedded listing text.
    pub async fn stat(&mut self, path: &str) -> Result<String> {
        self.require_authenticated()?;
        let (_, message) = self.cmd(213, &commands::stat(path)).await?;
        Ok(message)
    }

    /// Issue `CWD <path>`.
    ///
    /// Some servers fail `STAT` on paths containing spaces; callers work
    /// around that by changing directory first and statting `.`.
    pub async fn cwd(&mut self, path: &str) -> Result<()> {
        self.require_authenticated()?;
        self.cmd(250, &commands::cwd(path)).await?;
        Ok(())
    }

    /// Issue `QUIT` and close the session.
    pub async fn quit(&mut self) -> Result<()> {
        let result = self.cmd(221, &commands::quit()).await;
        self.state = SessionState::Closed;
        self.stream = Stream::Closed;
        debug!("session closed");
        result.map(|_| ())
    }

    fn require_authenticated(&self) -> Result<()> {
        if self.state != SessionState::Authenticated {
            return Err(Error::Protocol {
                code: 530,
                message: "Not logged in".to_string(),
            });
        }
        Ok(())
    }

    fn mark_closed(&mut self) {
        self.state = SessionState::Closed;
        self.stream = Stream::Closed;
    }
}
