//! Low-level control-channel I/O
//!
//! Command transmission, reply reading with RFC 959 §4.2 multi-line
//! framing, and per-response read deadlines.

use std::time::Duration;

use tokio::time::timeout;
use tracing::trace;

use super::FtpClient;
use crate::commands;
use crate::error::{Error, Result};

impl FtpClient {
    /// Send a CRLF-terminated command to the server.
    pub(super) async fn send_command(&mut self, command: &str) -> Result<()> {
        trace!("sending command: {}", command.trim_end());
        if let Err(err) = self.stream.write_all(command.as_bytes()).await {
            self.mark_closed();
            return Err(err.into());
        }
        Ok(())
    }

    /// Read one complete reply, honoring the configured read deadline.
    ///
    /// For a single-line reply the message is the text after the code.
    /// For a multi-line reply (`NNN-`) the message is every raw line up
    /// to and including the `NNN ` terminator line, joined with `\n`, so
    /// `STAT` listings reach the parser with their banner and terminator
    /// intact. Intermediate lines that repeat the `NNN-` prefix have it
    /// stripped, matching servers that tag every line.
    pub(super) async fn read_reply(&mut self) -> Result<(u16, String)> {
        let deadline = self.read_timeout;
        let result = if deadline > Duration::ZERO {
            match timeout(deadline, self.read_reply_inner()).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout),
            }
        } else {
            self.read_reply_inner().await
        };
        if result.is_err() {
            self.mark_closed();
        }
        result
    }

    async fn read_reply_inner(&mut self) -> Result<(u16, String)> {
        let first = self.read_line().await?;
        let (code, more, text) = commands::parse_reply_line(&first)?;
        trace!("received: {}", first);
        if !more {
            return Ok((code, text));
        }

        let continuation = format!("{code}-");
        let terminator = format!("{code} ");
        let mut message = first;
        loop {
            let line = self.read_line().await?;
            trace!("received: {}", line);
            message.push('\n');
            if line.starts_with(&terminator) || line == code.to_string() {
                message.push_str(&line);
                return Ok((code, message));
            }
            // Servers may tag every line of the block with the code
            let body = line.strip_prefix(&continuation).unwrap_or(&line);
            message.push_str(body);
        }
    }

    async fn read_line(&mut self) -> Result<String> {
        let bytes = self.stream.read_line_bytes().await?;
        if bytes.is_empty() {
            return Err(Error::ConnectionClosed);
        }
        let line = String::from_utf8_lossy(&bytes);
        Ok(line.trim_end().to_string())
    }
}
