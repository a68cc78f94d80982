//! Authentication and the explicit FTPS upgrade

use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::pki_types::ServerName;
use tracing::debug;

use super::FtpClient;
use super::connection::{TlsOptions, tls_client_config};
use super::state::SessionState;
use super::stream::Stream;
use crate::commands;
use crate::error::{Error, Result};

/// TLS handshake timeout in seconds
const TLS_HANDSHAKE_TIMEOUT_SECS: u64 = 60;

impl FtpClient {
    /// Authenticate with `USER`/`PASS`.
    ///
    /// A `230` reply to `USER` means the session is already
    /// authenticated and no password is sent; otherwise the server must
    /// answer `331` and accept `PASS` with `230`.
    ///
    /// # Errors
    ///
    /// - [`Error::AuthFailed`] - the server rejected the password
    /// - [`Error::Protocol`] - unexpected reply code, or login attempted
    ///   on a closed/authenticated session
    pub async fn login(&mut self, user: &str, pass: &str) -> Result<()> {
        if self.state != SessionState::Connected {
            return Err(Error::Protocol {
                code: 503,
                message: "Bad sequence of commands".to_string(),
            });
        }
        debug!("authenticating as {}", user);
        self.send_command(&commands::user(user)).await?;
        let (code, message) = self.read_reply().await?;
        match code {
            230 => {}
            331 => {
                self.send_command(&commands::pass(pass)).await?;
                let (code, message) = self.read_reply().await?;
                if code != 230 {
                    return Err(Error::AuthFailed(message));
                }
            }
            _ => return Err(Error::Protocol { code, message }),
        }
        self.state = SessionState::Authenticated;
        debug!("authentication successful");
        Ok(())
    }

    /// Upgrade the control channel to TLS with `AUTH TLS` (RFC 4217).
    ///
    /// After the server answers `234` the underlying socket is wrapped
    /// in place by a TLS client stream; every subsequent command and
    /// reply is encrypted. Only valid before [`login`](Self::login).
    pub async fn auth_tls(&mut self, opts: TlsOptions) -> Result<()> {
        if self.state != SessionState::Connected || !self.stream.is_plain() {
            return Err(Error::Protocol {
                code: 503,
                message: "Bad sequence of commands".to_string(),
            });
        }
        self.cmd(234, &commands::auth_tls()).await?;

        let Some(conn) = self.stream.take_plain() else {
            self.mark_closed();
            return Err(Error::ConnectionClosed);
        };
        let connector = TlsConnector::from(Arc::new(tls_client_config(opts)));
        let server_name = match ServerName::try_from(self.host.clone()) {
            Ok(name) => name,
            Err(e) => {
                self.mark_closed();
                return Err(Error::Tls(format!("invalid server name: {e}")));
            }
        };
        let handshake = timeout(
            Duration::from_secs(TLS_HANDSHAKE_TIMEOUT_SECS),
            connector.connect(server_name, conn),
        )
        .await;
        match handshake {
            Ok(Ok(tls_stream)) => {
                self.stream = Stream::Tls(BufReader::new(tls_stream));
                debug!("control channel upgraded to TLS");
                Ok(())
            }
            Ok(Err(e)) => {
                self.mark_closed();
                Err(Error::Tls(format!("TLS handshake failed: {e}")))
            }
            Err(_) => {
                self.mark_closed();
                Err(Error::Timeout)
            }
        }
    }

    /// Full explicit-FTPS login: `AUTH TLS`, `USER`/`PASS`, then
    /// `PBSZ 0` and `PROT P` to negotiate protected channels.
    pub async fn login_with_tls(&mut self, opts: TlsOptions, user: &str, pass: &str) -> Result<()> {
        self.auth_tls(opts).await?;
        self.login(user, pass).await?;
        self.cmd(200, &commands::pbsz()).await?;
        self.cmd(200, &commands::prot_private()).await?;
        Ok(())
    }
}
