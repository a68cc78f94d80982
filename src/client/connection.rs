//! Connection establishment for the FTP client
//!
//! TCP dialing (optionally through an HTTP `CONNECT` proxy), greeting
//! validation, and the TLS client configuration used by the explicit
//! FTPS upgrade.

use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tracing::{debug, warn};
use url::Url;

use super::FtpClient;
use super::state::SessionState;
use super::stream::Stream;
use crate::error::{Error, Result};

/// TLS options for the explicit FTPS upgrade
#[derive(Debug, Clone, Copy, Default)]
pub struct TlsOptions {
    /// Skip certificate validation. Many FTPS servers present
    /// self-signed certificates, so this is commonly enabled per site.
    /// It leaves the connection open to man-in-the-middle attacks.
    pub insecure_skip_verify: bool,
}

/// Certificate verifier that accepts any certificate
///
/// Selected by [`TlsOptions::insecure_skip_verify`] for servers with
/// self-signed certificates.
#[derive(Debug)]
struct DangerousAcceptAnyCertificate;

impl ServerCertVerifier for DangerousAcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, tokio_rustls::rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
            SignatureScheme::ED448,
        ]
    }
}

/// Build the rustls client configuration for [`TlsOptions`].
pub(super) fn tls_client_config(opts: TlsOptions) -> ClientConfig {
    use tokio_rustls::rustls::crypto::{CryptoProvider, ring};
    let _ = CryptoProvider::install_default(ring::default_provider());

    if opts.insecure_skip_verify {
        warn!("TLS certificate validation disabled");
        ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(DangerousAcceptAnyCertificate))
            .with_no_client_auth()
    } else {
        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth()
    }
}

async fn dial(address: &str, connect_timeout: Duration) -> Result<TcpStream> {
    let socket_addr = address
        .to_socket_addrs()
        .map_err(|e| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("failed to resolve {address}: {e}"),
            ))
        })?
        .next()
        .ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("no address resolved for {address}"),
            ))
        })?;

    let domain = if socket_addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP)).map_err(Error::Io)?;
    // Command/response traffic wants low latency, not throughput
    socket.set_nodelay(true).map_err(Error::Io)?;

    // socket2 connects are blocking; set non-blocking only afterwards
    let connect = tokio::task::spawn_blocking(move || -> std::io::Result<std::net::TcpStream> {
        socket.connect(&socket_addr.into())?;
        socket.set_nonblocking(true)?;
        Ok(socket.into())
    });
    let std_stream = if connect_timeout > Duration::ZERO {
        timeout(connect_timeout, connect)
            .await
            .map_err(|_| Error::Timeout)?
    } else {
        connect.await
    }
    .map_err(|e| Error::Io(std::io::Error::other(format!("task join error: {e}"))))?
    .map_err(Error::Io)?;

    TcpStream::from_std(std_stream).map_err(Error::Io)
}

fn host_of(address: &str) -> String {
    address
        .rsplit_once(':')
        .map(|(host, _)| host)
        .unwrap_or(address)
        .to_string()
}

impl FtpClient {
    /// Connect to an FTP server and consume its greeting.
    ///
    /// `address` is `host:port`. The TCP dial is bounded by
    /// `connect_timeout` (zero disables the bound), which also serves as
    /// the deadline for reading the greeting. A non-2xx greeting fails
    /// the connect.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] - dial failure (resolution, refused, unreachable)
    /// - [`Error::Timeout`] - dial or greeting deadline expired
    /// - [`Error::Protocol`] - server greeted with a non-2xx reply
    pub async fn connect(address: &str, connect_timeout: Duration) -> Result<Self> {
        debug!("connecting to {}", address);
        let conn = dial(address, connect_timeout).await?;
        Self::handshake(conn, host_of(address), connect_timeout).await
    }

    /// Connect through an HTTP `CONNECT` proxy.
    ///
    /// `proxy_url` is an `http://` URL, optionally carrying credentials
    /// for `Proxy-Authorization: Basic`. After the tunnel is established
    /// the session proceeds exactly as [`connect`](Self::connect).
    pub async fn connect_via_proxy(
        proxy_url: &str,
        address: &str,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let proxy = Url::parse(proxy_url)
            .map_err(|e| Error::Proxy(format!("invalid proxy URL {proxy_url}: {e}")))?;
        let proxy_host = proxy
            .host_str()
            .ok_or_else(|| Error::Proxy(format!("proxy URL {proxy_url} has no host")))?;
        let proxy_port = proxy.port_or_known_default().unwrap_or(80);
        let proxy_addr = format!("{proxy_host}:{proxy_port}");

        debug!("connecting to {} via proxy {}", address, proxy_addr);
        let conn = dial(&proxy_addr, connect_timeout).await?;
        let mut stream = Stream::plain(conn);

        let mut request = format!("CONNECT {address} HTTP/1.1\r\nHost: {address}\r\n");
        if !proxy.username().is_empty() {
            use base64::Engine;
            let credentials = format!(
                "{}:{}",
                proxy.username(),
                proxy.password().unwrap_or_default()
            );
            let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
            request.push_str(&format!("Proxy-Authorization: Basic {encoded}\r\n"));
        }
        request.push_str("\r\n");
        stream.write_all(request.as_bytes()).await?;

        let tunnel = async {
            let status = read_proxy_line(&mut stream).await?;
            let ok = status
                .split_whitespace()
                .nth(1)
                .is_some_and(|code| code == "200");
            if !ok {
                return Err(Error::Proxy(format!("CONNECT failed: {status}")));
            }
            // Drain response headers up to the blank line
            loop {
                if read_proxy_line(&mut stream).await?.is_empty() {
                    return Ok(());
                }
            }
        };
        if connect_timeout > Duration::ZERO {
            timeout(connect_timeout, tunnel)
                .await
                .map_err(|_| Error::Timeout)??;
        } else {
            tunnel.await?;
        }

        let Some(conn) = stream.take_plain() else {
            return Err(Error::ConnectionClosed);
        };
        Self::handshake(conn, host_of(address), connect_timeout).await
    }

    async fn handshake(conn: TcpStream, host: String, connect_timeout: Duration) -> Result<Self> {
        let mut client = Self {
            stream: Stream::plain(conn),
            state: SessionState::Connected,
            host,
            read_timeout: connect_timeout,
        };
        let (code, message) = client.read_reply().await?;
        debug!("server greeting: {} {}", code, message);
        if !(200..300).contains(&code) {
            return Err(Error::Protocol { code, message });
        }
        client.read_timeout = Duration::ZERO;
        Ok(client)
    }
}

async fn read_proxy_line(stream: &mut Stream) -> Result<String> {
    let bytes = stream.read_line_bytes().await?;
    if bytes.is_empty() {
        return Err(Error::ConnectionClosed);
    }
    Ok(String::from_utf8_lossy(&bytes).trim_end().to_string())
}
