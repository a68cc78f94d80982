//! Session state types for the FTP client

/// FTP control-channel session state
///
/// Commands are restricted by state: `AUTH TLS` is only valid before
/// login, listing commands only after it. Any transport error moves the
/// session to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum SessionState {
    /// Greeting consumed, not yet authenticated
    Connected,
    /// USER/PASS accepted
    Authenticated,
    /// QUIT sent or transport failure
    Closed,
}
