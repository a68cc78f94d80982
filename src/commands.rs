//! FTP command builders and reply-line parsing

use crate::error::{Error, Result};

/// Parse one reply line into its code, continuation flag and text.
///
/// RFC 959 §4.2: `NNN text` terminates a reply, `NNN-text` opens a
/// multi-line reply that runs until a line starting with `NNN ` (same
/// code followed by a space).
pub fn parse_reply_line(line: &str) -> Result<(u16, bool, String)> {
    let bytes = line.as_bytes();
    if bytes.len() < 3
        || !bytes[0].is_ascii_digit()
        || !bytes[1].is_ascii_digit()
        || !bytes[2].is_ascii_digit()
    {
        return Err(Error::InvalidResponse(line.chars().take(100).collect()));
    }
    let code = line[0..3]
        .parse::<u16>()
        .map_err(|_| Error::InvalidResponse(line.chars().take(100).collect()))?;
    let more = bytes.len() > 3 && bytes[3] == b'-';
    let text = if line.len() > 4 {
        line[4..].to_string()
    } else {
        String::new()
    };
    Ok((code, more, text))
}

/// Build USER command
pub fn user(username: &str) -> String {
    format!("USER {}\r\n", username)
}

/// Build PASS command
pub fn pass(password: &str) -> String {
    format!("PASS {}\r\n", password)
}

/// Build STAT command
///
/// The server answers with a `213` reply embedding the directory listing,
/// avoiding a data-channel transfer.
pub fn stat(path: &str) -> String {
    format!("STAT {}\r\n", path)
}

/// Build CWD command
pub fn cwd(path: &str) -> String {
    format!("CWD {}\r\n", path)
}

/// Build AUTH TLS command (RFC 4217 explicit FTPS)
pub fn auth_tls() -> String {
    "AUTH TLS\r\n".to_string()
}

/// Build PBSZ command (protection buffer size, always 0 for TLS)
pub fn pbsz() -> String {
    "PBSZ 0\r\n".to_string()
}

/// Build PROT command requesting a private data channel
pub fn prot_private() -> String {
    "PROT P\r\n".to_string()
}

/// Build QUIT command
pub fn quit() -> String {
    "QUIT\r\n".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reply_line() {
        let (code, more, text) = parse_reply_line("220 Service ready").unwrap();
        assert_eq!(code, 220);
        assert!(!more);
        assert_eq!(text, "Service ready");

        let (code, more, text) = parse_reply_line("213- status of -al .:").unwrap();
        assert_eq!(code, 213);
        assert!(more);
        assert_eq!(text, " status of -al .:");

        let (code, _, text) = parse_reply_line("230").unwrap();
        assert_eq!(code, 230);
        assert_eq!(text, "");
    }

    #[test]
    fn test_parse_reply_line_invalid() {
        assert!(parse_reply_line("").is_err());
        assert!(parse_reply_line("ab").is_err());
        assert!(parse_reply_line("2x0 hello").is_err());
    }

    #[test]
    fn test_command_builders() {
        assert_eq!(user("anonymous"), "USER anonymous\r\n");
        assert_eq!(pass("secret"), "PASS secret\r\n");
        assert_eq!(stat("-al /files"), "STAT -al /files\r\n");
        assert_eq!(cwd("/a dir"), "CWD /a dir\r\n");
        assert_eq!(auth_tls(), "AUTH TLS\r\n");
        assert_eq!(pbsz(), "PBSZ 0\r\n");
        assert_eq!(prot_private(), "PROT P\r\n");
        assert_eq!(quit(), "QUIT\r\n");
    }
}
