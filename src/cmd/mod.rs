//! Command entry points for the `ftpindex` binary

pub mod gc;
pub mod search;
pub mod update;

/// Expand a leading `~/` using the `HOME` environment variable.
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return format!("{}/{}", home.trim_end_matches('/'), rest);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde() {
        // Only a leading ~/ is expanded
        assert_eq!(expand_tilde("/etc/ftpindexrc"), "/etc/ftpindexrc");
        assert_eq!(expand_tilde("rc~"), "rc~");
        if let Ok(home) = std::env::var("HOME") {
            assert_eq!(
                expand_tilde("~/.ftpindexrc"),
                format!("{}/.ftpindexrc", home.trim_end_matches('/'))
            );
        }
    }
}
