//! Parsing of `/bin/ls -l`-style directory listings
//!
//! FTP servers embed such listings in the body of a `STAT <path>` reply.
//! This module turns that text into structured [`File`] records.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use chrono::{DateTime, Datelike, Month, TimeZone, Utc};

use crate::error::{Error, Result};

bitflags! {
    /// File type and permission bits parsed from a 10-character mode string
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FileMode: u16 {
        /// Entry is a directory (`d` type character)
        const DIR = 1 << 15;
        /// Entry is a symbolic link (`l` type character)
        const SYMLINK = 1 << 14;

        const OWNER_READ = 0o400;
        const OWNER_WRITE = 0o200;
        const OWNER_EXEC = 0o100;
        const GROUP_READ = 0o040;
        const GROUP_WRITE = 0o020;
        const GROUP_EXEC = 0o010;
        const OTHER_READ = 0o004;
        const OTHER_WRITE = 0o002;
        const OTHER_EXEC = 0o001;
    }
}

impl fmt::Display for FileMode {
    /// Formats the mode back into its 10-character listing form,
    /// e.g. `drwxr-xr-x`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.contains(FileMode::DIR) {
            'd'
        } else if self.contains(FileMode::SYMLINK) {
            'l'
        } else {
            '-'
        };
        write!(f, "{}", kind)?;
        for i in 1..=9u16 {
            let set = self.bits() & (1 << (9 - i)) != 0;
            let c = match (set, i % 3) {
                (false, _) => '-',
                (true, 1) => 'r',
                (true, 2) => 'w',
                (true, _) => 'x',
            };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

/// A single entry from a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    /// Entry name, may contain spaces
    pub name: String,
    /// Server-absolute path: listing path joined with [`name`](Self::name)
    pub path: String,
    /// Owning user
    pub user: String,
    /// Owning group
    pub group: String,
    /// Hard-link count, or child count for directories
    pub num_entries: u64,
    /// Size in bytes
    pub size: u64,
    /// Modification time (UTC)
    pub modified: DateTime<Utc>,
    /// Type and permission bits
    pub mode: FileMode,
}

impl File {
    /// Whether this is the `.` or `..` meta entry
    pub fn is_current_or_parent(&self) -> bool {
        self.name == "." || self.name == ".."
    }

    /// Whether the symlink bit is set
    pub fn is_symlink(&self) -> bool {
        self.mode.contains(FileMode::SYMLINK)
    }

    /// Whether the directory bit is set
    pub fn is_dir(&self) -> bool {
        self.mode.contains(FileMode::DIR)
    }
}

/// Joins server paths with forward slashes regardless of host OS.
///
/// A name of `.` yields the parent unchanged.
pub fn join_path(parent: &str, name: &str) -> String {
    if name == "." || name.is_empty() {
        return parent.to_string();
    }
    if parent.is_empty() {
        return name.to_string();
    }
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Parses a 10-character mode string such as `drwxr-xr-x`.
///
/// The first character selects the type (`d` directory, `l` symlink,
/// anything else regular). Each following `r`, `w` or `x` sets the
/// permission bit for its position; any other character leaves it clear.
pub fn parse_mode(s: &str) -> Result<FileMode> {
    if s.chars().count() != 10 {
        return Err(Error::Listing(format!("mode {s:?}: length must be 10")));
    }
    let mut mode = FileMode::empty();
    for (i, c) in s.chars().enumerate() {
        if i == 0 {
            match c {
                'd' => mode |= FileMode::DIR,
                'l' => mode |= FileMode::SYMLINK,
                _ => {}
            }
        } else if matches!(c, 'r' | 'w' | 'x') {
            mode |= FileMode::from_bits_retain(1 << (9 - i as u16));
        }
    }
    Ok(mode)
}

/// Parses the month/day/year-or-time columns of a listing line.
///
/// Listings omit the year for recent entries and print `HH:MM` instead.
/// In that case the year is taken from `now`, minus one when the parsed
/// month is later than the current month (the entry is assumed to be at
/// most six months old).
pub fn parse_time(
    now: DateTime<Utc>,
    month: &str,
    day: u32,
    year_or_time: &str,
) -> Result<DateTime<Utc>> {
    let month = Month::from_str(month)
        .map_err(|_| Error::Listing(format!("invalid month {month:?}")))?
        .number_from_month();
    let mut year = now.year();
    let mut hour = 0;
    let mut minute = 0;
    if let Some((h, m)) = year_or_time.split_once(':') {
        hour = h
            .parse()
            .map_err(|_| Error::Listing(format!("invalid hour {h:?}")))?;
        minute = m
            .parse()
            .map_err(|_| Error::Listing(format!("invalid minute {m:?}")))?;
        if month > now.month() {
            year -= 1;
        }
    } else {
        year = year_or_time
            .parse()
            .map_err(|_| Error::Listing(format!("invalid year {year_or_time:?}")))?;
    }
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .ok_or_else(|| Error::Listing(format!("invalid date {year}-{month}-{day}")))
}

// Field layout of a listing line:
//   <mode> <nentries> <user> <group> <size> <month> <day> <year-or-time> <name>
// The name is the raw remainder and may contain spaces.
fn split_fields(line: &str) -> Option<([&str; 8], &str)> {
    let mut rest = line;
    let mut fields = [""; 8];
    for field in &mut fields {
        let end = rest.find(char::is_whitespace)?;
        *field = &rest[..end];
        rest = rest[end..].trim_start();
    }
    if rest.is_empty() {
        return None;
    }
    Some((fields, rest))
}

/// Parses one listing line into a [`File`], joining `parent` with the
/// entry name to form its path.
pub fn parse_file(now: DateTime<Utc>, parent: &str, line: &str) -> Result<File> {
    let (fields, name) = split_fields(line)
        .ok_or_else(|| Error::Listing(format!("failed to parse file: {line}")))?;
    let mode = parse_mode(fields[0])?;
    let num_entries = fields[1]
        .parse()
        .map_err(|_| Error::Listing(format!("invalid entry count {:?}", fields[1])))?;
    let size = fields[4]
        .parse()
        .map_err(|_| Error::Listing(format!("invalid size {:?}", fields[4])))?;
    let day = fields[6]
        .parse()
        .map_err(|_| Error::Listing(format!("invalid day {:?}", fields[6])))?;
    let modified = parse_time(now, fields[5], day, fields[7])?;
    Ok(File {
        name: name.to_string(),
        path: join_path(parent, name),
        user: fields[2].to_string(),
        group: fields[3].to_string(),
        num_entries,
        size,
        modified,
        mode,
    })
}

/// Parses the body of a `STAT <path>` reply into file records.
///
/// The `213-` banner, the `213 End of Status` terminator, `total` headers
/// and blank lines are skipped. Any remaining malformed line fails the
/// whole listing.
pub fn parse_listing(now: DateTime<Utc>, path: &str, message: &str) -> Result<Vec<File>> {
    let mut files = Vec::new();
    for line in message.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("213") {
            continue;
        }
        if line.split_whitespace().count() < 9 {
            continue;
        }
        files.push(parse_file(now, path, line)?);
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        dt(year, month, day, 0, 0)
    }

    fn dt(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_mode_round_trip() {
        let tests = [
            "drwxrwxrwx",
            "lrwxrwxrwx",
            "-rwxrwxrwx",
            "-rwxr--r--",
            "-r-xr-xr-x",
        ];
        for tt in tests {
            let mode = parse_mode(tt).unwrap();
            assert_eq!(mode.to_string(), tt, "round trip of {tt:?}");
        }
    }

    #[test]
    fn test_parse_mode_invalid_length() {
        assert!(parse_mode("drwxr-xr-").is_err());
        assert!(parse_mode("drwxr-xr-x-").is_err());
        assert!(parse_mode("").is_err());
    }

    #[test]
    fn test_parse_time() {
        // (day, month, year-or-time, expected, now)
        let tests = [
            (15, "Jan", "2014", date(2014, 1, 15), Utc::now()),
            (7, "Oct", "23:14", dt(2016, 10, 7, 23, 14), date(2016, 11, 1)),
            (21, "Jul", "05:32", dt(2016, 7, 21, 5, 32), date(2016, 11, 1)),
            // Previous year: listing month is ahead of the current one
            (10, "Dec", "09:24", dt(2017, 12, 10, 9, 24), date(2018, 1, 1)),
            (10, "Jan", "09:24", dt(2018, 1, 10, 9, 24), date(2018, 1, 1)),
        ];
        for (day, month, year_or_time, want, now) in tests {
            let got = parse_time(now, month, day, year_or_time).unwrap();
            assert_eq!(got, want, "parse_time({month:?}, {day}, {year_or_time:?})");
        }
    }

    #[test]
    fn test_parse_time_invalid() {
        let now = date(2016, 11, 1);
        assert!(parse_time(now, "Foo", 1, "2014").is_err());
        assert!(parse_time(now, "Jan", 1, "aa:bb").is_err());
        assert!(parse_time(now, "Jan", 42, "2014").is_err());
    }

    #[test]
    fn test_parse_file() {
        let now = date(2016, 11, 1);
        let f = parse_file(
            now,
            "/files",
            "drwxrwxrwx   3 foo   bar       4096 Jul 25   2014 dir with spaces",
        )
        .unwrap();
        assert_eq!(
            f,
            File {
                name: "dir with spaces".to_string(),
                path: "/files/dir with spaces".to_string(),
                user: "foo".to_string(),
                group: "bar".to_string(),
                num_entries: 3,
                size: 4096,
                modified: date(2014, 7, 25),
                mode: parse_mode("drwxrwxrwx").unwrap(),
            }
        );
    }

    #[test]
    fn test_parse_file_recent() {
        let now = date(2016, 11, 1);
        let f = parse_file(
            now,
            "/",
            "drwxrwxrwx   3 bax   baz     131072 Jan 19  23:14 dir",
        )
        .unwrap();
        assert_eq!(f.path, "/dir");
        assert_eq!(f.size, 131072);
        assert_eq!(f.modified, dt(2016, 1, 19, 23, 14));
    }

    #[test]
    fn test_parse_listing() {
        let message = "213- status of -al .:
total 1488
drwxr-xr-x  19 foo   bar       4096 Dec 23 13:00 .
drwxr-xr-x  16 foo   bar       4096 May  2  2015 ..
drwxrwxrwx   3 foo   bar       4096 Jul  3  2014 dir1
drwxrwxrwx  19 foo   bar       4096 Apr 10 08:41 dir2
drwxrwxrwx  72 foo   bar      94208 May 15 01:03 dir3
213 End of Status";
        let files = parse_listing(date(2016, 11, 1), "/", message).unwrap();
        assert_eq!(files.len(), 5);
        // Meta rows are kept; the walker skips them
        assert!(files[0].is_current_or_parent());
        assert!(files[1].is_current_or_parent());
        assert_eq!(files[2].path, "/dir1");
        assert!(files[2].is_dir());
    }

    #[test]
    fn test_parse_listing_skips_status_lines() {
        // Banner with enough fields to look like a record
        let message = "213- status of -al /a b c d e f:";
        let files = parse_listing(Utc::now(), "/", message).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_parse_listing_malformed_is_fatal() {
        let message = "?rwxrwxrwxx  3 foo bar 4096 Jul  3  2014 dir1";
        assert!(parse_listing(Utc::now(), "/", message).is_err());
    }

    #[test]
    fn test_is_symlink() {
        let f = parse_file(
            Utc::now(),
            "/",
            "lrwxrwxrwx   1 foo   bar         11 Jul  3  2014 link -> dir1",
        )
        .unwrap();
        assert!(f.is_symlink());
        assert!(!f.is_dir());
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/", "dir1"), "/dir1");
        assert_eq!(join_path("/files", "dir1"), "/files/dir1");
        assert_eq!(join_path("/files", "."), "/files");
        assert_eq!(join_path("", "dir1"), "dir1");
    }
}
