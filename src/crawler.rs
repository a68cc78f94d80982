//! Shallow-walk crawling of one FTP site
//!
//! The walk records the deepest directory level whose contents look like
//! real payload, skipping intermediate organisational levels: as soon as
//! a peeked directory contains a non-directory child, its siblings are
//! taken as the leaves and the walk stops descending past them.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::client::{FtpClient, TlsOptions};
use crate::config::SiteConfig;
use crate::error::{Error, Result};
use crate::listing::{File, join_path, parse_listing};
use crate::store::{Dir, Store};

/// Listing capability the walk is parameterised over, so tests can
/// inject a fake in place of a live FTP session
pub trait Lister {
    /// List one directory, already filtered
    fn list(&mut self, path: &str) -> impl Future<Output = Result<Vec<File>>> + Send;
}

// `_`-prefixed names first, then lexicographic. The first sibling in
// this order decides the maximum depth for the rest of the level.
fn sort_files(files: &mut [File]) {
    files.sort_by(|a, b| {
        (!a.name.starts_with('_'), &a.name).cmp(&(!b.name.starts_with('_'), &b.name))
    });
}

/// Walk `path`, recording directory entries down to the leaf level.
///
/// `maxdepth` caps how deep the walk may descend, counted as the number
/// of `/` in a subpath; zero means uncapped. The cap is set by the first
/// sibling whose contents include a non-directory.
pub async fn walk<L>(lister: &mut L, path: &str, maxdepth: i64) -> Result<Vec<File>>
where
    L: Lister + Send,
{
    walk_inner(lister, path.to_string(), maxdepth).await
}

fn walk_inner<L>(
    lister: &mut L,
    path: String,
    mut maxdepth: i64,
) -> Pin<Box<dyn Future<Output = Result<Vec<File>>> + Send + '_>>
where
    L: Lister + Send,
{
    Box::pin(async move {
        let mut files = lister.list(&path).await?;
        sort_files(&mut files);
        let mut walked = files.clone();
        for f in &files {
            if f.is_current_or_parent() || !f.is_dir() {
                continue;
            }
            let subpath = join_path(&path, &f.name);
            let depth = subpath.matches('/').count() as i64;
            if maxdepth > 0 && depth > maxdepth {
                continue;
            }
            // Peek one level down; payload there means this level holds
            // the leaves and the walk must not descend past it
            let peek = lister.list(&subpath).await?;
            if peek.iter().any(|p| !p.is_dir()) {
                maxdepth = depth - 1;
                continue;
            }
            let below = walk_inner(&mut *lister, subpath, maxdepth).await?;
            walked.extend(below);
        }
        Ok(walked)
    })
}

/// Crawls a single site and replaces its rows in the store
pub struct Crawler {
    site: SiteConfig,
    store: Arc<Store>,
    client: Option<FtpClient>,
}

impl Crawler {
    pub fn new(site: SiteConfig, store: Arc<Store>) -> Self {
        Self {
            site,
            store,
            client: None,
        }
    }

    /// Site name this crawler works on.
    pub fn name(&self) -> &str {
        &self.site.name
    }

    /// Dial and authenticate according to the site configuration.
    pub async fn connect(&mut self) -> Result<()> {
        let connect_timeout = self.site.connect_timeout()?;
        let mut client = if self.site.proxy.is_empty() {
            FtpClient::connect(&self.site.address, connect_timeout).await?
        } else {
            FtpClient::connect_via_proxy(&self.site.proxy, &self.site.address, connect_timeout)
                .await?
        };
        client.set_read_timeout(self.site.read_timeout()?);
        if self.site.tls {
            let opts = TlsOptions {
                insecure_skip_verify: self.site.insecure_skip_verify,
            };
            client
                .login_with_tls(opts, &self.site.username, &self.site.password)
                .await?;
        } else {
            client
                .login(&self.site.username, &self.site.password)
                .await?;
        }
        self.client = Some(client);
        Ok(())
    }

    /// Walk the site from its root and atomically replace its rows.
    pub async fn run(&mut self) -> Result<()> {
        let root = if self.site.root.is_empty() {
            "/".to_string()
        } else {
            self.site.root.clone()
        };
        info!(site = %self.site.name, root = %root, "crawling");
        let files = walk(self, &root, 0).await?;
        let dirs: Vec<Dir> = files
            .iter()
            .filter(|f| f.is_dir() && !f.is_current_or_parent())
            .map(|f| Dir {
                path: f.path.clone(),
                modified: f.modified.timestamp(),
            })
            .collect();
        info!(site = %self.site.name, dirs = dirs.len(), "updating index");
        self.store.insert(&self.site.name, &dirs)
    }

    /// End the session; a failed `QUIT` is only logged.
    pub async fn close(&mut self) {
        if let Some(mut client) = self.client.take() {
            if let Err(err) = client.quit().await {
                debug!(site = %self.site.name, %err, "closing session failed");
            }
        }
    }

    fn filter_files(&self, files: Vec<File>) -> Vec<File> {
        files
            .into_iter()
            .filter(|f| !self.site.ignore.contains(&f.name))
            .filter(|f| !(self.site.ignore_symlinks && f.is_symlink()))
            .collect()
    }
}

impl Lister for Crawler {
    /// List a directory through `STAT`.
    ///
    /// An unreadable directory (non-213 reply) is logged and treated as
    /// empty so a single bad directory does not abort the crawl; a
    /// malformed listing does. Paths containing spaces upset some
    /// servers' `STAT`, so those go through `CWD` + `STAT .`.
    async fn list(&mut self, path: &str) -> Result<Vec<File>> {
        let client = self.client.as_mut().ok_or(Error::ConnectionClosed)?;
        let reply = if path.contains(' ') {
            match client.cwd(path).await {
                Ok(()) => client.stat("-al .").await,
                Err(err) => Err(err),
            }
        } else {
            client.stat(&format!("-al {path}")).await
        };
        let message = match reply {
            Ok(message) => message,
            Err(Error::Protocol { code, message: reply }) => {
                warn!(site = %self.site.name, %path, %code, %reply, "listing directory failed");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err),
        };
        let files = parse_listing(Utc::now(), path, &message)?;
        Ok(self.filter_files(files))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::{FileMode, parse_mode};
    use chrono::TimeZone;

    struct FakeLister;

    fn entry(name: &str, mode: FileMode) -> File {
        File {
            name: name.to_string(),
            path: String::new(),
            user: "foo".to_string(),
            group: "bar".to_string(),
            num_entries: 1,
            size: 4096,
            modified: Utc.with_ymd_and_hms(2016, 11, 1, 0, 0, 0).unwrap(),
            mode,
        }
    }

    fn dir(name: &str) -> File {
        entry(name, parse_mode("drwxr-xr-x").unwrap())
    }

    fn file(name: &str) -> File {
        entry(name, parse_mode("-rw-r--r--").unwrap())
    }

    impl Lister for FakeLister {
        async fn list(&mut self, path: &str) -> Result<Vec<File>> {
            Ok(match path {
                "/" => vec![dir("dir1"), dir("dir2")],
                "/dir1" => vec![dir("dir1-1"), dir("dir1-2")],
                "/dir1/dir1-1" => vec![dir("dir1-1-1"), dir("dir1-1-2")],
                "/dir1/dir1-1/dir1-1-1" => vec![file("file1"), dir("dir1-1-1-1")],
                "/dir1/dir1-2" => vec![dir("dir1-2-1"), dir("dir1-2-2")],
                "/dir1/dir1-2/dir1-2-1" => vec![file("file2"), dir("dir1-2-1-1")],
                "/dir2" => vec![dir("Dir2-1"), dir("_dir2-2")],
                "/dir2/Dir2-1" => vec![file("file3")],
                "/dir2/_dir2-2" => vec![dir("dir2-2-1")],
                "/dir2/_dir2-2/dir2-2-1" => vec![file("file4")],
                _ => vec![],
            })
        }
    }

    #[tokio::test]
    async fn test_walk_stops_at_leaf_level() {
        let files = walk(&mut FakeLister, "/", 0).await.unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "dir1", "dir2", "dir1-1", "dir1-2", "dir1-1-1", "dir1-1-2", "dir1-2-1",
                "dir1-2-2", "_dir2-2", "Dir2-1", "dir2-2-1"
            ]
        );
    }

    #[tokio::test]
    async fn test_walk_skips_meta_and_regular_entries() {
        struct Flat;
        impl Lister for Flat {
            async fn list(&mut self, path: &str) -> Result<Vec<File>> {
                Ok(match path {
                    "/" => vec![dir("."), dir(".."), dir("sub"), file("readme")],
                    "/sub" => vec![file("payload")],
                    _ => vec![],
                })
            }
        }
        let files = walk(&mut Flat, "/", 0).await.unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        // Meta and regular entries are emitted but never descended into
        assert_eq!(names, [".", "..", "readme", "sub"]);
    }

    #[test]
    fn test_sort_files_underscore_first() {
        let mut files = vec![dir("beta"), dir("_x"), dir("Alpha"), dir("_a")];
        sort_files(&mut files);
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["_a", "_x", "Alpha", "beta"]);
    }

    #[test]
    fn test_filter_files() {
        let site = SiteConfig {
            name: "test".to_string(),
            ignore: vec!["lost+found".to_string()],
            ignore_symlinks: true,
            ..SiteConfig::default()
        };
        let crawler = Crawler::new(site, Arc::new(Store::open(":memory:").unwrap()));
        let files = vec![
            dir("keep"),
            dir("lost+found"),
            entry("link", parse_mode("lrwxrwxrwx").unwrap()),
        ];
        let kept = crawler.filter_files(files);
        let names: Vec<_> = kept.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["keep"]);
    }
}
