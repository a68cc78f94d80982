//! The `update` command: crawl sites and replace their index rows

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::Config;
use crate::crawler::Crawler;
use crate::error::Result;
use crate::store::Store;

fn selected(only: &[String], name: &str) -> bool {
    only.is_empty() || only.iter().any(|s| s == name)
}

/// Crawl every non-skipped site, `only` restricting to the named ones.
pub async fn run(config: &Config, only: &[String], dry_run: bool) -> Result<()> {
    let store = Arc::new(Store::open(&config.database)?);
    run_with_store(config, only, dry_run, store).await
}

/// Crawl into an already-open store.
///
/// At most `config.concurrency` site crawls run at once. A failing site
/// is logged and never aborts the others; completion is awaited by
/// draining the semaphore back to its full capacity.
pub async fn run_with_store(
    config: &Config,
    only: &[String],
    dry_run: bool,
    store: Arc<Store>,
) -> Result<()> {
    let semaphore = Arc::new(Semaphore::new(config.concurrency));
    for site in &config.sites {
        if site.skip || !selected(only, &site.name) {
            continue;
        }
        if dry_run {
            info!(site = %site.name, "would update");
            continue;
        }
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore closed");
        let mut crawler = Crawler::new(site.clone(), store.clone());
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(err) = crawler.connect().await {
                warn!(site = %crawler.name(), %err, "failed to connect");
                return;
            }
            if let Err(err) = crawler.run().await {
                warn!(site = %crawler.name(), %err, "crawling failed");
            }
            crawler.close().await;
        });
    }
    // Wait for the remaining crawls to finish
    let _all = semaphore
        .acquire_many(config.concurrency as u32)
        .await
        .expect("semaphore closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selected() {
        assert!(selected(&[], "foo"));
        assert!(selected(&["foo".to_string()], "foo"));
        assert!(!selected(&["bar".to_string()], "foo"));
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let config = Config::parse(
            r#"{"Database": ":memory:", "Concurrency": 1,
                "Sites": [{"Name": "foo", "Address": "127.0.0.1:1"},
                          {"Name": "bar", "Address": "127.0.0.1:1", "Skip": true}]}"#,
        )
        .unwrap();
        let store = Arc::new(Store::open(":memory:").unwrap());
        run_with_store(&config, &[], true, store.clone())
            .await
            .unwrap();
        assert!(store.select_sites().unwrap().is_empty());
    }
}
