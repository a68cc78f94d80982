//! The `gc` command: drop sites that are no longer configured

use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::store::Store;

/// Names present in `store` but absent from both `config` and `exclude`.
fn difference(store: &[String], config: &[String], exclude: &[String]) -> Vec<String> {
    store
        .iter()
        .filter(|name| !config.contains(name) && !exclude.contains(name))
        .cloned()
        .collect()
}

/// Remove unconfigured sites, then optimize the FTS table and compact
/// the database file.
pub fn run(config: &Config, dry_run: bool, exclude: &[String]) -> Result<()> {
    let store = Store::open(&config.database)?;
    run_with_store(config, dry_run, exclude, &store)
}

pub fn run_with_store(
    config: &Config,
    dry_run: bool,
    exclude: &[String],
    store: &Store,
) -> Result<()> {
    let store_sites: Vec<String> = store
        .select_sites()?
        .into_iter()
        .map(|s| s.name)
        .collect();
    let config_sites: Vec<String> = config.sites.iter().map(|s| s.name.clone()).collect();
    let remove = difference(&store_sites, &config_sites, exclude);
    if dry_run {
        for name in &remove {
            info!(site = %name, "would remove");
        }
        return Ok(());
    }
    info!(sites = remove.len(), "removing sites");
    store.delete_sites(&remove)?;
    info!("optimizing full-text index");
    store.optimize()?;
    info!("rebuilding database");
    store.vacuum()
}
