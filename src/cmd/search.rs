//! The `search` command: keyword queries against the index

use std::io::{self, IsTerminal, Write};

use chrono::{TimeZone, Utc};
use clap::ValueEnum;
use comfy_table::Table;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::{SearchResult, Store, order_by_clauses};

/// Columns accepted in `--order` expressions. The column name is spliced
/// into SQL, so anything outside this set is rejected up front.
const SORTABLE_COLUMNS: [&str; 3] = ["site", "dir.path", "dir.modified"];

/// Default sort order when no `--order` is given
const DEFAULT_ORDER: [&str; 2] = ["site:asc", "dir.path:asc"];

/// Output format of search results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Bordered table with site, path and date columns
    Table,
    /// One `site path date` line per hit
    Simple,
    /// Paths only, for piping into other tools
    Path,
}

fn order_clause(exprs: &[String]) -> Result<String> {
    let exprs: Vec<&str> = if exprs.is_empty() {
        DEFAULT_ORDER.to_vec()
    } else {
        exprs.iter().map(String::as_str).collect()
    };
    for expr in &exprs {
        let column = expr.split(':').next().unwrap_or_default();
        if !SORTABLE_COLUMNS.contains(&column) {
            return Err(Error::InvalidOrder(format!(
                "cannot sort by {column:?}, expected one of: {}",
                SORTABLE_COLUMNS.join(", ")
            )));
        }
    }
    order_by_clauses(&exprs)
}

fn format_date(modified: i64) -> String {
    match Utc.timestamp_opt(modified, 0).single() {
        Some(date) => date.format("%Y-%m-%d %H:%M:%S %Z").to_string(),
        None => "-".to_string(),
    }
}

fn render<W: Write>(out: &mut W, format: Format, hits: &[SearchResult]) -> io::Result<()> {
    match format {
        Format::Table => {
            let mut table = Table::new();
            table.set_header(["Site", "Path", "Date"]);
            for hit in hits {
                let date = format_date(hit.modified);
                table.add_row([hit.site.as_str(), hit.path.as_str(), date.as_str()]);
            }
            writeln!(out, "{table}")
        }
        Format::Simple => {
            for hit in hits {
                writeln!(out, "{} {} {}", hit.site, hit.path, format_date(hit.modified))?;
            }
            Ok(())
        }
        Format::Path => {
            for hit in hits {
                writeln!(out, "{}", hit.path)?;
            }
            Ok(())
        }
    }
}

/// Query the index and print the hits.
///
/// With no explicit format, a terminal gets the table and anything else
/// gets bare paths. Zero hits is an error so scripts can rely on the
/// exit code.
pub fn run(
    config: &Config,
    site: Option<&str>,
    max_count: usize,
    order: &[String],
    format: Option<Format>,
    keywords: &[String],
) -> Result<()> {
    let order = order_clause(order)?;
    let store = Store::open(&config.database)?;
    let hits = store.select_dirs(&keywords.join(" "), site, &order, max_count)?;
    if hits.is_empty() {
        return Err(Error::NoMatches);
    }
    let format = format.unwrap_or_else(|| {
        if io::stdout().is_terminal() {
            Format::Table
        } else {
            Format::Path
        }
    });
    render(&mut io::stdout().lock(), format, &hits)?;
    Ok(())
}
