use anyhow::{Context, Result};
use ipregion::RegionError;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use crate::cli_utils::open_index;

pub fn cmd_search(artifact: PathBuf, address: String, load: bool, quiet: bool) -> Result<()> {
    let index = open_index(&artifact, load)?;

    if address != "-" {
        let region = index
            .lookup(&address)
            .with_context(|| format!("Search failed for: {}", address))?;
        if !quiet {
            println!("{}", region);
        }
        return Ok(());
    }

    // Batch mode: one address per line in, "address<TAB>region" per line out
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    let mut failed = 0usize;
    let mut last_error: Option<RegionError> = None;

    for line in stdin.lock().lines() {
        let line = line.context("Failed to read address from stdin")?;
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        match index.lookup(query) {
            Ok(region) => {
                if !quiet {
                    writeln!(out, "{}\t{}", query, region)?;
                }
            }
            Err(err) => {
                failed += 1;
                if !quiet {
                    eprintln!("{}: {}", query, err);
                }
                last_error = Some(err);
            }
        }
    }
    out.flush()?;

    match last_error {
        Some(err) => Err(anyhow::Error::new(err)
            .context(format!("{} address(es) could not be resolved", failed))),
        None => Ok(()),
    }
}
