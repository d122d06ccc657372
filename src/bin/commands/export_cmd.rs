use anyhow::{Context, Result};
use ipregion::segment::merge_adjacent;
use ipregion::Segment;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use crate::cli_utils::open_index;

pub fn cmd_export(artifact: PathBuf, output: Option<PathBuf>, raw: bool) -> Result<()> {
    let index = open_index(&artifact, false)?;

    let mut segments: Vec<Segment> = index
        .segments()
        .collect::<ipregion::Result<_>>()
        .with_context(|| format!("Failed to decode records of {}", artifact.display()))?;
    if !raw {
        segments = merge_adjacent(&segments)
            .with_context(|| format!("Stored records of {} are not contiguous", artifact.display()))?;
    }

    let writer: Box<dyn Write> = match &output {
        Some(path) => Box::new(
            File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    let mut writer = BufWriter::new(writer);

    for segment in &segments {
        writeln!(writer, "{}", segment)?;
    }
    writer.flush().context("Failed to write records")?;

    if let Some(path) = output {
        eprintln!("✓ Exported {} records to {}", segments.len(), path.display());
    }

    Ok(())
}
