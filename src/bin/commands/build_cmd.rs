use anyhow::{Context, Result};
use ipregion::source::{self, parse_field_list};
use ipregion::{BuildObserver, BuildStage, IndexBuilder, IpFamily};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use crate::cli_utils::{format_bytes, format_number, set_readonly, unix_now};
use crate::FamilyArg;

/// Prints each completed build stage with the time since the build started
struct StageReporter {
    start: Instant,
}

impl BuildObserver for StageReporter {
    fn on_stage(&self, stage: BuildStage, count: usize) {
        println!(
            "  [{:>8.3}s] {:<12} {}",
            self.start.elapsed().as_secs_f64(),
            stage,
            format_number(count)
        );
    }
}

pub fn cmd_build(
    input: PathBuf,
    output: PathBuf,
    family: FamilyArg,
    prefix_bytes: u8,
    field_list: Option<String>,
    build_epoch: Option<u64>,
    verbose: bool,
) -> Result<()> {
    let fields = field_list
        .as_deref()
        .map(parse_field_list)
        .transpose()
        .context("Invalid --field-list")?;

    if verbose {
        println!("Building region index...");
        println!("  Source:       {}", input.display());
        println!("  Output:       {}", output.display());
        println!("  Prefix bytes: {}", prefix_bytes);
        if let Some(fields) = &fields {
            println!("  Fields:       {:?}", fields);
        }
        println!();
    }

    let read_start = Instant::now();
    let segments = source::read_segments(&input, fields.as_deref())
        .with_context(|| format!("Failed to read source: {}", input.display()))?;

    let family = match family {
        FamilyArg::V4 => IpFamily::V4,
        FamilyArg::V6 => IpFamily::V6,
        FamilyArg::Auto => match segments.first() {
            Some(first) => first.family(),
            None => anyhow::bail!(
                "No segment records in {}; pass --family to build an empty index",
                input.display()
            ),
        },
    };

    if verbose {
        println!(
            "  Read {} {} records in {:.2}s",
            format_number(segments.len()),
            family,
            read_start.elapsed().as_secs_f64()
        );
    }

    let mut builder = IndexBuilder::new(family)
        .with_prefix_len(prefix_bytes)
        .with_build_epoch(build_epoch.unwrap_or_else(unix_now));
    if verbose {
        builder = builder.with_observer(StageReporter {
            start: Instant::now(),
        });
    }
    for segment in segments {
        builder.add_segment(segment)?;
    }

    let out = builder.build().context("Failed to build index")?;

    // A previous build left a read-only file behind; replace it rather than write through it
    if output.exists() {
        fs::remove_file(&output)
            .with_context(|| format!("Failed to replace existing file: {}", output.display()))?;
    }
    fs::write(&output, &out.bytes)
        .with_context(|| format!("Failed to save artifact: {}", output.display()))?;

    // Set file to read-only to protect mmap integrity
    set_readonly(&output)?;

    let stats = &out.stats;
    if verbose {
        println!();
        println!("✓ Index built successfully!");
        println!("  Output:           {}", output.display());
        println!("  Source segments:  {}", format_number(stats.source_segments));
        println!("  Merged segments:  {}", format_number(stats.merged_segments));
        println!("  Indexed records:  {}", format_number(stats.indexed_segments));
        println!("  Unique regions:   {}", format_number(stats.unique_regions));
        println!("  Region data:      {}", format_bytes(stats.region_bytes));
        println!(
            "  Artifact size:    {} ({} bytes)",
            format_bytes(stats.artifact_size),
            stats.artifact_size
        );
        if !stats.covers_family {
            println!(
                "  Note: source does not cover the whole {} space; uncovered lookups fail",
                family
            );
        }
    } else {
        println!("✓ Index built: {}", output.display());
    }

    Ok(())
}
