use anyhow::Result;
use ipregion::RegionError;
use serde_json::json;
use std::path::PathBuf;
use std::time::Instant;

use crate::cli_utils::{format_bytes, format_number, open_index};

pub fn cmd_validate(artifact: PathBuf, json_output: bool) -> Result<()> {
    // Header and block geometry are checked on open
    let index = open_index(&artifact, false)?;

    let start = Instant::now();
    let report = index.verify();
    let duration = start.elapsed();

    if json_output {
        let output = json!({
            "artifact": artifact.display().to_string(),
            "is_valid": report.is_valid(),
            "duration_ms": duration.as_millis(),
            "errors": report.errors,
            "suppressed_errors": report.suppressed_errors,
            "warnings": report.warnings,
            "stats": report.stats,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let stats = &report.stats;
        println!("Validating: {}", artifact.display());
        println!();
        println!("Statistics:");
        println!(
            "  {} v{}, {}-byte prefix, {} records in {} buckets",
            stats.family,
            stats.version,
            stats.prefix_len,
            format_number(stats.segment_count),
            format_number(stats.buckets_used)
        );
        println!(
            "  {} unique regions, {} region data, {} total",
            format_number(stats.unique_regions),
            format_bytes(stats.region_bytes),
            format_bytes(stats.file_size)
        );
        println!(
            "  Contiguous: {}, covers full {} space: {}",
            stats.contiguous, stats.family, stats.covers_family
        );
        println!("  Validation time: {:.2}ms", duration.as_secs_f64() * 1000.0);
        println!();

        if !report.errors.is_empty() {
            println!("❌ ERRORS ({}):", report.errors.len() + report.suppressed_errors);
            for error in &report.errors {
                println!("  • {}", error);
            }
            if report.suppressed_errors > 0 {
                println!("  • ... and {} more", report.suppressed_errors);
            }
            println!();
        }

        if !report.warnings.is_empty() {
            println!("⚠️  WARNINGS ({}):", report.warnings.len());
            for warning in &report.warnings {
                println!("  • {}", warning);
            }
            println!();
        }

        if report.is_valid() {
            println!("✅ VALID: artifact is consistent");
        } else {
            println!("❌ INVALID: artifact has structural errors");
        }
    }

    if report.is_valid() {
        Ok(())
    } else {
        Err(RegionError::CorruptArtifact(format!(
            "{} consistency error(s) in {}",
            report.errors.len() + report.suppressed_errors,
            artifact.display()
        ))
        .into())
    }
}
