use anyhow::Result;
use serde_json::json;
use std::path::PathBuf;

use crate::cli_utils::{format_build_time, format_bytes, format_number, open_index};

pub fn cmd_inspect(artifact: PathBuf, json_output: bool) -> Result<()> {
    let index = open_index(&artifact, false)?;
    let layout = index.layout();

    if json_output {
        let output = json!({
            "file": artifact.display().to_string(),
            "version": index.version(),
            "family": index.family().name(),
            "prefix_len": index.prefix_len(),
            "build_epoch": index.build_epoch(),
            "segment_count": index.segment_count(),
            "region_data_size": index.region_data_len(),
            "file_size": index.size(),
            "blocks": {
                "vector_index_offset": layout.vector_index_offset,
                "vector_entries": layout.vector_entries(),
                "segment_index_offset": layout.segment_index_offset,
                "record_size": layout.record_size(),
                "region_data_offset": layout.region_data_offset,
            },
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Artifact: {}", artifact.display());
    println!("Version:  {}", index.version());
    println!("Family:   {}", index.family());
    println!("Built:    {}", format_build_time(index.build_epoch()));
    println!();
    println!("Contents:");
    println!("  Segments:     {}", format_number(index.segment_count()));
    println!("  Region data:  {}", format_bytes(index.region_data_len()));
    println!("  File size:    {}", format_bytes(index.size()));
    println!();
    println!("Layout:");
    println!(
        "  Vector index:  offset {:>10}  {} × 8 bytes ({}-byte prefix)",
        layout.vector_index_offset,
        format_number(layout.vector_entries()),
        index.prefix_len()
    );
    println!(
        "  Segment index: offset {:>10}  {} × {} bytes",
        layout.segment_index_offset,
        format_number(layout.segment_count),
        layout.record_size()
    );
    println!(
        "  Region data:   offset {:>10}  {} bytes",
        layout.region_data_offset,
        format_number(layout.region_data_size)
    );

    Ok(())
}
