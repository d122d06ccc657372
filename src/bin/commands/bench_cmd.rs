use anyhow::{Context, Result};
use ipregion::source::{self, SourceReader};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::cli_utils::{format_number, format_qps, open_index};

/// Look up both ends of every source record and check the answer against the source
pub fn cmd_bench(artifact: PathBuf, source_path: PathBuf, load: bool) -> Result<()> {
    let load_start = Instant::now();
    let index = open_index(&artifact, load)?;
    let load_time = load_start.elapsed();

    let reader = source::open(&source_path)
        .with_context(|| format!("Failed to open source: {}", source_path.display()))?;

    let total_start = Instant::now();
    let mut search_time = Duration::ZERO;
    let mut count = 0usize;

    for segment in SourceReader::new(reader) {
        let segment = segment
            .with_context(|| format!("Invalid record in {}", source_path.display()))?;

        for addr in [segment.start, segment.end] {
            let t = Instant::now();
            let region = index
                .lookup_addr(&addr)
                .with_context(|| format!("Search failed for: {}", addr))?;
            search_time += t.elapsed();

            if region != segment.region {
                anyhow::bail!(
                    "Search({}) returned '{}', expected '{}'",
                    addr,
                    region,
                    segment.region
                );
            }
            count += 1;
        }
    }

    let took = total_start.elapsed();
    let per_op = if count > 0 {
        search_time.as_nanos() as f64 / count as f64
    } else {
        0.0
    };
    let qps = if search_time.as_secs_f64() > 0.0 {
        count as f64 / search_time.as_secs_f64()
    } else {
        0.0
    };

    println!("Bench finished");
    println!("  Storage:     {}", if index.is_mmap() { "mmap" } else { "memory" });
    println!("  Open time:   {:.2}ms", load_time.as_secs_f64() * 1000.0);
    println!("  Lookups:     {}", format_number(count));
    println!("  Took:        {:.2}s", took.as_secs_f64());
    println!("  Cost:        {:.0} ns/op", per_op);
    println!("  Throughput:  {} lookups/sec", format_qps(qps));

    Ok(())
}
