mod cli_utils;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use ipregion::RegionError;
use std::path::PathBuf;

use commands::{cmd_bench, cmd_build, cmd_export, cmd_inspect, cmd_search, cmd_validate};

#[derive(Parser)]
#[command(name = "ipregion")]
#[command(
    about = "Build and query disk-resident IP to region indexes",
    long_about = "ipregion - Compact IP address to region lookup\n\n\
    Turns a text list of contiguous IP ranges (startIP|endIP|region...) into a\n\
    binary artifact, and looks addresses up in it with a vector index plus a\n\
    binary search. One address family (IPv4 or IPv6) per artifact.\n\n\
    Examples:\n\
      ipregion build ip.merge.txt -o ip2region_v4.xdb\n\
      ipregion search ip2region_v4.xdb 1.2.3.4\n\
      ipregion inspect ip2region_v4.xdb --json\n\
      ipregion validate ip2region_v4.xdb\n\
      ipregion bench ip2region_v4.xdb ip.merge.txt"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Address family selection for `build`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FamilyArg {
    /// Use the family of the first record
    Auto,
    /// IPv4 only
    V4,
    /// IPv6 only
    V6,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an index artifact from a source record file
    Build {
        /// Source file (startIP|endIP|region per line, .gz supported), or "-" for stdin
        #[arg(value_name = "SOURCE")]
        input: PathBuf,

        /// Output artifact path
        #[arg(short, long)]
        output: PathBuf,

        /// Address family of the source
        #[arg(long, value_enum, default_value = "auto")]
        family: FamilyArg,

        /// Vector index prefix length in bytes (1 or 2)
        #[arg(long, default_value = "2")]
        prefix_bytes: u8,

        /// Keep only these 0-based region fields, e.g. "0,2,3,4"
        #[arg(long)]
        field_list: Option<String>,

        /// Build time to record in the header (Unix seconds, default: now)
        #[arg(long)]
        build_epoch: Option<u64>,

        /// Print each build stage as it completes
        #[arg(short, long)]
        verbose: bool,
    },

    /// Look up the region of an address
    Search {
        /// Path to the index artifact
        #[arg(value_name = "ARTIFACT")]
        artifact: PathBuf,

        /// Address to look up, or "-" to read one address per line from stdin
        #[arg(value_name = "ADDRESS")]
        address: String,

        /// Read the artifact into memory instead of memory-mapping it
        #[arg(long)]
        load: bool,

        /// Quiet mode - no output, exit code only (0 = found, 6 = not covered)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show header and size information about an artifact
    Inspect {
        /// Path to the index artifact
        #[arg(value_name = "ARTIFACT")]
        artifact: PathBuf,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Walk every record and vector entry of an artifact and check consistency
    Validate {
        /// Path to the index artifact
        #[arg(value_name = "ARTIFACT")]
        artifact: PathBuf,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Write an artifact back out as source records
    Export {
        /// Path to the index artifact
        #[arg(value_name = "ARTIFACT")]
        artifact: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Emit the split records as stored instead of re-merging neighbours
        #[arg(long)]
        raw: bool,
    },

    /// Look up the start and end of every source record and time it
    Bench {
        /// Path to the index artifact
        #[arg(value_name = "ARTIFACT")]
        artifact: PathBuf,

        /// Source file the artifact was built from
        #[arg(value_name = "SOURCE")]
        source: PathBuf,

        /// Read the artifact into memory instead of memory-mapping it
        #[arg(long)]
        load: bool,
    },
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Build {
            input,
            output,
            family,
            prefix_bytes,
            field_list,
            build_epoch,
            verbose,
        } => cmd_build(
            input,
            output,
            family,
            prefix_bytes,
            field_list,
            build_epoch,
            verbose,
        ),
        Commands::Search {
            artifact,
            address,
            load,
            quiet,
        } => cmd_search(artifact, address, load, quiet),
        Commands::Inspect { artifact, json } => cmd_inspect(artifact, json),
        Commands::Validate { artifact, json } => cmd_validate(artifact, json),
        Commands::Export {
            artifact,
            output,
            raw,
        } => cmd_export(artifact, output, raw),
        Commands::Bench {
            artifact,
            source,
            load,
        } => cmd_bench(artifact, source, load),
    }
}

fn main() {
    let cli = Cli::parse();
    let quiet = matches!(cli.command, Commands::Search { quiet: true, .. });

    if let Err(err) = run(cli) {
        // Library errors keep their kind and exit code through any added context
        let region_err = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<RegionError>());
        match region_err {
            Some(region_err) => {
                if !quiet {
                    eprintln!("error[{}]: {:#}", region_err.kind(), err);
                }
                std::process::exit(region_err.exit_code());
            }
            None => {
                if !quiet {
                    eprintln!("error: {:#}", err);
                }
                std::process::exit(1);
            }
        }
    }
}
