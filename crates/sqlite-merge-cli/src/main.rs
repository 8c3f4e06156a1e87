//! sqlite-merge CLI - merge SQLite databases that share a declarative schema.

use clap::Parser;
use sqlite_merge::{MergeConfig, MergeError, Merger, Schema, TermProgress};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "sqlite-merge")]
#[command(about = "Merge SQLite databases together using their shared schema")]
#[command(version)]
struct Cli {
    /// Path to the schema document (JSON)
    #[arg(short, long, value_name = "PATH")]
    schema_path: PathBuf,

    /// Path of the merged database file
    #[arg(short, long, value_name = "PATH", default_value = "./merged.db")]
    output_path: PathBuf,

    /// Delete the output database first if it already exists
    #[arg(long)]
    remove: bool,

    /// Minimum number of rows to insert at a time
    #[arg(long, value_name = "NUMBER", default_value_t = 1000)]
    min_inserts: u64,

    /// Keep the <Model>_id_map tables that track old -> new key mappings
    #[arg(long)]
    keep_id_maps: bool,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Output the JSON report to stdout
    #[arg(long)]
    output_json: bool,

    /// Paths to the SQLite database files to merge
    #[arg(value_name = "INPUT PATHS", num_args = 1.., required = true)]
    input_paths: Vec<PathBuf>,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

fn run() -> Result<(), MergeError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity);

    let schema = Schema::load(&cli.schema_path)?;
    info!("Loaded schema from {:?}", cli.schema_path);

    let config = MergeConfig {
        input_paths: cli.input_paths,
        output_path: cli.output_path,
        batch_threshold: cli.min_inserts,
        keep_id_maps: cli.keep_id_maps,
        remove_existing: cli.remove,
    };

    let report = Merger::new(schema, config)?
        .with_progress(Box::new(TermProgress::new()))
        .run()?;

    if cli.output_json {
        println!("{}", report.to_json()?);
    } else {
        println!("\nMerge completed!");
        println!("  Run ID: {}", report.run_id);
        println!("  Duration: {:.2}s", report.duration_seconds);
        println!("  Models: {}", report.models_total);
        println!("  Rows: {}", report.rows_merged);
        println!("  Throughput: {} rows/sec", report.rows_per_second);
        if !report.integrity_warnings.is_empty() {
            println!(
                "  Integrity warnings: {} (see log output)",
                report.integrity_warnings.len()
            );
        }
    }

    Ok(())
}

fn setup_logging(verbosity: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}
