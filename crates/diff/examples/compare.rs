// Compare two files and print a unified diff, or the JSON result.
//
// cargo run -p diff-engine --example compare -- old.txt new.txt --context 5
// RUST_LOG=diff_engine=debug cargo run -p diff-engine --example compare -- a b --json

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use diff_engine::{compute_diff, DiffOptions, DEFAULT_CONTEXT_LINES, DEFAULT_TIMEOUT_MS};

#[derive(Parser, Debug)]
#[command(about = "Compare two text files")]
struct Args {
    /// The original file
    old: PathBuf,

    /// The changed file
    new: PathBuf,

    /// Unchanged lines shown around each change
    #[arg(short = 'U', long, default_value_t = DEFAULT_CONTEXT_LINES)]
    context: usize,

    /// Time budget in milliseconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Minimum similarity for a removed/added pair to be highlighted
    #[arg(long, default_value_t = 0.0)]
    similarity: f64,

    /// Ignore whitespace at the end of lines
    #[arg(short = 'w', long)]
    ignore_trailing_whitespace: bool,

    /// Compare CRLF and LF lines as equal and ignore a missing final newline
    #[arg(long)]
    normalize_line_endings: bool,

    /// Print the full result as JSON
    #[arg(long)]
    json: bool,
}

fn run(args: &Args) -> Result<bool> {
    let old = fs::read_to_string(&args.old)
        .with_context(|| format!("Failed to read {}", args.old.display()))?;
    let new = fs::read_to_string(&args.new)
        .with_context(|| format!("Failed to read {}", args.new.display()))?;

    let options = DiffOptions::default()
        .context_lines(args.context)
        .timeout_ms(args.timeout_ms)
        .similarity_threshold(args.similarity)
        .ignore_trailing_whitespace(args.ignore_trailing_whitespace)
        .normalize_line_endings(args.normalize_line_endings);

    let result = match compute_diff(&old, &new, &options) {
        Ok(result) => result,
        Err(e) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&e.report())?);
            }
            return Err(e).context("Failed to compare files");
        }
    };
    log::info!(
        "{} hunks, +{} -{} in {:.2}ms",
        result.hunks.len(),
        result.stats.additions,
        result.stats.deletions,
        result.metadata.calculation_time_ms
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if result.has_changes() {
        println!("--- {}", args.old.display());
        println!("+++ {}", args.new.display());
        print!("{}", result.to_unified());
    }
    Ok(result.has_changes())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    // Exit codes follow diff(1): 0 same, 1 different, 2 trouble
    match run(&args) {
        Ok(false) => ExitCode::SUCCESS,
        Ok(true) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}
