use std::path::PathBuf;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use vmg2eml::convert_file;

/// Convert legacy vMessage (.vmg) container files to .eml message files.
#[derive(Parser)]
#[command(name = "vmg2eml", version)]
struct Args {
    /// Directory to scan for input files; outputs land next to each input
    #[arg(default_value = ".")]
    dir: PathBuf,

    /// Extension of the input files to convert
    #[arg(long, default_value = "vmg")]
    extension: String,

    /// Log skipped and copied lines
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    let mut files = 0u64;
    let mut messages = 0u64;
    for entry in std::fs::read_dir(&args.dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(args.extension.as_str()) {
            continue;
        }
        info!("converting {}", path.display());
        let emitted = convert_file(&path)?;
        files += 1;
        messages += emitted.len() as u64;
    }

    info!("done: {} message(s) from {} file(s)", messages, files);
    Ok(())
}
