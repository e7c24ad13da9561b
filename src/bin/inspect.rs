//! mapstore Inspector
//!
//! Prints the control data and chain statistics of a kept store.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use mapstore::{inspect_store, StoreError};
use tracing_subscriber::{fmt, EnvFilter};

/// mapstore inspector
#[derive(Parser, Debug)]
#[command(name = "mapstore-inspect")]
#[command(about = "Inspect a kept mapstore on disk")]
#[command(version)]
struct Args {
    /// Directory holding the store files
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Store name (files are {name}.hash, {name}.key, ...)
    #[arg(short, long)]
    name: String,

    /// Exit with a failure status if the store is corrupt
    #[arg(long)]
    verify: bool,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,mapstore=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tracing::debug!("mapstore-inspect v{}", mapstore::VERSION);

    let report = match inspect_store(&args.dir, &args.name) {
        Ok(report) => report,
        Err(e) if !args.verify && is_corruption(&e) => {
            tracing::warn!("store {} is corrupt: {}", args.name, e);
            println!("name:            {}", args.name);
            println!("status:          corrupt ({})", e);
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            tracing::error!("Failed to inspect {}: {}", args.name, e);
            return ExitCode::FAILURE;
        }
    };

    let stats = &report.stats;
    println!("name:            {}", report.name);
    println!("capacity:        {}", report.control.capacity);
    println!("key codec:       {}", report.control.key_codec);
    println!("value codec:     {}", report.control.value_codec);
    println!("entries:         {}", stats.count);
    println!("used buckets:    {}", stats.used_buckets);
    println!("longest chain:   {}", stats.longest_chain);
    println!("key log bytes:   {}", stats.key_log_bytes);
    println!("value log bytes: {}", stats.value_log_bytes);
    if stats.capacity > 0 {
        println!(
            "load factor:     {:.3}",
            stats.count as f64 / stats.capacity as f64
        );
    }

    ExitCode::SUCCESS
}

fn is_corruption(error: &StoreError) -> bool {
    matches!(
        error,
        StoreError::CorruptChain { .. } | StoreError::Corruption(_)
    )
}
