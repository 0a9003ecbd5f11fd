use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use vtrack::dataset::resize_dataset;
use vtrack::Size;

/// Letterbox a YOLO dataset split (`images/` + `labels/`) to a fixed size
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Split directory containing `images/` and `labels/`
    input: PathBuf,

    /// Output directory, created if missing
    output: PathBuf,

    /// Target canvas width
    #[arg(long, default_value_t = 416)]
    width: u32,

    /// Target canvas height
    #[arg(long, default_value_t = 416)]
    height: u32,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let target = Size::new(cli.width, cli.height)?;
    let report = resize_dataset(&cli.input, &cli.output, target)
        .with_context(|| format!("resizing {}", cli.input.display()))?;

    println!(
        "{} images, {} label files, {} boxes, {} failed",
        report.images, report.labels, report.boxes, report.failed
    );

    Ok(())
}
