use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use vtrack::render::{track_label, Renderer};
use vtrack::session::ReplayDetector;
use vtrack::{ClassTable, Frame, IouAssociator, RawDetection, Session, SessionConfig, Size, Track};

/// Replay a recorded detections file through the tracker and print confirmed tracks
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Detections file, one `<frame>:<json array>` line per frame
    detections: PathBuf,

    /// Session config (JSON), defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Class names file, overrides the one from the config
    #[arg(long)]
    classes: Option<PathBuf>,

    /// Frame width in pixels
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Frame height in pixels
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Detections were recorded on a letterboxed canvas of this width
    #[arg(long, requires = "canvas_height")]
    canvas_width: Option<u32>,

    #[arg(long, requires = "canvas_width")]
    canvas_height: Option<u32>,
}

/// Prints `frame id class left top right bottom confidence label` per track.
struct PrintRenderer;

impl Renderer<Vec<RawDetection>> for PrintRenderer {
    fn render(&mut self, frame: &mut Frame<Vec<RawDetection>>, tracks: &[Track], classes: &ClassTable) {
        for t in tracks {
            let b = &t.last_box_ltrb;
            println!(
                "{} {} {} {:.1} {:.1} {:.1} {:.1} {:.3} {}",
                frame.index,
                t.track_id,
                t.det_class,
                b.left(),
                b.top(),
                b.right(),
                b.bottom(),
                t.det_confidence,
                track_label(t, classes).unwrap_or_default()
            );
        }
    }
}

fn parse_line(line: &str) -> Option<(u64, Vec<RawDetection>)> {
    let (frame, json) = line.split_once(':')?;
    let frame = frame.trim().parse().ok()?;
    let dets = serde_json::from_str(json).ok()?;

    Some((frame, dets))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = match &cli.config {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SessionConfig::default(),
    };

    if let Some(classes) = cli.classes {
        config.class_names_path = classes;
    }

    let size = Size::new(cli.width, cli.height)?;
    let detector = match (cli.canvas_width, cli.canvas_height) {
        (Some(w), Some(h)) => ReplayDetector::letterboxed(Size::new(w, h)?),
        _ => ReplayDetector::default(),
    };
    let file = std::fs::File::open(&cli.detections)
        .with_context(|| format!("opening {}", cli.detections.display()))?;

    let frames = std::io::BufReader::new(file)
        .lines()
        .map_while(|line| line.ok())
        .filter(|line| !line.trim().is_empty())
        .filter_map(move |line| match parse_line(&line) {
            Some((index, dets)) => Some(Frame::new(index, size, dets)),
            None => {
                log::warn!("wrong file format, skipping line: {}", line);
                None
            }
        });

    let associator = IouAssociator::new(config.associator_config());
    let session = Session::new(&config, detector, associator, PrintRenderer);

    let stop = AtomicBool::new(false);
    let summary = session.run(frames, &stop)?;

    log::info!(
        "{} frames, {} tracks on the last one",
        summary.frames,
        summary.last_tracks.len()
    );

    Ok(())
}
